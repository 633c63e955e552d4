//! Option Declaration
//!
//! The option-file surface: `option()` validates its declaration, registers
//! the option with the active project, then layers project default_options
//! and command-line overrides on top, re-validating each.

use crate::diagnostics::{ErrorKind, InterpError, InterpResult, Span};
use crate::object::{BuildOption, FeatureState, Obj, OptionType, Value};
use crate::typecheck::args::ArgParser;
use crate::typecheck::{TAG_LISTIFY, TC_ANY, TC_BOOL, TC_NUMBER, TC_STRING};
use crate::vm::{Args, Vm};
use crate::workspace::options::{coerce_override, validate_value};
use crate::workspace::Workspace;

fn opt_error(msg: String, span: Span) -> InterpError {
    InterpError::new(ErrorKind::OptionValidation, msg).at(span)
}

/// Apply one project() default_options entry to an already-declared
/// option. Unknown keys are kept for options declared later.
pub fn apply_default_option(
    wk: &mut Workspace,
    key: &str,
    value: &str,
    span: Span,
) -> InterpResult<()> {
    let existing = wk.current_project().options.get(key).copied();
    if let Some(obj) = existing {
        let opt = match wk.store.get(obj) {
            Value::BuildOption(b) => (**b).clone(),
            _ => return Ok(()),
        };
        let coerced = coerce_override(wk, &opt, value, span)?;
        if let Value::BuildOption(b) = wk.store.get_mut(obj) {
            b.value = coerced;
        }
    }
    Ok(())
}

/// Apply command-line overrides to the builtin options of the active
/// project. Called once from project().
pub fn apply_builtin_overrides(wk: &mut Workspace, span: Span) -> InterpResult<()> {
    let names: Vec<String> = wk.current_project().options.keys().cloned().collect();
    for name in names {
        if let Some(raw) = wk.take_option_override(&name) {
            let obj = wk.current_project().options[&name];
            let opt = match wk.store.get(obj) {
                Value::BuildOption(b) => (**b).clone(),
                _ => continue,
            };
            let coerced = coerce_override(wk, &opt, &raw, span)?;
            if let Value::BuildOption(b) = wk.store.get_mut(obj) {
                b.value = coerced;
            }
        }
    }
    Ok(())
}

pub fn func_option(vm: &mut Vm, _this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(b) = ArgParser::new("option")
        .pos("name", TC_STRING)
        .kw("type", TC_STRING)
        .kw("value", TC_ANY)
        .kw("choices", TAG_LISTIFY | TC_STRING)
        .kw("min", TC_NUMBER)
        .kw("max", TC_NUMBER)
        .kw("description", TC_STRING)
        .kw("yield", TC_BOOL)
        .kw("deprecated", TC_BOOL | TC_STRING | TAG_LISTIFY)
        .bind(vm, args)?
        .into_bound()
    else {
        return Ok(Obj::DISABLER);
    };

    let name = vm.wk.store.get_str(b.pos(0)).to_string();
    if name.is_empty() || name.contains(':') {
        return Err(opt_error(format!("invalid option name '{}'", name), b.pos_span(0)));
    }
    if vm.wk.current_project().options.contains_key(&name) {
        return Err(opt_error(format!("option '{}' is already declared", name), b.pos_span(0)));
    }

    let type_name = b
        .kw_str(&vm.wk.store, "type")
        .ok_or_else(|| opt_error("option() requires the type keyword".to_string(), args.span))?;
    let ty = OptionType::from_str(&type_name).ok_or_else(|| {
        opt_error(format!("invalid option type '{}'", type_name), b.kw_span("type"))
    })?;

    // Per-type kwarg restrictions.
    if b.kw("choices").is_some() && !matches!(ty, OptionType::Combo | OptionType::Array) {
        return Err(opt_error(
            format!("the choices keyword is not valid for {} options", ty.as_str()),
            b.kw_span("choices"),
        ));
    }
    if (b.kw("min").is_some() || b.kw("max").is_some()) && ty != OptionType::Integer {
        return Err(opt_error(
            format!("min/max are not valid for {} options", ty.as_str()),
            b.kw_span("min"),
        ));
    }
    if ty == OptionType::Combo && b.kw("choices").is_none() {
        return Err(opt_error(
            "combo options require the choices keyword".to_string(),
            args.span,
        ));
    }

    let choices = b.kw_strs(&vm.wk.store, "choices");
    let min = b.kw_number(&vm.wk.store, "min");
    let max = b.kw_number(&vm.wk.store, "max");

    // The declared default: explicit value or the type's natural default.
    let value = match b.kw("value") {
        Some(v) => match (ty, vm.wk.store.get(v)) {
            // Feature defaults arrive as strings in option files.
            (OptionType::Feature, Value::Str(id)) => {
                let raw = vm.wk.store.str_value(*id).to_string();
                match FeatureState::from_str(&raw) {
                    Some(state) => vm.wk.store.new_feature(state),
                    None => {
                        return Err(opt_error(
                            format!("cannot coerce '{}' into a feature", raw),
                            b.kw_span("value"),
                        ));
                    }
                }
            }
            _ => v,
        },
        None => match ty {
            OptionType::String => vm.wk.store.new_str(""),
            OptionType::Boolean => Obj::TRUE,
            OptionType::Combo => {
                let first = choices.first().cloned().unwrap_or_default();
                vm.wk.store.new_str(&first)
            }
            OptionType::Integer => vm.wk.store.new_number(min.unwrap_or(0)),
            OptionType::Array => {
                let items: Vec<Obj> = Vec::new();
                vm.wk.store.new_array(items)
            }
            OptionType::Feature => vm.wk.store.new_feature(FeatureState::Auto),
        },
    };

    let mut opt = BuildOption {
        name: name.clone(),
        ty,
        value,
        choices,
        min,
        max,
        description: b.kw_str(&vm.wk.store, "description"),
        yielding: b.kw_bool(&vm.wk.store, "yield", false),
        deprecated: b.kw("deprecated").is_some(),
    };
    opt.value = validate_value(vm.wk, &opt, opt.value, b.kw_span("value"))?;

    // Layer project defaults then the command-line override, re-validating
    // each coercion.
    if let Some(default) = vm.wk.current_project().default_options.get(&name).cloned() {
        opt.value = coerce_override(vm.wk, &opt, &default, args.span)?;
    }
    if let Some(raw) = vm.wk.take_option_override(&name) {
        opt.value = coerce_override(vm.wk, &opt, &raw, args.span)?;
    }
    if opt.deprecated {
        let text = format!("option '{}' is deprecated", name);
        vm.wk.diag.warning(Some(args.span), &text);
    }

    let obj = vm.wk.store.push(Value::BuildOption(Box::new(opt)));
    vm.wk.current_project_mut().options.insert(name, obj);
    Ok(Obj::NULL)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::{ErrorKind, InterpError};
    use crate::fs::InMemoryFs;

    fn workspace_with(options_file: &str, build_file: &str) -> Workspace {
        let mut fs = InMemoryFs::new();
        fs.add_file("/src/meson.build", build_file);
        fs.add_file("/src/meson.options", options_file);
        Workspace::new(Box::new(fs), "/src", "/build")
    }

    fn eval(options_file: &str, build_file: &str) -> Workspace {
        let mut wk = workspace_with(options_file, build_file);
        if let Err(err) = wk.eval_root() {
            panic!("evaluation failed: {}", wk.diag.render(&err));
        }
        wk
    }

    fn eval_err(options_file: &str, build_file: &str) -> InterpError {
        let mut wk = workspace_with(options_file, build_file);
        wk.eval_root().expect_err("evaluation should fail")
    }

    fn var(wk: &Workspace, name: &str) -> Obj {
        wk.projects[0].lookup_var(name).expect("variable defined")
    }

    #[test]
    fn test_declared_default_round_trips() {
        let wk = eval(
            "option('greeting', type: 'string', value: 'hi')\n",
            "project('p')\ng = get_option('greeting')\n",
        );
        assert_eq!(wk.store.as_str(var(&wk, "g")), Some("hi"));
    }

    #[test]
    fn test_combo_requires_choices() {
        let err = eval_err("option('x', type: 'combo', value: 'a')\n", "project('p')\n");
        assert_eq!(err.kind, ErrorKind::OptionValidation);
        assert!(err.message.contains("choices"));
    }

    #[test]
    fn test_invalid_type_rejected() {
        let err = eval_err("option('x', type: 'float')\n", "project('p')\n");
        assert_eq!(err.kind, ErrorKind::OptionValidation);
        assert!(err.message.contains("float"));
    }

    #[test]
    fn test_duplicate_declaration_rejected() {
        let err = eval_err(
            "option('x', type: 'boolean')\noption('x', type: 'boolean')\n",
            "project('p')\n",
        );
        assert_eq!(err.kind, ErrorKind::OptionValidation);
        assert!(err.message.contains("already declared"));
    }

    #[test]
    fn test_integer_range_enforced_on_override() {
        let mut wk = workspace_with(
            "option('n', type: 'integer', min: 0, max: 10, value: 5)\n",
            "project('p')\n",
        );
        wk.option_overrides =
            vec![crate::workspace::options::OptionOverride::parse("n=11").unwrap()];
        let err = wk.eval_root().expect_err("override above max");
        assert_eq!(err.kind, ErrorKind::OptionValidation);
        assert!(err.message.contains("11"));
    }

    #[test]
    fn test_override_wins_over_declared_default() {
        let mut wk = workspace_with(
            "option('n', type: 'integer', min: 0, max: 10, value: 5)\n",
            "project('p')\nn = get_option('n')\n",
        );
        wk.option_overrides =
            vec![crate::workspace::options::OptionOverride::parse("n=7").unwrap()];
        wk.eval_root().unwrap();
        assert_eq!(wk.store.as_number(var(&wk, "n")), Some(7));
    }

    #[test]
    fn test_feature_default_is_auto() {
        let wk = eval(
            "option('gui', type: 'feature')\n",
            "project('p')\nis_auto = get_option('gui').auto()\n",
        );
        assert_eq!(wk.store.as_bool(var(&wk, "is_auto")), Some(true));
    }

    #[test]
    fn test_min_max_only_for_integers() {
        let err = eval_err("option('x', type: 'string', min: 1)\n", "project('p')\n");
        assert_eq!(err.kind, ErrorKind::OptionValidation);
    }

    #[test]
    fn test_deprecated_option_warns() {
        let wk = eval(
            "option('old', type: 'boolean', deprecated: true)\n",
            "project('p')\n",
        );
        assert!(wk.diag.warning_count > 0);
    }
}
