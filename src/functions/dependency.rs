//! Dependency Object Methods

use crate::diagnostics::{bounds_error, InterpResult};
use crate::functions::FuncImpl;
use crate::object::{Dependency, IncludeType, Obj, Value};
use crate::typecheck::args::ArgParser;
use crate::typecheck::{TC_ANY, TC_BOOL, TC_DEPENDENCY, TC_STRING};
use crate::vm::{Args, Vm};

fn this_dep<'a>(vm: &'a Vm<'_>, this: Obj) -> &'a Dependency {
    match vm.wk.store.get(this) {
        Value::Dependency(dep) => dep,
        _ => unreachable!("receiver typechecked by dispatch"),
    }
}

fn func_found(vm: &mut Vm, this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(_b) = ArgParser::new("found").bind(vm, args)?.into_bound() else {
        return Ok(Obj::DISABLER);
    };
    let found = this_dep(vm, this).found;
    Ok(vm.wk.store.new_bool(found))
}

fn func_type_name(vm: &mut Vm, this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(_b) = ArgParser::new("type_name").bind(vm, args)?.into_bound() else {
        return Ok(Obj::DISABLER);
    };
    let name = this_dep(vm, this).kind.as_str();
    Ok(vm.wk.store.new_str(name))
}

fn func_name(vm: &mut Vm, this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(_b) = ArgParser::new("name").bind(vm, args)?.into_bound() else {
        return Ok(Obj::DISABLER);
    };
    let name = this_dep(vm, this).name.clone();
    Ok(vm.wk.store.new_str(&name))
}

fn func_version(vm: &mut Vm, this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(_b) = ArgParser::new("version").bind(vm, args)?.into_bound() else {
        return Ok(Obj::DISABLER);
    };
    let version = this_dep(vm, this)
        .version
        .clone()
        .unwrap_or_else(|| "unknown".to_string());
    Ok(vm.wk.store.new_str(&version))
}

fn func_include_type(vm: &mut Vm, this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(_b) = ArgParser::new("include_type").bind(vm, args)?.into_bound() else {
        return Ok(Obj::DISABLER);
    };
    let s = this_dep(vm, this).include_type.as_str();
    Ok(vm.wk.store.new_str(s))
}

fn func_get_variable(vm: &mut Vm, this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(b) = ArgParser::new("get_variable")
        .opt_pos("varname", TC_STRING)
        .kw("pkgconfig", TC_STRING)
        .kw("internal", TC_STRING)
        .kw("default_value", TC_STRING)
        .bind(vm, args)?
        .into_bound()
    else {
        return Ok(Obj::DISABLER);
    };
    let name = b
        .opt_pos(0)
        .map(|a| vm.wk.store.get_str(a.val).to_string())
        .or_else(|| b.kw_str(&vm.wk.store, "pkgconfig"))
        .or_else(|| b.kw_str(&vm.wk.store, "internal"));
    let dep = this_dep(vm, this);
    let value = name.as_deref().and_then(|n| dep.variables.get(n).cloned());
    match value {
        Some(v) => Ok(vm.wk.store.new_str(&v)),
        None => match b.kw_str(&vm.wk.store, "default_value") {
            Some(default) => Ok(vm.wk.store.new_str(&default)),
            None => Err(bounds_error(format!(
                "dependency '{}' has no variable '{}'",
                this_dep(vm, this).name,
                name.unwrap_or_default()
            ))
            .at(args.span)),
        },
    }
}

fn func_get_pkgconfig_variable(vm: &mut Vm, this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(b) = ArgParser::new("get_pkgconfig_variable")
        .pos("varname", TC_STRING)
        .kw("default", TC_STRING)
        .bind(vm, args)?
        .into_bound()
    else {
        return Ok(Obj::DISABLER);
    };
    let name = vm.wk.store.get_str(b.pos(0)).to_string();
    let value = this_dep(vm, this).variables.get(&name).cloned();
    match value {
        Some(v) => Ok(vm.wk.store.new_str(&v)),
        None => match b.kw_str(&vm.wk.store, "default") {
            Some(default) => Ok(vm.wk.store.new_str(&default)),
            None => Err(bounds_error(format!(
                "dependency '{}' has no pkg-config variable '{}'",
                this_dep(vm, this).name,
                name
            ))
            .at(b.pos_span(0))),
        },
    }
}

/// Copy of the dependency narrowed to the requested parts.
fn func_partial_dependency(vm: &mut Vm, this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(b) = ArgParser::new("partial_dependency")
        .kw("compile_args", TC_BOOL)
        .kw("link_args", TC_BOOL)
        .kw("links", TC_BOOL)
        .kw("includes", TC_BOOL)
        .kw("sources", TC_BOOL)
        .bind(vm, args)?
        .into_bound()
    else {
        return Ok(Obj::DISABLER);
    };
    let src = this_dep(vm, this).clone();
    let mut out = Dependency::not_found(src.name.clone(), src.machine);
    out.kind = src.kind;
    out.found = src.found;
    out.version = src.version.clone();
    if b.kw_bool(&vm.wk.store, "compile_args", false) {
        out.compile_args = src.compile_args.clone();
    }
    if b.kw_bool(&vm.wk.store, "link_args", false) {
        out.link_args = src.link_args.clone();
    }
    if b.kw_bool(&vm.wk.store, "links", false) {
        out.link_with = src.link_with.clone();
        out.link_whole = src.link_whole.clone();
    }
    if b.kw_bool(&vm.wk.store, "includes", false) {
        out.include_directories = src.include_directories.clone();
    }
    if b.kw_bool(&vm.wk.store, "sources", false) {
        out.sources = src.sources.clone();
    }
    Ok(vm.wk.store.push(Value::Dependency(Box::new(out))))
}

fn func_as_system(vm: &mut Vm, this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(b) = ArgParser::new("as_system")
        .opt_pos("value", TC_STRING)
        .bind(vm, args)?
        .into_bound()
    else {
        return Ok(Obj::DISABLER);
    };
    let requested = b
        .opt_pos(0)
        .map(|a| vm.wk.store.get_str(a.val).to_string())
        .unwrap_or_else(|| "system".to_string());
    let include_type = IncludeType::from_str(&requested).unwrap_or(IncludeType::System);
    let mut dep = this_dep(vm, this).clone();
    dep.include_type = include_type;
    Ok(vm.wk.store.push(Value::Dependency(Box::new(dep))))
}

fn func_as_link_whole(vm: &mut Vm, this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(_b) = ArgParser::new("as_link_whole").bind(vm, args)?.into_bound() else {
        return Ok(Obj::DISABLER);
    };
    let mut dep = this_dep(vm, this).clone();
    dep.link_whole.append(&mut dep.link_with);
    Ok(vm.wk.store.push(Value::Dependency(Box::new(dep))))
}

pub const METHODS: &[FuncImpl] = &[
    FuncImpl::new("as_link_whole", func_as_link_whole, TC_DEPENDENCY),
    FuncImpl::new("as_system", func_as_system, TC_DEPENDENCY),
    FuncImpl::new("found", func_found, TC_BOOL),
    FuncImpl::new("get_pkgconfig_variable", func_get_pkgconfig_variable, TC_STRING),
    FuncImpl::new("get_variable", func_get_variable, TC_ANY),
    FuncImpl::new("include_type", func_include_type, TC_STRING),
    FuncImpl::new("name", func_name, TC_STRING),
    FuncImpl::new("partial_dependency", func_partial_dependency, TC_DEPENDENCY),
    FuncImpl::new("type_name", func_type_name, TC_STRING),
    FuncImpl::new("version", func_version, TC_STRING),
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::{ErrorKind, Span};
    use crate::object::{DepKind, MachineKind};
    use crate::vm::ArgValue;
    use crate::workspace::Workspace;

    fn setup() -> Workspace {
        let mut wk = Workspace::in_memory();
        let idx = wk.push_project("", None);
        wk.cur_project = idx;
        wk
    }

    fn sample_dep(wk: &mut Workspace) -> Obj {
        let mut dep = Dependency::found("zlib", DepKind::Pkgconf, MachineKind::Host);
        dep.version = Some("1.3".to_string());
        dep.compile_args = vec!["-DZ".to_string()];
        dep.link_args = vec!["-lz".to_string()];
        dep.link_with = vec![Obj::TRUE];
        dep.variables.insert("prefix".to_string(), "/usr".to_string());
        wk.store.push(Value::Dependency(Box::new(dep)))
    }

    fn args(vals: &[Obj]) -> Args {
        Args {
            pos: vals.iter().map(|&v| ArgValue { val: v, span: Span::default() }).collect(),
            kwargs: Vec::new(),
            span: Span::default(),
        }
    }

    #[test]
    fn test_identity_accessors() {
        let mut wk = setup();
        let dep = sample_dep(&mut wk);
        let mut vm = Vm::new(&mut wk);
        assert_eq!(func_found(&mut vm, dep, &Args::default()).unwrap(), Obj::TRUE);
        let name = func_name(&mut vm, dep, &Args::default()).unwrap();
        assert_eq!(vm.wk.store.as_str(name), Some("zlib"));
        let kind = func_type_name(&mut vm, dep, &Args::default()).unwrap();
        assert_eq!(vm.wk.store.as_str(kind), Some("pkgconfig"));
        let version = func_version(&mut vm, dep, &Args::default()).unwrap();
        assert_eq!(vm.wk.store.as_str(version), Some("1.3"));
    }

    #[test]
    fn test_version_unknown_when_absent() {
        let mut wk = setup();
        let dep = Dependency::found("x", DepKind::Declared, MachineKind::Host);
        let dep = wk.store.push(Value::Dependency(Box::new(dep)));
        let mut vm = Vm::new(&mut wk);
        let version = func_version(&mut vm, dep, &Args::default()).unwrap();
        assert_eq!(vm.wk.store.as_str(version), Some("unknown"));
    }

    #[test]
    fn test_get_variable_with_default() {
        let mut wk = setup();
        let dep = sample_dep(&mut wk);
        let known = wk.store.new_str("prefix");
        let mut vm = Vm::new(&mut wk);
        let out = func_get_variable(&mut vm, dep, &args(&[known])).unwrap();
        assert_eq!(vm.wk.store.as_str(out), Some("/usr"));

        let unknown = vm.wk.store.new_str("gone");
        let fallback = vm.wk.store.new_str("d");
        let call = Args {
            pos: vec![ArgValue { val: unknown, span: Span::default() }],
            kwargs: vec![(
                "default_value".to_string(),
                ArgValue { val: fallback, span: Span::default() },
            )],
            span: Span::default(),
        };
        let out = func_get_variable(&mut vm, dep, &call).unwrap();
        assert_eq!(vm.wk.store.as_str(out), Some("d"));

        let err = func_get_variable(&mut vm, dep, &args(&[unknown])).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Bounds);
    }

    #[test]
    fn test_get_pkgconfig_variable() {
        let mut wk = setup();
        let dep = sample_dep(&mut wk);
        let known = wk.store.new_str("prefix");
        let mut vm = Vm::new(&mut wk);
        let out = func_get_pkgconfig_variable(&mut vm, dep, &args(&[known])).unwrap();
        assert_eq!(vm.wk.store.as_str(out), Some("/usr"));
        let unknown = vm.wk.store.new_str("gone");
        assert!(func_get_pkgconfig_variable(&mut vm, dep, &args(&[unknown])).is_err());
    }

    #[test]
    fn test_partial_dependency_narrows() {
        let mut wk = setup();
        let dep = sample_dep(&mut wk);
        let call = Args {
            pos: Vec::new(),
            kwargs: vec![(
                "compile_args".to_string(),
                ArgValue { val: Obj::TRUE, span: Span::default() },
            )],
            span: Span::default(),
        };
        let mut vm = Vm::new(&mut wk);
        let out = func_partial_dependency(&mut vm, dep, &call).unwrap();
        match vm.wk.store.get(out) {
            Value::Dependency(d) => {
                assert!(d.found);
                assert_eq!(d.compile_args, ["-DZ"]);
                assert!(d.link_args.is_empty());
                assert!(d.link_with.is_empty());
            }
            other => panic!("expected dependency, got {:?}", other.obj_type()),
        }
    }

    #[test]
    fn test_as_system_sets_include_type() {
        let mut wk = setup();
        let dep = sample_dep(&mut wk);
        let mut vm = Vm::new(&mut wk);
        let out = func_as_system(&mut vm, dep, &Args::default()).unwrap();
        let rendered = func_include_type(&mut vm, out, &Args::default()).unwrap();
        assert_eq!(vm.wk.store.as_str(rendered), Some("system"));
    }

    #[test]
    fn test_as_link_whole_moves_link_with() {
        let mut wk = setup();
        let dep = sample_dep(&mut wk);
        let mut vm = Vm::new(&mut wk);
        let out = func_as_link_whole(&mut vm, dep, &Args::default()).unwrap();
        match vm.wk.store.get(out) {
            Value::Dependency(d) => {
                assert!(d.link_with.is_empty());
                assert_eq!(d.link_whole.len(), 1);
            }
            other => panic!("expected dependency, got {:?}", other.obj_type()),
        }
    }
}
