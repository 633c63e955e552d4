//! Option Store
//!
//! Builtin option seeding, `-Dkey=value` override parsing, and the value
//! validation shared by option declaration and override application.

use crate::diagnostics::{ErrorKind, InterpError, InterpResult, Span};
use crate::object::{BuildOption, FeatureState, Obj, OptionType, Value};
use crate::workspace::Workspace;

/// A `[subproject:]key=value` override from the command line.
#[derive(Debug, Clone)]
pub struct OptionOverride {
    pub subproject: Option<String>,
    pub key: String,
    pub value: String,
    pub used: bool,
}

impl OptionOverride {
    /// Parse one `-D` argument.
    pub fn parse(raw: &str) -> Result<Self, String> {
        let (lhs, value) = raw
            .split_once('=')
            .ok_or_else(|| format!("expected key=value, got '{}'", raw))?;
        if lhs.is_empty() {
            return Err(format!("empty option name in '{}'", raw));
        }
        let (subproject, key) = match lhs.split_once(':') {
            Some((sub, key)) => (Some(sub.to_string()), key.to_string()),
            None => (None, lhs.to_string()),
        };
        Ok(Self { subproject, key, value: value.to_string(), used: false })
    }

    pub fn display(&self) -> String {
        match &self.subproject {
            Some(sub) => format!("{}:{}={}", sub, self.key, self.value),
            None => format!("{}={}", self.key, self.value),
        }
    }
}

/// Validate a value object against an option declaration. Returns the value
/// unchanged on success.
pub fn validate_value(
    wk: &Workspace,
    opt: &BuildOption,
    value: Obj,
    span: Span,
) -> InterpResult<Obj> {
    let fail = |msg: String| Err(InterpError::new(ErrorKind::OptionValidation, msg).at(span));
    match opt.ty {
        OptionType::String => {
            if wk.store.as_str(value).is_none() {
                return fail(format!("option '{}' expects a string", opt.name));
            }
        }
        OptionType::Boolean => {
            if wk.store.as_bool(value).is_none() {
                return fail(format!("option '{}' expects a boolean", opt.name));
            }
        }
        OptionType::Combo => match wk.store.as_str(value) {
            Some(s) => {
                if !opt.choices.iter().any(|c| c == s) {
                    return fail(format!(
                        "option '{}' value '{}' is not one of [{}]",
                        opt.name,
                        s,
                        opt.choices.join(", ")
                    ));
                }
            }
            None => return fail(format!("option '{}' expects a string", opt.name)),
        },
        OptionType::Integer => match wk.store.as_number(value) {
            Some(n) => {
                if let Some(min) = opt.min {
                    if n < min {
                        return fail(format!("option '{}' value {} is below minimum {}", opt.name, n, min));
                    }
                }
                if let Some(max) = opt.max {
                    if n > max {
                        return fail(format!("option '{}' value {} is above maximum {}", opt.name, n, max));
                    }
                }
            }
            None => return fail(format!("option '{}' expects an integer", opt.name)),
        },
        OptionType::Array => match wk.store.as_array(value) {
            Some(items) => {
                for &item in items {
                    match wk.store.as_str(item) {
                        Some(s) => {
                            if !opt.choices.is_empty() && !opt.choices.iter().any(|c| c == s) {
                                return fail(format!(
                                    "option '{}' element '{}' is not one of [{}]",
                                    opt.name,
                                    s,
                                    opt.choices.join(", ")
                                ));
                            }
                        }
                        None => {
                            return fail(format!("option '{}' expects an array of strings", opt.name))
                        }
                    }
                }
            }
            None => return fail(format!("option '{}' expects an array", opt.name)),
        },
        OptionType::Feature => {
            if !matches!(wk.store.get(value), Value::FeatureOpt(_)) {
                return fail(format!("option '{}' expects a feature value", opt.name));
            }
        }
    }
    Ok(value)
}

/// Coerce a raw override string into a value of the declared type.
pub fn coerce_override(
    wk: &mut Workspace,
    opt: &BuildOption,
    raw: &str,
    span: Span,
) -> InterpResult<Obj> {
    let fail = |msg: String| Err(InterpError::new(ErrorKind::OptionValidation, msg).at(span));
    let value = match opt.ty {
        OptionType::String | OptionType::Combo => wk.store.new_str(raw),
        OptionType::Boolean => match raw {
            "true" => Obj::TRUE,
            "false" => Obj::FALSE,
            _ => return fail(format!("cannot coerce '{}' into a boolean", raw)),
        },
        OptionType::Integer => match raw.parse::<i64>() {
            Ok(n) => wk.store.new_number(n),
            Err(_) => return fail(format!("cannot coerce '{}' into an integer", raw)),
        },
        OptionType::Array => {
            // Accept a bare comma-separated list or a [a,b] form.
            let inner = raw.trim().trim_start_matches('[').trim_end_matches(']');
            let items: Vec<Obj> = inner
                .split(',')
                .map(|s| s.trim().trim_matches('\''))
                .filter(|s| !s.is_empty())
                .map(|s| wk.store.new_str(s))
                .collect();
            wk.store.new_array(items)
        }
        OptionType::Feature => match FeatureState::from_str(raw) {
            Some(state) => wk.store.new_feature(state),
            None => return fail(format!("cannot coerce '{}' into a feature", raw)),
        },
    };
    validate_value(wk, opt, value, span)
}

fn seed(wk: &mut Workspace, project: usize, name: &str, ty: OptionType, value: Value, choices: &[&str]) {
    let value = wk.store.push(value);
    let opt = BuildOption {
        name: name.to_string(),
        ty,
        value,
        choices: choices.iter().map(|s| s.to_string()).collect(),
        min: None,
        max: None,
        description: None,
        yielding: true,
        deprecated: false,
    };
    let obj = wk.store.push(Value::BuildOption(Box::new(opt)));
    wk.projects[project].options.insert(name.to_string(), obj);
}

/// Install the built-in option set into a freshly created project.
pub fn seed_builtin_options(wk: &mut Workspace, project: usize) {
    let str_val = |wk: &mut Workspace, s: &str| {
        let id = wk.store.strings.intern(s);
        Value::Str(id)
    };

    let v = str_val(wk, "debug");
    seed(wk, project, "buildtype", OptionType::Combo, v, &[
        "plain", "debug", "debugoptimized", "release", "minsize", "custom",
    ]);
    let v = str_val(wk, "shared");
    seed(wk, project, "default_library", OptionType::Combo, v, &["shared", "static", "both"]);
    let v = str_val(wk, "1");
    seed(wk, project, "warning_level", OptionType::Combo, v, &["0", "1", "2", "3", "everything"]);
    let v = str_val(wk, "0");
    seed(wk, project, "optimization", OptionType::Combo, v, &["plain", "0", "g", "1", "2", "3", "s"]);
    seed(wk, project, "debug", OptionType::Boolean, Value::Bool(true), &[]);
    seed(wk, project, "werror", OptionType::Boolean, Value::Bool(false), &[]);
    let v = str_val(wk, "/usr/local");
    seed(wk, project, "prefix", OptionType::String, v, &[]);
    let v = str_val(wk, "bin");
    seed(wk, project, "bindir", OptionType::String, v, &[]);
    let v = str_val(wk, "lib");
    seed(wk, project, "libdir", OptionType::String, v, &[]);
    let v = str_val(wk, "include");
    seed(wk, project, "includedir", OptionType::String, v, &[]);
    let v = str_val(wk, "share");
    seed(wk, project, "datadir", OptionType::String, v, &[]);
    let v = str_val(wk, "share/man");
    seed(wk, project, "mandir", OptionType::String, v, &[]);
    let v = str_val(wk, "default");
    seed(wk, project, "wrap_mode", OptionType::Combo, v, &[
        "default", "nofallback", "nodownload", "forcefallback", "nopromote",
    ]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_override() {
        let oo = OptionOverride::parse("level=high").unwrap();
        assert_eq!(oo.key, "level");
        assert_eq!(oo.value, "high");
        assert!(oo.subproject.is_none());

        let oo = OptionOverride::parse("libfoo:level=low").unwrap();
        assert_eq!(oo.subproject.as_deref(), Some("libfoo"));
        assert_eq!(oo.display(), "libfoo:level=low");
    }

    #[test]
    fn test_parse_override_rejects_bare_word() {
        assert!(OptionOverride::parse("nonsense").is_err());
        assert!(OptionOverride::parse("=x").is_err());
    }
}
