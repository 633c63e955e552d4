//! Centralized Coercions
//!
//! Conversions between overlapping shapes: path-ish values to files,
//! various values to environments, strings to include directories, and the
//! required/feature requirement resolution. Every failure is a Coercion
//! error anchored by the caller.

use indexmap::IndexMap;

use crate::diagnostics::{coercion_error, InterpResult};
use crate::object::{
    EnvAction, EnvironmentData, FeatureState, IncludeDirectory, Obj, Value,
};
use crate::workspace::Workspace;

/// Coerce one value into file objects, appending to `out`.
/// Strings resolve relative to the current source directory; targets
/// contribute their outputs.
pub fn files_into(wk: &mut Workspace, value: Obj, out: &mut Vec<Obj>) -> InterpResult<()> {
    match wk.store.get(value).clone() {
        Value::Str(id) => {
            let path = wk.resolve_source_path(wk.store.str_value(id).to_string().as_str());
            out.push(wk.store.new_file(&path));
        }
        Value::File(_) => out.push(value),
        Value::Array(items) => {
            for item in items {
                files_into(wk, item, out)?;
            }
        }
        Value::CustomTarget(ct) => out.extend(ct.outputs.iter().copied()),
        Value::GeneratedList(gl) => out.extend(gl.outputs.iter().copied()),
        Value::BuildTarget(bt) => {
            let path = bt.output_path.clone();
            out.push(wk.store.new_file(&path));
        }
        Value::BothLibs { static_lib, shared_lib } => {
            files_into(wk, shared_lib, out)?;
            let _ = static_lib;
        }
        other => {
            return Err(coercion_error(format!(
                "cannot coerce {} into a file",
                other.obj_type().as_str()
            )));
        }
    }
    Ok(())
}

pub fn files(wk: &mut Workspace, value: Obj) -> InterpResult<Vec<Obj>> {
    let mut out = Vec::new();
    files_into(wk, value, &mut out)?;
    Ok(out)
}

/// Coerce to an environment object. Strings, arrays and dicts describe
/// plain `set` entries.
pub fn environment(wk: &mut Workspace, value: Obj) -> InterpResult<Obj> {
    match wk.store.get(value).clone() {
        Value::Environment(_) => Ok(value),
        Value::Dict(map) => {
            let mut env = EnvironmentData::default();
            for (k, v) in map {
                let s = wk
                    .store
                    .as_str(v)
                    .ok_or_else(|| coercion_error("environment dict values must be strings"))?;
                env.entries
                    .insert(k, (EnvAction::Set, vec![s.to_string()], ":".to_string()));
            }
            Ok(wk.store.push(Value::Environment(Box::new(env))))
        }
        Value::Array(items) => {
            // Entries of the form NAME=value.
            let mut env = EnvironmentData::default();
            for item in items {
                let s = wk
                    .store
                    .as_str(item)
                    .ok_or_else(|| coercion_error("environment arrays must contain strings"))?;
                match s.split_once('=') {
                    Some((k, v)) => {
                        env.entries.insert(
                            k.to_string(),
                            (EnvAction::Set, vec![v.to_string()], ":".to_string()),
                        );
                    }
                    None => {
                        return Err(coercion_error(format!(
                            "environment entry '{}' is not of the form NAME=value",
                            s
                        )));
                    }
                }
            }
            Ok(wk.store.push(Value::Environment(Box::new(env))))
        }
        Value::Str(id) => {
            let s = wk.store.str_value(id).to_string();
            let mut env = EnvironmentData::default();
            match s.split_once('=') {
                Some((k, v)) => {
                    env.entries.insert(
                        k.to_string(),
                        (EnvAction::Set, vec![v.to_string()], ":".to_string()),
                    );
                }
                None => {
                    return Err(coercion_error(format!(
                        "environment entry '{}' is not of the form NAME=value",
                        s
                    )));
                }
            }
            Ok(wk.store.push(Value::Environment(Box::new(env))))
        }
        other => Err(coercion_error(format!(
            "cannot coerce {} into an environment",
            other.obj_type().as_str()
        ))),
    }
}

/// Coerce include-directory arguments: strings become include_directory
/// objects rooted at the current source dir.
pub fn include_dirs(wk: &mut Workspace, values: &[Obj]) -> InterpResult<Vec<Obj>> {
    let mut out = Vec::new();
    for &value in values {
        match wk.store.get(value).clone() {
            Value::IncludeDirectory(_) => out.push(value),
            Value::Str(id) => {
                let rel = wk.store.str_value(id).to_string();
                let path = wk.resolve_source_path(&rel);
                out.push(wk.store.push(Value::IncludeDirectory(Box::new(IncludeDirectory {
                    paths: vec![path],
                    is_system: false,
                }))));
            }
            other => {
                return Err(coercion_error(format!(
                    "cannot coerce {} into an include directory",
                    other.obj_type().as_str()
                )));
            }
        }
    }
    Ok(out)
}

/// Resolve a `required:` value: bool, or a feature option where
/// `enabled` means required and `disabled` means skip entirely.
/// Returns (required, disabled).
pub fn requirement(wk: &Workspace, value: Option<Obj>) -> (bool, bool) {
    match value {
        None => (true, false),
        Some(obj) => match wk.store.get(obj) {
            Value::Bool(b) => (*b, false),
            Value::FeatureOpt(FeatureState::Enabled) => (true, false),
            Value::FeatureOpt(FeatureState::Disabled) => (false, true),
            Value::FeatureOpt(FeatureState::Auto) => (false, false),
            _ => (true, false),
        },
    }
}

/// Render a number-or-string-or-bool install mode entry list.
pub fn install_mode(wk: &Workspace, values: &[Obj]) -> Vec<String> {
    values
        .iter()
        .map(|&o| match wk.store.get(o) {
            Value::Str(id) => wk.store.str_value(*id).to_string(),
            Value::Number(n) => format!("{:o}", n),
            Value::Bool(b) => b.to_string(),
            _ => String::new(),
        })
        .collect()
}

/// Flatten a value into plain strings; files and targets contribute paths.
pub fn string_list(wk: &mut Workspace, value: Obj) -> InterpResult<Vec<String>> {
    let mut flat = Vec::new();
    wk.store.flatten_into(value, &mut flat);
    let mut out = Vec::new();
    for obj in flat {
        match wk.store.get(obj) {
            Value::Str(id) | Value::File(id) => out.push(wk.store.str_value(*id).to_string()),
            Value::Number(n) => out.push(n.to_string()),
            Value::Bool(b) => out.push(b.to_string()),
            other => {
                return Err(coercion_error(format!(
                    "cannot coerce {} into a string",
                    other.obj_type().as_str()
                )));
            }
        }
    }
    Ok(out)
}

/// Path of an executable-shaped value for command lines.
pub fn exe_path(wk: &Workspace, value: Obj) -> Option<String> {
    match wk.store.get(value) {
        Value::Str(id) | Value::File(id) => Some(wk.store.str_value(*id).to_string()),
        Value::ExternalProgram(p) => p.path.clone(),
        Value::BuildTarget(bt) => Some(bt.output_path.clone()),
        Value::CustomTarget(ct) => ct
            .outputs
            .first()
            .and_then(|&o| wk.store.path_like(o).map(|s| s.to_string())),
        Value::BothLibs { shared_lib, .. } => exe_path(wk, *shared_lib),
        _ => None,
    }
}

/// Merge a dict or `key=value` string list into a string map. A mixed or
/// malformed form is a type error at the caller.
pub fn string_map(wk: &Workspace, value: Obj) -> InterpResult<IndexMap<String, String>> {
    let mut out = IndexMap::new();
    match wk.store.get(value) {
        Value::Dict(map) => {
            for (k, &v) in map {
                match wk.store.get(v) {
                    Value::Str(id) => {
                        out.insert(k.clone(), wk.store.str_value(*id).to_string());
                    }
                    Value::Bool(b) => {
                        out.insert(k.clone(), b.to_string());
                    }
                    Value::Number(n) => {
                        out.insert(k.clone(), n.to_string());
                    }
                    other => {
                        return Err(coercion_error(format!(
                            "cannot coerce {} into an option value",
                            other.obj_type().as_str()
                        )));
                    }
                }
            }
        }
        Value::Array(items) => {
            for &item in items {
                let s = wk.store.as_str(item).ok_or_else(|| {
                    coercion_error("expected a list of key=value strings or a dict")
                })?;
                match s.split_once('=') {
                    Some((k, v)) => {
                        out.insert(k.to_string(), v.to_string());
                    }
                    None => {
                        return Err(coercion_error(format!(
                            "'{}' is not of the form key=value",
                            s
                        )));
                    }
                }
            }
        }
        Value::Str(id) => {
            let s = wk.store.str_value(*id);
            match s.split_once('=') {
                Some((k, v)) => {
                    out.insert(k.to_string(), v.to_string());
                }
                None => {
                    return Err(coercion_error(format!("'{}' is not of the form key=value", s)));
                }
            }
        }
        other => {
            return Err(coercion_error(format!(
                "expected a list of key=value strings or a dict, got {}",
                other.obj_type().as_str()
            )));
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workspace::Workspace;

    fn setup() -> Workspace {
        let mut wk = Workspace::in_memory();
        let idx = wk.push_project("", None);
        wk.cur_project = idx;
        wk
    }

    #[test]
    fn test_files_from_strings() {
        let mut wk = setup();
        let s = wk.store.new_str("hello.c");
        let fs = files(&mut wk, s).unwrap();
        assert_eq!(fs.len(), 1);
        assert_eq!(wk.store.file_path(fs[0]), "/src/hello.c");
    }

    #[test]
    fn test_env_from_dict() {
        let mut wk = setup();
        let v = wk.store.new_str("1");
        let mut map = indexmap::IndexMap::new();
        map.insert("FOO".to_string(), v);
        let d = wk.store.new_dict(map);
        let env = environment(&mut wk, d).unwrap();
        match wk.store.get(env) {
            Value::Environment(e) => {
                assert_eq!(e.entries["FOO"].1, vec!["1".to_string()]);
            }
            _ => panic!("expected environment"),
        }
    }

    #[test]
    fn test_requirement_feature() {
        let mut wk = setup();
        let enabled = wk.store.new_feature(FeatureState::Enabled);
        let disabled = wk.store.new_feature(FeatureState::Disabled);
        let auto = wk.store.new_feature(FeatureState::Auto);
        assert_eq!(requirement(&wk, Some(enabled)), (true, false));
        assert_eq!(requirement(&wk, Some(disabled)), (false, true));
        assert_eq!(requirement(&wk, Some(auto)), (false, false));
        assert_eq!(requirement(&wk, None), (true, false));
    }

    #[test]
    fn test_string_map_rejects_mixed() {
        let mut wk = setup();
        let bad = wk.store.new_number(3);
        let arr = wk.store.new_array(vec![bad]);
        assert!(string_map(&wk, arr).is_err());
        let good = wk.store.new_str("a=b");
        let arr = wk.store.new_array(vec![good]);
        let map = string_map(&wk, arr).unwrap();
        assert_eq!(map["a"], "b");
    }
}
