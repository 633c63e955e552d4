//! Subproject Evaluation
//!
//! Resolves wrap files, evaluates nested projects in their own project
//! state, caches results by name, and detects circular references through
//! an in-progress stack.

use crate::diagnostics::{usage_error, ErrorKind, InterpError, InterpResult, Span};
use crate::functions::kernel::{ensure_configured, options};
use crate::object::{Obj, SubprojectData, Value};
use crate::typecheck::args::ArgParser;
use crate::typecheck::{coerce, TAG_LISTIFY, TC_ARRAY, TC_DICT, TC_REQUIRED_KW, TC_STRING};
use crate::version;
use crate::vm::{Args, Vm};
use crate::workspace::{Workspace, BUILD_FILE};

/// Minimal ini-shape wrap file: sections with key = value lines.
#[derive(Debug, Default)]
struct WrapFile {
    directory: Option<String>,
    provides_deps: Vec<(String, Option<String>)>,
    provides_programs: Vec<String>,
}

fn parse_wrap(text: &str) -> WrapFile {
    let mut wrap = WrapFile::default();
    let mut section = String::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            section = name.to_string();
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            let (key, value) = (key.trim(), value.trim());
            match section.as_str() {
                "wrap-file" | "wrap-git" => {
                    if key == "directory" {
                        wrap.directory = Some(value.to_string());
                    }
                }
                "provide" => match key {
                    "dependency_names" => {
                        for name in value.split(',') {
                            let name = name.trim();
                            if !name.is_empty() {
                                wrap.provides_deps.push((name.to_string(), None));
                            }
                        }
                    }
                    "program_names" => {
                        for name in value.split(',') {
                            let name = name.trim();
                            if !name.is_empty() {
                                wrap.provides_programs.push(name.to_string());
                            }
                        }
                    }
                    _ => {
                        wrap.provides_deps
                            .push((key.to_string(), Some(value.to_string())));
                    }
                },
                _ => {}
            }
        }
    }
    wrap
}

fn subprojects_root(wk: &Workspace) -> String {
    let root = &wk.projects[0];
    Workspace::join_rel(&root.root_dir, &root.subproject_dir)
}

/// Scan the subprojects directory for wrap files once per run, filling the
/// provide tables of the root project.
pub fn ensure_wraps_scanned(wk: &mut Workspace) {
    if wk.projects.is_empty() || wk.projects[0].wraps_scanned {
        return;
    }
    wk.projects[0].wraps_scanned = true;
    let dir = wk.src_path(&subprojects_root(wk));
    let entries = wk.fs.list_dir(&dir);
    for entry in entries {
        let Some(wrap_name) = entry.strip_suffix(".wrap") else {
            continue;
        };
        let path = format!("{}/{}", dir, entry);
        let Ok(text) = wk.fs.read_to_string(&path) else {
            continue;
        };
        let wrap = parse_wrap(&text);
        let root = &mut wk.projects[0];
        if let Some(directory) = wrap.directory {
            root.wrap_dirs.insert(wrap_name.to_string(), directory);
        }
        for (dep, _var) in wrap.provides_deps {
            root.wrap_provides.insert(dep, wrap_name.to_string());
        }
        for program in wrap.provides_programs {
            root.wrap_provides_programs.insert(program, wrap_name.to_string());
        }
    }
}

/// Directory of a subproject's sources, honoring wrap directory
/// overrides. Relative to the source root.
fn subproject_source_dir(wk: &Workspace, name: &str) -> String {
    let base = subprojects_root(wk);
    let dir = wk.projects[0]
        .wrap_dirs
        .get(name)
        .cloned()
        .unwrap_or_else(|| name.to_string());
    Workspace::join_rel(&base, &dir)
}

pub fn subproject_exists(wk: &Workspace, name: &str) -> bool {
    if wk.projects.is_empty() {
        return false;
    }
    let dir = subproject_source_dir(wk, name);
    let build_file = wk.src_path(&Workspace::join_rel(&dir, BUILD_FILE));
    if wk.fs.is_file(&build_file) {
        return true;
    }
    let wrap = wk.src_path(&format!("{}/{}.wrap", subprojects_root(wk), name));
    wk.fs.is_file(&wrap)
}

/// Evaluate (or fetch from cache) the named subproject. Returns a
/// subproject value; `found` is false when sources are absent.
pub fn eval_subproject(
    vm: &mut Vm,
    name: &str,
    default_options: &[(String, String)],
    span: Span,
) -> InterpResult<Obj> {
    ensure_wraps_scanned(vm.wk);

    if let Some(&cached) = vm.wk.subprojects.get(name) {
        return Ok(cached);
    }
    if vm.wk.subproject_stack.iter().any(|n| n == name) {
        return Err(InterpError::new(
            ErrorKind::CircularSubproject,
            format!(
                "circular subproject reference: {} -> {}",
                vm.wk.subproject_stack.join(" -> "),
                name
            ),
        )
        .at(span));
    }

    let dir = subproject_source_dir(vm.wk, name);
    let build_file = vm.wk.src_path(&Workspace::join_rel(&dir, BUILD_FILE));
    if !vm.wk.fs.is_file(&build_file) {
        // Sources are not materialized; fetching goes through the external
        // fetcher which this core does not drive.
        let missing = vm.wk.store.push(Value::Subproject(Box::new(SubprojectData {
            name: name.to_string(),
            project_index: None,
            found: false,
        })));
        vm.wk.subprojects.insert(name.to_string(), missing);
        return Ok(missing);
    }

    let index = vm.wk.push_project(&dir, Some(name.to_string()));
    {
        let project = &mut vm.wk.projects[index];
        project.default_options = default_options.iter().cloned().collect();
    }

    let saved_project = vm.wk.cur_project;
    vm.wk.cur_project = index;
    vm.wk.subproject_stack.push(name.to_string());
    for (key, value) in default_options {
        options::apply_default_option(vm.wk, key, value, span)?;
    }
    let result = vm.wk.eval_build_file(&dir);
    vm.wk.subproject_stack.pop();
    vm.wk.cur_project = saved_project;
    result?;

    if !vm.wk.projects[index].configured {
        return Err(usage_error(format!(
            "subproject '{}' did not call project()",
            name
        ))
        .at(span));
    }

    let sub = vm.wk.store.push(Value::Subproject(Box::new(SubprojectData {
        name: name.to_string(),
        project_index: Some(index),
        found: true,
    })));
    vm.wk.subprojects.insert(name.to_string(), sub);
    Ok(sub)
}

/// Resolve a program through wrap provides: evaluate the providing
/// subproject and consult the override table it filled.
pub fn program_from_wrap(
    vm: &mut Vm,
    names: &[String],
    span: Span,
) -> InterpResult<Option<Obj>> {
    ensure_wraps_scanned(vm.wk);
    for name in names {
        let provider = vm.wk.projects[0].wrap_provides_programs.get(name).cloned();
        if let Some(subp_name) = provider {
            let sub = eval_subproject(vm, &subp_name, &[], span)?;
            let found = match vm.wk.store.get(sub) {
                Value::Subproject(sp) => sp.found,
                _ => false,
            };
            if found {
                if let Some(&program) = vm.wk.program_overrides.get(name) {
                    return Ok(Some(program));
                }
            }
        }
    }
    Ok(None)
}

pub fn func_subproject(vm: &mut Vm, _this: Obj, args: &Args) -> InterpResult<Obj> {
    ensure_configured(vm, args.span)?;
    let Some(b) = ArgParser::new("subproject")
        .pos("name", TC_STRING)
        .kw("required", TC_REQUIRED_KW)
        .kw("default_options", TC_ARRAY | TC_DICT | TC_STRING)
        .kw("version", TAG_LISTIFY | TC_STRING)
        .bind(vm, args)?
        .into_bound()
    else {
        return Ok(Obj::DISABLER);
    };
    let name = vm.wk.store.get_str(b.pos(0)).to_string();
    if name.is_empty() || name.contains("..") || name.contains('/') {
        return Err(usage_error(format!("invalid subproject name '{}'", name))
            .at(b.pos_span(0)));
    }
    let default_options: Vec<(String, String)> = match b.kw("default_options") {
        Some(obj) => coerce::string_map(vm.wk, obj)
            .map_err(|e| e.or_at(b.kw_span("default_options")))?
            .into_iter()
            .collect(),
        None => Vec::new(),
    };
    let (required, disabled) = coerce::requirement(vm.wk, b.kw("required"));
    if disabled {
        return Ok(vm.wk.store.push(Value::Subproject(Box::new(SubprojectData {
            name,
            project_index: None,
            found: false,
        }))));
    }

    let sub = eval_subproject(vm, &name, &default_options, args.span)?;
    let (found, project_index) = match vm.wk.store.get(sub) {
        Value::Subproject(sp) => (sp.found, sp.project_index),
        _ => (false, None),
    };
    if !found && required {
        return Err(InterpError::new(
            ErrorKind::DepNotFound,
            format!("subproject '{}' is not available", name),
        )
        .at(b.pos_span(0)));
    }

    let constraints = b.kw_strs(&vm.wk.store, "version");
    if found && !constraints.is_empty() {
        let actual = project_index
            .and_then(|i| vm.wk.projects[i].version.clone())
            .unwrap_or_default();
        if !version::check_all(&actual, &constraints) {
            return Err(InterpError::new(
                ErrorKind::VersionMismatch,
                format!(
                    "subproject '{}' version {} does not satisfy {:?}",
                    name, actual, constraints
                ),
            )
            .at(b.pos_span(0)));
        }
    }
    Ok(sub)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::InMemoryFs;

    #[test]
    fn test_parse_wrap_sections() {
        let wrap = parse_wrap(
            "# comment\n\
             [wrap-file]\n\
             directory = zlib-1.3\n\
             source_url = ignored\n\
             [provide]\n\
             dependency_names = zlib, libz\n\
             program_names = zlibtool\n\
             zspecial = zspecial_dep\n",
        );
        assert_eq!(wrap.directory.as_deref(), Some("zlib-1.3"));
        assert_eq!(wrap.provides_deps.len(), 3);
        assert!(wrap
            .provides_deps
            .iter()
            .any(|(name, var)| name == "zlib" && var.is_none()));
        assert!(wrap
            .provides_deps
            .iter()
            .any(|(name, var)| name == "zspecial" && var.as_deref() == Some("zspecial_dep")));
        assert_eq!(wrap.provides_programs, ["zlibtool"]);
    }

    #[test]
    fn test_wrap_scan_fills_provide_tables() {
        let fs = InMemoryFs::new()
            .with_file("/src/meson.build", "project('p')\n")
            .with_file(
                "/src/subprojects/zlib.wrap",
                "[wrap-file]\ndirectory = zlib-1.3\n[provide]\ndependency_names = zlib\n",
            );
        let mut wk = Workspace::new(Box::new(fs), "/src", "/build");
        wk.eval_root().unwrap();
        ensure_wraps_scanned(&mut wk);
        assert_eq!(wk.projects[0].wrap_provides.get("zlib").map(|s| s.as_str()), Some("zlib"));
        assert_eq!(
            wk.projects[0].wrap_dirs.get("zlib").map(|s| s.as_str()),
            Some("zlib-1.3")
        );
    }

    #[test]
    fn test_subproject_exists() {
        let fs = InMemoryFs::new()
            .with_file("/src/meson.build", "project('p')\n")
            .with_file("/src/subprojects/here/meson.build", "project('here')\n");
        let mut wk = Workspace::new(Box::new(fs), "/src", "/build");
        wk.eval_root().unwrap();
        assert!(subproject_exists(&wk, "here"));
        assert!(!subproject_exists(&wk, "gone"));
    }

    #[test]
    fn test_missing_subproject_is_not_found_when_optional() {
        let fs = InMemoryFs::new().with_file(
            "/src/meson.build",
            "project('p')\nsp = subproject('gone', required: false)\nok = sp.found()\n",
        );
        let mut wk = Workspace::new(Box::new(fs), "/src", "/build");
        wk.eval_root().unwrap();
        let ok = wk.projects[0].lookup_var("ok").unwrap();
        assert_eq!(wk.store.as_bool(ok), Some(false));
    }

    #[test]
    fn test_subproject_version_constraint() {
        let fs = InMemoryFs::new()
            .with_file(
                "/src/meson.build",
                "project('p')\nsubproject('lib', version: '>= 3.0')\n",
            )
            .with_file(
                "/src/subprojects/lib/meson.build",
                "project('lib', version: '2.0')\n",
            );
        let mut wk = Workspace::new(Box::new(fs), "/src", "/build");
        let err = wk.eval_root().expect_err("version constraint unmet");
        assert_eq!(err.kind, ErrorKind::VersionMismatch);
    }

    #[test]
    fn test_invalid_subproject_name_rejected() {
        let fs = InMemoryFs::new()
            .with_file("/src/meson.build", "project('p')\nsubproject('../escape')\n");
        let mut wk = Workspace::new(Box::new(fs), "/src", "/build");
        let err = wk.eval_root().expect_err("path escape");
        assert!(err.message.contains("escape"));
    }
}
