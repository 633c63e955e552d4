//! Target Builders
//!
//! executable/library/shared_library/static_library/shared_module/
//! both_libraries/build_target. Source lists are classified element by
//! element; the final build name, private directory and soname are
//! platform- and version-derived.

use crate::diagnostics::{usage_error, ErrorKind, InterpError, InterpResult, Span};
use crate::functions::kernel::{dependency, ensure_configured, machine_from_native_kw};
use crate::object::{BuildTarget, MachineKind, Obj, TargetKind, Value};
use crate::typecheck::args::{ArgParser, BoundArgs};
use crate::typecheck::{
    coerce, TAG_GLOB, TAG_LISTIFY, TC_BOOL, TC_COERCIBLE_FILES, TC_COERCIBLE_INC,
    TC_DEPENDENCY, TC_DICT, TC_LINK_WITH_KW, TC_NUMBER, TC_STRING,
};
use crate::vm::{Args, Vm};
use crate::workspace::Workspace;

fn parser(fname: &str) -> ArgParser {
    ArgParser::new(fname)
        .pos("name", TC_STRING)
        .glob("sources", TAG_GLOB | TC_COERCIBLE_FILES)
        .kw("sources", TAG_LISTIFY | TC_COERCIBLE_FILES)
        .kw("dependencies", TAG_LISTIFY | TC_DEPENDENCY)
        .kw("include_directories", TAG_LISTIFY | TC_COERCIBLE_INC)
        .kw("link_with", TC_LINK_WITH_KW)
        .kw("link_whole", TC_LINK_WITH_KW)
        .kw("link_args", TAG_LISTIFY | TC_STRING)
        .kw("link_depends", TAG_LISTIFY | TC_COERCIBLE_FILES)
        .kw("c_args", TAG_LISTIFY | TC_STRING)
        .kw("cpp_args", TAG_LISTIFY | TC_STRING)
        .kw("objc_args", TAG_LISTIFY | TC_STRING)
        .kw("install", TC_BOOL)
        .kw("install_dir", TC_STRING)
        .kw("install_rpath", TC_STRING)
        .kw("install_mode", crate::typecheck::TC_INSTALL_MODE_KW)
        .kw("override_options", crate::typecheck::TC_ARRAY | TC_DICT | TC_STRING)
        .kw("native", TC_BOOL)
        .kw("version", TC_STRING)
        .kw("soversion", TC_STRING | TC_NUMBER)
        .kw("pic", TC_BOOL)
        .kw("pie", TC_BOOL)
        .kw("gnu_symbol_visibility", TC_STRING)
        .kw("objects", TAG_LISTIFY | TC_COERCIBLE_FILES)
        .kw("extra_files", TAG_LISTIFY | TC_COERCIBLE_FILES)
        .kw("build_by_default", TC_BOOL)
        .kw("build_rpath", TC_STRING)
        .kw("implicit_include_directories", TC_BOOL)
        .kw("name_prefix", TC_STRING)
        .kw("name_suffix", TC_STRING)
        .kw("target_type", TC_STRING)
}

fn is_header(path: &str) -> bool {
    for suffix in [".h", ".hh", ".hpp", ".hxx", ".inc"] {
        if path.ends_with(suffix) {
            return true;
        }
    }
    false
}

fn is_object(path: &str) -> bool {
    path.ends_with(".o") || path.ends_with(".obj")
}

fn is_linkable(path: &str) -> bool {
    for suffix in [".a", ".so", ".dylib", ".dll", ".lib"] {
        if path.ends_with(suffix) {
            return true;
        }
    }
    false
}

fn parent_dir(path: &str) -> &str {
    match path.rsplit_once('/') {
        Some((parent, _)) if !parent.is_empty() => parent,
        _ => "/",
    }
}

struct NameParts {
    build_name: String,
    soname: Option<String>,
    implib: Option<String>,
}

/// Compute the platform- and version-adjusted output filename.
fn output_names(
    wk: &Workspace,
    name: &str,
    kind: TargetKind,
    version: Option<&str>,
    soversion: Option<&str>,
) -> NameParts {
    let system = wk.machine_info(MachineKind::Host).system.as_str();
    let windows = system == "windows";
    let darwin = system == "macos" || system == "darwin";
    match kind {
        TargetKind::Executable => NameParts {
            build_name: if windows { format!("{}.exe", name) } else { name.to_string() },
            soname: None,
            implib: None,
        },
        TargetKind::StaticLibrary => NameParts {
            build_name: format!("lib{}.a", name),
            soname: None,
            implib: None,
        },
        TargetKind::SharedModule => NameParts {
            build_name: if windows {
                format!("{}.dll", name)
            } else {
                format!("lib{}.so", name)
            },
            soname: None,
            implib: None,
        },
        TargetKind::SharedLibrary => {
            let effective_soversion = soversion
                .map(|s| s.to_string())
                .or_else(|| version.map(|v| v.split('.').next().unwrap_or(v).to_string()));
            if windows {
                NameParts {
                    build_name: format!("{}.dll", name),
                    soname: None,
                    implib: Some(format!("{}.lib", name)),
                }
            } else if darwin {
                let build_name = match &effective_soversion {
                    Some(so) => format!("lib{}.{}.dylib", name, so),
                    None => format!("lib{}.dylib", name),
                };
                NameParts { build_name: build_name.clone(), soname: Some(build_name), implib: None }
            } else {
                let soname = effective_soversion
                    .as_ref()
                    .map(|so| format!("lib{}.so.{}", name, so));
                let build_name = match version {
                    Some(v) => format!("lib{}.so.{}", name, v),
                    None => match &soname {
                        Some(s) => s.clone(),
                        None => format!("lib{}.so", name),
                    },
                };
                NameParts { build_name, soname, implib: None }
            }
        }
    }
}

fn build_target_impl(
    vm: &mut Vm,
    b: &BoundArgs,
    kind: TargetKind,
    span: Span,
) -> InterpResult<Obj> {
    let name = vm.wk.store.get_str(b.pos(0)).to_string();
    if name.is_empty() || name.contains('/') {
        return Err(usage_error(format!("invalid target name '{}'", name)).at(b.pos_span(0)));
    }
    let machine = machine_from_native_kw(vm, b);

    // Collect raw source values from the glob and the sources kwarg.
    let mut raw_sources: Vec<Obj> = b.glob().iter().map(|a| a.val).collect();
    raw_sources.extend(b.kw_objs(&vm.wk.store, "sources"));

    let implicit_includes = b.kw_bool(&vm.wk.store, "implicit_include_directories", true);
    let mut sources = Vec::new();
    let mut objects = Vec::new();
    let mut extra_files = Vec::new();
    let mut link_files = Vec::new();
    let mut implicit_dirs: Vec<String> = Vec::new();
    for value in raw_sources {
        let coerced = coerce::files(vm.wk, value).map_err(|e| e.or_at(span))?;
        for file in coerced {
            let path = vm.wk.store.file_path(file).to_string();
            if is_header(&path) {
                if implicit_includes {
                    let dir = parent_dir(&path).to_string();
                    if !implicit_dirs.contains(&dir) {
                        implicit_dirs.push(dir);
                    }
                }
                extra_files.push(file);
            } else if is_object(&path) {
                objects.push(file);
            } else if is_linkable(&path) {
                link_files.push(file);
            } else {
                sources.push(file);
            }
        }
    }
    extra_files.extend(b.kw_objs(&vm.wk.store, "extra_files"));
    objects.extend(b.kw_objs(&vm.wk.store, "objects"));

    let dependencies = b.kw_objs(&vm.wk.store, "dependencies");
    let mut link_with = b.kw_objs(&vm.wk.store, "link_with");
    link_with.extend(link_files);
    let link_whole = b.kw_objs(&vm.wk.store, "link_whole");

    // Every linked or depended element must target the same machine.
    dependency::check_machine(
        vm.wk,
        machine,
        link_with.iter().chain(link_whole.iter()).chain(dependencies.iter()),
        span,
    )?;

    let include_values = b.kw_objs(&vm.wk.store, "include_directories");
    let mut include_directories = coerce::include_dirs(vm.wk, &include_values)
        .map_err(|e| e.or_at(b.kw_span("include_directories")))?;
    for dir in implicit_dirs {
        include_directories.push(vm.wk.store.push(Value::IncludeDirectory(Box::new(
            crate::object::IncludeDirectory { paths: vec![dir], is_system: false },
        ))));
    }

    let override_options = match b.kw("override_options") {
        Some(obj) => coerce::string_map(vm.wk, obj)
            .map_err(|e| {
                InterpError::new(ErrorKind::Type, e.message)
                    .at(b.kw_span("override_options"))
            })?,
        None => Default::default(),
    };

    let version = b.kw_str(&vm.wk.store, "version");
    let soversion = match b.kw("soversion") {
        Some(obj) => match vm.wk.store.get(obj) {
            Value::Str(id) => Some(vm.wk.store.str_value(*id).to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        },
        None => None,
    };
    let names = output_names(vm.wk, &name, kind, version.as_deref(), soversion.as_deref());

    let cwd = vm.wk.current_project().cwd.clone();
    let private_dir = vm.wk.build_path(&Workspace::join_rel(&cwd, &format!("{}.p", name)));
    let output_path = vm.wk.build_path(&Workspace::join_rel(&cwd, &names.build_name));

    let mut compile_args = indexmap::IndexMap::new();
    for (kw, lang) in [("c_args", "c"), ("cpp_args", "cpp"), ("objc_args", "objc")] {
        let list = b.kw_strs(&vm.wk.store, kw);
        if !list.is_empty() {
            compile_args.insert(lang.to_string(), list);
        }
    }

    let pic_default = matches!(kind, TargetKind::SharedLibrary | TargetKind::SharedModule);
    let target = BuildTarget {
        name: name.clone(),
        build_name: names.build_name,
        output_path,
        private_dir,
        kind: Some(kind),
        machine: Some(machine),
        sources,
        objects,
        extra_files,
        include_directories,
        link_with,
        link_whole,
        link_args: b.kw_strs(&vm.wk.store, "link_args"),
        compile_args,
        dependencies,
        order_deps: Vec::new(),
        rpaths: b
            .kw_str(&vm.wk.store, "install_rpath")
            .into_iter()
            .chain(b.kw_str(&vm.wk.store, "build_rpath"))
            .collect(),
        version,
        soversion,
        soname: names.soname,
        implib: names.implib,
        pic: b.kw_bool(&vm.wk.store, "pic", pic_default),
        pie: b.kw_bool(&vm.wk.store, "pie", false),
        gnu_symbol_visibility: b.kw_str(&vm.wk.store, "gnu_symbol_visibility"),
        install: b.kw_bool(&vm.wk.store, "install", false),
        install_dir: b.kw_str(&vm.wk.store, "install_dir"),
        build_by_default: b.kw_bool(&vm.wk.store, "build_by_default", true),
        override_options,
    };
    let obj = vm.wk.store.push(Value::BuildTarget(Box::new(target)));
    vm.wk.current_project_mut().targets.push(obj);
    Ok(obj)
}

fn run(vm: &mut Vm, args: &Args, fname: &str, kind: TargetKind) -> InterpResult<Obj> {
    ensure_configured(vm, args.span)?;
    let Some(b) = parser(fname).bind(vm, args)?.into_bound() else {
        return Ok(Obj::DISABLER);
    };
    if b.kw("target_type").is_some() && fname != "build_target" {
        return Err(usage_error("target_type is only valid for build_target()")
            .at(b.kw_span("target_type")));
    }
    build_target_impl(vm, &b, kind, args.span)
}

pub fn func_executable(vm: &mut Vm, _this: Obj, args: &Args) -> InterpResult<Obj> {
    run(vm, args, "executable", TargetKind::Executable)
}

pub fn func_static_library(vm: &mut Vm, _this: Obj, args: &Args) -> InterpResult<Obj> {
    run(vm, args, "static_library", TargetKind::StaticLibrary)
}

pub fn func_shared_library(vm: &mut Vm, _this: Obj, args: &Args) -> InterpResult<Obj> {
    run(vm, args, "shared_library", TargetKind::SharedLibrary)
}

pub fn func_shared_module(vm: &mut Vm, _this: Obj, args: &Args) -> InterpResult<Obj> {
    run(vm, args, "shared_module", TargetKind::SharedModule)
}

pub fn func_both_libraries(vm: &mut Vm, _this: Obj, args: &Args) -> InterpResult<Obj> {
    ensure_configured(vm, args.span)?;
    let Some(b) = parser("both_libraries").bind(vm, args)?.into_bound() else {
        return Ok(Obj::DISABLER);
    };
    let static_lib = build_target_impl(vm, &b, TargetKind::StaticLibrary, args.span)?;
    let shared_lib = build_target_impl(vm, &b, TargetKind::SharedLibrary, args.span)?;
    Ok(vm.wk.store.push(Value::BothLibs { static_lib, shared_lib }))
}

/// library() defers to the default_library option.
pub fn func_library(vm: &mut Vm, _this: Obj, args: &Args) -> InterpResult<Obj> {
    ensure_configured(vm, args.span)?;
    let default = vm
        .wk
        .string_option("default_library")
        .unwrap_or("shared")
        .to_string();
    match default.as_str() {
        "static" => {
            let Some(b) = parser("library").bind(vm, args)?.into_bound() else {
                return Ok(Obj::DISABLER);
            };
            build_target_impl(vm, &b, TargetKind::StaticLibrary, args.span)
        }
        "both" => func_both_libraries(vm, _this, args),
        _ => {
            let Some(b) = parser("library").bind(vm, args)?.into_bound() else {
                return Ok(Obj::DISABLER);
            };
            build_target_impl(vm, &b, TargetKind::SharedLibrary, args.span)
        }
    }
}

pub fn func_build_target(vm: &mut Vm, _this: Obj, args: &Args) -> InterpResult<Obj> {
    ensure_configured(vm, args.span)?;
    let Some(b) = parser("build_target").bind(vm, args)?.into_bound() else {
        return Ok(Obj::DISABLER);
    };
    let target_type = b.kw_str(&vm.wk.store, "target_type").ok_or_else(|| {
        usage_error("build_target() requires the target_type keyword").at(args.span)
    })?;
    let kind = match target_type.as_str() {
        "executable" => TargetKind::Executable,
        "static_library" => TargetKind::StaticLibrary,
        "shared_library" => TargetKind::SharedLibrary,
        "shared_module" => TargetKind::SharedModule,
        "library" => {
            return func_library(vm, _this, args);
        }
        "both_libraries" => {
            return func_both_libraries(vm, _this, args);
        }
        other => {
            return Err(usage_error(format!("unknown target_type '{}'", other))
                .at(b.kw_span("target_type")));
        }
    };
    build_target_impl(vm, &b, kind, args.span)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::InMemoryFs;

    fn linux_workspace() -> Workspace {
        let mut wk = Workspace::in_memory();
        wk.host_machine.system = "linux".to_string();
        let idx = wk.push_project("", None);
        wk.cur_project = idx;
        wk
    }

    fn eval(build_file: &str) -> Workspace {
        let fs = InMemoryFs::new().with_file("/src/meson.build", build_file);
        let mut wk = Workspace::new(Box::new(fs), "/src", "/build");
        wk.host_machine.system = "linux".to_string();
        if let Err(err) = wk.eval_root() {
            panic!("evaluation failed: {}", wk.diag.render(&err));
        }
        wk
    }

    fn first_target(wk: &Workspace) -> &BuildTarget {
        match wk.store.get(wk.projects[0].targets[0]) {
            Value::BuildTarget(bt) => bt,
            other => panic!("expected build target, got {:?}", other.obj_type()),
        }
    }

    #[test]
    fn test_source_classification() {
        assert!(is_header("api.h"));
        assert!(is_header("api.hpp"));
        assert!(!is_header("api.c"));
        assert!(is_object("main.o"));
        assert!(is_linkable("libz.a"));
        assert!(is_linkable("libz.so"));
        assert!(!is_linkable("main.c"));
    }

    #[test]
    fn test_output_names_executable() {
        let wk = linux_workspace();
        let names = output_names(&wk, "app", TargetKind::Executable, None, None);
        assert_eq!(names.build_name, "app");
        assert!(names.soname.is_none());

        let mut wk = wk;
        wk.host_machine.system = "windows".to_string();
        let names = output_names(&wk, "app", TargetKind::Executable, None, None);
        assert_eq!(names.build_name, "app.exe");
    }

    #[test]
    fn test_output_names_libraries() {
        let wk = linux_workspace();
        let names = output_names(&wk, "z", TargetKind::StaticLibrary, None, None);
        assert_eq!(names.build_name, "libz.a");

        let names =
            output_names(&wk, "z", TargetKind::SharedLibrary, Some("1.2.3"), None);
        assert_eq!(names.build_name, "libz.so.1.2.3");
        assert_eq!(names.soname.as_deref(), Some("libz.so.1"));

        let names = output_names(&wk, "z", TargetKind::SharedLibrary, None, Some("4"));
        assert_eq!(names.build_name, "libz.so.4");
        assert_eq!(names.soname.as_deref(), Some("libz.so.4"));
    }

    #[test]
    fn test_implib_on_windows() {
        let mut wk = linux_workspace();
        wk.host_machine.system = "windows".to_string();
        let names = output_names(&wk, "z", TargetKind::SharedLibrary, None, None);
        assert_eq!(names.build_name, "z.dll");
        assert_eq!(names.implib.as_deref(), Some("z.lib"));
    }

    #[test]
    fn test_headers_become_extra_files_and_include_dirs() {
        let wk = eval("project('p', 'c')\nexecutable('app', 'main.c', 'api.h')\n");
        let target = first_target(&wk);
        assert_eq!(target.sources.len(), 1);
        assert_eq!(target.extra_files.len(), 1);
        // The header's directory was collected as an implicit include dir.
        assert_eq!(target.include_directories.len(), 1);
    }

    #[test]
    fn test_library_honors_default_library_option() {
        let wk = eval("project('p', 'c')\nlibrary('thing', 'thing.c')\n");
        assert_eq!(first_target(&wk).kind, Some(TargetKind::SharedLibrary));
    }

    #[test]
    fn test_target_paths() {
        let wk = eval("project('p', 'c')\nexecutable('app', 'main.c')\n");
        let target = first_target(&wk);
        assert_eq!(target.output_path, "/build/app");
        assert_eq!(target.private_dir, "/build/app.p");
        assert_eq!(target.machine, Some(MachineKind::Host));
    }

    #[test]
    fn test_invalid_target_name_rejected() {
        let fs = InMemoryFs::new()
            .with_file("/src/meson.build", "project('p', 'c')\nexecutable('a/b', 'a.c')\n");
        let mut wk = Workspace::new(Box::new(fs), "/src", "/build");
        let err = wk.eval_root().expect_err("slash in target name");
        assert!(err.message.contains("a/b"));
    }
}
