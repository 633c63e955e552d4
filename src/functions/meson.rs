//! The `meson` Builtin Object

use crate::diagnostics::{usage_error, InterpResult};
use crate::functions::FuncImpl;
use crate::object::{MachineKind, Obj, Value};
use crate::typecheck::args::ArgParser;
use crate::typecheck::coerce;
use crate::typecheck::{
    TAG_GLOB, TC_BOOL, TC_BUILD_TARGET, TC_COMPILER, TC_CUSTOM_TARGET, TC_DEPENDENCY,
    TC_EXE, TC_EXTERNAL_PROGRAM, TC_STRING,
};
use crate::vm::{Args, Vm};

/// Version of the build-description language surface this interpreter
/// tracks.
pub const COMPAT_VERSION: &str = "1.3.0";

fn str_result(vm: &mut Vm, args: &Args, fname: &str, value: String) -> InterpResult<Obj> {
    let Some(_b) = ArgParser::new(fname).bind(vm, args)?.into_bound() else {
        return Ok(Obj::DISABLER);
    };
    Ok(vm.wk.store.new_str(&value))
}

fn func_project_name(vm: &mut Vm, _this: Obj, args: &Args) -> InterpResult<Obj> {
    let name = vm.wk.current_project().name.clone();
    str_result(vm, args, "project_name", name)
}

fn func_project_version(vm: &mut Vm, _this: Obj, args: &Args) -> InterpResult<Obj> {
    let version = vm
        .wk
        .current_project()
        .version
        .clone()
        .unwrap_or_else(|| "undefined".to_string());
    str_result(vm, args, "project_version", version)
}

fn func_project_license(vm: &mut Vm, _this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(_b) = ArgParser::new("project_license").bind(vm, args)?.into_bound() else {
        return Ok(Obj::DISABLER);
    };
    let licenses = vm.wk.current_project().license.clone();
    let items: Vec<Obj> = licenses.iter().map(|l| vm.wk.store.new_str(l)).collect();
    Ok(vm.wk.store.new_array(items))
}

fn func_version(vm: &mut Vm, _this: Obj, args: &Args) -> InterpResult<Obj> {
    str_result(vm, args, "version", COMPAT_VERSION.to_string())
}

fn func_backend(vm: &mut Vm, _this: Obj, args: &Args) -> InterpResult<Obj> {
    str_result(vm, args, "backend", "ninja".to_string())
}

fn func_current_source_dir(vm: &mut Vm, _this: Obj, args: &Args) -> InterpResult<Obj> {
    let dir = vm.wk.current_source_dir();
    str_result(vm, args, "current_source_dir", dir)
}

fn func_current_build_dir(vm: &mut Vm, _this: Obj, args: &Args) -> InterpResult<Obj> {
    let dir = vm.wk.current_build_dir();
    str_result(vm, args, "current_build_dir", dir)
}

fn func_project_source_root(vm: &mut Vm, _this: Obj, args: &Args) -> InterpResult<Obj> {
    let root = vm.wk.current_project().root_dir.clone();
    let dir = vm.wk.src_path(&root);
    str_result(vm, args, "project_source_root", dir)
}

fn func_project_build_root(vm: &mut Vm, _this: Obj, args: &Args) -> InterpResult<Obj> {
    let root = vm.wk.current_project().root_dir.clone();
    let dir = vm.wk.build_path(&root);
    str_result(vm, args, "project_build_root", dir)
}

fn func_global_source_root(vm: &mut Vm, _this: Obj, args: &Args) -> InterpResult<Obj> {
    let dir = vm.wk.source_root.clone();
    str_result(vm, args, "global_source_root", dir)
}

fn func_global_build_root(vm: &mut Vm, _this: Obj, args: &Args) -> InterpResult<Obj> {
    let dir = vm.wk.build_root.clone();
    str_result(vm, args, "global_build_root", dir)
}

fn func_is_subproject(vm: &mut Vm, _this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(_b) = ArgParser::new("is_subproject").bind(vm, args)?.into_bound() else {
        return Ok(Obj::DISABLER);
    };
    let result = vm.wk.current_project().subproject_name.is_some();
    Ok(vm.wk.store.new_bool(result))
}

fn func_is_cross_build(vm: &mut Vm, _this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(_b) = ArgParser::new("is_cross_build").bind(vm, args)?.into_bound() else {
        return Ok(Obj::DISABLER);
    };
    // No cross file support: host and build machines coincide.
    Ok(Obj::FALSE)
}

/// Register this project's dependency under a public name, consulted ahead
/// of every system lookup.
fn func_override_dependency(vm: &mut Vm, _this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(b) = ArgParser::new("override_dependency")
        .pos("name", TC_STRING)
        .pos("dep", TC_DEPENDENCY)
        .kw("native", TC_BOOL)
        .kw("static", TC_BOOL)
        .bind(vm, args)?
        .into_bound()
    else {
        return Ok(Obj::DISABLER);
    };
    let name = vm.wk.store.get_str(b.pos(0)).to_string();
    if name.is_empty() {
        return Err(usage_error("dependency name must not be empty").at(b.pos_span(0)));
    }
    let machine = if b.kw_bool(&vm.wk.store, "native", false) {
        MachineKind::Build
    } else {
        MachineKind::Host
    };
    let dep = b.pos(1);
    match b.kw("static") {
        Some(flag) => {
            let statik = vm.wk.store.as_bool(flag).unwrap_or(false);
            let key = (name.clone(), statik, machine);
            if vm.wk.dep_overrides.contains_key(&key) {
                return Err(usage_error(format!(
                    "dependency '{}' is already overridden",
                    name
                ))
                .at(b.pos_span(0)));
            }
            vm.wk.dep_overrides.insert(key, dep);
        }
        None => {
            // Unqualified overrides cover both linkages.
            for statik in [false, true] {
                let key = (name.clone(), statik, machine);
                if vm.wk.dep_overrides.contains_key(&key) {
                    return Err(usage_error(format!(
                        "dependency '{}' is already overridden",
                        name
                    ))
                    .at(b.pos_span(0)));
                }
                vm.wk.dep_overrides.insert(key, dep);
            }
        }
    }
    Ok(Obj::NULL)
}

fn func_override_find_program(vm: &mut Vm, _this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(b) = ArgParser::new("override_find_program")
        .pos("name", TC_STRING)
        .pos("program", TC_EXE)
        .bind(vm, args)?
        .into_bound()
    else {
        return Ok(Obj::DISABLER);
    };
    let name = vm.wk.store.get_str(b.pos(0)).to_string();
    if vm.wk.program_overrides.contains_key(&name) {
        return Err(usage_error(format!("program '{}' is already overridden", name))
            .at(b.pos_span(0)));
    }
    vm.wk.program_overrides.insert(name, b.pos(1));
    Ok(Obj::NULL)
}

fn func_get_compiler(vm: &mut Vm, _this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(b) = ArgParser::new("get_compiler")
        .pos("language", TC_STRING)
        .kw("native", TC_BOOL)
        .bind(vm, args)?
        .into_bound()
    else {
        return Ok(Obj::DISABLER);
    };
    let lang = vm.wk.store.get_str(b.pos(0)).to_string();
    let machine = if b.kw_bool(&vm.wk.store, "native", false) {
        MachineKind::Build
    } else {
        MachineKind::Host
    };
    match vm.wk.current_project().compilers.get(&(lang.clone(), machine)) {
        Some(&compiler) => Ok(compiler),
        None => Err(usage_error(format!(
            "no compiler for language '{}' has been configured, list it in project() or add_languages()",
            lang
        ))
        .at(b.pos_span(0))),
    }
}

fn add_script(vm: &mut Vm, args: &Args, fname: &str, postconf: bool) -> InterpResult<Obj> {
    let Some(b) = ArgParser::new(fname)
        .pos("script", TC_EXE)
        .glob("args", TAG_GLOB | TC_STRING | TC_BUILD_TARGET | TC_CUSTOM_TARGET | TC_EXTERNAL_PROGRAM)
        .bind(vm, args)?
        .into_bound()
    else {
        return Ok(Obj::DISABLER);
    };
    let mut argv = Vec::new();
    match coerce::exe_path(vm.wk, b.pos(0)) {
        Some(path) => argv.push(path),
        None => {
            return Err(usage_error("script is not an executable value").at(b.pos_span(0)));
        }
    }
    for arg in b.glob() {
        argv.push(vm.wk.store.render_plain(arg.val));
    }
    if postconf {
        vm.wk.postconf_scripts.push(argv);
    } else {
        vm.wk.install_scripts.push(argv);
    }
    Ok(Obj::NULL)
}

fn func_add_install_script(vm: &mut Vm, _this: Obj, args: &Args) -> InterpResult<Obj> {
    add_script(vm, args, "add_install_script", false)
}

fn func_add_postconf_script(vm: &mut Vm, _this: Obj, args: &Args) -> InterpResult<Obj> {
    add_script(vm, args, "add_postconf_script", true)
}

pub const METHODS: &[FuncImpl] = &[
    FuncImpl::new("add_install_script", func_add_install_script, 0),
    FuncImpl::new("add_postconf_script", func_add_postconf_script, 0),
    FuncImpl::new("backend", func_backend, TC_STRING),
    FuncImpl::new("current_build_dir", func_current_build_dir, TC_STRING),
    FuncImpl::new("current_source_dir", func_current_source_dir, TC_STRING),
    FuncImpl::new("get_compiler", func_get_compiler, TC_COMPILER),
    FuncImpl::new("global_build_root", func_global_build_root, TC_STRING),
    FuncImpl::new("global_source_root", func_global_source_root, TC_STRING),
    FuncImpl::new("is_cross_build", func_is_cross_build, TC_BOOL),
    FuncImpl::new("is_subproject", func_is_subproject, TC_BOOL),
    FuncImpl::new("override_dependency", func_override_dependency, 0),
    FuncImpl::new("override_find_program", func_override_find_program, 0),
    FuncImpl::new("project_build_root", func_project_build_root, TC_STRING),
    FuncImpl::new("project_license", func_project_license, 0),
    FuncImpl::new("project_name", func_project_name, TC_STRING),
    FuncImpl::new("project_source_root", func_project_source_root, TC_STRING),
    FuncImpl::new("project_version", func_project_version, TC_STRING),
    FuncImpl::new("version", func_version, TC_STRING),
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::ErrorKind;
    use crate::fs::InMemoryFs;
    use crate::workspace::Workspace;

    fn eval(build_file: &str) -> Workspace {
        let fs = InMemoryFs::new().with_file("/src/meson.build", build_file);
        let mut wk = Workspace::new(Box::new(fs), "/src", "/build");
        if let Err(err) = wk.eval_root() {
            panic!("evaluation failed: {}", wk.diag.render(&err));
        }
        wk
    }

    fn var(wk: &Workspace, name: &str) -> Obj {
        wk.projects[0].lookup_var(name).expect("variable defined")
    }

    #[test]
    fn test_project_identity() {
        let wk = eval(
            "project('demo', version: '1.2', license: 'MIT')\n\
             n = meson.project_name()\n\
             v = meson.project_version()\n\
             l = meson.project_license()\n\
             sub = meson.is_subproject()\n",
        );
        assert_eq!(wk.store.as_str(var(&wk, "n")), Some("demo"));
        assert_eq!(wk.store.as_str(var(&wk, "v")), Some("1.2"));
        let licenses = wk.store.as_array(var(&wk, "l")).unwrap();
        assert_eq!(wk.store.as_str(licenses[0]), Some("MIT"));
        assert_eq!(wk.store.as_bool(var(&wk, "sub")), Some(false));
    }

    #[test]
    fn test_directory_accessors() {
        let wk = eval(
            "project('p')\n\
             s = meson.current_source_dir()\n\
             b = meson.current_build_dir()\n\
             gs = meson.global_source_root()\n",
        );
        assert_eq!(wk.store.as_str(var(&wk, "s")), Some("/src"));
        assert_eq!(wk.store.as_str(var(&wk, "b")), Some("/build"));
        assert_eq!(wk.store.as_str(var(&wk, "gs")), Some("/src"));
    }

    #[test]
    fn test_get_compiler() {
        let wk = eval("project('p', 'c')\nid = meson.get_compiler('c').get_id()\n");
        assert_eq!(wk.store.as_str(var(&wk, "id")), Some("generic"));
    }

    #[test]
    fn test_get_compiler_unknown_language() {
        let fs = InMemoryFs::new().with_file(
            "/src/meson.build",
            "project('p')\nmeson.get_compiler('rust')\n",
        );
        let mut wk = Workspace::new(Box::new(fs), "/src", "/build");
        let err = wk.eval_root().expect_err("no compiler configured");
        assert_eq!(err.kind, ErrorKind::Usage);
        assert!(err.message.contains("rust"));
    }

    #[test]
    fn test_override_find_program_wins_search() {
        let wk = eval(
            "project('p', 'c')\n\
             exe = executable('gen', 'gen.c')\n\
             meson.override_find_program('gen', exe)\n\
             found = find_program('gen')\n",
        );
        assert_eq!(var(&wk, "found"), var(&wk, "exe"));
    }

    #[test]
    fn test_override_find_program_twice_rejected() {
        let fs = InMemoryFs::new().with_file(
            "/src/meson.build",
            "project('p', 'c')\n\
             exe = executable('gen', 'gen.c')\n\
             meson.override_find_program('gen', exe)\n\
             meson.override_find_program('gen', exe)\n",
        );
        let mut wk = Workspace::new(Box::new(fs), "/src", "/build");
        let err = wk.eval_root().expect_err("double override");
        assert!(err.message.contains("already overridden"));
    }

    #[test]
    fn test_override_dependency_twice_rejected() {
        let fs = InMemoryFs::new().with_file(
            "/src/meson.build",
            "project('p')\n\
             d = declare_dependency()\n\
             meson.override_dependency('z', d)\n\
             meson.override_dependency('z', d)\n",
        );
        let mut wk = Workspace::new(Box::new(fs), "/src", "/build");
        let err = wk.eval_root().expect_err("double override");
        assert!(err.message.contains("already overridden"));
    }

    #[test]
    fn test_install_and_postconf_scripts_recorded() {
        let wk = eval(
            "project('p')\n\
             meson.add_install_script('post.sh', '--verbose')\n\
             meson.add_postconf_script('conf.sh')\n",
        );
        assert_eq!(wk.install_scripts, vec![vec!["post.sh".to_string(), "--verbose".to_string()]]);
        assert_eq!(wk.postconf_scripts, vec![vec!["conf.sh".to_string()]]);
    }

    #[test]
    fn test_version_reports_compat_surface() {
        let wk = eval("project('p')\nv = meson.version()\n");
        assert_eq!(wk.store.as_str(var(&wk, "v")), Some(COMPAT_VERSION));
    }
}
