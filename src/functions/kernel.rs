//! Kernel Functions
//!
//! The top-level vocabulary of build descriptions. Target builders,
//! dependency resolution, configure_file, install rules, options and
//! subprojects live in the submodules; everything else is here.

pub mod build_target;
pub mod configure_file;
pub mod custom_target;
pub mod dependency;
pub mod install;
pub mod options;
pub mod subproject;

use indexmap::IndexMap;

use crate::diagnostics::{usage_error, ErrorKind, InterpError, InterpResult, Span};
use crate::functions::{flags, FuncImpl};
use crate::object::{
    AliasTarget, CompilerObj, ConfigurationData, CustomTarget, DepKind, Dependency,
    EnvironmentData, ExternalProgram, IncludeDirectory, MachineKind, Obj, RunResult,
    TestDescriptor, Value,
};
use crate::typecheck::args::{ArgParser, BoundArgs};
use crate::typecheck::{
    coerce, TAG_GLOB, TAG_LISTIFY, TC_ANY, TC_ARRAY, TC_BOOL, TC_COERCIBLE_ENV,
    TC_COERCIBLE_FILES, TC_DEPENDENCY, TC_DEPENDS_KW, TC_DICT, TC_EXE, TC_FILE,
    TC_MESSAGE_VARARGS, TC_NUMBER, TC_REQUIRED_KW, TC_STRING,
};
use crate::version;
use crate::vm::{Args, Vm};
use crate::workspace::{LanguageMode, TestSetup, Workspace, OPTION_FILES};

/// Everything except project() and a handful of introspective helpers
/// requires a configured project.
pub fn ensure_configured(vm: &Vm, span: Span) -> InterpResult<()> {
    if !vm.wk.current_project().configured {
        return Err(usage_error("project() must be the first function called").at(span));
    }
    Ok(())
}

pub fn machine_from_native_kw(vm: &Vm, b: &BoundArgs) -> MachineKind {
    if b.kw_bool(&vm.wk.store, "native", false) {
        MachineKind::Build
    } else {
        MachineKind::Host
    }
}

fn probe_language(vm: &mut Vm, lang: &str, span: Span, required: bool) -> InterpResult<bool> {
    let mut ok = true;
    for machine in [MachineKind::Build, MachineKind::Host] {
        let key = (lang.to_string(), machine);
        if vm.wk.current_project().compilers.contains_key(&key) {
            continue;
        }
        match vm.wk.toolchain.probe(lang, machine) {
            Some(probe) => {
                let compiler = vm.wk.store.push(Value::Compiler(Box::new(CompilerObj {
                    lang: lang.to_string(),
                    id: probe.id,
                    version: probe.version,
                    cmd: probe.cmd,
                    machine,
                })));
                vm.wk.current_project_mut().compilers.insert(key, compiler);
            }
            None => {
                if required {
                    return Err(usage_error(format!(
                        "no compiler found for language '{}'",
                        lang
                    ))
                    .at(span));
                }
                ok = false;
            }
        }
    }
    Ok(ok)
}

// ---- project ----

fn func_project(vm: &mut Vm, _this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(b) = ArgParser::new("project")
        .pos("name", TC_STRING)
        .glob("languages", TAG_GLOB | TC_STRING)
        .kw("version", TC_STRING | TC_FILE | TC_ARRAY)
        .kw("license", TAG_LISTIFY | TC_STRING)
        .kw("license_files", TAG_LISTIFY | TC_STRING)
        .kw("default_options", TC_ARRAY | TC_DICT | TC_STRING)
        .kw("meson_version", TC_STRING)
        .kw("subproject_dir", TC_STRING)
        .bind(vm, args)?
        .into_bound()
    else {
        return Ok(Obj::DISABLER);
    };

    if vm.wk.current_project().configured {
        return Err(usage_error("project() can only be called once per project").at(args.span));
    }

    let name = vm.wk.store.get_str(b.pos(0)).to_string();
    if name.is_empty() {
        return Err(usage_error("project name must not be empty").at(b.pos_span(0)));
    }

    if let Some(required) = b.kw_str(&vm.wk.store, "meson_version") {
        if !version::check_constraint(crate::functions::meson::COMPAT_VERSION, &required) {
            return Err(InterpError::new(
                ErrorKind::VersionMismatch,
                format!(
                    "project requires version {} but this is {}",
                    required,
                    crate::functions::meson::COMPAT_VERSION
                ),
            )
            .at(b.kw_span("meson_version")));
        }
        vm.wk.current_project_mut().meson_version = Some(required);
    }

    // A files() result arrives as a one-element array.
    let version_value = b.kw("version").map(|obj| match vm.wk.store.get(obj) {
        Value::Array(items) if items.len() == 1 => items[0],
        _ => obj,
    });
    let version = match version_value {
        Some(obj) => match vm.wk.store.get(obj).clone() {
            Value::Str(id) => Some(vm.wk.store.str_value(id).to_string()),
            Value::File(id) => {
                let path = vm.wk.store.str_value(id).to_string();
                let text = vm.wk.fs.read_to_string(&path).map_err(|e| {
                    InterpError::new(ErrorKind::Io, e.to_string()).at(b.kw_span("version"))
                })?;
                Some(text.lines().next().unwrap_or("").trim().to_string())
            }
            _ => {
                return Err(usage_error("version must be a string or a file")
                    .at(b.kw_span("version")));
            }
        },
        None => None,
    };

    let license = b.kw_strs(&vm.wk.store, "license");
    if let Some(subproject_dir) = b.kw_str(&vm.wk.store, "subproject_dir") {
        vm.wk.current_project_mut().subproject_dir = subproject_dir;
    }

    // default_options lose to explicit command-line overrides.
    if let Some(defaults) = b.kw("default_options") {
        let map = coerce::string_map(vm.wk, defaults).map_err(|e| {
            e.or_at(b.kw_span("default_options"))
        })?;
        let span = b.kw_span("default_options");
        for (key, value) in &map {
            options::apply_default_option(vm.wk, key, value, span)?;
        }
        vm.wk.current_project_mut().default_options = map.into_iter().collect();
    }
    options::apply_builtin_overrides(vm.wk, args.span)?;

    {
        let project = vm.wk.current_project_mut();
        project.name = name;
        project.version = version;
        project.license = license;
        project.configured = true;
    }

    // The option file, when present, runs before any language probing so
    // feature gates can influence it.
    let root = vm.wk.current_project().root_dir.clone();
    for candidate in OPTION_FILES {
        let rel = Workspace::join_rel(&root, candidate);
        let abs = vm.wk.src_path(&rel);
        if vm.wk.fs.is_file(&abs) {
            let saved_mode = vm.wk.lang_mode;
            vm.wk.lang_mode = LanguageMode::Opts;
            let result = vm.wk.eval_file(&rel);
            vm.wk.lang_mode = saved_mode;
            result?;
            break;
        }
    }

    for lang in b.glob().to_vec() {
        let lang_name = vm.wk.store.get_str(lang.val).to_string();
        probe_language(vm, &lang_name, lang.span, true)?;
    }

    let project = vm.wk.current_project();
    let banner = format!(
        "Project name: {}\nProject version: {}",
        project.name,
        project.version.as_deref().unwrap_or("undefined")
    );
    vm.wk.diag.message(&banner);
    Ok(Obj::NULL)
}

fn func_add_languages(vm: &mut Vm, _this: Obj, args: &Args) -> InterpResult<Obj> {
    ensure_configured(vm, args.span)?;
    let Some(b) = ArgParser::new("add_languages")
        .glob("languages", TAG_GLOB | TC_STRING)
        .kw("required", TC_REQUIRED_KW)
        .kw("native", TC_BOOL)
        .bind(vm, args)?
        .into_bound()
    else {
        return Ok(Obj::DISABLER);
    };
    let (required, disabled) = coerce::requirement(vm.wk, b.kw("required"));
    if disabled {
        return Ok(Obj::FALSE);
    }
    let mut all_ok = true;
    for lang in b.glob().to_vec() {
        let lang_name = vm.wk.store.get_str(lang.val).to_string();
        if !probe_language(vm, &lang_name, lang.span, required)? {
            all_ok = false;
        }
    }
    Ok(vm.wk.store.new_bool(all_ok))
}

// ---- messaging ----

fn render_varargs(vm: &Vm, b: &BoundArgs) -> String {
    b.glob()
        .iter()
        .map(|a| vm.wk.store.render_plain(a.val))
        .collect::<Vec<_>>()
        .join(" ")
}

fn func_message(vm: &mut Vm, _this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(b) = ArgParser::new("message")
        .glob("text", TC_MESSAGE_VARARGS)
        .bind(vm, args)?
        .into_bound()
    else {
        return Ok(Obj::DISABLER);
    };
    let text = format!("Message: {}", render_varargs(vm, &b));
    vm.wk.diag.message(&text);
    Ok(Obj::NULL)
}

fn func_debug(vm: &mut Vm, _this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(b) = ArgParser::new("debug")
        .glob("text", TC_MESSAGE_VARARGS)
        .bind(vm, args)?
        .into_bound()
    else {
        return Ok(Obj::DISABLER);
    };
    let text = format!("Debug: {}", render_varargs(vm, &b));
    vm.wk.diag.message(&text);
    Ok(Obj::NULL)
}

fn func_warning(vm: &mut Vm, _this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(b) = ArgParser::new("warning")
        .glob("text", TC_MESSAGE_VARARGS)
        .bind(vm, args)?
        .into_bound()
    else {
        return Ok(Obj::DISABLER);
    };
    let text = render_varargs(vm, &b);
    vm.wk.diag.warning(Some(args.span), &text);
    Ok(Obj::NULL)
}

fn func_error(vm: &mut Vm, _this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(b) = ArgParser::new("error")
        .glob("text", TC_MESSAGE_VARARGS)
        .bind(vm, args)?
        .into_bound()
    else {
        return Ok(Obj::DISABLER);
    };
    Err(InterpError::new(ErrorKind::Assert, render_varargs(vm, &b)).at(args.span))
}

fn func_assert(vm: &mut Vm, _this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(b) = ArgParser::new("assert")
        .pos("condition", TC_BOOL)
        .opt_pos("message", TC_STRING)
        .bind(vm, args)?
        .into_bound()
    else {
        return Ok(Obj::DISABLER);
    };
    let ok = vm.wk.store.as_bool(b.pos(0)).expect("typechecked");
    if ok {
        return Ok(Obj::NULL);
    }
    let message = b
        .opt_pos(1)
        .map(|a| vm.wk.store.get_str(a.val).to_string())
        .unwrap_or_else(|| "assertion failed".to_string());
    Err(InterpError::new(ErrorKind::Assert, message).at(args.span))
}

fn func_summary(vm: &mut Vm, _this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(b) = ArgParser::new("summary")
        .pos("key_or_dict", TC_STRING | TC_DICT)
        .opt_pos("value", TC_ANY)
        .kw("section", TC_STRING)
        .kw("bool_yn", TC_BOOL)
        .kw("list_sep", TC_STRING)
        .bind(vm, args)?
        .into_bound()
    else {
        return Ok(Obj::DISABLER);
    };
    let section = b.kw_str(&vm.wk.store, "section").unwrap_or_default();
    let mut entries: Vec<(String, Obj)> = Vec::new();
    match vm.wk.store.get(b.pos(0)).clone() {
        Value::Dict(map) => {
            for (k, v) in map {
                entries.push((k, v));
            }
        }
        Value::Str(id) => {
            let key = vm.wk.store.str_value(id).to_string();
            let value = b
                .opt_pos(1)
                .map(|a| a.val)
                .ok_or_else(|| usage_error("summary(key) requires a value").at(args.span))?;
            entries.push((key, value));
        }
        _ => unreachable!("typechecked"),
    }
    let project = vm.wk.current_project_mut();
    let section_entries = project.summary.entry(section).or_default();
    section_entries.extend(entries);
    Ok(Obj::NULL)
}

// ---- values & variables ----

fn func_files(vm: &mut Vm, _this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(b) = ArgParser::new("files")
        .glob("paths", TAG_GLOB | TC_STRING | TC_FILE)
        .bind(vm, args)?
        .into_bound()
    else {
        return Ok(Obj::DISABLER);
    };
    let mut out = Vec::new();
    for arg in b.glob() {
        let mut coerced = coerce::files(vm.wk, arg.val).map_err(|e| e.or_at(arg.span))?;
        out.append(&mut coerced);
    }
    Ok(vm.wk.store.new_array(out))
}

fn func_include_directories(vm: &mut Vm, _this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(b) = ArgParser::new("include_directories")
        .glob("dirs", TAG_GLOB | TC_STRING)
        .kw("is_system", TC_BOOL)
        .bind(vm, args)?
        .into_bound()
    else {
        return Ok(Obj::DISABLER);
    };
    let is_system = b.kw_bool(&vm.wk.store, "is_system", false);
    let mut paths = Vec::new();
    for arg in b.glob() {
        let rel = vm.wk.store.get_str(arg.val).to_string();
        paths.push(vm.wk.resolve_source_path(&rel));
    }
    Ok(vm
        .wk
        .store
        .push(Value::IncludeDirectory(Box::new(IncludeDirectory { paths, is_system }))))
}

fn func_join_paths(vm: &mut Vm, _this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(b) = ArgParser::new("join_paths")
        .glob("parts", TAG_GLOB | TC_STRING)
        .bind(vm, args)?
        .into_bound()
    else {
        return Ok(Obj::DISABLER);
    };
    let mut joined = String::new();
    for arg in b.glob() {
        let part = vm.wk.store.get_str(arg.val);
        joined = crate::vm::ops::path_join(&joined, part);
    }
    Ok(vm.wk.store.new_str(&joined))
}

fn func_get_variable(vm: &mut Vm, _this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(b) = ArgParser::new("get_variable")
        .pos("name", TC_STRING | crate::typecheck::TC_DISABLER)
        .opt_pos("fallback", TC_ANY | crate::typecheck::TC_DISABLER)
        .disabler_immune()
        .bind(vm, args)?
        .into_bound()
    else {
        return Ok(Obj::DISABLER);
    };
    if b.pos(0).is_disabler() {
        return Ok(Obj::DISABLER);
    }
    let name = vm.wk.store.get_str(b.pos(0)).to_string();
    match vm.wk.lookup_var(&name) {
        Some(value) => Ok(value),
        None => match b.opt_pos(1) {
            Some(fallback) => Ok(fallback.val),
            None => Err(InterpError::new(
                ErrorKind::UnknownVariable,
                format!("variable '{}' is not defined", name),
            )
            .at(b.pos_span(0))),
        },
    }
}

fn func_set_variable(vm: &mut Vm, _this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(b) = ArgParser::new("set_variable")
        .pos("name", TC_STRING)
        .pos("value", TC_ANY | crate::typecheck::TC_DISABLER)
        .disabler_immune()
        .bind(vm, args)?
        .into_bound()
    else {
        return Ok(Obj::DISABLER);
    };
    let name = vm.wk.store.get_str(b.pos(0)).to_string();
    vm.wk.set_var(&name, b.pos(1));
    Ok(Obj::NULL)
}

fn func_is_variable(vm: &mut Vm, _this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(b) = ArgParser::new("is_variable")
        .pos("name", TC_STRING | crate::typecheck::TC_DISABLER)
        .disabler_immune()
        .bind(vm, args)?
        .into_bound()
    else {
        return Ok(Obj::DISABLER);
    };
    if b.pos(0).is_disabler() {
        return Ok(Obj::DISABLER);
    }
    let name = vm.wk.store.get_str(b.pos(0)).to_string();
    let exists = vm.wk.lookup_var(&name).is_some();
    Ok(vm.wk.store.new_bool(exists))
}

fn func_unset_variable(vm: &mut Vm, _this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(b) = ArgParser::new("unset_variable")
        .pos("name", TC_STRING | crate::typecheck::TC_DISABLER)
        .disabler_immune()
        .bind(vm, args)?
        .into_bound()
    else {
        return Ok(Obj::DISABLER);
    };
    if b.pos(0).is_disabler() {
        return Ok(Obj::DISABLER);
    }
    let name = vm.wk.store.get_str(b.pos(0)).to_string();
    vm.wk.current_project_mut().unset_var(&name);
    Ok(Obj::NULL)
}

// ---- modules, programs, processes ----

fn func_import(vm: &mut Vm, _this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(b) = ArgParser::new("import")
        .pos("name", TC_STRING)
        .kw("required", TC_REQUIRED_KW)
        .kw("disabler", TC_BOOL)
        .bind(vm, args)?
        .into_bound()
    else {
        return Ok(Obj::DISABLER);
    };
    let name = vm.wk.store.get_str(b.pos(0)).to_string();
    let known = crate::functions::modules::KNOWN_MODULES.contains(&name.as_str());
    let (required, disabled) = coerce::requirement(vm.wk, b.kw("required"));
    if !known || disabled {
        if required && !disabled {
            return Err(InterpError::new(
                ErrorKind::UnknownModule,
                format!("module '{}' does not exist", name),
            )
            .at(b.pos_span(0)));
        }
        if b.kw_bool(&vm.wk.store, "disabler", false) {
            return Ok(Obj::DISABLER);
        }
        return Ok(vm.wk.store.push(Value::Module(Box::new(crate::object::ModuleData {
            name,
            found: false,
            exports: IndexMap::new(),
        }))));
    }
    Ok(vm.wk.store.push(Value::Module(Box::new(crate::object::ModuleData {
        name,
        found: true,
        exports: IndexMap::new(),
    }))))
}

pub fn find_program_impl(
    vm: &mut Vm,
    names: &[String],
    dirs: &[String],
    version_constraints: &[String],
    span: Span,
) -> InterpResult<Option<Obj>> {
    for name in names {
        // Overrides registered by subprojects come first.
        if let Some(&overridden) = vm.wk.program_overrides.get(name) {
            return Ok(Some(overridden));
        }
    }

    let wrap_mode = vm
        .wk
        .string_option("wrap_mode")
        .unwrap_or("default")
        .to_string();

    // Forced wrap fallback beats every disk search.
    if wrap_mode == "forcefallback" {
        if let Some(found) = subproject::program_from_wrap(vm, names, span)? {
            return Ok(Some(found));
        }
    }

    for name in names {
        let mut candidate: Option<String> = None;
        for dir in dirs {
            let path = format!("{}/{}", dir.trim_end_matches('/'), name);
            if vm.wk.fs.is_file(&path) {
                candidate = Some(path);
                break;
            }
        }
        if candidate.is_none() {
            let in_tree = vm.wk.resolve_source_path(name);
            if vm.wk.fs.is_file(&in_tree) {
                candidate = Some(in_tree);
            }
        }
        if candidate.is_none() {
            candidate = vm.wk.runner.find_on_path(name);
        }
        if let Some(path) = candidate {
            let reported = vm.wk.runner.version_of(&path);
            if !version_constraints.is_empty() {
                match &reported {
                    Some(v) if version::check_all(v, version_constraints) => {}
                    _ => {
                        let text = format!(
                            "program '{}' found but version {} does not satisfy {:?}",
                            name,
                            reported.as_deref().unwrap_or("unknown"),
                            version_constraints
                        );
                        vm.wk.diag.warning(Some(span), &text);
                        continue;
                    }
                }
            }
            let program = ExternalProgram {
                name: name.clone(),
                path: Some(path),
                found: true,
                version: reported,
            };
            return Ok(Some(vm.wk.store.push(Value::ExternalProgram(Box::new(program)))));
        }
    }

    if wrap_mode != "forcefallback" && wrap_mode != "nofallback" {
        if let Some(found) = subproject::program_from_wrap(vm, names, span)? {
            return Ok(Some(found));
        }
    }
    Ok(None)
}

fn func_find_program(vm: &mut Vm, _this: Obj, args: &Args) -> InterpResult<Obj> {
    ensure_configured(vm, args.span)?;
    let Some(b) = ArgParser::new("find_program")
        .pos("name", TC_STRING | TC_FILE)
        .glob("fallback_names", TAG_GLOB | TC_STRING | TC_FILE)
        .kw("required", TC_REQUIRED_KW)
        .kw("native", TC_BOOL)
        .kw("disabler", TC_BOOL)
        .kw("dirs", TAG_LISTIFY | TC_STRING)
        .kw("version", TAG_LISTIFY | TC_STRING)
        .bind(vm, args)?
        .into_bound()
    else {
        return Ok(Obj::DISABLER);
    };
    let mut names = vec![vm.wk.store.path_like(b.pos(0)).unwrap_or("").to_string()];
    for extra in b.glob() {
        names.push(vm.wk.store.path_like(extra.val).unwrap_or("").to_string());
    }
    let dirs = b.kw_strs(&vm.wk.store, "dirs");
    let versions = b.kw_strs(&vm.wk.store, "version");
    let (required, disabled) = coerce::requirement(vm.wk, b.kw("required"));

    let found = if disabled {
        None
    } else {
        find_program_impl(vm, &names, &dirs, &versions, args.span)?
    };
    match found {
        Some(program) => Ok(program),
        None => {
            if required && !disabled {
                return Err(InterpError::new(
                    ErrorKind::DepNotFound,
                    format!("program '{}' not found", names.join("', '")),
                )
                .at(b.pos_span(0)));
            }
            if b.kw_bool(&vm.wk.store, "disabler", false) {
                return Ok(Obj::DISABLER);
            }
            Ok(vm.wk.store.push(Value::ExternalProgram(Box::new(ExternalProgram {
                name: names.first().cloned().unwrap_or_default(),
                path: None,
                found: false,
                version: None,
            }))))
        }
    }
}

fn func_run_command(vm: &mut Vm, _this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(b) = ArgParser::new("run_command")
        .glob("command", TAG_GLOB | TC_EXE | TC_ARRAY)
        .kw("check", TC_BOOL)
        .kw("env", TC_COERCIBLE_ENV)
        .kw("capture", TC_BOOL)
        .bind(vm, args)?
        .into_bound()
    else {
        return Ok(Obj::DISABLER);
    };
    let mut argv = Vec::new();
    for arg in b.glob() {
        match coerce::exe_path(vm.wk, arg.val) {
            Some(path) => argv.push(path),
            None => {
                let mut strings = coerce::string_list(vm.wk, arg.val)
                    .map_err(|e| e.or_at(arg.span))?;
                argv.append(&mut strings);
            }
        }
    }
    if argv.is_empty() {
        return Err(usage_error("run_command requires a command").at(args.span));
    }
    let env: Vec<(String, String)> = match b.kw("env") {
        Some(obj) => {
            let env_obj = coerce::environment(vm.wk, obj).map_err(|e| e.or_at(b.kw_span("env")))?;
            match vm.wk.store.get(env_obj) {
                Value::Environment(e) => e
                    .entries
                    .iter()
                    .map(|(k, (_, vs, sep))| (k.clone(), vs.join(sep)))
                    .collect(),
                _ => Vec::new(),
            }
        }
        None => Vec::new(),
    };
    let cwd = vm.wk.current_source_dir();
    let output = vm
        .wk
        .runner
        .run(&argv, &env, &cwd)
        .map_err(|e| InterpError::new(ErrorKind::Io, e).at(args.span))?;
    if b.kw_bool(&vm.wk.store, "check", false) && output.status != 0 {
        return Err(usage_error(format!(
            "command '{}' failed with status {}",
            argv.join(" "),
            output.status
        ))
        .at(args.span));
    }
    Ok(vm.wk.store.push(Value::RunResult(Box::new(RunResult {
        returncode: output.status,
        stdout: output.stdout,
        stderr: output.stderr,
        compiled: None,
    }))))
}

fn func_run_target(vm: &mut Vm, _this: Obj, args: &Args) -> InterpResult<Obj> {
    ensure_configured(vm, args.span)?;
    let Some(b) = ArgParser::new("run_target")
        .pos("name", TC_STRING)
        .kw("command", crate::typecheck::TC_COMMAND_ARRAY)
        .kw("depends", TC_DEPENDS_KW)
        .kw("env", TC_COERCIBLE_ENV)
        .bind(vm, args)?
        .into_bound()
    else {
        return Ok(Obj::DISABLER);
    };
    let name = vm.wk.store.get_str(b.pos(0)).to_string();
    let mut command = Vec::new();
    for obj in b.kw_objs(&vm.wk.store, "command") {
        match coerce::exe_path(vm.wk, obj) {
            Some(path) => command.push(path),
            None => command.extend(coerce::string_list(vm.wk, obj)?),
        }
    }
    if command.is_empty() {
        return Err(usage_error("run_target requires a command").at(args.span));
    }
    let cwd = vm.wk.current_project().cwd.clone();
    let ct = CustomTarget {
        name: name.clone(),
        inputs: Vec::new(),
        outputs: Vec::new(),
        command,
        depfile: None,
        capture: false,
        feed: false,
        console: false,
        build_by_default: false,
        build_always_stale: true,
        depends: b.kw_objs(&vm.wk.store, "depends"),
        env: b.kw("env"),
        install: false,
        install_dir: None,
        private_dir: Workspace::join_rel(&cwd, &format!("{}.p", name)),
    };
    let target = vm.wk.store.push(Value::CustomTarget(Box::new(ct)));
    vm.wk.current_project_mut().targets.push(target);
    Ok(target)
}

fn func_alias_target(vm: &mut Vm, _this: Obj, args: &Args) -> InterpResult<Obj> {
    ensure_configured(vm, args.span)?;
    let Some(b) = ArgParser::new("alias_target")
        .pos("name", TC_STRING)
        .glob("deps", TAG_GLOB | TC_DEPENDS_KW)
        .bind(vm, args)?
        .into_bound()
    else {
        return Ok(Obj::DISABLER);
    };
    let name = vm.wk.store.get_str(b.pos(0)).to_string();
    if b.glob().is_empty() {
        return Err(usage_error("alias_target requires at least one dependency").at(args.span));
    }
    let mut depends = Vec::new();
    for arg in b.glob() {
        vm.wk.store.flatten_into(arg.val, &mut depends);
    }
    let target = vm
        .wk
        .store
        .push(Value::AliasTarget(Box::new(AliasTarget { name, depends })));
    vm.wk.current_project_mut().targets.push(target);
    Ok(target)
}

// ---- misc values ----

fn func_disabler(vm: &mut Vm, _this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(_b) = ArgParser::new("disabler").bind(vm, args)?.into_bound() else {
        return Ok(Obj::DISABLER);
    };
    Ok(Obj::DISABLER)
}

fn func_is_disabler(vm: &mut Vm, _this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(b) = ArgParser::new("is_disabler")
        .pos("value", TC_ANY | crate::typecheck::TC_DISABLER)
        .disabler_immune()
        .bind(vm, args)?
        .into_bound()
    else {
        return Ok(Obj::DISABLER);
    };
    let result = b.pos(0).is_disabler();
    Ok(vm.wk.store.new_bool(result))
}

fn func_range(vm: &mut Vm, _this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(b) = ArgParser::new("range")
        .pos("start_or_stop", TC_NUMBER)
        .opt_pos("stop", TC_NUMBER)
        .opt_pos("step", TC_NUMBER)
        .bind(vm, args)?
        .into_bound()
    else {
        return Ok(Obj::DISABLER);
    };
    let first = vm.wk.store.as_number(b.pos(0)).expect("typechecked");
    let (start, stop) = match b.opt_pos(0) {
        Some(s) => (first, vm.wk.store.as_number(s.val).expect("typechecked")),
        None => (0, first),
    };
    let step = match b.opt_pos(1) {
        Some(s) => vm.wk.store.as_number(s.val).expect("typechecked"),
        None => 1,
    };
    if step <= 0 {
        return Err(usage_error("range() step must be positive").at(args.span));
    }
    let mut items = Vec::new();
    let mut n = start;
    while n < stop {
        let obj = vm.wk.store.new_number(n);
        items.push(obj);
        n += step;
    }
    Ok(vm.wk.store.new_array(items))
}

fn func_environment(vm: &mut Vm, _this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(b) = ArgParser::new("environment")
        .opt_pos("initial", TC_COERCIBLE_ENV)
        .kw("method", TC_STRING)
        .kw("separator", TC_STRING)
        .bind(vm, args)?
        .into_bound()
    else {
        return Ok(Obj::DISABLER);
    };
    match b.opt_pos(0) {
        Some(initial) => {
            coerce::environment(vm.wk, initial.val).map_err(|e| e.or_at(initial.span))
        }
        None => Ok(vm
            .wk
            .store
            .push(Value::Environment(Box::new(EnvironmentData::default())))),
    }
}

fn func_configuration_data(vm: &mut Vm, _this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(b) = ArgParser::new("configuration_data")
        .opt_pos("initial", TC_DICT)
        .bind(vm, args)?
        .into_bound()
    else {
        return Ok(Obj::DISABLER);
    };
    let mut cd = ConfigurationData::default();
    if let Some(initial) = b.opt_pos(0) {
        if let Some(map) = vm.wk.store.as_dict(initial.val) {
            for (k, &v) in map {
                cd.values.insert(k.clone(), (v, None));
            }
        }
    }
    Ok(vm.wk.store.push(Value::ConfigurationData(Box::new(cd))))
}

fn func_declare_dependency(vm: &mut Vm, _this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(b) = ArgParser::new("declare_dependency")
        .kw("link_with", crate::typecheck::TC_LINK_WITH_KW)
        .kw("link_whole", crate::typecheck::TC_LINK_WITH_KW)
        .kw("link_args", TAG_LISTIFY | TC_STRING)
        .kw("compile_args", TAG_LISTIFY | TC_STRING)
        .kw("include_directories", TAG_LISTIFY | crate::typecheck::TC_COERCIBLE_INC)
        .kw("dependencies", TAG_LISTIFY | TC_DEPENDENCY)
        .kw("sources", TAG_LISTIFY | TC_COERCIBLE_FILES)
        .kw("version", TC_STRING)
        .kw("variables", TC_DICT | TC_ARRAY | TC_STRING)
        .kw("objects", TAG_LISTIFY | TC_COERCIBLE_FILES)
        .bind(vm, args)?
        .into_bound()
    else {
        return Ok(Obj::DISABLER);
    };

    let link_with = b.kw_objs(&vm.wk.store, "link_with");
    let link_whole = b.kw_objs(&vm.wk.store, "link_whole");
    let dependencies = b.kw_objs(&vm.wk.store, "dependencies");

    // Every linked element must target one machine.
    let machine = dependency::unified_machine(
        vm.wk,
        link_with.iter().chain(link_whole.iter()).chain(dependencies.iter()),
        args.span,
    )?;

    let include_values = b.kw_objs(&vm.wk.store, "include_directories");
    let include_directories = coerce::include_dirs(vm.wk, &include_values)
        .map_err(|e| e.or_at(b.kw_span("include_directories")))?;

    let mut sources = Vec::new();
    if let Some(source_list) = b.kw("sources") {
        sources = coerce::files(vm.wk, source_list)
            .map_err(|e| e.or_at(b.kw_span("sources")))?;
    }

    let variables = match b.kw("variables") {
        Some(obj) => coerce::string_map(vm.wk, obj)
            .map_err(|e| e.or_at(b.kw_span("variables")))?,
        None => IndexMap::new(),
    };

    let mut dep = Dependency::found("", DepKind::Declared, machine);
    dep.version = b.kw_str(&vm.wk.store, "version");
    dep.link_with = link_with;
    dep.link_whole = link_whole;
    dep.link_args = b.kw_strs(&vm.wk.store, "link_args");
    dep.compile_args = b.kw_strs(&vm.wk.store, "compile_args");
    dep.include_directories = include_directories;
    dep.dependencies = dependencies;
    dep.sources = sources;
    dep.variables = variables;
    Ok(vm.wk.store.push(Value::Dependency(Box::new(dep))))
}

// ---- argument/dependency injection ----

fn add_args_impl(
    vm: &mut Vm,
    args: &Args,
    fname: &str,
    global: bool,
    link: bool,
) -> InterpResult<Obj> {
    ensure_configured(vm, args.span)?;
    let Some(b) = ArgParser::new(fname)
        .glob("args", TAG_GLOB | TC_STRING)
        .kw("language", TAG_LISTIFY | TC_STRING)
        .kw("native", TC_BOOL)
        .bind(vm, args)?
        .into_bound()
    else {
        return Ok(Obj::DISABLER);
    };
    let languages = b.kw_strs(&vm.wk.store, "language");
    if languages.is_empty() {
        return Err(usage_error(format!("{} requires the language keyword", fname))
            .at(args.span));
    }
    let machine = machine_from_native_kw(vm, &b);
    let new_args: Vec<String> = b
        .glob()
        .iter()
        .map(|a| vm.wk.store.get_str(a.val).to_string())
        .collect();
    for lang in languages {
        let key = (lang, machine);
        let table = match (global, link) {
            (true, false) => vm.wk.global_args.entry(key).or_default(),
            (true, true) => vm.wk.global_link_args.entry(key).or_default(),
            (false, false) => {
                vm.wk.current_project_mut().project_args.entry(key).or_default()
            }
            (false, true) => {
                vm.wk.current_project_mut().project_link_args.entry(key).or_default()
            }
        };
        table.extend(new_args.iter().cloned());
    }
    Ok(Obj::NULL)
}

fn func_add_project_arguments(vm: &mut Vm, _this: Obj, args: &Args) -> InterpResult<Obj> {
    add_args_impl(vm, args, "add_project_arguments", false, false)
}

fn func_add_global_arguments(vm: &mut Vm, _this: Obj, args: &Args) -> InterpResult<Obj> {
    add_args_impl(vm, args, "add_global_arguments", true, false)
}

fn func_add_project_link_arguments(vm: &mut Vm, _this: Obj, args: &Args) -> InterpResult<Obj> {
    add_args_impl(vm, args, "add_project_link_arguments", false, true)
}

fn func_add_global_link_arguments(vm: &mut Vm, _this: Obj, args: &Args) -> InterpResult<Obj> {
    add_args_impl(vm, args, "add_global_link_arguments", true, true)
}

fn add_deps_impl(vm: &mut Vm, args: &Args, fname: &str, global: bool) -> InterpResult<Obj> {
    ensure_configured(vm, args.span)?;
    let Some(b) = ArgParser::new(fname)
        .glob("dependencies", TAG_GLOB | TC_DEPENDENCY)
        .kw("language", TAG_LISTIFY | TC_STRING)
        .kw("native", TC_BOOL)
        .bind(vm, args)?
        .into_bound()
    else {
        return Ok(Obj::DISABLER);
    };
    let deps: Vec<Obj> = b.glob().iter().map(|a| a.val).collect();
    if global {
        vm.wk.global_deps.extend(deps);
    } else {
        vm.wk.current_project_mut().project_deps.extend(deps);
    }
    Ok(Obj::NULL)
}

fn func_add_project_dependencies(vm: &mut Vm, _this: Obj, args: &Args) -> InterpResult<Obj> {
    add_deps_impl(vm, args, "add_project_dependencies", false)
}

fn func_add_global_dependencies(vm: &mut Vm, _this: Obj, args: &Args) -> InterpResult<Obj> {
    add_deps_impl(vm, args, "add_global_dependencies", true)
}

fn func_add_test_setup(vm: &mut Vm, _this: Obj, args: &Args) -> InterpResult<Obj> {
    ensure_configured(vm, args.span)?;
    let Some(b) = ArgParser::new("add_test_setup")
        .pos("name", TC_STRING)
        .kw("env", TC_COERCIBLE_ENV)
        .kw("exe_wrapper", crate::typecheck::TC_COMMAND_ARRAY)
        .kw("timeout_multiplier", TC_NUMBER)
        .kw("is_default", TC_BOOL)
        .kw("exclude_suites", TAG_LISTIFY | TC_STRING)
        .bind(vm, args)?
        .into_bound()
    else {
        return Ok(Obj::DISABLER);
    };
    let name = vm.wk.store.get_str(b.pos(0)).to_string();
    let env = match b.kw("env") {
        Some(obj) => Some(coerce::environment(vm.wk, obj).map_err(|e| e.or_at(b.kw_span("env")))?),
        None => None,
    };
    let mut exe_wrapper = Vec::new();
    for obj in b.kw_objs(&vm.wk.store, "exe_wrapper") {
        match coerce::exe_path(vm.wk, obj) {
            Some(path) => exe_wrapper.push(path),
            None => exe_wrapper.extend(coerce::string_list(vm.wk, obj)?),
        }
    }
    let setup = TestSetup {
        name,
        env,
        exe_wrapper,
        timeout_multiplier: b.kw_number(&vm.wk.store, "timeout_multiplier").unwrap_or(1),
        is_default: b.kw_bool(&vm.wk.store, "is_default", false),
    };
    vm.wk.test_setups.push(setup);
    Ok(Obj::NULL)
}

// ---- tests ----

fn test_impl(vm: &mut Vm, args: &Args, fname: &str, is_benchmark: bool) -> InterpResult<Obj> {
    ensure_configured(vm, args.span)?;
    let Some(b) = ArgParser::new(fname)
        .pos("name", TC_STRING)
        .pos("exe", TC_EXE)
        .kw("args", TAG_LISTIFY | TC_STRING | TC_FILE | crate::typecheck::TC_BUILD_TARGET | crate::typecheck::TC_CUSTOM_TARGET | crate::typecheck::TC_EXTERNAL_PROGRAM)
        .kw("workdir", TC_STRING)
        .kw("depends", TC_DEPENDS_KW)
        .kw("should_fail", TC_BOOL)
        .kw("env", TC_COERCIBLE_ENV)
        .kw("suite", TAG_LISTIFY | TC_STRING)
        .kw("priority", TC_NUMBER)
        .kw("timeout", TC_NUMBER)
        .kw("protocol", TC_STRING)
        .kw("is_parallel", TC_BOOL)
        .kw("verbose", TC_BOOL)
        .bind(vm, args)?
        .into_bound()
    else {
        return Ok(Obj::DISABLER);
    };
    let name = vm.wk.store.get_str(b.pos(0)).to_string();
    let protocol = b
        .kw_str(&vm.wk.store, "protocol")
        .unwrap_or_else(|| "exitcode".to_string());
    if !["exitcode", "tap", "gtest", "rust"].contains(&protocol.as_str()) {
        return Err(usage_error(format!("unknown test protocol '{}'", protocol))
            .at(b.kw_span("protocol")));
    }
    let env = match b.kw("env") {
        Some(obj) => Some(coerce::environment(vm.wk, obj).map_err(|e| e.or_at(b.kw_span("env")))?),
        None => None,
    };
    let descriptor = TestDescriptor {
        name,
        exe: b.pos(1),
        args: b.kw_objs(&vm.wk.store, "args"),
        env,
        workdir: b.kw_str(&vm.wk.store, "workdir"),
        should_fail: b.kw_bool(&vm.wk.store, "should_fail", false),
        suites: b.kw_strs(&vm.wk.store, "suite"),
        priority: b.kw_number(&vm.wk.store, "priority").unwrap_or(0),
        timeout: b.kw_number(&vm.wk.store, "timeout").unwrap_or(30),
        protocol,
        is_parallel: b.kw_bool(&vm.wk.store, "is_parallel", true),
        verbose: b.kw_bool(&vm.wk.store, "verbose", false),
        depends: b.kw_objs(&vm.wk.store, "depends"),
        is_benchmark,
    };
    let test = vm.wk.store.push(Value::Test(Box::new(descriptor)));
    vm.wk.current_project_mut().tests.push(test);
    Ok(Obj::NULL)
}

fn func_test(vm: &mut Vm, _this: Obj, args: &Args) -> InterpResult<Obj> {
    test_impl(vm, args, "test", false)
}

fn func_benchmark(vm: &mut Vm, _this: Obj, args: &Args) -> InterpResult<Obj> {
    test_impl(vm, args, "benchmark", true)
}

// ---- directory recursion ----

fn func_subdir(vm: &mut Vm, _this: Obj, args: &Args) -> InterpResult<Obj> {
    ensure_configured(vm, args.span)?;
    let Some(b) = ArgParser::new("subdir")
        .pos("name", TC_STRING)
        .kw("if_found", TAG_LISTIFY | TC_DEPENDENCY)
        .bind(vm, args)?
        .into_bound()
    else {
        return Ok(Obj::DISABLER);
    };
    for dep in b.kw_objs(&vm.wk.store, "if_found") {
        if let Value::Dependency(d) = vm.wk.store.get(dep) {
            if !d.found {
                return Ok(Obj::NULL);
            }
        }
    }
    let name = vm.wk.store.get_str(b.pos(0)).to_string();
    if name.contains("..") {
        return Err(usage_error("subdir must stay inside the source tree").at(b.pos_span(0)));
    }
    let saved_cwd = vm.wk.current_project().cwd.clone();
    let new_cwd = Workspace::join_rel(&saved_cwd, &name);
    vm.wk.current_project_mut().cwd = new_cwd.clone();
    let result = vm.wk.eval_build_file(&new_cwd);
    vm.wk.current_project_mut().cwd = saved_cwd;
    result.map_err(|e| e.or_at(b.pos_span(0)))?;
    Ok(Obj::NULL)
}

fn func_subdir_done(vm: &mut Vm, _this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(_b) = ArgParser::new("subdir_done").bind(vm, args)?.into_bound() else {
        return Ok(Obj::DISABLER);
    };
    vm.request_halt();
    Ok(Obj::NULL)
}

fn func_get_option(vm: &mut Vm, _this: Obj, args: &Args) -> InterpResult<Obj> {
    ensure_configured(vm, args.span)?;
    let Some(b) = ArgParser::new("get_option")
        .pos("name", TC_STRING)
        .bind(vm, args)?
        .into_bound()
    else {
        return Ok(Obj::DISABLER);
    };
    let name = vm.wk.store.get_str(b.pos(0)).to_string();
    if name.contains(':') {
        return Err(usage_error("option names must not contain ':'").at(b.pos_span(0)));
    }
    match vm.wk.option_value(&name) {
        Some(value) => Ok(value),
        None => Err(InterpError::new(
            ErrorKind::OptionValidation,
            format!("unknown option '{}'", name),
        )
        .at(b.pos_span(0))),
    }
}

// ---- tables ----

pub const KERNEL_FUNCS: &[FuncImpl] = &[
    FuncImpl::new("add_global_arguments", func_add_global_arguments, 0),
    FuncImpl::new("add_global_dependencies", func_add_global_dependencies, 0),
    FuncImpl::new("add_global_link_arguments", func_add_global_link_arguments, 0),
    FuncImpl::new("add_languages", func_add_languages, TC_BOOL),
    FuncImpl::new("add_project_arguments", func_add_project_arguments, 0),
    FuncImpl::new("add_project_dependencies", func_add_project_dependencies, 0),
    FuncImpl::new("add_project_link_arguments", func_add_project_link_arguments, 0),
    FuncImpl::new("add_test_setup", func_add_test_setup, 0),
    FuncImpl::new("alias_target", func_alias_target, 0),
    FuncImpl::with_flags("assert", func_assert, 0, flags::THROWS_ERROR),
    FuncImpl::new("benchmark", func_benchmark, 0),
    FuncImpl::new("both_libraries", build_target::func_both_libraries, 0),
    FuncImpl::new("build_target", build_target::func_build_target, 0),
    FuncImpl::new("configuration_data", func_configuration_data, 0),
    FuncImpl::with_flags("configure_file", configure_file::func_configure_file, 0, flags::IMPURE),
    FuncImpl::new("custom_target", custom_target::func_custom_target, 0),
    FuncImpl::new("debug", func_debug, 0),
    FuncImpl::new("declare_dependency", func_declare_dependency, TC_DEPENDENCY),
    FuncImpl::new("dependency", dependency::func_dependency, TC_DEPENDENCY),
    FuncImpl::new("disabler", func_disabler, 0),
    FuncImpl::new("environment", func_environment, 0),
    FuncImpl::with_flags("error", func_error, 0, flags::THROWS_ERROR),
    FuncImpl::new("executable", build_target::func_executable, 0),
    FuncImpl::new("files", func_files, 0),
    FuncImpl::with_flags("find_program", func_find_program, 0, flags::IMPURE),
    FuncImpl::new("generator", custom_target::func_generator, 0),
    FuncImpl::new("get_option", func_get_option, 0),
    FuncImpl::with_flags("get_variable", func_get_variable, 0, flags::DISABLER_IMMUNE),
    FuncImpl::new("import", func_import, 0),
    FuncImpl::new("include_directories", func_include_directories, 0),
    FuncImpl::new("install_data", install::func_install_data, 0),
    FuncImpl::new("install_emptydir", install::func_install_emptydir, 0),
    FuncImpl::new("install_headers", install::func_install_headers, 0),
    FuncImpl::new("install_man", install::func_install_man, 0),
    FuncImpl::new("install_subdir", install::func_install_subdir, 0),
    FuncImpl::new("install_symlink", install::func_install_symlink, 0),
    FuncImpl::with_flags("is_disabler", func_is_disabler, TC_BOOL, flags::DISABLER_IMMUNE),
    FuncImpl::with_flags("is_variable", func_is_variable, TC_BOOL, flags::DISABLER_IMMUNE),
    FuncImpl::new("join_paths", func_join_paths, TC_STRING),
    FuncImpl::new("library", build_target::func_library, 0),
    FuncImpl::new("message", func_message, 0),
    FuncImpl::new("project", func_project, 0),
    FuncImpl::new("range", func_range, 0),
    FuncImpl::with_flags("run_command", func_run_command, 0, flags::SANDBOX_DISABLE | flags::IMPURE),
    FuncImpl::new("run_target", func_run_target, 0),
    FuncImpl::with_flags("set_variable", func_set_variable, 0, flags::DISABLER_IMMUNE),
    FuncImpl::new("shared_library", build_target::func_shared_library, 0),
    FuncImpl::new("shared_module", build_target::func_shared_module, 0),
    FuncImpl::new("static_library", build_target::func_static_library, 0),
    FuncImpl::new("subdir", func_subdir, 0),
    FuncImpl::new("subdir_done", func_subdir_done, 0),
    FuncImpl::new("subproject", subproject::func_subproject, 0),
    FuncImpl::new("summary", func_summary, 0),
    FuncImpl::new("test", func_test, 0),
    FuncImpl::with_flags("unset_variable", func_unset_variable, 0, flags::DISABLER_IMMUNE),
    FuncImpl::new("vcs_tag", custom_target::func_vcs_tag, 0),
    FuncImpl::new("warning", func_warning, 0),
];

/// Extras visible only to the internal/extended surfaces.
pub const INTERNAL_FUNCS: &[FuncImpl] = &[FuncImpl::with_flags(
    "typename",
    func_typename,
    TC_STRING,
    flags::EXTENSION | flags::DISABLER_IMMUNE,
)];

fn func_typename(vm: &mut Vm, _this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(b) = ArgParser::new("typename")
        .pos("value", TC_ANY | crate::typecheck::TC_DISABLER | crate::typecheck::TC_NULL)
        .disabler_immune()
        .bind(vm, args)?
        .into_bound()
    else {
        return Ok(Obj::DISABLER);
    };
    let name = vm.wk.store.obj_type(b.pos(0)).as_str();
    Ok(vm.wk.store.new_str(name))
}

/// The option-file surface.
pub const OPTS_FUNCS: &[FuncImpl] = &[
    FuncImpl::with_flags("assert", func_assert, 0, flags::THROWS_ERROR),
    FuncImpl::with_flags("error", func_error, 0, flags::THROWS_ERROR),
    FuncImpl::new("option", options::func_option, 0),
];
