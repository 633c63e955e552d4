//! custom_target, generator and vcs_tag
//!
//! Command lists are tokenized with placeholder substitution applied per
//! element. Placeholders whose inputs/outputs are absent stay in place and
//! raise a warning.

use crate::diagnostics::{usage_error, ErrorKind, InterpError, InterpResult};
use crate::functions::kernel::{ensure_configured, install};
use crate::object::{
    CustomTarget, Generator, InstallFlavor, InstallTarget, Obj, Value,
};
use crate::typecheck::args::{ArgParser, BoundArgs};
use crate::typecheck::{
    coerce, TAG_LISTIFY, TC_BOOL, TC_COERCIBLE_ENV, TC_COERCIBLE_FILES, TC_COMMAND_ARRAY,
    TC_DEPENDS_KW, TC_EXE, TC_INSTALL_MODE_KW, TC_STRING,
};
use crate::vm::{Args, Vm};
use crate::workspace::Workspace;

/// Everything a command element may refer to.
pub struct PlaceholderCtx {
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
    pub outdir: String,
    pub depfile: Option<String>,
    pub private_dir: String,
    pub source_root: String,
    pub build_root: String,
    pub current_source_dir: String,
    pub extra_args: Vec<String>,
}

fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

fn stem(path: &str) -> &str {
    let name = basename(path);
    name.rsplit_once('.').map(|(s, _)| s).unwrap_or(name)
}

/// Expand one command element. List-valued placeholders (@INPUT@,
/// @OUTPUT@, @EXTRA_ARGS@) expand to multiple elements when they stand
/// alone.
pub fn expand_placeholders(
    arg: &str,
    ctx: &PlaceholderCtx,
    warnings: &mut Vec<String>,
) -> Vec<String> {
    match arg {
        "@INPUT@" => {
            if ctx.inputs.is_empty() {
                warnings.push("@INPUT@ used with no inputs".to_string());
                return vec![arg.to_string()];
            }
            return ctx.inputs.clone();
        }
        "@OUTPUT@" => {
            if ctx.outputs.is_empty() {
                warnings.push("@OUTPUT@ used with no outputs".to_string());
                return vec![arg.to_string()];
            }
            return ctx.outputs.clone();
        }
        "@EXTRA_ARGS@" => return ctx.extra_args.clone(),
        _ => {}
    }

    let mut out = arg.to_string();
    // Indexed forms first so @INPUT0@ is not eaten by @INPUT@.
    for (i, input) in ctx.inputs.iter().enumerate() {
        out = out.replace(&format!("@INPUT{}@", i), input);
    }
    for (i, output) in ctx.outputs.iter().enumerate() {
        out = out.replace(&format!("@OUTPUT{}@", i), output);
    }
    if out.contains("@INPUT@") {
        match ctx.inputs.first() {
            Some(first) => out = out.replace("@INPUT@", first),
            None => warnings.push("@INPUT@ used with no inputs".to_string()),
        }
    }
    if out.contains("@OUTPUT@") {
        match ctx.outputs.first() {
            Some(first) => out = out.replace("@OUTPUT@", first),
            None => warnings.push("@OUTPUT@ used with no outputs".to_string()),
        }
    }
    if out.contains("@DEPFILE@") {
        match &ctx.depfile {
            Some(depfile) => out = out.replace("@DEPFILE@", depfile),
            None => warnings.push("@DEPFILE@ used with no depfile".to_string()),
        }
    }
    if let Some(first) = ctx.inputs.first() {
        out = out.replace("@PLAINNAME@", basename(first));
        out = out.replace("@BASENAME@", stem(first));
    }
    out = out.replace("@OUTDIR@", &ctx.outdir);
    out = out.replace("@PRIVATE_DIR@", &ctx.private_dir);
    out = out.replace("@SOURCE_ROOT@", &ctx.source_root);
    out = out.replace("@BUILD_ROOT@", &ctx.build_root);
    out = out.replace("@CURRENT_SOURCE_DIR@", &ctx.current_source_dir);
    vec![out]
}

fn command_argv(
    vm: &mut Vm,
    b: &BoundArgs,
    depends: &mut Vec<Obj>,
) -> InterpResult<Vec<String>> {
    let mut argv = Vec::new();
    for obj in b.kw_objs(&vm.wk.store, "command") {
        match vm.wk.store.get(obj).clone() {
            Value::BuildTarget(_) | Value::CustomTarget(_) | Value::BothLibs { .. } => {
                depends.push(obj);
                match coerce::exe_path(vm.wk, obj) {
                    Some(path) => argv.push(path),
                    None => {}
                }
            }
            Value::ExternalProgram(p) => match p.path {
                Some(path) => argv.push(path),
                None => {
                    return Err(usage_error(format!(
                        "command program '{}' was not found",
                        p.name
                    ))
                    .at(b.kw_span("command")));
                }
            },
            _ => argv.extend(coerce::string_list(vm.wk, obj)?),
        }
    }
    Ok(argv)
}

pub fn func_custom_target(vm: &mut Vm, _this: Obj, args: &Args) -> InterpResult<Obj> {
    ensure_configured(vm, args.span)?;
    let Some(b) = ArgParser::new("custom_target")
        .opt_pos("name", TC_STRING)
        .kw("input", TAG_LISTIFY | TC_COERCIBLE_FILES)
        .kw("output", TAG_LISTIFY | TC_STRING)
        .kw("command", TC_COMMAND_ARRAY)
        .kw("depends", TC_DEPENDS_KW)
        .kw("depfile", TC_STRING)
        .kw("capture", TC_BOOL)
        .kw("feed", TC_BOOL)
        .kw("console", TC_BOOL)
        .kw("build_by_default", TC_BOOL)
        .kw("build_always_stale", TC_BOOL)
        .kw("install", TC_BOOL)
        .kw("install_dir", TAG_LISTIFY | TC_STRING)
        .kw("install_mode", TC_INSTALL_MODE_KW)
        .kw("install_tag", TAG_LISTIFY | TC_STRING)
        .kw("env", TC_COERCIBLE_ENV)
        .bind(vm, args)?
        .into_bound()
    else {
        return Ok(Obj::DISABLER);
    };

    let mut inputs = Vec::new();
    if let Some(value) = b.kw("input") {
        inputs = coerce::files(vm.wk, value).map_err(|e| e.or_at(b.kw_span("input")))?;
    }
    let input_paths: Vec<String> = inputs
        .iter()
        .map(|&f| vm.wk.store.file_path(f).to_string())
        .collect();

    let raw_outputs = b.kw_strs(&vm.wk.store, "output");
    if raw_outputs.is_empty() {
        return Err(usage_error("custom_target requires at least one output").at(args.span));
    }
    let name = match b.opt_pos(0) {
        Some(arg) => vm.wk.store.get_str(arg.val).to_string(),
        None => raw_outputs[0].clone(),
    };

    let cwd = vm.wk.current_project().cwd.clone();
    let outdir = vm.wk.current_build_dir();
    let mut output_paths = Vec::new();
    for output in &raw_outputs {
        if output.contains('/') {
            return Err(usage_error("outputs must be plain filenames").at(b.kw_span("output")));
        }
        let named = match input_paths.first() {
            Some(first) => output
                .replace("@PLAINNAME@", basename(first))
                .replace("@BASENAME@", stem(first)),
            None => output.clone(),
        };
        output_paths.push(format!("{}/{}", outdir, named));
    }

    let private_dir = format!("{}/{}.p", outdir, name);
    let depfile = b
        .kw_str(&vm.wk.store, "depfile")
        .map(|d| format!("{}/{}", private_dir, d));

    let mut depends = b.kw_objs(&vm.wk.store, "depends");
    let raw_argv = command_argv(vm, &b, &mut depends)?;
    if raw_argv.is_empty() {
        return Err(usage_error("custom_target requires a command").at(args.span));
    }

    let ctx = PlaceholderCtx {
        inputs: input_paths,
        outputs: output_paths.clone(),
        outdir: outdir.clone(),
        depfile: depfile.clone(),
        private_dir,
        source_root: vm.wk.source_root.clone(),
        build_root: vm.wk.build_root.clone(),
        current_source_dir: vm.wk.current_source_dir(),
        extra_args: Vec::new(),
    };
    let mut warnings = Vec::new();
    let mut command = Vec::new();
    for arg in &raw_argv {
        command.extend(expand_placeholders(arg, &ctx, &mut warnings));
    }
    for warning in warnings {
        vm.wk.diag.warning(Some(args.span), &warning);
    }

    let output_objs: Vec<Obj> =
        output_paths.iter().map(|p| vm.wk.store.new_file(p)).collect();

    let install = b.kw_bool(&vm.wk.store, "install", false);
    let install_dirs = b.kw_strs(&vm.wk.store, "install_dir");
    if install {
        if install_dirs.is_empty() {
            return Err(usage_error("custom_target with install requires install_dir")
                .at(args.span));
        }
        let mode_objs = b.kw_objs(&vm.wk.store, "install_mode");
        let mode = coerce::install_mode(vm.wk, &mode_objs);
        let tags = b.kw_strs(&vm.wk.store, "install_tag");
        for (i, output) in output_paths.iter().enumerate() {
            let dir = install_dirs.get(i).unwrap_or(&install_dirs[0]);
            let dest = install::resolve_dest(vm.wk, dir, basename(output));
            install::push_entry(
                vm.wk,
                InstallTarget {
                    src: output.clone(),
                    dest,
                    mode: mode.clone(),
                    tag: tags.get(i).cloned(),
                    flavor: InstallFlavor::Target,
                },
            );
        }
    }

    let target = CustomTarget {
        name,
        inputs,
        outputs: output_objs,
        command,
        depfile,
        capture: b.kw_bool(&vm.wk.store, "capture", false),
        feed: b.kw_bool(&vm.wk.store, "feed", false),
        console: b.kw_bool(&vm.wk.store, "console", false),
        build_by_default: b.kw_bool(&vm.wk.store, "build_by_default", install),
        build_always_stale: b.kw_bool(&vm.wk.store, "build_always_stale", false),
        depends,
        env: b.kw("env"),
        install,
        install_dir: install_dirs.first().cloned(),
        private_dir: Workspace::join_rel(&cwd, &format!("{}.p", raw_outputs[0])),
    };
    let obj = vm.wk.store.push(Value::CustomTarget(Box::new(target)));
    vm.wk.current_project_mut().targets.push(obj);
    Ok(obj)
}

pub fn func_generator(vm: &mut Vm, _this: Obj, args: &Args) -> InterpResult<Obj> {
    ensure_configured(vm, args.span)?;
    let Some(b) = ArgParser::new("generator")
        .pos("exe", TC_EXE)
        .kw("output", TAG_LISTIFY | TC_STRING)
        .kw("arguments", TAG_LISTIFY | TC_STRING)
        .kw("depfile", TC_STRING)
        .kw("capture", TC_BOOL)
        .kw("depends", TC_DEPENDS_KW)
        .bind(vm, args)?
        .into_bound()
    else {
        return Ok(Obj::DISABLER);
    };
    let output = b.kw_strs(&vm.wk.store, "output");
    if output.is_empty() {
        return Err(usage_error("generator requires the output keyword").at(args.span));
    }
    for o in &output {
        if !o.contains("@BASENAME@") && !o.contains("@PLAINNAME@") {
            return Err(usage_error(
                "generator outputs must reference @BASENAME@ or @PLAINNAME@",
            )
            .at(b.kw_span("output")));
        }
    }
    Ok(vm.wk.store.push(Value::Generator(Box::new(Generator {
        exe: b.pos(0),
        output,
        arguments: b.kw_strs(&vm.wk.store, "arguments"),
        depfile: b.kw_str(&vm.wk.store, "depfile"),
        capture: b.kw_bool(&vm.wk.store, "capture", false),
        depends: b.kw_objs(&vm.wk.store, "depends"),
    }))))
}

/// vcs_tag: resolve the current VCS revision through the process runner,
/// falling back to the given string, and write the substituted output as a
/// stale-checked build node.
pub fn func_vcs_tag(vm: &mut Vm, _this: Obj, args: &Args) -> InterpResult<Obj> {
    ensure_configured(vm, args.span)?;
    let Some(b) = ArgParser::new("vcs_tag")
        .kw("input", TAG_LISTIFY | TC_COERCIBLE_FILES)
        .kw("output", TC_STRING)
        .kw("command", TC_COMMAND_ARRAY)
        .kw("fallback", TC_STRING)
        .kw("replace_string", TC_STRING)
        .bind(vm, args)?
        .into_bound()
    else {
        return Ok(Obj::DISABLER);
    };
    let output = b
        .kw_str(&vm.wk.store, "output")
        .ok_or_else(|| usage_error("vcs_tag requires the output keyword").at(args.span))?;
    let inputs = match b.kw("input") {
        Some(value) => coerce::files(vm.wk, value).map_err(|e| e.or_at(b.kw_span("input")))?,
        None => Vec::new(),
    };
    let input_path = inputs
        .first()
        .map(|&f| vm.wk.store.file_path(f).to_string())
        .ok_or_else(|| usage_error("vcs_tag requires an input").at(args.span))?;

    let fallback = b
        .kw_str(&vm.wk.store, "fallback")
        .or_else(|| vm.wk.current_project().version.clone())
        .unwrap_or_else(|| "unknown".to_string());
    let replace_string = b
        .kw_str(&vm.wk.store, "replace_string")
        .unwrap_or_else(|| "@VCS_TAG@".to_string());

    // Ask the VCS for a description; any failure falls back.
    let mut tag = fallback;
    if let Some(command) = b.kw("command") {
        let mut argv = Vec::new();
        for obj in vm.wk.store.as_array(command).map(|s| s.to_vec()).unwrap_or_default() {
            match coerce::exe_path(vm.wk, obj) {
                Some(path) => argv.push(path),
                None => argv.extend(coerce::string_list(vm.wk, obj)?),
            }
        }
        let cwd = vm.wk.current_source_dir();
        if let Ok(result) = vm.wk.runner.run(&argv, &[], &cwd) {
            if result.status == 0 && !result.stdout.trim().is_empty() {
                tag = result.stdout.trim().to_string();
            }
        }
    }

    let template = vm
        .wk
        .fs
        .read_to_string(&input_path)
        .map_err(|e| InterpError::new(ErrorKind::Io, e.to_string()).at(b.kw_span("input")))?;
    let contents = template.replace(&replace_string, &tag);
    let cwd = vm.wk.current_project().cwd.clone();
    let out_path = vm.wk.build_path(&Workspace::join_rel(&cwd, &output));
    vm.wk
        .fs
        .write_if_changed(&out_path, &contents)
        .map_err(|e| InterpError::new(ErrorKind::Io, e.to_string()).at(args.span))?;

    let out_file = vm.wk.store.new_file(&out_path);
    let target = CustomTarget {
        name: output.clone(),
        inputs,
        outputs: vec![out_file],
        command: Vec::new(),
        depfile: None,
        capture: false,
        feed: false,
        console: false,
        build_by_default: true,
        build_always_stale: true,
        depends: Vec::new(),
        env: None,
        install: false,
        install_dir: None,
        private_dir: Workspace::join_rel(&cwd, &format!("{}.p", output)),
    };
    let obj = vm.wk.store.push(Value::CustomTarget(Box::new(target)));
    vm.wk.current_project_mut().targets.push(obj);
    Ok(obj)
}
