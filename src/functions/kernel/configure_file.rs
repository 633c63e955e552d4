//! configure_file
//!
//! Template substitution (`@VAR@`, `#mesondefine`), command execution and
//! plain copy, with atomic write semantics: the output file is only
//! rewritten when its contents change.

use regex_lite::Regex;

use crate::diagnostics::{usage_error, ErrorKind, InterpError, InterpResult, Span};
use crate::functions::kernel::{ensure_configured, install};
use crate::object::{InstallFlavor, InstallTarget, Obj, Value};
use crate::typecheck::args::{ArgParser, BoundArgs};
use crate::typecheck::{
    coerce, TAG_LISTIFY, TC_BOOL, TC_COERCIBLE_FILES, TC_COMMAND_ARRAY, TC_CONFIGURATION_DATA,
    TC_DICT, TC_INSTALL_MODE_KW, TC_STRING,
};
use crate::vm::{Args, Vm};
use crate::workspace::Workspace;

const MESONDEFINE: &str = "#mesondefine ";

/// Render one configuration value for `@VAR@` substitution.
fn render_value(vm: &Vm, value: Obj) -> String {
    match vm.wk.store.get(value) {
        Value::Str(id) => vm.wk.store.str_value(*id).to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => format!("<{}>", other.obj_type().as_str()),
    }
}

fn config_lookup(vm: &Vm, config: Obj, key: &str) -> Option<Obj> {
    match vm.wk.store.get(config) {
        Value::ConfigurationData(cd) => cd.values.get(key).map(|(v, _)| *v),
        Value::Dict(map) => map.get(key).copied(),
        _ => None,
    }
}

/// Apply `@VAR@` and `#mesondefine VAR` substitution to a template.
pub fn substitute_config(
    vm: &mut Vm,
    template: &str,
    config: Obj,
    span: Span,
) -> InterpResult<String> {
    let var_re = Regex::new(r"@([A-Za-z_][A-Za-z0-9_]*)@").expect("static pattern");
    let mut out = String::new();
    for line in template.split_inclusive('\n') {
        if let Some(rest) = line.strip_prefix(MESONDEFINE) {
            let key = rest.trim();
            if key.is_empty() {
                return Err(usage_error("#mesondefine with no macro name").at(span));
            }
            let newline = if line.ends_with('\n') { "\n" } else { "" };
            match config_lookup(vm, config, key) {
                None => out.push_str(&format!("/* undef {} */{}", key, newline)),
                Some(value) => match vm.wk.store.get(value) {
                    Value::Bool(true) => out.push_str(&format!("#define {}{}", key, newline)),
                    Value::Bool(false) => out.push_str(&format!("#undef {}{}", key, newline)),
                    Value::Str(id) => {
                        let s = vm.wk.store.str_value(*id).to_string();
                        out.push_str(&format!("#define {} {}{}", key, s, newline));
                    }
                    Value::Number(n) => {
                        out.push_str(&format!("#define {} {}{}", key, n, newline));
                    }
                    other => {
                        return Err(InterpError::new(
                            ErrorKind::Type,
                            format!(
                                "#mesondefine value for '{}' must be bool, string or int, got {}",
                                key,
                                other.obj_type().as_str()
                            ),
                        )
                        .at(span));
                    }
                },
            }
            continue;
        }
        // Plain @VAR@ substitution; unknown keys are left alone.
        let mut rendered = String::new();
        let mut last = 0;
        for caps in var_re.captures_iter(line) {
            let whole = caps.get(0).expect("capture 0 always present");
            let key = caps.get(1).expect("pattern has one group").as_str();
            rendered.push_str(&line[last..whole.start()]);
            match config_lookup(vm, config, key) {
                Some(value) => rendered.push_str(&render_value(vm, value)),
                None => rendered.push_str(whole.as_str()),
            }
            last = whole.end();
        }
        rendered.push_str(&line[last..]);
        out.push_str(&rendered);
    }
    Ok(out)
}

/// Emit a standalone header from every configuration entry.
fn generate_header(vm: &mut Vm, config: Obj, output_format: &str, macro_name: Option<&str>) -> String {
    let entries = match vm.wk.store.get(config) {
        Value::ConfigurationData(cd) => cd.values.clone(),
        _ => Default::default(),
    };
    let mut out = String::new();
    out.push_str("/*\n * Autogenerated by the build configuration system.\n * Do not edit, your changes will be lost.\n */\n\n");
    if let Some(guard) = macro_name {
        out.push_str(&format!("#ifndef {}\n#define {}\n\n", guard, guard));
    }
    let (define, undef) = match output_format {
        "nasm" => ("%define", "%undef"),
        _ => ("#define", "#undef"),
    };
    for (key, (value, desc)) in entries {
        if let Some(desc) = desc {
            out.push_str(&format!("/* {} */\n", desc));
        }
        match vm.wk.store.get(value) {
            Value::Bool(true) => out.push_str(&format!("{} {}\n\n", define, key)),
            Value::Bool(false) => out.push_str(&format!("{} {}\n\n", undef, key)),
            Value::Str(id) => {
                let s = vm.wk.store.str_value(*id).to_string();
                out.push_str(&format!("{} {} {}\n\n", define, key, s));
            }
            Value::Number(n) => out.push_str(&format!("{} {} {}\n\n", define, key, n)),
            _ => {}
        }
    }
    if macro_name.is_some() {
        out.push_str("#endif\n");
    }
    out
}

fn single_input(vm: &mut Vm, b: &BoundArgs) -> InterpResult<Option<String>> {
    match b.kw("input") {
        Some(value) => {
            let files = coerce::files(vm.wk, value).map_err(|e| e.or_at(b.kw_span("input")))?;
            match files.first() {
                Some(&f) => Ok(Some(vm.wk.store.file_path(f).to_string())),
                None => Ok(None),
            }
        }
        None => Ok(None),
    }
}

pub fn func_configure_file(vm: &mut Vm, _this: Obj, args: &Args) -> InterpResult<Obj> {
    ensure_configured(vm, args.span)?;
    let Some(b) = ArgParser::new("configure_file")
        .kw("input", TAG_LISTIFY | TC_COERCIBLE_FILES)
        .kw("output", TC_STRING)
        .kw("configuration", TC_CONFIGURATION_DATA | TC_DICT)
        .kw("command", TC_COMMAND_ARRAY)
        .kw("copy", TC_BOOL)
        .kw("capture", TC_BOOL)
        .kw("install", TC_BOOL)
        .kw("install_dir", TC_STRING)
        .kw("install_mode", TC_INSTALL_MODE_KW)
        .kw("install_tag", TC_STRING)
        .kw("format", TC_STRING)
        .kw("output_format", TC_STRING)
        .kw("macro_name", TC_STRING)
        .kw("encoding", TC_STRING)
        .bind(vm, args)?
        .into_bound()
    else {
        return Ok(Obj::DISABLER);
    };

    let output = b
        .kw_str(&vm.wk.store, "output")
        .ok_or_else(|| usage_error("configure_file requires the output keyword").at(args.span))?;
    if output.contains('/') {
        return Err(usage_error("output must be a plain filename").at(b.kw_span("output")));
    }

    let modes = [
        b.kw("configuration").is_some(),
        b.kw("command").is_some(),
        b.kw_bool(&vm.wk.store, "copy", false),
    ];
    if modes.iter().filter(|&&m| m).count() != 1 {
        return Err(usage_error(
            "configure_file requires exactly one of configuration, command or copy",
        )
        .at(args.span));
    }

    if let Some(format) = b.kw_str(&vm.wk.store, "format") {
        if format != "meson" {
            return Err(InterpError::new(
                ErrorKind::OptionValidation,
                format!("unsupported template format '{}'", format),
            )
            .at(b.kw_span("format")));
        }
    }
    let output_format = b
        .kw_str(&vm.wk.store, "output_format")
        .unwrap_or_else(|| "c".to_string());
    if output_format != "c" && output_format != "nasm" {
        return Err(InterpError::new(
            ErrorKind::OptionValidation,
            format!("unsupported output_format '{}'", output_format),
        )
        .at(b.kw_span("output_format")));
    }

    let input = single_input(vm, &b)?;
    // Output names may refer to the input name.
    let output = match &input {
        Some(path) => {
            let plain = path.rsplit('/').next().unwrap_or(path);
            let base = plain.rsplit_once('.').map(|(s, _)| s).unwrap_or(plain);
            output.replace("@PLAINNAME@", plain).replace("@BASENAME@", base)
        }
        None => output,
    };
    let cwd = vm.wk.current_project().cwd.clone();
    let out_path = vm.wk.build_path(&Workspace::join_rel(&cwd, &output));

    if let Some(config) = b.kw("configuration") {
        let contents = match &input {
            Some(path) => {
                let template = vm.wk.fs.read_to_string(path).map_err(|e| {
                    InterpError::new(ErrorKind::Io, e.to_string()).at(b.kw_span("input"))
                })?;
                substitute_config(vm, &template, config, args.span)?
            }
            None => {
                let macro_name = b.kw_str(&vm.wk.store, "macro_name");
                generate_header(vm, config, &output_format, macro_name.as_deref())
            }
        };
        vm.wk
            .fs
            .write_if_changed(&out_path, &contents)
            .map_err(|e| InterpError::new(ErrorKind::Io, e.to_string()).at(args.span))?;
        // The data is frozen once consumed.
        if let Value::ConfigurationData(cd) = vm.wk.store.get_mut(config) {
            cd.used = true;
        }
    } else if b.kw_bool(&vm.wk.store, "copy", false) {
        let path = input.clone().ok_or_else(|| {
            usage_error("configure_file with copy requires an input").at(args.span)
        })?;
        let contents = vm
            .wk
            .fs
            .read_to_string(&path)
            .map_err(|e| InterpError::new(ErrorKind::Io, e.to_string()).at(b.kw_span("input")))?;
        vm.wk
            .fs
            .write_if_changed(&out_path, &contents)
            .map_err(|e| InterpError::new(ErrorKind::Io, e.to_string()).at(args.span))?;
    } else {
        // Command mode: run, optionally capturing stdout into the output.
        let mut argv = Vec::new();
        for obj in b.kw_objs(&vm.wk.store, "command") {
            match coerce::exe_path(vm.wk, obj) {
                Some(path) => argv.push(path),
                None => argv.extend(coerce::string_list(vm.wk, obj)?),
            }
        }
        let argv: Vec<String> = argv
            .into_iter()
            .map(|a| {
                let a = match &input {
                    Some(path) => a.replace("@INPUT@", path),
                    None => a,
                };
                a.replace("@OUTPUT@", &out_path)
            })
            .collect();
        let cwd_abs = vm.wk.current_source_dir();
        let result = vm
            .wk
            .runner
            .run(&argv, &[], &cwd_abs)
            .map_err(|e| InterpError::new(ErrorKind::Io, e).at(args.span))?;
        if result.status != 0 {
            return Err(usage_error(format!(
                "configure_file command failed with status {}",
                result.status
            ))
            .at(args.span));
        }
        if b.kw_bool(&vm.wk.store, "capture", false) {
            vm.wk
                .fs
                .write_if_changed(&out_path, &result.stdout)
                .map_err(|e| InterpError::new(ErrorKind::Io, e.to_string()).at(args.span))?;
        }
    }

    if b.kw_bool(&vm.wk.store, "install", false) {
        let install_dir = b.kw_str(&vm.wk.store, "install_dir").ok_or_else(|| {
            usage_error("configure_file with install requires install_dir").at(args.span)
        })?;
        let mode_objs = b.kw_objs(&vm.wk.store, "install_mode");
        let mode = coerce::install_mode(vm.wk, &mode_objs);
        let dest = install::resolve_dest(vm.wk, &install_dir, &output);
        install::push_entry(
            vm.wk,
            InstallTarget {
                src: out_path.clone(),
                dest,
                mode,
                tag: b.kw_str(&vm.wk.store, "install_tag"),
                flavor: InstallFlavor::Data,
            },
        );
    }

    Ok(vm.wk.store.new_file(&out_path))
}
