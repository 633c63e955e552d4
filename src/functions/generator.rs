//! Generator Methods
//!
//! `process()` instantiates the generator once per input file, registering
//! one custom target each and collecting their outputs into a generated
//! list.

use crate::diagnostics::InterpResult;
use crate::functions::kernel::custom_target::{expand_placeholders, PlaceholderCtx};
use crate::functions::FuncImpl;
use crate::object::{CustomTarget, GeneratedList, Obj, Value};
use crate::typecheck::args::ArgParser;
use crate::typecheck::{coerce, TAG_GLOB, TAG_LISTIFY, TC_COERCIBLE_ENV, TC_COERCIBLE_FILES, TC_GENERATED_LIST, TC_STRING};
use crate::vm::{Args, Vm};
use crate::workspace::Workspace;

fn file_stem(path: &str) -> (&str, &str) {
    let plain = path.rsplit('/').next().unwrap_or(path);
    let base = plain.rsplit_once('.').map(|(b, _)| b).unwrap_or(plain);
    (plain, base)
}

fn func_process(vm: &mut Vm, this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(b) = ArgParser::new("process")
        .glob("inputs", TAG_GLOB | TC_COERCIBLE_FILES)
        .kw("extra_args", TAG_LISTIFY | TC_STRING)
        .kw("preserve_path_from", TC_STRING)
        .kw("env", TC_COERCIBLE_ENV)
        .bind(vm, args)?
        .into_bound()
    else {
        return Ok(Obj::DISABLER);
    };
    let generator = match vm.wk.store.get(this) {
        Value::Generator(g) => (**g).clone(),
        _ => unreachable!("receiver typechecked by dispatch"),
    };
    let extra_args = b.kw_strs(&vm.wk.store, "extra_args");

    let mut inputs = Vec::new();
    for arg in b.glob() {
        let mut coerced = coerce::files(vm.wk, arg.val).map_err(|e| e.or_at(arg.span))?;
        inputs.append(&mut coerced);
    }

    let exe = coerce::exe_path(vm.wk, generator.exe).unwrap_or_default();
    let outdir = vm.wk.current_build_dir();
    let cwd = vm.wk.current_project().cwd.clone();

    let mut targets = Vec::new();
    let mut all_outputs = Vec::new();
    for &input in &inputs {
        let input_path = vm.wk.store.file_path(input).to_string();
        let (plain, base) = file_stem(&input_path);
        let (plain, base) = (plain.to_string(), base.to_string());

        let outputs: Vec<String> = generator
            .output
            .iter()
            .map(|o| {
                let named =
                    o.replace("@PLAINNAME@", &plain).replace("@BASENAME@", &base);
                format!("{}/{}", outdir, named)
            })
            .collect();
        let depfile = generator.depfile.as_ref().map(|d| {
            let named = d.replace("@PLAINNAME@", &plain).replace("@BASENAME@", &base);
            format!("{}/{}", outdir, named)
        });

        let ctx = PlaceholderCtx {
            inputs: vec![input_path.clone()],
            outputs: outputs.clone(),
            outdir: outdir.clone(),
            depfile: depfile.clone(),
            private_dir: format!("{}/{}.p", outdir, plain),
            source_root: vm.wk.source_root.clone(),
            build_root: vm.wk.build_root.clone(),
            current_source_dir: vm.wk.current_source_dir(),
            extra_args: extra_args.clone(),
        };
        let mut command = vec![exe.clone()];
        let mut warnings = Vec::new();
        for arg in &generator.arguments {
            command.extend(expand_placeholders(arg, &ctx, &mut warnings));
        }
        for w in warnings {
            let span = args.span;
            vm.wk.diag.warning(Some(span), &w);
        }

        let output_objs: Vec<Obj> =
            outputs.iter().map(|o| vm.wk.store.new_file(o)).collect();
        all_outputs.extend(output_objs.iter().copied());

        let ct = CustomTarget {
            name: format!("{}@gen", plain),
            inputs: vec![input],
            outputs: output_objs,
            command,
            depfile,
            capture: generator.capture,
            feed: false,
            console: false,
            build_by_default: false,
            build_always_stale: false,
            depends: generator.depends.clone(),
            env: b.kw("env"),
            install: false,
            install_dir: None,
            private_dir: Workspace::join_rel(&cwd, &format!("{}.p", plain)),
        };
        let target = vm.wk.store.push(Value::CustomTarget(Box::new(ct)));
        vm.wk.current_project_mut().targets.push(target);
        targets.push(target);
    }

    Ok(vm.wk.store.push(Value::GeneratedList(Box::new(GeneratedList {
        generator: this,
        targets,
        outputs: all_outputs,
    }))))
}

pub const METHODS: &[FuncImpl] =
    &[FuncImpl::new("process", func_process, TC_GENERATED_LIST)];

/// Generated lists expose no methods; they are consumed by source lists.
pub const LIST_METHODS: &[FuncImpl] = &[];
