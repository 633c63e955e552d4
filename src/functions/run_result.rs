//! Run Result Methods

use crate::diagnostics::InterpResult;
use crate::functions::FuncImpl;
use crate::object::{Obj, Value};
use crate::typecheck::args::ArgParser;
use crate::typecheck::{TC_BOOL, TC_NUMBER, TC_STRING};
use crate::vm::{Args, Vm};

fn this_result<'a>(vm: &'a Vm<'_>, this: Obj) -> &'a crate::object::RunResult {
    match vm.wk.store.get(this) {
        Value::RunResult(r) => r,
        _ => unreachable!("receiver typechecked by dispatch"),
    }
}

fn func_returncode(vm: &mut Vm, this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(_b) = ArgParser::new("returncode").bind(vm, args)?.into_bound() else {
        return Ok(Obj::DISABLER);
    };
    let code = this_result(vm, this).returncode;
    Ok(vm.wk.store.new_number(code))
}

fn func_stdout(vm: &mut Vm, this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(_b) = ArgParser::new("stdout").bind(vm, args)?.into_bound() else {
        return Ok(Obj::DISABLER);
    };
    let out = this_result(vm, this).stdout.clone();
    Ok(vm.wk.store.new_str(&out))
}

fn func_stderr(vm: &mut Vm, this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(_b) = ArgParser::new("stderr").bind(vm, args)?.into_bound() else {
        return Ok(Obj::DISABLER);
    };
    let err = this_result(vm, this).stderr.clone();
    Ok(vm.wk.store.new_str(&err))
}

fn func_compiled(vm: &mut Vm, this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(_b) = ArgParser::new("compiled").bind(vm, args)?.into_bound() else {
        return Ok(Obj::DISABLER);
    };
    let compiled = this_result(vm, this).compiled.unwrap_or(false);
    Ok(vm.wk.store.new_bool(compiled))
}

pub const METHODS: &[FuncImpl] = &[
    FuncImpl::new("compiled", func_compiled, TC_BOOL),
    FuncImpl::new("returncode", func_returncode, TC_NUMBER),
    FuncImpl::new("stderr", func_stderr, TC_STRING),
    FuncImpl::new("stdout", func_stdout, TC_STRING),
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::RunResult;
    use crate::workspace::Workspace;

    fn setup_with_result() -> (Workspace, Obj) {
        let mut wk = Workspace::in_memory();
        let idx = wk.push_project("", None);
        wk.cur_project = idx;
        let result = wk.store.push(Value::RunResult(Box::new(RunResult {
            returncode: 3,
            stdout: "out\n".to_string(),
            stderr: "err\n".to_string(),
            compiled: None,
        })));
        (wk, result)
    }

    #[test]
    fn test_accessors() {
        let (mut wk, result) = setup_with_result();
        let mut vm = Vm::new(&mut wk);
        let code = func_returncode(&mut vm, result, &Args::default()).unwrap();
        assert_eq!(vm.wk.store.as_number(code), Some(3));
        let out = func_stdout(&mut vm, result, &Args::default()).unwrap();
        assert_eq!(vm.wk.store.as_str(out), Some("out\n"));
        let err = func_stderr(&mut vm, result, &Args::default()).unwrap();
        assert_eq!(vm.wk.store.as_str(err), Some("err\n"));
    }

    #[test]
    fn test_compiled_defaults_false_for_command_results() {
        let (mut wk, result) = setup_with_result();
        let mut vm = Vm::new(&mut wk);
        assert_eq!(func_compiled(&mut vm, result, &Args::default()).unwrap(), Obj::FALSE);
    }
}
