//! Custom Target Methods

use crate::diagnostics::InterpResult;
use crate::functions::FuncImpl;
use crate::object::{Obj, Value};
use crate::typecheck::args::ArgParser;
use crate::typecheck::TC_STRING;
use crate::vm::{Args, Vm};

fn func_full_path(vm: &mut Vm, this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(_b) = ArgParser::new("full_path").bind(vm, args)?.into_bound() else {
        return Ok(Obj::DISABLER);
    };
    let first = match vm.wk.store.get(this) {
        Value::CustomTarget(ct) => ct.outputs.first().copied(),
        _ => unreachable!("receiver typechecked by dispatch"),
    };
    let path = first
        .and_then(|o| vm.wk.store.path_like(o).map(|s| s.to_string()))
        .unwrap_or_default();
    Ok(vm.wk.store.new_str(&path))
}

fn func_to_list(vm: &mut Vm, this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(_b) = ArgParser::new("to_list").bind(vm, args)?.into_bound() else {
        return Ok(Obj::DISABLER);
    };
    let outputs = match vm.wk.store.get(this) {
        Value::CustomTarget(ct) => ct.outputs.clone(),
        _ => unreachable!("receiver typechecked by dispatch"),
    };
    Ok(vm.wk.store.new_array(outputs))
}

pub const METHODS: &[FuncImpl] = &[
    FuncImpl::new("full_path", func_full_path, TC_STRING),
    FuncImpl::new("to_list", func_to_list, 0),
];
