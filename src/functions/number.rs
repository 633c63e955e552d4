//! Number Methods

use crate::diagnostics::InterpResult;
use crate::functions::FuncImpl;
use crate::object::Obj;
use crate::typecheck::args::ArgParser;
use crate::typecheck::{TC_BOOL, TC_STRING};
use crate::vm::{Args, Vm};

fn this_num(vm: &Vm, this: Obj) -> i64 {
    vm.wk.store.as_number(this).expect("receiver typechecked by dispatch")
}

fn func_to_string(vm: &mut Vm, this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(_b) = ArgParser::new("to_string").bind(vm, args)?.into_bound() else {
        return Ok(Obj::DISABLER);
    };
    let s = this_num(vm, this).to_string();
    Ok(vm.wk.store.new_str(&s))
}

fn func_is_even(vm: &mut Vm, this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(_b) = ArgParser::new("is_even").bind(vm, args)?.into_bound() else {
        return Ok(Obj::DISABLER);
    };
    let result = this_num(vm, this) % 2 == 0;
    Ok(vm.wk.store.new_bool(result))
}

fn func_is_odd(vm: &mut Vm, this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(_b) = ArgParser::new("is_odd").bind(vm, args)?.into_bound() else {
        return Ok(Obj::DISABLER);
    };
    let result = this_num(vm, this) % 2 != 0;
    Ok(vm.wk.store.new_bool(result))
}

pub const METHODS: &[FuncImpl] = &[
    FuncImpl::new("is_even", func_is_even, TC_BOOL),
    FuncImpl::new("is_odd", func_is_odd, TC_BOOL),
    FuncImpl::new("to_string", func_to_string, TC_STRING),
];
