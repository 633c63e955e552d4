//! File Methods

use crate::diagnostics::InterpResult;
use crate::functions::FuncImpl;
use crate::object::Obj;
use crate::typecheck::args::ArgParser;
use crate::typecheck::TC_STRING;
use crate::vm::{Args, Vm};

fn func_full_path(vm: &mut Vm, this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(_b) = ArgParser::new("full_path").bind(vm, args)?.into_bound() else {
        return Ok(Obj::DISABLER);
    };
    let path = vm.wk.store.file_path(this).to_string();
    Ok(vm.wk.store.new_str(&path))
}

pub const METHODS: &[FuncImpl] =
    &[FuncImpl::new("full_path", func_full_path, TC_STRING)];
