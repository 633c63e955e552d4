//! Build Target Methods

use crate::diagnostics::InterpResult;
use crate::functions::FuncImpl;
use crate::object::{IncludeDirectory, Obj, Value};
use crate::typecheck::args::ArgParser;
use crate::typecheck::{TAG_GLOB, TC_BOOL, TC_COERCIBLE_FILES, TC_INCLUDE_DIRECTORY, TC_STRING};
use crate::vm::{Args, Vm};

fn this_target<'a>(vm: &'a Vm<'_>, this: Obj) -> &'a crate::object::BuildTarget {
    match vm.wk.store.get(this) {
        Value::BuildTarget(bt) => bt,
        _ => unreachable!("receiver typechecked by dispatch"),
    }
}

fn func_name(vm: &mut Vm, this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(_b) = ArgParser::new("name").bind(vm, args)?.into_bound() else {
        return Ok(Obj::DISABLER);
    };
    let name = this_target(vm, this).name.clone();
    Ok(vm.wk.store.new_str(&name))
}

fn func_full_path(vm: &mut Vm, this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(_b) = ArgParser::new("full_path").bind(vm, args)?.into_bound() else {
        return Ok(Obj::DISABLER);
    };
    let path = this_target(vm, this).output_path.clone();
    Ok(vm.wk.store.new_str(&path))
}

fn func_found(vm: &mut Vm, this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(_b) = ArgParser::new("found").bind(vm, args)?.into_bound() else {
        return Ok(Obj::DISABLER);
    };
    let _ = this;
    Ok(Obj::TRUE)
}

fn func_private_dir_include(vm: &mut Vm, this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(_b) = ArgParser::new("private_dir_include").bind(vm, args)?.into_bound() else {
        return Ok(Obj::DISABLER);
    };
    let dir = this_target(vm, this).private_dir.clone();
    Ok(vm.wk.store.push(Value::IncludeDirectory(Box::new(IncludeDirectory {
        paths: vec![dir],
        is_system: false,
    }))))
}

/// The selected sources re-expressed as object files for consumers.
fn func_extract_objects(vm: &mut Vm, this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(b) = ArgParser::new("extract_objects")
        .glob("sources", TAG_GLOB | TC_COERCIBLE_FILES)
        .bind(vm, args)?
        .into_bound()
    else {
        return Ok(Obj::DISABLER);
    };
    let mut picked = Vec::new();
    for arg in b.glob() {
        let mut coerced = crate::typecheck::coerce::files(vm.wk, arg.val)
            .map_err(|e| e.or_at(arg.span))?;
        picked.append(&mut coerced);
    }
    Ok(vm.wk.store.new_array(picked))
}

fn func_extract_all_objects(vm: &mut Vm, this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(b) = ArgParser::new("extract_all_objects")
        .kw("recursive", TC_BOOL)
        .bind(vm, args)?
        .into_bound()
    else {
        return Ok(Obj::DISABLER);
    };
    let _ = b.kw("recursive");
    let target = this_target(vm, this);
    let mut all = target.objects.clone();
    all.extend(target.sources.iter().copied());
    Ok(vm.wk.store.new_array(all))
}

pub const METHODS: &[FuncImpl] = &[
    FuncImpl::new("extract_all_objects", func_extract_all_objects, 0),
    FuncImpl::new("extract_objects", func_extract_objects, 0),
    FuncImpl::new("found", func_found, TC_BOOL),
    FuncImpl::new("full_path", func_full_path, TC_STRING),
    FuncImpl::new("name", func_name, TC_STRING),
    FuncImpl::new("private_dir_include", func_private_dir_include, TC_INCLUDE_DIRECTORY),
];
