//! Both-Libs Methods
//!
//! Accessors over the static/shared pair.

use crate::diagnostics::InterpResult;
use crate::functions::FuncImpl;
use crate::object::{Obj, Value};
use crate::typecheck::args::ArgParser;
use crate::typecheck::{TC_BUILD_TARGET, TC_STRING};
use crate::vm::{Args, Vm};

fn pair(vm: &Vm, this: Obj) -> (Obj, Obj) {
    match vm.wk.store.get(this) {
        Value::BothLibs { static_lib, shared_lib } => (*static_lib, *shared_lib),
        _ => unreachable!("receiver typechecked by dispatch"),
    }
}

fn func_get_static_lib(vm: &mut Vm, this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(_b) = ArgParser::new("get_static_lib").bind(vm, args)?.into_bound() else {
        return Ok(Obj::DISABLER);
    };
    Ok(pair(vm, this).0)
}

fn func_get_shared_lib(vm: &mut Vm, this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(_b) = ArgParser::new("get_shared_lib").bind(vm, args)?.into_bound() else {
        return Ok(Obj::DISABLER);
    };
    Ok(pair(vm, this).1)
}

fn func_name(vm: &mut Vm, this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(_b) = ArgParser::new("name").bind(vm, args)?.into_bound() else {
        return Ok(Obj::DISABLER);
    };
    let (_, shared) = pair(vm, this);
    let name = match vm.wk.store.get(shared) {
        Value::BuildTarget(bt) => bt.name.clone(),
        _ => String::new(),
    };
    Ok(vm.wk.store.new_str(&name))
}

pub const METHODS: &[FuncImpl] = &[
    FuncImpl::new("get_shared_lib", func_get_shared_lib, TC_BUILD_TARGET),
    FuncImpl::new("get_static_lib", func_get_static_lib, TC_BUILD_TARGET),
    FuncImpl::new("name", func_name, TC_STRING),
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{BuildTarget, TargetKind};
    use crate::vm::Args;
    use crate::workspace::Workspace;

    fn setup() -> (Workspace, Obj) {
        let mut wk = Workspace::in_memory();
        let idx = wk.push_project("", None);
        wk.cur_project = idx;
        let static_lib = BuildTarget {
            name: "thing".to_string(),
            kind: Some(TargetKind::StaticLibrary),
            ..Default::default()
        };
        let shared_lib = BuildTarget {
            name: "thing".to_string(),
            kind: Some(TargetKind::SharedLibrary),
            ..Default::default()
        };
        let static_lib = wk.store.push(Value::BuildTarget(Box::new(static_lib)));
        let shared_lib = wk.store.push(Value::BuildTarget(Box::new(shared_lib)));
        let both = wk.store.push(Value::BothLibs { static_lib, shared_lib });
        (wk, both)
    }

    #[test]
    fn test_accessors_pick_the_right_half() {
        let (mut wk, both) = setup();
        let mut vm = Vm::new(&mut wk);
        let s = func_get_static_lib(&mut vm, both, &Args::default()).unwrap();
        let sh = func_get_shared_lib(&mut vm, both, &Args::default()).unwrap();
        match (vm.wk.store.get(s), vm.wk.store.get(sh)) {
            (Value::BuildTarget(a), Value::BuildTarget(b)) => {
                assert_eq!(a.kind, Some(TargetKind::StaticLibrary));
                assert_eq!(b.kind, Some(TargetKind::SharedLibrary));
            }
            _ => panic!("both halves must be build targets"),
        }
    }

    #[test]
    fn test_name_comes_from_shared_half() {
        let (mut wk, both) = setup();
        let mut vm = Vm::new(&mut wk);
        let name = func_name(&mut vm, both, &Args::default()).unwrap();
        assert_eq!(vm.wk.store.as_str(name), Some("thing"));
    }
}
