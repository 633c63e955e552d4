//! Array Methods

use crate::diagnostics::{bounds_error, InterpResult};
use crate::functions::FuncImpl;
use crate::object::Obj;
use crate::typecheck::args::ArgParser;
use crate::typecheck::{bounds_adjust, TC_ANY, TC_BOOL, TC_NUMBER};
use crate::vm::{Args, Vm};

fn this_items(vm: &Vm, this: Obj) -> Vec<Obj> {
    vm.wk.store.as_array(this).expect("receiver typechecked by dispatch").to_vec()
}

fn func_length(vm: &mut Vm, this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(_b) = ArgParser::new("length").bind(vm, args)?.into_bound() else {
        return Ok(Obj::DISABLER);
    };
    let len = this_items(vm, this).len() as i64;
    Ok(vm.wk.store.new_number(len))
}

fn func_contains(vm: &mut Vm, this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(b) = ArgParser::new("contains")
        .pos("item", TC_ANY)
        .disabler_immune()
        .bind(vm, args)?
        .into_bound()
    else {
        return Ok(Obj::DISABLER);
    };
    let needle = b.pos(0);
    let found = this_items(vm, this).iter().any(|&o| vm.wk.store.obj_equal(o, needle));
    Ok(vm.wk.store.new_bool(found))
}

fn func_get(vm: &mut Vm, this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(b) = ArgParser::new("get")
        .pos("index", TC_NUMBER)
        .opt_pos("fallback", TC_ANY)
        .bind(vm, args)?
        .into_bound()
    else {
        return Ok(Obj::DISABLER);
    };
    let items = this_items(vm, this);
    let index = vm.wk.store.as_number(b.pos(0)).expect("typechecked");
    match bounds_adjust(items.len(), index) {
        Some(i) => Ok(items[i]),
        None => match b.opt_pos(1) {
            Some(fallback) => Ok(fallback.val),
            None => Err(bounds_error(format!(
                "index {} out of bounds for array of length {}",
                index,
                items.len()
            ))
            .at(b.pos_span(0))),
        },
    }
}

pub const METHODS: &[FuncImpl] = &[
    FuncImpl::new("contains", func_contains, TC_BOOL),
    FuncImpl::new("get", func_get, 0),
    FuncImpl::new("length", func_length, TC_NUMBER),
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Span;
    use crate::vm::ArgValue;
    use crate::workspace::Workspace;

    fn setup() -> Workspace {
        let mut wk = Workspace::in_memory();
        let idx = wk.push_project("", None);
        wk.cur_project = idx;
        wk
    }

    fn args(vals: &[Obj]) -> Args {
        Args {
            pos: vals.iter().map(|&v| ArgValue { val: v, span: Span::default() }).collect(),
            kwargs: Vec::new(),
            span: Span::default(),
        }
    }

    #[test]
    fn test_length() {
        let mut wk = setup();
        let one = wk.store.new_number(1);
        let arr = wk.store.new_array(vec![one, Obj::TRUE]);
        let mut vm = Vm::new(&mut wk);
        let out = func_length(&mut vm, arr, &args(&[])).unwrap();
        assert_eq!(vm.wk.store.as_number(out), Some(2));
    }

    #[test]
    fn test_contains_uses_structural_equality() {
        let mut wk = setup();
        let a = wk.store.new_str("x");
        let arr = wk.store.new_array(vec![a]);
        let other = wk.store.new_str("x");
        let missing = wk.store.new_str("y");
        let mut vm = Vm::new(&mut wk);
        assert_eq!(func_contains(&mut vm, arr, &args(&[other])).unwrap(), Obj::TRUE);
        assert_eq!(func_contains(&mut vm, arr, &args(&[missing])).unwrap(), Obj::FALSE);
    }

    #[test]
    fn test_get_with_negative_index() {
        let mut wk = setup();
        let one = wk.store.new_number(1);
        let two = wk.store.new_number(2);
        let arr = wk.store.new_array(vec![one, two]);
        let index = wk.store.new_number(-1);
        let mut vm = Vm::new(&mut wk);
        let out = func_get(&mut vm, arr, &args(&[index])).unwrap();
        assert_eq!(vm.wk.store.as_number(out), Some(2));
    }

    #[test]
    fn test_get_fallback_and_bounds() {
        let mut wk = setup();
        let arr = wk.store.new_array(vec![]);
        let index = wk.store.new_number(3);
        let fallback = wk.store.new_str("default");
        let mut vm = Vm::new(&mut wk);
        let out = func_get(&mut vm, arr, &args(&[index, fallback])).unwrap();
        assert_eq!(vm.wk.store.as_str(out), Some("default"));
        let err = func_get(&mut vm, arr, &args(&[index])).unwrap_err();
        assert_eq!(err.kind, crate::diagnostics::ErrorKind::Bounds);
    }
}
