//! Boolean Methods

use crate::diagnostics::InterpResult;
use crate::functions::FuncImpl;
use crate::object::Obj;
use crate::typecheck::args::ArgParser;
use crate::typecheck::{TC_NUMBER, TC_STRING};
use crate::vm::{Args, Vm};

fn func_to_string(vm: &mut Vm, this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(b) = ArgParser::new("to_string")
        .opt_pos("true_str", TC_STRING)
        .opt_pos("false_str", TC_STRING)
        .bind(vm, args)?
        .into_bound()
    else {
        return Ok(Obj::DISABLER);
    };
    let value = vm.wk.store.as_bool(this).expect("receiver typechecked by dispatch");
    let s = if value {
        b.opt_pos(0)
            .map(|a| vm.wk.store.get_str(a.val).to_string())
            .unwrap_or_else(|| "true".to_string())
    } else {
        b.opt_pos(1)
            .map(|a| vm.wk.store.get_str(a.val).to_string())
            .unwrap_or_else(|| "false".to_string())
    };
    Ok(vm.wk.store.new_str(&s))
}

fn func_to_int(vm: &mut Vm, this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(_b) = ArgParser::new("to_int").bind(vm, args)?.into_bound() else {
        return Ok(Obj::DISABLER);
    };
    let value = vm.wk.store.as_bool(this).expect("receiver typechecked by dispatch");
    Ok(vm.wk.store.new_number(if value { 1 } else { 0 }))
}

pub const METHODS: &[FuncImpl] = &[
    FuncImpl::new("to_int", func_to_int, TC_NUMBER),
    FuncImpl::new("to_string", func_to_string, TC_STRING),
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

    #[test]
    fn test_to_int() {
        let mut wk = setup();
        let mut vm = Vm::new(&mut wk);
        let one = func_to_int(&mut vm, Obj::TRUE, &Args::default()).unwrap();
        let zero = func_to_int(&mut vm, Obj::FALSE, &Args::default()).unwrap();
        assert_eq!(vm.wk.store.as_number(one), Some(1));
        assert_eq!(vm.wk.store.as_number(zero), Some(0));
    }

    #[test]
    fn test_to_string_defaults() {
        let mut wk = setup();
        let mut vm = Vm::new(&mut wk);
        let out = func_to_string(&mut vm, Obj::TRUE, &Args::default()).unwrap();
        assert_eq!(vm.wk.store.as_str(out), Some("true"));
    }

    #[test]
    fn test_to_string_custom_labels() {
        let mut wk = setup();
        let yes = wk.store.new_str("yes");
        let no = wk.store.new_str("no");
        let call = Args {
            pos: vec![
                ArgValue { val: yes, span: Span::default() },
                ArgValue { val: no, span: Span::default() },
            ],
            kwargs: Vec::new(),
            span: Span::default(),
        };
        let mut vm = Vm::new(&mut wk);
        let out = func_to_string(&mut vm, Obj::FALSE, &call).unwrap();
        assert_eq!(vm.wk.store.as_str(out), Some("no"));
    }
}
