//! Environment Object Methods
//!
//! One of the few mutable wrappers: set/append/prepend/unset edit the
//! receiver in place.

use crate::diagnostics::InterpResult;
use crate::functions::FuncImpl;
use crate::object::{EnvAction, Obj, Value};
use crate::typecheck::args::ArgParser;
use crate::typecheck::{TAG_GLOB, TC_ENVIRONMENT, TC_NUMBER, TC_STRING};
use crate::vm::{Args, Vm};

fn edit(vm: &mut Vm, this: Obj, args: &Args, action: EnvAction, fname: &str) -> InterpResult<Obj> {
    let Some(b) = ArgParser::new(fname)
        .pos("name", TC_STRING)
        .glob("values", TAG_GLOB | TC_STRING | TC_NUMBER)
        .kw("separator", TC_STRING)
        .bind(vm, args)?
        .into_bound()
    else {
        return Ok(Obj::DISABLER);
    };
    let name = vm.wk.store.get_str(b.pos(0)).to_string();
    let separator = b.kw_str(&vm.wk.store, "separator").unwrap_or_else(|| ":".to_string());
    let values: Vec<String> = b
        .glob()
        .iter()
        .map(|a| vm.wk.store.render_plain(a.val))
        .collect();
    match vm.wk.store.get_mut(this) {
        Value::Environment(env) => {
            match action {
                EnvAction::Set => {
                    env.entries.insert(name, (EnvAction::Set, values, separator));
                }
                EnvAction::Append | EnvAction::Prepend => {
                    let entry = env.entries.entry(name).or_insert_with(|| {
                        (action, Vec::new(), separator.clone())
                    });
                    match action {
                        EnvAction::Append => entry.1.extend(values),
                        _ => {
                            let mut combined = values;
                            combined.extend(entry.1.drain(..));
                            entry.1 = combined;
                        }
                    }
                    entry.2 = separator;
                }
            }
            Ok(this)
        }
        _ => unreachable!("receiver typechecked by dispatch"),
    }
}

fn func_set(vm: &mut Vm, this: Obj, args: &Args) -> InterpResult<Obj> {
    edit(vm, this, args, EnvAction::Set, "set")
}

fn func_append(vm: &mut Vm, this: Obj, args: &Args) -> InterpResult<Obj> {
    edit(vm, this, args, EnvAction::Append, "append")
}

fn func_prepend(vm: &mut Vm, this: Obj, args: &Args) -> InterpResult<Obj> {
    edit(vm, this, args, EnvAction::Prepend, "prepend")
}

fn func_unset(vm: &mut Vm, this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(b) = ArgParser::new("unset")
        .pos("name", TC_STRING)
        .bind(vm, args)?
        .into_bound()
    else {
        return Ok(Obj::DISABLER);
    };
    let name = vm.wk.store.get_str(b.pos(0)).to_string();
    match vm.wk.store.get_mut(this) {
        Value::Environment(env) => {
            env.entries.shift_remove(&name);
            Ok(this)
        }
        _ => unreachable!("receiver typechecked by dispatch"),
    }
}

pub const METHODS: &[FuncImpl] = &[
    FuncImpl::new("append", func_append, TC_ENVIRONMENT),
    FuncImpl::new("prepend", func_prepend, TC_ENVIRONMENT),
    FuncImpl::new("set", func_set, TC_ENVIRONMENT),
    FuncImpl::new("unset", func_unset, TC_ENVIRONMENT),
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Span;
    use crate::object::EnvironmentData;
    use crate::vm::ArgValue;
    use crate::workspace::Workspace;

    fn setup() -> Workspace {
        let mut wk = Workspace::in_memory();
        let idx = wk.push_project("", None);
        wk.cur_project = idx;
        wk
    }

    fn env(wk: &mut Workspace) -> Obj {
        wk.store.push(Value::Environment(Box::new(EnvironmentData::default())))
    }

    fn args(vals: &[Obj]) -> Args {
        Args {
            pos: vals.iter().map(|&v| ArgValue { val: v, span: Span::default() }).collect(),
            kwargs: Vec::new(),
            span: Span::default(),
        }
    }

    fn entry(wk: &Workspace, e: Obj, name: &str) -> (EnvAction, Vec<String>, String) {
        match wk.store.get(e) {
            Value::Environment(data) => data.entries[name].clone(),
            other => panic!("expected environment, got {:?}", other.obj_type()),
        }
    }

    #[test]
    fn test_set_replaces() {
        let mut wk = setup();
        let e = env(&mut wk);
        let name = wk.store.new_str("PATH");
        let a = wk.store.new_str("/a");
        let b = wk.store.new_str("/b");
        let mut vm = Vm::new(&mut wk);
        func_set(&mut vm, e, &args(&[name, a])).unwrap();
        func_set(&mut vm, e, &args(&[name, b])).unwrap();
        let (action, values, sep) = entry(vm.wk, e, "PATH");
        assert_eq!(action, EnvAction::Set);
        assert_eq!(values, ["/b"]);
        assert_eq!(sep, ":");
    }

    #[test]
    fn test_append_accumulates() {
        let mut wk = setup();
        let e = env(&mut wk);
        let name = wk.store.new_str("FLAGS");
        let a = wk.store.new_str("-a");
        let b = wk.store.new_str("-b");
        let mut vm = Vm::new(&mut wk);
        func_append(&mut vm, e, &args(&[name, a])).unwrap();
        func_append(&mut vm, e, &args(&[name, b])).unwrap();
        let (_, values, _) = entry(vm.wk, e, "FLAGS");
        assert_eq!(values, ["-a", "-b"]);
    }

    #[test]
    fn test_prepend_puts_new_values_first() {
        let mut wk = setup();
        let e = env(&mut wk);
        let name = wk.store.new_str("FLAGS");
        let a = wk.store.new_str("-a");
        let b = wk.store.new_str("-b");
        let mut vm = Vm::new(&mut wk);
        func_prepend(&mut vm, e, &args(&[name, a])).unwrap();
        func_prepend(&mut vm, e, &args(&[name, b])).unwrap();
        let (_, values, _) = entry(vm.wk, e, "FLAGS");
        assert_eq!(values, ["-b", "-a"]);
    }

    #[test]
    fn test_custom_separator() {
        let mut wk = setup();
        let e = env(&mut wk);
        let name = wk.store.new_str("LIST");
        let a = wk.store.new_str("x");
        let sep = wk.store.new_str(";");
        let call = Args {
            pos: vec![
                ArgValue { val: name, span: Span::default() },
                ArgValue { val: a, span: Span::default() },
            ],
            kwargs: vec![(
                "separator".to_string(),
                ArgValue { val: sep, span: Span::default() },
            )],
            span: Span::default(),
        };
        let mut vm = Vm::new(&mut wk);
        func_set(&mut vm, e, &call).unwrap();
        let (_, _, sep) = entry(vm.wk, e, "LIST");
        assert_eq!(sep, ";");
    }

    #[test]
    fn test_unset_removes() {
        let mut wk = setup();
        let e = env(&mut wk);
        let name = wk.store.new_str("GONE");
        let a = wk.store.new_str("v");
        let mut vm = Vm::new(&mut wk);
        func_set(&mut vm, e, &args(&[name, a])).unwrap();
        func_unset(&mut vm, e, &args(&[name])).unwrap();
        match vm.wk.store.get(e) {
            Value::Environment(data) => assert!(data.entries.is_empty()),
            other => panic!("expected environment, got {:?}", other.obj_type()),
        }
    }
}
