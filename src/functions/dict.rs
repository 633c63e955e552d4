//! Dict Methods

use crate::diagnostics::{bounds_error, InterpResult};
use crate::functions::FuncImpl;
use crate::object::Obj;
use crate::typecheck::args::ArgParser;
use crate::typecheck::{TC_ANY, TC_BOOL, TC_STRING};
use crate::vm::{Args, Vm};

fn func_has_key(vm: &mut Vm, this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(b) = ArgParser::new("has_key")
        .pos("key", TC_STRING)
        .bind(vm, args)?
        .into_bound()
    else {
        return Ok(Obj::DISABLER);
    };
    let key = vm.wk.store.get_str(b.pos(0)).to_string();
    let found = vm
        .wk
        .store
        .as_dict(this)
        .expect("receiver typechecked by dispatch")
        .contains_key(&key);
    Ok(vm.wk.store.new_bool(found))
}

fn func_keys(vm: &mut Vm, this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(_b) = ArgParser::new("keys").bind(vm, args)?.into_bound() else {
        return Ok(Obj::DISABLER);
    };
    let keys: Vec<String> = vm
        .wk
        .store
        .as_dict(this)
        .expect("receiver typechecked by dispatch")
        .keys()
        .cloned()
        .collect();
    let items: Vec<Obj> = keys.iter().map(|k| vm.wk.store.new_str(k)).collect();
    Ok(vm.wk.store.new_array(items))
}

fn func_get(vm: &mut Vm, this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(b) = ArgParser::new("get")
        .pos("key", TC_STRING)
        .opt_pos("fallback", TC_ANY)
        .bind(vm, args)?
        .into_bound()
    else {
        return Ok(Obj::DISABLER);
    };
    let key = vm.wk.store.get_str(b.pos(0)).to_string();
    let value = vm
        .wk
        .store
        .as_dict(this)
        .expect("receiver typechecked by dispatch")
        .get(&key)
        .copied();
    match value {
        Some(v) => Ok(v),
        None => match b.opt_pos(1) {
            Some(fallback) => Ok(fallback.val),
            None => {
                Err(bounds_error(format!("key '{}' not found in dict", key)).at(b.pos_span(0)))
            }
        },
    }
}

pub const METHODS: &[FuncImpl] = &[
    FuncImpl::new("get", func_get, 0),
    FuncImpl::new("has_key", func_has_key, TC_BOOL),
    FuncImpl::new("keys", func_keys, 0),
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Span;
    use crate::vm::ArgValue;
    use crate::workspace::Workspace;
    use indexmap::IndexMap;

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

    fn sample_dict(wk: &mut Workspace) -> Obj {
        let mut map = IndexMap::new();
        map.insert("z".to_string(), Obj::TRUE);
        map.insert("a".to_string(), Obj::FALSE);
        wk.store.new_dict(map)
    }

    #[test]
    fn test_has_key() {
        let mut wk = setup();
        let d = sample_dict(&mut wk);
        let present = wk.store.new_str("z");
        let absent = wk.store.new_str("q");
        let mut vm = Vm::new(&mut wk);
        assert_eq!(func_has_key(&mut vm, d, &args(&[present])).unwrap(), Obj::TRUE);
        assert_eq!(func_has_key(&mut vm, d, &args(&[absent])).unwrap(), Obj::FALSE);
    }

    #[test]
    fn test_keys_preserve_insertion_order() {
        let mut wk = setup();
        let d = sample_dict(&mut wk);
        let mut vm = Vm::new(&mut wk);
        let out = func_keys(&mut vm, d, &args(&[])).unwrap();
        let keys: Vec<&str> = vm
            .wk
            .store
            .as_array(out)
            .unwrap()
            .iter()
            .map(|&k| vm.wk.store.as_str(k).unwrap())
            .collect();
        assert_eq!(keys, ["z", "a"]);
    }

    #[test]
    fn test_get_fallback_and_miss() {
        let mut wk = setup();
        let d = sample_dict(&mut wk);
        let key = wk.store.new_str("missing");
        let fallback = wk.store.new_number(9);
        let mut vm = Vm::new(&mut wk);
        let out = func_get(&mut vm, d, &args(&[key, fallback])).unwrap();
        assert_eq!(vm.wk.store.as_number(out), Some(9));
        let err = func_get(&mut vm, d, &args(&[key])).unwrap_err();
        assert_eq!(err.kind, crate::diagnostics::ErrorKind::Bounds);
    }
}
