//! Configuration Data Methods
//!
//! Mutable until first consumed by configure_file; afterwards frozen.

use crate::diagnostics::{bounds_error, type_error, InterpResult};
use crate::functions::FuncImpl;
use crate::object::{Obj, Value};
use crate::typecheck::args::ArgParser;
use crate::typecheck::{TC_ANY, TC_BOOL, TC_CONFIGURATION_DATA, TC_NUMBER, TC_STRING};
use crate::vm::{Args, Vm};

fn check_frozen(vm: &Vm, this: Obj, args: &Args) -> InterpResult<()> {
    match vm.wk.store.get(this) {
        Value::ConfigurationData(cd) if cd.used => Err(type_error(
            "configuration data can not be modified after it has been used",
        )
        .at(args.span)),
        _ => Ok(()),
    }
}

fn set_entry(vm: &mut Vm, this: Obj, key: String, value: Obj, desc: Option<String>) {
    match vm.wk.store.get_mut(this) {
        Value::ConfigurationData(cd) => {
            cd.values.insert(key, (value, desc));
        }
        _ => unreachable!("receiver typechecked by dispatch"),
    }
}

fn func_set(vm: &mut Vm, this: Obj, args: &Args) -> InterpResult<Obj> {
    check_frozen(vm, this, args)?;
    let Some(b) = ArgParser::new("set")
        .pos("name", TC_STRING)
        .pos("value", TC_STRING | TC_BOOL | TC_NUMBER)
        .kw("description", TC_STRING)
        .bind(vm, args)?
        .into_bound()
    else {
        return Ok(Obj::DISABLER);
    };
    let key = vm.wk.store.get_str(b.pos(0)).to_string();
    let desc = b.kw_str(&vm.wk.store, "description");
    set_entry(vm, this, key, b.pos(1), desc);
    Ok(Obj::NULL)
}

fn func_set10(vm: &mut Vm, this: Obj, args: &Args) -> InterpResult<Obj> {
    check_frozen(vm, this, args)?;
    let Some(b) = ArgParser::new("set10")
        .pos("name", TC_STRING)
        .pos("value", TC_BOOL | TC_NUMBER)
        .kw("description", TC_STRING)
        .bind(vm, args)?
        .into_bound()
    else {
        return Ok(Obj::DISABLER);
    };
    let key = vm.wk.store.get_str(b.pos(0)).to_string();
    let truthy = match vm.wk.store.get(b.pos(1)) {
        Value::Bool(v) => *v,
        Value::Number(n) => *n != 0,
        _ => unreachable!("typechecked"),
    };
    let value = vm.wk.store.new_number(if truthy { 1 } else { 0 });
    let desc = b.kw_str(&vm.wk.store, "description");
    set_entry(vm, this, key, value, desc);
    Ok(Obj::NULL)
}

fn func_set_quoted(vm: &mut Vm, this: Obj, args: &Args) -> InterpResult<Obj> {
    check_frozen(vm, this, args)?;
    let Some(b) = ArgParser::new("set_quoted")
        .pos("name", TC_STRING)
        .pos("value", TC_STRING)
        .kw("description", TC_STRING)
        .bind(vm, args)?
        .into_bound()
    else {
        return Ok(Obj::DISABLER);
    };
    let key = vm.wk.store.get_str(b.pos(0)).to_string();
    let raw = vm.wk.store.get_str(b.pos(1)).to_string();
    let quoted = format!("\"{}\"", raw.replace('\\', "\\\\").replace('"', "\\\""));
    let value = vm.wk.store.new_str(&quoted);
    let desc = b.kw_str(&vm.wk.store, "description");
    set_entry(vm, this, key, value, desc);
    Ok(Obj::NULL)
}

fn lookup(vm: &Vm, this: Obj, key: &str) -> Option<Obj> {
    match vm.wk.store.get(this) {
        Value::ConfigurationData(cd) => cd.values.get(key).map(|(v, _)| *v),
        _ => None,
    }
}

fn func_get(vm: &mut Vm, this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(b) = ArgParser::new("get")
        .pos("name", TC_STRING)
        .opt_pos("fallback", TC_ANY)
        .bind(vm, args)?
        .into_bound()
    else {
        return Ok(Obj::DISABLER);
    };
    let key = vm.wk.store.get_str(b.pos(0)).to_string();
    match lookup(vm, this, &key) {
        Some(v) => Ok(v),
        None => match b.opt_pos(1) {
            Some(fallback) => Ok(fallback.val),
            None => Err(bounds_error(format!("configuration key '{}' is not set", key))
                .at(b.pos_span(0))),
        },
    }
}

fn func_get_unquoted(vm: &mut Vm, this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(b) = ArgParser::new("get_unquoted")
        .pos("name", TC_STRING)
        .opt_pos("fallback", TC_ANY)
        .bind(vm, args)?
        .into_bound()
    else {
        return Ok(Obj::DISABLER);
    };
    let key = vm.wk.store.get_str(b.pos(0)).to_string();
    let value = match lookup(vm, this, &key) {
        Some(v) => v,
        None => match b.opt_pos(1) {
            Some(fallback) => fallback.val,
            None => {
                return Err(bounds_error(format!("configuration key '{}' is not set", key))
                    .at(b.pos_span(0)));
            }
        },
    };
    match vm.wk.store.as_str(value) {
        Some(s) => {
            let trimmed = s.trim_matches('"').to_string();
            Ok(vm.wk.store.new_str(&trimmed))
        }
        None => Ok(value),
    }
}

fn func_has(vm: &mut Vm, this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(b) = ArgParser::new("has")
        .pos("name", TC_STRING)
        .bind(vm, args)?
        .into_bound()
    else {
        return Ok(Obj::DISABLER);
    };
    let key = vm.wk.store.get_str(b.pos(0)).to_string();
    let found = lookup(vm, this, &key).is_some();
    Ok(vm.wk.store.new_bool(found))
}

fn func_keys(vm: &mut Vm, this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(_b) = ArgParser::new("keys").bind(vm, args)?.into_bound() else {
        return Ok(Obj::DISABLER);
    };
    let keys: Vec<String> = match vm.wk.store.get(this) {
        Value::ConfigurationData(cd) => cd.values.keys().cloned().collect(),
        _ => unreachable!("receiver typechecked by dispatch"),
    };
    let items: Vec<Obj> = keys.iter().map(|k| vm.wk.store.new_str(k)).collect();
    Ok(vm.wk.store.new_array(items))
}

fn func_merge_from(vm: &mut Vm, this: Obj, args: &Args) -> InterpResult<Obj> {
    check_frozen(vm, this, args)?;
    let Some(b) = ArgParser::new("merge_from")
        .pos("other", TC_CONFIGURATION_DATA)
        .bind(vm, args)?
        .into_bound()
    else {
        return Ok(Obj::DISABLER);
    };
    let entries = match vm.wk.store.get(b.pos(0)) {
        Value::ConfigurationData(cd) => cd.values.clone(),
        _ => unreachable!("typechecked"),
    };
    match vm.wk.store.get_mut(this) {
        Value::ConfigurationData(cd) => {
            for (k, v) in entries {
                cd.values.insert(k, v);
            }
        }
        _ => unreachable!("receiver typechecked by dispatch"),
    }
    Ok(Obj::NULL)
}

pub const METHODS: &[FuncImpl] = &[
    FuncImpl::new("get", func_get, TC_ANY),
    FuncImpl::new("get_unquoted", func_get_unquoted, TC_ANY),
    FuncImpl::new("has", func_has, TC_BOOL),
    FuncImpl::new("keys", func_keys, 0),
    FuncImpl::new("merge_from", func_merge_from, 0),
    FuncImpl::new("set", func_set, 0),
    FuncImpl::new("set10", func_set10, 0),
    FuncImpl::new("set_quoted", func_set_quoted, 0),
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Span;
    use crate::object::ConfigurationData;
    use crate::vm::ArgValue;
    use crate::workspace::Workspace;

    fn setup() -> Workspace {
        let mut wk = Workspace::in_memory();
        let idx = wk.push_project("", None);
        wk.cur_project = idx;
        wk
    }

    fn conf(wk: &mut Workspace) -> Obj {
        wk.store.push(Value::ConfigurationData(Box::new(ConfigurationData::default())))
    }

    fn args(vals: &[Obj]) -> Args {
        Args {
            pos: vals.iter().map(|&v| ArgValue { val: v, span: Span::default() }).collect(),
            kwargs: Vec::new(),
            span: Span::default(),
        }
    }

    #[test]
    fn test_set_and_get() {
        let mut wk = setup();
        let cd = conf(&mut wk);
        let key = wk.store.new_str("A");
        let value = wk.store.new_number(3);
        let mut vm = Vm::new(&mut wk);
        func_set(&mut vm, cd, &args(&[key, value])).unwrap();
        let got = func_get(&mut vm, cd, &args(&[key])).unwrap();
        assert_eq!(vm.wk.store.as_number(got), Some(3));
        assert_eq!(func_has(&mut vm, cd, &args(&[key])).unwrap(), Obj::TRUE);
    }

    #[test]
    fn test_set10_normalizes() {
        let mut wk = setup();
        let cd = conf(&mut wk);
        let key = wk.store.new_str("FLAG");
        let seven = wk.store.new_number(7);
        let mut vm = Vm::new(&mut wk);
        func_set10(&mut vm, cd, &args(&[key, seven])).unwrap();
        let got = func_get(&mut vm, cd, &args(&[key])).unwrap();
        assert_eq!(vm.wk.store.as_number(got), Some(1));
        func_set10(&mut vm, cd, &args(&[key, Obj::FALSE])).unwrap();
        let got = func_get(&mut vm, cd, &args(&[key])).unwrap();
        assert_eq!(vm.wk.store.as_number(got), Some(0));
    }

    #[test]
    fn test_set_quoted_escapes() {
        let mut wk = setup();
        let cd = conf(&mut wk);
        let key = wk.store.new_str("MSG");
        let raw = wk.store.new_str("say \"hi\"");
        let mut vm = Vm::new(&mut wk);
        func_set_quoted(&mut vm, cd, &args(&[key, raw])).unwrap();
        let got = func_get(&mut vm, cd, &args(&[key])).unwrap();
        assert_eq!(vm.wk.store.as_str(got), Some("\"say \\\"hi\\\"\""));
        let unquoted = func_get_unquoted(&mut vm, cd, &args(&[key])).unwrap();
        assert!(vm.wk.store.as_str(unquoted).unwrap().starts_with("say"));
    }

    #[test]
    fn test_get_fallback_and_miss() {
        let mut wk = setup();
        let cd = conf(&mut wk);
        let key = wk.store.new_str("GONE");
        let fallback = wk.store.new_str("d");
        let mut vm = Vm::new(&mut wk);
        let got = func_get(&mut vm, cd, &args(&[key, fallback])).unwrap();
        assert_eq!(vm.wk.store.as_str(got), Some("d"));
        assert!(func_get(&mut vm, cd, &args(&[key])).is_err());
    }

    #[test]
    fn test_merge_from_overwrites() {
        let mut wk = setup();
        let a = conf(&mut wk);
        let b = conf(&mut wk);
        let key = wk.store.new_str("K");
        let one = wk.store.new_number(1);
        let two = wk.store.new_number(2);
        let mut vm = Vm::new(&mut wk);
        func_set(&mut vm, a, &args(&[key, one])).unwrap();
        func_set(&mut vm, b, &args(&[key, two])).unwrap();
        func_merge_from(&mut vm, a, &args(&[b])).unwrap();
        let got = func_get(&mut vm, a, &args(&[key])).unwrap();
        assert_eq!(vm.wk.store.as_number(got), Some(2));
    }

    #[test]
    fn test_frozen_after_use() {
        let mut wk = setup();
        let cd = conf(&mut wk);
        if let Value::ConfigurationData(data) = wk.store.get_mut(cd) {
            data.used = true;
        }
        let key = wk.store.new_str("A");
        let mut vm = Vm::new(&mut wk);
        let err = func_set(&mut vm, cd, &args(&[key, Obj::TRUE])).unwrap_err();
        assert!(err.message.contains("can not be modified"));
    }

    #[test]
    fn test_keys_in_insertion_order() {
        let mut wk = setup();
        let cd = conf(&mut wk);
        let b = wk.store.new_str("b");
        let a = wk.store.new_str("a");
        let mut vm = Vm::new(&mut wk);
        func_set(&mut vm, cd, &args(&[b, Obj::TRUE])).unwrap();
        func_set(&mut vm, cd, &args(&[a, Obj::TRUE])).unwrap();
        let keys = func_keys(&mut vm, cd, &Args::default()).unwrap();
        let names: Vec<&str> = vm
            .wk
            .store
            .as_array(keys)
            .unwrap()
            .iter()
            .map(|&k| vm.wk.store.as_str(k).unwrap())
            .collect();
        assert_eq!(names, ["b", "a"]);
    }
}
