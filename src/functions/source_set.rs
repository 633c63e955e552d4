//! Source Set Methods
//!
//! Conditional source collections: rules accumulate until frozen by the
//! first query, then `apply` selects against a configuration.

use crate::diagnostics::{type_error, InterpResult};
use crate::functions::FuncImpl;
use crate::object::{
    Obj, SourceConfigurationData, SourceSetRule, Value,
};
use crate::typecheck::args::ArgParser;
use crate::typecheck::{
    TAG_GLOB, TAG_LISTIFY, TC_BOOL, TC_CONFIGURATION_DATA, TC_DEPENDENCY, TC_DICT,
    TC_COERCIBLE_FILES, TC_SOURCE_CONFIGURATION, TC_STRING,
};
use crate::vm::{Args, Vm};

fn func_add(vm: &mut Vm, this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(b) = ArgParser::new("add")
        .glob("sources", TAG_GLOB | TC_COERCIBLE_FILES | TC_DEPENDENCY)
        .kw("when", TAG_LISTIFY | TC_STRING | TC_DEPENDENCY)
        .kw("if_true", TAG_LISTIFY | TC_COERCIBLE_FILES | TC_DEPENDENCY)
        .kw("if_false", TAG_LISTIFY | TC_COERCIBLE_FILES)
        .bind(vm, args)?
        .into_bound()
    else {
        return Ok(Obj::DISABLER);
    };
    let mut if_true: Vec<Obj> = b.glob().iter().map(|a| a.val).collect();
    if_true.extend(b.kw_objs(&vm.wk.store, "if_true"));
    let rule = SourceSetRule {
        when: b.kw_objs(&vm.wk.store, "when"),
        if_true,
        if_false: b.kw_objs(&vm.wk.store, "if_false"),
    };
    match vm.wk.store.get_mut(this) {
        Value::SourceSet(set) => {
            if set.frozen {
                return Err(
                    type_error("source set can not be modified after it has been queried")
                        .at(args.span),
                );
            }
            set.rules.push(rule);
            Ok(Obj::NULL)
        }
        _ => unreachable!("receiver typechecked by dispatch"),
    }
}

/// Evaluate rules against a configuration: a rule applies when every
/// `when` entry is an enabled config key or a found dependency.
fn select(vm: &mut Vm, this: Obj, config: Option<Obj>) -> SourceConfigurationData {
    let rules = match vm.wk.store.get_mut(this) {
        Value::SourceSet(set) => {
            set.frozen = true;
            set.rules.clone()
        }
        _ => unreachable!("receiver typechecked by dispatch"),
    };
    let mut out = SourceConfigurationData::default();
    for rule in rules {
        let mut applies = true;
        for &cond in &rule.when {
            let ok = match vm.wk.store.get(cond) {
                Value::Str(id) => {
                    let key = vm.wk.store.str_value(*id).to_string();
                    match config {
                        Some(cfg) => match vm.wk.store.get(cfg) {
                            Value::ConfigurationData(cd) => cd
                                .values
                                .get(&key)
                                .map(|(v, _)| match vm.wk.store.get(*v) {
                                    Value::Bool(b) => *b,
                                    Value::Number(n) => *n != 0,
                                    _ => true,
                                })
                                .unwrap_or(false),
                            Value::Dict(map) => map.contains_key(&key),
                            _ => false,
                        },
                        None => false,
                    }
                }
                Value::Dependency(dep) => dep.found,
                _ => true,
            };
            if !ok {
                applies = false;
                break;
            }
        }
        let chosen = if applies { &rule.if_true } else { &rule.if_false };
        for &obj in chosen {
            if matches!(vm.wk.store.get(obj), Value::Dependency(_)) {
                out.dependencies.push(obj);
            } else {
                out.sources.push(obj);
            }
        }
        if applies {
            for &cond in &rule.when {
                if matches!(vm.wk.store.get(cond), Value::Dependency(_)) {
                    out.dependencies.push(cond);
                }
            }
        }
    }
    out
}

fn func_all_sources(vm: &mut Vm, this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(_b) = ArgParser::new("all_sources").bind(vm, args)?.into_bound() else {
        return Ok(Obj::DISABLER);
    };
    let rules = match vm.wk.store.get_mut(this) {
        Value::SourceSet(set) => {
            set.frozen = true;
            set.rules.clone()
        }
        _ => unreachable!("receiver typechecked by dispatch"),
    };
    let mut sources = Vec::new();
    for rule in rules {
        for obj in rule.if_true.iter().chain(rule.if_false.iter()) {
            if !matches!(vm.wk.store.get(*obj), Value::Dependency(_)) {
                sources.push(*obj);
            }
        }
    }
    Ok(vm.wk.store.new_array(sources))
}

fn func_all_dependencies(vm: &mut Vm, this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(_b) = ArgParser::new("all_dependencies").bind(vm, args)?.into_bound() else {
        return Ok(Obj::DISABLER);
    };
    let rules = match vm.wk.store.get_mut(this) {
        Value::SourceSet(set) => {
            set.frozen = true;
            set.rules.clone()
        }
        _ => unreachable!("receiver typechecked by dispatch"),
    };
    let mut deps = Vec::new();
    for rule in rules {
        for obj in rule.when.iter().chain(rule.if_true.iter()) {
            if matches!(vm.wk.store.get(*obj), Value::Dependency(_)) {
                deps.push(*obj);
            }
        }
    }
    Ok(vm.wk.store.new_array(deps))
}

fn func_apply(vm: &mut Vm, this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(b) = ArgParser::new("apply")
        .pos("config", TC_CONFIGURATION_DATA | TC_DICT)
        .kw("strict", TC_BOOL)
        .bind(vm, args)?
        .into_bound()
    else {
        return Ok(Obj::DISABLER);
    };
    let config = select(vm, this, Some(b.pos(0)));
    Ok(vm.wk.store.push(Value::SourceConfiguration(Box::new(config))))
}

fn func_sources(vm: &mut Vm, this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(_b) = ArgParser::new("sources").bind(vm, args)?.into_bound() else {
        return Ok(Obj::DISABLER);
    };
    let sources = match vm.wk.store.get(this) {
        Value::SourceConfiguration(sc) => sc.sources.clone(),
        _ => unreachable!("receiver typechecked by dispatch"),
    };
    Ok(vm.wk.store.new_array(sources))
}

fn func_dependencies(vm: &mut Vm, this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(_b) = ArgParser::new("dependencies").bind(vm, args)?.into_bound() else {
        return Ok(Obj::DISABLER);
    };
    let deps = match vm.wk.store.get(this) {
        Value::SourceConfiguration(sc) => sc.dependencies.clone(),
        _ => unreachable!("receiver typechecked by dispatch"),
    };
    Ok(vm.wk.store.new_array(deps))
}

pub const METHODS: &[FuncImpl] = &[
    FuncImpl::new("add", func_add, 0),
    FuncImpl::new("all_dependencies", func_all_dependencies, 0),
    FuncImpl::new("all_sources", func_all_sources, 0),
    FuncImpl::new("apply", func_apply, TC_SOURCE_CONFIGURATION),
];

pub const CONFIG_METHODS: &[FuncImpl] = &[
    FuncImpl::new("dependencies", func_dependencies, 0),
    FuncImpl::new("sources", func_sources, 0),
];
