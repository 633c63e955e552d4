//! Feature Option Methods
//!
//! The tri-state value used to gate optional functionality. `require` and
//! the auto adjusters produce new values; feature options are immutable
//! like every other primitive.

use crate::diagnostics::{ErrorKind, InterpError, InterpResult};
use crate::functions::FuncImpl;
use crate::object::{FeatureState, Obj, Value};
use crate::typecheck::args::ArgParser;
use crate::typecheck::{TC_BOOL, TC_FEATURE_OPT, TC_STRING};
use crate::vm::{Args, Vm};

fn this_state(vm: &Vm, this: Obj) -> FeatureState {
    match vm.wk.store.get(this) {
        Value::FeatureOpt(state) => *state,
        _ => unreachable!("receiver typechecked by dispatch"),
    }
}

fn func_enabled(vm: &mut Vm, this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(_b) = ArgParser::new("enabled").bind(vm, args)?.into_bound() else {
        return Ok(Obj::DISABLER);
    };
    let result = this_state(vm, this) == FeatureState::Enabled;
    Ok(vm.wk.store.new_bool(result))
}

fn func_disabled(vm: &mut Vm, this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(_b) = ArgParser::new("disabled").bind(vm, args)?.into_bound() else {
        return Ok(Obj::DISABLER);
    };
    let result = this_state(vm, this) == FeatureState::Disabled;
    Ok(vm.wk.store.new_bool(result))
}

fn func_auto(vm: &mut Vm, this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(_b) = ArgParser::new("auto").bind(vm, args)?.into_bound() else {
        return Ok(Obj::DISABLER);
    };
    let result = this_state(vm, this) == FeatureState::Auto;
    Ok(vm.wk.store.new_bool(result))
}

fn func_allowed(vm: &mut Vm, this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(_b) = ArgParser::new("allowed").bind(vm, args)?.into_bound() else {
        return Ok(Obj::DISABLER);
    };
    let result = this_state(vm, this) != FeatureState::Disabled;
    Ok(vm.wk.store.new_bool(result))
}

fn func_require(vm: &mut Vm, this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(b) = ArgParser::new("require")
        .pos("condition", TC_BOOL)
        .kw("error_message", TC_STRING)
        .bind(vm, args)?
        .into_bound()
    else {
        return Ok(Obj::DISABLER);
    };
    let condition = vm.wk.store.as_bool(b.pos(0)).expect("typechecked");
    let state = this_state(vm, this);
    if condition {
        return Ok(this);
    }
    if state == FeatureState::Enabled {
        let message = b
            .kw_str(&vm.wk.store, "error_message")
            .unwrap_or_else(|| "feature requirement not met".to_string());
        return Err(InterpError::new(ErrorKind::Assert, message).at(args.span));
    }
    Ok(vm.wk.store.new_feature(FeatureState::Disabled))
}

fn func_disable_auto_if(vm: &mut Vm, this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(b) = ArgParser::new("disable_auto_if")
        .pos("condition", TC_BOOL)
        .bind(vm, args)?
        .into_bound()
    else {
        return Ok(Obj::DISABLER);
    };
    let condition = vm.wk.store.as_bool(b.pos(0)).expect("typechecked");
    if condition && this_state(vm, this) == FeatureState::Auto {
        return Ok(vm.wk.store.new_feature(FeatureState::Disabled));
    }
    Ok(this)
}

fn func_enable_auto_if(vm: &mut Vm, this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(b) = ArgParser::new("enable_auto_if")
        .pos("condition", TC_BOOL)
        .bind(vm, args)?
        .into_bound()
    else {
        return Ok(Obj::DISABLER);
    };
    let condition = vm.wk.store.as_bool(b.pos(0)).expect("typechecked");
    if condition && this_state(vm, this) == FeatureState::Auto {
        return Ok(vm.wk.store.new_feature(FeatureState::Enabled));
    }
    Ok(this)
}

pub const METHODS: &[FuncImpl] = &[
    FuncImpl::new("allowed", func_allowed, TC_BOOL),
    FuncImpl::new("auto", func_auto, TC_BOOL),
    FuncImpl::new("disable_auto_if", func_disable_auto_if, TC_FEATURE_OPT),
    FuncImpl::new("disabled", func_disabled, TC_BOOL),
    FuncImpl::new("enable_auto_if", func_enable_auto_if, TC_FEATURE_OPT),
    FuncImpl::new("enabled", func_enabled, TC_BOOL),
    FuncImpl::new("require", func_require, TC_FEATURE_OPT),
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
    fn test_state_predicates() {
        let mut wk = setup();
        let auto = wk.store.new_feature(FeatureState::Auto);
        let enabled = wk.store.new_feature(FeatureState::Enabled);
        let disabled = wk.store.new_feature(FeatureState::Disabled);
        let mut vm = Vm::new(&mut wk);
        assert_eq!(func_auto(&mut vm, auto, &Args::default()).unwrap(), Obj::TRUE);
        assert_eq!(func_enabled(&mut vm, enabled, &Args::default()).unwrap(), Obj::TRUE);
        assert_eq!(func_disabled(&mut vm, disabled, &Args::default()).unwrap(), Obj::TRUE);
        assert_eq!(func_allowed(&mut vm, auto, &Args::default()).unwrap(), Obj::TRUE);
        assert_eq!(func_allowed(&mut vm, disabled, &Args::default()).unwrap(), Obj::FALSE);
    }

    #[test]
    fn test_require_passes_through_when_met() {
        let mut wk = setup();
        let enabled = wk.store.new_feature(FeatureState::Enabled);
        let mut vm = Vm::new(&mut wk);
        let out = func_require(&mut vm, enabled, &args(&[Obj::TRUE])).unwrap();
        assert_eq!(out, enabled);
    }

    #[test]
    fn test_require_fails_enabled_feature() {
        let mut wk = setup();
        let enabled = wk.store.new_feature(FeatureState::Enabled);
        let mut vm = Vm::new(&mut wk);
        let err = func_require(&mut vm, enabled, &args(&[Obj::FALSE])).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Assert);
    }

    #[test]
    fn test_require_downgrades_auto() {
        let mut wk = setup();
        let auto = wk.store.new_feature(FeatureState::Auto);
        let mut vm = Vm::new(&mut wk);
        let out = func_require(&mut vm, auto, &args(&[Obj::FALSE])).unwrap();
        assert_eq!(this_state(&vm, out), FeatureState::Disabled);
    }

    #[test]
    fn test_auto_adjusters_only_touch_auto() {
        let mut wk = setup();
        let auto = wk.store.new_feature(FeatureState::Auto);
        let enabled = wk.store.new_feature(FeatureState::Enabled);
        let mut vm = Vm::new(&mut wk);
        let out = func_disable_auto_if(&mut vm, auto, &args(&[Obj::TRUE])).unwrap();
        assert_eq!(this_state(&vm, out), FeatureState::Disabled);
        let out = func_disable_auto_if(&mut vm, enabled, &args(&[Obj::TRUE])).unwrap();
        assert_eq!(out, enabled);
        let out = func_enable_auto_if(&mut vm, auto, &args(&[Obj::TRUE])).unwrap();
        assert_eq!(this_state(&vm, out), FeatureState::Enabled);
        let out = func_enable_auto_if(&mut vm, auto, &args(&[Obj::FALSE])).unwrap();
        assert_eq!(out, auto);
    }
}
