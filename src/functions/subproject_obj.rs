//! Subproject Object Methods

use crate::diagnostics::{usage_error, InterpError, InterpResult, ErrorKind};
use crate::functions::FuncImpl;
use crate::object::{Obj, Value};
use crate::typecheck::args::ArgParser;
use crate::typecheck::{TC_ANY, TC_BOOL, TC_STRING};
use crate::vm::{Args, Vm};

fn this_subproject<'a>(vm: &'a Vm<'_>, this: Obj) -> &'a crate::object::SubprojectData {
    match vm.wk.store.get(this) {
        Value::Subproject(sp) => sp,
        _ => unreachable!("receiver typechecked by dispatch"),
    }
}

fn func_found(vm: &mut Vm, this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(_b) = ArgParser::new("found").bind(vm, args)?.into_bound() else {
        return Ok(Obj::DISABLER);
    };
    let found = this_subproject(vm, this).found;
    Ok(vm.wk.store.new_bool(found))
}

/// Pull a variable out of the subproject's top-level scope.
fn func_get_variable(vm: &mut Vm, this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(b) = ArgParser::new("get_variable")
        .pos("name", TC_STRING)
        .opt_pos("fallback", TC_ANY)
        .bind(vm, args)?
        .into_bound()
    else {
        return Ok(Obj::DISABLER);
    };
    let sp = this_subproject(vm, this);
    let name = sp.name.clone();
    let project_index = match sp.project_index {
        Some(index) => index,
        None => {
            return Err(usage_error(format!(
                "subproject '{}' was not found, check found() first",
                name
            ))
            .at(args.span));
        }
    };
    let var = vm.wk.store.get_str(b.pos(0)).to_string();
    match vm.wk.projects[project_index].lookup_var(&var) {
        Some(value) => Ok(value),
        None => match b.opt_pos(1) {
            Some(fallback) => Ok(fallback.val),
            None => Err(InterpError::new(
                ErrorKind::UnknownVariable,
                format!("subproject '{}' does not define '{}'", name, var),
            )
            .at(b.pos_span(0))),
        },
    }
}

pub const METHODS: &[FuncImpl] = &[
    FuncImpl::new("found", func_found, TC_BOOL),
    FuncImpl::new("get_variable", func_get_variable, TC_ANY),
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Span;
    use crate::object::SubprojectData;
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
    fn test_get_variable_reads_subproject_scope() {
        let mut wk = setup();
        let sub_index = wk.push_project("subprojects/lib", Some("lib".to_string()));
        let answer = wk.store.new_number(42);
        wk.projects[sub_index].set_var("answer", answer);
        let sp = wk.store.push(Value::Subproject(Box::new(SubprojectData {
            name: "lib".to_string(),
            project_index: Some(sub_index),
            found: true,
        })));
        let name = wk.store.new_str("answer");
        let missing = wk.store.new_str("gone");
        let fallback = wk.store.new_str("d");
        let mut vm = Vm::new(&mut wk);
        assert_eq!(func_found(&mut vm, sp, &Args::default()).unwrap(), Obj::TRUE);
        let got = func_get_variable(&mut vm, sp, &args(&[name])).unwrap();
        assert_eq!(vm.wk.store.as_number(got), Some(42));
        let got = func_get_variable(&mut vm, sp, &args(&[missing, fallback])).unwrap();
        assert_eq!(vm.wk.store.as_str(got), Some("d"));
        assert!(func_get_variable(&mut vm, sp, &args(&[missing])).is_err());
    }

    #[test]
    fn test_get_variable_on_missing_subproject() {
        let mut wk = setup();
        let sp = wk.store.push(Value::Subproject(Box::new(SubprojectData {
            name: "gone".to_string(),
            project_index: None,
            found: false,
        })));
        let name = wk.store.new_str("x");
        let mut vm = Vm::new(&mut wk);
        assert_eq!(func_found(&mut vm, sp, &Args::default()).unwrap(), Obj::FALSE);
        let err = func_get_variable(&mut vm, sp, &args(&[name])).unwrap_err();
        assert!(err.message.contains("found()"));
    }
}
