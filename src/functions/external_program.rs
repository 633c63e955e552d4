//! External Program Methods

use crate::diagnostics::{usage_error, InterpResult};
use crate::functions::FuncImpl;
use crate::object::{Obj, Value};
use crate::typecheck::args::ArgParser;
use crate::typecheck::{TC_BOOL, TC_STRING};
use crate::vm::{Args, Vm};

fn this_program<'a>(vm: &'a Vm<'_>, this: Obj) -> &'a crate::object::ExternalProgram {
    match vm.wk.store.get(this) {
        Value::ExternalProgram(p) => p,
        _ => unreachable!("receiver typechecked by dispatch"),
    }
}

fn func_found(vm: &mut Vm, this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(_b) = ArgParser::new("found").bind(vm, args)?.into_bound() else {
        return Ok(Obj::DISABLER);
    };
    let found = this_program(vm, this).found;
    Ok(vm.wk.store.new_bool(found))
}

fn path_of(vm: &mut Vm, this: Obj, args: &Args, fname: &str) -> InterpResult<Obj> {
    let Some(_b) = ArgParser::new(fname).bind(vm, args)?.into_bound() else {
        return Ok(Obj::DISABLER);
    };
    let program = this_program(vm, this);
    let (path, name) = (program.path.clone(), program.name.clone());
    match path {
        Some(path) => Ok(vm.wk.store.new_str(&path)),
        None => Err(usage_error(format!(
            "program '{}' was not found, check found() before asking for its path",
            name
        ))
        .at(args.span)),
    }
}

fn func_path(vm: &mut Vm, this: Obj, args: &Args) -> InterpResult<Obj> {
    path_of(vm, this, args, "path")
}

fn func_full_path(vm: &mut Vm, this: Obj, args: &Args) -> InterpResult<Obj> {
    path_of(vm, this, args, "full_path")
}

fn func_version(vm: &mut Vm, this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(_b) = ArgParser::new("version").bind(vm, args)?.into_bound() else {
        return Ok(Obj::DISABLER);
    };
    let version = this_program(vm, this)
        .version
        .clone()
        .unwrap_or_else(|| "unknown".to_string());
    Ok(vm.wk.store.new_str(&version))
}

pub const METHODS: &[FuncImpl] = &[
    FuncImpl::new("found", func_found, TC_BOOL),
    FuncImpl::new("full_path", func_full_path, TC_STRING),
    FuncImpl::new("path", func_path, TC_STRING),
    FuncImpl::new("version", func_version, TC_STRING),
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::ExternalProgram;
    use crate::workspace::Workspace;

    fn setup() -> Workspace {
        let mut wk = Workspace::in_memory();
        let idx = wk.push_project("", None);
        wk.cur_project = idx;
        wk
    }

    fn program(wk: &mut Workspace, found: bool) -> Obj {
        wk.store.push(Value::ExternalProgram(Box::new(ExternalProgram {
            name: "tool".to_string(),
            path: if found { Some("/usr/bin/tool".to_string()) } else { None },
            found,
            version: if found { Some("2.1".to_string()) } else { None },
        })))
    }

    #[test]
    fn test_found_and_paths() {
        let mut wk = setup();
        let p = program(&mut wk, true);
        let mut vm = Vm::new(&mut wk);
        assert_eq!(func_found(&mut vm, p, &Args::default()).unwrap(), Obj::TRUE);
        let path = func_path(&mut vm, p, &Args::default()).unwrap();
        assert_eq!(vm.wk.store.as_str(path), Some("/usr/bin/tool"));
        let full = func_full_path(&mut vm, p, &Args::default()).unwrap();
        assert_eq!(vm.wk.store.as_str(full), Some("/usr/bin/tool"));
        let version = func_version(&mut vm, p, &Args::default()).unwrap();
        assert_eq!(vm.wk.store.as_str(version), Some("2.1"));
    }

    #[test]
    fn test_path_of_missing_program_is_error() {
        let mut wk = setup();
        let p = program(&mut wk, false);
        let mut vm = Vm::new(&mut wk);
        assert_eq!(func_found(&mut vm, p, &Args::default()).unwrap(), Obj::FALSE);
        let err = func_path(&mut vm, p, &Args::default()).unwrap_err();
        assert!(err.message.contains("tool"));
        let version = func_version(&mut vm, p, &Args::default()).unwrap();
        assert_eq!(vm.wk.store.as_str(version), Some("unknown"));
    }
}
