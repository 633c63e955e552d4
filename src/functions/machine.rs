//! Machine Object Methods
//!
//! host_machine/build_machine/target_machine accessors, answered from the
//! workspace machine records.

use crate::diagnostics::InterpResult;
use crate::functions::FuncImpl;
use crate::object::{MachineKind, Obj, Value};
use crate::typecheck::args::ArgParser;
use crate::typecheck::TC_STRING;
use crate::vm::{Args, Vm};

fn this_kind(vm: &Vm, this: Obj) -> MachineKind {
    match vm.wk.store.get(this) {
        Value::Machine(kind) => *kind,
        _ => unreachable!("receiver typechecked by dispatch"),
    }
}

fn field(
    vm: &mut Vm,
    this: Obj,
    args: &Args,
    fname: &str,
    pick: fn(&crate::workspace::MachineInfo) -> &String,
) -> InterpResult<Obj> {
    let Some(_b) = ArgParser::new(fname).bind(vm, args)?.into_bound() else {
        return Ok(Obj::DISABLER);
    };
    let kind = this_kind(vm, this);
    let value = pick(vm.wk.machine_info(kind)).clone();
    Ok(vm.wk.store.new_str(&value))
}

fn func_system(vm: &mut Vm, this: Obj, args: &Args) -> InterpResult<Obj> {
    field(vm, this, args, "system", |m| &m.system)
}

fn func_cpu_family(vm: &mut Vm, this: Obj, args: &Args) -> InterpResult<Obj> {
    field(vm, this, args, "cpu_family", |m| &m.cpu_family)
}

fn func_cpu(vm: &mut Vm, this: Obj, args: &Args) -> InterpResult<Obj> {
    field(vm, this, args, "cpu", |m| &m.cpu)
}

fn func_endian(vm: &mut Vm, this: Obj, args: &Args) -> InterpResult<Obj> {
    field(vm, this, args, "endian", |m| &m.endian)
}

pub const METHODS: &[FuncImpl] = &[
    FuncImpl::new("cpu", func_cpu, TC_STRING),
    FuncImpl::new("cpu_family", func_cpu_family, TC_STRING),
    FuncImpl::new("endian", func_endian, TC_STRING),
    FuncImpl::new("system", func_system, TC_STRING),
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workspace::Workspace;

    fn setup() -> (Workspace, Obj, Obj) {
        let mut wk = Workspace::in_memory();
        let idx = wk.push_project("", None);
        wk.cur_project = idx;
        wk.host_machine.system = "linux".to_string();
        wk.host_machine.cpu_family = "x86_64".to_string();
        wk.host_machine.cpu = "x86_64".to_string();
        wk.host_machine.endian = "little".to_string();
        wk.build_machine.system = "freebsd".to_string();
        let host = wk.store.push(Value::Machine(MachineKind::Host));
        let build = wk.store.push(Value::Machine(MachineKind::Build));
        (wk, host, build)
    }

    #[test]
    fn test_fields_come_from_workspace_records() {
        let (mut wk, host, _build) = setup();
        let mut vm = Vm::new(&mut wk);
        let system = func_system(&mut vm, host, &Args::default()).unwrap();
        assert_eq!(vm.wk.store.as_str(system), Some("linux"));
        let family = func_cpu_family(&mut vm, host, &Args::default()).unwrap();
        assert_eq!(vm.wk.store.as_str(family), Some("x86_64"));
        let endian = func_endian(&mut vm, host, &Args::default()).unwrap();
        assert_eq!(vm.wk.store.as_str(endian), Some("little"));
    }

    #[test]
    fn test_host_and_build_are_distinct() {
        let (mut wk, host, build) = setup();
        let mut vm = Vm::new(&mut wk);
        let host_system = func_system(&mut vm, host, &Args::default()).unwrap();
        let build_system = func_system(&mut vm, build, &Args::default()).unwrap();
        assert_eq!(vm.wk.store.as_str(host_system), Some("linux"));
        assert_eq!(vm.wk.store.as_str(build_system), Some("freebsd"));
    }
}
