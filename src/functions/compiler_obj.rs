//! Compiler Object Methods
//!
//! Queries delegate to the toolchain collaborator; without a real probe
//! backend they answer not-found rather than failing, so feature detection
//! code degrades gracefully.

use crate::diagnostics::{ErrorKind, InterpError, InterpResult};
use crate::functions::FuncImpl;
use crate::object::{DepKind, Dependency, Obj, RunResult, Value};
use crate::typecheck::args::ArgParser;
use crate::typecheck::coerce;
use crate::typecheck::{
    TAG_GLOB, TAG_LISTIFY, TC_BOOL, TC_COERCIBLE_FILES, TC_DEPENDENCY, TC_INCLUDE_DIRECTORY,
    TC_NUMBER, TC_REQUIRED_KW, TC_RUN_RESULT, TC_STRING,
};
use crate::vm::{Args, Vm};

fn this_compiler(vm: &Vm, this: Obj) -> crate::object::CompilerObj {
    match vm.wk.store.get(this) {
        Value::Compiler(c) => (**c).clone(),
        _ => unreachable!("receiver typechecked by dispatch"),
    }
}

fn func_get_id(vm: &mut Vm, this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(_b) = ArgParser::new("get_id").bind(vm, args)?.into_bound() else {
        return Ok(Obj::DISABLER);
    };
    let id = this_compiler(vm, this).id;
    Ok(vm.wk.store.new_str(&id))
}

fn func_version(vm: &mut Vm, this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(_b) = ArgParser::new("version").bind(vm, args)?.into_bound() else {
        return Ok(Obj::DISABLER);
    };
    let version = this_compiler(vm, this).version;
    Ok(vm.wk.store.new_str(&version))
}

fn func_cmd_array(vm: &mut Vm, this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(_b) = ArgParser::new("cmd_array").bind(vm, args)?.into_bound() else {
        return Ok(Obj::DISABLER);
    };
    let cmd = this_compiler(vm, this).cmd;
    let items: Vec<Obj> = cmd.iter().map(|c| vm.wk.store.new_str(c)).collect();
    Ok(vm.wk.store.new_array(items))
}

fn func_sizeof(vm: &mut Vm, this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(b) = ArgParser::new("sizeof")
        .pos("type", TC_STRING)
        .kw("prefix", TAG_LISTIFY | TC_STRING)
        .kw("args", TAG_LISTIFY | TC_STRING)
        .bind(vm, args)?
        .into_bound()
    else {
        return Ok(Obj::DISABLER);
    };
    let c = this_compiler(vm, this);
    let type_name = vm.wk.store.get_str(b.pos(0)).to_string();
    let size = vm.wk.toolchain.sizeof(&c.lang, &type_name, c.machine).unwrap_or(-1);
    Ok(vm.wk.store.new_number(size))
}

fn func_has_header(vm: &mut Vm, this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(b) = ArgParser::new("has_header")
        .pos("header", TC_STRING)
        .kw("required", TC_REQUIRED_KW)
        .kw("args", TAG_LISTIFY | TC_STRING)
        .kw("include_directories", TAG_LISTIFY | TC_INCLUDE_DIRECTORY | TC_STRING)
        .kw("prefix", TAG_LISTIFY | TC_STRING)
        .bind(vm, args)?
        .into_bound()
    else {
        return Ok(Obj::DISABLER);
    };
    let c = this_compiler(vm, this);
    let header = vm.wk.store.get_str(b.pos(0)).to_string();
    let found = vm.wk.toolchain.has_header(&c.lang, &header, c.machine);
    // Unlike dependency lookups, checks are optional unless asked for.
    let required = match b.kw("required") {
        Some(_) => coerce::requirement(vm.wk, b.kw("required")).0,
        None => false,
    };
    if required && !found {
        return Err(InterpError::new(
            ErrorKind::DepNotFound,
            format!("required header '{}' not usable", header),
        )
        .at(b.pos_span(0)));
    }
    Ok(vm.wk.store.new_bool(found))
}

fn func_has_function(vm: &mut Vm, this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(b) = ArgParser::new("has_function")
        .pos("funcname", TC_STRING)
        .kw("required", TC_REQUIRED_KW)
        .kw("prefix", TAG_LISTIFY | TC_STRING)
        .kw("args", TAG_LISTIFY | TC_STRING)
        .kw("dependencies", TAG_LISTIFY | TC_DEPENDENCY)
        .bind(vm, args)?
        .into_bound()
    else {
        return Ok(Obj::DISABLER);
    };
    let c = this_compiler(vm, this);
    let name = vm.wk.store.get_str(b.pos(0)).to_string();
    let code = format!("int main(void) {{ void *p = (void*){}; return !p; }}", name);
    let found = vm.wk.toolchain.compiles(&c.lang, &code, c.machine);
    let required = match b.kw("required") {
        Some(_) => coerce::requirement(vm.wk, b.kw("required")).0,
        None => false,
    };
    if required && !found {
        return Err(InterpError::new(
            ErrorKind::DepNotFound,
            format!("required function '{}' not available", name),
        )
        .at(b.pos_span(0)));
    }
    Ok(vm.wk.store.new_bool(found))
}

fn compile_check(vm: &mut Vm, this: Obj, args: &Args, fname: &str) -> InterpResult<Obj> {
    let Some(b) = ArgParser::new(fname)
        .pos("code", TC_STRING | TC_COERCIBLE_FILES)
        .kw("name", TC_STRING)
        .kw("args", TAG_LISTIFY | TC_STRING)
        .kw("dependencies", TAG_LISTIFY | TC_DEPENDENCY)
        .kw("include_directories", TAG_LISTIFY | TC_INCLUDE_DIRECTORY | TC_STRING)
        .bind(vm, args)?
        .into_bound()
    else {
        return Ok(Obj::DISABLER);
    };
    let c = this_compiler(vm, this);
    let code = match vm.wk.store.path_like(b.pos(0)) {
        Some(s) => s.to_string(),
        None => String::new(),
    };
    let ok = vm.wk.toolchain.compiles(&c.lang, &code, c.machine);
    Ok(vm.wk.store.new_bool(ok))
}

fn func_compiles(vm: &mut Vm, this: Obj, args: &Args) -> InterpResult<Obj> {
    compile_check(vm, this, args, "compiles")
}

fn func_links(vm: &mut Vm, this: Obj, args: &Args) -> InterpResult<Obj> {
    compile_check(vm, this, args, "links")
}

fn func_run(vm: &mut Vm, this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(b) = ArgParser::new("run")
        .pos("code", TC_STRING | TC_COERCIBLE_FILES)
        .kw("name", TC_STRING)
        .kw("args", TAG_LISTIFY | TC_STRING)
        .kw("dependencies", TAG_LISTIFY | TC_DEPENDENCY)
        .bind(vm, args)?
        .into_bound()
    else {
        return Ok(Obj::DISABLER);
    };
    let c = this_compiler(vm, this);
    let code = vm.wk.store.path_like(b.pos(0)).unwrap_or("").to_string();
    let compiled = vm.wk.toolchain.compiles(&c.lang, &code, c.machine);
    Ok(vm.wk.store.push(Value::RunResult(Box::new(RunResult {
        returncode: if compiled { 0 } else { -1 },
        stdout: String::new(),
        stderr: String::new(),
        compiled: Some(compiled),
    }))))
}

fn func_has_argument(vm: &mut Vm, this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(b) = ArgParser::new("has_argument")
        .pos("argument", TC_STRING)
        .bind(vm, args)?
        .into_bound()
    else {
        return Ok(Obj::DISABLER);
    };
    let c = this_compiler(vm, this);
    let arg = vm.wk.store.get_str(b.pos(0)).to_string();
    let ok = vm.wk.toolchain.has_argument(&c.lang, &arg, c.machine);
    Ok(vm.wk.store.new_bool(ok))
}

fn func_has_arguments(vm: &mut Vm, this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(b) = ArgParser::new("has_arguments")
        .glob("arguments", TAG_GLOB | TC_STRING)
        .bind(vm, args)?
        .into_bound()
    else {
        return Ok(Obj::DISABLER);
    };
    let c = this_compiler(vm, this);
    let mut ok = true;
    for arg in b.glob() {
        let s = vm.wk.store.get_str(arg.val).to_string();
        if !vm.wk.toolchain.has_argument(&c.lang, &s, c.machine) {
            ok = false;
            break;
        }
    }
    Ok(vm.wk.store.new_bool(ok))
}

fn func_get_supported_arguments(vm: &mut Vm, this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(b) = ArgParser::new("get_supported_arguments")
        .glob("arguments", TAG_GLOB | TC_STRING)
        .bind(vm, args)?
        .into_bound()
    else {
        return Ok(Obj::DISABLER);
    };
    let c = this_compiler(vm, this);
    let mut supported = Vec::new();
    for arg in b.glob() {
        let s = vm.wk.store.get_str(arg.val).to_string();
        if vm.wk.toolchain.has_argument(&c.lang, &s, c.machine) {
            supported.push(s);
        }
    }
    let items: Vec<Obj> = supported.iter().map(|s| vm.wk.store.new_str(s)).collect();
    Ok(vm.wk.store.new_array(items))
}

fn func_find_library(vm: &mut Vm, this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(b) = ArgParser::new("find_library")
        .pos("name", TC_STRING)
        .kw("required", TC_REQUIRED_KW)
        .kw("static", TC_BOOL)
        .kw("dirs", TAG_LISTIFY | TC_STRING)
        .bind(vm, args)?
        .into_bound()
    else {
        return Ok(Obj::DISABLER);
    };
    let c = this_compiler(vm, this);
    let name = vm.wk.store.get_str(b.pos(0)).to_string();
    let found = vm.wk.toolchain.find_library(&name, c.machine);
    let (required, disabled) = coerce::requirement(vm.wk, b.kw("required"));
    if disabled || !found {
        if required && !disabled {
            return Err(InterpError::new(
                ErrorKind::DepNotFound,
                format!("library '{}' not found", name),
            )
            .at(b.pos_span(0)));
        }
        let dep = Dependency::not_found(name, c.machine);
        return Ok(vm.wk.store.push(Value::Dependency(Box::new(dep))));
    }
    let mut dep = Dependency::found(name.clone(), DepKind::ExternalLibrary, c.machine);
    dep.link_args = vec![format!("-l{}", name)];
    Ok(vm.wk.store.push(Value::Dependency(Box::new(dep))))
}

pub const METHODS: &[FuncImpl] = &[
    FuncImpl::new("cmd_array", func_cmd_array, 0),
    FuncImpl::new("compiles", func_compiles, TC_BOOL),
    FuncImpl::new("find_library", func_find_library, TC_DEPENDENCY),
    FuncImpl::new("get_id", func_get_id, TC_STRING),
    FuncImpl::new("get_supported_arguments", func_get_supported_arguments, 0),
    FuncImpl::new("has_argument", func_has_argument, TC_BOOL),
    FuncImpl::new("has_arguments", func_has_arguments, TC_BOOL),
    FuncImpl::new("has_function", func_has_function, TC_BOOL),
    FuncImpl::new("has_header", func_has_header, TC_BOOL),
    FuncImpl::new("links", func_links, TC_BOOL),
    FuncImpl::new("run", func_run, TC_RUN_RESULT),
    FuncImpl::new("sizeof", func_sizeof, TC_NUMBER),
    FuncImpl::new("version", func_version, TC_STRING),
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Span;
    use crate::object::{CompilerObj, MachineKind};
    use crate::vm::ArgValue;
    use crate::workspace::Workspace;

    fn setup() -> (Workspace, Obj) {
        let mut wk = Workspace::in_memory();
        let idx = wk.push_project("", None);
        wk.cur_project = idx;
        let compiler = wk.store.push(Value::Compiler(Box::new(CompilerObj {
            lang: "c".to_string(),
            id: "generic".to_string(),
            version: "0.0.0".to_string(),
            cmd: vec!["cc".to_string()],
            machine: MachineKind::Host,
        })));
        (wk, compiler)
    }

    fn args(vals: &[Obj]) -> Args {
        Args {
            pos: vals.iter().map(|&v| ArgValue { val: v, span: Span::default() }).collect(),
            kwargs: Vec::new(),
            span: Span::default(),
        }
    }

    #[test]
    fn test_identity_accessors() {
        let (mut wk, compiler) = setup();
        let mut vm = Vm::new(&mut wk);
        let id = func_get_id(&mut vm, compiler, &Args::default()).unwrap();
        assert_eq!(vm.wk.store.as_str(id), Some("generic"));
        let version = func_version(&mut vm, compiler, &Args::default()).unwrap();
        assert_eq!(vm.wk.store.as_str(version), Some("0.0.0"));
        let cmd = func_cmd_array(&mut vm, compiler, &Args::default()).unwrap();
        let parts = vm.wk.store.as_array(cmd).unwrap();
        assert_eq!(vm.wk.store.as_str(parts[0]), Some("cc"));
    }

    #[test]
    fn test_unprobed_queries_answer_not_found() {
        let (mut wk, compiler) = setup();
        let ty = wk.store.new_str("int");
        let code = wk.store.new_str("int main(void) { return 0; }");
        let mut vm = Vm::new(&mut wk);
        let size = func_sizeof(&mut vm, compiler, &args(&[ty])).unwrap();
        assert_eq!(vm.wk.store.as_number(size), Some(-1));
        assert_eq!(func_compiles(&mut vm, compiler, &args(&[code])).unwrap(), Obj::FALSE);
        assert_eq!(func_links(&mut vm, compiler, &args(&[code])).unwrap(), Obj::FALSE);
    }

    #[test]
    fn test_run_reports_compile_failure() {
        let (mut wk, compiler) = setup();
        let code = wk.store.new_str("int main(void) { return 0; }");
        let mut vm = Vm::new(&mut wk);
        let result = func_run(&mut vm, compiler, &args(&[code])).unwrap();
        match vm.wk.store.get(result) {
            Value::RunResult(r) => {
                assert_eq!(r.compiled, Some(false));
                assert_eq!(r.returncode, -1);
            }
            other => panic!("expected run result, got {:?}", other.obj_type()),
        }
    }

    #[test]
    fn test_supported_arguments_filtered() {
        let (mut wk, compiler) = setup();
        let flag = wk.store.new_str("-Wall");
        let mut vm = Vm::new(&mut wk);
        assert_eq!(func_has_argument(&mut vm, compiler, &args(&[flag])).unwrap(), Obj::FALSE);
        let supported =
            func_get_supported_arguments(&mut vm, compiler, &args(&[flag])).unwrap();
        assert!(vm.wk.store.as_array(supported).unwrap().is_empty());
    }

    #[test]
    fn test_find_library_not_found() {
        let (mut wk, compiler) = setup();
        let name = wk.store.new_str("z");
        let mut vm = Vm::new(&mut wk);
        let call = Args {
            pos: vec![ArgValue { val: name, span: Span::default() }],
            kwargs: vec![(
                "required".to_string(),
                ArgValue { val: Obj::FALSE, span: Span::default() },
            )],
            span: Span::default(),
        };
        let dep = func_find_library(&mut vm, compiler, &call).unwrap();
        match vm.wk.store.get(dep) {
            Value::Dependency(d) => assert!(!d.found),
            other => panic!("expected dependency, got {:?}", other.obj_type()),
        }
        // Required lookups fail loudly.
        assert!(func_find_library(&mut vm, compiler, &args(&[name])).is_err());
    }

    #[test]
    fn test_header_check_optional_by_default() {
        let (mut wk, compiler) = setup();
        let header = wk.store.new_str("zlib.h");
        let mut vm = Vm::new(&mut wk);
        assert_eq!(func_has_header(&mut vm, compiler, &args(&[header])).unwrap(), Obj::FALSE);
        let call = Args {
            pos: vec![ArgValue { val: header, span: Span::default() }],
            kwargs: vec![(
                "required".to_string(),
                ArgValue { val: Obj::TRUE, span: Span::default() },
            )],
            span: Span::default(),
        };
        let err = func_has_header(&mut vm, compiler, &call).unwrap_err();
        assert_eq!(err.kind, ErrorKind::DepNotFound);
    }
}
