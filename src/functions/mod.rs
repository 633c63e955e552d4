//! Function Registry and Dispatch
//!
//! Native functions are plain records in static per-receiver-type tables.
//! Dispatch order for `x.m(...)`: user-exported module captures, then the
//! receiver type's method table. Top-level calls go through the kernel
//! table selected by the workspace language mode.

pub mod array;
pub mod both_libs;
pub mod boolean;
pub mod build_target;
pub mod compiler_obj;
pub mod configuration_data;
pub mod custom_target;
pub mod dependency;
pub mod dict;
pub mod environment;
pub mod external_program;
pub mod feature_opt;
pub mod file;
pub mod generator;
pub mod kernel;
pub mod machine;
pub mod meson;
pub mod modules;
pub mod number;
pub mod run_result;
pub mod source_set;
pub mod string;
pub mod subproject_obj;

use crate::diagnostics::{ErrorKind, InterpError, InterpResult};
use crate::object::{Obj, ObjType, Value};
use crate::typecheck::TypeTag;
use crate::vm::{Args, Vm};
use crate::workspace::LanguageMode;

/// Behavior flags on a native function.
pub mod flags {
    /// Rejected when the workspace runs sandboxed.
    pub const SANDBOX_DISABLE: u8 = 1 << 0;
    /// Not memoizable by the analyzer.
    pub const IMPURE: u8 = 1 << 1;
    /// Not part of the compatibility surface.
    pub const EXTENSION: u8 = 1 << 2;
    /// May raise by contract (assert, error).
    pub const THROWS_ERROR: u8 = 1 << 3;
    /// Binds normally even when a disabler appears among the arguments.
    pub const DISABLER_IMMUNE: u8 = 1 << 4;
}

pub type NativeFn = fn(&mut Vm, Obj, &Args) -> InterpResult<Obj>;

/// Descriptor of one native function.
pub struct FuncImpl {
    pub name: &'static str,
    pub func: NativeFn,
    pub return_type: TypeTag,
    pub flags: u8,
}

impl FuncImpl {
    pub const fn new(name: &'static str, func: NativeFn, return_type: TypeTag) -> Self {
        Self { name, func, return_type, flags: 0 }
    }

    pub const fn with_flags(
        name: &'static str,
        func: NativeFn,
        return_type: TypeTag,
        flags: u8,
    ) -> Self {
        Self { name, func, return_type, flags }
    }
}

fn method_table(ty: ObjType) -> &'static [FuncImpl] {
    match ty {
        ObjType::Str => string::METHODS,
        ObjType::Number => number::METHODS,
        ObjType::Bool => boolean::METHODS,
        ObjType::Array => array::METHODS,
        ObjType::Dict => dict::METHODS,
        ObjType::FeatureOpt => feature_opt::METHODS,
        ObjType::File => file::METHODS,
        ObjType::BuildTarget => build_target::METHODS,
        ObjType::BothLibs => both_libs::METHODS,
        ObjType::CustomTarget => custom_target::METHODS,
        ObjType::Dependency => dependency::METHODS,
        ObjType::Environment => environment::METHODS,
        ObjType::ConfigurationData => configuration_data::METHODS,
        ObjType::ExternalProgram => external_program::METHODS,
        ObjType::Machine => machine::METHODS,
        ObjType::Meson => meson::METHODS,
        ObjType::Generator => generator::METHODS,
        ObjType::GeneratedList => generator::LIST_METHODS,
        ObjType::RunResult => run_result::METHODS,
        ObjType::Subproject => subproject_obj::METHODS,
        ObjType::Compiler => compiler_obj::METHODS,
        ObjType::SourceSet => source_set::METHODS,
        ObjType::SourceConfiguration => source_set::CONFIG_METHODS,
        ObjType::Module => modules::MODULE_METHODS,
        _ => &[],
    }
}

fn find<'a>(table: &'a [FuncImpl], name: &str) -> Option<&'a FuncImpl> {
    table.iter().find(|f| f.name == name)
}

fn check_flags(vm: &Vm, fi: &FuncImpl, name: &str) -> InterpResult<()> {
    if vm.wk.sandbox && fi.flags & flags::SANDBOX_DISABLE != 0 {
        return Err(InterpError::new(
            ErrorKind::Usage,
            format!("function '{}' is not available in sandboxed mode", name),
        ));
    }
    Ok(())
}

/// Call a top-level function through the kernel table for the active
/// language mode.
pub fn call_kernel(vm: &mut Vm, name: &str, args: &Args) -> InterpResult<Obj> {
    let fi = match vm.wk.lang_mode {
        LanguageMode::Opts => find(kernel::OPTS_FUNCS, name),
        LanguageMode::External => find(kernel::KERNEL_FUNCS, name),
        LanguageMode::Internal | LanguageMode::Extended => {
            find(kernel::KERNEL_FUNCS, name).or_else(|| find(kernel::INTERNAL_FUNCS, name))
        }
    };
    let fi = fi.ok_or_else(|| {
        InterpError::new(ErrorKind::UnknownFunction, format!("function '{}' does not exist", name))
            .at(args.span)
    })?;
    check_flags(vm, fi, name)?;
    if args.any_disabler() && fi.flags & flags::DISABLER_IMMUNE == 0 {
        return Ok(Obj::DISABLER);
    }
    (fi.func)(vm, Obj::NULL, args)
}

/// Call a method on a receiver.
pub fn call_method(vm: &mut Vm, recv: Obj, name: &str, args: &Args) -> InterpResult<Obj> {
    // The disabler absorbs almost everything; found() reports the gap.
    if recv.is_disabler() {
        if name == "found" {
            return Ok(Obj::FALSE);
        }
        return Ok(Obj::DISABLER);
    }

    // User-exported module captures take precedence over native stubs.
    let module_info = match vm.wk.store.get(recv) {
        Value::Module(module) => {
            Some((module.name.clone(), module.exports.get(name).copied()))
        }
        _ => None,
    };
    if let Some((module_name, export)) = module_info {
        if let Some(export) = export {
            match vm.wk.store.get(export).clone() {
                Value::Func(def) => return vm.call_user_function(def.proto, None, args),
                Value::Capture(cap) => {
                    return vm.call_user_function(cap.proto, Some(cap.scopes), args)
                }
                _ => {
                    return Err(InterpError::new(
                        ErrorKind::Type,
                        format!("module export '{}' is not callable", name),
                    )
                    .at(args.span));
                }
            }
        }
        if let Some(fi) = modules::lookup(&module_name, name) {
            check_flags(vm, fi, name)?;
            if args.any_disabler() && fi.flags & flags::DISABLER_IMMUNE == 0 {
                return Ok(Obj::DISABLER);
            }
            return (fi.func)(vm, recv, args);
        }
    }

    let ty = vm.wk.store.obj_type(recv);
    let fi = find(method_table(ty), name).ok_or_else(|| {
        InterpError::new(
            ErrorKind::UnknownMethod,
            format!("{} object has no method '{}'", ty.as_str(), name),
        )
        .at(args.span)
    })?;
    check_flags(vm, fi, name)?;
    if args.any_disabler() && fi.flags & flags::DISABLER_IMMUNE == 0 {
        return Ok(Obj::DISABLER);
    }
    (fi.func)(vm, recv, args)
}
