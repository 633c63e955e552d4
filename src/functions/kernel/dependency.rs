//! Dependency Resolution
//!
//! The multi-stage resolver: override table, per-project cache, forced
//! fallback, lookup methods in order, then subproject fallback. Cache
//! entries are written only on success paths that are not themselves cache
//! reads.

use crate::diagnostics::{usage_error, ErrorKind, InterpError, InterpResult, Span};
use crate::functions::kernel::{ensure_configured, machine_from_native_kw, subproject};
use crate::object::{DepKind, Dependency, MachineKind, Obj, Value};
use crate::typecheck::args::ArgParser;
use crate::typecheck::{
    coerce, TAG_GLOB, TAG_LISTIFY, TC_ARRAY, TC_BOOL, TC_DICT, TC_REQUIRED_KW, TC_STRING,
};
use crate::version;
use crate::vm::{Args, Vm};
use crate::workspace::Workspace;

/// Machine a value is built for, when it has one.
fn machine_of(wk: &Workspace, obj: Obj) -> Option<MachineKind> {
    match wk.store.get(obj) {
        Value::BuildTarget(bt) => bt.machine,
        Value::Dependency(dep) => Some(dep.machine),
        Value::BothLibs { shared_lib, .. } => machine_of(wk, *shared_lib),
        _ => None,
    }
}

/// Reject any element targeting a different machine.
pub fn check_machine<'a>(
    wk: &Workspace,
    expected: MachineKind,
    elements: impl Iterator<Item = &'a Obj>,
    span: Span,
) -> InterpResult<()> {
    for &obj in elements {
        if let Some(machine) = machine_of(wk, obj) {
            if machine != expected {
                return Err(InterpError::new(
                    ErrorKind::MachineMismatch,
                    format!(
                        "element built for the {} machine cannot be used by a {} machine target",
                        machine.as_str(),
                        expected.as_str()
                    ),
                )
                .at(span));
            }
        }
    }
    Ok(())
}

/// The single machine a set of linked elements agrees on (host when none
/// declares one).
pub fn unified_machine<'a>(
    wk: &Workspace,
    elements: impl Iterator<Item = &'a Obj>,
    span: Span,
) -> InterpResult<MachineKind> {
    let mut found: Option<MachineKind> = None;
    for &obj in elements {
        if let Some(machine) = machine_of(wk, obj) {
            match found {
                None => found = Some(machine),
                Some(prev) if prev != machine => {
                    return Err(InterpError::new(
                        ErrorKind::MachineMismatch,
                        "cannot mix elements built for different machines",
                    )
                    .at(span));
                }
                _ => {}
            }
        }
    }
    Ok(found.unwrap_or(MachineKind::Host))
}

struct LookupCtx {
    name: String,
    machine: MachineKind,
    statik: bool,
    versions: Vec<String>,
    method: String,
    fallback: Vec<String>,
    allow_fallback: Option<bool>,
    default_options: Vec<(String, String)>,
    span: Span,
}

fn dep_version_ok(wk: &Workspace, dep: Obj, versions: &[String]) -> bool {
    if versions.is_empty() {
        return true;
    }
    match wk.store.get(dep) {
        Value::Dependency(d) => match &d.version {
            Some(v) => version::check_all(v, versions),
            None => true,
        },
        _ => true,
    }
}

fn check_override(vm: &mut Vm, ctx: &LookupCtx) -> Option<Obj> {
    vm.wk
        .dep_overrides
        .get(&(ctx.name.clone(), ctx.statik, ctx.machine))
        .copied()
}

fn check_cache(vm: &mut Vm, ctx: &LookupCtx) -> Option<Obj> {
    let key = (ctx.name.clone(), ctx.statik, ctx.machine);
    let hit = vm.wk.current_project().dep_cache.get(&key).copied()?;
    if dep_version_ok(vm.wk, hit, &ctx.versions) {
        Some(hit)
    } else {
        None
    }
}

fn cache_store(vm: &mut Vm, ctx: &LookupCtx, dep: Obj) {
    let key = (ctx.name.clone(), ctx.statik, ctx.machine);
    vm.wk.current_project_mut().dep_cache.insert(key, dep);
}

fn lookup_pkgconfig(vm: &mut Vm, ctx: &LookupCtx) -> Option<Obj> {
    let info = vm.wk.pkgconfig.query(&ctx.name, ctx.statik, ctx.machine)?;
    if !ctx.versions.is_empty() && !version::check_all(&info.version, &ctx.versions) {
        let text = format!(
            "found {} {} via pkg-config but the requested version is {:?}",
            ctx.name, info.version, ctx.versions
        );
        vm.wk.diag.warning(Some(ctx.span), &text);
        return None;
    }
    let mut dep = Dependency::found(ctx.name.clone(), DepKind::Pkgconf, ctx.machine);
    dep.version = Some(info.version);
    dep.compile_args = info.cflags;
    dep.link_args = info.libs;
    dep.variables = info.variables.into_iter().collect();
    Some(vm.wk.store.push(Value::Dependency(Box::new(dep))))
}

fn lookup_appleframeworks(vm: &mut Vm, ctx: &LookupCtx, modules: &[String]) -> Option<Obj> {
    let system = vm.wk.machine_info(ctx.machine).system.clone();
    if system != "macos" && system != "darwin" {
        return None;
    }
    if modules.is_empty() {
        return None;
    }
    let mut dep = Dependency::found(ctx.name.clone(), DepKind::AppleFrameworks, ctx.machine);
    for module in modules {
        dep.link_args.push("-framework".to_string());
        dep.link_args.push(module.clone());
    }
    Some(vm.wk.store.push(Value::Dependency(Box::new(dep))))
}

fn lookup_builtin(vm: &mut Vm, ctx: &LookupCtx) -> Option<Obj> {
    if ctx.name != "threads" {
        return None;
    }
    let mut dep = Dependency::found("threads", DepKind::Threads, ctx.machine);
    dep.compile_args.push("-pthread".to_string());
    dep.link_args.push("-pthread".to_string());
    Some(vm.wk.store.push(Value::Dependency(Box::new(dep))))
}

fn lookup_system(vm: &mut Vm, ctx: &LookupCtx) -> Option<Obj> {
    if !vm.wk.toolchain.find_library(&ctx.name, ctx.machine) {
        return None;
    }
    let mut dep = Dependency::found(ctx.name.clone(), DepKind::ExternalLibrary, ctx.machine);
    dep.link_args = vec![format!("-l{}", ctx.name)];
    Some(vm.wk.store.push(Value::Dependency(Box::new(dep))))
}

fn try_methods(vm: &mut Vm, ctx: &LookupCtx, modules: &[String]) -> Option<Obj> {
    let methods: Vec<&str> = match ctx.method.as_str() {
        "auto" => vec!["pkg-config", "extraframework", "system", "builtin"],
        other => vec![other],
    };
    for method in methods {
        let found = match method {
            "pkg-config" | "pkgconfig" => lookup_pkgconfig(vm, ctx),
            "extraframework" | "appleframeworks" => lookup_appleframeworks(vm, ctx, modules),
            "builtin" => lookup_builtin(vm, ctx),
            "system" => lookup_system(vm, ctx),
            _ => None,
        };
        if found.is_some() {
            return found;
        }
    }
    None
}

/// Evaluate the fallback subproject and pull the dependency out of the
/// override table or the named variable.
fn run_fallback(vm: &mut Vm, ctx: &LookupCtx) -> InterpResult<Option<Obj>> {
    if vm.wk.string_option("wrap_mode") == Some("nofallback") {
        return Ok(None);
    }
    let (subp_name, var_name) = match ctx.fallback.len() {
        0 => {
            // Implicit fallback: a wrap provide entry or a subproject
            // named after the dependency.
            let provided = vm.wk.projects[0].wrap_provides.get(&ctx.name).cloned();
            match provided {
                Some(name) => (name, None),
                None => (ctx.name.clone(), None),
            }
        }
        1 => (ctx.fallback[0].clone(), None),
        2 => (ctx.fallback[0].clone(), Some(ctx.fallback[1].clone())),
        _ => {
            return Err(usage_error("fallback expects a list of one or two names").at(ctx.span));
        }
    };

    let sub = subproject::eval_subproject(vm, &subp_name, &ctx.default_options, ctx.span)?;
    let found = match vm.wk.store.get(sub) {
        Value::Subproject(sp) => sp.found,
        _ => false,
    };
    if !found {
        return Ok(None);
    }

    // A subproject usually registers its dependency via
    // override_dependency while it configures.
    if let Some(dep) = check_override(vm, ctx) {
        return Ok(Some(dep));
    }

    if let Some(var) = var_name {
        let project_index = match vm.wk.store.get(sub) {
            Value::Subproject(sp) => sp.project_index,
            _ => None,
        };
        if let Some(index) = project_index {
            if let Some(value) = vm.wk.projects[index].lookup_var(&var) {
                if matches!(vm.wk.store.get(value), Value::Dependency(_)) {
                    return Ok(Some(value));
                }
                let text = format!(
                    "fallback variable '{}' in subproject '{}' is not a dependency",
                    var, subp_name
                );
                vm.wk.diag.warning(Some(ctx.span), &text);
            }
        }
    }
    Ok(None)
}

fn resolve_one(
    vm: &mut Vm,
    ctx: &LookupCtx,
    modules: &[String],
    fallback_allowed: bool,
) -> InterpResult<Option<Obj>> {
    if ctx.name.is_empty() {
        return Ok(None);
    }
    if let Some(dep) = check_override(vm, ctx) {
        return Ok(Some(dep));
    }
    if let Some(dep) = check_cache(vm, ctx) {
        return Ok(Some(dep));
    }

    let forced = vm.wk.string_option("wrap_mode") == Some("forcefallback");
    if forced && fallback_allowed {
        if let Some(dep) = run_fallback(vm, ctx)? {
            if dep_version_ok(vm.wk, dep, &ctx.versions) {
                cache_store(vm, ctx, dep);
                return Ok(Some(dep));
            }
        }
    }

    if let Some(dep) = try_methods(vm, ctx, modules) {
        cache_store(vm, ctx, dep);
        return Ok(Some(dep));
    }

    if fallback_allowed && !forced {
        if let Some(dep) = run_fallback(vm, ctx)? {
            if dep_version_ok(vm.wk, dep, &ctx.versions) {
                cache_store(vm, ctx, dep);
                return Ok(Some(dep));
            }
            let text = format!(
                "fallback provided '{}' but its version does not satisfy {:?}",
                ctx.name, ctx.versions
            );
            vm.wk.diag.warning(Some(ctx.span), &text);
        }
    }
    Ok(None)
}

pub fn func_dependency(vm: &mut Vm, _this: Obj, args: &Args) -> InterpResult<Obj> {
    ensure_configured(vm, args.span)?;
    subproject::ensure_wraps_scanned(vm.wk);
    let Some(b) = ArgParser::new("dependency")
        .pos("name", TC_STRING)
        .glob("names", TAG_GLOB | TC_STRING)
        .kw("required", TC_REQUIRED_KW)
        .kw("native", TC_BOOL)
        .kw("version", TAG_LISTIFY | TC_STRING)
        .kw("static", TC_BOOL)
        .kw("modules", TAG_LISTIFY | TC_STRING)
        .kw("fallback", TAG_LISTIFY | TC_STRING)
        .kw("allow_fallback", TC_BOOL)
        .kw("default_options", TC_ARRAY | TC_DICT | TC_STRING)
        .kw("method", TC_STRING)
        .kw("include_type", TC_STRING)
        .kw("disabler", TC_BOOL)
        .bind(vm, args)?
        .into_bound()
    else {
        return Ok(Obj::DISABLER);
    };

    let mut names = vec![vm.wk.store.get_str(b.pos(0)).to_string()];
    for extra in b.glob() {
        names.push(vm.wk.store.get_str(extra.val).to_string());
    }
    let method = b.kw_str(&vm.wk.store, "method").unwrap_or_else(|| "auto".to_string());
    if !["auto", "pkg-config", "pkgconfig", "system", "builtin", "extraframework", "appleframeworks"]
        .contains(&method.as_str())
    {
        return Err(usage_error(format!("unknown dependency method '{}'", method))
            .at(b.kw_span("method")));
    }
    if let Some(include_type) = b.kw_str(&vm.wk.store, "include_type") {
        if crate::object::IncludeType::from_str(&include_type).is_none() {
            return Err(usage_error(format!("invalid include_type '{}'", include_type))
                .at(b.kw_span("include_type")));
        }
    }

    let machine = machine_from_native_kw(vm, &b);
    let statik = b.kw_bool(&vm.wk.store, "static", false);
    let versions = b.kw_strs(&vm.wk.store, "version");
    let modules = b.kw_strs(&vm.wk.store, "modules");
    let fallback = b.kw_strs(&vm.wk.store, "fallback");
    let allow_fallback = b.kw("allow_fallback").and_then(|o| vm.wk.store.as_bool(o));
    let default_options: Vec<(String, String)> = match b.kw("default_options") {
        Some(obj) => coerce::string_map(vm.wk, obj)
            .map_err(|e| e.or_at(b.kw_span("default_options")))?
            .into_iter()
            .collect(),
        None => Vec::new(),
    };
    let (required, disabled) = coerce::requirement(vm.wk, b.kw("required"));

    let mut found: Option<Obj> = None;
    if !disabled {
        for name in &names {
            // Explicit fallback only applies to the first name; later
            // names are alternates resolved on their own.
            let is_first = name == &names[0];
            let ctx = LookupCtx {
                name: name.clone(),
                machine,
                statik,
                versions: versions.clone(),
                method: method.clone(),
                fallback: if is_first { fallback.clone() } else { Vec::new() },
                allow_fallback,
                default_options: default_options.clone(),
                span: args.span,
            };
            let fallback_allowed = match ctx.allow_fallback {
                Some(allowed) => allowed,
                None => {
                    !ctx.fallback.is_empty()
                        || vm.wk.projects[0].wrap_provides.contains_key(name)
                        || subproject::subproject_exists(vm.wk, name)
                }
            };
            found = resolve_one(vm, &ctx, &modules, fallback_allowed)?;
            if found.is_some() {
                break;
            }
        }
    }

    match found {
        Some(dep) => {
            if let Some(include_type) = b.kw_str(&vm.wk.store, "include_type") {
                if let Some(kind) = crate::object::IncludeType::from_str(&include_type) {
                    if let Value::Dependency(d) = vm.wk.store.get(dep).clone() {
                        let mut clone = (*d).clone();
                        clone.include_type = kind;
                        return Ok(vm.wk.store.push(Value::Dependency(Box::new(clone))));
                    }
                }
            }
            Ok(dep)
        }
        None => {
            if required && !disabled {
                return Err(InterpError::new(
                    ErrorKind::DepNotFound,
                    format!("dependency '{}' not found", names.join("', '")),
                )
                .at(b.pos_span(0)));
            }
            if b.kw_bool(&vm.wk.store, "disabler", false) {
                return Ok(Obj::DISABLER);
            }
            let dep = Dependency::not_found(names[0].clone(), machine);
            Ok(vm.wk.store.push(Value::Dependency(Box::new(dep))))
        }
    }
}
