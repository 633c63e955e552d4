//! String Methods

use crate::diagnostics::{bounds_error, coercion_error, InterpResult};
use crate::functions::FuncImpl;
use crate::object::Obj;
use crate::typecheck::args::ArgParser;
use crate::typecheck::{TAG_GLOB, TAG_LISTIFY, TC_ANY, TC_BOOL, TC_NUMBER, TC_STRING};
use crate::version;
use crate::vm::{Args, Vm};

fn this_str(vm: &Vm, this: Obj) -> String {
    vm.wk.store.get_str(this).to_string()
}

/// Replace `@N@` placeholders with rendered argument values.
fn func_format(vm: &mut Vm, this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(b) = ArgParser::new("format")
        .glob("values", TAG_GLOB | TC_ANY)
        .bind(vm, args)?
        .into_bound()
    else {
        return Ok(Obj::DISABLER);
    };
    let template = this_str(vm, this);
    let mut out = String::new();
    let chars: Vec<char> = template.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '@' {
            let mut j = i + 1;
            while j < chars.len() && chars[j].is_ascii_digit() {
                j += 1;
            }
            if j > i + 1 && j < chars.len() && chars[j] == '@' {
                let n: usize = chars[i + 1..j].iter().collect::<String>().parse().unwrap_or(0);
                match b.glob().get(n) {
                    Some(arg) => {
                        out.push_str(&vm.wk.store.render_plain(arg.val));
                        i = j + 1;
                        continue;
                    }
                    None => {
                        return Err(bounds_error(format!(
                            "format placeholder @{}@ has no matching argument",
                            n
                        ))
                        .at(args.span));
                    }
                }
            }
        }
        out.push(chars[i]);
        i += 1;
    }
    Ok(vm.wk.store.new_str(&out))
}

fn func_join(vm: &mut Vm, this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(b) = ArgParser::new("join")
        .pos("pieces", TAG_LISTIFY | TC_STRING)
        .bind(vm, args)?
        .into_bound()
    else {
        return Ok(Obj::DISABLER);
    };
    let sep = this_str(vm, this);
    let pieces: Vec<String> = vm
        .wk
        .store
        .as_array(b.pos(0))
        .map(|items| {
            items
                .iter()
                .filter_map(|&o| vm.wk.store.as_str(o).map(|s| s.to_string()))
                .collect()
        })
        .unwrap_or_default();
    Ok(vm.wk.store.new_str(&pieces.join(&sep)))
}

fn func_split(vm: &mut Vm, this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(b) = ArgParser::new("split")
        .opt_pos("separator", TC_STRING)
        .bind(vm, args)?
        .into_bound()
    else {
        return Ok(Obj::DISABLER);
    };
    let s = this_str(vm, this);
    let parts: Vec<String> = match b.opt_pos(0) {
        Some(sep) => {
            let sep = vm.wk.store.get_str(sep.val).to_string();
            s.split(sep.as_str()).map(|p| p.to_string()).collect()
        }
        None => s.split_whitespace().map(|p| p.to_string()).collect(),
    };
    let items: Vec<Obj> = parts.iter().map(|p| vm.wk.store.new_str(p)).collect();
    Ok(vm.wk.store.new_array(items))
}

fn func_strip(vm: &mut Vm, this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(b) = ArgParser::new("strip")
        .opt_pos("chars", TC_STRING)
        .bind(vm, args)?
        .into_bound()
    else {
        return Ok(Obj::DISABLER);
    };
    let s = this_str(vm, this);
    let stripped = match b.opt_pos(0) {
        Some(chars) => {
            let set: Vec<char> = vm.wk.store.get_str(chars.val).chars().collect();
            s.trim_matches(|c| set.contains(&c)).to_string()
        }
        None => s.trim().to_string(),
    };
    Ok(vm.wk.store.new_str(&stripped))
}

fn func_to_upper(vm: &mut Vm, this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(_b) = ArgParser::new("to_upper").bind(vm, args)?.into_bound() else {
        return Ok(Obj::DISABLER);
    };
    let s = this_str(vm, this).to_uppercase();
    Ok(vm.wk.store.new_str(&s))
}

fn func_to_lower(vm: &mut Vm, this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(_b) = ArgParser::new("to_lower").bind(vm, args)?.into_bound() else {
        return Ok(Obj::DISABLER);
    };
    let s = this_str(vm, this).to_lowercase();
    Ok(vm.wk.store.new_str(&s))
}

fn func_underscorify(vm: &mut Vm, this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(_b) = ArgParser::new("underscorify").bind(vm, args)?.into_bound() else {
        return Ok(Obj::DISABLER);
    };
    let s: String = this_str(vm, this)
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    Ok(vm.wk.store.new_str(&s))
}

fn func_startswith(vm: &mut Vm, this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(b) = ArgParser::new("startswith")
        .pos("prefix", TC_STRING)
        .bind(vm, args)?
        .into_bound()
    else {
        return Ok(Obj::DISABLER);
    };
    let s = this_str(vm, this);
    let prefix = vm.wk.store.get_str(b.pos(0));
    let result = s.starts_with(prefix);
    Ok(vm.wk.store.new_bool(result))
}

fn func_endswith(vm: &mut Vm, this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(b) = ArgParser::new("endswith")
        .pos("suffix", TC_STRING)
        .bind(vm, args)?
        .into_bound()
    else {
        return Ok(Obj::DISABLER);
    };
    let s = this_str(vm, this);
    let suffix = vm.wk.store.get_str(b.pos(0));
    let result = s.ends_with(suffix);
    Ok(vm.wk.store.new_bool(result))
}

fn func_contains(vm: &mut Vm, this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(b) = ArgParser::new("contains")
        .pos("needle", TC_STRING)
        .bind(vm, args)?
        .into_bound()
    else {
        return Ok(Obj::DISABLER);
    };
    let s = this_str(vm, this);
    let needle = vm.wk.store.get_str(b.pos(0));
    let result = s.contains(needle);
    Ok(vm.wk.store.new_bool(result))
}

fn func_replace(vm: &mut Vm, this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(b) = ArgParser::new("replace")
        .pos("old", TC_STRING)
        .pos("new", TC_STRING)
        .bind(vm, args)?
        .into_bound()
    else {
        return Ok(Obj::DISABLER);
    };
    let s = this_str(vm, this);
    let old = vm.wk.store.get_str(b.pos(0)).to_string();
    let new = vm.wk.store.get_str(b.pos(1)).to_string();
    let replaced = s.replace(&old, &new);
    Ok(vm.wk.store.new_str(&replaced))
}

fn func_to_int(vm: &mut Vm, this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(_b) = ArgParser::new("to_int").bind(vm, args)?.into_bound() else {
        return Ok(Obj::DISABLER);
    };
    let s = this_str(vm, this);
    match s.trim().parse::<i64>() {
        Ok(n) => Ok(vm.wk.store.new_number(n)),
        Err(_) => Err(coercion_error(format!("cannot convert '{}' to an integer", s))
            .at(args.span)),
    }
}

fn func_substring(vm: &mut Vm, this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(b) = ArgParser::new("substring")
        .opt_pos("start", TC_NUMBER)
        .opt_pos("end", TC_NUMBER)
        .bind(vm, args)?
        .into_bound()
    else {
        return Ok(Obj::DISABLER);
    };
    let s: Vec<char> = this_str(vm, this).chars().collect();
    let len = s.len() as i64;
    let clamp = |raw: i64| -> usize {
        let adjusted = if raw < 0 { len + raw } else { raw };
        adjusted.clamp(0, len) as usize
    };
    let start = b.opt_pos(0).and_then(|a| vm.wk.store.as_number(a.val)).unwrap_or(0);
    let end = b.opt_pos(1).and_then(|a| vm.wk.store.as_number(a.val)).unwrap_or(len);
    let (start, end) = (clamp(start), clamp(end));
    let sub: String = if start < end { s[start..end].iter().collect() } else { String::new() };
    Ok(vm.wk.store.new_str(&sub))
}

fn func_version_compare(vm: &mut Vm, this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(b) = ArgParser::new("version_compare")
        .pos("constraint", TC_STRING)
        .bind(vm, args)?
        .into_bound()
    else {
        return Ok(Obj::DISABLER);
    };
    let s = this_str(vm, this);
    let constraint = vm.wk.store.get_str(b.pos(0));
    let result = version::check_constraint(&s, constraint);
    Ok(vm.wk.store.new_bool(result))
}

pub const METHODS: &[FuncImpl] = &[
    FuncImpl::new("contains", func_contains, TC_BOOL),
    FuncImpl::new("endswith", func_endswith, TC_BOOL),
    FuncImpl::new("format", func_format, TC_STRING),
    FuncImpl::new("join", func_join, TC_STRING),
    FuncImpl::new("replace", func_replace, TC_STRING),
    FuncImpl::new("split", func_split, 0),
    FuncImpl::new("startswith", func_startswith, TC_BOOL),
    FuncImpl::new("strip", func_strip, TC_STRING),
    FuncImpl::new("substring", func_substring, TC_STRING),
    FuncImpl::new("to_int", func_to_int, TC_NUMBER),
    FuncImpl::new("to_lower", func_to_lower, TC_STRING),
    FuncImpl::new("to_upper", func_to_upper, TC_STRING),
    FuncImpl::new("underscorify", func_underscorify, TC_STRING),
    FuncImpl::new("version_compare", func_version_compare, TC_BOOL),
];
