//! Built-in Modules
//!
//! `import()` hands out module objects; method lookup consults the
//! per-module tables here after user-exported captures. The fs module is
//! implemented against the filesystem seam; pkgconfig and python present
//! their signatures and answer through the narrow collaborators where they
//! can.

use crate::diagnostics::{usage_error, ErrorKind, InterpError, InterpResult};
use crate::functions::FuncImpl;
use crate::object::{ExternalProgram, Obj, SourceSetData, Value};
use crate::typecheck::args::ArgParser;
use crate::typecheck::{
    TAG_LISTIFY, TC_BOOL, TC_COERCIBLE_FILES, TC_DEPENDENCY, TC_EXTERNAL_PROGRAM, TC_FILE,
    TC_REQUIRED_KW, TC_SOURCE_SET, TC_STRING,
};
use crate::vm::{Args, Vm};

/// Module names import() accepts.
pub const KNOWN_MODULES: &[&str] = &["fs", "pkgconfig", "python", "sourceset"];

pub fn lookup(module: &str, method: &str) -> Option<&'static FuncImpl> {
    let table: &[FuncImpl] = match module {
        "fs" => FS_METHODS,
        "pkgconfig" => PKGCONFIG_METHODS,
        "python" => PYTHON_METHODS,
        "sourceset" => SOURCESET_METHODS,
        _ => return None,
    };
    table.iter().find(|f| f.name == method)
}

/// Methods on the module value itself.
pub const MODULE_METHODS: &[FuncImpl] = &[FuncImpl::new("found", func_module_found, TC_BOOL)];

fn func_module_found(vm: &mut Vm, this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(_b) = ArgParser::new("found").bind(vm, args)?.into_bound() else {
        return Ok(Obj::DISABLER);
    };
    let found = match vm.wk.store.get(this) {
        Value::Module(m) => m.found,
        _ => unreachable!("receiver typechecked by dispatch"),
    };
    Ok(vm.wk.store.new_bool(found))
}

// ---- fs ----

fn fs_path_arg(vm: &mut Vm, obj: Obj) -> String {
    match vm.wk.store.path_like(obj) {
        Some(path) if path.starts_with('/') => path.to_string(),
        Some(path) => vm.wk.resolve_source_path(path),
        None => String::new(),
    }
}

fn func_fs_exists(vm: &mut Vm, _this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(b) = ArgParser::new("exists")
        .pos("path", TC_STRING | TC_FILE)
        .bind(vm, args)?
        .into_bound()
    else {
        return Ok(Obj::DISABLER);
    };
    let path = fs_path_arg(vm, b.pos(0));
    let result = vm.wk.fs.exists(&path);
    Ok(vm.wk.store.new_bool(result))
}

fn func_fs_is_file(vm: &mut Vm, _this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(b) = ArgParser::new("is_file")
        .pos("path", TC_STRING | TC_FILE)
        .bind(vm, args)?
        .into_bound()
    else {
        return Ok(Obj::DISABLER);
    };
    let path = fs_path_arg(vm, b.pos(0));
    let result = vm.wk.fs.is_file(&path);
    Ok(vm.wk.store.new_bool(result))
}

fn func_fs_is_dir(vm: &mut Vm, _this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(b) = ArgParser::new("is_dir")
        .pos("path", TC_STRING | TC_FILE)
        .bind(vm, args)?
        .into_bound()
    else {
        return Ok(Obj::DISABLER);
    };
    let path = fs_path_arg(vm, b.pos(0));
    let result = vm.wk.fs.is_dir(&path);
    Ok(vm.wk.store.new_bool(result))
}

fn func_fs_read(vm: &mut Vm, _this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(b) = ArgParser::new("read")
        .pos("path", TC_STRING | TC_FILE)
        .kw("encoding", TC_STRING)
        .bind(vm, args)?
        .into_bound()
    else {
        return Ok(Obj::DISABLER);
    };
    if let Some(encoding) = b.kw_str(&vm.wk.store, "encoding") {
        if encoding != "utf-8" {
            return Err(usage_error(format!("unsupported encoding '{}'", encoding))
                .at(b.kw_span("encoding")));
        }
    }
    let path = fs_path_arg(vm, b.pos(0));
    let contents = vm
        .wk
        .fs
        .read_to_string(&path)
        .map_err(|e| InterpError::new(ErrorKind::Io, e.to_string()).at(b.pos_span(0)))?;
    Ok(vm.wk.store.new_str(&contents))
}

fn fs_name_parts(path: &str) -> (&str, &str, &str) {
    let name = path.rsplit('/').next().unwrap_or(path);
    let (stem, _ext) = name.rsplit_once('.').unwrap_or((name, ""));
    let parent = match path.rsplit_once('/') {
        Some((parent, _)) if !parent.is_empty() => parent,
        Some(_) => "/",
        None => ".",
    };
    (parent, name, stem)
}

fn fs_string_fn(
    vm: &mut Vm,
    args: &Args,
    fname: &str,
    pick: fn(&str) -> String,
) -> InterpResult<Obj> {
    let Some(b) = ArgParser::new(fname)
        .pos("path", TC_STRING | TC_FILE)
        .bind(vm, args)?
        .into_bound()
    else {
        return Ok(Obj::DISABLER);
    };
    let raw = vm.wk.store.path_like(b.pos(0)).unwrap_or("").to_string();
    let result = pick(&raw);
    Ok(vm.wk.store.new_str(&result))
}

fn func_fs_parent(vm: &mut Vm, _this: Obj, args: &Args) -> InterpResult<Obj> {
    fs_string_fn(vm, args, "parent", |p| fs_name_parts(p).0.to_string())
}

fn func_fs_name(vm: &mut Vm, _this: Obj, args: &Args) -> InterpResult<Obj> {
    fs_string_fn(vm, args, "name", |p| fs_name_parts(p).1.to_string())
}

fn func_fs_stem(vm: &mut Vm, _this: Obj, args: &Args) -> InterpResult<Obj> {
    fs_string_fn(vm, args, "stem", |p| fs_name_parts(p).2.to_string())
}

fn func_fs_as_posix(vm: &mut Vm, _this: Obj, args: &Args) -> InterpResult<Obj> {
    fs_string_fn(vm, args, "as_posix", |p| p.replace('\\', "/"))
}

fn func_fs_is_absolute(vm: &mut Vm, _this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(b) = ArgParser::new("is_absolute")
        .pos("path", TC_STRING | TC_FILE)
        .bind(vm, args)?
        .into_bound()
    else {
        return Ok(Obj::DISABLER);
    };
    let raw = vm.wk.store.path_like(b.pos(0)).unwrap_or("").to_string();
    let result = raw.starts_with('/');
    Ok(vm.wk.store.new_bool(result))
}

fn func_fs_replace_suffix(vm: &mut Vm, _this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(b) = ArgParser::new("replace_suffix")
        .pos("path", TC_STRING | TC_FILE)
        .pos("suffix", TC_STRING)
        .bind(vm, args)?
        .into_bound()
    else {
        return Ok(Obj::DISABLER);
    };
    let raw = vm.wk.store.path_like(b.pos(0)).unwrap_or("").to_string();
    let suffix = vm.wk.store.get_str(b.pos(1)).to_string();
    let (parent, name, stem) = fs_name_parts(&raw);
    let new_name = format!("{}{}", stem, suffix);
    let result = if parent == "." {
        new_name
    } else {
        format!("{}/{}", parent, new_name)
    };
    let _ = name;
    Ok(vm.wk.store.new_str(&result))
}

const FS_METHODS: &[FuncImpl] = &[
    FuncImpl::new("as_posix", func_fs_as_posix, TC_STRING),
    FuncImpl::new("exists", func_fs_exists, TC_BOOL),
    FuncImpl::new("is_absolute", func_fs_is_absolute, TC_BOOL),
    FuncImpl::new("is_dir", func_fs_is_dir, TC_BOOL),
    FuncImpl::new("is_file", func_fs_is_file, TC_BOOL),
    FuncImpl::new("name", func_fs_name, TC_STRING),
    FuncImpl::new("parent", func_fs_parent, TC_STRING),
    FuncImpl::new("read", func_fs_read, TC_STRING),
    FuncImpl::new("replace_suffix", func_fs_replace_suffix, TC_STRING),
    FuncImpl::new("stem", func_fs_stem, TC_STRING),
];

// ---- pkgconfig ----

/// Signature-only: recording a .pc generation request is backend work.
fn func_pkgconfig_generate(vm: &mut Vm, _this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(b) = ArgParser::new("generate")
        .opt_pos("library", TC_COERCIBLE_FILES | TC_DEPENDENCY)
        .kw("name", TC_STRING)
        .kw("description", TC_STRING)
        .kw("version", TC_STRING)
        .kw("filebase", TC_STRING)
        .kw("subdirs", TAG_LISTIFY | TC_STRING)
        .kw("libraries", TAG_LISTIFY | TC_COERCIBLE_FILES | TC_DEPENDENCY | TC_STRING)
        .kw("requires", TAG_LISTIFY | TC_STRING | TC_DEPENDENCY)
        .bind(vm, args)?
        .into_bound()
    else {
        return Ok(Obj::DISABLER);
    };
    let _ = b;
    Err(usage_error("pkgconfig.generate is not provided by this configuration core")
        .at(args.span))
}

const PKGCONFIG_METHODS: &[FuncImpl] =
    &[FuncImpl::new("generate", func_pkgconfig_generate, 0)];

// ---- python ----

fn func_python_find_installation(vm: &mut Vm, _this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(b) = ArgParser::new("find_installation")
        .opt_pos("name", TC_STRING)
        .kw("required", TC_REQUIRED_KW)
        .kw("modules", TAG_LISTIFY | TC_STRING)
        .bind(vm, args)?
        .into_bound()
    else {
        return Ok(Obj::DISABLER);
    };
    let name = b
        .opt_pos(0)
        .map(|a| vm.wk.store.get_str(a.val).to_string())
        .unwrap_or_else(|| "python3".to_string());
    let path = vm.wk.runner.find_on_path(&name);
    let found = path.is_some();
    let (required, _) = crate::typecheck::coerce::requirement(vm.wk, b.kw("required"));
    if required && !found {
        return Err(InterpError::new(
            ErrorKind::DepNotFound,
            format!("python installation '{}' not found", name),
        )
        .at(args.span));
    }
    Ok(vm.wk.store.push(Value::ExternalProgram(Box::new(ExternalProgram {
        name,
        path,
        found,
        version: None,
    }))))
}

const PYTHON_METHODS: &[FuncImpl] = &[FuncImpl::new(
    "find_installation",
    func_python_find_installation,
    TC_EXTERNAL_PROGRAM,
)];

// ---- sourceset ----

fn func_sourceset_source_set(vm: &mut Vm, _this: Obj, args: &Args) -> InterpResult<Obj> {
    let Some(_b) = ArgParser::new("source_set").bind(vm, args)?.into_bound() else {
        return Ok(Obj::DISABLER);
    };
    Ok(vm.wk.store.push(Value::SourceSet(Box::new(SourceSetData::default()))))
}

const SOURCESET_METHODS: &[FuncImpl] =
    &[FuncImpl::new("source_set", func_sourceset_source_set, TC_SOURCE_SET)];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Span;
    use crate::fs::InMemoryFs;
    use crate::vm::ArgValue;
    use crate::workspace::Workspace;

    fn setup() -> Workspace {
        let fs = InMemoryFs::new().with_file("/src/data/notes.txt", "hello\n");
        let mut wk = Workspace::new(Box::new(fs), "/src", "/build");
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
    fn test_lookup_by_module_name() {
        assert!(lookup("fs", "read").is_some());
        assert!(lookup("fs", "nope").is_none());
        assert!(lookup("python", "find_installation").is_some());
        assert!(lookup("unknown", "read").is_none());
    }

    #[test]
    fn test_fs_queries_resolve_relative_paths() {
        let mut wk = setup();
        let rel = wk.store.new_str("data/notes.txt");
        let missing = wk.store.new_str("data/gone.txt");
        let mut vm = Vm::new(&mut wk);
        assert_eq!(func_fs_exists(&mut vm, Obj::NULL, &args(&[rel])).unwrap(), Obj::TRUE);
        assert_eq!(func_fs_is_file(&mut vm, Obj::NULL, &args(&[rel])).unwrap(), Obj::TRUE);
        assert_eq!(func_fs_exists(&mut vm, Obj::NULL, &args(&[missing])).unwrap(), Obj::FALSE);
        let dir = vm.wk.store.new_str("data");
        assert_eq!(func_fs_is_dir(&mut vm, Obj::NULL, &args(&[dir])).unwrap(), Obj::TRUE);
    }

    #[test]
    fn test_fs_read() {
        let mut wk = setup();
        let rel = wk.store.new_str("data/notes.txt");
        let mut vm = Vm::new(&mut wk);
        let contents = func_fs_read(&mut vm, Obj::NULL, &args(&[rel])).unwrap();
        assert_eq!(vm.wk.store.as_str(contents), Some("hello\n"));
        let missing = vm.wk.store.new_str("gone.txt");
        assert!(func_fs_read(&mut vm, Obj::NULL, &args(&[missing])).is_err());
    }

    #[test]
    fn test_fs_path_helpers() {
        let mut wk = setup();
        let path = wk.store.new_str("dir/file.tar.gz");
        let mut vm = Vm::new(&mut wk);
        let parent = func_fs_parent(&mut vm, Obj::NULL, &args(&[path])).unwrap();
        assert_eq!(vm.wk.store.as_str(parent), Some("dir"));
        let name = func_fs_name(&mut vm, Obj::NULL, &args(&[path])).unwrap();
        assert_eq!(vm.wk.store.as_str(name), Some("file.tar.gz"));
        let stem = func_fs_stem(&mut vm, Obj::NULL, &args(&[path])).unwrap();
        assert_eq!(vm.wk.store.as_str(stem), Some("file.tar"));
        let absolute = func_fs_is_absolute(&mut vm, Obj::NULL, &args(&[path])).unwrap();
        assert_eq!(absolute, Obj::FALSE);
    }

    #[test]
    fn test_fs_replace_suffix() {
        let mut wk = setup();
        let path = wk.store.new_str("dir/file.c");
        let suffix = wk.store.new_str(".o");
        let mut vm = Vm::new(&mut wk);
        let out = func_fs_replace_suffix(&mut vm, Obj::NULL, &args(&[path, suffix])).unwrap();
        assert_eq!(vm.wk.store.as_str(out), Some("dir/file.o"));
    }

    #[test]
    fn test_pkgconfig_generate_is_signature_only() {
        let mut wk = setup();
        let mut vm = Vm::new(&mut wk);
        let err = func_pkgconfig_generate(&mut vm, Obj::NULL, &Args::default()).unwrap_err();
        assert!(err.message.contains("pkgconfig.generate"));
    }

    #[test]
    fn test_sourceset_constructor() {
        let mut wk = setup();
        let mut vm = Vm::new(&mut wk);
        let set = func_sourceset_source_set(&mut vm, Obj::NULL, &Args::default()).unwrap();
        assert!(matches!(vm.wk.store.get(set), Value::SourceSet(_)));
    }
}
