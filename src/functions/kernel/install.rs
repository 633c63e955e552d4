//! Install Rules
//!
//! install_data/headers/man/subdir/symlink/emptydir record entries with
//! resolved source and destination paths. Destinations are anchored at the
//! prefix option unless already absolute.

use crate::diagnostics::{usage_error, InterpResult};
use crate::functions::kernel::ensure_configured;
use crate::object::{InstallFlavor, InstallTarget, Obj, Value};
use crate::typecheck::args::{ArgParser, BoundArgs};
use crate::typecheck::{
    coerce, TAG_GLOB, TAG_LISTIFY, TC_COERCIBLE_FILES, TC_FILE, TC_INSTALL_MODE_KW, TC_STRING,
};
use crate::vm::{Args, Vm};
use crate::workspace::Workspace;

/// Join an install dir (possibly prefix-relative) and a filename into the
/// final destination path.
pub fn resolve_dest(wk: &Workspace, dir: &str, name: &str) -> String {
    let prefix = wk.string_option("prefix").unwrap_or("/usr/local").to_string();
    let dir = if dir.starts_with('/') {
        dir.to_string()
    } else {
        format!("{}/{}", prefix.trim_end_matches('/'), dir)
    };
    if name.is_empty() {
        dir
    } else {
        format!("{}/{}", dir.trim_end_matches('/'), name)
    }
}

pub fn push_entry(wk: &mut Workspace, entry: InstallTarget) -> Obj {
    let obj = wk.store.push(Value::InstallTarget(Box::new(entry)));
    wk.current_project_mut().install_targets.push(obj);
    obj
}

fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

fn gather_files(vm: &mut Vm, b: &BoundArgs) -> InterpResult<Vec<String>> {
    let mut out = Vec::new();
    for arg in b.glob() {
        let files = coerce::files(vm.wk, arg.val).map_err(|e| e.or_at(arg.span))?;
        for file in files {
            out.push(vm.wk.store.file_path(file).to_string());
        }
    }
    Ok(out)
}

pub fn func_install_data(vm: &mut Vm, _this: Obj, args: &Args) -> InterpResult<Obj> {
    ensure_configured(vm, args.span)?;
    let Some(b) = ArgParser::new("install_data")
        .glob("sources", TAG_GLOB | TC_STRING | TC_FILE | TC_COERCIBLE_FILES)
        .kw("sources", TAG_LISTIFY | TC_COERCIBLE_FILES)
        .kw("install_dir", TC_STRING)
        .kw("install_mode", TC_INSTALL_MODE_KW)
        .kw("install_tag", TC_STRING)
        .kw("rename", TAG_LISTIFY | TC_STRING)
        .bind(vm, args)?
        .into_bound()
    else {
        return Ok(Obj::DISABLER);
    };
    let mut files = gather_files(vm, &b)?;
    for obj in b.kw_objs(&vm.wk.store, "sources") {
        let coerced = coerce::files(vm.wk, obj)?;
        for file in coerced {
            files.push(vm.wk.store.file_path(file).to_string());
        }
    }
    let project_name = vm.wk.current_project().name.clone();
    let datadir = vm.wk.string_option("datadir").unwrap_or("share").to_string();
    let install_dir = b
        .kw_str(&vm.wk.store, "install_dir")
        .unwrap_or_else(|| format!("{}/{}", datadir, project_name));
    let rename = b.kw_strs(&vm.wk.store, "rename");
    if !rename.is_empty() && rename.len() != files.len() {
        return Err(usage_error("rename must have one entry per source file")
            .at(b.kw_span("rename")));
    }
    let mode_objs = b.kw_objs(&vm.wk.store, "install_mode");
    let mode = coerce::install_mode(vm.wk, &mode_objs);
    let tag = b.kw_str(&vm.wk.store, "install_tag");
    for (i, src) in files.iter().enumerate() {
        let name = rename.get(i).map(|r| r.as_str()).unwrap_or_else(|| file_name(src));
        let dest = resolve_dest(vm.wk, &install_dir, name);
        push_entry(
            vm.wk,
            InstallTarget {
                src: src.clone(),
                dest,
                mode: mode.clone(),
                tag: tag.clone(),
                flavor: InstallFlavor::Data,
            },
        );
    }
    Ok(Obj::NULL)
}

pub fn func_install_headers(vm: &mut Vm, _this: Obj, args: &Args) -> InterpResult<Obj> {
    ensure_configured(vm, args.span)?;
    let Some(b) = ArgParser::new("install_headers")
        .glob("headers", TAG_GLOB | TC_STRING | TC_FILE | TC_COERCIBLE_FILES)
        .kw("install_dir", TC_STRING)
        .kw("subdir", TC_STRING)
        .kw("install_mode", TC_INSTALL_MODE_KW)
        .bind(vm, args)?
        .into_bound()
    else {
        return Ok(Obj::DISABLER);
    };
    if b.kw("install_dir").is_some() && b.kw("subdir").is_some() {
        return Err(usage_error("install_dir and subdir are mutually exclusive")
            .at(b.kw_span("subdir")));
    }
    let files = gather_files(vm, &b)?;
    let includedir = vm.wk.string_option("includedir").unwrap_or("include").to_string();
    let install_dir = match b.kw_str(&vm.wk.store, "install_dir") {
        Some(dir) => dir,
        None => match b.kw_str(&vm.wk.store, "subdir") {
            Some(sub) => format!("{}/{}", includedir, sub),
            None => includedir,
        },
    };
    let mode_objs = b.kw_objs(&vm.wk.store, "install_mode");
    let mode = coerce::install_mode(vm.wk, &mode_objs);
    for src in files {
        let dest = resolve_dest(vm.wk, &install_dir, file_name(&src));
        push_entry(
            vm.wk,
            InstallTarget {
                src,
                dest,
                mode: mode.clone(),
                tag: Some("devel".to_string()),
                flavor: InstallFlavor::Headers,
            },
        );
    }
    Ok(Obj::NULL)
}

pub fn func_install_man(vm: &mut Vm, _this: Obj, args: &Args) -> InterpResult<Obj> {
    ensure_configured(vm, args.span)?;
    let Some(b) = ArgParser::new("install_man")
        .glob("pages", TAG_GLOB | TC_STRING | TC_FILE | TC_COERCIBLE_FILES)
        .kw("install_dir", TC_STRING)
        .kw("install_mode", TC_INSTALL_MODE_KW)
        .kw("locale", TC_STRING)
        .bind(vm, args)?
        .into_bound()
    else {
        return Ok(Obj::DISABLER);
    };
    let files = gather_files(vm, &b)?;
    let mandir = vm.wk.string_option("mandir").unwrap_or("share/man").to_string();
    let mode_objs = b.kw_objs(&vm.wk.store, "install_mode");
    let mode = coerce::install_mode(vm.wk, &mode_objs);
    for src in files {
        let name = file_name(&src);
        // Man pages land in the section directory named by their suffix.
        let section = name.rsplit('.').next().unwrap_or("1");
        let install_dir = b
            .kw_str(&vm.wk.store, "install_dir")
            .unwrap_or_else(|| format!("{}/man{}", mandir, section));
        let dest = resolve_dest(vm.wk, &install_dir, name);
        push_entry(
            vm.wk,
            InstallTarget {
                src,
                dest,
                mode: mode.clone(),
                tag: Some("man".to_string()),
                flavor: InstallFlavor::Man,
            },
        );
    }
    Ok(Obj::NULL)
}

pub fn func_install_subdir(vm: &mut Vm, _this: Obj, args: &Args) -> InterpResult<Obj> {
    ensure_configured(vm, args.span)?;
    let Some(b) = ArgParser::new("install_subdir")
        .pos("subdir", TC_STRING)
        .kw("install_dir", TC_STRING)
        .kw("install_mode", TC_INSTALL_MODE_KW)
        .kw("install_tag", TC_STRING)
        .kw("exclude_files", TAG_LISTIFY | TC_STRING)
        .kw("exclude_directories", TAG_LISTIFY | TC_STRING)
        .kw("strip_directory", crate::typecheck::TC_BOOL)
        .bind(vm, args)?
        .into_bound()
    else {
        return Ok(Obj::DISABLER);
    };
    let subdir = vm.wk.store.get_str(b.pos(0)).to_string();
    let install_dir = b.kw_str(&vm.wk.store, "install_dir").ok_or_else(|| {
        usage_error("install_subdir requires the install_dir keyword").at(args.span)
    })?;
    let src = vm.wk.resolve_source_path(&subdir);
    let strip = b.kw_bool(&vm.wk.store, "strip_directory", false);
    let name = if strip { "" } else { file_name(&subdir) };
    let dest = resolve_dest(vm.wk, &install_dir, name);
    let mode_objs = b.kw_objs(&vm.wk.store, "install_mode");
    let mode = coerce::install_mode(vm.wk, &mode_objs);
    push_entry(
        vm.wk,
        InstallTarget {
            src,
            dest,
            mode,
            tag: b.kw_str(&vm.wk.store, "install_tag"),
            flavor: InstallFlavor::Subdir {
                exclude_files: b.kw_strs(&vm.wk.store, "exclude_files"),
                exclude_dirs: b.kw_strs(&vm.wk.store, "exclude_directories"),
            },
        },
    );
    Ok(Obj::NULL)
}

pub fn func_install_symlink(vm: &mut Vm, _this: Obj, args: &Args) -> InterpResult<Obj> {
    ensure_configured(vm, args.span)?;
    let Some(b) = ArgParser::new("install_symlink")
        .pos("name", TC_STRING)
        .kw("pointing_to", TC_STRING)
        .kw("install_dir", TC_STRING)
        .kw("install_tag", TC_STRING)
        .bind(vm, args)?
        .into_bound()
    else {
        return Ok(Obj::DISABLER);
    };
    let name = vm.wk.store.get_str(b.pos(0)).to_string();
    let pointing_to = b.kw_str(&vm.wk.store, "pointing_to").ok_or_else(|| {
        usage_error("install_symlink requires the pointing_to keyword").at(args.span)
    })?;
    let install_dir = b.kw_str(&vm.wk.store, "install_dir").ok_or_else(|| {
        usage_error("install_symlink requires the install_dir keyword").at(args.span)
    })?;
    let dest = resolve_dest(vm.wk, &install_dir, &name);
    push_entry(
        vm.wk,
        InstallTarget {
            src: String::new(),
            dest,
            mode: Vec::new(),
            tag: b.kw_str(&vm.wk.store, "install_tag"),
            flavor: InstallFlavor::Symlink { pointing_to },
        },
    );
    Ok(Obj::NULL)
}

pub fn func_install_emptydir(vm: &mut Vm, _this: Obj, args: &Args) -> InterpResult<Obj> {
    ensure_configured(vm, args.span)?;
    let Some(b) = ArgParser::new("install_emptydir")
        .glob("dirs", TAG_GLOB | TC_STRING)
        .kw("install_mode", TC_INSTALL_MODE_KW)
        .kw("install_tag", TC_STRING)
        .bind(vm, args)?
        .into_bound()
    else {
        return Ok(Obj::DISABLER);
    };
    let mode_objs = b.kw_objs(&vm.wk.store, "install_mode");
    let mode = coerce::install_mode(vm.wk, &mode_objs);
    let tag = b.kw_str(&vm.wk.store, "install_tag");
    for arg in b.glob() {
        let dir = vm.wk.store.get_str(arg.val).to_string();
        let dest = resolve_dest(vm.wk, &dir, "");
        push_entry(
            vm.wk,
            InstallTarget {
                src: String::new(),
                dest,
                mode: mode.clone(),
                tag: tag.clone(),
                flavor: InstallFlavor::Emptydir,
            },
        );
    }
    Ok(Obj::NULL)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::InMemoryFs;
    use crate::object::Value;

    fn setup() -> Workspace {
        let mut wk = Workspace::in_memory();
        let idx = wk.push_project("", None);
        wk.cur_project = idx;
        wk
    }

    fn eval(build_file: &str) -> Workspace {
        let fs = InMemoryFs::new().with_file("/src/meson.build", build_file);
        let mut wk = Workspace::new(Box::new(fs), "/src", "/build");
        if let Err(err) = wk.eval_root() {
            panic!("evaluation failed: {}", wk.diag.render(&err));
        }
        wk
    }

    fn entries(wk: &Workspace) -> Vec<&InstallTarget> {
        wk.projects[0]
            .install_targets
            .iter()
            .map(|&o| match wk.store.get(o) {
                Value::InstallTarget(it) => &**it,
                other => panic!("expected install target, got {:?}", other.obj_type()),
            })
            .collect()
    }

    #[test]
    fn test_resolve_dest_prefixes_relative_dirs() {
        let wk = setup();
        assert_eq!(resolve_dest(&wk, "share/doc", "README"), "/usr/local/share/doc/README");
        assert_eq!(resolve_dest(&wk, "/opt/data", "f"), "/opt/data/f");
        assert_eq!(resolve_dest(&wk, "share", ""), "/usr/local/share");
    }

    #[test]
    fn test_install_headers_subdir() {
        let wk = eval(
            "project('p')\ninstall_headers('api.h', subdir: 'mylib')\n",
        );
        let entries = entries(&wk);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].dest, "/usr/local/include/mylib/api.h");
        assert_eq!(entries[0].flavor, InstallFlavor::Headers);
    }

    #[test]
    fn test_install_man_section_dir() {
        let wk = eval("project('p')\ninstall_man('tool.1')\n");
        let entries = entries(&wk);
        assert_eq!(entries[0].dest, "/usr/local/share/man/man1/tool.1");
        assert_eq!(entries[0].flavor, InstallFlavor::Man);
    }

    #[test]
    fn test_install_data_rename() {
        let wk = eval(
            "project('p')\n\
             install_data('a.conf', rename: 'renamed.conf', install_dir: 'etc')\n",
        );
        let entries = entries(&wk);
        assert_eq!(entries[0].dest, "/usr/local/etc/renamed.conf");
        assert_eq!(entries[0].src, "/src/a.conf");
    }

    #[test]
    fn test_install_data_rename_count_mismatch() {
        let fs = InMemoryFs::new().with_file(
            "/src/meson.build",
            "project('p')\ninstall_data('a', 'b', rename: 'only-one', install_dir: 'etc')\n",
        );
        let mut wk = Workspace::new(Box::new(fs), "/src", "/build");
        let err = wk.eval_root().expect_err("rename arity mismatch");
        assert!(err.message.contains("rename"));
    }

    #[test]
    fn test_install_symlink_flavor() {
        let wk = eval(
            "project('p')\n\
             install_symlink('libz.so', pointing_to: 'libz.so.1', install_dir: 'lib')\n",
        );
        let entries = entries(&wk);
        assert_eq!(entries[0].dest, "/usr/local/lib/libz.so");
        assert_eq!(
            entries[0].flavor,
            InstallFlavor::Symlink { pointing_to: "libz.so.1".to_string() }
        );
    }

    #[test]
    fn test_install_subdir_excludes() {
        let wk = eval(
            "project('p')\n\
             install_subdir('assets', install_dir: 'share', exclude_files: ['secret'])\n",
        );
        let entries = entries(&wk);
        assert_eq!(entries[0].src, "/src/assets");
        match &entries[0].flavor {
            InstallFlavor::Subdir { exclude_files, .. } => {
                assert_eq!(exclude_files, &["secret".to_string()]);
            }
            other => panic!("expected subdir flavor, got {:?}", other),
        }
    }

    #[test]
    fn test_install_mode_rendered() {
        let wk = eval(
            "project('p')\n\
             install_data('a', install_dir: 'etc', install_mode: ['rw-r--r--', 0o644])\n",
        );
        let entries = entries(&wk);
        assert_eq!(entries[0].mode, ["rw-r--r--".to_string(), "644".to_string()]);
    }
}
