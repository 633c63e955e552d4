//! Per-Project State
//!
//! The unit declared by `project()`. Each subproject gets a fresh one of
//! these; the root project is index 0 in the workspace.

use std::collections::HashMap;

use indexmap::IndexMap;

use crate::object::{MachineKind, Obj};

/// Key for the per-project dependency cache: name, static mode, machine.
pub type DepCacheKey = (String, bool, MachineKind);

#[derive(Debug, Default)]
pub struct Project {
    pub name: String,
    pub version: Option<String>,
    pub license: Vec<String>,
    pub meson_version: Option<String>,
    /// None for the root project.
    pub subproject_name: Option<String>,
    /// Directory currently being evaluated, relative to the source root.
    pub cwd: String,
    /// Directory of the project root, relative to the source root.
    pub root_dir: String,
    pub subproject_dir: String,
    /// project() has run.
    pub configured: bool,

    /// Scope stack: innermost last. Function calls push and pop.
    pub scopes: Vec<IndexMap<String, Obj>>,

    pub targets: Vec<Obj>,
    pub tests: Vec<Obj>,
    pub install_targets: Vec<Obj>,
    pub options: IndexMap<String, Obj>,
    pub dep_cache: HashMap<DepCacheKey, Obj>,
    /// Probed compilers keyed by (language, machine).
    pub compilers: HashMap<(String, MachineKind), Obj>,
    pub project_args: HashMap<(String, MachineKind), Vec<String>>,
    pub project_link_args: HashMap<(String, MachineKind), Vec<String>>,
    pub project_deps: Vec<Obj>,
    /// summary() sections in insertion order.
    pub summary: IndexMap<String, Vec<(String, Obj)>>,
    /// default_options from project(), key=value form.
    pub default_options: HashMap<String, String>,
    /// Dependency names provided by wraps in this project's subproject dir.
    pub wrap_provides: HashMap<String, String>,
    /// Program names provided by wraps.
    pub wrap_provides_programs: HashMap<String, String>,
    /// Wrap name -> extracted source directory override.
    pub wrap_dirs: HashMap<String, String>,
    pub wraps_scanned: bool,
}

impl Project {
    pub fn new(root_dir: &str, subproject_name: Option<String>) -> Self {
        Self {
            subproject_name,
            cwd: root_dir.to_string(),
            root_dir: root_dir.to_string(),
            subproject_dir: "subprojects".to_string(),
            scopes: vec![IndexMap::new()],
            ..Default::default()
        }
    }

    pub fn lookup_var(&self, name: &str) -> Option<Obj> {
        for scope in self.scopes.iter().rev() {
            if let Some(&obj) = scope.get(name) {
                return Some(obj);
            }
        }
        None
    }

    pub fn set_var(&mut self, name: &str, value: Obj) {
        self.scopes
            .last_mut()
            .expect("scope stack is never empty")
            .insert(name.to_string(), value);
    }

    /// Remove a binding wherever it lives in the stack.
    pub fn unset_var(&mut self, name: &str) -> bool {
        for scope in self.scopes.iter_mut().rev() {
            if scope.shift_remove(name).is_some() {
                return true;
            }
        }
        false
    }
}
