//! Workspace
//!
//! The single mutable context for one configuration run: object arena,
//! projects, option overrides, dependency/program override tables, caches,
//! and the collaborator handles. Every operation takes the workspace
//! explicitly; there is no module-level mutable state anywhere.

pub mod options;
pub mod project;

use std::collections::HashMap;

use crate::compiler::compile;
use crate::diagnostics::{Diagnostics, ErrorKind, InterpError, InterpResult, Source};
use crate::external::{NullPkgConfig, NullRunner, NullToolchain, PkgConfig, ProcessRunner, Toolchain};
use crate::fs::{FileSystem, InMemoryFs};
use crate::object::{MachineKind, Obj, ObjStore, Value};
use crate::parser::{parse_source, ParseMode};
use crate::vm::machine::Vm;
use crate::workspace::options::OptionOverride;
use crate::workspace::project::Project;

pub use options::seed_builtin_options;

pub const BUILD_FILE: &str = "meson.build";
pub const OPTION_FILES: [&str; 2] = ["meson.options", "meson_options.txt"];

/// Which function surface is visible to the file being evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LanguageMode {
    /// The compatibility surface.
    External,
    /// Unrestricted extras.
    Internal,
    /// Option files: `option()` and little else.
    Opts,
    /// Internal overlayed on external.
    Extended,
}

/// Description of one machine (host or build).
#[derive(Debug, Clone)]
pub struct MachineInfo {
    pub system: String,
    pub cpu_family: String,
    pub cpu: String,
    pub endian: String,
}

impl Default for MachineInfo {
    fn default() -> Self {
        Self {
            system: std::env::consts::OS.to_string(),
            cpu_family: std::env::consts::ARCH.to_string(),
            cpu: std::env::consts::ARCH.to_string(),
            endian: if cfg!(target_endian = "big") { "big" } else { "little" }.to_string(),
        }
    }
}

/// A registered test setup from add_test_setup().
#[derive(Debug, Clone)]
pub struct TestSetup {
    pub name: String,
    pub env: Option<Obj>,
    pub exe_wrapper: Vec<String>,
    pub timeout_multiplier: i64,
    pub is_default: bool,
}

pub struct Workspace {
    pub store: ObjStore,
    pub diag: Diagnostics,
    pub projects: Vec<Project>,
    pub cur_project: usize,
    pub lang_mode: LanguageMode,
    pub build_machine: MachineInfo,
    pub host_machine: MachineInfo,

    pub source_root: String,
    pub build_root: String,

    pub option_overrides: Vec<OptionOverride>,
    /// (name, static-mode, machine) -> dependency, set via
    /// meson.override_dependency.
    pub dep_overrides: HashMap<(String, bool, MachineKind), Obj>,
    /// name -> program/target, set via meson.override_find_program.
    pub program_overrides: HashMap<String, Obj>,
    /// Subprojects currently being evaluated, for cycle detection.
    pub subproject_stack: Vec<String>,
    /// Completed subproject evaluations by name.
    pub subprojects: HashMap<String, Obj>,

    pub global_args: HashMap<(String, MachineKind), Vec<String>>,
    pub global_link_args: HashMap<(String, MachineKind), Vec<String>>,
    pub global_deps: Vec<Obj>,
    pub install_scripts: Vec<Vec<String>>,
    pub postconf_scripts: Vec<Vec<String>>,
    pub test_setups: Vec<TestSetup>,

    /// Containers with an open iteration frame.
    pub iterating: Vec<Obj>,
    /// User-function call depth, bounded to keep recursion finite.
    pub call_depth: u32,
    pub sandbox: bool,

    pub fs: Box<dyn FileSystem>,
    pub toolchain: Box<dyn Toolchain>,
    pub runner: Box<dyn ProcessRunner>,
    pub pkgconfig: Box<dyn PkgConfig>,
}

pub const MAX_CALL_DEPTH: u32 = 256;

impl Workspace {
    pub fn new(fs: Box<dyn FileSystem>, source_root: &str, build_root: &str) -> Self {
        Self {
            store: ObjStore::new(),
            diag: Diagnostics::new(),
            projects: Vec::new(),
            cur_project: 0,
            lang_mode: LanguageMode::External,
            build_machine: MachineInfo::default(),
            host_machine: MachineInfo::default(),
            source_root: source_root.trim_end_matches('/').to_string(),
            build_root: build_root.trim_end_matches('/').to_string(),
            option_overrides: Vec::new(),
            dep_overrides: HashMap::new(),
            program_overrides: HashMap::new(),
            subproject_stack: Vec::new(),
            subprojects: HashMap::new(),
            global_args: HashMap::new(),
            global_link_args: HashMap::new(),
            global_deps: Vec::new(),
            install_scripts: Vec::new(),
            postconf_scripts: Vec::new(),
            test_setups: Vec::new(),
            iterating: Vec::new(),
            call_depth: 0,
            sandbox: false,
            fs,
            toolchain: Box::new(NullToolchain),
            runner: Box::new(NullRunner),
            pkgconfig: Box::new(NullPkgConfig),
        }
    }

    /// Workspace over an empty in-memory tree, for tests.
    pub fn in_memory() -> Self {
        Self::new(Box::new(InMemoryFs::new()), "/src", "/build")
    }

    // ---- project access ----

    pub fn current_project(&self) -> &Project {
        &self.projects[self.cur_project]
    }

    pub fn current_project_mut(&mut self) -> &mut Project {
        &mut self.projects[self.cur_project]
    }

    pub fn machine_info(&self, kind: MachineKind) -> &MachineInfo {
        match kind {
            MachineKind::Build => &self.build_machine,
            MachineKind::Host => &self.host_machine,
        }
    }

    /// Create a project and seed its root scope and builtin options.
    /// Returns the project index; the caller decides whether to switch to
    /// it.
    pub fn push_project(&mut self, root_dir: &str, subproject_name: Option<String>) -> usize {
        let index = self.projects.len();
        self.projects.push(Project::new(root_dir, subproject_name));
        seed_builtin_options(self, index);
        let meson = self.store.push(Value::Meson);
        let host = self.store.push(Value::Machine(MachineKind::Host));
        let build = self.store.push(Value::Machine(MachineKind::Build));
        let scope = &mut self.projects[index].scopes[0];
        scope.insert("meson".to_string(), meson);
        scope.insert("host_machine".to_string(), host);
        scope.insert("build_machine".to_string(), build);
        // Without a cross configuration the target machine is the host.
        scope.insert("target_machine".to_string(), host);
        index
    }

    // ---- paths ----

    pub fn join_rel(a: &str, b: &str) -> String {
        if a.is_empty() {
            b.to_string()
        } else if b.is_empty() {
            a.to_string()
        } else {
            format!("{}/{}", a, b)
        }
    }

    /// Absolute path under the source root.
    pub fn src_path(&self, rel: &str) -> String {
        if rel.is_empty() {
            self.source_root.clone()
        } else {
            format!("{}/{}", self.source_root, rel)
        }
    }

    /// Absolute path under the build root.
    pub fn build_path(&self, rel: &str) -> String {
        if rel.is_empty() {
            self.build_root.clone()
        } else {
            format!("{}/{}", self.build_root, rel)
        }
    }

    /// Absolute current source directory of the active project.
    pub fn current_source_dir(&self) -> String {
        self.src_path(&self.current_project().cwd)
    }

    pub fn current_build_dir(&self) -> String {
        self.build_path(&self.current_project().cwd)
    }

    /// Resolve a path-ish argument relative to the current source dir.
    pub fn resolve_source_path(&self, path: &str) -> String {
        if path.starts_with('/') {
            path.to_string()
        } else {
            format!("{}/{}", self.current_source_dir(), path)
        }
    }

    // ---- variables ----

    pub fn lookup_var(&self, name: &str) -> Option<Obj> {
        self.current_project().lookup_var(name)
    }

    pub fn set_var(&mut self, name: &str, value: Obj) {
        self.current_project_mut().set_var(name, value);
    }

    // ---- evaluation ----

    pub fn parse_mode(&self) -> ParseMode {
        match self.lang_mode {
            LanguageMode::External | LanguageMode::Opts => ParseMode::Standard,
            LanguageMode::Internal | LanguageMode::Extended => ParseMode::Extended,
        }
    }

    /// Load, parse, compile and run one source file. The path is relative
    /// to the source root.
    pub fn eval_file(&mut self, rel_path: &str) -> InterpResult<Obj> {
        let abs = self.src_path(rel_path);
        let text = self
            .fs
            .read_to_string(&abs)
            .map_err(|e| InterpError::new(ErrorKind::Io, e.to_string()))?;
        self.eval_text(&text, &abs)
    }

    /// Evaluate source text under a label. Used for files and for tests.
    pub fn eval_text(&mut self, text: &str, label: &str) -> InterpResult<Obj> {
        let source = self.diag.register_source(Source::new(label, text));
        let parsed = parse_source(text, source, self.parse_mode())?;
        let program = compile(&parsed.pool, &parsed.body, source)?;
        let mut vm = Vm::new(self);
        vm.run(&program)
    }

    /// Evaluate the build file of a directory (relative to source root).
    pub fn eval_build_file(&mut self, rel_dir: &str) -> InterpResult<Obj> {
        let rel = Self::join_rel(rel_dir, BUILD_FILE);
        self.eval_file(&rel)
    }

    /// Configure the root project: evaluate its build file and verify
    /// every override was consumed.
    pub fn eval_root(&mut self) -> InterpResult<()> {
        let index = self.push_project("", None);
        self.cur_project = index;
        self.eval_build_file("")?;
        if !self.projects[index].configured {
            return Err(InterpError::new(
                ErrorKind::Usage,
                format!("first statement of {} must be a call to project()", BUILD_FILE),
            ));
        }
        self.check_unused_overrides()?;
        Ok(())
    }

    fn check_unused_overrides(&self) -> InterpResult<()> {
        for oo in &self.option_overrides {
            if !oo.used {
                return Err(InterpError::new(
                    ErrorKind::OptionValidation,
                    format!("unknown option override: '{}'", oo.display()),
                ));
            }
        }
        Ok(())
    }

    // ---- options ----

    /// Effective option value for the active project, honoring yield
    /// inheritance for subprojects.
    pub fn option_value(&self, name: &str) -> Option<Obj> {
        let project = self.current_project();
        match project.options.get(name) {
            Some(&obj) => {
                let opt = match self.store.get(obj) {
                    Value::BuildOption(b) => b,
                    _ => return None,
                };
                if opt.yielding && self.cur_project != 0 {
                    if let Some(&parent) = self.projects[0].options.get(name) {
                        if let Value::BuildOption(p) = self.store.get(parent) {
                            return Some(p.value);
                        }
                    }
                }
                Some(opt.value)
            }
            None => None,
        }
    }

    pub fn string_option(&self, name: &str) -> Option<&str> {
        self.option_value(name).and_then(|o| self.store.as_str(o))
    }

    pub fn bool_option(&self, name: &str) -> Option<bool> {
        self.option_value(name).and_then(|o| self.store.as_bool(o))
    }

    /// Find a pending command-line override for an option in the active
    /// project and mark it used.
    pub fn take_option_override(&mut self, key: &str) -> Option<String> {
        let subproject = self.current_project().subproject_name.clone();
        for oo in self.option_overrides.iter_mut() {
            if oo.key == key && oo.subproject == subproject {
                oo.used = true;
                return Some(oo.value.clone());
            }
        }
        None
    }

    // ---- iteration lock ----

    pub fn iter_lock(&mut self, obj: Obj) {
        self.iterating.push(obj);
    }

    pub fn iter_unlock(&mut self, obj: Obj) {
        if let Some(pos) = self.iterating.iter().rposition(|&o| o == obj) {
            self.iterating.remove(pos);
        }
    }

    pub fn is_iterating(&self, obj: Obj) -> bool {
        self.iterating.contains(&obj)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{ObjType, TargetKind};

    fn workspace_with(files: &[(&str, &str)]) -> Workspace {
        let mut fs = InMemoryFs::new();
        for (path, contents) in files {
            fs.add_file(&format!("/src/{}", path), contents);
        }
        Workspace::new(Box::new(fs), "/src", "/build")
    }

    fn eval_ok(files: &[(&str, &str)]) -> Workspace {
        let mut wk = workspace_with(files);
        if let Err(err) = wk.eval_root() {
            panic!("evaluation failed: {}", wk.diag.render(&err));
        }
        wk
    }

    fn eval_err(files: &[(&str, &str)]) -> (Workspace, InterpError) {
        let mut wk = workspace_with(files);
        let err = wk.eval_root().expect_err("evaluation should fail");
        (wk, err)
    }

    fn var(wk: &Workspace, name: &str) -> Obj {
        wk.projects[0].lookup_var(name).unwrap_or_else(|| panic!("no variable '{}'", name))
    }

    #[test]
    fn test_minimum_project() {
        let wk = eval_ok(&[(
            "meson.build",
            "project('hello', 'c')\nexecutable('hello', 'hello.c')\n",
        )]);
        let project = &wk.projects[0];
        assert_eq!(project.name, "hello");
        assert_eq!(project.version, None);
        assert_eq!(project.targets.len(), 1);
        match wk.store.get(project.targets[0]) {
            Value::BuildTarget(bt) => {
                assert_eq!(bt.name, "hello");
                assert_eq!(bt.kind, Some(TargetKind::Executable));
                assert_eq!(bt.machine, Some(MachineKind::Host));
                let sources: Vec<&str> =
                    bt.sources.iter().map(|&s| wk.store.file_path(s)).collect();
                assert_eq!(sources, ["/src/hello.c"]);
            }
            other => panic!("expected build target, got {:?}", other.obj_type()),
        }
    }

    #[test]
    fn test_undefined_variable() {
        let (wk, err) = eval_err(&[("meson.build", "project('p', 'c')\nx = y + 1\n")]);
        assert_eq!(err.kind, crate::diagnostics::ErrorKind::UnknownVariable);
        let span = err.span.expect("anchored");
        assert_eq!(span.line, 2);
        assert_eq!(span.column, 5);
        assert!(wk.projects[0].targets.is_empty());
    }

    #[test]
    fn test_option_validation_rejects_bad_override() {
        let mut wk = workspace_with(&[
            ("meson.build", "project('p')\n"),
            (
                "meson.options",
                "option('level', type: 'combo', choices: ['low', 'med', 'high'], value: 'med')\n",
            ),
        ]);
        wk.option_overrides = vec![options::OptionOverride::parse("level=extreme").unwrap()];
        let err = wk.eval_root().expect_err("override must fail validation");
        assert_eq!(err.kind, crate::diagnostics::ErrorKind::OptionValidation);
        assert!(err.message.contains("extreme"));
        assert!(err.message.contains("low"));
    }

    #[test]
    fn test_option_round_trip() {
        let files: &[(&str, &str)] = &[
            ("meson.build", "project('p')\nlevel = get_option('level')\n"),
            (
                "meson.options",
                "option('level', type: 'combo', choices: ['low', 'med', 'high'], value: 'med')\n",
            ),
        ];
        let wk = eval_ok(files);
        assert_eq!(wk.store.as_str(var(&wk, "level")), Some("med"));

        let mut wk = workspace_with(files);
        wk.option_overrides = vec![options::OptionOverride::parse("level=high").unwrap()];
        wk.eval_root().unwrap();
        assert_eq!(wk.store.as_str(var(&wk, "level")), Some("high"));
    }

    #[test]
    fn test_unused_override_is_an_error() {
        let mut wk = workspace_with(&[("meson.build", "project('p')\n")]);
        wk.option_overrides = vec![options::OptionOverride::parse("nope=1").unwrap()];
        let err = wk.eval_root().expect_err("unused override");
        assert!(err.message.contains("nope"));
    }

    #[test]
    fn test_dependency_fallback_through_subproject() {
        let wk = eval_ok(&[
            (
                "meson.build",
                "project('p', 'c')\n\
                 d = dependency('foo', fallback: ['foo', 'foo_dep'], required: false)\n\
                 found = d.found()\n\
                 kind = d.type_name()\n",
            ),
            (
                "subprojects/foo/meson.build",
                "project('foo', 'c')\n\
                 foo_dep = declare_dependency()\n\
                 meson.override_dependency('foo', foo_dep)\n",
            ),
        ]);
        assert_eq!(wk.store.as_bool(var(&wk, "found")), Some(true));
        assert_eq!(wk.store.as_str(var(&wk, "kind")), Some("internal"));
    }

    #[test]
    fn test_disabler_short_circuits_target() {
        let wk = eval_ok(&[(
            "meson.build",
            "project('p', 'c')\n\
             d = dependency('nope', required: false, disabler: true)\n\
             t = executable('t', 'm.c', dependencies: d)\n\
             gone = is_disabler(t)\n",
        )]);
        assert!(var(&wk, "d").is_disabler());
        assert!(var(&wk, "t").is_disabler());
        assert_eq!(wk.store.as_bool(var(&wk, "gone")), Some(true));
        assert!(wk.projects[0].targets.is_empty());
    }

    #[test]
    fn test_configure_file_substitution() {
        let wk = eval_ok(&[
            (
                "meson.build",
                "project('p')\n\
                 conf = configuration_data()\n\
                 conf.set('FOO', true)\n\
                 conf.set('BAR', 'x')\n\
                 configure_file(input: 'in.h.in', output: 'out.h', configuration: conf)\n",
            ),
            ("in.h.in", "#mesondefine FOO\n@BAR@\n"),
        ]);
        let fs = &wk.fs;
        assert!(fs.is_file("/build/out.h"));
        assert_eq!(fs.read_to_string("/build/out.h").unwrap(), "#define FOO\nx\n");
    }

    #[test]
    fn test_configure_file_undef() {
        let wk = eval_ok(&[
            (
                "meson.build",
                "project('p')\n\
                 conf = configuration_data()\n\
                 conf.set('FOO', false)\n\
                 conf.set('BAR', 'x')\n\
                 configure_file(input: 'in.h.in', output: 'out.h', configuration: conf)\n",
            ),
            ("in.h.in", "#mesondefine FOO\n@BAR@\n"),
        ]);
        assert_eq!(
            wk.fs.read_to_string("/build/out.h").unwrap(),
            "#undef FOO\nx\n"
        );
    }

    #[test]
    fn test_missing_project_is_usage_error() {
        let (_wk, err) = eval_err(&[("meson.build", "x = 1\n")]);
        assert_eq!(err.kind, crate::diagnostics::ErrorKind::Usage);
    }

    #[test]
    fn test_foreach_and_compound_assign() {
        let wk = eval_ok(&[(
            "meson.build",
            "project('p')\n\
             total = 0\n\
             foreach n : [1, 2, 3]\n\
             total += n\n\
             endforeach\n",
        )]);
        assert_eq!(wk.store.as_number(var(&wk, "total")), Some(6));
    }

    #[test]
    fn test_plus_assign_rebinds() {
        let wk = eval_ok(&[(
            "meson.build",
            "project('p')\na = [1]\nb = a\na += 2\nalen = a.length()\nblen = b.length()\n",
        )]);
        assert_eq!(wk.store.as_number(var(&wk, "alen")), Some(2));
        assert_eq!(wk.store.as_number(var(&wk, "blen")), Some(1));
    }

    #[test]
    fn test_dict_iteration_order() {
        let wk = eval_ok(&[(
            "meson.build",
            "project('p')\n\
             keys = []\n\
             foreach k, v : {'z': 1, 'a': 2, 'm': 3}\n\
             keys += k\n\
             endforeach\n",
        )]);
        let keys: Vec<&str> = wk
            .store
            .as_array(var(&wk, "keys"))
            .unwrap()
            .iter()
            .map(|&k| wk.store.as_str(k).unwrap())
            .collect();
        assert_eq!(keys, ["z", "a", "m"]);
    }

    #[test]
    fn test_structural_equality() {
        let wk = eval_ok(&[(
            "meson.build",
            "project('p')\n\
             eq = [1, {'a': 'x'}] == [1, {'a': 'x'}]\n\
             ne = {'a': 1} == {'a': 2}\n",
        )]);
        assert_eq!(wk.store.as_bool(var(&wk, "eq")), Some(true));
        assert_eq!(wk.store.as_bool(var(&wk, "ne")), Some(false));
    }

    #[test]
    fn test_fstring_formatting() {
        let wk = eval_ok(&[(
            "meson.build",
            "project('p')\nv = 3\ns = f'value is @v@'\n",
        )]);
        assert_eq!(wk.store.as_str(var(&wk, "s")), Some("value is 3"));
    }

    #[test]
    fn test_ternary_and_logic() {
        let wk = eval_ok(&[(
            "meson.build",
            "project('p')\nx = true and false ? 'yes' : 'no'\ny = false or true\n",
        )]);
        assert_eq!(wk.store.as_str(var(&wk, "x")), Some("no"));
        assert_eq!(wk.store.as_bool(var(&wk, "y")), Some(true));
    }

    #[test]
    fn test_subdir_evaluation() {
        let wk = eval_ok(&[
            ("meson.build", "project('p', 'c')\nsubdir('src')\n"),
            ("src/meson.build", "executable('app', 'main.c')\n"),
        ]);
        assert_eq!(wk.projects[0].targets.len(), 1);
        match wk.store.get(wk.projects[0].targets[0]) {
            Value::BuildTarget(bt) => {
                let sources: Vec<&str> =
                    bt.sources.iter().map(|&s| wk.store.file_path(s)).collect();
                assert_eq!(sources, ["/src/src/main.c"]);
            }
            other => panic!("expected build target, got {:?}", other.obj_type()),
        }
    }

    #[test]
    fn test_subdir_done_stops_file() {
        let wk = eval_ok(&[(
            "meson.build",
            "project('p')\nx = 1\nsubdir_done()\nx = 2\n",
        )]);
        assert_eq!(wk.store.as_number(var(&wk, "x")), Some(1));
    }

    #[test]
    fn test_circular_subproject_detected() {
        let (_wk, err) = eval_err(&[
            ("meson.build", "project('p')\nsubproject('a')\n"),
            ("subprojects/a/meson.build", "project('a')\nsubproject('b')\n"),
            ("subprojects/b/meson.build", "project('b')\nsubproject('a')\n"),
        ]);
        assert_eq!(err.kind, crate::diagnostics::ErrorKind::CircularSubproject);
    }

    #[test]
    fn test_subproject_get_variable() {
        let wk = eval_ok(&[
            (
                "meson.build",
                "project('p')\nsp = subproject('lib')\nv = sp.get_variable('answer')\n",
            ),
            ("subprojects/lib/meson.build", "project('lib', version: '2.0')\nanswer = 42\n"),
        ]);
        assert_eq!(wk.store.as_number(var(&wk, "v")), Some(42));
    }

    #[test]
    fn test_tests_are_recorded() {
        let wk = eval_ok(&[(
            "meson.build",
            "project('p', 'c')\n\
             exe = executable('t', 't.c')\n\
             test('basic', exe, suite: ['unit'], timeout: 10)\n\
             benchmark('perf', exe)\n",
        )]);
        let project = &wk.projects[0];
        assert_eq!(project.tests.len(), 2);
        match wk.store.get(project.tests[0]) {
            Value::Test(t) => {
                assert_eq!(t.name, "basic");
                assert_eq!(t.suites, ["unit"]);
                assert_eq!(t.timeout, 10);
                assert!(!t.is_benchmark);
            }
            other => panic!("expected test, got {:?}", other.obj_type()),
        }
        match wk.store.get(project.tests[1]) {
            Value::Test(t) => assert!(t.is_benchmark),
            other => panic!("expected test, got {:?}", other.obj_type()),
        }
    }

    #[test]
    fn test_custom_target_placeholders() {
        let wk = eval_ok(&[(
            "meson.build",
            "project('p')\n\
             gen = find_program('gen.py', required: false)\n\
             custom_target('out', input: 'data.txt', output: 'data.gen',\n\
                           command: ['tool', '@INPUT@', '@OUTPUT@'])\n",
        )]);
        let project = &wk.projects[0];
        assert_eq!(project.targets.len(), 1);
        match wk.store.get(project.targets[0]) {
            Value::CustomTarget(ct) => {
                assert_eq!(
                    ct.command,
                    ["tool", "/src/data.txt", "/build/data.gen"]
                );
            }
            other => panic!("expected custom target, got {:?}", other.obj_type()),
        }
    }

    #[test]
    fn test_install_entries() {
        let wk = eval_ok(&[(
            "meson.build",
            "project('p')\ninstall_data('README', install_dir: 'share/doc')\n",
        )]);
        let project = &wk.projects[0];
        assert_eq!(project.install_targets.len(), 1);
        match wk.store.get(project.install_targets[0]) {
            Value::InstallTarget(it) => {
                assert_eq!(it.src, "/src/README");
                assert_eq!(it.dest, "/usr/local/share/doc/README");
            }
            other => panic!("expected install target, got {:?}", other.obj_type()),
        }
    }

    #[test]
    fn test_machine_objects() {
        let wk = eval_ok(&[(
            "meson.build",
            "project('p')\ns = host_machine.system()\ncross = meson.is_cross_build()\n",
        )]);
        assert!(wk.store.as_str(var(&wk, "s")).is_some());
        assert_eq!(wk.store.as_bool(var(&wk, "cross")), Some(false));
    }

    #[test]
    fn test_assert_failure_terminates() {
        let (_wk, err) =
            eval_err(&[("meson.build", "project('p')\nassert(false, 'boom')\n")]);
        assert_eq!(err.kind, crate::diagnostics::ErrorKind::Assert);
        assert!(err.message.contains("boom"));
    }

    #[test]
    fn test_string_methods_in_language() {
        let wk = eval_ok(&[(
            "meson.build",
            "project('p')\n\
             a = 'a b c'.split(' ')\n\
             u = 'x-y'.underscorify()\n\
             ok = '1.2.3'.version_compare('>= 1.0')\n\
             j = '/a'.join(['x', 'y'])\n",
        )]);
        assert_eq!(wk.store.as_array(var(&wk, "a")).unwrap().len(), 3);
        assert_eq!(wk.store.as_str(var(&wk, "u")), Some("x_y"));
        assert_eq!(wk.store.as_bool(var(&wk, "ok")), Some(true));
        assert_eq!(wk.store.as_str(var(&wk, "j")), Some("x/ay"));
    }

    #[test]
    fn test_both_libraries() {
        let wk = eval_ok(&[(
            "meson.build",
            "project('p', 'c')\n\
             libs = both_libraries('thing', 'thing.c')\n\
             s = libs.get_static_lib()\n\
             sh = libs.get_shared_lib()\n",
        )]);
        assert_eq!(wk.projects[0].targets.len(), 2);
        assert_eq!(wk.store.obj_type(var(&wk, "s")), ObjType::BuildTarget);
        assert_eq!(wk.store.obj_type(var(&wk, "sh")), ObjType::BuildTarget);
        match wk.store.get(var(&wk, "libs")) {
            Value::BothLibs { static_lib, shared_lib } => {
                match (wk.store.get(*static_lib), wk.store.get(*shared_lib)) {
                    (Value::BuildTarget(a), Value::BuildTarget(b)) => {
                        assert_eq!(a.kind, Some(TargetKind::StaticLibrary));
                        assert_eq!(b.kind, Some(TargetKind::SharedLibrary));
                    }
                    _ => panic!("both_libs must hold build targets"),
                }
            }
            other => panic!("expected both_libs, got {:?}", other.obj_type()),
        }
    }

    #[test]
    fn test_division_by_zero_reported() {
        let (_wk, err) = eval_err(&[("meson.build", "project('p')\nx = 1 / 0\n")]);
        assert_eq!(err.kind, crate::diagnostics::ErrorKind::Arithmetic);
    }

    #[test]
    fn test_import_fs_module() {
        let wk = eval_ok(&[(
            "meson.build",
            "project('p')\n\
             fs = import('fs')\n\
             here = fs.is_file('meson.build')\n\
             stem = fs.stem('dir/file.c')\n",
        )]);
        assert_eq!(wk.store.as_bool(var(&wk, "here")), Some(true));
        assert_eq!(wk.store.as_str(var(&wk, "stem")), Some("file"));
    }

    #[test]
    fn test_unknown_function_and_method() {
        let (_wk, err) = eval_err(&[("meson.build", "project('p')\nnot_a_function()\n")]);
        assert_eq!(err.kind, crate::diagnostics::ErrorKind::UnknownFunction);
        let (_wk, err) = eval_err(&[("meson.build", "project('p')\nx = 'a'.bogus()\n")]);
        assert_eq!(err.kind, crate::diagnostics::ErrorKind::UnknownMethod);
    }

    #[test]
    fn test_summary_recorded() {
        let wk = eval_ok(&[(
            "meson.build",
            "project('p')\nsummary('answer', 42, section: 'facts')\n",
        )]);
        let summary = &wk.projects[0].summary;
        assert_eq!(summary["facts"][0].0, "answer");
    }

    #[test]
    fn test_user_function_extended_surface() {
        let mut wk = workspace_with(&[("meson.build", "project('p')\n")]);
        wk.eval_root().unwrap();
        wk.lang_mode = LanguageMode::Extended;
        wk.eval_text(
            "func add(a int, b int = 10) -> int\nreturn a + b\nendfunc\nr1 = add(1, 2)\nr2 = add(5)\n",
            "snippet",
        )
        .unwrap();
        assert_eq!(wk.store.as_number(var(&wk, "r1")), Some(3));
        assert_eq!(wk.store.as_number(var(&wk, "r2")), Some(15));
    }

    #[test]
    fn test_user_function_return_type_enforced() {
        let mut wk = workspace_with(&[("meson.build", "project('p')\n")]);
        wk.eval_root().unwrap();
        wk.lang_mode = LanguageMode::Extended;
        let err = wk
            .eval_text("func f() -> int\nreturn 'nope'\nendfunc\nx = f()\n", "snippet")
            .unwrap_err();
        assert_eq!(err.kind, crate::diagnostics::ErrorKind::ReturnTypeMismatch);
    }

    #[test]
    fn test_user_function_last_expression_value() {
        let mut wk = workspace_with(&[("meson.build", "project('p')\n")]);
        wk.eval_root().unwrap();
        wk.lang_mode = LanguageMode::Extended;
        wk.eval_text("func two()\n2\nendfunc\nx = two()\n", "snippet").unwrap();
        assert_eq!(wk.store.as_number(var(&wk, "x")), Some(2));
    }

    #[test]
    fn test_get_option_builtin_default() {
        let wk = eval_ok(&[(
            "meson.build",
            "project('p')\nbt = get_option('buildtype')\n",
        )]);
        assert_eq!(wk.store.as_str(var(&wk, "bt")), Some("debug"));
    }
}
