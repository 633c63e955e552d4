//! External Collaborator Interfaces
//!
//! The evaluator reaches the outside world through these narrow traits:
//! toolchain probing, process execution and pkg-config queries. Their
//! bit-exact behavior is out of scope; the null implementations here answer
//! "nothing available" and back the test harness.

use std::collections::HashMap;

use crate::object::MachineKind;

/// Identity of a probed compiler.
#[derive(Debug, Clone)]
pub struct CompilerProbe {
    pub id: String,
    pub version: String,
    pub cmd: Vec<String>,
}

/// Captured output of a spawned process.
#[derive(Debug, Clone, Default)]
pub struct RunOutput {
    pub status: i64,
    pub stdout: String,
    pub stderr: String,
}

/// Result of a pkg-config query.
#[derive(Debug, Clone, Default)]
pub struct PkgInfo {
    pub version: String,
    pub cflags: Vec<String>,
    pub libs: Vec<String>,
    pub variables: HashMap<String, String>,
}

/// Compiler detection and compile/link checks.
pub trait Toolchain {
    /// Detect a compiler for `lang` targeting `machine`.
    fn probe(&mut self, lang: &str, machine: MachineKind) -> Option<CompilerProbe>;
    /// Locate a linkable library by name.
    fn find_library(&mut self, name: &str, machine: MachineKind) -> bool;
    /// Whether the given source compiles.
    fn compiles(&mut self, lang: &str, code: &str, machine: MachineKind) -> bool;
    /// sizeof a type expression, when determinable.
    fn sizeof(&mut self, lang: &str, type_name: &str, machine: MachineKind) -> Option<i64>;
    /// Whether a header is usable.
    fn has_header(&mut self, lang: &str, header: &str, machine: MachineKind) -> bool;
    /// Whether the compiler accepts an argument.
    fn has_argument(&mut self, lang: &str, arg: &str, machine: MachineKind) -> bool;
}

/// Process lookup and execution.
pub trait ProcessRunner {
    fn find_on_path(&self, name: &str) -> Option<String>;
    fn run(
        &mut self,
        argv: &[String],
        env: &[(String, String)],
        cwd: &str,
    ) -> Result<RunOutput, String>;
    /// Self-reported version of a tool, used by find_program version checks.
    fn version_of(&mut self, path: &str) -> Option<String>;
}

/// pkg-config queries.
pub trait PkgConfig {
    fn query(&mut self, name: &str, statik: bool, machine: MachineKind) -> Option<PkgInfo>;
}

// ---- null implementations ----

/// Reports a generic compiler for every language and fails every check.
#[derive(Debug, Default)]
pub struct NullToolchain;

impl Toolchain for NullToolchain {
    fn probe(&mut self, lang: &str, _machine: MachineKind) -> Option<CompilerProbe> {
        Some(CompilerProbe {
            id: "generic".to_string(),
            version: "0.0.0".to_string(),
            cmd: vec![format!("{}c", lang)],
        })
    }

    fn find_library(&mut self, _name: &str, _machine: MachineKind) -> bool {
        false
    }

    fn compiles(&mut self, _lang: &str, _code: &str, _machine: MachineKind) -> bool {
        false
    }

    fn sizeof(&mut self, _lang: &str, _type_name: &str, _machine: MachineKind) -> Option<i64> {
        None
    }

    fn has_header(&mut self, _lang: &str, _header: &str, _machine: MachineKind) -> bool {
        false
    }

    fn has_argument(&mut self, _lang: &str, _arg: &str, _machine: MachineKind) -> bool {
        false
    }
}

/// Finds nothing and refuses to run anything.
#[derive(Debug, Default)]
pub struct NullRunner;

impl ProcessRunner for NullRunner {
    fn find_on_path(&self, _name: &str) -> Option<String> {
        None
    }

    fn run(
        &mut self,
        argv: &[String],
        _env: &[(String, String)],
        _cwd: &str,
    ) -> Result<RunOutput, String> {
        Err(format!(
            "process execution is not available: {}",
            argv.first().map(|s| s.as_str()).unwrap_or("")
        ))
    }

    fn version_of(&mut self, _path: &str) -> Option<String> {
        None
    }
}

/// Answers every query with "not installed".
#[derive(Debug, Default)]
pub struct NullPkgConfig;

impl PkgConfig for NullPkgConfig {
    fn query(&mut self, _name: &str, _statik: bool, _machine: MachineKind) -> Option<PkgInfo> {
        None
    }
}
