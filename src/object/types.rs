//! Value Variants and Build-Graph Payloads
//!
//! The `Value` enum is the tagged storage behind every handle. Build-graph
//! payloads (targets, dependencies, install entries) are boxed to keep the
//! enum small; primitives are stored inline.

use std::rc::Rc;

use indexmap::IndexMap;

use crate::compiler::bytecode::FuncProto;
use crate::object::strings::StrId;
use crate::typecheck::TypeTag;

/// Opaque value handle. Cheap to copy, equality-comparable, stable for the
/// lifetime of a workspace. Handle 0 is the null/void sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Obj(pub u32);

impl Obj {
    pub const NULL: Obj = Obj(0);
    pub const TRUE: Obj = Obj(1);
    pub const FALSE: Obj = Obj(2);
    pub const DISABLER: Obj = Obj(3);

    pub fn is_null(self) -> bool {
        self == Self::NULL
    }

    pub fn is_disabler(self) -> bool {
        self == Self::DISABLER
    }
}

/// Dynamic type of a value. A handle's type never changes once assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjType {
    Null,
    Bool,
    Number,
    Str,
    File,
    FeatureOpt,
    Disabler,
    Array,
    Dict,
    BuildTarget,
    CustomTarget,
    AliasTarget,
    BothLibs,
    Dependency,
    ExternalProgram,
    IncludeDirectory,
    Generator,
    GeneratedList,
    InstallTarget,
    SourceSet,
    SourceConfiguration,
    Test,
    RunResult,
    Environment,
    ConfigurationData,
    Compiler,
    Machine,
    Subproject,
    Module,
    Func,
    Capture,
    TypeInfo,
    Meson,
    BuildOption,
    /// Internal: a kernel-function reference produced for call sites whose
    /// name is not bound to a variable.
    FuncRef,
}

impl ObjType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Null => "void",
            Self::Bool => "bool",
            Self::Number => "int",
            Self::Str => "string",
            Self::File => "file",
            Self::FeatureOpt => "feature",
            Self::Disabler => "disabler",
            Self::Array => "array",
            Self::Dict => "dict",
            Self::BuildTarget => "build_target",
            Self::CustomTarget => "custom_target",
            Self::AliasTarget => "alias_target",
            Self::BothLibs => "both_libs",
            Self::Dependency => "dependency",
            Self::ExternalProgram => "external_program",
            Self::IncludeDirectory => "include_directory",
            Self::Generator => "generator",
            Self::GeneratedList => "generated_list",
            Self::InstallTarget => "install_target",
            Self::SourceSet => "source_set",
            Self::SourceConfiguration => "source_configuration",
            Self::Test => "test",
            Self::RunResult => "run_result",
            Self::Environment => "environment",
            Self::ConfigurationData => "configuration_data",
            Self::Compiler => "compiler",
            Self::Machine => "machine",
            Self::Subproject => "subproject",
            Self::Module => "module",
            Self::Func => "func",
            Self::Capture => "capture",
            Self::TypeInfo => "typeinfo",
            Self::Meson => "meson",
            Self::BuildOption => "option",
            Self::FuncRef => "function",
        }
    }
}

/// Which system an artifact is built for. Relevant to cross compilation:
/// `Build` is the machine doing the compiling, `Host` is where artifacts run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MachineKind {
    Build,
    Host,
}

impl MachineKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Build => "build",
            Self::Host => "host",
        }
    }
}

/// Tri-state feature option value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureState {
    Auto,
    Enabled,
    Disabled,
}

impl FeatureState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Enabled => "enabled",
            Self::Disabled => "disabled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "auto" => Some(Self::Auto),
            "enabled" => Some(Self::Enabled),
            "disabled" => Some(Self::Disabled),
            _ => None,
        }
    }
}

/// Build target flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    Executable,
    StaticLibrary,
    SharedLibrary,
    SharedModule,
}

impl TargetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Executable => "executable",
            Self::StaticLibrary => "static library",
            Self::SharedLibrary => "shared library",
            Self::SharedModule => "shared module",
        }
    }
}

/// A compiled/linked target registered with a project.
#[derive(Debug, Clone, Default)]
pub struct BuildTarget {
    pub name: String,
    /// Final output filename, platform- and version-adjusted.
    pub build_name: String,
    /// Absolute path of the final output under the build root.
    pub output_path: String,
    /// Per-target directory for intermediate artifacts.
    pub private_dir: String,
    pub kind: Option<TargetKind>,
    pub machine: Option<MachineKind>,
    pub sources: Vec<Obj>,
    pub objects: Vec<Obj>,
    pub extra_files: Vec<Obj>,
    pub include_directories: Vec<Obj>,
    pub link_with: Vec<Obj>,
    pub link_whole: Vec<Obj>,
    pub link_args: Vec<String>,
    /// Compile args keyed by language.
    pub compile_args: IndexMap<String, Vec<String>>,
    pub dependencies: Vec<Obj>,
    pub order_deps: Vec<Obj>,
    pub rpaths: Vec<String>,
    pub version: Option<String>,
    pub soversion: Option<String>,
    pub soname: Option<String>,
    pub implib: Option<String>,
    pub pic: bool,
    pub pie: bool,
    pub gnu_symbol_visibility: Option<String>,
    pub install: bool,
    pub install_dir: Option<String>,
    pub build_by_default: bool,
    pub override_options: IndexMap<String, String>,
}

/// A user-command build node.
#[derive(Debug, Clone, Default)]
pub struct CustomTarget {
    pub name: String,
    pub inputs: Vec<Obj>,
    /// File objects under the build directory.
    pub outputs: Vec<Obj>,
    /// Fully substituted argv.
    pub command: Vec<String>,
    pub depfile: Option<String>,
    pub capture: bool,
    pub feed: bool,
    pub console: bool,
    pub build_by_default: bool,
    pub build_always_stale: bool,
    pub depends: Vec<Obj>,
    pub env: Option<Obj>,
    pub install: bool,
    pub install_dir: Option<String>,
    pub private_dir: String,
}

/// A phony grouping target.
#[derive(Debug, Clone)]
pub struct AliasTarget {
    pub name: String,
    pub depends: Vec<Obj>,
}

/// How a dependency was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepKind {
    Pkgconf,
    Declared,
    Threads,
    AppleFrameworks,
    ExternalLibrary,
    NotFound,
}

impl DepKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pkgconf => "pkgconfig",
            Self::Declared => "internal",
            Self::Threads => "threads",
            Self::AppleFrameworks => "appleframeworks",
            Self::ExternalLibrary => "library",
            Self::NotFound => "not-found",
        }
    }
}

/// How a dependency's include directories are exposed to consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncludeType {
    Preserve,
    System,
    NonSystem,
}

impl IncludeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Preserve => "preserve",
            Self::System => "system",
            Self::NonSystem => "non-system",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "preserve" => Some(Self::Preserve),
            "system" => Some(Self::System),
            "non-system" => Some(Self::NonSystem),
            _ => None,
        }
    }
}

/// A resolved (or not-found) dependency descriptor. The `found` flag and
/// kind are frozen at creation.
#[derive(Debug, Clone)]
pub struct Dependency {
    pub name: String,
    pub kind: DepKind,
    pub found: bool,
    pub version: Option<String>,
    pub machine: MachineKind,
    pub link_with: Vec<Obj>,
    pub link_whole: Vec<Obj>,
    pub link_args: Vec<String>,
    pub include_directories: Vec<Obj>,
    pub compile_args: Vec<String>,
    pub sources: Vec<Obj>,
    pub dependencies: Vec<Obj>,
    pub variables: IndexMap<String, String>,
    pub include_type: IncludeType,
}

impl Dependency {
    pub fn not_found(name: impl Into<String>, machine: MachineKind) -> Self {
        Self {
            name: name.into(),
            kind: DepKind::NotFound,
            found: false,
            version: None,
            machine,
            link_with: Vec::new(),
            link_whole: Vec::new(),
            link_args: Vec::new(),
            include_directories: Vec::new(),
            compile_args: Vec::new(),
            sources: Vec::new(),
            dependencies: Vec::new(),
            variables: IndexMap::new(),
            include_type: IncludeType::Preserve,
        }
    }

    pub fn found(name: impl Into<String>, kind: DepKind, machine: MachineKind) -> Self {
        let mut dep = Self::not_found(name, machine);
        dep.kind = kind;
        dep.found = true;
        dep
    }
}

/// An executable located outside the build graph.
#[derive(Debug, Clone)]
pub struct ExternalProgram {
    pub name: String,
    pub path: Option<String>,
    pub found: bool,
    pub version: Option<String>,
}

#[derive(Debug, Clone)]
pub struct IncludeDirectory {
    pub paths: Vec<String>,
    pub is_system: bool,
}

/// A rule template; `process()` instantiates it per input.
#[derive(Debug, Clone)]
pub struct Generator {
    pub exe: Obj,
    pub output: Vec<String>,
    pub arguments: Vec<String>,
    pub depfile: Option<String>,
    pub capture: bool,
    pub depends: Vec<Obj>,
}

/// The result of `generator.process()`: one custom target per input.
#[derive(Debug, Clone)]
pub struct GeneratedList {
    pub generator: Obj,
    pub targets: Vec<Obj>,
    pub outputs: Vec<Obj>,
}

/// Flavor of an install entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallFlavor {
    Data,
    Headers,
    Man,
    Subdir { exclude_files: Vec<String>, exclude_dirs: Vec<String> },
    Symlink { pointing_to: String },
    Emptydir,
    Target,
}

#[derive(Debug, Clone)]
pub struct InstallTarget {
    pub src: String,
    pub dest: String,
    pub mode: Vec<String>,
    pub tag: Option<String>,
    pub flavor: InstallFlavor,
}

/// A test or benchmark descriptor.
#[derive(Debug, Clone)]
pub struct TestDescriptor {
    pub name: String,
    pub exe: Obj,
    pub args: Vec<Obj>,
    pub env: Option<Obj>,
    pub workdir: Option<String>,
    pub should_fail: bool,
    pub suites: Vec<String>,
    pub priority: i64,
    pub timeout: i64,
    pub protocol: String,
    pub is_parallel: bool,
    pub verbose: bool,
    pub depends: Vec<Obj>,
    pub is_benchmark: bool,
}

#[derive(Debug, Clone)]
pub struct RunResult {
    pub returncode: i64,
    pub stdout: String,
    pub stderr: String,
    /// Set for compiler.run() results.
    pub compiled: Option<bool>,
}

/// How an environment entry was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvAction {
    Set,
    Append,
    Prepend,
}

#[derive(Debug, Clone, Default)]
pub struct EnvironmentData {
    /// name -> (action, values, separator)
    pub entries: IndexMap<String, (EnvAction, Vec<String>, String)>,
}

#[derive(Debug, Clone, Default)]
pub struct ConfigurationData {
    /// key -> (value, description)
    pub values: IndexMap<String, (Obj, Option<String>)>,
    /// Set once consumed by configure_file; mutation afterwards is an error.
    pub used: bool,
}

#[derive(Debug, Clone)]
pub struct CompilerObj {
    pub lang: String,
    pub id: String,
    pub version: String,
    pub cmd: Vec<String>,
    pub machine: MachineKind,
}

#[derive(Debug, Clone)]
pub struct SubprojectData {
    pub name: String,
    pub project_index: Option<usize>,
    pub found: bool,
}

#[derive(Debug, Clone)]
pub struct ModuleData {
    pub name: String,
    pub found: bool,
    /// User-exported captures take precedence over native methods.
    pub exports: IndexMap<String, Obj>,
}

/// A user-defined function value.
#[derive(Debug, Clone)]
pub struct FuncDef {
    pub proto: Rc<FuncProto>,
}

/// A closure: a function plus the scope chain captured at definition time.
#[derive(Debug, Clone)]
pub struct CaptureData {
    pub proto: Rc<FuncProto>,
    pub scopes: Vec<IndexMap<String, Obj>>,
}

/// Declared option types for the option-file surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionType {
    String,
    Boolean,
    Combo,
    Integer,
    Array,
    Feature,
}

impl OptionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Boolean => "boolean",
            Self::Combo => "combo",
            Self::Integer => "integer",
            Self::Array => "array",
            Self::Feature => "feature",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "string" => Some(Self::String),
            "boolean" => Some(Self::Boolean),
            "combo" => Some(Self::Combo),
            "integer" => Some(Self::Integer),
            "array" => Some(Self::Array),
            "feature" => Some(Self::Feature),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BuildOption {
    pub name: String,
    pub ty: OptionType,
    pub value: Obj,
    pub choices: Vec<String>,
    pub min: Option<i64>,
    pub max: Option<i64>,
    pub description: Option<String>,
    pub yielding: bool,
    pub deprecated: bool,
}

/// A source-set rule: sources/dependencies gated on conditions.
#[derive(Debug, Clone)]
pub struct SourceSetRule {
    pub when: Vec<Obj>,
    pub if_true: Vec<Obj>,
    pub if_false: Vec<Obj>,
}

#[derive(Debug, Clone, Default)]
pub struct SourceSetData {
    pub rules: Vec<SourceSetRule>,
    pub frozen: bool,
}

#[derive(Debug, Clone, Default)]
pub struct SourceConfigurationData {
    pub sources: Vec<Obj>,
    pub dependencies: Vec<Obj>,
}

/// Tagged storage behind every handle.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Number(i64),
    Str(StrId),
    /// Wraps an absolute path.
    File(StrId),
    FeatureOpt(FeatureState),
    Disabler,
    Array(Vec<Obj>),
    Dict(IndexMap<String, Obj>),
    BuildTarget(Box<BuildTarget>),
    CustomTarget(Box<CustomTarget>),
    AliasTarget(Box<AliasTarget>),
    BothLibs { static_lib: Obj, shared_lib: Obj },
    Dependency(Box<Dependency>),
    ExternalProgram(Box<ExternalProgram>),
    IncludeDirectory(Box<IncludeDirectory>),
    Generator(Box<Generator>),
    GeneratedList(Box<GeneratedList>),
    InstallTarget(Box<InstallTarget>),
    SourceSet(Box<SourceSetData>),
    SourceConfiguration(Box<SourceConfigurationData>),
    Test(Box<TestDescriptor>),
    RunResult(Box<RunResult>),
    Environment(Box<EnvironmentData>),
    ConfigurationData(Box<ConfigurationData>),
    Compiler(Box<CompilerObj>),
    Machine(MachineKind),
    Subproject(Box<SubprojectData>),
    Module(Box<ModuleData>),
    Func(Box<FuncDef>),
    Capture(Box<CaptureData>),
    TypeInfo(TypeTag),
    Meson,
    BuildOption(Box<BuildOption>),
    FuncRef(StrId),
}

impl Value {
    pub fn obj_type(&self) -> ObjType {
        match self {
            Value::Null => ObjType::Null,
            Value::Bool(_) => ObjType::Bool,
            Value::Number(_) => ObjType::Number,
            Value::Str(_) => ObjType::Str,
            Value::File(_) => ObjType::File,
            Value::FeatureOpt(_) => ObjType::FeatureOpt,
            Value::Disabler => ObjType::Disabler,
            Value::Array(_) => ObjType::Array,
            Value::Dict(_) => ObjType::Dict,
            Value::BuildTarget(_) => ObjType::BuildTarget,
            Value::CustomTarget(_) => ObjType::CustomTarget,
            Value::AliasTarget(_) => ObjType::AliasTarget,
            Value::BothLibs { .. } => ObjType::BothLibs,
            Value::Dependency(_) => ObjType::Dependency,
            Value::ExternalProgram(_) => ObjType::ExternalProgram,
            Value::IncludeDirectory(_) => ObjType::IncludeDirectory,
            Value::Generator(_) => ObjType::Generator,
            Value::GeneratedList(_) => ObjType::GeneratedList,
            Value::InstallTarget(_) => ObjType::InstallTarget,
            Value::SourceSet(_) => ObjType::SourceSet,
            Value::SourceConfiguration(_) => ObjType::SourceConfiguration,
            Value::Test(_) => ObjType::Test,
            Value::RunResult(_) => ObjType::RunResult,
            Value::Environment(_) => ObjType::Environment,
            Value::ConfigurationData(_) => ObjType::ConfigurationData,
            Value::Compiler(_) => ObjType::Compiler,
            Value::Machine(_) => ObjType::Machine,
            Value::Subproject(_) => ObjType::Subproject,
            Value::Module(_) => ObjType::Module,
            Value::Func(_) => ObjType::Func,
            Value::Capture(_) => ObjType::Capture,
            Value::TypeInfo(_) => ObjType::TypeInfo,
            Value::Meson => ObjType::Meson,
            Value::BuildOption(_) => ObjType::BuildOption,
            Value::FuncRef(_) => ObjType::FuncRef,
        }
    }
}
