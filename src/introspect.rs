//! Introspection Surface
//!
//! Serde models of everything evaluation leaves behind: projects, targets,
//! tests, options and install entries. The CLI serializes this to JSON;
//! the backend collaborator consumes the same shape.

use serde::Serialize;

use crate::object::{Obj, Value};
use crate::workspace::Workspace;

#[derive(Debug, Serialize)]
pub struct ProjectInfo {
    pub id: usize,
    pub name: String,
    pub version: String,
    pub license: Vec<String>,
    pub subproject: Option<String>,
    pub source_dir: String,
    pub build_dir: String,
}

#[derive(Debug, Serialize)]
pub struct TargetInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub target_type: String,
    pub machine: Option<String>,
    pub output: Option<String>,
    pub private_dir: Option<String>,
    pub sources: Vec<String>,
    pub objects: Vec<String>,
    pub link_args: Vec<String>,
    pub installed: bool,
    pub build_by_default: bool,
}

#[derive(Debug, Serialize)]
pub struct TestInfo {
    pub name: String,
    pub is_benchmark: bool,
    pub suites: Vec<String>,
    pub timeout: i64,
    pub protocol: String,
    pub should_fail: bool,
}

#[derive(Debug, Serialize)]
pub struct OptionInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub option_type: String,
    pub value: String,
    pub choices: Vec<String>,
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct InstallInfo {
    pub src: String,
    pub dest: String,
    pub tag: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct Introspection {
    pub projects: Vec<ProjectInfo>,
    pub targets: Vec<TargetInfo>,
    pub tests: Vec<TestInfo>,
    pub options: Vec<OptionInfo>,
    pub install: Vec<InstallInfo>,
}

fn paths_of(wk: &Workspace, objs: &[Obj]) -> Vec<String> {
    objs.iter()
        .filter_map(|&o| wk.store.path_like(o).map(|s| s.to_string()))
        .collect()
}

fn target_info(wk: &Workspace, obj: Obj) -> Option<TargetInfo> {
    match wk.store.get(obj) {
        Value::BuildTarget(bt) => Some(TargetInfo {
            name: bt.name.clone(),
            target_type: bt.kind.map(|k| k.as_str()).unwrap_or("build target").to_string(),
            machine: bt.machine.map(|m| m.as_str().to_string()),
            output: Some(bt.output_path.clone()),
            private_dir: Some(bt.private_dir.clone()),
            sources: paths_of(wk, &bt.sources),
            objects: paths_of(wk, &bt.objects),
            link_args: bt.link_args.clone(),
            installed: bt.install,
            build_by_default: bt.build_by_default,
        }),
        Value::CustomTarget(ct) => Some(TargetInfo {
            name: ct.name.clone(),
            target_type: "custom".to_string(),
            machine: None,
            output: ct
                .outputs
                .first()
                .and_then(|&o| wk.store.path_like(o).map(|s| s.to_string())),
            private_dir: Some(ct.private_dir.clone()),
            sources: paths_of(wk, &ct.inputs),
            objects: Vec::new(),
            link_args: Vec::new(),
            installed: ct.install,
            build_by_default: ct.build_by_default,
        }),
        Value::AliasTarget(at) => Some(TargetInfo {
            name: at.name.clone(),
            target_type: "alias".to_string(),
            machine: None,
            output: None,
            private_dir: None,
            sources: Vec::new(),
            objects: Vec::new(),
            link_args: Vec::new(),
            installed: false,
            build_by_default: false,
        }),
        _ => None,
    }
}

/// Assemble the post-evaluation snapshot.
pub fn collect(wk: &Workspace) -> Introspection {
    let mut projects = Vec::new();
    let mut targets = Vec::new();
    let mut tests = Vec::new();
    let mut options = Vec::new();
    let mut install = Vec::new();

    for (id, project) in wk.projects.iter().enumerate() {
        projects.push(ProjectInfo {
            id,
            name: project.name.clone(),
            version: project.version.clone().unwrap_or_else(|| "undefined".to_string()),
            license: project.license.clone(),
            subproject: project.subproject_name.clone(),
            source_dir: wk.src_path(&project.root_dir),
            build_dir: wk.build_path(&project.root_dir),
        });
        for &target in &project.targets {
            if let Some(info) = target_info(wk, target) {
                targets.push(info);
            }
        }
        for &test in &project.tests {
            if let Value::Test(t) = wk.store.get(test) {
                tests.push(TestInfo {
                    name: t.name.clone(),
                    is_benchmark: t.is_benchmark,
                    suites: t.suites.clone(),
                    timeout: t.timeout,
                    protocol: t.protocol.clone(),
                    should_fail: t.should_fail,
                });
            }
        }
        for (name, &opt) in &project.options {
            if let Value::BuildOption(o) = wk.store.get(opt) {
                options.push(OptionInfo {
                    name: match &project.subproject_name {
                        Some(sub) => format!("{}:{}", sub, name),
                        None => name.clone(),
                    },
                    option_type: o.ty.as_str().to_string(),
                    value: wk.store.render_plain(o.value),
                    choices: o.choices.clone(),
                    description: o.description.clone(),
                });
            }
        }
        for &entry in &project.install_targets {
            if let Value::InstallTarget(it) = wk.store.get(entry) {
                install.push(InstallInfo {
                    src: it.src.clone(),
                    dest: it.dest.clone(),
                    tag: it.tag.clone(),
                });
            }
        }
    }

    Introspection { projects, targets, tests, options, install }
}
