//! Launch configuration synthesis from project metadata.
//!
//! Every package target yields zero or more descriptors depending on its
//! kinds:
//!
//! - library kinds: one "unit tests in library" entry per target, first seen wins
//! - `bin`, `example`: the target itself and its unit tests
//! - `bench`, `test`: the test-harness build
//!
//! Without metadata a single placeholder configuration is returned.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::metadata::{Package, ProjectMetadata, Target};
use crate::resolver::ArtifactFilter;

/// Placeholder the host expands to the project root.
pub const WORKSPACE_FOLDER: &str = "${workspaceFolder}";

/// Program path of the default descriptor, to be edited by the user.
pub const DEFAULT_PROGRAM: &str = "${workspaceFolder}/<executable file>";

/// Kinds that all describe the same library target.
pub const LIBRARY_KINDS: [&str; 5] = ["lib", "rlib", "staticlib", "dylib", "cstaticlib"];

/// A build-then-debug recipe for one target.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LaunchConfigDescriptor {
    pub name: String,

    /// Arguments for the build tool; empty for the placeholder.
    pub build_args: Vec<String>,

    pub artifact_filter: ArtifactFilter,

    pub working_directory: String,

    /// Set only on the placeholder, which has nothing to build.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub program: Option<String>,
}

impl LaunchConfigDescriptor {
    fn build(
        name: String,
        build_args: Vec<String>,
        artifact_filter: ArtifactFilter,
        working_directory: &str,
    ) -> Self {
        Self {
            name,
            build_args,
            artifact_filter,
            working_directory: working_directory.to_string(),
            program: None,
        }
    }

    /// The placeholder offered when no project could be inspected.
    pub fn placeholder(dir_override: Option<&Path>) -> Self {
        Self {
            name: "Debug".to_string(),
            build_args: Vec::new(),
            artifact_filter: ArtifactFilter::default(),
            working_directory: working_directory(dir_override),
            program: Some(DEFAULT_PROGRAM.to_string()),
        }
    }

    /// Render as an lldb entry of a `launch.json` `configurations` array.
    pub fn to_launch_json(&self) -> Value {
        let mut config = json!({
            "type": "lldb",
            "request": "launch",
            "name": self.name,
        });
        if let Some(program) = &self.program {
            config["program"] = json!(program);
        } else {
            config["cargo"] = json!({
                "args": self.build_args,
                "filter": self.artifact_filter,
            });
        }
        config["args"] = json!([]);
        config["cwd"] = json!(self.working_directory);
        config
    }
}

/// A whole `launch.json` document.
pub fn launch_document(descriptors: &[LaunchConfigDescriptor]) -> Value {
    json!({
        "version": "0.2.0",
        "configurations": descriptors.iter().map(|d| d.to_launch_json()).collect::<Vec<_>>(),
    })
}

/// Build the descriptor list for `metadata`, or the placeholder when absent.
pub fn synthesize(
    metadata: Option<&ProjectMetadata>,
    dir_override: Option<&Path>,
) -> Vec<LaunchConfigDescriptor> {
    let Some(metadata) = metadata else {
        return vec![LaunchConfigDescriptor::placeholder(dir_override)];
    };

    let cwd = working_directory(dir_override);
    let mut out = Vec::new();
    for package in &metadata.packages {
        for target in &package.targets {
            synthesize_target(package, target, &cwd, &mut out);
        }
    }
    out
}

fn synthesize_target(
    package: &Package,
    target: &Target,
    cwd: &str,
    out: &mut Vec<LaunchConfigDescriptor>,
) {
    let package_arg = format!("--package={}", package.name);
    let mut library_seen = false;

    for kind in &target.kind {
        let kind = kind.as_str();
        let filter = ArtifactFilter::new(Some(target.name.clone()), Some(kind.to_string()));
        let target_arg = format!("--{}={}", kind, target.name);

        match kind {
            k if LIBRARY_KINDS.contains(&k) => {
                if library_seen {
                    continue;
                }
                library_seen = true;
                out.push(LaunchConfigDescriptor::build(
                    format!("Debug unit tests in library '{}'", target.name),
                    args(&["test", "--no-run", "--lib", &package_arg]),
                    ArtifactFilter::new(Some(target.name.clone()), Some("lib".to_string())),
                    cwd,
                ));
            }
            "bin" | "example" => {
                let label = pretty_kind(kind);
                out.push(LaunchConfigDescriptor::build(
                    format!("Debug {} '{}'", label, target.name),
                    args(&["build", &target_arg, &package_arg]),
                    filter.clone(),
                    cwd,
                ));
                out.push(LaunchConfigDescriptor::build(
                    format!("Debug unit tests in {} '{}'", label, target.name),
                    args(&["test", "--no-run", &target_arg, &package_arg]),
                    filter,
                    cwd,
                ));
            }
            "bench" | "test" => {
                out.push(LaunchConfigDescriptor::build(
                    format!("Debug {} '{}'", pretty_kind(kind), target.name),
                    args(&["test", "--no-run", &target_arg, &package_arg]),
                    filter,
                    cwd,
                ));
            }
            _ => {}
        }
    }
}

fn pretty_kind(kind: &str) -> &str {
    match kind {
        "bin" => "executable",
        "bench" => "benchmark",
        "test" => "integration test",
        other => other,
    }
}

fn working_directory(dir_override: Option<&Path>) -> String {
    dir_override
        .map(|d| d.display().to_string())
        .unwrap_or_else(|| WORKSPACE_FOLDER.to_string())
}

fn args(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}
