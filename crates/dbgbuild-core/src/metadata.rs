//! Project metadata retrieval.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::{BridgeError, InvocationError, Result};
use crate::invocation::BuildInvocation;
use crate::message::{classify, ParsedLine};
use crate::runner::{self, BuildTool};
use crate::sink::OutputSink;

/// Metadata request without dependency resolution, in the stable schema.
pub const METADATA_ARGS: [&str; 3] = ["metadata", "--no-deps", "--format-version=1"];

/// The subset of the metadata document launch synthesis needs.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProjectMetadata {
    pub packages: Vec<Package>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Package {
    pub name: String,
    #[serde(default)]
    pub targets: Vec<Target>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Target {
    pub name: String,
    #[serde(default)]
    pub kind: Vec<String>,
}

/// What a metadata request turned up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataOutcome {
    Found(ProjectMetadata),
    /// The build tool executable could not be located.
    ToolNotFound,
    /// The tool ran but failed, typically because there is no manifest.
    NoProject { code: Option<i32> },
}

impl MetadataOutcome {
    pub fn into_metadata(self) -> Option<ProjectMetadata> {
        match self {
            MetadataOutcome::Found(metadata) => Some(metadata),
            _ => None,
        }
    }
}

pub fn metadata_invocation(cwd: Option<&Path>) -> BuildInvocation {
    let invocation = BuildInvocation::new(METADATA_ARGS);
    match cwd {
        Some(dir) => invocation.with_cwd(dir),
        None => invocation,
    }
}

/// Ask the build tool for project metadata.
///
/// The last JSON object printed on stdout is taken as the document.
pub async fn fetch(
    tool: &dyn BuildTool,
    cwd: Option<&Path>,
    sink: &dyn OutputSink,
    cancel: CancellationToken,
) -> Result<MetadataOutcome> {
    let invocation = metadata_invocation(cwd);
    let mut payload = None;

    let exit = runner::run(
        tool,
        &invocation,
        cancel,
        |line| match classify::<ProjectMetadata>(&line) {
            ParsedLine::Structured(metadata) => payload = Some(metadata),
            ParsedLine::Text(text) => sink.diagnostic(&text),
            ParsedLine::Malformed => {}
        },
        |chunk| sink.stderr(chunk),
    )
    .await;

    let exit = match exit {
        Ok(exit) => exit,
        Err(InvocationError::Spawn(err)) if err.is_not_found() => {
            warn!(program = %tool.program(), "Build tool not found, using default launch configuration");
            return Ok(MetadataOutcome::ToolNotFound);
        }
        Err(err) => return Err(BridgeError::MetadataInvocation(err)),
    };

    if !exit.success() {
        info!(code = ?exit.code, "Metadata request failed, assuming no project");
        return Ok(MetadataOutcome::NoProject { code: exit.code });
    }

    payload
        .map(MetadataOutcome::Found)
        .ok_or(BridgeError::Metadata)
}
