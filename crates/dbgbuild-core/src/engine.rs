//! The two top-level operations: resolve a program from a build
//! configuration, and enumerate launch configurations for a project.

use std::path::Path;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::artifact;
use crate::error::Result;
use crate::invocation::{BuildInvocation, ColorMode};
use crate::launch::{self, LaunchConfigDescriptor};
use crate::metadata::{self, MetadataOutcome};
use crate::resolver::{self, ArtifactFilter};
use crate::runner::BuildTool;
use crate::sink::OutputSink;

/// Build with `invocation` and return the path of the single artifact
/// matching `filter`.
pub async fn resolve_program(
    tool: &dyn BuildTool,
    invocation: &BuildInvocation,
    color: ColorMode,
    filter: Option<&ArtifactFilter>,
    sink: &dyn OutputSink,
    cancel: CancellationToken,
) -> Result<String> {
    let invocation = invocation.with_json_messages(color);
    let artifacts = artifact::collect(tool, &invocation, sink, cancel).await?;
    info!(count = artifacts.len(), "Build finished");
    resolver::resolve(&artifacts, filter, sink)
}

/// Inspect the project in `dir_override` (or the tool's project root) and
/// return the debug launch menu for it.
pub async fn enumerate_launch_configs(
    tool: &dyn BuildTool,
    dir_override: Option<&Path>,
    sink: &dyn OutputSink,
    cancel: CancellationToken,
) -> Result<Vec<LaunchConfigDescriptor>> {
    let outcome = metadata::fetch(tool, dir_override, sink, cancel).await?;
    if let MetadataOutcome::NoProject { code } = &outcome {
        sink.note(&format!(
            "Could not read project metadata (exit code {code:?}), offering the default configuration"
        ));
    }
    let metadata = outcome.into_metadata();
    let descriptors = launch::synthesize(metadata.as_ref(), dir_override);
    info!(count = descriptors.len(), "Synthesized launch configurations");
    Ok(descriptors)
}
