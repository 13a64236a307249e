//! Accumulation of debuggable build artifacts from a build tool run.

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{BridgeError, Result};
use crate::invocation::BuildInvocation;
use crate::message::{parse_build_line, ArtifactRecord, BuildMessage, ParsedLine};
use crate::runner::{self, BuildTool};
use crate::sink::OutputSink;

/// Target kind of executables.
pub const KIND_BIN: &str = "bin";

/// Target kind of build scripts, which are binaries but never debug targets.
pub const KIND_CUSTOM_BUILD: &str = "custom-build";

/// One file produced by one build step.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CompilationArtifact {
    pub file_path: String,
    pub target_name: String,
    pub target_kind: String,
}

impl CompilationArtifact {
    pub fn new(
        file_path: impl Into<String>,
        target_name: impl Into<String>,
        target_kind: impl Into<String>,
    ) -> Self {
        Self {
            file_path: file_path.into(),
            target_name: target_name.into(),
            target_kind: target_kind.into(),
        }
    }
}

impl std::fmt::Display for CompilationArtifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} (name: {}, kind: {})",
            self.file_path, self.target_name, self.target_kind
        )
    }
}

/// Executables other than build scripts, plus anything from a test profile.
pub fn is_debuggable(record: &ArtifactRecord) -> bool {
    (record.has_kind(KIND_BIN) && !record.has_kind(KIND_CUSTOM_BUILD)) || record.test_profile
}

/// Folds stdout lines into a list of candidate artifacts.
pub struct ArtifactCollector<'a> {
    sink: &'a dyn OutputSink,
    artifacts: Vec<CompilationArtifact>,
}

impl<'a> ArtifactCollector<'a> {
    pub fn new(sink: &'a dyn OutputSink) -> Self {
        Self {
            sink,
            artifacts: Vec::new(),
        }
    }

    pub fn handle_line(&mut self, line: &str) {
        match parse_build_line(line) {
            ParsedLine::Structured(BuildMessage::Artifact(record)) => {
                if is_debuggable(&record) {
                    debug!(target_name = %record.target_name, outputs = record.outputs.len(), "Collected artifact");
                    self.artifacts.extend(record.outputs);
                }
            }
            ParsedLine::Structured(BuildMessage::Diagnostic(text)) => self.sink.diagnostic(&text),
            ParsedLine::Structured(BuildMessage::Other) | ParsedLine::Malformed => {}
            ParsedLine::Text(text) => self.sink.diagnostic(&text),
        }
    }

    pub fn artifacts(&self) -> &[CompilationArtifact] {
        &self.artifacts
    }

    pub fn into_artifacts(self) -> Vec<CompilationArtifact> {
        self.artifacts
    }
}

/// Run the build and return every debuggable artifact it reported, in
/// emission order. An empty list is not an error here.
pub async fn collect(
    tool: &dyn BuildTool,
    invocation: &BuildInvocation,
    sink: &dyn OutputSink,
    cancel: CancellationToken,
) -> Result<Vec<CompilationArtifact>> {
    let mut collector = ArtifactCollector::new(sink);
    let exit = runner::run(
        tool,
        invocation,
        cancel,
        |line| collector.handle_line(&line),
        |chunk| sink.stderr(chunk),
    )
    .await
    .map_err(BridgeError::BuildInvocation)?;

    exit.check()
        .map_err(|e| BridgeError::BuildInvocation(e.into()))?;

    Ok(collector.into_artifacts())
}
