//! dbgbuild - build-tool orchestration for debugger launches
//!
//! Provides the engine behind "build, then debug" launch configurations:
//! - Runs cargo with JSON progress messages and streams its output live
//! - Collects debuggable artifacts and resolves exactly one program
//! - Synthesizes launch configurations from `cargo metadata`

pub mod artifact;
pub mod engine;
pub mod error;
pub mod fakes;
pub mod invocation;
pub mod launch;
pub mod message;
pub mod metadata;
pub mod resolver;
pub mod runner;
pub mod sink;
pub mod telemetry;

// Re-export key types
pub use artifact::{ArtifactCollector, CompilationArtifact};
pub use engine::{enumerate_launch_configs, resolve_program};
pub use error::{BridgeError, InvocationError, ProcessError, Result, SpawnError};
pub use invocation::{BuildConfig, BuildInvocation, ColorMode, ToolConfig};
pub use launch::{launch_document, synthesize, LaunchConfigDescriptor};
pub use metadata::{MetadataOutcome, ProjectMetadata};
pub use resolver::ArtifactFilter;
pub use runner::{BuildTool, ProcessEvent, ProcessEvents, ProcessExit, ProcessRunner};
pub use sink::{OutputSink, RecordingSink, TracingSink};
pub use telemetry::init_tracing;

pub use tokio_util::sync::CancellationToken;
