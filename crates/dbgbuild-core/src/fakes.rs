//! In-memory fakes for the build tool seam (testing only)
//!
//! `ScriptedTool` replays a fixed list of process events instead of
//! spawning anything, and records the invocations it was asked to run.

use std::sync::Mutex;

use tokio_util::sync::CancellationToken;

use crate::error::SpawnError;
use crate::invocation::BuildInvocation;
use crate::runner::{BuildTool, ProcessEvent, ProcessEvents};

#[derive(Debug, Clone)]
enum Script {
    Events(Vec<ProcessEvent>),
    NotFound,
    SpawnFails(String),
}

/// A [`BuildTool`] that plays back canned output.
#[derive(Debug)]
pub struct ScriptedTool {
    script: Script,
    invocations: Mutex<Vec<BuildInvocation>>,
}

impl ScriptedTool {
    fn with_script(script: Script) -> Self {
        Self {
            script,
            invocations: Mutex::new(Vec::new()),
        }
    }

    /// Emits `lines` on stdout, then exits with `code`.
    pub fn with_stdout<I, S>(lines: I, code: i32) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut events: Vec<ProcessEvent> = lines
            .into_iter()
            .map(|l| ProcessEvent::StdoutLine(l.into()))
            .collect();
        events.push(ProcessEvent::Exited(Some(code)));
        Self::with_events(events)
    }

    /// Replays `events` verbatim; include an `Exited` event to finish cleanly.
    pub fn with_events(events: Vec<ProcessEvent>) -> Self {
        Self::with_script(Script::Events(events))
    }

    /// Fails to spawn as if the executable were missing.
    pub fn not_found() -> Self {
        Self::with_script(Script::NotFound)
    }

    /// Fails to spawn for a reason other than a missing executable.
    pub fn spawn_fails(reason: impl Into<String>) -> Self {
        Self::with_script(Script::SpawnFails(reason.into()))
    }

    pub fn invocations(&self) -> Vec<BuildInvocation> {
        self.invocations
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl BuildTool for ScriptedTool {
    fn program(&self) -> String {
        "scripted-cargo".to_string()
    }

    fn spawn(
        &self,
        invocation: &BuildInvocation,
        _cancel: CancellationToken,
    ) -> Result<ProcessEvents, SpawnError> {
        self.invocations
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(invocation.clone());

        match &self.script {
            Script::NotFound => Err(SpawnError::NotFound {
                program: self.program(),
            }),
            Script::SpawnFails(reason) => Err(SpawnError::Io {
                program: self.program(),
                source: std::io::Error::other(reason.clone()),
            }),
            Script::Events(events) => {
                let (tx, rx) = ProcessEvents::channel();
                let events = events.clone();
                tokio::spawn(async move {
                    for event in events {
                        if tx.send(event).await.is_err() {
                            break;
                        }
                    }
                });
                Ok(rx)
            }
        }
    }
}
