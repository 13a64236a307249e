//! Classification of build tool stdout lines.
//!
//! Lines that look like JSON objects are parsed into typed messages keyed by
//! their `reason` field. Both artifact schemas (a single `executable` field,
//! or the older `filenames` list aligned with `target.kind`) are reconciled
//! here into [`CompilationArtifact`] values.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use tracing::warn;

use crate::artifact::CompilationArtifact;

/// Suffix of macOS debug-symbol bundles listed next to real outputs.
pub const DSYM_SUFFIX: &str = ".dSYM";

/// Result of looking at one stdout line.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedLine<T> {
    Structured(T),
    /// Not JSON-looking; forwarded as plain text.
    Text(String),
    /// JSON-looking but unparseable; already logged.
    Malformed,
}

/// Parse `line` as a `T` if it looks like a JSON object.
pub fn classify<T: DeserializeOwned>(line: &str) -> ParsedLine<T> {
    if !line.starts_with('{') {
        return ParsedLine::Text(line.to_string());
    }
    match serde_json::from_str::<T>(line) {
        Ok(value) => ParsedLine::Structured(value),
        Err(err) => {
            warn!(error = %err, line = %line, "Discarding malformed structured message");
            ParsedLine::Malformed
        }
    }
}

/// A build progress message in canonical form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildMessage {
    Artifact(ArtifactRecord),
    /// Pre-rendered compiler diagnostic text.
    Diagnostic(String),
    /// Any other `reason`.
    Other,
}

/// A `compiler-artifact` message with its outputs already paired to kinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactRecord {
    pub target_name: String,
    pub target_kinds: Vec<String>,
    pub test_profile: bool,
    pub outputs: Vec<CompilationArtifact>,
}

impl ArtifactRecord {
    pub fn has_kind(&self, kind: &str) -> bool {
        self.target_kinds.iter().any(|k| k == kind)
    }
}

pub fn parse_build_line(line: &str) -> ParsedLine<BuildMessage> {
    match classify::<WireMessage>(line) {
        ParsedLine::Structured(wire) => ParsedLine::Structured(wire.into()),
        ParsedLine::Text(text) => ParsedLine::Text(text),
        ParsedLine::Malformed => ParsedLine::Malformed,
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "reason", rename_all = "kebab-case")]
enum WireMessage {
    CompilerArtifact(WireArtifact),
    CompilerMessage(WireDiagnostic),
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct WireArtifact {
    target: WireTarget,
    #[serde(default)]
    profile: WireProfile,
    /// Outer `None`: field absent (old schema). `Some(None)`: explicit null.
    #[serde(default, deserialize_with = "present")]
    executable: Option<Option<String>>,
    #[serde(default)]
    filenames: Vec<Option<String>>,
}

#[derive(Debug, Deserialize)]
struct WireTarget {
    name: String,
    #[serde(default)]
    kind: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct WireProfile {
    #[serde(default)]
    test: bool,
}

#[derive(Debug, Deserialize)]
struct WireDiagnostic {
    message: WireRendered,
}

#[derive(Debug, Deserialize)]
struct WireRendered {
    #[serde(default)]
    rendered: Option<String>,
}

fn present<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

impl From<WireMessage> for BuildMessage {
    fn from(wire: WireMessage) -> Self {
        match wire {
            WireMessage::CompilerArtifact(artifact) => BuildMessage::Artifact(artifact.into()),
            WireMessage::CompilerMessage(diag) => {
                BuildMessage::Diagnostic(diag.message.rendered.unwrap_or_default())
            }
            WireMessage::Other => BuildMessage::Other,
        }
    }
}

impl From<WireArtifact> for ArtifactRecord {
    fn from(wire: WireArtifact) -> Self {
        let WireArtifact {
            target,
            profile,
            executable,
            filenames,
        } = wire;
        let first_kind = target.kind.first().cloned().unwrap_or_default();

        let outputs = match executable {
            Some(executable) => executable
                .into_iter()
                .map(|path| CompilationArtifact::new(path, &target.name, &first_kind))
                .collect(),
            None => filenames
                .into_iter()
                .enumerate()
                .filter_map(|(i, file)| {
                    let file = file?;
                    if file.ends_with(DSYM_SUFFIX) {
                        return None;
                    }
                    let kind = target.kind.get(i).unwrap_or(&first_kind);
                    Some(CompilationArtifact::new(file, &target.name, kind))
                })
                .collect(),
        };

        ArtifactRecord {
            target_name: target.name,
            target_kinds: target.kind,
            test_profile: profile.test,
            outputs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artifact(line: &str) -> ArtifactRecord {
        match parse_build_line(line) {
            ParsedLine::Structured(BuildMessage::Artifact(record)) => record,
            other => panic!("expected artifact, got {other:?}"),
        }
    }

    #[test]
    fn test_plain_text_is_forwarded() {
        assert_eq!(
            parse_build_line("   Compiling demo v0.1.0"),
            ParsedLine::Text("   Compiling demo v0.1.0".to_string())
        );
    }

    #[test]
    fn test_malformed_json_is_discarded() {
        assert_eq!(parse_build_line("{not json"), ParsedLine::Malformed);
        // Artifact without a target is malformed too.
        assert_eq!(
            parse_build_line(r#"{"reason":"compiler-artifact"}"#),
            ParsedLine::Malformed
        );
    }

    #[test]
    fn test_unknown_reason_is_other() {
        assert_eq!(
            parse_build_line(r#"{"reason":"build-finished","success":true}"#),
            ParsedLine::Structured(BuildMessage::Other)
        );
    }

    #[test]
    fn test_compiler_message_rendered_text() {
        let line = r#"{"reason":"compiler-message","message":{"rendered":"warning: unused variable\n","level":"warning"}}"#;
        assert_eq!(
            parse_build_line(line),
            ParsedLine::Structured(BuildMessage::Diagnostic(
                "warning: unused variable\n".to_string()
            ))
        );
    }

    #[test]
    fn test_new_schema_executable() {
        let record = artifact(
            r#"{"reason":"compiler-artifact","executable":"/p/target/debug/foo","target":{"name":"foo","kind":["bin"]},"profile":{"test":false}}"#,
        );
        assert_eq!(
            record.outputs,
            vec![CompilationArtifact::new("/p/target/debug/foo", "foo", "bin")]
        );
        assert!(!record.test_profile);
        assert!(record.has_kind("bin"));
    }

    #[test]
    fn test_new_schema_null_executable_yields_nothing() {
        let record = artifact(
            r#"{"reason":"compiler-artifact","executable":null,"filenames":["/p/target/debug/libfoo.rlib"],"target":{"name":"foo","kind":["lib"]},"profile":{"test":false}}"#,
        );
        assert!(record.outputs.is_empty());
    }

    #[test]
    fn test_old_schema_pairs_files_with_kinds() {
        let record = artifact(
            r#"{"reason":"compiler-artifact","filenames":["/p/target/debug/libfoo.a","/p/target/debug/libfoo.so"],"target":{"name":"foo","kind":["staticlib","cdylib"]},"profile":{"test":true}}"#,
        );
        assert_eq!(
            record.outputs,
            vec![
                CompilationArtifact::new("/p/target/debug/libfoo.a", "foo", "staticlib"),
                CompilationArtifact::new("/p/target/debug/libfoo.so", "foo", "cdylib"),
            ]
        );
        assert!(record.test_profile);
    }

    #[test]
    fn test_old_schema_skips_dsym_and_null() {
        let record = artifact(
            r#"{"reason":"compiler-artifact","filenames":["/p/target/debug/foo.dSYM",null,"/p/target/debug/foo"],"target":{"name":"foo","kind":["bin","bin","bin"]},"profile":{"test":false}}"#,
        );
        assert_eq!(
            record.outputs,
            vec![CompilationArtifact::new("/p/target/debug/foo", "foo", "bin")]
        );
    }

    #[test]
    fn test_both_schemas_agree() {
        let new = artifact(
            r#"{"reason":"compiler-artifact","executable":"/p/target/debug/foo","filenames":["/p/target/debug/foo"],"target":{"name":"foo","kind":["bin"]},"profile":{"test":false}}"#,
        );
        let old = artifact(
            r#"{"reason":"compiler-artifact","filenames":["/p/target/debug/foo"],"target":{"name":"foo","kind":["bin"]},"profile":{"test":false}}"#,
        );
        assert_eq!(new.outputs, old.outputs);
    }

    #[test]
    fn test_missing_profile_defaults_to_non_test() {
        let record = artifact(
            r#"{"reason":"compiler-artifact","executable":"/x","target":{"name":"x","kind":["bin"]}}"#,
        );
        assert!(!record.test_profile);
    }
}
