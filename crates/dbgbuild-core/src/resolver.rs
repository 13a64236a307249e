//! Narrowing collected artifacts down to the single program to debug.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::artifact::CompilationArtifact;
use crate::error::{BridgeError, Result};
use crate::sink::OutputSink;

/// Optional name/kind constraint. Unset fields match anything.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArtifactFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

impl ArtifactFilter {
    pub fn new(name: Option<String>, kind: Option<String>) -> Self {
        Self { name, kind }
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            kind: None,
        }
    }

    pub fn matches(&self, artifact: &CompilationArtifact) -> bool {
        self.name.as_ref().map_or(true, |n| *n == artifact.target_name)
            && self.kind.as_ref().map_or(true, |k| *k == artifact.target_kind)
    }
}

impl std::fmt::Display for ArtifactFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{{ name: {}, kind: {} }}",
            self.name.as_deref().unwrap_or("*"),
            self.kind.as_deref().unwrap_or("*")
        )
    }
}

/// The artifacts surviving `filter`, in their original order.
pub fn filter_artifacts<'a>(
    artifacts: &'a [CompilationArtifact],
    filter: Option<&ArtifactFilter>,
) -> Vec<&'a CompilationArtifact> {
    artifacts
        .iter()
        .filter(|a| filter.map_or(true, |f| f.matches(a)))
        .collect()
}

/// Return the path of the one artifact matching `filter`.
///
/// Zero or several matches are errors; the full and filtered lists are
/// reported to `sink` before either outcome.
pub fn resolve(
    artifacts: &[CompilationArtifact],
    filter: Option<&ArtifactFilter>,
    sink: &dyn OutputSink,
) -> Result<String> {
    sink.note(&describe("Raw artifacts", artifacts.iter()));
    let matched = filter_artifacts(artifacts, filter);
    sink.note(&describe("Filtered artifacts", matched.iter().copied()));

    let filter = filter.cloned().unwrap_or_default();
    match matched.len() {
        0 => Err(BridgeError::NoMatch {
            filter,
            candidates: artifacts.to_vec(),
        }),
        1 => {
            let program = matched[0].file_path.clone();
            info!(program = %program, "Resolved program");
            Ok(program)
        }
        _ => Err(BridgeError::AmbiguousMatch {
            filter,
            matches: matched.into_iter().cloned().collect(),
        }),
    }
}

fn describe<'a>(title: &str, artifacts: impl Iterator<Item = &'a CompilationArtifact>) -> String {
    let mut out = format!("{title}:");
    for artifact in artifacts {
        out.push_str("\n  ");
        out.push_str(&artifact.to_string());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::RecordingSink;

    fn candidates() -> Vec<CompilationArtifact> {
        vec![
            CompilationArtifact::new("/t/demo", "demo", "bin"),
            CompilationArtifact::new("/t/deps/demo_tests-1", "demo_tests", "test"),
        ]
    }

    #[test]
    fn test_filter_by_name_resolves_unique() {
        let sink = RecordingSink::new();
        let path = resolve(&candidates(), Some(&ArtifactFilter::named("demo")), &sink).unwrap();
        assert_eq!(path, "/t/demo");
    }

    #[test]
    fn test_no_filter_with_two_candidates_is_ambiguous() {
        let sink = RecordingSink::new();
        let err = resolve(&candidates(), None, &sink).unwrap_err();
        match err {
            BridgeError::AmbiguousMatch { matches, .. } => assert_eq!(matches.len(), 2),
            other => panic!("expected ambiguous match, got {other:?}"),
        }

        let err = resolve(&candidates(), Some(&ArtifactFilter::default()), &sink).unwrap_err();
        assert!(matches!(err, BridgeError::AmbiguousMatch { .. }));
    }

    #[test]
    fn test_no_match_keeps_candidates() {
        let sink = RecordingSink::new();
        let filter = ArtifactFilter::new(Some("demo".to_string()), Some("test".to_string()));
        let err = resolve(&candidates(), Some(&filter), &sink).unwrap_err();
        match err {
            BridgeError::NoMatch {
                filter: f,
                candidates: c,
            } => {
                assert_eq!(f, filter);
                assert_eq!(c, candidates());
            }
            other => panic!("expected no match, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_candidates_is_no_match() {
        let sink = RecordingSink::new();
        let err = resolve(&[], None, &sink).unwrap_err();
        assert!(matches!(err, BridgeError::NoMatch { .. }));
    }

    #[test]
    fn test_kind_only_filter() {
        let sink = RecordingSink::new();
        let filter = ArtifactFilter::new(None, Some("test".to_string()));
        let path = resolve(&candidates(), Some(&filter), &sink).unwrap();
        assert_eq!(path, "/t/deps/demo_tests-1");
    }

    #[test]
    fn test_raw_and_filtered_lists_are_reported() {
        let sink = RecordingSink::new();
        let _ = resolve(&candidates(), Some(&ArtifactFilter::named("nothing")), &sink);
        let notes = sink.notes();
        assert_eq!(notes.len(), 2);
        assert!(notes[0].starts_with("Raw artifacts:"));
        assert!(notes[0].contains("/t/demo"));
        assert!(notes[0].contains("/t/deps/demo_tests-1"));
        assert_eq!(notes[1], "Filtered artifacts:");
    }

    #[test]
    fn test_filter_display() {
        assert_eq!(
            ArtifactFilter::named("demo").to_string(),
            "{ name: demo, kind: * }"
        );
    }
}
