//! Build invocation and tool configuration.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, Result};
use crate::resolver::ArtifactFilter;

/// Flag that switches cargo's stdout to line-delimited JSON messages.
pub const MESSAGE_FORMAT_JSON: &str = "--message-format=json";

/// Color mode passed to the build tool alongside the JSON message format.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ColorMode {
    /// Rendered diagnostics keep ANSI escapes.
    #[default]
    Always,
    Never,
    Auto,
}

impl ColorMode {
    pub fn flag(&self) -> &'static str {
        match self {
            ColorMode::Always => "--color=always",
            ColorMode::Never => "--color=never",
            ColorMode::Auto => "--color=auto",
        }
    }
}

impl std::str::FromStr for ColorMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "always" => Ok(ColorMode::Always),
            "never" => Ok(ColorMode::Never),
            "auto" => Ok(ColorMode::Auto),
            other => Err(format!("unknown color mode: {other}")),
        }
    }
}

/// How to locate and drive the build tool.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ToolConfig {
    /// Executable name or path of the build tool.
    pub program: PathBuf,

    /// Default working directory for invocations without a `cwd`.
    pub project_root: PathBuf,

    /// Color mode injected next to the message-format flag.
    pub color: ColorMode,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from("cargo"),
            project_root: PathBuf::from("."),
            color: ColorMode::default(),
        }
    }
}

impl ToolConfig {
    pub fn new(program: impl Into<PathBuf>, project_root: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            project_root: project_root.into(),
            color: ColorMode::default(),
        }
    }

    pub fn with_color(mut self, color: ColorMode) -> Self {
        self.color = color;
        self
    }
}

/// One run of the build tool: arguments, extra environment, working directory.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BuildInvocation {
    pub args: Vec<String>,

    /// Merged onto the ambient environment before spawn.
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Overrides [`ToolConfig::project_root`] when set.
    #[serde(default)]
    pub cwd: Option<PathBuf>,
}

impl BuildInvocation {
    pub fn new<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
            env: BTreeMap::new(),
            cwd: None,
        }
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Working directory the process runs in.
    pub fn working_dir<'a>(&'a self, config: &'a ToolConfig) -> &'a Path {
        self.cwd.as_deref().unwrap_or(&config.project_root)
    }

    /// Copy of this invocation with the JSON message-format and color flags
    /// inserted right before a `--` separator, or appended when there is none.
    pub fn with_json_messages(&self, color: ColorMode) -> BuildInvocation {
        let mut args = self.args.clone();
        let flags = [MESSAGE_FORMAT_JSON.to_string(), color.flag().to_string()];
        match args.iter().position(|a| a == "--") {
            Some(pos) => {
                args.splice(pos..pos, flags);
            }
            None => args.extend(flags),
        }
        BuildInvocation {
            args,
            env: self.env.clone(),
            cwd: self.cwd.clone(),
        }
    }
}

/// The build section of a launch configuration.
///
/// Accepts either a full object or, in the legacy form, a bare argument list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum BuildConfig {
    Args(Vec<String>),
    Full {
        #[serde(default)]
        args: Vec<String>,
        #[serde(default)]
        env: BTreeMap<String, String>,
        #[serde(default)]
        cwd: Option<PathBuf>,
        #[serde(default)]
        filter: Option<ArtifactFilter>,
    },
}

impl BuildConfig {
    pub fn from_json(text: &str) -> Result<Self> {
        let config: BuildConfig = serde_json::from_str(text)?;
        if config.args().is_empty() {
            return Err(BridgeError::InvalidConfig(
                "build configuration has no arguments".to_string(),
            ));
        }
        Ok(config)
    }

    pub fn args(&self) -> &[String] {
        match self {
            BuildConfig::Args(args) => args,
            BuildConfig::Full { args, .. } => args,
        }
    }

    /// Split into the invocation to run and the filter to resolve with.
    pub fn into_parts(self) -> (BuildInvocation, Option<ArtifactFilter>) {
        match self {
            BuildConfig::Args(args) => (BuildInvocation::new(args), None),
            BuildConfig::Full {
                args,
                env,
                cwd,
                filter,
            } => (BuildInvocation { args, env, cwd }, filter),
        }
    }
}
