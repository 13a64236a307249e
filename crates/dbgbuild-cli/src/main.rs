//! dbgbuild - build, then debug
//!
//! ## Commands
//!
//! - `resolve`: build with cargo and print the one program to debug
//! - `configs`: print a launch.json menu synthesized from `cargo metadata`

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, Level};

use dbgbuild_core::{
    enumerate_launch_configs, init_tracing, launch_document, resolve_program, ArtifactFilter,
    BuildConfig, BuildInvocation, CancellationToken, ColorMode, OutputSink, ProcessRunner,
    ToolConfig,
};

#[derive(Parser)]
#[command(name = "dbgbuild")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Build-tool orchestration for debugger launches", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Build tool executable
    #[arg(long, global = true, env = "DBGBUILD_CARGO", default_value = "cargo")]
    cargo: PathBuf,

    /// Project root used when no working directory is given
    #[arg(long, global = true, env = "DBGBUILD_PROJECT_ROOT", default_value = ".")]
    project_root: PathBuf,

    /// Color mode for compiler diagnostics (always, never, auto)
    #[arg(long, global = true, default_value = "always")]
    color: ColorMode,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build and print the path of the single matching artifact
    Resolve {
        /// JSON build configuration (object with args/env/cwd/filter, or an argument array)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Only consider artifacts of this target name
        #[arg(long)]
        name: Option<String>,

        /// Only consider artifacts of this target kind
        #[arg(long)]
        kind: Option<String>,

        /// Build tool arguments (used when no --config is given)
        #[arg(last = true)]
        args: Vec<String>,
    },

    /// Print launch configurations for the project as launch.json
    Configs {
        /// Project directory; also used verbatim as each configuration's cwd
        #[arg(long)]
        dir: Option<PathBuf>,
    },
}

/// Streams build output to the terminal.
struct ConsoleSink;

impl OutputSink for ConsoleSink {
    fn diagnostic(&self, text: &str) {
        let mut err = std::io::stderr().lock();
        let _ = if text.ends_with('\n') {
            write!(err, "{text}")
        } else {
            writeln!(err, "{text}")
        };
    }

    fn stderr(&self, chunk: &[u8]) {
        let _ = std::io::stderr().lock().write_all(chunk);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    init_tracing(cli.json, level);

    let config = ToolConfig::new(cli.cargo, cli.project_root).with_color(cli.color);
    let cancel = CancellationToken::new();
    spawn_interrupt_handler(cancel.clone());

    match cli.command {
        Commands::Resolve {
            config: config_path,
            name,
            kind,
            args,
        } => cmd_resolve(config, config_path, name, kind, args, cancel).await,
        Commands::Configs { dir } => cmd_configs(config, dir, cancel).await,
    }
}

/// Ctrl-C asks the build tool to stop; the run still ends through its normal
/// exit path.
fn spawn_interrupt_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, cancelling build");
            cancel.cancel();
        }
    });
}

async fn cmd_resolve(
    config: ToolConfig,
    config_path: Option<PathBuf>,
    name: Option<String>,
    kind: Option<String>,
    args: Vec<String>,
    cancel: CancellationToken,
) -> Result<()> {
    let (invocation, file_filter) = match config_path {
        Some(path) => {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            BuildConfig::from_json(&text)
                .with_context(|| format!("Failed to parse {}", path.display()))?
                .into_parts()
        }
        None => {
            if args.is_empty() {
                anyhow::bail!("No build arguments given; pass --config or arguments after `--`");
            }
            (BuildInvocation::new(args), None)
        }
    };

    let filter = if name.is_some() || kind.is_some() {
        Some(ArtifactFilter::new(name, kind))
    } else {
        file_filter
    };

    let color = config.color;
    let runner = ProcessRunner::new(config);
    let program = resolve_program(
        &runner,
        &invocation,
        color,
        filter.as_ref(),
        &ConsoleSink,
        cancel,
    )
    .await?;

    println!("{program}");
    Ok(())
}

async fn cmd_configs(
    config: ToolConfig,
    dir: Option<PathBuf>,
    cancel: CancellationToken,
) -> Result<()> {
    let runner = ProcessRunner::new(config);
    let descriptors = enumerate_launch_configs(&runner, dir.as_deref(), &ConsoleSink, cancel)
        .await
        .context("Failed to enumerate launch configurations")?;

    println!("{}", serde_json::to_string_pretty(&launch_document(&descriptors))?);
    Ok(())
}
