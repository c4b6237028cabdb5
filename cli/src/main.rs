//! glint CLI - binary entry point.
//!
//! # Commands
//!
//! ```text
//! glint install                     provision glslangValidator and glsl_analyzer
//! glint check [--stage S] FILES...  validate files, print diagnostics
//! glint serve                       JSON-lines editor bridge on stdin/stdout
//! ```
//!
//! Logs go to `~/.glint/logs/glint.log`, never to stdout, so `serve` output
//! stays machine-readable.

mod check;
mod serve;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::{
    fs::{self, OpenOptions},
    path::PathBuf,
    process::ExitCode,
    sync::Mutex,
};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use glint_engine::GlintConfig;
use glint_types::ShaderStage;

#[derive(Debug, Parser)]
#[command(name = "glint", version, about = "GLSL validation with on-demand tooling")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Download the validator and analysis server if missing.
    Install,
    /// Validate shader files and print their diagnostics.
    Check {
        /// Stage to validate as; inferred from each file name when omitted.
        #[arg(long)]
        stage: Option<ShaderStage>,
        /// Pass the file path to the validator instead of piping its text.
        #[arg(long)]
        via_file: bool,
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Read document events as JSON lines and publish diagnostics.
    Serve,
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::try_new("warn").expect("warn filter is valid"));

    let (log_file, init_warnings) = open_glint_log_file();

    if let Some((log_path, file)) = log_file {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
            .with(env_filter)
            .init();

        tracing::info!(path = %log_path.display(), "Logging initialized");
        for warning in init_warnings {
            tracing::warn!("{warning}");
        }
        return;
    }

    // No log file: stay silent rather than interleave logs with serve output.
    tracing_subscriber::registry().with(env_filter).init();
}

fn open_glint_log_file() -> (Option<(PathBuf, std::fs::File)>, Vec<String>) {
    let mut warnings = Vec::new();

    for candidate in glint_log_file_candidates() {
        if let Some(parent) = candidate.parent()
            && let Err(e) = fs::create_dir_all(parent)
        {
            warnings.push(format!(
                "Failed to create log dir {}: {e}",
                parent.display()
            ));
            continue;
        }

        match OpenOptions::new()
            .create(true)
            .append(true)
            .open(&candidate)
        {
            Ok(file) => return (Some((candidate, file)), warnings),
            Err(e) => {
                warnings.push(format!(
                    "Failed to open log file {}: {e}",
                    candidate.display()
                ));
            }
        }
    }

    (None, warnings)
}

fn glint_log_file_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    // Primary: ~/.glint/logs/glint.log
    if let Some(config_path) = GlintConfig::path()
        && let Some(config_dir) = config_path.parent()
    {
        candidates.push(config_dir.join("logs").join("glint.log"));
    }

    // Fallback: ./.glint/logs/glint.log
    candidates.push(PathBuf::from(".glint").join("logs").join("glint.log"));

    candidates
}

fn load_config() -> GlintConfig {
    match GlintConfig::load() {
        Ok(Some(config)) => config,
        Ok(None) => GlintConfig::default(),
        Err(e) => {
            eprintln!("warning: {e}; using defaults");
            GlintConfig::default()
        }
    }
}

async fn install(config: &GlintConfig) -> Result<bool> {
    let provisioner = config
        .provision
        .provisioner()
        .context("resolving host platform")?;
    let provisioned = provisioner.ensure_all().await;

    let mut ok = true;
    for result in [provisioned.validator, provisioned.analyzer] {
        match result {
            Ok(location) => println!("{}: {}", location.tool(), location.absolute().display()),
            Err(e) => {
                eprintln!("error: {e}");
                ok = false;
            }
        }
    }
    Ok(ok)
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing();

    let config = load_config();
    let ok = match cli.command {
        Command::Install => install(&config).await?,
        Command::Check {
            stage,
            via_file,
            files,
        } => check::run(&config, stage, via_file, &files).await?,
        Command::Serve => {
            serve::run(&config).await?;
            true
        }
    };

    Ok(if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_check_arguments() {
        let cli = Cli::try_parse_from([
            "glint", "check", "--stage", "vert", "--via-file", "a.glsl", "b.glsl",
        ])
        .unwrap();
        match cli.command {
            Command::Check {
                stage,
                via_file,
                files,
            } => {
                assert_eq!(stage, Some(ShaderStage::Vertex));
                assert!(via_file);
                assert_eq!(files, vec![PathBuf::from("a.glsl"), PathBuf::from("b.glsl")]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn check_requires_files() {
        assert!(Cli::try_parse_from(["glint", "check"]).is_err());
    }

    #[test]
    fn rejects_unknown_stage() {
        assert!(Cli::try_parse_from(["glint", "check", "--stage", "geom", "a.glsl"]).is_err());
    }

    #[test]
    fn log_candidates_end_with_local_fallback() {
        let candidates = glint_log_file_candidates();
        assert_eq!(
            candidates.last(),
            Some(&PathBuf::from(".glint").join("logs").join("glint.log"))
        );
    }
}
