use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use events::{Level, ProgressEvent, PHASE_COMPLETE};
use futures::StreamExt;
use orchestrator::{PipelineKind, TestRunRequest};
use server::config::EngineConfig;
use server::{create_router, state::AppState};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_CONFIG_FILE: &str = "phasestream.toml";

#[derive(Parser)]
#[command(name = "phasestream")]
#[command(about = "Phased admin operations streamed as progress events", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Start the HTTP server
    Serve {
        #[arg(short, long)]
        port: Option<u16>,

        /// Bearer token required by the admin routes
        #[arg(long)]
        admin_token: Option<String>,
    },
    /// Run a pipeline in this process and print its frames
    Run {
        /// demo, demo-friend or tests
        pipeline: PipelineKind,

        /// Only run tests matching this filter
        #[arg(long)]
        filter: Option<String>,

        #[arg(long)]
        skip_suite: bool,

        #[arg(long)]
        only_suite: bool,

        #[arg(long)]
        no_color: bool,
    },
    /// List the declared phases of a pipeline
    Phases {
        pipeline: PipelineKind,

        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Init { force }) => init_config(&cli.config, force).await,
        Some(Commands::Serve { port, admin_token }) => {
            serve(&cli.config, port, admin_token).await
        }
        Some(Commands::Run {
            pipeline,
            filter,
            skip_suite,
            only_suite,
            no_color,
        }) => {
            let request = TestRunRequest {
                filter,
                skip_suite,
                only_suite,
            };
            let color = !no_color && std::io::stdout().is_terminal();
            run_pipeline(&cli.config, pipeline, request, color).await
        }
        Some(Commands::Phases { pipeline, json }) => print_phases(pipeline, json),
        None => serve(&cli.config, None, None).await,
    }
}

async fn init_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        println!("Config already exists at {}", path.display());
        println!("Use --force to overwrite it.");
        return Ok(());
    }

    EngineConfig::default()
        .write(path)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;

    println!("Wrote default configuration to {}", path.display());
    println!();
    println!("Next steps:");
    println!("  1. Set server.admin_token or export {}", server::config::ADMIN_TOKEN_ENV);
    println!("  2. Run 'phasestream serve' to start the server");

    Ok(())
}

async fn serve(config_path: &Path, port: Option<u16>, admin_token: Option<String>) -> Result<()> {
    init_tracing();

    let mut config = EngineConfig::load(config_path).await.with_env_overrides();
    if let Some(port) = port {
        config.server.port = port;
    }
    if let Some(token) = admin_token {
        config.server.admin_token = Some(token);
    }

    if config.server.admin_token.is_none() && !config.server.allow_unauthenticated {
        tracing::warn!("No admin token configured, admin routes will reject every request");
    }

    let address = format!("{}:{}", config.server.host, config.server.port);
    let port = config.server.port;
    let app = create_router(AppState::new(config));

    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;

    println!();
    println!("Phasestream");
    println!("════════════════════════════════════════");
    println!();
    println!("  API Server:  http://localhost:{}", port);
    println!("  OpenAPI:     http://localhost:{}/api/openapi.json", port);
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    axum::serve(listener, app).await?;

    Ok(())
}

async fn run_pipeline(
    config_path: &Path,
    kind: PipelineKind,
    request: TestRunRequest,
    color: bool,
) -> Result<()> {
    init_tracing();

    let config = EngineConfig::load(config_path).await.with_env_overrides();
    let state = AppState::new(config);
    let run = state.start(kind, request);

    let mut events = run.events;
    let mut terminal = None;
    while let Some(event) = events.next().await {
        println!("{}", render_frame(&event, color)?);
        if event.is_terminal() {
            terminal = Some(event);
        }
    }

    let final_state = run.completion.await.context("Run task failed")?;
    tracing::debug!(pipeline = %kind, state = %final_state, "Run finished");

    match terminal {
        Some(event) if succeeded(&event) => Ok(()),
        Some(event) => bail!("{} did not succeed: {}", kind, event.message),
        None => bail!("{} ended without a terminal event", kind),
    }
}

fn print_phases(kind: PipelineKind, json: bool) -> Result<()> {
    let registry = kind.registry();

    if json {
        println!("{}", serde_json::to_string_pretty(&registry)?);
        return Ok(());
    }

    println!();
    println!("{} ({} phases)", registry.pipeline, registry.entries.len());
    for entry in &registry.entries {
        let requires = match entry.precondition {
            Some(precondition) => format!(
                "  requires {}",
                serde_json::to_string(&precondition)?.trim_matches('"')
            ),
            None => String::new(),
        };
        println!("  {:>3}  {}{}", entry.index, entry.name, requires);
    }
    println!();

    Ok(())
}

/// Frame line for one event, coloured by level when `color` is set.
fn render_frame(event: &ProgressEvent, color: bool) -> Result<String> {
    let frame = event.to_frame()?;
    let line = frame.trim_end();
    if !color {
        return Ok(line.to_string());
    }

    let styled = match event.level {
        Level::Info => line.normal(),
        Level::Success => line.green(),
        Level::Warning => line.yellow(),
        Level::Error => line.red().bold(),
    };
    Ok(styled.to_string())
}

/// A run succeeded when it completed without an error; a skipped run counts.
fn succeeded(terminal: &ProgressEvent) -> bool {
    terminal.phase == PHASE_COMPLETE && terminal.level != Level::Error
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "phasestream=info,server=info,orchestrator=info,tower_http=info".into()
            }),
        )
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_run_arguments() {
        let cli = Cli::try_parse_from([
            "phasestream",
            "run",
            "tests",
            "--filter",
            "checkout",
            "--skip-suite",
        ])
        .unwrap();

        match cli.command {
            Some(Commands::Run {
                pipeline,
                filter,
                skip_suite,
                only_suite,
                no_color,
            }) => {
                assert_eq!(pipeline, PipelineKind::Tests);
                assert_eq!(filter.as_deref(), Some("checkout"));
                assert!(skip_suite);
                assert!(!only_suite);
                assert!(!no_color);
            }
            _ => panic!("Expected run command"),
        }
        assert_eq!(cli.config, PathBuf::from(DEFAULT_CONFIG_FILE));
    }

    #[test]
    fn test_unknown_pipeline_rejected() {
        assert!(Cli::try_parse_from(["phasestream", "phases", "deploy"]).is_err());

        let cli = Cli::try_parse_from(["phasestream", "phases", "demo-friend", "-c", "alt.toml"])
            .unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Phases {
                pipeline: PipelineKind::DemoFriend,
                json: false
            })
        ));
        assert_eq!(cli.config, PathBuf::from("alt.toml"));
    }

    #[test]
    fn test_plain_frame_round_trips() {
        let event = ProgressEvent::new(3, "Demo Profile", Level::Success, "Created profile");
        let line = render_frame(&event, false).unwrap();

        assert!(line.starts_with("data: "));
        assert!(!line.ends_with('\n'));
        assert_eq!(ProgressEvent::from_frame(&line).unwrap(), event);
    }

    #[test]
    fn test_coloured_frame_keeps_payload() {
        colored::control::set_override(true);
        let event = ProgressEvent::fatal("Demo Photos failed: permission denied");
        let line = render_frame(&event, true).unwrap();

        assert!(line.contains("\u{1b}["));
        assert!(line.contains("Demo Photos failed: permission denied"));
    }

    #[test]
    fn test_success_judged_from_terminal_event() {
        assert!(succeeded(&ProgressEvent::complete(Level::Success, "done")));
        assert!(succeeded(&ProgressEvent::complete(
            Level::Warning,
            "Demo account already exists"
        )));
        assert!(!succeeded(&ProgressEvent::complete(
            Level::Error,
            "1 passed, 2 failed (exit code 1)"
        )));
        assert!(!succeeded(&ProgressEvent::fatal("No demo account found")));
    }

    #[tokio::test]
    async fn test_init_writes_loadable_config() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(DEFAULT_CONFIG_FILE);

        init_config(&path, false).await.unwrap();
        let config = EngineConfig::load(&path).await;
        assert_eq!(config, EngineConfig::default());

        std::fs::write(&path, "[server]\nport = 9000\n").unwrap();
        init_config(&path, false).await.unwrap();
        assert_eq!(EngineConfig::load(&path).await.server.port, 9000);
    }
}
