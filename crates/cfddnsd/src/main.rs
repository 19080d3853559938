// # cfddnsd - Cloudflare DDNS Daemon
//
// Thin integration layer: all DDNS logic lives in cfddns-core.
//
// The cfddnsd daemon is responsible for:
// 1. Parsing command-line flags and environment variables (including `.env`)
// 2. Initializing logging and the runtime
// 3. Loading the configuration file
// 4. Wiring the HTTP IP source and the Cloudflare clients into the engine
// 5. Running the engine until SIGINT/SIGTERM
//
// ## Configuration
//
// - `--config` / `CFDDNS_CONFIG`: Configuration file (default: config.yaml,
//   config.yml or config.json in the working directory)
// - `--interval` / `CHECK_INTERVAL`: Seconds between passes (overrides the file)
// - `--ip-url` / `CFDDNS_IP_URL`: IP-echo endpoint
// - `--log-level` / `CFDDNS_LOG_LEVEL`: trace, debug, info, warn, error
// - `CF_DDNS_API_TOKEN`, or `CF_DDNS_API_KEY` + `CF_DDNS_API_EMAIL`:
//   credential override applied to every zone
//
// A `.env` file in the working directory is read before the flags are
// parsed. Variables already set in the environment win.
//
// ## Example
//
// ```bash
// export CF_API_TOKEN=your_token
// export CF_ZONE_ID=your_zone
// cfddnsd --config /etc/cfddns/config.yaml --interval 300
// ```

use anyhow::{Context, Result};
use cfddns_core::config::{load_config, resolve_config_path};
use cfddns_core::{DdnsEngine, EngineEvent, GlobalConfig};
use cfddns_ip_http::HttpIpSource;
use cfddns_provider_cloudflare::CloudflareFactory;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tokio::sync::mpsc;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DdnsExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<DdnsExitCode> for ExitCode {
    fn from(code: DdnsExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

#[derive(Parser, Debug)]
#[command(name = "cfddnsd")]
#[command(about = "Keeps Cloudflare A records pointed at this host's public IPv4 address", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (YAML or JSON)
    #[arg(short, long, env = "CFDDNS_CONFIG")]
    config: Option<PathBuf>,

    /// Seconds between reconciliation passes (overrides the configuration file)
    #[arg(long, env = "CHECK_INTERVAL")]
    interval: Option<u64>,

    /// IP-echo endpoint returning the public IPv4 address as plain text
    #[arg(long, env = "CFDDNS_IP_URL", default_value = cfddns_ip_http::DEFAULT_URL)]
    ip_url: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "CFDDNS_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

fn parse_log_level(level: &str) -> Result<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => anyhow::bail!(
            "Log level '{}' is not valid. Valid levels: trace, debug, info, warn, error",
            level
        ),
    }
}

/// Load `dir/.env` into the process environment
///
/// Variables already present keep their values.
fn load_env_file(dir: &Path) -> dotenvy::Result<PathBuf> {
    let path = dir.join(".env");
    dotenvy::from_path(&path)?;
    Ok(path)
}

/// Load the configuration file and apply command-line overrides
fn load(cli: &Cli) -> Result<GlobalConfig> {
    let cwd = std::env::current_dir().context("Failed to read the working directory")?;
    let path = resolve_config_path(cli.config.as_deref(), &cwd)?;
    info!("Loading configuration from {}", path.display());

    let mut config = load_config(&path)?;
    if let Some(interval) = cli.interval {
        config = config.with_check_interval_secs(interval);
        config.validate()?;
    }

    Ok(config)
}

/// Build the engine from the loaded configuration
fn build_engine(
    cli: &Cli,
    config: GlobalConfig,
) -> Result<(DdnsEngine, mpsc::Receiver<EngineEvent>)> {
    let ip_source = HttpIpSource::new(cli.ip_url.clone())?;
    info!("IP source: {}", ip_source.url());

    let engine = DdnsEngine::new(Box::new(ip_source), &CloudflareFactory::new(), config)?;
    Ok(engine)
}

fn main() -> ExitCode {
    let env_file = std::env::current_dir()
        .map_err(dotenvy::Error::Io)
        .and_then(|cwd| load_env_file(&cwd));

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                DdnsExitCode::ConfigError.into()
            } else {
                DdnsExitCode::CleanShutdown.into()
            };
        }
    };

    let log_level = match parse_log_level(&cli.log_level) {
        Ok(level) => level,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return DdnsExitCode::ConfigError.into();
        }
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return DdnsExitCode::ConfigError.into();
    }

    info!("Starting cfddnsd {}", env!("CARGO_PKG_VERSION"));

    match env_file {
        Ok(path) => info!("Loaded environment from {}", path.display()),
        Err(e) if e.not_found() => debug!("No .env file in the working directory"),
        Err(e) => warn!("Ignoring .env file: {}", e),
    }

    let config = match load(&cli) {
        Ok(config) => config,
        Err(e) => {
            error!("Configuration error: {:#}", e);
            return DdnsExitCode::ConfigError.into();
        }
    };

    let subdomains: usize = config.cloudflare.iter().map(|z| z.subdomains.len()).sum();
    info!(
        "Configuration loaded: {} zone(s), {} subdomain(s), ttl {}s",
        config.cloudflare.len(),
        subdomains,
        config.ttl
    );

    let (engine, events) = match build_engine(&cli, config) {
        Ok(parts) => parts,
        Err(e) => {
            error!("Startup error: {:#}", e);
            return DdnsExitCode::ConfigError.into();
        }
    };

    // Enter tokio runtime
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return DdnsExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        if let Err(e) = run_daemon(engine, events).await {
            error!("Daemon error: {:#}", e);
            DdnsExitCode::RuntimeError
        } else {
            DdnsExitCode::CleanShutdown
        }
    });

    result.into()
}

/// Run the engine until shutdown, logging its events
async fn run_daemon(
    mut engine: DdnsEngine,
    mut events: mpsc::Receiver<EngineEvent>,
) -> Result<()> {
    let monitor = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                EngineEvent::PassCompleted { report } => {
                    debug!(
                        "Pass completed: ip={:?} {} interrupted={}",
                        report.external_ip,
                        report.counts(),
                        report.interrupted
                    );
                }
                EngineEvent::Stopped { reason } => {
                    debug!("Engine reported stop: {}", reason);
                    break;
                }
                other => debug!("Engine event: {:?}", other),
            }
        }
    });

    engine.run().await;
    drop(engine);

    monitor.await.context("Event monitor task failed")?;

    info!("Shutting down daemon");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from(["cfddnsd"]).unwrap();
        assert_eq!(cli.ip_url, cfddns_ip_http::DEFAULT_URL);
        assert_eq!(cli.log_level, "info");
    }

    #[test]
    fn test_cli_flags() {
        let cli = Cli::try_parse_from([
            "cfddnsd",
            "--config",
            "/etc/cfddns/config.yaml",
            "--interval",
            "60",
            "--ip-url",
            "http://127.0.0.1:8080/ip",
            "--log-level",
            "debug",
        ])
        .unwrap();

        assert_eq!(cli.config, Some(PathBuf::from("/etc/cfddns/config.yaml")));
        assert_eq!(cli.interval, Some(60));
        assert_eq!(cli.ip_url, "http://127.0.0.1:8080/ip");
    }

    #[test]
    fn test_cli_rejects_non_numeric_interval() {
        assert!(Cli::try_parse_from(["cfddnsd", "--interval", "soon"]).is_err());
    }

    #[test]
    fn test_parse_log_level() {
        assert_eq!(parse_log_level("DEBUG").unwrap(), Level::DEBUG);
        assert_eq!(parse_log_level("warn").unwrap(), Level::WARN);
        assert!(parse_log_level("verbose").is_err());
    }

    #[test]
    fn test_env_file_keeps_existing_variables() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(".env"),
            "CFDDNSD_TEST_ENV_FILE_ONLY=from-file\nPATH=from-file\n",
        )
        .unwrap();
        let path_before = std::env::var("PATH").unwrap();

        let loaded = load_env_file(dir.path()).unwrap();

        assert_eq!(loaded, dir.path().join(".env"));
        assert_eq!(std::env::var("CFDDNSD_TEST_ENV_FILE_ONLY").unwrap(), "from-file");
        assert_eq!(std::env::var("PATH").unwrap(), path_before);
    }

    #[test]
    fn test_missing_env_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_env_file(dir.path()).unwrap_err();
        assert!(err.not_found());
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(DdnsExitCode::CleanShutdown as u8, 0);
        assert_eq!(DdnsExitCode::ConfigError as u8, 1);
        assert_eq!(DdnsExitCode::RuntimeError as u8, 2);
    }
}
