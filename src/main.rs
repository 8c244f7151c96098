//! scanguard daemon: QR token issuance, scan validation and rate limiting
//! over a Unix socket.

use std::env;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use tokio::signal;
use tokio::sync::Notify;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use scanguard::auth::resolve_token_secret;
use scanguard::config::Settings;
use scanguard::ratelimit::PolicyTable;
use scanguard::socket::SocketListener;
use scanguard::token::TokenCodec;

const VERSION: &str = env!("CARGO_PKG_VERSION");
const NAME: &str = env!("CARGO_PKG_NAME");
const DEFAULT_CONFIG_PATH: &str = "/etc/scanguard/scanguard.toml";

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_help();
        return ExitCode::SUCCESS;
    }

    if args.iter().any(|a| a == "--version" || a == "-V") {
        println!("{} {}", NAME, VERSION);
        return ExitCode::SUCCESS;
    }

    let config_path = get_config_path(&args);

    let settings = match Settings::load(&config_path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error loading configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    init_logging(&settings);

    info!("Starting {} v{}", NAME, VERSION);
    info!("Configuration loaded from: {}", config_path);
    info!(environment = ?settings.environment, "Socket path: {}", settings.socket.path.display());

    let secret = match resolve_token_secret(&settings.security, settings.environment) {
        Ok(secret) => secret,
        Err(e) => {
            error!(error = %e, "Cannot start without a token secret");
            return ExitCode::FAILURE;
        }
    };

    if args.iter().any(|a| a == "--check-config") {
        info!(policies = settings.policies.len(), "Configuration OK");
        return ExitCode::SUCCESS;
    }

    let codec = Arc::new(TokenCodec::new(secret.as_bytes()));
    drop(secret);

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "Failed to create Tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(async_main(settings, config_path, codec)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Daemon failed");
            ExitCode::FAILURE
        }
    }
}

async fn async_main(
    settings: Settings,
    config_path: String,
    codec: Arc<TokenCodec>,
) -> Result<(), Box<dyn std::error::Error>> {
    let policies = Arc::new(PolicyTable::new(settings.policies.clone()));
    let listener = SocketListener::bind(Arc::new(settings), codec, Arc::clone(&policies)).await?;

    let shutdown = Arc::new(Notify::new());

    loop {
        tokio::select! {
            result = listener.run(Arc::clone(&shutdown)) => {
                if let Err(e) = result {
                    error!(error = %e, "Socket listener failed");
                    return Err(e.into());
                }
                break;
            }
            _ = shutdown_signal() => {
                info!("Shutdown signal received, initiating graceful shutdown...");
                shutdown.notify_waiters();

                let drain_timeout = Duration::from_secs(30);
                match tokio::time::timeout(drain_timeout, listener.wait_for_drain()).await {
                    Ok(()) => info!("Graceful shutdown complete"),
                    Err(_) => warn!(
                        "Shutdown timeout after {}s, some connections may be terminated",
                        drain_timeout.as_secs()
                    ),
                }
                break;
            }
            _ = reload_signal() => reload_policies(&config_path, &policies),
        }
    }

    let metrics = listener.metrics();
    info!(
        requests_total = metrics.total_requests(),
        requests_failed = metrics.failed_requests(),
        "Daemon stopped"
    );
    Ok(())
}

/// Re-read the config file and swap in its rate limit policies.
///
/// Other settings (socket, secret, limits) need a restart.
fn reload_policies(config_path: &str, policies: &PolicyTable) {
    info!("Reload signal received, reloading rate limit policies...");
    match Settings::load(config_path) {
        Ok(new_settings) => {
            policies.replace(new_settings.policies);
            info!(policies = ?policies.names(), "Rate limit policies reloaded");
        }
        Err(e) => {
            error!(error = %e, "Failed to reload configuration, keeping existing policies");
        }
    }
}

/// Wait for SIGTERM or SIGINT.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    let terminate = wait_for(signal::unix::SignalKind::terminate(), "SIGTERM");

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Wait for SIGHUP.
async fn reload_signal() {
    wait_for(signal::unix::SignalKind::hangup(), "SIGHUP").await;
}

async fn wait_for(kind: signal::unix::SignalKind, name: &'static str) {
    match signal::unix::signal(kind) {
        Ok(mut stream) => {
            stream.recv().await;
        }
        Err(e) => {
            error!(error = %e, signal = name, "Failed to install signal handler");
            std::future::pending::<()>().await;
        }
    }
}

fn print_help() {
    println!(
        r#"{} {}
QR attendance token and rate limit daemon, served over a Unix socket.

USAGE:
    {} [OPTIONS]

OPTIONS:
    -c, --config <PATH>    Path to configuration file
                           [default: {}]
        --check-config     Load the configuration and token secret, then exit
    -h, --help             Print help information
    -V, --version          Print version information

ENVIRONMENT:
    SCANGUARD_TOKEN_SECRET Token secret (name configurable via
                           security.token_secret_env)
    RUST_LOG               Overrides logging.level
"#,
        NAME, VERSION, NAME, DEFAULT_CONFIG_PATH
    );
}

fn get_config_path(args: &[String]) -> String {
    for (i, arg) in args.iter().enumerate() {
        if (arg == "--config" || arg == "-c") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
        if let Some(path) = arg.strip_prefix("--config=") {
            return path.to_string();
        }
    }
    DEFAULT_CONFIG_PATH.to_string()
}

fn init_logging(settings: &Settings) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.logging.level));

    match settings.logging.format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().pretty())
                .init();
        }
    }
}
