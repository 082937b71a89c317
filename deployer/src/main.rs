//! Deployer - Entry Point
//!
//! Publishes generated static sites by provisioning a source repository and a
//! hosting service for each request, and serves deployment status over HTTP.

use std::collections::HashMap;
use std::env;
use std::time::Duration;

use deployer::app::options::{AppOptions, PlatformOptions, ServerOptions};
use deployer::app::run::run;
use deployer::deploy::orchestrator::OrchestratorOptions;
use deployer::logs::{init_logging, LogOptions};
use deployer::ratelimit::RateLimitOptions;
use deployer::storage::layout::StorageLayout;
use deployer::storage::settings::Settings;
use deployer::utils::version_info;
use deployer::workers::status_poller;

use secrecy::SecretString;
use tracing::{error, info};

/// Env var holding the base64 credential encryption key
const CREDENTIALS_KEY_ENV: &str = "DEPLOYER_CREDENTIALS_KEY";

#[tokio::main]
async fn main() {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();
    let mut cli_args: HashMap<String, String> = HashMap::new();

    for arg in args.iter().skip(1) {
        if let Some((key, value)) = arg.split_once('=') {
            // Handle --key=value format
            let clean_key = key.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), value.to_string());
        } else if arg.starts_with("--") {
            // Handle standalone flags like --version
            let clean_key = arg.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), "true".to_string());
        }
    }

    // Print version and exit
    let version = version_info();
    if cli_args.contains_key("version") {
        match serde_json::to_string_pretty(&version) {
            Ok(json) => println!("{}", json),
            Err(_) => println!("{}", version.version),
        }
        return;
    }

    let layout = match cli_args.get("base-dir") {
        Some(dir) => StorageLayout::new(dir),
        None => StorageLayout::default(),
    };

    // Retrieve the settings file, defaults when absent
    let settings_file = match cli_args.get("config") {
        Some(path) => deployer::filesys::file::File::new(path),
        None => layout.settings_file(),
    };
    let settings = match settings_file.read_json_or_default::<Settings>().await {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!(
                "Unable to read settings file {}: {}",
                settings_file.path().display(),
                e
            );
            return;
        }
    };

    // Initialize logging
    let log_options = LogOptions {
        log_level: settings.log_level.clone(),
        json_format: settings.log_json,
        log_dir: settings
            .log_to_file
            .then(|| layout.logs_dir().path().to_path_buf()),
        ..Default::default()
    };
    let _log_guard = match init_logging(log_options) {
        Ok(guard) => guard,
        Err(e) => {
            println!("Failed to initialize logging: {e}");
            None
        }
    };

    let port = match cli_args.get("port").map(|p| p.parse::<u16>()) {
        Some(Ok(port)) => port,
        Some(Err(e)) => {
            error!("Invalid --port value: {}", e);
            return;
        }
        None => settings.server.port,
    };

    // Run the server
    let options = AppOptions {
        layout,
        server: ServerOptions {
            host: settings.server.host.clone(),
            port,
        },
        platforms: PlatformOptions {
            github_api_url: settings.github.api_url.clone(),
            render_api_url: settings.render.api_url.clone(),
            request_timeout: Duration::from_secs(settings.request_timeout_secs),
        },
        rate_limit: RateLimitOptions {
            window: Duration::from_secs(settings.rate_limit.window_secs),
            max_requests: settings.rate_limit.max_requests,
        },
        orchestrator: OrchestratorOptions {
            repo_prefix: settings.repo_prefix.clone(),
        },
        credentials_key: env::var(CREDENTIALS_KEY_ENV).ok().map(SecretString::from),
        enable_status_poller: settings.enable_status_poller,
        status_poller: status_poller::Options {
            interval: Duration::from_secs(settings.status_poll_interval_secs),
            ..Default::default()
        },
        ..Default::default()
    };

    info!(
        "Running deployer {} ({}) with options: {:?}",
        version.version, version.git_hash, options
    );
    if let Err(e) = run(options, await_shutdown_signal()).await {
        error!("Failed to run the deployer: {e}");
        std::process::exit(1);
    }
}

async fn await_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let (mut sigterm, mut sigint) =
            match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                (Ok(sigterm), Ok(sigint)) => (sigterm, sigint),
                _ => {
                    error!("Failed to install signal handlers, waiting for Ctrl+C only");
                    let _ = tokio::signal::ctrl_c().await;
                    return;
                }
            };

        tokio::select! {
            _ = sigterm.recv() => {
                info!("SIGTERM received, shutting down...");
            }
            _ = sigint.recv() => {
                info!("SIGINT received, shutting down...");
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl+C received, shutting down...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
        }
        info!("Ctrl+C received, shutting down...");
    }
}
