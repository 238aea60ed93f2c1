pub mod models {
    pub mod sdm;
}

pub mod accessor;
pub mod accessory {
    pub mod characteristics;
    pub mod ranges;
    pub mod thermostat;
}
pub mod cache;
pub mod client;
pub mod config;
pub mod device_traits;
pub mod executor;
pub mod status;
pub mod timeout;
pub mod services {
    pub mod monitor;
}

#[cfg(test)]
mod testing;

use crate::accessory::thermostat::ThermostatAccessory;
use crate::client::{OAuthCredentials, SdmClient};
use crate::config::Config;
use crate::services::monitor;
use crate::timeout::AdaptiveTimeout;
use log::{error, info};
use std::ffi::OsString;
use std::path::PathBuf;
use std::sync::Arc;

async fn run(once: bool) -> Result<(), String> {
    // 1) Load config
    let cfg = Config::from_env()?;
    info!(
        "Config loaded (device={}, poll_interval={}s, cache_nominal={}s, cache_unreachable={}s, cache_lock_wait={}ms)",
        cfg.device_id,
        cfg.poll_interval.as_secs(),
        cfg.cache_nominal.as_secs(),
        cfg.cache_unreachable.as_secs(),
        cfg.cache_lock_wait.as_millis()
    );

    // 2) Init SDM client
    let client = SdmClient::new(
        cfg.project_id.clone(),
        OAuthCredentials {
            client_id: cfg.client_id.clone(),
            client_secret: cfg.client_secret.clone(),
            refresh_token: cfg.refresh_token.clone(),
        },
    );
    client
        .authenticate()
        .await
        .map_err(|e| format!("SDM auth failed (refresh token invalid/revoked?): {}", e))?;
    info!("Authenticated to Smart Device Management API");

    // 3) Build the accessory
    let accessory = ThermostatAccessory::new(
        cfg.device_name.clone(),
        Arc::new(client),
        &cfg.device_id,
        AdaptiveTimeout::new(cfg.cache_nominal, cfg.cache_unreachable),
        cfg.cache_lock_wait,
    );

    // 4) Poll characteristics
    if once {
        let readings = monitor::poll_once(&accessory).await;
        info!("{}: {}", accessory.name(), monitor::format_readings(&readings));
        return Ok(());
    }
    info!(
        "Starting monitor loop: accessory={}, interval={}s",
        accessory.name(),
        cfg.poll_interval.as_secs()
    );
    monitor::run_loop(&accessory, cfg.poll_interval).await
}

#[derive(Debug, Default, PartialEq)]
struct CliArgs {
    env_file: Option<PathBuf>,
    once: bool,
}

impl CliArgs {
    fn parse<I: IntoIterator<Item = OsString>>(args: I) -> Result<Self, String> {
        let mut parsed = CliArgs::default();
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            let arg = arg
                .into_string()
                .map_err(|raw| format!("non-UTF-8 argument {:?}", raw))?;
            let (flag, inline) = match arg.split_once('=') {
                Some((flag, value)) => (flag.to_string(), Some(value.to_string())),
                None => (arg, None),
            };
            match (flag.as_str(), inline) {
                ("--once", None) => parsed.once = true,
                ("--env-file", inline) => {
                    let path = inline
                        .or_else(|| args.next().and_then(|next| next.into_string().ok()))
                        .filter(|path| !path.is_empty())
                        .ok_or("--env-file needs a path")?;
                    if parsed.env_file.replace(PathBuf::from(path)).is_some() {
                        return Err("--env-file may only be given once".into());
                    }
                }
                ("--", None) => break,
                _ => return Err(format!("unknown option {}", flag)),
            }
        }
        Ok(parsed)
    }
}

/// The `.env` named on the command line, which must exist, or `./.env` when present.
fn env_file_to_load(explicit: Option<PathBuf>) -> Result<Option<PathBuf>, String> {
    match explicit {
        Some(path) if path.is_file() => Ok(Some(path)),
        Some(path) => Err(format!("{} is not a readable file", path.display())),
        None => Ok(Some(PathBuf::from(".env")).filter(|path| path.is_file())),
    }
}

fn startup() -> Result<(CliArgs, Option<PathBuf>), String> {
    let args = CliArgs::parse(std::env::args_os().skip(1))?;
    let env_file = env_file_to_load(args.env_file.clone())?;
    if let Some(path) = &env_file {
        config::load_env_file(path)?;
    }
    Ok((args, env_file))
}

fn main() {
    // The environment is only written here, before the runtime starts any worker thread.
    let (args, env_file) = match startup() {
        Ok(v) => v,
        Err(err) => {
            eprintln!("fatal: {}", err);
            std::process::exit(1);
        }
    };

    // Init logging after environment so RUST_LOG from .env is respected.
    let default_filter = env_logger::Env::default().default_filter_or("info");
    env_logger::Builder::from_env(default_filter)
        .format_timestamp_secs()
        .init();

    if let Some(path) = &env_file {
        info!("Environment loaded from {}", path.display());
    }
    info!(
        "nest-thermostat-bridge {} (git {}) starting",
        env!("CARGO_PKG_VERSION"),
        env!("BUILD_TIME_GIT_HASH")
    );

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("fatal: unable to start async runtime: {}", e);
            std::process::exit(1);
        }
    };
    if let Err(e) = runtime.block_on(run(args.once)) {
        error!("fatal: {}", e);
        std::process::exit(1);
    }
}
