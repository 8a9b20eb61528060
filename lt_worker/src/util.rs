//! Helper utilities.

use std::fmt::Display;
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Once;
use std::time::Duration;

use riven::consts::{PlatformRoute, RegionalRoute};
use riven::RiotApiConfig;
use secrecy::SecretString;

use crate::error::LtError;
use crate::schedule::{Scheduler, SchedulerConfig};

/// Initialize [`log`] logging to stderr, if not already initialized. The level is read from
/// `RUST_LOG`, defaulting to `info`.
pub fn init_logging() {
    static ONCE: Once = Once::new();
    ONCE.call_once(|| {
        {
            fn hook(info: &std::panic::PanicInfo) {
                log::error!("{}", info);
            }
            std::panic::set_hook(Box::new(hook));
        }
        {
            struct StderrLog;
            static LOG: StderrLog = StderrLog;
            impl log::Log for StderrLog {
                fn enabled(&self, metadata: &log::Metadata) -> bool {
                    metadata.level() <= log::max_level()
                }

                fn log(&self, record: &log::Record) {
                    if !self.enabled(record.metadata()) {
                        return;
                    }
                    eprintln!(
                        "[{} {}] {}",
                        record.level(),
                        record.module_path().unwrap_or("?"),
                        record.args()
                    );
                }

                fn flush(&self) {}
            }
            let level = std::env::var("RUST_LOG")
                .ok()
                .and_then(|level| level.parse().ok())
                .unwrap_or(log::LevelFilter::Info);
            if log::set_logger(&LOG).is_ok() {
                log::set_max_level(level);
            }
            log::info!("logger set, level {}", level);
        }
    });
}

/// Process configuration, read once at boot.
pub struct Config {
    /// Riot API key.
    pub rgapi_key: SecretString,
    /// Riot API base URL, with `{}` standing in for the route.
    pub rgapi_base_url: String,
    /// Postgres connection URL.
    pub database_url: SecretString,
    /// Platform route for summoner, league, and spectator requests.
    pub platform: PlatformRoute,
    /// Regional route for account and match requests.
    pub region: RegionalRoute,
    /// HTTP listen address.
    pub bind_address: SocketAddr,
    /// Bulk update timing.
    pub scheduler: SchedulerConfig,
    /// Matches shown by the games view.
    pub games_count: u32,
}
impl Config {
    /// Read from environment variables.
    pub fn from_env() -> Result<Self, LtError> {
        let defaults = SchedulerConfig::default();
        let scheduler = SchedulerConfig {
            interval: Duration::from_secs(envvar_or(
                "UPDATE_INTERVAL_SECS",
                defaults.interval.as_secs(),
            )?),
            rate_per_window: envvar_or("RGAPI_RATE_PER_WINDOW", defaults.rate_per_window)?,
            requests_per_player: envvar_or(
                "RGAPI_REQUESTS_PER_PLAYER",
                defaults.requests_per_player,
            )?,
            window_factor: envvar_or("RGAPI_WINDOW_FACTOR", defaults.window_factor)?,
            batch_cooldown: Duration::from_secs(envvar_or(
                "BATCH_COOLDOWN_SECS",
                defaults.batch_cooldown.as_secs(),
            )?),
            player_delay: Duration::from_millis(envvar_or(
                "PLAYER_DELAY_MS",
                defaults.player_delay.as_millis() as u64,
            )?),
            retry: defaults.retry,
        };
        Ok(Self {
            rgapi_key: secret("RGAPI_KEY")?,
            rgapi_base_url: envvar_or(
                "RGAPI_BASE_URL",
                RiotApiConfig::DEFAULT_BASE_URL.to_owned(),
            )?,
            database_url: secret("DATABASE_URL")?,
            platform: envvar_or("PLATFORM_ROUTE", PlatformRoute::NA1)?,
            region: envvar_or("REGIONAL_ROUTE", RegionalRoute::AMERICAS)?,
            bind_address: envvar_or("BIND_ADDRESS", SocketAddr::from(([0, 0, 0, 0], 5000)))?,
            scheduler,
            games_count: envvar_or("GAMES_COUNT", 10)?,
        })
    }
}

/// Get an env var.
pub fn envvar(name: &str) -> Result<String, LtError> {
    std::env::var(name).map_err(|e| LtError::Config(format!("`{}`: {}", name, e)))
}

/// Get and parse an env var, or `default` if unset.
pub fn envvar_or<T>(name: &str, default: T) -> Result<T, LtError>
where
    T: FromStr + Display,
    T::Err: Display,
{
    match std::env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|e| LtError::Config(format!("`{}` = {:?}: {}", name, value, e))),
        Err(std::env::VarError::NotPresent) => {
            log::info!("`{}` not set, using default: {}", name, default);
            Ok(default)
        }
        Err(e) => Err(LtError::Config(format!("`{}`: {}", name, e))),
    }
}

/// Get an env secret.
pub fn secret(name: &str) -> Result<SecretString, LtError> {
    envvar(name).map(SecretString::new)
}

/// Application state shared with every request handler.
pub struct AppStateOwned<S, A> {
    /// Owns the store and Riot API.
    pub scheduler: Scheduler<S, A>,
    /// Matches shown by the games view.
    pub games_count: u32,
}
/// Leaked for the life of the process.
pub type AppState<S, A> = &'static AppStateOwned<S, A>;

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_envvar_or() {
        std::env::set_var("LT_TEST_ROUTE", "NOT_A_ROUTE");
        assert!(envvar_or("LT_TEST_ROUTE", PlatformRoute::NA1).is_err());
        std::env::set_var("LT_TEST_ROUTE", "EUW1");
        assert_eq!(
            PlatformRoute::EUW1,
            envvar_or("LT_TEST_ROUTE", PlatformRoute::NA1).unwrap()
        );
        std::env::remove_var("LT_TEST_ROUTE");
        assert_eq!(
            PlatformRoute::NA1,
            envvar_or("LT_TEST_ROUTE", PlatformRoute::NA1).unwrap()
        );

        std::env::set_var("LT_TEST_SECS", "abc");
        assert!(matches!(envvar_or("LT_TEST_SECS", 5_u64), Err(LtError::Config(_))));
        std::env::set_var("LT_TEST_SECS", " 42 ");
        assert_eq!(42, envvar_or("LT_TEST_SECS", 5_u64).unwrap());
    }

    #[test]
    fn test_secret_missing() {
        assert!(matches!(
            secret("LT_TEST_SURELY_UNSET_SECRET"),
            Err(LtError::Config(_))
        ));
    }
}
