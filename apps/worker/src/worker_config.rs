use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use timebank_core::{AppError, AppResult};
use timebank_domain::AggregateViewDefinition;
use tracing_subscriber::EnvFilter;

/// Views refreshed when `AGGREGATE_VIEWS` is unset.
const DEFAULT_AGGREGATE_VIEWS: &str =
    "mv_user_reputation:concurrent,mv_skill_demand:concurrent,mv_exchange_activity_daily:exclusive";

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub database_url: String,
    pub database_max_connections: u32,
    pub refresh_interval: Duration,
    pub refresh_timeout: Option<Duration>,
    pub views: Vec<AggregateViewDefinition>,
}

impl WorkerConfig {
    pub fn load() -> AppResult<Self> {
        let database_url = required_env("DATABASE_URL")?;
        let database_max_connections = parse_env("DATABASE_MAX_CONNECTIONS", 2_u32)?;
        let refresh_interval = Duration::from_secs(parse_env(
            "AGGREGATE_REFRESH_INTERVAL_SECONDS",
            300_u64,
        )?);
        let refresh_timeout = match parse_env("AGGREGATE_REFRESH_TIMEOUT_SECONDS", 0_u64)? {
            0 => None,
            seconds => Some(Duration::from_secs(seconds)),
        };
        let views = parse_view_list(
            env::var("AGGREGATE_VIEWS")
                .ok()
                .filter(|value| !value.trim().is_empty())
                .as_deref()
                .unwrap_or(DEFAULT_AGGREGATE_VIEWS),
        )?;

        if database_max_connections == 0 {
            return Err(AppError::Validation(
                "DATABASE_MAX_CONNECTIONS must be greater than zero".to_owned(),
            ));
        }

        if refresh_interval.is_zero() {
            return Err(AppError::Validation(
                "AGGREGATE_REFRESH_INTERVAL_SECONDS must be greater than zero".to_owned(),
            ));
        }

        Ok(Self {
            database_url,
            database_max_connections,
            refresh_interval,
            refresh_timeout,
            views,
        })
    }
}

/// Parses `name[:concurrent|exclusive]` entries separated by commas.
///
/// An entry without a mode is attempted concurrently first.
pub fn parse_view_list(raw: &str) -> AppResult<Vec<AggregateViewDefinition>> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(parse_view_entry)
        .collect()
}

fn parse_view_entry(entry: &str) -> AppResult<AggregateViewDefinition> {
    let (name, mode) = match entry.split_once(':') {
        Some((name, mode)) => (name.trim(), mode.trim()),
        None => (entry, "concurrent"),
    };

    let concurrent_refresh_supported = match mode.to_ascii_lowercase().as_str() {
        "concurrent" => true,
        "exclusive" => false,
        other => {
            return Err(AppError::Validation(format!(
                "invalid refresh mode '{other}' for aggregate view '{name}'"
            )));
        }
    };

    AggregateViewDefinition::named(name, concurrent_refresh_supported)
}

pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn required_env(name: &str) -> AppResult<String> {
    env::var(name).map_err(|_| AppError::Validation(format!("{name} is required")))
}

fn parse_env<T>(name: &str, default: T) -> AppResult<T>
where
    T: FromStr,
    T::Err: Display,
{
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => value.trim().parse::<T>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        _ => Ok(default),
    }
}
