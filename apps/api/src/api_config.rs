use std::env;
use std::fmt::Display;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use timebank_application::{
    AdmissionGateConfig, BruteForcePolicy, ConnectionPolicy, HealthThresholds, RequestRatePolicy,
    TelemetryPolicy,
};
use timebank_core::AppError;
use timebank_domain::AlertSeverity;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub migrate_only: bool,
    pub database_url: String,
    pub database_max_connections: u32,
    pub api_host: String,
    pub api_port: u16,
    pub admission: AdmissionGateConfig,
    pub health: HealthThresholds,
    pub telemetry: TelemetryPolicy,
    pub trust_forwarded_for: bool,
}

impl ApiConfig {
    pub fn load() -> Result<Self, AppError> {
        let migrate_only = env::args().nth(1).as_deref() == Some("migrate");

        let database_url = required_env("DATABASE_URL")?;
        let database_max_connections = parse_env("DATABASE_MAX_CONNECTIONS", 10_u32)?;
        let api_host = env::var("API_HOST").unwrap_or_else(|_| "127.0.0.1".to_owned());
        let api_port = parse_env("API_PORT", 3001_u16)?;

        let defaults = AdmissionGateConfig::default();
        let admission = AdmissionGateConfig {
            brute_force: BruteForcePolicy {
                max_failures: parse_env(
                    "ADMISSION_MAX_LOGIN_FAILURES",
                    defaults.brute_force.max_failures,
                )?,
                window: parse_env_seconds(
                    "ADMISSION_LOGIN_BLOCK_SECONDS",
                    defaults.brute_force.window,
                )?,
            },
            connections: ConnectionPolicy {
                max_connections_per_key: parse_env(
                    "ADMISSION_MAX_CONNECTIONS_PER_USER",
                    defaults.connections.max_connections_per_key,
                )?,
            },
            request_rate: RequestRatePolicy {
                max_requests: parse_env(
                    "ADMISSION_MAX_REQUESTS_PER_WINDOW",
                    defaults.request_rate.max_requests,
                )?,
                window: parse_env_seconds(
                    "ADMISSION_REQUEST_WINDOW_SECONDS",
                    defaults.request_rate.window,
                )?,
            },
            sweep_interval: parse_env_seconds(
                "ADMISSION_SWEEP_INTERVAL_SECONDS",
                defaults.sweep_interval,
            )?,
        };
        admission.validate()?;
        let trust_forwarded_for = parse_env("ADMISSION_TRUST_FORWARDED_FOR", false)?;

        let health_defaults = HealthThresholds::default();
        let health = HealthThresholds {
            readiness_max_errors_per_minute: parse_env(
                "HEALTH_READINESS_MAX_ERRORS_PER_MINUTE",
                health_defaults.readiness_max_errors_per_minute,
            )?,
            health_max_errors_per_minute: parse_env(
                "HEALTH_MAX_ERRORS_PER_MINUTE",
                health_defaults.health_max_errors_per_minute,
            )?,
        };
        health.validate()?;

        let telemetry_defaults = TelemetryPolicy::default();
        let telemetry = TelemetryPolicy {
            slow_request_threshold: Duration::from_millis(parse_env(
                "SLOW_REQUEST_THRESHOLD_MS",
                u64::try_from(telemetry_defaults.slow_request_threshold.as_millis())
                    .unwrap_or(u64::MAX),
            )?),
            alert_min_severity: parse_env::<AlertSeverity>(
                "ALERT_MIN_SEVERITY",
                telemetry_defaults.alert_min_severity,
            )?,
        };
        telemetry.validate()?;

        Ok(Self {
            migrate_only,
            database_url,
            database_max_connections,
            api_host,
            api_port,
            admission,
            health,
            telemetry,
            trust_forwarded_for,
        })
    }

    pub fn socket_address(&self) -> Result<SocketAddr, AppError> {
        let host = IpAddr::from_str(&self.api_host).map_err(|error| {
            AppError::Internal(format!("invalid API_HOST '{}': {error}", self.api_host))
        })?;
        Ok(SocketAddr::from((host, self.api_port)))
    }
}

pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn required_env(name: &str) -> Result<String, AppError> {
    env::var(name).map_err(|_| AppError::Validation(format!("{name} is required")))
}

fn parse_env<T>(name: &str, default: T) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: Display,
{
    parse_optional(name, env::var(name).ok(), default)
}

fn parse_env_seconds(name: &str, default: Duration) -> Result<Duration, AppError> {
    parse_env(name, default.as_secs()).map(Duration::from_secs)
}

fn parse_optional<T>(name: &str, raw: Option<String>, default: T) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: Display,
{
    match raw {
        Some(value) if !value.trim().is_empty() => value.trim().parse::<T>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use timebank_core::AppError;
    use timebank_domain::AlertSeverity;

    use super::parse_optional;

    #[test]
    fn missing_or_blank_values_fall_back_to_default() {
        assert_eq!(parse_optional("API_PORT", None, 3001_u16).ok(), Some(3001));
        assert_eq!(
            parse_optional("API_PORT", Some("  ".to_owned()), 3001_u16).ok(),
            Some(3001)
        );
    }

    #[test]
    fn values_are_trimmed_and_parsed() {
        assert_eq!(
            parse_optional("ADMISSION_MAX_LOGIN_FAILURES", Some(" 7 ".to_owned()), 5_u32).ok(),
            Some(7)
        );
        assert_eq!(
            parse_optional(
                "ALERT_MIN_SEVERITY",
                Some("Critical".to_owned()),
                AlertSeverity::Medium
            )
            .ok(),
            Some(AlertSeverity::Critical)
        );
    }

    #[test]
    fn forwarded_for_trust_is_opt_in() {
        assert_eq!(
            parse_optional("ADMISSION_TRUST_FORWARDED_FOR", None, false).ok(),
            Some(false)
        );
        assert_eq!(
            parse_optional(
                "ADMISSION_TRUST_FORWARDED_FOR",
                Some("true".to_owned()),
                false
            )
            .ok(),
            Some(true)
        );
        assert!(
            parse_optional("ADMISSION_TRUST_FORWARDED_FOR", Some("yes".to_owned()), false)
                .is_err()
        );
    }

    #[test]
    fn invalid_values_name_the_variable() {
        let result = parse_optional("API_PORT", Some("eighty".to_owned()), 3001_u16);

        match result {
            Err(AppError::Validation(message)) => assert!(message.contains("API_PORT")),
            other => panic!("expected validation error, got {other:?}"),
        }
    }
}
