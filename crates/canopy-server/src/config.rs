//! Server configuration loaded from `CANOPY_*` environment variables.
//!
//! Every variable is optional. A value that is present but unparsable is
//! logged and replaced by its default.

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use canopy_compliance::config::{ComplianceConfig, QuotaStatusPolicy};
use canopy_core::models::order::ProductCategory;
use canopy_db::DbConfig;
use chrono::FixedOffset;
use tracing::warn;

/// Settings for the scheduled daily-report job.
#[derive(Debug, Clone)]
pub struct ReportJobConfig {
    pub enabled: bool,
    /// How long after business-day midnight the previous day is reported.
    pub run_after_midnight: Duration,
    /// Attempts per dispensary before the job gives up on it.
    pub max_attempts: u32,
    /// Delay before the first retry; doubled for each further attempt.
    pub retry_backoff: Duration,
}

impl Default for ReportJobConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            run_after_midnight: Duration::from_secs(15 * 60),
            max_attempts: 3,
            retry_backoff: Duration::from_secs(30),
        }
    }
}

/// Top-level server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub db: DbConfig,
    pub compliance: ComplianceConfig,
    pub report_job: ReportJobConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            db: DbConfig::default(),
            compliance: ComplianceConfig::default(),
            report_job: ReportJobConfig::default(),
        }
    }
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(key, value = %raw, "Unparsable configuration value, using default");
            default
        }),
        Err(_) => default,
    }
}

fn env_string(key: &str, default: String) -> String {
    env::var(key).unwrap_or(default)
}

fn env_bool(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => {
                warn!(key, value = %raw, "Unparsable boolean, using default");
                default
            }
        },
        Err(_) => default,
    }
}

fn parse_policy(raw: &str) -> Option<QuotaStatusPolicy> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "count_all" => Some(QuotaStatusPolicy::CountAll),
        "exclude_voided" => Some(QuotaStatusPolicy::ExcludeVoided),
        _ => None,
    }
}

/// Parse `JURISDICTION:category=grams` entries separated by commas,
/// e.g. `US-CO:flower=28,US-CO:concentrate=8`. Malformed entries are
/// skipped with a warning.
pub fn parse_limits(raw: &str) -> Vec<(String, ProductCategory, f64)> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .filter_map(|entry| {
            let parsed = entry.split_once('=').and_then(|(key, grams)| {
                let (jurisdiction, category) = key.split_once(':')?;
                let category = category.parse::<ProductCategory>().ok()?;
                let grams = grams.trim().parse::<f64>().ok()?;
                (grams.is_finite() && grams >= 0.0)
                    .then(|| (jurisdiction.trim().to_string(), category, grams))
            });
            if parsed.is_none() {
                warn!(entry, "Ignoring malformed purchase limit");
            }
            parsed
        })
        .collect()
}

impl ServerConfig {
    /// Build the configuration from the process environment.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let db = DbConfig {
            url: env_string("CANOPY_DB_URL", defaults.db.url),
            namespace: env_string("CANOPY_DB_NAMESPACE", defaults.db.namespace),
            database: env_string("CANOPY_DB_DATABASE", defaults.db.database),
            username: env_string("CANOPY_DB_USERNAME", defaults.db.username),
            password: env_string("CANOPY_DB_PASSWORD", defaults.db.password),
            connect_attempts: env_parse("CANOPY_DB_CONNECT_ATTEMPTS", defaults.db.connect_attempts),
            connect_backoff: Duration::from_secs(env_parse(
                "CANOPY_DB_CONNECT_BACKOFF_SECS",
                defaults.db.connect_backoff.as_secs(),
            )),
        };

        let base = defaults.compliance;
        let quota_status_policy = match env::var("CANOPY_QUOTA_STATUS_POLICY") {
            Ok(raw) => parse_policy(&raw).unwrap_or_else(|| {
                warn!(value = %raw, "Unknown quota status policy, counting all orders");
                base.quota_status_policy
            }),
            Err(_) => base.quota_status_policy,
        };
        let mut compliance = ComplianceConfig {
            default_limit_grams: env_parse("CANOPY_DEFAULT_LIMIT_GRAMS", base.default_limit_grams),
            business_day_offset: env_parse::<FixedOffset>(
                "CANOPY_BUSINESS_DAY_OFFSET",
                base.business_day_offset,
            ),
            quota_status_policy,
            max_chain_retries: env_parse("CANOPY_MAX_CHAIN_RETRIES", base.max_chain_retries),
            verify_page_size: env_parse("CANOPY_VERIFY_PAGE_SIZE", base.verify_page_size),
            ..base
        };
        if let Ok(raw) = env::var("CANOPY_PURCHASE_LIMITS") {
            for (jurisdiction, category, grams) in parse_limits(&raw) {
                compliance = compliance.with_limit(&jurisdiction, category, grams);
            }
        }

        let job = defaults.report_job;
        let report_job = ReportJobConfig {
            enabled: env_bool("CANOPY_REPORT_JOB_ENABLED", job.enabled),
            run_after_midnight: Duration::from_secs(env_parse(
                "CANOPY_REPORT_JOB_DELAY_SECS",
                job.run_after_midnight.as_secs(),
            )),
            max_attempts: env_parse("CANOPY_REPORT_JOB_MAX_ATTEMPTS", job.max_attempts).max(1),
            retry_backoff: Duration::from_secs(env_parse(
                "CANOPY_REPORT_JOB_BACKOFF_SECS",
                job.retry_backoff.as_secs(),
            )),
        };

        Self {
            bind_addr: env_parse("CANOPY_BIND_ADDR", defaults.bind_addr),
            db,
            compliance,
            report_job,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limits_parse_and_skip_garbage() {
        let limits = parse_limits("US-CO:flower=28, US-CA:Concentrate=8,broken,US-WA:seeds=1,US-OR:edible=-2");
        assert_eq!(
            limits,
            vec![
                ("US-CO".to_string(), ProductCategory::Flower, 28.0),
                ("US-CA".to_string(), ProductCategory::Concentrate, 8.0),
            ]
        );
    }

    #[test]
    fn policy_names() {
        assert_eq!(parse_policy("EXCLUDE_VOIDED"), Some(QuotaStatusPolicy::ExcludeVoided));
        assert_eq!(parse_policy("count_all"), Some(QuotaStatusPolicy::CountAll));
        assert_eq!(parse_policy("sometimes"), None);
    }

    #[test]
    fn defaults_are_sane() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(config.compliance.default_limit_grams, 85.0);
        assert!(config.report_job.enabled);
    }
}
