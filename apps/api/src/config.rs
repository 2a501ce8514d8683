use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::classification::pipeline::DEFAULT_MAX_INPUT_BYTES;
use crate::classification::selector::SelectionPolicy;

/// Application configuration loaded from environment variables.
/// Every variable is optional; malformed values fail startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub rust_log: String,
    pub template_root: PathBuf,
    /// JSON catalog override; the built-in catalog is used when unset.
    pub catalog_path: Option<PathBuf>,
    /// Enables the AI role hint when set.
    pub anthropic_api_key: Option<String>,
    pub ai_timeout: Duration,
    pub max_jd_bytes: usize,
    pub breakdown_threshold: f64,
    pub alignment_min_fraction: f64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            port: parse_or("PORT", optional_env("PORT"), 8080)?,
            rust_log: optional_env("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            template_root: optional_env("TEMPLATE_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./templates")),
            catalog_path: optional_env("ROLE_CATALOG_PATH").map(PathBuf::from),
            anthropic_api_key: optional_env("ANTHROPIC_API_KEY"),
            ai_timeout: Duration::from_secs(parse_or(
                "AI_TIMEOUT_SECS",
                optional_env("AI_TIMEOUT_SECS"),
                5,
            )?),
            max_jd_bytes: parse_or(
                "MAX_JD_BYTES",
                optional_env("MAX_JD_BYTES"),
                DEFAULT_MAX_INPUT_BYTES,
            )?,
            breakdown_threshold: parse_or(
                "BREAKDOWN_THRESHOLD",
                optional_env("BREAKDOWN_THRESHOLD"),
                5.0,
            )?,
            alignment_min_fraction: parse_or(
                "ALIGNMENT_MIN_FRACTION",
                optional_env("ALIGNMENT_MIN_FRACTION"),
                0.10,
            )?,
        })
    }

    /// Selection policy with the configurable thresholds applied.
    pub fn selection_policy(&self) -> SelectionPolicy {
        SelectionPolicy {
            breakdown_threshold: self.breakdown_threshold,
            alignment_min_fraction: self.alignment_min_fraction,
            ..SelectionPolicy::default()
        }
    }
}

/// Unset and blank variables are treated the same.
fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_or<T>(key: &str, raw: Option<String>, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match raw {
        Some(value) => value
            .trim()
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has invalid value '{value}'")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_or_uses_default_when_unset() {
        assert_eq!(parse_or::<u16>("PORT", None, 8080).unwrap(), 8080);
    }

    #[test]
    fn test_parse_or_parses_value() {
        assert_eq!(parse_or::<u64>("AI_TIMEOUT_SECS", Some(" 12 ".into()), 5).unwrap(), 12);
        assert_eq!(
            parse_or::<f64>("BREAKDOWN_THRESHOLD", Some("7.5".into()), 5.0).unwrap(),
            7.5
        );
    }

    #[test]
    fn test_parse_or_rejects_garbage() {
        let err = parse_or::<u16>("PORT", Some("eighty".into()), 8080).unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }

    #[test]
    fn test_selection_policy_applies_thresholds() {
        let config = Config {
            port: 8080,
            rust_log: "info".to_string(),
            template_root: PathBuf::from("templates"),
            catalog_path: None,
            anthropic_api_key: None,
            ai_timeout: Duration::from_secs(5),
            max_jd_bytes: DEFAULT_MAX_INPUT_BYTES,
            breakdown_threshold: 12.0,
            alignment_min_fraction: 0.25,
        };
        let policy = config.selection_policy();
        assert_eq!(policy.breakdown_threshold, 12.0);
        assert_eq!(policy.alignment_min_fraction, 0.25);
        assert_eq!(policy.guard_threshold, 50.0);
    }
}
