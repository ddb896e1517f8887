//! Runtime configuration from the environment

use crate::error::AdvisorError;
use crate::prompt::CompoundPolicy;
use crate::providers::upstage::{DEFAULT_BASE_URL, DEFAULT_CHAT_MODEL};
use crate::Result;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Knobs of the generation controller
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Upper bound on generation invocations in the gated loop
    pub max_retries: u32,
    pub provider_timeout: Duration,
    pub compound_policy: CompoundPolicy,
    pub structured_recommendations: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            provider_timeout: Duration::from_secs(30),
            compound_policy: CompoundPolicy::Automatic,
            structured_recommendations: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AdvisorConfig {
    pub upstage_api_key: Option<String>,
    pub upstage_base_url: String,
    pub chat_model: String,
    pub top_k: usize,
    pub controller: ControllerConfig,
    pub corpus_dir: Option<PathBuf>,
    pub retrieval_api_base_url: Option<String>,
    pub database_url: Option<String>,
    pub ledger_path: Option<PathBuf>,
    pub port: u16,
}

impl AdvisorConfig {
    /// Load `.env` if present, then read the environment
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let compound_policy = match get("ADVISOR_COMPOUND_POLICY") {
            Some(raw) => CompoundPolicy::parse(&raw).ok_or_else(|| {
                AdvisorError::Config(format!("ADVISOR_COMPOUND_POLICY: unknown policy '{}'", raw))
            })?,
            None => CompoundPolicy::Automatic,
        };

        let controller = ControllerConfig {
            max_retries: parse_or(get("ADVISOR_MAX_RETRIES"), "ADVISOR_MAX_RETRIES", 3)?,
            provider_timeout: Duration::from_secs(parse_or(
                get("ADVISOR_PROVIDER_TIMEOUT_SECS"),
                "ADVISOR_PROVIDER_TIMEOUT_SECS",
                30,
            )?),
            compound_policy,
            structured_recommendations: parse_bool(
                get("ADVISOR_STRUCTURED_RECOMMENDATIONS"),
                "ADVISOR_STRUCTURED_RECOMMENDATIONS",
            )?,
        };

        let port_raw = get("PORT").or_else(|| get("API_PORT"));

        Ok(Self {
            upstage_api_key: get("UPSTAGE_API_KEY"),
            upstage_base_url: get("UPSTAGE_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            chat_model: get("UPSTAGE_CHAT_MODEL").unwrap_or_else(|| DEFAULT_CHAT_MODEL.to_string()),
            top_k: parse_or(get("ADVISOR_TOP_K"), "ADVISOR_TOP_K", 1)?,
            controller,
            corpus_dir: get("ADVISOR_CORPUS_DIR").map(PathBuf::from),
            retrieval_api_base_url: get("RETRIEVAL_API_BASE_URL"),
            database_url: get("POSTGRES_URL").or_else(|| get("DATABASE_URL")),
            ledger_path: get("ADVISOR_LEDGER_PATH").map(PathBuf::from),
            port: parse_or(port_raw, "PORT", 8080)?,
        })
    }
}

fn parse_or<T: FromStr>(raw: Option<String>, key: &str, default: T) -> Result<T> {
    match raw {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| AdvisorError::Config(format!("{}: invalid value '{}'", key, value))),
        None => Ok(default),
    }
}

fn parse_bool(raw: Option<String>, key: &str) -> Result<bool> {
    match raw.as_deref().map(|v| v.trim().to_lowercase()) {
        None => Ok(false),
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => Ok(true),
        Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => Ok(false),
        Some(v) => Err(AdvisorError::Config(format!("{}: invalid flag '{}'", key, v))),
    }
}
