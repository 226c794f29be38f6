//! Application configuration
//!
//! Centralized configuration management with environment variable support
//! and sensible defaults. This is the only place that reads process state;
//! everything below it receives explicit values.

use crate::generation::provider::{MissingApiKey, ProviderConfig};
use crate::generation::retry::RetryPolicy;
use crate::orchestrator::config::{
    EmptyPlanPolicy, ExecutionMode, InvalidConfig, OrchestratorConfig, PlanFormat,
};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

/// Configuration could not be assembled
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// No provider credential found
    #[error(transparent)]
    MissingApiKey(#[from] MissingApiKey),

    /// A variable holds an unusable value
    #[error("Invalid value for {name}: {value:?}")]
    InvalidValue {
        /// Variable name
        name: String,
        /// Offending value
        value: String,
    },

    /// The assembled orchestrator configuration failed validation
    #[error(transparent)]
    Orchestrator(#[from] InvalidConfig),
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,
    /// Generation provider
    pub provider: ProviderConfig,
    /// Retries applied around the provider
    pub retry: RetryPolicy,
    /// Orchestrator settings
    pub orchestrator: OrchestratorConfig,
    /// Directory for persisted run traces, if any
    pub trace_dir: Option<PathBuf>,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to bind the server to
    pub port: u16,
    /// Host address to bind to
    pub host: String,
}

impl Config {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through `lookup` (variable name -> value)
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let timeout_secs = parse_or(&lookup, "LLM_TIMEOUT_SECS", 30u64)?;
        let provider = ProviderConfig::detect(&lookup, timeout_secs)?;

        let retry = RetryPolicy {
            max_retries: parse_or(&lookup, "LLM_MAX_RETRIES", 2u32)?,
            ..RetryPolicy::default()
        };

        let defaults = OrchestratorConfig::default();
        let orchestrator = OrchestratorConfig {
            execution_mode: parse_with(&lookup, "EXECUTION_MODE", defaults.execution_mode, |v| {
                match v {
                    "sequential" => Some(ExecutionMode::Sequential),
                    "concurrent" => Some(ExecutionMode::Concurrent),
                    _ => None,
                }
            })?,
            max_parallel_steps: parse_or(&lookup, "MAX_PARALLEL_STEPS", defaults.max_parallel_steps)?,
            plan_format: parse_with(&lookup, "PLAN_FORMAT", defaults.plan_format, |v| match v {
                "numbered_list" => Some(PlanFormat::NumberedList),
                "json" => Some(PlanFormat::Json),
                _ => None,
            })?,
            empty_plan_policy: parse_with(
                &lookup,
                "EMPTY_PLAN_POLICY",
                defaults.empty_plan_policy,
                |v| match v {
                    "synthesize" => Some(EmptyPlanPolicy::Synthesize),
                    "fail" => Some(EmptyPlanPolicy::Fail),
                    _ => None,
                },
            )?,
            ..defaults
        };
        orchestrator.validate()?;

        Ok(Self {
            server: ServerConfig {
                port: parse_or(&lookup, "PORT", 8080u16)?,
                host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            },
            provider,
            retry,
            orchestrator,
            trace_dir: lookup("TRACE_DIR")
                .filter(|d| !d.trim().is_empty())
                .map(PathBuf::from),
        })
    }

    /// Get the server address as a string
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

fn parse_or<F, T>(lookup: &F, name: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    parse_with(lookup, name, default, |v| v.parse().ok())
}

fn parse_with<F, T>(
    lookup: &F,
    name: &str,
    default: T,
    parse: impl Fn(&str) -> Option<T>,
) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => Ok(default),
        Some(raw) => {
            let value = raw.trim();
            if value.is_empty() {
                return Ok(default);
            }
            parse(&value.to_ascii_lowercase()).ok_or_else(|| ConfigError::InvalidValue {
                name: name.to_string(),
                value: raw.clone(),
            })
        }
    }
}
