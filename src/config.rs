// src/config.rs
use std::str::FromStr;
use std::time::Duration;

use crate::errors::{QuizError, Result};

pub const DEFAULT_OLLAMA_API_BASE: &str = "http://localhost:11434";
pub const DEFAULT_MODEL: &str = "gemma3:1b";
/// Slightly higher than usual to get more variety between snippets.
pub const DEFAULT_TEMPERATURE: f32 = 0.75;
pub const MAX_ROUNDS: u32 = 5;
pub const EXECUTION_TIMEOUT_MS: u64 = 1000;
pub const MAX_ATTEMPTS: u32 = 10;
pub const RETRY_DELAY_MS: u64 = 1500;
pub const ROUND_DELAY_MS: u64 = 2500;

/// Configuration for the Ollama provider.
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    pub api_base: String,
}

/// High-level application configuration. Every field has a compiled-in
/// default that can be overridden from the environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub ollama: OllamaConfig,
    pub model: String,
    pub temperature: f32,
    pub max_rounds: u32,
    pub execution_timeout_ms: u64,
    /// Consecutive failed attempts allowed before giving up; 0 retries forever.
    pub max_attempts: u32,
    pub retry_delay_ms: u64,
    pub round_delay_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            ollama: OllamaConfig {
                api_base: DEFAULT_OLLAMA_API_BASE.to_string(),
            },
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_rounds: MAX_ROUNDS,
            execution_timeout_ms: EXECUTION_TIMEOUT_MS,
            max_attempts: MAX_ATTEMPTS,
            retry_delay_ms: RETRY_DELAY_MS,
            round_delay_ms: ROUND_DELAY_MS,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup, falling back to
    /// the defaults for missing keys.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let api_base = lookup("OLLAMA_API_BASE")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or(defaults.ollama.api_base);
        let model = lookup("OLLAMA_MODEL")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or(defaults.model);

        let config = AppConfig {
            ollama: OllamaConfig { api_base },
            model,
            temperature: parse_var(&lookup, "GUESS_TEMPERATURE", defaults.temperature)?,
            max_rounds: parse_var(&lookup, "GUESS_MAX_ROUNDS", defaults.max_rounds)?,
            execution_timeout_ms: parse_var(
                &lookup,
                "GUESS_EXECUTION_TIMEOUT_MS",
                defaults.execution_timeout_ms,
            )?,
            max_attempts: parse_var(&lookup, "GUESS_MAX_ATTEMPTS", defaults.max_attempts)?,
            retry_delay_ms: parse_var(&lookup, "GUESS_RETRY_DELAY_MS", defaults.retry_delay_ms)?,
            round_delay_ms: parse_var(&lookup, "GUESS_ROUND_DELAY_MS", defaults.round_delay_ms)?,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(QuizError::Config(format!(
                "temperature must be between 0 and 2, got {}",
                self.temperature
            )));
        }
        if self.max_rounds == 0 {
            return Err(QuizError::Config(
                "GUESS_MAX_ROUNDS must be at least 1".to_string(),
            ));
        }
        if self.execution_timeout_ms == 0 {
            return Err(QuizError::Config(
                "GUESS_EXECUTION_TIMEOUT_MS must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn execution_timeout(&self) -> Duration {
        Duration::from_millis(self.execution_timeout_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn round_delay(&self) -> Duration {
        Duration::from_millis(self.round_delay_ms)
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| QuizError::Config(format!("invalid value '{}' for {}: {}", raw, key, e))),
        None => Ok(default),
    }
}
