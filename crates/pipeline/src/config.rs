use std::str::FromStr;
use std::time::Duration;

/// Read `name` from the environment, falling back to `default`.
///
/// Panics when the variable is set but does not parse; misconfiguration is
/// fatal at startup.
pub fn env_or<T: FromStr>(name: &str, default: T) -> T {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .unwrap_or_else(|_| panic!("{name} must be a valid {}", std::any::type_name::<T>())),
        Err(_) => default,
    }
}

/// Engine tuning loaded from environment variables.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub completion_timeout_secs: u64,
    pub rank_fetch_timeout_secs: u64,
    /// Hard budget for a whole run, matching the host's invocation limit.
    pub run_max_duration_secs: u64,
    /// Pages (by recent clicks) included in the recommendation prompt.
    pub recommendation_top_pages: usize,
    pub knowledge_max_age_days: i64,
    pub revert_observation_days: i64,
    pub revert_check_interval_secs: u64,
    pub stale_run_sweep_interval_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            completion_timeout_secs: 60,
            rank_fetch_timeout_secs: 30,
            run_max_duration_secs: 840,
            recommendation_top_pages: 20,
            knowledge_max_age_days: autopilot_core::freshness::DEFAULT_MAX_AGE_DAYS,
            revert_observation_days: 14,
            revert_check_interval_secs: 3600,
            stale_run_sweep_interval_secs: 300,
        }
    }
}

impl EngineConfig {
    /// | Env Var                         | Default |
    /// |---------------------------------|---------|
    /// | `COMPLETION_TIMEOUT_SECS`       | `60`    |
    /// | `RANK_FETCH_TIMEOUT_SECS`       | `30`    |
    /// | `RUN_MAX_DURATION_SECS`         | `840`   |
    /// | `RECOMMENDATION_TOP_PAGES`      | `20`    |
    /// | `KNOWLEDGE_MAX_AGE_DAYS`        | `7`     |
    /// | `REVERT_OBSERVATION_DAYS`       | `14`    |
    /// | `REVERT_CHECK_INTERVAL_SECS`    | `3600`  |
    /// | `STALE_RUN_SWEEP_INTERVAL_SECS` | `300`   |
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            completion_timeout_secs: env_or("COMPLETION_TIMEOUT_SECS", d.completion_timeout_secs),
            rank_fetch_timeout_secs: env_or("RANK_FETCH_TIMEOUT_SECS", d.rank_fetch_timeout_secs),
            run_max_duration_secs: env_or("RUN_MAX_DURATION_SECS", d.run_max_duration_secs),
            recommendation_top_pages: env_or("RECOMMENDATION_TOP_PAGES", d.recommendation_top_pages),
            knowledge_max_age_days: env_or("KNOWLEDGE_MAX_AGE_DAYS", d.knowledge_max_age_days),
            revert_observation_days: env_or("REVERT_OBSERVATION_DAYS", d.revert_observation_days),
            revert_check_interval_secs: env_or(
                "REVERT_CHECK_INTERVAL_SECS",
                d.revert_check_interval_secs,
            ),
            stale_run_sweep_interval_secs: env_or(
                "STALE_RUN_SWEEP_INTERVAL_SECS",
                d.stale_run_sweep_interval_secs,
            ),
        }
    }

    pub fn completion_timeout(&self) -> Duration {
        Duration::from_secs(self.completion_timeout_secs)
    }

    pub fn rank_fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.rank_fetch_timeout_secs)
    }

    pub fn run_max_duration(&self) -> Duration {
        Duration::from_secs(self.run_max_duration_secs)
    }
}

/// Connection settings for the completion service (OpenAI-compatible API).
#[derive(Debug, Clone)]
pub struct CompletionConfig {
    /// Base URL, e.g. `https://api.openai.com/v1`.
    pub endpoint: String,
    pub api_key: Option<String>,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434/v1".to_string(),
            api_key: None,
            model: "gpt-4o-mini".to_string(),
            max_tokens: 4096,
            temperature: 0.2,
        }
    }
}

impl CompletionConfig {
    /// Reads `COMPLETION_ENDPOINT`, `COMPLETION_API_KEY`, `COMPLETION_MODEL`,
    /// `COMPLETION_MAX_TOKENS` and `COMPLETION_TEMPERATURE`.
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            endpoint: std::env::var("COMPLETION_ENDPOINT")
                .map(|e| e.trim_end_matches('/').to_string())
                .unwrap_or(d.endpoint),
            api_key: std::env::var("COMPLETION_API_KEY").ok().filter(|k| !k.is_empty()),
            model: std::env::var("COMPLETION_MODEL").unwrap_or(d.model),
            max_tokens: env_or("COMPLETION_MAX_TOKENS", d.max_tokens),
            temperature: env_or("COMPLETION_TEMPERATURE", d.temperature),
        }
    }
}

/// Where keyword positions come from. Ranking is skipped when unset.
#[derive(Debug, Clone, Default)]
pub struct RankSourceConfig {
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
}

impl RankSourceConfig {
    /// Reads `RANK_FETCH_ENDPOINT` and `RANK_FETCH_API_KEY`.
    pub fn from_env() -> Self {
        Self {
            endpoint: std::env::var("RANK_FETCH_ENDPOINT").ok().filter(|e| !e.is_empty()),
            api_key: std::env::var("RANK_FETCH_API_KEY").ok().filter(|k| !k.is_empty()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let c = EngineConfig::default();
        assert_eq!(c.completion_timeout(), Duration::from_secs(60));
        assert_eq!(c.rank_fetch_timeout(), Duration::from_secs(30));
        assert_eq!(c.run_max_duration(), Duration::from_secs(840));
        assert_eq!(c.knowledge_max_age_days, 7);
        assert_eq!(c.revert_observation_days, 14);
    }
}
