//! HTTP server settings. Engine and completion settings live in
//! `autopilot_pipeline::config`.

use autopilot_pipeline::config::env_or;

const DEFAULT_CORS_ORIGIN: &str = "http://localhost:5173";

/// Where the API listens and how it treats requests.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Browser origins allowed to call the API.
    pub cors_origins: Vec<String>,
    /// Budget for a single request, after which it answers 408.
    pub request_timeout_secs: u64,
    /// Grace period for background tasks once the listener has drained.
    pub shutdown_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            cors_origins: vec![DEFAULT_CORS_ORIGIN.to_string()],
            request_timeout_secs: 30,
            shutdown_timeout_secs: 30,
        }
    }
}

impl ServerConfig {
    /// Reads `HOST`, `PORT`, `CORS_ORIGINS` (comma separated),
    /// `REQUEST_TIMEOUT_SECS` and `SHUTDOWN_TIMEOUT_SECS`.
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            host: std::env::var("HOST").unwrap_or(d.host),
            port: env_or("PORT", d.port),
            cors_origins: std::env::var("CORS_ORIGINS")
                .map(|raw| parse_origins(&raw))
                .unwrap_or(d.cors_origins),
            request_timeout_secs: env_or("REQUEST_TIMEOUT_SECS", d.request_timeout_secs),
            shutdown_timeout_secs: env_or("SHUTDOWN_TIMEOUT_SECS", d.shutdown_timeout_secs),
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origins_are_trimmed_and_blank_entries_dropped() {
        assert_eq!(
            parse_origins(" https://app.acme.test , ,http://localhost:5173,"),
            vec!["https://app.acme.test", "http://localhost:5173"]
        );
        assert!(parse_origins("").is_empty());
    }

    #[test]
    fn defaults_listen_on_3000() {
        let c = ServerConfig::default();
        assert_eq!(c.bind_addr(), "0.0.0.0:3000");
        assert_eq!(c.cors_origins, vec![DEFAULT_CORS_ORIGIN]);
    }
}
