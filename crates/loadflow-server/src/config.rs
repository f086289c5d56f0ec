use std::env;
use std::time::Duration;

use loadflow_core::orchestration::{
    DEFAULT_MAX_RUNNING_TASKS, DEFAULT_RETENTION, TaskManagerConfig,
};
use serde::Serialize;

pub const HOST_KEY: &str = "LOADFLOW_HOST";
pub const PORT_KEY: &str = "LOADFLOW_PORT";
pub const MAX_RUNNING_TASKS_KEY: &str = "LOADFLOW_MAX_RUNNING_TASKS";
pub const TASK_RETENTION_SECS_KEY: &str = "LOADFLOW_TASK_RETENTION_SECS";
pub const SWEEP_INTERVAL_SECS_KEY: &str = "LOADFLOW_SWEEP_INTERVAL_SECS";

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_running_tasks: usize,
    pub task_retention_secs: u64,
    /// Zero disables the periodic sweep.
    pub sweep_interval_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            max_running_tasks: DEFAULT_MAX_RUNNING_TASKS,
            task_retention_secs: DEFAULT_RETENTION.as_secs(),
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
        }
    }
}

impl ServerConfig {
    /// Build config from environment variables (call `load_dotenv()` first).
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup. Missing, empty or
    /// unparseable values keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let value = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();
        Self {
            host: value(HOST_KEY).unwrap_or(defaults.host),
            port: parse_or(value(PORT_KEY), defaults.port),
            max_running_tasks: parse_or(value(MAX_RUNNING_TASKS_KEY), defaults.max_running_tasks),
            task_retention_secs: parse_or(
                value(TASK_RETENTION_SECS_KEY),
                defaults.task_retention_secs,
            ),
            sweep_interval_secs: parse_or(
                value(SWEEP_INTERVAL_SECS_KEY),
                defaults.sweep_interval_secs,
            ),
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn task_manager_config(&self) -> TaskManagerConfig {
        TaskManagerConfig {
            max_running_tasks: self.max_running_tasks,
            retention: Duration::from_secs(self.task_retention_secs),
        }
    }

    pub fn sweep_interval(&self) -> Option<Duration> {
        (self.sweep_interval_secs > 0).then(|| Duration::from_secs(self.sweep_interval_secs))
    }
}

fn parse_or<T: std::str::FromStr>(value: Option<String>, default: T) -> T {
    value.and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> ServerConfig {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_without_environment() {
        let config = config_from(&[]);
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.bind_addr(), "0.0.0.0:8080");
        assert_eq!(config.task_manager_config().max_running_tasks, 100);
        assert_eq!(
            config.task_manager_config().retention,
            Duration::from_secs(600)
        );
        assert_eq!(config.sweep_interval(), Some(Duration::from_secs(60)));
    }

    #[test]
    fn environment_overrides_defaults() {
        let config = config_from(&[
            (HOST_KEY, "127.0.0.1"),
            (PORT_KEY, "9000"),
            (MAX_RUNNING_TASKS_KEY, "4"),
            (TASK_RETENTION_SECS_KEY, "30"),
            (SWEEP_INTERVAL_SECS_KEY, "0"),
        ]);
        assert_eq!(config.bind_addr(), "127.0.0.1:9000");
        assert_eq!(config.task_manager_config().max_running_tasks, 4);
        assert_eq!(
            config.task_manager_config().retention,
            Duration::from_secs(30)
        );
        assert_eq!(config.sweep_interval(), None);
    }

    #[test]
    fn unparseable_or_empty_values_fall_back() {
        let config = config_from(&[
            (HOST_KEY, "  "),
            (PORT_KEY, "eighty"),
            (MAX_RUNNING_TASKS_KEY, "-1"),
        ]);
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8080);
        assert_eq!(config.max_running_tasks, 100);
    }
}
