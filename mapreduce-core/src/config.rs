use std::collections::HashMap;
use std::env;

use crate::Error;
use crate::Result;

pub(crate) const DEFAULT_WORKERS: usize = 16;
pub(crate) const MIN_WORKERS: usize = 1;

const ENV_WORKERS: &str = "MAPREDUCE_WORKERS";

/// Per-run configuration of the engine. Every run takes its own config, there is no process-wide
/// mutable default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapReduceConfig {
    workers: usize,
}

impl Default for MapReduceConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
        }
    }
}

impl MapReduceConfig {
    /// Caps the number of concurrent mapper invocations. Values below one are clamped to one.
    pub fn with_workers(mut self, workers: i64) -> Self {
        self.workers = usize::try_from(workers)
            .unwrap_or(MIN_WORKERS)
            .max(MIN_WORKERS);
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Loads the config from the process environment, see [MapReduceConfig::try_from].
    pub fn from_env() -> Result<Self> {
        let vars: HashMap<String, String> = env::vars().collect();
        vars.try_into()
    }
}

impl TryFrom<HashMap<String, String>> for MapReduceConfig {
    type Error = Error;

    fn try_from(env_vars: HashMap<String, String>) -> Result<Self> {
        let mut config = MapReduceConfig::default();

        if let Some(workers) = env_vars.get(ENV_WORKERS) {
            let workers: i64 = workers.trim().parse().map_err(|e| {
                Error::Config(format!("Parsing {ENV_WORKERS}(set to '{workers}'): {e:?}"))
            })?;
            config = config.with_workers(workers);
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MapReduceConfig::default();
        assert_eq!(config.workers(), 16);
    }

    #[test]
    fn test_workers_are_clamped() {
        assert_eq!(MapReduceConfig::default().with_workers(0).workers(), 1);
        assert_eq!(MapReduceConfig::default().with_workers(-7).workers(), 1);
        assert_eq!(MapReduceConfig::default().with_workers(1).workers(), 1);
        assert_eq!(MapReduceConfig::default().with_workers(42).workers(), 42);
    }

    #[test]
    fn test_config_from_env_map() {
        let vars: HashMap<String, String> = [(ENV_WORKERS.to_string(), "4".to_string())]
            .into_iter()
            .collect();
        let config: MapReduceConfig = vars.try_into().unwrap();
        assert_eq!(config.workers(), 4);

        let config: MapReduceConfig = HashMap::new().try_into().unwrap();
        assert_eq!(config, MapReduceConfig::default());
    }

    #[test]
    fn test_config_from_env_map_invalid() {
        let vars: HashMap<String, String> = [(ENV_WORKERS.to_string(), "many".to_string())]
            .into_iter()
            .collect();
        let result: Result<MapReduceConfig> = vars.try_into();
        assert!(matches!(result, Err(Error::Config(_))));

        let vars: HashMap<String, String> = [(ENV_WORKERS.to_string(), "-3".to_string())]
            .into_iter()
            .collect();
        let config: MapReduceConfig = vars.try_into().unwrap();
        assert_eq!(config.workers(), 1);
    }
}
