//! Solver configuration loaded from TOML.
//!
//! Every key is optional. Values given on the command line take precedence over the
//! file, and anything left unset falls back to the library defaults.
//!
//! ```
//! use weighted_sokoban::config::SolverConfig;
//! use weighted_sokoban::solver::Strategy;
//! use std::time::Duration;
//!
//! let config = SolverConfig::from_toml_str(r#"
//!     strategy = "astar"
//!     prune_deadlocks = false
//!
//!     [limits]
//!     max_expansions = 500000
//!     time_limit_ms = 2000
//! "#).unwrap();
//!
//! assert_eq!(config.strategy, Some(Strategy::AStar));
//! assert_eq!(config.search_limits().time_limit, Some(Duration::from_secs(2)));
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::solver::{SearchLimits, Strategy};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct SolverConfig {
    pub strategy: Option<Strategy>,

    /// Overrides the strategy's default deadlock pruning.
    pub prune_deadlocks: Option<bool>,

    pub limits: LimitsConfig,
}

/// Search budgets. Unset means unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct LimitsConfig {
    pub max_expansions: Option<u64>,
    pub time_limit_ms: Option<u64>,
}

impl SolverConfig {
    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or contains invalid TOML.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Parses configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    pub fn with_max_expansions(mut self, max_expansions: u64) -> Self {
        self.limits.max_expansions = Some(max_expansions);
        self
    }

    pub fn with_time_limit_ms(mut self, millis: u64) -> Self {
        self.limits.time_limit_ms = Some(millis);
        self
    }

    /// The configured strategy, or uniform-cost search.
    pub fn strategy(&self) -> Strategy {
        self.strategy.unwrap_or(Strategy::Ucs)
    }

    pub fn search_limits(&self) -> SearchLimits {
        SearchLimits {
            max_expansions: self.limits.max_expansions,
            time_limit: self.limits.time_limit_ms.map(Duration::from_millis),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = SolverConfig::from_toml_str("").unwrap();
        assert_eq!(config, SolverConfig::default());
        assert_eq!(config.strategy(), Strategy::Ucs);
        assert_eq!(config.prune_deadlocks, None);
        assert_eq!(config.search_limits(), SearchLimits::default());
    }

    #[test]
    fn test_full_config() {
        let config = SolverConfig::from_toml_str(
            r#"
            strategy = "bfs"
            prune_deadlocks = true

            [limits]
            max_expansions = 1000
            time_limit_ms = 250
            "#,
        )
        .unwrap();
        assert_eq!(config.strategy(), Strategy::Bfs);
        assert_eq!(config.prune_deadlocks, Some(true));
        assert_eq!(
            config.search_limits(),
            SearchLimits {
                max_expansions: Some(1000),
                time_limit: Some(Duration::from_millis(250)),
            }
        );
    }

    #[test]
    fn test_a_star_alias() {
        let config = SolverConfig::from_toml_str(r#"strategy = "a*""#).unwrap();
        assert_eq!(config.strategy(), Strategy::AStar);
    }

    #[test]
    fn test_rejects_unknown_strategy_and_keys() {
        assert!(matches!(
            SolverConfig::from_toml_str(r#"strategy = "ida""#),
            Err(ConfigError::Toml(_))
        ));
        assert!(matches!(
            SolverConfig::from_toml_str("depth = 3"),
            Err(ConfigError::Toml(_))
        ));
        assert!(matches!(
            SolverConfig::from_toml_str("[limits]\nnodes = 3"),
            Err(ConfigError::Toml(_))
        ));
    }

    #[test]
    fn test_builder_overrides() {
        let config = SolverConfig::from_toml_str("strategy = \"dfs\"\n[limits]\nmax_expansions = 5")
            .unwrap()
            .with_strategy(Strategy::Gbfs)
            .with_max_expansions(10)
            .with_time_limit_ms(1);
        assert_eq!(config.strategy(), Strategy::Gbfs);
        assert_eq!(config.limits.max_expansions, Some(10));
        assert_eq!(config.search_limits().time_limit, Some(Duration::from_millis(1)));
    }

    #[test]
    fn test_load_missing_file() {
        let err = SolverConfig::load("/nonexistent/solver.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
