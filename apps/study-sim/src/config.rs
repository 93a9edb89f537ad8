//! Simulation settings read from the environment.

use std::path::PathBuf;

use anyhow::Context;
use study_core::StudyConfig;

/// Parameters of one simulated learner.
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Ability the simulated learner actually has.
    pub true_theta: f64,
    pub seed: u64,
    pub pool_size: usize,
    /// Days of review practice after the placement session.
    pub days: u32,
    pub study: StudyConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            true_theta: 0.5,
            seed: 42,
            pool_size: 120,
            days: 30,
            study: StudyConfig::default(),
        }
    }
}

impl SimConfig {
    /// Load from environment variables.
    ///
    /// Optional env vars:
    /// - STUDY_CONFIG: Path to a JSON `StudyConfig`
    /// - SIM_TRUE_THETA: Learner's true ability (default 0.5)
    /// - SIM_SEED: RNG seed (default 42)
    /// - SIM_POOL_SIZE: Number of generated questions (default 120)
    /// - SIM_DAYS: Days of review to simulate (default 30)
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`SimConfig::from_env`] with an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let study = match lookup("STUDY_CONFIG") {
            Some(path) => {
                let path = PathBuf::from(path);
                let json = std::fs::read_to_string(&path)
                    .with_context(|| format!("reading {}", path.display()))?;
                StudyConfig::from_json_str(&json)
                    .with_context(|| format!("loading study config from {}", path.display()))?
            }
            None => defaults.study,
        };

        let config = Self {
            true_theta: parse_or(&lookup, "SIM_TRUE_THETA", defaults.true_theta)?,
            seed: parse_or(&lookup, "SIM_SEED", defaults.seed)?,
            pool_size: parse_or(&lookup, "SIM_POOL_SIZE", defaults.pool_size)?,
            days: parse_or(&lookup, "SIM_DAYS", defaults.days)?,
            study,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            (-4.0..=4.0).contains(&self.true_theta),
            "SIM_TRUE_THETA {} outside [-4, 4]",
            self.true_theta
        );
        anyhow::ensure!(self.pool_size > 0, "SIM_POOL_SIZE must be positive");
        Ok(())
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} has invalid value '{}'", key, raw)),
        None => Ok(default),
    }
}
