//! Key=value configuration files.
//!
//! A config file holds one `key = value` pair per line; blank lines and lines
//! starting with `#` are ignored. Solver keys control the searches, generator
//! keys only the random chain generator (see [`crate::gen`]).

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file `{}`: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("line {line}: expected `key = value`, got `{text}`")]
    Malformed { line: usize, text: String },
    #[error("line {line}: unknown key `{key}`")]
    UnknownKey { line: usize, key: String },
    #[error("line {line}: invalid value `{value}` for `{key}`")]
    InvalidValue {
        line: usize,
        key: String,
        value: String,
    },
    #[error("{0}")]
    Inconsistent(String),
}

/// All recognised knobs with their defaults.
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    /// Wall-clock budget in seconds per optimiser phase (zero disables the
    /// deadline).
    pub time_to_solve: f64,
    /// Processor cap for the schedulers; `0` means "up to the number of
    /// accumulations in the sequence".
    pub usable_threads: usize,
    /// Memory cap gating adjoint-mode operations; `0` disables the gate.
    pub available_memory: usize,
    /// Admits tangent/adjoint eliminations; when `false` every sub-Jacobian
    /// must be accumulated before it can be multiplied.
    pub matrix_free: bool,
    pub min_chain_length: usize,
    pub max_chain_length: usize,
    /// Number of random chains generated per length (batch mode).
    pub chains_per_length: usize,
    pub min_dimension: usize,
    pub max_dimension: usize,
    pub seed: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            time_to_solve: 10.0,
            usable_threads: 0,
            available_memory: 0,
            matrix_free: false,
            min_chain_length: 4,
            max_chain_length: 4,
            chains_per_length: 1,
            min_dimension: 1,
            max_dimension: 8,
            seed: 0,
        }
    }
}

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        for (idx, raw) in text.lines().enumerate() {
            let line = idx + 1;
            let trimmed = raw.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let Some((key, value)) = trimmed.split_once('=') else {
                return Err(ConfigError::Malformed {
                    line,
                    text: trimmed.to_owned(),
                });
            };
            let key = key.trim();
            let value = value.trim();

            match key {
                "time_to_solve" => config.time_to_solve = parse_value(line, key, value)?,
                "usable_threads" => config.usable_threads = parse_value(line, key, value)?,
                "available_memory" => config.available_memory = parse_value(line, key, value)?,
                "matrix_free" => config.matrix_free = parse_bool(line, key, value)?,
                "min_chain_length" => config.min_chain_length = parse_value(line, key, value)?,
                "max_chain_length" => config.max_chain_length = parse_value(line, key, value)?,
                "chains_per_length" => config.chains_per_length = parse_value(line, key, value)?,
                "min_dimension" => config.min_dimension = parse_value(line, key, value)?,
                "max_dimension" => config.max_dimension = parse_value(line, key, value)?,
                "seed" => config.seed = parse_value(line, key, value)?,
                _ => {
                    return Err(ConfigError::UnknownKey {
                        line,
                        key: key.to_owned(),
                    })
                }
            }
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.min_chain_length == 0 {
            return Err(ConfigError::Inconsistent(
                "min_chain_length must be at least 1".into(),
            ));
        }
        if self.min_chain_length > self.max_chain_length {
            return Err(ConfigError::Inconsistent(format!(
                "min_chain_length ({}) exceeds max_chain_length ({})",
                self.min_chain_length, self.max_chain_length
            )));
        }
        if self.min_dimension == 0 {
            return Err(ConfigError::Inconsistent(
                "min_dimension must be at least 1".into(),
            ));
        }
        if self.min_dimension > self.max_dimension {
            return Err(ConfigError::Inconsistent(format!(
                "min_dimension ({}) exceeds max_dimension ({})",
                self.min_dimension, self.max_dimension
            )));
        }
        if self.time_to_solve < 0.0 {
            return Err(ConfigError::Inconsistent(
                "time_to_solve must be non-negative".into(),
            ));
        }
        Ok(())
    }

    /// Per-phase time budget; `None` when the budget is disabled.
    pub fn phase_budget(&self) -> Option<Duration> {
        (self.time_to_solve > 0.0).then(|| Duration::from_secs_f64(self.time_to_solve))
    }
}

fn parse_value<T: std::str::FromStr>(
    line: usize,
    key: &str,
    value: &str,
) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        line,
        key: key.to_owned(),
        value: value.to_owned(),
    })
}

fn parse_bool(line: usize, key: &str, value: &str) -> Result<bool, ConfigError> {
    match value {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            line,
            key: key.to_owned(),
            value: value.to_owned(),
        }),
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "time_to_solve = {}", self.time_to_solve)?;
        writeln!(f, "usable_threads = {}", self.usable_threads)?;
        writeln!(f, "available_memory = {}", self.available_memory)?;
        writeln!(f, "matrix_free = {}", self.matrix_free)?;
        writeln!(f, "min_chain_length = {}", self.min_chain_length)?;
        writeln!(f, "max_chain_length = {}", self.max_chain_length)?;
        writeln!(f, "chains_per_length = {}", self.chains_per_length)?;
        writeln!(f, "min_dimension = {}", self.min_dimension)?;
        writeln!(f, "max_dimension = {}", self.max_dimension)?;
        write!(f, "seed = {}", self.seed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_keys_and_comments() {
        let config = Config::parse(
            "# solver\n\
             time_to_solve = 2.5\n\
             usable_threads = 4\n\
             matrix_free = true\n\
             \n\
             # generator\n\
             min_chain_length = 3\n\
             max_chain_length = 5\n\
             seed = 42\n",
        )
        .unwrap();

        assert_eq!(config.time_to_solve, 2.5);
        assert_eq!(config.usable_threads, 4);
        assert!(config.matrix_free);
        assert_eq!(config.min_chain_length, 3);
        assert_eq!(config.max_chain_length, 5);
        assert_eq!(config.seed, 42);
        // untouched keys keep their defaults
        assert_eq!(config.available_memory, 0);
    }

    #[test]
    fn rejects_unknown_keys() {
        let err = Config::parse("time_to_live = 1\n").unwrap_err();
        assert!(matches!(err, ConfigError::UnknownKey { line: 1, .. }));
    }

    #[test]
    fn rejects_unparsable_values() {
        let err = Config::parse("usable_threads = many\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn rejects_malformed_lines() {
        let err = Config::parse("matrix_free true\n").unwrap_err();
        assert!(matches!(err, ConfigError::Malformed { line: 1, .. }));
    }

    #[test]
    fn rejects_inconsistent_ranges() {
        let err = Config::parse("min_chain_length = 6\nmax_chain_length = 3\n").unwrap_err();
        assert!(matches!(err, ConfigError::Inconsistent(_)));
    }

    #[test]
    fn zero_budget_disables_the_deadline() {
        let config = Config::parse("time_to_solve = 0\n").unwrap();
        assert_eq!(config.phase_budget(), None);
    }
}
