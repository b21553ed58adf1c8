//! Configuration loading and management.
//!
//! Seat counts and per-seat costs are externally maintained inputs, not
//! derived from the log; they live here alongside the labor rate used by
//! the ROI estimate.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use lmlog_core::SeatInputs;
use serde::{Deserialize, Serialize};

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Licensed seat count per feature.
    #[serde(default)]
    pub seats: BTreeMap<String, u32>,

    /// Annual per-seat cost per feature.
    #[serde(default)]
    pub costs: BTreeMap<String, f64>,

    /// Loaded hourly labor rate for productivity-loss estimates.
    #[serde(default = "default_hourly_rate")]
    pub hourly_rate: f64,
}

fn default_hourly_rate() -> f64 {
    SeatInputs::default().hourly_rate
}

impl Default for Config {
    fn default() -> Self {
        Self {
            seats: BTreeMap::new(),
            costs: BTreeMap::new(),
            hourly_rate: default_hourly_rate(),
        }
    }
}

impl Config {
    /// Loads configuration, optionally from a specific file.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        // Load from default config location
        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        // Load from specified config file
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // Load from environment variables (LMLOG_*)
        figment = figment.merge(Env::prefixed("LMLOG_"));

        figment.extract()
    }

    /// The seat/cost inputs consumed by the capacity evaluator.
    #[must_use]
    pub fn seat_inputs(&self) -> SeatInputs {
        SeatInputs {
            seats: self.seats.clone(),
            annual_seat_cost: self.costs.clone(),
            hourly_rate: self.hourly_rate,
        }
    }
}

/// Returns the platform-specific config directory for lmlog.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("lmlog"))
}
