//! Simulation settings
//!
//! Settings are read from the path given on the command line, or from
//! `~/.config/strata/settings.toml`, falling back to defaults.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use strata_core::TickerConfig;
use strata_ecs::WorldConfig;
use tracing::{info, warn};

/// All simulation settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationSettings {
    pub world: WorldConfig,
    pub ticker: TickerConfig,
    pub simulation: ScenarioSettings,
}

impl SimulationSettings {
    /// Get the config directory path
    fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("strata"))
    }

    /// Get the default settings file path
    fn settings_path() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join("settings.toml"))
    }

    /// Load settings from `path` if given, else from the config directory,
    /// or return defaults if nothing usable is found
    pub fn load(path: Option<PathBuf>) -> Self {
        let Some(path) = path.or_else(Self::settings_path) else {
            warn!("Could not determine config directory");
            return Self::default();
        };

        if !path.exists() {
            info!("No settings file found at {:?}, using defaults", path);
            return Self::default();
        }

        Self::load_from(&path)
    }

    fn load_from(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(content) => match Self::parse(&content) {
                Ok(settings) => {
                    info!("Loaded settings from {:?}", path);
                    settings
                }
                Err(e) => {
                    warn!("Failed to parse settings: {}, using defaults", e);
                    Self::default()
                }
            },
            Err(e) => {
                warn!("Failed to read settings file: {}, using defaults", e);
                Self::default()
            }
        }
    }

    /// Parse settings from TOML text. Missing fields take their defaults.
    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}

/// Population and pacing of the simulated scene
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioSettings {
    /// Entities that wander around the stage
    pub movers: u32,
    /// Entities with a position but no movement
    pub static_bodies: u32,
    /// Number of ticks to run
    pub ticks: u64,
    /// Log a report every this many ticks (0 = never)
    pub report_every: u64,
    /// Send one mover to rest every this many ticks (0 = never)
    pub rest_every: u64,
    /// How many ticks a resting mover stays still
    pub rest_ticks: u32,
    /// Seed for spawning
    pub seed: u64,
    /// Stage width in world units
    pub stage_width: f32,
    /// Stage height in world units
    pub stage_height: f32,
}

impl Default for ScenarioSettings {
    fn default() -> Self {
        Self {
            movers: 200,
            static_bodies: 50,
            ticks: 600, // 10 seconds at 60 fps
            report_every: 120,
            rest_every: 30,
            rest_ticks: 90,
            seed: 42,
            stage_width: 800.0,
            stage_height: 600.0,
        }
    }
}
