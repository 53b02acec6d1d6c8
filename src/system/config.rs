//! Centralized configuration management

use crate::types::{BREW_SOUND_EFFECT, TELEMETRY_INTERVAL_MS};
use anyhow::{bail, Context};
use embassy_time::Duration;

pub const ENV_DEVICE_ID: &str = "DEVICE_ID";
pub const ENV_CONNECTION_STRING: &str = "DEVICE_CONNECTION_STRING";
pub const ENV_TELEMETRY_INTERVAL_MS: &str = "TELEMETRY_INTERVAL_MS";
pub const ENV_BREW_SOUND: &str = "BREW_SOUND";
pub const ENV_AUDIO_PLAYER: &str = "AUDIO_PLAYER";

#[derive(Debug, Clone, PartialEq)]
pub struct SimulatorConfig {
    pub device_id: String,
    pub connection_string: String,
    pub telemetry_interval: Duration,
    pub brew_sound: String,
    /// Program used to play effects; `None` keeps the simulator silent
    pub audio_player: Option<String>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            device_id: "<DeviceId>".to_string(),
            connection_string: "<DeviceConnectionString>".to_string(),
            telemetry_interval: Duration::from_millis(TELEMETRY_INTERVAL_MS),
            brew_sound: BREW_SOUND_EFFECT.to_string(),
            audio_player: None,
        }
    }
}

impl SimulatorConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let value = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(device_id) = value(ENV_DEVICE_ID) {
            config.device_id = device_id;
        }
        if let Some(connection_string) = value(ENV_CONNECTION_STRING) {
            config.connection_string = connection_string;
        }
        if let Some(interval) = value(ENV_TELEMETRY_INTERVAL_MS) {
            let ms: u64 = interval
                .trim()
                .parse()
                .with_context(|| format!("{} must be a number of milliseconds", ENV_TELEMETRY_INTERVAL_MS))?;
            if ms == 0 {
                bail!("{} must be greater than zero", ENV_TELEMETRY_INTERVAL_MS);
            }
            config.telemetry_interval = Duration::from_millis(ms);
        }
        if let Some(sound) = value(ENV_BREW_SOUND) {
            config.brew_sound = sound;
        }
        config.audio_player = value(ENV_AUDIO_PLAYER);

        Ok(config)
    }
}
