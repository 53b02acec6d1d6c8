use serde::{Deserialize, Serialize, Serializer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrewStatus {
    NotBrewing,
    Pressurizing,
    Brewing,
    WaterTooLow,
}

impl BrewStatus {
    /// Label reported in the `State` telemetry field
    pub fn as_str(&self) -> &'static str {
        match self {
            BrewStatus::NotBrewing => "Not Brewing",
            BrewStatus::Pressurizing => "Pressurize water",
            BrewStatus::Brewing => "Brewing",
            BrewStatus::WaterTooLow => "Waterlevel too low!",
        }
    }
}

impl Serialize for BrewStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl std::fmt::Display for BrewStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Water temperature bounds synchronized with the twin's desired section
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeviceConfiguration {
    pub min_water_temperature: f64,
    pub max_water_temperature: f64,
}

impl Default for DeviceConfiguration {
    fn default() -> Self {
        Self {
            min_water_temperature: 80.0,
            max_water_temperature: 100.0,
        }
    }
}

/// Read-only view of the brew process used by telemetry and reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BrewReadings {
    pub status: BrewStatus,
    pub remaining_ticks: u32,
    pub water_level: u32,
}

impl BrewReadings {
    /// True when the water left cannot cover the remaining brew ticks
    pub fn water_level_alert(&self) -> bool {
        i64::from(self.water_level) - i64::from(self.remaining_ticks) <= 0
    }
}

pub const BREW_DURATION_TICKS: u32 = 20;
pub const DEFAULT_WATER_LEVEL: u32 = 51;
pub const WATER_LEVEL_RESET_MIN: u32 = 48;
pub const WATER_LEVEL_RESET_MAX: u32 = 53;
pub const TELEMETRY_INTERVAL_MS: u64 = 2000;
pub const BREW_SOUND_EFFECT: &str = "coffee-brewing.mp3";

pub const METHOD_START_BREWING: &str = "StartBrewing";
pub const METHOD_RESET_WATER_LEVEL: &str = "ResetWaterLevel";
