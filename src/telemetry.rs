use crate::types::{BrewReadings, BrewStatus, DeviceConfiguration};
use chrono::{DateTime, SecondsFormat, Utc};
use rand::Rng;
use serde::Serialize;

pub const CONTENT_TYPE_JSON: &str = "application/json";
pub const CONTENT_ENCODING_UTF8: &str = "utf-8";
pub const WATER_LEVEL_ALERT_PROPERTY: &str = "waterLevelAlert";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct TelemetrySnapshot {
    pub device_id: String,
    pub timestamp: String,
    #[serde(rename = "State")]
    pub status: BrewStatus,
    pub water_temperature: f64,
    pub water_level: u32,
    #[serde(skip)]
    pub water_level_alert: bool,
}

/// A device-to-cloud event ready for the transport
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryMessage {
    pub message_id: String,
    pub body: String,
    pub content_type: &'static str,
    pub content_encoding: &'static str,
    pub properties: Vec<(String, String)>,
}

impl TelemetryMessage {
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }
}

impl TryFrom<&TelemetrySnapshot> for TelemetryMessage {
    type Error = serde_json::Error;

    fn try_from(snapshot: &TelemetrySnapshot) -> Result<Self, Self::Error> {
        Ok(Self {
            message_id: uuid::Uuid::new_v4().to_string(),
            body: serde_json::to_string(snapshot)?,
            content_type: CONTENT_TYPE_JSON,
            content_encoding: CONTENT_ENCODING_UTF8,
            properties: vec![(
                WATER_LEVEL_ALERT_PROPERTY.to_string(),
                snapshot.water_level_alert.to_string(),
            )],
        })
    }
}

pub struct TelemetryGenerator {
    device_id: String,
}

impl TelemetryGenerator {
    pub fn new(device_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
        }
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn generate<R: Rng>(
        &self,
        rng: &mut R,
        readings: &BrewReadings,
        config: &DeviceConfiguration,
        timestamp: DateTime<Utc>,
    ) -> TelemetrySnapshot {
        TelemetrySnapshot {
            device_id: self.device_id.clone(),
            timestamp: timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            status: readings.status,
            water_temperature: sample_temperature(rng, config),
            water_level: readings.water_level,
            water_level_alert: readings.water_level_alert(),
        }
    }
}

/// Uniform sample in `[min, max)`. Inverted bounds sample `(max, min]` instead of panicking.
pub fn sample_temperature<R: Rng>(rng: &mut R, config: &DeviceConfiguration) -> f64 {
    let min = config.min_water_temperature;
    let max = config.max_water_temperature;
    min + rng.gen::<f64>() * (max - min)
}
