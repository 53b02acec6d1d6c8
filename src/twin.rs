//! Desired/reported reconciliation of the water temperature section of the twin

use crate::transport::{HubTransport, TransportError};
use crate::types::DeviceConfiguration;
use log::{info, warn};
use serde::{Deserialize, Serialize};

pub const WATER_TEMPERATURE_SECTION: &str = "Watertemperature";

/// Desired-property delta for the `Watertemperature` section.
/// Absent or null fields leave the current bound untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WaterTemperatureDelta {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl WaterTemperatureDelta {
    pub fn is_empty(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReportedWaterTemperature {
    pub min: f64,
    pub max: f64,
    pub wl: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReportedConfigurationPatch {
    #[serde(rename = "Watertemperature")]
    pub water_temperature: ReportedWaterTemperature,
}

/// Pull the `Watertemperature` delta out of a desired-properties document.
/// Returns `None` when the document does not touch that section. Non-numeric
/// fields are dropped with a warning so the valid ones still apply.
pub fn water_temperature_delta(desired: &serde_json::Value) -> Option<WaterTemperatureDelta> {
    let section = match desired.get(WATER_TEMPERATURE_SECTION) {
        None | Some(serde_json::Value::Null) => return None,
        Some(section) => section,
    };

    if !section.is_object() {
        warn!("{} is not an object: {}", WATER_TEMPERATURE_SECTION, section);
        return Some(WaterTemperatureDelta::default());
    }

    Some(WaterTemperatureDelta {
        min: bound_field(section, "min"),
        max: bound_field(section, "max"),
    })
}

fn bound_field(section: &serde_json::Value, key: &str) -> Option<f64> {
    match section.get(key) {
        None | Some(serde_json::Value::Null) => None,
        Some(value) => {
            let bound = value.as_f64();
            if bound.is_none() {
                warn!("Ignoring non-numeric {}.{}: {}", WATER_TEMPERATURE_SECTION, key, value);
            }
            bound
        }
    }
}

pub struct TwinReconciler {
    config: DeviceConfiguration,
}

impl TwinReconciler {
    pub fn new(config: DeviceConfiguration) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DeviceConfiguration {
        &self.config
    }

    /// Merge a delta into the local bounds. Returns true when a bound was written.
    pub fn apply_desired(&mut self, delta: &WaterTemperatureDelta) -> bool {
        if delta.is_empty() {
            return false;
        }

        info!("Updating desired Watertemperature");
        if let Some(min) = delta.min {
            self.config.min_water_temperature = min;
        }
        if let Some(max) = delta.max {
            self.config.max_water_temperature = max;
        }
        info!("Desired min temp = {}", self.config.min_water_temperature);
        info!("Desired max temp = {}", self.config.max_water_temperature);

        if self.config.min_water_temperature > self.config.max_water_temperature {
            warn!(
                "Desired water temperature bounds are inverted (min {} > max {})",
                self.config.min_water_temperature, self.config.max_water_temperature
            );
        }

        true
    }

    /// Full re-report of the current bounds plus the water level
    pub fn reported_patch(&self, water_level: u32) -> ReportedConfigurationPatch {
        ReportedConfigurationPatch {
            water_temperature: ReportedWaterTemperature {
                min: self.config.min_water_temperature,
                max: self.config.max_water_temperature,
                wl: water_level,
            },
        }
    }

    /// Apply the delta, then report the full configuration back. A failed
    /// report is returned to the caller and not retried.
    pub fn reconcile<T: HubTransport>(
        &mut self,
        delta: &WaterTemperatureDelta,
        water_level: u32,
        transport: &mut T,
    ) -> Result<ReportedConfigurationPatch, TransportError> {
        self.apply_desired(delta);

        let patch = self.reported_patch(water_level);
        transport.update_reported(&patch)?;
        info!("Twin state reported: {:?}", patch.water_temperature);

        Ok(patch)
    }
}

impl Default for TwinReconciler {
    fn default() -> Self {
        Self::new(DeviceConfiguration::default())
    }
}
