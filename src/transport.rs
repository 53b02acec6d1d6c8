//! Boundary to the remote hub session
//!
//! Everything the device sends upstream goes through [`HubTransport`]. Sends are
//! fire-and-forget from the controller's point of view: a failed send is logged
//! by the caller and never stops event processing.

use crate::system::events::CloudMessage;
use crate::telemetry::TelemetryMessage;
use crate::twin::ReportedConfigurationPatch;

pub trait HubTransport {
    /// Open (or reopen) the session. A successful open is followed by a
    /// `Connected` event once the hub accepts the device.
    fn open(&mut self) -> Result<(), TransportError>;

    fn send_event(&mut self, message: &TelemetryMessage) -> Result<(), TransportError>;

    fn update_reported(&mut self, patch: &ReportedConfigurationPatch)
        -> Result<(), TransportError>;

    fn send_method_response(
        &mut self,
        request_id: &str,
        status: u16,
        message: &str,
    ) -> Result<(), TransportError>;

    /// Acknowledge a cloud-to-device message so the hub stops redelivering it
    fn complete_message(&mut self, message: &CloudMessage) -> Result<(), TransportError>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransportError {
    OpenFailed(String),
    Disconnected,
    SendFailed(String),
    Serialization(String),
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportError::OpenFailed(msg) => write!(f, "could not open hub session: {}", msg),
            TransportError::Disconnected => write!(f, "hub session is not connected"),
            TransportError::SendFailed(msg) => write!(f, "send failed: {}", msg),
            TransportError::Serialization(msg) => write!(f, "serialization error: {}", msg),
        }
    }
}

impl std::error::Error for TransportError {}

impl From<serde_json::Error> for TransportError {
    fn from(err: serde_json::Error) -> Self {
        TransportError::Serialization(err.to_string())
    }
}
