//! Terminal stand-in for the remote hub
//!
//! Outbound traffic is written to the log as JSON. Inbound traffic is typed on
//! stdin, one event per line:
//!
//! ```text
//! start | StartBrewing          invoke the StartBrewing method
//! reset | ResetWaterLevel       invoke the ResetWaterLevel method
//! method <Name> [json]          invoke any method
//! desired <json>                desired-properties delta
//! message <text>                cloud-to-device message
//! connect | disconnect          session notifications
//! ```

use crate::system::events::{CloudMessage, DeviceEvent, EventPublisher, MethodRequest};
use crate::telemetry::TelemetryMessage;
use crate::transport::{HubTransport, TransportError};
use crate::twin::ReportedConfigurationPatch;
use crate::types::{METHOD_RESET_WATER_LEVEL, METHOD_START_BREWING};
use log::{debug, info, warn};
use std::io::BufRead;

pub struct ConsoleTransport<'a> {
    publisher: EventPublisher<'a>,
    connection_string: String,
    open: bool,
}

impl<'a> ConsoleTransport<'a> {
    pub fn new(publisher: EventPublisher<'a>, connection_string: impl Into<String>) -> Self {
        Self {
            publisher,
            connection_string: connection_string.into(),
            open: false,
        }
    }

    fn ensure_open(&self) -> Result<(), TransportError> {
        if self.open {
            Ok(())
        } else {
            Err(TransportError::Disconnected)
        }
    }
}

impl HubTransport for ConsoleTransport<'_> {
    fn open(&mut self) -> Result<(), TransportError> {
        if self.connection_string.trim().is_empty() {
            return Err(TransportError::OpenFailed(
                "empty connection string".to_string(),
            ));
        }

        if !self.publisher.try_publish(DeviceEvent::Connected) {
            return Err(TransportError::OpenFailed(
                "event queue full".to_string(),
            ));
        }
        self.open = true;
        debug!("Console session opened");
        Ok(())
    }

    fn send_event(&mut self, message: &TelemetryMessage) -> Result<(), TransportError> {
        self.ensure_open()?;
        info!(
            "Sending message: {} [{}]",
            message.body,
            message
                .properties
                .iter()
                .map(|(key, value)| format!("{}={}", key, value))
                .collect::<Vec<_>>()
                .join(", ")
        );
        Ok(())
    }

    fn update_reported(
        &mut self,
        patch: &ReportedConfigurationPatch,
    ) -> Result<(), TransportError> {
        self.ensure_open()?;
        info!("Reported properties: {}", serde_json::to_string(patch)?);
        Ok(())
    }

    fn send_method_response(
        &mut self,
        request_id: &str,
        status: u16,
        message: &str,
    ) -> Result<(), TransportError> {
        self.ensure_open()?;
        info!("Method response {}: {} {}", request_id, status, message);
        Ok(())
    }

    fn complete_message(&mut self, message: &CloudMessage) -> Result<(), TransportError> {
        self.ensure_open()?;
        debug!("Completed message {}", message.message_id);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleError {
    Empty,
    UnknownCommand(String),
    MissingArgument(&'static str),
    InvalidJson(String),
}

impl std::fmt::Display for ConsoleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConsoleError::Empty => write!(f, "empty line"),
            ConsoleError::UnknownCommand(cmd) => write!(f, "unknown command '{}'", cmd),
            ConsoleError::MissingArgument(what) => write!(f, "missing {}", what),
            ConsoleError::InvalidJson(msg) => write!(f, "invalid JSON: {}", msg),
        }
    }
}

impl std::error::Error for ConsoleError {}

fn parse_json(text: &str) -> Result<serde_json::Value, ConsoleError> {
    serde_json::from_str(text).map_err(|e| ConsoleError::InvalidJson(e.to_string()))
}

pub fn parse_line(line: &str) -> Result<DeviceEvent, ConsoleError> {
    let line = line.trim();
    if line.is_empty() {
        return Err(ConsoleError::Empty);
    }

    let (command, rest) = match line.split_once(char::is_whitespace) {
        Some((command, rest)) => (command, rest.trim()),
        None => (line, ""),
    };

    match command {
        "start" | METHOD_START_BREWING => {
            Ok(DeviceEvent::DirectMethod(MethodRequest::new(METHOD_START_BREWING, None)))
        }
        "reset" | METHOD_RESET_WATER_LEVEL => Ok(DeviceEvent::DirectMethod(MethodRequest::new(
            METHOD_RESET_WATER_LEVEL,
            None,
        ))),
        "method" => {
            let (name, payload) = match rest.split_once(char::is_whitespace) {
                Some((name, payload)) => (name, Some(parse_json(payload.trim())?)),
                None => (rest, None),
            };
            if name.is_empty() {
                return Err(ConsoleError::MissingArgument("method name"));
            }
            Ok(DeviceEvent::DirectMethod(MethodRequest::new(name, payload)))
        }
        "desired" => {
            if rest.is_empty() {
                return Err(ConsoleError::MissingArgument("desired properties JSON"));
            }
            Ok(DeviceEvent::DesiredProperties(parse_json(rest)?))
        }
        "message" => Ok(DeviceEvent::CloudMessage(CloudMessage::new(rest))),
        "connect" => Ok(DeviceEvent::Connected),
        "disconnect" => Ok(DeviceEvent::Disconnected),
        other => Err(ConsoleError::UnknownCommand(other.to_string())),
    }
}

/// Feed stdin lines into the event queue until EOF
pub fn spawn_stdin_reader(
    publisher: EventPublisher<'static>,
) -> std::io::Result<std::thread::JoinHandle<()>> {
    std::thread::Builder::new()
        .name("console-input".to_string())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        warn!("Console input error: {}", e);
                        break;
                    }
                };

                match parse_line(&line) {
                    Ok(event) => publisher.publish_blocking(event),
                    Err(ConsoleError::Empty) => {}
                    Err(e) => warn!("Ignoring console input: {}", e),
                }
            }
            info!("Console input closed");
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::events::{DeviceEventChannel, EVENT_QUEUE_DEPTH};
    use crate::twin::TwinReconciler;

    #[test]
    fn test_parse_method_shortcuts() {
        for line in ["start", "StartBrewing", "  start  "] {
            match parse_line(line) {
                Ok(DeviceEvent::DirectMethod(request)) => {
                    assert_eq!(request.method_name, "StartBrewing");
                    assert_eq!(request.payload, None);
                }
                other => panic!("unexpected {:?}", other),
            }
        }

        assert!(matches!(
            parse_line("reset"),
            Ok(DeviceEvent::DirectMethod(request)) if request.method_name == "ResetWaterLevel"
        ));
    }

    #[test]
    fn test_parse_generic_method() {
        match parse_line("method Descale {\"force\": true}") {
            Ok(DeviceEvent::DirectMethod(request)) => {
                assert_eq!(request.method_name, "Descale");
                assert_eq!(request.payload, Some(serde_json::json!({ "force": true })));
            }
            other => panic!("unexpected {:?}", other),
        }

        assert_eq!(
            parse_line("method").unwrap_err(),
            ConsoleError::MissingArgument("method name")
        );
    }

    #[test]
    fn test_parse_desired() {
        match parse_line("desired {\"Watertemperature\": {\"min\": 85}}") {
            Ok(DeviceEvent::DesiredProperties(doc)) => {
                assert_eq!(doc["Watertemperature"]["min"], 85);
            }
            other => panic!("unexpected {:?}", other),
        }

        assert!(matches!(
            parse_line("desired {min:"),
            Err(ConsoleError::InvalidJson(_))
        ));
        assert!(matches!(
            parse_line("desired"),
            Err(ConsoleError::MissingArgument(_))
        ));
    }

    #[test]
    fn test_parse_session_and_messages() {
        assert!(matches!(parse_line("connect"), Ok(DeviceEvent::Connected)));
        assert!(matches!(parse_line("disconnect"), Ok(DeviceEvent::Disconnected)));
        assert!(matches!(
            parse_line("message descale soon"),
            Ok(DeviceEvent::CloudMessage(message)) if message.data == "descale soon"
        ));
        assert_eq!(parse_line("   "), Err(ConsoleError::Empty));
        assert_eq!(
            parse_line("espresso"),
            Err(ConsoleError::UnknownCommand("espresso".to_string()))
        );
    }

    #[test]
    fn test_open_queues_connected() {
        let channel = DeviceEventChannel::new();
        let mut transport = ConsoleTransport::new(EventPublisher::new(&channel), "HostName=hub");

        let patch = TwinReconciler::default().reported_patch(51);
        assert_eq!(
            transport.update_reported(&patch),
            Err(TransportError::Disconnected)
        );

        transport.open().unwrap();
        assert!(matches!(channel.try_receive(), Ok(DeviceEvent::Connected)));
        assert!(transport.update_reported(&patch).is_ok());
    }

    #[test]
    fn test_open_with_full_queue_stays_closed() {
        let channel = DeviceEventChannel::new();
        let publisher = EventPublisher::new(&channel);
        for _ in 0..EVENT_QUEUE_DEPTH {
            assert!(publisher.try_publish(DeviceEvent::Disconnected));
        }

        let mut transport = ConsoleTransport::new(publisher, "HostName=hub");
        assert!(matches!(transport.open(), Err(TransportError::OpenFailed(_))));

        let patch = TwinReconciler::default().reported_patch(51);
        assert_eq!(
            transport.update_reported(&patch),
            Err(TransportError::Disconnected)
        );
    }

    #[test]
    fn test_open_rejects_empty_connection_string() {
        let channel = DeviceEventChannel::new();
        let mut transport = ConsoleTransport::new(EventPublisher::new(&channel), " ");

        assert!(matches!(transport.open(), Err(TransportError::OpenFailed(_))));
        assert!(channel.try_receive().is_err());
    }
}
