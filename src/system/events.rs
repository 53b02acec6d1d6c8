//! Device event hierarchy and the channel feeding the controller loop
//! Every inbound notification from the hub is funneled through one queue

use embassy_sync::{
    blocking_mutex::raw::CriticalSectionRawMutex,
    channel::{Channel, TrySendError},
};
use log::warn;

pub const EVENT_QUEUE_DEPTH: usize = 16;

pub type DeviceEventChannel = Channel<CriticalSectionRawMutex, DeviceEvent, EVENT_QUEUE_DEPTH>;

/// Top-level inbound event - processed one at a time, in arrival order
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceEvent {
    // Session lifecycle
    Connected,
    Disconnected,

    /// Desired section of the twin changed
    DesiredProperties(serde_json::Value),

    /// Direct method invocation awaiting a response
    DirectMethod(MethodRequest),

    /// Cloud-to-device message awaiting completion
    CloudMessage(CloudMessage),
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodRequest {
    pub request_id: String,
    pub method_name: String,
    pub payload: Option<serde_json::Value>,
}

impl MethodRequest {
    pub fn new(method_name: impl Into<String>, payload: Option<serde_json::Value>) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            method_name: method_name.into(),
            payload,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CloudMessage {
    pub message_id: String,
    pub data: String,
}

impl CloudMessage {
    pub fn new(data: impl Into<String>) -> Self {
        Self {
            message_id: uuid::Uuid::new_v4().to_string(),
            data: data.into(),
        }
    }
}

/// Publisher handle for producers outside the controller task
#[derive(Clone, Copy)]
pub struct EventPublisher<'a> {
    channel: &'a DeviceEventChannel,
}

impl<'a> EventPublisher<'a> {
    pub fn new(channel: &'a DeviceEventChannel) -> Self {
        Self { channel }
    }

    /// Non-async publish; returns false when the queue is full
    pub fn try_publish(&self, event: DeviceEvent) -> bool {
        match self.channel.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(event)) => {
                warn!("Event queue full, dropping {:?}", event);
                false
            }
        }
    }

    /// Publish from async code, waiting for room in the queue
    pub async fn publish(&self, event: DeviceEvent) {
        self.channel.send(event).await;
    }

    /// Blocking publish for plain threads: waits for room in the queue
    pub fn publish_blocking(&self, event: DeviceEvent) {
        embassy_futures::block_on(self.publish(event));
    }
}
