//! Direct method handling
//!
//! Every invocation gets a definitive answer: known methods always report
//! success (a start request while busy is only a logged warning), unknown
//! methods get a 404. Failing to deliver the answer is logged and swallowed.

use crate::brewing::{BrewController, BrewOutputs};
use crate::system::events::MethodRequest;
use crate::transport::HubTransport;
use crate::types::{METHOD_RESET_WATER_LEVEL, METHOD_START_BREWING};
use log::{error, info, warn};
use rand::Rng;

pub const STATUS_SUCCESS: u16 = 200;
pub const STATUS_NOT_FOUND: u16 = 404;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectCommand {
    StartBrewing,
    ResetWaterLevel,
}

impl DirectCommand {
    pub const ALL: [DirectCommand; 2] = [DirectCommand::StartBrewing, DirectCommand::ResetWaterLevel];

    pub fn from_method_name(name: &str) -> Option<Self> {
        match name {
            METHOD_START_BREWING => Some(DirectCommand::StartBrewing),
            METHOD_RESET_WATER_LEVEL => Some(DirectCommand::ResetWaterLevel),
            _ => None,
        }
    }

    pub fn method_name(&self) -> &'static str {
        match self {
            DirectCommand::StartBrewing => METHOD_START_BREWING,
            DirectCommand::ResetWaterLevel => METHOD_RESET_WATER_LEVEL,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodResponse {
    pub status: u16,
    pub message: &'static str,
}

impl MethodResponse {
    pub fn success() -> Self {
        Self {
            status: STATUS_SUCCESS,
            message: "Success",
        }
    }

    pub fn unknown_method() -> Self {
        Self {
            status: STATUS_NOT_FOUND,
            message: "Unknown method",
        }
    }
}

#[derive(Debug)]
pub struct CommandOutcome {
    pub response: MethodResponse,
    pub outputs: BrewOutputs,
}

pub struct CommandDispatcher;

impl CommandDispatcher {
    /// Run the command against the brew state. The caller applies the brew outputs
    /// and sends the response.
    pub fn dispatch<R: Rng>(
        request: &MethodRequest,
        brew: &mut BrewController,
        rng: &mut R,
    ) -> CommandOutcome {
        let Some(command) = DirectCommand::from_method_name(&request.method_name) else {
            warn!("Unknown direct method '{}'", request.method_name);
            return CommandOutcome {
                response: MethodResponse::unknown_method(),
                outputs: BrewOutputs::new(),
            };
        };

        let outputs = match command {
            DirectCommand::StartBrewing => {
                info!(" * Brewing command received");
                brew.start_brew()
            }
            DirectCommand::ResetWaterLevel => {
                info!(" * Reset water level received");
                let outputs = brew.reset_water_level(rng);
                info!(
                    " * Reset to {}; state set to {}",
                    brew.water_level(),
                    brew.status()
                );
                outputs
            }
        };

        CommandOutcome {
            response: MethodResponse::success(),
            outputs,
        }
    }

    /// Deliver the response; a failed delivery is only logged
    pub fn respond<T: HubTransport>(
        transport: &mut T,
        request: &MethodRequest,
        response: &MethodResponse,
    ) {
        if let Err(e) =
            transport.send_method_response(&request.request_id, response.status, response.message)
        {
            error!(
                "Failed sending a method response for '{}': {}",
                request.method_name, e
            );
        }
    }
}
