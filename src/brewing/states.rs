//! Brew process state machine
//! States: NotBrewing, Pressurizing, Brewing, WaterTooLow

use crate::types::{
    BrewReadings, BrewStatus, BREW_DURATION_TICKS, DEFAULT_WATER_LEVEL, WATER_LEVEL_RESET_MAX,
    WATER_LEVEL_RESET_MIN,
};
use log::{debug, info, warn};
use rand::Rng;
use statig::prelude::*;

// Input events to the state machine
#[derive(Debug, Clone)]
pub enum BrewInput {
    // From direct methods
    StartBrew,
    ResetWaterLevel { level: u32 },

    // From the periodic scheduler
    Tick,
}

// Output events from the state machine
#[derive(Debug, Clone, PartialEq)]
pub enum BrewOutput {
    BrewStarted { remaining_ticks: u32 },
    StartRejected { status: BrewStatus },
    WaterLevelReset { level: u32 },
    WaterTooLow { water_level: u32, remaining_ticks: u32 },
    BrewFinished { water_level: u32 },

    // To the audio collaborator
    AudioStart,
    AudioStop,

    StateChanged { from: BrewStatus, to: BrewStatus },
}

pub const MAX_BREW_OUTPUTS: usize = 8;
pub type BrewOutputs = heapless::Vec<BrewOutput, MAX_BREW_OUTPUTS>;

// Shared context for the state machine
#[derive(Debug)]
pub struct BrewContext {
    remaining_ticks: u32,
    water_level: u32,
    outputs: BrewOutputs, // Collect outputs during state transitions
}

impl BrewContext {
    fn with_water_level(water_level: u32) -> Self {
        Self {
            remaining_ticks: 0,
            water_level,
            outputs: heapless::Vec::new(),
        }
    }

    fn emit(&mut self, output: BrewOutput) {
        if let Err(dropped) = self.outputs.push(output) {
            warn!("Brew output buffer full, dropping {:?}", dropped);
        }
    }
}

impl Default for BrewContext {
    fn default() -> Self {
        Self::with_water_level(DEFAULT_WATER_LEVEL)
    }
}

#[derive(Debug, Default)]
pub struct BrewStateMachine;

#[state_machine(
    initial = "State::not_brewing()",
    state(derive(Debug)),
    on_transition = "Self::on_transition"
)]
impl BrewStateMachine {
    /// Idle, ready to accept a brew request
    #[state]
    fn not_brewing(context: &mut BrewContext, event: &BrewInput) -> Response<State> {
        use Response::*;

        match event {
            BrewInput::StartBrew => {
                context.remaining_ticks = BREW_DURATION_TICKS;
                context.emit(BrewOutput::BrewStarted {
                    remaining_ticks: context.remaining_ticks,
                });
                Transition(State::pressurizing())
            }
            BrewInput::ResetWaterLevel { level } => {
                Self::refill(context, *level);
                Handled
            }
            BrewInput::Tick => Self::advance(context, BrewStatus::NotBrewing),
        }
    }

    /// Brew accepted, first tick not yet taken
    #[state]
    fn pressurizing(context: &mut BrewContext, event: &BrewInput) -> Response<State> {
        use Response::*;

        match event {
            BrewInput::StartBrew => {
                context.emit(BrewOutput::StartRejected {
                    status: BrewStatus::Pressurizing,
                });
                Handled
            }
            BrewInput::ResetWaterLevel { level } => {
                Self::refill(context, *level);
                Transition(State::not_brewing())
            }
            BrewInput::Tick => Self::advance(context, BrewStatus::Pressurizing),
        }
    }

    #[state]
    fn brewing(context: &mut BrewContext, event: &BrewInput) -> Response<State> {
        use Response::*;

        match event {
            BrewInput::StartBrew => {
                context.emit(BrewOutput::StartRejected {
                    status: BrewStatus::Brewing,
                });
                Handled
            }
            BrewInput::ResetWaterLevel { level } => {
                Self::refill(context, *level);
                Transition(State::not_brewing())
            }
            BrewInput::Tick => Self::advance(context, BrewStatus::Brewing),
        }
    }

    /// Stalled: the water left cannot cover the remaining ticks.
    /// Only a water level reset leaves this state for good.
    #[state]
    fn water_too_low(context: &mut BrewContext, event: &BrewInput) -> Response<State> {
        use Response::*;

        match event {
            BrewInput::StartBrew => {
                context.emit(BrewOutput::StartRejected {
                    status: BrewStatus::WaterTooLow,
                });
                Handled
            }
            BrewInput::ResetWaterLevel { level } => {
                Self::refill(context, *level);
                Transition(State::not_brewing())
            }
            BrewInput::Tick => Self::advance(context, BrewStatus::WaterTooLow),
        }
    }
}

impl BrewStateMachine {
    fn on_transition(&mut self, source: &State, target: &State) {
        let source_status = Self::state_to_status(source);
        let target_status = Self::state_to_status(target);

        if source_status != target_status {
            info!("Brew state transition: {:?} -> {:?}", source_status, target_status);
        }
    }

    fn state_to_status(state: &State) -> BrewStatus {
        match state {
            State::NotBrewing {} => BrewStatus::NotBrewing,
            State::Pressurizing {} => BrewStatus::Pressurizing,
            State::Brewing {} => BrewStatus::Brewing,
            State::WaterTooLow {} => BrewStatus::WaterTooLow,
        }
    }

    fn refill(context: &mut BrewContext, level: u32) {
        context.water_level = level;
        context.remaining_ticks = 0;
        context.emit(BrewOutput::AudioStop);
        context.emit(BrewOutput::WaterLevelReset { level });
    }

    /// One scheduler tick: consume a unit of water per remaining brew tick
    fn advance(context: &mut BrewContext, current: BrewStatus) -> Response<State> {
        use Response::*;

        if context.remaining_ticks == 0 {
            return Handled;
        }

        if context.water_level > context.remaining_ticks {
            context.remaining_ticks -= 1;
            context.water_level -= 1;
            debug!(
                "Brew tick: {} ticks left, water level {}",
                context.remaining_ticks, context.water_level
            );

            if context.remaining_ticks == 0 {
                context.emit(BrewOutput::AudioStop);
                context.emit(BrewOutput::BrewFinished {
                    water_level: context.water_level,
                });
                Transition(State::not_brewing())
            } else {
                context.emit(BrewOutput::AudioStart);
                if current == BrewStatus::Brewing {
                    Handled
                } else {
                    Transition(State::brewing())
                }
            }
        } else if current == BrewStatus::WaterTooLow {
            Handled
        } else {
            context.emit(BrewOutput::WaterTooLow {
                water_level: context.water_level,
                remaining_ticks: context.remaining_ticks,
            });
            Transition(State::water_too_low())
        }
    }
}

// Main interface for the brew state machine
pub struct BrewController {
    machine: statig::prelude::StateMachine<BrewStateMachine>,
    context: BrewContext,
}

impl BrewController {
    pub fn new() -> Self {
        Self::with_water_level(DEFAULT_WATER_LEVEL)
    }

    pub fn with_water_level(water_level: u32) -> Self {
        Self {
            machine: BrewStateMachine::default().state_machine(),
            context: BrewContext::with_water_level(water_level),
        }
    }

    /// Process an input event and return output events
    pub fn handle_input(&mut self, input: BrewInput) -> BrewOutputs {
        self.context.outputs.clear();

        let previous_status = self.status();
        self.machine.handle_with_context(&input, &mut self.context);
        let new_status = self.status();

        if previous_status != new_status {
            self.context.emit(BrewOutput::StateChanged {
                from: previous_status,
                to: new_status,
            });
        }

        std::mem::take(&mut self.context.outputs)
    }

    pub fn start_brew(&mut self) -> BrewOutputs {
        self.handle_input(BrewInput::StartBrew)
    }

    /// Refill with a level drawn uniformly from the reset range
    pub fn reset_water_level<R: Rng>(&mut self, rng: &mut R) -> BrewOutputs {
        let level = rng.gen_range(WATER_LEVEL_RESET_MIN..=WATER_LEVEL_RESET_MAX);
        self.handle_input(BrewInput::ResetWaterLevel { level })
    }

    pub fn tick(&mut self) -> BrewOutputs {
        self.handle_input(BrewInput::Tick)
    }

    pub fn status(&self) -> BrewStatus {
        BrewStateMachine::state_to_status(self.machine.state())
    }

    pub fn remaining_ticks(&self) -> u32 {
        self.context.remaining_ticks
    }

    pub fn water_level(&self) -> u32 {
        self.context.water_level
    }

    pub fn readings(&self) -> BrewReadings {
        BrewReadings {
            status: self.status(),
            remaining_ticks: self.context.remaining_ticks,
            water_level: self.context.water_level,
        }
    }
}

impl Default for BrewController {
    fn default() -> Self {
        Self::new()
    }
}
