use crate::{
    brewing::{BrewController, BrewOutput, BrewOutputs},
    commands::CommandDispatcher,
    hardware::{AudioEffect, AudioPlayer},
    scheduler::Scheduler,
    system::{
        config::SimulatorConfig,
        events::{CloudMessage, DeviceEvent, DeviceEventChannel, MethodRequest},
    },
    telemetry::{TelemetryGenerator, TelemetryMessage},
    transport::{HubTransport, TransportError},
    twin::{self, ReportedConfigurationPatch, TwinReconciler},
    types::DeviceConfiguration,
};
use embassy_futures::select::{select, Either};
use log::{debug, error, info, warn};
use rand::Rng;

/// Owns the device state and processes hub events one at a time
pub struct DeviceController<T: HubTransport, P: AudioPlayer, R: Rng> {
    transport: T,
    audio: AudioEffect<P>,
    rng: R,

    brew: BrewController,
    reconciler: TwinReconciler,
    telemetry: TelemetryGenerator,
    scheduler: Scheduler,

    // Features attached once the session opened successfully
    twin_attached: bool,
    message_handler_registered: bool,
}

impl<T: HubTransport, P: AudioPlayer, R: Rng> DeviceController<T, P, R> {
    pub fn new(config: &SimulatorConfig, transport: T, player: P, rng: R) -> Self {
        Self {
            transport,
            audio: AudioEffect::new(player, config.brew_sound.clone()),
            rng,

            brew: BrewController::new(),
            reconciler: TwinReconciler::new(DeviceConfiguration::default()),
            telemetry: TelemetryGenerator::new(config.device_id.clone()),
            scheduler: Scheduler::new(config.telemetry_interval),

            twin_attached: false,
            message_handler_registered: false,
        }
    }

    /// Open the session, then process events until the process exits
    pub async fn start(&mut self, events: &DeviceEventChannel) {
        info!("Starting coffee machine simulator for {}", self.telemetry.device_id());
        self.open_session();
        self.main_control_loop(events).await;
    }

    async fn main_control_loop(&mut self, events: &DeviceEventChannel) {
        info!("Starting main control loop");

        loop {
            let next = select(events.receive(), self.scheduler.next_tick()).await;

            match next {
                Either::First(event) => self.handle_event(event),
                Either::Second(()) => self.handle_tick(),
            }
        }
    }

    /// Startup-phase open. Twin and cloud-message features are attached only on success.
    pub fn open_session(&mut self) -> bool {
        if let Err(e) = self.transport.open() {
            error!("Could not open hub client: {}", e);
            return false;
        }

        info!("Client opened");
        self.print_banner();

        if !self.twin_attached {
            self.twin_attached = true;
            info!("Twin created");
        }

        if !self.message_handler_registered {
            self.message_handler_registered = true;
            info!("Cloud message handler registered");
        }

        true
    }

    fn print_banner(&self) {
        let config = self.reconciler.config();
        info!("---------------------------------------");
        info!("Supported desired properties:");
        info!("- Watertemperature.min: {}", config.min_water_temperature);
        info!("- Watertemperature.max: {}", config.max_water_temperature);
        info!("Supported direct methods:");
        for command in crate::commands::DirectCommand::ALL {
            info!("- {}", command.method_name());
        }
        info!("---------------------------------------");
    }

    pub fn handle_event(&mut self, event: DeviceEvent) {
        match event {
            DeviceEvent::Connected => self.handle_connected(),
            DeviceEvent::Disconnected => self.handle_disconnected(),
            DeviceEvent::DesiredProperties(desired) => {
                if let Err(e) = self.handle_desired_properties(&desired) {
                    error!("Failed to report twin state: {}", e);
                }
            }
            DeviceEvent::DirectMethod(request) => self.handle_direct_method(&request),
            DeviceEvent::CloudMessage(message) => self.handle_cloud_message(&message),
        }
    }

    fn handle_connected(&mut self) {
        info!("Client connected");
        self.scheduler.start();
    }

    fn handle_disconnected(&mut self) {
        warn!("Client disconnected");
        self.scheduler.stop();

        // Retry policy belongs to the transport; one attempt here
        if let Err(e) = self.transport.open() {
            error!("Reopen failed: {}", e);
        }
    }

    /// Log the full desired document, then reconcile the water temperature section
    pub fn handle_desired_properties(
        &mut self,
        desired: &serde_json::Value,
    ) -> Result<Option<ReportedConfigurationPatch>, TransportError> {
        if !self.twin_attached {
            warn!("Desired properties received before the twin was attached, ignoring");
            return Ok(None);
        }

        info!("New desired properties received: {}", desired);

        let Some(delta) = twin::water_temperature_delta(desired) else {
            return Ok(None);
        };

        let water_level = self.brew.water_level();
        self.reconciler
            .reconcile(&delta, water_level, &mut self.transport)
            .map(Some)
    }

    fn handle_direct_method(&mut self, request: &MethodRequest) {
        let outcome = CommandDispatcher::dispatch(request, &mut self.brew, &mut self.rng);
        self.apply_brew_outputs(&outcome.outputs);
        CommandDispatcher::respond(&mut self.transport, request, &outcome.response);
    }

    fn handle_cloud_message(&mut self, message: &CloudMessage) {
        if !self.message_handler_registered {
            warn!(
                "Cloud message {} arrived before a handler was registered",
                message.message_id
            );
            return;
        }

        info!("Cloud message received");
        info!("Id: {} Body: {}", message.message_id, message.data);
        if let Err(e) = self.transport.complete_message(message) {
            error!("Failed to complete message {}: {}", message.message_id, e);
        }
    }

    /// One scheduler tick: telemetry first, then exactly one brew advance
    pub fn handle_tick(&mut self) {
        let snapshot = self.telemetry.generate(
            &mut self.rng,
            &self.brew.readings(),
            self.reconciler.config(),
            chrono::Utc::now(),
        );

        match TelemetryMessage::try_from(&snapshot) {
            Ok(message) => {
                if let Err(e) = self.transport.send_event(&message) {
                    error!("Failed to send telemetry: {}", e);
                }
            }
            Err(e) => error!("Failed to serialize telemetry: {}", e),
        }

        let outputs = self.brew.tick();
        self.apply_brew_outputs(&outputs);
    }

    fn apply_brew_outputs(&mut self, outputs: &BrewOutputs) {
        for output in outputs {
            match output {
                BrewOutput::AudioStart => self.audio.start(),
                BrewOutput::AudioStop => self.audio.stop(),
                BrewOutput::StartRejected { .. } => {
                    warn!(" - Warning: The device is already brewing.");
                }
                BrewOutput::WaterTooLow {
                    water_level,
                    remaining_ticks,
                } => {
                    warn!(
                        "Water level {} too low for {} remaining brew ticks",
                        water_level, remaining_ticks
                    );
                }
                BrewOutput::BrewFinished { water_level } => {
                    info!("Brewing finished, water level {}", water_level);
                }
                BrewOutput::BrewStarted { remaining_ticks } => {
                    info!("Brewing started, {} ticks to go", remaining_ticks);
                }
                BrewOutput::WaterLevelReset { .. } | BrewOutput::StateChanged { .. } => {
                    debug!("Brew output: {:?}", output);
                }
            }
        }
    }

    pub fn brew(&self) -> &BrewController {
        &self.brew
    }

    pub fn config(&self) -> &DeviceConfiguration {
        self.reconciler.config()
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn is_playing(&self) -> bool {
        self.audio.is_playing()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::audio::testing::CountingPlayer;
    use crate::transport::testing::RecordingTransport;
    use crate::types::BrewStatus;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use serde_json::json;

    type TestController = DeviceController<RecordingTransport, CountingPlayer, StdRng>;

    fn controller_with(transport: RecordingTransport, player: CountingPlayer) -> TestController {
        let mut controller = DeviceController::new(
            &SimulatorConfig::default(),
            transport,
            player,
            StdRng::seed_from_u64(17),
        );
        controller.open_session();
        controller
    }

    fn controller() -> TestController {
        controller_with(RecordingTransport::default(), CountingPlayer::default())
    }

    fn method(name: &str) -> DeviceEvent {
        DeviceEvent::DirectMethod(MethodRequest::new(name, None))
    }

    #[test]
    fn test_connect_starts_scheduler_once() {
        let mut controller = controller();
        assert!(!controller.scheduler().is_running());

        controller.handle_event(DeviceEvent::Connected);
        controller.handle_event(DeviceEvent::Connected);

        assert!(controller.scheduler().is_running());
        assert_eq!(controller.scheduler().timers_started(), 1);
    }

    #[test]
    fn test_disconnect_stops_scheduler_and_reopens() {
        let mut controller = controller();
        controller.handle_event(DeviceEvent::Connected);

        controller.handle_event(DeviceEvent::Disconnected);
        assert!(!controller.scheduler().is_running());
        assert_eq!(controller.transport().opens, 2);

        controller.handle_event(DeviceEvent::Connected);
        assert!(controller.scheduler().is_running());
        assert_eq!(controller.scheduler().timers_started(), 2);
    }

    #[test]
    fn test_reopen_failure_is_logged_only() {
        let mut controller = controller();
        controller.handle_event(DeviceEvent::Connected);
        controller.transport_mut().fail_open = true;

        controller.handle_event(DeviceEvent::Disconnected);
        assert!(!controller.scheduler().is_running());
        assert_eq!(controller.transport().opens, 2);
    }

    #[test]
    fn test_tick_sends_telemetry_then_advances() {
        let mut controller = controller();
        controller.handle_event(method("StartBrewing"));

        controller.handle_tick();

        let sent = &controller.transport().events;
        assert_eq!(sent.len(), 1);
        let body: serde_json::Value = serde_json::from_str(&sent[0].body).unwrap();
        // Snapshot was taken before the brew advanced
        assert_eq!(body["State"], "Pressurize water");
        assert_eq!(body["WaterLevel"], 51);
        assert_eq!(sent[0].property("waterLevelAlert"), Some("false"));

        assert_eq!(controller.brew().status(), BrewStatus::Brewing);
        assert_eq!(controller.brew().water_level(), 50);
        assert!(controller.is_playing());
    }

    #[test]
    fn test_full_brew_through_ticks() {
        let player = CountingPlayer::default();
        let plays = player.plays.clone();
        let stops = player.stops.clone();
        let mut controller = controller_with(RecordingTransport::default(), player);

        controller.handle_event(method("StartBrewing"));
        for _ in 0..20 {
            controller.handle_tick();
        }

        assert_eq!(controller.brew().status(), BrewStatus::NotBrewing);
        assert_eq!(controller.brew().water_level(), 31);
        assert_eq!(plays.get(), 1);
        assert_eq!(stops.get(), 1);
        assert!(!controller.is_playing());
        assert_eq!(controller.transport().events.len(), 20);
    }

    #[test]
    fn test_reset_while_brewing_stops_audio_once() {
        let player = CountingPlayer::default();
        let stops = player.stops.clone();
        let mut controller = controller_with(RecordingTransport::default(), player);

        controller.handle_event(method("StartBrewing"));
        controller.handle_tick();
        controller.handle_tick();
        assert_eq!(controller.brew().status(), BrewStatus::Brewing);

        controller.handle_event(method("ResetWaterLevel"));
        assert_eq!(controller.brew().status(), BrewStatus::NotBrewing);
        assert_eq!(stops.get(), 1);

        // Reset while idle: nothing left to stop
        controller.handle_event(method("ResetWaterLevel"));
        assert_eq!(stops.get(), 1);
    }

    #[test]
    fn test_commands_always_answered() {
        let mut controller = controller();

        controller.handle_event(method("StartBrewing"));
        controller.handle_event(method("StartBrewing"));
        controller.handle_event(method("ResetWaterLevel"));
        controller.handle_event(method("MakeTea"));

        let statuses: Vec<u16> = controller
            .transport()
            .responses
            .iter()
            .map(|(_, status, _)| *status)
            .collect();
        assert_eq!(statuses, vec![200, 200, 200, 404]);
    }

    #[test]
    fn test_response_failure_does_not_abort_command() {
        let transport = RecordingTransport {
            fail_sends: true,
            ..Default::default()
        };
        let mut controller = controller_with(transport, CountingPlayer::default());

        controller.handle_event(method("StartBrewing"));
        assert_eq!(controller.brew().status(), BrewStatus::Pressurizing);
    }

    #[test]
    fn test_desired_min_only() {
        let mut controller = controller();

        let patch = controller
            .handle_desired_properties(&json!({ "Watertemperature": { "min": 85 } }))
            .unwrap()
            .unwrap();

        assert_eq!(controller.config().min_water_temperature, 85.0);
        assert_eq!(controller.config().max_water_temperature, 100.0);
        assert_eq!(patch.water_temperature.min, 85.0);
        assert_eq!(patch.water_temperature.max, 100.0);
        assert_eq!(patch.water_temperature.wl, controller.brew().water_level());
        assert_eq!(controller.transport().reported, vec![patch]);
    }

    #[test]
    fn test_desired_with_bad_sibling_still_reports() {
        let mut controller = controller();

        let patch = controller
            .handle_desired_properties(&json!({ "Watertemperature": { "min": 85, "max": "hot" } }))
            .unwrap()
            .unwrap();

        assert_eq!(controller.config().min_water_temperature, 85.0);
        assert_eq!(controller.config().max_water_temperature, 100.0);
        assert_eq!(patch.water_temperature.min, 85.0);
        assert_eq!(controller.transport().reported, vec![patch]);
    }

    #[test]
    fn test_desired_without_section_is_only_logged() {
        let mut controller = controller();
        let result = controller
            .handle_desired_properties(&json!({ "$version": 3 }))
            .unwrap();

        assert!(result.is_none());
        assert!(controller.transport().reported.is_empty());
    }

    #[test]
    fn test_desired_report_failure_propagates() {
        let mut controller = controller();
        controller.transport_mut().fail_sends = true;

        let result = controller
            .handle_desired_properties(&json!({ "Watertemperature": { "max": 97 } }));
        assert!(result.is_err());
        assert_eq!(controller.config().max_water_temperature, 97.0);

        // Through the event path the failure is logged, not raised
        controller.handle_event(DeviceEvent::DesiredProperties(
            json!({ "Watertemperature": { "max": 98 } }),
        ));
        assert_eq!(controller.config().max_water_temperature, 98.0);
    }

    #[test]
    fn test_telemetry_uses_updated_bounds() {
        let mut controller = controller();
        controller
            .handle_desired_properties(&json!({ "Watertemperature": { "min": 90, "max": 91 } }))
            .unwrap();

        for _ in 0..10 {
            controller.handle_tick();
        }
        for message in &controller.transport().events {
            let body: serde_json::Value = serde_json::from_str(&message.body).unwrap();
            let temperature = body["WaterTemperature"].as_f64().unwrap();
            assert!((90.0..91.0).contains(&temperature));
        }
    }

    #[test]
    fn test_cloud_message_completed() {
        let mut controller = controller();
        let message = CloudMessage::new("descale soon");
        let id = message.message_id.clone();

        controller.handle_event(DeviceEvent::CloudMessage(message));
        assert_eq!(controller.transport().completed, vec![id]);
    }

    #[test]
    fn test_failed_open_skips_feature_registration() {
        let transport = RecordingTransport {
            fail_open: true,
            ..Default::default()
        };
        let mut controller = DeviceController::new(
            &SimulatorConfig::default(),
            transport,
            CountingPlayer::default(),
            StdRng::seed_from_u64(1),
        );

        assert!(!controller.open_session());

        controller.handle_event(DeviceEvent::CloudMessage(CloudMessage::new("hi")));
        assert!(controller.transport().completed.is_empty());

        let result = controller
            .handle_desired_properties(&json!({ "Watertemperature": { "min": 85 } }))
            .unwrap();
        assert!(result.is_none());
        assert_eq!(controller.config().min_water_temperature, 80.0);

        // Direct methods stay available
        controller.handle_event(method("StartBrewing"));
        assert_eq!(controller.transport().responses.len(), 1);
    }

    #[test]
    fn test_event_loop_processes_queued_events() {
        let channel = DeviceEventChannel::new();
        channel.try_send(method("StartBrewing")).unwrap();
        channel.try_send(DeviceEvent::Connected).unwrap();

        let mut controller = controller();
        embassy_futures::block_on(async {
            let _ = embassy_futures::select::select(
                controller.main_control_loop(&channel),
                embassy_time::Timer::after_millis(50),
            )
            .await;
        });

        assert_eq!(controller.brew().status(), BrewStatus::Pressurizing);
        assert!(controller.scheduler().is_running());
        assert_eq!(controller.transport().responses.len(), 1);
    }
}
