use brew_twin::console::{spawn_stdin_reader, ConsoleTransport};
use brew_twin::controller::DeviceController;
use brew_twin::hardware::ProcessPlayer;
use brew_twin::system::{DeviceEventChannel, EventPublisher, SimulatorConfig};
use embassy_executor::Spawner;
use log::{error, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;

static EVENTS: DeviceEventChannel = DeviceEventChannel::new();

#[embassy_executor::main]
async fn main(_spawner: Spawner) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("Starting coffee machine twin simulator");

    let config = match SimulatorConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {:#}", e);
            return;
        }
    };

    let publisher = EventPublisher::new(&EVENTS);
    if let Err(e) = spawn_stdin_reader(publisher) {
        warn!("Console input unavailable: {} - running without inbound commands", e);
    }

    let transport = ConsoleTransport::new(publisher, config.connection_string.clone());
    let player = ProcessPlayer::new(config.audio_player.clone());

    let mut controller = DeviceController::new(&config, transport, player, StdRng::from_entropy());

    controller.start(&EVENTS).await;
}
