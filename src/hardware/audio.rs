use log::{debug, error, info, warn};
use std::process::{Child, Command, Stdio};

pub trait AudioPlayer {
    type Handle: EffectHandle;

    fn play(&mut self, effect: &str) -> Result<Self::Handle, AudioError>;
}

pub trait EffectHandle {
    fn stop(&mut self) -> Result<(), AudioError>;
}

/// Brewing sound effect. Starting while playing and stopping while stopped are no-ops.
pub struct AudioEffect<P: AudioPlayer> {
    player: P,
    effect: String,
    current: Option<P::Handle>,
}

impl<P: AudioPlayer> AudioEffect<P> {
    pub fn new(player: P, effect: impl Into<String>) -> Self {
        Self {
            player,
            effect: effect.into(),
            current: None,
        }
    }

    pub fn start(&mut self) {
        if self.current.is_some() {
            return; // Already playing
        }

        match self.player.play(&self.effect) {
            Ok(handle) => {
                debug!("Started sound effect {}", self.effect);
                self.current = Some(handle);
            }
            Err(e) => error!("Failed to play {}: {}", self.effect, e),
        }
    }

    pub fn stop(&mut self) {
        let Some(mut handle) = self.current.take() else {
            return; // Already stopped
        };

        if let Err(e) = handle.stop() {
            warn!("Failed to stop {}: {}", self.effect, e);
        } else {
            debug!("Stopped sound effect {}", self.effect);
        }
    }

    pub fn is_playing(&self) -> bool {
        self.current.is_some()
    }
}

/// Plays effects by spawning an external player program with the effect file as
/// its argument. Without a program it only logs, which keeps headless runs quiet.
pub struct ProcessPlayer {
    program: Option<String>,
}

impl ProcessPlayer {
    pub fn new(program: Option<String>) -> Self {
        if program.is_none() {
            info!("No audio player configured, sound effects are silent");
        }
        Self { program }
    }
}

impl AudioPlayer for ProcessPlayer {
    type Handle = EffectProcess;

    fn play(&mut self, effect: &str) -> Result<Self::Handle, AudioError> {
        let Some(program) = self.program.as_deref() else {
            info!("(silent) playing {}", effect);
            return Ok(EffectProcess { child: None });
        };

        let child = Command::new(program)
            .arg(effect)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| AudioError::SpawnFailed(format!("{} {}: {}", program, effect, e)))?;

        Ok(EffectProcess { child: Some(child) })
    }
}

pub struct EffectProcess {
    child: Option<Child>,
}

impl EffectHandle for EffectProcess {
    fn stop(&mut self) -> Result<(), AudioError> {
        let Some(mut child) = self.child.take() else {
            info!("(silent) stopping effect");
            return Ok(());
        };

        // The player may have exited on its own at the end of the clip
        if let Ok(Some(_)) = child.try_wait() {
            return Ok(());
        }

        child
            .kill()
            .map_err(|e| AudioError::StopFailed(e.to_string()))?;
        child
            .wait()
            .map_err(|e| AudioError::StopFailed(e.to_string()))?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub enum AudioError {
    SpawnFailed(String),
    StopFailed(String),
}

impl std::fmt::Display for AudioError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AudioError::SpawnFailed(msg) => write!(f, "could not start player: {}", msg),
            AudioError::StopFailed(msg) => write!(f, "could not stop player: {}", msg),
        }
    }
}

impl std::error::Error for AudioError {}
