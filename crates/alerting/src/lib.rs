//! Alert presentation
//!
//! Turns drowsiness alert events into something the driver notices: spoken
//! message, synthesized beeps, or at minimum a log line. Channels are tried
//! in order until one succeeds.

mod dispatcher;
mod notifier;
mod tally;
pub mod tone;

pub use dispatcher::AlertDispatcher;
pub use notifier::{AlertNotifier, CommandNotifier, Delivery, LogNotifier, NotifierChain};
pub use tally::AlertTally;
pub use tone::{Beep, ToneSequence};

pub use dms::AlertEvent;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use tracing::info;

/// Message spoken or logged when an alert fires
pub const DEFAULT_MESSAGE: &str = "Wake up! Your eyes are closed!";

/// Message used when checking the channels by hand
pub const TEST_MESSAGE: &str = "Voice test - Wake up! This is working!";

/// Alert presentation errors
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with status {code:?}")]
    ExitStatus { program: String, code: Option<i32> },

    #[error("Empty command line for {0}")]
    EmptyCommand(String),

    #[error("WAV encoding failed: {0}")]
    Wav(#[from] hound::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("All alert channels failed")]
    AllFailed,
}

/// Alert presentation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertSettings {
    /// Play the beep sequence
    pub sound: bool,
    /// Speak the message
    pub speech: bool,
    pub message: String,
    pub tone_sample_rate: u32,
    /// Audio player; `{file}` is replaced with the rendered tone path
    pub player_command: Vec<String>,
    /// Text-to-speech program; `{message}` is replaced with the message
    pub speech_command: Vec<String>,
    /// Where the rendered tone is written
    pub tone_path: Option<PathBuf>,
}

impl Default for AlertSettings {
    fn default() -> Self {
        Self {
            sound: true,
            speech: true,
            message: DEFAULT_MESSAGE.to_string(),
            tone_sample_rate: tone::DEFAULT_SAMPLE_RATE,
            player_command: vec!["aplay".into(), "-q".into(), "{file}".into()],
            speech_command: vec!["espeak".into(), "{message}".into()],
            tone_path: None,
        }
    }
}

impl AlertSettings {
    /// Build the notifier chain: speech, then beeps, then the log line.
    ///
    /// Renders the tone file up front when sound is enabled.
    pub fn build_chain(&self) -> Result<NotifierChain, NotifyError> {
        let mut chain = NotifierChain::new();

        if self.speech && !self.speech_command.is_empty() {
            chain.push(CommandNotifier::new("speech", self.speech_command.clone(), &self.message)?);
        }

        if self.sound && !self.player_command.is_empty() {
            let path = self
                .tone_path
                .clone()
                .unwrap_or_else(|| std::env::temp_dir().join("drowsy-alert-tone.wav"));
            let wav = ToneSequence::default().to_wav(self.tone_sample_rate)?;
            std::fs::write(&path, wav)?;
            info!("Alert tone written to {}", path.display());

            let notifier = CommandNotifier::new("tone", self.player_command.clone(), &self.message)?
                .with_file(path);
            chain.push(notifier);
        }

        chain.push(LogNotifier::new(&self.message));
        Ok(chain)
    }

    /// Send a manual alert with the test message through a fresh chain.
    ///
    /// Blocks until a channel has presented it.
    pub fn test_alert(&self) -> Result<Delivery, NotifyError> {
        info!("Testing voice alert...");
        let settings = AlertSettings {
            message: TEST_MESSAGE.to_string(),
            ..self.clone()
        };
        let delivery = settings.build_chain()?.deliver(&AlertEvent::manual(Utc::now()))?;
        info!("Test alert presented via {}", delivery.channel);
        Ok(delivery)
    }
}
