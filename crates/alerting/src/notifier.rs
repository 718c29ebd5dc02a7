//! Alert channels and the fallback chain

use std::path::PathBuf;
use std::process::{Command, Stdio};

use tracing::{debug, warn};

use crate::{AlertEvent, NotifyError};

/// One way of presenting an alert to the driver.
///
/// `notify` may block; the dispatcher calls it off the async runtime.
pub trait AlertNotifier: Send + Sync {
    fn name(&self) -> &str;

    fn notify(&self, alert: &AlertEvent) -> Result<(), NotifyError>;
}

/// Which channel presented an alert
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub channel: String,
}

/// Ordered channels, tried until one succeeds
#[derive(Default)]
pub struct NotifierChain {
    notifiers: Vec<Box<dyn AlertNotifier>>,
}

impl NotifierChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, notifier: impl AlertNotifier + 'static) {
        self.notifiers.push(Box::new(notifier));
    }

    pub fn with(mut self, notifier: impl AlertNotifier + 'static) -> Self {
        self.push(notifier);
        self
    }

    pub fn channels(&self) -> Vec<&str> {
        self.notifiers.iter().map(|n| n.name()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.notifiers.is_empty()
    }

    pub fn deliver(&self, alert: &AlertEvent) -> Result<Delivery, NotifyError> {
        for notifier in &self.notifiers {
            match notifier.notify(alert) {
                Ok(()) => {
                    debug!("Alert delivered via {}", notifier.name());
                    return Ok(Delivery {
                        channel: notifier.name().to_string(),
                    });
                }
                Err(e) => warn!("Alert channel {} failed: {}", notifier.name(), e),
            }
        }
        Err(NotifyError::AllFailed)
    }
}

/// Runs an external program, e.g. an audio player or a speech synthesizer.
///
/// Arguments may contain `{message}` and `{file}` placeholders.
pub struct CommandNotifier {
    name: String,
    program: String,
    args: Vec<String>,
    message: String,
    file: Option<PathBuf>,
}

impl CommandNotifier {
    pub fn new(name: &str, command: Vec<String>, message: &str) -> Result<Self, NotifyError> {
        let mut parts = command.into_iter();
        let program = parts
            .next()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| NotifyError::EmptyCommand(name.to_string()))?;

        Ok(Self {
            name: name.to_string(),
            program,
            args: parts.collect(),
            message: message.to_string(),
            file: None,
        })
    }

    pub fn with_file(mut self, file: PathBuf) -> Self {
        self.file = Some(file);
        self
    }

    fn expand(&self, arg: &str) -> String {
        let mut out = arg.replace("{message}", &self.message);
        if let Some(file) = &self.file {
            out = out.replace("{file}", &file.to_string_lossy());
        }
        out
    }

    /// Final argument list after placeholder substitution
    pub fn args(&self) -> Vec<String> {
        self.args.iter().map(|a| self.expand(a)).collect()
    }
}

impl AlertNotifier for CommandNotifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn notify(&self, _alert: &AlertEvent) -> Result<(), NotifyError> {
        let status = Command::new(&self.program)
            .args(self.args())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .status()
            .map_err(|source| NotifyError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(NotifyError::ExitStatus {
                program: self.program.clone(),
                code: status.code(),
            })
        }
    }
}

/// Last-resort channel: a warning in the log
pub struct LogNotifier {
    message: String,
}

impl LogNotifier {
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

impl AlertNotifier for LogNotifier {
    fn name(&self) -> &str {
        "log"
    }

    fn notify(&self, alert: &AlertEvent) -> Result<(), NotifyError> {
        warn!(
            "Alert: {} (EAR {:.3}, {} frames, at {})",
            self.message, alert.score, alert.closed_frames, alert.timestamp
        );
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::{Arc, Mutex};

    pub(crate) fn event(closed_frames: u32) -> AlertEvent {
        AlertEvent {
            timestamp: Utc::now(),
            score: 0.1,
            closed_frames,
        }
    }

    pub(crate) struct Failing;

    impl AlertNotifier for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        fn notify(&self, _alert: &AlertEvent) -> Result<(), NotifyError> {
            Err(NotifyError::ExitStatus {
                program: "failing".into(),
                code: Some(1),
            })
        }
    }

    #[derive(Clone, Default)]
    pub(crate) struct Recording(pub Arc<Mutex<Vec<AlertEvent>>>);

    impl AlertNotifier for Recording {
        fn name(&self) -> &str {
            "recording"
        }

        fn notify(&self, alert: &AlertEvent) -> Result<(), NotifyError> {
            self.0.lock().unwrap().push(*alert);
            Ok(())
        }
    }

    #[test]
    fn test_falls_through_to_next_channel() {
        let recording = Recording::default();
        let chain = NotifierChain::new().with(Failing).with(recording.clone());

        let delivery = chain.deliver(&event(5)).unwrap();
        assert_eq!(delivery.channel, "recording");
        assert_eq!(recording.0.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_first_success_stops_chain() {
        let first = Recording::default();
        let second = Recording::default();
        let chain = NotifierChain::new().with(first.clone()).with(second.clone());

        chain.deliver(&event(5)).unwrap();
        assert_eq!(first.0.lock().unwrap().len(), 1);
        assert!(second.0.lock().unwrap().is_empty());
    }

    #[test]
    fn test_all_failed() {
        let chain = NotifierChain::new().with(Failing).with(Failing);
        assert!(matches!(chain.deliver(&event(5)), Err(NotifyError::AllFailed)));
        assert!(matches!(NotifierChain::new().deliver(&event(5)), Err(NotifyError::AllFailed)));
    }

    #[test]
    fn test_log_notifier_always_succeeds() {
        let chain = NotifierChain::new().with(LogNotifier::new("wake up"));
        assert_eq!(chain.deliver(&event(5)).unwrap().channel, "log");
    }

    #[test]
    fn test_command_placeholders() {
        let notifier = CommandNotifier::new(
            "tone",
            vec!["aplay".into(), "-q".into(), "{file}".into(), "--title={message}".into()],
            "Wake up!",
        )
        .unwrap()
        .with_file(PathBuf::from("/tmp/tone.wav"));

        assert_eq!(notifier.args(), vec!["-q", "/tmp/tone.wav", "--title=Wake up!"]);
    }

    #[test]
    fn test_empty_command_rejected() {
        assert!(matches!(
            CommandNotifier::new("speech", vec![], "hi"),
            Err(NotifyError::EmptyCommand(_))
        ));
    }

    #[test]
    fn test_missing_program_is_spawn_error() {
        let notifier = CommandNotifier::new(
            "speech",
            vec!["definitely-not-an-installed-program-4711".into()],
            "hi",
        )
        .unwrap();
        assert!(matches!(notifier.notify(&event(5)), Err(NotifyError::Spawn { .. })));
    }
}
