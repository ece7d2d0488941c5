//! Leveling session: the operator-facing object tying everything together.
//!
//! ```text
//!  operator ──▶ handle(cmd) ──▶ AccessPolicy
//!                   │
//!                   ├─ probe_start ────▶ reload ─▶ ProbeController::start
//!                   ├─ probe_cancel ───▶ ProbeController::cancel
//!                   └─ profile_changed ▶ reload
//!
//!  send(lines) ─▶ InterceptingChannel ─▶ device
//!  device line ─▶ deliver_line ─▶ ResponseSlot
//! ```

use crate::access::AccessPolicy;
use crate::channel::{CommandChannel, InterceptingChannel};
use crate::error::{Error, Result};
use crate::grid::GridProfile;
use crate::notify::NotificationSink;
use crate::probe::{ProbeController, ProbeOptions, ProbeStatus, ResponseSlot};
use crate::shared::SharedProfile;
use crate::store::SettingsStore;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Command an operator can issue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorCommand {
    ProbeStart,
    ProbeCancel,
    ProfileChanged,
}

impl OperatorCommand {
    pub fn name(self) -> &'static str {
        match self {
            Self::ProbeStart => "probe_start",
            Self::ProbeCancel => "probe_cancel",
            Self::ProfileChanged => "profile_changed",
        }
    }
}

impl fmt::Display for OperatorCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for OperatorCommand {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "probe_start" => Ok(Self::ProbeStart),
            "probe_cancel" => Ok(Self::ProbeCancel),
            "profile_changed" => Ok(Self::ProfileChanged),
            other => Err(Error::UnknownCommand(other.to_string())),
        }
    }
}

/// External collaborators a session is built from
pub struct Collaborators {
    /// Raw channel to the device; the session wraps it in the engine
    pub channel: Arc<dyn CommandChannel>,
    pub sink: Arc<dyn NotificationSink>,
    pub store: Arc<dyn SettingsStore>,
    pub access: Arc<dyn AccessPolicy>,
}

/// Cached profile, interception engine and probe controller for one device
pub struct LevelingSession {
    profile: SharedProfile,
    channel: Arc<InterceptingChannel<Arc<dyn CommandChannel>>>,
    controller: ProbeController,
    store: Arc<dyn SettingsStore>,
    access: Arc<dyn AccessPolicy>,
}

impl LevelingSession {
    /// Load the active profile and wire up the controller.
    ///
    /// `slot` is the same slot the device's line handler delivers into, so it
    /// can be created before the device connection is opened.
    pub fn new(
        collaborators: Collaborators,
        options: ProbeOptions,
        slot: Arc<ResponseSlot>,
    ) -> Result<Self> {
        let Collaborators {
            channel,
            sink,
            store,
            access,
        } = collaborators;

        let set = store.load()?;
        let active = set.active()?.clone();
        log::info!("Active profile '{}'", set.selected_profile);
        let profile = SharedProfile::new(&set.selected_profile, active);

        let channel = Arc::new(InterceptingChannel::new(channel, profile.clone()));
        let controller = ProbeController::new(
            channel.clone(),
            sink,
            store.clone(),
            profile.clone(),
            slot,
            options,
        );

        Ok(Self {
            profile,
            channel,
            controller,
            store,
            access,
        })
    }

    /// Run an operator command after checking the operator's permission
    pub fn handle(&self, operator: &str, command: OperatorCommand) -> Result<()> {
        if !self.access.authorize(operator, command) {
            log::warn!("Operator '{}' may not run {}", operator, command);
            return Err(Error::Permission(format!(
                "operator '{}' may not run {}",
                operator, command
            )));
        }
        log::debug!("Operator '{}' runs {}", operator, command);

        match command {
            OperatorCommand::ProbeStart => {
                // Reloading mid-session would swap the profile under the engine
                if self.controller.status() == ProbeStatus::Probing {
                    return Err(Error::AlreadyProbing);
                }
                self.reload()?;
                self.controller.start()
            }
            OperatorCommand::ProbeCancel => {
                if !self.controller.cancel() {
                    log::debug!("Cancel requested while not probing");
                }
                Ok(())
            }
            OperatorCommand::ProfileChanged => self.reload(),
        }
    }

    /// Parse and run a command given by name
    pub fn handle_named(&self, operator: &str, command: &str) -> Result<()> {
        self.handle(operator, command.parse()?)
    }

    /// Re-read the selected profile from the store.
    ///
    /// A running session keeps the profile it started with and commits its
    /// matrix only if that profile is still selected.
    pub fn reload(&self) -> Result<()> {
        let set = self.store.load()?;
        let active = set.active()?.clone();
        log::info!("Reloaded profile '{}'", set.selected_profile);
        self.profile.replace(&set.selected_profile, active);
        Ok(())
    }

    /// Send commands through the interception engine to the device
    pub fn send(&self, commands: &[String]) -> Result<()> {
        self.channel.send(commands)
    }

    /// Offer a line received from the device to the probe controller
    pub fn deliver_line(&self, line: &str) -> bool {
        self.controller.deliver_line(line)
    }

    pub fn status(&self) -> ProbeStatus {
        self.controller.status()
    }

    /// Snapshot of the active profile
    pub fn profile(&self) -> Arc<GridProfile> {
        self.profile.snapshot()
    }

    /// Name of the active profile
    pub fn profile_name(&self) -> String {
        self.profile.current().name
    }

    /// Block until a running probe session has finished
    pub fn wait_probe(&self) -> Result<()> {
        self.controller.wait()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::{AllowAll, OperatorList};
    use crate::channel::RecordingChannel;
    use crate::notify::LogSink;
    use crate::store::MemoryStore;
    use std::time::Duration;

    fn profile_with_matrix() -> GridProfile {
        GridProfile {
            min_x: 0.0,
            max_x: 10.0,
            min_y: 0.0,
            max_y: 10.0,
            count_x: 2,
            count_y: 2,
            lift: 1.0,
            ..Default::default()
        }
        .with_matrix(
            vec![
                [0.0, 0.0, 0.0],
                [10.0, 0.0, 0.0],
                [0.0, 10.0, 0.0],
                [10.0, 10.0, 1.0],
            ],
            1.0,
        )
    }

    fn session_with(
        store: Arc<MemoryStore>,
        access: Arc<dyn AccessPolicy>,
    ) -> (LevelingSession, Arc<RecordingChannel>) {
        let channel = Arc::new(RecordingChannel::new());
        let session = LevelingSession::new(
            Collaborators {
                channel: channel.clone(),
                sink: Arc::new(LogSink),
                store,
                access,
            },
            ProbeOptions {
                response_timeout: Duration::from_millis(100),
                debug: true,
            },
            Arc::new(ResponseSlot::new()),
        )
        .unwrap();
        (session, channel)
    }

    #[test]
    fn test_command_names() {
        assert_eq!(
            "probe_start".parse::<OperatorCommand>().unwrap(),
            OperatorCommand::ProbeStart
        );
        assert_eq!(OperatorCommand::ProfileChanged.to_string(), "profile_changed");
        assert!(matches!(
            "probe_pause".parse::<OperatorCommand>(),
            Err(Error::UnknownCommand(name)) if name == "probe_pause"
        ));
    }

    #[test]
    fn test_send_goes_through_engine() {
        let store = Arc::new(MemoryStore::with_profile("pcb", profile_with_matrix()));
        let (session, channel) = session_with(store, Arc::new(AllowAll));
        session
            .send(&["G1 X5 Y5".to_string(), "M3".to_string()])
            .unwrap();
        assert_eq!(channel.sent(), vec!["G1 X5 Y5 Z0.250", "M3"]);
    }

    #[test]
    fn test_permission_checked_first() {
        let store = Arc::new(MemoryStore::with_profile("pcb", profile_with_matrix()));
        let (session, channel) = session_with(store, Arc::new(OperatorList::new(["alice"])));
        assert!(matches!(
            session.handle("mallory", OperatorCommand::ProbeStart),
            Err(Error::Permission(_))
        ));
        assert_eq!(session.status(), ProbeStatus::Idle);
        assert!(channel.sent().is_empty());
    }

    #[test]
    fn test_profile_changed_reloads() {
        let store = Arc::new(MemoryStore::with_profile("pcb", profile_with_matrix()));
        store
            .save_profile("other", &GridProfile::default())
            .unwrap();
        let (session, channel) = session_with(store.clone(), Arc::new(AllowAll));
        assert!(session.profile().has_matrix());

        store.select("other");
        session
            .handle_named("anyone", "profile_changed")
            .unwrap();
        assert_eq!(session.profile_name(), "other");
        assert!(!session.profile().has_matrix());

        session.send(&["G1 X5 Y5".to_string()]).unwrap();
        assert_eq!(channel.sent(), vec!["G1 X5 Y5"]);
    }

    #[test]
    fn test_missing_selected_profile() {
        let store = Arc::new(MemoryStore::with_profile("pcb", profile_with_matrix()));
        let (session, _) = session_with(store.clone(), Arc::new(AllowAll));
        store.select("gone");
        assert!(matches!(session.reload(), Err(Error::ProfileNotFound(_))));
        assert_eq!(session.profile_name(), "pcb");
    }

    #[test]
    fn test_probe_start_in_debug_mode() {
        let store = Arc::new(MemoryStore::with_profile("pcb", profile_with_matrix()));
        let (session, channel) = session_with(store.clone(), Arc::new(AllowAll));
        session.handle("anyone", OperatorCommand::ProbeStart).unwrap();
        session.wait_probe().unwrap();

        assert_eq!(session.status(), ProbeStatus::Idle);
        assert!(session.profile().matrix.iter().all(|p| p[2] == 0.5));
        assert_eq!(store.snapshot().profiles["pcb"], *session.profile());

        // Probe requests pass the engine too, so each gets the lift prefix
        let sent = channel.sent();
        assert_eq!(sent.len(), 16);
        assert_eq!(&sent[..4], ["G91", "G0 Z1.000", "G90", "G30 X0.000 Y0.000"]);
    }

    #[test]
    fn test_cancel_when_idle_is_harmless() {
        let store = Arc::new(MemoryStore::with_profile("pcb", profile_with_matrix()));
        let (session, _) = session_with(store, Arc::new(AllowAll));
        session.handle("anyone", OperatorCommand::ProbeCancel).unwrap();
        assert_eq!(session.status(), ProbeStatus::Idle);
    }
}
