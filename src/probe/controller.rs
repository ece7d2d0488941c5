//! Probe session thread and its controller handle

use super::pattern::ResponsePattern;
use super::slot::ResponseSlot;
use super::{ProbeStatus, coords_equal};
use crate::channel::CommandChannel;
use crate::config::ProbingConfig;
use crate::error::{Error, Result};
use crate::gcode::GCodeLine;
use crate::grid::{GridProfile, Sample};
use crate::notify::{Notification, NotificationSink};
use crate::shared::{ActiveProfile, SharedProfile};
use crate::store::SettingsStore;
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Height reported by the local echo in debug mode
const DEBUG_REPORT_Z: f64 = 0.5;

/// Probe session settings
#[derive(Debug, Clone, Copy)]
pub struct ProbeOptions {
    /// Wait per probe report
    pub response_timeout: Duration,
    /// Echo a matching report locally instead of waiting for hardware
    pub debug: bool,
}

impl Default for ProbeOptions {
    fn default() -> Self {
        Self {
            response_timeout: Duration::from_secs(20),
            debug: false,
        }
    }
}

impl TryFrom<&ProbingConfig> for ProbeOptions {
    type Error = Error;

    fn try_from(config: &ProbingConfig) -> Result<Self> {
        Ok(Self {
            response_timeout: config.timeout()?,
            debug: config.debug,
        })
    }
}

/// State shared between the controller and its session thread
struct Shared {
    /// Also the cancellation token: the session runs while this is PROBING
    status: Mutex<ProbeStatus>,
    slot: Arc<ResponseSlot>,
    channel: Arc<dyn CommandChannel>,
    sink: Arc<dyn NotificationSink>,
    store: Arc<dyn SettingsStore>,
    profile: SharedProfile,
    options: ProbeOptions,
}

/// Starts, cancels and feeds probe sessions; at most one runs at a time
pub struct ProbeController {
    shared: Arc<Shared>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl ProbeController {
    pub fn new(
        channel: Arc<dyn CommandChannel>,
        sink: Arc<dyn NotificationSink>,
        store: Arc<dyn SettingsStore>,
        profile: SharedProfile,
        slot: Arc<ResponseSlot>,
        options: ProbeOptions,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                status: Mutex::new(ProbeStatus::Idle),
                slot,
                channel,
                sink,
                store,
                profile,
                options,
            }),
            handle: Mutex::new(None),
        }
    }

    pub fn status(&self) -> ProbeStatus {
        *self.shared.status.lock()
    }

    /// Start probing the active profile's grid on a background thread.
    ///
    /// Rejected while a session is running, including one that was cancelled
    /// but is still finishing its last response wait.
    pub fn start(&self) -> Result<()> {
        let mut handle = self.handle.lock();
        if handle.as_ref().is_some_and(|h| !h.is_finished()) {
            return Err(Error::AlreadyProbing);
        }
        if let Some(finished) = handle.take() {
            finished.join().map_err(|_| Error::ThreadPanic)?;
        }

        let active = self.shared.profile.current();
        active.profile.spacing()?;

        {
            let mut status = self.shared.status.lock();
            if *status == ProbeStatus::Probing {
                return Err(Error::AlreadyProbing);
            }
            *status = ProbeStatus::Probing;
        }
        log::info!(
            "Probing profile '{}' ({}x{} points)",
            active.name,
            active.profile.count_x,
            active.profile.count_y
        );
        self.shared
            .sink
            .notify(Notification::status(ProbeStatus::Probing, "Probing started"));

        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new()
            .name("probe-session".to_string())
            .spawn(move || shared.run(active));
        match spawned {
            Ok(h) => {
                *handle = Some(h);
                Ok(())
            }
            Err(e) => {
                let error = Error::Other(format!("Failed to spawn probe thread: {}", e));
                self.shared.fail(&error);
                Err(error)
            }
        }
    }

    /// Ask the running session to stop at the next point.
    ///
    /// Returns false when no session was probing.
    pub fn cancel(&self) -> bool {
        {
            let mut status = self.shared.status.lock();
            if *status != ProbeStatus::Probing {
                return false;
            }
            *status = ProbeStatus::Cancel;
        }
        log::info!("Probing cancel requested");
        self.shared.sink.notify(Notification::status(
            ProbeStatus::Cancel,
            "Probing cancelled, matrix not saved",
        ));
        true
    }

    /// Response feed: offer one line received from the device
    pub fn deliver_line(&self, line: &str) -> bool {
        self.shared.slot.deliver(line)
    }

    /// Block until the current session thread (if any) has finished
    pub fn wait(&self) -> Result<()> {
        let handle = self.handle.lock().take();
        match handle {
            Some(handle) => handle.join().map_err(|_| Error::ThreadPanic),
            None => Ok(()),
        }
    }
}

impl Shared {
    fn run(&self, active: ActiveProfile) {
        match self.probe_matrix(&active.profile) {
            Ok(Some(matrix)) => self.commit(&active, matrix),
            Ok(None) => log::info!("Probing stopped before completion, matrix unchanged"),
            Err(e) => self.fail(&e),
        }
    }

    /// Measure every point; `None` when the session was cancelled
    fn probe_matrix(&self, profile: &GridProfile) -> Result<Option<Vec<Sample>>> {
        let points = profile.probe_points()?;
        let total = points.len();
        let mut matrix = Vec::with_capacity(total);

        for (index, (x, y)) in points.into_iter().enumerate() {
            if *self.status.lock() != ProbeStatus::Probing {
                return Ok(None);
            }
            self.sink.notify(Notification::status(
                ProbeStatus::Probing,
                format!("Probing point {} of {}...", index + 1, total),
            ));

            let [reported_x, reported_y, z] =
                self.request_probe(x, y)?.ok_or(Error::Timeout { x, y })?;
            if !coords_equal(reported_x, x) || !coords_equal(reported_y, y) {
                return Err(Error::CoordinateMismatch {
                    expected: (x, y),
                    got: (reported_x, reported_y),
                });
            }

            let point = [x, y, z];
            log::debug!("Point {}/{}: {:.3}, {:.3} -> {:.3}", index + 1, total, x, y, z);
            self.sink.notify(Notification::Point { point });
            matrix.push(point);
        }
        Ok(Some(matrix))
    }

    /// Send one probe request and wait for the matching report
    fn request_probe(&self, x: f64, y: f64) -> Result<Option<[f64; 3]>> {
        let command = GCodeLine::new("G30").with('X', x).with('Y', y).to_string();

        // Armed before sending so a fast reply cannot slip past
        let wait = self.slot.arm(ResponsePattern::probe_report());
        if let Err(e) = self.channel.send(&[command]) {
            self.slot.disarm();
            return Err(e);
        }
        if self.options.debug {
            self.slot.deliver(&format!(
                "Bed X: {:.3} Y: {:.3} Z: {:.3}",
                x, y, DEBUG_REPORT_Z
            ));
        }

        let response = wait.wait(self.options.response_timeout);
        if response.is_none() {
            self.slot.disarm();
        }
        Ok(response)
    }

    fn commit(&self, active: &ActiveProfile, matrix: Vec<Sample>) {
        let updated = active.profile.with_matrix(matrix, unix_now());
        {
            // Held through the commit so a late cancel cannot interleave
            let mut status = self.status.lock();
            if *status != ProbeStatus::Probing {
                log::info!("Probing cancelled after the last point, matrix unchanged");
                return;
            }
            if let Err(e) = self.store.save_profile(&active.name, &updated) {
                *status = ProbeStatus::Error;
                drop(status);
                log::error!("Failed to save probed matrix: {}", e);
                self.sink.notify(Notification::status(
                    ProbeStatus::Error,
                    format!("Matrix could not be saved: {}", e),
                ));
                return;
            }
            if !self.profile.commit(&active.name, updated.clone()) {
                log::info!(
                    "Profile '{}' saved; another profile is active now",
                    active.name
                );
            }
            *status = ProbeStatus::Idle;
        }

        log::info!("Probing finished, {} samples saved", updated.matrix.len());
        self.sink.notify(Notification::Profile { profile: updated });
        self.sink
            .notify(Notification::status(ProbeStatus::Idle, "Probing finished"));
    }

    /// End the session with an error, unless it was cancelled meanwhile
    fn fail(&self, error: &Error) {
        {
            let mut status = self.status.lock();
            if *status == ProbeStatus::Cancel {
                log::info!("Cancelled session ended with: {}", error);
                return;
            }
            *status = ProbeStatus::Error;
        }
        log::error!("{}", error);
        self.sink
            .notify(Notification::status(ProbeStatus::Error, error.to_string()));
    }
}

fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}
