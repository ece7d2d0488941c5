//! Command channels: ordered, fire-and-forget delivery of commands.
//!
//! - [`SerialChannel`]: newline-terminated commands over a serial port, with
//!   a reader thread handing every response line to a callback
//! - [`InterceptingChannel`]: runs commands through the interception engine
//!   before forwarding them
//! - [`WriterChannel`]: writes commands to any `Write` (files, stdout)
//! - [`RecordingChannel`]: keeps sent commands in memory

use crate::config::DeviceConfig;
use crate::engine::InterceptionEngine;
use crate::error::{Error, Result};
use crate::shared::SharedProfile;
use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use serialport::SerialPort;
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Ordered command dispatch to the controlled device
pub trait CommandChannel: Send + Sync {
    /// Send commands in order without waiting for the device
    fn send(&self, commands: &[String]) -> Result<()>;
}

impl<C: CommandChannel + ?Sized> CommandChannel for Arc<C> {
    fn send(&self, commands: &[String]) -> Result<()> {
        (**self).send(commands)
    }
}

/// Channel that filters every command through the interception engine.
///
/// The engine lock is held until the inner channel accepted the commands, so
/// commands reach the device in the order they were filtered.
pub struct InterceptingChannel<C: CommandChannel> {
    engine: Mutex<InterceptionEngine>,
    profile: SharedProfile,
    inner: C,
}

impl<C: CommandChannel> InterceptingChannel<C> {
    pub fn new(inner: C, profile: SharedProfile) -> Self {
        Self {
            engine: Mutex::new(InterceptionEngine::new()),
            profile,
            inner,
        }
    }

    /// Access the wrapped channel
    pub fn inner(&self) -> &C {
        &self.inner
    }

    pub fn into_inner(self) -> C {
        self.inner
    }
}

impl<C: CommandChannel> CommandChannel for InterceptingChannel<C> {
    fn send(&self, commands: &[String]) -> Result<()> {
        let profile = self.profile.snapshot();
        let mut engine = self.engine.lock();
        let filtered: Vec<String> = commands
            .iter()
            .flat_map(|command| engine.filter(command, &profile))
            .collect();
        self.inner.send(&filtered)
    }
}

/// In-memory channel, optionally feeding a receiver with every command
#[derive(Default)]
pub struct RecordingChannel {
    sent: Mutex<Vec<String>>,
    feed: Option<Sender<String>>,
}

impl RecordingChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Channel plus a receiver seeing each command as it is sent
    pub fn with_feed() -> (Self, Receiver<String>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (
            Self {
                sent: Mutex::new(Vec::new()),
                feed: Some(tx),
            },
            rx,
        )
    }

    /// All commands sent so far
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().clone()
    }
}

impl CommandChannel for RecordingChannel {
    fn send(&self, commands: &[String]) -> Result<()> {
        let mut sent = self.sent.lock();
        for command in commands {
            sent.push(command.clone());
            if let Some(feed) = &self.feed {
                // Receiver gone just means nobody is listening
                let _ = feed.send(command.clone());
            }
        }
        Ok(())
    }
}

/// Writes each command as a line
pub struct WriterChannel<W: Write + Send> {
    out: Mutex<W>,
}

impl<W: Write + Send> WriterChannel<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }

    pub fn flush(&self) -> Result<()> {
        self.out.lock().flush()?;
        Ok(())
    }
}

impl<W: Write + Send> CommandChannel for WriterChannel<W> {
    fn send(&self, commands: &[String]) -> Result<()> {
        let mut out = self.out.lock();
        for command in commands {
            writeln!(out, "{}", command)?;
        }
        Ok(())
    }
}

/// Serial connection to the device.
///
/// Writes happen on the caller's thread; a reader thread splits incoming
/// bytes into lines and hands each to the line handler.
pub struct SerialChannel {
    port: Mutex<Box<dyn SerialPort>>,
    shutdown: Arc<AtomicBool>,
    reader_handle: Option<JoinHandle<()>>,
}

impl SerialChannel {
    /// Open the port and start the reader thread
    pub fn open<F>(config: &DeviceConfig, on_line: F) -> Result<Self>
    where
        F: Fn(&str) + Send + 'static,
    {
        let port = serialport::new(&config.port, config.baud_rate)
            .timeout(Duration::from_millis(config.read_timeout_ms))
            .open()?;
        log::info!("Opened serial port: {} at {} baud", config.port, config.baud_rate);

        let reader_port = port.try_clone()?;
        let shutdown = Arc::new(AtomicBool::new(false));
        let reader_shutdown = Arc::clone(&shutdown);
        let reader_handle = thread::Builder::new()
            .name("serial-reader".to_string())
            .spawn(move || reader_loop(reader_port, reader_shutdown, on_line))
            .map_err(|e| Error::Other(format!("Failed to spawn reader thread: {}", e)))?;

        Ok(Self {
            port: Mutex::new(port),
            shutdown,
            reader_handle: Some(reader_handle),
        })
    }

    /// Stop the reader thread
    pub fn shutdown(&mut self) -> Result<()> {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.reader_handle.take() {
            handle.join().map_err(|_| Error::ThreadPanic)?;
        }
        Ok(())
    }
}

impl CommandChannel for SerialChannel {
    fn send(&self, commands: &[String]) -> Result<()> {
        let mut port = self.port.lock();
        for command in commands {
            log::debug!("Send: {}", command);
            port.write_all(command.as_bytes())?;
            port.write_all(b"\n")?;
        }
        port.flush()?;
        Ok(())
    }
}

impl Drop for SerialChannel {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}

fn reader_loop<F>(port: Box<dyn SerialPort>, shutdown: Arc<AtomicBool>, on_line: F)
where
    F: Fn(&str),
{
    let mut reader = BufReader::new(port);
    let mut line = String::new();

    while !shutdown.load(Ordering::Relaxed) {
        match reader.read_line(&mut line) {
            Ok(0) => {
                log::warn!("Serial port closed");
                break;
            }
            Ok(_) => {
                // Partial line left by a timeout is completed by this read
                let received = line.trim_end();
                if !received.is_empty() {
                    log::trace!("Recv: {}", received);
                    on_line(received);
                }
                line.clear();
            }
            Err(e) if e.kind() == ErrorKind::TimedOut || e.kind() == ErrorKind::WouldBlock => {}
            Err(e) => {
                log::error!("Serial read failed: {}", e);
                break;
            }
        }
    }
    log::debug!("Serial reader stopped");
}
