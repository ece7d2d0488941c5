//! levelgrid - surface leveling for motion-controlled devices
//!
//! ## Usage
//!
//! ```text
//! levelgrid [--config levelgrid.toml] probe
//! levelgrid [--config levelgrid.toml] filter job.gcode --output leveled.gcode
//! levelgrid [--config levelgrid.toml] show
//! ```
//!
//! `probe` measures the active profile's grid on the device and prints
//! progress as JSON lines; Ctrl-C cancels without saving. `filter` rewrites a
//! G-code program offline with the active profile's corrections.

use clap::{Parser, Subcommand};
use levelgrid::access::OperatorList;
use levelgrid::channel::{CommandChannel, InterceptingChannel, SerialChannel, WriterChannel};
use levelgrid::notify::JsonLineSink;
use levelgrid::probe::ResponseSlot;
use levelgrid::shared::SharedProfile;
use levelgrid::store::{SettingsStore, TomlStore};
use levelgrid::{AppConfig, Collaborators, Error, LevelingSession, OperatorCommand, ProbeOptions};
use levelgrid::{ProbeStatus, Result};
use std::env;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "levelgrid")]
#[command(about = "Surface height-map probing and G-code Z compensation")]
struct Args {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults are used when it does not exist)
    #[arg(short, long, default_value = "levelgrid.toml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Probe the active profile's grid on the device
    Probe,
    /// Rewrite a G-code program with the active profile's corrections
    Filter {
        /// Input G-code file
        input: String,

        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Print the active profile
    Show,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = AppConfig::load_or_default(&args.config)?;

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.logging.level.as_str()),
    )
    .init();
    log::info!("Using config: {}", args.config);

    let store = TomlStore::new(&config.storage.profiles_path);
    match args.command {
        Commands::Probe => probe(&config, store),
        Commands::Filter { input, output } => filter(&store, &input, output.as_deref()),
        Commands::Show => show(&store),
    }
}

fn operator_name() -> String {
    env::var("USER").unwrap_or_else(|_| "operator".to_string())
}

fn probe(config: &AppConfig, store: TomlStore) -> Result<()> {
    let options = ProbeOptions::try_from(&config.probing)?;
    if options.debug {
        log::warn!("Debug mode: probe responses are simulated");
    }

    let slot = Arc::new(ResponseSlot::new());
    let reader_slot = Arc::clone(&slot);
    let device = SerialChannel::open(&config.device, move |line| {
        reader_slot.deliver(line);
    })?;

    let session = Arc::new(LevelingSession::new(
        Collaborators {
            channel: Arc::new(device),
            sink: Arc::new(JsonLineSink::new(io::stdout())),
            store: Arc::new(store),
            access: Arc::new(OperatorList::new(config.access.operators.clone())),
        },
        options,
        slot,
    )?);

    let operator = operator_name();
    let cancel_session = Arc::clone(&session);
    let cancel_operator = operator.clone();
    ctrlc::set_handler(move || {
        log::info!("Received interrupt, cancelling probe");
        if let Err(e) = cancel_session.handle(&cancel_operator, OperatorCommand::ProbeCancel) {
            log::error!("Cancel failed: {}", e);
        }
    })
    .map_err(|e| Error::Other(format!("Error setting Ctrl-C handler: {}", e)))?;

    session.handle(&operator, OperatorCommand::ProbeStart)?;
    session.wait_probe()?;

    match session.status() {
        ProbeStatus::Idle => {
            log::info!("Profile '{}' updated", session.profile_name());
            Ok(())
        }
        status => Err(Error::Other(format!("Probing ended with status {}", status))),
    }
}

fn filter(store: &TomlStore, input: &str, output: Option<&str>) -> Result<()> {
    let set = store.load()?;
    let profile = set.active()?.clone();
    if !profile.has_matrix() {
        log::warn!(
            "Profile '{}' has no measured matrix, program passes unchanged",
            set.selected_profile
        );
    }

    let out: Box<dyn Write + Send> = match output {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(BufWriter::new(io::stdout())),
    };
    let channel = InterceptingChannel::new(
        WriterChannel::new(out),
        SharedProfile::new(&set.selected_profile, profile),
    );

    let reader = BufReader::new(File::open(input)?);
    let mut count = 0usize;
    for line in reader.lines() {
        channel.send(&[line?])?;
        count += 1;
    }
    channel.inner().flush()?;
    log::info!("Filtered {} lines from {}", count, input);
    Ok(())
}

fn show(store: &TomlStore) -> Result<()> {
    let set = store.load()?;
    let profile = set.active()?;
    println!("# profile: {}", set.selected_profile);
    print!("{}", toml::to_string_pretty(profile)?);
    Ok(())
}
