//! Uroflowmetry console - Main Entry Point
//!
//! Opens the sensor link, runs the acquisition worker and reads operator
//! commands from stdin.

use anyhow::Context;
use clap::Parser;
use crossbeam_channel::Receiver;
use std::io::BufRead;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uroflow_rs::{
    acquisition::{AcquisitionBackend, AcquisitionMessage, DisplaySeries, OperatorHandle},
    config::{self, AppConfig},
    console::{ConsoleCommand, HELP},
    link::{DeviceLink, MockFlowPattern, MockLink, SerialLink},
    report::{CsvReportRenderer, ReportRenderer},
    storage::{self, JsonSessionStore, SessionStore},
    UroflowError,
};

/// Minimum interval between live label updates on the console
const LABEL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Parser, Debug)]
#[command(name = "uroflow", version, about = "Uroflowmetry acquisition console")]
struct Args {
    /// Configuration file (defaults to uroflow.toml in the app data directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Serial port, overrides the configuration
    #[arg(short, long)]
    port: Option<String>,

    /// Baud rate, overrides the configuration
    #[arg(short, long)]
    baud: Option<u32>,

    /// Use a simulated sensor instead of the serial port
    #[arg(long)]
    mock: bool,

    /// List serial ports and exit
    #[arg(long)]
    list_ports: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let _log_guard = init_logging();

    if args.list_ports {
        print_ports();
        return Ok(());
    }

    tracing::info!("Starting uroflowmetry console");

    let mut config = AppConfig::load_or_default(args.config.as_deref());
    if let Some(port) = args.port {
        config.link.port = port;
    }
    if let Some(baud) = args.baud {
        config.link.baud_rate = baud;
    }

    let mut store = JsonSessionStore::open(config.storage.history_path()?)
        .context("Failed to open measurement history")?;
    let renderer = CsvReportRenderer::new(config.storage.reports_path()?);

    let link = open_link(&config, args.mock);
    let (backend, operator) = AcquisitionBackend::new(config.clone(), link);
    let worker = backend
        .spawn()
        .context("Failed to spawn acquisition worker")?;

    let messages = operator.messages();
    let window = config.display.time_window_seconds;
    let display = std::thread::Builder::new()
        .name("uroflow-display".into())
        .spawn(move || run_display(messages, window))
        .context("Failed to spawn display thread")?;

    println!("Type 'help' for commands.");
    for line in std::io::stdin().lock().lines() {
        let line = line.context("Failed to read from stdin")?;
        match ConsoleCommand::parse(&line) {
            Ok(None) => {}
            Ok(Some(ConsoleCommand::Quit)) => break,
            Ok(Some(cmd)) => {
                if let Err(e) = execute(cmd, &operator, &mut store, &renderer) {
                    eprintln!("Error: {}", e);
                }
            }
            Err(e) => eprintln!("{}", e),
        }
    }

    // Signal worker to stop and wait for it
    tracing::info!("Shutting down...");
    operator.shutdown();
    if worker.join().is_err() {
        tracing::error!("Acquisition worker panicked");
    }
    if display.join().is_err() {
        tracing::error!("Display thread panicked");
    }

    Ok(())
}

/// Install the stderr and log-file subscribers
///
/// The returned guard flushes the file writer when dropped.
fn init_logging() -> Option<WorkerGuard> {
    let file = config::app_data_dir()
        .filter(|dir| config::ensure_dir(dir).is_ok())
        .map(|dir| {
            let appender = tracing_appender::rolling::never(dir, config::LOG_FILE);
            tracing_appender::non_blocking(appender)
        });
    let (file_layer, guard) = match file {
        Some((writer, guard)) => (
            Some(fmt::layer().with_writer(writer).with_ansi(false)),
            Some(guard),
        ),
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,uroflow=debug,uroflow_rs=debug")),
        )
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    guard
}

/// Open the sensor link, falling back to a closed link on failure
fn open_link(config: &AppConfig, mock: bool) -> Box<dyn DeviceLink> {
    if mock {
        tracing::info!("Using simulated sensor");
        let (link, _device) = MockLink::new();
        return Box::new(link.with_pattern(MockFlowPattern::default()));
    }

    match SerialLink::connect(config.link.clone()) {
        Ok(link) => Box::new(link),
        Err(e) => {
            tracing::error!("Failed to open device link: {}", e);
            eprintln!(
                "Could not open {}: {}\nAcquisition is disabled; use 'reconnect' once the device is attached.",
                config.link.port, e
            );
            Box::new(SerialLink::disconnected(config.link.clone()))
        }
    }
}

fn print_ports() {
    let ports = SerialLink::list_ports();
    if ports.is_empty() {
        println!("No serial ports found");
    }
    for port in ports {
        println!("{}", port);
    }
}

/// Mirror worker messages into the chart model and print live labels
fn run_display(messages: Receiver<AcquisitionMessage>, window_seconds: f64) {
    let mut series = DisplaySeries::new();
    let mut last_print: Option<Instant> = None;

    while let Ok(msg) = messages.recv() {
        match msg {
            AcquisitionMessage::SampleAccepted(sample) => {
                series.push(&sample);
                if last_print.map_or(true, |t| t.elapsed() >= LABEL_INTERVAL) {
                    let (from, to) = series.visible_range(window_seconds);
                    let values = series.values();
                    println!(
                        "{}  {}  [{:.0}-{:.0} s]",
                        values.flow_label(),
                        values.volume_label(),
                        from,
                        to
                    );
                    last_print = Some(Instant::now());
                }
            }
            AcquisitionMessage::Cleared => {
                series.clear();
                last_print = None;
            }
            AcquisitionMessage::StatusChanged(status) => println!("Session: {}", status),
            AcquisitionMessage::LinkStatus(status) => {
                println!("Link: {}", status.display_name())
            }
            AcquisitionMessage::LinkError(e) => eprintln!("Link error: {}", e),
            AcquisitionMessage::Shutdown => break,
        }
    }
}

fn execute(
    cmd: ConsoleCommand,
    operator: &OperatorHandle,
    store: &mut dyn SessionStore,
    renderer: &dyn ReportRenderer,
) -> uroflow_rs::Result<()> {
    match cmd {
        ConsoleCommand::Start => operator.start()?,
        ConsoleCommand::Stop => operator.stop()?,
        ConsoleCommand::Clear => operator.clear()?,
        ConsoleCommand::Status => {
            let report = operator.status()?;
            println!(
                "Session: {} | Link: {} ({}) | Samples: {} | {} | {}",
                report.status,
                report.connection.display_name(),
                report.port,
                report.sample_count,
                report.display.flow_label(),
                report.display.volume_label()
            );
            println!(
                "Lines read: {} | skipped: {} | tick errors: {} | tick panics: {} | dropped messages: {}",
                report.stats.lines_read,
                report.stats.lines_skipped,
                report.stats.tick_errors,
                report.stats.tick_panics,
                report.stats.dropped_messages
            );
        }
        ConsoleCommand::Save(metadata) => {
            let snapshot = operator.export(metadata)?;
            let patient_id = snapshot.metadata.patient_id.clone();
            match storage::save_measurement(store, renderer, &snapshot)? {
                (record_no, Some(path)) => {
                    println!("Saved measurement #{}, report at {}", record_no, path.display())
                }
                (record_no, None) => println!(
                    "Saved measurement #{}, but the report could not be written; \
                     run `report {}` to render it again",
                    record_no, patient_id
                ),
            }
        }
        ConsoleCommand::History => {
            let records = store.list()?;
            if records.is_empty() {
                println!("No saved measurements");
            }
            for r in records {
                println!(
                    "#{:<4} {}  {:<12} {:<24} {:<6} {:>3}  {:.2} mL",
                    r.record_no,
                    r.created_at
                        .with_timezone(&chrono::Local)
                        .format("%Y-%m-%d %H:%M:%S"),
                    r.metadata.patient_id,
                    r.metadata.full_name(),
                    r.metadata.gender,
                    r.metadata.age,
                    r.final_volume()
                );
            }
        }
        ConsoleCommand::Report(patient_id) => {
            let records = store.find_by_patient(&patient_id)?;
            let latest = records.first().ok_or_else(|| {
                UroflowError::Command(format!("no records for patient '{}'", patient_id))
            })?;
            let mut path = renderer.report_path(&latest.metadata);
            if !path.exists() {
                tracing::info!("Report missing for {}, rendering from history", patient_id);
                path = renderer.render(&latest.to_snapshot())?;
            }
            println!("{}", path.display());
        }
        ConsoleCommand::Delete(patient_id) => {
            let removed = storage::delete_patient(store, renderer, &patient_id)?;
            println!("Deleted {} record(s) of patient {}", removed, patient_id);
        }
        ConsoleCommand::Reconnect => {
            operator.reconnect()?;
            println!("Link reconnected");
        }
        ConsoleCommand::Ports => print_ports(),
        ConsoleCommand::Help => println!("{}", HELP),
        ConsoleCommand::Quit => {}
    }
    Ok(())
}
