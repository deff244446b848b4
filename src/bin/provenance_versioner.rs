//! Provenance Versioner Binary
//!
//! Runs the versioning filter over a JSON-lines event stream:
//! - Reads one `{"vertex": {...}}` or `{"edge": {...}}` event per line from stdin
//! - Writes one versioned `{"vertex": ...}` / `{"edge": ...}` element per line to stdout
//! - Logs to stderr
//!
//! ## Configuration
//!
//! Command-line arguments are joined into the filter's argument string.
//! `--config <path>` names a file of `key=value` lines that arguments override.
//!
//! Environment variables:
//! - `RUST_LOG`: Log level filter (default: info)
//! - `LOG_FORMAT`: "json" for structured logs, "pretty" for development (default: json)
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin provenance_versioner --features cli -- \
//!     versionAnnotationName=version initialVersion=0 < events.jsonl
//! ```

use std::io::{self, BufRead, BufWriter, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use provenance_versioner::{Element, Event, FilterConfig, Sink, VersioningFilter};

/// Initialize the tracing subscriber with JSON or pretty format
fn init_tracing() {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "json".to_string());

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "provenance_versioner=info".into());

    if log_format == "pretty" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(io::stderr).with_target(true))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .json()
                    .with_writer(io::stderr)
                    .with_target(true)
                    .flatten_event(true),
            )
            .init();
    }
}

/// Writes elements as JSON lines, remembering the first failure.
struct JsonLinesSink<W: Write> {
    out: W,
    failure: Option<io::Error>,
}

impl<W: Write> JsonLinesSink<W> {
    fn new(out: W) -> Self {
        Self { out, failure: None }
    }

    fn write(&mut self, element: &Element) -> io::Result<()> {
        serde_json::to_writer(&mut self.out, element)?;
        self.out.write_all(b"\n")
    }

    fn finish(mut self) -> io::Result<()> {
        if let Some(e) = self.failure.take() {
            return Err(e);
        }
        self.out.flush()
    }
}

impl<W: Write> Sink for JsonLinesSink<W> {
    fn emit(&mut self, element: Element) {
        if self.failure.is_some() {
            return;
        }
        if let Err(e) = self.write(&element) {
            error!(error = %e, "Failed to write element");
            self.failure = Some(e);
        }
    }
}

/// Split `--config <path>` out of the command line; the rest are arguments.
fn parse_command_line(mut args: impl Iterator<Item = String>) -> Result<(String, Option<PathBuf>), String> {
    let mut arguments = Vec::new();
    let mut config_file = None;
    while let Some(arg) = args.next() {
        if arg == "--config" {
            match args.next() {
                Some(path) => config_file = Some(PathBuf::from(path)),
                None => return Err("--config requires a path".to_string()),
            }
        } else if let Some(path) = arg.strip_prefix("--config=") {
            config_file = Some(PathBuf::from(path));
        } else {
            arguments.push(arg);
        }
    }
    Ok((arguments.join(" "), config_file))
}

fn main() -> ExitCode {
    init_tracing();

    info!(version = env!("CARGO_PKG_VERSION"), "Starting provenance versioner");

    let (arguments, config_file) = match parse_command_line(std::env::args().skip(1)) {
        Ok(parsed) => parsed,
        Err(e) => {
            error!(error = %e, "Invalid command line");
            return ExitCode::from(2);
        }
    };
    let config = match FilterConfig::load(&arguments, config_file.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            return ExitCode::from(2);
        }
    };

    let stdout = io::stdout();
    let mut filter = VersioningFilter::new(JsonLinesSink::new(BufWriter::new(stdout.lock())));
    if !filter.initialize(&config) {
        return ExitCode::from(2);
    }

    let stdin = io::stdin();
    for (number, line) in stdin.lock().lines().enumerate() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                error!(error = %e, "Failed to read input");
                return ExitCode::FAILURE;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<Event>(&line) {
            Ok(event) => filter.process(&event),
            Err(e) => warn!(line = number + 1, error = %e, "Skipping malformed event"),
        }
        if filter.sink().is_some_and(|sink| sink.failure.is_some()) {
            return ExitCode::FAILURE;
        }
    }

    filter.shutdown();
    let Some(sink) = filter.into_sink() else {
        return ExitCode::FAILURE;
    };
    match sink.finish() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Failed to flush output");
            ExitCode::FAILURE
        }
    }
}
