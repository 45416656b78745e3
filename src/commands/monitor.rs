//! Telemetry monitor command handler.
//!
//! Opens the serial port and shows the live dashboard, or streams the
//! aggregated view as JSON lines when `--json` is given.

use std::io::{self, Write};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::ArgMatches;
use colored::*;
use tokio::sync::mpsc;

use crate::core::config::{ConnectionConfig, DEFAULT_BAUD_RATE, DEFAULT_READ_TIMEOUT};
use crate::core::telemetry::{
    ConnectionStatus, MetricsAggregator, MonitorView, Notification, SortMode, StreamReader,
};
use crate::ui::monitor_tui::{run_monitor_app, MonitorAppConfig};

/// Execute the monitor command
pub fn execute(matches: &ArgMatches) -> Result<()> {
    let config = connection_from_matches(matches)?;
    let sort_mode = matches
        .get_one::<SortMode>("sort")
        .copied()
        .unwrap_or_default();

    if matches.get_flag("json") {
        return run_json_output(config, sort_mode);
    }

    let app_config = MonitorAppConfig {
        connection: config,
        sort_mode,
        ..Default::default()
    };

    run_monitor_app(app_config).context("Failed to run telemetry monitor")
}

pub fn connection_from_matches(matches: &ArgMatches) -> Result<ConnectionConfig> {
    let port = matches
        .get_one::<String>("port")
        .cloned()
        .context("A serial port is required")?;
    let baud_rate = matches
        .get_one::<u32>("baud")
        .copied()
        .unwrap_or(DEFAULT_BAUD_RATE);
    let read_timeout = matches
        .get_one::<u64>("timeout-ms")
        .map(|ms| Duration::from_millis(*ms))
        .unwrap_or(DEFAULT_READ_TIMEOUT);

    let config = ConnectionConfig::new(port, baud_rate).with_read_timeout(read_timeout);
    config.validate()?;
    Ok(config)
}

/// Run in JSON output mode (for scripting)
fn run_json_output(config: ConnectionConfig, sort_mode: SortMode) -> Result<()> {
    let (tx, rx) = mpsc::unbounded_channel();
    let reader = StreamReader::start_serial(config, tx)?;

    let stop = reader.stop_handle();
    ctrlc::set_handler(move || stop.stop()).context("Failed to install Ctrl+C handler")?;

    let stdout = io::stdout();
    follow_session(reader, rx, sort_mode, &mut stdout.lock())
}

/// Stream JSON lines until the session ends, then wait for the reader thread.
pub fn follow_session<W: Write>(
    reader: StreamReader,
    rx: mpsc::UnboundedReceiver<Notification>,
    sort_mode: SortMode,
    out: &mut W,
) -> Result<()> {
    let outcome = stream_json(rx, sort_mode, out);
    if outcome.is_err() {
        // The reader only sees the dropped receiver on its next frame
        reader.stop();
    }

    let end = reader.join()?;
    log::info!("Session ended: {:?}", end);

    if let Some(reason) = outcome? {
        bail!("Serial connection lost: {}", reason);
    }
    Ok(())
}

/// Fold notifications into a view and write one JSON line per update.
///
/// Returns the transport failure that ended the stream, if any. Must not be
/// called from inside a tokio runtime.
pub fn stream_json<W: Write>(
    mut rx: mpsc::UnboundedReceiver<Notification>,
    sort_mode: SortMode,
    out: &mut W,
) -> Result<Option<String>> {
    let mut aggregator = MetricsAggregator::new(sort_mode);

    while let Some(notification) = rx.blocking_recv() {
        match notification {
            Notification::Data(sample) => {
                aggregator.apply(sample);
                let view = MonitorView::from_aggregator(&aggregator, ConnectionStatus::Streaming);
                writeln!(out, "{}", serde_json::to_string(&view)?)?;
                out.flush()?;
            }
            Notification::ProtocolError(text) => {
                eprintln!("{} {}", "device error:".red().bold(), text);
            }
            Notification::TransportError(text) => {
                return Ok(Some(text));
            }
        }
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::telemetry::fake::{ScriptedChunk, ScriptedSource};

    fn run_script(script: Vec<ScriptedChunk>) -> (String, Option<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let source = ScriptedSource::with_script(script).idle_timeout(Duration::from_millis(5));
        let reader = StreamReader::start(source, tx).unwrap();

        let mut out = Vec::new();
        let stop = reader.stop_handle();
        // Script is finite; stop once it has had time to drain
        let stopper = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(200));
            stop.stop();
        });

        let failure = stream_json(rx, SortMode::Name, &mut out).unwrap();
        stopper.join().unwrap();
        drop(reader);
        (String::from_utf8(out).unwrap(), failure)
    }

    #[test]
    fn test_json_lines_per_sample() {
        let (out, failure) = run_script(vec![
            ScriptedChunk::from("{\"heap_total\":100,\"heap_free\":25,\"internal_total\":0,\"internal_free\":0}\n"),
            ScriptedChunk::from("{\"error\":\"boom\"}\n"),
            ScriptedChunk::from("{\"tasks\":[{\"task_name\":\"b\",\"run_time\":1,\"percentage\":2.0,\"core\":0},{\"task_name\":\"a\",\"run_time\":1,\"percentage\":1.0,\"core\":1}]}\n"),
        ]);

        assert!(failure.is_none());
        let lines: Vec<serde_json::Value> = out
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["memory"]["heap"]["used"], 75);
        assert_eq!(lines[1]["tasks"]["tasks"][0]["task_name"], "a");
        assert_eq!(lines[1]["status"]["state"], "streaming");
    }

    #[test]
    fn test_transport_failure_is_returned() {
        let (out, failure) = run_script(vec![ScriptedChunk::failure("cable pulled")]);
        assert!(out.is_empty());
        assert!(failure.unwrap().contains("cable pulled"));
    }

    struct ClosedPipe;

    impl Write for ClosedPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::from(io::ErrorKind::BrokenPipe))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_write_failure_stops_idle_reader() {
        let (tx, rx) = mpsc::unbounded_channel();
        // One frame, then silence for as long as the reader keeps polling
        let source = ScriptedSource::with_script(vec![ScriptedChunk::from(
            "{\"heap_total\":100,\"heap_free\":50}\n",
        )])
        .idle_timeout(Duration::from_millis(5));
        let closed = source.closed_flag();
        let reader = StreamReader::start(source, tx).unwrap();

        let result = follow_session(reader, rx, SortMode::default(), &mut ClosedPipe);
        assert!(result.is_err());
        assert!(closed.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[test]
    fn test_follow_session_reports_lost_connection() {
        let (tx, rx) = mpsc::unbounded_channel();
        let source = ScriptedSource::with_script(vec![ScriptedChunk::failure("cable pulled")]);
        let reader = StreamReader::start(source, tx).unwrap();

        let mut out = Vec::new();
        let err = follow_session(reader, rx, SortMode::default(), &mut out).unwrap_err();
        assert!(err.to_string().contains("Serial connection lost"));
    }

    #[test]
    fn test_connection_from_matches() {
        let matches = crate::commands::build_cli().get_matches_from([
            "espmon",
            "monitor",
            "/dev/ttyUSB0",
            "--baud",
            "9600",
            "--timeout-ms",
            "500",
        ]);
        let (_, sub) = matches.subcommand().unwrap();
        let config = connection_from_matches(sub).unwrap();
        assert_eq!(config.port, "/dev/ttyUSB0");
        assert_eq!(config.baud_rate, 9600);
        assert_eq!(config.read_timeout, Duration::from_millis(500));
    }
}
