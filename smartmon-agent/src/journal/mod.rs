//! Live view of the smartd journal
//!
//! Two read modes over the same unit:
//! - backlog: the last N lines, fetched through the command runner
//! - follow: a long-lived `journalctl -f` child whose stdout is streamed
//!   as text chunks into the monitor's event channel
//!
//! The follow delivers exactly the bytes it read, decoded incrementally: a
//! UTF-8 sequence split across reads is held back until complete, invalid
//! bytes become U+FFFD. Chunks end on a line boundary, so a journal line
//! arriving in two reads reaches the consumer whole. When the source goes
//! away a single `Closed` event is sent and the task ends; restarting is the
//! monitor's decision.

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use smartmon_core::{CommandRunner, CommandSpec, MonitorConfig, MonitorError};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command as AsyncCommand};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn, Instrument};
use uuid::Uuid;

const READ_BUFFER_SIZE: usize = 8 * 1024;
/// An unterminated line longer than this is released as is
const MAX_PENDING_LINE: usize = 64 * 1024;

/// What the follow reports to its consumer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TailEvent {
    /// Newly appended journal text
    Chunk(String),
    /// The follow ended; no further events from this session
    Closed { reason: String },
}

#[derive(Debug, thiserror::Error)]
pub enum TailError {
    #[error(transparent)]
    Command(#[from] MonitorError),
    #[error("{program} exited with status {code:?}: {stderr}")]
    Exited {
        program: String,
        code: Option<i32>,
        stderr: String,
    },
}

/// Incremental UTF-8 decoder over a byte stream
#[derive(Debug, Default)]
pub struct Utf8ChunkDecoder {
    pending: Vec<u8>,
    consumed: u64,
}

impl Utf8ChunkDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode newly read bytes, holding back a trailing incomplete sequence
    pub fn decode(&mut self, bytes: &[u8]) -> String {
        self.consumed += bytes.len() as u64;
        let mut buffer = std::mem::take(&mut self.pending);
        buffer.extend_from_slice(bytes);

        let mut text = String::with_capacity(buffer.len());
        let mut input = buffer.as_slice();
        loop {
            match std::str::from_utf8(input) {
                Ok(valid) => {
                    text.push_str(valid);
                    break;
                }
                Err(e) => {
                    let (valid, rest) = input.split_at(e.valid_up_to());
                    text.push_str(&String::from_utf8_lossy(valid));
                    match e.error_len() {
                        Some(invalid) => {
                            text.push(char::REPLACEMENT_CHARACTER);
                            input = &rest[invalid..];
                        }
                        None => {
                            self.pending = rest.to_vec();
                            break;
                        }
                    }
                }
            }
        }
        text
    }

    /// Flush whatever is still held back once the stream has ended
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.pending);
        Some(String::from_utf8_lossy(&rest).into_owned())
    }

    /// Total bytes read from the stream so far
    pub fn consumed(&self) -> u64 {
        self.consumed
    }
}

/// Cuts decoded text at the last newline and keeps the unterminated tail
#[derive(Debug, Default)]
pub struct LineAssembler {
    partial: String,
}

impl LineAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `text`; returns every complete line seen so far, if any
    pub fn push(&mut self, text: &str) -> Option<String> {
        self.partial.push_str(text);
        match self.partial.rfind('\n') {
            Some(last) => {
                let tail = self.partial.split_off(last + 1);
                Some(std::mem::replace(&mut self.partial, tail))
            }
            None if self.partial.len() > MAX_PENDING_LINE => Some(std::mem::take(&mut self.partial)),
            None => None,
        }
    }

    /// Release the unterminated tail once the stream has ended
    pub fn finish(&mut self) -> Option<String> {
        if self.partial.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.partial))
        }
    }
}

/// Why a pump stopped reading
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PumpEnd {
    Eof,
    ReadError(String),
    Shutdown,
    ConsumerGone,
}

/// Stream `reader` into `events` as decoded, line-terminated chunks until
/// it ends. A trailing partial line is sent on EOF.
///
/// Waits on the reader and the shutdown flag only; the bounded channel
/// applies back-pressure so an unread journal never accumulates in memory.
pub async fn pump_chunks<R, E>(
    mut reader: R,
    events: &mpsc::Sender<E>,
    shutdown: &mut watch::Receiver<bool>,
) -> PumpEnd
where
    R: AsyncRead + Unpin,
    E: From<TailEvent>,
{
    let mut decoder = Utf8ChunkDecoder::new();
    let mut lines = LineAssembler::new();
    let mut buffer = vec![0u8; READ_BUFFER_SIZE];

    if *shutdown.borrow() {
        return PumpEnd::Shutdown;
    }

    let end = loop {
        tokio::select! {
            read = reader.read(&mut buffer) => match read {
                Ok(0) => break PumpEnd::Eof,
                Ok(n) => {
                    let Some(text) = lines.push(&decoder.decode(&buffer[..n])) else {
                        continue;
                    };
                    if events.send(TailEvent::Chunk(text).into()).await.is_err() {
                        break PumpEnd::ConsumerGone;
                    }
                }
                Err(e) => break PumpEnd::ReadError(e.to_string()),
            },
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break PumpEnd::Shutdown;
                }
            }
        }
    };

    if end == PumpEnd::Eof {
        let mut rest = lines.finish().unwrap_or_default();
        if let Some(tail) = decoder.finish() {
            rest.push_str(&tail);
        }
        if !rest.is_empty() {
            let _ = events.send(TailEvent::Chunk(rest).into()).await;
        }
    }
    debug!("Pump ended after {} bytes: {:?}", decoder.consumed(), end);
    end
}

/// Journal reader for one configured unit
#[derive(Clone)]
pub struct LogTailSource {
    runner: Arc<dyn CommandRunner>,
    config: Arc<MonitorConfig>,
}

impl LogTailSource {
    pub fn new(runner: Arc<dyn CommandRunner>, config: Arc<MonitorConfig>) -> Self {
        Self { runner, config }
    }

    /// Last `backlog_lines` lines of the unit's journal
    pub async fn fetch_backlog(&self) -> Result<String, TailError> {
        let spec = self.config.backlog_command();
        let output = self.runner.run(&spec, Some(self.config.backlog_timeout())).await?;
        if !output.success() {
            return Err(TailError::Exited {
                program: spec.program,
                code: output.exit_code,
                stderr: output.stderr.trim().to_string(),
            });
        }
        Ok(output.stdout)
    }

    /// Start the continuous follow in its own task
    pub fn spawn_follow<E>(&self, events: mpsc::Sender<E>, shutdown: watch::Receiver<bool>) -> JoinHandle<()>
    where
        E: From<TailEvent> + Send + 'static,
    {
        let spec = self.config.follow_command();
        let grace = Duration::from_secs(self.config.journal.shutdown_grace_secs);
        let session = Uuid::new_v4();
        let span = tracing::info_span!("follow", session = %session);

        tokio::spawn(follow(spec, grace, events, shutdown).instrument(span))
    }
}

async fn follow<E>(spec: CommandSpec, grace: Duration, events: mpsc::Sender<E>, mut shutdown: watch::Receiver<bool>)
where
    E: From<TailEvent>,
{
    info!("Following journal: {}", spec);

    let mut child = match AsyncCommand::new(&spec.program)
        .args(&spec.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
    {
        Ok(child) => child,
        Err(e) => {
            let reason = format!("failed to start {}: {}", spec.program, e);
            warn!("{}", reason);
            let _ = events.send(TailEvent::Closed { reason }.into()).await;
            return;
        }
    };

    let stdout = match child.stdout.take() {
        Some(stdout) => stdout,
        None => {
            terminate(&mut child, grace).await;
            let _ = events
                .send(TailEvent::Closed { reason: format!("{} has no stdout", spec.program) }.into())
                .await;
            return;
        }
    };

    let reason = match pump_chunks(stdout, &events, &mut shutdown).await {
        PumpEnd::Eof => {
            let status = match tokio::time::timeout(grace, child.wait()).await {
                Ok(Ok(status)) => status.to_string(),
                Ok(Err(e)) => e.to_string(),
                Err(_) => {
                    terminate(&mut child, grace).await;
                    "output closed".to_string()
                }
            };
            Some(format!("{} exited ({})", spec.program, status))
        }
        PumpEnd::ReadError(e) => {
            terminate(&mut child, grace).await;
            Some(format!("reading {} failed: {}", spec.program, e))
        }
        PumpEnd::Shutdown | PumpEnd::ConsumerGone => {
            terminate(&mut child, grace).await;
            None
        }
    };

    match reason {
        Some(reason) => {
            warn!("Journal follow ended: {}", reason);
            let _ = events.send(TailEvent::Closed { reason }.into()).await;
        }
        None => info!("Journal follow stopped"),
    }
}

/// SIGTERM, wait up to `grace`, then SIGKILL
async fn terminate(child: &mut Child, grace: Duration) {
    if let Some(pid) = child.id() {
        if let Err(e) = kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
            warn!("SIGTERM to {} failed: {}", pid, e);
        }
        match tokio::time::timeout(grace, child.wait()).await {
            Ok(Ok(status)) => {
                debug!("Follow process {} exited: {}", pid, status);
                return;
            }
            Ok(Err(e)) => warn!("Waiting for {} failed: {}", pid, e),
            Err(_) => warn!("Follow process {} still running after {:?}, killing", pid, grace),
        }
    }
    if let Err(e) = child.kill().await {
        debug!("Kill failed (process already gone?): {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smartmon_core::StatusAggregator;
    use smartmon_devkit::{JournalLines, TestHarness};
    use tokio::io::AsyncWriteExt;

    #[test]
    fn test_decoder_holds_back_split_sequence() {
        let mut decoder = Utf8ChunkDecoder::new();
        let bytes = "Temp 34 °C ⚠️".as_bytes();
        let degree = bytes.iter().position(|b| *b == 0xC2).unwrap();

        let first = decoder.decode(&bytes[..degree + 1]);
        assert_eq!(first, "Temp 34 ");
        let second = decoder.decode(&bytes[degree + 1..]);
        assert_eq!(second, "°C ⚠️");
        assert_eq!(decoder.consumed(), bytes.len() as u64);
        assert!(decoder.finish().is_none());
    }

    #[test]
    fn test_decoder_replaces_invalid_bytes() {
        let mut decoder = Utf8ChunkDecoder::new();
        assert_eq!(decoder.decode(b"ok \xFF\xFE done"), "ok \u{FFFD}\u{FFFD} done");
        assert_eq!(decoder.decode(b"\xE2\x82"), "");
        assert_eq!(decoder.finish().as_deref(), Some("\u{FFFD}"));
    }

    #[tokio::test]
    async fn test_pump_delivers_everything_once() {
        let (mut writer, reader) = tokio::io::duplex(64);
        let (tx, mut rx) = mpsc::channel::<TailEvent>(256);
        let (_shutdown_tx, mut shutdown) = watch::channel(false);

        let journal = JournalLines::new("nas").failed("/dev/sda").attribute_change("/dev/sdb").build();
        let bytes = journal.clone().into_bytes();
        let writer_task = tokio::spawn(async move {
            for piece in bytes.chunks(7) {
                writer.write_all(piece).await.unwrap();
            }
        });

        let end = pump_chunks(reader, &tx, &mut shutdown).await;
        writer_task.await.unwrap();
        drop(tx);

        let mut received = String::new();
        while let Some(event) = rx.recv().await {
            match event {
                TailEvent::Chunk(text) => received.push_str(&text),
                TailEvent::Closed { .. } => panic!("pump never sends Closed"),
            }
        }
        assert_eq!(end, PumpEnd::Eof);
        assert_eq!(received, journal);
    }

    #[test]
    fn test_line_assembler_keeps_unterminated_tail() {
        let mut lines = LineAssembler::new();
        assert_eq!(lines.push("Device: /dev/sda, FAI"), None);
        assert_eq!(
            lines.push("LED SMART\nnext"),
            Some("Device: /dev/sda, FAILED SMART\n".to_string())
        );
        assert_eq!(lines.finish().as_deref(), Some("next"));
        assert_eq!(lines.finish(), None);
    }

    #[tokio::test]
    async fn test_failure_line_split_across_reads_is_flagged() {
        let (mut writer, reader) = tokio::io::duplex(1024);
        let (tx, mut rx) = mpsc::channel::<TailEvent>(16);
        let (_shutdown_tx, mut shutdown) = watch::channel(false);

        let line = JournalLines::new("nas").failed("/dev/sda").build();
        let cut = line.find("FAILED").unwrap() + 3;
        let (head, tail) = (line[..cut].to_string(), line[cut..].to_string());
        let writer_task = tokio::spawn(async move {
            writer.write_all(head.as_bytes()).await.unwrap();
            writer.flush().await.unwrap();
            tokio::time::sleep(Duration::from_millis(100)).await;
            writer.write_all(tail.as_bytes()).await.unwrap();
        });

        let end = pump_chunks(reader, &tx, &mut shutdown).await;
        writer_task.await.unwrap();
        drop(tx);

        let mut status = StatusAggregator::from_config(&MonitorConfig::default());
        let mut chunks = Vec::new();
        while let Some(TailEvent::Chunk(text)) = rx.recv().await {
            status.apply_tail_chunk(&text);
            chunks.push(text);
        }
        assert_eq!(end, PumpEnd::Eof);
        assert_eq!(chunks, vec![line]);
        assert!(status.problems().contains("/dev/sda"));
    }

    #[tokio::test]
    async fn test_pump_stops_on_shutdown() {
        let (_writer, reader) = tokio::io::duplex(64);
        let (tx, _rx) = mpsc::channel::<TailEvent>(4);
        let (shutdown_tx, mut shutdown) = watch::channel(false);

        let pump = tokio::spawn(async move { pump_chunks(reader, &tx, &mut shutdown).await });
        shutdown_tx.send(true).unwrap();

        let end = tokio::time::timeout(Duration::from_secs(2), pump).await.unwrap().unwrap();
        assert_eq!(end, PumpEnd::Shutdown);
    }

    #[tokio::test]
    async fn test_backlog_fetch() {
        let harness = TestHarness::new();
        let journal = JournalLines::new("nas").failed("/dev/sdc").build();
        harness.script_backlog(&journal);

        let source = LogTailSource::new(harness.runner_handle(), Arc::new(harness.config.clone()));
        assert_eq!(source.fetch_backlog().await.unwrap(), journal);
        assert!(harness.runner.was_invoked("journalctl -u smartd -n 100"));
    }

    #[tokio::test]
    async fn test_backlog_failure_is_reported() {
        let harness = TestHarness::new();
        harness.runner.on_exit("journalctl -u smartd -n 100", 1);
        let source = LogTailSource::new(harness.runner_handle(), Arc::new(harness.config.clone()));
        assert!(matches!(source.fetch_backlog().await, Err(TailError::Exited { code: Some(1), .. })));

        harness.runner.clear();
        assert!(matches!(source.fetch_backlog().await, Err(TailError::Command(_))));
    }

    #[tokio::test]
    async fn test_follow_of_exiting_process_closes_once() {
        let mut config = MonitorConfig::default();
        config.journal.program = "echo".to_string();
        let harness = TestHarness::new();
        let source = LogTailSource::new(harness.runner_handle(), Arc::new(config));

        let (tx, mut rx) = mpsc::channel::<TailEvent>(16);
        let (_shutdown_tx, shutdown) = watch::channel(false);
        source.spawn_follow(tx, shutdown).await.unwrap();

        let mut text = String::new();
        let mut closed = Vec::new();
        while let Some(event) = rx.recv().await {
            match event {
                TailEvent::Chunk(chunk) => text.push_str(&chunk),
                TailEvent::Closed { reason } => closed.push(reason),
            }
        }
        assert_eq!(text, "-u smartd -f\n");
        assert_eq!(closed.len(), 1);
        assert!(closed[0].starts_with("echo exited"));
    }

    #[tokio::test]
    async fn test_follow_spawn_failure_closes() {
        let mut config = MonitorConfig::default();
        config.journal.program = "smartmon-no-such-journalctl".to_string();
        let harness = TestHarness::new();
        let source = LogTailSource::new(harness.runner_handle(), Arc::new(config));

        let (tx, mut rx) = mpsc::channel::<TailEvent>(4);
        let (_shutdown_tx, shutdown) = watch::channel(false);
        source.spawn_follow(tx, shutdown).await.unwrap();

        match rx.recv().await {
            Some(TailEvent::Closed { reason }) => assert!(reason.contains("failed to start")),
            other => panic!("unexpected event: {:?}", other),
        }
        assert!(rx.recv().await.is_none());
    }
}
