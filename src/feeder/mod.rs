//! # Virtual Gamepad Feeder
//!
//! Optional sink that drives an external virtual-gamepad process.
//!
//! This module handles:
//! - Folding slots 0 and 1 into one gamepad snapshot
//! - Spawning the feeder process and writing one JSON object per line
//! - Logging its `READY` / `ERROR:<message>` status lines
//! - Sending `QUIT` on shutdown
//!
//! Snapshots travel through a bounded channel with `try_send`, so a slow or
//! dead feeder never stalls the DSU path.

use std::process::Stdio;
use std::time::Duration;

use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use crate::config::FeederConfig;
use crate::controller::state::ControllerSlot;
use crate::controller::store::ControllerStore;
use crate::error::{BridgeError, Result};

/// Snapshots queued before new ones are dropped
pub const FEEDER_CHANNEL_CAPACITY: usize = 32;

/// Line written to ask the feeder to exit
pub const QUIT_COMMAND: &str = "QUIT";

/// Time allowed for the feeder to exit after `QUIT`
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

/// Aggregated gamepad state written to the feeder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeederSnapshot {
    pub buttons1: u8,
    pub buttons2: u8,
    pub left_stick_x: u8,
    pub left_stick_y: u8,
    pub right_stick_x: u8,
    pub right_stick_y: u8,
    pub left_trigger: u8,
    pub right_trigger: u8,
}

impl FeederSnapshot {
    /// Fold the left-hand slot (0) and right-hand slot (1) into one gamepad.
    ///
    /// Buttons are OR-ed. The right stick and trigger come from slot 1 while
    /// it is connected, otherwise from slot 0.
    pub fn from_slots(left: &ControllerSlot, right: &ControllerSlot) -> Self {
        let right_source = if right.connected { right } else { left };

        Self {
            buttons1: left.buttons1 | right.buttons1,
            buttons2: left.buttons2 | right.buttons2,
            left_stick_x: left.left_stick_x,
            left_stick_y: left.left_stick_y,
            right_stick_x: right_source.right_stick_x,
            right_stick_y: right_source.right_stick_y,
            left_trigger: left.analog_l2,
            right_trigger: right_source.analog_r2,
        }
    }

    /// Snapshot the current store contents
    pub fn from_store(store: &ControllerStore) -> Result<Self> {
        Ok(Self::from_slots(&store.get(0)?, &store.get(1)?))
    }

    /// One newline-terminated JSON line
    pub fn to_line(&self) -> Result<String> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}

/// Messages for the writer task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeederCommand {
    Snapshot(FeederSnapshot),
    Quit,
}

/// Cloneable sender side of the feeder channel
#[derive(Debug, Clone)]
pub struct FeederHandle {
    tx: mpsc::Sender<FeederCommand>,
}

impl FeederHandle {
    /// Create a handle and the receiver consumed by [`run_writer`]
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<FeederCommand>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    /// Queue a snapshot without waiting. Returns `false` if it was dropped.
    pub fn send(&self, snapshot: FeederSnapshot) -> bool {
        match self.tx.try_send(FeederCommand::Snapshot(snapshot)) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                trace!("Feeder channel full, dropping snapshot");
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }

    /// Snapshot the store and queue it
    pub fn send_from_store(&self, store: &ControllerStore) -> bool {
        match FeederSnapshot::from_store(store) {
            Ok(snapshot) => self.send(snapshot),
            Err(e) => {
                debug!("Failed to snapshot controllers for feeder: {}", e);
                false
            }
        }
    }

    /// Ask the writer to send `QUIT` and stop
    pub async fn quit(&self) {
        let _ = self.tx.send(FeederCommand::Quit).await;
    }
}

/// What a status line from the feeder means
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeederStatus {
    Ready,
    Error(String),
    Other(String),
}

impl FeederStatus {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line == "READY" {
            FeederStatus::Ready
        } else if let Some(message) = line.strip_prefix("ERROR:") {
            FeederStatus::Error(message.trim().to_string())
        } else {
            FeederStatus::Other(line.to_string())
        }
    }
}

/// Write queued snapshots as JSON lines until `Quit` or channel close.
///
/// Identical consecutive snapshots are written once. `QUIT` is written on
/// the way out in both cases.
///
/// # Errors
///
/// Returns `Io` when the feeder's stdin is gone.
pub async fn run_writer<W>(mut rx: mpsc::Receiver<FeederCommand>, mut writer: W) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut last: Option<FeederSnapshot> = None;

    while let Some(command) = rx.recv().await {
        match command {
            FeederCommand::Snapshot(snapshot) => {
                if last == Some(snapshot) {
                    continue;
                }
                writer.write_all(snapshot.to_line()?.as_bytes()).await?;
                writer.flush().await?;
                last = Some(snapshot);
            }
            FeederCommand::Quit => break,
        }
    }

    writer.write_all(format!("{}\n", QUIT_COMMAND).as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

/// Log feeder status lines until its stdout closes.
///
/// Returns `true` if the feeder reported `READY`.
pub async fn run_reader<R>(reader: R) -> bool
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut ready = false;

    loop {
        match lines.next_line().await {
            Ok(Some(line)) => match FeederStatus::parse(&line) {
                FeederStatus::Ready => {
                    info!("Feeder ready");
                    ready = true;
                }
                FeederStatus::Error(message) => error!("Feeder error: {}", message),
                FeederStatus::Other(text) if text.is_empty() => {}
                FeederStatus::Other(text) => debug!("Feeder: {}", text),
            },
            Ok(None) => break,
            Err(e) => {
                debug!("Feeder stdout read error: {}", e);
                break;
            }
        }
    }

    ready
}

/// A running feeder process
#[derive(Debug)]
pub struct Feeder {
    handle: FeederHandle,
    child: Child,
    writer: JoinHandle<Result<()>>,
    reader: JoinHandle<bool>,
}

impl Feeder {
    /// Spawn the configured feeder command
    ///
    /// # Errors
    ///
    /// Returns `Feeder` if the process cannot be started.
    pub fn spawn(config: &FeederConfig) -> Result<Self> {
        let mut child = Command::new(&config.command)
            .args(&config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| BridgeError::Feeder(format!("Failed to start {}: {}", config.command, e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| BridgeError::Feeder("Feeder stdin not captured".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| BridgeError::Feeder("Feeder stdout not captured".to_string()))?;

        info!("Started feeder: {} {}", config.command, config.args.join(" "));

        let (handle, rx) = FeederHandle::channel(FEEDER_CHANNEL_CAPACITY);
        let writer = tokio::spawn(async move {
            let result = run_writer(rx, stdin).await;
            if let Err(e) = &result {
                warn!("Feeder writer stopped: {}", e);
            }
            result
        });
        let reader = tokio::spawn(run_reader(BufReader::new(stdout)));

        Ok(Self {
            handle,
            child,
            writer,
            reader,
        })
    }

    /// Sender for snapshots
    pub fn handle(&self) -> FeederHandle {
        self.handle.clone()
    }

    /// Send `QUIT`, wait briefly for the process to exit, then kill it.
    ///
    /// A feeder that stopped reading its input gets the same grace period
    /// for draining `QUIT` before the writer is abandoned.
    ///
    /// Returns whether the feeder ever reported ready.
    pub async fn shutdown(mut self) -> Result<bool> {
        let handle = &self.handle;
        let writer = &mut self.writer;
        let stopped = tokio::time::timeout(SHUTDOWN_TIMEOUT, async {
            handle.quit().await;
            writer.await
        })
        .await;

        match stopped {
            Ok(Ok(Err(e))) => debug!("Feeder writer ended with error: {}", e),
            Ok(_) => {}
            Err(_) => {
                warn!("Feeder is not reading input, abandoning writer");
                self.writer.abort();
            }
        }

        match tokio::time::timeout(SHUTDOWN_TIMEOUT, self.child.wait()).await {
            Ok(Ok(status)) => info!("Feeder exited: {}", status),
            Ok(Err(e)) => warn!("Failed to wait for feeder: {}", e),
            Err(_) => {
                warn!("Feeder did not exit, killing it");
                self.child.kill().await?;
            }
        }

        Ok(self.reader.await.unwrap_or(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::update::{ControlUpdate, StickInput};

    fn connected(id: u8) -> ControllerSlot {
        let mut slot = ControllerSlot::new(id);
        slot.connected = true;
        slot
    }

    #[test]
    fn test_snapshot_json_keys() {
        let snapshot = FeederSnapshot::from_slots(&ControllerSlot::new(0), &ControllerSlot::new(1));
        let line = snapshot.to_line().unwrap();

        assert!(line.ends_with('\n'));
        let value: serde_json::Value = serde_json::from_str(line.trim()).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "buttons1": 0,
                "buttons2": 0,
                "leftStickX": 128,
                "leftStickY": 128,
                "rightStickX": 128,
                "rightStickY": 128,
                "leftTrigger": 0,
                "rightTrigger": 0
            })
        );
    }

    #[test]
    fn test_buttons_are_ored_across_hands() {
        let mut left = connected(0);
        let mut right = connected(1);
        left.buttons1 = 0x02;
        left.buttons2 = 0x10;
        right.buttons1 = 0x08;
        right.buttons2 = 0x40;

        let snapshot = FeederSnapshot::from_slots(&left, &right);
        assert_eq!(snapshot.buttons1, 0x0A);
        assert_eq!(snapshot.buttons2, 0x50);
    }

    #[test]
    fn test_right_side_from_slot_one_when_connected() {
        let mut left = connected(0);
        left.left_stick_x = 10;
        left.analog_l2 = 20;
        left.right_stick_x = 30;
        left.analog_r2 = 40;

        let mut right = connected(1);
        right.right_stick_x = 200;
        right.right_stick_y = 210;
        right.analog_r2 = 220;

        let snapshot = FeederSnapshot::from_slots(&left, &right);
        assert_eq!(snapshot.left_stick_x, 10);
        assert_eq!(snapshot.left_trigger, 20);
        assert_eq!(snapshot.right_stick_x, 200);
        assert_eq!(snapshot.right_stick_y, 210);
        assert_eq!(snapshot.right_trigger, 220);

        // Slot 1 gone: slot 0 supplies the right side
        right.connected = false;
        let snapshot = FeederSnapshot::from_slots(&left, &right);
        assert_eq!(snapshot.right_stick_x, 30);
        assert_eq!(snapshot.right_trigger, 40);
    }

    #[test]
    fn test_snapshot_from_store() {
        let store = ControllerStore::new();
        store
            .apply_update(
                0,
                &ControlUpdate {
                    left_stick: Some(StickInput::new(1.0, 1.0)),
                    l2: Some(1.0),
                    ..Default::default()
                },
            )
            .unwrap();

        let snapshot = FeederSnapshot::from_store(&store).unwrap();
        assert_eq!(snapshot.left_stick_x, 255);
        assert_eq!(snapshot.left_trigger, 255);
    }

    #[test]
    fn test_status_line_parsing() {
        assert_eq!(FeederStatus::parse("READY\r"), FeederStatus::Ready);
        assert_eq!(
            FeederStatus::parse("ERROR:ViGEmBus driver not installed"),
            FeederStatus::Error("ViGEmBus driver not installed".to_string())
        );
        assert_eq!(FeederStatus::parse("hello"), FeederStatus::Other("hello".to_string()));
    }

    #[test]
    fn test_full_channel_drops_snapshot() {
        let (handle, _rx) = FeederHandle::channel(1);
        let snapshot = FeederSnapshot::from_slots(&ControllerSlot::new(0), &ControllerSlot::new(1));

        assert!(handle.send(snapshot));
        assert!(!handle.send(snapshot));
    }

    #[test]
    fn test_closed_channel_drops_snapshot() {
        let (handle, rx) = FeederHandle::channel(4);
        drop(rx);
        let snapshot = FeederSnapshot::from_slots(&ControllerSlot::new(0), &ControllerSlot::new(1));
        assert!(!handle.send(snapshot));
    }

    #[tokio::test]
    async fn test_writer_emits_lines_then_quit() {
        let (handle, rx) = FeederHandle::channel(8);
        let idle = FeederSnapshot::from_slots(&ControllerSlot::new(0), &ControllerSlot::new(1));
        let pressed = FeederSnapshot { buttons2: 0x40, ..idle };

        handle.send(idle);
        handle.send(idle);
        handle.send(pressed);
        handle.quit().await;

        let mut output: Vec<u8> = Vec::new();
        run_writer(rx, &mut output).await.unwrap();

        let text = String::from_utf8(output).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("\"buttons2\":0"));
        assert!(lines[1].contains("\"buttons2\":64"));
        assert_eq!(lines[2], QUIT_COMMAND);
    }

    #[tokio::test]
    async fn test_writer_quits_when_all_handles_dropped() {
        let (handle, rx) = FeederHandle::channel(8);
        drop(handle);

        let mut output: Vec<u8> = Vec::new();
        run_writer(rx, &mut output).await.unwrap();
        assert_eq!(output, b"QUIT\n");
    }

    #[tokio::test]
    async fn test_reader_detects_ready() {
        let input: &[u8] = b"starting\nREADY\n";
        assert!(run_reader(input).await);

        let input: &[u8] = b"ERROR:Cannot access ViGEmBus\n";
        assert!(!run_reader(input).await);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_spawn_and_shutdown_real_process() {
        let config = FeederConfig {
            enabled: true,
            command: "sh".to_string(),
            args: vec![
                "-c".to_string(),
                "echo READY; while read line; do [ \"$line\" = QUIT ] && exit 0; done".to_string(),
            ],
        };

        let feeder = Feeder::spawn(&config).unwrap();
        feeder
            .handle()
            .send(FeederSnapshot::from_slots(&ControllerSlot::new(0), &ControllerSlot::new(1)));

        assert!(feeder.shutdown().await.unwrap());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_shutdown_when_feeder_stops_reading() {
        let config = FeederConfig {
            enabled: true,
            command: "sh".to_string(),
            args: vec!["-c".to_string(), "echo READY; exec sleep 30".to_string()],
        };

        let feeder = Feeder::spawn(&config).unwrap();
        let handle = feeder.handle();
        let idle = FeederSnapshot::from_slots(&ControllerSlot::new(0), &ControllerSlot::new(1));

        // Distinct snapshots until the stdin pipe and the channel are full
        for i in 0..4000u32 {
            handle.send(FeederSnapshot {
                buttons1: (i >> 8) as u8,
                left_stick_x: i as u8,
                ..idle
            });
            tokio::task::yield_now().await;
        }

        let result = tokio::time::timeout(Duration::from_secs(10), feeder.shutdown()).await;
        assert!(result.expect("shutdown hung").unwrap());
    }

    #[test]
    fn test_spawn_missing_command_fails() {
        let config = FeederConfig {
            enabled: true,
            command: "definitely-not-a-real-feeder-binary".to_string(),
            args: Vec::new(),
        };
        let result = tokio_test::block_on(async { Feeder::spawn(&config).map(|_| ()) });
        assert!(matches!(result, Err(BridgeError::Feeder(_))));
    }
}
