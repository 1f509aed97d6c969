use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::{anyhow, Result};
use log::{debug, info, warn};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;

use crate::log_buffer::LogBuffer;
use crate::protocol::{MAX_LOG_LINES, READ_BUFFER_SIZE, TARGET_DEVICE_NAME};
use crate::state::SensorCore;
use crate::types::{LogEntry, SensorEvent, SensorSnapshot};

fn lock(core: &Mutex<SensorCore>) -> MutexGuard<'_, SensorCore> {
    core.lock().unwrap_or_else(PoisonError::into_inner)
}

// ── SensorClientConfig ───────────────────────────────────────────────────────

/// Configuration for [`SensorClient`].
#[derive(Debug, Clone)]
pub struct SensorClientConfig {
    /// Bytes requested per transport read.  Default: `1024`.
    pub read_buffer_size: usize,
    /// Raw lines kept for the serial monitor.  Default: `200`.
    pub log_capacity: usize,
    /// Capacity of the event channel returned by [`SensorClient::attach`]
    /// (minimum 2).  The read loop waits when it is full.  Default: `256`.
    pub event_channel_capacity: usize,
    /// Name reported in [`SensorEvent::Connected`].
    /// Default: `"GlucoSensor_ESP32"`.
    pub device_name: String,
}

impl Default for SensorClientConfig {
    fn default() -> Self {
        Self {
            read_buffer_size: READ_BUFFER_SIZE,
            log_capacity: MAX_LOG_LINES,
            event_channel_capacity: 256,
            device_name: TARGET_DEVICE_NAME.into(),
        }
    }
}

// ── SensorClient ─────────────────────────────────────────────────────────────

/// Drives a [`SensorCore`] from any byte stream.
///
/// The client does not open Bluetooth sockets.  The host hands it an already
/// connected reader (an RFCOMM device node, a TCP bridge, stdin, an in-memory
/// pipe) and the client runs the read loop:
///
/// 1. read up to `read_buffer_size` bytes (the only suspension point),
/// 2. reassemble, classify, and apply every completed line,
/// 3. push `Line` events and at most one `Snapshot` for the chunk.
///
/// The core outlives individual streams, so results reported before a
/// reconnect stay visible until the firmware overwrites them.
pub struct SensorClient {
    config: SensorClientConfig,
    core: Arc<Mutex<SensorCore>>,
    active: Mutex<Option<Arc<Notify>>>,
}

impl SensorClient {
    pub fn new(config: SensorClientConfig) -> Self {
        let core = SensorCore::new(LogBuffer::with_capacity(config.log_capacity));
        Self {
            config,
            core: Arc::new(Mutex::new(core)),
            active: Mutex::new(None),
        }
    }

    // ── Public: open ─────────────────────────────────────────────────────────

    /// Open a device node (e.g. `/dev/rfcomm0`) or file and attach to it.
    pub async fn open(
        &self,
        path: impl AsRef<Path>,
    ) -> Result<(mpsc::Receiver<SensorEvent>, SensorHandle)> {
        let path = path.as_ref();
        let file = tokio::fs::File::open(path)
            .await
            .map_err(|e| anyhow!("cannot open {}: {e}", path.display()))?;
        info!("Opened {}", path.display());
        self.attach(file).await
    }

    // ── Public: attach ───────────────────────────────────────────────────────

    /// Start a read loop over `reader` and return the event receiver and a
    /// [`SensorHandle`].
    ///
    /// Any stream attached earlier through this client is torn down first.
    pub async fn attach<R>(&self, reader: R) -> Result<(mpsc::Receiver<SensorEvent>, SensorHandle)>
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        if self.config.read_buffer_size == 0 {
            return Err(anyhow!("read_buffer_size must be greater than zero"));
        }

        let shutdown = Arc::new(Notify::new());
        {
            let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(previous) = active.replace(Arc::clone(&shutdown)) {
                debug!("attach: stopping previous stream");
                previous.notify_one();
            }
        }

        let (session, snapshot) = {
            let mut core = lock(&self.core);
            let snapshot = core.reset();
            (core.session(), snapshot)
        };

        // Room for `Connected` and the initial snapshot, sent before the
        // caller holds the receiver.
        let (tx, rx) = mpsc::channel::<SensorEvent>(self.config.event_channel_capacity.max(2));
        let _ = tx.send(SensorEvent::Connected(self.config.device_name.clone())).await;
        let _ = tx.send(SensorEvent::Snapshot(snapshot)).await;
        info!("{}: stream attached (session {session})", self.config.device_name);

        let task = tokio::spawn(read_loop(
            reader,
            Arc::clone(&self.core),
            session,
            Arc::clone(&shutdown),
            tx,
            self.config.read_buffer_size,
        ));

        let handle = SensorHandle {
            core: Arc::clone(&self.core),
            session,
            shutdown,
            task,
        };
        Ok((rx, handle))
    }

    /// Latest snapshot, whether or not a stream is attached.
    pub fn snapshot(&self) -> SensorSnapshot {
        lock(&self.core).snapshot()
    }
}

// ── Read loop ────────────────────────────────────────────────────────────────

async fn read_loop<R>(
    mut reader: R,
    core: Arc<Mutex<SensorCore>>,
    session: u64,
    shutdown: Arc<Notify>,
    tx: mpsc::Sender<SensorEvent>,
    read_buffer_size: usize,
) where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; read_buffer_size];
    let mut chunk_count: u64 = 0;

    loop {
        let n = tokio::select! {
            biased;
            _ = shutdown.notified() => {
                info!("session {session}: disconnect requested");
                break;
            }
            read = reader.read(&mut buf) => match read {
                Ok(0) => {
                    info!("session {session}: stream ended");
                    break;
                }
                Ok(n) => n,
                Err(e) => {
                    warn!("session {session}: read error: {e}");
                    break;
                }
            },
        };

        chunk_count += 1;
        if chunk_count <= 3 || chunk_count % 500 == 0 {
            debug!("session {session}: chunk #{chunk_count} len={n}");
        }

        let outcome = {
            let mut core = lock(&core);
            if core.session() != session || core.is_halted() {
                debug!("session {session}: dropping chunk after teardown");
                break;
            }
            core.feed(&buf[..n])
        };

        for entry in outcome.lines {
            let _ = tx.send(SensorEvent::Line(entry)).await;
        }
        if let Some(snapshot) = outcome.snapshot {
            let _ = tx.send(SensorEvent::Snapshot(snapshot)).await;
        }
    }

    let final_snapshot = {
        let mut core = lock(&core);
        (core.session() == session).then(|| core.teardown())
    };
    if let Some(snapshot) = final_snapshot {
        let _ = tx.send(SensorEvent::Snapshot(snapshot)).await;
    }
    let _ = tx.send(SensorEvent::Disconnected).await;
}

// ── SensorHandle ─────────────────────────────────────────────────────────────

/// Handle to one attached stream.
///
/// Snapshots and log contents can be polled at any time; they always reflect
/// whole chunks.
pub struct SensorHandle {
    core: Arc<Mutex<SensorCore>>,
    session: u64,
    shutdown: Arc<Notify>,
    task: JoinHandle<()>,
}

impl SensorHandle {
    /// Latest state, result, and calibration value.
    pub fn snapshot(&self) -> SensorSnapshot {
        lock(&self.core).snapshot()
    }

    /// Serial-monitor contents, oldest first.
    pub fn log_lines(&self) -> Vec<LogEntry> {
        lock(&self.core).log().to_vec()
    }

    /// `true` while this handle's stream is the active one and not torn down.
    pub fn is_connected(&self) -> bool {
        let core = lock(&self.core);
        core.session() == self.session && !core.is_halted()
    }

    /// Stop the read loop and go `Idle`.
    ///
    /// Takes effect immediately: a chunk that is already being read when
    /// this is called is discarded, not applied.
    pub fn disconnect(&self) {
        {
            let mut core = lock(&self.core);
            if core.session() == self.session {
                core.teardown();
            }
        }
        self.shutdown.notify_one();
    }

    /// Wait for the read loop to finish (after EOF, an I/O error, or
    /// [`disconnect`](Self::disconnect)).
    pub async fn join(self) -> Result<()> {
        self.task
            .await
            .map_err(|e| anyhow!("read loop task failed: {e}"))
    }
}
