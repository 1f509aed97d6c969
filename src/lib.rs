//! # glucosense-rs
//!
//! Async Rust library and CLI for the text telemetry printed by GlucoSense
//! optical finger sensors (ESP32 + MAX30102) over Bluetooth SPP.
//!
//! The firmware streams free-form lines: a no-finger warning, a calibration
//! countdown, and result blocks with a perfusion index and two derived
//! features.  This crate reassembles those lines from arbitrary read
//! chunks, classifies them, and keeps a small state machine describing what
//! the sensor is doing.
//!
//! Opening the Bluetooth socket is left to the host: any
//! [`tokio::io::AsyncRead`] works (an RFCOMM device node, a TCP bridge,
//! stdin, an in-memory pipe).
//!
//! ## Quick start
//!
//! ```no_run
//! use glucosense_rs::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = SensorClient::new(SensorClientConfig::default());
//!     let (mut rx, _handle) = client.open("/dev/rfcomm0").await?;
//!
//!     while let Some(event) = rx.recv().await {
//!         match event {
//!             SensorEvent::Snapshot(s) => println!("{:?} {:?}", s.state, s.result),
//!             SensorEvent::Disconnected => break,
//!             _ => {}
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! Without a runtime, drive [`state::SensorCore`] directly:
//!
//! ```
//! use glucosense_rs::prelude::*;
//!
//! let mut core = SensorCore::default();
//! core.feed(b"PIPELINE RESULT\r\nPerfusion Index (PI): 1.2");
//! let out = core.feed(b"3\r\nFEATURE X1: -0.45\nFEATURE X2: 0.88\n");
//! let snap = out.snapshot.unwrap();
//! assert_eq!(snap.state, SensorState::ResultReady);
//! assert_eq!(snap.result.perfusion_index, "1.23");
//! ```
//!
//! ## Module overview
//!
//! | Module | Purpose |
//! |---|---|
//! | [`prelude`] | One-line glob import of the commonly needed types |
//! | [`sensor_client`] | Async read loop, [`sensor_client::SensorHandle`] polling and disconnect |
//! | [`state`] | Sensor state machine and the synchronous feed/teardown core |
//! | [`parse`] | Line reassembly and line classification |
//! | [`log_buffer`] | Bounded serial-monitor history |
//! | [`types`] | Result, state, snapshot, and event types |
//! | [`protocol`] | Firmware line markers, limits, and SPP identity |
//! | [`simulator`] | Synthetic firmware output for demos and tests |

pub mod log_buffer;
pub mod parse;
pub mod protocol;
pub mod sensor_client;
pub mod simulator;
pub mod state;
pub mod types;

// ── Prelude ───────────────────────────────────────────────────────────────────

/// Convenience re-exports for downstream crates.
pub mod prelude {
    // ── Client ────────────────────────────────────────────────────────────────
    pub use crate::sensor_client::{SensorClient, SensorClientConfig, SensorHandle};

    // ── Core ──────────────────────────────────────────────────────────────────
    pub use crate::log_buffer::LogBuffer;
    pub use crate::parse::{classify, LineAssembler};
    pub use crate::state::{FeedOutcome, SensorCore, SensorStateMachine};

    // ── Events and data types ─────────────────────────────────────────────────
    pub use crate::types::{
        CalibrationProgress, LineEvent, LogEntry, PipelineResult, SensorEvent, SensorSnapshot,
        SensorState,
    };

    // ── Protocol constants ────────────────────────────────────────────────────
    pub use crate::protocol::{MAX_LOG_LINES, SPP_UUID, TARGET_DEVICE_NAME};
}
