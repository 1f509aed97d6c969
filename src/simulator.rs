//! Synthetic GlucoSense firmware output.
//!
//! Used by `glucosense-rs --simulate` and by tests that need a realistic
//! stream without hardware.  A session is one measurement cycle as the
//! ESP32 prints it:
//!
//! | Phase | Lines |
//! |---|---|
//! | Boot | firmware banner, sensor init |
//! | No finger | 2 × `NO FINGER ...` |
//! | Calibration | `Calibration: <n>s left` from 15 s down to 0 in 1.5 s steps, with one underflow glitch |
//! | Result | `PIPELINE RESULT` header, PI, X1, X2 |
//!
//! Lines are terminated with a random mix of `\r\n` and `\n`, and
//! [`chunked`] cuts the bytes at random boundaries the way a Bluetooth SPP
//! read would.  Everything is driven by a seeded [`StdRng`], so a seed
//! always reproduces the same bytes and the same chunking.

use std::time::Duration;

use anyhow::Result;
use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::task::JoinHandle;

use crate::protocol::CALIBRATION_TOTAL_SECS;
use crate::types::PipelineResult;

/// Underflowed countdown the real firmware prints now and then.
const GLITCH_LINE: &str = "Calibration: 4294967s left";

/// Countdown step between calibration lines, in seconds.
const CALIBRATION_STEP_SECS: f32 = 1.5;

/// One generated measurement cycle.
#[derive(Debug, Clone)]
pub struct SimulatedSession {
    /// Raw bytes as the firmware would send them.
    pub bytes: Vec<u8>,
    /// The non-empty lines contained in `bytes`, in order.
    pub lines: Vec<String>,
    /// Result a parser must end up with after consuming `bytes`.
    pub expected_result: PipelineResult,
    /// Last accepted calibration value in the session.
    pub final_calibration_secs: f32,
}

/// Generate one measurement cycle from `seed`.
pub fn firmware_session(seed: u64) -> SimulatedSession {
    let mut rng = StdRng::seed_from_u64(seed);

    let pi = format!("{:.2}", rng.gen_range(0.2..8.0_f32));
    let x1 = format!("{:.4}", rng.gen_range(-1.5..0.5_f32));
    let x2 = format!("{:.4}", rng.gen_range(-0.5..1.5_f32));

    let mut lines: Vec<String> = vec![
        "GlucoSense ESP32 fw 0.3.1".into(),
        "MAX30102 init OK".into(),
        "NO FINGER - place finger on sensor".into(),
        "NO FINGER - place finger on sensor".into(),
    ];

    let steps = (CALIBRATION_TOTAL_SECS / CALIBRATION_STEP_SECS) as usize;
    let glitch_at = rng.gen_range(1..steps);
    for step in 0..=steps {
        let left = CALIBRATION_TOTAL_SECS - step as f32 * CALIBRATION_STEP_SECS;
        lines.push(format!("Calibration: {left:.1}s left"));
        if step == glitch_at {
            lines.push(GLITCH_LINE.into());
        }
    }

    lines.push("====== PIPELINE RESULT ======".into());
    lines.push(format!("Perfusion Index (PI): {pi}"));
    lines.push(format!("FEATURE X1 (log IR): {x1}"));
    lines.push(format!("FEATURE X2 (log ratio): {x2}"));

    let mut bytes = Vec::new();
    for line in &lines {
        bytes.extend_from_slice(line.as_bytes());
        if rng.gen_bool(0.5) {
            bytes.extend_from_slice(b"\r\n");
        } else {
            bytes.push(b'\n');
        }
        // The firmware sometimes prints a bare separator line.
        if rng.gen_bool(0.1) {
            bytes.extend_from_slice(b"\r\n");
        }
    }

    SimulatedSession {
        bytes,
        lines,
        expected_result: PipelineResult {
            perfusion_index: pi,
            feature_x1: x1,
            feature_x2: x2,
        },
        final_calibration_secs: CALIBRATION_TOTAL_SECS - steps as f32 * CALIBRATION_STEP_SECS,
    }
}

/// Split `bytes` into consecutive chunks of `1..=max_chunk` bytes.
///
/// Concatenating the chunks gives back `bytes`.
pub fn chunked(bytes: &[u8], seed: u64, max_chunk: usize) -> Vec<Vec<u8>> {
    let mut rng = StdRng::seed_from_u64(seed);
    let max_chunk = max_chunk.max(1);
    let mut chunks = Vec::new();
    let mut rest = bytes;
    while !rest.is_empty() {
        let n = rng.gen_range(1..=max_chunk).min(rest.len());
        let (head, tail) = rest.split_at(n);
        chunks.push(head.to_vec());
        rest = tail;
    }
    chunks
}

/// Spawn a task that writes `rounds` sessions into `writer`, one chunk per
/// `interval`, then closes it.
///
/// Each round uses `seed + round` so successive results differ.
pub fn spawn_simulator<W>(
    mut writer: W,
    seed: u64,
    rounds: u32,
    interval: Duration,
) -> JoinHandle<Result<()>>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        for round in 0..rounds {
            let round_seed = seed.wrapping_add(round as u64);
            let session = firmware_session(round_seed);
            info!(
                "simulator: round {} of {rounds} ({} lines)",
                round + 1,
                session.lines.len()
            );
            for chunk in chunked(&session.bytes, round_seed, 48) {
                ticker.tick().await;
                debug!("simulator: writing {} bytes", chunk.len());
                writer.write_all(&chunk).await?;
            }
        }
        writer.shutdown().await?;
        Ok(())
    })
}
