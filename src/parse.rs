//! Text decoders for the GlucoSense firmware stream.
//!
//! Two pieces, both free of I/O:
//!
//! | Item | Role |
//! |---|---|
//! | [`LineAssembler`] | Turns arbitrarily split byte chunks into complete, non-empty lines |
//! | [`classify`] | Maps one line to a [`LineEvent`] by substring matching |
//!
//! # Wire format
//!
//! The firmware prints free-form text terminated by either `\r\n` or `\n`.
//! The lines the host cares about look like this:
//!
//! ```text
//! NO FINGER - place finger on sensor
//! Calibration: 7.5s left
//! ====== PIPELINE RESULT ======
//! Perfusion Index (PI): 1.23
//! FEATURE X1 (log IR): -0.45
//! FEATURE X2 (log ratio): 0.88
//! ```
//!
//! Everything else (boot banners, debug prints) is classified as
//! [`LineEvent::Unclassified`].

use log::debug;

use crate::protocol::{
    CALIBRATION_LIMIT_SECS, CALIBRATION_MARKER, CALIBRATION_SUFFIX, NO_FINGER_MARKER, PI_MARKER,
    RESULT_HEADER_MARKER, VALUE_SEPARATOR, X1_MARKER, X2_MARKER,
};
use crate::types::LineEvent;

// ── Line reassembly ──────────────────────────────────────────────────────────

/// Accumulates transport chunks and yields complete lines.
///
/// Transport reads split the text stream at arbitrary points: a chunk may
/// hold half a line, several lines, or no terminator at all.  Unterminated
/// trailing bytes are carried over and prepended to the next chunk.
///
/// ```
/// # use glucosense_rs::parse::LineAssembler;
/// let mut asm = LineAssembler::new();
/// assert!(asm.feed(b"Calibration: 7.").is_empty());       // incomplete
/// assert_eq!(asm.feed(b"5s left\r\nNO FIN"), ["Calibration: 7.5s left"]);
/// assert_eq!(asm.feed(b"GER\n\n"), ["NO FINGER"]);         // empty line dropped
/// ```
///
/// Both `\n` and `\r\n` terminate a line.  A `\r` is only stripped when it
/// sits directly before the `\n`, which also holds when the two arrive in
/// different chunks.  Splitting happens on bytes, so a multi-byte UTF-8
/// character cut by a chunk boundary is decoded intact.
///
/// There is no upper bound on the carried-over buffer: a stream that never
/// sends a terminator grows it without limit.
#[derive(Debug, Default)]
pub struct LineAssembler {
    pending: Vec<u8>,
}

impl LineAssembler {
    /// Create an assembler with an empty carry-over buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `chunk` and return every line it completed, in arrival order.
    ///
    /// Empty lines (consecutive terminators) are dropped.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);

        let Some(last_newline) = self.pending.iter().rposition(|&b| b == b'\n') else {
            return Vec::new();
        };

        let tail = self.pending.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.pending, tail);

        complete
            .split(|&b| b == b'\n')
            .map(|line| line.strip_suffix(b"\r").unwrap_or(line))
            .filter(|line| !line.is_empty())
            .map(|line| String::from_utf8_lossy(line).into_owned())
            .collect()
    }

    /// Number of bytes waiting for a terminator.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Drop any partial line.  Called on stream teardown and reattach.
    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

// ── Line classification ──────────────────────────────────────────────────────

/// Classify one complete line.
///
/// Pure and total: every string maps to exactly one [`LineEvent`].  Markers
/// are tested in a fixed priority order and the first one contained in the
/// line wins:
///
/// 1. `NO FINGER` → [`LineEvent::NoFingerDetected`]
/// 2. `Calibration:` → [`LineEvent::CalibrationTick`] or [`LineEvent::CalibrationGlitch`]
/// 3. `PIPELINE RESULT` → [`LineEvent::ResultHeader`]
/// 4. `Perfusion Index (PI):` → [`LineEvent::PiValue`]
/// 5. `FEATURE X1` → [`LineEvent::X1Value`]
/// 6. `FEATURE X2` → [`LineEvent::X2Value`]
///
/// ```
/// # use glucosense_rs::parse::classify;
/// # use glucosense_rs::types::LineEvent;
/// assert_eq!(classify("Calibration: 7.5s left"), LineEvent::CalibrationTick(7.5));
/// assert_eq!(classify("FEATURE X1 (log IR): -0.45"), LineEvent::X1Value("-0.45".into()));
/// assert_eq!(classify("boot ok"), LineEvent::Unclassified);
/// ```
pub fn classify(line: &str) -> LineEvent {
    let event = if line.contains(NO_FINGER_MARKER) {
        LineEvent::NoFingerDetected
    } else if line.contains(CALIBRATION_MARKER) {
        let seconds = parse_calibration_seconds(line);
        if seconds.is_finite() && seconds < CALIBRATION_LIMIT_SECS {
            LineEvent::CalibrationTick(seconds)
        } else {
            LineEvent::CalibrationGlitch(seconds)
        }
    } else if line.contains(RESULT_HEADER_MARKER) {
        LineEvent::ResultHeader
    } else if line.contains(PI_MARKER) {
        LineEvent::PiValue(value_after_separator(line))
    } else if line.contains(X1_MARKER) {
        LineEvent::X1Value(value_after_separator(line))
    } else if line.contains(X2_MARKER) {
        LineEvent::X2Value(value_after_separator(line))
    } else {
        LineEvent::Unclassified
    };
    debug!("classify {line:?} -> {event:?}");
    event
}

/// Extract the countdown from `... Calibration: <n>s left ...`.
///
/// Unparseable text reads as `0.0`.  NaN and infinities parse as such and
/// are rejected by the caller.
fn parse_calibration_seconds(line: &str) -> f32 {
    let after = line
        .split_once(CALIBRATION_MARKER)
        .map_or(line, |(_, rest)| rest);
    let number = after
        .split_once(CALIBRATION_SUFFIX)
        .map_or(after, |(head, _)| head);
    number.trim().parse::<f32>().unwrap_or(0.0)
}

/// Text after the first `:`, trimmed.  Whole line (trimmed) if there is none.
fn value_after_separator(line: &str) -> String {
    line.split_once(VALUE_SEPARATOR)
        .map_or(line, |(_, value)| value)
        .trim()
        .to_owned()
}
