use serde::Serialize;

use crate::protocol::{CALIBRATION_TOTAL_SECS, UNKNOWN_VALUE};

/// The latest values reported in a firmware result block.
///
/// All three fields are opaque display text exactly as printed by the
/// firmware (after trimming).  They start as `"--"` and are replaced one at a
/// time as result lines arrive; a field is never rolled back.
///
/// Values are immutable: every update produces a new `PipelineResult` via the
/// `with_*` methods, so a published snapshot never changes under a reader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineResult {
    /// Perfusion index (signal quality), e.g. `"1.23"`.
    pub perfusion_index: String,
    /// Feature X1 (log IR), e.g. `"-0.45"`.
    pub feature_x1: String,
    /// Feature X2 (log ratio), e.g. `"0.88"`.
    pub feature_x2: String,
}

impl Default for PipelineResult {
    fn default() -> Self {
        Self {
            perfusion_index: UNKNOWN_VALUE.into(),
            feature_x1: UNKNOWN_VALUE.into(),
            feature_x2: UNKNOWN_VALUE.into(),
        }
    }
}

impl PipelineResult {
    pub fn with_perfusion_index(&self, value: impl Into<String>) -> Self {
        Self {
            perfusion_index: value.into(),
            ..self.clone()
        }
    }

    pub fn with_feature_x1(&self, value: impl Into<String>) -> Self {
        Self {
            feature_x1: value.into(),
            ..self.clone()
        }
    }

    pub fn with_feature_x2(&self, value: impl Into<String>) -> Self {
        Self {
            feature_x2: value.into(),
            ..self.clone()
        }
    }

    /// `true` when the perfusion index looks like a real reading.
    ///
    /// The firmware prints PI with a decimal point; the `"--"` placeholder and
    /// status words like `"low"` have none.
    pub fn has_perfusion_index(&self) -> bool {
        self.perfusion_index.contains('.')
    }
}

/// What the physical sensor is currently doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum SensorState {
    /// No stream, or the stream was torn down.
    #[default]
    Idle,
    /// Counting down the calibration window.
    Calibrating,
    /// A result block has started; values are arriving.
    Measuring,
    /// The sensor reports no finger on the optical window.
    NoFinger,
    /// The last line of a result block has been applied.
    ResultReady,
}

/// Seconds left in the calibration window, as last reported by the firmware.
///
/// Only meaningful while the state is [`SensorState::Calibrating`].  Holds the
/// last accepted reading; corrupted readings never reach it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CalibrationProgress {
    pub seconds_left: f32,
}

impl Default for CalibrationProgress {
    fn default() -> Self {
        Self {
            seconds_left: CALIBRATION_TOTAL_SECS,
        }
    }
}

impl CalibrationProgress {
    /// Completed share of the calibration window, clamped to `0.0..=1.0`.
    pub fn fraction(&self) -> f32 {
        ((CALIBRATION_TOTAL_SECS - self.seconds_left) / CALIBRATION_TOTAL_SECS).clamp(0.0, 1.0)
    }
}

/// One raw line captured for the serial monitor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    /// Arrival counter, starting at 0 for the first line ever appended.
    /// Keeps counting across evictions.
    pub seq: u64,
    pub text: String,
}

/// Classification of a single complete line.
///
/// Produced by [`crate::parse::classify`]; consumed by
/// [`crate::state::SensorStateMachine::apply`].
#[derive(Debug, Clone, PartialEq)]
pub enum LineEvent {
    /// `NO FINGER` appeared anywhere in the line.
    NoFingerDetected,
    /// An accepted calibration countdown value in seconds (`< 1000`).
    CalibrationTick(f32),
    /// A calibration line whose value is corrupted (`>= 1000` or not finite).
    /// Carries the rejected reading for diagnostics.
    CalibrationGlitch(f32),
    /// `PIPELINE RESULT` header: a new result block begins.
    ResultHeader,
    /// Perfusion index text.
    PiValue(String),
    /// Feature X1 text.
    X1Value(String),
    /// Feature X2 text; closes the result block.
    X2Value(String),
    /// Anything else.  Recorded in the log, ignored by the state machine.
    Unclassified,
}

/// A consistent view of the sensor, published between chunks.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorSnapshot {
    pub state: SensorState,
    pub result: PipelineResult,
    pub calibration: CalibrationProgress,
    /// `false` once the stream has been torn down.
    pub connected: bool,
}

/// Events pushed by [`crate::sensor_client::SensorClient`] to its observer.
///
/// Order on the channel follows arrival order on the wire: all `Line` events
/// of a chunk come before the `Snapshot` that reflects them.
#[derive(Debug, Clone)]
pub enum SensorEvent {
    /// The read loop has started.  Carries the configured device name.
    Connected(String),
    /// A non-empty line was reassembled from the stream.
    Line(LogEntry),
    /// State or result changed while applying the last chunk.
    Snapshot(SensorSnapshot),
    /// The stream ended (EOF, I/O error, or explicit disconnect).
    ///
    /// No further events arrive after this one.
    Disconnected,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_updates_leave_other_fields_alone() {
        let first = PipelineResult::default();
        let second = first.with_perfusion_index("1.23");
        let third = second.with_feature_x2("0.88");

        assert_eq!(first.perfusion_index, "--");
        assert_eq!(second.perfusion_index, "1.23");
        assert_eq!(second.feature_x1, "--");
        assert_eq!(third.perfusion_index, "1.23");
        assert_eq!(third.feature_x2, "0.88");
    }

    #[test]
    fn perfusion_index_needs_a_decimal_point() {
        let r = PipelineResult::default();
        assert!(!r.has_perfusion_index());
        assert!(!r.with_perfusion_index("low").has_perfusion_index());
        assert!(r.with_perfusion_index("0.42").has_perfusion_index());
    }

    #[test]
    fn calibration_fraction_is_clamped() {
        let p = |s| CalibrationProgress { seconds_left: s };
        assert_eq!(CalibrationProgress::default().fraction(), 0.0);
        assert_eq!(p(7.5).fraction(), 0.5);
        assert_eq!(p(0.0).fraction(), 1.0);
        assert_eq!(p(-3.0).fraction(), 1.0);
        assert_eq!(p(40.0).fraction(), 0.0);
    }
}
