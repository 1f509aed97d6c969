//! Sensor state machine and the synchronous feed/teardown core around it.
//!
//! [`SensorStateMachine`] is a Mealy machine keyed only on the incoming
//! [`LineEvent`]: the current state never affects which state comes next.
//!
//! | Event | Next state | Side effect |
//! |---|---|---|
//! | `NoFingerDetected` | `NoFinger` | — |
//! | `CalibrationTick(s)` | `Calibrating` | calibration ← `s` |
//! | `CalibrationGlitch(_)` | `Calibrating` | — (last good value kept) |
//! | `ResultHeader` | `Measuring` | — |
//! | `PiValue(v)` | unchanged | result.perfusion_index ← `v` |
//! | `X1Value(v)` | unchanged | result.feature_x1 ← `v` |
//! | `X2Value(v)` | `ResultReady` | result.feature_x2 ← `v` |
//! | `Unclassified` | unchanged | — |
//! | stream teardown | `Idle` | connected ← `false` |
//!
//! There is no terminal state.  [`SensorCore`] wires the machine to a
//! [`LineAssembler`] and a [`LogBuffer`] and is what a transport drives.

use log::{debug, info};

use crate::log_buffer::LogBuffer;
use crate::parse::{classify, LineAssembler};
use crate::types::{
    CalibrationProgress, LineEvent, LogEntry, PipelineResult, SensorSnapshot, SensorState,
};

// ── State machine ────────────────────────────────────────────────────────────

/// Owns the current [`SensorState`], [`PipelineResult`], and calibration value.
#[derive(Debug, Default)]
pub struct SensorStateMachine {
    state: SensorState,
    result: PipelineResult,
    calibration: CalibrationProgress,
    connected: bool,
}

impl SensorStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one classified line.
    pub fn apply(&mut self, event: &LineEvent) {
        match event {
            LineEvent::NoFingerDetected => self.state = SensorState::NoFinger,
            LineEvent::CalibrationTick(seconds) => {
                self.state = SensorState::Calibrating;
                self.calibration = CalibrationProgress {
                    seconds_left: *seconds,
                };
            }
            LineEvent::CalibrationGlitch(seconds) => {
                debug!(
                    "discarding calibration reading {seconds}; keeping {}",
                    self.calibration.seconds_left
                );
                self.state = SensorState::Calibrating;
            }
            LineEvent::ResultHeader => self.state = SensorState::Measuring,
            LineEvent::PiValue(v) => self.result = self.result.with_perfusion_index(v.as_str()),
            LineEvent::X1Value(v) => self.result = self.result.with_feature_x1(v.as_str()),
            LineEvent::X2Value(v) => {
                self.result = self.result.with_feature_x2(v.as_str());
                self.state = SensorState::ResultReady;
            }
            LineEvent::Unclassified => {}
        }
    }

    /// The stream is gone: back to `Idle`, connection flag cleared.
    ///
    /// Result values and the last calibration reading are kept.
    pub fn disconnect(&mut self) {
        self.state = SensorState::Idle;
        self.connected = false;
    }

    /// A new stream is attached.  Only the connection flag changes.
    pub fn connect(&mut self) {
        self.connected = true;
    }

    pub fn state(&self) -> SensorState {
        self.state
    }

    pub fn result(&self) -> &PipelineResult {
        &self.result
    }

    pub fn calibration(&self) -> CalibrationProgress {
        self.calibration
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn snapshot(&self) -> SensorSnapshot {
        SensorSnapshot {
            state: self.state,
            result: self.result.clone(),
            calibration: self.calibration,
            connected: self.connected,
        }
    }
}

// ── Core ─────────────────────────────────────────────────────────────────────

/// What a single [`SensorCore::feed`] call produced.
#[derive(Debug, Default)]
pub struct FeedOutcome {
    /// Lines completed by the chunk, as stored in the log.
    pub lines: Vec<LogEntry>,
    /// New snapshot, present only when the chunk changed it.
    pub snapshot: Option<SensorSnapshot>,
}

/// Reassembler, state machine, and log buffer behind one synchronous API.
///
/// Every chunk is processed to completion before `feed` returns, so a
/// snapshot taken between calls is never half-applied.  After
/// [`teardown`](Self::teardown) the core ignores input until
/// [`reset`](Self::reset) attaches a new stream.
#[derive(Debug)]
pub struct SensorCore {
    assembler: LineAssembler,
    machine: SensorStateMachine,
    log: LogBuffer,
    halted: bool,
    session: u64,
}

impl Default for SensorCore {
    fn default() -> Self {
        Self::new(LogBuffer::default())
    }
}

impl SensorCore {
    pub fn new(log: LogBuffer) -> Self {
        Self {
            assembler: LineAssembler::new(),
            machine: SensorStateMachine::new(),
            log,
            halted: false,
            session: 0,
        }
    }

    /// Convenience constructor with a log of `capacity` lines.
    pub fn with_log_capacity(capacity: usize) -> Self {
        Self::new(LogBuffer::with_capacity(capacity))
    }

    /// Feed one transport chunk.
    ///
    /// Each completed line is logged, classified, and applied in arrival
    /// order.  Returns nothing while halted.
    pub fn feed(&mut self, chunk: &[u8]) -> FeedOutcome {
        if self.halted {
            debug!("ignoring {} bytes after teardown", chunk.len());
            return FeedOutcome::default();
        }

        let before = self.machine.snapshot();
        let mut lines = Vec::new();
        for line in self.assembler.feed(chunk) {
            let event = classify(&line);
            lines.push(self.log.append(line).clone());
            self.machine.apply(&event);
        }

        let after = self.machine.snapshot();
        FeedOutcome {
            lines,
            snapshot: (after != before).then_some(after),
        }
    }

    /// Stop processing: drop any partial line and go `Idle`.
    ///
    /// Used for both I/O failure and explicit disconnect.  Idempotent.
    pub fn teardown(&mut self) -> SensorSnapshot {
        if !self.halted {
            info!("stream torn down; state -> Idle");
        }
        self.halted = true;
        self.assembler.clear();
        self.machine.disconnect();
        self.machine.snapshot()
    }

    /// Prepare for a new stream: clear the partial line, resume processing,
    /// and mark the connection active.  Results and log are kept.
    ///
    /// Starts a new session; see [`session`](Self::session).
    pub fn reset(&mut self) -> SensorSnapshot {
        self.session += 1;
        self.halted = false;
        self.assembler.clear();
        self.machine.connect();
        self.machine.snapshot()
    }

    pub fn snapshot(&self) -> SensorSnapshot {
        self.machine.snapshot()
    }

    pub fn machine(&self) -> &SensorStateMachine {
        &self.machine
    }

    pub fn log(&self) -> &LogBuffer {
        &self.log
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Number of [`reset`](Self::reset) calls so far.  A transport task
    /// remembers the session it was started in and stops feeding once it
    /// changes.
    pub fn session(&self) -> u64 {
        self.session
    }

    /// Bytes of an unterminated line waiting for the next chunk.
    pub fn pending_len(&self) -> usize {
        self.assembler.pending_len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(machine: &mut SensorStateMachine, lines: &[&str]) -> Vec<SensorState> {
        lines
            .iter()
            .map(|l| {
                machine.apply(&classify(l));
                machine.state()
            })
            .collect()
    }

    #[test]
    fn result_block_walks_to_result_ready() {
        let mut m = SensorStateMachine::new();
        assert_eq!(m.state(), SensorState::Idle);
        let states = run(
            &mut m,
            &[
                "PIPELINE RESULT",
                "Perfusion Index (PI): 1.23",
                "FEATURE X1: -0.45",
                "FEATURE X2: 0.88",
            ],
        );
        assert_eq!(
            states,
            [
                SensorState::Measuring,
                SensorState::Measuring,
                SensorState::Measuring,
                SensorState::ResultReady,
            ]
        );
        assert_eq!(m.result().perfusion_index, "1.23");
        assert_eq!(m.result().feature_x1, "-0.45");
        assert_eq!(m.result().feature_x2, "0.88");
    }

    #[test]
    fn no_finger_wins_from_any_state() {
        for setup in [
            &[][..],
            &["Calibration: 3s left"][..],
            &["PIPELINE RESULT"][..],
            &["PIPELINE RESULT", "FEATURE X2: 1.0"][..],
            &["NO FINGER"][..],
        ] {
            let mut m = SensorStateMachine::new();
            run(&mut m, setup);
            run(&mut m, &["...NO FINGER...anything..."]);
            assert_eq!(m.state(), SensorState::NoFinger, "after {setup:?}");
        }
    }

    #[test]
    fn glitch_keeps_last_good_calibration() {
        let mut m = SensorStateMachine::new();
        run(&mut m, &["Calibration: 12s left"]);
        assert_eq!(m.calibration().seconds_left, 12.0);

        run(&mut m, &["Calibration: 4294967s left"]);
        assert_eq!(m.calibration().seconds_left, 12.0);
        assert_eq!(m.state(), SensorState::Calibrating);

        run(&mut m, &["Calibration: 7.5s left"]);
        assert_eq!(m.calibration().seconds_left, 7.5);
        assert_eq!(m.state(), SensorState::Calibrating);
    }

    #[test]
    fn negative_infinity_keeps_last_good_calibration() {
        let mut m = SensorStateMachine::new();
        run(&mut m, &["Calibration: 12s left", "Calibration: -infs left"]);
        assert_eq!(m.state(), SensorState::Calibrating);
        assert_eq!(m.calibration().seconds_left, 12.0);
    }

    #[test]
    fn glitch_from_another_state_still_enters_calibrating() {
        let mut m = SensorStateMachine::new();
        run(&mut m, &["NO FINGER", "Calibration: 5000s left"]);
        assert_eq!(m.state(), SensorState::Calibrating);
        assert_eq!(m.calibration(), CalibrationProgress::default());
    }

    #[test]
    fn values_do_not_move_state() {
        let mut m = SensorStateMachine::new();
        run(&mut m, &["NO FINGER", "Perfusion Index (PI): 0.9", "FEATURE X1: 2", "hello"]);
        assert_eq!(m.state(), SensorState::NoFinger);
        assert_eq!(m.result().perfusion_index, "0.9");
        assert_eq!(m.result().feature_x2, "--");
    }

    #[test]
    fn disconnect_keeps_results() {
        let mut m = SensorStateMachine::new();
        m.connect();
        run(&mut m, &["FEATURE X2: 0.5"]);
        m.disconnect();
        assert_eq!(m.state(), SensorState::Idle);
        assert!(!m.is_connected());
        assert_eq!(m.result().feature_x2, "0.5");
        m.connect();
        assert!(m.is_connected());
        assert_eq!(m.state(), SensorState::Idle);
        assert_eq!(m.result().feature_x2, "0.5");
    }

    // ── SensorCore ───────────────────────────────────────────────────────────

    #[test]
    fn feed_logs_every_line_and_publishes_once_per_chunk() {
        let mut core = SensorCore::default();
        core.reset();
        let out = core.feed(b"boot v1.2\r\nPIPELINE RESULT\r\nPerfusion Index (PI): 1.23\r\nFEATURE X1: -0.4");
        let texts: Vec<_> = out.lines.iter().map(|e| e.text.as_str()).collect();
        assert_eq!(texts, ["boot v1.2", "PIPELINE RESULT", "Perfusion Index (PI): 1.23"]);
        let snap = out.snapshot.expect("state changed");
        assert_eq!(snap.state, SensorState::Measuring);
        assert_eq!(snap.result.perfusion_index, "1.23");
        assert_eq!(core.log().len(), 3);

        let out = core.feed(b"5\r\nFEATURE X2: 0.88\n");
        let snap = out.snapshot.expect("state changed");
        assert_eq!(snap.state, SensorState::ResultReady);
        assert_eq!(snap.result.feature_x1, "-0.45");
        assert_eq!(snap.result.feature_x2, "0.88");
    }

    #[test]
    fn unclassified_chunk_has_lines_but_no_snapshot() {
        let mut core = SensorCore::default();
        let out = core.feed(b"heap: 31337\n");
        assert_eq!(out.lines.len(), 1);
        assert!(out.snapshot.is_none());
    }

    #[test]
    fn teardown_halts_until_reset() {
        let mut core = SensorCore::default();
        core.reset();
        core.feed(b"Calibration: 9s left\nPIPELINE RES");
        assert_eq!(core.pending_len(), 12);

        let snap = core.teardown();
        assert_eq!(snap.state, SensorState::Idle);
        assert!(!snap.connected);
        assert!(core.is_halted());
        assert_eq!(core.pending_len(), 0);

        let out = core.feed(b"ULT\nNO FINGER\n");
        assert!(out.lines.is_empty());
        assert!(out.snapshot.is_none());
        assert_eq!(core.snapshot().state, SensorState::Idle);

        let snap = core.reset();
        assert_eq!(core.session(), 2);
        assert!(snap.connected);
        assert_eq!(snap.state, SensorState::Idle);
        assert_eq!(snap.calibration.seconds_left, 9.0);
        let out = core.feed(b"NO FINGER\n");
        assert_eq!(out.snapshot.map(|s| s.state), Some(SensorState::NoFinger));
    }

    #[test]
    fn log_capacity_is_configurable() {
        let mut core = SensorCore::with_log_capacity(2);
        core.feed(b"a\nb\nc\n");
        let texts: Vec<_> = core.log().iter().map(|e| e.text.as_str()).collect();
        assert_eq!(texts, ["b", "c"]);
    }
}
