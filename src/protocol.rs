//! Wire markers, numeric limits, and transport identity for GlucoSense firmware.
//!
//! The ESP32 firmware prints human-readable text over a Bluetooth SPP link.
//! Nothing is framed or checksummed: each line is matched by substring, so
//! the markers below must match the firmware output byte-for-byte.

use uuid::Uuid;

// ── Transport identity ───────────────────────────────────────────────────────

/// Advertised Bluetooth name of the sensor.
///
/// Hosts that open the SPP socket themselves look the device up among
/// bonded devices by this name when no MAC address is given.
pub const TARGET_DEVICE_NAME: &str = "GlucoSensor_ESP32";

/// Serial Port Profile service UUID used to open the RFCOMM socket.
pub const SPP_UUID: Uuid = Uuid::from_u128(0x00001101_0000_1000_8000_00805f9b34fb);

/// Size of one transport read.  Lines longer than this simply span reads.
pub const READ_BUFFER_SIZE: usize = 1024;

// ── Line markers ─────────────────────────────────────────────────────────────
//
// Checked in this order; the first marker contained in a line wins.

/// Finger lifted off the optical window.
pub const NO_FINGER_MARKER: &str = "NO FINGER";

/// Calibration countdown, e.g. `Calibration: 7.5s left`.
pub const CALIBRATION_MARKER: &str = "Calibration:";

/// Terminates the numeric part of a calibration line.
pub const CALIBRATION_SUFFIX: &str = "s left";

/// Header line that opens a result block.
pub const RESULT_HEADER_MARKER: &str = "PIPELINE RESULT";

/// Perfusion index line inside a result block.
pub const PI_MARKER: &str = "Perfusion Index (PI):";

/// First derived feature (log IR) inside a result block.
pub const X1_MARKER: &str = "FEATURE X1";

/// Second derived feature (log ratio).  Always the last line of a block.
pub const X2_MARKER: &str = "FEATURE X2";

/// Separator between a label and its value on result lines.
pub const VALUE_SEPARATOR: char = ':';

// ── Limits ───────────────────────────────────────────────────────────────────

/// Calibration readings at or above this many seconds are garbage.
///
/// The firmware occasionally underflows its countdown and prints values such
/// as `4294967s left`.
pub const CALIBRATION_LIMIT_SECS: f32 = 1000.0;

/// Length of the firmware's calibration window in seconds.
pub const CALIBRATION_TOTAL_SECS: f32 = 15.0;

/// Number of raw lines retained for the serial monitor.
pub const MAX_LOG_LINES: usize = 200;

/// Display placeholder for a result field that has not been reported yet.
pub const UNKNOWN_VALUE: &str = "--";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spp_uuid_is_the_standard_serial_port_profile() {
        assert_eq!(
            SPP_UUID.to_string(),
            "00001101-0000-1000-8000-00805f9b34fb"
        );
    }
}
