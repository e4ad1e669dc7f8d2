//! Shared-stream frame decoder
//!
//! The PLC and the laser sensor multiplex onto one line-oriented ASCII
//! stream (CR/LF terminated):
//!
//! - PLC status line: `PLC:<POWER>,<STATE>` where POWER ∈ {ON, OFF} and
//!   STATE is a free-form token (RUNNING, IDLE, FAULT, ALARM, OFFLINE, ...)
//! - Laser sample line: `L<signed-decimal>`, e.g. `L0023.45`
//!
//! Decoding is a pure function of one newline-stripped line to zero-or-one
//! event. Malformed payloads decode to `None` — transient noise on an
//! industrial serial line, never an error.

use crate::types::{HeightSample, PowerStatus};

/// Marker prefix of PLC status lines.
pub const PLC_PREFIX: &str = "PLC:";

/// Marker prefix of laser sample lines.
pub const LASER_PREFIX: &str = "L";

/// A typed event decoded from one stream line.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Power(PowerStatus),
    Height(HeightSample),
}

/// Classify and parse one newline-stripped line.
///
/// Returns `None` for malformed payloads and unrecognized lines — the
/// drop-on-noise policy is this explicit branch, not a swallowed error.
pub fn decode_line(line: &str) -> Option<Frame> {
    if let Some(payload) = line.strip_prefix(PLC_PREFIX) {
        return decode_plc_payload(payload).map(Frame::Power);
    }
    if let Some(payload) = line.strip_prefix(LASER_PREFIX) {
        return decode_laser_payload(payload).map(Frame::Height);
    }
    None
}

/// Parse `<POWER>,<STATE>` — POWER must be the literal ON/OFF token,
/// STATE is everything after the first comma.
fn decode_plc_payload(payload: &str) -> Option<PowerStatus> {
    let (power_token, state) = payload.split_once(',')?;
    let power = match power_token.trim() {
        "ON" => true,
        "OFF" => false,
        _ => return None,
    };
    Some(PowerStatus {
        power,
        state: state.trim().to_string(),
    })
}

/// Parse the decimal number immediately following the laser marker.
fn decode_laser_payload(payload: &str) -> Option<HeightSample> {
    payload
        .trim()
        .parse::<f64>()
        .ok()
        .map(|value| HeightSample { value })
}
