//! Serial stream acquisition
//!
//! Handles the shared PLC + laser line stream: frame decoding and the
//! TCP bridge client with reconnect and staleness detection.

pub mod frame;
pub mod line_client;

pub use frame::{decode_line, Frame};
pub use line_client::{LineClient, LinkError};
