//! # hasar_fiscal
//!
//! Host driver and device emulator for the serial protocol spoken by
//! Hasar-family Argentine fiscal receipt printers.
//!
//! The crate is split along the two halves of the system:
//!
//! - the wire protocol ([`frame`], [`sequence`], [`status`], [`link`]), shared
//!   by both sides of the link;
//! - the device-side fiscal state machine ([`state`], [`document`],
//!   [`money`], [`dispatch`], [`opcode`], [`renderer`], [`eprom`],
//!   [`device`]);
//! - the host-side façade ([`facade`]).
//!
//! If adding a new command, add its opcode to [`opcode::Opcode`] and its
//! handler to the dispatch table in [`dispatch`].

#[macro_use(bitfield)]
extern crate bitfield;

/// Commands the host side builds and the device side executes.
pub mod dispatch;
/// Device-side orchestration: link layer + dispatch + state + renderer.
pub mod device;
/// Fiscal document, customer data, item and discount types.
pub mod document;
/// Bundled and overridable EPROM configuration record.
pub mod eprom;
/// Library error types.
pub mod error;
/// Host-side document-building façade.
pub mod facade;
/// Wire frame encoding/decoding and the block check character.
pub mod frame;
/// Host- and device-side serial link layers.
pub mod link;
/// Logging conventions.
pub mod logging;
/// Monetary aggregation (VAT, net/gross conversion).
pub mod money;
/// Command opcode table.
pub mod opcode;
/// 40-column receipt line sink.
pub mod renderer;
/// Bounded, randomly-seeded sequence number counter.
pub mod sequence;
/// Fiscal document lifecycle state machine.
pub mod state;
/// Fiscal Status / Printer Status bitfields.
pub mod status;

pub use error::{Error, FiscalError, FiscalErrorKind, ProtocolError, Result};

/// Start of text: marks the first byte of a frame.
pub const STX: u8 = 0x02;
/// End of text: marks the last byte of a frame's content, just before the BCC.
pub const ETX: u8 = 0x03;
/// Field separator, joins fields within a frame's payload.
pub const FS: u8 = 0x1c;
/// Positive acknowledgement.
pub const ACK: u8 = 0x06;
/// Negative acknowledgement.
///
/// The original driver uses `0x15` on the host side but `0x07` in the
/// emulator's symbol table; `0x15` (standard ASCII NAK) is used uniformly
/// here, see `DESIGN.md`.
pub const NAK: u8 = 0x15;
/// Device control 2: flow-control "wait" byte, extends the host's deadline.
pub const DC2: u8 = 0x12;
/// Device control 4: flow-control "wait" byte, extends the host's deadline.
pub const DC4: u8 = 0x14;
/// Escape.
pub const ESC: u8 = 0x1b;

/// Computes the block check character of `data`: the low 16 bits of the
/// unsigned sum of its bytes, rendered as four uppercase hex digits.
///
/// `data` should span from STX through ETX inclusive.
pub fn bcc(data: &[u8]) -> String {
    let sum: u32 = data.iter().map(|&b| b as u32).sum();
    format!("{:04X}", (sum & 0xffff) as u16)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bcc_is_sum_mod_10000_as_hex() {
        let data = [STX, b'!', b'*', ETX];
        let sum: u32 = data.iter().map(|&b| b as u32).sum();
        assert_eq!(bcc(&data), format!("{:04X}", sum));
    }

    #[test]
    fn bcc_wraps_at_16_bits() {
        let data = vec![0xffu8; 2000];
        let sum: u32 = data.iter().map(|&b| b as u32).sum();
        let expected = format!("{:04X}", sum & 0xffff);
        assert_eq!(bcc(&data), expected);
        assert_eq!(expected.len(), 4);
    }

    #[test]
    fn bcc_is_always_four_uppercase_hex_chars() {
        let result = bcc(&[0x02, 0x03]);
        assert_eq!(result.len(), 4);
        assert!(result.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));
    }
}
