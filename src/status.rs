//! Fiscal Status and Printer Status: the two 16-bit bitfields that begin
//! every reply.
//!
//! The original driver keeps one generic bitfield class shared by every
//! status kind. Only two concrete 16-bit words are ever needed, so each gets
//! its own newtype with named accessors instead.

use std::fmt;

bitfield! {
    /// Fiscal status word. Bit 15 ("quick check") is the OR of bits 0..7 and
    /// must be recomputed after every mutation; use [`FiscalStatus::set`] /
    /// [`FiscalStatus::unset`] rather than the raw setters to keep it in sync.
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct FiscalStatus(u16);
    u8;
    pub error_fiscal_memory, set_error_fiscal_memory: 0;
    pub error_work_memory, set_error_work_memory: 1;
    pub low_battery, set_low_battery: 2;
    pub unknown_command, set_unknown_command: 3;
    pub not_valid_data, set_not_valid_data: 4;
    pub not_valid_command, set_not_valid_command: 5;
    pub overflow_of_total, set_overflow_of_total: 6;
    pub fiscal_memory_full, set_fiscal_memory_full: 7;
    pub fiscal_memory_almost_full, set_fiscal_memory_almost_full: 8;
    pub certified_terminal, set_certified_terminal: 9;
    pub fiscalized_terminal, set_fiscalized_terminal: 10;
    pub bad_date, set_bad_date: 11;
    pub open_fiscal_document, set_open_fiscal_document: 12;
    pub open_document, set_open_document: 13;
    // bit 14 unused in the modeled device.
    pub quick_status_check, set_quick_status_check: 15;
}

/// Named flags of [`FiscalStatus`], for the `set`/`unset`/`is_set` API.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FiscalFlag {
    ErrorFiscalMemory,
    ErrorWorkMemory,
    LowBattery,
    UnknownCommand,
    NotValidData,
    NotValidCommand,
    OverflowOfTotal,
    FiscalMemoryFull,
    FiscalMemoryAlmostFull,
    CertifiedTerminal,
    FiscalizedTerminal,
    BadDate,
    OpenFiscalDocument,
    OpenDocument,
}

impl FiscalStatus {
    /// A fresh status word as created at driver construction: certified and
    /// fiscalized, nothing else set.
    pub fn new() -> Self {
        let mut status = Self(0);
        status.set(FiscalFlag::CertifiedTerminal);
        status.set(FiscalFlag::FiscalizedTerminal);
        status
    }

    pub fn from_bits(bits: u16) -> Self {
        Self(bits)
    }

    pub fn bits(&self) -> u16 {
        self.0
    }

    pub fn is_set(&self, flag: FiscalFlag) -> bool {
        let bit = match flag {
            FiscalFlag::ErrorFiscalMemory => self.error_fiscal_memory(),
            FiscalFlag::ErrorWorkMemory => self.error_work_memory(),
            FiscalFlag::LowBattery => self.low_battery(),
            FiscalFlag::UnknownCommand => self.unknown_command(),
            FiscalFlag::NotValidData => self.not_valid_data(),
            FiscalFlag::NotValidCommand => self.not_valid_command(),
            FiscalFlag::OverflowOfTotal => self.overflow_of_total(),
            FiscalFlag::FiscalMemoryFull => self.fiscal_memory_full(),
            FiscalFlag::FiscalMemoryAlmostFull => self.fiscal_memory_almost_full(),
            FiscalFlag::CertifiedTerminal => self.certified_terminal(),
            FiscalFlag::FiscalizedTerminal => self.fiscalized_terminal(),
            FiscalFlag::BadDate => self.bad_date(),
            FiscalFlag::OpenFiscalDocument => self.open_fiscal_document(),
            FiscalFlag::OpenDocument => self.open_document(),
        };
        bit != 0
    }

    pub fn set(&mut self, flag: FiscalFlag) {
        self.set_raw(flag, 1);
    }

    pub fn unset(&mut self, flag: FiscalFlag) {
        self.set_raw(flag, 0);
    }

    fn set_raw(&mut self, flag: FiscalFlag, value: u8) {
        match flag {
            FiscalFlag::ErrorFiscalMemory => self.set_error_fiscal_memory(value),
            FiscalFlag::ErrorWorkMemory => self.set_error_work_memory(value),
            FiscalFlag::LowBattery => self.set_low_battery(value),
            FiscalFlag::UnknownCommand => self.set_unknown_command(value),
            FiscalFlag::NotValidData => self.set_not_valid_data(value),
            FiscalFlag::NotValidCommand => self.set_not_valid_command(value),
            FiscalFlag::OverflowOfTotal => self.set_overflow_of_total(value),
            FiscalFlag::FiscalMemoryFull => self.set_fiscal_memory_full(value),
            FiscalFlag::FiscalMemoryAlmostFull => self.set_fiscal_memory_almost_full(value),
            FiscalFlag::CertifiedTerminal => self.set_certified_terminal(value),
            FiscalFlag::FiscalizedTerminal => self.set_fiscalized_terminal(value),
            FiscalFlag::BadDate => self.set_bad_date(value),
            FiscalFlag::OpenFiscalDocument => self.set_open_fiscal_document(value),
            FiscalFlag::OpenDocument => self.set_open_document(value),
        }
        self.recompute_quick_check();
    }

    /// Clears the transient flags dispatch (C6) resets at the start of every
    /// command: `unknown-command`, `not-valid-data`, `not-valid-command`,
    /// `overflow-of-total`.
    pub fn clear_transient(&mut self) {
        self.unset(FiscalFlag::UnknownCommand);
        self.unset(FiscalFlag::NotValidData);
        self.unset(FiscalFlag::NotValidCommand);
        self.unset(FiscalFlag::OverflowOfTotal);
    }

    fn recompute_quick_check(&mut self) {
        let any: u8 = if (self.0 & 0x00ff) != 0 { 1 } else { 0 };
        self.set_quick_status_check(any);
    }

    /// Four-uppercase-hex-digit wire rendering.
    pub fn to_hex(&self) -> String {
        format!("{:04X}", self.0)
    }
}

impl Default for FiscalStatus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for FiscalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FiscalStatus({:#06x})", self.0)
    }
}

impl fmt::Display for FiscalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

bitfield! {
    /// Printer status word.
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct PrinterStatus(u16);
    u8;
    pub printer_error, set_printer_error: 2;
    pub printer_offline, set_printer_offline: 3;
    pub buffer_full, set_buffer_full: 6;
    pub cover_open, set_cover_open: 8;
}

/// Named flags of [`PrinterStatus`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PrinterFlag {
    PrinterError,
    PrinterOffline,
    BufferFull,
    CoverOpen,
}

impl PrinterStatus {
    pub fn new() -> Self {
        Self(0)
    }

    pub fn from_bits(bits: u16) -> Self {
        Self(bits)
    }

    pub fn bits(&self) -> u16 {
        self.0
    }

    pub fn is_set(&self, flag: PrinterFlag) -> bool {
        let bit = match flag {
            PrinterFlag::PrinterError => self.printer_error(),
            PrinterFlag::PrinterOffline => self.printer_offline(),
            PrinterFlag::BufferFull => self.buffer_full(),
            PrinterFlag::CoverOpen => self.cover_open(),
        };
        bit != 0
    }

    pub fn set(&mut self, flag: PrinterFlag) {
        self.set_raw(flag, 1);
    }

    pub fn unset(&mut self, flag: PrinterFlag) {
        self.set_raw(flag, 0);
    }

    fn set_raw(&mut self, flag: PrinterFlag, value: u8) {
        match flag {
            PrinterFlag::PrinterError => self.set_printer_error(value),
            PrinterFlag::PrinterOffline => self.set_printer_offline(value),
            PrinterFlag::BufferFull => self.set_buffer_full(value),
            PrinterFlag::CoverOpen => self.set_cover_open(value),
        }
    }

    /// Four-uppercase-hex-digit wire rendering.
    pub fn to_hex(&self) -> String {
        format!("{:04X}", self.0)
    }
}

impl Default for PrinterStatus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PrinterStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PrinterStatus({:#06x})", self.0)
    }
}

impl fmt::Display for PrinterStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_status_is_certified_and_fiscalized() {
        let status = FiscalStatus::new();
        assert!(status.is_set(FiscalFlag::CertifiedTerminal));
        assert!(status.is_set(FiscalFlag::FiscalizedTerminal));
        assert!(!status.is_set(FiscalFlag::OpenDocument));
    }

    #[test]
    fn quick_check_tracks_low_byte() {
        let mut status = FiscalStatus::new();
        assert_eq!(status.quick_status_check(), 0);

        status.set(FiscalFlag::BadDate);
        assert_ne!(status.quick_status_check(), 0);

        status.unset(FiscalFlag::BadDate);
        assert_eq!(status.quick_status_check(), 0);
    }

    #[test]
    fn clear_transient_leaves_other_flags_alone() {
        let mut status = FiscalStatus::new();
        status.set(FiscalFlag::OpenDocument);
        status.set(FiscalFlag::NotValidCommand);

        status.clear_transient();

        assert!(!status.is_set(FiscalFlag::NotValidCommand));
        assert!(status.is_set(FiscalFlag::OpenDocument));
        assert!(status.is_set(FiscalFlag::CertifiedTerminal));
    }

    #[test]
    fn hex_rendering_is_four_uppercase_chars() {
        let status = FiscalStatus::new();
        let hex = status.to_hex();
        assert_eq!(hex.len(), 4);
        assert!(hex.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));
    }

    #[test]
    fn status_request_scenario_matches_spec() {
        // certified + fiscalized, nothing else: "0C00"
        let status = FiscalStatus::new();
        assert_eq!(status.to_hex(), "0C00");
        let printer = PrinterStatus::new();
        assert_eq!(printer.to_hex(), "0000");
    }

    #[test]
    fn printer_status_flags_round_trip() {
        let mut printer = PrinterStatus::new();
        assert!(!printer.is_set(PrinterFlag::CoverOpen));
        printer.set(PrinterFlag::CoverOpen);
        assert!(printer.is_set(PrinterFlag::CoverOpen));
        printer.unset(PrinterFlag::CoverOpen);
        assert!(!printer.is_set(PrinterFlag::CoverOpen));
    }
}
