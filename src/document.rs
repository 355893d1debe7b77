//! Data model for fiscal documents: customer data, line items, discounts,
//! and the document types the emulator can open.

use rust_decimal::Decimal;

use crate::error::FiscalError;

/// Tax responsibility code, one of `I, N, E, A, C, M, B`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResponsibilityCode {
    /// Responsable Inscripto
    I,
    /// No Responsable
    N,
    /// Exento
    E,
    /// Consumidor final
    A,
    /// Monotributista categoría C
    C,
    /// Monotributista
    M,
    /// Responsable no inscripto (histórico)
    B,
}

impl ResponsibilityCode {
    /// Printed on the receipt header's customer-type line.
    pub fn description(&self) -> &'static str {
        match self {
            Self::I => "RESPONSABLE INSCRIPTO",
            Self::N => "RESPONSABLE NO INSCRIPTO",
            Self::E => "EXENTO",
            Self::A => "NO RESPONSABLE",
            Self::C => "CONSUMIDOR FINAL",
            Self::M => "RESPONSABLE MONOTRIBUTO",
            Self::B => "RESPONSABLE NO INSCRIPTO, BIENES DE USO",
        }
    }
}

impl TryFrom<char> for ResponsibilityCode {
    type Error = FiscalError;

    fn try_from(c: char) -> Result<Self, Self::Error> {
        match c {
            'I' => Ok(Self::I),
            'N' => Ok(Self::N),
            'E' => Ok(Self::E),
            'A' => Ok(Self::A),
            'C' => Ok(Self::C),
            'M' => Ok(Self::M),
            'B' => Ok(Self::B),
            _ => Err(FiscalError::not_valid_data(format!(
                "unknown responsibility code: {c}"
            ))),
        }
    }
}

impl From<ResponsibilityCode> for char {
    fn from(code: ResponsibilityCode) -> Self {
        match code {
            ResponsibilityCode::I => 'I',
            ResponsibilityCode::N => 'N',
            ResponsibilityCode::E => 'E',
            ResponsibilityCode::A => 'A',
            ResponsibilityCode::C => 'C',
            ResponsibilityCode::M => 'M',
            ResponsibilityCode::B => 'B',
        }
    }
}

/// Document-type code for the customer's own identifying document.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CustomerDocType {
    Le,
    Lc,
    Dni,
    Passport,
    Ci,
    /// `tax_id` is itself a CUIT.
    Cuit,
}

impl CustomerDocType {
    /// Fixed-width label printed ahead of the customer's own document number.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Le => "L.E.  ",
            Self::Lc => "L.C.  ",
            Self::Dni => "D.N.I.",
            Self::Passport => "Pasap.",
            Self::Ci => "C.I.  ",
            Self::Cuit => "C.U.I.T.",
        }
    }
}

impl TryFrom<char> for CustomerDocType {
    type Error = FiscalError;

    fn try_from(c: char) -> Result<Self, Self::Error> {
        match c {
            '0' => Ok(Self::Le),
            '1' => Ok(Self::Lc),
            '2' => Ok(Self::Dni),
            '3' => Ok(Self::Passport),
            '4' => Ok(Self::Ci),
            'C' => Ok(Self::Cuit),
            _ => Err(FiscalError::not_valid_data(format!(
                "unknown customer document type: {c}"
            ))),
        }
    }
}

/// A customer data snapshot, set by SetCustomerData and consumed by the
/// next `OpenFiscal*` command.
#[derive(Clone, Debug, PartialEq)]
pub struct CustomerData {
    pub name: String,
    pub tax_id: String,
    pub responsibility: ResponsibilityCode,
    pub doc_type: CustomerDocType,
}

/// Validates an 11-digit CUIT checksum.
///
/// Weights `[5,4,3,2,7,6,5,4,3,2]` against the first 10 digits; the check
/// digit is `11 - (sum mod 11)`, with `11 -> 0` and `10 -> 9`.
pub fn validate_cuit(cuit: &str) -> bool {
    const WEIGHTS: [u32; 10] = [5, 4, 3, 2, 7, 6, 5, 4, 3, 2];

    let digits: Option<Vec<u32>> = cuit.chars().map(|c| c.to_digit(10)).collect();
    let Some(digits) = digits else { return false };
    if digits.len() != 11 {
        return false;
    }

    let sum: u32 = digits[..10]
        .iter()
        .zip(WEIGHTS.iter())
        .map(|(d, w)| d * w)
        .sum();
    let remainder = sum % 11;
    let check = match 11 - remainder {
        11 => 0,
        10 => 9,
        other => other,
    };

    check == digits[10]
}

/// Whether a fiscal item/discount amount is added (`M`) or subtracted (`m`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Sign {
    Add,
    Subtract,
}

impl TryFrom<char> for Sign {
    type Error = FiscalError;

    fn try_from(c: char) -> Result<Self, Self::Error> {
        match c {
            'M' => Ok(Self::Add),
            'm' => Ok(Self::Subtract),
            _ => Err(FiscalError::not_valid_data(format!("unknown sign: {c}"))),
        }
    }
}

/// A line item printed via PrintLineItem.
#[derive(Clone, Debug, PartialEq)]
pub struct FiscalItem {
    pub description: String,
    pub quantity: Decimal,
    pub unit_amount: Decimal,
    pub vat_rate: Decimal,
    pub sign: Sign,
    pub k: Decimal,
    /// `true` when `unit_amount` is VAT-inclusive (the field was `"T"`).
    pub total: bool,
}

/// A discount or surcharge printed via GeneralDiscount.
#[derive(Clone, Debug, PartialEq)]
pub struct DiscountItem {
    pub description: String,
    pub amount: Decimal,
    pub sign: Sign,
    pub total: bool,
}

/// One of the document kinds `OpenFiscalReceipt`/`OpenDNFH` can open.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DocumentType {
    Ticket,
    BillA,
    BillB,
    ConsumerC,
    DebitA,
    DebitB,
    CreditA,
    CreditB,
    Dnfh,
    NonFiscal,
}

impl DocumentType {
    /// `A`-family documents require a customer with responsibility `I` or
    /// `N` before they can be opened.
    pub fn requires_customer(&self) -> bool {
        matches!(self, Self::BillA | Self::DebitA | Self::CreditA)
    }

    /// Per-type counters in the EPROM are only kept for the `A` and `B`
    /// families; every other type rides on whichever counter its family
    /// shares (matches `original_source/emu/config.py`'s two counters).
    pub fn counter(&self) -> Counter {
        match self {
            Self::BillA | Self::DebitA | Self::CreditA => Counter::A,
            _ => Counter::B,
        }
    }

    /// At most 2 free-text fiscal lines for `Ticket`, 3 otherwise.
    pub fn max_fiscal_text_lines(&self) -> usize {
        match self {
            Self::Ticket => 2,
            _ => 3,
        }
    }

    /// Single-character wire code, as used in `OpenFiscalReceipt`'s first field.
    pub fn code(&self) -> char {
        match self {
            Self::BillA => 'A',
            Self::BillB => 'B',
            Self::ConsumerC => 'C',
            Self::Ticket => 'T',
            Self::DebitA => 'D',
            Self::DebitB => 'E',
            Self::CreditA => 'R',
            Self::CreditB => 'S',
            Self::Dnfh => 'H',
            Self::NonFiscal => 'X',
        }
    }
}

impl TryFrom<char> for DocumentType {
    type Error = FiscalError;

    fn try_from(c: char) -> Result<Self, Self::Error> {
        match c {
            'A' => Ok(Self::BillA),
            'B' => Ok(Self::BillB),
            'C' => Ok(Self::ConsumerC),
            'T' => Ok(Self::Ticket),
            'D' => Ok(Self::DebitA),
            'E' => Ok(Self::DebitB),
            'R' => Ok(Self::CreditA),
            'S' => Ok(Self::CreditB),
            _ => Err(FiscalError::not_valid_data(format!(
                "unknown document type: {c}"
            ))),
        }
    }
}

/// Which EPROM counter a document type bumps at close.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Counter {
    A,
    B,
}

/// A fiscal document open from `OpenFiscalReceipt`/`OpenDNFH` through close.
#[derive(Clone, Debug, PartialEq)]
pub struct FiscalDocument {
    pub doc_type: DocumentType,
    pub number: u32,
    pub items: Vec<FiscalItem>,
    pub discounts: Vec<DiscountItem>,
    pub customer: Option<CustomerData>,
    pub fiscal_texts: Vec<String>,
    pub can_add_item: bool,
    pub totals_printed: bool,
}

impl FiscalDocument {
    pub fn new(doc_type: DocumentType, number: u32, customer: Option<CustomerData>) -> Self {
        Self {
            doc_type,
            number,
            items: Vec::new(),
            discounts: Vec::new(),
            customer,
            fiscal_texts: Vec::new(),
            can_add_item: true,
            totals_printed: false,
        }
    }

    pub fn has_items(&self) -> bool {
        !self.items.is_empty()
    }
}

/// A non-fiscal receipt: free text only, no items, totals, or VAT.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NonFiscalDocument {
    pub lines: Vec<String>,
}

impl NonFiscalDocument {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validates_known_good_cuit() {
        // 30-71128142-4, taken from the bundled EPROM configuration.
        assert!(validate_cuit("30711281424"));
    }

    #[test]
    fn rejects_tampered_cuit() {
        assert!(!validate_cuit("30711281425"));
    }

    #[test]
    fn rejects_wrong_length() {
        assert!(!validate_cuit("123"));
    }

    #[test]
    fn type_a_requires_customer() {
        assert!(DocumentType::BillA.requires_customer());
        assert!(!DocumentType::BillB.requires_customer());
    }

    #[test]
    fn ticket_caps_fiscal_text_at_two_lines() {
        assert_eq!(DocumentType::Ticket.max_fiscal_text_lines(), 2);
        assert_eq!(DocumentType::BillB.max_fiscal_text_lines(), 3);
    }
}
