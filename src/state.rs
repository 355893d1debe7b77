//! Fiscal State Machine (C7): the document lifecycle and the command
//! handlers that drive it, grounded in the reference emulator's command
//! implementations.

use crate::document::{
    CustomerData, DiscountItem, DocumentType, FiscalDocument, FiscalItem, NonFiscalDocument, Sign,
};
use crate::eprom::Eprom;
use crate::error::FiscalError;
use crate::money;
use crate::renderer::{Align, LineSink, DOUBLE_WIDE_MARKER};
use crate::status::{FiscalFlag, FiscalStatus, PrinterStatus};

/// What the device currently has open, if anything.
///
/// A tagged union rather than a loose pile of status bits: only one kind of
/// document can be open at a time, and each variant carries exactly the
/// state that kind of document needs.
#[derive(Clone, Debug, PartialEq)]
pub enum DocumentState {
    Closed,
    OpenFiscal(FiscalDocument),
    OpenNonFiscal(NonFiscalDocument),
    OpenCredit(FiscalDocument),
}

impl DocumentState {
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }
}

fn pad_right(text: &str, width: usize) -> String {
    let len = text.chars().count();
    if len >= width {
        text.to_string()
    } else {
        format!("{text}{}", " ".repeat(width - len))
    }
}

fn pad_left(text: &str, width: usize) -> String {
    let len = text.chars().count();
    if len >= width {
        text.to_string()
    } else {
        format!("{}{text}", " ".repeat(width - len))
    }
}

fn red(text: &str) -> String {
    format!("\x1b[31m{text}\x1b[0m")
}

fn bold(text: &str) -> String {
    format!("\x1b[;1m{text}\x1b[0m")
}

/// Handlers return just the fiscal-level outcome; the link layer/dispatcher
/// decides how a [`FiscalError`] turns into a status flag and a reply.
type FResult<T> = std::result::Result<T, FiscalError>;

fn center_dashes(middle: &str, width: usize) -> String {
    let len = middle.chars().count();
    if len >= width {
        return middle.to_string();
    }
    let pad = width - len;
    let left_pad = pad / 2;
    let right_pad = pad - left_pad;
    format!("{}{middle}{}", "-".repeat(left_pad), "-".repeat(right_pad))
}

/// The device-side fiscal engine: status words, the open document (if any),
/// and the customer data staged by SetCustomerData awaiting the next open.
#[derive(Clone, Debug)]
pub struct FiscalMachine {
    pub fiscal_status: FiscalStatus,
    pub printer_status: PrinterStatus,
    pub document: DocumentState,
    pending_customer: Option<CustomerData>,
}

impl FiscalMachine {
    pub fn new() -> Self {
        Self {
            fiscal_status: FiscalStatus::new(),
            printer_status: PrinterStatus::new(),
            document: DocumentState::Closed,
            pending_customer: None,
        }
    }

    fn status_fields(&self) -> Vec<String> {
        vec![self.printer_status.to_hex(), self.fiscal_status.to_hex()]
    }

    /// Applies a [`FiscalError`]'s status flag, if it has one, before the
    /// reply is sent back to the host.
    pub fn apply_error(&mut self, err: &FiscalError) {
        if let Some(flag) = err.error_state() {
            let flag = match flag {
                "unknown-command" => FiscalFlag::UnknownCommand,
                "not-valid-data" => FiscalFlag::NotValidData,
                "not-valid-command" => FiscalFlag::NotValidCommand,
                "bad-date" => FiscalFlag::BadDate,
                "overflow-of-total" => FiscalFlag::OverflowOfTotal,
                _ => return,
            };
            self.fiscal_status.set(flag);
        }
    }

    fn current_fiscal_doc_mut(&mut self) -> std::result::Result<&mut FiscalDocument, FiscalError> {
        match &mut self.document {
            DocumentState::OpenFiscal(doc) | DocumentState::OpenCredit(doc) => Ok(doc),
            _ => Err(FiscalError::not_valid_command("no fiscal document open")),
        }
    }

    pub fn status_request(&self) -> Vec<String> {
        self.status_fields()
    }

    pub fn set_date_time(&mut self, date: &str, time: &str) -> FResult<Vec<String>> {
        let stamp = format!("{date}|{time}");
        match chrono::NaiveDateTime::parse_from_str(&stamp, "%y%m%d|%H%M%S") {
            Ok(_) => {
                self.fiscal_status.unset(FiscalFlag::BadDate);
                Ok(self.status_fields())
            }
            Err(_) => {
                self.fiscal_status.set(FiscalFlag::BadDate);
                Err(FiscalError::bad_date(format!("malformed date/time: {stamp}")))
            }
        }
    }

    pub fn get_date_time(&self) -> Vec<String> {
        let now = chrono::Local::now();
        let mut fields = self.status_fields();
        fields.push(now.format("%y%m%d").to_string());
        fields.push(now.format("%H%M%S").to_string());
        fields
    }

    pub fn set_customer_data(&mut self, customer: CustomerData) -> FResult<Vec<String>> {
        if !self.document.is_closed() {
            return Err(FiscalError::not_valid_command(
                "cannot set customer data while a document is open",
            ));
        }
        if matches!(customer.doc_type, crate::document::CustomerDocType::Cuit)
            && !crate::document::validate_cuit(&customer.tax_id)
        {
            self.pending_customer = None;
            return Err(FiscalError::not_valid_data("invalid CUIT checksum"));
        }
        self.pending_customer = Some(customer);
        Ok(self.status_fields())
    }

    pub fn set_header_trailer(
        &mut self,
        eprom: &mut Eprom,
        lineno: u32,
        text: &str,
    ) -> FResult<Vec<String>> {
        if text == "\u{7f}" {
            eprom.set_header_trailer_line(lineno, None);
        } else {
            eprom.set_header_trailer_line(lineno, Some(text.to_string()));
        }
        Ok(self.status_fields())
    }

    pub fn open_fiscal_receipt(
        &mut self,
        eprom: &Eprom,
        doc_type: DocumentType,
        sink: &mut dyn LineSink,
    ) -> FResult<Vec<String>> {
        if !self.document.is_closed() {
            return Err(FiscalError::not_valid_command("a document is already open"));
        }

        if doc_type.requires_customer() {
            let ok = self
                .pending_customer
                .as_ref()
                .map(|c| {
                    matches!(
                        c.responsibility,
                        crate::document::ResponsibilityCode::I
                            | crate::document::ResponsibilityCode::N
                    )
                })
                .unwrap_or(false);
            if !ok {
                return Err(FiscalError::not_valid_command(
                    "type A documents require customer data with responsibility I or N",
                ));
            }
        }

        let number = eprom.last_counter(doc_type.counter()) + 1;
        let doc = FiscalDocument::new(doc_type, number, self.pending_customer.take());
        print_header(eprom, &doc, sink);

        self.document = if matches!(doc_type, DocumentType::CreditA | DocumentType::CreditB) {
            DocumentState::OpenCredit(doc)
        } else {
            DocumentState::OpenFiscal(doc)
        };
        self.fiscal_status.set(FiscalFlag::OpenDocument);
        self.fiscal_status.set(FiscalFlag::OpenFiscalDocument);
        Ok(self.status_fields())
    }

    pub fn open_non_fiscal_receipt(&mut self) -> FResult<Vec<String>> {
        if !self.document.is_closed() {
            return Err(FiscalError::not_valid_command("a document is already open"));
        }
        self.document = DocumentState::OpenNonFiscal(NonFiscalDocument::new());
        self.fiscal_status.set(FiscalFlag::OpenDocument);
        Ok(self.status_fields())
    }

    pub fn print_non_fiscal_text(
        &mut self,
        text: &str,
        sink: &mut dyn LineSink,
    ) -> FResult<Vec<String>> {
        let DocumentState::OpenNonFiscal(doc) = &mut self.document else {
            return Err(FiscalError::not_valid_command("no non-fiscal document open"));
        };
        let line: String = text.chars().take(40).collect();
        doc.lines.push(line.clone());
        sink.write_left(&line);
        Ok(self.status_fields())
    }

    pub fn print_fiscal_text(&mut self, text: &str) -> FResult<Vec<String>> {
        let doc = self.current_fiscal_doc_mut()?;
        let cap = doc.doc_type.max_fiscal_text_lines();
        if doc.fiscal_texts.len() >= cap {
            return Err(FiscalError::not_valid_command(
                "fiscal text line budget exhausted for this document type",
            ));
        }
        let truncated: String = text.chars().take(28).collect();
        doc.fiscal_texts.push(truncated);
        Ok(self.status_fields())
    }

    /// `fields`: description, quantity, unit amount, vat rate (or `**.**`),
    /// sign, k, display flag, total flag.
    #[allow(clippy::too_many_arguments)]
    pub fn print_line_item(
        &mut self,
        desc: &str,
        quantity: &str,
        amount: &str,
        vat_rate: &str,
        sign: &str,
        k: &str,
        total: &str,
        sink: &mut dyn LineSink,
    ) -> FResult<Vec<String>> {
        if vat_rate == "**.**" {
            return self.general_discount(desc, amount, sign, "N", "T", sink);
        }

        let doc = self.current_fiscal_doc_mut()?;
        if !doc.can_add_item {
            return Err(FiscalError::not_valid_command(
                "no further items after a discount or surcharge",
            ));
        }

        let quantity = parse_decimal(quantity, "quantity")?;
        let unit_amount = parse_decimal(amount, "amount")?;
        let vat_rate_dec = parse_decimal(vat_rate, "vat rate")?;
        let sign = parse_sign(sign)?;
        let k = parse_decimal(k, "k")?;
        let total_flag = total == "T";
        let is_type_a = doc.doc_type.requires_customer();

        let display_amount = money::display_unit_amount(unit_amount, is_type_a, total_flag);

        doc.items.push(FiscalItem {
            description: desc.to_string(),
            quantity,
            unit_amount,
            vat_rate: vat_rate_dec,
            sign,
            k,
            total: total_flag,
        });

        let pending_texts = std::mem::take(&mut doc.fiscal_texts);

        let vat_field = format!("({})", zero_pad_numeric(&format_decimal(vat_rate_dec, 2), 5));
        sink.write_line(
            &format!(
                "{} / {}{}",
                format_decimal(quantity, 3),
                format_decimal(display_amount, 2),
                pad_left(&vat_field, 18),
            ),
            Align::Left,
        );

        for line in &pending_texts {
            sink.write_left(line);
        }

        let amount_line = format!(
            "{}{}{}",
            pad_right(desc, 22),
            " ".repeat(8),
            pad_left(&format_decimal(display_amount * quantity, 2), 10),
        );
        sink.write_left(&amount_line);

        Ok(self.status_fields())
    }

    /// `fields`: description, amount, sign, display flag, total flag.
    pub fn general_discount(
        &mut self,
        desc: &str,
        amount: &str,
        sign: &str,
        _display: &str,
        total: &str,
        sink: &mut dyn LineSink,
    ) -> FResult<Vec<String>> {
        let doc = self.current_fiscal_doc_mut()?;
        if !doc.has_items() {
            return Err(FiscalError::not_valid_command(
                "a discount or surcharge requires at least one prior item",
            ));
        }

        let amount = parse_decimal(amount, "amount")?;
        let sign_parsed = parse_sign(sign)?;
        let total_flag = total == "T";

        doc.discounts.push(DiscountItem {
            description: desc.to_string(),
            amount,
            sign: sign_parsed,
            total: total_flag,
        });
        doc.can_add_item = false;

        let displayed = match sign_parsed {
            Sign::Add => amount,
            Sign::Subtract => -amount,
        };
        let line = format!("{}{}", pad_right(desc, 30), pad_left(&format_decimal(displayed, 2), 10));
        sink.write_left(&line);

        Ok(self.status_fields())
    }

    pub fn subtotal(&mut self) -> FResult<Vec<String>> {
        let doc = self.current_fiscal_doc_mut()?;
        let totals = money::aggregate(&doc.items, &doc.discounts);
        let mut fields = self.status_fields();
        fields.push(totals.items_count.to_string());
        fields.push(format_decimal(totals.total, 2));
        fields.extend(["0".to_string(), "0".to_string(), "0".to_string(), "0".to_string()]);
        Ok(fields)
    }

    pub fn total_tender(
        &mut self,
        text: &str,
        amount: &str,
        op: &str,
        sink: &mut dyn LineSink,
    ) -> FResult<Vec<String>> {
        if op != "T" {
            return Err(FiscalError::not_implemented("partial tender is not modeled"));
        }
        self.print_totals(sink);
        sink.write_left("RECIBI/MOS");
        sink.write_left(&format!("{}{}", pad_right(text, 30), pad_left(amount, 10)));
        let mut fields = self.status_fields();
        fields.push("0.0".to_string());
        Ok(fields)
    }

    fn print_totals(&mut self, sink: &mut dyn LineSink) {
        let (is_type_a, totals_printed, totals) = match &self.document {
            DocumentState::OpenFiscal(doc) | DocumentState::OpenCredit(doc) => (
                doc.doc_type.requires_customer(),
                doc.totals_printed,
                money::aggregate(&doc.items, &doc.discounts),
            ),
            _ => return,
        };
        if totals_printed {
            return;
        }

        if is_type_a {
            sink.write_left("");
            let neto = totals.total / money::VAT_DIVISOR;
            sink.write_left(&format!("{}{}", pad_right("NETO SIN IVA", 30), pad_left(&format_decimal(neto, 2), 10)));
            sink.write_left("");
            sink.write_left(&format!(
                "{}{}",
                pad_right("IVA 21.00 %", 30),
                pad_left(&format_decimal(totals.iva, 2), 10)
            ));
        }

        sink.write_left("");
        let total_line = format!(
            "{}TOTAL{}",
            DOUBLE_WIDE_MARKER,
            pad_left(&format!(" {}", format_decimal(totals.total, 2)), 15)
        );
        sink.write_left(&total_line);

        if let DocumentState::OpenFiscal(doc) | DocumentState::OpenCredit(doc) = &mut self.document {
            doc.totals_printed = true;
        }
    }

    pub fn close_fiscal_receipt(
        &mut self,
        eprom: &mut Eprom,
        sink: &mut dyn LineSink,
    ) -> FResult<Vec<String>> {
        if matches!(self.document, DocumentState::Closed | DocumentState::OpenNonFiscal(_)) {
            return Err(FiscalError::not_valid_command("no fiscal document open"));
        }

        self.print_totals(sink);

        let doc = match std::mem::replace(&mut self.document, DocumentState::Closed) {
            DocumentState::OpenFiscal(doc) | DocumentState::OpenCredit(doc) => doc,
            _ => unreachable!("checked above"),
        };

        for n in 11..=14 {
            sink.write_left(eprom.header_trailer_line(n));
        }
        sink.write_left(&format!("{}      V: 01.02", bold("  CF")));
        sink.write_left(&format!("{}      Reg.:NNG0003137", bold(" DGI")));
        sink.write_left(&red(&center_dashes(">8------>8", 40)));

        eprom.bump_counter(doc.doc_type.counter(), doc.number);
        self.pending_customer = None;
        self.fiscal_status.unset(FiscalFlag::OpenDocument);
        self.fiscal_status.unset(FiscalFlag::OpenFiscalDocument);

        let mut fields = self.status_fields();
        fields.push(doc.number.to_string());
        Ok(fields)
    }

    pub fn close_non_fiscal_receipt(&mut self) -> FResult<Vec<String>> {
        if !matches!(self.document, DocumentState::OpenNonFiscal(_)) {
            return Err(FiscalError::not_valid_command("no non-fiscal document open"));
        }
        self.document = DocumentState::Closed;
        self.fiscal_status.unset(FiscalFlag::OpenDocument);
        Ok(self.status_fields())
    }

    pub fn daily_close(&mut self, close_type: &str) -> FResult<Vec<String>> {
        if !self.document.is_closed() {
            return Err(FiscalError::not_valid_command(
                "cannot perform a daily close while a document is open",
            ));
        }
        log::info!("daily close requested: {close_type}");
        Ok(self.status_fields())
    }
}

impl Default for FiscalMachine {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_decimal(s: &str, field: &str) -> std::result::Result<rust_decimal::Decimal, FiscalError> {
    s.parse()
        .map_err(|_| FiscalError::not_valid_data(format!("malformed {field}: {s}")))
}

fn parse_sign(s: &str) -> std::result::Result<Sign, FiscalError> {
    s.chars()
        .next()
        .ok_or_else(|| FiscalError::not_valid_data("missing sign"))
        .and_then(|c| Sign::try_from(c))
}

fn format_decimal(d: rust_decimal::Decimal, scale: u32) -> String {
    format!("{:.*}", scale as usize, d)
}

/// Zero-pads a formatted decimal string to at least `width` characters,
/// mirroring Python's `"%05.2f"`.
fn zero_pad_numeric(s: &str, width: usize) -> String {
    let len = s.chars().count();
    if len >= width {
        s.to_string()
    } else {
        format!("{}{s}", "0".repeat(width - len))
    }
}

fn print_header(eprom: &Eprom, doc: &FiscalDocument, sink: &mut dyn LineSink) {
    sink.write_left(&red(&center_dashes("8<------8<", 40)));
    sink.write_left(eprom.fantasy_line(1));
    sink.write_left(eprom.fantasy_line(2));
    sink.write_left(&eprom.razon_social);
    sink.write_left(&format!("C.U.I.T. Nro : {}", eprom.cuit));
    sink.write_left(&format!(" INGRESOS BRUTOS : {}", eprom.ingresos_brutos));
    for n in 1..=4 {
        sink.write_left(eprom.header_trailer_line(n));
    }
    sink.write_left(&format!("INICIO DE ACTIVIDADES : {}", eprom.inicio_actividades));
    sink.write_left("IVA RESPONSABLE INSCRIPTO");
    for n in 5..=7 {
        sink.write_left(eprom.header_trailer_line(n));
    }
    sink.write_separator();

    let pv: u32 = eprom.punto_venta.parse().unwrap_or(0);
    sink.write_left(&format!(
        "TIQUE FACTURA   \"{}\"  Nro.{:04}-{:08}",
        bold(&doc.doc_type.code().to_string()),
        pv,
        doc.number
    ));

    let now = chrono::Local::now();
    sink.write_right(&format!("Fecha : {}", now.format("%d-%m-%y")));
    sink.write_right(&format!("Hora  : {}", now.format("%H:%M:%S")));
    sink.write_separator();

    match &doc.customer {
        Some(customer) => {
            sink.write_left(&customer.name);
            if matches!(customer.doc_type, crate::document::CustomerDocType::Cuit) {
                sink.write_left(&format!("C.U.I.T. Nro : {}", grouped_cuit(&customer.tax_id)));
            } else {
                sink.write_left(&format!("{}{}", customer.doc_type.label(), customer.tax_id));
            }
            sink.write_left(&format!("A {}", customer.responsibility.description()));
        }
        None => {
            sink.write_left(&format!("A {}", crate::document::ResponsibilityCode::A.description()));
        }
    }
    for n in 8..=10 {
        sink.write_left(eprom.header_trailer_line(n));
    }
    sink.write_separator();
    sink.write_left("CANTIDAD/PRECIO UNIT (% IVA)");
    sink.write_left("DESCRIPCION          [%B.I.]     IMPORTE");
    sink.write_separator();
}

fn grouped_cuit(cuit: &str) -> String {
    if cuit.len() != 11 {
        return cuit.to_string();
    }
    format!("{}-{}-{}", &cuit[0..2], &cuit[2..10], &cuit[10..11])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{CustomerDocType, ResponsibilityCode};
    use crate::renderer::CapturingSink;

    fn customer(responsibility: ResponsibilityCode) -> CustomerData {
        CustomerData {
            name: "ACME SRL".into(),
            tax_id: "30711281424".into(),
            responsibility,
            doc_type: CustomerDocType::Cuit,
        }
    }

    #[test]
    fn status_request_scenario_matches_spec() {
        let machine = FiscalMachine::new();
        assert_eq!(machine.status_request(), vec!["0000".to_string(), "0C00".to_string()]);
    }

    #[test]
    fn open_bill_a_without_customer_sets_not_valid_command() {
        let mut machine = FiscalMachine::new();
        let eprom = Eprom::bundled();
        let mut sink = CapturingSink::default();
        let err = machine
            .open_fiscal_receipt(&eprom, DocumentType::BillA, &mut sink)
            .unwrap_err();
        assert_eq!(err.error_state(), Some("not-valid-command"));
        machine.apply_error(&err);
        assert!(machine.fiscal_status.is_set(FiscalFlag::NotValidCommand));
    }

    #[test]
    fn open_bill_b_then_add_item_and_close_round_trips() {
        let mut machine = FiscalMachine::new();
        let mut eprom = Eprom::bundled();
        let mut sink = CapturingSink::default();

        machine
            .open_fiscal_receipt(&eprom, DocumentType::BillB, &mut sink)
            .unwrap();
        machine
            .print_line_item("WATER", "2", "10.00", "21.00", "M", "0", "N", &mut sink)
            .unwrap();
        let subtotal = machine.subtotal().unwrap();
        assert_eq!(subtotal[2], "1");
        assert_eq!(subtotal[3], "24.20");

        let reply = machine.close_fiscal_receipt(&mut eprom, &mut sink).unwrap();
        assert_eq!(reply[2], "791");
        assert_eq!(eprom.last_counter_b, 791);
        assert!(machine.document.is_closed());
    }

    #[test]
    fn discount_disables_further_items() {
        let mut machine = FiscalMachine::new();
        let eprom = Eprom::bundled();
        let mut sink = CapturingSink::default();
        machine
            .open_fiscal_receipt(&eprom, DocumentType::BillB, &mut sink)
            .unwrap();
        machine
            .print_line_item("WATER", "1", "10.00", "21.00", "M", "0", "N", &mut sink)
            .unwrap();
        machine
            .general_discount("DTO", "1.00", "m", "N", "N", &mut sink)
            .unwrap();

        let err = machine
            .print_line_item("SODA", "1", "5.00", "21.00", "M", "0", "N", &mut sink)
            .unwrap_err();
        assert_eq!(err.error_state(), Some("not-valid-command"));
    }

    #[test]
    fn bad_date_sets_and_clears_flag() {
        let mut machine = FiscalMachine::new();
        let err = machine.set_date_time("bogus", "000000").unwrap_err();
        machine.apply_error(&err);
        assert!(machine.fiscal_status.is_set(FiscalFlag::BadDate));

        machine.set_date_time("240101", "120000").unwrap();
        assert!(!machine.fiscal_status.is_set(FiscalFlag::BadDate));
    }

    #[test]
    fn set_customer_data_rejects_bad_cuit() {
        let mut machine = FiscalMachine::new();
        let mut bad = customer(ResponsibilityCode::I);
        bad.tax_id = "30711281425".into();
        let err = machine.set_customer_data(bad).unwrap_err();
        assert_eq!(err.error_state(), Some("not-valid-data"));
    }

    #[test]
    fn open_bill_a_with_valid_customer_succeeds() {
        let mut machine = FiscalMachine::new();
        let eprom = Eprom::bundled();
        let mut sink = CapturingSink::default();
        machine
            .set_customer_data(customer(ResponsibilityCode::I))
            .unwrap();
        let reply = machine
            .open_fiscal_receipt(&eprom, DocumentType::BillA, &mut sink)
            .unwrap();
        assert_eq!(reply.len(), 2);
        assert!(matches!(machine.document, DocumentState::OpenFiscal(_)));
    }

    #[test]
    fn open_and_close_fiscal_receipt_tracks_status_flags() {
        let mut machine = FiscalMachine::new();
        let mut eprom = Eprom::bundled();
        let mut sink = CapturingSink::default();

        machine
            .open_fiscal_receipt(&eprom, DocumentType::BillB, &mut sink)
            .unwrap();
        assert!(machine.fiscal_status.is_set(FiscalFlag::OpenDocument));
        assert!(machine.fiscal_status.is_set(FiscalFlag::OpenFiscalDocument));

        machine.close_fiscal_receipt(&mut eprom, &mut sink).unwrap();
        assert!(!machine.fiscal_status.is_set(FiscalFlag::OpenDocument));
        assert!(!machine.fiscal_status.is_set(FiscalFlag::OpenFiscalDocument));
    }

    #[test]
    fn open_and_close_non_fiscal_receipt_tracks_open_document_only() {
        let mut machine = FiscalMachine::new();

        machine.open_non_fiscal_receipt().unwrap();
        assert!(machine.fiscal_status.is_set(FiscalFlag::OpenDocument));
        assert!(!machine.fiscal_status.is_set(FiscalFlag::OpenFiscalDocument));

        machine.close_non_fiscal_receipt().unwrap();
        assert!(!machine.fiscal_status.is_set(FiscalFlag::OpenDocument));
    }
}
