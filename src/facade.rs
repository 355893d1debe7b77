//! Host Façade (C9): the ergonomic, buffering API a point-of-sale
//! application drives instead of building wire frames by hand. Commands are
//! queued as they're called and only actually exchanged with the device when
//! [`HostFacade::finish`] is invoked, mirroring a ticket being assembled line
//! by line before it prints.

use crate::document::{CustomerData, CustomerDocType, DiscountItem, DocumentType, FiscalItem, Sign};
use crate::error::{Error, Result};
use crate::frame::Frame;
use crate::link::host::HostLink;
use crate::opcode::Opcode;

/// Which close opcode a buffered `close_document` resolves to, decided by
/// whatever document kind was open when it was queued.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum OpenKind {
    Fiscal,
    NonFiscal,
}

enum Queued {
    Command(u8, Vec<Vec<u8>>),
    Close(OpenKind),
}

/// A buffering host-side driver for one fiscal printer.
///
/// Calls like [`HostFacade::open_bill`] or [`HostFacade::add_item`] don't
/// talk to the device immediately; they queue a command. [`HostFacade::finish`]
/// flushes the queue in order: staged customer data first, then the queued
/// commands, each exchanged over the link in turn. [`HostFacade::daily_close`]
/// and [`HostFacade::partial_close`] are the exception: they require no
/// document be open and execute immediately, since they're issued standalone
/// rather than as part of assembling a ticket.
pub struct HostFacade {
    link: HostLink,
    current: Option<OpenKind>,
    customer: Option<CustomerData>,
    queue: Vec<Queued>,
}

fn sign_char(sign: Sign) -> &'static str {
    match sign {
        Sign::Add => "M",
        Sign::Subtract => "m",
    }
}

fn total_flag(total: bool) -> &'static str {
    if total {
        "T"
    } else {
        "N"
    }
}

fn doc_type_char(doc_type: CustomerDocType) -> char {
    match doc_type {
        CustomerDocType::Le => '0',
        CustomerDocType::Lc => '1',
        CustomerDocType::Dni => '2',
        CustomerDocType::Passport => '3',
        CustomerDocType::Ci => '4',
        CustomerDocType::Cuit => 'C',
    }
}

impl HostFacade {
    pub fn new(link: HostLink) -> Self {
        Self {
            link,
            current: None,
            customer: None,
            queue: Vec::new(),
        }
    }

    pub fn open(path: &str, baud: u32) -> Result<Self> {
        Ok(Self::new(HostLink::open(path, baud)?))
    }

    fn require_closed(&self) -> Result<()> {
        if self.current.is_some() {
            return Err(Error::communication("a document is already open"));
        }
        Ok(())
    }

    fn queue_command(&mut self, op: Opcode, fields: Vec<Vec<u8>>) {
        self.queue.push(Queued::Command(op.byte(), fields));
    }

    /// Opens a bill (factura), type `A` or `B`.
    pub fn open_bill(&mut self, bill_type: char) -> Result<()> {
        self.require_closed()?;
        let doc_type = match bill_type {
            'A' => DocumentType::BillA,
            'B' => DocumentType::BillB,
            _ => return Err(Error::communication(format!("invalid bill type: {bill_type}"))),
        };
        self.current = Some(OpenKind::Fiscal);
        self.queue_command(
            Opcode::OpenFiscalReceipt,
            vec![doc_type.code().to_string().into_bytes(), b"T".to_vec()],
        );
        Ok(())
    }

    /// Opens a ticket (tique), defaulting to type `B`.
    pub fn open_ticket(&mut self, ticket_type: char) -> Result<()> {
        self.require_closed()?;
        let doc_type = match ticket_type {
            'B' => DocumentType::Ticket,
            'C' => DocumentType::ConsumerC,
            _ => return Err(Error::communication(format!("invalid ticket type: {ticket_type}"))),
        };
        self.current = Some(OpenKind::Fiscal);
        self.queue_command(
            Opcode::OpenFiscalReceipt,
            vec![doc_type.code().to_string().into_bytes(), b"T".to_vec()],
        );
        Ok(())
    }

    /// Opens a debit note, type `A` or `B`.
    pub fn open_debit_note(&mut self, debit_type: char) -> Result<()> {
        self.require_closed()?;
        let doc_type = match debit_type {
            'A' => DocumentType::DebitA,
            'B' => DocumentType::DebitB,
            _ => return Err(Error::communication(format!("invalid debit note type: {debit_type}"))),
        };
        self.current = Some(OpenKind::Fiscal);
        self.queue_command(
            Opcode::OpenFiscalReceipt,
            vec![doc_type.code().to_string().into_bytes(), b"T".to_vec()],
        );
        Ok(())
    }

    /// Opens a credit note, type `A` or `B`. Queues a `CreditNoteReference`
    /// ahead of the open, matching how the device expects the referenced
    /// document to be identified before the credit note itself opens.
    pub fn open_credit_note(&mut self, credit_type: char) -> Result<()> {
        self.require_closed()?;
        let doc_type = match credit_type {
            'A' => DocumentType::CreditA,
            'B' => DocumentType::CreditB,
            _ => return Err(Error::communication(format!("invalid credit note type: {credit_type}"))),
        };
        self.current = Some(OpenKind::Fiscal);
        self.queue_command(Opcode::CreditNoteReference, vec![b"1".to_vec(), b"NC".to_vec()]);
        self.queue_command(
            Opcode::OpenDnfhOrCreditNote,
            vec![doc_type.code().to_string().into_bytes(), b"T".to_vec()],
        );
        Ok(())
    }

    /// Opens a remito (non-fiscal delivery receipt) over the shared DNFH
    /// opcode.
    pub fn open_receipt(&mut self) -> Result<()> {
        self.require_closed()?;
        self.current = Some(OpenKind::Fiscal);
        self.queue_command(Opcode::OpenDnfhOrCreditNote, vec![b"r".to_vec(), b"T".to_vec()]);
        Ok(())
    }

    /// Opens a plain non-fiscal receipt.
    pub fn open_non_fiscal_receipt(&mut self) -> Result<()> {
        self.require_closed()?;
        self.current = Some(OpenKind::NonFiscal);
        self.queue_command(Opcode::OpenNonFiscalReceipt, vec![]);
        Ok(())
    }

    /// Stages customer data; flushed as `SetCustomerData` ahead of whatever
    /// open command is queued, since the device wants customer data set
    /// before the fiscal receipt that needs it is opened.
    pub fn set_customer_data(&mut self, data: CustomerData) {
        self.customer = Some(data);
    }

    /// Queues one line item.
    pub fn add_item(&mut self, item: &FiscalItem) {
        self.queue_command(
            Opcode::PrintLineItem,
            vec![
                item.description.clone().into_bytes(),
                item.quantity.to_string().into_bytes(),
                item.unit_amount.to_string().into_bytes(),
                item.vat_rate.to_string().into_bytes(),
                sign_char(item.sign).as_bytes().to_vec(),
                item.k.to_string().into_bytes(),
                b"N".to_vec(),
                total_flag(item.total).as_bytes().to_vec(),
            ],
        );
    }

    pub fn add_items(&mut self, items: &[FiscalItem]) {
        for item in items {
            self.add_item(item);
        }
    }

    /// Queues a general discount or surcharge line.
    pub fn add_discount(&mut self, discount: &DiscountItem) {
        self.queue_command(
            Opcode::GeneralDiscount,
            vec![
                discount.description.clone().into_bytes(),
                discount.amount.to_string().into_bytes(),
                sign_char(discount.sign).as_bytes().to_vec(),
                b"N".to_vec(),
                total_flag(discount.total).as_bytes().to_vec(),
            ],
        );
    }

    /// Queues a free-text line on the currently open fiscal or non-fiscal
    /// document.
    pub fn add_text(&mut self, text: &str) {
        match self.current {
            Some(OpenKind::NonFiscal) => {
                self.queue_command(Opcode::PrintNonFiscalText, vec![text.as_bytes().to_vec()]);
            }
            _ => {
                self.queue_command(Opcode::PrintFiscalText, vec![text.as_bytes().to_vec()]);
            }
        }
    }

    /// Queues the subtotal and total-tender commands, in that order.
    pub fn tender(&mut self, description: &str, amount: &str) {
        self.queue_command(Opcode::Subtotal, vec![]);
        self.queue_command(
            Opcode::TotalTender,
            vec![description.as_bytes().to_vec(), amount.as_bytes().to_vec(), b"T".to_vec()],
        );
    }

    /// Queues the close of whatever document is currently open, resolved at
    /// flush time into the matching fiscal/non-fiscal close opcode.
    pub fn close_document(&mut self) -> Result<()> {
        let kind = self
            .current
            .take()
            .ok_or_else(|| Error::communication("no document is open to close"))?;
        self.queue.push(Queued::Close(kind));
        Ok(())
    }

    /// Executes a daily (`Z`) closure immediately. No document may be open.
    pub fn daily_close(&mut self) -> Result<Frame> {
        self.require_closed()?;
        self.execute(Opcode::DailyClose, &[b"Z"])
    }

    /// Executes a partial (`X`) closure immediately. No document may be open.
    pub fn partial_close(&mut self) -> Result<Frame> {
        self.require_closed()?;
        self.execute(Opcode::DailyClose, &[b"X"])
    }

    /// Sends one command immediately, outside the queue, enriching any
    /// failure with the opcode that triggered it.
    pub fn execute(&mut self, op: Opcode, fields: &[&[u8]]) -> Result<Frame> {
        self.link.exchange(op.byte(), fields).map_err(|err| match err {
            Error::Communication(msg) => Error::communication(format!("{op:?}: {msg}")),
            other => other,
        })
    }

    /// Flushes every queued command in order: staged customer data first (if
    /// any), then the queue itself, resolving the queued close marker into
    /// the correct opcode for the document kind it was recorded against.
    pub fn finish(&mut self) -> Result<Vec<Frame>> {
        let mut replies = Vec::new();

        if let Some(customer) = self.customer.take() {
            let responsibility = char::from(customer.responsibility).to_string();
            let doc_type = doc_type_char(customer.doc_type).to_string();
            let fields = [
                customer.name.as_bytes(),
                customer.tax_id.as_bytes(),
                responsibility.as_bytes(),
                doc_type.as_bytes(),
            ];
            replies.push(self.execute(Opcode::SetCustomerData, &fields)?);
        }

        for queued in self.queue.drain(..) {
            let reply = match queued {
                Queued::Command(op, fields) => {
                    let refs: Vec<&[u8]> = fields.iter().map(Vec::as_slice).collect();
                    self.link.exchange(op, &refs)?
                }
                Queued::Close(OpenKind::Fiscal) => self.link.exchange(Opcode::CloseFiscalReceipt.byte(), &[])?,
                Queued::Close(OpenKind::NonFiscal) => {
                    self.link.exchange(Opcode::CloseNonFiscalReceipt.byte(), &[])?
                }
            };
            replies.push(reply);
        }

        Ok(replies)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_char_matches_wire_convention() {
        assert_eq!(sign_char(Sign::Add), "M");
        assert_eq!(sign_char(Sign::Subtract), "m");
    }

    #[test]
    fn doc_type_char_round_trips_known_codes() {
        assert_eq!(doc_type_char(CustomerDocType::Dni), '2');
        assert_eq!(doc_type_char(CustomerDocType::Cuit), 'C');
    }

    #[test]
    fn total_flag_matches_wire_convention() {
        assert_eq!(total_flag(true), "T");
        assert_eq!(total_flag(false), "N");
    }
}
