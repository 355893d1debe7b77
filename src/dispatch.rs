//! Command Dispatch (C6): routes a decoded [`Frame`] to a [`FiscalMachine`]
//! handler, clears transient status bits first, and turns a [`FiscalError`]
//! into the right status flag rather than a protocol-level failure.

use crate::document::DocumentType;
use crate::eprom::Eprom;
use crate::error::FiscalError;
use crate::frame::Frame;
use crate::opcode::Opcode;
use crate::renderer::LineSink;
use crate::state::FiscalMachine;
use crate::status::FiscalFlag;

/// Dispatches one command to the fiscal state machine.
///
/// Always succeeds at the protocol level: a [`FiscalError`] is folded into
/// the status word and `status_request`-style fields are still returned, the
/// same way the device replies to a rejected command rather than dropping
/// the frame (a [`crate::error::ProtocolError`] is a different failure mode,
/// handled before a frame ever reaches dispatch).
pub fn dispatch(
    machine: &mut FiscalMachine,
    eprom: &mut Eprom,
    frame: &Frame,
    sink: &mut dyn LineSink,
) -> Vec<String> {
    machine.fiscal_status.clear_transient();

    let Ok(opcode) = Opcode::try_from(frame.op) else {
        let err = FiscalError::unknown_command(format!("opcode {:#04x} not modeled", frame.op));
        machine.apply_error(&err);
        return machine.status_request();
    };

    let result = run(machine, eprom, opcode, frame, sink);
    match result {
        Ok(fields) => fields,
        Err(err) => {
            machine.apply_error(&err);
            machine.status_request()
        }
    }
}

fn run(
    machine: &mut FiscalMachine,
    eprom: &mut Eprom,
    opcode: Opcode,
    frame: &Frame,
    sink: &mut dyn LineSink,
) -> Result<Vec<String>, FiscalError> {
    match opcode {
        Opcode::StatusRequest => Ok(machine.status_request()),

        Opcode::SetDateTime => machine.set_date_time(frame.field_str(0), frame.field_str(1)),

        Opcode::GetDateTime => Ok(machine.get_date_time()),

        Opcode::SetCustomerData => {
            let name = frame.field_str(0).to_string();
            let tax_id = frame.field_str(1).to_string();
            let responsibility = char_field(frame, 2)?;
            let doc_type = char_field(frame, 3)?;
            let customer = crate::document::CustomerData {
                name,
                tax_id,
                responsibility: responsibility.try_into()?,
                doc_type: doc_type.try_into()?,
            };
            machine.set_customer_data(customer)
        }

        Opcode::SetHeaderTrailer => {
            let lineno: u32 = frame
                .field_str(0)
                .parse()
                .map_err(|_| FiscalError::not_valid_data("malformed header/trailer line number"))?;
            machine.set_header_trailer(eprom, lineno, frame.field_str(1))
        }

        Opcode::OpenFiscalReceipt => {
            let doc_type: DocumentType = char_field(frame, 0)?.try_into()?;
            machine.open_fiscal_receipt(eprom, doc_type, sink)
        }

        Opcode::OpenNonFiscalReceipt => machine.open_non_fiscal_receipt(),

        Opcode::PrintNonFiscalText => machine.print_non_fiscal_text(frame.field_str(0), sink),

        Opcode::CloseNonFiscalReceipt => machine.close_non_fiscal_receipt(),

        Opcode::PrintFiscalText => machine.print_fiscal_text(frame.field_str(0)),

        Opcode::PrintLineItem => machine.print_line_item(
            frame.field_str(0),
            frame.field_str(1),
            frame.field_str(2),
            frame.field_str(3),
            frame.field_str(4),
            frame.field_str(5),
            frame.field_str(7),
            sink,
        ),

        Opcode::GeneralDiscount => machine.general_discount(
            frame.field_str(0),
            frame.field_str(1),
            frame.field_str(2),
            frame.field_str(3),
            frame.field_str(4),
            sink,
        ),

        Opcode::Subtotal => machine.subtotal(),

        Opcode::TotalTender => machine.total_tender(
            frame.field_str(0),
            frame.field_str(1),
            frame.field_str(2),
            sink,
        ),

        Opcode::CloseFiscalReceipt => machine.close_fiscal_receipt(eprom, sink),

        Opcode::DailyClose => machine.daily_close(frame.field_str(0)),

        Opcode::LastItemDiscount => Err(FiscalError::not_implemented(
            "last-item discount is not modeled",
        )),

        Opcode::OpenDrawer
        | Opcode::OpenDnfhOrCreditNote
        | Opcode::CloseDnfhOrCreditNote
        | Opcode::PrintEmbarkItem
        | Opcode::PrintAccountItem
        | Opcode::PrintQuotationItem
        | Opcode::PrintDnfhInfo
        | Opcode::CreditNoteReference
        | Opcode::PrintReceiptText
        | Opcode::CancelAnyDocument
        | Opcode::Reprint => Err(FiscalError::not_implemented(format!(
            "{opcode:?} is not modeled"
        ))),
    }
}

fn char_field(frame: &Frame, index: usize) -> Result<char, FiscalError> {
    frame
        .field_str(index)
        .chars()
        .next()
        .ok_or_else(|| FiscalError::not_valid_data(format!("missing field {index}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::CapturingSink;

    fn status_request_frame(seq: u8) -> Frame {
        Frame::new(seq, Opcode::StatusRequest.byte(), Vec::new())
    }

    #[test]
    fn status_request_clears_transient_flags_first() {
        let mut machine = FiscalMachine::new();
        machine.fiscal_status.set(FiscalFlag::NotValidCommand);
        let mut eprom = Eprom::bundled();
        let mut sink = CapturingSink::default();

        let fields = dispatch(&mut machine, &mut eprom, &status_request_frame(0x20), &mut sink);

        assert!(!machine.fiscal_status.is_set(FiscalFlag::NotValidCommand));
        assert_eq!(fields, vec!["0000".to_string(), "0C00".to_string()]);
    }

    #[test]
    fn unmodeled_opcode_sets_unknown_command() {
        let mut machine = FiscalMachine::new();
        let mut eprom = Eprom::bundled();
        let mut sink = CapturingSink::default();
        let frame = Frame::new(0x20, 0x01, Vec::new());

        dispatch(&mut machine, &mut eprom, &frame, &mut sink);
        assert!(machine.fiscal_status.is_set(FiscalFlag::UnknownCommand));
    }

    #[test]
    fn stubbed_opcode_does_not_set_a_status_flag() {
        let mut machine = FiscalMachine::new();
        let mut eprom = Eprom::bundled();
        let mut sink = CapturingSink::default();
        let frame = Frame::new(0x20, Opcode::OpenDrawer.byte(), Vec::new());

        dispatch(&mut machine, &mut eprom, &frame, &mut sink);
        assert!(!machine.fiscal_status.is_set(FiscalFlag::NotValidCommand));
    }

    #[test]
    fn open_then_close_via_dispatch() {
        let mut machine = FiscalMachine::new();
        let mut eprom = Eprom::bundled();
        let mut sink = CapturingSink::default();

        let open = Frame::from_str_fields(0x20, Opcode::OpenFiscalReceipt.byte(), &["B"]);
        dispatch(&mut machine, &mut eprom, &open, &mut sink);
        assert!(!machine.document.is_closed());

        let close = Frame::new(0x22, Opcode::CloseFiscalReceipt.byte(), Vec::new());
        let fields = dispatch(&mut machine, &mut eprom, &close, &mut sink);
        assert_eq!(fields[2], "791");
        assert!(machine.document.is_closed());
    }
}
