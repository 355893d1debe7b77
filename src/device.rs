//! Device orchestration: the emulator's main loop, wiring the link layer to
//! dispatch, the fiscal state machine, and a renderer.

use crate::dispatch;
use crate::eprom::Eprom;
use crate::error::Result;
use crate::link::device::DeviceLink;
use crate::renderer::LineSink;
use crate::state::FiscalMachine;

/// A running emulated device: one open serial port, one fiscal engine, one
/// EPROM configuration, printing to `sink`.
pub struct Device {
    link: DeviceLink,
    machine: FiscalMachine,
    eprom: Eprom,
}

impl Device {
    pub fn new(link: DeviceLink, eprom: Eprom) -> Self {
        Self {
            link,
            machine: FiscalMachine::new(),
            eprom,
        }
    }

    pub fn open(path: &str, baud: u32, eprom: Eprom) -> Result<Self> {
        Ok(Self::new(DeviceLink::open(path, baud)?, eprom))
    }

    /// Serves commands forever, until the link returns an unrecoverable
    /// I/O error.
    pub fn run(&mut self, sink: &mut dyn LineSink) -> Result<()> {
        loop {
            self.serve_one(sink)?;
        }
    }

    /// Reads one command, dispatches it, and replies. Returns normally even
    /// when the command was rejected at the fiscal level; only a link-level
    /// I/O failure surfaces as `Err`.
    pub fn serve_one(&mut self, sink: &mut dyn LineSink) -> Result<()> {
        let frame = self.link.read_command()?;
        let fields = dispatch::dispatch(&mut self.machine, &mut self.eprom, &frame, sink);
        let field_bytes: Vec<&[u8]> = fields.iter().map(|f| f.as_bytes()).collect();
        self.link.send_reply(frame.seq, frame.op, &field_bytes)?;
        Ok(())
    }
}
