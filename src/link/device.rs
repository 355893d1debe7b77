//! Device-side link layer: read one command frame, ACK/NAK it, and send a
//! reply frame back, retransmitting while the host keeps NAKing.

use std::io::{Read, Write};

use crate::error::Result;
use crate::frame::{self, Frame};
use crate::sequence::SequenceNumber;
use crate::{ACK, ETX, NAK, STX};

use super::{open_port, RETRIES};

pub struct DeviceLink {
    port: Box<dyn serialport::SerialPort>,
}

impl DeviceLink {
    pub fn open(path: &str, baud: u32) -> Result<Self> {
        Ok(Self {
            port: open_port(path, baud)?,
        })
    }

    /// Blocks until a well-formed command frame arrives, NAKing malformed
    /// ones and silently absorbing stray ACK echoes in between.
    pub fn read_command(&mut self) -> Result<Frame> {
        loop {
            let mut byte = [0u8; 1];
            match self.port.read(&mut byte) {
                Ok(1) => {
                    if byte[0] == ACK {
                        log::trace!("stray ACK received, echoing and continuing");
                        self.port.write_all(&[ACK])?;
                        continue;
                    }
                    if byte[0] != STX {
                        continue;
                    }
                    let raw = self.accumulate_from_stx(byte[0])?;
                    match frame::parse(&raw, None) {
                        Ok(frame) => {
                            self.port.write_all(&[ACK])?;
                            return Ok(frame);
                        }
                        Err(e) => {
                            log::debug!("malformed command frame: {e}, sending NAK");
                            self.port.write_all(&[NAK])?;
                        }
                    }
                }
                Ok(_) => {}
                Err(ref e) if e.kind() == std::io::ErrorKind::TimedOut => {}
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn accumulate_from_stx(&mut self, stx: u8) -> Result<Vec<u8>> {
        let mut buf = vec![stx];
        loop {
            let mut byte = [0u8; 1];
            match self.port.read(&mut byte) {
                Ok(1) => {
                    buf.push(byte[0]);
                    if byte[0] == ETX {
                        break;
                    }
                }
                Ok(_) => {}
                Err(ref e) if e.kind() == std::io::ErrorKind::TimedOut => {}
                Err(e) => return Err(e.into()),
            }
        }
        let mut bcc = [0u8; 4];
        self.port.read_exact(&mut bcc)?;
        buf.extend_from_slice(&bcc);
        Ok(buf)
    }

    /// Sends a reply carrying `seq`/`op`/`fields`, retransmitting on NAK up
    /// to [`RETRIES`] times before giving up on this exchange.
    pub fn send_reply(&mut self, seq: u8, op: u8, fields: &[&[u8]]) -> Result<()> {
        let raw = frame::build(op, seq, fields, SequenceNumber::DEVICE_START..=SequenceNumber::DEVICE_END)
            .map_err(crate::error::Error::Protocol)?;

        let mut retries = 0u32;
        loop {
            self.port.write_all(&raw)?;
            let mut byte = [0u8; 1];
            match self.port.read(&mut byte) {
                Ok(1) if byte[0] == ACK => {
                    log::trace!("reply acknowledged");
                    return Ok(());
                }
                Ok(1) if byte[0] == NAK => {
                    retries += 1;
                    log::debug!("reply NAKed, retransmitting ({retries}/{RETRIES})");
                    if retries > RETRIES {
                        return Err(crate::error::Error::communication(
                            "host kept NAKing the reply",
                        ));
                    }
                }
                Ok(_) => {}
                Err(ref e) if e.kind() == std::io::ErrorKind::TimedOut => {
                    retries += 1;
                    if retries > RETRIES {
                        return Err(crate::error::Error::communication(
                            "no acknowledgement of reply",
                        ));
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}
