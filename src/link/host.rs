//! Host-side link layer: write a frame, wait for ACK (handling NAK
//! retransmission and DC2/DC4 flow control), then accumulate and validate
//! the reply.

use std::io::{Read, Write};
use std::time::Instant;

use crate::error::{Error, Result};
use crate::frame::{self, Frame};
use crate::sequence::SequenceNumber;
use crate::{ACK, DC2, DC4, ETX, NAK, STX};

use super::{open_port, MAX_NAKS, NO_REPLY_TRIES, RETRIES, WAIT_CHAR_TIME, WAIT_TIME};

pub struct HostLink {
    port: Box<dyn serialport::SerialPort>,
    seq: SequenceNumber,
}

impl HostLink {
    pub fn open(path: &str, baud: u32) -> Result<Self> {
        Ok(Self {
            port: open_port(path, baud)?,
            seq: SequenceNumber::host_random(),
        })
    }

    /// Sends `op`/`fields` and returns the device's reply frame.
    pub fn exchange(&mut self, op: u8, fields: &[&[u8]]) -> Result<Frame> {
        let seq = self.seq.advance_host();
        let raw = frame::build(
            op,
            seq,
            fields,
            SequenceNumber::HOST_START..=SequenceNumber::HOST_END,
        )
        .map_err(Error::Protocol)?;

        self.send_wait_ack(&raw)?;
        self.read_reply(seq)
    }

    fn send_wait_ack(&mut self, raw: &[u8]) -> Result<()> {
        self.port.write_all(raw)?;
        let mut deadline = Instant::now() + WAIT_TIME;
        let mut naks = 0u32;

        loop {
            if Instant::now() > deadline {
                return Err(Error::communication("timed out waiting for ACK"));
            }

            let mut byte = [0u8; 1];
            match self.port.read(&mut byte) {
                Ok(1) => match byte[0] {
                    ACK => {
                        log::trace!("ACK received");
                        return Ok(());
                    }
                    NAK => {
                        naks += 1;
                        log::debug!("NAK received, resending ({naks}/{MAX_NAKS})");
                        if naks > MAX_NAKS {
                            return Err(Error::communication("too many NAKs"));
                        }
                        self.port.write_all(raw)?;
                    }
                    DC2 | DC4 => {
                        log::trace!("flow-control byte received, extending deadline");
                        deadline += WAIT_TIME;
                    }
                    other => log::debug!("unexpected byte {other:#04x} while waiting for ACK"),
                },
                Ok(_) => {}
                Err(ref e) if e.kind() == std::io::ErrorKind::TimedOut => {}
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn read_reply(&mut self, expected_seq: u8) -> Result<Frame> {
        let mut retries = 0u32;
        loop {
            let raw = self.accumulate_reply()?;
            match frame::parse(&raw, None) {
                Ok(frame) if frame.seq == expected_seq => {
                    self.port.write_all(&[ACK])?;
                    return Ok(frame);
                }
                Ok(_stale) => {
                    log::debug!("stale sequence in reply, ACKing and retrying");
                    self.port.write_all(&[ACK])?;
                    retries += 1;
                    if retries > RETRIES {
                        return Err(Error::communication("too many stale-sequence retries"));
                    }
                }
                Err(_) => {
                    log::debug!("bad BCC / malformed reply, sending NAK");
                    self.port.write_all(&[NAK])?;
                    retries += 1;
                    if retries > RETRIES {
                        return Err(Error::communication(
                            "demasiados paquetes invalidos (bad bcc)",
                        ));
                    }
                }
            }
        }
    }

    /// Reads bytes until `ETX`, then the 4-byte BCC that follows it,
    /// sleeping `WAIT_CHAR_TIME` between empty polls.
    fn accumulate_reply(&mut self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(16);
        let mut empties = 0u32;
        let mut started = false;

        loop {
            let mut byte = [0u8; 1];
            match self.port.read(&mut byte) {
                Ok(1) => {
                    if !started {
                        if byte[0] != STX {
                            continue;
                        }
                        started = true;
                    }
                    buf.push(byte[0]);
                    empties = 0;
                    if byte[0] == ETX {
                        break;
                    }
                }
                _ => {
                    empties += 1;
                    if empties > NO_REPLY_TRIES {
                        return Err(Error::communication("no reply from device"));
                    }
                    std::thread::sleep(WAIT_CHAR_TIME);
                }
            }
        }

        let mut bcc = [0u8; 4];
        self.port.read_exact(&mut bcc)?;
        buf.extend_from_slice(&bcc);
        Ok(buf)
    }
}
