//! Link Layer (C4/C5): the ACK/NAK/DC2/DC4 exchange that frames ride on top
//! of, split into a host half (write-and-wait) and a device half
//! (read-dispatch-reply).

pub mod device;
pub mod host;

use std::time::Duration;

/// Overall deadline for a single outbound send, extended by DC2/DC4.
pub const WAIT_TIME: Duration = Duration::from_secs(10);
/// Poll interval while accumulating a reply byte-by-byte.
pub const WAIT_CHAR_TIME: Duration = Duration::from_millis(100);
/// Empty-read polls allowed while waiting for a reply before giving up.
pub const NO_REPLY_TRIES: u32 = 200;
/// Bad-BCC or stale-sequence reply retries allowed per exchange.
pub const RETRIES: u32 = 4;
/// NAKs tolerated while waiting for the initial ACK before giving up.
pub const MAX_NAKS: u32 = 10;

fn open_port(path: &str, baud: u32) -> crate::error::Result<Box<dyn serialport::SerialPort>> {
    serialport::new(path, baud)
        .timeout(WAIT_CHAR_TIME)
        .open()
        .map_err(crate::error::Error::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_port_on_nonexistent_path_errors() {
        let result = open_port("/dev/nonexistent-hasar-test-port", 9600);
        assert!(result.is_err());
    }
}
