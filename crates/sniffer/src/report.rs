//! Frame reporting
//!
//! Foreground consumer: empties the capture buffer into the operator transport.

use capture_buffer::CaptureBuffer;
use std::io::{self, Write};
use std::sync::Arc;
use tracing::warn;

/// Notice emitted once after the hardware receive queue lost messages
pub const HARDWARE_OVERFLOW_NOTICE: &str = "Hardware CAN FIFO overflow!";

/// Notice emitted once after the capture buffer dropped frames
pub const SOFTWARE_OVERFLOW_NOTICE: &str = "Software CAN buffer overflow!";

/// Terminator after each frame line: line end plus a blank line
pub const FRAME_TERMINATOR: &str = "\r\n\n";

/// Consumer half of the capture pipeline
#[derive(Debug)]
pub struct FrameReporter {
    buffer: Arc<CaptureBuffer>,
}

impl FrameReporter {
    pub(crate) fn new(buffer: Arc<CaptureBuffer>) -> Self {
        Self { buffer }
    }

    /// Write pending overflow notices, then every buffered frame oldest first.
    ///
    /// Returns the number of frames written. Never waits for new frames.
    /// A flag is cleared and a frame consumed only once its line was written,
    /// so after a failed write the same notice or frame is reported next time.
    /// A line cut short by the failure is repeated in full on that next call.
    pub fn drain_and_report<W: Write + ?Sized>(&self, out: &mut W) -> io::Result<usize> {
        if self.buffer.has_hardware_overflow() {
            warn!("{}", HARDWARE_OVERFLOW_NOTICE);
            write!(out, "{}\r\n", HARDWARE_OVERFLOW_NOTICE)?;
            self.buffer.take_hardware_overflow();
        }
        if self.buffer.has_software_overflow() {
            warn!("{}", SOFTWARE_OVERFLOW_NOTICE);
            write!(out, "{}\r\n", SOFTWARE_OVERFLOW_NOTICE)?;
            self.buffer.take_software_overflow();
        }

        let mut count = 0;
        while let Some(frame) = self.buffer.peek() {
            write!(out, "{}{}", frame, FRAME_TERMINATOR)?;
            self.buffer.pop();
            count += 1;
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use can_bus::CanFrame;

    fn reporter() -> (FrameReporter, Arc<CaptureBuffer>) {
        let buffer = Arc::new(CaptureBuffer::new(8).unwrap());
        (FrameReporter::new(Arc::clone(&buffer)), buffer)
    }

    fn report(reporter: &FrameReporter) -> String {
        let mut out = Vec::new();
        reporter.drain_and_report(&mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_single_frame_line() {
        let (reporter, buffer) = reporter();
        buffer.push(CanFrame::new(0x123, &[0xAA, 0xBB, 0xCC]).unwrap());

        assert_eq!(report(&reporter), "ID: 0x123, DLC: 3, Data: AA BB CC\r\n\n");
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_frames_in_fifo_order() {
        let (reporter, buffer) = reporter();
        buffer.push(CanFrame::new(0x1, &[]).unwrap());
        buffer.push(CanFrame::new(0x2, &[0x00]).unwrap());

        assert_eq!(
            report(&reporter),
            "ID: 0x001, DLC: 0, Data:\r\n\nID: 0x002, DLC: 1, Data: 00\r\n\n"
        );
    }

    #[test]
    fn test_overflow_notices_precede_frames_once() {
        let (reporter, buffer) = reporter();
        buffer.flag_hardware_overflow();
        for id in 0..9 {
            buffer.push(CanFrame::new(id, &[]).unwrap());
        }

        let text = report(&reporter);
        assert!(text.starts_with(
            "Hardware CAN FIFO overflow!\r\nSoftware CAN buffer overflow!\r\nID: 0x000"
        ));
        assert_eq!(text.matches("DLC").count(), 7);

        // flags were consumed by the first report
        assert_eq!(report(&reporter), "");
    }

    /// Accepts up to `budget` bytes, then fails every write that would exceed it
    struct ShortLink {
        accepted: Vec<u8>,
        budget: usize,
    }

    impl ShortLink {
        fn new(budget: usize) -> Self {
            Self {
                accepted: Vec::new(),
                budget,
            }
        }
    }

    impl Write for ShortLink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.accepted.len() + buf.len() > self.budget {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "link down"));
            }
            self.accepted.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_failed_write_keeps_notice_and_frames() {
        let (reporter, buffer) = reporter();
        buffer.flag_hardware_overflow();
        buffer.push(CanFrame::new(0x10, &[]).unwrap());
        buffer.push(CanFrame::new(0x11, &[]).unwrap());

        let mut link = ShortLink::new(0);
        assert!(reporter.drain_and_report(&mut link).is_err());
        assert!(buffer.has_hardware_overflow());
        assert_eq!(buffer.len(), 2);

        let text = report(&reporter);
        assert!(text.starts_with("Hardware CAN FIFO overflow!\r\nID: 0x010"));
        assert!(text.contains("ID: 0x011"));
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_frame_kept_when_its_line_fails() {
        let (reporter, buffer) = reporter();
        for id in [0x20, 0x21] {
            buffer.push(CanFrame::new(id, &[0x01]).unwrap());
        }

        let first_line = "ID: 0x020, DLC: 1, Data: 01\r\n\n";
        let mut link = ShortLink::new(first_line.len());
        assert!(reporter.drain_and_report(&mut link).is_err());
        assert_eq!(String::from_utf8(link.accepted).unwrap(), first_line);

        assert_eq!(buffer.len(), 1);
        assert_eq!(report(&reporter), "ID: 0x021, DLC: 1, Data: 01\r\n\n");
    }

    #[test]
    fn test_empty_buffer_returns_immediately() {
        let (reporter, _buffer) = reporter();
        let mut out = Vec::new();
        assert_eq!(reporter.drain_and_report(&mut out).unwrap(), 0);
        assert!(out.is_empty());
    }
}
