//! Receive interrupt handler
//!
//! Moves frames from the controller's hardware queue into the capture buffer.

use can_bus::{RxEvents, RxQueue};
use capture_buffer::CaptureBuffer;
use std::sync::Arc;

/// Producer half of the capture pipeline.
///
/// There is exactly one per [`CaptureController`](crate::CaptureController);
/// it is not `Clone`, which keeps the capture buffer single-producer.
#[derive(Debug)]
pub struct FrameIngest {
    buffer: Arc<CaptureBuffer>,
    max_frames: usize,
}

impl FrameIngest {
    pub(crate) fn new(buffer: Arc<CaptureBuffer>, max_frames: usize) -> Self {
        Self { buffer, max_frames }
    }

    /// Frames drained per invocation at most
    pub fn max_frames(&self) -> usize {
        self.max_frames
    }

    /// Receive-notification handler.
    ///
    /// Runs in interrupt context: it never blocks, allocates or logs, and
    /// returns after at most `max_frames` reads. Frames beyond the bound stay
    /// queued in hardware for the next notification. A frame that finds the
    /// capture buffer full is dropped and only the software-overflow flag
    /// records it.
    pub fn on_receive<Q: RxQueue + ?Sized>(&self, queue: &mut Q, events: RxEvents) {
        if events.contains(RxEvents::MESSAGE_LOST) {
            self.buffer.flag_hardware_overflow();
            queue.clear_message_lost();
        }

        for _ in 0..self.max_frames {
            let Some(frame) = queue.read_frame() else {
                break;
            };
            self.buffer.push(frame);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use can_bus::CanFrame;
    use std::collections::VecDeque;

    #[derive(Default)]
    struct FakeQueue {
        frames: VecDeque<CanFrame>,
        reads: usize,
        lost_cleared: usize,
    }

    impl FakeQueue {
        fn with_frames(count: u32) -> Self {
            Self {
                frames: (0..count)
                    .map(|id| CanFrame::new(id, &[id as u8]).unwrap())
                    .collect(),
                ..Default::default()
            }
        }
    }

    impl RxQueue for FakeQueue {
        fn read_frame(&mut self) -> Option<CanFrame> {
            self.reads += 1;
            self.frames.pop_front()
        }

        fn clear_message_lost(&mut self) {
            self.lost_cleared += 1;
        }
    }

    fn ingest(capacity: usize, max_frames: usize) -> (FrameIngest, Arc<CaptureBuffer>) {
        let buffer = Arc::new(CaptureBuffer::new(capacity).unwrap());
        (FrameIngest::new(Arc::clone(&buffer), max_frames), buffer)
    }

    #[test]
    fn test_drains_until_empty() {
        let (ingest, buffer) = ingest(16, 32);
        let mut queue = FakeQueue::with_frames(3);

        ingest.on_receive(&mut queue, RxEvents::NEW_MESSAGE);
        assert_eq!(buffer.len(), 3);
        // three frames plus the read that reported empty
        assert_eq!(queue.reads, 4);
        assert_eq!(buffer.pop().unwrap().identifier(), 0);
    }

    #[test]
    fn test_read_bound_per_invocation() {
        let (ingest, buffer) = ingest(64, 32);
        let mut queue = FakeQueue::with_frames(40);

        ingest.on_receive(&mut queue, RxEvents::NEW_MESSAGE);
        assert_eq!(buffer.len(), 32);
        assert_eq!(queue.frames.len(), 8);

        ingest.on_receive(&mut queue, RxEvents::NEW_MESSAGE);
        assert_eq!(buffer.len(), 40);
        assert!(queue.frames.is_empty());
    }

    #[test]
    fn test_hardware_overflow_latched_and_cleared() {
        let (ingest, buffer) = ingest(16, 32);
        let mut queue = FakeQueue::with_frames(1);

        ingest.on_receive(&mut queue, RxEvents::NEW_MESSAGE | RxEvents::MESSAGE_LOST);
        assert_eq!(queue.lost_cleared, 1);
        assert!(buffer.has_hardware_overflow());
        assert!(!buffer.has_software_overflow());
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn test_full_buffer_drops_and_flags() {
        let (ingest, buffer) = ingest(4, 32);
        let mut queue = FakeQueue::with_frames(6);

        ingest.on_receive(&mut queue, RxEvents::NEW_MESSAGE);
        // hardware queue is drained even though three frames are lost
        assert!(queue.frames.is_empty());
        assert_eq!(buffer.len(), 3);
        assert!(buffer.has_software_overflow());
        assert!(!buffer.has_hardware_overflow());

        let kept: Vec<u32> = std::iter::from_fn(|| buffer.pop())
            .map(|f| f.identifier())
            .collect();
        assert_eq!(kept, vec![0, 1, 2]);
    }
}
