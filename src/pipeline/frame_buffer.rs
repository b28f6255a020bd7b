// src/pipeline/frame_buffer.rs
//
// Rolling window of the most recent raw frames. Alert clips are cut from
// a snapshot of this buffer taken at dispatch time; the buffer itself keeps
// being overwritten by the analysis loop while the clip is encoded.

use crate::history::RingBuffer;
use crate::types::SharedFrame;

pub struct RollingFrameBuffer {
    frames: RingBuffer<SharedFrame>,
}

impl RollingFrameBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            frames: RingBuffer::new(capacity),
        }
    }

    pub fn push(&mut self, frame: SharedFrame) {
        self.frames.push(frame);
    }

    /// Oldest-first copy of the current window. Frames are immutable and
    /// shared, so the snapshot stays valid after the buffer moves on.
    pub fn snapshot(&self) -> Vec<SharedFrame> {
        self.frames.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Frame;
    use std::sync::Arc;

    #[test]
    fn test_snapshot_is_isolated_from_later_pushes() {
        let mut buffer = RollingFrameBuffer::new(3);
        for i in 0..3 {
            buffer.push(Arc::new(Frame::blank(4, 4, i, 0.0)));
        }
        let snap = buffer.snapshot();
        buffer.push(Arc::new(Frame::blank(4, 4, 3, 0.0)));
        buffer.push(Arc::new(Frame::blank(4, 4, 4, 0.0)));

        let indices: Vec<u64> = snap.iter().map(|f| f.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        let live: Vec<u64> = buffer.snapshot().iter().map(|f| f.index).collect();
        assert_eq!(live, vec![2, 3, 4]);
    }
}
