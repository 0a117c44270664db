use arrayvec::ArrayVec;

use crate::framer::{expected_frame_size, FramePhase};
use crate::proto::MESSAGE_HEADER_SIZE;

/// Stream reassembler.
///
/// Inbound bytes arrive in chunks of whatever size the transport likes. Frames are rebuilt
/// from them one at a time, using the message header at the start of each frame to learn how
/// many bytes to wait for.
pub struct Reassembler {
    header: ArrayVec<u8, MESSAGE_HEADER_SIZE>,
    expected: usize,
    frame: Vec<u8>,
}

impl Reassembler {
    pub fn new() -> Self {
        Self { header: ArrayVec::new(), expected: 0, frame: Vec::new() }
    }

    /// Whether part of a frame has been received.
    pub fn is_receiving(&self) -> bool {
        !self.header.is_empty()
    }

    /// Drops any partial frame.
    pub fn reset(&mut self) {
        self.header.clear();
        self.expected = 0;
        self.frame = Vec::new();
    }

    /// Feed the start of `chunk` into the current frame.
    ///
    /// Returns how many bytes of `chunk` were consumed, and the assembled frame if it is now
    /// complete. Bytes after a frame boundary are not consumed, so the caller must keep calling
    /// with the remainder until all of it has been taken. `phase` is only read at the start of
    /// a frame. At least one byte is consumed from any non-empty chunk.
    pub fn receive(&mut self, chunk: &[u8], phase: FramePhase) -> (usize, Option<Vec<u8>>) {
        let mut consumed = 0;
        if self.header.len() < MESSAGE_HEADER_SIZE {
            let take = (MESSAGE_HEADER_SIZE - self.header.len()).min(chunk.len());
            self.header.extend(chunk[..take].iter().copied());
            consumed = take;
            if self.header.len() < MESSAGE_HEADER_SIZE {
                return (consumed, None);
            }
            let header = [self.header[0], self.header[1]];
            self.expected = expected_frame_size(header, phase);
            self.frame = Vec::with_capacity(self.expected);
            self.frame.extend_from_slice(&header);
        }

        let take = (self.expected - self.frame.len()).min(chunk.len() - consumed);
        self.frame.extend_from_slice(&chunk[consumed..consumed + take]);
        consumed += take;

        if self.frame.len() == self.expected {
            let frame = std::mem::take(&mut self.frame);
            self.reset();
            (consumed, Some(frame))
        } else {
            (consumed, None)
        }
    }
}

impl Default for Reassembler {
    fn default() -> Self {
        Self::new()
    }
}
