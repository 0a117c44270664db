use crate::channel::ProtocolState;
use crate::crypto::JpakeRole;
use crate::handshake::HandshakeState;
use crate::proto::RequestKind;
use crate::result::{FrameError, HandshakeError};

/// Channel events that might be interesting to log or aggregate into metrics.
///
/// Events never carry key material or decrypted bodies.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogEvent {
    StatusChanged(ProtocolState),
    StartedHandshake(JpakeRole),
    /// `(state that produced the message, message length)`
    SentHandshake(HandshakeState, usize),
    /// `(state that consumed the message, message length)`
    ReceivedHandshake(HandshakeState, usize),
    /// A handshake message arrived while none was expected. It is dropped.
    /// `(current state, message length)`
    UnexpectedHandshake(HandshakeState, usize),
    HandshakeComplete,
    HandshakeFailed(HandshakeError),
    /// `(request id, request kind, body length)`
    SentRequest(u16, RequestKind, usize),
    /// `(request id, result code, body length)`
    ReceivedReply(u16, i32, usize),
    /// A reply whose request id matches nothing pending. The reply is dropped.
    UnmatchedReply(u16),
    /// `(request id, request kind, body length)`
    ReceivedRequest(u16, RequestKind, usize),
    /// `(request id, result code, body length)`
    SentReply(u16, i32, usize),
    DroppedFrame(FrameError),
    /// Bytes arrived while no session was active.
    DroppedBytes(usize),
    AuthFailure,
    /// `(number of pending requests swept with SessionClosed)`
    SessionTornDown(usize),
}

/// Where a channel delivers its `LogEvent`s.
#[derive(Default)]
pub(crate) struct EventSink(Option<Box<dyn FnMut(&LogEvent)>>);

#[cfg_attr(not(feature = "logging"), allow(dead_code))]
impl EventSink {
    pub(crate) fn set(&mut self, sink: Box<dyn FnMut(&LogEvent)>) {
        self.0 = Some(sink);
    }

    pub(crate) fn event_log(&mut self, event: LogEvent) {
        if let Some(sink) = self.0.as_mut() {
            sink(&event);
        }
    }
}

/// Macro to turn off logging at compile time.
macro_rules! log {
    ($sink:expr, $event:expr) => {
        #[cfg(feature = "logging")]
        $sink.event_log($event);
    };
}
pub(crate) use log;
