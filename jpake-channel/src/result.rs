use thiserror::Error;

use crate::proto::RequestKind;

/// An error that stops the key exchange.
///
/// Every variant except `OutOfSequence` leaves the engine in the terminal `Failed` state, after
/// which the session has to be rebuilt from scratch.
#[derive(Error, Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum HandshakeError {
    /// A handshake message arrived, or was requested, while the engine was in a state that does
    /// not accept it. The engine state is left unchanged.
    #[error("handshake message out of sequence")]
    OutOfSequence,

    /// The peer's key exchange round could not be parsed or one of its proofs did not verify.
    #[error("malformed key exchange round")]
    MalformedRound,

    /// The peer's key confirmation MAC did not match. Either the passwords differ or the
    /// exchange was tampered with.
    #[error("key confirmation mismatch")]
    ConfirmationMismatch,

    /// The shared secret was empty or reduced to zero.
    #[error("unusable shared secret")]
    InvalidSecret,

    /// The engine already failed and refuses to do anything else.
    #[error("handshake failed")]
    Failed,
}

/// A fault in the session cipher.
#[derive(Error, Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum CipherError {
    /// The authentication tag did not match. The session must be torn down.
    #[error("authentication tag mismatch")]
    AuthFailure,

    /// A direction counter ran out of fresh values. Continuing would reuse a nonce.
    #[error("nonce counter exhausted")]
    NonceExhausted,

    /// The AEAD refused to seal the data, which only happens if it is longer than the nonce size
    /// allows. Bodies are capped by `MAX_BODY_SIZE` well below that limit.
    #[error("data too long to seal")]
    SealFailed,
}

/// A frame could not be built or parsed.
///
/// Inbound framing errors are caused by whatever is on the other end of the transport, so they
/// are logged and dropped rather than treated as fatal.
#[derive(Error, Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum FrameError {
    /// The frame is shorter than its fixed headers and trailer.
    #[error("frame truncated")]
    Truncated,

    /// The length declared in the message header disagrees with the size of the frame.
    #[error("declared length does not match frame size")]
    LengthMismatch,

    /// The body does not fit in the 16-bit length field.
    #[error("body too large for a single frame")]
    BodyTooLarge,

    #[error(transparent)]
    Cipher(#[from] CipherError),
}

/// A reply body could not be turned into a payload by the message codec.
#[derive(Error, Debug, PartialEq, Eq, Clone)]
#[error("could not decode payload: {0}")]
pub struct DecodeError(pub String);

/// The reason a request failed. Delivered to the completion of that request only.
#[derive(Error, Debug, PartialEq, Eq, Clone)]
pub enum RequestError {
    /// A request of the same kind is still waiting for its reply. Nothing was sent.
    #[error("a request of this kind is already in progress")]
    AlreadyInProgress,

    /// The session is not connected.
    #[error("session not connected")]
    NotConnected,

    /// The device answered with a non-zero result code.
    #[error("{kind:?} rejected by device with result {result}")]
    Rejected { kind: RequestKind, result: i32 },

    /// The reply body could not be decoded.
    #[error("{kind:?} reply could not be decoded: {error}")]
    BadReply { kind: RequestKind, error: DecodeError },

    /// The session ended before a reply arrived.
    #[error("session closed")]
    SessionClosed,

    /// The transport refused the frame. The session was torn down, since the peer can no longer
    /// be assumed to agree on the nonce counters.
    #[error("transport send failed")]
    SendFailed,

    /// Only the client side of a session issues requests.
    #[error("requests can only be issued by the client")]
    NotClient,

    #[error(transparent)]
    Frame(#[from] FrameError),
}

/// An error returned by the session level operations of `Channel`.
#[derive(Error, Debug, PartialEq, Eq, Clone)]
pub enum ChannelError {
    /// Security is enabled but `start_handshake` was never called.
    #[error("no shared secret configured")]
    NoCredentials,

    /// The operation is not valid in the current protocol state.
    #[error("operation invalid in the current protocol state")]
    InvalidState,

    #[error(transparent)]
    Handshake(#[from] HandshakeError),

    /// A frame failed authentication and the session was torn down.
    #[error("authentication failure, session torn down")]
    AuthFailure,

    /// The transport refused a frame.
    #[error("transport send failed")]
    SendFailed,
}
