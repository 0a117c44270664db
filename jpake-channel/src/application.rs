use rand_core::{CryptoRng, RngCore};

use crate::crypto::*;
use crate::proto::RequestKind;
use crate::result::DecodeError;

/// The dynamic settings of a `Channel`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// When true, the channel runs the EC-JPAKE handshake as soon as the transport connects and
    /// every request and reply is sealed with the resulting session cipher.
    ///
    /// When false, the channel is connected as soon as the transport is, and frames carry neither
    /// encryption nor a security trailer. Both peers must agree on this value.
    pub security_enabled: bool,
    /// The first request id handed out by the dispatcher. Ids increase by one per request and
    /// wrap at 2^16.
    pub first_request_id: u16,
}
impl Settings {
    /// Default value for `first_request_id`.
    /// Starting at an offset makes request ids easy to tell apart from other small integers in
    /// packet captures.
    pub const FIRST_REQUEST_ID: u16 = 32;
    /// Create an instance of Settings with all default values.
    pub const fn new() -> Self {
        Self { security_enabled: true, first_request_id: Self::FIRST_REQUEST_ID }
    }
}
impl Default for Settings {
    fn default() -> Self {
        Self::new()
    }
}

/// Trait to implement to supply the cryptographic primitives of a channel.
///
/// Templating the channel on this trait lets the protocol code be entirely independent of which
/// library provides P-256, SHA-256 or AES. `crypto_impl::DefaultCrypto` is a ready made
/// implementation using RustCrypto crates.
pub trait CryptoLayer: Sized {
    /// The random number generator used for ephemeral key exchange scalars.
    /// It must be cryptographically secure.
    type Rng: CryptoRng + RngCore;

    /// The EC-JPAKE implementation over P-256 and SHA-256.
    type Jpake: EcJpake<Self::Rng>;

    /// The implementation of AES-128-CCM with 8 byte tags that sessions should use.
    type Ccm: AesCcm128;

    /// The implementation of SHA-256 used for the handshake transcript and key derivation.
    type Hash: Sha256Hash;
    /// The implementation of HMAC-SHA-256 used for key confirmation.
    type Hmac: Sha256Hmac;
}

/// The byte pipe a channel runs over, for example a pair of BLE characteristics.
///
/// The transport owns discovery, connection policy and MTU handling. It reports connection
/// changes and inbound bytes by calling `Channel::on_transport_connected`,
/// `Channel::on_transport_disconnected` and `Channel::on_receive`.
pub trait ByteTransport {
    /// Begin connecting to the named peer. Completion is reported asynchronously.
    fn connect(&mut self, name: &str);

    /// Drop the link. `Channel::on_transport_disconnected` does not need to be called as a
    /// result of this.
    fn disconnect(&mut self);

    /// Deliver `buffer` to the peer as one logical write, in order.
    ///
    /// The buffer may be larger than the link MTU, in which case the transport must split it.
    fn send(&mut self, buffer: &[u8]) -> Result<(), std::io::Error>;
}

/// Serializes the structured payloads carried inside requests and replies.
///
/// The channel treats bodies as opaque bytes and only calls into the codec at its edges.
pub trait MessageCodec {
    /// Decoded form of a request or reply body.
    type Payload;

    /// Decode the body of a reply to a request of type `kind`.
    fn decode(&self, kind: RequestKind, body: &[u8]) -> Result<Self::Payload, DecodeError>;

    /// Encode a payload into a request body.
    fn encode(&self, payload: &Self::Payload) -> Vec<u8>;
}

/// A codec whose payloads are the raw bodies themselves.
#[derive(Debug, Default, Clone, Copy)]
pub struct RawCodec;

impl MessageCodec for RawCodec {
    type Payload = Vec<u8>;

    fn decode(&self, _: RequestKind, body: &[u8]) -> Result<Vec<u8>, DecodeError> {
        Ok(body.to_vec())
    }

    fn encode(&self, payload: &Vec<u8>) -> Vec<u8> {
        payload.clone()
    }
}

/// The outcome of a request, as produced by a device side request handler: a result code
/// (zero for success) and the reply body.
pub type HandlerReply = (i32, Vec<u8>);
