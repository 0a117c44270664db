use arrayvec::ArrayVec;
use rand_core::{CryptoRng, RngCore};
use zeroize::Zeroizing;

/// Size in bytes of the secret produced by a completed EC-JPAKE exchange.
pub const JPAKE_SHARED_SECRET_SIZE: usize = 32;
/// Upper bound on the size of any single key exchange round written by an `EcJpake`
/// implementation.
pub const MAX_HANDSHAKE_PAYLOAD_SIZE: usize = 512;

/// A buffer holding one serialized key exchange round.
pub type RoundBuffer = ArrayVec<u8, MAX_HANDSHAKE_PAYLOAD_SIZE>;

/// Which side of the exchange an `EcJpake` context plays.
///
/// The two sides use different identities inside their zero knowledge proofs, and only the
/// server prefixes its second round with the curve parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JpakeRole {
    Client,
    Server,
}

/// An EC-JPAKE key exchange over NIST P-256 with SHA-256, using the TLS wire encoding
/// (length-prefixed uncompressed points and Schnorr proofs).
///
/// The key exchange consists of two rounds in each direction. Round one may be written and read
/// in any order; round two may only be written or read once both round one messages have been
/// processed. The engine driving this trait is responsible for sequencing.
///
/// Instances must securely delete their private scalars and the password when dropped.
pub trait EcJpake<Rng: RngCore + CryptoRng>: Sized {
    /// Create a new context for `role` using the low-entropy shared `password`.
    ///
    /// Returns `None` if the password is empty or otherwise unusable.
    fn new(role: JpakeRole, password: &[u8]) -> Option<Self>;

    /// Generate this side's round one ephemeral keys and serialize them with their proofs.
    fn write_round_one(&mut self, rng: &mut Rng, out: &mut RoundBuffer);

    /// Parse and verify the peer's round one.
    /// Must return `false` if the message is malformed or any proof fails to verify.
    #[must_use]
    fn read_round_one(&mut self, data: &[u8]) -> bool;

    /// Serialize this side's round two.
    /// Must return `false` if called before both round one messages have been processed.
    #[must_use]
    fn write_round_two(&mut self, rng: &mut Rng, out: &mut RoundBuffer) -> bool;

    /// Parse and verify the peer's round two.
    /// Must return `false` if the message is malformed or its proof fails to verify.
    #[must_use]
    fn read_round_two(&mut self, data: &[u8]) -> bool;

    /// Compute the premaster secret once both rounds have been exchanged in both directions.
    fn derive_secret(&self) -> Option<Zeroizing<[u8; JPAKE_SHARED_SECRET_SIZE]>>;
}
