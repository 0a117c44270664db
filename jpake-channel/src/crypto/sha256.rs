/// The size of a SHA256 hash, which is always 32 bytes
pub const SHA256_HASH_SIZE: usize = 32;

/// A SHA-256 implementation.
///
/// The handshake transcript needs to read the digest of everything absorbed so far without
/// disturbing the running state, so implementations must be cheap to clone.
/// Does not need to be threadsafe.
pub trait Sha256Hash: Clone {
    /// Create a new instance of SHA-256 for streaming data to.
    fn new() -> Self;
    /// Update the instance of SHA-256 with input `data`.
    /// This must update the state of SHA-256 as if `data` was appended to the previous input.
    fn update(&mut self, data: &[u8]);
    /// Finish streaming input and output the final hash.
    fn finish(self) -> [u8; SHA256_HASH_SIZE];
}

/// A HMAC-SHA-256 implementation.
/// Does not need to be threadsafe.
pub trait Sha256Hmac {
    /// Start a new HMAC computation keyed with `key`. Keys of any length must be accepted.
    fn new(key: &[u8]) -> Self;
    /// Append `data` to the authenticated input.
    fn update(&mut self, data: &[u8]);
    /// Finish streaming input and output the MAC.
    fn finish(self) -> [u8; SHA256_HASH_SIZE];
}
