use crate::crypto::*;

/// Running SHA-256 over every handshake message, in the order this side produced or consumed
/// them.
pub struct Transcript<H: Sha256Hash> {
    hash: H,
}

impl<H: Sha256Hash> Transcript<H> {
    pub fn new() -> Self {
        Self { hash: H::new() }
    }

    pub fn update(&mut self, message: &[u8]) {
        self.hash.update(message);
    }

    /// Digest of everything appended so far. The live hash keeps accumulating afterwards.
    pub fn snapshot(&self) -> [u8; SHA256_HASH_SIZE] {
        self.hash.clone().finish()
    }
}

impl<H: Sha256Hash> Default for Transcript<H> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(all(test, feature = "sha2"))]
mod test {
    use super::*;
    use crate::crypto_impl::CrateSha256;

    fn digest(data: &[u8]) -> [u8; SHA256_HASH_SIZE] {
        let mut h = <CrateSha256 as Sha256Hash>::new();
        Sha256Hash::update(&mut h, data);
        Sha256Hash::finish(h)
    }

    #[test]
    fn snapshot_does_not_finalize() {
        let mut t = Transcript::<CrateSha256>::new();
        assert_eq!(t.snapshot(), digest(b""));
        t.update(b"round one");
        let first = t.snapshot();
        assert_eq!(first, t.snapshot());
        t.update(b"round two");
        assert_eq!(first, digest(b"round one"));
        assert_eq!(t.snapshot(), digest(b"round oneround two"));
    }
}
