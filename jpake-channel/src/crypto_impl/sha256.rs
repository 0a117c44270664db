use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use crate::crypto::*;

/// The version and type of the sha2 crate that the `Sha256Hash` trait is implemented for.
pub type CrateSha256 = Sha256;
impl Sha256Hash for CrateSha256 {
    fn new() -> Self {
        Digest::new()
    }

    fn update(&mut self, data: &[u8]) {
        Digest::update(self, data)
    }

    fn finish(self) -> [u8; SHA256_HASH_SIZE] {
        self.finalize().into()
    }
}

/// A HMAC-SHA-256 instance from the hmac crate.
pub struct CrateHmacSha256(Hmac<Sha256>);
impl Sha256Hmac for CrateHmacSha256 {
    fn new(key: &[u8]) -> Self {
        Self(Hmac::<Sha256>::new_from_slice(key).expect("HMAC accepts keys of any length"))
    }

    fn update(&mut self, data: &[u8]) {
        Mac::update(&mut self.0, data)
    }

    fn finish(self) -> [u8; SHA256_HASH_SIZE] {
        self.0.finalize().into_bytes().into()
    }
}
