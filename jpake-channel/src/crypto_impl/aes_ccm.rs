use aes::Aes128;
use ccm::aead::generic_array::GenericArray;
use ccm::aead::{AeadInPlace, KeyInit};
use ccm::consts::{U12, U8};
use ccm::Ccm;

use crate::crypto::*;

type Aes128Ccm = Ccm<Aes128, U8, U12>;

/// AES-128-CCM from the RustCrypto ccm crate, with an 8 byte tag and 12 byte nonce.
/// The key schedule is zeroized on drop by the aes crate.
pub struct CrateAesCcm(Aes128Ccm);

impl AesCcm128 for CrateAesCcm {
    fn new(key: &[u8; AES_CCM_KEY_SIZE]) -> Self {
        Self(Aes128Ccm::new(GenericArray::from_slice(key)))
    }

    fn encrypt_in_place(
        &self,
        nonce: &[u8; AES_CCM_NONCE_SIZE],
        aad: &[u8],
        data: &mut [u8],
    ) -> Option<[u8; AES_CCM_TAG_SIZE]> {
        let tag = self
            .0
            .encrypt_in_place_detached(GenericArray::from_slice(nonce), aad, data)
            .ok()?;
        let mut ret = [0u8; AES_CCM_TAG_SIZE];
        ret.copy_from_slice(&tag);
        Some(ret)
    }

    fn decrypt_in_place(
        &self,
        nonce: &[u8; AES_CCM_NONCE_SIZE],
        aad: &[u8],
        data: &mut [u8],
        tag: &[u8; AES_CCM_TAG_SIZE],
    ) -> bool {
        self.0
            .decrypt_in_place_detached(GenericArray::from_slice(nonce), aad, data, GenericArray::from_slice(tag))
            .is_ok()
    }
}
