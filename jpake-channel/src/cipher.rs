use zeroize::{Zeroize, Zeroizing};

use crate::application::CryptoLayer;
use crate::crypto::*;
use crate::proto::*;
use crate::result::{CipherError, HandshakeError};

/// Authenticated encryption for one established session.
///
/// The session secret is split into an AES-128-CCM key and one nonce salt per direction. Each
/// nonce is the 4 byte big-endian direction counter followed by that direction's 8 byte salt.
/// The counters are incremented before every use and never repeat within a session; the reply
/// counter always has its top bit set so it can never collide with the request counter.
///
/// A client seals requests and opens replies, a server does the mirror image.
pub struct SessionCipher<C: CryptoLayer> {
    role: JpakeRole,
    ccm: C::Ccm,
    request_salt: Zeroizing<[u8; AES_CCM_FIXED_NONCE_SIZE]>,
    reply_salt: Zeroizing<[u8; AES_CCM_FIXED_NONCE_SIZE]>,
    request_counter: u32,
    reply_counter: u32,
}

impl<C: CryptoLayer> SessionCipher<C> {
    /// Derive a cipher from at least 32 bytes of session secret.
    pub fn new(role: JpakeRole, session_secret: &[u8]) -> Result<Self, HandshakeError> {
        if session_secret.len() < MIN_SESSION_SECRET_SIZE {
            return Err(HandshakeError::InvalidSecret);
        }
        let mut key = Zeroizing::new([0u8; AES_CCM_KEY_SIZE]);
        key.copy_from_slice(&session_secret[CIPHER_KEY_START..REQUEST_SALT_START]);
        let mut request_salt = Zeroizing::new([0u8; AES_CCM_FIXED_NONCE_SIZE]);
        request_salt.copy_from_slice(&session_secret[REQUEST_SALT_START..REPLY_SALT_START]);
        let mut reply_salt = Zeroizing::new([0u8; AES_CCM_FIXED_NONCE_SIZE]);
        reply_salt.copy_from_slice(&session_secret[REPLY_SALT_START..MIN_SESSION_SECRET_SIZE]);
        Ok(Self {
            role,
            ccm: C::Ccm::new(&key),
            request_salt,
            reply_salt,
            request_counter: 0,
            reply_counter: 0,
        })
    }

    pub fn role(&self) -> JpakeRole {
        self.role
    }

    /// Next nonce of the request direction.
    ///
    /// Returns `None` once the request counter would reach the reply direction's half of the
    /// counter space.
    pub fn gen_request_nonce(&mut self) -> Option<[u8; AES_CCM_NONCE_SIZE]> {
        let counter = self.request_counter.checked_add(1).filter(|c| c & REPLY_COUNTER_FLAG == 0)?;
        self.request_counter = counter;
        Some(nonce(counter, &self.request_salt))
    }

    /// Next nonce of the reply direction. The counter is transmitted with its top bit set.
    pub fn gen_reply_nonce(&mut self) -> Option<[u8; AES_CCM_NONCE_SIZE]> {
        let counter = self.reply_counter.checked_add(1).filter(|c| c & REPLY_COUNTER_FLAG == 0)?;
        self.reply_counter = counter;
        Some(nonce(counter | REPLY_COUNTER_FLAG, &self.reply_salt))
    }

    /// Encrypt `data` in place and return its tag.
    pub fn seal(&mut self, data: &mut [u8], aad: &[u8]) -> Result<[u8; AES_CCM_TAG_SIZE], CipherError> {
        let nonce = match self.role {
            JpakeRole::Client => self.gen_request_nonce(),
            JpakeRole::Server => self.gen_reply_nonce(),
        }
        .ok_or(CipherError::NonceExhausted)?;
        self.ccm.encrypt_in_place(&nonce, aad, data).ok_or(CipherError::SealFailed)
    }

    /// Decrypt `data` in place, failing if `tag` does not authenticate it together with `aad`.
    ///
    /// The direction counter advances even when authentication fails.
    pub fn open(&mut self, data: &mut [u8], aad: &[u8], tag: &[u8; AES_CCM_TAG_SIZE]) -> Result<(), CipherError> {
        let nonce = match self.role {
            JpakeRole::Client => self.gen_reply_nonce(),
            JpakeRole::Server => self.gen_request_nonce(),
        }
        .ok_or(CipherError::NonceExhausted)?;
        if self.ccm.decrypt_in_place(&nonce, aad, data, tag) {
            Ok(())
        } else {
            data.zeroize();
            Err(CipherError::AuthFailure)
        }
    }
}

fn nonce(counter: u32, salt: &[u8; AES_CCM_FIXED_NONCE_SIZE]) -> [u8; AES_CCM_NONCE_SIZE] {
    let mut nonce = [0u8; AES_CCM_NONCE_SIZE];
    nonce[..AES_CCM_COUNTER_SIZE].copy_from_slice(&counter.to_be_bytes());
    nonce[AES_CCM_COUNTER_SIZE..].copy_from_slice(salt);
    nonce
}
