/// The specified size of an AES-128 key.
pub const AES_CCM_KEY_SIZE: usize = 16;
/// Size of the CCM authentication field that trails every sealed frame.
pub const AES_CCM_TAG_SIZE: usize = 8;
/// Total size of a CCM nonce.
pub const AES_CCM_NONCE_SIZE: usize = 12;
/// Size of the per-direction fixed part (salt) of a CCM nonce.
pub const AES_CCM_FIXED_NONCE_SIZE: usize = 8;
/// Size of the counter part of a CCM nonce.
pub const AES_CCM_COUNTER_SIZE: usize = AES_CCM_NONCE_SIZE - AES_CCM_FIXED_NONCE_SIZE;

/// A trait for implementing AES-128 in CCM mode with an 8 byte tag and a 12 byte nonce.
/// One instance of this trait is created whenever a session secret is established, and it
/// handles all encryption and decryption of request and reply frames for that session.
///
/// Instances must securely delete their keys when dropped.
pub trait AesCcm128: Sized {
    /// Create a new instance of this trait that uses `key` for both encryption and decryption.
    fn new(key: &[u8; AES_CCM_KEY_SIZE]) -> Self;

    /// Encrypt `data` in-place, authenticating `aad` alongside it.
    /// The initial plaintext of `data` must be overwritten with its ciphertext.
    ///
    /// Returns the CCM authentication tag, or `None` if `data` is too long for the
    /// nonce size in use.
    fn encrypt_in_place(
        &self,
        nonce: &[u8; AES_CCM_NONCE_SIZE],
        aad: &[u8],
        data: &mut [u8],
    ) -> Option<[u8; AES_CCM_TAG_SIZE]>;

    /// Decrypt `data` in-place, checking that `tag` authenticates both `data` and `aad`.
    ///
    /// This function must only return `true` if the tag is correct, and the comparison must be
    /// performed in constant-time. If `false` is returned the contents of `data` are unspecified.
    #[must_use]
    fn decrypt_in_place(
        &self,
        nonce: &[u8; AES_CCM_NONCE_SIZE],
        aad: &[u8],
        data: &mut [u8],
        tag: &[u8; AES_CCM_TAG_SIZE],
    ) -> bool;
}
