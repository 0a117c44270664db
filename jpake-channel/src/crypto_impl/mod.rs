/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 *
 * (c) ZeroTier, Inc.
 * https://www.zerotier.com/
 */
#[cfg(all(feature = "p256", feature = "sha2"))]
mod ecjpake_p256;
#[cfg(all(feature = "p256", feature = "sha2"))]
pub use ecjpake_p256::*;
#[cfg(feature = "p256")]
pub use p256;

#[cfg(feature = "sha2")]
mod sha256;
#[cfg(feature = "sha2")]
pub use hmac;
#[cfg(feature = "sha2")]
pub use sha2;
#[cfg(feature = "sha2")]
pub use sha256::*;

#[cfg(feature = "aes-ccm")]
mod aes_ccm;
#[cfg(feature = "aes-ccm")]
pub use aes;
#[cfg(feature = "aes-ccm")]
pub use aes_ccm::*;
#[cfg(feature = "aes-ccm")]
pub use ccm;

/// The crypto layer built entirely from the crates this library depends on by default.
#[cfg(feature = "default-crypto")]
pub struct DefaultCrypto;
#[cfg(feature = "default-crypto")]
impl crate::application::CryptoLayer for DefaultCrypto {
    type Rng = rand_core::OsRng;
    type Jpake = CrateEcJpakeP256;
    type Ccm = CrateAesCcm;
    type Hash = CrateSha256;
    type Hmac = CrateHmacSha256;
}
