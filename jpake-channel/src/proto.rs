use crate::crypto::*;

/* Framing constants */
/*
Handshake frame (while authorizing):
    [0..2]   payload length (LE)
    [2..]    raw key exchange round or confirmation MAC

Request frame (once connected):
    [0..2]   body length (LE), also the AAD
-- start AES-CCM encrypted block --
    [2..4]   request id (LE)
    [4..6]   request type (LE)
    [6..8]   reserved zero
    [8..]    body
-- end AES-CCM encrypted block --
    [..+8]   tag

Reply frame: as above, but bytes [4..8] carry the 32-bit result code (LE).
*/
pub const MESSAGE_HEADER_SIZE: usize = 2;
pub const REQUEST_HEADER_SIZE: usize = 6;
pub const REPLY_HEADER_SIZE: usize = 6;
/// Bytes appended to every frame once the session cipher is active.
pub const SECURITY_TRAILER_SIZE: usize = AES_CCM_TAG_SIZE;
/// Largest body that can be described by the 16-bit length field.
pub const MAX_BODY_SIZE: usize = u16::MAX as usize;

/* Request types */

pub const ECHO_REQUEST_TYPE: u16 = 1;
pub const JOIN_KNOWN_NETWORK_TYPE: u16 = 500;
pub const CLEAR_KNOWN_NETWORKS_TYPE: u16 = 504;
pub const GET_CURRENT_NETWORK_TYPE: u16 = 505;
pub const SCAN_NETWORKS_TYPE: u16 = 506;

/// Result code of a successful reply.
pub const RESULT_OK: i32 = 0;
/// Result code sent back by a device when it has no handler for a request type.
pub const RESULT_NOT_SUPPORTED: i32 = -120;

/* Key confirmation constants */

pub(crate) const KEY_CONFIRMATION_LABEL: &[u8] = b"JPAKE_KC";
pub(crate) const KEY_CONFIRMATION_MAC_LABEL: &[u8] = b"KC_1_U";
pub(crate) const CLIENT_ID: &[u8] = b"client";
pub(crate) const SERVER_ID: &[u8] = b"server";
pub(crate) const KEY_CONFIRMATION_MAC_SIZE: usize = SHA256_HASH_SIZE;

/* Session cipher constants */

pub(crate) const CIPHER_KEY_START: usize = 0;
pub(crate) const REQUEST_SALT_START: usize = CIPHER_KEY_START + AES_CCM_KEY_SIZE;
pub(crate) const REPLY_SALT_START: usize = REQUEST_SALT_START + AES_CCM_FIXED_NONCE_SIZE;
pub(crate) const MIN_SESSION_SECRET_SIZE: usize = REPLY_SALT_START + AES_CCM_FIXED_NONCE_SIZE;
/// Set on every reply direction counter so the two directions never share a nonce.
pub(crate) const REPLY_COUNTER_FLAG: u32 = 0x8000_0000;

/// The logical operation a request performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    Echo,
    JoinKnownNetwork,
    ClearKnownNetworks,
    GetCurrentNetwork,
    ScanNetworks,
    /// Any request type this crate does not name.
    Other(u16),
}

impl RequestKind {
    /// The type code carried in the request header.
    pub const fn code(self) -> u16 {
        match self {
            Self::Echo => ECHO_REQUEST_TYPE,
            Self::JoinKnownNetwork => JOIN_KNOWN_NETWORK_TYPE,
            Self::ClearKnownNetworks => CLEAR_KNOWN_NETWORKS_TYPE,
            Self::GetCurrentNetwork => GET_CURRENT_NETWORK_TYPE,
            Self::ScanNetworks => SCAN_NETWORKS_TYPE,
            Self::Other(code) => code,
        }
    }
}

impl From<u16> for RequestKind {
    fn from(code: u16) -> Self {
        match code {
            ECHO_REQUEST_TYPE => Self::Echo,
            JOIN_KNOWN_NETWORK_TYPE => Self::JoinKnownNetwork,
            CLEAR_KNOWN_NETWORKS_TYPE => Self::ClearKnownNetworks,
            GET_CURRENT_NETWORK_TYPE => Self::GetCurrentNetwork,
            SCAN_NETWORKS_TYPE => Self::ScanNetworks,
            code => Self::Other(code),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn request_kind_codes() {
        for code in [1u16, 500, 504, 505, 506, 7, 0xffff] {
            assert_eq!(RequestKind::from(code).code(), code);
        }
        assert_eq!(RequestKind::from(506), RequestKind::ScanNetworks);
        assert_eq!(RequestKind::from(7), RequestKind::Other(7));
    }

    #[test]
    fn cipher_layout_covers_session_secret() {
        assert_eq!(MIN_SESSION_SECRET_SIZE, JPAKE_SHARED_SECRET_SIZE);
    }
}
