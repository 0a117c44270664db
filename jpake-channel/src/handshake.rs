use zeroize::Zeroizing;

use crate::application::CryptoLayer;
use crate::cipher::SessionCipher;
use crate::crypto::*;
use crate::proto::*;
use crate::result::HandshakeError;
use crate::transcript::Transcript;

/// Which message the engine is waiting for or about to produce.
///
/// Client: `SendRound1 -> AwaitRound1 -> AwaitRound2 -> SendRound2 -> SendConfirm -> AwaitConfirm -> Done`
///
/// Server: `AwaitRound1 -> SendRound1 -> SendRound2 -> AwaitRound2 -> AwaitConfirm -> SendConfirm -> Done`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandshakeState {
    /// No engine has been initialized.
    Idle,
    AwaitRound1,
    SendRound1,
    AwaitRound2,
    SendRound2,
    AwaitConfirm,
    SendConfirm,
    Done,
    /// Terminal. Nothing is produced or accepted any more.
    Failed,
}

/// A single outbound handshake message.
pub type HandshakeMessage = RoundBuffer;

struct SessionKeys {
    session_secret: Zeroizing<[u8; JPAKE_SHARED_SECRET_SIZE]>,
    confirmation_key: Zeroizing<[u8; SHA256_HASH_SIZE]>,
}

/// The EC-JPAKE handshake engine: two key exchange rounds followed by mutual key confirmation.
///
/// Every round sent or received is appended to a running transcript, and each confirmation MAC
/// binds that transcript as it stood before the confirmation itself was appended. The engine
/// only sequences messages; moving them to and from the peer is up to the caller.
pub struct Handshake<C: CryptoLayer> {
    role: JpakeRole,
    state: HandshakeState,
    jpake: C::Jpake,
    transcript: Transcript<C::Hash>,
    keys: Option<SessionKeys>,
}

impl<C: CryptoLayer> Handshake<C> {
    /// Create an engine for `role` keyed by the low-entropy `shared_secret`.
    pub fn initialize(role: JpakeRole, shared_secret: &[u8]) -> Result<Self, HandshakeError> {
        let jpake = C::Jpake::new(role, shared_secret).ok_or(HandshakeError::InvalidSecret)?;
        let state = match role {
            JpakeRole::Client => HandshakeState::SendRound1,
            JpakeRole::Server => HandshakeState::AwaitRound1,
        };
        Ok(Self { role, state, jpake, transcript: Transcript::new(), keys: None })
    }

    pub fn role(&self) -> JpakeRole {
        self.role
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    pub fn is_done(&self) -> bool {
        self.state == HandshakeState::Done
    }

    /// The derived session secret, available once both key exchange rounds have been processed.
    pub fn session_secret(&self) -> Option<&[u8; JPAKE_SHARED_SECRET_SIZE]> {
        self.keys.as_ref().map(|k| &*k.session_secret)
    }

    /// Produce the next message to send, if this side is in a send state.
    ///
    /// Returns `Ok(None)` while waiting on the peer or once finished.
    pub fn produce_outbound(&mut self, rng: &mut C::Rng) -> Result<Option<HandshakeMessage>, HandshakeError> {
        use HandshakeState::*;
        let mut out = HandshakeMessage::new();
        match (self.role, self.state) {
            (_, Failed) => return Err(HandshakeError::Failed),
            (role, SendRound1) => {
                self.jpake.write_round_one(rng, &mut out);
                self.transcript.update(&out);
                self.state = match role {
                    JpakeRole::Client => AwaitRound1,
                    JpakeRole::Server => SendRound2,
                };
            }
            (role, SendRound2) => {
                if !self.jpake.write_round_two(rng, &mut out) {
                    return Err(self.fail(HandshakeError::OutOfSequence));
                }
                self.transcript.update(&out);
                self.state = match role {
                    JpakeRole::Client => SendConfirm,
                    JpakeRole::Server => AwaitRound2,
                };
            }
            (JpakeRole::Client, SendConfirm) => {
                self.derive_keys()?;
                let mac = self.confirmation_mac()?;
                out.extend(mac);
                self.transcript.update(&out);
                self.state = AwaitConfirm;
            }
            (JpakeRole::Server, SendConfirm) => {
                // The transcript already contains the client's confirmation.
                let mac = self.confirmation_mac()?;
                out.extend(mac);
                self.state = Done;
            }
            _ => return Ok(None),
        }
        Ok(Some(out))
    }

    /// Consume a message received from the peer.
    ///
    /// Fails with `OutOfSequence` and leaves the state untouched if no message is expected.
    /// Any other failure is terminal.
    pub fn consume_inbound(&mut self, message: &[u8]) -> Result<(), HandshakeError> {
        use HandshakeState::*;
        match (self.role, self.state) {
            (_, Failed) => return Err(HandshakeError::Failed),
            (role, AwaitRound1) => {
                if !self.jpake.read_round_one(message) {
                    return Err(self.fail(HandshakeError::MalformedRound));
                }
                self.transcript.update(message);
                self.state = match role {
                    JpakeRole::Client => AwaitRound2,
                    JpakeRole::Server => SendRound1,
                };
            }
            (role, AwaitRound2) => {
                if !self.jpake.read_round_two(message) {
                    return Err(self.fail(HandshakeError::MalformedRound));
                }
                self.transcript.update(message);
                self.state = match role {
                    JpakeRole::Client => SendRound2,
                    JpakeRole::Server => AwaitConfirm,
                };
            }
            (JpakeRole::Server, AwaitConfirm) => {
                self.derive_keys()?;
                self.verify_confirmation(message)?;
                self.transcript.update(message);
                self.state = SendConfirm;
            }
            (JpakeRole::Client, AwaitConfirm) => {
                self.verify_confirmation(message)?;
                self.state = Done;
            }
            _ => return Err(HandshakeError::OutOfSequence),
        }
        Ok(())
    }

    /// Build the session cipher from the derived secret. Only succeeds once, after `Done`.
    ///
    /// The engine's copy of the key material is erased.
    pub fn take_session_cipher(&mut self) -> Option<SessionCipher<C>> {
        if !self.is_done() {
            return None;
        }
        let keys = self.keys.take()?;
        SessionCipher::new(self.role, &*keys.session_secret).ok()
    }

    fn fail(&mut self, error: HandshakeError) -> HandshakeError {
        self.state = HandshakeState::Failed;
        self.keys = None;
        error
    }

    fn derive_keys(&mut self) -> Result<(), HandshakeError> {
        let Some(session_secret) = self.jpake.derive_secret() else {
            return Err(self.fail(HandshakeError::OutOfSequence));
        };
        let mut hash = C::Hash::new();
        hash.update(&*session_secret);
        hash.update(KEY_CONFIRMATION_LABEL);
        let confirmation_key = Zeroizing::new(hash.finish());
        self.keys = Some(SessionKeys { session_secret, confirmation_key });
        Ok(())
    }

    /// `HMAC(confirmation_key, "KC_1_U" || "client" || "server" || transcript)` over the current
    /// transcript snapshot.
    fn confirmation_mac(&mut self) -> Result<[u8; KEY_CONFIRMATION_MAC_SIZE], HandshakeError> {
        let Some(keys) = self.keys.as_ref() else {
            return Err(self.fail(HandshakeError::OutOfSequence));
        };
        let mut hmac = C::Hmac::new(&*keys.confirmation_key);
        hmac.update(KEY_CONFIRMATION_MAC_LABEL);
        hmac.update(CLIENT_ID);
        hmac.update(SERVER_ID);
        hmac.update(&self.transcript.snapshot());
        Ok(hmac.finish())
    }

    fn verify_confirmation(&mut self, message: &[u8]) -> Result<(), HandshakeError> {
        let expected = self.confirmation_mac()?;
        if secure_eq(&expected, message) {
            Ok(())
        } else {
            Err(self.fail(HandshakeError::ConfirmationMismatch))
        }
    }
}
