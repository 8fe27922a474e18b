//! Session state and lifecycle.

use std::time::{Duration, Instant};
use uuid::Uuid;

use anp_crypto::CryptoError;
use anp_crypto::aead::{self, SealedMessage, SessionKey};
use anp_crypto::{KeyPair, PublicKey};
use anp_types::did::Did;

use crate::error::E2eeError;
use crate::handshake::{
    Finished, Hello, HelloAck, PendingHandshake, check_finished, make_finished, verify_hello,
};

/// Which side of the session this peer is. Fixed at creation; also the
/// direction tag mixed into every message's AAD.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Initiator,
    Responder,
}

impl Role {
    fn peer(&self) -> Role {
        match self {
            Role::Initiator => Role::Responder,
            Role::Responder => Role::Initiator,
        }
    }

    fn direction_byte(&self) -> u8 {
        match self {
            Role::Initiator => 0x01,
            Role::Responder => 0x02,
        }
    }
}

/// Session lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum E2eeState {
    Idle,
    HandshakeInitiated,
    HandshakeCompleting,
    Active,
    Closed,
}

/// Re-key policy: whichever bound is hit first triggers a re-key.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub rekey_after_messages: u64,
    pub rekey_after: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            rekey_after_messages: 1 << 20,
            rekey_after: Duration::from_secs(3600),
        }
    }
}

/// An end-to-end encrypted session between `local` and `remote`.
pub struct E2eeSession {
    local_did: Did,
    remote_did: Did,
    role: Role,
    config: SessionConfig,
    state: E2eeState,
    session_id: String,
    pending: Option<PendingHandshake>,
    pending_key: Option<SessionKey>,
    key: Option<SessionKey>,
    sent: u64,
    received: u64,
    established_at: Option<Instant>,
    consecutive_failures: u8,
    rekey_in_flight: bool,
}

impl E2eeSession {
    /// Creates the initiating side; the session id is chosen here.
    pub fn initiator(local_did: Did, remote_did: Did, config: SessionConfig) -> Self {
        Self::new(local_did, remote_did, Role::Initiator, config, Uuid::new_v4().to_string())
    }

    /// Creates the responding side; the session id is adopted from the
    /// initiator's hello.
    pub fn responder(local_did: Did, remote_did: Did, config: SessionConfig) -> Self {
        Self::new(local_did, remote_did, Role::Responder, config, String::new())
    }

    fn new(local_did: Did, remote_did: Did, role: Role, config: SessionConfig, session_id: String) -> Self {
        Self {
            local_did,
            remote_did,
            role,
            config,
            state: E2eeState::Idle,
            session_id,
            pending: None,
            pending_key: None,
            key: None,
            sent: 0,
            received: 0,
            established_at: None,
            consecutive_failures: 0,
            rekey_in_flight: false,
        }
    }

    pub fn state(&self) -> E2eeState {
        self.state
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn local_did(&self) -> &Did {
        &self.local_did
    }

    pub fn remote_did(&self) -> &Did {
        &self.remote_did
    }

    /// Initiator step 1: produce the signed hello.
    pub fn initiate(&mut self, auth_key: &KeyPair, verification_method: &str) -> Result<Hello, E2eeError> {
        if self.role != Role::Initiator || self.state != E2eeState::Idle {
            return Err(E2eeError::InvalidState(self.state));
        }
        let pending = PendingHandshake::fresh();
        let hello = pending.hello(&self.session_id, &self.local_did, auth_key, verification_method)?;
        self.pending = Some(pending);
        self.state = E2eeState::HandshakeInitiated;
        Ok(hello)
    }

    /// Responder step 1: verify the initiator's hello, derive the key, and
    /// answer with our hello plus key confirmation.
    ///
    /// `peer_auth_key` is the initiator's authentication key, resolved by
    /// the caller through the DID layer.
    pub fn respond(
        &mut self,
        peer_hello: &Hello,
        peer_auth_key: &PublicKey,
        auth_key: &KeyPair,
        verification_method: &str,
    ) -> Result<HelloAck, E2eeError> {
        if self.role != Role::Responder || self.state != E2eeState::Idle {
            return Err(E2eeError::InvalidState(self.state));
        }
        if peer_hello.did != self.remote_did {
            return Err(E2eeError::HandshakeFailed("hello is not from the expected peer".into()));
        }
        let (peer_ephemeral, peer_nonce) = verify_hello(peer_hello, peer_auth_key)?;
        self.session_id = peer_hello.session_id.clone();
        let pending = PendingHandshake::fresh();
        let key = pending.derive(&peer_ephemeral, &peer_nonce, &pending.nonce)?;
        let hello = pending.hello(&self.session_id, &self.local_did, auth_key, verification_method)?;
        let finished = make_finished(&key, &self.aad(self.role))?;
        self.pending_key = Some(key);
        self.state = E2eeState::HandshakeCompleting;
        Ok(HelloAck { hello, finished })
    }

    /// Initiator step 2: verify the responder's ack, derive the same key,
    /// check its confirmation, and produce ours. The session is now
    /// `Active`.
    pub fn complete(&mut self, ack: &HelloAck, peer_auth_key: &PublicKey) -> Result<Finished, E2eeError> {
        if self.state != E2eeState::HandshakeInitiated {
            return Err(E2eeError::InvalidState(self.state));
        }
        if ack.hello.session_id != self.session_id || ack.hello.did != self.remote_did {
            return Err(E2eeError::HandshakeFailed("ack does not match this session".into()));
        }
        let (peer_ephemeral, peer_nonce) = verify_hello(&ack.hello, peer_auth_key)?;
        let pending = self
            .pending
            .take()
            .ok_or(E2eeError::InvalidState(self.state))?;
        let key = pending.derive(&peer_ephemeral, &pending.nonce, &peer_nonce)?;
        check_finished(&key, &ack.finished, &self.aad(self.role.peer()))?;
        let finished = make_finished(&key, &self.aad(self.role))?;
        self.install(key);
        Ok(finished)
    }

    /// Responder step 2: check the initiator's confirmation. The session is
    /// now `Active`.
    pub fn finish(&mut self, finished: &Finished) -> Result<(), E2eeError> {
        if self.state != E2eeState::HandshakeCompleting {
            return Err(E2eeError::InvalidState(self.state));
        }
        let key = self
            .pending_key
            .take()
            .ok_or(E2eeError::InvalidState(self.state))?;
        check_finished(&key, finished, &self.aad(self.role.peer()))?;
        self.install(key);
        Ok(())
    }

    /// Seals an outbound application message.
    pub fn seal_message(&mut self, plaintext: &[u8]) -> Result<SealedMessage, E2eeError> {
        let key = self.active_key()?;
        let sealed = aead::seal(key, plaintext, &self.aad(self.role))?;
        self.sent += 1;
        Ok(sealed)
    }

    /// Opens an inbound message.
    ///
    /// A failed tag check surfaces as
    /// [`E2eeError::AuthenticationFailed`]; the second consecutive failure
    /// tears the session down and the key material with it.
    pub fn open_message(&mut self, sealed: &SealedMessage) -> Result<Vec<u8>, E2eeError> {
        let key = self.active_key()?;
        match aead::open(key, sealed, &self.aad(self.role.peer())) {
            Ok(plaintext) => {
                self.consecutive_failures = 0;
                self.received += 1;
                Ok(plaintext)
            }
            Err(CryptoError::AuthenticationFailed) => {
                self.consecutive_failures += 1;
                if self.consecutive_failures >= 2 {
                    tracing::warn!(session = %self.session_id, "closing session after repeated authentication failures");
                    self.close();
                }
                Err(E2eeError::AuthenticationFailed)
            }
            Err(other) => Err(other.into()),
        }
    }

    /// Whether the re-key policy says the key has served long enough.
    pub fn needs_rekey(&self) -> bool {
        if self.state != E2eeState::Active {
            return false;
        }
        if self.sent + self.received >= self.config.rekey_after_messages {
            return true;
        }
        self.established_at
            .map(|at| at.elapsed() >= self.config.rekey_after)
            .unwrap_or(false)
    }

    /// Starts a re-key handshake over the protected channel. Either side
    /// may start one; crossing re-keys are refused.
    pub fn begin_rekey(&mut self, auth_key: &KeyPair, verification_method: &str) -> Result<Hello, E2eeError> {
        if self.state != E2eeState::Active {
            return Err(E2eeError::InvalidState(self.state));
        }
        if self.rekey_in_flight || self.pending_key.is_some() {
            return Err(E2eeError::RekeyRefused);
        }
        let pending = PendingHandshake::fresh();
        let hello = pending.hello(&self.session_id, &self.local_did, auth_key, verification_method)?;
        self.pending = Some(pending);
        self.rekey_in_flight = true;
        Ok(hello)
    }

    /// Answers a peer's re-key hello with our own plus confirmation under
    /// the new key. The old key stays active until [`Self::finish_rekey`].
    pub fn respond_rekey(
        &mut self,
        peer_hello: &Hello,
        peer_auth_key: &PublicKey,
        auth_key: &KeyPair,
        verification_method: &str,
    ) -> Result<HelloAck, E2eeError> {
        if self.state != E2eeState::Active {
            return Err(E2eeError::InvalidState(self.state));
        }
        if self.rekey_in_flight || self.pending_key.is_some() {
            return Err(E2eeError::RekeyRefused);
        }
        if peer_hello.session_id != self.session_id || peer_hello.did != self.remote_did {
            return Err(E2eeError::HandshakeFailed("re-key hello does not match this session".into()));
        }
        let (peer_ephemeral, peer_nonce) = verify_hello(peer_hello, peer_auth_key)?;
        let pending = PendingHandshake::fresh();
        // The side that began the re-key contributes the first salt half.
        let key = pending.derive(&peer_ephemeral, &peer_nonce, &pending.nonce)?;
        let hello = pending.hello(&self.session_id, &self.local_did, auth_key, verification_method)?;
        let finished = make_finished(&key, &self.aad(self.role))?;
        self.pending_key = Some(key);
        Ok(HelloAck { hello, finished })
    }

    /// Re-key initiator: verify the peer's ack, swap in the new key
    /// atomically, and confirm.
    pub fn complete_rekey(&mut self, ack: &HelloAck, peer_auth_key: &PublicKey) -> Result<Finished, E2eeError> {
        if self.state != E2eeState::Active || !self.rekey_in_flight {
            return Err(E2eeError::InvalidState(self.state));
        }
        if ack.hello.session_id != self.session_id || ack.hello.did != self.remote_did {
            return Err(E2eeError::HandshakeFailed("re-key ack does not match this session".into()));
        }
        let (peer_ephemeral, peer_nonce) = verify_hello(&ack.hello, peer_auth_key)?;
        let pending = self
            .pending
            .take()
            .ok_or(E2eeError::RekeyRefused)?;
        let key = pending.derive(&peer_ephemeral, &pending.nonce, &peer_nonce)?;
        check_finished(&key, &ack.finished, &self.aad(self.role.peer()))?;
        let finished = make_finished(&key, &self.aad(self.role))?;
        self.install(key);
        Ok(finished)
    }

    /// Re-key responder: the initiator confirmed; swap in the new key.
    pub fn finish_rekey(&mut self, finished: &Finished) -> Result<(), E2eeError> {
        if self.state != E2eeState::Active {
            return Err(E2eeError::InvalidState(self.state));
        }
        let key = self.pending_key.take().ok_or(E2eeError::RekeyRefused)?;
        check_finished(&key, finished, &self.aad(self.role.peer()))?;
        self.install(key);
        Ok(())
    }

    /// Tears the session down; the AEAD key is dropped (and zeroized) here.
    pub fn close(&mut self) {
        self.key = None;
        self.pending = None;
        self.pending_key = None;
        self.state = E2eeState::Closed;
    }

    fn install(&mut self, key: SessionKey) {
        self.key = Some(key);
        self.state = E2eeState::Active;
        self.sent = 0;
        self.received = 0;
        self.established_at = Some(Instant::now());
        self.consecutive_failures = 0;
        self.rekey_in_flight = false;
        self.pending = None;
        self.pending_key = None;
    }

    fn active_key(&self) -> Result<&SessionKey, E2eeError> {
        match self.state {
            E2eeState::Active => self.key.as_ref().ok_or(E2eeError::InvalidState(self.state)),
            E2eeState::Closed => Err(E2eeError::SessionClosed),
            state => Err(E2eeError::InvalidState(state)),
        }
    }

    /// `session_id ‖ direction` — the AAD binding every record to this
    /// session and to the direction it was sent in.
    fn aad(&self, sender: Role) -> Vec<u8> {
        let mut aad = self.session_id.as_bytes().to_vec();
        aad.push(sender.direction_byte());
        aad
    }
}
