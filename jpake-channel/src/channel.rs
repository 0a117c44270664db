use std::rc::Rc;

use zeroize::Zeroizing;

use crate::application::*;
use crate::cipher::SessionCipher;
use crate::crypto::JpakeRole;
use crate::dispatcher::{Completion, Dispatcher};
use crate::framer::{self, FramePhase};
use crate::handshake::{Handshake, HandshakeState};
use crate::log_event::{log, EventSink};
use crate::proto::*;
use crate::reassembly::Reassembler;
use crate::result::{ChannelError, CipherError, DecodeError, FrameError, HandshakeError, RequestError};
#[cfg(feature = "logging")]
use crate::LogEvent::{self, *};

/// The coarse state of a channel, as reported to status subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolState {
    Disconnected,
    Authorizing,
    Connected,
}

/// Handle returned by `Channel::subscribe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type StatusCallback = Box<dyn FnMut(ProtocolState)>;
type RequestHandler = Box<dyn FnMut(RequestKind, &[u8]) -> HandlerReply>;

enum Session<C: CryptoLayer> {
    Disconnected,
    Authorizing(Box<Handshake<C>>),
    /// `None` when security is disabled.
    Connected(Option<SessionCipher<C>>),
}

impl<C: CryptoLayer> Session<C> {
    fn protocol_state(&self) -> ProtocolState {
        match self {
            Self::Disconnected => ProtocolState::Disconnected,
            Self::Authorizing(_) => ProtocolState::Authorizing,
            Self::Connected(_) => ProtocolState::Connected,
        }
    }
}

/// A request/response channel to one peer over a `ByteTransport`.
///
/// When the transport connects, the channel runs the EC-JPAKE handshake with the shared secret
/// given to `start_handshake` and then exchanges AES-CCM sealed requests and replies. A client
/// issues requests and receives replies; a server answers requests with the handler set by
/// `set_request_handler`.
///
/// Everything happens synchronously inside the transport callbacks and the request issuing
/// methods. Completions and status callbacks must not call back into the channel.
pub struct Channel<C: CryptoLayer, T: ByteTransport, M: MessageCodec> {
    settings: Settings,
    rng: C::Rng,
    transport: T,
    codec: Rc<M>,
    role: JpakeRole,
    shared_secret: Option<Zeroizing<Vec<u8>>>,
    session: Session<C>,
    reassembler: Reassembler,
    dispatcher: Dispatcher,
    subscribers: Vec<(SubscriptionId, StatusCallback)>,
    next_subscription: u64,
    request_handler: Option<RequestHandler>,
    events: EventSink,
}

impl<C: CryptoLayer, T: ByteTransport, M: MessageCodec + 'static> Channel<C, T, M> {
    /// Create a channel with default settings.
    pub fn new(rng: C::Rng, transport: T, codec: M) -> Self {
        Self::with_settings(rng, transport, codec, Settings::default())
    }

    pub fn with_settings(rng: C::Rng, transport: T, codec: M, settings: Settings) -> Self {
        Self {
            dispatcher: Dispatcher::new(settings.first_request_id),
            settings,
            rng,
            transport,
            codec: Rc::new(codec),
            role: JpakeRole::Client,
            shared_secret: None,
            session: Session::Disconnected,
            reassembler: Reassembler::new(),
            subscribers: Vec::new(),
            next_subscription: 0,
            request_handler: None,
            events: EventSink::default(),
        }
    }

    pub fn protocol_state(&self) -> ProtocolState {
        self.session.protocol_state()
    }

    /// State of the handshake engine, `Idle` when not authorizing.
    pub fn handshake_state(&self) -> HandshakeState {
        match &self.session {
            Session::Authorizing(handshake) => handshake.state(),
            _ => HandshakeState::Idle,
        }
    }

    pub fn role(&self) -> JpakeRole {
        self.role
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Set the role and shared secret the next handshake will use.
    ///
    /// The handshake itself runs when the transport reports it is connected. If it already is,
    /// call `on_transport_connected` afterwards. With security disabled only the role matters.
    pub fn start_handshake(&mut self, role: JpakeRole, shared_secret: &[u8]) -> Result<(), ChannelError> {
        if !matches!(self.session, Session::Disconnected) {
            return Err(ChannelError::InvalidState);
        }
        if self.settings.security_enabled && shared_secret.is_empty() {
            return Err(ChannelError::Handshake(HandshakeError::InvalidSecret));
        }
        self.role = role;
        self.shared_secret = Some(Zeroizing::new(shared_secret.to_vec()));
        Ok(())
    }

    /// Ask the transport to connect to `name`.
    pub fn connect(&mut self, name: &str) {
        self.transport.connect(name);
    }

    /// The transport link is up. Starts the handshake, or connects right away if security is
    /// disabled.
    pub fn on_transport_connected(&mut self) -> Result<(), ChannelError> {
        if !matches!(self.session, Session::Disconnected) {
            return Err(ChannelError::InvalidState);
        }
        self.reassembler.reset();
        if !self.settings.security_enabled {
            self.session = Session::Connected(None);
            self.notify_status();
            return Ok(());
        }
        let secret = self.shared_secret.as_ref().ok_or(ChannelError::NoCredentials)?;
        let handshake = Handshake::initialize(self.role, secret)?;
        self.session = Session::Authorizing(Box::new(handshake));
        log!(self.events, StartedHandshake(self.role));
        self.notify_status();
        self.flush_handshake()
    }

    /// The transport link is gone. Pending requests fail with `SessionClosed`.
    pub fn on_transport_disconnected(&mut self) {
        self.teardown();
    }

    /// Tear the session down and drop the transport link.
    pub fn close(&mut self) {
        self.teardown();
        self.transport.disconnect();
    }

    /// Feed bytes received from the transport.
    ///
    /// Chunks may be of any size and need not be aligned to frame boundaries. Malformed frames are
    /// dropped. A frame that fails authentication, or a failed handshake, tears the session down
    /// and is reported as an error.
    pub fn on_receive(&mut self, mut data: &[u8]) -> Result<(), ChannelError> {
        while !data.is_empty() {
            let phase = match &self.session {
                Session::Disconnected => {
                    log!(self.events, DroppedBytes(data.len()));
                    return Ok(());
                }
                Session::Authorizing(_) => FramePhase::Handshake,
                Session::Connected(cipher) => FramePhase::Message { secured: cipher.is_some() },
            };
            let (consumed, frame) = self.reassembler.receive(data, phase);
            data = &data[consumed..];
            if let Some(frame) = frame {
                self.handle_frame(frame)?;
            }
        }
        Ok(())
    }

    /// Send a request of `kind` and decode its reply with the message codec.
    ///
    /// Fails immediately, sending nothing, if a request of the same kind is still outstanding.
    /// Otherwise `on_complete` is called exactly once, when the reply arrives or the session ends.
    ///
    /// A frame that was sealed but could not be sent has consumed a nonce the peer will never see,
    /// so the session is closed and `SendFailed` returned without calling `on_complete`.
    pub fn issue<F>(&mut self, kind: RequestKind, body: &[u8], on_complete: F) -> Result<(), RequestError>
    where
        F: FnOnce(Result<M::Payload, RequestError>) + 'static,
    {
        let codec = Rc::clone(&self.codec);
        self.issue_raw(
            kind,
            body,
            Box::new(move |reply| {
                on_complete(reply.and_then(|body| codec.decode(kind, &body).map_err(|error| RequestError::BadReply { kind, error })))
            }),
        )
    }

    /// Ask the peer to send `text` back.
    pub fn request_echo<F>(&mut self, text: &str, on_complete: F) -> Result<(), RequestError>
    where
        F: FnOnce(Result<String, RequestError>) + 'static,
    {
        let kind = RequestKind::Echo;
        self.issue_raw(
            kind,
            text.as_bytes(),
            Box::new(move |reply| {
                on_complete(reply.and_then(|body| {
                    String::from_utf8(body).map_err(|e| RequestError::BadReply { kind, error: DecodeError(e.to_string()) })
                }))
            }),
        )
    }

    pub fn scan_networks<F>(&mut self, on_complete: F) -> Result<(), RequestError>
    where
        F: FnOnce(Result<M::Payload, RequestError>) + 'static,
    {
        self.issue(RequestKind::ScanNetworks, &[], on_complete)
    }

    /// Ask the device to join the network described by `request`.
    pub fn join_network<F>(&mut self, request: &M::Payload, on_complete: F) -> Result<(), RequestError>
    where
        F: FnOnce(Result<(), RequestError>) + 'static,
    {
        let body = self.codec.encode(request);
        self.issue_raw(RequestKind::JoinKnownNetwork, &body, Box::new(move |reply| on_complete(reply.map(|_| ()))))
    }

    pub fn get_current_network<F>(&mut self, on_complete: F) -> Result<(), RequestError>
    where
        F: FnOnce(Result<M::Payload, RequestError>) + 'static,
    {
        self.issue(RequestKind::GetCurrentNetwork, &[], on_complete)
    }

    pub fn clear_known_networks<F>(&mut self, on_complete: F) -> Result<(), RequestError>
    where
        F: FnOnce(Result<(), RequestError>) + 'static,
    {
        self.issue_raw(RequestKind::ClearKnownNetworks, &[], Box::new(move |reply| on_complete(reply.map(|_| ()))))
    }

    /// Register a callback for every `ProtocolState` transition.
    pub fn subscribe<F: FnMut(ProtocolState) + 'static>(&mut self, callback: F) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.subscribers.push((id, Box::new(callback)));
        id
    }

    /// Returns false if `id` was not subscribed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(s, _)| *s != id);
        self.subscribers.len() != before
    }

    /// Set the handler that answers requests when this channel plays the server role.
    ///
    /// Requests received without a handler are answered with `RESULT_NOT_SUPPORTED`.
    pub fn set_request_handler<F: FnMut(RequestKind, &[u8]) -> HandlerReply + 'static>(&mut self, handler: F) {
        self.request_handler = Some(Box::new(handler));
    }

    /// Receives a stream of events that occur on this channel.
    /// These are provided for debugging, logging or metrics purposes, and must be used for
    /// nothing else.
    #[cfg(feature = "logging")]
    pub fn set_event_log<F: FnMut(&LogEvent) + 'static>(&mut self, sink: F) {
        self.events.set(Box::new(sink));
    }

    fn issue_raw(&mut self, kind: RequestKind, body: &[u8], completion: Completion) -> Result<(), RequestError> {
        let cipher = match &mut self.session {
            Session::Connected(cipher) => cipher.as_mut(),
            _ => return Err(RequestError::NotConnected),
        };
        if self.role != JpakeRole::Client {
            return Err(RequestError::NotClient);
        }
        let req_id = self.dispatcher.issue(kind, completion)?;
        let frame = match framer::encode_request(req_id, kind, body, cipher) {
            Ok(frame) => frame,
            Err(e) => {
                self.dispatcher.cancel(req_id);
                if matches!(e, FrameError::Cipher(_)) {
                    self.close();
                }
                return Err(e.into());
            }
        };
        if self.transport.send(&frame).is_err() {
            self.dispatcher.cancel(req_id);
            self.close();
            return Err(RequestError::SendFailed);
        }
        log!(self.events, SentRequest(req_id, kind, body.len()));
        Ok(())
    }

    fn handle_frame(&mut self, frame: Vec<u8>) -> Result<(), ChannelError> {
        match &mut self.session {
            Session::Disconnected => Ok(()),
            Session::Authorizing(handshake) => {
                let message = match framer::decode_handshake(&frame) {
                    Ok(message) => message,
                    Err(_e) => {
                        log!(self.events, DroppedFrame(_e));
                        return Ok(());
                    }
                };
                let _state = handshake.state();
                match handshake.consume_inbound(message) {
                    Ok(()) => {
                        log!(self.events, ReceivedHandshake(_state, message.len()));
                        self.flush_handshake()
                    }
                    Err(HandshakeError::OutOfSequence) => {
                        log!(self.events, UnexpectedHandshake(_state, message.len()));
                        Ok(())
                    }
                    Err(e) => Err(self.fail_handshake(e)),
                }
            }
            Session::Connected(cipher) => {
                let result = match self.role {
                    JpakeRole::Client => framer::decode_reply(frame, cipher.as_mut()).map(|reply| {
                        let _len = reply.body.len();
                        match self.dispatcher.complete(reply.req_id, reply.result, reply.body) {
                            Some(_) => {
                                log!(self.events, ReceivedReply(reply.req_id, reply.result, _len));
                            }
                            None => {
                                log!(self.events, UnmatchedReply(reply.req_id));
                            }
                        }
                        None
                    }),
                    JpakeRole::Server => framer::decode_request(frame, cipher.as_mut()).map(|request| {
                        log!(self.events, ReceivedRequest(request.req_id, request.kind, request.body.len()));
                        let (result, body) = match self.request_handler.as_mut() {
                            Some(handler) => handler(request.kind, &request.body),
                            None => (RESULT_NOT_SUPPORTED, Vec::new()),
                        };
                        Some((request.req_id, result, body))
                    }),
                };
                match result {
                    Ok(Some((req_id, result, body))) => self.send_reply(req_id, result, &body),
                    Ok(None) => Ok(()),
                    Err(FrameError::Cipher(CipherError::AuthFailure)) => {
                        log!(self.events, AuthFailure);
                        self.close();
                        Err(ChannelError::AuthFailure)
                    }
                    Err(_e) => {
                        log!(self.events, DroppedFrame(_e));
                        Ok(())
                    }
                }
            }
        }
    }

    fn send_reply(&mut self, req_id: u16, result: i32, body: &[u8]) -> Result<(), ChannelError> {
        let Session::Connected(cipher) = &mut self.session else {
            return Err(ChannelError::InvalidState);
        };
        let frame = match framer::encode_reply(req_id, result, body, cipher.as_mut()) {
            Ok(frame) => frame,
            Err(_e @ FrameError::Cipher(_)) => {
                log!(self.events, DroppedFrame(_e));
                self.close();
                return Err(ChannelError::InvalidState);
            }
            Err(_e) => {
                log!(self.events, DroppedFrame(_e));
                return Ok(());
            }
        };
        if self.transport.send(&frame).is_err() {
            self.close();
            return Err(ChannelError::SendFailed);
        }
        log!(self.events, SentReply(req_id, result, body.len()));
        Ok(())
    }

    /// Send every handshake message the engine has ready, and switch to connected once it is done.
    fn flush_handshake(&mut self) -> Result<(), ChannelError> {
        loop {
            let Session::Authorizing(handshake) = &mut self.session else {
                return Ok(());
            };
            if handshake.is_done() {
                let cipher = handshake.take_session_cipher().ok_or(ChannelError::InvalidState)?;
                self.session = Session::Connected(Some(cipher));
                log!(self.events, HandshakeComplete);
                self.notify_status();
                return Ok(());
            }
            let _state = handshake.state();
            let message = match handshake.produce_outbound(&mut self.rng) {
                Ok(Some(message)) => message,
                Ok(None) => return Ok(()),
                Err(e) => return Err(self.fail_handshake(e)),
            };
            let frame = framer::encode_handshake(&message).map_err(|_| ChannelError::InvalidState)?;
            if self.transport.send(&frame).is_err() {
                self.close();
                return Err(ChannelError::SendFailed);
            }
            log!(self.events, SentHandshake(_state, message.len()));
        }
    }

    fn fail_handshake(&mut self, error: HandshakeError) -> ChannelError {
        log!(self.events, HandshakeFailed(error));
        self.close();
        ChannelError::Handshake(error)
    }

    /// Erase the session and fail everything pending.
    fn teardown(&mut self) {
        let was = self.protocol_state();
        self.session = Session::Disconnected;
        self.reassembler.reset();
        let _swept = self.dispatcher.sweep();
        if was != ProtocolState::Disconnected {
            log!(self.events, SessionTornDown(_swept));
            self.notify_status();
        }
    }

    fn notify_status(&mut self) {
        let state = self.protocol_state();
        log!(self.events, StatusChanged(state));
        for (_, callback) in self.subscribers.iter_mut() {
            callback(state);
        }
    }
}
