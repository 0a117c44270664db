use std::cell::{Cell, RefCell};
use std::rc::Rc;

use rand_core::OsRng;

use jpake_channel::application::{ByteTransport, HandlerReply, MessageCodec, RawCodec, Settings};
use jpake_channel::crypto::JpakeRole;
use jpake_channel::crypto_impl::DefaultCrypto;
use jpake_channel::proto::*;
use jpake_channel::result::*;
use jpake_channel::{encode_reply, Channel, ProtocolState};

const SECRET: &[u8] = b"0123456789ABCDE";

/// One direction of a loopback link. Everything sent is queued until the test delivers it.
#[derive(Clone, Default)]
struct Wire {
    sent: Rc<RefCell<Vec<Vec<u8>>>>,
    connected: Rc<Cell<bool>>,
    broken: Rc<Cell<bool>>,
}

impl Wire {
    fn take(&self) -> Vec<Vec<u8>> {
        std::mem::take(&mut *self.sent.borrow_mut())
    }

    fn sent_count(&self) -> usize {
        self.sent.borrow().len()
    }
}

impl ByteTransport for Wire {
    fn connect(&mut self, _: &str) {
        self.connected.set(true);
    }

    fn disconnect(&mut self) {
        self.connected.set(false);
    }

    fn send(&mut self, buffer: &[u8]) -> Result<(), std::io::Error> {
        if self.broken.get() {
            return Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "link down"));
        }
        self.sent.borrow_mut().push(buffer.to_vec());
        Ok(())
    }
}

/// Comma separated network names.
struct NetworkList;

impl MessageCodec for NetworkList {
    type Payload = Vec<String>;

    fn decode(&self, _: RequestKind, body: &[u8]) -> Result<Vec<String>, DecodeError> {
        let text = std::str::from_utf8(body).map_err(|e| DecodeError(e.to_string()))?;
        Ok(text.split(',').filter(|s| !s.is_empty()).map(str::to_string).collect())
    }

    fn encode(&self, payload: &Vec<String>) -> Vec<u8> {
        payload.join(",").into_bytes()
    }
}

type Chan<M> = Channel<DefaultCrypto, Wire, M>;
type Outcomes<T> = Rc<RefCell<Vec<Result<T, RequestError>>>>;

fn recorder<T: 'static>() -> (Outcomes<T>, impl FnOnce(Result<T, RequestError>) + 'static) {
    let outcomes: Outcomes<T> = Rc::new(RefCell::new(Vec::new()));
    let sink = outcomes.clone();
    (outcomes, move |r| sink.borrow_mut().push(r))
}

fn device(kind: RequestKind, body: &[u8]) -> HandlerReply {
    match kind {
        RequestKind::Echo => (RESULT_OK, body.to_vec()),
        RequestKind::ScanNetworks => (RESULT_OK, b"home,office".to_vec()),
        RequestKind::GetCurrentNetwork => (RESULT_OK, vec![0xff, 0xfe]),
        RequestKind::JoinKnownNetwork => (-270, Vec::new()),
        RequestKind::ClearKnownNetworks => (RESULT_OK, Vec::new()),
        RequestKind::Other(_) => (RESULT_NOT_SUPPORTED, Vec::new()),
    }
}

/// Move everything `from` has sent into `to`, in chunks of `chunk` bytes that ignore frame
/// boundaries. Returns whether anything was moved.
fn deliver<M: MessageCodec + 'static>(from: &Wire, to: &mut Chan<M>, chunk: usize) -> Result<bool, ChannelError> {
    let bytes = from.take().concat();
    for c in bytes.chunks(chunk) {
        to.on_receive(c)?;
    }
    Ok(!bytes.is_empty())
}

fn settle<M: MessageCodec + 'static>(
    client: &mut Chan<M>,
    client_wire: &Wire,
    server: &mut Chan<RawCodec>,
    server_wire: &Wire,
    chunk: usize,
) -> Result<(), ChannelError> {
    loop {
        let a = deliver(client_wire, server, chunk)?;
        let b = deliver(server_wire, client, chunk)?;
        if !a && !b {
            return Ok(());
        }
    }
}

struct Link<M: MessageCodec> {
    client: Chan<M>,
    client_wire: Wire,
    server: Chan<RawCodec>,
    server_wire: Wire,
}

impl<M: MessageCodec + 'static> Link<M> {
    fn new(codec: M, settings: Settings, server_secret: &[u8]) -> Self {
        let client_wire = Wire::default();
        let server_wire = Wire::default();
        let mut client = Chan::with_settings(OsRng, client_wire.clone(), codec, settings.clone());
        let mut server = Chan::with_settings(OsRng, server_wire.clone(), RawCodec, settings);
        client.start_handshake(JpakeRole::Client, SECRET).unwrap();
        server.start_handshake(JpakeRole::Server, server_secret).unwrap();
        server.set_request_handler(device);
        client.connect("device");
        server.connect("phone");
        Self { client, client_wire, server, server_wire }
    }

    fn up(&mut self, chunk: usize) -> Result<(), ChannelError> {
        self.server.on_transport_connected()?;
        self.client.on_transport_connected()?;
        self.settle(chunk)
    }

    fn settle(&mut self, chunk: usize) -> Result<(), ChannelError> {
        settle(&mut self.client, &self.client_wire, &mut self.server, &self.server_wire, chunk)
    }
}

fn connected(settings: Settings) -> Link<RawCodec> {
    let mut link = Link::new(RawCodec, settings, SECRET);
    link.up(usize::MAX).unwrap();
    link
}

#[test]
fn handshake_then_echo() {
    let mut link = Link::new(RawCodec, Settings::default(), SECRET);
    let states = Rc::new(RefCell::new(Vec::new()));
    let s = states.clone();
    link.client.subscribe(move |state| s.borrow_mut().push(state));

    link.up(usize::MAX).unwrap();
    assert_eq!(link.client.protocol_state(), ProtocolState::Connected);
    assert_eq!(link.server.protocol_state(), ProtocolState::Connected);
    assert_eq!(*states.borrow(), vec![ProtocolState::Authorizing, ProtocolState::Connected]);

    let (outcomes, done) = recorder::<String>();
    link.client.request_echo("hello", done).unwrap();
    {
        let sent = link.client_wire.sent.borrow();
        assert_eq!(sent[0].len(), MESSAGE_HEADER_SIZE + REQUEST_HEADER_SIZE + 5 + SECURITY_TRAILER_SIZE);
        assert_eq!(sent[0][..2], [5, 0]);
    }

    link.settle(usize::MAX).unwrap();
    assert_eq!(*outcomes.borrow(), vec![Ok("hello".to_string())]);
}

#[test]
fn any_chunking_of_the_stream_works() {
    for chunk in [1, 2, 3, 7, 20, 64] {
        let mut link = Link::new(RawCodec, Settings::default(), SECRET);
        link.up(chunk).unwrap();
        assert_eq!(link.client.protocol_state(), ProtocolState::Connected, "chunk {chunk}");

        let (outcomes, done) = recorder::<String>();
        link.client.request_echo("chunked", done).unwrap();
        let (cleared, done_clear) = recorder::<()>();
        link.client.clear_known_networks(done_clear).unwrap();
        link.settle(chunk).unwrap();
        assert_eq!(*outcomes.borrow(), vec![Ok("chunked".to_string())]);
        assert_eq!(*cleared.borrow(), vec![Ok(())]);
    }
}

#[test]
fn second_request_of_a_kind_sends_nothing() {
    let mut link = connected(Settings::default());
    let (first, done) = recorder::<String>();
    link.client.request_echo("one", done).unwrap();
    let sent = link.client_wire.sent_count();

    let (second, done) = recorder::<String>();
    assert_eq!(link.client.request_echo("two", done), Err(RequestError::AlreadyInProgress));
    assert_eq!(link.client_wire.sent_count(), sent);

    // Other kinds are independent.
    let (scan, done) = recorder::<Vec<u8>>();
    link.client.scan_networks(done).unwrap();

    link.settle(usize::MAX).unwrap();
    assert_eq!(*first.borrow(), vec![Ok("one".to_string())]);
    assert!(second.borrow().is_empty());
    assert_eq!(*scan.borrow(), vec![Ok(b"home,office".to_vec())]);

    let (third, done) = recorder::<String>();
    link.client.request_echo("three", done).unwrap();
    link.settle(usize::MAX).unwrap();
    assert_eq!(*third.borrow(), vec![Ok("three".to_string())]);
}

#[test]
fn codec_decodes_replies() {
    let mut link = Link::new(NetworkList, Settings::default(), SECRET);
    link.up(usize::MAX).unwrap();

    let (scan, done) = recorder::<Vec<String>>();
    link.client.scan_networks(done).unwrap();
    let (current, done) = recorder::<Vec<String>>();
    link.client.get_current_network(done).unwrap();
    link.settle(usize::MAX).unwrap();

    assert_eq!(*scan.borrow(), vec![Ok(vec!["home".to_string(), "office".to_string()])]);
    let current = current.borrow();
    match current.as_slice() {
        [Err(RequestError::BadReply { kind, error })] => {
            assert_eq!(*kind, RequestKind::GetCurrentNetwork);
            assert!(!error.0.is_empty());
        }
        other => panic!("unexpected outcome {other:?}"),
    }
}

#[test]
fn device_rejection_reaches_the_caller() {
    let mut link = Link::new(NetworkList, Settings::default(), SECRET);
    link.up(usize::MAX).unwrap();

    let (joined, done) = recorder::<()>();
    link.client.join_network(&vec!["home".to_string()], done).unwrap();
    link.settle(usize::MAX).unwrap();
    assert_eq!(
        *joined.borrow(),
        vec![Err(RequestError::Rejected { kind: RequestKind::JoinKnownNetwork, result: -270 })]
    );
}

#[test]
fn unknown_request_type_is_not_supported() {
    let mut link = connected(Settings::default());
    let (outcomes, done) = recorder::<Vec<u8>>();
    link.client.issue(RequestKind::Other(9000), b"?", done).unwrap();
    link.settle(usize::MAX).unwrap();
    assert_eq!(
        *outcomes.borrow(),
        vec![Err(RequestError::Rejected { kind: RequestKind::Other(9000), result: RESULT_NOT_SUPPORTED })]
    );
}

#[test]
fn disconnect_fails_pending_requests() {
    let mut link = connected(Settings::default());
    let (outcomes, done) = recorder::<String>();
    link.client.request_echo("lost", done).unwrap();

    link.client.on_transport_disconnected();
    assert_eq!(link.client.protocol_state(), ProtocolState::Disconnected);
    assert_eq!(*outcomes.borrow(), vec![Err(RequestError::SessionClosed)]);

    let (_, done) = recorder::<String>();
    assert_eq!(link.client.request_echo("again", done), Err(RequestError::NotConnected));
}

#[test]
fn reconnect_runs_a_fresh_handshake() {
    let mut link = connected(Settings::default());
    link.client.on_transport_disconnected();
    link.server.on_transport_disconnected();
    link.client_wire.take();
    link.server_wire.take();

    link.up(5).unwrap();
    assert_eq!(link.client.protocol_state(), ProtocolState::Connected);
    let (outcomes, done) = recorder::<String>();
    link.client.request_echo("back", done).unwrap();
    link.settle(5).unwrap();
    assert_eq!(*outcomes.borrow(), vec![Ok("back".to_string())]);
}

#[test]
fn wrong_secret_fails_the_handshake() {
    let mut link = Link::new(RawCodec, Settings::default(), b"not the same secret");
    let server_states = Rc::new(RefCell::new(Vec::new()));
    let s = server_states.clone();
    link.server.subscribe(move |state| s.borrow_mut().push(state));

    assert_eq!(link.up(usize::MAX), Err(ChannelError::Handshake(HandshakeError::ConfirmationMismatch)));
    assert_eq!(link.server.protocol_state(), ProtocolState::Disconnected);
    assert!(!link.server_wire.connected.get());
    assert_eq!(link.client.protocol_state(), ProtocolState::Authorizing);
    assert_eq!(
        *server_states.borrow(),
        vec![ProtocolState::Authorizing, ProtocolState::Disconnected]
    );
}

#[test]
fn tampered_reply_tears_the_session_down() {
    let mut link = connected(Settings::default());
    let (outcomes, done) = recorder::<String>();
    link.client.request_echo("hello", done).unwrap();
    deliver(&link.client_wire, &mut link.server, usize::MAX).unwrap();

    let mut reply = link.server_wire.take().concat();
    let last = reply.len() - 1;
    reply[last] ^= 0x01;
    assert_eq!(link.client.on_receive(&reply), Err(ChannelError::AuthFailure));
    assert_eq!(link.client.protocol_state(), ProtocolState::Disconnected);
    assert!(!link.client_wire.connected.get());
    assert_eq!(*outcomes.borrow(), vec![Err(RequestError::SessionClosed)]);
}

#[test]
fn security_disabled_sends_plain_frames() {
    let settings = Settings { security_enabled: false, ..Settings::default() };
    let mut link = connected(settings);
    assert_eq!(link.client.protocol_state(), ProtocolState::Connected);

    let (outcomes, done) = recorder::<String>();
    link.client.request_echo("hello", done).unwrap();
    assert_eq!(link.client_wire.sent.borrow()[0], [5, 0, 32, 0, 1, 0, 0, 0, b'h', b'e', b'l', b'l', b'o']);

    // Answer by hand instead of through the device.
    link.client_wire.take();
    let reply = encode_reply::<DefaultCrypto>(32, RESULT_OK, b"hello", None).unwrap();
    link.client.on_receive(&reply).unwrap();
    assert_eq!(*outcomes.borrow(), vec![Ok("hello".to_string())]);

    // A second copy of the reply matches nothing and is dropped.
    link.client.on_receive(&reply).unwrap();
    assert_eq!(outcomes.borrow().len(), 1);
}

#[test]
fn request_ids_start_at_the_configured_offset() {
    let settings = Settings { security_enabled: false, first_request_id: 0xffff };
    let mut link = connected(settings);
    let (_, done) = recorder::<String>();
    link.client.request_echo("a", done).unwrap();
    let (_, done) = recorder::<Vec<u8>>();
    link.client.scan_networks(done).unwrap();
    let sent = link.client_wire.take();
    assert_eq!(sent[0][2..4], [0xff, 0xff]);
    assert_eq!(sent[1][2..4], [0, 0]);
}

#[test]
fn requests_before_connecting_fail() {
    let mut link = Link::new(RawCodec, Settings::default(), SECRET);
    let (_, done) = recorder::<Vec<u8>>();
    assert_eq!(link.client.scan_networks(done), Err(RequestError::NotConnected));
    assert_eq!(link.client_wire.sent_count(), 0);
}

#[test]
fn failed_request_send_closes_the_session() {
    let mut link = connected(Settings::default());
    let (scan, done) = recorder::<Vec<u8>>();
    link.client.scan_networks(done).unwrap();

    link.client_wire.broken.set(true);
    let (outcomes, done) = recorder::<String>();
    assert_eq!(link.client.request_echo("x", done), Err(RequestError::SendFailed));
    assert!(outcomes.borrow().is_empty());
    assert_eq!(link.client.protocol_state(), ProtocolState::Disconnected);
    assert!(!link.client_wire.connected.get());
    assert_eq!(*scan.borrow(), vec![Err(RequestError::SessionClosed)]);

    link.client_wire.broken.set(false);
    let (_, done) = recorder::<String>();
    assert_eq!(link.client.request_echo("y", done), Err(RequestError::NotConnected));
}

#[test]
fn failed_reply_send_closes_the_device_session() {
    let mut link = connected(Settings::default());
    let (outcomes, done) = recorder::<String>();
    link.client.request_echo("hello", done).unwrap();

    link.server_wire.broken.set(true);
    assert_eq!(deliver(&link.client_wire, &mut link.server, usize::MAX), Err(ChannelError::SendFailed));
    assert_eq!(link.server.protocol_state(), ProtocolState::Disconnected);
    assert!(!link.server_wire.connected.get());
    assert!(outcomes.borrow().is_empty());
}

#[test]
fn device_side_cannot_issue_requests() {
    let mut link = connected(Settings::default());
    let (outcomes, done) = recorder::<String>();
    assert_eq!(link.server.request_echo("reversed", done), Err(RequestError::NotClient));
    assert_eq!(link.server_wire.sent_count(), 0);
    assert!(outcomes.borrow().is_empty());
    assert_eq!(link.server.protocol_state(), ProtocolState::Connected);
}

#[test]
fn missing_credentials() {
    let wire = Wire::default();
    let mut client = Chan::new(OsRng, wire, RawCodec);
    assert_eq!(client.on_transport_connected(), Err(ChannelError::NoCredentials));
    assert_eq!(client.protocol_state(), ProtocolState::Disconnected);
}

#[test]
fn unsubscribe_stops_notifications() {
    let mut link = Link::new(RawCodec, Settings::default(), SECRET);
    let count = Rc::new(Cell::new(0));
    let c = count.clone();
    let id = link.client.subscribe(move |_| c.set(c.get() + 1));
    link.up(usize::MAX).unwrap();
    assert_eq!(count.get(), 2);

    assert!(link.client.unsubscribe(id));
    assert!(!link.client.unsubscribe(id));
    link.client.close();
    assert_eq!(count.get(), 2);
    assert_eq!(link.client.protocol_state(), ProtocolState::Disconnected);
}

#[cfg(feature = "logging")]
#[test]
fn event_log_reports_handshake() {
    use jpake_channel::LogEvent;

    let mut link = Link::new(RawCodec, Settings::default(), SECRET);
    let events = Rc::new(RefCell::new(Vec::new()));
    let e = events.clone();
    link.client.set_event_log(move |event: &LogEvent| e.borrow_mut().push(event.clone()));
    link.up(usize::MAX).unwrap();

    let events = events.borrow();
    assert_eq!(events.first(), Some(&LogEvent::StartedHandshake(JpakeRole::Client)));
    assert!(events.contains(&LogEvent::HandshakeComplete));
    assert_eq!(events.last(), Some(&LogEvent::StatusChanged(ProtocolState::Connected)));
}
