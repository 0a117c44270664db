use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use rand_core::OsRng;

use jpake_channel::application::{ByteTransport, RawCodec};
use jpake_channel::crypto::JpakeRole;
use jpake_channel::crypto_impl::DefaultCrypto;
use jpake_channel::proto::{RequestKind, RESULT_NOT_SUPPORTED, RESULT_OK};
use jpake_channel::Channel;

/// Simulated BLE link MTU.
const TEST_MTU: usize = 20;

/// Queue of notifications in flight towards one side, already split into MTU sized chunks.
#[derive(Clone, Default)]
struct Link {
    name: &'static str,
    queue: Rc<RefCell<VecDeque<Vec<u8>>>>,
}

impl ByteTransport for Link {
    fn connect(&mut self, name: &str) {
        println!("[{}] connecting to {}", self.name, name);
    }

    fn disconnect(&mut self) {
        println!("[{}] disconnected", self.name);
    }

    fn send(&mut self, buffer: &[u8]) -> Result<(), std::io::Error> {
        let mut queue = self.queue.borrow_mut();
        for chunk in buffer.chunks(TEST_MTU) {
            queue.push_back(chunk.to_vec());
        }
        Ok(())
    }
}

type Peer = Channel<DefaultCrypto, Link, RawCodec>;

fn pump(from: &Link, to: &mut Peer) -> bool {
    let mut moved = false;
    loop {
        let Some(chunk) = from.queue.borrow_mut().pop_front() else {
            return moved;
        };
        moved = true;
        if let Err(e) = to.on_receive(&chunk) {
            println!("receive failed: {}", e);
        }
    }
}

fn main() {
    let secret = std::env::args().nth(1).unwrap_or_else(|| "0123456789ABCDE".to_string());

    let phone_link = Link { name: "phone", ..Default::default() };
    let device_link = Link { name: "device", ..Default::default() };
    let mut phone = Peer::new(OsRng, phone_link.clone(), RawCodec);
    let mut device = Peer::new(OsRng, device_link.clone(), RawCodec);

    phone.subscribe(|state| println!("[phone] {:?}", state));
    device.subscribe(|state| println!("[device] {:?}", state));
    #[cfg(feature = "logging")]
    phone.set_event_log(|event| println!(">[phone] {:?}", event));

    device.set_request_handler(|kind, body| match kind {
        RequestKind::Echo => (RESULT_OK, body.to_vec()),
        _ => (RESULT_NOT_SUPPORTED, Vec::new()),
    });

    phone.start_handshake(JpakeRole::Client, secret.as_bytes()).unwrap();
    device.start_handshake(JpakeRole::Server, b"0123456789ABCDE").unwrap();
    phone.connect("device");
    device.on_transport_connected().unwrap();
    phone.on_transport_connected().unwrap();
    while pump(&phone_link, &mut device) | pump(&device_link, &mut phone) {}

    match phone.request_echo("You may say I'm a dreamer", |reply| println!("[phone] echo: {:?}", reply)) {
        Ok(()) => while pump(&phone_link, &mut device) | pump(&device_link, &mut phone) {},
        Err(e) => println!("[phone] echo not sent: {}", e),
    }
    phone.close();
}
