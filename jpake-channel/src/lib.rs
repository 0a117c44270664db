/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 *
 * (c) ZeroTier, Inc.
 * https://www.zerotier.com/
 */
//#![warn(missing_docs, rust_2018_idioms)]
pub mod crypto;
pub mod crypto_impl;

mod channel;
mod cipher;
mod dispatcher;
mod framer;
mod handshake;
mod log_event;
mod reassembly;
mod transcript;

pub mod application;
pub mod proto;
pub mod result;

pub use crate::channel::*;
pub use crate::cipher::*;
pub use crate::dispatcher::*;
pub use crate::framer::{
    decode_handshake, decode_reply, decode_request, encode_handshake, encode_reply, encode_request, expected_frame_size,
    FramePhase, Reply, Request,
};
pub use crate::handshake::*;
pub use crate::log_event::LogEvent;
pub use crate::reassembly::*;
pub use crate::transcript::*;
