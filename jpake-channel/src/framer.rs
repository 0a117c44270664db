use crate::application::CryptoLayer;
use crate::cipher::SessionCipher;
use crate::crypto::*;
use crate::proto::*;
use crate::result::FrameError;

/// How inbound frames are laid out at a given point in a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FramePhase {
    /// Message header followed by a raw handshake message.
    Handshake,
    /// Message header, request or reply header, body, and a security trailer if `secured`.
    Message { secured: bool },
}

/// A decoded request frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub req_id: u16,
    pub kind: RequestKind,
    pub body: Vec<u8>,
}

/// A decoded reply frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub req_id: u16,
    pub result: i32,
    pub body: Vec<u8>,
}

/// Total size of the frame announced by the 2 byte message header `header`.
pub fn expected_frame_size(header: [u8; MESSAGE_HEADER_SIZE], phase: FramePhase) -> usize {
    let declared = u16::from_le_bytes(header) as usize;
    match phase {
        FramePhase::Handshake => MESSAGE_HEADER_SIZE + declared,
        FramePhase::Message { secured } => {
            MESSAGE_HEADER_SIZE + REPLY_HEADER_SIZE + declared + if secured { SECURITY_TRAILER_SIZE } else { 0 }
        }
    }
}

fn length_header(len: usize) -> Result<[u8; MESSAGE_HEADER_SIZE], FrameError> {
    if len > MAX_BODY_SIZE {
        return Err(FrameError::BodyTooLarge);
    }
    Ok((len as u16).to_le_bytes())
}

pub fn encode_handshake(message: &[u8]) -> Result<Vec<u8>, FrameError> {
    let mut frame = Vec::with_capacity(MESSAGE_HEADER_SIZE + message.len());
    frame.extend_from_slice(&length_header(message.len())?);
    frame.extend_from_slice(message);
    Ok(frame)
}

pub fn decode_handshake(frame: &[u8]) -> Result<&[u8], FrameError> {
    if frame.len() < MESSAGE_HEADER_SIZE {
        return Err(FrameError::Truncated);
    }
    let header = [frame[0], frame[1]];
    if expected_frame_size(header, FramePhase::Handshake) != frame.len() {
        return Err(FrameError::LengthMismatch);
    }
    Ok(&frame[MESSAGE_HEADER_SIZE..])
}

fn encode_message<C: CryptoLayer>(
    inner_header: [u8; REQUEST_HEADER_SIZE],
    body: &[u8],
    cipher: Option<&mut SessionCipher<C>>,
) -> Result<Vec<u8>, FrameError> {
    let mut frame = Vec::with_capacity(MESSAGE_HEADER_SIZE + REQUEST_HEADER_SIZE + body.len() + SECURITY_TRAILER_SIZE);
    frame.extend_from_slice(&length_header(body.len())?);
    frame.extend_from_slice(&inner_header);
    frame.extend_from_slice(body);
    if let Some(cipher) = cipher {
        let (aad, payload) = frame.split_at_mut(MESSAGE_HEADER_SIZE);
        let tag = cipher.seal(payload, aad)?;
        frame.extend_from_slice(&tag);
    }
    Ok(frame)
}

/// Check the size of `frame`, decrypt it in place if `cipher` is given, and return its inner
/// header together with the body.
fn decode_message<C: CryptoLayer>(
    mut frame: Vec<u8>,
    cipher: Option<&mut SessionCipher<C>>,
) -> Result<([u8; REPLY_HEADER_SIZE], Vec<u8>), FrameError> {
    let trailer = if cipher.is_some() { SECURITY_TRAILER_SIZE } else { 0 };
    if frame.len() < MESSAGE_HEADER_SIZE + REPLY_HEADER_SIZE + trailer {
        return Err(FrameError::Truncated);
    }
    let header = [frame[0], frame[1]];
    if expected_frame_size(header, FramePhase::Message { secured: cipher.is_some() }) != frame.len() {
        return Err(FrameError::LengthMismatch);
    }
    if let Some(cipher) = cipher {
        let tag_start = frame.len() - SECURITY_TRAILER_SIZE;
        let (authenticated, tag) = frame.split_at_mut(tag_start);
        let (aad, payload) = authenticated.split_at_mut(MESSAGE_HEADER_SIZE);
        let mut tag_bytes = [0u8; AES_CCM_TAG_SIZE];
        tag_bytes.copy_from_slice(tag);
        cipher.open(payload, aad, &tag_bytes)?;
        frame.truncate(tag_start);
    }
    let mut inner_header = [0u8; REPLY_HEADER_SIZE];
    inner_header.copy_from_slice(&frame[MESSAGE_HEADER_SIZE..MESSAGE_HEADER_SIZE + REPLY_HEADER_SIZE]);
    frame.drain(..MESSAGE_HEADER_SIZE + REPLY_HEADER_SIZE);
    Ok((inner_header, frame))
}

/// Build a request frame, sealing it if `cipher` is given.
pub fn encode_request<C: CryptoLayer>(
    req_id: u16,
    kind: RequestKind,
    body: &[u8],
    cipher: Option<&mut SessionCipher<C>>,
) -> Result<Vec<u8>, FrameError> {
    let mut inner_header = [0u8; REQUEST_HEADER_SIZE];
    inner_header[0..2].copy_from_slice(&req_id.to_le_bytes());
    inner_header[2..4].copy_from_slice(&kind.code().to_le_bytes());
    // [4..6] reserved
    encode_message(inner_header, body, cipher)
}

/// Build a reply frame, sealing it if `cipher` is given.
pub fn encode_reply<C: CryptoLayer>(
    req_id: u16,
    result: i32,
    body: &[u8],
    cipher: Option<&mut SessionCipher<C>>,
) -> Result<Vec<u8>, FrameError> {
    let mut inner_header = [0u8; REPLY_HEADER_SIZE];
    inner_header[0..2].copy_from_slice(&req_id.to_le_bytes());
    inner_header[2..6].copy_from_slice(&result.to_le_bytes());
    encode_message(inner_header, body, cipher)
}

pub fn decode_request<C: CryptoLayer>(frame: Vec<u8>, cipher: Option<&mut SessionCipher<C>>) -> Result<Request, FrameError> {
    let (h, body) = decode_message(frame, cipher)?;
    Ok(Request {
        req_id: u16::from_le_bytes([h[0], h[1]]),
        kind: RequestKind::from(u16::from_le_bytes([h[2], h[3]])),
        body,
    })
}

pub fn decode_reply<C: CryptoLayer>(frame: Vec<u8>, cipher: Option<&mut SessionCipher<C>>) -> Result<Reply, FrameError> {
    let (h, body) = decode_message(frame, cipher)?;
    Ok(Reply {
        req_id: u16::from_le_bytes([h[0], h[1]]),
        result: i32::from_le_bytes([h[2], h[3], h[4], h[5]]),
        body,
    })
}
