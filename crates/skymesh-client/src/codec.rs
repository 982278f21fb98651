//! Stream framing for the mesh node TCP API.
//!
//! Each frame is `0x94 0xC3` followed by a big-endian `u16` payload length and
//! the protobuf payload. A header announcing more than [`MAX_FRAME_PAYLOAD`]
//! bytes is treated as noise: the decoder drops the first start byte and
//! resynchronizes.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use skymesh_core::error::ConnectionError;
use tokio_util::codec::{Decoder, Encoder};

pub const START1: u8 = 0x94;
pub const START2: u8 = 0xC3;
pub const HEADER_LEN: usize = 4;
pub const MAX_FRAME_PAYLOAD: usize = 512;

/// Sent once after connecting so the node leaves any partial frame state
pub const WAKE_SEQUENCE: [u8; 32] = [START2; 32];

#[derive(Debug, Default, Clone, Copy)]
pub struct MeshFrameCodec;

impl Decoder for MeshFrameCodec {
    type Item = Bytes;
    type Error = std::io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            // Drop anything before the start marker (node debug output)
            match src.iter().position(|&b| b == START1) {
                Some(0) => {}
                Some(pos) => src.advance(pos),
                None => {
                    src.clear();
                    return Ok(None);
                }
            }

            if src.len() < 2 {
                return Ok(None);
            }
            if src[1] != START2 {
                src.advance(1);
                continue;
            }
            if src.len() < HEADER_LEN {
                return Ok(None);
            }

            let len = u16::from_be_bytes([src[2], src[3]]) as usize;
            if len > MAX_FRAME_PAYLOAD {
                src.advance(1);
                continue;
            }
            if src.len() < HEADER_LEN + len {
                src.reserve(HEADER_LEN + len - src.len());
                return Ok(None);
            }

            src.advance(HEADER_LEN);
            return Ok(Some(src.split_to(len).freeze()));
        }
    }
}

impl Encoder<Bytes> for MeshFrameCodec {
    type Error = std::io::Error;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if item.len() > MAX_FRAME_PAYLOAD {
            let err = ConnectionError::FrameTooLarge {
                size: item.len(),
                limit: MAX_FRAME_PAYLOAD,
            };
            return Err(std::io::Error::new(std::io::ErrorKind::InvalidInput, err));
        }

        dst.reserve(HEADER_LEN + item.len());
        dst.put_u8(START1);
        dst.put_u8(START2);
        dst.put_u16(item.len() as u16);
        dst.extend_from_slice(&item);
        Ok(())
    }
}
