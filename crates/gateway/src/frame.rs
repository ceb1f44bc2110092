//! RFC 6455 frame codec.
//!
//! Reads client frames (masked or not) and writes server frames (always
//! unmasked, FIN set). Extended lengths use 2-byte and 8-byte big-endian
//! encodings at the 126/127 markers.

use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Refuse frames whose declared payload would exhaust memory.
const MAX_PAYLOAD: u64 = 16 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    Continuation,
    Text,
    Binary,
    Close,
    Ping,
    Pong,
    Other(u8),
}

impl Opcode {
    pub fn from_nibble(n: u8) -> Self {
        match n {
            0x0 => Opcode::Continuation,
            0x1 => Opcode::Text,
            0x2 => Opcode::Binary,
            0x8 => Opcode::Close,
            0x9 => Opcode::Ping,
            0xA => Opcode::Pong,
            other => Opcode::Other(other),
        }
    }

    pub fn as_nibble(&self) -> u8 {
        match self {
            Opcode::Continuation => 0x0,
            Opcode::Text => 0x1,
            Opcode::Binary => 0x2,
            Opcode::Close => 0x8,
            Opcode::Ping => 0x9,
            Opcode::Pong => 0xA,
            Opcode::Other(n) => *n & 0x0F,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub fin: bool,
    pub opcode: Opcode,
    pub payload: Vec<u8>,
}

/// Read one frame, unmasking the payload if the client masked it.
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> io::Result<Frame> {
    let mut header = [0u8; 2];
    reader.read_exact(&mut header).await?;

    let fin = header[0] & 0x80 != 0;
    let opcode = Opcode::from_nibble(header[0] & 0x0F);
    let masked = header[1] & 0x80 != 0;

    let mut payload_len = (header[1] & 0x7F) as u64;
    if payload_len == 126 {
        let mut ext = [0u8; 2];
        reader.read_exact(&mut ext).await?;
        payload_len = u16::from_be_bytes(ext) as u64;
    } else if payload_len == 127 {
        let mut ext = [0u8; 8];
        reader.read_exact(&mut ext).await?;
        payload_len = u64::from_be_bytes(ext);
    }

    if payload_len > MAX_PAYLOAD {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("frame payload too large: {payload_len}"),
        ));
    }

    let mut mask = [0u8; 4];
    if masked {
        reader.read_exact(&mut mask).await?;
    }

    let mut payload = vec![0u8; payload_len as usize];
    reader.read_exact(&mut payload).await?;

    if masked {
        for (i, byte) in payload.iter_mut().enumerate() {
            *byte ^= mask[i % 4];
        }
    }

    Ok(Frame { fin, opcode, payload })
}

/// Write one unmasked frame with FIN set.
pub async fn write_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    opcode: Opcode,
    payload: &[u8],
) -> io::Result<()> {
    let mut header = Vec::with_capacity(10);
    header.push(0x80 | opcode.as_nibble());

    let len = payload.len();
    if len < 126 {
        header.push(len as u8);
    } else if len < 65536 {
        header.push(126);
        header.extend_from_slice(&(len as u16).to_be_bytes());
    } else {
        header.push(127);
        header.extend_from_slice(&(len as u64).to_be_bytes());
    }

    writer.write_all(&header).await?;
    writer.write_all(payload).await?;
    writer.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn roundtrip(payload: &[u8]) -> Frame {
        let mut encoded = Vec::new();
        write_frame(&mut encoded, Opcode::Text, payload).await.unwrap();
        read_frame(&mut encoded.as_slice()).await.unwrap()
    }

    #[tokio::test]
    async fn roundtrip_boundary_lengths() {
        for len in [0usize, 125, 126, 65535, 65536] {
            let payload = vec![b'x'; len];
            let frame = roundtrip(&payload).await;
            assert!(frame.fin);
            assert_eq!(frame.opcode, Opcode::Text);
            assert_eq!(frame.payload.len(), len, "length {len}");
            assert_eq!(frame.payload, payload);
        }
    }

    #[tokio::test]
    async fn encoded_length_markers() {
        let mut small = Vec::new();
        write_frame(&mut small, Opcode::Text, &[0u8; 125]).await.unwrap();
        assert_eq!(small[1], 125);

        let mut medium = Vec::new();
        write_frame(&mut medium, Opcode::Text, &[0u8; 126]).await.unwrap();
        assert_eq!(medium[1], 126);
        assert_eq!(u16::from_be_bytes([medium[2], medium[3]]), 126);

        let mut large = Vec::new();
        write_frame(&mut large, Opcode::Text, &[0u8; 65536]).await.unwrap();
        assert_eq!(large[1], 127);
    }

    #[tokio::test]
    async fn masked_client_frame_unmasks() {
        let payload = b"hello";
        let mask = [0x11u8, 0x22, 0x33, 0x44];
        let mut raw = vec![0x81, 0x80 | payload.len() as u8];
        raw.extend_from_slice(&mask);
        raw.extend(payload.iter().enumerate().map(|(i, b)| b ^ mask[i % 4]));

        let frame = read_frame(&mut raw.as_slice()).await.unwrap();
        assert_eq!(frame.opcode, Opcode::Text);
        assert_eq!(frame.payload, payload);
    }

    #[tokio::test]
    async fn control_opcodes_decode() {
        for (nibble, opcode) in [(0x8, Opcode::Close), (0x9, Opcode::Ping), (0xA, Opcode::Pong)] {
            let raw = [0x80 | nibble, 0x00];
            let frame = read_frame(&mut raw.as_slice()).await.unwrap();
            assert_eq!(frame.opcode, opcode);
            assert!(frame.payload.is_empty());
        }
    }

    #[tokio::test]
    async fn oversized_frame_rejected() {
        // 8-byte extended length declaring 1 GiB.
        let mut raw = vec![0x81, 127];
        raw.extend_from_slice(&(1u64 << 30).to_be_bytes());
        let err = read_frame(&mut raw.as_slice()).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[tokio::test]
    async fn truncated_frame_is_an_error() {
        let raw = [0x81u8, 5, b'h', b'i'];
        assert!(read_frame(&mut raw.as_slice()).await.is_err());
    }
}
