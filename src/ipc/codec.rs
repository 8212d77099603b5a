//! Length-prefixed frame encoding
//!
//! Every frame is an 8-byte header (opcode and payload length, both u32
//! little-endian) followed by `length` bytes of JSON. A zero-length payload
//! decodes as `null`.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use bytes::{BufMut, BytesMut};
use serde::Serialize;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{ProtocolContext, RelayError, Result};
use crate::ipc::protocol::{constants, Opcode};

/// One decoded IPC frame
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub opcode: Opcode,
    pub payload: Value,
}

impl Frame {
    pub fn new(opcode: Opcode, payload: Value) -> Self {
        Self { opcode, payload }
    }

    /// Build a frame from any serializable payload
    pub fn from_payload<T: Serialize>(opcode: Opcode, payload: &T) -> Result<Self> {
        Ok(Self::new(opcode, serde_json::to_value(payload)?))
    }

    /// Encode into header plus JSON bytes
    pub fn encode(&self) -> Result<Vec<u8>> {
        let raw = serde_json::to_vec(&self.payload)?;
        let mut buffer = Vec::with_capacity(constants::IPC_HEADER_SIZE + raw.len());

        WriteBytesExt::write_u32::<LittleEndian>(&mut buffer, self.opcode.into())?;
        WriteBytesExt::write_u32::<LittleEndian>(&mut buffer, raw.len() as u32)?;
        buffer.extend_from_slice(&raw);

        Ok(buffer)
    }

    /// Decode one frame from the front of `buf`.
    ///
    /// Returns the frame and the number of bytes it occupied. A header that
    /// declares more payload than `buf` holds is rejected before anything is
    /// parsed.
    pub fn decode(buf: &[u8], max_payload_size: u32) -> Result<(Self, usize)> {
        if buf.len() < constants::IPC_HEADER_SIZE {
            return Err(RelayError::protocol_violation(
                format!("Truncated header: {} of 8 bytes", buf.len()),
                ProtocolContext::default(),
            ));
        }

        let mut header = &buf[..constants::IPC_HEADER_SIZE];
        let opcode_raw = ReadBytesExt::read_u32::<LittleEndian>(&mut header)?;
        let length = ReadBytesExt::read_u32::<LittleEndian>(&mut header)?;

        check_length(opcode_raw, length, max_payload_size)?;
        let opcode = Opcode::try_from(opcode_raw)?;

        let end = constants::IPC_HEADER_SIZE + length as usize;
        if buf.len() < end {
            return Err(RelayError::protocol_violation(
                format!(
                    "Truncated payload: declared {} bytes, {} available",
                    length,
                    buf.len() - constants::IPC_HEADER_SIZE
                ),
                ProtocolContext::with_payload_size(opcode_raw, length),
            ));
        }

        let payload = parse_payload(&buf[constants::IPC_HEADER_SIZE..end])?;
        Ok((Self::new(opcode, payload), end))
    }
}

fn check_length(opcode_raw: u32, length: u32, max_payload_size: u32) -> Result {
    if length > max_payload_size {
        return Err(RelayError::protocol_violation(
            format!(
                "Payload size {} exceeds maximum allowed size of {} bytes",
                length, max_payload_size
            ),
            ProtocolContext::with_payload_size(opcode_raw, length),
        ));
    }
    Ok(())
}

fn parse_payload(raw: &[u8]) -> Result<Value> {
    if raw.is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_slice(raw).map_err(|e| {
        RelayError::protocol_violation(
            format!("Payload is not JSON: {}", e),
            ProtocolContext::default(),
        )
    })
}

/// Read into `buf` until it is full or the stream ends; returns bytes read.
async fn read_full<R: AsyncRead + Unpin + ?Sized>(reader: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

/// Reads frames off an async stream, reusing one payload buffer
#[derive(Debug)]
pub struct FrameReader {
    buf: BytesMut,
    max_payload_size: u32,
}

impl FrameReader {
    /// Initial capacity for the payload buffer (4KB)
    const INITIAL_BUFFER_CAPACITY: usize = 4096;

    pub fn new(max_payload_size: u32) -> Self {
        Self {
            buf: BytesMut::with_capacity(Self::INITIAL_BUFFER_CAPACITY),
            max_payload_size,
        }
    }

    /// Read the next frame.
    ///
    /// `Ok(None)` means the peer closed the stream cleanly between frames.
    /// A stream that ends inside a header or payload is a protocol violation.
    pub async fn read_frame<R>(&mut self, reader: &mut R) -> Result<Option<Frame>>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let mut header = [0u8; constants::IPC_HEADER_SIZE];
        let got = read_full(reader, &mut header).await?;
        if got == 0 {
            return Ok(None);
        }
        if got < header.len() {
            return Err(RelayError::protocol_violation(
                format!("Truncated header: {} of 8 bytes", got),
                ProtocolContext::default(),
            ));
        }

        let opcode_raw = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
        let length = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);

        check_length(opcode_raw, length, self.max_payload_size)?;
        let opcode = Opcode::try_from(opcode_raw)?;

        self.buf.clear();
        self.buf.resize(length as usize, 0);

        let got = read_full(reader, &mut self.buf[..]).await?;
        if got < length as usize {
            return Err(RelayError::protocol_violation(
                format!("Truncated payload: declared {} bytes, received {}", length, got),
                ProtocolContext::with_payload_size(opcode_raw, length),
            ));
        }

        let payload = parse_payload(&self.buf)?;
        Ok(Some(Frame::new(opcode, payload)))
    }
}

/// Writes frames to an async stream, reusing one output buffer
#[derive(Debug, Default)]
pub struct FrameWriter {
    buf: BytesMut,
}

impl FrameWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn write_frame<W>(&mut self, writer: &mut W, frame: &Frame) -> Result
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let raw = serde_json::to_vec(&frame.payload)?;

        self.buf.clear();
        self.buf.reserve(constants::IPC_HEADER_SIZE + raw.len());
        self.buf.put_u32_le(frame.opcode.into());
        self.buf.put_u32_le(raw.len() as u32);
        self.buf.extend_from_slice(&raw);

        writer
            .write_all(&self.buf)
            .await
            .map_err(|_| RelayError::SocketClosed)?;
        writer.flush().await.map_err(|_| RelayError::SocketClosed)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn header_is_little_endian() {
        let bytes = Frame::new(Opcode::Close, json!({})).encode().unwrap();
        assert_eq!(&bytes[..4], &[2, 0, 0, 0]);
        assert_eq!(&bytes[4..8], &[2, 0, 0, 0]);
        assert_eq!(&bytes[8..], b"{}");
    }

    #[test]
    fn decode_reports_consumed_length() {
        let mut bytes = Frame::new(Opcode::Ping, json!([1])).encode().unwrap();
        let first_len = bytes.len();
        bytes.extend(Frame::new(Opcode::Pong, json!([2])).encode().unwrap());

        let (frame, used) = Frame::decode(&bytes, constants::MAX_PAYLOAD_SIZE).unwrap();
        assert_eq!(frame.opcode, Opcode::Ping);
        assert_eq!(used, first_len);

        let (second, _) = Frame::decode(&bytes[used..], constants::MAX_PAYLOAD_SIZE).unwrap();
        assert_eq!(second.payload, json!([2]));
    }

    #[test]
    fn empty_payload_is_null() {
        let bytes = [1u8, 0, 0, 0, 0, 0, 0, 0];
        let (frame, _) = Frame::decode(&bytes, 1024).unwrap();
        assert_eq!(frame.payload, Value::Null);
    }

    #[tokio::test]
    async fn reader_returns_none_on_clean_eof() {
        let (client, mut server) = tokio::io::duplex(64);
        drop(client);
        let mut reader = FrameReader::new(1024);
        assert!(reader.read_frame(&mut server).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn reader_rejects_stream_ending_mid_payload() {
        let (mut client, mut server) = tokio::io::duplex(64);
        let bytes = Frame::new(Opcode::Frame, json!({ "cmd": "SUBSCRIBE" }))
            .encode()
            .unwrap();
        client.write_all(&bytes[..bytes.len() - 3]).await.unwrap();
        drop(client);

        let mut reader = FrameReader::new(1024);
        let err = reader.read_frame(&mut server).await.unwrap_err();
        assert!(matches!(err, RelayError::ProtocolViolation { .. }));
    }

    #[tokio::test]
    async fn writer_and_reader_agree() {
        let (mut client, mut server) = tokio::io::duplex(256);
        let frame = Frame::new(Opcode::Handshake, json!({ "v": 1, "client_id": "42" }));
        FrameWriter::new().write_frame(&mut client, &frame).await.unwrap();

        let got = FrameReader::new(1024).read_frame(&mut server).await.unwrap();
        assert_eq!(got, Some(frame));
    }
}
