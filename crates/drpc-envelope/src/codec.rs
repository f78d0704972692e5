//! Envelope framing (spec §3, §4.C, §6): a length-prefixed header followed by
//! zero or more length-prefixed payloads.
//!
//! ```text
//! Header  : uint32_be path_len | path_bytes | uint8 ct_len | ct_bytes
//! Payload : uint8 flags | uint32_be data_len | data_bytes
//! ```

use bytes::{Bytes, BytesMut};
use drpc_core::DrpcError;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

pub const MAX_PATH_LEN: usize = 4096;
pub const MAX_CONTENT_TYPE_LEN: usize = 255;

/// Compression is reserved but unimplemented in v1: a non-zero bit here is
/// always rejected rather than silently ignored or honored.
pub const FLAG_COMPRESSED: u8 = 0x01;
pub const FLAG_END_STREAM: u8 = 0x02;

const ALLOWED_FLAGS: u8 = FLAG_END_STREAM;

/// One payload envelope: a flags byte and its data.
#[derive(Debug, Clone)]
pub struct Payload {
    pub flags: u8,
    pub data: Bytes,
}

impl Payload {
    pub fn is_end_stream(&self) -> bool {
        self.flags & FLAG_END_STREAM != 0
    }
}

/// Write the envelope header. `path` must start with `/` and be 1..=4096
/// bytes; `content_type` must be 1..=255 bytes.
pub async fn write_header<W>(stream: &mut W, path: &str, content_type: &str) -> Result<(), DrpcError>
where
    W: AsyncWrite + Unpin,
{
    let path_bytes = path.as_bytes();
    if path_bytes.is_empty() || path_bytes.len() > MAX_PATH_LEN {
        return Err(DrpcError::invalid_argument(format!(
            "procedure path length {} out of range 1..={MAX_PATH_LEN}",
            path_bytes.len()
        )));
    }
    if !path.starts_with('/') {
        return Err(DrpcError::invalid_argument("procedure path must begin with '/'"));
    }

    let ct_bytes = content_type.as_bytes();
    if ct_bytes.is_empty() || ct_bytes.len() > MAX_CONTENT_TYPE_LEN {
        return Err(DrpcError::invalid_argument(format!(
            "content-type length {} out of range 1..={MAX_CONTENT_TYPE_LEN}",
            ct_bytes.len()
        )));
    }

    let mut buf = BytesMut::with_capacity(4 + path_bytes.len() + 1 + ct_bytes.len());
    buf.extend_from_slice(&(path_bytes.len() as u32).to_be_bytes());
    buf.extend_from_slice(path_bytes);
    buf.extend_from_slice(&[ct_bytes.len() as u8]);
    buf.extend_from_slice(ct_bytes);
    stream.write_all(&buf).await.map_err(DrpcError::from)
}

/// Write one payload envelope. `flags` must only set bits this codec knows
/// about (`FLAG_END_STREAM`); `FLAG_COMPRESSED` is always rejected.
pub async fn write_payload<W>(stream: &mut W, flags: u8, data: &[u8]) -> Result<(), DrpcError>
where
    W: AsyncWrite + Unpin,
{
    if flags & !ALLOWED_FLAGS != 0 {
        return Err(DrpcError::invalid_argument(format!("unsupported flag bits set: {flags:#04x}")));
    }

    let mut buf = BytesMut::with_capacity(1 + 4 + data.len());
    buf.extend_from_slice(&[flags]);
    buf.extend_from_slice(&(data.len() as u32).to_be_bytes());
    buf.extend_from_slice(data);
    stream.write_all(&buf).await.map_err(DrpcError::from)
}

/// Reads envelope headers, reusing two scratch buffers sized to the maximum
/// path and content-type lengths (spec §4.C: "the reader recycles scratch
/// buffers from a small pool keyed by the two maximum sizes").
///
/// One `HeaderReader` is meant to live for the lifetime of one stream; it is
/// not `Sync` and is not meant to be shared across concurrent readers.
pub struct HeaderReader {
    path_scratch: BytesMut,
    ct_scratch: BytesMut,
}

impl Default for HeaderReader {
    fn default() -> Self {
        Self::new()
    }
}

impl HeaderReader {
    pub fn new() -> Self {
        Self {
            path_scratch: BytesMut::with_capacity(MAX_PATH_LEN),
            ct_scratch: BytesMut::with_capacity(MAX_CONTENT_TYPE_LEN),
        }
    }

    /// Read one header. Over-length or zero-length fields are `DataLoss`
    /// errors; the caller is expected to reset the stream on error (spec
    /// §4.C).
    pub async fn read_header<R>(&mut self, stream: &mut R) -> Result<(String, String), DrpcError>
    where
        R: AsyncRead + Unpin,
    {
        let mut len_buf = [0u8; 4];
        stream.read_exact(&mut len_buf).await?;
        let path_len = u32::from_be_bytes(len_buf) as usize;
        if path_len == 0 || path_len > MAX_PATH_LEN {
            return Err(DrpcError::data_loss(format!(
                "procedure path length {path_len} out of range 1..={MAX_PATH_LEN}"
            )));
        }

        self.path_scratch.clear();
        self.path_scratch.resize(path_len, 0);
        stream.read_exact(&mut self.path_scratch[..path_len]).await?;
        let path = std::str::from_utf8(&self.path_scratch[..path_len])
            .map_err(|_| DrpcError::data_loss("procedure path is not valid utf-8"))?
            .to_owned();
        if !path.starts_with('/') {
            return Err(DrpcError::data_loss("procedure path must begin with '/'"));
        }

        let mut ct_len_buf = [0u8; 1];
        stream.read_exact(&mut ct_len_buf).await?;
        let ct_len = ct_len_buf[0] as usize;
        if ct_len == 0 {
            return Err(DrpcError::data_loss("content-type length must be at least 1"));
        }

        self.ct_scratch.clear();
        self.ct_scratch.resize(ct_len, 0);
        stream.read_exact(&mut self.ct_scratch[..ct_len]).await?;
        let content_type = std::str::from_utf8(&self.ct_scratch[..ct_len])
            .map_err(|_| DrpcError::data_loss("content-type is not valid utf-8"))?
            .to_owned();

        Ok((path, content_type))
    }
}

/// Read one payload envelope. A clean EOF before any bytes of the next
/// envelope are read is treated as an implicit end-of-stream envelope (spec
/// §3 invariant: "the reader treats EOF equivalently to an empty
/// end-of-stream envelope if the peer half-closes").
pub async fn read_payload<R>(stream: &mut R) -> Result<Payload, DrpcError>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; 5];
    match stream.read_exact(&mut header).await {
        Ok(_) => {}
        Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Ok(Payload {
                flags: FLAG_END_STREAM,
                data: Bytes::new(),
            });
        }
        Err(err) => return Err(err.into()),
    }

    let flags = header[0];
    if flags & !ALLOWED_FLAGS != 0 {
        return Err(DrpcError::data_loss(format!("unsupported flag bits set: {flags:#04x}")));
    }

    let len = u32::from_be_bytes([header[1], header[2], header[3], header[4]]) as usize;
    let mut data = vec![0u8; len];
    stream.read_exact(&mut data).await?;
    Ok(Payload {
        flags,
        data: Bytes::from(data),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[tokio::test]
    async fn header_round_trips() {
        let mut buf = Vec::new();
        write_header(&mut buf, "/svc.Greeter/SayHello", "application/proto").await.unwrap();

        let mut reader = Cursor::new(buf);
        let mut header_reader = HeaderReader::new();
        let (path, ct) = header_reader.read_header(&mut reader).await.unwrap();
        assert_eq!(path, "/svc.Greeter/SayHello");
        assert_eq!(ct, "application/proto");
    }

    #[tokio::test]
    async fn header_reader_scratch_is_reusable_across_calls() {
        let mut buf = Vec::new();
        write_header(&mut buf, "/a", "x").await.unwrap();
        write_header(&mut buf, "/much/longer/path/name", "application/connect+json").await.unwrap();

        let mut reader = Cursor::new(buf);
        let mut header_reader = HeaderReader::new();
        let (path1, ct1) = header_reader.read_header(&mut reader).await.unwrap();
        let (path2, ct2) = header_reader.read_header(&mut reader).await.unwrap();
        assert_eq!(path1, "/a");
        assert_eq!(ct1, "x");
        assert_eq!(path2, "/much/longer/path/name");
        assert_eq!(ct2, "application/connect+json");
    }

    #[tokio::test]
    async fn zero_length_path_is_rejected() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&0u32.to_be_bytes());
        let mut reader = Cursor::new(buf);
        let mut header_reader = HeaderReader::new();
        assert!(header_reader.read_header(&mut reader).await.is_err());
    }

    #[tokio::test]
    async fn oversize_path_is_rejected_on_write() {
        let mut buf = Vec::new();
        let path = format!("/{}", "a".repeat(MAX_PATH_LEN));
        assert!(write_header(&mut buf, &path, "application/proto").await.is_err());
    }

    #[tokio::test]
    async fn payload_round_trips_with_flags() {
        let mut buf = Vec::new();
        write_payload(&mut buf, 0, b"hello").await.unwrap();
        write_payload(&mut buf, FLAG_END_STREAM, b"").await.unwrap();

        let mut reader = Cursor::new(buf);
        let first = read_payload(&mut reader).await.unwrap();
        assert_eq!(&first.data[..], b"hello");
        assert!(!first.is_end_stream());

        let second = read_payload(&mut reader).await.unwrap();
        assert!(second.data.is_empty());
        assert!(second.is_end_stream());
    }

    #[tokio::test]
    async fn compression_flag_is_rejected_in_v1() {
        let mut buf = Vec::new();
        assert!(write_payload(&mut buf, FLAG_COMPRESSED, b"x").await.is_err());
    }

    #[tokio::test]
    async fn clean_eof_reads_as_implicit_end_stream() {
        let mut reader = Cursor::new(Vec::<u8>::new());
        let payload = read_payload(&mut reader).await.unwrap();
        assert!(payload.is_end_stream());
        assert!(payload.data.is_empty());
    }
}
