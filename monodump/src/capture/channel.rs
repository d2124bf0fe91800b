//! # Trace channels
//!
//! A [`TraceChannel`] yields raw event records in strict wire order and
//! knows how to ask its producer to stop. Two transports are provided:
//! a capture file ([`FileChannel`]) and a live diagnostic socket
//! ([`SocketChannel`]). Both speak the same framing:
//!
//! ```text
//! magic "MONOEVT\0" (8 bytes) | version u32 | records...
//! record: event_id u16 | payload_len u32 | payload bytes
//! ```
//!
//! Establishing the real EventPipe session (provider enabling, rundown)
//! belongs to an external collaborator; this framing is the session
//! boundary of this tool.

use std::future::Future;
use std::path::Path;

use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::UnixStream;

use crate::domain::ChannelError;

/// File magic of a framed event capture.
pub const CAPTURE_MAGIC: [u8; 8] = *b"MONOEVT\0";

/// Current capture format version.
pub const CAPTURE_VERSION: u32 = 1;

/// Upper bound on a single record's payload. A heap-dump object record
/// tops out far below this; anything bigger is a torn stream.
pub const MAX_RECORD_LEN: u32 = 16 * 1024 * 1024;

/// Command byte asking a live producer to end the session.
const STOP_COMMAND: u8 = 0x01;

/// One raw event as it came off the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRecord {
    pub event_id: u16,
    pub payload: Vec<u8>,
}

/// Ordered source of raw event records.
///
/// `next_event` must yield records in exact arrival order; the decode task
/// is the only caller, so implementations need no internal locking. `stop`
/// asks the producer to end the session; it is called from the decode task
/// once, after the last record has been consumed or a stop was requested.
pub trait TraceChannel: Send + 'static {
    /// The next record, or `None` once the stream is exhausted.
    fn next_event(
        &mut self,
    ) -> impl Future<Output = Result<Option<EventRecord>, ChannelError>> + Send;

    /// Propagate a stop request to the producer.
    fn stop(&mut self) -> impl Future<Output = Result<(), ChannelError>> + Send;
}

/// Read the capture header (magic + version) from the front of a stream.
async fn read_header<R: AsyncRead + Unpin>(reader: &mut R) -> Result<(), ChannelError> {
    let mut magic = [0u8; 8];
    reader.read_exact(&mut magic).await?;
    if magic != CAPTURE_MAGIC {
        return Err(ChannelError::BadMagic);
    }
    let version = reader.read_u32_le().await?;
    if version != CAPTURE_VERSION {
        return Err(ChannelError::UnsupportedVersion(version));
    }
    Ok(())
}

/// Read one framed record. Clean EOF at a record boundary is end of
/// stream; EOF inside a record is an error.
async fn read_record<R: AsyncRead + Unpin>(
    reader: &mut R,
) -> Result<Option<EventRecord>, ChannelError> {
    let mut id = [0u8; 2];
    match reader.read_exact(&mut id).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }
    let event_id = u16::from_le_bytes(id);
    let len = reader.read_u32_le().await?;
    if len > MAX_RECORD_LEN {
        return Err(ChannelError::OversizedRecord(len, MAX_RECORD_LEN));
    }
    let mut payload = vec![0u8; len as usize];
    reader.read_exact(&mut payload).await?;
    Ok(Some(EventRecord { event_id, payload }))
}

/// Replays a previously captured event file.
#[derive(Debug)]
pub struct FileChannel {
    reader: BufReader<File>,
    done: bool,
}

impl FileChannel {
    /// Open a capture file and validate its header.
    ///
    /// # Errors
    ///
    /// I/O failures, wrong magic, or an unsupported format version.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, ChannelError> {
        let mut reader = BufReader::new(File::open(path).await?);
        read_header(&mut reader).await?;
        Ok(Self { reader, done: false })
    }
}

impl TraceChannel for FileChannel {
    async fn next_event(&mut self) -> Result<Option<EventRecord>, ChannelError> {
        if self.done {
            return Ok(None);
        }
        let record = read_record(&mut self.reader).await?;
        if record.is_none() {
            self.done = true;
        }
        Ok(record)
    }

    async fn stop(&mut self) -> Result<(), ChannelError> {
        // A file has no producer to signal; just stop yielding.
        self.done = true;
        Ok(())
    }
}

/// Live channel over a Unix diagnostic socket.
///
/// The runtime side streams framed records; `stop` sends a stop command
/// and half-closes the write side, after which the producer finishes its
/// in-flight events and closes the stream.
pub struct SocketChannel {
    reader: BufReader<OwnedReadHalf>,
    writer: Option<OwnedWriteHalf>,
}

impl SocketChannel {
    /// Connect to the diagnostic socket at `path` and validate the stream
    /// header.
    ///
    /// # Errors
    ///
    /// Connection or handshake failures.
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self, ChannelError> {
        let stream = UnixStream::connect(path).await?;
        let (read_half, write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);
        read_header(&mut reader).await?;
        Ok(Self { reader, writer: Some(write_half) })
    }
}

impl TraceChannel for SocketChannel {
    async fn next_event(&mut self) -> Result<Option<EventRecord>, ChannelError> {
        read_record(&mut self.reader).await
    }

    async fn stop(&mut self) -> Result<(), ChannelError> {
        let Some(mut writer) = self.writer.take() else {
            return Ok(()); // already stopped
        };
        writer
            .write_all(&[STOP_COMMAND])
            .await
            .map_err(|e| ChannelError::StopFailed(e.to_string()))?;
        writer.shutdown().await.map_err(|e| ChannelError::StopFailed(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn framed(records: &[(u16, &[u8])]) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&CAPTURE_MAGIC);
        buf.extend_from_slice(&CAPTURE_VERSION.to_le_bytes());
        for (id, payload) in records {
            buf.extend_from_slice(&id.to_le_bytes());
            #[allow(clippy::cast_possible_truncation)]
            buf.extend_from_slice(&(payload.len() as u32).to_le_bytes());
            buf.extend_from_slice(payload);
        }
        buf
    }

    #[tokio::test]
    async fn file_channel_replays_records_in_order() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&framed(&[(51, &[]), (53, &[1, 2, 3]), (52, &[])])).unwrap();

        let mut channel = FileChannel::open(file.path()).await.unwrap();
        assert_eq!(
            channel.next_event().await.unwrap(),
            Some(EventRecord { event_id: 51, payload: vec![] })
        );
        assert_eq!(
            channel.next_event().await.unwrap(),
            Some(EventRecord { event_id: 53, payload: vec![1, 2, 3] })
        );
        assert_eq!(
            channel.next_event().await.unwrap(),
            Some(EventRecord { event_id: 52, payload: vec![] })
        );
        assert_eq!(channel.next_event().await.unwrap(), None);
    }

    #[tokio::test]
    async fn file_channel_rejects_wrong_magic() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"NOTADUMP\x01\x00\x00\x00").unwrap();
        let err = FileChannel::open(file.path()).await.unwrap_err();
        assert!(matches!(err, ChannelError::BadMagic));
    }

    #[tokio::test]
    async fn file_channel_rejects_unknown_version() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&CAPTURE_MAGIC).unwrap();
        file.write_all(&99u32.to_le_bytes()).unwrap();
        let err = FileChannel::open(file.path()).await.unwrap_err();
        assert!(matches!(err, ChannelError::UnsupportedVersion(99)));
    }

    #[tokio::test]
    async fn truncated_record_is_an_error_not_eof() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let mut buf = framed(&[]);
        buf.extend_from_slice(&53u16.to_le_bytes());
        buf.extend_from_slice(&100u32.to_le_bytes());
        buf.extend_from_slice(&[0u8; 10]); // 90 bytes short
        file.write_all(&buf).unwrap();

        let mut channel = FileChannel::open(file.path()).await.unwrap();
        assert!(channel.next_event().await.is_err());
    }

    #[tokio::test]
    async fn stopped_file_channel_yields_nothing_more() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&framed(&[(51, &[]), (52, &[])])).unwrap();

        let mut channel = FileChannel::open(file.path()).await.unwrap();
        assert!(channel.next_event().await.unwrap().is_some());
        channel.stop().await.unwrap();
        assert_eq!(channel.next_event().await.unwrap(), None);
    }
}
