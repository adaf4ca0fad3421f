//! Frame Streams wire codec: length-prefixed control/data framing over a
//! byte stream (spec §4.A).
//!
//! Every frame begins with a 4-byte big-endian length `L`. `L == 0` means a
//! control frame follows (4-byte control length, 4-byte control type, then
//! trailing bytes); `L > 0` means `L` bytes of opaque data payload follow.

use bytes::Bytes;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Default ceiling on a data frame's payload size (§4.A, `OVERSIZE`).
pub const MAX_FRAME_PAYLOAD: usize = 1024 * 1024;

/// The five control frame types the handshake in §4.B exchanges.
#[derive(Clone, Copy, Debug, Eq, PartialEq, IntoPrimitive, TryFromPrimitive)]
#[repr(u32)]
pub enum ControlKind {
    Accept = 0x01,
    Start = 0x02,
    Stop = 0x03,
    Ready = 0x04,
    Finish = 0x05,
}

/// A control frame as decoded off the wire.
///
/// The control type is kept as a raw `u32` rather than `ControlKind` here:
/// per §4.A, an unrecognised control type is not a codec-level failure, it
/// is passed up and rejected by the session layer (`PROTOCOL`).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ControlFrame {
    pub kind_raw: u32,
}

impl ControlFrame {
    pub fn new(kind: ControlKind) -> Self {
        ControlFrame {
            kind_raw: kind.into(),
        }
    }

    pub fn kind(&self) -> Option<ControlKind> {
        ControlKind::try_from(self.kind_raw).ok()
    }
}

/// A single frame read from (or to be written to) the wire.
#[derive(Clone, Debug)]
pub enum Frame {
    Control(ControlFrame),
    Data(Bytes),
}

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("truncated frame: connection closed mid-frame")]
    Truncated,

    #[error("data frame payload of {len} bytes exceeds ceiling of {max} bytes")]
    Oversize { len: usize, max: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn truncate_io(err: std::io::Error) -> FrameError {
    if err.kind() == std::io::ErrorKind::UnexpectedEof {
        FrameError::Truncated
    } else {
        FrameError::Io(err)
    }
}

/// Reads exactly one frame from `reader`.
///
/// No buffering beyond what is required to satisfy the `read_exact` calls
/// below — short reads (EOF mid-frame) are reported as `Truncated`.
#[tracing::instrument(level = "trace", skip(reader))]
pub async fn decode_next<R>(reader: &mut R, max_payload: usize) -> Result<Frame, FrameError>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf).await.map_err(truncate_io)?;
    let len = u32::from_be_bytes(len_buf) as usize;

    if len == 0 {
        let mut ctrl_header = [0u8; 8];
        reader
            .read_exact(&mut ctrl_header)
            .await
            .map_err(truncate_io)?;
        let ctrl_len = u32::from_be_bytes(ctrl_header[0..4].try_into().unwrap()) as usize;
        let kind_raw = u32::from_be_bytes(ctrl_header[4..8].try_into().unwrap());

        // ctrl_len counts the 4-byte type field plus any trailing data.
        let trailing_len = ctrl_len.saturating_sub(4);
        if trailing_len > 0 {
            let mut trailing = vec![0u8; trailing_len];
            reader.read_exact(&mut trailing).await.map_err(truncate_io)?;
        }

        Ok(Frame::Control(ControlFrame { kind_raw }))
    } else {
        if len > max_payload {
            return Err(FrameError::Oversize {
                len,
                max: max_payload,
            });
        }
        let mut payload = vec![0u8; len];
        reader.read_exact(&mut payload).await.map_err(truncate_io)?;
        Ok(Frame::Data(Bytes::from(payload)))
    }
}

/// Writes a control frame with no trailing data, the only shape this
/// implementation ever produces.
pub async fn write_control<W>(writer: &mut W, kind: ControlKind) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let kind_raw: u32 = kind.into();
    writer.write_all(&0u32.to_be_bytes()).await?;
    writer.write_all(&4u32.to_be_bytes()).await?;
    writer.write_all(&kind_raw.to_be_bytes()).await?;
    writer.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[tokio::test]
    async fn control_frame_round_trip() {
        for kind in [
            ControlKind::Accept,
            ControlKind::Start,
            ControlKind::Stop,
            ControlKind::Ready,
            ControlKind::Finish,
        ] {
            let mut buf = Vec::new();
            write_control(&mut buf, kind).await.unwrap();

            let mut cursor = Cursor::new(buf);
            let frame = decode_next(&mut cursor, MAX_FRAME_PAYLOAD).await.unwrap();
            match frame {
                Frame::Control(cf) => assert_eq!(cf.kind(), Some(kind)),
                Frame::Data(_) => panic!("expected control frame"),
            }
        }
    }

    #[tokio::test]
    async fn data_frame_round_trip() {
        let payload = b"hello dnstap".to_vec();
        let mut buf = Vec::new();
        buf.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        buf.extend_from_slice(&payload);

        let mut cursor = Cursor::new(buf);
        let frame = decode_next(&mut cursor, MAX_FRAME_PAYLOAD).await.unwrap();
        match frame {
            Frame::Data(bytes) => assert_eq!(bytes.as_ref(), payload.as_slice()),
            Frame::Control(_) => panic!("expected data frame"),
        }
    }

    #[tokio::test]
    async fn truncated_frame_is_reported() {
        let buf = vec![0x00, 0x00]; // short length prefix
        let mut cursor = Cursor::new(buf);
        let err = decode_next(&mut cursor, MAX_FRAME_PAYLOAD).await.unwrap_err();
        assert!(matches!(err, FrameError::Truncated));
    }

    #[tokio::test]
    async fn oversize_payload_is_rejected() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&16u32.to_be_bytes());
        buf.extend_from_slice(&[0u8; 16]);

        let mut cursor = Cursor::new(buf);
        let err = decode_next(&mut cursor, 8).await.unwrap_err();
        assert!(matches!(err, FrameError::Oversize { len: 16, max: 8 }));
    }

    #[test]
    fn unknown_control_kind_does_not_fail_codec() {
        let cf = ControlFrame { kind_raw: 0xDEAD };
        assert_eq!(cf.kind(), None);
    }
}
