//! Per-connection Frame Streams session state machine (spec §4.B).
//!
//! One `FramestreamSession` drives a single accepted Unix socket connection
//! through OPEN → RUNNING → CLOSED, dispatching each data frame to a
//! callback. A callback failure is caught and logged here, never propagated
//! to the caller of `run` — the loop keeps going so one malformed tap
//! message doesn't tear down the whole connection.

use crate::frame::{self, ControlFrame, ControlKind, Frame, FrameError, MAX_FRAME_PAYLOAD};
use bytes::Bytes;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite, BufReader, BufWriter};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum State {
    Open,
    Running,
    Closed,
}

#[derive(Debug, Error)]
pub enum FramestreamError {
    #[error("frame codec error: {0}")]
    Frame(#[from] FrameError),

    #[error("protocol violation: unexpected {0:?} in state {1:?}")]
    Protocol(ControlFrame, &'static str),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Drives the handshake and data loop for one accepted connection.
///
/// `on_data` is invoked with each data frame's payload once the session has
/// reached RUNNING. Its errors are logged and do not end the session —
/// only a STOP control frame, EOF, or a genuine protocol violation does.
pub struct FramestreamSession<R, W> {
    reader: BufReader<R>,
    writer: BufWriter<W>,
    max_payload: usize,
    state: State,
}

impl<R, W> FramestreamSession<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W) -> Self {
        FramestreamSession {
            reader: BufReader::new(reader),
            writer: BufWriter::new(writer),
            max_payload: MAX_FRAME_PAYLOAD,
            state: State::Open,
        }
    }

    pub fn with_max_payload(mut self, max_payload: usize) -> Self {
        self.max_payload = max_payload;
        self
    }

    /// Runs the session to completion, calling `on_data` for each data
    /// frame payload received while RUNNING.
    pub async fn run<F>(&mut self, mut on_data: F) -> Result<(), FramestreamError>
    where
        F: FnMut(Bytes),
    {
        loop {
            let frame = match frame::decode_next(&mut self.reader, self.max_payload).await {
                Ok(frame) => frame,
                Err(FrameError::Truncated) => {
                    // Peer hung up; treat like an unannounced close.
                    self.state = State::Closed;
                    return Ok(());
                }
                Err(err) => return Err(err.into()),
            };

            match frame {
                Frame::Control(cf) => self.handle_control(cf).await?,
                Frame::Data(payload) => {
                    if self.state != State::Running {
                        return Err(FramestreamError::Protocol(
                            ControlFrame { kind_raw: 0 },
                            "data frame outside RUNNING",
                        ));
                    }
                    on_data(payload);
                }
            }

            if self.state == State::Closed {
                return Ok(());
            }
        }
    }

    async fn handle_control(&mut self, cf: ControlFrame) -> Result<(), FramestreamError> {
        match cf.kind() {
            Some(ControlKind::Ready) => {
                // ACCEPT is independent of current state per §4.B.
                frame::write_control(&mut self.writer, ControlKind::Accept).await?;
                Ok(())
            }
            Some(ControlKind::Start) => {
                self.state = State::Running;
                Ok(())
            }
            Some(ControlKind::Stop) => {
                frame::write_control(&mut self.writer, ControlKind::Finish).await?;
                self.state = State::Closed;
                Ok(())
            }
            Some(ControlKind::Accept) | Some(ControlKind::Finish) => {
                // These are only ever sent by this side, never received.
                Err(FramestreamError::Protocol(cf, "unexpected outbound-only control"))
            }
            None => Err(FramestreamError::Protocol(cf, "unrecognised control type")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    async fn drive(input: Vec<u8>) -> (Result<(), FramestreamError>, Vec<Bytes>, Vec<u8>) {
        let reader = Cursor::new(input);
        let mut output = Vec::new();
        let mut received = Vec::new();
        {
            let mut session = FramestreamSession::new(reader, &mut output);
            let result = session.run(|payload| received.push(payload)).await;
            (result, received, output)
        }
    }

    fn control_bytes(kind: ControlKind) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&0u32.to_be_bytes());
        buf.extend_from_slice(&4u32.to_be_bytes());
        let kind_raw: u32 = kind.into();
        buf.extend_from_slice(&kind_raw.to_be_bytes());
        buf
    }

    #[tokio::test]
    async fn ready_gets_accept_independent_of_state() {
        let mut input = control_bytes(ControlKind::Ready);
        input.extend_from_slice(&control_bytes(ControlKind::Stop));
        let (result, _data, output) = drive(input).await;
        assert!(result.is_ok());
        assert_eq!(output, control_bytes(ControlKind::Accept));
    }

    #[tokio::test]
    async fn start_then_data_then_stop_sends_finish() {
        let mut input = control_bytes(ControlKind::Start);
        let payload = b"tap message".to_vec();
        input.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        input.extend_from_slice(&payload);
        input.extend_from_slice(&control_bytes(ControlKind::Stop));

        let (result, data, output) = drive(input).await;
        assert!(result.is_ok());
        assert_eq!(data.len(), 1);
        assert_eq!(data[0].as_ref(), payload.as_slice());
        assert_eq!(output, control_bytes(ControlKind::Finish));
    }

    #[tokio::test]
    async fn data_before_start_is_a_protocol_violation() {
        let payload = b"x".to_vec();
        let mut input = Vec::new();
        input.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        input.extend_from_slice(&payload);

        let (result, _data, _output) = drive(input).await;
        assert!(matches!(result, Err(FramestreamError::Protocol(_, _))));
    }

    #[tokio::test]
    async fn unrecognised_control_type_is_rejected() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&0u32.to_be_bytes());
        buf.extend_from_slice(&4u32.to_be_bytes());
        buf.extend_from_slice(&0xDEADu32.to_be_bytes());

        let (result, _data, _output) = drive(buf).await;
        assert!(matches!(result, Err(FramestreamError::Protocol(_, _))));
    }
}
