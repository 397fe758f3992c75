//! Line framing over a byte stream
//!
//! Every message is one newline-terminated UTF-8 line. Commands are bare
//! text and bodies are single-line JSON documents.

use crate::error::{MatchmakingError, Result};
use futures::{SinkExt, StreamExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{Decoder, Framed, LinesCodec, LinesCodecError};
use tracing::trace;

/// One read from a connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A complete line without its terminator
    Line(String),
    /// A line longer than the frame limit; its bytes were discarded
    Oversized,
    /// The peer closed the stream
    Closed,
}

/// A framed client connection
pub struct Connection<S> {
    framed: Framed<S, LinesCodec>,
    // The framed stream yields one `None` after a decode error before it
    // resumes reading, which must not be mistaken for end of stream.
    recovering: bool,
    // After that `None` the framed stream only decodes once new bytes
    // arrive, so lines already buffered are decoded here first.
    draining: bool,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, max_frame_length: usize) -> Self {
        Self {
            framed: Framed::new(stream, LinesCodec::new_with_max_length(max_frame_length)),
            recovering: false,
            draining: false,
        }
    }

    /// Read the next frame.
    ///
    /// I/O failures are returned as [`MatchmakingError::TransportError`].
    pub async fn read_frame(&mut self) -> Result<Frame> {
        loop {
            if self.draining {
                match self.decode_buffered()? {
                    Some(frame) => return Ok(frame),
                    None => self.draining = false,
                }
            }

            match self.framed.next().await {
                Some(Ok(line)) => {
                    trace!("Received line: {}", line);
                    return Ok(Frame::Line(line));
                }
                Some(Err(LinesCodecError::MaxLineLengthExceeded)) => {
                    self.recovering = true;
                    return Ok(Frame::Oversized);
                }
                Some(Err(LinesCodecError::Io(e))) => return Err(transport_error(e)),
                None if self.recovering => {
                    self.recovering = false;
                    self.draining = true;
                }
                None => return Ok(Frame::Closed),
            }
        }
    }

    fn decode_buffered(&mut self) -> Result<Option<Frame>> {
        let mut buffer = std::mem::take(self.framed.read_buffer_mut());
        let decoded = self.framed.codec_mut().decode(&mut buffer);
        *self.framed.read_buffer_mut() = buffer;

        match decoded {
            Ok(Some(line)) => {
                trace!("Received buffered line: {}", line);
                Ok(Some(Frame::Line(line)))
            }
            Ok(None) => Ok(None),
            Err(LinesCodecError::MaxLineLengthExceeded) => Ok(Some(Frame::Oversized)),
            Err(LinesCodecError::Io(e)) => Err(transport_error(e)),
        }
    }

    /// Write one line, adding the terminator
    pub async fn write_line(&mut self, line: &str) -> Result<()> {
        trace!("Sending line: {}", line);
        self.framed
            .send(line)
            .await
            .map_err(|e| MatchmakingError::TransportError {
                message: e.to_string(),
            })?;
        Ok(())
    }

    /// Serialize `message` as JSON and write it as one line
    pub async fn send<T: Serialize>(&mut self, message: &T) -> Result<()> {
        let line = encode(message)?;
        self.write_line(&line).await
    }
}

fn transport_error(e: std::io::Error) -> anyhow::Error {
    MatchmakingError::TransportError {
        message: e.to_string(),
    }
    .into()
}

/// Parse a JSON body.
///
/// Malformed bodies are reported as [`MatchmakingError::ProtocolError`].
pub fn decode<T: DeserializeOwned>(line: &str) -> Result<T> {
    serde_json::from_str(line).map_err(|e| {
        MatchmakingError::ProtocolError {
            reason: format!("Malformed body: {}", e),
        }
        .into()
    })
}

/// Serialize a body to a single JSON line
pub fn encode<T: Serialize>(message: &T) -> Result<String> {
    serde_json::to_string(message).map_err(|e| {
        MatchmakingError::InternalError {
            message: format!("Failed to serialize message: {}", e),
        }
        .into()
    })
}
