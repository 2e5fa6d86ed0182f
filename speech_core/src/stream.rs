//! Audio byte streams.
//!
//! The synthesis service answers with a chunked HTTP body. Chunk boundaries
//! are whatever the transport hands us; callers must only rely on order.

use std::pin::Pin;

use bytes::Bytes;
use futures_util::{Stream, StreamExt};

use crate::SynthesisError;

/// Boxed stream of encoded audio chunks.
pub type AudioStream = Pin<Box<dyn Stream<Item = Result<Bytes, SynthesisError>> + Send>>;

/// Adapt a `reqwest` body stream, tagging transport errors as mid-stream
/// failures.
pub fn from_response(response: reqwest::Response) -> AudioStream {
    response
        .bytes_stream()
        .map(|chunk| chunk.map_err(|e| SynthesisError::Stream(e.to_string())))
        .boxed()
}
