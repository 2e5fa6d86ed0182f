//! Per-request speech relay.
//!
//! A relay moves through `Received → Synthesizing → Streaming → Complete`.
//! Any upstream error before the first audio chunk is returned to the
//! handler, which still owns the response and answers with a 500. Once the
//! first chunk exists the status line and headers are committed: a later
//! upstream error can only end the body with an error, which makes hyper
//! abort the connection instead of writing a second response.
//!
//! Dropping a [`RelayBody`] (client went away) drops the upstream stream
//! with it, so nothing keeps pulling audio nobody will read.

use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use speech_core::{AudioStream, SpeechSynthesizer, SynthesisError};
use tracing::{debug, error, info, warn};

use crate::metrics::{AppMetrics, StreamMetrics};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    Received,
    Synthesizing,
    Streaming,
    Complete,
    Failed,
    Cancelled,
}

impl RelayState {
    pub fn is_terminal(self) -> bool {
        matches!(self, RelayState::Complete | RelayState::Failed | RelayState::Cancelled)
    }
}

/// Start synthesis and wait at most `first_chunk_timeout` for the first chunk.
///
/// `Err` means nothing has been sent yet and the caller may still respond
/// with an error status.
pub async fn open(
    synthesizer: &dyn SpeechSynthesizer,
    text: &str,
    request_id: &str,
    metrics: &AppMetrics,
    first_chunk_timeout: Duration,
) -> Result<RelayBody, SynthesisError> {
    let started = Instant::now();
    let mut state = RelayState::Received;
    debug!(request_id, text_len = text.len(), ?state, "Speech relay opened");

    state = RelayState::Synthesizing;
    debug!(request_id, ?state, "Requesting synthesis");

    let first = tokio::time::timeout(first_chunk_timeout, async {
        let mut upstream = synthesizer.synthesize(text).await?;
        match upstream.next().await {
            Some(Ok(chunk)) => Ok((Some(chunk), Some(upstream))),
            Some(Err(e)) => Err(e),
            None => Ok((None, None)),
        }
    })
    .await
    .unwrap_or(Err(SynthesisError::Timeout(first_chunk_timeout)));

    let latency_ms = started.elapsed().as_millis() as u64;
    metrics.speech.record_request(latency_ms);

    match first {
        Ok((pending, upstream)) => {
            metrics.streams.record_started();
            debug!(request_id, latency_ms, "First audio chunk ready, streaming");
            Ok(RelayBody {
                request_id: request_id.to_string(),
                state: RelayState::Streaming,
                pending,
                upstream,
                bytes_sent: 0,
                chunks_sent: 0,
                started,
                metrics: metrics.streams.clone(),
            })
        }
        Err(e) => {
            metrics.speech.record_error();
            debug!(request_id, ?state, "Synthesis failed before streaming");
            Err(e)
        }
    }
}

/// Response body forwarding upstream chunks one by one, in order.
pub struct RelayBody {
    request_id: String,
    state: RelayState,
    pending: Option<Bytes>,
    /// `None` once the upstream stream has been exhausted.
    upstream: Option<AudioStream>,
    bytes_sent: u64,
    chunks_sent: u64,
    started: Instant,
    metrics: StreamMetrics,
}

impl RelayBody {
    pub fn state(&self) -> RelayState {
        self.state
    }

    fn forward(&mut self, chunk: Bytes) -> Poll<Option<Result<Bytes, SynthesisError>>> {
        self.bytes_sent += chunk.len() as u64;
        self.chunks_sent += 1;
        self.metrics.record_bytes(chunk.len());
        Poll::Ready(Some(Ok(chunk)))
    }

    fn complete(&mut self) -> Poll<Option<Result<Bytes, SynthesisError>>> {
        self.state = RelayState::Complete;
        self.upstream = None;
        self.metrics.record_completed();
        info!(
            request_id = %self.request_id,
            bytes = self.bytes_sent,
            chunks = self.chunks_sent,
            elapsed_ms = self.started.elapsed().as_millis() as u64,
            "Speech relay complete"
        );
        Poll::Ready(None)
    }

    fn fail(&mut self, e: SynthesisError) -> Poll<Option<Result<Bytes, SynthesisError>>> {
        self.state = RelayState::Failed;
        self.upstream = None;
        self.metrics.record_failed();
        error!(
            request_id = %self.request_id,
            bytes = self.bytes_sent,
            error = %e,
            "Speech stream failed after headers were sent, aborting response"
        );
        Poll::Ready(Some(Err(e)))
    }
}

impl Stream for RelayBody {
    type Item = Result<Bytes, SynthesisError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        if this.state.is_terminal() {
            return Poll::Ready(None);
        }
        if let Some(chunk) = this.pending.take() {
            return this.forward(chunk);
        }

        let Some(upstream) = this.upstream.as_mut() else {
            return this.complete();
        };
        match upstream.poll_next_unpin(cx) {
            Poll::Ready(Some(Ok(chunk))) => this.forward(chunk),
            Poll::Ready(Some(Err(e))) => this.fail(e),
            Poll::Ready(None) => this.complete(),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for RelayBody {
    fn drop(&mut self) {
        if self.state == RelayState::Streaming {
            self.state = RelayState::Cancelled;
            self.metrics.record_cancelled();
            warn!(
                request_id = %self.request_id,
                bytes = self.bytes_sent,
                "Client went away mid-stream, dropping upstream audio"
            );
        }
    }
}
