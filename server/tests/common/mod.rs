//! Shared fixtures for router tests: in-process synthesizers and a room
//! service stand-in, plus a helper that builds the real router around them.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use bytes::Bytes;
use futures_util::{stream, StreamExt};

use room_core::{room_name_from_url, MeetingToken, Room, RoomError, RoomService};
use server::{build_router, config::ServerConfig, AppState};
use speech_core::{AudioStream, SpeechSynthesizer, SynthesisError, VoiceProfile};

/// Returns the request text as audio, a few bytes per chunk, yielding to the
/// scheduler between chunks so concurrent relays interleave.
pub struct EchoSynthesizer {
    pub chunk_size: usize,
    pub calls: AtomicUsize,
    profile: VoiceProfile,
}

impl EchoSynthesizer {
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size,
            calls: AtomicUsize::new(0),
            profile: VoiceProfile::default(),
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for EchoSynthesizer {
    async fn synthesize(&self, text: &str) -> Result<AudioStream, SynthesisError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let chunks: Vec<Bytes> = text
            .as_bytes()
            .chunks(self.chunk_size)
            .map(Bytes::copy_from_slice)
            .collect();
        Ok(stream::iter(chunks)
            .then(|chunk| async move {
                tokio::task::yield_now().await;
                Ok(chunk)
            })
            .boxed())
    }

    fn profile(&self) -> &VoiceProfile {
        &self.profile
    }
}

/// Plays back a fixed list of chunks, optionally followed by an error,
/// yielding before each item the way a network body would.
pub struct ScriptedSynthesizer {
    pub chunks: Vec<Bytes>,
    pub fail_after: bool,
    profile: VoiceProfile,
}

impl ScriptedSynthesizer {
    pub fn chunks(chunks: &[&'static [u8]]) -> Self {
        Self {
            chunks: chunks.iter().map(|c| Bytes::from_static(*c)).collect(),
            fail_after: false,
            profile: VoiceProfile::default(),
        }
    }

    pub fn failing_after(chunks: &[&'static [u8]]) -> Self {
        Self {
            fail_after: true,
            ..Self::chunks(chunks)
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for ScriptedSynthesizer {
    async fn synthesize(&self, _text: &str) -> Result<AudioStream, SynthesisError> {
        let mut items: Vec<Result<Bytes, SynthesisError>> =
            self.chunks.iter().cloned().map(Ok).collect();
        if self.fail_after {
            items.push(Err(SynthesisError::Stream("connection reset by peer".into())));
        }
        Ok(stream::iter(items)
            .then(|item| async move {
                tokio::task::yield_now().await;
                item
            })
            .boxed())
    }

    fn profile(&self) -> &VoiceProfile {
        &self.profile
    }
}

/// Refuses every request the way the service does for a bad key.
pub struct RejectingSynthesizer {
    profile: VoiceProfile,
}

impl RejectingSynthesizer {
    pub fn new() -> Self {
        Self {
            profile: VoiceProfile::default(),
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for RejectingSynthesizer {
    async fn synthesize(&self, _text: &str) -> Result<AudioStream, SynthesisError> {
        Err(SynthesisError::Upstream {
            status: 401,
            body: r#"{"detail":{"status":"invalid_api_key"}}"#.to_string(),
        })
    }

    fn profile(&self) -> &VoiceProfile {
        &self.profile
    }
}

/// Sits on the request for `delay` before producing any audio.
pub struct SlowSynthesizer {
    pub delay: Duration,
    profile: VoiceProfile,
}

impl SlowSynthesizer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            profile: VoiceProfile::default(),
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for SlowSynthesizer {
    async fn synthesize(&self, _text: &str) -> Result<AudioStream, SynthesisError> {
        tokio::time::sleep(self.delay).await;
        Ok(stream::once(async { Ok(Bytes::from_static(b"too late")) }).boxed())
    }

    fn profile(&self) -> &VoiceProfile {
        &self.profile
    }
}

/// Emits a 1 KiB chunk every `interval` forever. `live` counts streams that have
/// not been dropped yet.
pub struct EndlessSynthesizer {
    pub live: Arc<AtomicUsize>,
    pub interval: Duration,
    profile: VoiceProfile,
}

impl EndlessSynthesizer {
    pub fn new(interval: Duration) -> Self {
        Self {
            live: Arc::new(AtomicUsize::new(0)),
            interval,
            profile: VoiceProfile::default(),
        }
    }
}

struct LiveGuard(Arc<AtomicUsize>);

impl Drop for LiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl SpeechSynthesizer for EndlessSynthesizer {
    async fn synthesize(&self, _text: &str) -> Result<AudioStream, SynthesisError> {
        self.live.fetch_add(1, Ordering::SeqCst);
        let guard = LiveGuard(self.live.clone());
        let interval = self.interval;
        Ok(stream::repeat(())
            .then(move |_| async move {
                tokio::time::sleep(interval).await;
                Ok(Bytes::from_static(&[0xFF; 1024]))
            })
            .map(move |item| {
                let _guard = &guard;
                item
            })
            .boxed())
    }

    fn profile(&self) -> &VoiceProfile {
        &self.profile
    }
}

pub struct MockRooms;

#[async_trait]
impl RoomService for MockRooms {
    async fn create_room(&self) -> Result<Room, RoomError> {
        Ok(Room {
            url: "https://demo.daily.co/storyroom".to_string(),
            name: "storyroom".to_string(),
        })
    }

    async fn meeting_token(&self, room_url: &str) -> Result<MeetingToken, RoomError> {
        if room_url.trim().is_empty() {
            return Err(RoomError::MissingRoomUrl);
        }
        Ok(MeetingToken {
            token: format!("token-for-{}", room_name_from_url(room_url)),
        })
    }
}

pub fn test_config() -> ServerConfig {
    ServerConfig {
        public_dir: PathBuf::from("/nonexistent/public"),
        ..ServerConfig::default()
    }
}

pub fn test_state(synthesizer: Arc<dyn SpeechSynthesizer>) -> AppState {
    AppState::new(synthesizer, test_config())
}

/// Create a test app instance around the real router.
pub fn create_test_app(synthesizer: Arc<dyn SpeechSynthesizer>) -> Router {
    build_router(test_state(synthesizer))
}
