use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, warn};

use crate::{stream, AudioStream, SpeechSynthesizer, SynthesisError, VoiceProfile};

pub const DEFAULT_API_BASE: &str = "https://api.elevenlabs.io";

/// Body of the streaming text-to-speech request.
#[derive(Serialize)]
struct SpeechRequest<'a> {
    text: &'a str,
    model_id: &'a str,
}

/// Streaming client for the ElevenLabs text-to-speech API.
#[derive(Clone)]
pub struct ElevenLabsClient {
    api_key: String,
    base_url: String,
    profile: VoiceProfile,
    client: reqwest::Client,
}

impl fmt::Debug for ElevenLabsClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElevenLabsClient")
            .field("base_url", &self.base_url)
            .field("profile", &self.profile)
            .finish_non_exhaustive()
    }
}

impl ElevenLabsClient {
    pub fn new(api_key: impl Into<String>, profile: VoiceProfile) -> Result<Self, SynthesisError> {
        Self::with_connect_timeout(api_key, profile, Duration::from_secs(10))
    }

    /// Only the connect phase is bounded; an audio body can legitimately
    /// take longer than any fixed timeout to finish streaming.
    pub fn with_connect_timeout(
        api_key: impl Into<String>,
        profile: VoiceProfile,
        connect_timeout: Duration,
    ) -> Result<Self, SynthesisError> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()?;
        Ok(Self {
            api_key: api_key.into(),
            base_url: DEFAULT_API_BASE.to_string(),
            profile,
            client,
        })
    }

    /// Point the client at a different API host (proxy, regional endpoint).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `{base}/v1/text-to-speech/{voice}/stream?output_format={format}`
    pub fn stream_url(&self) -> String {
        format!(
            "{}/v1/text-to-speech/{}/stream?output_format={}",
            self.base_url, self.profile.voice_id, self.profile.output_format
        )
    }
}

#[async_trait]
impl SpeechSynthesizer for ElevenLabsClient {
    async fn synthesize(&self, text: &str) -> Result<AudioStream, SynthesisError> {
        let url = self.stream_url();
        debug!(
            voice = %self.profile.voice_id,
            model = %self.profile.model_id,
            text_len = text.len(),
            "Requesting speech stream"
        );

        let response = self
            .client
            .post(&url)
            .header("xi-api-key", &self.api_key)
            .header(reqwest::header::ACCEPT, "audio/mpeg")
            .json(&SpeechRequest {
                text,
                model_id: &self.profile.model_id,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "Synthesis service rejected request");
            return Err(SynthesisError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        Ok(stream::from_response(response))
    }

    fn profile(&self) -> &VoiceProfile {
        &self.profile
    }
}
