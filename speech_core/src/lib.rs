//! Client side of the speech synthesis service.
//!
//! The server only ever talks to the synthesis vendor through the
//! [`SpeechSynthesizer`] trait, so handlers can be exercised with an
//! in-process implementation and the real [`ElevenLabsClient`] is built once
//! at startup.

mod client;
mod error;
pub mod stream;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use client::{ElevenLabsClient, DEFAULT_API_BASE};
pub use error::SynthesisError;
pub use stream::AudioStream;

/// ElevenLabs "Rachel" voice.
pub const DEFAULT_VOICE_ID: &str = "21m00Tcm4TlvDq8ikWAM";
pub const DEFAULT_MODEL_ID: &str = "eleven_turbo_v2";
pub const DEFAULT_OUTPUT_FORMAT: &str = "mp3_44100_128";

/// Fixed synthesis parameters. Chosen once per process, never per request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceProfile {
    pub voice_id: String,
    pub model_id: String,
    pub output_format: String,
}

impl Default for VoiceProfile {
    fn default() -> Self {
        Self {
            voice_id: DEFAULT_VOICE_ID.to_string(),
            model_id: DEFAULT_MODEL_ID.to_string(),
            output_format: DEFAULT_OUTPUT_FORMAT.to_string(),
        }
    }
}

/// Something that turns text into a stream of encoded audio bytes.
///
/// `synthesize` resolves once the upstream service has accepted the request;
/// the returned stream then yields audio chunks in the order the service
/// produced them.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str) -> Result<AudioStream, SynthesisError>;

    /// Voice parameters every request is synthesized with.
    fn profile(&self) -> &VoiceProfile;
}
