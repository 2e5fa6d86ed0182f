// Configuration for the relay server, read once at startup.

use std::{fmt, path::PathBuf, time::Duration};

use speech_core::VoiceProfile;
use thiserror::Error;

pub const API_KEY_VAR: &str = "ELEVENLABS_API_KEY";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing {0} in environment variables")]
    MissingVar(&'static str),
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub public_dir: PathBuf,
    pub request_timeout_secs: u64,
    pub upstream_connect_timeout_secs: u64,
    pub cors_allowed_origins: Option<Vec<String>>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            public_dir: PathBuf::from("public"),
            request_timeout_secs: 60,
            upstream_connect_timeout_secs: 10,
            cors_allowed_origins: None,
        }
    }
}

impl ServerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn upstream_connect_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_connect_timeout_secs)
    }
}

/// Credentials and fixed voice for the synthesis service.
#[derive(Clone)]
pub struct SpeechConfig {
    pub api_key: String,
    pub api_base: String,
    pub profile: VoiceProfile,
}

impl fmt::Debug for SpeechConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpeechConfig")
            .field("api_key", &"<redacted>")
            .field("api_base", &self.api_base)
            .field("profile", &self.profile)
            .finish()
    }
}

/// Room routes are only mounted with a key; absence is not an error.
#[derive(Clone)]
pub struct RoomConfig {
    pub api_key: Option<String>,
    pub api_path: String,
}

impl fmt::Debug for RoomConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoomConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("api_path", &self.api_path)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub speech: SpeechConfig,
    pub rooms: RoomConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = ServerConfig::default();
        let voice = VoiceProfile::default();

        let api_key = get(API_KEY_VAR).ok_or(ConfigError::MissingVar(API_KEY_VAR))?;

        let port = get("PORT")
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.port);

        let request_timeout_secs = get("REQUEST_TIMEOUT_SECS")
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.request_timeout_secs);

        let upstream_connect_timeout_secs = get("UPSTREAM_CONNECT_TIMEOUT_SECS")
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.upstream_connect_timeout_secs);

        let cors_allowed_origins = get("CORS_ALLOWED_ORIGINS").map(|origins| {
            origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        });

        Ok(Self {
            server: ServerConfig {
                host: get("HOST").unwrap_or(defaults.host),
                port,
                public_dir: get("PUBLIC_DIR").map(PathBuf::from).unwrap_or(defaults.public_dir),
                request_timeout_secs,
                upstream_connect_timeout_secs,
                cors_allowed_origins,
            },
            speech: SpeechConfig {
                api_key,
                api_base: get("ELEVENLABS_API_URL")
                    .unwrap_or_else(|| speech_core::DEFAULT_API_BASE.to_string()),
                profile: VoiceProfile {
                    voice_id: get("SPEECH_VOICE_ID").unwrap_or(voice.voice_id),
                    model_id: get("SPEECH_MODEL_ID").unwrap_or(voice.model_id),
                    output_format: get("SPEECH_OUTPUT_FORMAT").unwrap_or(voice.output_format),
                },
            },
            rooms: RoomConfig {
                api_key: get("DAILY_API_KEY"),
                api_path: get("DAILY_API_URL")
                    .unwrap_or_else(|| room_core::DEFAULT_API_PATH.to_string()),
            },
        })
    }
}
