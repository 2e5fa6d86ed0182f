use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::info;

pub const DEFAULT_API_PATH: &str = "api.daily.co/v1";

/// Rooms and tokens expire one hour after creation.
const ROOM_LIFETIME_SECS: i64 = 60 * 60;

#[derive(Debug, Error)]
pub enum RoomError {
    #[error("No room URL specified")]
    MissingRoomUrl,

    #[error("request to room service failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("room service returned {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("room service response is missing `{0}`")]
    MissingField(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub url: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeetingToken {
    pub token: String,
}

#[async_trait]
pub trait RoomService: Send + Sync {
    async fn create_room(&self) -> Result<Room, RoomError>;

    /// Mint an owner token for the room at `room_url`.
    async fn meeting_token(&self, room_url: &str) -> Result<MeetingToken, RoomError>;
}

/// Room name is the URL path without its leading slash.
pub fn room_name_from_url(room_url: &str) -> String {
    match url::Url::parse(room_url) {
        Ok(parsed) => {
            let path = parsed.path();
            path.strip_prefix('/').unwrap_or(path).to_string()
        }
        Err(_) => String::new(),
    }
}

#[derive(Deserialize)]
struct RoomResponse {
    url: Option<String>,
    name: Option<String>,
}

#[derive(Deserialize)]
struct TokenResponse {
    token: Option<String>,
}

/// REST client for the Daily rooms API.
pub struct DailyRoomClient {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl DailyRoomClient {
    /// `api_path` is host plus path prefix without scheme, e.g. `api.daily.co/v1`.
    /// Requests go out over https.
    pub fn new(api_key: impl Into<String>, api_path: impl AsRef<str>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: format!("https://{}", api_path.as_ref().trim_end_matches('/')),
            client: reqwest::Client::new(),
        }
    }

    /// Replace the scheme, host and path prefix in one go.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, resource: &str) -> String {
        format!("{}/{}", self.base_url, resource)
    }

    fn room_properties(now: i64) -> serde_json::Value {
        json!({
            "exp": now + ROOM_LIFETIME_SECS,
            "enable_chat": true,
            "enable_emoji_reactions": true,
            "eject_at_room_exp": true,
            "enable_prejoin_ui": false,
        })
    }

    fn token_properties(room_name: &str, now: i64) -> serde_json::Value {
        json!({
            "room_name": room_name,
            "is_owner": true,
            "exp": now + ROOM_LIFETIME_SECS,
        })
    }

    async fn post(&self, resource: &str, properties: serde_json::Value) -> Result<reqwest::Response, RoomError> {
        let response = self
            .client
            .post(self.endpoint(resource))
            .bearer_auth(&self.api_key)
            .json(&json!({ "properties": properties }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RoomError::Upstream {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl RoomService for DailyRoomClient {
    async fn create_room(&self) -> Result<Room, RoomError> {
        let now = Utc::now().timestamp();
        let response: RoomResponse = self
            .post("rooms", Self::room_properties(now))
            .await?
            .json()
            .await?;

        let room = Room {
            url: response.url.ok_or(RoomError::MissingField("url"))?,
            name: response.name.ok_or(RoomError::MissingField("name"))?,
        };
        info!(room = %room.name, "Created room");
        Ok(room)
    }

    async fn meeting_token(&self, room_url: &str) -> Result<MeetingToken, RoomError> {
        if room_url.trim().is_empty() {
            return Err(RoomError::MissingRoomUrl);
        }
        let room_name = room_name_from_url(room_url);
        let now = Utc::now().timestamp();
        let response: TokenResponse = self
            .post("meeting-tokens", Self::token_properties(&room_name, now))
            .await?
            .json()
            .await?;

        let token = response.token.ok_or(RoomError::MissingField("token"))?;
        info!(room = %room_name, expires_in_secs = ROOM_LIFETIME_SECS, "Issued meeting token");
        Ok(MeetingToken { token })
    }
}
