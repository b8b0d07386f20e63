//! Platform-presence providers for username lookups
//!
//! One provider per social platform. A profile URL answering 200 means the
//! username exists; 404 means it does not. Rate-limit responses are treated
//! as transient so the dispatcher can retry them.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use crate::error::ProviderError;
use crate::model::QueryKind;

use super::Provider;

/// Platforms checked for a username, with `{}` as the username placeholder
pub const PLATFORMS: &[(&str, &str)] = &[
    ("GitHub", "https://github.com/{}"),
    ("Twitter", "https://twitter.com/{}"),
    ("Instagram", "https://instagram.com/{}"),
    ("Reddit", "https://reddit.com/user/{}"),
    ("TikTok", "https://tiktok.com/@{}"),
    ("LinkedIn", "https://linkedin.com/in/{}"),
    ("Facebook", "https://facebook.com/{}"),
    ("Pinterest", "https://pinterest.com/{}"),
    ("YouTube", "https://youtube.com/@{}"),
    ("Twitch", "https://twitch.tv/{}"),
    ("Discord", "https://discord.com/users/{}"),
    ("Telegram", "https://t.me/{}"),
    ("Medium", "https://medium.com/@{}"),
    ("DeviantArt", "https://www.deviantart.com/{}"),
    ("Behance", "https://behance.net/{}"),
    ("Dribbble", "https://dribbble.com/{}"),
    ("Patreon", "https://patreon.com/{}"),
    ("Snapchat", "https://snapchat.com/add/{}"),
    ("Steam", "https://steamcommunity.com/id/{}"),
    ("Spotify", "https://open.spotify.com/user/{}"),
];

/// Presence check against one platform's profile URL
pub struct PlatformProvider {
    id: String,
    platform: String,
    url_template: String,
    http: reqwest::Client,
    timeout: Duration,
}

impl PlatformProvider {
    pub fn new(
        platform: &str,
        url_template: &str,
        http: reqwest::Client,
        timeout: Duration,
    ) -> Self {
        Self {
            id: format!("platform-{}", platform.to_lowercase()),
            platform: platform.to_string(),
            url_template: url_template.to_string(),
            http,
            timeout,
        }
    }

    fn profile_url(&self, username: &str) -> String {
        self.url_template.replace("{}", username)
    }
}

#[async_trait]
impl Provider for PlatformProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> QueryKind {
        QueryKind::Username
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn max_retries(&self) -> u32 {
        1
    }

    async fn query(&self, target: &str) -> Result<serde_json::Value, ProviderError> {
        // Reject usernames that break the substituted URL before dialing out
        let url = url::Url::parse(&self.profile_url(target))
            .map_err(|e| ProviderError::Fatal(format!("invalid probe url: {e}")))?;

        let response = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(|e| ProviderError::Transient(e.to_string()))?;

        let status = response.status();
        match status.as_u16() {
            200 => Ok(json!({
                "platform": self.platform,
                "exists": true,
                "url": url.as_str(),
                "status_code": 200,
            })),
            404 | 410 => Err(ProviderError::NotFound),
            429 | 502 | 503 | 504 => Err(ProviderError::Transient(format!(
                "{} answered {}",
                self.platform, status
            ))),
            // Soft blocks (auth walls, bot checks) are a definitive non-answer
            _ => Err(ProviderError::Fatal(format!(
                "{} answered {}",
                self.platform, status
            ))),
        }
    }
}
