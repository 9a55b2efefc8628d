//! JSON client for the leaderboard endpoints

use log::debug;
use serde::de::DeserializeOwned;
use serde::Serialize;
use shared::{
    ErrorResponse, IssueSessionRequest, LeaderboardResponse, SessionGrant, SubmitScoreRequest,
};
use std::time::Duration;

/// Talks to one leaderboard server over a pooled HTTP client
pub struct Client {
    base_url: String,
    http: reqwest::Client,
}

/// Decodes a 2xx body, or turns the server's `{"error": ...}` into an error.
pub fn decode<T: DeserializeOwned>(
    status: u16,
    body: &[u8],
) -> Result<T, Box<dyn std::error::Error>> {
    if (200..300).contains(&status) {
        return Ok(serde_json::from_slice(body)?);
    }
    let reason = serde_json::from_slice::<ErrorResponse>(body)
        .map(|err| err.error)
        .unwrap_or_else(|_| String::from_utf8_lossy(body).into_owned());
    Err(format!("server answered {}: {}", status, reason).into())
}

/// `host:port` becomes `http://host:port`; full URLs are kept as given.
pub fn base_url(server: &str) -> String {
    let server = server.trim_end_matches('/');
    if server.starts_with("http://") || server.starts_with("https://") {
        server.to_string()
    } else {
        format!("http://{}", server)
    }
}

impl Client {
    /// Builds a client whose every request, connect included, is bounded by `timeout`.
    pub fn new(server: &str, timeout: Duration) -> Result<Self, Box<dyn std::error::Error>> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url(server),
            http,
        })
    }

    pub fn base(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, Box<dyn std::error::Error>> {
        let response = self.http.post(self.url(path)).json(body).send().await?;
        Self::read(response).await
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<T, Box<dyn std::error::Error>> {
        let response = self.http.get(self.url(path)).send().await?;
        Self::read(response).await
    }

    async fn read<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, Box<dyn std::error::Error>> {
        let status = response.status();
        let url = response.url().to_string();
        let body = response.bytes().await?;
        debug!("{} answered {}", url, status);
        decode(status.as_u16(), &body)
    }

    pub async fn request_session(
        &self,
        fingerprint: Option<String>,
    ) -> Result<SessionGrant, Box<dyn std::error::Error>> {
        self.post_json("/api/leaderboard/session", &IssueSessionRequest { fingerprint })
            .await
    }

    pub async fn submit(
        &self,
        submission: &SubmitScoreRequest,
    ) -> Result<LeaderboardResponse, Box<dyn std::error::Error>> {
        self.post_json("/api/leaderboard", submission).await
    }

    pub async fn leaderboard(&self) -> Result<LeaderboardResponse, Box<dyn std::error::Error>> {
        self.get("/api/leaderboard").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::assert_err;

    #[test]
    fn test_decode_error_body() {
        let err = decode::<SessionGrant>(409, br#"{"error":"Session already used"}"#).unwrap_err();
        assert_eq!(err.to_string(), "server answered 409: Session already used");

        let err = decode::<SessionGrant>(502, b"Bad Gateway").unwrap_err();
        assert_eq!(err.to_string(), "server answered 502: Bad Gateway");
    }

    #[test]
    fn test_decode_success_body() {
        let grant: SessionGrant =
            decode(200, br#"{"sessionId":"a","issuedAt":1,"expiresAt":2,"seed":3}"#).unwrap();
        assert_eq!(grant.seed, 3);
        assert!(decode::<SessionGrant>(200, b"{}").is_err());
    }

    #[test]
    fn test_base_url() {
        assert_eq!(base_url("127.0.0.1:8080"), "http://127.0.0.1:8080");
        assert_eq!(base_url("https://scores.example/"), "https://scores.example");
        let client = Client::new("localhost:9000", Duration::from_secs(1)).unwrap();
        assert_eq!(client.url("/api/leaderboard"), "http://localhost:9000/api/leaderboard");
    }

    #[tokio::test]
    async fn test_unreachable_server() {
        let client = Client::new("127.0.0.1:9", Duration::from_millis(500)).unwrap();
        assert_err!(client.leaderboard().await);
    }
}
