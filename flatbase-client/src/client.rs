use log::debug;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::{ClientError, ClientResult};

/// The access/refresh pair the client currently holds for its session.
/// Stored behind a lock on [`Client`] rather than cached on individual
/// [`crate::cursor::Cursor`]s, so that a refresh triggered by one cursor
/// is immediately visible to any other cursor opened from the same
/// client — the one-way back-reference described in DESIGN.md: cursors
/// read the client's tokens on each request instead of holding their own
/// copy.
#[derive(Debug, Clone)]
struct Tokens {
    access_token: String,
    refresh_token: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    #[allow(dead_code)]
    token_type: String,
}

#[derive(Debug, Serialize)]
struct RefreshRequest<'a> {
    access_token: &'a str,
    refresh_token: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(rename = "type")]
    pub(crate) type_name: String,
    pub(crate) msg: String,
}

/// A session bound to exactly one database, as returned by
/// [`Client::connect`]. This is the only public entry point into the
/// driver: there is no separate login-then-bind step and no environment
/// configuration, matching the protocol's "bind on connect" design.
pub struct Client {
    pub(crate) http: reqwest::Client,
    pub(crate) base_url: String,
    pub(crate) db_name: String,
    tokens: RwLock<Tokens>,
}

impl Client {
    /// Authenticate against `url` as `username`/`password` and bind the
    /// resulting session to `db_name`, mirroring `POST /auth/connect`.
    pub async fn connect(
        url: &str,
        username: &str,
        password: &str,
        db_name: &str,
    ) -> ClientResult<Client> {
        let http = reqwest::Client::new();
        let base_url = url.trim_end_matches('/').to_string();

        let resp = http
            .post(format!("{base_url}/auth/connect"))
            .query(&[("db_name", db_name)])
            .form(&[
                ("grant_type", "password"),
                ("username", username),
                ("password", password),
            ])
            .send()
            .await?;

        let pair = Self::parse_token_response(resp).await?;
        debug!("connected to '{db_name}' as '{username}'");

        Ok(Client {
            http,
            base_url,
            db_name: db_name.to_string(),
            tokens: RwLock::new(Tokens {
                access_token: pair.access_token,
                refresh_token: pair.refresh_token,
            }),
        })
    }

    /// Submit a SELECT statement and return a row-iterator [`crate::Cursor`]
    /// over its streamed result set.
    pub async fn execute(&self, query: &str) -> ClientResult<crate::Cursor<'_>> {
        crate::Cursor::execute(self, query).await
    }

    /// Release the session's database binding via `GET /auth/disconnect`.
    pub async fn disconnect(&self) -> ClientResult<()> {
        let bearer = self.bearer_header().await;
        let resp = self
            .http
            .get(format!("{}/auth/disconnect", self.base_url))
            .header(reqwest::header::AUTHORIZATION, bearer)
            .send()
            .await?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(Self::error_from_response(resp).await)
        }
    }

    /// Rotate the session's token pair via `POST /auth/refresh`, storing
    /// the new pair for every cursor sharing this client to pick up.
    pub(crate) async fn refresh(&self) -> ClientResult<()> {
        let (access_token, refresh_token) = {
            let tokens = self.tokens.read().await;
            (tokens.access_token.clone(), tokens.refresh_token.clone())
        };
        let resp = self
            .http
            .post(format!("{}/auth/refresh", self.base_url))
            .json(&RefreshRequest {
                access_token: &access_token,
                refresh_token: &refresh_token,
            })
            .send()
            .await?;
        let pair = Self::parse_token_response(resp).await?;
        let mut tokens = self.tokens.write().await;
        tokens.access_token = pair.access_token;
        tokens.refresh_token = pair.refresh_token;
        debug!("refreshed session token pair");
        Ok(())
    }

    pub(crate) async fn bearer_header(&self) -> String {
        format!("Bearer {}", self.tokens.read().await.access_token)
    }

    async fn parse_token_response(resp: reqwest::Response) -> ClientResult<TokenResponse> {
        if resp.status().is_success() {
            resp.json::<TokenResponse>()
                .await
                .map_err(ClientError::from)
        } else {
            Err(Self::error_from_response(resp).await)
        }
    }

    pub(crate) async fn error_from_response(resp: reqwest::Response) -> ClientError {
        let status = resp.status();
        match resp.json::<ErrorBody>().await {
            Ok(body) => ClientError::from_wire(&body.type_name, body.msg),
            Err(_) if status == reqwest::StatusCode::UNAUTHORIZED => {
                ClientError::Unauthorized("authentication rejected".to_string())
            }
            Err(e) => ClientError::Protocol(format!("malformed error body: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_trailing_slash_from_base_url() {
        // No network access in a unit test; just exercise the string op
        // `connect` performs before issuing any request.
        assert_eq!("http://localhost:8080".trim_end_matches('/'), "http://localhost:8080");
        assert_eq!("http://localhost:8080/".trim_end_matches('/'), "http://localhost:8080");
    }
}
