//! Typed client for the storefront authentication API.
//!
//! Centralizes session-aware requests so callers never touch raw cookies.
//! The client keeps two copies of the session token, one in memory and one
//! in the cookie jar, and keeps them in sync by writing both on every
//! transition. [`AuthClient::initialize`] hydrates the in-memory state from
//! the jar once; afterwards the state only changes through explicit calls.

use reqwest::{
    StatusCode, Url,
    cookie::{CookieStore, Jar},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use thiserror::Error as ThisError;
use tokio::sync::Mutex;

const SESSION_COOKIE_NAME: &str = "auth-token";

#[derive(Debug, ThisError)]
pub enum Error {
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{status}: {message}")]
    Api { status: StatusCode, message: String },
}

/// Where the client currently stands with the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// [`AuthClient::initialize`] has not run yet.
    Uninitialized,
    /// No session token is held.
    Anonymous,
    /// A session token is held in memory and mirrored to the cookie jar.
    Authenticated(String),
}

/// Profile submitted when registering a new customer account.
#[derive(Debug, Clone, Serialize)]
pub struct NewCustomer {
    pub name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub street: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zipcode: Option<String>,
    pub password: String,
}

/// Authenticated user as reported by `GET /auth/session`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct SessionUser {
    pub id: String,
    pub email: String,
    pub name: String,
    pub provider: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: String,
}

#[derive(Debug, Deserialize)]
struct OtpRequestResponse {
    #[serde(rename = "expiresInSec")]
    expires_in_sec: u64,
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    user: SessionUser,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    error: String,
}

pub struct AuthClient {
    http: reqwest::Client,
    base_url: Url,
    jar: Arc<Jar>,
    session: Mutex<SessionState>,
}

impl AuthClient {
    /// Build a client against the given API base URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL does not parse or the HTTP client
    /// cannot be built.
    pub fn new(base_url: &str) -> Result<Self, Error> {
        let base_url = Url::parse(base_url)?;
        let jar = Arc::new(Jar::default());
        let http = reqwest::Client::builder()
            .user_agent(crate::APP_USER_AGENT)
            .cookie_provider(jar.clone())
            .build()?;
        Ok(Self {
            http,
            base_url,
            jar,
            session: Mutex::new(SessionState::Uninitialized),
        })
    }

    /// Hydrate the session state from the cookie jar.
    ///
    /// Runs once: a client that already left [`SessionState::Uninitialized`]
    /// keeps its current state no matter what the jar holds.
    pub async fn initialize(&self) -> SessionState {
        let mut session = self.session.lock().await;
        if *session == SessionState::Uninitialized {
            *session = match self.cookie_token() {
                Some(token) => SessionState::Authenticated(token),
                None => SessionState::Anonymous,
            };
        }
        session.clone()
    }

    pub async fn state(&self) -> SessionState {
        self.session.lock().await.clone()
    }

    /// Session token currently held in memory, if any.
    pub async fn token(&self) -> Option<String> {
        match &*self.session.lock().await {
            SessionState::Authenticated(token) => Some(token.clone()),
            _ => None,
        }
    }

    /// Log in with an identifier and password.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server rejects the
    /// credentials.
    pub async fn login(&self, identifier: &str, password: &str) -> Result<(), Error> {
        let body = json!({ "identifier": identifier, "password": password });
        let response = self.post_json("/auth/login", &body).await?;
        let body: TokenResponse = response.json().await?;
        self.store_token(&body.token).await;
        Ok(())
    }

    /// Register a new account. The server logs the account in on success, so
    /// the client becomes authenticated as well.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the profile is rejected.
    pub async fn register(&self, customer: &NewCustomer) -> Result<(), Error> {
        let response = self.post_json("/auth/register", customer).await?;
        let body: TokenResponse = response.json().await?;
        self.store_token(&body.token).await;
        Ok(())
    }

    /// Request a one-time code for the identifier. Returns the code's
    /// lifetime in seconds; the code itself never travels to this client.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the identifier is unknown.
    pub async fn request_code(&self, identifier: &str) -> Result<u64, Error> {
        let body = json!({ "identifier": identifier });
        let response = self.post_json("/auth/otp/request", &body).await?;
        let body: OtpRequestResponse = response.json().await?;
        Ok(body.expires_in_sec)
    }

    /// Redeem a one-time code for a session.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the code is rejected.
    pub async fn verify_code(&self, identifier: &str, code: &str) -> Result<(), Error> {
        let body = json!({ "identifier": identifier, "code": code });
        let response = self.post_json("/auth/otp/verify", &body).await?;
        let body: TokenResponse = response.json().await?;
        self.store_token(&body.token).await;
        Ok(())
    }

    /// Fetch the current session using cookie-based auth. Returns `None`
    /// when the session is missing, expired, or revoked.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn session(&self) -> Result<Option<SessionUser>, Error> {
        let response = self.http.get(self.endpoint("/auth/session")?).send().await?;
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        let response = Self::error_for_response(response).await?;
        let body: SessionResponse = response.json().await?;
        Ok(Some(body.user))
    }

    /// End the session. Local state and the cookie jar are cleared first, so
    /// the client is anonymous even when the server call fails. The old token
    /// is then presented to the server as a bearer credential so it can be
    /// revoked.
    ///
    /// # Errors
    ///
    /// Returns an error if the server-side logout could not be delivered.
    pub async fn logout(&self) -> Result<(), Error> {
        let token = self.token().await;
        self.clear_session().await;

        let mut request = self.http.post(self.endpoint("/auth/logout")?);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?;
        Self::error_for_response(response).await?;
        Ok(())
    }

    /// URL to open in a browser to start the federated login flow.
    ///
    /// # Errors
    ///
    /// Returns an error if the path does not join onto the base URL.
    pub fn federated_login_url(&self) -> Result<Url, Error> {
        self.endpoint("/auth/federated")
    }

    /// Adopt a session token obtained outside this client, such as a
    /// federated login completed in a browser window.
    pub async fn adopt_token(&self, token: &str) {
        self.store_token(token).await;
    }

    async fn store_token(&self, token: &str) {
        let mut session = self.session.lock().await;
        *session = SessionState::Authenticated(token.to_string());
        self.jar.add_cookie_str(
            &format!("{SESSION_COOKIE_NAME}={token}; Path=/"),
            &self.base_url,
        );
    }

    async fn clear_session(&self) {
        let mut session = self.session.lock().await;
        *session = SessionState::Anonymous;
        self.jar.add_cookie_str(
            &format!("{SESSION_COOKIE_NAME}=; Path=/; Max-Age=0"),
            &self.base_url,
        );
    }

    fn cookie_token(&self) -> Option<String> {
        let header = self.jar.cookies(&self.base_url)?;
        let raw = header.to_str().ok()?;
        raw.split(';').find_map(|pair| {
            let mut parts = pair.trim().splitn(2, '=');
            match (parts.next(), parts.next()) {
                (Some(name), Some(value)) if name == SESSION_COOKIE_NAME && !value.is_empty() => {
                    Some(value.to_string())
                }
                _ => None,
            }
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, Error> {
        Ok(self.base_url.join(path)?)
    }

    async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<reqwest::Response, Error> {
        let response = self
            .http
            .post(self.endpoint(path)?)
            .json(body)
            .send()
            .await?;
        Self::error_for_response(response).await
    }

    async fn error_for_response(response: reqwest::Response) -> Result<reqwest::Response, Error> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = match response.json::<ApiError>().await {
            Ok(body) => body.error,
            Err(_) => status.to_string(),
        };
        Err(Error::Api { status, message })
    }
}
