//! HTTP client for the Smart Device Management API (device read + command execution).
//!
//! - Blocking client using `ureq`; the async core reaches it through [`DeviceApi`],
//!   which hops onto the blocking thread pool for every call.
//! - Non-200 statuses are returned to the caller, not raised; only transport and
//!   auth failures become errors.
//!
//! Authentication
//! - OAuth2 refresh-token grant against Google's token endpoint, refreshed
//!   automatically shortly before expiry and once more on a 401.

use crate::models::sdm::Command;
use async_trait::async_trait;
use http::StatusCode;
use log::debug;
use serde_json::Value;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

const BASE_URL: &str = "https://smartdevicemanagement.googleapis.com/v1";
const OAUTH_TOKEN_URL: &str = "https://www.googleapis.com/oauth2/v4/token";
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(30);

#[derive(Debug)]
pub enum ClientError {
    Transport(String),
    Auth(String),
    Decode(String),
}

impl core::fmt::Display for ClientError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ClientError::Transport(s) => write!(f, "transport error: {}", s),
            ClientError::Auth(e) => write!(f, "auth error: {}", e),
            ClientError::Decode(e) => write!(f, "decode error: {}", e),
        }
    }
}

impl std::error::Error for ClientError {}

impl From<ureq::Error> for ClientError {
    fn from(value: ureq::Error) -> Self {
        ClientError::Transport(value.to_string())
    }
}

/// Status code plus typed body of a completed request.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse<T> {
    pub status: u16,
    pub body: T,
}

impl<T> ApiResponse<T> {
    pub fn is_ok(&self) -> bool {
        self.status == StatusCode::OK.as_u16()
    }
}

/// The cloud operations the bridge depends on.
#[async_trait]
pub trait DeviceApi: Send + Sync {
    /// Read the full device document. A non-200 status carries a `Null` body.
    async fn get_device(&self, device_id: &str) -> Result<ApiResponse<Value>, ClientError>;

    async fn execute_command(&self, device_id: &str, command: &Command) -> Result<ApiResponse<()>, ClientError>;
}

#[derive(Debug, Clone)]
pub struct OAuthCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
}

#[derive(Debug, Clone)]
struct OAuthToken {
    access_token: String,
    expires_at: Instant,
}

#[derive(Debug)]
struct OAuthState {
    token: Option<OAuthToken>,
    credentials: OAuthCredentials,
}

struct Inner {
    agent: ureq::Agent,
    project_id: String,
    oauth: Mutex<OAuthState>,
}

#[derive(Clone)]
pub struct SdmClient {
    inner: Arc<Inner>,
}

impl SdmClient {
    pub fn new(project_id: impl Into<String>, credentials: OAuthCredentials) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .build()
            .into();

        SdmClient {
            inner: Arc::new(Inner {
                agent,
                project_id: project_id.into(),
                oauth: Mutex::new(OAuthState {
                    token: None,
                    credentials,
                }),
            }),
        }
    }

    /// Exchange the refresh token up front so bad credentials fail at startup.
    pub async fn authenticate(&self) -> Result<(), ClientError> {
        let inner = Arc::clone(&self.inner);
        run_blocking(move || inner.bearer().map(|_| ())).await
    }
}

impl Inner {
    fn device_url(&self, device_id: &str) -> String {
        if device_id.starts_with("enterprises/") {
            format!("{}/{}", BASE_URL, device_id)
        } else {
            format!("{}/enterprises/{}/devices/{}", BASE_URL, self.project_id, device_id)
        }
    }

    fn refresh_grant(&self, state: &mut OAuthState) -> Result<(), ClientError> {
        let creds = &state.credentials;
        let resp = self
            .agent
            .post(OAUTH_TOKEN_URL)
            .header("Accept", "application/json")
            .send_form([
                ("client_id", creds.client_id.as_str()),
                ("client_secret", creds.client_secret.as_str()),
                ("grant_type", "refresh_token"),
                ("refresh_token", creds.refresh_token.as_str()),
            ])?;

        let (token, rotated) = parse_token_response(resp)?;
        if let Some(refresh_token) = rotated {
            state.credentials.refresh_token = refresh_token;
        }
        state.token = Some(token);
        Ok(())
    }

    fn bearer(&self) -> Result<String, ClientError> {
        let mut state = self.oauth.lock().unwrap_or_else(PoisonError::into_inner);
        let needs_refresh = match &state.token {
            None => true,
            Some(t) => Instant::now() + TOKEN_EXPIRY_MARGIN >= t.expires_at,
        };
        if needs_refresh {
            self.refresh_grant(&mut state)?;
        }
        state
            .token
            .as_ref()
            .map(|t| t.access_token.clone())
            .ok_or_else(|| ClientError::Auth("no access token after refresh".to_string()))
    }

    fn force_refresh(&self) -> Result<(), ClientError> {
        let mut state = self.oauth.lock().unwrap_or_else(PoisonError::into_inner);
        self.refresh_grant(&mut state)
    }

    /// Run an authenticated request, retrying once with a fresh token on 401.
    fn send_authed<F>(&self, send: F) -> Result<http::Response<ureq::Body>, ClientError>
    where
        F: Fn(&str) -> Result<http::Response<ureq::Body>, ureq::Error>,
    {
        let token = self.bearer()?;
        let resp = send(&token)?;
        if resp.status() != StatusCode::UNAUTHORIZED {
            return Ok(resp);
        }

        debug!("SDM returned 401; forcing token refresh");
        self.force_refresh()?;
        let token = self.bearer()?;
        Ok(send(&token)?)
    }

    fn get_device(&self, device_id: &str) -> Result<ApiResponse<Value>, ClientError> {
        let url = self.device_url(device_id);
        let mut resp = self.send_authed(|token| {
            self.agent
                .get(&url)
                .header("Accept", "application/json")
                .header("Authorization", format!("Bearer {}", token))
                .call()
        })?;

        let status = resp.status();
        if status != StatusCode::OK {
            let body = resp.body_mut().read_to_string().unwrap_or_else(|_| String::from("<no body>"));
            debug!("GET {} returned http {}: {}", url, status.as_u16(), body);
            return Ok(ApiResponse {
                status: status.as_u16(),
                body: Value::Null,
            });
        }

        let body: Value = resp
            .body_mut()
            .read_json()
            .map_err(|e| ClientError::Decode(format!("device document: {}", e)))?;
        Ok(ApiResponse {
            status: status.as_u16(),
            body,
        })
    }

    fn execute_command(&self, device_id: &str, command: &Command) -> Result<ApiResponse<()>, ClientError> {
        let url = format!("{}:executeCommand", self.device_url(device_id));
        let payload = command.to_wire();
        let mut resp = self.send_authed(|token| {
            self.agent
                .post(&url)
                .header("Accept", "application/json")
                .header("Authorization", format!("Bearer {}", token))
                .send_json(&payload)
        })?;

        let status = resp.status();
        if status != StatusCode::OK {
            let body = resp.body_mut().read_to_string().unwrap_or_else(|_| String::from("<no body>"));
            debug!("{} {} returned http {}: {}", command.name, url, status.as_u16(), body);
        }
        Ok(ApiResponse {
            status: status.as_u16(),
            body: (),
        })
    }
}

fn parse_token_response(mut resp: http::Response<ureq::Body>) -> Result<(OAuthToken, Option<String>), ClientError> {
    #[derive(serde::Deserialize)]
    struct R {
        access_token: String,
        expires_in: u64,
        #[serde(default)]
        refresh_token: Option<String>,
    }

    let status = resp.status();
    let text = resp.body_mut().read_to_string()?;
    if status != StatusCode::OK {
        return Err(ClientError::Auth(format!("http {}: {}", status.as_u16(), text)));
    }

    let de = &mut serde_json::Deserializer::from_str(&text);
    let R {
        access_token,
        expires_in,
        refresh_token,
    } = serde_path_to_error::deserialize(de)
        .map_err(|e| ClientError::Auth(format!("token response at {}: {}", e.path(), e.inner())))?;

    let token = OAuthToken {
        access_token,
        expires_at: Instant::now() + Duration::from_secs(expires_in),
    };
    Ok((token, refresh_token))
}

async fn run_blocking<T, F>(f: F) -> Result<T, ClientError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, ClientError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ClientError::Transport(format!("blocking task failed: {}", e)))?
}

#[async_trait]
impl DeviceApi for SdmClient {
    async fn get_device(&self, device_id: &str) -> Result<ApiResponse<Value>, ClientError> {
        let inner = Arc::clone(&self.inner);
        let device_id = device_id.to_string();
        run_blocking(move || inner.get_device(&device_id)).await
    }

    async fn execute_command(&self, device_id: &str, command: &Command) -> Result<ApiResponse<()>, ClientError> {
        let inner = Arc::clone(&self.inner);
        let device_id = device_id.to_string();
        let command = command.clone();
        run_blocking(move || inner.execute_command(&device_id, &command)).await
    }
}
