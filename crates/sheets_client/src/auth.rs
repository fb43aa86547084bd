//! Google OAuth credentials.
//!
//! Three sources are supported: a bearer token minted elsewhere, an
//! `authorized_user` JSON file (client id/secret + refresh token), and a
//! `service_account` key file whose RS256-signed JWT assertion is exchanged
//! for an access token.

use std::path::Path;

use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};

use crate::error::SheetsError;

pub const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
pub const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Lifetime requested for service-account assertions (Google's maximum).
const ASSERTION_TTL_SECS: i64 = 3600;

/// Refresh-token credentials (`"type": "authorized_user"`).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AuthorizedUser {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
}

/// Service-account key (`"type": "service_account"`).
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct ServiceAccount {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    TOKEN_URL.to_string()
}

// Keeps the private key out of logs.
impl std::fmt::Debug for ServiceAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccount")
            .field("client_email", &self.client_email)
            .field("private_key_id", &self.private_key_id)
            .field("token_uri", &self.token_uri)
            .finish_non_exhaustive()
    }
}

/// Credentials that can mint access tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    AuthorizedUser(AuthorizedUser),
    ServiceAccount(ServiceAccount),
}

impl Credentials {
    /// Token endpoint for these credentials.
    pub fn token_uri(&self) -> &str {
        match self {
            Credentials::AuthorizedUser(_) => TOKEN_URL,
            Credentials::ServiceAccount(sa) => &sa.token_uri,
        }
    }
}

impl From<AuthorizedUser> for Credentials {
    fn from(user: AuthorizedUser) -> Self {
        Credentials::AuthorizedUser(user)
    }
}

impl From<ServiceAccount> for Credentials {
    fn from(sa: ServiceAccount) -> Self {
        Credentials::ServiceAccount(sa)
    }
}

#[derive(Debug, Deserialize)]
struct CredentialsFile {
    #[serde(rename = "type")]
    kind: Option<String>,
    client_id: Option<String>,
    client_secret: Option<String>,
    refresh_token: Option<String>,
}

/// Where access tokens come from.
#[derive(Debug, Clone, Default)]
pub struct TokenSource {
    pub access_token: Option<String>,
    pub refresh: Option<Credentials>,
}

impl TokenSource {
    pub fn from_access_token(token: impl Into<String>) -> Self {
        Self { access_token: Some(token.into()), refresh: None }
    }

    pub fn from_credentials(credentials: impl Into<Credentials>) -> Self {
        Self { access_token: None, refresh: Some(credentials.into()) }
    }

    pub fn can_refresh(&self) -> bool {
        self.refresh.is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.access_token.is_none() && self.refresh.is_none()
    }

    /// Token endpoint of the refresh credentials, or Google's default.
    pub fn token_uri(&self) -> &str {
        self.refresh.as_ref().map_or(TOKEN_URL, Credentials::token_uri)
    }
}

/// Parse a credentials JSON document.
pub fn parse_credentials(json: &str) -> Result<Credentials, SheetsError> {
    let file: CredentialsFile = serde_json::from_str(json)
        .map_err(|e| SheetsError::Credentials(format!("invalid credentials JSON: {e}")))?;

    match file.kind.as_deref() {
        Some("authorized_user") | None => {}
        Some("service_account") => {
            let sa: ServiceAccount = serde_json::from_str(json).map_err(|e| {
                SheetsError::Credentials(format!(
                    "service account key needs client_email and private_key: {e}"
                ))
            })?;
            // Reject a bad key now rather than on the first API call.
            EncodingKey::from_rsa_pem(sa.private_key.as_bytes()).map_err(|e| {
                SheetsError::Credentials(format!(
                    "service account private_key is not an RSA PEM key: {e}"
                ))
            })?;
            return Ok(Credentials::ServiceAccount(sa));
        }
        Some(other) => {
            return Err(SheetsError::UnsupportedCredentials(format!(
                "credential type {other:?} is not supported"
            )))
        }
    }

    match (file.client_id, file.client_secret, file.refresh_token) {
        (Some(client_id), Some(client_secret), Some(refresh_token)) => {
            Ok(Credentials::AuthorizedUser(AuthorizedUser {
                client_id,
                client_secret,
                refresh_token,
            }))
        }
        _ => Err(SheetsError::Credentials(
            "credentials need client_id, client_secret and refresh_token".to_string(),
        )),
    }
}

pub fn load_credentials(path: &Path) -> Result<Credentials, SheetsError> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| SheetsError::Credentials(format!("cannot read {}: {e}", path.display())))?;
    parse_credentials(&contents)
}

/// Claims of a service-account token request.
#[derive(Debug, Serialize, Deserialize)]
pub struct AssertionClaims {
    pub iss: String,
    pub scope: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

/// Sign the JWT assertion for `sa`, addressed to `audience`.
pub fn sign_assertion(
    sa: &ServiceAccount,
    audience: &str,
    now: i64,
) -> Result<String, SheetsError> {
    let key = EncodingKey::from_rsa_pem(sa.private_key.as_bytes())
        .map_err(|e| SheetsError::Credentials(format!("invalid service account key: {e}")))?;
    let mut header = Header::new(Algorithm::RS256);
    header.kid = sa.private_key_id.clone();
    let claims = AssertionClaims {
        iss: sa.client_email.clone(),
        scope: SHEETS_SCOPE.to_string(),
        aud: audience.to_string(),
        iat: now,
        exp: now + ASSERTION_TTL_SECS,
    };
    encode(&header, &claims, &key)
        .map_err(|e| SheetsError::Auth(format!("cannot sign service account assertion: {e}")))
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Obtain a fresh access token from `token_url`.
///
/// `authorized_user` credentials use the refresh-token grant; service
/// accounts use the JWT-bearer grant with an assertion addressed to
/// `token_url`.
pub fn refresh_access_token(
    credentials: &Credentials,
    http: &reqwest::blocking::Client,
    token_url: &str,
) -> Result<String, SheetsError> {
    let request = match credentials {
        Credentials::AuthorizedUser(user) => http.post(token_url).form(&[
            ("grant_type", "refresh_token"),
            ("client_id", user.client_id.as_str()),
            ("client_secret", user.client_secret.as_str()),
            ("refresh_token", user.refresh_token.as_str()),
        ]),
        Credentials::ServiceAccount(sa) => {
            let assertion = sign_assertion(sa, token_url, Utc::now().timestamp())?;
            http.post(token_url)
                .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
        }
    };
    let resp = request
        .send()
        .map_err(|e| SheetsError::Auth(format!("token request failed: {e}")))?;

    let status = resp.status().as_u16();
    if status != 200 {
        let body: serde_json::Value = resp.json().unwrap_or(serde_json::Value::Null);
        let msg = body["error_description"]
            .as_str()
            .or_else(|| body["error"].as_str())
            .unwrap_or("unknown error");
        return Err(SheetsError::Auth(format!("token request failed ({status}): {msg}")));
    }

    let token: TokenResponse = resp
        .json()
        .map_err(|e| SheetsError::Auth(format!("invalid token response: {e}")))?;
    Ok(token.access_token)
}
