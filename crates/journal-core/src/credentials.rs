//! Login credentials and their versioned JSON encoding.
//!
//! Two login styles are accepted: an email address (the account's server is
//! discovered later) or an explicit http(s) base URL with a user name.

use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::transport::Auth;

pub const CREDENTIALS_VERSION: u32 = 1;
const MAILTO_PREFIX: &str = "mailto:";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldError {
    #[error("invalid email address")]
    InvalidEmail,
    #[error("URL must be http or https")]
    UnsupportedScheme,
    #[error("host name required")]
    HostRequired,
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("user name required")]
    UserNameRequired,
    #[error("password required")]
    PasswordRequired,
}

#[derive(Debug, Error)]
pub enum CredentialsError {
    #[error("invalid login data: {}", join_fields(.0))]
    Invalid(Vec<FieldError>),

    #[error("unsupported credentials version {0}")]
    UnsupportedVersion(u32),

    #[error("malformed credentials document: {0}")]
    Malformed(#[from] serde_json::Error),
}

fn join_fields(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct LoginCredentials {
    uri: String,
    user_name: String,
    password: String,
    auth_preemptive: bool,
}

#[derive(Serialize, Deserialize)]
struct CredentialsDocument {
    version: u32,
    #[serde(flatten)]
    credentials: LoginCredentials,
}

#[derive(Deserialize)]
struct VersionProbe {
    version: u32,
}

impl LoginCredentials {
    /// Email login; the address doubles as user name and auth is preemptive.
    pub fn from_email(email: &str, password: &str) -> Result<Self, CredentialsError> {
        let mut errors = Vec::new();
        if !looks_like_email(email) {
            errors.push(FieldError::InvalidEmail);
        }
        if password.is_empty() {
            errors.push(FieldError::PasswordRequired);
        }
        if !errors.is_empty() {
            return Err(CredentialsError::Invalid(errors));
        }
        Ok(Self {
            uri: format!("{MAILTO_PREFIX}{email}"),
            user_name: email.to_owned(),
            password: password.to_owned(),
            auth_preemptive: true,
        })
    }

    /// URL login. User info, query and fragment are stripped from the URL.
    pub fn from_url(
        base_url: &str,
        user_name: &str,
        password: &str,
        auth_preemptive: bool,
    ) -> Result<Self, CredentialsError> {
        let mut errors = Vec::new();
        let uri = match normalize_base_url(base_url) {
            Ok(url) => Some(url),
            Err(e) => {
                errors.push(e);
                None
            }
        };
        if user_name.is_empty() {
            errors.push(FieldError::UserNameRequired);
        }
        if password.is_empty() {
            errors.push(FieldError::PasswordRequired);
        }
        match uri {
            Some(uri) if errors.is_empty() => Ok(Self {
                uri: uri.to_string(),
                user_name: user_name.to_owned(),
                password: password.to_owned(),
                auth_preemptive,
            }),
            _ => Err(CredentialsError::Invalid(errors)),
        }
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn user_name(&self) -> &str {
        &self.user_name
    }

    pub fn auth_preemptive(&self) -> bool {
        self.auth_preemptive
    }

    pub fn is_email_login(&self) -> bool {
        self.uri.starts_with(MAILTO_PREFIX)
    }

    /// Server base URL for URL logins; `None` for email logins.
    pub fn server_url(&self) -> Option<Url> {
        if self.is_email_login() {
            return None;
        }
        Url::parse(&self.uri).ok()
    }

    pub fn auth(&self) -> Auth {
        Auth::Basic {
            user: self.user_name.clone(),
            password: self.password.clone(),
        }
    }

    pub fn to_json(&self) -> Result<String, CredentialsError> {
        let doc = CredentialsDocument {
            version: CREDENTIALS_VERSION,
            credentials: self.clone(),
        };
        Ok(serde_json::to_string(&doc)?)
    }

    /// Decode and re-validate a document written by `to_json`.
    pub fn from_json(raw: &str) -> Result<Self, CredentialsError> {
        let probe: VersionProbe = serde_json::from_str(raw)?;
        if probe.version != CREDENTIALS_VERSION {
            return Err(CredentialsError::UnsupportedVersion(probe.version));
        }
        let doc: CredentialsDocument = serde_json::from_str(raw)?;
        let c = &doc.credentials;
        match c.uri.strip_prefix(MAILTO_PREFIX) {
            Some(email) => Self::from_email(email, &c.password),
            None => Self::from_url(&c.uri, &c.user_name, &c.password, c.auth_preemptive),
        }
    }
}

impl fmt::Debug for LoginCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginCredentials")
            .field("uri", &self.uri)
            .field("user_name", &self.user_name)
            .field("password", &"<redacted>")
            .field("auth_preemptive", &self.auth_preemptive)
            .finish()
    }
}

fn looks_like_email(email: &str) -> bool {
    if email.contains('\n') {
        return false;
    }
    email
        .char_indices()
        .any(|(i, c)| c == '@' && i > 0 && i + 1 < email.len())
}

fn normalize_base_url(raw: &str) -> Result<Url, FieldError> {
    let mut url = Url::parse(raw).map_err(|e| FieldError::InvalidUrl(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(FieldError::UnsupportedScheme);
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(FieldError::HostRequired);
    }
    // Cannot fail for http(s) URLs with a host.
    let _ = url.set_username("");
    let _ = url.set_password(None);
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}
