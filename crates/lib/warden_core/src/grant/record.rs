//! Grant requests, session payloads and the stored token record.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::auth::AuthError;

/// Contract every session payload stored with a grant must honor.
///
/// The payload is serialized opaquely, but its subject is also stored in its
/// own column and checked again when the payload is decoded.
pub trait SessionPayload: Serialize + DeserializeOwned + Send + Sync {
    /// End-user id the grant was issued to.
    fn subject(&self) -> &str;

    /// Reference to the consent decision that authorized the grant, if any.
    fn consent_challenge(&self) -> Option<&str> {
        None
    }
}

/// Default OIDC session payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GrantSession {
    pub subject: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consent_challenge: Option<String>,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl GrantSession {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            ..Default::default()
        }
    }
}

impl SessionPayload for GrantSession {
    fn subject(&self) -> &str {
        &self.subject
    }

    fn consent_challenge(&self) -> Option<&str> {
        self.consent_challenge.as_deref()
    }
}

/// Everything the protocol engine hands over when an artifact is issued.
#[derive(Debug, Clone)]
pub struct GrantRequest<S> {
    pub request_id: String,
    pub requested_at: DateTime<Utc>,
    pub client_id: String,
    pub requested_scopes: Vec<String>,
    pub granted_scopes: Vec<String>,
    pub requested_audience: Vec<String>,
    pub granted_audience: Vec<String>,
    /// Original request form fields.
    pub form: Vec<(String, String)>,
    pub session: Option<S>,
}

impl<S: SessionPayload> GrantRequest<S> {
    pub fn new(request_id: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            requested_at: Utc::now(),
            client_id: client_id.into(),
            requested_scopes: Vec::new(),
            granted_scopes: Vec::new(),
            requested_audience: Vec::new(),
            granted_audience: Vec::new(),
            form: Vec::new(),
            session: None,
        }
    }

    pub fn with_session(mut self, session: S) -> Self {
        self.session = Some(session);
        self
    }

    /// Set requested and granted scopes.
    pub fn with_scopes(mut self, requested: &[&str], granted: &[&str]) -> Self {
        self.requested_scopes = requested.iter().map(|s| s.to_string()).collect();
        self.granted_scopes = granted.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Set requested and granted audiences.
    pub fn with_audience(mut self, requested: &[&str], granted: &[&str]) -> Self {
        self.requested_audience = requested.iter().map(|s| s.to_string()).collect();
        self.granted_audience = granted.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_form_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.form.push((key.into(), value.into()));
        self
    }
}

/// One stored grant artifact, the same shape for every kind.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct TokenRecord {
    /// Storage key: the signature after the hashing policy was applied.
    pub signature: String,
    pub request_id: String,
    pub requested_at: DateTime<Utc>,
    pub client_id: String,
    pub requested_scopes: Vec<String>,
    pub granted_scopes: Vec<String>,
    pub requested_audience: Vec<String>,
    pub granted_audience: Vec<String>,
    /// URL-encoded request form.
    pub form: String,
    /// Serialized session payload.
    pub session: Vec<u8>,
    pub subject: String,
    pub consent_challenge: Option<String>,
    pub active: bool,
}

impl TokenRecord {
    /// Derive an active record from a grant request.
    pub fn from_request<S: SessionPayload>(
        key: String,
        request: &GrantRequest<S>,
    ) -> Result<Self, AuthError> {
        let session = serde_json::to_vec(&request.session)?;
        let subject = request
            .session
            .as_ref()
            .map(|s| s.subject().to_string())
            .unwrap_or_default();
        let consent_challenge = request
            .session
            .as_ref()
            .and_then(|s| s.consent_challenge())
            .filter(|c| !c.is_empty())
            .map(str::to_string);

        let mut form = url::form_urlencoded::Serializer::new(String::new());
        let mut fields: Vec<_> = request.form.iter().collect();
        fields.sort_by(|a, b| a.0.cmp(&b.0));
        for (k, v) in fields {
            form.append_pair(k, v);
        }

        Ok(Self {
            signature: key,
            request_id: request.request_id.clone(),
            requested_at: request.requested_at,
            client_id: request.client_id.clone(),
            requested_scopes: request.requested_scopes.clone(),
            granted_scopes: request.granted_scopes.clone(),
            requested_audience: request.requested_audience.clone(),
            granted_audience: request.granted_audience.clone(),
            form: form.finish(),
            session,
            subject,
            consent_challenge,
            active: true,
        })
    }

    /// Decode the session payload.
    ///
    /// Fails with [`AuthError::Serialization`] when the bytes do not decode as
    /// `S` or when the decoded subject disagrees with the stored one.
    pub fn session<S: SessionPayload>(&self) -> Result<Option<S>, AuthError> {
        let session: Option<S> = serde_json::from_slice(&self.session)?;
        if let Some(s) = &session
            && s.subject() != self.subject
        {
            return Err(AuthError::Serialization(format!(
                "session subject {:?} does not match record subject {:?}",
                s.subject(),
                self.subject
            )));
        }
        Ok(session)
    }

    /// Decoded request form fields, in stored order.
    pub fn form_pairs(&self) -> Vec<(String, String)> {
        url::form_urlencoded::parse(self.form.as_bytes())
            .into_owned()
            .collect()
    }
}
