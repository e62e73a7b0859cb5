use std::fmt;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AuthError, AuthResult};

/// Kind tag carried by tokens issued by the data-lake credential service.
pub const DELEGATION_TOKEN_KIND: &str = "ADL delegation token";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenKind(String);

impl TokenKind {
    pub fn new<S: Into<String>>(kind: S) -> Self { Self(kind.into()) }

    pub fn delegation() -> Self { Self(DELEGATION_TOKEN_KIND.to_string()) }

    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

/// Delegation token as held by the client. The identifier and password are
/// opaque to this crate; only the service interprets them.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    #[serde(with = "b64")]
    identifier: Vec<u8>,
    #[serde(with = "b64")]
    password: Vec<u8>,
    kind: TokenKind,
    #[serde(default)]
    service: String,
}

impl Token {
    pub fn new(identifier: Vec<u8>, password: Vec<u8>, kind: TokenKind, service: impl Into<String>) -> Self {
        Self { identifier, password, kind, service: service.into() }
    }

    /// Token of the delegation kind wrapping an encoded identifier.
    pub fn delegation(identifier: &TokenIdentifier, password: Vec<u8>, service: impl Into<String>) -> AuthResult<Self> {
        Ok(Self::new(identifier.to_bytes()?, password, TokenKind::delegation(), service))
    }

    pub fn identifier(&self) -> &[u8] { &self.identifier }
    pub fn password(&self) -> &[u8] { &self.password }
    pub fn kind(&self) -> &TokenKind { &self.kind }
    pub fn service(&self) -> &str { &self.service }

    /// Renewal metadata, when the identifier is in this crate's encoding.
    pub fn decode_identifier(&self) -> AuthResult<TokenIdentifier> { TokenIdentifier::from_bytes(&self.identifier) }

    /// URL-safe string form used on the wire and in token files.
    pub fn encode_to_url_string(&self) -> AuthResult<String> {
        let body = serde_json::to_vec(self).map_err(|e| AuthError::invalid_token(format!("encode failed: {e}")))?;
        Ok(URL_SAFE_NO_PAD.encode(body))
    }

    pub fn decode_from_url_string(s: &str) -> AuthResult<Self> {
        let body = URL_SAFE_NO_PAD
            .decode(s.trim().trim_end_matches('='))
            .map_err(|e| AuthError::invalid_token(format!("not base64url: {e}")))?;
        serde_json::from_slice(&body).map_err(|e| AuthError::invalid_token(format!("bad token body: {e}")))
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("kind", &self.kind)
            .field("service", &self.service)
            .field("identifier_len", &self.identifier.len())
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Decoded identifier: who owns the token, who may renew it, and its hard limit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenIdentifier {
    pub owner: String,
    pub renewer: String,
    #[serde(default)]
    pub real_user: Option<String>,
    pub issue_date: DateTime<Utc>,
    pub max_date: DateTime<Utc>,
    pub sequence_number: u64,
}

impl TokenIdentifier {
    pub fn to_bytes(&self) -> AuthResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| AuthError::invalid_token(format!("encode identifier: {e}")))
    }

    pub fn from_bytes(bytes: &[u8]) -> AuthResult<Self> {
        serde_json::from_slice(bytes).map_err(|e| AuthError::invalid_token(format!("decode identifier: {e}")))
    }
}

mod b64 {
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&URL_SAFE_NO_PAD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(d)?;
        URL_SAFE_NO_PAD.decode(s.as_bytes()).map_err(serde::de::Error::custom)
    }
}
