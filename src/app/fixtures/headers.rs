use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Request headers for calling an API as a test identity.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct AuthHeaders {
    #[serde(rename = "Accept")]
    pub accept: String,
    #[serde(rename = "Authorization")]
    pub authorization: String,
}

impl AuthHeaders {
    /// JSON `Accept` plus `Authorization: Bearer <token>`.
    pub fn bearer(access_token: &str) -> Self {
        Self {
            accept: "application/json".to_string(),
            authorization: format!("Bearer {}", access_token),
        }
    }

    /// Header name to value, for HTTP clients that take a plain map.
    pub fn into_header_map(self) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("Accept".to_string(), self.accept),
            ("Authorization".to_string(), self.authorization),
        ])
    }
}

impl fmt::Debug for AuthHeaders {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthHeaders")
            .field("accept", &self.accept)
            .field("authorization", &"Bearer <redacted>")
            .finish()
    }
}
