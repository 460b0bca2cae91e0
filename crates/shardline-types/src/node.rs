use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Replace every character of a secret with `X`, keeping its length visible.
pub fn mask_secret(secret: &str) -> String {
    "X".repeat(secret.chars().count())
}

/// Identity a node occupies on the hash ring and in the adapter registry.
///
/// Rendered as `id#name`. Two nodes are distinct members whenever their
/// tokens differ, even if endpoints or credentials repeat.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemberToken(String);

impl MemberToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Build the `id#name` token for a node.
    pub fn from_parts(id: &str, name: &str) -> Self {
        Self(format!("{id}#{name}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Debug for MemberToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MemberToken({})", self.0)
    }
}

impl fmt::Display for MemberToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MemberToken {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for MemberToken {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Borrow<str> for MemberToken {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// One storage backend instance.
///
/// `Debug` and [`Node::diagnostic`] mask the secret key; use them for every
/// log line and error message that mentions a node.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub name: String,
    /// `host:port` of the S3 API.
    pub endpoint: String,
    pub access_key: String,
    pub secret_key: String,
}

impl Node {
    /// The ring / registry identity of this node.
    pub fn token(&self) -> MemberToken {
        MemberToken::from_parts(&self.id, &self.name)
    }

    /// `id#name#endpoint#access_key#XXXX` with the secret masked.
    pub fn diagnostic(&self) -> String {
        format!(
            "{}#{}#{}#{}#{}",
            self.id,
            self.name,
            self.endpoint,
            self.access_key,
            mask_secret(&self.secret_key)
        )
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.id, self.name)
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("endpoint", &self.endpoint)
            .field("access_key", &self.access_key)
            .field("secret_key", &mask_secret(&self.secret_key))
            .finish()
    }
}
