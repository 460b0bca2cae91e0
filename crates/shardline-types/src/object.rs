use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Longest object id accepted at the HTTP boundary.
pub const MAX_OBJECT_ID_LEN: usize = 32;

/// Validated identifier of a stored object.
///
/// An `ObjectId` is 1 to [`MAX_OBJECT_ID_LEN`] ASCII letters or digits. The
/// gateway parses every path segment into an `ObjectId` before the request
/// reaches the router; the router itself accepts any non-empty string.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ObjectId(String);

impl ObjectId {
    /// Validate and wrap an object id.
    pub fn parse(s: impl Into<String>) -> Result<Self, TypeError> {
        let s = s.into();
        Self::validate(&s)?;
        Ok(Self(s))
    }

    /// Check `s` against the object id rules without allocating.
    pub fn validate(s: &str) -> Result<(), TypeError> {
        if s.is_empty() {
            return Err(TypeError::EmptyObjectId);
        }
        if let Some(c) = s.chars().find(|c| !c.is_ascii_alphanumeric()) {
            return Err(TypeError::InvalidObjectIdChar(c));
        }
        // All characters are ASCII here, so byte length equals char count.
        if s.len() > MAX_OBJECT_ID_LEN {
            return Err(TypeError::ObjectIdTooLong {
                actual: s.len(),
                max: MAX_OBJECT_ID_LEN,
            });
        }
        Ok(())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", self.0)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ObjectId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ObjectId {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(s)
    }
}

impl From<ObjectId> for String {
    fn from(id: ObjectId) -> Self {
        id.0
    }
}

impl AsRef<str> for ObjectId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// An immutable stored object: id, content type and raw content.
///
/// Objects are stored verbatim and returned verbatim; nothing in the system
/// inspects `content`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Object {
    pub id: String,
    pub content_type: String,
    pub content: Bytes,
}

impl Object {
    pub fn new(
        id: impl Into<String>,
        content_type: impl Into<String>,
        content: impl Into<Bytes>,
    ) -> Self {
        Self {
            id: id.into(),
            content_type: content_type.into(),
            content: content.into(),
        }
    }

    /// Size of the content in bytes.
    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}
