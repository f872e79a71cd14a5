//! Stream key type
//!
//! Identifies one logical upstream stream. The key also becomes a path
//! segment of the local proxy path, so it is validated on construction.

use crate::descriptor::StreamDescriptor;

use super::error::RegistryError;

/// Unique identifier for one logical upstream stream
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamKey(String);

impl StreamKey {
    /// Create a key from a caller-supplied id
    pub fn new(key: impl Into<String>) -> Result<Self, RegistryError> {
        let key = key.into();

        if key.is_empty() {
            return Err(RegistryError::InvalidKey("empty key".into()));
        }
        if key
            .chars()
            .any(|c| c == '/' || c == '\\' || c.is_whitespace() || c.is_control())
        {
            return Err(RegistryError::InvalidKey(format!(
                "key contains a path separator or whitespace: {key:?}"
            )));
        }

        Ok(Self(key))
    }

    /// Generate a fresh unique key
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    /// Key for a descriptor: its id when present, otherwise a generated one
    pub fn for_descriptor(descriptor: &StreamDescriptor) -> Result<Self, RegistryError> {
        match descriptor.id.as_deref() {
            Some(id) if !id.is_empty() => Self::new(id),
            _ => Ok(Self::generate()),
        }
    }

    /// The key as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for StreamKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for StreamKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_key() {
        let key = StreamKey::new("e3b0c44298fc1c14").unwrap();
        assert_eq!(key.as_str(), "e3b0c44298fc1c14");
        assert_eq!(key.to_string(), "e3b0c44298fc1c14");
    }

    #[test]
    fn test_invalid_keys() {
        for raw in ["", "a/b", "a\\b", "with space", "tab\there"] {
            assert!(
                matches!(StreamKey::new(raw), Err(RegistryError::InvalidKey(_))),
                "{raw:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_generated_keys_are_unique() {
        let a = StreamKey::generate();
        let b = StreamKey::generate();

        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 32);
        assert!(StreamKey::new(a.as_str()).is_ok());
    }

    #[test]
    fn test_for_descriptor() {
        let desc = StreamDescriptor::remote("http://h/s.ts").with_id("chan-7");
        assert_eq!(StreamKey::for_descriptor(&desc).unwrap().as_str(), "chan-7");

        let desc = StreamDescriptor::remote("http://h/s.ts");
        assert_eq!(StreamKey::for_descriptor(&desc).unwrap().as_str().len(), 32);

        let desc = StreamDescriptor::remote("http://h/s.ts").with_id("");
        assert!(StreamKey::for_descriptor(&desc).is_ok());

        let desc = StreamDescriptor::remote("http://h/s.ts").with_id("bad/id");
        assert!(StreamKey::for_descriptor(&desc).is_err());
    }
}
