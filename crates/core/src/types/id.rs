//! Product identifiers.
//!
//! Products are owned by the catalog service and referenced by the cart through
//! an opaque string identifier (a document-database object id in practice).
//! The cart never interprets the identifier beyond checking that it is present.

use serde::{Deserialize, Serialize};

/// Opaque identifier of a catalog product.
///
/// # Example
///
/// ```rust
/// # use vinyl_vibe_core::ProductId;
/// let id = ProductId::new("65f1c0ffee");
/// assert_eq!(id.as_str(), "65f1c0ffee");
/// assert!(!id.is_blank());
/// assert!(ProductId::new("  ").is_blank());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(String);

impl ProductId {
    /// Create a new ID from any string-like value.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the underlying string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the identifier is empty or whitespace-only.
    ///
    /// Blank identifiers cannot reference a product and are dropped wherever
    /// the cart resolves products.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Convert into the inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl ::core::fmt::Display for ProductId {
    fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProductId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<String> for ProductId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<ProductId> for String {
    fn from(id: ProductId) -> Self {
        id.0
    }
}

impl AsRef<str> for ProductId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_serializes_as_plain_string() {
        let id = ProductId::new("p1");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"p1\"");

        let parsed: ProductId = serde_json::from_str("\"abc123\"").unwrap();
        assert_eq!(parsed, ProductId::from("abc123"));
    }

    #[test]
    fn test_blank_detection() {
        assert!(ProductId::new("").is_blank());
        assert!(ProductId::new(" \t").is_blank());
        assert!(!ProductId::new("p").is_blank());
    }
}
