//! Newtype IDs for type-safe catalog references.
//!
//! Use the `define_id!` macro to create type-safe ID wrappers that prevent
//! accidentally mixing IDs from different entity types.
//!
//! Affiliate catalog IDs are long numeric strings, but the upstream API is not
//! consistent about quoting them: the same field can arrive as a JSON number
//! in one endpoint and a string in another. Deserialization accepts both.

use serde::{Deserialize, Deserializer};
use thiserror::Error;

/// Errors produced when parsing an ID from untrusted input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdError {
    /// The ID is empty or only whitespace.
    #[error("{0} must not be empty")]
    Empty(&'static str),

    /// The ID contains characters outside `[A-Za-z0-9_-]`.
    #[error("{0} contains invalid characters")]
    InvalidCharacters(&'static str),
}

/// Macro to define a type-safe string ID wrapper.
///
/// Creates a newtype wrapper around `String` with:
/// - `Serialize` with `#[serde(transparent)]`
/// - `Deserialize` from either a JSON string or a JSON integer
/// - `Debug`, `Clone`, `PartialEq`, `Eq`, `Hash`
/// - Conversion methods: `new()`, `parse()`, `as_str()`
/// - `Display`, `From<String>`, `From<&str>` and `Into<String>` implementations
///
/// # Example
///
/// ```rust
/// # use dropship_relay_core::define_id;
/// define_id!(ProductId, "product id");
/// define_id!(SkuId, "sku id");
///
/// let product_id = ProductId::new("1005001");
/// let sku_id = SkuId::new("1005001");
///
/// // These are different types, so this won't compile:
/// // let _: ProductId = sku_id;
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident, $label:literal) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, ::serde::Serialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new ID without validation.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Parse an ID from untrusted input (path segments, query strings).
            ///
            /// # Errors
            ///
            /// Returns an error if the ID is empty or contains characters
            /// outside `[A-Za-z0-9_-]`.
            pub fn parse(raw: &str) -> ::core::result::Result<Self, $crate::types::id::IdError> {
                $crate::types::id::validate_id(raw, $label).map(|id| Self(id.to_string()))
            }

            /// Get the underlying string value.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl<'de> ::serde::Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> ::core::result::Result<Self, D::Error>
            where
                D: ::serde::Deserializer<'de>,
            {
                $crate::types::id::deserialize_string_or_number(deserializer).map(Self)
            }
        }
    };
}

define_id!(ProductId, "product id");
define_id!(SkuId, "sku id");
define_id!(CategoryId, "category id");

/// Validate an untrusted ID, returning the trimmed value.
///
/// # Errors
///
/// See [`IdError`].
pub fn validate_id<'a>(raw: &'a str, label: &'static str) -> Result<&'a str, IdError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(IdError::Empty(label));
    }
    if !trimmed
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(IdError::InvalidCharacters(label));
    }
    Ok(trimmed)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    String(String),
    Unsigned(u64),
    Signed(i64),
}

/// Deserialize a JSON string or integer into a `String`.
///
/// # Errors
///
/// Returns the deserializer's error for any other JSON type.
#[doc(hidden)]
pub fn deserialize_string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match StringOrNumber::deserialize(deserializer)? {
        StringOrNumber::String(s) => s,
        StringOrNumber::Unsigned(n) => n.to_string(),
        StringOrNumber::Signed(n) => n.to_string(),
    })
}
