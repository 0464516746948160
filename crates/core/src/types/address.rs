//! Shipping address type.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`ShippingAddress`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    /// The input is empty or whitespace only.
    #[error("shipping address cannot be empty")]
    Empty,
    /// The input is shorter than the minimum length.
    #[error("shipping address must be at least {min} characters")]
    TooShort {
        /// Minimum allowed length.
        min: usize,
    },
    /// The input is longer than the maximum length.
    #[error("shipping address must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
}

/// A shipping address.
///
/// The address is an opaque text blob; Shopline does not parse it into
/// street/city/postcode fields. Leading and trailing whitespace is trimmed.
///
/// ## Constraints
///
/// - Length after trimming: 10-1000 characters
///
/// ## Examples
///
/// ```
/// use shopline_core::ShippingAddress;
///
/// assert!(ShippingAddress::parse("123 Main St").is_ok());
/// assert!(ShippingAddress::parse("   ").is_err());
/// assert!(ShippingAddress::parse("Main St").is_err()); // too short
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct ShippingAddress(String);

impl ShippingAddress {
    /// Minimum length of a shipping address, in characters.
    pub const MIN_LENGTH: usize = 10;

    /// Maximum length of a shipping address, in characters.
    pub const MAX_LENGTH: usize = 1000;

    /// Parse a `ShippingAddress` from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the trimmed input is empty, shorter than
    /// [`ShippingAddress::MIN_LENGTH`], or longer than [`ShippingAddress::MAX_LENGTH`].
    pub fn parse(s: &str) -> Result<Self, AddressError> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(AddressError::Empty);
        }

        let len = trimmed.chars().count();
        if len < Self::MIN_LENGTH {
            return Err(AddressError::TooShort {
                min: Self::MIN_LENGTH,
            });
        }
        if len > Self::MAX_LENGTH {
            return Err(AddressError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }

        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the address as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the `ShippingAddress` and returns its inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for ShippingAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ShippingAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ShippingAddress {
    type Error = AddressError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ShippingAddress> for String {
    fn from(address: ShippingAddress) -> Self {
        address.0
    }
}

impl AsRef<str> for ShippingAddress {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid() {
        let address = ShippingAddress::parse("123 Main St").unwrap();
        assert_eq!(address.as_str(), "123 Main St");
    }

    #[test]
    fn test_parse_trims() {
        let address = ShippingAddress::parse("  42 Harbour Road \n").unwrap();
        assert_eq!(address.as_str(), "42 Harbour Road");
    }

    #[test]
    fn test_parse_empty() {
        assert_eq!(ShippingAddress::parse(""), Err(AddressError::Empty));
        assert_eq!(ShippingAddress::parse(" \t "), Err(AddressError::Empty));
    }

    #[test]
    fn test_parse_too_short() {
        assert_eq!(
            ShippingAddress::parse("1 Main"),
            Err(AddressError::TooShort { min: 10 })
        );
    }

    #[test]
    fn test_parse_too_long() {
        let long = "a".repeat(ShippingAddress::MAX_LENGTH + 1);
        assert!(matches!(
            ShippingAddress::parse(&long),
            Err(AddressError::TooLong { .. })
        ));
    }

    #[test]
    fn test_length_counts_characters_not_bytes() {
        // 10 characters, 20 bytes
        assert!(ShippingAddress::parse("ääääääääää").is_ok());
    }

    #[test]
    fn test_deserialize_validates() {
        assert!(serde_json::from_str::<ShippingAddress>("\"short\"").is_err());
        let parsed: ShippingAddress = serde_json::from_str("\"123 Main St\"").unwrap();
        assert_eq!(parsed.as_str(), "123 Main St");
    }
}
