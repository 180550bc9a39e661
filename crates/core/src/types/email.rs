//! Email addresses, the login identity of every account.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

/// Why a string is not an acceptable [`Email`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum EmailError {
    #[error("email cannot be empty")]
    Empty,
    #[error("email must be at most {max} characters")]
    TooLong { max: usize },
    #[error("email cannot contain whitespace")]
    ContainsWhitespace,
    #[error("email must contain an @ symbol")]
    MissingAtSymbol,
    #[error("email must contain exactly one @ symbol")]
    MultipleAtSymbols,
    #[error("email local part cannot be empty")]
    EmptyLocalPart,
    #[error("email domain cannot be empty")]
    EmptyDomain,
    #[error("email domain '{0}' is not valid")]
    InvalidDomain(String),
}

/// A syntactically valid email address.
///
/// Input is trimmed and the domain lowercased; the local part keeps its case
/// because mail servers may treat it as significant. Two addresses that
/// differ only in domain case therefore map to the same account.
///
/// ```
/// use cartwheel_core::Email;
///
/// let email = Email::parse(" Jo.Smith@Shop.EXAMPLE ").unwrap();
/// assert_eq!(email.as_str(), "Jo.Smith@shop.example");
///
/// assert!(Email::parse("jo@").is_err());
/// assert!(Email::parse("jo@shop..example").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type), sqlx(transparent))]
#[serde(transparent)]
pub struct Email(String);

impl Email {
    /// Column width of `users.email`.
    pub const MAX_LENGTH: usize = 225;

    /// Validate and normalise an address.
    ///
    /// # Errors
    ///
    /// Returns the first [`EmailError`] the input runs into.
    pub fn parse(input: &str) -> Result<Self, EmailError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(EmailError::Empty);
        }
        if input.len() > Self::MAX_LENGTH {
            return Err(EmailError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }
        if input.contains(char::is_whitespace) {
            return Err(EmailError::ContainsWhitespace);
        }

        let (local, domain) = split_address(input)?;
        let domain = domain.to_lowercase();
        check_domain(&domain)?;

        Ok(Self(format!("{local}@{domain}")))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }

    /// The part after the `@`.
    #[must_use]
    pub fn domain(&self) -> &str {
        self.0.rsplit_once('@').map_or("", |(_, domain)| domain)
    }
}

/// Split on the single `@`, requiring both halves.
fn split_address(input: &str) -> Result<(&str, &str), EmailError> {
    let (local, domain) = input.split_once('@').ok_or(EmailError::MissingAtSymbol)?;
    if domain.contains('@') {
        return Err(EmailError::MultipleAtSymbols);
    }
    if local.is_empty() {
        return Err(EmailError::EmptyLocalPart);
    }
    if domain.is_empty() {
        return Err(EmailError::EmptyDomain);
    }
    Ok((local, domain))
}

/// Domains are dot-separated labels of letters, digits and inner hyphens.
fn check_domain(domain: &str) -> Result<(), EmailError> {
    let label_ok = |label: &str| {
        !label.is_empty()
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.chars().all(|c| c.is_alphanumeric() || c == '-')
    };

    if domain.split('.').all(label_ok) {
        Ok(())
    } else {
        Err(EmailError::InvalidDomain(domain.to_owned()))
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Email {
    type Err = EmailError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for Email {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_common_shapes() {
        for ok in [
            "shopper@example.com",
            "first.last+orders@mail.example.co.uk",
            "x@localhost",
            "o'brien@example.ie",
        ] {
            assert!(Email::parse(ok).is_ok(), "{ok} should parse");
        }
    }

    #[test]
    fn test_normalises_domain_only() {
        let email = Email::parse("\tMixed.Case@EXAMPLE.Com\n").unwrap();
        assert_eq!(email.as_str(), "Mixed.Case@example.com");
        assert_eq!(email.domain(), "example.com");
    }

    #[test]
    fn test_structural_errors() {
        assert_eq!(Email::parse("  "), Err(EmailError::Empty));
        assert_eq!(Email::parse("shopper.example.com"), Err(EmailError::MissingAtSymbol));
        assert_eq!(Email::parse("a@b@example.com"), Err(EmailError::MultipleAtSymbols));
        assert_eq!(Email::parse("@example.com"), Err(EmailError::EmptyLocalPart));
        assert_eq!(Email::parse("shopper@"), Err(EmailError::EmptyDomain));
        assert_eq!(Email::parse("shop per@example.com"), Err(EmailError::ContainsWhitespace));
    }

    #[test]
    fn test_rejects_bad_domains() {
        for bad in ["a@example..com", "a@.example.com", "a@example.com.", "a@-shop.com", "a@shop_1.com"] {
            assert!(
                matches!(Email::parse(bad), Err(EmailError::InvalidDomain(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_length_limit() {
        let at_limit = format!("{}@example.com", "a".repeat(Email::MAX_LENGTH - 12));
        assert!(Email::parse(&at_limit).is_ok());

        let over = format!("{}@example.com", "a".repeat(Email::MAX_LENGTH - 11));
        assert_eq!(Email::parse(&over), Err(EmailError::TooLong { max: 225 }));
    }

    #[test]
    fn test_serde_and_from_str_agree() {
        let parsed: Email = "buyer@Example.com".parse().unwrap();
        let json = serde_json::to_string(&parsed).unwrap();
        assert_eq!(json, "\"buyer@example.com\"");
        assert_eq!(parsed.to_string(), "buyer@example.com");
    }
}
