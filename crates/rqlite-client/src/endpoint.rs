// SECTION: Endpoint validation

use url::Url;

use crate::error::RqliteClientError;

/// A validated rqlite ensemble base URL.
///
/// `spec.md §6` treats cluster-descriptor parsing and `ip:` scheme
/// resolution as an external collaborator this core does not implement;
/// this type is the minimal surface `metadata-store` needs on this side of
/// that boundary — a base URL that has already been checked for
/// well-formedness, the way [`Url::parse`] is used as a validation gate in
/// `decision-gate-broker`'s `HttpSource` before any request is attempted.
/// Resolving a cluster descriptor's comma-joined `ip:` address list into
/// this base URL string is left entirely to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RqliteEndpoint(
    /// The parsed, absolute base URL.
    Url,
);

impl RqliteEndpoint {
    /// Validates `raw` as an absolute URL.
    ///
    /// # Errors
    ///
    /// Returns [`RqliteClientError::InvalidEndpoint`] if `raw` does not
    /// parse as an absolute URL.
    pub fn parse(raw: &str) -> Result<Self, RqliteClientError> {
        let url = Url::parse(raw).map_err(|source| RqliteClientError::InvalidEndpoint {
            url: raw.to_string(),
            source,
        })?;
        Ok(Self(url))
    }

    /// The validated base URL, as passed to [`crate::RqliteClient::new`].
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl std::fmt::Display for RqliteEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    #![allow(
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only panic-based assertions are permitted."
    )]

    use super::RqliteEndpoint;

    #[test]
    fn parses_a_well_formed_url() {
        let endpoint = RqliteEndpoint::parse("http://127.0.0.1:4001").expect("valid endpoint");
        assert_eq!(endpoint.as_str(), "http://127.0.0.1:4001/");
    }

    #[test]
    fn rejects_a_malformed_url() {
        assert!(RqliteEndpoint::parse("not a url").is_err());
    }

    #[test]
    fn display_matches_as_str() {
        let endpoint = RqliteEndpoint::parse("http://rqlite.internal:4001").expect("valid endpoint");
        assert_eq!(endpoint.to_string(), endpoint.as_str());
    }
}
