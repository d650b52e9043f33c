use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Margin subtracted from `expires_at` when answering validity queries.
pub const SAFETY_MARGIN_SECS: i64 = 60;

/// Cached bearer session for the platform REST API.
///
/// Credentials are replaced wholesale on refresh or re-authentication, never
/// mutated in place. The JSON shape is shared with every process that reads
/// the same token file: `{"access_token", "refresh_token", "expires_at"}` with
/// `expires_at` in epoch seconds.
///
/// # Example
/// ```
/// use chatrelay::auth::Credential;
/// use chrono::{Duration, Utc};
///
/// let credential = Credential::new("access", Some("refresh".into()), Utc::now() + Duration::minutes(10));
/// assert!(credential.is_valid());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub access_token: String,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub refresh_token: Option<String>,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub expires_at: DateTime<Utc>,
}

impl Credential {
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token,
            expires_at,
        }
    }

    /// Build a credential from a grant response issued at `issued_at`.
    ///
    /// The safety margin is subtracted once here, on top of the margin that
    /// [`Credential::is_valid_at`] applies. Returns `None` when `expires_in`
    /// puts the expiry outside the representable range.
    pub fn issued(
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        expires_in: i64,
        issued_at: DateTime<Utc>,
    ) -> Option<Self> {
        let lifetime = Duration::try_seconds(expires_in.checked_sub(SAFETY_MARGIN_SECS)?)?;
        let expires_at = issued_at.checked_add_signed(lifetime)?;
        Some(Self::new(
            access_token,
            refresh_token.filter(|token| !token.is_empty()),
            expires_at,
        ))
    }

    /// True iff the access token is non-empty and does not expire within the
    /// safety margin of `now`.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        !self.access_token.is_empty()
            && self.expires_at > now + Duration::seconds(SAFETY_MARGIN_SECS)
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }

    pub fn has_refresh_token(&self) -> bool {
        self.refresh_token.as_deref().is_some_and(|t| !t.is_empty())
    }
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.is_empty()))
}
