use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

/// A `View` row joined with its `Share`.
///
/// The two rows are created and deleted together, so the store always hands
/// them out as a pair.
#[derive(Debug, Clone, FromRow)]
pub struct FileRecord {
    pub view_id: Uuid,
    pub share_id: Uuid,
    /// Blob identifier in the object store.
    pub file_id: String,
    /// Content identifier of the stored blob.
    pub cid: String,
    pub hashed_passphrase: String,
    pub expiration: OffsetDateTime,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct NewFileRecord {
    pub file_id: String,
    pub cid: String,
    pub hashed_passphrase: String,
    pub expiration: OffsetDateTime,
}

/// Lifetimes an uploader can pick for a share.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Expiration {
    #[serde(rename = "7 Days")]
    SevenDays,
    #[serde(rename = "3 Days")]
    ThreeDays,
    #[serde(rename = "24 Hours")]
    TwentyFourHours,
    #[serde(rename = "12 Hours")]
    TwelveHours,
    #[serde(rename = "4 Hours")]
    FourHours,
    #[serde(rename = "1 Hour")]
    OneHour,
    #[serde(rename = "5 Minutes")]
    FiveMinutes,
    #[serde(rename = "1 Minute")]
    OneMinute,
}

impl Expiration {
    pub const ALL: [Expiration; 8] = [
        Expiration::SevenDays,
        Expiration::ThreeDays,
        Expiration::TwentyFourHours,
        Expiration::TwelveHours,
        Expiration::FourHours,
        Expiration::OneHour,
        Expiration::FiveMinutes,
        Expiration::OneMinute,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Expiration::SevenDays => "7 Days",
            Expiration::ThreeDays => "3 Days",
            Expiration::TwentyFourHours => "24 Hours",
            Expiration::TwelveHours => "12 Hours",
            Expiration::FourHours => "4 Hours",
            Expiration::OneHour => "1 Hour",
            Expiration::FiveMinutes => "5 Minutes",
            Expiration::OneMinute => "1 Minute",
        }
    }

    pub fn duration(&self) -> Duration {
        match self {
            Expiration::SevenDays => Duration::days(7),
            Expiration::ThreeDays => Duration::days(3),
            Expiration::TwentyFourHours => Duration::hours(24),
            Expiration::TwelveHours => Duration::hours(12),
            Expiration::FourHours => Duration::hours(4),
            Expiration::OneHour => Duration::hours(1),
            Expiration::FiveMinutes => Duration::minutes(5),
            Expiration::OneMinute => Duration::minutes(1),
        }
    }

    /// Absolute deadline for an upload made at `now`.
    pub fn resolve(&self, now: OffsetDateTime) -> OffsetDateTime {
        now + self.duration()
    }
}

impl fmt::Display for Expiration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Expiration {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Expiration::ALL
            .into_iter()
            .find(|e| e.as_str() == s.trim())
            .ok_or_else(|| format!("{s} is not a supported expiration"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn test_parse_expiration_labels() {
        assert_eq!("1 Hour".parse::<Expiration>(), Ok(Expiration::OneHour));
        assert_eq!("7 Days".parse::<Expiration>(), Ok(Expiration::SevenDays));
        assert!("2 Weeks".parse::<Expiration>().is_err());
    }

    #[test]
    fn test_resolve_adds_duration() {
        let t0 = datetime!(2026-01-01 12:00 UTC);
        assert_eq!(
            Expiration::OneHour.resolve(t0),
            datetime!(2026-01-01 13:00 UTC)
        );
        assert_eq!(
            Expiration::SevenDays.resolve(t0),
            datetime!(2026-01-08 12:00 UTC)
        );
    }

    #[test]
    fn test_expiration_serde_uses_labels() {
        let json = serde_json::to_string(&Expiration::FiveMinutes).unwrap();
        assert_eq!(json, "\"5 Minutes\"");
        let parsed: Expiration = serde_json::from_str("\"24 Hours\"").unwrap();
        assert_eq!(parsed, Expiration::TwentyFourHours);
    }
}
