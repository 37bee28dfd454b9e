//! Snapshot tiers and the compiled-in tier catalog.
//!
//! The catalog is a fixed table: every [`Tier`] has exactly one recurrence
//! schedule and one retention unit, and no tier can be added at runtime.

use std::fmt;
use std::str::FromStr;

use itertools::{Either, Itertools};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A named retention bucket.
///
/// Variants are declared from most to least frequent, so the derived
/// ordering is the frequency order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Frequent,
    Hourly,
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Tier {
    /// Every tier, most frequent first.
    pub const ALL: [Self; 6] = [
        Self::Frequent,
        Self::Hourly,
        Self::Daily,
        Self::Weekly,
        Self::Monthly,
        Self::Yearly,
    ];

    /// Lowercase tier name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Frequent => "frequent",
            Self::Hourly => "hourly",
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
        }
    }

    /// Recurrence schedule for this tier.
    pub fn schedule(self) -> Schedule {
        Schedule::from(&self.entry().cron)
    }

    /// Retention unit for this tier.
    pub const fn unit(self) -> RetentionUnit {
        self.entry().unit
    }

    const fn entry(self) -> &'static TierEntry {
        match self {
            Self::Frequent => &FREQUENT,
            Self::Hourly => &HOURLY,
            Self::Daily => &DAILY,
            Self::Weekly => &WEEKLY,
            Self::Monthly => &MONTHLY,
            Self::Yearly => &YEARLY,
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|tier| tier.as_str() == s)
            .ok_or_else(|| Error::unknown_tiers([s]))
    }
}

/// Unit a retention count is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RetentionUnit {
    Hour,
    Day,
    Week,
    Month,
    Year,
}

impl RetentionUnit {
    /// Wire name of the unit.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Hour => "HOUR",
            Self::Day => "DAY",
            Self::Week => "WEEK",
            Self::Month => "MONTH",
            Self::Year => "YEAR",
        }
    }

    /// Approximate length of one unit in hours.
    ///
    /// Months count as 30 days and years as 365 days.
    pub const fn hours(self) -> u64 {
        match self {
            Self::Hour => 1,
            Self::Day => 24,
            Self::Week => 168,
            Self::Month => 720,
            Self::Year => 8760,
        }
    }
}

impl fmt::Display for RetentionUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cron-style recurrence schedule as exchanged with the remote store.
///
/// Remote records may carry extra schedule fields (for example a daily
/// begin/end window); those are ignored on decode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Schedule {
    #[serde(default)]
    pub minute: String,
    #[serde(default)]
    pub hour: String,
    #[serde(default)]
    pub dom: String,
    #[serde(default)]
    pub month: String,
    #[serde(default)]
    pub dow: String,
}

impl Schedule {
    /// Names of the schedule components whose values differ from `other`.
    pub fn mismatched_fields(&self, other: &Self) -> Vec<&'static str> {
        [
            ("minute", &self.minute, &other.minute),
            ("hour", &self.hour, &other.hour),
            ("dom", &self.dom, &other.dom),
            ("month", &self.month, &other.month),
            ("dow", &self.dow, &other.dow),
        ]
        .into_iter()
        .filter(|(_, ours, theirs)| ours != theirs)
        .map(|(name, _, _)| name)
        .collect_vec()
    }
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {}",
            self.minute, self.hour, self.dom, self.month, self.dow
        )
    }
}

/// Static cron fields of a catalog entry.
#[derive(Debug)]
struct CronFields {
    minute: &'static str,
    hour: &'static str,
    dom: &'static str,
    month: &'static str,
    dow: &'static str,
}

impl From<&CronFields> for Schedule {
    fn from(cron: &CronFields) -> Self {
        Self {
            minute: cron.minute.to_string(),
            hour: cron.hour.to_string(),
            dom: cron.dom.to_string(),
            month: cron.month.to_string(),
            dow: cron.dow.to_string(),
        }
    }
}

#[derive(Debug)]
struct TierEntry {
    cron: CronFields,
    unit: RetentionUnit,
}

static FREQUENT: TierEntry = TierEntry {
    cron: CronFields {
        minute: "*/15",
        hour: "*",
        dom: "*",
        month: "*",
        dow: "*",
    },
    unit: RetentionUnit::Hour,
};

static HOURLY: TierEntry = TierEntry {
    cron: CronFields {
        minute: "0",
        hour: "*",
        dom: "*",
        month: "*",
        dow: "*",
    },
    unit: RetentionUnit::Hour,
};

static DAILY: TierEntry = TierEntry {
    cron: CronFields {
        minute: "0",
        hour: "0",
        dom: "*",
        month: "*",
        dow: "*",
    },
    unit: RetentionUnit::Day,
};

static WEEKLY: TierEntry = TierEntry {
    cron: CronFields {
        minute: "0",
        hour: "0",
        dom: "*",
        month: "*",
        dow: "0",
    },
    unit: RetentionUnit::Week,
};

static MONTHLY: TierEntry = TierEntry {
    cron: CronFields {
        minute: "0",
        hour: "0",
        dom: "1",
        month: "*",
        dow: "*",
    },
    unit: RetentionUnit::Month,
};

static YEARLY: TierEntry = TierEntry {
    cron: CronFields {
        minute: "0",
        hour: "0",
        dom: "1",
        month: "1",
        dow: "*",
    },
    unit: RetentionUnit::Year,
};

/// Lookups over the fixed tier table.
#[derive(Debug, Clone, Copy, Default)]
pub struct TierCatalog;

impl TierCatalog {
    /// Recurrence schedule of `tier`.
    pub fn schedule_of(tier: Tier) -> Schedule {
        tier.schedule()
    }

    /// Retention unit of `tier`.
    pub const fn unit_of(tier: Tier) -> RetentionUnit {
        tier.unit()
    }

    /// Names of every valid tier, most frequent first.
    pub fn valid_names() -> Vec<&'static str> {
        Tier::ALL.iter().map(|t| t.as_str()).collect_vec()
    }

    /// Parse every name, failing with all unrecognized names at once.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownTiers`] when at least one name is not a tier.
    pub fn validate<I, S>(names: I) -> Result<Vec<Tier>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let (tiers, unknown): (Vec<Tier>, Vec<String>) =
            names
                .into_iter()
                .partition_map(|name| match name.as_ref().parse::<Tier>() {
                    Ok(tier) => Either::Left(tier),
                    Err(_) => Either::Right(name.as_ref().to_string()),
                });

        if unknown.is_empty() {
            Ok(tiers)
        } else {
            Err(Error::unknown_tiers(unknown))
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::panic)]

    use super::*;

    #[test]
    fn test_catalog_schedules() {
        assert_eq!(Tier::Frequent.schedule().to_string(), "*/15 * * * *");
        assert_eq!(Tier::Hourly.schedule().to_string(), "0 * * * *");
        assert_eq!(Tier::Daily.schedule().to_string(), "0 0 * * *");
        assert_eq!(Tier::Weekly.schedule().to_string(), "0 0 * * 0");
        assert_eq!(Tier::Monthly.schedule().to_string(), "0 0 1 * *");
        assert_eq!(Tier::Yearly.schedule().to_string(), "0 0 1 1 *");
    }

    #[test]
    fn test_catalog_units() {
        assert_eq!(TierCatalog::unit_of(Tier::Frequent), RetentionUnit::Hour);
        assert_eq!(TierCatalog::unit_of(Tier::Hourly), RetentionUnit::Hour);
        assert_eq!(TierCatalog::unit_of(Tier::Daily), RetentionUnit::Day);
        assert_eq!(TierCatalog::unit_of(Tier::Weekly), RetentionUnit::Week);
        assert_eq!(TierCatalog::unit_of(Tier::Monthly), RetentionUnit::Month);
        assert_eq!(TierCatalog::unit_of(Tier::Yearly), RetentionUnit::Year);
    }

    #[test]
    fn test_tier_roundtrips_through_name() {
        for tier in Tier::ALL {
            assert_eq!(tier.as_str().parse::<Tier>().ok(), Some(tier));
        }
        assert!("Hourly".parse::<Tier>().is_err());
    }

    #[test]
    fn test_validate_reports_all_unknown_names() {
        let err = TierCatalog::validate(["hourly", "fortnightly", "daily", "decadal"])
            .err()
            .unwrap();
        match err {
            Error::UnknownTiers { unknown, valid } => {
                assert_eq!(unknown, vec!["fortnightly", "decadal"]);
                assert_eq!(valid.len(), 6);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_validate_accepts_known_names() {
        let tiers = TierCatalog::validate(["weekly", "hourly"]).unwrap();
        assert_eq!(tiers, vec![Tier::Weekly, Tier::Hourly]);
    }

    #[test]
    fn test_schedule_mismatched_fields() {
        let hourly = Tier::Hourly.schedule();
        let daily = Tier::Daily.schedule();
        assert_eq!(hourly.mismatched_fields(&daily), vec!["hour"]);
        assert!(hourly.mismatched_fields(&hourly).is_empty());
    }

    #[test]
    fn test_schedule_ignores_remote_only_fields() {
        let json = r#"{"minute":"0","hour":"0","dom":"*","month":"*","dow":"*","begin":"00:00","end":"23:59"}"#;
        let schedule: Schedule = serde_json::from_str(json).unwrap();
        assert_eq!(schedule, Tier::Daily.schedule());
    }

    #[test]
    fn test_unit_serializes_uppercase() {
        let json = serde_json::to_string(&RetentionUnit::Week).unwrap();
        assert_eq!(json, "\"WEEK\"");
    }
}
