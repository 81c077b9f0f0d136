//! Core domain types
//!
//! All types are designed for:
//! - Stable text representation (the same string in forms, JSON and the database)
//! - Exhaustive matching (no catch-all variants)

use crate::error::{ParseError, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Days a unit stays usable after the donation was drawn
pub const SHELF_LIFE_DAYS: i64 = 42;

/// Expiry timestamp for blood drawn at `donated_at`
pub fn expiry_for(donated_at: DateTime<Utc>) -> DateTime<Utc> {
    donated_at + Duration::days(SHELF_LIFE_DAYS)
}

/// ABO/Rh blood group
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type,
)]
pub enum BloodType {
    /// A positive
    #[serde(rename = "A+")]
    #[sqlx(rename = "A+")]
    APositive,
    /// A negative
    #[serde(rename = "A-")]
    #[sqlx(rename = "A-")]
    ANegative,
    /// B positive
    #[serde(rename = "B+")]
    #[sqlx(rename = "B+")]
    BPositive,
    /// B negative
    #[serde(rename = "B-")]
    #[sqlx(rename = "B-")]
    BNegative,
    /// AB positive
    #[serde(rename = "AB+")]
    #[sqlx(rename = "AB+")]
    AbPositive,
    /// AB negative
    #[serde(rename = "AB-")]
    #[sqlx(rename = "AB-")]
    AbNegative,
    /// O positive
    #[serde(rename = "O+")]
    #[sqlx(rename = "O+")]
    OPositive,
    /// O negative
    #[serde(rename = "O-")]
    #[sqlx(rename = "O-")]
    ONegative,
}

impl BloodType {
    /// All blood types in reporting order
    pub const ALL: [BloodType; 8] = [
        BloodType::APositive,
        BloodType::ANegative,
        BloodType::BPositive,
        BloodType::BNegative,
        BloodType::AbPositive,
        BloodType::AbNegative,
        BloodType::OPositive,
        BloodType::ONegative,
    ];

    /// Canonical label, e.g. `"AB-"`
    pub fn as_str(&self) -> &'static str {
        match self {
            BloodType::APositive => "A+",
            BloodType::ANegative => "A-",
            BloodType::BPositive => "B+",
            BloodType::BNegative => "B-",
            BloodType::AbPositive => "AB+",
            BloodType::AbNegative => "AB-",
            BloodType::OPositive => "O+",
            BloodType::ONegative => "O-",
        }
    }

    /// Position in [`BloodType::ALL`]
    pub fn index(&self) -> usize {
        *self as usize
    }
}

impl FromStr for BloodType {
    type Err = ParseError;

    /// Accepts the canonical label, ignoring surrounding whitespace and letter case.
    fn from_str(s: &str) -> Result<Self> {
        let label = s.trim().to_ascii_uppercase();
        BloodType::ALL
            .into_iter()
            .find(|bt| bt.as_str() == label)
            .ok_or_else(|| ParseError::InvalidBloodType(s.to_string()))
    }
}

impl fmt::Display for BloodType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Credential role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Role {
    /// Registered blood donor
    Donor,
    /// Blood bank staff member
    Staff,
}

impl Role {
    /// Lowercase label
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Donor => "donor",
            Role::Staff => "staff",
        }
    }
}

impl FromStr for Role {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "donor" => Ok(Role::Donor),
            "staff" => Ok(Role::Staff),
            _ => Err(ParseError::InvalidRole(s.to_string())),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status shared by a donation and its inventory unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum UnitStatus {
    /// In stock and usable
    Available,
    /// Consumed by staff
    Used,
    /// Past its shelf life
    Expired,
}

impl UnitStatus {
    /// Lowercase label
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitStatus::Available => "available",
            UnitStatus::Used => "used",
            UnitStatus::Expired => "expired",
        }
    }

    /// Whether the unit still counts toward inventory
    pub fn is_available(&self) -> bool {
        matches!(self, UnitStatus::Available)
    }

    /// Only `available` may move, and only to a terminal status.
    pub fn can_transition_to(&self, next: UnitStatus) -> bool {
        matches!(
            (self, next),
            (UnitStatus::Available, UnitStatus::Used) | (UnitStatus::Available, UnitStatus::Expired)
        )
    }
}

impl FromStr for UnitStatus {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "available" => Ok(UnitStatus::Available),
            "used" => Ok(UnitStatus::Used),
            "expired" => Ok(UnitStatus::Expired),
            _ => Err(ParseError::InvalidStatus(s.to_string())),
        }
    }
}

impl fmt::Display for UnitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Urgency of an incoming blood request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    /// Routine restock
    Low,
    /// Needed within days
    Medium,
    /// Needed today
    High,
    /// Life-threatening, immediate
    Critical,
}

impl Urgency {
    /// Lowercase label
    pub fn as_str(&self) -> &'static str {
        match self {
            Urgency::Low => "low",
            Urgency::Medium => "medium",
            Urgency::High => "high",
            Urgency::Critical => "critical",
        }
    }
}

impl FromStr for Urgency {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" | "normal" => Ok(Urgency::Low),
            "medium" => Ok(Urgency::Medium),
            "high" | "urgent" => Ok(Urgency::High),
            "critical" | "emergency" => Ok(Urgency::Critical),
            _ => Err(ParseError::InvalidUrgency(s.to_string())),
        }
    }
}

impl fmt::Display for Urgency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
