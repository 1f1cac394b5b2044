//! Identifiers and value objects shared by every engine component.

use crate::error::{Result, SeatError};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            #[doc = concat!("Creates a new random `", stringify!($name), "`")]
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            #[doc = concat!("Create a `", stringify!($name), "` from a `Uuid`")]
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Get the inner UUID
            #[must_use]
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

uuid_id!(
    /// Organizational cell (unit) that owns designations
    CellId
);
uuid_id!(
    /// Role within a cell with fixed capacity and base fee
    DesignationId
);
uuid_id!(
    /// Country reference, informational for national and zone seats
    CountryId
);
uuid_id!(
    /// State in the location hierarchy
    StateId
);
uuid_id!(
    /// District in the location hierarchy
    DistrictId
);
uuid_id!(
    /// Mandal, the most specific location
    MandalId
);
uuid_id!(
    /// Team or sub-unit used for fee scoping
    TeamId
);
uuid_id!(
    /// Identity owning a seat
    UserId
);
uuid_id!(
    /// Seat (membership) record
    SeatId
);
uuid_id!(
    /// Payment intent; doubles as the client-facing order id
    IntentId
);
uuid_id!(
    /// Contact-scoped discount
    DiscountId
);
uuid_id!(
    /// Scoped fee override
    FeeOverrideId
);
uuid_id!(
    /// Entry in the webhook dedup ledger
    WebhookEventId
);
uuid_id!(
    /// Row in the per-seat payment ledger
    SeatPaymentId
);
uuid_id!(
    /// Registration settings row
    SettingsId
);

// ============================================================================
// Money Value Object (minor units to avoid floating point errors)
// ============================================================================

/// Amount of money in minor currency units (paise, cents)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(u64);

impl Money {
    /// Zero amount
    pub const ZERO: Self = Self(0);

    /// Creates a `Money` value from minor units
    #[must_use]
    pub const fn from_minor(minor: u64) -> Self {
        Self(minor)
    }

    /// Returns the amount in minor units
    #[must_use]
    pub const fn minor(&self) -> u64 {
        self.0
    }

    /// Checks if the amount is zero
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Adds two money amounts with overflow checking
    #[must_use]
    pub const fn checked_add(self, other: Self) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(result) => Some(Self(result)),
            None => None,
        }
    }

    /// Subtracts, clamping at zero
    #[must_use]
    pub const fn saturating_sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }

    /// `floor(self × percent / 100)`
    ///
    /// Computed in 128-bit so large amounts never overflow.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn percent_of(self, percent: u8) -> Self {
        let product = self.0 as u128 * percent as u128 / 100;
        // percent is validated to 0..=100 at write time, so this never exceeds self
        if product > self.0 as u128 {
            Self(self.0)
        } else {
            Self(product as u64)
        }
    }

    /// Converts to the signed representation used by storage.
    ///
    /// # Errors
    ///
    /// Returns [`SeatError::Validation`] if the amount exceeds `i64::MAX`.
    pub fn to_i64(self) -> Result<i64> {
        i64::try_from(self.0).map_err(|_| SeatError::Validation(format!("amount {} out of range", self.0)))
    }

    /// Converts from the signed representation used by storage.
    ///
    /// # Errors
    ///
    /// Returns [`SeatError::Validation`] for negative amounts.
    pub fn try_from_i64(value: i64) -> Result<Self> {
        u64::try_from(value)
            .map(Self)
            .map_err(|_| SeatError::Validation(format!("negative amount {value}")))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

// ============================================================================
// Textual Value Objects
// ============================================================================

/// ISO-4217 currency code, upper case
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Currency(String);

impl Currency {
    /// Parses a three-letter currency code.
    ///
    /// # Errors
    ///
    /// Returns [`SeatError::Validation`] unless the code is three ASCII letters.
    pub fn parse(code: &str) -> Result<Self> {
        let code = code.trim();
        if code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic()) {
            Ok(Self(code.to_ascii_uppercase()))
        } else {
            Err(SeatError::Validation(format!("invalid currency code '{code}'")))
        }
    }

    /// Indian rupee
    #[must_use]
    pub fn inr() -> Self {
        Self("INR".to_string())
    }

    /// Currency code
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Currency {
    type Error = SeatError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<Currency> for String {
    fn from(value: Currency) -> Self {
        value.0
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Phone number identifying a person before an identity exists
///
/// Stored normalized: separators removed, an optional leading `+` kept.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContactNumber(String);

impl ContactNumber {
    /// Normalizes and validates a phone number.
    ///
    /// # Errors
    ///
    /// Returns [`SeatError::Validation`] unless 7 to 15 digits remain after
    /// stripping spaces, dashes, dots and parentheses.
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        let (prefix, rest) = raw.strip_prefix('+').map_or(("", raw), |rest| ("+", rest));
        let mut digits = String::with_capacity(rest.len());
        for c in rest.chars() {
            match c {
                '0'..='9' => digits.push(c),
                ' ' | '-' | '.' | '(' | ')' => {}
                _ => {
                    return Err(SeatError::Validation(format!(
                        "contact number contains '{c}'"
                    )));
                }
            }
        }
        if !(7..=15).contains(&digits.len()) {
            return Err(SeatError::Validation(
                "contact number must have 7 to 15 digits".to_string(),
            ));
        }
        Ok(Self(format!("{prefix}{digits}")))
    }

    /// Normalized number
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ContactNumber {
    type Error = SeatError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<ContactNumber> for String {
    fn from(value: ContactNumber) -> Self {
        value.0
    }
}

impl fmt::Display for ContactNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What a fee is charged for (`MEMBERSHIP`, `RENEWAL`, ...)
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Purpose(String);

impl Purpose {
    /// Parses a purpose, upper-casing it.
    ///
    /// # Errors
    ///
    /// Returns [`SeatError::MissingPurpose`] for blank input.
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(SeatError::MissingPurpose);
        }
        Ok(Self(raw.to_ascii_uppercase()))
    }

    /// Purpose used for seat registration
    #[must_use]
    pub fn membership() -> Self {
        Self("MEMBERSHIP".to_string())
    }

    /// Purpose name
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Purpose {
    type Error = SeatError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<Purpose> for String {
    fn from(value: Purpose) -> Self {
        value.0
    }
}

impl fmt::Display for Purpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
