//! Fee overrides and the cascading fee resolver.
//!
//! Overrides are scoped to one of team, mandal, district, state, or nothing
//! (global). Resolution walks that order and takes the first tier with a
//! match; inside a tier the earliest-created override wins, so adding a new
//! override never silently changes which one was authoritative.

use crate::catalog::LocationChain;
use crate::error::{Result, SeatError};
use crate::types::{Currency, DistrictId, FeeOverrideId, MandalId, Money, Purpose, StateId, TeamId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Scope of a fee override
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "ref", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FeeScope {
    /// Team or sub-unit
    Team(TeamId),
    /// Mandal
    Mandal(MandalId),
    /// District
    District(DistrictId),
    /// State
    State(StateId),
    /// Applies everywhere
    Global,
}

impl FeeScope {
    /// Builds a scope from optional references.
    ///
    /// # Errors
    ///
    /// [`SeatError::Validation`] if more than one reference is set.
    pub fn from_refs(
        team: Option<TeamId>,
        mandal: Option<MandalId>,
        district: Option<DistrictId>,
        state: Option<StateId>,
    ) -> Result<Self> {
        let set = [team.is_some(), mandal.is_some(), district.is_some(), state.is_some()]
            .into_iter()
            .filter(|s| *s)
            .count();
        if set > 1 {
            return Err(SeatError::Validation(
                "fee override must be scoped to at most one of team, mandal, district, state".to_string(),
            ));
        }
        Ok(match (team, mandal, district, state) {
            (Some(team), ..) => Self::Team(team),
            (_, Some(mandal), ..) => Self::Mandal(mandal),
            (_, _, Some(district), _) => Self::District(district),
            (.., Some(state)) => Self::State(state),
            _ => Self::Global,
        })
    }

    const fn source(self) -> FeeSource {
        match self {
            Self::Team(_) => FeeSource::Team,
            Self::Mandal(_) => FeeSource::Mandal,
            Self::District(_) => FeeSource::District,
            Self::State(_) => FeeSource::State,
            Self::Global => FeeSource::Global,
        }
    }
}

/// Where a quoted fee came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FeeSource {
    /// Team override
    Team,
    /// Mandal override
    Mandal,
    /// District override
    District,
    /// State override
    State,
    /// Global override
    Global,
    /// Designation base fee, no override matched
    Designation,
}

/// Fee override for a purpose
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeOverride {
    /// Identifier
    pub id: FeeOverrideId,
    /// Purpose charged
    pub purpose: Purpose,
    /// Scope
    pub scope: FeeScope,
    /// Amount
    pub amount: Money,
    /// Currency
    pub currency: Currency,
    /// Renewal cadence, if the fee recurs
    pub renewal_interval_months: Option<u32>,
    /// Creation time; earliest wins within a tier
    pub created_at: DateTime<Utc>,
}

/// Scope coordinates to resolve a fee for
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FeeQuery {
    /// Team, if the registrant belongs to one
    pub team: Option<TeamId>,
    /// Mandal
    pub mandal: Option<MandalId>,
    /// District
    pub district: Option<DistrictId>,
    /// State
    pub state: Option<StateId>,
}

impl FeeQuery {
    /// Query covering a resolved location chain.
    #[must_use]
    pub const fn new(team: Option<TeamId>, chain: LocationChain) -> Self {
        Self {
            team,
            mandal: chain.mandal,
            district: chain.district,
            state: chain.state,
        }
    }

    fn tiers(&self) -> impl Iterator<Item = FeeScope> {
        [
            self.team.map(FeeScope::Team),
            self.mandal.map(FeeScope::Mandal),
            self.district.map(FeeScope::District),
            self.state.map(FeeScope::State),
            Some(FeeScope::Global),
        ]
        .into_iter()
        .flatten()
    }
}

/// Fee selected by the resolver
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedFee {
    /// Amount before discounts
    pub amount: Money,
    /// Currency
    pub currency: Currency,
    /// Renewal cadence
    pub renewal_interval_months: Option<u32>,
    /// Tier that supplied the fee
    pub source: FeeSource,
    /// Override used, absent for designation fees
    pub override_id: Option<FeeOverrideId>,
}

/// Picks the most specific override for `query` among `overrides`.
///
/// `overrides` must already be filtered to one purpose. Returns `None` when
/// nothing matches, in which case the designation base fee applies.
#[must_use]
pub fn resolve_override(overrides: &[FeeOverride], query: &FeeQuery) -> Option<ResolvedFee> {
    query.tiers().find_map(|tier| {
        overrides
            .iter()
            .filter(|o| o.scope == tier)
            .min_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)))
            .map(|o| {
                tracing::debug!(override_id = %o.id, source = ?tier.source(), "Fee override matched");
                ResolvedFee {
                    amount: o.amount,
                    currency: o.currency.clone(),
                    renewal_interval_months: o.renewal_interval_months,
                    source: tier.source(),
                    override_id: Some(o.id),
                }
            })
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 0, minute, 0).unwrap()
    }

    fn fee(scope: FeeScope, amount: u64, created_at: DateTime<Utc>) -> FeeOverride {
        FeeOverride {
            id: FeeOverrideId::new(),
            purpose: Purpose::membership(),
            scope,
            amount: Money::from_minor(amount),
            currency: Currency::inr(),
            renewal_interval_months: Some(12),
            created_at,
        }
    }

    #[test]
    fn test_most_specific_tier_wins() {
        let mandal = MandalId::new();
        let district = DistrictId::new();
        let state = StateId::new();
        let overrides = vec![
            fee(FeeScope::Global, 100, at(0)),
            fee(FeeScope::State(state), 200, at(1)),
            fee(FeeScope::District(district), 300, at(2)),
            fee(FeeScope::Mandal(mandal), 400, at(3)),
        ];
        let query = FeeQuery {
            team: None,
            mandal: Some(mandal),
            district: Some(district),
            state: Some(state),
        };

        let resolved = resolve_override(&overrides, &query).unwrap();
        assert_eq!(resolved.amount, Money::from_minor(400));
        assert_eq!(resolved.source, FeeSource::Mandal);
    }

    #[test]
    fn test_falls_through_to_global() {
        let overrides = vec![
            fee(FeeScope::State(StateId::new()), 200, at(1)),
            fee(FeeScope::Global, 100, at(0)),
        ];
        let query = FeeQuery {
            state: Some(StateId::new()),
            ..FeeQuery::default()
        };

        let resolved = resolve_override(&overrides, &query).unwrap();
        assert_eq!(resolved.source, FeeSource::Global);
    }

    #[test]
    fn test_earliest_created_wins_inside_tier() {
        let state = StateId::new();
        let later = fee(FeeScope::State(state), 900, at(9));
        let earlier = fee(FeeScope::State(state), 500, at(5));
        let overrides = vec![later, earlier.clone()];
        let query = FeeQuery {
            state: Some(state),
            ..FeeQuery::default()
        };

        let resolved = resolve_override(&overrides, &query).unwrap();
        assert_eq!(resolved.override_id, Some(earlier.id));
    }

    #[test]
    fn test_team_beats_location() {
        let team = TeamId::new();
        let state = StateId::new();
        let overrides = vec![
            fee(FeeScope::State(state), 200, at(0)),
            fee(FeeScope::Team(team), 50, at(1)),
        ];
        let query = FeeQuery {
            team: Some(team),
            state: Some(state),
            ..FeeQuery::default()
        };

        assert_eq!(resolve_override(&overrides, &query).unwrap().source, FeeSource::Team);
    }

    #[test]
    fn test_no_match_returns_none() {
        let overrides = vec![fee(FeeScope::State(StateId::new()), 200, at(0))];
        assert!(resolve_override(&overrides, &FeeQuery::default()).is_none());
    }

    #[test]
    fn test_scope_from_refs_rejects_two_scopes() {
        let err = FeeScope::from_refs(Some(TeamId::new()), None, None, Some(StateId::new())).unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
        assert_eq!(FeeScope::from_refs(None, None, None, None).unwrap(), FeeScope::Global);
    }
}
