//! Wired engine with a seeded location hierarchy.

use crate::directory::{InMemoryIdentityStore, InMemoryProfileStore};
use crate::memory::InMemorySeatStore;
use crate::mocks::{FixedClock, test_clock};
use crate::provider::MockPaymentProvider;
use chrono::Utc;
use seat_engine_core::RegistrationEngine;
use seat_engine_core::catalog::{AggregateCapacity, Cell, Designation, District, Mandal, State};
use seat_engine_core::settings::{EngineConfig, RegistrationSettings};
use seat_engine_core::spec::{GeoScope, OrgLevel, SeatSpec};
use seat_engine_core::types::{
    CellId, ContactNumber, Currency, DesignationId, DistrictId, MandalId, Money, SettingsId, StateId,
};
use std::sync::Arc;

/// Engine over the in-memory doubles
pub type TestEngine =
    RegistrationEngine<InMemorySeatStore, MockPaymentProvider, InMemoryIdentityStore, InMemoryProfileStore>;

/// Engine plus handles on every double it uses
///
/// Seeds one cell and a state → district → mandal chain.
pub struct Harness {
    /// Engine under test
    pub engine: TestEngine,
    /// Seat store
    pub store: InMemorySeatStore,
    /// Payment provider
    pub provider: Arc<MockPaymentProvider>,
    /// Identity store
    pub identities: Arc<InMemoryIdentityStore>,
    /// Profile store
    pub profiles: Arc<InMemoryProfileStore>,
    /// Clock shared with the engine
    pub clock: Arc<FixedClock>,
    /// Seeded cell
    pub cell: CellId,
    /// Seeded state
    pub state: StateId,
    /// Seeded district in `state`
    pub district: DistrictId,
    /// Seeded mandal in `district`
    pub mandal: MandalId,
}

impl Harness {
    /// Harness with the default [`EngineConfig`].
    pub async fn new() -> Self {
        Self::with_config(EngineConfig::default()).await
    }

    /// Harness with a custom configuration.
    pub async fn with_config(config: EngineConfig) -> Self {
        let store = InMemorySeatStore::new();
        let provider = Arc::new(MockPaymentProvider::new());
        let identities = Arc::new(InMemoryIdentityStore::new());
        let profiles = Arc::new(InMemoryProfileStore::new());
        let clock = Arc::new(test_clock());

        let cell = CellId::new();
        let state = StateId::new();
        let district = DistrictId::new();
        let mandal = MandalId::new();
        store
            .seed(|data| {
                data.cells.insert(
                    cell,
                    Cell {
                        id: cell,
                        name: "Youth Wing".to_string(),
                    },
                );
                data.states.insert(
                    state,
                    State {
                        id: state,
                        name: "Telangana".to_string(),
                    },
                );
                data.districts.insert(
                    district,
                    District {
                        id: district,
                        state,
                        name: "Hyderabad".to_string(),
                    },
                );
                data.mandals.insert(
                    mandal,
                    Mandal {
                        id: mandal,
                        district,
                        name: "Secunderabad".to_string(),
                    },
                );
            })
            .await;

        let engine = RegistrationEngine::new(
            Arc::new(store.clone()),
            Arc::clone(&provider),
            Arc::clone(&identities),
            Arc::clone(&profiles),
            Arc::clone(&clock) as Arc<dyn seat_engine_core::environment::Clock>,
            config,
        );

        Self {
            engine,
            store,
            provider,
            identities,
            profiles,
            clock,
            cell,
            state,
            district,
            mandal,
        }
    }

    /// Adds a designation to the seeded cell. `fee` is in minor units.
    pub async fn designation(&self, capacity: u32, fee: u64) -> Designation {
        self.designation_with_validity(capacity, fee, 365).await
    }

    /// Adds a designation with an explicit validity.
    pub async fn designation_with_validity(&self, capacity: u32, fee: u64, validity_days: u32) -> Designation {
        let designation = Designation {
            id: DesignationId::new(),
            cell: self.cell,
            name: format!("Secretary ({capacity})"),
            capacity,
            fee: Money::from_minor(fee),
            validity_days,
        };
        let row = designation.clone();
        self.store
            .seed(move |data| {
                data.designations.insert(row.id, row);
            })
            .await;
        designation
    }

    /// Caps all designations of the seeded cell at `spec`'s level bucket.
    pub async fn aggregate_cap(&self, spec: &SeatSpec, capacity: u32) {
        let bucket = spec.level_bucket();
        self.store
            .seed(move |data| {
                data.aggregates
                    .insert(bucket.clone(), AggregateCapacity { bucket, capacity });
            })
            .await;
    }

    /// Stores a settings row.
    pub async fn settings(&self, currency: &str, renewal_interval_months: Option<u32>) {
        let row = RegistrationSettings {
            id: SettingsId::new(),
            currency: Currency::parse(currency).unwrap_or_else(|_| Currency::inr()),
            renewal_interval_months,
            is_active: true,
            created_at: Utc::now(),
        };
        self.store.seed(move |data| data.settings.push(row)).await;
    }

    /// National spec for `designation`.
    #[must_use]
    pub fn national(&self, designation: &Designation) -> SeatSpec {
        self.spec(designation, GeoScope::National { country: None })
    }

    /// Zone spec for `designation`.
    #[must_use]
    pub fn zone(&self, designation: &Designation, zone: &str) -> SeatSpec {
        self.spec(
            designation,
            GeoScope::Zone {
                zone: zone.to_string(),
                country: None,
            },
        )
    }

    /// Spec in the seeded state.
    #[must_use]
    pub fn state_spec(&self, designation: &Designation) -> SeatSpec {
        self.spec(designation, GeoScope::State { state: self.state })
    }

    /// Spec in the seeded district.
    #[must_use]
    pub fn district_spec(&self, designation: &Designation) -> SeatSpec {
        self.spec(
            designation,
            GeoScope::District {
                district: self.district,
            },
        )
    }

    /// Spec in the seeded mandal.
    #[must_use]
    pub fn mandal_spec(&self, designation: &Designation) -> SeatSpec {
        self.spec(designation, GeoScope::Mandal { mandal: self.mandal })
    }

    /// Spec at `level` in the seeded hierarchy.
    #[must_use]
    pub fn at_level(&self, designation: &Designation, level: OrgLevel) -> SeatSpec {
        match level {
            OrgLevel::National => self.national(designation),
            OrgLevel::Zone => self.zone(designation, "SOUTH"),
            OrgLevel::State => self.state_spec(designation),
            OrgLevel::District => self.district_spec(designation),
            OrgLevel::Mandal => self.mandal_spec(designation),
        }
    }

    fn spec(&self, designation: &Designation, scope: GeoScope) -> SeatSpec {
        SeatSpec {
            cell: self.cell,
            designation: designation.id,
            scope,
        }
    }
}

/// Contact number `+9198765432{n:02}`.
///
/// # Panics
///
/// Never; the generated number is always well formed.
#[must_use]
#[allow(clippy::expect_used)]
pub fn contact(n: u8) -> ContactNumber {
    ContactNumber::parse(&format!("+9198765432{:02}", n % 100)).expect("well-formed contact")
}
