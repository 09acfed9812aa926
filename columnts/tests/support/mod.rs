//! Helpers shared by the integration tests.
#![allow(dead_code)]

use std::sync::{Arc, Once};

use columnts::{ColumnTs, ColumnTsDb, Config, Session, Timestamp};
use common::Storage;
use common::storage::in_memory::InMemoryStorage;

/// 2012-01-23 00:00:00 UTC.
pub const START: Timestamp = 1_327_276_800;
pub const DAY: Timestamp = 86_400;

static TRACING: Once = Once::new();

pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// A database on in-memory storage, with the storage handle for raw reads.
pub fn open_db() -> (Arc<dyn Storage>, ColumnTsDb) {
    init_tracing();
    let storage: Arc<dyn Storage> = Arc::new(InMemoryStorage::new());
    let db = ColumnTsDb::with_storage(storage.clone(), &Config::default());
    (storage, db)
}

/// Deterministic pseudo-random values, so failures reproduce.
pub struct Lcg(u64);

impl Lcg {
    pub fn new(seed: u64) -> Self {
        Self(seed)
    }

    /// A value in `[0, 100)` with two decimals.
    pub fn next_value(&mut self) -> f64 {
        self.0 = self
            .0
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        ((self.0 >> 33) % 10_000) as f64 / 100.0
    }
}

/// Fills `fields` of a new series at `days` consecutive dates from `START`
/// and commits them in one transaction.
pub async fn populate(
    session: &Session,
    id: &str,
    fields: &[&str],
    days: i64,
    rng: &mut Lcg,
) -> ColumnTs {
    let series = ColumnTs::with_session(id, session.clone());
    session.begin();
    for day in 0..days {
        let values: Vec<(&str, f64)> = fields.iter().map(|f| (*f, rng.next_value())).collect();
        series
            .add_fields(START + day * DAY, values)
            .await
            .expect("buffer write");
    }
    session.commit().await.expect("commit");
    series
}
