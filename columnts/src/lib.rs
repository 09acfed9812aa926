//! ColumnTS - columnar time series inside a key-value store.
//!
//! A series is a set of named numeric fields sampled at shared timestamps.
//! Its timestamps live in one ordered index key and each field lives in one
//! key holding a packed string of fixed 9-byte records, one per timestamp.
//! Reading a window of a field is a single slice of one value.
//!
//! # Architecture
//!
//! - **Codec**: 9-byte records, a tag byte followed by a big-endian `f64`.
//! - **Engine**: runs bulk procedures (insert, merge, statistics, ranges)
//!   atomically under a single writer, applying each batch of calls as one
//!   storage write so an index and its fields never drift apart.
//! - **Session**: buffers writes per series and flushes them through the
//!   engine on commit, or immediately when no transaction is open.
//! - **ColumnTs**: the series façade over all of the above.
//!
//! # Example
//!
//! ```ignore
//! use columnts::{ColumnTsDb, Config, FieldFilter};
//!
//! let db = ColumnTsDb::open(Config::default()).await?;
//! let session = db.session();
//! let series = columnts::ColumnTs::with_session("EUR:USD", session.clone());
//!
//! session.begin();
//! series.add_fields(1_327_276_800, [("open", 1.31), ("close", 1.30)]).await?;
//! session.commit().await?;
//!
//! let stats = series.istats(0, -1, &FieldFilter::all()).await?;
//! ```

mod cache;
pub mod codec;
mod config;
mod db;
pub mod engine;
mod error;
mod field;
mod index;
mod model;
mod serde;
mod series;
mod session;

pub use cache::{PendingMerge, WriteCache};
pub use config::{Config, EngineConfig};
pub use db::ColumnTsDb;
pub use engine::{Engine, Procedure, ScriptCall, ScriptHost, ScriptResponse};
pub use error::{Error, Result};
pub use model::{
    FieldStats, FieldValues, MultiStats, SeriesInfo, SeriesRange, SeriesStats, StatsType,
    Timestamp,
};
pub use crate::serde::args::{
    FieldFilter, InsertBatch, InsertEntry, MergeDescriptor, MergeTerm, SHAPE_MAPPING, Window,
};
pub use crate::serde::key::SeriesKey;
pub use series::{ColumnTs, MergeComponent, SeriesStatus};
pub use session::Session;
