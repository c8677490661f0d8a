//! Data layer: sources, the daily store, and the two pipelines over it.

pub mod build;
pub mod bybit;
pub mod fixture;
pub mod ingest;
pub mod registry;
pub mod source;
pub mod store;

pub use build::{build, write_series, BuildError, BuiltSeries};
pub use bybit::BybitSource;
pub use fixture::FixtureSource;
pub use ingest::{
    ingest, ingest_dates, DayOutcome, FailedDay, FailureKind, IngestError, IngestProgress,
    IngestReport, LogProgress, NoProgress, SkipReason, SkippedDay,
};
pub use registry::{RegistryError, SourceRegistry};
pub use source::{FetchError, SourceAdapter};
pub use store::{DailyStore, Inventory, InventoryEntry, StoreError};
