//! Activity Insights - Dashboard analytics over tracked activity time
//!
//! Turns pre-aggregated activity data into chart-ready results through pure,
//! deterministic stages:
//!
//! - **Period comparison**: category snapshots → previous-period derivation
//!   → top-N with overflow → comparison rows and trend
//! - **Series binning**: stochastic time series → global top-N applied to every
//!   point → stacked-area series
//! - **Time-of-day density**: tracked events → (time of day, duration) samples
//!   → kernel density contours per activity
//!
//! Fetching and rendering stay with the caller; `request` helps it discard
//! results of superseded requests.

pub mod chart;
pub mod config;
pub mod density;
pub mod error;
pub mod events;
pub mod period;
pub mod pipeline;
pub mod request;
pub mod series;
pub mod snapshot;
pub mod top_n;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use config::{DensityConfig, PipelineConfig};
pub use error::ComputeError;
pub use pipeline::{
    bin_series, compare_periods, density_contours, process, process_json, InsightsProcessor,
    Request, Response,
};
pub use request::{RequestTicket, RequestTracker};
pub use types::{CategorySnapshot, ContourPolygon, PeriodPair, StochasticSeries};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
