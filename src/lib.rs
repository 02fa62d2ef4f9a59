//! A multi-resolution, round-robin time series archive.
//!
//! Every series is identified by a subject, an attribute and a consolidation
//! function, e.g. `h-1/load/average`. Samples written to a series are merged
//! into fixed-width bins at several resolutions at once (by default one
//! minute for a day, one hour for eight weeks, one day for four years), so
//! storage per series stays bounded no matter how long it is written to.
//!
//! Queries pick the finest resolution that still covers the requested range.
//!
//! Tier state is kept in a key-value [`Store`](store::Store): either in
//! memory, or persisted through <https://github.com/fjall-rs/fjall>.
//!
//! ```
//! # let path = tempfile::tempdir()?;
//! use tiera::{Archive, Cf, SeriesKey};
//!
//! let archive = Archive::builder().open(&path)?;
//!
//! let key = SeriesKey::new("h-1", "load", Cf::Average)?;
//!
//! archive.append(&key, 3_600, Some(0.5))?;
//! archive.append(&key, 3_610, Some(1.5))?;
//! archive.append(&key, 3_660, None)?;
//!
//! let points = archive
//!     .query(&key)
//!     .start(3_600)
//!     .stop(3_660)
//!     .width(60)
//!     .run()?;
//!
//! assert_eq!(vec![(3_600, Some(1.0)), (3_660, None)], points);
//!
//! # Ok::<(), tiera::Error>(())
//! ```

#![forbid(unsafe_code)]
#![deny(clippy::all, clippy::cargo)]
#![warn(missing_docs)]
#![deny(clippy::unwrap_used)]
#![warn(clippy::indexing_slicing)]
#![warn(clippy::pedantic, clippy::nursery)]
#![warn(clippy::expect_used)]
#![allow(clippy::missing_const_for_fn)]
#![warn(clippy::multiple_crate_versions)]
#![warn(clippy::result_unit_err)]

mod agg;
mod db;
mod db_builder;
mod duration;
mod error;
mod lock;
mod record;
mod schema;
mod series;
mod series_key;
mod time;

pub mod query;
pub mod store;
pub mod validate;

type HashMap<K, V> = std::collections::HashMap<K, V, rustc_hash::FxBuildHasher>;

pub use agg::{cf::Cf, nearest, Bin};
pub use db::Archive;
pub use db_builder::{Builder, Config};
pub use duration::Duration;
pub use error::{Error, Result};
pub use query::{
    filter::{Filter, Stencil},
    Points,
};
pub use schema::{Schema, Tier};
pub use series::TierState;
pub use series_key::SeriesKey;
pub use time::{timestamp, Deadline};

/// Seconds since the Unix epoch
pub type Timestamp = i64;

/// Value of a sample
pub type Value = f64;

/// A consolidated bin as returned by queries: timestamp and value, `None` if missing
pub type Point = (Timestamp, Option<Value>);
