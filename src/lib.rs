//! lexkv: durable typed key-value stores for legal-data collection.
//!
//! Collectors pulling Dutch/EU legal sources (SRU endpoints, document
//! repositories, court-decision feeds) fetch the same URLs over and over
//! across runs. lexkv gives them a local, typed, transactional cache so a
//! fetch happens at most once unless explicitly forced, and an interrupted
//! bulk run picks up where it left off.
//!
//! # Building blocks
//!
//! - [`store::LocalKv`]: one SQLite file, one declared (key, value) type
//!   pair, explicit transaction batching, many-reader/single-writer.
//! - [`structured::JsonKv`]: the same store holding JSON trees instead of
//!   raw scalars.
//! - [`fetch::cached_fetch`]: a URL is downloaded at most once; failures
//!   are never cached.
//! - [`discover`]: bare store names resolve into one profile-wide
//!   directory, so every caller opens the same file regardless of the
//!   working directory.
//!
//! # Example
//!
//! ```no_run
//! use lexkv::{Kind, LocalKv, fetch};
//!
//! # fn main() -> Result<(), lexkv::KvError> {
//! let mut cache = LocalKv::open("cvdr-pages.db", Kind::Text, Kind::Bytes)?;
//! let http = fetch::HttpDownloader::new()?;
//! let (body, from_cache) = fetch::cached_fetch(
//!     &mut cache,
//!     &http,
//!     "https://repository.example.nl/sru?query=dcterms.modified>=2024-01-01",
//!     false,
//! )?;
//! # let _ = (body, from_cache);
//! # Ok(())
//! # }
//! ```

pub mod db;
pub mod discover;
pub mod error;
pub mod fetch;
pub mod store;
pub mod structured;
pub mod value;

pub use error::KvError;
pub use store::{LocalKv, OpenOptions};
pub use structured::JsonKv;
pub use value::{Kind, Value};
