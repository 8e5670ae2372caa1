#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! `OData` V2/V4 protocol adaptation
//!
//! Client-side pieces for talking to `OData` services of either major version:
//! - Literal encoding for filter values and key segments ([`literal`])
//! - A fluent `$filter` expression builder ([`FilterBuilder`])
//! - Query option assembly with per-version count/search policies ([`QueryOptions`])
//! - Response normalization into one entity/collection model ([`normalize`], [`model`])
//!
//! Everything is synchronous and side-effect free apart from `tracing` events; the
//! HTTP transport belongs to the caller.
//!
//! # Example
//!
//! ```rust
//! use http::HeaderMap;
//! use odata_adapter::{
//!     FilterBuilder, Normalizer, ODataVersion, ResponseNormalizer, V4QueryOptions,
//! };
//!
//! # fn main() -> Result<(), odata_adapter::Error> {
//! let filter = FilterBuilder::new().field("Name").starts_with("A")?.build();
//! let query = V4QueryOptions::new().filter(filter).top(2)?.count(true);
//! assert_eq!(
//!     query.query_string(),
//!     "?$filter=startswith%28Name%2C%27A%27%29&$top=2&$count=true"
//! );
//!
//! let body = r#"{
//!     "@odata.context": "$metadata#People",
//!     "@odata.count": 1,
//!     "value": [{"@odata.id": "People(1)", "Name": "Ann"}]
//! }"#;
//! let people = Normalizer::for_version(ODataVersion::V4)
//!     .parse_collection(body, &HeaderMap::new())?;

//! assert_eq!(people.total_count(), Some(1));
//! assert_eq!(people.first().map(|p| p.entity_type()), Some("People"));
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod filter;
pub mod literal;
pub mod model;
pub mod normalize;
pub mod query;
pub mod version;

pub use config::{AdapterConfig, NormalizerOptions};
pub use error::{Error, Result};
pub use filter::{CompareOp, FilterBuilder};
pub use literal::{IntoLiteral, KeyPredicate, Literal};
pub use model::{Entity, EntityCollection, EntityId, Navigation};
pub use normalize::{Normalizer, ResponseNormalizer, V2Normalizer, V4Normalizer};
pub use query::{
    FieldNames, OptionMap, QueryOptions, SortDir, V2Policy, V2QueryOptions, V4Policy,
    V4QueryOptions, VersionPolicy,
};
pub use version::ODataVersion;
