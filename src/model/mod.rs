//! # Property Graph Model
//!
//! Immutable DTOs shared by the decoder, the encoder, mutations and queries.
//! Pure data — no I/O, no async.

pub mod edge;
pub mod element;
pub mod geo;
pub mod large_value;
pub mod path;
pub mod property;
pub mod value;
pub mod vertex;

pub use edge::Edge;
pub use element::{Direction, Element, ElementId, ElementType, GraphElement};
pub use geo::{GeoCircle, GeoPoint};
pub use large_value::{LargeValueRef, LargeValueStore};
pub use path::Path;
pub use property::{Metadata, Property, PropertyIdentity};
pub use value::Value;
pub use vertex::{EdgeInfo, Vertex};
