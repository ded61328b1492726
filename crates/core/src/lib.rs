//! `inventa-core`: types shared by the reader, the reconciliation engine and
//! the store.
//!
//! Nothing in here performs IO.

pub mod key;
pub mod product;
pub mod row;

pub use key::IdentityKey;
pub use product::{PersistedId, PersistedProduct, ProductRecord};
pub use row::{Cell, RawRow, RowPayload, RowSource, SourceFormat, SourceStatus};
