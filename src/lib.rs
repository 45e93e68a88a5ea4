//! Per-column hashing and value-id assignment for hash-based operators.
//!
//! A [`ColumnHasher`] is bound to one key column of a vectorized batch
//! and serves the hash join build/probe, hash aggregation, and hash set
//! operators. It produces either a 64-bit hash per selected row, with
//! optional mixing into an accumulated multi-column hash, or small dense
//! value-ids that a chain of hashers packs into a single 64-bit
//! composite key as `sum(multiplier_i * id_i)`.
//!
//! The id domain is learned online. Emission failures feed an analysis
//! state (observed integer range plus distinct value set), the operator
//! inspects [`ColumnHasher::cardinality`] and activates range or
//! distinct encoding, and parallel hashers over disjoint shards can be
//! fused with [`ColumnHasher::merge`] before the decision is made. When
//! the data exceeds every budget the operator falls back to plain
//! hashing.
#![deny(rustdoc::broken_intra_doc_links, rust_2018_idioms)]
#![warn(clippy::clone_on_ref_ptr, clippy::use_self)]
#![allow(dead_code, clippy::too_many_arguments)]

mod bitmap;
mod decoded;
mod distinct;
mod filter;
mod hash;
mod hasher;
pub mod rows;
mod selection;
mod vector;

// Identifiers that are exported as part of the public API.
pub use bitmap::Bitmap;
pub use decoded::DecodedVector;
pub use distinct::{DistinctTable, STRING_BUFFER_UNIT_SIZE};
pub use filter::BigintValuesFilter;
pub use hash::{hash_mix, NULL_HASH};
pub use hasher::{
    ColumnHasher, ScratchMemory, MAX_DISTINCT, MAX_DISTINCT_STRINGS_BYTES, MAX_RANGE,
    RANGE_TOO_LARGE, STRING_AS_RANGE_MAX_SIZE, UNMAPPABLE,
};
pub use selection::SelectionVector;
pub use vector::{
    ConstantVector, DictionaryVector, Error, FlatVector, NativeType, Result, Scalar, StringData,
    TypeKind, Values, Vector,
};
