//! Per-column hashing and value-id assignment.
//!
//! One [`ColumnHasher`] is bound to one key column. For every input batch
//! an operator either asks it for 64-bit hashes (general hash-table
//! keying) or for value-ids that pack into a composite grouping key as
//! `sum(multiplier_i * id_i)`. The id domain is learned online: emission
//! failures feed the analysis state, the operator consults
//! [`ColumnHasher::cardinality`] and activates an encoding, and sibling
//! hashers covering disjoint data shards can be fused with
//! [`ColumnHasher::merge`] before activation.

use tracing::debug;

use crate::decoded::DecodedVector;
use crate::distinct::DistinctTable;
use crate::filter::BigintValuesFilter;
use crate::hash::{hash_bool, hash_bytes, hash_int, hash_mix, NULL_HASH};
use crate::rows::{self, RowHeap};
use crate::selection::SelectionVector;
use crate::vector::{NativeType, TypeKind, Vector};

/// Id value meaning the value is outside the current domain and the
/// caller must grow the domain or fall back to plain hashing. All ones,
/// so accidental use as an offset lands far out of bounds.
pub const UNMAPPABLE: u64 = u64::MAX;

/// Cardinality sentinel for a domain too large to encode.
pub const RANGE_TOO_LARGE: u64 = u64::MAX;

/// Largest usable `max - min` spread for range encoding.
pub const MAX_RANGE: i64 = i64::MAX - 64;

/// Hard cap on tracked distinct values per column.
pub const MAX_DISTINCT: usize = 10_000;

/// Hard cap on bytes reserved for distinct string storage.
pub const MAX_DISTINCT_STRINGS_BYTES: usize = 1 << 20;

/// Strings up to this many bytes map reversibly onto `i64` and can
/// participate in range encoding.
pub const STRING_AS_RANGE_MAX_SIZE: usize = 7;

/// Reusable buffers for the read-only probe-side lookup, which cannot
/// touch the hasher's own scratch because it takes `&self`.
#[derive(Debug, Default)]
pub struct ScratchMemory {
    ids: Vec<u64>,
}

#[derive(Debug)]
pub struct ColumnHasher {
    kind: TypeKind,

    // Scratch keyed by dictionary base index, reused across batches.
    // Holds hashes under `hash` and ids under `compute_value_ids`.
    cached_hashes: Vec<u64>,

    // Analysis state.
    has_range: bool,
    range_overflow: bool,
    min: i64,
    max: i64,
    distinct_overflow: bool,
    unique_values: DistinctTable,

    // Encoding state, set by the enable calls.
    is_range: bool,
    multiplier: u64,
    range_size: u64,
}

impl ColumnHasher {
    pub fn new(kind: TypeKind) -> Self {
        Self {
            kind,
            cached_hashes: Vec::new(),
            has_range: false,
            range_overflow: false,
            min: 0,
            max: 0,
            distinct_overflow: false,
            unique_values: DistinctTable::new(),
            is_range: false,
            multiplier: 1,
            range_size: 0,
        }
    }

    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    /// The factor this hasher's ids are scaled by in the composite key.
    pub fn multiplier(&self) -> u64 {
        self.multiplier
    }

    /// Cardinality of the active id domain, including the null slot and
    /// any reserve padding. Zero before an encoding is enabled.
    pub fn range_size(&self) -> u64 {
        self.range_size
    }

    //
    //
    // ---- Hashing.
    //
    //

    /// Writes a 64-bit hash for every selected row into `out`. With
    /// `mix` the hash is folded into the existing `out[row]`, so a chain
    /// of hashers builds one composite hash in a single pass per column.
    pub fn hash(&mut self, vector: &Vector, rows: &SelectionVector, mix: bool, out: &mut [u64]) {
        let decoded = self.decode(vector);
        let cached = &mut self.cached_hashes;
        match self.kind {
            TypeKind::Bool => {
                hash_values(&decoded, rows, mix, out, cached, |row| {
                    hash_bool(decoded.bool_at(row))
                });
            }
            TypeKind::Int8 => hash_typed::<i8>(&decoded, rows, mix, out, cached),
            TypeKind::Int16 => hash_typed::<i16>(&decoded, rows, mix, out, cached),
            TypeKind::Int32 => hash_typed::<i32>(&decoded, rows, mix, out, cached),
            TypeKind::Int64 => hash_typed::<i64>(&decoded, rows, mix, out, cached),
            TypeKind::Float32 => hash_typed::<f32>(&decoded, rows, mix, out, cached),
            TypeKind::Float64 => hash_typed::<f64>(&decoded, rows, mix, out, cached),
            TypeKind::String => {
                hash_values(&decoded, rows, mix, out, cached, |row| {
                    hash_bytes(decoded.str_at(row))
                });
            }
        }
    }

    //
    //
    // ---- Value-id emission.
    //
    //

    /// Writes the value-id of every selected row into `out`, scaled by
    /// the multiplier. Returns `true` iff every selected row mapped.
    ///
    /// A miss leaves `out[row]` untouched and the scan keeps going, but
    /// only to feed the remaining values into analysis, so one retry
    /// with a grown domain can succeed in a single pass.
    pub fn compute_value_ids(
        &mut self,
        vector: &Vector,
        rows: &SelectionVector,
        out: &mut [u64],
    ) -> bool {
        let decoded = self.decode(vector);
        match self.kind {
            TypeKind::Bool => self.make_bool_ids(&decoded, rows, out),
            TypeKind::Int8 => self.make_ids::<i8>(&decoded, rows, out),
            TypeKind::Int16 => self.make_ids::<i16>(&decoded, rows, out),
            TypeKind::Int32 => self.make_ids::<i32>(&decoded, rows, out),
            TypeKind::Int64 => self.make_ids::<i64>(&decoded, rows, out),
            TypeKind::String => self.make_string_ids(&decoded, rows, out),
            TypeKind::Float32 | TypeKind::Float64 => {
                panic!("unsupported value id type: {}", self.kind.name())
            }
        }
    }

    /// Row-keyed variant of [`Self::compute_value_ids`] reading values
    /// out of fixed-layout group payloads. `heap` backs the string
    /// fields and may be `None` for fixed-width columns.
    ///
    /// The string path returns on the first miss without feeding
    /// analysis. It only runs after analysis is complete, so feeding it
    /// would change nothing today, but the asymmetry with the vector
    /// path is deliberate and load-bearing for group semantics.
    pub fn compute_value_ids_for_rows(
        &mut self,
        groups: &[&[u8]],
        heap: Option<&RowHeap>,
        offset: usize,
        null_byte: usize,
        null_mask: u8,
        out: &mut [u64],
    ) -> bool {
        match self.kind {
            TypeKind::Bool => {
                for (i, group) in groups.iter().enumerate() {
                    if rows::is_null(group, null_byte, null_mask) {
                        if self.multiplier == 1 {
                            out[i] = 0;
                        }
                        continue;
                    }
                    let id = bool_value_id(group[offset] != 0);
                    out[i] = self.apply_multiplier(out[i], id);
                }
                true
            }
            TypeKind::Int8 => self.make_row_ids::<i8>(groups, offset, null_byte, null_mask, out),
            TypeKind::Int16 => self.make_row_ids::<i16>(groups, offset, null_byte, null_mask, out),
            TypeKind::Int32 => self.make_row_ids::<i32>(groups, offset, null_byte, null_mask, out),
            TypeKind::Int64 => self.make_row_ids::<i64>(groups, offset, null_byte, null_mask, out),
            TypeKind::String => {
                let heap = heap.expect("string row payloads require a row heap");
                self.make_row_ids_string(groups, heap, offset, null_byte, null_mask, out)
            }
            TypeKind::Float32 | TypeKind::Float64 => {
                panic!("unsupported value id type: {}", self.kind.name())
            }
        }
    }

    /// Read-only value-id lookup for the probe side of a join. Unknown
    /// values never extend the domain; their rows are removed from the
    /// selection instead, and the bounds are recomputed.
    pub fn lookup_value_ids(
        &self,
        vector: &Vector,
        rows: &mut SelectionVector,
        scratch: &mut ScratchMemory,
        out: &mut [u64],
    ) {
        let decoded = self.decode(vector);
        match self.kind {
            TypeKind::Bool => {
                self.make_bool_ids(&decoded, rows, out);
            }
            TypeKind::Int8 => self.lookup_ids::<i8>(&decoded, rows, scratch, out),
            TypeKind::Int16 => self.lookup_ids::<i16>(&decoded, rows, scratch, out),
            TypeKind::Int32 => self.lookup_ids::<i32>(&decoded, rows, scratch, out),
            TypeKind::Int64 => self.lookup_ids::<i64>(&decoded, rows, scratch, out),
            TypeKind::String => self.lookup_ids_string(&decoded, rows, scratch, out),
            TypeKind::Float32 | TypeKind::Float64 => {
                panic!("unsupported value id type: {}", self.kind.name())
            }
        }
    }

    //
    //
    // ---- Analysis.
    //
    //

    /// Feeds every selected non-null value of a batch into analysis.
    pub fn analyze_batch(&mut self, vector: &Vector, rows: &SelectionVector) {
        let decoded = self.decode(vector);
        match self.kind {
            TypeKind::Bool => rows.for_each_selected(|row| {
                if !decoded.is_null_at(row) {
                    self.analyze_i64(decoded.bool_at(row) as i64);
                }
            }),
            TypeKind::Int8 => self.analyze_batch_typed::<i8>(&decoded, rows),
            TypeKind::Int16 => self.analyze_batch_typed::<i16>(&decoded, rows),
            TypeKind::Int32 => self.analyze_batch_typed::<i32>(&decoded, rows),
            TypeKind::Int64 => self.analyze_batch_typed::<i64>(&decoded, rows),
            TypeKind::String => rows.for_each_selected(|row| {
                if !decoded.is_null_at(row) {
                    self.analyze_bytes(decoded.str_at(row));
                }
            }),
            TypeKind::Float32 | TypeKind::Float64 => {
                panic!("unsupported value id type: {}", self.kind.name())
            }
        }
    }

    /// Row-keyed analysis over existing group payloads.
    pub fn analyze(
        &mut self,
        groups: &[&[u8]],
        heap: Option<&RowHeap>,
        offset: usize,
        null_byte: usize,
        null_mask: u8,
    ) {
        match self.kind {
            TypeKind::Bool => {
                for group in groups {
                    if !rows::is_null(group, null_byte, null_mask) {
                        self.analyze_i64((group[offset] != 0) as i64);
                    }
                }
            }
            TypeKind::Int8 => self.analyze_rows_typed::<i8>(groups, offset, null_byte, null_mask),
            TypeKind::Int16 => self.analyze_rows_typed::<i16>(groups, offset, null_byte, null_mask),
            TypeKind::Int32 => self.analyze_rows_typed::<i32>(groups, offset, null_byte, null_mask),
            TypeKind::Int64 => self.analyze_rows_typed::<i64>(groups, offset, null_byte, null_mask),
            TypeKind::String => {
                let heap = heap.expect("string row payloads require a row heap");
                let mut scratch = Vec::new();
                for group in groups {
                    if rows::is_null(group, null_byte, null_mask) {
                        continue;
                    }
                    let field = rows::read_string_field(group, offset);
                    let bytes = heap.contiguous(field, &mut scratch);
                    self.analyze_bytes(bytes);
                }
            }
            TypeKind::Float32 | TypeKind::Float64 => {
                panic!("unsupported value id type: {}", self.kind.name())
            }
        }
    }

    /// Reports the domain cardinality as a range encoding and as a
    /// distinct encoding, `RANGE_TOO_LARGE` where infeasible. Both
    /// counts include the reserved null slot.
    pub fn cardinality(&mut self) -> (u64, u64) {
        if self.kind == TypeKind::Bool {
            self.has_range = true;
            self.min = 0;
            self.max = 1;
            return (3, 3);
        }
        let as_range = if !self.has_range || self.range_overflow {
            RANGE_TOO_LARGE
        } else {
            match self.max.checked_sub(self.min) {
                Some(signed_range) if signed_range < MAX_RANGE => signed_range as u64 + 2,
                _ => {
                    self.range_overflow = true;
                    RANGE_TOO_LARGE
                }
            }
        };
        let as_distincts = if self.distinct_overflow {
            RANGE_TOO_LARGE
        } else {
            self.unique_values.len() as u64 + 1
        };
        (as_range, as_distincts)
    }

    //
    //
    // ---- Encoding activation.
    //
    //

    /// Activates range encoding. `reserve` is split in half and added as
    /// padding below and above the observed range, saturating at the
    /// `i64` extremes. Returns `multiplier * range_size` so the caller
    /// can compose the next column's multiplier, or `RANGE_TOO_LARGE`
    /// if the product overflows.
    ///
    /// May be called again after further analysis to re-derive the
    /// domain from the widened envelope.
    pub fn enable_value_range(&mut self, multiplier: u64, reserve: i64) -> u64 {
        assert!(reserve >= 0, "negative value range reserve: {}", reserve);
        if self.kind == TypeKind::Bool {
            // Bool ids are the fixed slots 1 and 2; reserve padding has
            // nothing to widen, so the domain is always 3.
            self.has_range = true;
            self.min = 0;
            self.max = 1;
            self.is_range = true;
            self.multiplier = multiplier;
            self.range_size = 3;
            return match multiplier.checked_mul(self.range_size) {
                Some(product) => product,
                None => RANGE_TOO_LARGE,
            };
        }
        assert!(
            self.has_range,
            "enable_value_range on a {} hasher with no observed range",
            self.kind.name()
        );
        let reserve = reserve / 2;
        self.multiplier = multiplier;
        if i64::MIN + reserve + 1 > self.min {
            self.min = i64::MIN;
        } else {
            self.min -= reserve;
        }
        if i64::MAX - reserve < self.max {
            self.max = i64::MAX;
        } else {
            self.max += reserve;
        }
        self.is_range = true;
        let span = self.max as i128 - self.min as i128 + 2;
        if span > u64::MAX as i128 {
            self.range_size = u64::MAX;
            return RANGE_TOO_LARGE;
        }
        self.range_size = span as u64;
        debug!(
            kind = self.kind.name(),
            min = self.min,
            max = self.max,
            range_size = self.range_size,
            multiplier,
            "enabled value range encoding"
        );
        match multiplier.checked_mul(self.range_size) {
            Some(product) => product,
            None => RANGE_TOO_LARGE,
        }
    }

    /// Activates distinct encoding with `reserve` extra id slots for
    /// values discovered after activation. Returns
    /// `multiplier * range_size`, or `RANGE_TOO_LARGE` on overflow.
    pub fn enable_value_ids(&mut self, multiplier: u64, reserve: i64) -> u64 {
        assert!(reserve >= 0, "negative value id reserve: {}", reserve);
        self.multiplier = multiplier;
        self.range_size = self.unique_values.len() as u64 + 1 + reserve as u64;
        self.is_range = false;
        debug!(
            kind = self.kind.name(),
            distinct = self.unique_values.len(),
            range_size = self.range_size,
            multiplier,
            "enabled distinct value ids"
        );
        match multiplier.checked_mul(self.range_size) {
            Some(product) => product,
            None => RANGE_TOO_LARGE,
        }
    }

    //
    //
    // ---- Merging parallel shards.
    //
    //

    /// Unions the analysis state of a sibling hasher over the same
    /// column. Foreign distinct values are re-inserted here, so their
    /// ids are freshly assigned at the end of this hasher's id range and
    /// string bytes are copied into this hasher's own storage; `other`
    /// can be dropped right after the call. Idempotent.
    pub fn merge(&mut self, other: &Self) {
        assert_eq!(
            self.kind, other.kind,
            "merging hashers of different types"
        );
        if self.kind == TypeKind::Bool {
            return;
        }
        if self.has_range && other.has_range && !self.range_overflow && !other.range_overflow {
            self.min = self.min.min(other.min);
            self.max = self.max.max(other.max);
        } else {
            self.has_range = false;
            self.range_overflow = true;
        }
        if !self.distinct_overflow && !other.distinct_overflow {
            // No overflow check on growth: both sides were under budget
            // and the merged size has a known cap.
            if self.kind == TypeKind::String {
                other
                    .unique_values
                    .for_each_value(|bytes| {
                        self.unique_values.insert_bytes(bytes);
                    });
            } else {
                for value in other.unique_values.ints() {
                    self.unique_values.insert_int(value);
                }
            }
        } else {
            self.distinct_overflow = true;
        }
        debug!(
            kind = self.kind.name(),
            distinct = self.unique_values.len(),
            range_overflow = self.range_overflow,
            distinct_overflow = self.distinct_overflow,
            "merged sibling hasher"
        );
    }

    /// A pushdown filter over the observed distinct integers, or `None`
    /// when the column is not an integer kind or the distinct set
    /// overflowed.
    pub fn get_filter(&self, null_allowed: bool) -> Option<BigintValuesFilter> {
        if !self.kind.is_integer() || self.distinct_overflow {
            // TODO: add support for string filters.
            return None;
        }
        let values: Vec<i64> = self.unique_values.ints().collect();
        Some(BigintValuesFilter::new(&values, null_allowed))
    }

    //
    //
    // ---- Internals.
    //
    //

    fn decode<'a>(&self, vector: &'a Vector) -> DecodedVector<'a> {
        assert_eq!(
            vector.kind(),
            self.kind,
            "hashing a {} vector with a {} hasher",
            vector.kind().name(),
            self.kind.name()
        );
        DecodedVector::decode(vector)
    }

    fn apply_multiplier(&self, previous: u64, id: u64) -> u64 {
        if self.multiplier == 1 {
            id
        } else {
            previous + self.multiplier * id
        }
    }

    /// Id of a non-null value under the current encoding. Before any
    /// encoding is enabled this is a lookup against the analysis state,
    /// which is exactly what makes a retry after analysis succeed.
    fn value_id_i64(&self, value: i64) -> u64 {
        if self.is_range {
            if value < self.min || value > self.max {
                return UNMAPPABLE;
            }
            value.wrapping_sub(self.min) as u64 + 1
        } else {
            self.unique_values.lookup_int(value).unwrap_or(UNMAPPABLE)
        }
    }

    fn value_id_bytes(&self, value: &[u8]) -> u64 {
        if self.is_range {
            if value.len() > STRING_AS_RANGE_MAX_SIZE {
                return UNMAPPABLE;
            }
            let number = string_as_number(value);
            if number < self.min || number > self.max {
                return UNMAPPABLE;
            }
            number.wrapping_sub(self.min) as u64 + 1
        } else {
            self.unique_values.lookup_bytes(value).unwrap_or(UNMAPPABLE)
        }
    }

    fn analyze_i64(&mut self, value: i64) {
        if !self.range_overflow {
            self.update_range(value);
        }
        if !self.distinct_overflow {
            let (_, inserted) = self.unique_values.insert_int(value);
            if inserted && self.unique_values.len() > MAX_DISTINCT {
                self.distinct_overflow = true;
                debug!(
                    kind = self.kind.name(),
                    distinct = self.unique_values.len(),
                    "distinct value budget exceeded"
                );
            }
        }
    }

    fn analyze_bytes(&mut self, value: &[u8]) {
        if !self.range_overflow {
            if value.len() > STRING_AS_RANGE_MAX_SIZE {
                self.range_overflow = true;
            } else {
                self.update_range(string_as_number(value));
            }
        }
        if !self.distinct_overflow {
            let (_, inserted) = self.unique_values.insert_bytes(value);
            if inserted
                && (self.unique_values.len() > MAX_DISTINCT
                    || self.unique_values.storage_bytes() > MAX_DISTINCT_STRINGS_BYTES)
            {
                self.distinct_overflow = true;
                debug!(
                    kind = self.kind.name(),
                    distinct = self.unique_values.len(),
                    storage_bytes = self.unique_values.storage_bytes(),
                    "distinct value budget exceeded"
                );
            }
        }
    }

    fn update_range(&mut self, value: i64) {
        if !self.has_range {
            self.min = value;
            self.max = value;
            self.has_range = true;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }
    }

    fn analyze_batch_typed<T: NativeType>(
        &mut self,
        decoded: &DecodedVector<'_>,
        rows: &SelectionVector,
    ) {
        rows.for_each_selected(|row| {
            if !decoded.is_null_at(row) {
                self.analyze_i64(decoded.value_at::<T>(row).as_i64());
            }
        });
    }

    fn analyze_rows_typed<T: NativeType>(
        &mut self,
        groups: &[&[u8]],
        offset: usize,
        null_byte: usize,
        null_mask: u8,
    ) {
        for group in groups {
            if !rows::is_null(group, null_byte, null_mask) {
                self.analyze_i64(rows::read_fixed::<T>(group, offset).as_i64());
            }
        }
    }

    fn make_bool_ids(
        &self,
        decoded: &DecodedVector<'_>,
        rows: &SelectionVector,
        out: &mut [u64],
    ) -> bool {
        if decoded.is_constant_mapping() {
            if !rows.has_selections() {
                return true;
            }
            let id = if decoded.is_null_at(rows.begin()) {
                0
            } else {
                bool_value_id(decoded.bool_at(rows.begin()))
            };
            rows.for_each_selected(|row| out[row] = self.apply_multiplier(out[row], id));
            return true;
        }
        rows.for_each_selected(|row| {
            if decoded.is_null_at(row) {
                if self.multiplier == 1 {
                    out[row] = 0;
                }
                return;
            }
            let id = bool_value_id(decoded.bool_at(row));
            out[row] = self.apply_multiplier(out[row], id);
        });
        true
    }

    fn make_ids<T: NativeType>(
        &mut self,
        decoded: &DecodedVector<'_>,
        rows: &SelectionVector,
        out: &mut [u64],
    ) -> bool {
        if decoded.is_constant_mapping() {
            if !rows.has_selections() {
                return true;
            }
            let first = rows.begin();
            if decoded.is_null_at(first) {
                rows.for_each_selected(|row| out[row] = self.apply_multiplier(out[row], 0));
                return true;
            }
            let value = decoded.value_at::<T>(first).as_i64();
            let id = self.value_id_i64(value);
            if id == UNMAPPABLE {
                self.analyze_i64(value);
                return false;
            }
            rows.for_each_selected(|row| out[row] = self.apply_multiplier(out[row], id));
            return true;
        }
        if decoded.is_identity_mapping() {
            if !decoded.may_have_nulls() {
                self.make_ids_flat_no_nulls::<T>(decoded, rows, out)
            } else {
                self.make_ids_flat_with_nulls::<T>(decoded, rows, out)
            }
        } else {
            self.make_ids_indirect::<T>(decoded, rows, out)
        }
    }

    fn make_ids_flat_no_nulls<T: NativeType>(
        &mut self,
        decoded: &DecodedVector<'_>,
        rows: &SelectionVector,
        out: &mut [u64],
    ) -> bool {
        let values = decoded.values::<T>();
        // The range fast path is only sound once the encoding decision
        // has been recorded; an undecided hasher must go through
        // value_id so misses keep feeding analysis.
        if self.is_range && self.try_map_to_range::<T>(values, rows, out) {
            return true;
        }
        let mut success = true;
        rows.for_each_selected(|row| {
            let value = values[row].as_i64();
            if !success {
                self.analyze_i64(value);
                return;
            }
            let id = self.value_id_i64(value);
            if id == UNMAPPABLE {
                success = false;
                self.analyze_i64(value);
                return;
            }
            out[row] = self.apply_multiplier(out[row], id);
        });
        success
    }

    fn make_ids_flat_with_nulls<T: NativeType>(
        &mut self,
        decoded: &DecodedVector<'_>,
        rows: &SelectionVector,
        out: &mut [u64],
    ) -> bool {
        let values = decoded.values::<T>();
        let mut success = true;
        rows.for_each_selected(|row| {
            if decoded.is_null_at(row) {
                if self.multiplier == 1 {
                    out[row] = 0;
                }
                return;
            }
            let value = values[row].as_i64();
            if !success {
                self.analyze_i64(value);
                return;
            }
            let id = self.value_id_i64(value);
            if id == UNMAPPABLE {
                success = false;
                self.analyze_i64(value);
                return;
            }
            out[row] = self.apply_multiplier(out[row], id);
        });
        success
    }

    fn make_ids_indirect<T: NativeType>(
        &mut self,
        decoded: &DecodedVector<'_>,
        rows: &SelectionVector,
        out: &mut [u64],
    ) -> bool {
        // Ids per base index; 0 means not yet computed. Reuses the hash
        // cache allocation.
        let mut cache = std::mem::take(&mut self.cached_hashes);
        cache.clear();
        cache.resize(decoded.base_size(), 0);
        let mut success = true;
        rows.for_each_selected(|row| {
            if decoded.is_null_at(row) {
                if self.multiplier == 1 {
                    out[row] = 0;
                }
                return;
            }
            let base = decoded.index(row);
            let mut id = cache[base];
            if id == 0 {
                let value = decoded.value_at::<T>(row).as_i64();
                if !success {
                    self.analyze_i64(value);
                    return;
                }
                id = self.value_id_i64(value);
                if id == UNMAPPABLE {
                    success = false;
                    self.analyze_i64(value);
                    return;
                }
                cache[base] = id;
            }
            out[row] = self.apply_multiplier(out[row], id);
        });
        self.cached_hashes = cache;
        success
    }

    fn make_string_ids(
        &mut self,
        decoded: &DecodedVector<'_>,
        rows: &SelectionVector,
        out: &mut [u64],
    ) -> bool {
        if decoded.is_constant_mapping() {
            if !rows.has_selections() {
                return true;
            }
            let first = rows.begin();
            if decoded.is_null_at(first) {
                rows.for_each_selected(|row| out[row] = self.apply_multiplier(out[row], 0));
                return true;
            }
            let value = decoded.str_at(first);
            let id = self.value_id_bytes(value);
            if id == UNMAPPABLE {
                self.analyze_bytes(value);
                return false;
            }
            rows.for_each_selected(|row| out[row] = self.apply_multiplier(out[row], id));
            return true;
        }
        if decoded.is_identity_mapping() {
            let mut success = true;
            rows.for_each_selected(|row| {
                if decoded.is_null_at(row) {
                    if self.multiplier == 1 {
                        out[row] = 0;
                    }
                    return;
                }
                let value = decoded.str_at(row);
                if !success {
                    self.analyze_bytes(value);
                    return;
                }
                let id = self.value_id_bytes(value);
                if id == UNMAPPABLE {
                    success = false;
                    self.analyze_bytes(value);
                    return;
                }
                out[row] = self.apply_multiplier(out[row], id);
            });
            return success;
        }
        let mut cache = std::mem::take(&mut self.cached_hashes);
        cache.clear();
        cache.resize(decoded.base_size(), 0);
        let mut success = true;
        rows.for_each_selected(|row| {
            if decoded.is_null_at(row) {
                if self.multiplier == 1 {
                    out[row] = 0;
                }
                return;
            }
            let base = decoded.index(row);
            let mut id = cache[base];
            if id == 0 {
                let value = decoded.str_at(row);
                if !success {
                    self.analyze_bytes(value);
                    return;
                }
                id = self.value_id_bytes(value);
                if id == UNMAPPABLE {
                    success = false;
                    self.analyze_bytes(value);
                    return;
                }
                cache[base] = id;
            }
            out[row] = self.apply_multiplier(out[row], id);
        });
        self.cached_hashes = cache;
        success
    }

    fn try_map_to_range<T: NativeType>(
        &self,
        values: &[T],
        rows: &SelectionVector,
        out: &mut [u64],
    ) -> bool {
        debug_assert!(self.is_range);
        let mut all_in_range = true;
        rows.for_each_selected(|row| {
            if !all_in_range {
                return;
            }
            let value = values[row].as_i64();
            if value < self.min || value > self.max {
                all_in_range = false;
                return;
            }
            let id = value.wrapping_sub(self.min) as u64 + 1;
            out[row] = self.apply_multiplier(out[row], id);
        });
        all_in_range
    }

    fn make_row_ids<T: NativeType>(
        &mut self,
        groups: &[&[u8]],
        offset: usize,
        null_byte: usize,
        null_mask: u8,
        out: &mut [u64],
    ) -> bool {
        let mut success = true;
        for (i, group) in groups.iter().enumerate() {
            if rows::is_null(group, null_byte, null_mask) {
                if self.multiplier == 1 {
                    out[i] = 0;
                }
                continue;
            }
            let value = rows::read_fixed::<T>(group, offset).as_i64();
            if !success {
                self.analyze_i64(value);
                continue;
            }
            let id = self.value_id_i64(value);
            if id == UNMAPPABLE {
                success = false;
                self.analyze_i64(value);
                continue;
            }
            out[i] = self.apply_multiplier(out[i], id);
        }
        success
    }

    fn make_row_ids_string(
        &mut self,
        groups: &[&[u8]],
        heap: &RowHeap,
        offset: usize,
        null_byte: usize,
        null_mask: u8,
        out: &mut [u64],
    ) -> bool {
        let mut scratch = Vec::new();
        for (i, group) in groups.iter().enumerate() {
            if rows::is_null(group, null_byte, null_mask) {
                if self.multiplier == 1 {
                    out[i] = 0;
                }
                continue;
            }
            // A row string may span heap pages; lookups need it whole.
            let field = rows::read_string_field(group, offset);
            let bytes = heap.contiguous(field, &mut scratch);
            let id = self.value_id_bytes(bytes);
            if id == UNMAPPABLE {
                return false;
            }
            out[i] = self.apply_multiplier(out[i], id);
        }
        true
    }

    fn lookup_ids<T: NativeType>(
        &self,
        decoded: &DecodedVector<'_>,
        rows: &mut SelectionVector,
        scratch: &mut ScratchMemory,
        out: &mut [u64],
    ) {
        if decoded.is_constant_mapping() {
            if !rows.has_selections() {
                return;
            }
            let first = rows.begin();
            if decoded.is_null_at(first) {
                if self.multiplier == 1 {
                    rows.for_each_selected(|row| out[row] = 0);
                }
                return;
            }
            let id = self.value_id_i64(decoded.value_at::<T>(first).as_i64());
            if id == UNMAPPABLE {
                rows.clear_all();
                return;
            }
            rows.for_each_selected(|row| out[row] = self.apply_multiplier(out[row], id));
            return;
        }
        if decoded.is_identity_mapping() {
            for row in rows.begin()..rows.end() {
                if !rows.is_selected(row) {
                    continue;
                }
                if decoded.is_null_at(row) {
                    if self.multiplier == 1 {
                        out[row] = 0;
                    }
                    continue;
                }
                let id = self.value_id_i64(decoded.value_at::<T>(row).as_i64());
                if id == UNMAPPABLE {
                    rows.set_valid(row, false);
                    continue;
                }
                out[row] = self.apply_multiplier(out[row], id);
            }
            rows.update_bounds();
            return;
        }
        let cache = &mut scratch.ids;
        cache.clear();
        cache.resize(decoded.base_size(), 0);
        for row in rows.begin()..rows.end() {
            if !rows.is_selected(row) {
                continue;
            }
            if decoded.is_null_at(row) {
                if self.multiplier == 1 {
                    out[row] = 0;
                }
                continue;
            }
            let base = decoded.index(row);
            let mut id = cache[base];
            if id == 0 {
                id = self.value_id_i64(decoded.value_at::<T>(row).as_i64());
                if id == UNMAPPABLE {
                    rows.set_valid(row, false);
                    continue;
                }
                cache[base] = id;
            }
            out[row] = self.apply_multiplier(out[row], id);
        }
        rows.update_bounds();
    }

    fn lookup_ids_string(
        &self,
        decoded: &DecodedVector<'_>,
        rows: &mut SelectionVector,
        scratch: &mut ScratchMemory,
        out: &mut [u64],
    ) {
        if decoded.is_constant_mapping() {
            if !rows.has_selections() {
                return;
            }
            let first = rows.begin();
            if decoded.is_null_at(first) {
                if self.multiplier == 1 {
                    rows.for_each_selected(|row| out[row] = 0);
                }
                return;
            }
            let id = self.value_id_bytes(decoded.str_at(first));
            if id == UNMAPPABLE {
                rows.clear_all();
                return;
            }
            rows.for_each_selected(|row| out[row] = self.apply_multiplier(out[row], id));
            return;
        }
        if decoded.is_identity_mapping() {
            for row in rows.begin()..rows.end() {
                if !rows.is_selected(row) {
                    continue;
                }
                if decoded.is_null_at(row) {
                    if self.multiplier == 1 {
                        out[row] = 0;
                    }
                    continue;
                }
                let id = self.value_id_bytes(decoded.str_at(row));
                if id == UNMAPPABLE {
                    rows.set_valid(row, false);
                    continue;
                }
                out[row] = self.apply_multiplier(out[row], id);
            }
            rows.update_bounds();
            return;
        }
        let cache = &mut scratch.ids;
        cache.clear();
        cache.resize(decoded.base_size(), 0);
        for row in rows.begin()..rows.end() {
            if !rows.is_selected(row) {
                continue;
            }
            if decoded.is_null_at(row) {
                if self.multiplier == 1 {
                    out[row] = 0;
                }
                continue;
            }
            let base = decoded.index(row);
            let mut id = cache[base];
            if id == 0 {
                id = self.value_id_bytes(decoded.str_at(row));
                if id == UNMAPPABLE {
                    rows.set_valid(row, false);
                    continue;
                }
                cache[base] = id;
            }
            out[row] = self.apply_multiplier(out[row], id);
        }
        rows.update_bounds();
    }
}

fn bool_value_id(value: bool) -> u64 {
    // false is 1, true is 2; 0 stays reserved for NULL.
    1 + value as u64
}

/// Maps a string of at most 7 bytes onto a non-negative `i64` by
/// zero-padding and reading little-endian, so bytewise order-insensitive
/// equality carries over to integer equality.
fn string_as_number(value: &[u8]) -> i64 {
    debug_assert!(value.len() <= STRING_AS_RANGE_MAX_SIZE);
    let mut buf = [0u8; 8];
    buf[..value.len()].copy_from_slice(value);
    i64::from_le_bytes(buf)
}

fn hash_typed<T: NativeType>(
    decoded: &DecodedVector<'_>,
    rows: &SelectionVector,
    mix: bool,
    out: &mut [u64],
    cached: &mut Vec<u64>,
) {
    hash_values(decoded, rows, mix, out, cached, |row| {
        hash_int(decoded.value_at::<T>(row).as_i64())
    });
}

fn hash_values(
    decoded: &DecodedVector<'_>,
    rows: &SelectionVector,
    mix: bool,
    out: &mut [u64],
    cached: &mut Vec<u64>,
    hash_at: impl Fn(usize) -> u64,
) {
    if decoded.is_constant_mapping() {
        if !rows.has_selections() {
            return;
        }
        let hash = if decoded.is_null_at(rows.begin()) {
            NULL_HASH
        } else {
            hash_at(rows.begin())
        };
        rows.for_each_selected(|row| {
            out[row] = if mix { hash_mix(out[row], hash) } else { hash };
        });
    } else if decoded.is_identity_mapping() {
        rows.for_each_selected(|row| {
            let hash = if decoded.is_null_at(row) {
                NULL_HASH
            } else {
                hash_at(row)
            };
            out[row] = if mix { hash_mix(out[row], hash) } else { hash };
        });
    } else {
        cached.clear();
        cached.resize(decoded.base_size(), NULL_HASH);
        rows.for_each_selected(|row| {
            if decoded.is_null_at(row) {
                out[row] = if mix {
                    hash_mix(out[row], NULL_HASH)
                } else {
                    NULL_HASH
                };
                return;
            }
            let base = decoded.index(row);
            let mut hash = cached[base];
            if hash == NULL_HASH {
                hash = hash_at(row);
                cached[base] = hash;
            }
            out[row] = if mix { hash_mix(out[row], hash) } else { hash };
        });
    }
}
