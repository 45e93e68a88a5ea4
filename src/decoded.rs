//! A uniform view over the physical vector encodings.
//!
//! Decoding flattens the encoding dance into one question per row: which
//! base index does this logical row map to, and is it null. The view
//! borrows the input vector for its whole lifetime, so a caller cannot
//! mutate the batch while any hasher still reads it.

use crate::bitmap::Bitmap;
use crate::vector::{FlatVector, NativeType, Vector};

enum Mapping<'a> {
    /// Logical row i reads base row i.
    Identity,
    /// Every logical row reads base row 0.
    Constant,
    /// Logical row i reads base row indices[i].
    Indices {
        indices: &'a [u32],
        validity: Option<&'a Bitmap>,
    },
}

pub struct DecodedVector<'a> {
    len: usize,
    base: &'a FlatVector,
    mapping: Mapping<'a>,
}

impl<'a> DecodedVector<'a> {
    pub fn decode(vector: &'a Vector) -> Self {
        match vector {
            Vector::Flat(v) => Self {
                len: v.len(),
                base: v,
                mapping: Mapping::Identity,
            },
            Vector::Constant(v) => Self {
                len: v.len(),
                base: v.base(),
                mapping: Mapping::Constant,
            },
            Vector::Dictionary(v) => Self {
                len: v.len(),
                base: v.base(),
                mapping: Mapping::Indices {
                    indices: v.indices(),
                    validity: v.validity(),
                },
            },
        }
    }

    pub fn is_constant_mapping(&self) -> bool {
        matches!(self.mapping, Mapping::Constant)
    }

    pub fn is_identity_mapping(&self) -> bool {
        matches!(self.mapping, Mapping::Identity)
    }

    /// Logical row count of the batch.
    pub fn size(&self) -> usize {
        self.len
    }

    /// Row count of the underlying base vector, i.e. the dictionary
    /// cardinality for an indirect mapping.
    pub fn base_size(&self) -> usize {
        self.base.len()
    }

    pub fn base(&self) -> &'a FlatVector {
        self.base
    }

    /// The base index a logical row maps to.
    pub fn index(&self, row: usize) -> usize {
        match &self.mapping {
            Mapping::Identity => row,
            Mapping::Constant => 0,
            Mapping::Indices { indices, .. } => indices[row] as usize,
        }
    }

    pub fn is_null_at(&self, row: usize) -> bool {
        match &self.mapping {
            Mapping::Identity => self.base.is_null(row),
            Mapping::Constant => self.base.is_null(0),
            Mapping::Indices { indices, validity } => {
                if let Some(validity) = validity {
                    if !validity.get(row) {
                        return true;
                    }
                }
                self.base.is_null(indices[row] as usize)
            }
        }
    }

    pub fn may_have_nulls(&self) -> bool {
        if self.base.may_have_nulls() {
            return true;
        }
        matches!(
            self.mapping,
            Mapping::Indices {
                validity: Some(_),
                ..
            }
        )
    }

    /// The base values as a typed slice. Meaningful for any mapping; an
    /// identity mapping makes it the batch itself.
    pub fn values<T: NativeType>(&self) -> &'a [T] {
        T::slice(self.base.values())
    }

    pub fn value_at<T: NativeType>(&self, row: usize) -> T {
        self.values::<T>()[self.index(row)]
    }

    pub fn str_at(&self, row: usize) -> &'a [u8] {
        match self.base.values() {
            crate::vector::Values::String(data) => data.get(self.index(row)),
            other => panic!("STRING value requested from {} values", other.kind().name()),
        }
    }

    pub fn bool_at(&self, row: usize) -> bool {
        match self.base.values() {
            crate::vector::Values::Bool(bits) => bits.get(self.index(row)),
            other => panic!("BOOL value requested from {} values", other.kind().name()),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::vector::{ConstantVector, DictionaryVector, Scalar, TypeKind};

    #[test]
    fn flat() {
        let vector = Vector::from(FlatVector::from_nullable::<i64>(&[Some(7), None, Some(9)]));
        let decoded = DecodedVector::decode(&vector);
        assert!(decoded.is_identity_mapping());
        assert!(!decoded.is_constant_mapping());
        assert_eq!(decoded.size(), 3);
        assert_eq!(decoded.base_size(), 3);
        assert_eq!(decoded.index(2), 2);
        assert!(decoded.is_null_at(1));
        assert_eq!(decoded.value_at::<i64>(2), 9);
    }

    #[test]
    fn constant() {
        let vector = Vector::from(ConstantVector::new(4, Scalar::I32(42)));
        let decoded = DecodedVector::decode(&vector);
        assert!(decoded.is_constant_mapping());
        assert_eq!(decoded.size(), 4);
        assert_eq!(decoded.base_size(), 1);
        assert_eq!(decoded.index(3), 0);
        assert!(!decoded.is_null_at(3));
        assert_eq!(decoded.value_at::<i32>(3), 42);

        let nulls = Vector::from(ConstantVector::null(TypeKind::Int32, 4));
        let decoded = DecodedVector::decode(&nulls);
        assert!(decoded.is_null_at(0));
        assert!(decoded.may_have_nulls());
    }

    #[test]
    fn dictionary() {
        let base = FlatVector::strings(&["x", "y"]);
        let vector = Vector::from(DictionaryVector::new(base, vec![0, 1, 0, 1]).unwrap());
        let decoded = DecodedVector::decode(&vector);
        assert!(!decoded.is_identity_mapping());
        assert!(!decoded.is_constant_mapping());
        assert_eq!(decoded.size(), 4);
        assert_eq!(decoded.base_size(), 2);
        assert_eq!(decoded.index(2), 0);
        assert_eq!(decoded.str_at(3), b"y");
        assert!(!decoded.may_have_nulls());
    }

    #[test]
    fn dictionary_top_level_nulls() {
        let base = FlatVector::from_values(vec![10_i64, 20]);
        let validity = crate::bitmap::Bitmap::from_bools(&[true, false, true]);
        let vector = Vector::from(
            DictionaryVector::with_validity(base, vec![0, 0, 1], validity).unwrap(),
        );
        let decoded = DecodedVector::decode(&vector);
        assert!(!decoded.is_null_at(0));
        assert!(decoded.is_null_at(1));
        assert!(!decoded.is_null_at(2));
        assert!(decoded.may_have_nulls());
        assert_eq!(decoded.value_at::<i64>(2), 20);
    }
}
