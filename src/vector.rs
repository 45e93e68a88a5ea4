//! The minimal vector model the hashing engine is exercised against.
//!
//! A batch column arrives in one of three physical encodings: flat,
//! constant, or dictionary. The engine never branches on the encoding
//! directly; it goes through [`crate::decoded::DecodedVector`], which
//! presents a uniform view. The representations here deliberately carry
//! only what the engine consumes; the full vector layer of the executor
//! lives outside this crate.

use snafu::{ensure, Snafu};

use crate::bitmap::Bitmap;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("validity of {validity} bits does not match {values} values"))]
    ValidityLengthMismatch { values: usize, validity: usize },

    #[snafu(display("dictionary index {index} out of bounds for base of {base_size} rows"))]
    DictionaryIndexOutOfBounds { index: u32, base_size: usize },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The scalar type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    String,
}

impl TypeKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Bool => "BOOL",
            Self::Int8 => "INT8",
            Self::Int16 => "INT16",
            Self::Int32 => "INT32",
            Self::Int64 => "INT64",
            Self::Float32 => "FLOAT32",
            Self::Float64 => "FLOAT64",
            Self::String => "STRING",
        }
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, Self::Int8 | Self::Int16 | Self::Int32 | Self::Int64)
    }

    /// Whether the value-id paths accept this kind. Floats hash by bit
    /// pattern but never participate in value-id encodings.
    pub fn supports_value_ids(&self) -> bool {
        !matches!(self, Self::Float32 | Self::Float64)
    }
}

/// An owned scalar, used for constant vectors.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Bool(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    String(Vec<u8>),
}

impl Scalar {
    pub fn kind(&self) -> TypeKind {
        match self {
            Self::Bool(_) => TypeKind::Bool,
            Self::I8(_) => TypeKind::Int8,
            Self::I16(_) => TypeKind::Int16,
            Self::I32(_) => TypeKind::Int32,
            Self::I64(_) => TypeKind::Int64,
            Self::F32(_) => TypeKind::Float32,
            Self::F64(_) => TypeKind::Float64,
            Self::String(_) => TypeKind::String,
        }
    }
}

/// Variable-length values packed into a contiguous byte buffer with an
/// offsets array, so `get` is two loads and no pointer chasing.
#[derive(Debug, Clone, PartialEq)]
pub struct StringData {
    offsets: Vec<u32>,
    bytes: Vec<u8>,
}

impl Default for StringData {
    fn default() -> Self {
        Self {
            offsets: vec![0],
            bytes: Vec::new(),
        }
    }
}

impl StringData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, value: &[u8]) {
        self.bytes.extend_from_slice(value);
        self.offsets.push(self.bytes.len() as u32);
    }

    pub fn get(&self, i: usize) -> &[u8] {
        let start = self.offsets[i] as usize;
        let end = self.offsets[i + 1] as usize;
        &self.bytes[start..end]
    }

    pub fn len(&self) -> usize {
        self.offsets.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Typed storage for the values of a flat vector. Bools are bit-packed.
#[derive(Debug, Clone, PartialEq)]
pub enum Values {
    Bool(Bitmap),
    I8(Vec<i8>),
    I16(Vec<i16>),
    I32(Vec<i32>),
    I64(Vec<i64>),
    F32(Vec<f32>),
    F64(Vec<f64>),
    String(StringData),
}

impl Values {
    pub fn len(&self) -> usize {
        match self {
            Self::Bool(v) => v.len(),
            Self::I8(v) => v.len(),
            Self::I16(v) => v.len(),
            Self::I32(v) => v.len(),
            Self::I64(v) => v.len(),
            Self::F32(v) => v.len(),
            Self::F64(v) => v.len(),
            Self::String(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn kind(&self) -> TypeKind {
        match self {
            Self::Bool(_) => TypeKind::Bool,
            Self::I8(_) => TypeKind::Int8,
            Self::I16(_) => TypeKind::Int16,
            Self::I32(_) => TypeKind::Int32,
            Self::I64(_) => TypeKind::Int64,
            Self::F32(_) => TypeKind::Float32,
            Self::F64(_) => TypeKind::Float64,
            Self::String(_) => TypeKind::String,
        }
    }
}

/// A fixed-width scalar that can live in a [`Values`] buffer.
///
/// `as_i64` is the value used on the integer paths: value-preserving for
/// integers, the raw bit pattern for floats.
pub trait NativeType: Copy + PartialEq + std::fmt::Debug + 'static {
    const KIND: TypeKind;
    const WIDTH: usize;

    fn slice(values: &Values) -> &[Self];
    fn into_values(values: Vec<Self>) -> Values;
    fn as_i64(self) -> i64;
    fn from_le(bytes: &[u8]) -> Self;
    fn write_le(self, dst: &mut [u8]);
}

macro_rules! native_type {
    ($t:ty, $kind:expr, $variant:ident, $as_i64:expr) => {
        impl NativeType for $t {
            const KIND: TypeKind = $kind;
            const WIDTH: usize = std::mem::size_of::<$t>();

            fn slice(values: &Values) -> &[Self] {
                match values {
                    Values::$variant(v) => v,
                    other => panic!(
                        "{} slice requested from {} values",
                        Self::KIND.name(),
                        other.kind().name()
                    ),
                }
            }

            fn into_values(values: Vec<Self>) -> Values {
                Values::$variant(values)
            }

            #[allow(clippy::redundant_closure_call)]
            fn as_i64(self) -> i64 {
                ($as_i64)(self)
            }

            fn from_le(bytes: &[u8]) -> Self {
                Self::from_le_bytes(bytes[..Self::WIDTH].try_into().unwrap())
            }

            fn write_le(self, dst: &mut [u8]) {
                dst[..Self::WIDTH].copy_from_slice(&self.to_le_bytes());
            }
        }
    };
}

native_type!(i8, TypeKind::Int8, I8, |v: i8| v as i64);
native_type!(i16, TypeKind::Int16, I16, |v: i16| v as i64);
native_type!(i32, TypeKind::Int32, I32, |v: i32| v as i64);
native_type!(i64, TypeKind::Int64, I64, |v: i64| v);
native_type!(f32, TypeKind::Float32, F32, |v: f32| v.to_bits() as i64);
native_type!(f64, TypeKind::Float64, F64, |v: f64| v.to_bits() as i64);

/// A vector with one physical value per logical row.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatVector {
    values: Values,
    // Set bit means the row holds a value; absent means no nulls.
    validity: Option<Bitmap>,
}

impl FlatVector {
    pub fn new(values: Values) -> Self {
        Self {
            values,
            validity: None,
        }
    }

    pub fn with_validity(values: Values, validity: Bitmap) -> Result<Self> {
        ensure!(
            values.len() == validity.len(),
            ValidityLengthMismatchSnafu {
                values: values.len(),
                validity: validity.len(),
            }
        );
        Ok(Self {
            values,
            validity: Some(validity),
        })
    }

    /// A flat vector from optional values of one fixed-width type.
    pub fn from_nullable<T: NativeType>(values: &[Option<T>]) -> Self
    where
        T: Default,
    {
        let validity = Bitmap::from_bools(
            &values.iter().map(|v| v.is_some()).collect::<Vec<_>>(),
        );
        let raw: Vec<T> = values.iter().map(|v| v.unwrap_or_default()).collect();
        Self::with_validity(T::into_values(raw), validity).unwrap()
    }

    pub fn from_values<T: NativeType>(values: Vec<T>) -> Self {
        Self::new(T::into_values(values))
    }

    pub fn strings<S: AsRef<[u8]>>(values: &[S]) -> Self {
        let mut data = StringData::new();
        for v in values {
            data.append(v.as_ref());
        }
        Self::new(Values::String(data))
    }

    pub fn nullable_strings<S: AsRef<[u8]>>(values: &[Option<S>]) -> Self {
        let mut data = StringData::new();
        let mut validity = Bitmap::new();
        for v in values {
            match v {
                Some(v) => {
                    data.append(v.as_ref());
                    validity.push(true);
                }
                None => {
                    data.append(&[]);
                    validity.push(false);
                }
            }
        }
        Self::with_validity(Values::String(data), validity).unwrap()
    }

    pub fn bools(values: &[bool]) -> Self {
        Self::new(Values::Bool(Bitmap::from_bools(values)))
    }

    pub fn nullable_bools(values: &[Option<bool>]) -> Self {
        let validity = Bitmap::from_bools(
            &values.iter().map(|v| v.is_some()).collect::<Vec<_>>(),
        );
        let bits = Bitmap::from_bools(
            &values.iter().map(|v| v.unwrap_or(false)).collect::<Vec<_>>(),
        );
        Self::with_validity(Values::Bool(bits), validity).unwrap()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn kind(&self) -> TypeKind {
        self.values.kind()
    }

    pub fn values(&self) -> &Values {
        &self.values
    }

    pub fn validity(&self) -> Option<&Bitmap> {
        self.validity.as_ref()
    }

    pub fn is_null(&self, row: usize) -> bool {
        match &self.validity {
            Some(validity) => !validity.get(row),
            None => false,
        }
    }

    pub fn may_have_nulls(&self) -> bool {
        self.validity.is_some()
    }
}

/// A logical run of a single value, possibly NULL.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstantVector {
    len: usize,
    // A one-row flat vector holding the constant, so the decoded view
    // can treat all encodings as a base plus a mapping.
    base: FlatVector,
}

impl ConstantVector {
    pub fn new(len: usize, value: Scalar) -> Self {
        let base = match value {
            Scalar::Bool(v) => FlatVector::bools(&[v]),
            Scalar::I8(v) => FlatVector::from_values(vec![v]),
            Scalar::I16(v) => FlatVector::from_values(vec![v]),
            Scalar::I32(v) => FlatVector::from_values(vec![v]),
            Scalar::I64(v) => FlatVector::from_values(vec![v]),
            Scalar::F32(v) => FlatVector::from_values(vec![v]),
            Scalar::F64(v) => FlatVector::from_values(vec![v]),
            Scalar::String(v) => FlatVector::strings(&[v]),
        };
        Self { len, base }
    }

    /// A constant NULL of the given kind.
    pub fn null(kind: TypeKind, len: usize) -> Self {
        let base = match kind {
            TypeKind::Bool => FlatVector::nullable_bools(&[None]),
            TypeKind::Int8 => FlatVector::from_nullable::<i8>(&[None]),
            TypeKind::Int16 => FlatVector::from_nullable::<i16>(&[None]),
            TypeKind::Int32 => FlatVector::from_nullable::<i32>(&[None]),
            TypeKind::Int64 => FlatVector::from_nullable::<i64>(&[None]),
            TypeKind::Float32 => FlatVector::from_nullable::<f32>(&[None]),
            TypeKind::Float64 => FlatVector::from_nullable::<f64>(&[None]),
            TypeKind::String => FlatVector::nullable_strings::<&[u8]>(&[None]),
        };
        Self { len, base }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn kind(&self) -> TypeKind {
        self.base.kind()
    }

    pub fn base(&self) -> &FlatVector {
        &self.base
    }
}

/// Indices into a flat base vector, with an optional validity mask that
/// adds nulls on top of the base's own.
#[derive(Debug, Clone, PartialEq)]
pub struct DictionaryVector {
    base: FlatVector,
    indices: Vec<u32>,
    validity: Option<Bitmap>,
}

impl DictionaryVector {
    pub fn new(base: FlatVector, indices: Vec<u32>) -> Result<Self> {
        for &index in &indices {
            ensure!(
                (index as usize) < base.len(),
                DictionaryIndexOutOfBoundsSnafu {
                    index,
                    base_size: base.len(),
                }
            );
        }
        Ok(Self {
            base,
            indices,
            validity: None,
        })
    }

    pub fn with_validity(base: FlatVector, indices: Vec<u32>, validity: Bitmap) -> Result<Self> {
        ensure!(
            indices.len() == validity.len(),
            ValidityLengthMismatchSnafu {
                values: indices.len(),
                validity: validity.len(),
            }
        );
        let mut vector = Self::new(base, indices)?;
        vector.validity = Some(validity);
        Ok(vector)
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn kind(&self) -> TypeKind {
        self.base.kind()
    }

    pub fn base(&self) -> &FlatVector {
        &self.base
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn validity(&self) -> Option<&Bitmap> {
        self.validity.as_ref()
    }
}

/// A column of a batch in one of the three physical encodings.
#[derive(Debug, Clone, PartialEq)]
pub enum Vector {
    Flat(FlatVector),
    Constant(ConstantVector),
    Dictionary(DictionaryVector),
}

impl Vector {
    pub fn len(&self) -> usize {
        match self {
            Self::Flat(v) => v.len(),
            Self::Constant(v) => v.len(),
            Self::Dictionary(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn kind(&self) -> TypeKind {
        match self {
            Self::Flat(v) => v.kind(),
            Self::Constant(v) => v.kind(),
            Self::Dictionary(v) => v.kind(),
        }
    }
}

impl From<FlatVector> for Vector {
    fn from(v: FlatVector) -> Self {
        Self::Flat(v)
    }
}

impl From<ConstantVector> for Vector {
    fn from(v: ConstantVector) -> Self {
        Self::Constant(v)
    }
}

impl From<DictionaryVector> for Vector {
    fn from(v: DictionaryVector) -> Self {
        Self::Dictionary(v)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn string_data() {
        let mut data = StringData::new();
        data.append(b"apple");
        data.append(b"");
        data.append(b"banana");
        assert_eq!(data.len(), 3);
        assert_eq!(data.get(0), b"apple");
        assert_eq!(data.get(1), b"");
        assert_eq!(data.get(2), b"banana");
    }

    #[test]
    fn flat_from_nullable() {
        let v = FlatVector::from_nullable::<i32>(&[Some(1), None, Some(3)]);
        assert_eq!(v.len(), 3);
        assert!(!v.is_null(0));
        assert!(v.is_null(1));
        assert!(!v.is_null(2));
        assert_eq!(i32::slice(v.values()), &[1, 0, 3]);
    }

    #[test]
    fn validity_length_checked() {
        let err = FlatVector::with_validity(Values::I32(vec![1, 2, 3]), Bitmap::with_len(2))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::ValidityLengthMismatch {
                values: 3,
                validity: 2,
            }
        ));
    }

    #[test]
    fn dictionary_index_checked() {
        let base = FlatVector::from_values(vec![10_i64, 20]);
        let err = DictionaryVector::new(base, vec![0, 2]).unwrap_err();
        assert!(matches!(
            err,
            Error::DictionaryIndexOutOfBounds {
                index: 2,
                base_size: 2,
            }
        ));
    }

    #[test]
    fn constant_null_kind() {
        let v = ConstantVector::null(TypeKind::String, 5);
        assert_eq!(v.len(), 5);
        assert_eq!(v.kind(), TypeKind::String);
        assert!(v.base().is_null(0));
    }

    #[test]
    fn float_bit_pattern() {
        assert_eq!(1.5_f64.as_i64(), 1.5_f64.to_bits() as i64);
        assert_ne!(1.5_f32.as_i64(), 1.5_f64.as_i64());
    }

    #[test]
    #[should_panic(expected = "INT64 slice requested from INT32 values")]
    fn slice_kind_mismatch() {
        let values = Values::I32(vec![1]);
        i64::slice(&values);
    }
}
