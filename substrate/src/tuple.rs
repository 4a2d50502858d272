//! The tuple model: field types, schemas, and record identity.

use crate::error::StorageError;
use crate::STRING_LEN;
use std::fmt;
use std::hash::{Hash, Hasher};

/// The closed set of column types. Every type has a fixed serialized
/// width, so the width of a whole tuple is known from its schema alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
    Int,
    String,
    Double,
}

impl Type {
    /// Serialized width of a field of this type in bytes.
    pub fn byte_len(&self) -> usize {
        match self {
            Type::Int => 4,
            Type::String => 4 + STRING_LEN,
            Type::Double => 8,
        }
    }
}

/// Comparison operators understood by `Field::compare` and the
/// selectivity estimator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Equals,
    NotEquals,
    LessThan,
    LessThanOrEq,
    GreaterThan,
    GreaterThanOrEq,
    Like,
}

/// A single column value.
#[derive(Debug, Clone)]
pub enum Field {
    Int(i32),
    Str(String),
    Double(f64),
}

impl Field {
    pub fn field_type(&self) -> Type {
        match self {
            Field::Int(_) => Type::Int,
            Field::Str(_) => Type::String,
            Field::Double(_) => Type::Double,
        }
    }

    /// Appends this field's fixed-width encoding to `out`.
    ///
    /// INT32 is big-endian, STRING is a 4-byte big-endian length prefix
    /// followed by `STRING_LEN` bytes zero-padded, DOUBLE is 8-byte
    /// big-endian IEEE-754.
    pub fn serialize(&self, out: &mut Vec<u8>) {
        match self {
            Field::Int(v) => out.extend_from_slice(&v.to_be_bytes()),
            Field::Str(s) => {
                let bytes = s.as_bytes();
                let len = bytes.len().min(STRING_LEN);
                out.extend_from_slice(&(len as u32).to_be_bytes());
                out.extend_from_slice(&bytes[..len]);
                out.extend(std::iter::repeat(0u8).take(STRING_LEN - len));
            }
            Field::Double(v) => out.extend_from_slice(&v.to_be_bytes()),
        }
    }

    /// Reads one field of the given type from the front of `buf`.
    /// `buf` must hold at least `ty.byte_len()` bytes.
    pub fn read_from(ty: Type, buf: &[u8]) -> Field {
        match ty {
            Type::Int => Field::Int(i32::from_be_bytes(buf[0..4].try_into().unwrap())),
            Type::String => {
                let len = u32::from_be_bytes(buf[0..4].try_into().unwrap()) as usize;
                let len = len.min(STRING_LEN);
                Field::Str(String::from_utf8_lossy(&buf[4..4 + len]).into_owned())
            }
            Type::Double => Field::Double(f64::from_be_bytes(buf[0..8].try_into().unwrap())),
        }
    }

    /// Six-way comparison against another field of the same type.
    ///
    /// LIKE falls through to equality for INT and DOUBLE and means
    /// substring containment for STRING. Comparing fields of different
    /// types is a programmer error.
    pub fn compare(&self, op: Op, other: &Field) -> Result<bool, StorageError> {
        match (self, other) {
            (Field::Int(a), Field::Int(b)) => Ok(compare_ord(*a, *b, op)),
            (Field::Double(a), Field::Double(b)) => Ok(match op {
                Op::Equals | Op::Like => a == b,
                Op::NotEquals => a != b,
                Op::LessThan => a < b,
                Op::LessThanOrEq => a <= b,
                Op::GreaterThan => a > b,
                Op::GreaterThanOrEq => a >= b,
            }),
            (Field::Str(a), Field::Str(b)) => Ok(match op {
                Op::Equals => a == b,
                Op::NotEquals => a != b,
                Op::LessThan => a < b,
                Op::LessThanOrEq => a <= b,
                Op::GreaterThan => a > b,
                Op::GreaterThanOrEq => a >= b,
                Op::Like => a.contains(b.as_str()),
            }),
            _ => Err(StorageError::SchemaMismatch),
        }
    }
}

fn compare_ord<T: Ord>(a: T, b: T, op: Op) -> bool {
    match op {
        Op::Equals | Op::Like => a == b,
        Op::NotEquals => a != b,
        Op::LessThan => a < b,
        Op::LessThanOrEq => a <= b,
        Op::GreaterThan => a > b,
        Op::GreaterThanOrEq => a >= b,
    }
}

impl PartialEq for Field {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Field::Int(a), Field::Int(b)) => a == b,
            (Field::Str(a), Field::Str(b)) => a == b,
            (Field::Double(a), Field::Double(b)) => a.to_bits() == b.to_bits(),
            _ => false,
        }
    }
}

impl Eq for Field {}

impl Hash for Field {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Field::Int(v) => v.hash(state),
            Field::Str(s) => s.hash(state),
            Field::Double(v) => v.to_bits().hash(state),
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Int(v) => write!(f, "{}", v),
            Field::Str(s) => write!(f, "{}", s),
            Field::Double(v) => write!(f, "{}", v),
        }
    }
}

/// The schema of a tuple: an ordered sequence of types with optional
/// column names. Two schemas are equal when their type sequences are
/// equal; names never participate.
#[derive(Debug, Clone)]
pub struct TupleDesc {
    items: Vec<(Type, Option<String>)>,
}

impl TupleDesc {
    pub fn new(items: Vec<(Type, Option<String>)>) -> Self {
        Self { items }
    }

    /// Schema with anonymous columns.
    pub fn from_types(types: Vec<Type>) -> Self {
        Self {
            items: types.into_iter().map(|t| (t, None)).collect(),
        }
    }

    pub fn num_fields(&self) -> usize {
        self.items.len()
    }

    pub fn field_type(&self, i: usize) -> Type {
        self.items[i].0
    }

    pub fn field_name(&self, i: usize) -> Option<&str> {
        self.items[i].1.as_deref()
    }

    /// Index of the first column with this name.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.items
            .iter()
            .position(|(_, n)| n.as_deref() == Some(name))
    }

    /// Serialized width of one tuple of this schema in bytes.
    pub fn byte_len(&self) -> usize {
        self.items.iter().map(|(t, _)| t.byte_len()).sum()
    }
}

impl PartialEq for TupleDesc {
    fn eq(&self, other: &Self) -> bool {
        self.items.len() == other.items.len()
            && self
                .items
                .iter()
                .zip(other.items.iter())
                .all(|((a, _), (b, _))| a == b)
    }
}

impl Eq for TupleDesc {}

/// Identifies a page: the owning table and the page's index within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageId {
    pub table_id: u32,
    pub page_no: usize,
}

impl PageId {
    pub fn new(table_id: u32, page_no: usize) -> Self {
        Self { table_id, page_no }
    }
}

/// Identifies a tuple's slot inside a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordId {
    pub page_id: PageId,
    pub slot: usize,
}

impl RecordId {
    pub fn new(page_id: PageId, slot: usize) -> Self {
        Self { page_id, slot }
    }
}

/// A row: a fixed-arity vector of fields matching its schema, plus the
/// record id of the slot it occupies once stored.
#[derive(Debug, Clone, PartialEq)]
pub struct Tuple {
    desc: TupleDesc,
    fields: Vec<Field>,
    record_id: Option<RecordId>,
}

impl Tuple {
    /// Builds a tuple, validating that every field matches the schema.
    pub fn new(desc: TupleDesc, fields: Vec<Field>) -> Result<Self, StorageError> {
        if fields.len() != desc.num_fields() {
            return Err(StorageError::SchemaMismatch);
        }
        for (i, field) in fields.iter().enumerate() {
            if field.field_type() != desc.field_type(i) {
                return Err(StorageError::SchemaMismatch);
            }
        }
        Ok(Self {
            desc,
            fields,
            record_id: None,
        })
    }

    pub fn desc(&self) -> &TupleDesc {
        &self.desc
    }

    pub fn field(&self, i: usize) -> &Field {
        &self.fields[i]
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn record_id(&self) -> Option<RecordId> {
        self.record_id
    }

    pub fn set_record_id(&mut self, rid: Option<RecordId>) {
        self.record_id = rid;
    }

    /// Appends the concatenated field encodings to `out`.
    pub fn serialize(&self, out: &mut Vec<u8>) {
        for field in &self.fields {
            field.serialize(out);
        }
    }

    /// Reads one tuple of the given schema from the front of `buf`.
    pub fn read_from(desc: &TupleDesc, buf: &[u8]) -> Tuple {
        let mut fields = Vec::with_capacity(desc.num_fields());
        let mut offset = 0;
        for i in 0..desc.num_fields() {
            let ty = desc.field_type(i);
            fields.push(Field::read_from(ty, &buf[offset..]));
            offset += ty.byte_len();
        }
        Tuple {
            desc: desc.clone(),
            fields,
            record_id: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int_string_desc() -> TupleDesc {
        TupleDesc::new(vec![
            (Type::Int, Some("id".to_string())),
            (Type::String, Some("name".to_string())),
        ])
    }

    #[test]
    fn tuple_desc_equality_ignores_names() {
        let named = int_string_desc();
        let anonymous = TupleDesc::from_types(vec![Type::Int, Type::String]);
        assert_eq!(named, anonymous);
        assert_ne!(named, TupleDesc::from_types(vec![Type::Int, Type::Int]));
    }

    #[test]
    fn tuple_desc_byte_len_sums_field_widths() {
        assert_eq!(int_string_desc().byte_len(), 4 + 4 + crate::STRING_LEN);
        assert_eq!(TupleDesc::from_types(vec![Type::Double]).byte_len(), 8);
    }

    #[test]
    fn field_round_trip_preserves_values() {
        for field in [
            Field::Int(-7),
            Field::Str("hello".to_string()),
            Field::Double(2.5),
        ] {
            let mut buf = Vec::new();
            field.serialize(&mut buf);
            assert_eq!(buf.len(), field.field_type().byte_len());
            assert_eq!(Field::read_from(field.field_type(), &buf), field);
        }
    }

    #[test]
    fn overlong_string_is_truncated_on_serialize() {
        let long = "x".repeat(crate::STRING_LEN + 40);
        let mut buf = Vec::new();
        Field::Str(long).serialize(&mut buf);
        assert_eq!(buf.len(), Type::String.byte_len());
        let back = Field::read_from(Type::String, &buf);
        assert_eq!(back, Field::Str("x".repeat(crate::STRING_LEN)));
    }

    #[test]
    fn compare_covers_all_operators() {
        let three = Field::Int(3);
        let five = Field::Int(5);
        assert!(three.compare(Op::LessThan, &five).unwrap());
        assert!(three.compare(Op::LessThanOrEq, &five).unwrap());
        assert!(five.compare(Op::GreaterThan, &three).unwrap());
        assert!(five.compare(Op::GreaterThanOrEq, &five).unwrap());
        assert!(three.compare(Op::NotEquals, &five).unwrap());
        assert!(three.compare(Op::Equals, &three).unwrap());
        assert!(three.compare(Op::Like, &three).unwrap());
    }

    #[test]
    fn like_is_equality_for_doubles_and_containment_for_strings() {
        let a = Field::Double(1.5);
        assert!(a.compare(Op::Like, &Field::Double(1.5)).unwrap());
        assert!(!a.compare(Op::Like, &Field::Double(2.5)).unwrap());

        let hay = Field::Str("warehouse".to_string());
        assert!(hay.compare(Op::Like, &Field::Str("house".to_string())).unwrap());
        assert!(!hay.compare(Op::Like, &Field::Str("barn".to_string())).unwrap());
    }

    #[test]
    fn compare_across_types_is_an_error() {
        let err = Field::Int(1).compare(Op::Equals, &Field::Str("1".to_string()));
        assert!(matches!(err, Err(StorageError::SchemaMismatch)));
    }

    #[test]
    fn tuple_rejects_mismatched_fields() {
        let desc = int_string_desc();
        let wrong_arity = Tuple::new(desc.clone(), vec![Field::Int(1)]);
        assert!(matches!(wrong_arity, Err(StorageError::SchemaMismatch)));

        let wrong_type = Tuple::new(desc, vec![Field::Int(1), Field::Int(2)]);
        assert!(matches!(wrong_type, Err(StorageError::SchemaMismatch)));
    }

    #[test]
    fn tuple_round_trip_preserves_fields() {
        let desc = int_string_desc();
        let tuple = Tuple::new(
            desc.clone(),
            vec![Field::Int(42), Field::Str("answer".to_string())],
        )
        .unwrap();
        let mut buf = Vec::new();
        tuple.serialize(&mut buf);
        assert_eq!(buf.len(), desc.byte_len());
        let back = Tuple::read_from(&desc, &buf);
        assert_eq!(back.fields(), tuple.fields());
    }
}
