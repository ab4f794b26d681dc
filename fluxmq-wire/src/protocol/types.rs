//! Versioned field/schema codec
//!
//! A [`Schema`] is an ordered list of typed [`Field`]s, each active over an
//! inclusive [`VersionRange`]. Encoding and decoding walk the fields in
//! order and skip those that are not active at the requested version, so a
//! field added in version N+1 is invisible to version N and shifts no
//! offsets. Values live in a [`Struct`], a name-to-[`Value`] map.
//!
//! Wire encodings (all integers big-endian):
//!
//! | Type              | Encoding                                       |
//! |-------------------|------------------------------------------------|
//! | int8..int64       | fixed width, two's complement                  |
//! | boolean           | one byte, 0 or 1                               |
//! | string            | int16 length + UTF-8 bytes                     |
//! | nullable string   | as string, length -1 means null                |
//! | bytes             | int32 length + raw bytes                       |
//! | nullable bytes    | as bytes, length -1 means null                 |
//! | array             | int32 element count + elements                 |

use std::collections::BTreeMap;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::SchemaError;

pub type Result<T> = std::result::Result<T, SchemaError>;

// ============================================================================
// VERSION RANGES
// ============================================================================

/// Inclusive range of protocol versions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VersionRange {
    pub low: i16,
    pub high: i16,
}

impl VersionRange {
    /// Every version
    pub const ALL: VersionRange = VersionRange::new(0, i16::MAX);

    pub const fn new(low: i16, high: i16) -> Self {
        Self { low, high }
    }

    /// Versions from `low` onwards
    pub const fn since(low: i16) -> Self {
        Self::new(low, i16::MAX)
    }

    pub const fn contains(self, version: i16) -> bool {
        version >= self.low && version <= self.high
    }
}

// ============================================================================
// FIELDS AND VALUES
// ============================================================================

/// Semantic type of a field
#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    Int8,
    Int16,
    Int32,
    Int64,
    Boolean,
    String,
    NullableString,
    Bytes,
    NullableBytes,
    Array(Box<FieldType>),
    Struct(Schema),
}

impl FieldType {
    /// Array of nested records
    pub fn array_of(schema: Schema) -> Self {
        FieldType::Array(Box::new(FieldType::Struct(schema)))
    }

    fn type_name(&self) -> &'static str {
        match self {
            FieldType::Int8 => "int8",
            FieldType::Int16 => "int16",
            FieldType::Int32 => "int32",
            FieldType::Int64 => "int64",
            FieldType::Boolean => "boolean",
            FieldType::String => "string",
            FieldType::NullableString => "nullable string",
            FieldType::Bytes => "bytes",
            FieldType::NullableBytes => "nullable bytes",
            FieldType::Array(_) => "array",
            FieldType::Struct(_) => "struct",
        }
    }
}

/// A named, typed, version-ranged member of a [`Schema`]
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: &'static str,
    pub ty: FieldType,
    pub versions: VersionRange,
}

impl Field {
    /// Field present in every version
    pub fn new(name: &'static str, ty: FieldType) -> Self {
        Self {
            name,
            ty,
            versions: VersionRange::ALL,
        }
    }

    /// Restrict the field to a version range
    pub fn versions(mut self, versions: VersionRange) -> Self {
        self.versions = versions;
        self
    }

    pub fn is_active(&self, version: i16) -> bool {
        self.versions.contains(version)
    }
}

/// A decoded or to-be-encoded field value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Boolean(bool),
    String(String),
    NullableString(Option<String>),
    Bytes(Bytes),
    NullableBytes(Option<Bytes>),
    Array(Vec<Value>),
    Struct(Struct),
}

/// Structured record: field name to value
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Struct {
    values: BTreeMap<&'static str, Value>,
}

macro_rules! typed_getter {
    ($fn_name:ident, $variant:ident, $ty:ty, $expected:literal) => {
        pub fn $fn_name(&self, field: &'static str) -> Result<$ty> {
            match self.values.get(field) {
                Some(Value::$variant(v)) => Ok(v.clone()),
                Some(_) => Err(SchemaError::TypeMismatch {
                    field,
                    expected: $expected,
                }),
                None => Err(SchemaError::MissingField { field, version: -1 }),
            }
        }
    };
}

impl Struct {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, field: &'static str, value: Value) -> Self {
        self.values.insert(field, value);
        self
    }

    pub fn set(&mut self, field: &'static str, value: Value) {
        self.values.insert(field, value);
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.values.get(field)
    }

    pub fn has(&self, field: &str) -> bool {
        self.values.contains_key(field)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn field_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.values.keys().copied()
    }

    typed_getter!(get_i8, Int8, i8, "int8");
    typed_getter!(get_i16, Int16, i16, "int16");
    typed_getter!(get_i32, Int32, i32, "int32");
    typed_getter!(get_i64, Int64, i64, "int64");
    typed_getter!(get_bool, Boolean, bool, "boolean");
    typed_getter!(get_string, String, String, "string");
    typed_getter!(get_nullable_string, NullableString, Option<String>, "nullable string");
    typed_getter!(get_bytes, Bytes, Bytes, "bytes");
    typed_getter!(get_nullable_bytes, NullableBytes, Option<Bytes>, "nullable bytes");

    /// Elements of an array field
    pub fn get_array(&self, field: &'static str) -> Result<&[Value]> {
        match self.values.get(field) {
            Some(Value::Array(items)) => Ok(items.as_slice()),
            Some(_) => Err(SchemaError::TypeMismatch {
                field,
                expected: "array",
            }),
            None => Err(SchemaError::MissingField { field, version: -1 }),
        }
    }

    /// Nested records of an array-of-struct field
    pub fn get_struct_array(&self, field: &'static str) -> Result<Vec<&Struct>> {
        self.get_array(field)?
            .iter()
            .map(|value| match value {
                Value::Struct(s) => Ok(s),
                _ => Err(SchemaError::TypeMismatch {
                    field,
                    expected: "struct",
                }),
            })
            .collect()
    }
}

// ============================================================================
// SCHEMAS
// ============================================================================

/// Ordered list of fields
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Schema {
    fields: Vec<Field>,
}

impl Schema {
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Fields active at `version`, in wire order
    pub fn fields_for(&self, version: i16) -> impl Iterator<Item = &Field> {
        self.fields.iter().filter(move |f| f.is_active(version))
    }

    /// Encode `record` at `version`. Fields inactive at `version` are
    /// skipped even when set; active fields must be present.
    pub fn write(&self, buf: &mut BytesMut, record: &Struct, version: i16) -> Result<()> {
        for field in self.fields_for(version) {
            let value = record.get(field.name).ok_or(SchemaError::MissingField {
                field: field.name,
                version,
            })?;
            write_value(buf, field.name, &field.ty, value, version)?;
        }
        Ok(())
    }

    /// Decode a record at `version`; trailing bytes are left in `buf`.
    pub fn read(&self, buf: &mut Bytes, version: i16) -> Result<Struct> {
        let mut record = Struct::new();
        for field in self.fields_for(version) {
            let value = read_value(buf, field.name, &field.ty, version)?;
            record.set(field.name, value);
        }
        Ok(record)
    }
}

/// A top-level message body schema with its supported versions
#[derive(Debug, Clone, PartialEq)]
pub struct MessageSchema {
    pub name: &'static str,
    pub versions: VersionRange,
    pub body: Schema,
}

impl MessageSchema {
    pub fn new(name: &'static str, versions: VersionRange, fields: Vec<Field>) -> Self {
        Self {
            name,
            versions,
            body: Schema::new(fields),
        }
    }

    fn check_version(&self, version: i16) -> Result<()> {
        if self.versions.contains(version) {
            Ok(())
        } else {
            Err(SchemaError::UnsupportedVersion {
                api: self.name,
                version,
            })
        }
    }

    pub fn write(&self, buf: &mut BytesMut, record: &Struct, version: i16) -> Result<()> {
        self.check_version(version)?;
        self.body.write(buf, record, version)
    }

    pub fn read(&self, buf: &mut Bytes, version: i16) -> Result<Struct> {
        self.check_version(version)?;
        self.body.read(buf, version)
    }

    /// Encode into a fresh buffer
    pub fn encode(&self, record: &Struct, version: i16) -> Result<Bytes> {
        let mut buf = BytesMut::new();
        self.write(&mut buf, record, version)?;
        Ok(buf.freeze())
    }
}

fn mismatch(field: &'static str, ty: &FieldType) -> SchemaError {
    SchemaError::TypeMismatch {
        field,
        expected: ty.type_name(),
    }
}

fn write_value(
    buf: &mut BytesMut,
    field: &'static str,
    ty: &FieldType,
    value: &Value,
    version: i16,
) -> Result<()> {
    match (ty, value) {
        (FieldType::Int8, Value::Int8(v)) => buf.put_i8(*v),
        (FieldType::Int16, Value::Int16(v)) => buf.put_i16(*v),
        (FieldType::Int32, Value::Int32(v)) => buf.put_i32(*v),
        (FieldType::Int64, Value::Int64(v)) => buf.put_i64(*v),
        (FieldType::Boolean, Value::Boolean(v)) => buf.put_i8(*v as i8),
        (FieldType::String, Value::String(s)) => put_string(buf, field, s)?,
        (FieldType::NullableString, Value::NullableString(s)) => {
            put_nullable_string(buf, field, s.as_deref())?
        }
        (FieldType::Bytes, Value::Bytes(b)) => put_bytes(buf, field, b)?,
        (FieldType::NullableBytes, Value::NullableBytes(b)) => {
            put_nullable_bytes(buf, field, b.as_ref())?
        }
        (FieldType::Array(element), Value::Array(items)) => {
            put_length(buf, field, items.len())?;
            for item in items {
                write_value(buf, field, element, item, version)?;
            }
        }
        (FieldType::Struct(schema), Value::Struct(record)) => schema.write(buf, record, version)?,
        (ty, _) => return Err(mismatch(field, ty)),
    }
    Ok(())
}

fn read_value(buf: &mut Bytes, field: &'static str, ty: &FieldType, version: i16) -> Result<Value> {
    let value = match ty {
        FieldType::Int8 => {
            ensure_remaining(buf, field, 1)?;
            Value::Int8(buf.get_i8())
        }
        FieldType::Int16 => {
            ensure_remaining(buf, field, 2)?;
            Value::Int16(buf.get_i16())
        }
        FieldType::Int32 => {
            ensure_remaining(buf, field, 4)?;
            Value::Int32(buf.get_i32())
        }
        FieldType::Int64 => {
            ensure_remaining(buf, field, 8)?;
            Value::Int64(buf.get_i64())
        }
        FieldType::Boolean => {
            ensure_remaining(buf, field, 1)?;
            match buf.get_i8() {
                0 => Value::Boolean(false),
                1 => Value::Boolean(true),
                value => return Err(SchemaError::InvalidBoolean { field, value }),
            }
        }
        FieldType::String => Value::String(get_string(buf, field)?),
        FieldType::NullableString => Value::NullableString(get_nullable_string(buf, field)?),
        FieldType::Bytes => Value::Bytes(get_bytes(buf, field)?),
        FieldType::NullableBytes => Value::NullableBytes(get_nullable_bytes(buf, field)?),
        FieldType::Array(element) => {
            ensure_remaining(buf, field, 4)?;
            let count = buf.get_i32();
            if count < 0 {
                return Err(SchemaError::InvalidLength {
                    field,
                    length: count,
                });
            }
            // Cap the preallocation; a hostile count must not drive allocation.
            let mut items = Vec::with_capacity((count as usize).min(buf.remaining()));
            for _ in 0..count {
                items.push(read_value(buf, field, element, version)?);
            }
            Value::Array(items)
        }
        FieldType::Struct(schema) => Value::Struct(schema.read(buf, version)?),
    };
    Ok(value)
}

// ============================================================================
// PRIMITIVE HELPERS
// ============================================================================

fn ensure_remaining(buf: &Bytes, field: &'static str, needed: usize) -> Result<()> {
    if buf.remaining() < needed {
        return Err(SchemaError::BufferUnderrun {
            field,
            needed,
            available: buf.remaining(),
        });
    }
    Ok(())
}

fn put_length(buf: &mut BytesMut, field: &'static str, len: usize) -> Result<()> {
    let len = i32::try_from(len).map_err(|_| SchemaError::InvalidLength { field, length: -1 })?;
    buf.put_i32(len);
    Ok(())
}

/// Write a non-null string with a 2-byte length prefix
pub fn put_string(buf: &mut BytesMut, field: &'static str, value: &str) -> Result<()> {
    let len = i16::try_from(value.len()).map_err(|_| SchemaError::StringTooLong {
        field,
        length: value.len(),
    })?;
    buf.put_i16(len);
    buf.put_slice(value.as_bytes());
    Ok(())
}

/// Write a nullable string; `None` is encoded as length -1
pub fn put_nullable_string(buf: &mut BytesMut, field: &'static str, value: Option<&str>) -> Result<()> {
    match value {
        Some(s) => put_string(buf, field, s),
        None => {
            buf.put_i16(-1);
            Ok(())
        }
    }
}

pub fn put_bytes(buf: &mut BytesMut, field: &'static str, value: &[u8]) -> Result<()> {
    put_length(buf, field, value.len())?;
    buf.put_slice(value);
    Ok(())
}

pub fn put_nullable_bytes(buf: &mut BytesMut, field: &'static str, value: Option<&Bytes>) -> Result<()> {
    match value {
        Some(b) => put_bytes(buf, field, b),
        None => {
            buf.put_i32(-1);
            Ok(())
        }
    }
}

/// Read a non-null string; a null sentinel is rejected
pub fn get_string(buf: &mut Bytes, field: &'static str) -> Result<String> {
    get_nullable_string(buf, field)?.ok_or(SchemaError::InvalidLength { field, length: -1 })
}

pub fn get_nullable_string(buf: &mut Bytes, field: &'static str) -> Result<Option<String>> {
    ensure_remaining(buf, field, 2)?;
    let len = buf.get_i16();
    if len == -1 {
        return Ok(None);
    }
    if len < 0 {
        return Err(SchemaError::InvalidLength {
            field,
            length: len as i32,
        });
    }
    ensure_remaining(buf, field, len as usize)?;
    let raw = buf.split_to(len as usize);
    String::from_utf8(raw.to_vec())
        .map(Some)
        .map_err(|_| SchemaError::InvalidString { field })
}

pub fn get_bytes(buf: &mut Bytes, field: &'static str) -> Result<Bytes> {
    get_nullable_bytes(buf, field)?.ok_or(SchemaError::InvalidLength { field, length: -1 })
}

pub fn get_nullable_bytes(buf: &mut Bytes, field: &'static str) -> Result<Option<Bytes>> {
    ensure_remaining(buf, field, 4)?;
    let len = buf.get_i32();
    if len == -1 {
        return Ok(None);
    }
    if len < 0 {
        return Err(SchemaError::InvalidLength { field, length: len });
    }
    ensure_remaining(buf, field, len as usize)?;
    Ok(Some(buf.split_to(len as usize)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn partition_schema() -> Schema {
        Schema::new(vec![
            Field::new("topic", FieldType::String),
            Field::new("partition", FieldType::Int32),
        ])
    }

    fn sample_schema() -> Schema {
        Schema::new(vec![
            Field::new("id", FieldType::Int32),
            Field::new("epoch", FieldType::Int64).versions(VersionRange::since(1)),
            Field::new("name", FieldType::NullableString),
            Field::new("partitions", FieldType::array_of(partition_schema())),
        ])
    }

    fn partition(topic: &str, partition: i32) -> Value {
        Value::Struct(
            Struct::new()
                .with("topic", Value::String(topic.to_string()))
                .with("partition", Value::Int32(partition)),
        )
    }

    fn sample_record(version: i16) -> Struct {
        let mut record = Struct::new()
            .with("id", Value::Int32(7))
            .with("name", Value::NullableString(None))
            .with(
                "partitions",
                Value::Array(vec![partition("events", 0), partition("events", 1)]),
            );
        if version >= 1 {
            record.set("epoch", Value::Int64(42));
        }
        record
    }

    #[test]
    fn test_round_trip_each_version() {
        let schema = sample_schema();
        for version in 0..=1 {
            let record = sample_record(version);
            let mut buf = BytesMut::new();
            schema.write(&mut buf, &record, version).unwrap();
            let decoded = schema.read(&mut buf.freeze(), version).unwrap();
            assert_eq!(decoded, record);
        }
    }

    #[test]
    fn test_inactive_field_skipped_without_shifting_offsets() {
        let schema = sample_schema();
        let mut v0 = BytesMut::new();
        schema.write(&mut v0, &sample_record(1), 0).unwrap();

        let mut expected = BytesMut::new();
        expected.put_i32(7);
        expected.put_i16(-1);
        expected.put_i32(2);
        put_string(&mut expected, "topic", "events").unwrap();
        expected.put_i32(0);
        put_string(&mut expected, "topic", "events").unwrap();
        expected.put_i32(1);
        assert_eq!(v0, expected);

        let decoded = schema.read(&mut v0.freeze(), 0).unwrap();
        assert!(!decoded.has("epoch"));
    }

    #[test]
    fn test_missing_required_field() {
        let schema = sample_schema();
        let record = sample_record(0);
        let err = schema.write(&mut BytesMut::new(), &record, 1).unwrap_err();
        assert_eq!(
            err,
            SchemaError::MissingField {
                field: "epoch",
                version: 1
            }
        );
    }

    #[test]
    fn test_type_mismatch() {
        let schema = Schema::new(vec![Field::new("id", FieldType::Int32)]);
        let record = Struct::new().with("id", Value::Int16(1));
        let err = schema.write(&mut BytesMut::new(), &record, 0).unwrap_err();
        assert_eq!(
            err,
            SchemaError::TypeMismatch {
                field: "id",
                expected: "int32"
            }
        );
    }

    #[test]
    fn test_truncated_input() {
        let schema = sample_schema();
        let mut buf = BytesMut::new();
        schema.write(&mut buf, &sample_record(0), 0).unwrap();
        let full = buf.freeze();
        for cut in 0..full.len() {
            let mut truncated = full.slice(..cut);
            assert!(
                schema.read(&mut truncated, 0).is_err(),
                "decoding {} of {} bytes should fail",
                cut,
                full.len()
            );
        }
    }

    #[test]
    fn test_string_length_exceeds_remaining() {
        let mut buf = BytesMut::new();
        buf.put_i16(10);
        buf.put_slice(b"abc");
        let err = get_string(&mut buf.freeze(), "name").unwrap_err();
        assert_eq!(
            err,
            SchemaError::BufferUnderrun {
                field: "name",
                needed: 10,
                available: 3
            }
        );
    }

    #[test]
    fn test_null_sentinels() {
        let mut buf = BytesMut::new();
        put_nullable_string(&mut buf, "s", None).unwrap();
        put_nullable_bytes(&mut buf, "b", None).unwrap();
        assert_eq!(&buf[..], &[0xff, 0xff, 0xff, 0xff, 0xff, 0xff]);

        let mut bytes = buf.freeze();
        assert_eq!(get_nullable_string(&mut bytes, "s").unwrap(), None);
        assert_eq!(get_nullable_bytes(&mut bytes, "b").unwrap(), None);
    }

    #[test]
    fn test_null_rejected_for_required_string() {
        let mut buf = BytesMut::new();
        buf.put_i16(-1);
        assert!(matches!(
            get_string(&mut buf.freeze(), "name"),
            Err(SchemaError::InvalidLength { field: "name", length: -1 })
        ));
    }

    #[test]
    fn test_negative_array_count() {
        let schema = Schema::new(vec![Field::new("items", FieldType::Array(Box::new(FieldType::Int8)))]);
        let mut buf = BytesMut::new();
        buf.put_i32(-5);
        assert!(matches!(
            schema.read(&mut buf.freeze(), 0),
            Err(SchemaError::InvalidLength { length: -5, .. })
        ));
    }

    #[test]
    fn test_invalid_boolean() {
        let schema = Schema::new(vec![Field::new("flag", FieldType::Boolean)]);
        let mut buf = BytesMut::new();
        buf.put_i8(2);
        assert_eq!(
            schema.read(&mut buf.freeze(), 0).unwrap_err(),
            SchemaError::InvalidBoolean { field: "flag", value: 2 }
        );
    }

    #[test]
    fn test_message_schema_rejects_unknown_version() {
        let schema = MessageSchema::new("Sample", VersionRange::new(0, 1), sample_schema().fields().to_vec());
        let err = schema.encode(&sample_record(1), 2).unwrap_err();
        assert_eq!(err, SchemaError::UnsupportedVersion { api: "Sample", version: 2 });
        assert!(matches!(
            schema.read(&mut Bytes::new(), 5),
            Err(SchemaError::UnsupportedVersion { version: 5, .. })
        ));
    }

    #[test]
    fn test_typed_getters() {
        let record = sample_record(1);
        assert_eq!(record.get_i32("id").unwrap(), 7);
        assert_eq!(record.get_i64("epoch").unwrap(), 42);
        assert_eq!(record.get_nullable_string("name").unwrap(), None);
        assert_eq!(record.get_struct_array("partitions").unwrap().len(), 2);
        assert!(matches!(
            record.get_string("id"),
            Err(SchemaError::TypeMismatch { field: "id", .. })
        ));
    }
}
