//! Structural descriptions of record types.
//!
//! A [`RecordSchema`] is the ordered list of [`FieldDescriptor`]s a record
//! type maps to, nested records already flattened. `#[derive(Record)]`
//! builds it once per type; it can also be assembled by hand for dynamic
//! tables.

use crate::error::{Error, Result};
use crate::value::Row;

/// Alias that removes a field from the description.
pub const SKIP_ALIAS: &str = "-";

/// Coarse classification of a Rust field type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeKind {
    /// `String`, `&str`, `char`.
    Text,
    /// Integers that may not fit in 32 bits.
    BigInt,
    /// Integers that always fit in 32 bits.
    Integer,
    /// `f32`.
    Float32,
    /// `f64`.
    Float64,
    /// `bool`.
    Bool,
    /// `DateTime<Tz>`, `NaiveDateTime`.
    Timestamp,
    /// `NaiveDate`.
    Date,
    /// Lists, maps and JSON values.
    Json,
    /// Anything else. Needs a registered rule or a `db_type` override.
    Other,
}

/// Normalised Rust type of a field.
///
/// Whitespace is removed, `Option<..>` is unwrapped into [`is_optional`],
/// and the base name is the last path segment before any generic
/// arguments (`chrono::DateTime<Utc>` has base `DateTime`).
///
/// [`is_optional`]: TypeTag::is_optional
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeTag {
    rust_type: String,
    base: String,
    optional: bool,
}

impl TypeTag {
    /// Parses a type as written in source or as returned by
    /// [`std::any::type_name`].
    #[must_use]
    pub fn parse(rust_type: &str) -> Self {
        let compact: String = rust_type.chars().filter(|c| !c.is_whitespace()).collect();
        let (inner, optional) = strip_option(&compact)
            .map_or_else(|| (compact.clone(), false), |inner| (inner.to_string(), true));
        let base = base_name(&inner).to_string();
        Self {
            rust_type: inner,
            base,
            optional,
        }
    }

    /// Type tag of `T`.
    #[must_use]
    pub fn of<T: ?Sized>() -> Self {
        Self::parse(std::any::type_name::<T>())
    }

    /// The type text with any `Option<..>` removed.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.rust_type
    }

    /// Last path segment without generic arguments.
    #[must_use]
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Whether the field was declared as `Option<..>`.
    #[must_use]
    pub const fn is_optional(&self) -> bool {
        self.optional
    }

    /// Classifies the base type.
    #[must_use]
    pub fn kind(&self) -> NativeKind {
        match self.base.as_str() {
            "String" | "str" | "char" => NativeKind::Text,
            "i64" | "isize" | "u32" | "u64" | "usize" => NativeKind::BigInt,
            "i8" | "i16" | "i32" | "u8" | "u16" => NativeKind::Integer,
            "f32" => NativeKind::Float32,
            "f64" => NativeKind::Float64,
            "bool" => NativeKind::Bool,
            "DateTime" | "NaiveDateTime" => NativeKind::Timestamp,
            "NaiveDate" => NativeKind::Date,
            "Vec" | "HashMap" | "BTreeMap" | "IndexMap" | "Value" => NativeKind::Json,
            _ => NativeKind::Other,
        }
    }
}

impl std::fmt::Display for TypeTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.optional {
            write!(f, "Option<{}>", self.rust_type)
        } else {
            f.write_str(&self.rust_type)
        }
    }
}

fn strip_option(ty: &str) -> Option<&str> {
    let ty = ty.trim_start_matches('&');
    let open = ty.find('<')?;
    if base_name(&ty[..open]) != "Option" || !ty.ends_with('>') {
        return None;
    }
    Some(&ty[open + 1..ty.len() - 1])
}

fn base_name(ty: &str) -> &str {
    let ty = ty.trim_start_matches('&').trim_start_matches("'static");
    let ty = ty.strip_prefix("mut").unwrap_or(ty);
    let head = ty.split('<').next().unwrap_or(ty);
    head.rsplit("::").next().unwrap_or(head)
}

/// One column of a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    /// Field name in the record.
    pub name: String,
    /// Column name override; the authoritative column name when set.
    pub alias: Option<String>,
    /// Rust type of the field.
    pub native_type: TypeTag,
    /// Primary key marker.
    pub is_key: bool,
    /// Column is declared `NOT NULL`.
    pub required: bool,
    /// Explicit SQL type, bypassing the mapper registry.
    pub db_type: Option<String>,
    /// Explicit default literal.
    pub default: Option<String>,
}

impl FieldDescriptor {
    /// Creates a descriptor for a field of the given Rust type.
    #[must_use]
    pub fn new(name: impl Into<String>, rust_type: &str) -> Self {
        Self {
            name: name.into(),
            alias: None,
            native_type: TypeTag::parse(rust_type),
            is_key: false,
            required: false,
            db_type: None,
            default: None,
        }
    }

    /// Creates a descriptor whose type is `T`.
    #[must_use]
    pub fn of<T: ?Sized>(name: impl Into<String>) -> Self {
        let mut field = Self::new(name, "");
        field.native_type = TypeTag::of::<T>();
        field
    }

    /// Sets the column name override.
    #[must_use]
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Marks the field as part of the primary key.
    #[must_use]
    pub const fn key(mut self) -> Self {
        self.is_key = true;
        self
    }

    /// Marks the field as `NOT NULL`.
    #[must_use]
    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Sets an explicit SQL column type.
    #[must_use]
    pub fn db_type(mut self, db_type: impl Into<String>) -> Self {
        self.db_type = Some(db_type.into());
        self
    }

    /// Sets an explicit default literal.
    #[must_use]
    pub fn default_literal(mut self, literal: impl Into<String>) -> Self {
        self.default = Some(literal.into());
        self
    }

    /// Column name as the record spells it: the alias when present.
    #[must_use]
    pub fn column_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    /// Column name as the engine stores it.
    #[must_use]
    pub fn sql_name(&self) -> String {
        self.column_name().to_lowercase()
    }

    /// Whether the field name or its alias is listed in `keys`.
    /// The comparison is case-sensitive.
    #[must_use]
    pub fn matches_key(&self, keys: &[&str]) -> bool {
        keys.iter()
            .any(|k| *k == self.name || self.alias.as_deref() == Some(*k))
    }

    /// Excluded fields carry the `-` alias.
    #[must_use]
    pub fn is_skipped(&self) -> bool {
        self.alias.as_deref() == Some(SKIP_ALIAS)
    }
}

/// Ordered, flattened field list of a record type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSchema {
    name: String,
    fields: Vec<FieldDescriptor>,
}

impl RecordSchema {
    /// Creates a schema, dropping fields aliased `-`.
    #[must_use]
    pub fn new(name: impl Into<String>, fields: Vec<FieldDescriptor>) -> Self {
        Self {
            name: name.into(),
            fields: fields.into_iter().filter(|f| !f.is_skipped()).collect(),
        }
    }

    /// Name of the record type.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fields in declaration order.
    #[must_use]
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Finds a field by column name, ignoring case.
    #[must_use]
    pub fn field(&self, column: &str) -> Option<&FieldDescriptor> {
        self.fields
            .iter()
            .find(|f| f.column_name().eq_ignore_ascii_case(column))
    }

    /// Checks that column names are unique once lower-cased.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateColumn`] for the first repeated name.
    pub fn validate(&self) -> Result<()> {
        validate_fields(&self.fields)
    }
}

/// Checks a field list for repeated column names, ignoring case.
///
/// # Errors
///
/// Returns [`Error::DuplicateColumn`] for the first repeated name.
pub fn validate_fields(fields: &[FieldDescriptor]) -> Result<()> {
    let mut seen = std::collections::HashSet::new();
    for field in fields {
        let column = field.sql_name();
        if !seen.insert(column.clone()) {
            return Err(Error::DuplicateColumn { column });
        }
    }
    Ok(())
}

/// A type that maps onto a table row.
///
/// Usually derived:
///
/// ```ignore
/// use oxide_pg::Record;
///
/// #[derive(Record)]
/// struct Article {
///     #[field(key)]
///     id: String,
///     #[field(required)]
///     title: String,
///     #[field(name = "DataDec")]
///     score: f64,
///     #[field(flatten)]
///     audit: Audit,
/// }
/// ```
pub trait Record: Sized {
    /// Cached structural description of the type.
    fn schema() -> &'static RecordSchema;

    /// Converts the record into a payload row keyed by column name.
    fn to_row(&self) -> Row;

    /// Reads a record back from a scanned row.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Coercion`] when a column cannot be converted.
    fn from_row(row: &Row) -> Result<Self>;
}
