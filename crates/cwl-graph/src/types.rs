//! Type descriptors and compatibility
//!
//! Compatibility is directional: `type_compatible(producer, consumer)` asks
//! whether every value the producer may emit is acceptable to the consumer.
//! It is reflexive but not symmetric (`int` feeds `long`, not the reverse).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::{self, Display, Formatter};

/// Scalar types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalarType {
    /// `null`
    Null,
    /// `boolean`
    Boolean,
    /// `int` (32-bit)
    Int,
    /// `long` (64-bit)
    Long,
    /// `float`
    Float,
    /// `double`
    Double,
    /// `string`
    String,
    /// `File`
    File,
    /// `Directory`
    Directory,
}

impl ScalarType {
    /// Parse a scalar type name
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "null" => Self::Null,
            "boolean" => Self::Boolean,
            "int" => Self::Int,
            "long" => Self::Long,
            "float" => Self::Float,
            "double" => Self::Double,
            "string" => Self::String,
            "File" => Self::File,
            "Directory" => Self::Directory,
            _ => return None,
        })
    }

    /// Schema name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Boolean => "boolean",
            Self::Int => "int",
            Self::Long => "long",
            Self::Float => "float",
            Self::Double => "double",
            Self::String => "string",
            Self::File => "File",
            Self::Directory => "Directory",
        }
    }

    fn numeric_rank(self) -> Option<u8> {
        match self {
            Self::Int => Some(0),
            Self::Long => Some(1),
            Self::Float => Some(2),
            Self::Double => Some(3),
            _ => None,
        }
    }

    /// Whether values of `self` widen losslessly enough into `target`
    /// (`int → long → float → double`)
    #[must_use]
    pub fn widens_to(self, target: Self) -> bool {
        matches!(
            (self.numeric_rank(), target.numeric_rank()),
            (Some(from), Some(to)) if from <= to
        )
    }
}

/// Named record field
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordField {
    /// Field name
    pub name: String,
    /// Field type
    pub ty: TypeDescriptor,
    /// Whether the field may be null or absent
    pub optional: bool,
}

/// Type of a parameter, record field or array item
///
/// Nullability is not part of the descriptor; it is carried next to it as
/// an `optional` flag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TypeDescriptor {
    /// Accepts and produces anything
    Any,
    /// Scalar
    Scalar {
        /// Scalar kind
        scalar: ScalarType,
    },
    /// Homogeneous array
    Array {
        /// Item type
        items: Box<TypeDescriptor>,
    },
    /// Record with named fields
    Record {
        /// Schema name, if any
        name: Option<String>,
        /// Fields in declaration order
        fields: Vec<RecordField>,
    },
    /// Enumeration
    Enum {
        /// Schema name, if any
        name: Option<String>,
        /// Allowed symbols
        symbols: Vec<String>,
    },
    /// Any of the members
    Union {
        /// Member types (no `null`)
        members: Vec<TypeDescriptor>,
    },
}

/// Descriptor plus nullability, as parsed from a type expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedType {
    /// Descriptor
    pub ty: TypeDescriptor,
    /// Whether `null` is accepted
    pub optional: bool,
}

impl ParsedType {
    /// Descriptor with `null` folded back in as a union member
    #[must_use]
    pub fn descriptor(&self) -> TypeDescriptor {
        let null = TypeDescriptor::scalar(ScalarType::Null);
        match &self.ty {
            ty if !self.optional || *ty == null => ty.clone(),
            ty => TypeDescriptor::union(vec![null, ty.clone()]),
        }
    }
}

impl TypeDescriptor {
    /// Scalar descriptor
    #[inline]
    #[must_use]
    pub fn scalar(scalar: ScalarType) -> Self {
        Self::Scalar { scalar }
    }

    /// Array of `items`
    #[inline]
    #[must_use]
    pub fn array(items: Self) -> Self {
        Self::Array {
            items: Box::new(items),
        }
    }

    /// Union, flattened and deduplicated, collapsed when it has a single member
    #[must_use]
    pub fn union(members: Vec<Self>) -> Self {
        let flat = members.into_iter().flat_map(|member| match member {
            Self::Union { members } => members,
            member => vec![member],
        });
        let mut members = flat.fold(Vec::new(), |mut kept: Vec<Self>, member| {
            if !kept.contains(&member) {
                kept.push(member);
            }
            kept
        });
        if members.len() == 1 {
            members.remove(0)
        } else {
            Self::Union { members }
        }
    }

    /// Item type of an array, `None` for other descriptors
    #[must_use]
    pub fn items(&self) -> Option<&Self> {
        match self {
            Self::Array { items } => Some(items),
            _ => None,
        }
    }

    /// Parse a type expression
    ///
    /// Accepts names (`int`), shorthands (`File[]`, `string?`), unions as
    /// lists, and `array`/`record`/`enum` schemas. `stdout` and `stderr`
    /// are files.
    ///
    /// # Errors
    /// Description of the unparseable part
    pub fn parse(value: &Value) -> Result<ParsedType, String> {
        match value {
            Value::String(raw) => parse_name(raw),
            Value::Array(members) => {
                let mut optional = false;
                let mut types = Vec::with_capacity(members.len());
                for member in members {
                    let parsed = Self::parse(member)?;
                    optional |= parsed.optional;
                    if parsed.ty != Self::scalar(ScalarType::Null) {
                        types.push(parsed.ty);
                    }
                }
                if types.is_empty() {
                    return Ok(ParsedType {
                        ty: Self::scalar(ScalarType::Null),
                        optional: true,
                    });
                }
                Ok(ParsedType {
                    ty: Self::union(types),
                    optional,
                })
            }
            Value::Object(schema) => {
                let ty = match schema.get("type") {
                    Some(Value::String(kind)) if kind == "array" => {
                        let items = schema
                            .get("items")
                            .ok_or_else(|| "array schema without items".to_string())?;
                        Self::array(Self::parse(items)?.ty)
                    }
                    Some(Value::String(kind)) if kind == "record" => Self::Record {
                        name: schema_name(schema),
                        fields: parse_fields(schema.get("fields"))?,
                    },
                    Some(Value::String(kind)) if kind == "enum" => Self::Enum {
                        name: schema_name(schema),
                        symbols: schema
                            .get("symbols")
                            .and_then(Value::as_array)
                            .ok_or_else(|| "enum schema without symbols".to_string())?
                            .iter()
                            .filter_map(Value::as_str)
                            .map(ToString::to_string)
                            .collect(),
                    },
                    Some(inner) => return Self::parse(inner),
                    None => return Err("schema without type".to_string()),
                };
                Ok(ParsedType { ty, optional: false })
            }
            other => Err(format!("unexpected type expression {other}")),
        }
    }
}

fn parse_name(raw: &str) -> Result<ParsedType, String> {
    let (rest, optional) = raw.strip_suffix('?').map_or((raw, false), |r| (r, true));
    let (name, array) = rest.strip_suffix("[]").map_or((rest, false), |r| (r, true));
    let base = match name {
        "Any" => TypeDescriptor::Any,
        "stdout" | "stderr" => TypeDescriptor::scalar(ScalarType::File),
        other => TypeDescriptor::scalar(
            ScalarType::parse(other).ok_or_else(|| format!("unknown type '{other}'"))?,
        ),
    };
    let optional = optional || (!array && base == TypeDescriptor::scalar(ScalarType::Null));
    let ty = if array { TypeDescriptor::array(base) } else { base };
    Ok(ParsedType { ty, optional })
}

fn schema_name(schema: &serde_json::Map<String, Value>) -> Option<String> {
    schema.get("name").and_then(Value::as_str).map(ToString::to_string)
}

fn parse_fields(fields: Option<&Value>) -> Result<Vec<RecordField>, String> {
    let Some(fields) = fields else {
        return Ok(Vec::new());
    };
    let entries = cwl_document::idmap::expand("fields", fields, "name", Some("type"))
        .map_err(|e| e.to_string())?;
    entries
        .iter()
        .map(|field| {
            let name = field
                .get("name")
                .and_then(Value::as_str)
                .ok_or_else(|| "record field without name".to_string())?;
            let ty = field
                .get("type")
                .ok_or_else(|| format!("record field '{name}' without type"))?;
            let parsed = TypeDescriptor::parse(ty).map_err(|e| format!("field '{name}': {e}"))?;
            Ok(RecordField {
                name: cwl_document::shortname(name).to_string(),
                ty: parsed.ty,
                optional: parsed.optional,
            })
        })
        .collect()
}

impl Display for TypeDescriptor {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("Any"),
            Self::Scalar { scalar } => f.write_str(scalar.as_str()),
            Self::Array { items } => match items.as_ref() {
                Self::Union { .. } => write!(f, "({items})[]"),
                _ => write!(f, "{items}[]"),
            },
            Self::Record { name, fields } => match name {
                Some(name) => write!(f, "record {name}"),
                None => {
                    let names: Vec<&str> = fields.iter().map(|field| field.name.as_str()).collect();
                    write!(f, "record {{{}}}", names.join(", "))
                }
            },
            Self::Enum { name, symbols } => match name {
                Some(name) => write!(f, "enum {name}"),
                None => write!(f, "enum {{{}}}", symbols.join(", ")),
            },
            Self::Union { members } => {
                let members: Vec<String> = members.iter().map(ToString::to_string).collect();
                f.write_str(&members.join(" | "))
            }
        }
    }
}

/// Rules for [`TypeRules::compatible`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TypeRules {
    /// Allow `int → long → float → double`
    pub numeric_widening: bool,
}

impl Default for TypeRules {
    fn default() -> Self {
        Self {
            numeric_widening: true,
        }
    }
}

impl TypeRules {
    /// Whether `producer` values are acceptable where `consumer` is expected
    #[must_use]
    pub fn compatible(&self, producer: &TypeDescriptor, consumer: &TypeDescriptor) -> bool {
        use TypeDescriptor as T;
        match (producer, consumer) {
            (T::Any, _) | (_, T::Any) => true,
            (T::Union { members }, _) => members.iter().all(|m| self.compatible(m, consumer)),
            (_, T::Union { members }) => members.iter().any(|m| self.compatible(producer, m)),
            (T::Scalar { scalar: from }, T::Scalar { scalar: to }) => {
                from == to || (self.numeric_widening && from.widens_to(*to))
            }
            (T::Array { items: from }, T::Array { items: to }) => self.compatible(from, to),
            (T::Enum { symbols: from, .. }, T::Enum { symbols: to, .. }) => {
                from.iter().all(|symbol| to.contains(symbol))
            }
            (T::Enum { .. }, T::Scalar { scalar: ScalarType::String }) => true,
            (T::Record { fields: from, .. }, T::Record { fields: to, .. }) => to.iter().all(|wanted| {
                from.iter()
                    .find(|field| field.name == wanted.name)
                    .map_or(wanted.optional, |field| self.compatible(&field.ty, &wanted.ty))
            }),
            _ => false,
        }
    }

    /// [`compatible`](Self::compatible) with nullability
    ///
    /// A producer that may be `null` only feeds a consumer that accepts
    /// `null`; `Any` does not.
    #[must_use]
    pub fn accepts(&self, producer: &ParsedType, consumer: &ParsedType) -> bool {
        (consumer.optional || !producer.optional) && self.compatible(&producer.ty, &consumer.ty)
    }
}

/// [`TypeRules::compatible`] with default rules
///
/// `Any` matches in both directions: an `Any` producer feeds every
/// consumer and an `Any` consumer takes every producer. Only the optional
/// flag, checked by [`TypeRules::accepts`], still rejects `null`.
#[must_use]
pub fn type_compatible(producer: &TypeDescriptor, consumer: &TypeDescriptor) -> bool {
    TypeRules::default().compatible(producer, consumer)
}
