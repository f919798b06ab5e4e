//! Attribute declarations and their combination algebra.
//!
//! An [`Attribute`] records what a processor does with a named slot of a
//! context: it produces it ([`Status::Defined`]), it needs it
//! ([`Status::Required`]) or it reads it when present ([`Status::Optional`]).
//!
//! Declarations contributed by different processors are combined with
//! [`Attribute::merge`] (sequential composition, order matters) and
//! [`Attribute::solve`] (layering extensions, whichever side defines wins).
//!
//! # Example
//!
//! ```
//! use hermes_core::{Attribute, Status, TypeSet};
//!
//! let defined = Attribute::defines(TypeSet::of::<i64>());
//! let required = Attribute::requires(TypeSet::of::<i64>().with::<f64>());
//!
//! let merged = defined.merge(&required).unwrap();
//! assert_eq!(merged.status(), Status::Defined);
//! assert_eq!(merged.types(), &TypeSet::of::<i64>());
//! ```

use crate::error::{AttrError, AttrResult};
use std::any::{Any, TypeId};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::hash::{Hash, Hasher};

/// What a processor does with an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Status {
    /// The processor produces the attribute.
    Defined,
    /// The processor reads the attribute and it must exist.
    Required,
    /// The processor reads the attribute if it is present.
    Optional,
}

impl Status {
    /// Bit flag of the status, used when filtering resolvers.
    #[must_use]
    pub const fn flag(self) -> u8 {
        match self {
            Self::Defined => 1 << 1,
            Self::Required => 1 << 2,
            Self::Optional => 1 << 3,
        }
    }

    /// Returns the upper case status name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Defined => "DEFINED",
            Self::Required => "REQUIRED",
            Self::Optional => "OPTIONAL",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A value type accepted by an attribute.
///
/// Identity is the [`TypeId`]; the name is kept for reports.
#[derive(Clone, Copy)]
pub struct AttrType {
    id: TypeId,
    name: &'static str,
}

impl AttrType {
    /// Returns the attribute type for `T`.
    #[must_use]
    pub fn of<T: Any + Send + Sync>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// The type identifier.
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// The full type name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The type name with module paths stripped.
    pub fn short_name(&self) -> String {
        short_type_name(self.name)
    }
}

impl PartialEq for AttrType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for AttrType {}

impl Hash for AttrType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl PartialOrd for AttrType {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for AttrType {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name.cmp(other.name).then_with(|| self.id.cmp(&other.id))
    }
}

impl fmt::Debug for AttrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.short_name())
    }
}

impl fmt::Display for AttrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.short_name())
    }
}

/// Strips module paths from every path inside a type name.
pub(crate) fn short_type_name(name: &str) -> String {
    let mut short = String::with_capacity(name.len());
    let mut segment = String::new();
    let mut chars = name.chars().peekable();
    while let Some(c) = chars.next() {
        if c == ':' && chars.peek() == Some(&':') {
            chars.next();
            segment.clear();
        } else if c.is_alphanumeric() || c == '_' {
            segment.push(c);
        } else {
            short.push_str(&segment);
            segment.clear();
            short.push(c);
        }
    }
    short.push_str(&segment);
    short
}

/// An ordered set of [`AttrType`]s.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct TypeSet(BTreeSet<AttrType>);

impl TypeSet {
    /// Creates an empty type set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a type set holding `T`.
    #[must_use]
    pub fn of<T: Any + Send + Sync>() -> Self {
        Self::new().with::<T>()
    }

    /// Adds `T` to the set.
    #[must_use]
    pub fn with<T: Any + Send + Sync>(mut self) -> Self {
        self.0.insert(AttrType::of::<T>());
        self
    }

    /// Inserts a type.
    pub fn insert(&mut self, attr_type: AttrType) -> bool {
        self.0.insert(attr_type)
    }

    /// Checks whether the set accepts the type identifier.
    pub fn accepts(&self, id: TypeId) -> bool {
        self.0.iter().any(|t| t.id == id)
    }

    /// Returns the union of both sets.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        Self(self.0.union(&other.0).copied().collect())
    }

    /// Returns the intersection of both sets.
    #[must_use]
    pub fn intersection(&self, other: &Self) -> Self {
        Self(self.0.intersection(&other.0).copied().collect())
    }

    /// Checks whether every type of this set is also in `other`.
    pub fn is_subset(&self, other: &Self) -> bool {
        self.0.is_subset(&other.0)
    }

    /// Checks whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of types in the set.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterates the types in name order.
    pub fn iter(&self) -> impl Iterator<Item = &AttrType> {
        self.0.iter()
    }
}

impl FromIterator<AttrType> for TypeSet {
    fn from_iter<I: IntoIterator<Item = AttrType>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Debug for TypeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for TypeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (k, attr_type) in self.0.iter().enumerate() {
            if k > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{attr_type}")?;
        }
        f.write_str("]")
    }
}

/// Builds a [`TypeSet`] from a list of types.
///
/// ```
/// use hermes_core::{types, TypeSet};
///
/// assert_eq!(types![i64, f64], TypeSet::of::<i64>().with::<f64>());
/// ```
#[macro_export]
macro_rules! types {
    ($($t:ty),+ $(,)?) => {
        $crate::TypeSet::new()$(.with::<$t>())+
    };
}

/// Where an attribute declaration was placed: a location (processor or
/// context) and the attribute name it was declared under.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Usage {
    /// The declaring location.
    pub location: String,
    /// The attribute name at that location.
    pub attribute: String,
}

impl fmt::Display for Usage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} as '{}'", self.location, self.attribute)
    }
}

/// A statused, typed attribute declaration.
///
/// Combined declarations keep track of the types produced by defining
/// contributions (`defined`) and of every place the attribute was used.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    status: Status,
    types: TypeSet,
    defined: TypeSet,
    doc: Option<String>,
    conditional: bool,
    used_in: BTreeMap<Usage, Status>,
}

impl Attribute {
    fn new(status: Status, types: TypeSet) -> Self {
        let defined = if status == Status::Defined {
            types.clone()
        } else {
            TypeSet::new()
        };
        Self {
            status,
            types,
            defined,
            doc: None,
            conditional: false,
            used_in: BTreeMap::new(),
        }
    }

    /// Declares an attribute the processor produces.
    #[must_use]
    pub fn defines(types: TypeSet) -> Self {
        Self::new(Status::Defined, types)
    }

    /// Declares an attribute the processor produces only when it is not
    /// already present, so it also reads it.
    #[must_use]
    pub fn defines_if(types: TypeSet) -> Self {
        let mut attribute = Self::new(Status::Defined, types);
        attribute.conditional = true;
        attribute
    }

    /// Declares an attribute the processor needs.
    #[must_use]
    pub fn requires(types: TypeSet) -> Self {
        Self::new(Status::Required, types)
    }

    /// Declares an attribute the processor reads when present.
    #[must_use]
    pub fn optional(types: TypeSet) -> Self {
        Self::new(Status::Optional, types)
    }

    /// Attaches documentation.
    #[must_use]
    pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    /// The status of the declaration.
    pub fn status(&self) -> Status {
        self.status
    }

    /// Accepted value types.
    pub fn types(&self) -> &TypeSet {
        &self.types
    }

    /// Types produced by defining contributions.
    pub fn defined(&self) -> &TypeSet {
        &self.defined
    }

    /// Documentation, joined across contributions.
    pub fn doc(&self) -> Option<&str> {
        self.doc.as_deref()
    }

    /// Places where the attribute was declared, with their contribution status.
    pub fn used_in(&self) -> &BTreeMap<Usage, Status> {
        &self.used_in
    }

    /// Records the declaration site of this attribute.
    #[must_use]
    pub fn placed(mut self, location: impl Into<String>, attribute: impl Into<String>) -> Self {
        let status = if self.conditional {
            Status::Optional
        } else {
            self.status
        };
        self.used_in.insert(
            Usage {
                location: location.into(),
                attribute: attribute.into(),
            },
            status,
        );
        self
    }

    /// Validates the declaration on its own.
    pub fn validate(&self, name: &str) -> AttrResult<()> {
        if self.types.is_empty() {
            return Err(AttrError::NoTypes {
                name: name.to_string(),
            });
        }
        if !self.defined.is_subset(&self.types) {
            return Err(AttrError::UndeclaredDefinition {
                defined: self.defined.to_string(),
                types: self.types.to_string(),
            });
        }
        Ok(())
    }

    /// Merges this declaration with a declaration that comes after it.
    ///
    /// - a required attribute may not be defined afterwards;
    /// - two definitions accept the union of their types;
    /// - any other combination accepts the intersection, which may not be empty.
    pub fn merge(&self, other: &Self) -> AttrResult<Self> {
        let status = match (self.status, other.status) {
            (Status::Required, Status::Defined) => {
                return Err(AttrError::ImproperOrder {
                    required: self.to_string(),
                    defined: other.to_string(),
                })
            }
            (Status::Required, _) => Status::Required,
            (Status::Optional, status) => status,
            (Status::Defined, _) => Status::Defined,
        };
        let types = if self.status == Status::Defined && other.status == Status::Defined {
            self.types.union(&other.types)
        } else {
            self.types.intersection(&other.types)
        };
        if types.is_empty() {
            return Err(AttrError::IncompatibleTypes {
                left: self.types.to_string(),
                right: other.types.to_string(),
            });
        }

        let defined = self.defined.union(&other.defined);
        if !defined.is_subset(&types) {
            return Err(AttrError::UndeclaredDefinition {
                defined: defined.to_string(),
                types: types.to_string(),
            });
        }

        let doc = match (&self.doc, &other.doc) {
            (Some(first), Some(second)) if first != second => Some(format!("{first}\n{second}")),
            (Some(doc), _) | (None, Some(doc)) => Some(doc.clone()),
            (None, None) => None,
        };
        let mut used_in = self.used_in.clone();
        used_in.extend(other.used_in.iter().map(|(k, v)| (k.clone(), *v)));

        Ok(Self {
            status,
            types,
            defined,
            doc,
            conditional: self.conditional && other.conditional,
            used_in,
        })
    }

    /// Solves this declaration with another one; the defining side leads.
    pub fn solve(&self, other: &Self) -> AttrResult<Self> {
        if self.status == Status::Defined {
            self.merge(other)
        } else {
            other.merge(self)
        }
    }

    /// An attribute is available when nothing still requires it.
    pub fn is_available(&self) -> bool {
        self.status != Status::Required
    }

    /// An attribute is used when some contribution actually consumes it.
    pub fn is_used(&self) -> bool {
        if self.used_in.values().any(|status| *status == Status::Optional) {
            return true;
        }
        self.used_in.len() > 1 && self.used_in.values().any(|status| *status != Status::Defined)
    }

    /// Checks whether a value of the given type may be assigned.
    pub fn accepts(&self, id: TypeId) -> bool {
        self.types.accepts(id)
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.status, self.types)
    }
}
