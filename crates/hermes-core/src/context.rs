//! Context specifications and the runtime objects generated from them.
//!
//! Processors declare a [`ContextSpec`] per context they touch. Specs are
//! definition-only: they are folded into resolvers during assembly and never
//! instantiated. Once an assembly is proven complete, a [`ContextClass`] is
//! generated per context name from the merged declarations, and each request
//! flight creates fresh [`ContextObject`]s from those classes.

use crate::attribute::{short_type_name, Attribute, TypeSet};
use crate::error::{AttrError, AttrResult};
use indexmap::IndexMap;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::trace;

/// Definition-only context: a named record of attribute declarations.
///
/// # Example
///
/// ```
/// use hermes_core::{ContextSpec, Status};
///
/// let spec = ContextSpec::new("Request")
///     .requires::<String>("uri")
///     .defines::<u16>("status");
///
/// assert_eq!(spec.attribute("uri").unwrap().status(), Status::Required);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ContextSpec {
    name: String,
    attributes: IndexMap<String, Attribute>,
}

impl ContextSpec {
    /// Creates an empty context spec.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: IndexMap::new(),
        }
    }

    /// Declares (or overrides) an attribute.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, attribute: Attribute) -> Self {
        self.attributes.insert(name.into(), attribute);
        self
    }

    /// Declares an attribute of type `T` this context produces.
    #[must_use]
    pub fn defines<T: Any + Send + Sync>(self, name: impl Into<String>) -> Self {
        self.with(name, Attribute::defines(TypeSet::of::<T>()))
    }

    /// Declares an attribute of type `T` produced only when absent.
    #[must_use]
    pub fn defines_if<T: Any + Send + Sync>(self, name: impl Into<String>) -> Self {
        self.with(name, Attribute::defines_if(TypeSet::of::<T>()))
    }

    /// Declares an attribute of type `T` this context needs.
    #[must_use]
    pub fn requires<T: Any + Send + Sync>(self, name: impl Into<String>) -> Self {
        self.with(name, Attribute::requires(TypeSet::of::<T>()))
    }

    /// Declares an attribute of type `T` read when present.
    #[must_use]
    pub fn optional<T: Any + Send + Sync>(self, name: impl Into<String>) -> Self {
        self.with(name, Attribute::optional(TypeSet::of::<T>()))
    }

    /// Inherits the attributes of `parent`.
    ///
    /// Attributes already declared on this spec override the inherited ones,
    /// provided their type sets intersect.
    pub fn inherit(mut self, parent: &ContextSpec) -> AttrResult<Self> {
        let mut inherited = IndexMap::with_capacity(parent.attributes.len() + self.attributes.len());
        for (name, attribute) in &parent.attributes {
            match self.attributes.shift_remove(name) {
                Some(own) => {
                    if own.types().intersection(attribute.types()).is_empty() {
                        return Err(AttrError::redeclared(
                            &self.name,
                            name,
                            format!("{own} does not fit inherited {attribute}"),
                        ));
                    }
                    inherited.insert(name.clone(), own);
                }
                None => {
                    inherited.insert(name.clone(), attribute.clone());
                }
            }
        }
        inherited.extend(self.attributes);
        self.attributes = inherited;
        Ok(self)
    }

    /// Builds a spec from several parents, folded left to right.
    pub fn derive(name: impl Into<String>, parents: &[&ContextSpec]) -> AttrResult<Self> {
        parents
            .iter()
            .try_fold(Self::new(name), |spec, parent| spec.inherit(parent))
    }

    /// The context name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The declared attribute.
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }

    /// All declared attributes in declaration order.
    pub fn attributes(&self) -> &IndexMap<String, Attribute> {
        &self.attributes
    }

    /// Checks every declaration.
    pub fn validate(&self) -> AttrResult<()> {
        self.attributes
            .iter()
            .try_for_each(|(name, attribute)| attribute.validate(name))
    }
}

/// The runtime descriptor of an object context attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct Descriptor {
    name: String,
    types: TypeSet,
    doc: Option<String>,
}

impl Descriptor {
    /// The attribute name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Accepted value types.
    pub fn types(&self) -> &TypeSet {
        &self.types
    }

    /// Documentation of the attribute.
    pub fn doc(&self) -> Option<&str> {
        self.doc.as_deref()
    }
}

/// A generated, instantiable context class.
#[derive(Debug, PartialEq)]
pub struct ContextClass {
    name: String,
    descriptors: IndexMap<String, Descriptor>,
}

impl ContextClass {
    /// Generates a class from merged attribute declarations.
    ///
    /// Fails if any attribute is still required.
    pub fn generate<'a, I>(name: impl Into<String>, attributes: I) -> AttrResult<Arc<Self>>
    where
        I: IntoIterator<Item = (&'a String, &'a Attribute)>,
    {
        let name = name.into();
        let mut descriptors = IndexMap::new();
        for (attr_name, attribute) in attributes {
            if !attribute.is_available() {
                return Err(AttrError::RequiredForObject {
                    context: name,
                    name: attr_name.clone(),
                });
            }
            attribute.validate(attr_name)?;
            descriptors.insert(
                attr_name.clone(),
                Descriptor {
                    name: attr_name.clone(),
                    types: attribute.types().clone(),
                    doc: attribute.doc().map(str::to_string),
                },
            );
        }
        trace!(context = %name, attributes = descriptors.len(), "Context class generated");
        Ok(Arc::new(Self { name, descriptors }))
    }

    /// Creates a fresh object with nothing set.
    pub fn create(self: &Arc<Self>) -> ContextObject {
        ContextObject {
            class: Arc::clone(self),
            values: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// The class name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The descriptor of the attribute.
    pub fn descriptor(&self, name: &str) -> Option<&Descriptor> {
        self.descriptors.get(name)
    }

    /// All descriptors in declaration order.
    pub fn descriptors(&self) -> impl Iterator<Item = &Descriptor> {
        self.descriptors.values()
    }

    /// Checks whether the class declares the attribute.
    pub fn declares(&self, name: &str) -> bool {
        self.descriptors.contains_key(name)
    }
}

type Slot = Option<Arc<dyn Any + Send + Sync>>;

/// A context instance.
///
/// Cloning a `ContextObject` yields another handle on the same values, which
/// is how branches share work with the enclosing flight. Reading an unset
/// attribute yields `None`; assigning `None` through [`ContextObject::set_none`]
/// still counts as set.
#[derive(Clone)]
pub struct ContextObject {
    class: Arc<ContextClass>,
    values: Arc<RwLock<HashMap<String, Slot>>>,
}

impl ContextObject {
    /// The class of this object.
    pub fn class(&self) -> &Arc<ContextClass> {
        &self.class
    }

    /// Checks whether both handles refer to the same object.
    pub fn same(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.values, &other.values)
    }

    fn descriptor(&self, name: &str) -> AttrResult<&Descriptor> {
        self.class
            .descriptor(name)
            .ok_or_else(|| AttrError::unknown(&self.class.name, name))
    }

    fn check(&self, name: &str, id: TypeId, actual: &'static str) -> AttrResult<()> {
        let descriptor = self.descriptor(name)?;
        if descriptor.types.accepts(id) {
            Ok(())
        } else {
            Err(AttrError::InvalidValue {
                context: self.class.name.clone(),
                name: name.to_string(),
                expected: descriptor.types.to_string(),
                actual: short_type_name(actual),
            })
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Slot>> {
        self.values.read()
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Slot>> {
        self.values.write()
    }

    /// Checks whether the attribute was assigned, including to `None`.
    pub fn contains(&self, name: &str) -> bool {
        self.read().contains_key(name)
    }

    /// Checks whether the attribute holds a value.
    pub fn has_value(&self, name: &str) -> bool {
        matches!(self.read().get(name), Some(Some(_)))
    }

    /// Reads a cloned value, `None` when unset, assigned `None` or of another type.
    pub fn get<T: Any + Clone + Send + Sync>(&self, name: &str) -> Option<T> {
        self.get_arc::<T>(name).map(|value| (*value).clone())
    }

    /// Reads a shared value.
    pub fn get_arc<T: Any + Send + Sync>(&self, name: &str) -> Option<Arc<T>> {
        let slot = self.read().get(name).cloned().flatten()?;
        slot.downcast::<T>().ok()
    }

    /// Assigns a value, type-checked against the attribute's descriptor.
    pub fn set<T: Any + Send + Sync>(&self, name: &str, value: T) -> AttrResult<()> {
        self.check(name, TypeId::of::<T>(), std::any::type_name::<T>())?;
        self.write().insert(name.to_string(), Some(Arc::new(value)));
        Ok(())
    }

    /// Assigns the explicit absence of a value.
    pub fn set_none(&self, name: &str) -> AttrResult<()> {
        self.descriptor(name)?;
        self.write().insert(name.to_string(), None);
        Ok(())
    }

    /// Removes the attribute, returning it to the unset state.
    pub fn unset(&self, name: &str) -> bool {
        self.write().remove(name).is_some()
    }

    /// Takes a value out, leaving the attribute unset.
    ///
    /// Returns `None` if the value is shared with another reader.
    pub fn take<T: Any + Send + Sync>(&self, name: &str) -> Option<T> {
        let slot = {
            let mut values = self.write();
            if !matches!(values.get(name), Some(Some(value)) if value.is::<T>()) {
                return None;
            }
            values.remove(name).flatten()?
        };
        slot.downcast::<T>().ok().and_then(|value| Arc::try_unwrap(value).ok())
    }

    /// Updates a value in place, inserting the default first when unset.
    pub fn update<T, R>(&self, name: &str, f: impl FnOnce(&mut T) -> R) -> AttrResult<R>
    where
        T: Any + Clone + Default + Send + Sync,
    {
        self.check(name, TypeId::of::<T>(), std::any::type_name::<T>())?;
        let mut values = self.write();
        let mut value: T = values
            .get(name)
            .cloned()
            .flatten()
            .and_then(|slot| slot.downcast::<T>().ok())
            .map(|value| (*value).clone())
            .unwrap_or_default();
        let result = f(&mut value);
        values.insert(name.to_string(), Some(Arc::new(value)));
        Ok(result)
    }

    /// Copies every attribute set on `other` that this object declares.
    pub fn push_from(&self, other: &ContextObject) {
        if self.same(other) {
            return;
        }
        let source: Vec<(String, Slot)> = other
            .read()
            .iter()
            .filter(|(name, _)| self.class.declares(name))
            .map(|(name, slot)| (name.clone(), slot.clone()))
            .collect();
        self.write().extend(source);
    }

    /// Copies the attributes set on `other` that this object declares but
    /// has not set yet.
    pub fn fill_from(&self, other: &ContextObject) {
        if self.same(other) {
            return;
        }
        let source: Vec<(String, Slot)> = other
            .read()
            .iter()
            .filter(|(name, _)| self.class.declares(name))
            .map(|(name, slot)| (name.clone(), slot.clone()))
            .collect();
        let mut values = self.write();
        for (name, slot) in source {
            values.entry(name).or_insert(slot);
        }
    }

    /// Names of the attributes currently set.
    pub fn set_attributes(&self) -> Vec<String> {
        let values = self.read();
        self.class
            .descriptors
            .keys()
            .filter(|name| values.contains_key(*name))
            .cloned()
            .collect()
    }
}

impl fmt::Debug for ContextObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextObject")
            .field("class", &self.class.name)
            .field("set", &self.set_attributes())
            .finish()
    }
}

impl fmt::Display for ContextObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.class.name, self.set_attributes().join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::Status;
    use crate::types;

    fn class() -> Arc<ContextClass> {
        let spec = ContextSpec::new("Data")
            .defines::<i64>("count")
            .defines::<String>("name")
            .with("mixed", Attribute::defines(types![i64, String]));
        ContextClass::generate("Data", spec.attributes()).unwrap()
    }

    #[test]
    fn test_contains_tracks_assignment() {
        let object = class().create();
        assert!(!object.contains("count"));
        assert_eq!(object.get::<i64>("count"), None);

        object.set_none("count").unwrap();
        assert!(object.contains("count"));
        assert!(!object.has_value("count"));
        assert_eq!(object.get::<i64>("count"), None);

        object.set("count", 3_i64).unwrap();
        assert_eq!(object.get::<i64>("count"), Some(3));
        assert!(object.unset("count"));
        assert!(!object.contains("count"));
    }

    #[test]
    fn test_set_is_type_checked() {
        let object = class().create();
        let error = object.set("count", "three".to_string()).unwrap_err();
        assert!(matches!(error, AttrError::InvalidValue { .. }));
        object.set("mixed", "text".to_string()).unwrap();
        object.set("mixed", 7_i64).unwrap();
        assert!(matches!(
            object.set("missing", 1_i64),
            Err(AttrError::Unknown { .. })
        ));
    }

    #[test]
    fn test_clones_share_values() {
        let object = class().create();
        let other = object.clone();
        other.set("name", "shared".to_string()).unwrap();
        assert_eq!(object.get::<String>("name").as_deref(), Some("shared"));
        assert!(object.same(&other));
        assert!(!object.same(&class().create()));
    }

    #[test]
    fn test_update_and_take() {
        let spec = ContextSpec::new("Bag").defines::<Vec<String>>("items");
        let object = ContextClass::generate("Bag", spec.attributes()).unwrap().create();
        object.update("items", |items: &mut Vec<String>| items.push("a".into())).unwrap();
        object.update("items", |items: &mut Vec<String>| items.push("b".into())).unwrap();
        assert_eq!(object.take::<Vec<String>>("items"), Some(vec!["a".into(), "b".into()]));
        assert!(!object.contains("items"));
    }

    #[test]
    fn test_required_cannot_generate() {
        let spec = ContextSpec::new("Data").requires::<i64>("count");
        let error = ContextClass::generate("Data", spec.attributes()).unwrap_err();
        assert!(matches!(error, AttrError::RequiredForObject { .. }));
    }

    #[test]
    fn test_inheritance_folds_parents() {
        let base = ContextSpec::new("Base").defines::<String>("uri").optional::<i64>("page");
        let extra = ContextSpec::new("Extra").requires::<bool>("flag");
        let derived = ContextSpec::derive("Derived", &[&base, &extra]).unwrap();

        let names: Vec<&str> = derived.attributes().keys().map(String::as_str).collect();
        assert_eq!(names, vec!["uri", "page", "flag"]);
        assert_eq!(derived.attribute("flag").unwrap().status(), Status::Required);
    }

    #[test]
    fn test_inheritance_override_must_be_compatible() {
        let base = ContextSpec::new("Base").defines::<String>("uri");
        let compatible = ContextSpec::new("Child").requires::<String>("uri").inherit(&base).unwrap();
        assert_eq!(compatible.attribute("uri").unwrap().status(), Status::Required);

        let error = ContextSpec::new("Child").requires::<i64>("uri").inherit(&base).unwrap_err();
        assert!(matches!(error, AttrError::Redeclared { .. }));
    }

    #[test]
    fn test_push_from_copies_declared() {
        let source = class().create();
        source.set("count", 1_i64).unwrap();
        source.set_none("name").unwrap();

        let spec = ContextSpec::new("Target").defines::<i64>("count");
        let target = ContextClass::generate("Target", spec.attributes()).unwrap().create();
        target.push_from(&source);

        assert_eq!(target.get::<i64>("count"), Some(1));
        assert!(!target.contains("name"));
        assert_eq!(target.to_string(), "Target(count)");
    }

    #[test]
    fn test_fill_from_keeps_existing() {
        let first = class().create();
        first.set("count", 1_i64).unwrap();
        let second = class().create();
        second.set("count", 2_i64).unwrap();
        second.set("name", "second".to_string()).unwrap();

        first.fill_from(&second);
        assert_eq!(first.get::<i64>("count"), Some(1));
        assert_eq!(first.get::<String>("name").as_deref(), Some("second"));
    }
}
