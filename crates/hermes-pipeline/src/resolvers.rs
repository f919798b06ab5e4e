//! Resolvers: merged attribute declarations keyed by context and attribute.
//!
//! During assembly every processor contributes its declarations to three
//! resolver maps: the `sources` the processing will be executed with, the
//! `current` declarations of the processors themselves, and the
//! `extensions` that are needed at runtime without being part of the
//! primary contract.

use hermes_core::{
    AssemblyError, AssemblyResult, AttrResult, Attribute, ContextClass, ContextSpec,
    ProcessorError, ResolverError, Status,
};
use indexmap::{IndexMap, IndexSet};
use std::fmt;
use std::sync::Arc;

/// Attribute names indexed by context name.
pub type AttributeNames = IndexMap<String, IndexSet<String>>;

/// Named context declarations, as a processor or the server provides them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Contexts(IndexMap<String, ContextSpec>);

impl Contexts {
    /// Creates an empty declaration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a context under a name.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, spec: ContextSpec) -> Self {
        self.0.insert(name.into(), spec);
        self
    }

    /// Checks whether nothing is declared.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates the declared contexts.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &ContextSpec)> {
        self.0.iter()
    }

    /// The spec declared under the name.
    pub fn get(&self, name: &str) -> Option<&ContextSpec> {
        self.0.get(name)
    }
}

/// Whether a context name refers to a class rather than an object.
///
/// Class contexts are solved instead of merged since their declaration
/// order is irrelevant.
pub fn is_class_name(name: &str) -> bool {
    name.chars().next().is_some_and(char::is_uppercase)
}

/// Resolvers keyed by context name, then attribute name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resolvers {
    contexts: IndexMap<String, IndexMap<String, Attribute>>,
}

impl Resolvers {
    /// Creates empty resolvers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates resolvers for declared contexts, recording `location` as the
    /// place every attribute was declared.
    pub fn declare(location: &str, contexts: &Contexts) -> AssemblyResult<Self> {
        let mut resolvers = Self::new();
        for (name, spec) in contexts.iter() {
            spec.validate().map_err(|source| ProcessorError::InvalidContext {
                processor: location.to_string(),
                context: name.clone(),
                source,
            })?;
            let attributes = spec
                .attributes()
                .iter()
                .map(|(attr, attribute)| (attr.clone(), attribute.clone().placed(location, attr)))
                .collect();
            resolvers.contexts.insert(name.clone(), attributes);
        }
        Ok(resolvers)
    }

    /// Checks whether no context is present.
    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    /// The attributes of a context.
    pub fn context(&self, name: &str) -> Option<&IndexMap<String, Attribute>> {
        self.contexts.get(name)
    }

    /// A single resolver.
    pub fn get(&self, context: &str, attribute: &str) -> Option<&Attribute> {
        self.contexts.get(context)?.get(attribute)
    }

    /// Iterates contexts in insertion order.
    pub fn contexts(&self) -> impl Iterator<Item = (&String, &IndexMap<String, Attribute>)> {
        self.contexts.iter()
    }

    /// Replaces a whole context.
    pub fn insert_context(&mut self, name: impl Into<String>, attributes: IndexMap<String, Attribute>) {
        self.contexts.insert(name.into(), attributes);
    }

    /// Removes a whole context.
    pub fn remove_context(&mut self, name: &str) -> Option<IndexMap<String, Attribute>> {
        self.contexts.shift_remove(name)
    }

    /// Solves a single resolver into a context.
    pub fn add(&mut self, context: &str, attribute: &str, resolver: &Attribute) -> Result<(), ResolverError> {
        let target = self.contexts.entry(context.to_string()).or_default();
        let combined = match target.get(attribute) {
            None => resolver.clone(),
            Some(existing) => existing
                .solve(resolver)
                .map_err(|e| ResolverError::solve(context, attribute, e))?,
        };
        target.insert(attribute.to_string(), combined);
        Ok(())
    }

    /// Merges `other` into these resolvers, `other` coming after.
    ///
    /// Contexts named as classes are solved instead.
    pub fn merge(&mut self, other: &Resolvers) -> Result<(), ResolverError> {
        for (name, attributes) in &other.contexts {
            let target = self.contexts.entry(name.clone()).or_default();
            let class = is_class_name(name);
            for (attr, resolver) in attributes {
                let combined = match target.get(attr) {
                    None => resolver.clone(),
                    Some(existing) if class => existing
                        .solve(resolver)
                        .map_err(|e| ResolverError::solve(name, attr, e))?,
                    Some(existing) => existing
                        .merge(resolver)
                        .map_err(|e| ResolverError::merge(name, attr, e))?,
                };
                target.insert(attr.clone(), combined);
            }
        }
        Ok(())
    }

    /// Solves `other` into these resolvers.
    pub fn solve(&mut self, other: &Resolvers) -> Result<(), ResolverError> {
        for (name, attributes) in &other.contexts {
            let target = self.contexts.entry(name.clone()).or_default();
            for (attr, resolver) in attributes {
                let combined = match target.get(attr) {
                    None => resolver.clone(),
                    Some(existing) => existing
                        .solve(resolver)
                        .map_err(|e| ResolverError::solve(name, attr, e))?,
                };
                target.insert(attr.clone(), combined);
            }
        }
        Ok(())
    }

    /// Copies the named contexts.
    pub fn copy_contexts<S: AsRef<str>>(&self, names: &[S]) -> Resolvers {
        let contexts = names
            .iter()
            .filter_map(|name| {
                let name = name.as_ref();
                self.contexts.get(name).map(|attrs| (name.to_string(), attrs.clone()))
            })
            .collect();
        Resolvers { contexts }
    }

    /// Copies only the listed attributes.
    pub fn copy_attributes(&self, names: &AttributeNames) -> Resolvers {
        let mut copy = Resolvers::new();
        for (context, attributes) in &self.contexts {
            let Some(wanted) = names.get(context) else { continue };
            let selected: IndexMap<String, Attribute> = attributes
                .iter()
                .filter(|(attr, _)| wanted.contains(*attr))
                .map(|(attr, resolver)| (attr.clone(), resolver.clone()))
                .collect();
            if !selected.is_empty() {
                copy.contexts.insert(context.clone(), selected);
            }
        }
        copy
    }

    /// Removes and returns the named contexts.
    pub fn extract<S: AsRef<str>>(&mut self, names: &[S]) -> Resolvers {
        let contexts = names
            .iter()
            .filter_map(|name| {
                let name = name.as_ref();
                self.contexts.shift_remove(name).map(|attrs| (name.to_string(), attrs))
            })
            .collect();
        Resolvers { contexts }
    }

    /// Lists the attribute names per context.
    pub fn list_attributes(&self) -> AttributeNames {
        self.contexts
            .iter()
            .map(|(name, attributes)| (name.clone(), attributes.keys().cloned().collect()))
            .collect()
    }

    /// Checks whether any resolver is still required.
    pub fn has_unavailable(&self) -> bool {
        self.contexts
            .values()
            .flat_map(IndexMap::values)
            .any(|resolver| !resolver.is_available())
    }

    /// Describes every resolver that is still required.
    pub fn unavailable(&self) -> Vec<String> {
        self.describe(|resolver| !resolver.is_available())
    }

    /// Describes every defined resolver nobody consumes.
    pub fn unused(&self) -> Vec<String> {
        self.describe(|resolver| resolver.status() == Status::Defined && !resolver.is_used())
    }

    fn describe(&self, filter: impl Fn(&Attribute) -> bool) -> Vec<String> {
        let mut lines = Vec::new();
        for (context, attributes) in &self.contexts {
            for (attr, resolver) in attributes.iter().filter(|(_, r)| filter(r)) {
                let places: Vec<String> = resolver.used_in().keys().map(ToString::to_string).collect();
                lines.push(format!("{context}.{attr}: {resolver} used in {}", places.join(", ")));
            }
        }
        lines
    }

    /// Fails with the unavailable attributes, if any.
    pub fn check_available(&self, scope: &'static str, name: &str) -> AssemblyResult<()> {
        if self.has_unavailable() {
            return Err(AssemblyError::unavailable(scope, name, self.unavailable()));
        }
        Ok(())
    }

    /// Generates one object context class per context.
    pub fn generate(&self) -> AttrResult<IndexMap<String, Arc<ContextClass>>> {
        self.contexts
            .iter()
            .map(|(name, attributes)| Ok((name.clone(), ContextClass::generate(name.clone(), attributes)?)))
            .collect()
    }
}

impl fmt::Display for Resolvers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (context, attributes) in &self.contexts {
            for (attr, resolver) in attributes {
                writeln!(f, "{context}.{attr}: {resolver}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hermes_core::types;

    fn declare(location: &str, spec: ContextSpec) -> Resolvers {
        Resolvers::declare(location, &Contexts::new().with("ctx", spec)).unwrap()
    }

    #[test]
    fn test_merge_in_order() {
        let mut current = declare("producer", ContextSpec::new("Ctx").defines::<i64>("a"));
        current
            .merge(&declare("consumer", ContextSpec::new("Ctx").requires::<i64>("a")))
            .unwrap();
        let resolver = current.get("ctx", "a").unwrap();
        assert_eq!(resolver.status(), Status::Defined);
        assert!(resolver.is_used());
        assert!(!current.has_unavailable());
    }

    #[test]
    fn test_merge_wrong_order_names_attribute() {
        let mut current = declare("consumer", ContextSpec::new("Ctx").requires::<i64>("a"));
        let error = current
            .merge(&declare("producer", ContextSpec::new("Ctx").defines::<i64>("a")))
            .unwrap_err();
        assert!(error.to_string().contains("'ctx.a'"));
    }

    #[test]
    fn test_class_contexts_are_solved() {
        let spec = |s: ContextSpec| Resolvers::declare("p", &Contexts::new().with("Ctx", s)).unwrap();
        let mut current = spec(ContextSpec::new("Ctx").requires::<i64>("a"));
        current.merge(&spec(ContextSpec::new("Ctx").defines::<i64>("a"))).unwrap();
        assert_eq!(current.get("Ctx", "a").unwrap().status(), Status::Defined);
    }

    #[test]
    fn test_unavailable_lists_location() {
        let current = declare("reader", ContextSpec::new("Ctx").requires::<i64>("a"));
        let lines = current.unavailable();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("ctx.a: REQUIRED[i64]"));
        assert!(lines[0].contains("reader"));
        let error = current.check_available("Assembly", "main").unwrap_err();
        assert!(error.to_string().contains("ctx.a"));
    }

    #[test]
    fn test_copy_and_extract() {
        let mut resolvers = Resolvers::declare(
            "p",
            &Contexts::new()
                .with("request", ContextSpec::new("Request").defines::<String>("uri").defines::<String>("method"))
                .with("response", ContextSpec::new("Response").defines::<u16>("status")),
        )
        .unwrap();

        let mut names = AttributeNames::new();
        names.insert("request".into(), ["uri".to_string()].into_iter().collect());
        let copied = resolvers.copy_attributes(&names);
        assert!(copied.get("request", "uri").is_some());
        assert!(copied.get("request", "method").is_none());
        assert!(copied.context("response").is_none());

        let extracted = resolvers.extract(&["response"]);
        assert!(extracted.get("response", "status").is_some());
        assert!(resolvers.context("response").is_none());
        assert_eq!(resolvers.copy_contexts(&["request"]).list_attributes()["request"].len(), 2);
    }

    #[test]
    fn test_generate_classes() {
        let resolvers = declare(
            "p",
            ContextSpec::new("Ctx").with("a", Attribute::defines(types![i64, String])),
        );
        let classes = resolvers.generate().unwrap();
        let class = &classes["ctx"];
        assert_eq!(class.name(), "ctx");
        assert_eq!(class.descriptor("a").unwrap().types(), &types![i64, String]);
    }

    #[test]
    fn test_declare_rejects_empty_types() {
        let spec = ContextSpec::new("Ctx").with("a", Attribute::defines(hermes_core::TypeSet::new()));
        let error = Resolvers::declare("broken", &Contexts::new().with("ctx", spec)).unwrap_err();
        assert!(matches!(error, AssemblyError::Processor(ProcessorError::InvalidContext { .. })));
    }
}
