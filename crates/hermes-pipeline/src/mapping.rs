//! Context renaming between an inner and an outer naming scheme.
//!
//! A mapping pairs an inner context name with one or more outer names. At
//! build time resolvers are *structured* into inner names and afterwards
//! *restructured* back; at runtime the chain argument bag is swapped the
//! same way.

use crate::execution::Arg;
use crate::resolvers::Resolvers;
use hermes_core::ResolverError;
use indexmap::IndexMap;

/// Pairs of inner and outer context names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Mapping {
    inner_to_outer: IndexMap<String, Vec<String>>,
    outer_to_inner: IndexMap<String, Vec<String>>,
}

impl Mapping {
    /// Creates an empty mapping.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a mapping from `(inner, outer)` pairs.
    #[must_use]
    pub fn from_pairs(pairs: &[(&str, &str)]) -> Self {
        pairs
            .iter()
            .fold(Self::new(), |mapping, (inner, outer)| mapping.map(*inner, *outer))
    }

    /// Maps an inner name onto an outer one.
    #[must_use]
    pub fn map(mut self, inner: impl Into<String>, outer: impl Into<String>) -> Self {
        let (inner, outer) = (inner.into(), outer.into());
        let outers = self.inner_to_outer.entry(inner.clone()).or_default();
        if !outers.contains(&outer) {
            outers.push(outer.clone());
        }
        let inners = self.outer_to_inner.entry(outer).or_default();
        if !inners.contains(&inner) {
            inners.push(inner);
        }
        self
    }

    /// Checks whether nothing is mapped.
    pub fn is_empty(&self) -> bool {
        self.inner_to_outer.is_empty()
    }

    /// The outer names of an inner context.
    pub fn outer(&self, inner: &str) -> &[String] {
        self.inner_to_outer.get(inner).map_or(&[], Vec::as_slice)
    }

    /// Renames outer resolvers into inner ones, dropping unmapped contexts.
    ///
    /// Outer contexts mapped to the same inner name are solved together.
    pub fn structure(&self, resolvers: &Resolvers) -> Result<Resolvers, ResolverError> {
        let mut structured = Resolvers::new();
        for (outer, attributes) in resolvers.contexts() {
            let Some(inners) = self.outer_to_inner.get(outer) else {
                continue;
            };
            for inner in inners {
                for (attr, resolver) in attributes {
                    structured.add(inner, attr, resolver)?;
                }
            }
        }
        Ok(structured)
    }

    /// Solves inner resolvers back into `target`.
    ///
    /// An inner attribute goes to every outer context that already declares
    /// it, or to the first outer context when none does.
    pub fn restructure(&self, target: &mut Resolvers, structured: &Resolvers) -> Result<(), ResolverError> {
        let mut back = Resolvers::new();
        for (inner, attributes) in structured.contexts() {
            let outers = self.outer(inner);
            let Some(first) = outers.first() else {
                continue;
            };
            for (attr, resolver) in attributes {
                let declaring: Vec<&String> = outers
                    .iter()
                    .filter(|outer| target.get(outer, attr).is_some())
                    .collect();
                if declaring.is_empty() {
                    back.add(first, attr, resolver)?;
                } else {
                    for outer in declaring {
                        back.add(outer, attr, resolver)?;
                    }
                }
            }
        }
        target.solve(&back)
    }

    /// Builds the inner argument bag out of the outer one.
    ///
    /// Only mapped names are carried over.
    pub fn rename_arg(&self, outer: &Arg) -> Arg {
        let mut inner = Arg::new();
        for (name, outers) in &self.inner_to_outer {
            if let Some(value) = outers.iter().find_map(|outer_name| outer.get(outer_name)) {
                inner.insert(name.clone(), value.clone());
            }
        }
        inner
    }

    /// Copies values the inner calls added back into the outer bag.
    pub fn restore_arg(&self, outer: &mut Arg, inner: &Arg) {
        for (name, value) in inner.iter() {
            for outer_name in self.outer(name) {
                if !outer.contains(outer_name) {
                    outer.insert(outer_name.clone(), value.clone());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolvers::Contexts;
    use hermes_core::{ContextSpec, Status};

    fn declared(location: &str, contexts: Contexts) -> Resolvers {
        Resolvers::declare(location, &contexts).unwrap()
    }

    #[test]
    fn test_structure_renames_and_drops() {
        let outer = declared(
            "outer",
            Contexts::new()
                .with("solicitation", ContextSpec::new("Solicitation").defines::<String>("uri"))
                .with("other", ContextSpec::new("Other").defines::<i64>("count")),
        );
        let mapping = Mapping::from_pairs(&[("request", "solicitation")]);

        let structured = mapping.structure(&outer).unwrap();
        assert!(structured.get("request", "uri").is_some());
        assert!(structured.context("solicitation").is_none());
        assert!(structured.context("other").is_none());
    }

    #[test]
    fn test_restructure_prefers_declaring_context() {
        let mut target = declared(
            "outer",
            Contexts::new()
                .with("first", ContextSpec::new("First").defines::<i64>("count"))
                .with("second", ContextSpec::new("Second").defines::<String>("name")),
        );
        let mapping = Mapping::new().map("joined", "first").map("joined", "second");
        let inner = declared(
            "inner",
            Contexts::new().with(
                "joined",
                ContextSpec::new("Joined").optional::<String>("name").defines::<bool>("flag"),
            ),
        );

        mapping.restructure(&mut target, &inner).unwrap();
        assert_eq!(target.get("second", "name").unwrap().status(), Status::Defined);
        assert!(target.get("first", "name").is_none());
        assert!(target.get("first", "flag").is_some());
        assert!(target.get("second", "flag").is_none());
    }

    #[test]
    fn test_arg_swap() {
        let mapping = Mapping::from_pairs(&[("request", "solicitation")]);
        let outer = Arg::new().with_value("solicitation", 1_i64).with_value("unrelated", 2_i64);

        let mut inner = mapping.rename_arg(&outer);
        assert_eq!(inner.value::<i64>("request").as_deref(), Some(&1));
        assert!(!inner.contains("unrelated"));

        inner.remove("request");
        inner.insert("request", crate::execution::ArgValue::Value(std::sync::Arc::new(3_i64)));
        let mut restored = Arg::new();
        mapping.restore_arg(&mut restored, &inner);
        assert_eq!(restored.value::<i64>("solicitation").as_deref(), Some(&3));
    }
}
