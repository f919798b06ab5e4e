//! Sub-assemblies owned by branching processors.
//!
//! Every branch registers its assembly into fresh `current` and
//! `extensions` resolvers, then decides how much of the result leaks into
//! the enclosing assembly:
//!
//! | Branch | Sources | Leaks into the parent |
//! |---|---|---|
//! | [`Routing`] | parent sources | everything it needs from the sources |
//! | [`Using`] | named parent contexts plus its own | extensions of the named contexts |
//! | [`Included`] | parent sources | all current declarations |
//!
//! [`Combine`] wraps another branch under a context renaming.

use crate::assembly::Assembly;
use crate::execution::{BoxedCall, Processing};
use crate::mapping::Mapping;
use crate::processor::Registry;
use crate::resolvers::{Contexts, Resolvers};
use hermes_core::AssemblyResult;
use indexmap::IndexMap;

/// A sub-assembly of a branching processor.
pub trait Branch: Send + Sync + 'static {
    /// Name used in reports and error locations.
    fn name(&self) -> &str;

    /// Registers the sub-assembly, `processor` holding the declarations of
    /// the owning processor.
    fn process(&self, processor: &Resolvers, registry: &mut Registry<'_>) -> AssemblyResult<Processing>;
}

fn register(
    assembly: &Assembly,
    sources: &Resolvers,
    current: &mut Resolvers,
    extensions: &mut Resolvers,
    registry: &mut Registry<'_>,
    report: &str,
) -> AssemblyResult<Vec<BoxedCall>> {
    let mut calls = Vec::new();
    let mut sub = Registry {
        sources,
        current,
        extensions,
        calls: &mut calls,
        report: registry.report.open(report),
    };
    assembly.register_all(&mut sub)?;
    Ok(calls)
}

/// Executes an assembly over the same sources as its parent.
///
/// A merged routing shares the parent contexts: its declarations end up in
/// the parent extensions and the processing generates no classes. An
/// unmerged one generates its own contexts.
pub struct Routing {
    assembly: Assembly,
    merged: bool,
}

impl Routing {
    /// Creates a merged routing.
    #[must_use]
    pub fn new(assembly: Assembly) -> Self {
        Self {
            assembly,
            merged: true,
        }
    }

    /// Creates a routing with its own contexts.
    #[must_use]
    pub fn unmerged(assembly: Assembly) -> Self {
        Self {
            assembly,
            merged: false,
        }
    }
}

impl Branch for Routing {
    fn name(&self) -> &str {
        self.assembly.name()
    }

    fn process(&self, processor: &Resolvers, registry: &mut Registry<'_>) -> AssemblyResult<Processing> {
        let report = format!("Routing '{}'", self.name());
        let mut current = Resolvers::new();
        let mut extensions = Resolvers::new();
        let calls = register(
            &self.assembly,
            registry.sources,
            &mut current,
            &mut extensions,
            registry,
            &report,
        )?;

        current.solve(processor)?;
        registry
            .current
            .merge(&current.copy_attributes(&registry.sources.list_attributes()))?;
        current.solve(registry.sources)?;
        current.check_available("Routing", self.name())?;
        current.solve(&extensions)?;

        if self.merged {
            registry.extensions.merge(&current)?;
            return Ok(Processing::new(calls, IndexMap::new()));
        }
        registry.report.open(&report).add(&current);
        Ok(Processing::new(calls, current.generate()?))
    }
}

/// Executes an assembly over its own contexts, optionally seeded with some
/// of the parent contexts.
pub struct Using {
    assembly: Assembly,
    current: Vec<String>,
    contexts: Contexts,
}

impl Using {
    /// Creates a branch that shares nothing with its parent.
    #[must_use]
    pub fn new(assembly: Assembly) -> Self {
        Self {
            assembly,
            current: Vec::new(),
            contexts: Contexts::new(),
        }
    }

    /// Shares a parent context.
    #[must_use]
    pub fn current(mut self, name: impl Into<String>) -> Self {
        self.current.push(name.into());
        self
    }

    /// Provides a context of its own.
    #[must_use]
    pub fn context(mut self, name: impl Into<String>, spec: hermes_core::ContextSpec) -> Self {
        self.contexts = self.contexts.with(name, spec);
        self
    }
}

impl Branch for Using {
    fn name(&self) -> &str {
        self.assembly.name()
    }

    fn process(&self, processor: &Resolvers, registry: &mut Registry<'_>) -> AssemblyResult<Processing> {
        registry.current.merge(processor)?;
        let report = format!("Using '{}'", self.name());
        let declared = Resolvers::declare(&report, &self.contexts)?;

        let shared = !self.current.is_empty();
        let (sources, mut current) = if shared {
            let mut sources = registry.sources.copy_contexts(&self.current);
            sources.merge(&declared)?;
            (sources, registry.current.copy_contexts(&self.current))
        } else {
            (declared, Resolvers::new())
        };
        let mut extensions = Resolvers::new();
        let calls = register(
            &self.assembly,
            &sources,
            &mut current,
            &mut extensions,
            registry,
            &report,
        )?;

        current.solve(&sources)?;
        current.check_available("Using", self.name())?;
        current.solve(&extensions)?;

        if shared {
            let names = registry.current.list_attributes();
            registry
                .extensions
                .merge(&current.copy_contexts(&self.current).copy_attributes(&names))?;
        }
        registry.report.open(&report).add(&current);
        Ok(Processing::new(calls, current.generate()?))
    }
}

/// Merges an assembly into its parent, optionally generating contexts for
/// the calls that use some of them privately.
pub struct Included {
    assembly: Assembly,
    using: Contexts,
}

impl Included {
    /// Creates an included branch.
    #[must_use]
    pub fn new(assembly: Assembly) -> Self {
        Self {
            assembly,
            using: Contexts::new(),
        }
    }

    /// Provides a private context that is not merged into the parent.
    #[must_use]
    pub fn using(mut self, name: impl Into<String>, spec: hermes_core::ContextSpec) -> Self {
        self.using = self.using.with(name, spec);
        self
    }
}

impl Branch for Included {
    fn name(&self) -> &str {
        self.assembly.name()
    }

    fn process(&self, processor: &Resolvers, registry: &mut Registry<'_>) -> AssemblyResult<Processing> {
        let report = format!("Included '{}'", self.name());
        let mut current = Resolvers::new();
        let mut extensions = Resolvers::new();
        let calls = register(
            &self.assembly,
            registry.sources,
            &mut current,
            &mut extensions,
            registry,
            &report,
        )?;

        let contexts = if self.using.is_empty() {
            IndexMap::new()
        } else {
            let names: Vec<&String> = self.using.iter().map(|(name, _)| name).collect();
            let mut private = current.extract(&names);
            private.solve(&Resolvers::declare(&report, &self.using)?)?;
            private.check_available("Included", self.name())?;
            private.solve(&extensions.extract(&names))?;
            registry.report.open(&report).add(&private);
            private.generate()?
        };

        current.solve(processor)?;
        registry.current.merge(&current)?;
        registry.extensions.solve(&extensions)?;
        Ok(Processing::new(calls, contexts))
    }
}

/// Runs another branch under a context renaming.
pub struct Combine {
    branch: Box<dyn Branch>,
    mapping: Mapping,
}

impl Combine {
    /// Wraps the branch, `pairs` being `(inner, outer)` context names.
    #[must_use]
    pub fn new(branch: impl Branch, pairs: &[(&str, &str)]) -> Self {
        Self {
            branch: Box::new(branch),
            mapping: Mapping::from_pairs(pairs),
        }
    }
}

impl Branch for Combine {
    fn name(&self) -> &str {
        self.branch.name()
    }

    fn process(&self, processor: &Resolvers, registry: &mut Registry<'_>) -> AssemblyResult<Processing> {
        registry.current.merge(processor)?;
        let inner_processor = self.mapping.structure(processor)?;
        let sources = self.mapping.structure(registry.sources)?;
        let mut current = self.mapping.structure(registry.current)?;
        let mut extensions = self.mapping.structure(registry.extensions)?;

        let processing = {
            let mut inner = Registry {
                sources: &sources,
                current: &mut current,
                extensions: &mut extensions,
                calls: &mut *registry.calls,
                report: &mut *registry.report,
            };
            self.branch.process(&inner_processor, &mut inner)?
        };

        self.mapping.restructure(registry.current, &current)?;
        self.mapping.restructure(registry.extensions, &extensions)?;
        Ok(processing)
    }
}
