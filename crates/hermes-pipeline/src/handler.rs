//! Processor adapters for handlers.
//!
//! Handlers are the runtime side of a processor: they declare the contexts
//! they work with and process a chain. The adapters in this module turn them
//! into [`Processor`]s:
//!
//! - [`Contextual`] - a plain handler, merged into the current declarations
//! - [`Brancher`] - a handler owning sub-assemblies through [`Branch`]es
//! - [`Composite`] - several processors registered under one name
//! - [`Renamer`] - a processor seen through a context [`Mapping`]
//! - [`Joiner`] - several contexts copied into a single one

use crate::branch::Branch;
use crate::error::ExecutionResult;
use crate::execution::{BoxFuture, BoxedCall, Call, Chain, Processing};
use crate::mapping::Mapping;
use crate::processor::{BoxedProcessor, Processor, Registry};
use crate::resolvers::{Contexts, Resolvers};
use hermes_core::{AssemblyResult, Attribute, ContextSpec, ProcessorError};
use std::sync::Arc;
use tracing::debug;

/// A processor implementation working on declared contexts.
///
/// # Example
///
/// ```ignore
/// struct Greeter;
///
/// impl Handler for Greeter {
///     fn name(&self) -> &str {
///         "greeter"
///     }
///
///     fn contexts(&self) -> Contexts {
///         Contexts::new().with("response", ContextSpec::new("Response").defines::<String>("text"))
///     }
///
///     fn process<'a>(&'a self, chain: &'a mut Chain) -> BoxFuture<'a, ExecutionResult<()>> {
///         Box::pin(async move {
///             chain.object("response")?.set("text", "hello".to_string())?;
///             Ok(())
///         })
///     }
/// }
/// ```
pub trait Handler: Send + Sync + 'static {
    /// Processor name.
    fn name(&self) -> &str;

    /// The contexts the handler declares.
    fn contexts(&self) -> Contexts;

    /// Processes the chain.
    fn process<'a>(&'a self, chain: &'a mut Chain) -> BoxFuture<'a, ExecutionResult<()>>;
}

/// A handler that executes sub-processings.
pub trait BranchingHandler: Send + Sync + 'static {
    /// Processor name.
    fn name(&self) -> &str;

    /// The contexts the handler declares, possibly none.
    fn contexts(&self) -> Contexts {
        Contexts::new()
    }

    /// Processes the chain, with one processing per branch in branch order.
    fn process<'a>(
        &'a self,
        chain: &'a mut Chain,
        processings: &'a [Arc<Processing>],
    ) -> BoxFuture<'a, ExecutionResult<()>>;
}

/// Adapts a [`Handler`] into a processor.
pub struct Contextual<H> {
    handler: Arc<H>,
    extra: Contexts,
}

impl<H: Handler> Contextual<H> {
    /// Wraps the handler.
    #[must_use]
    pub fn new(handler: H) -> Self {
        Self::shared(Arc::new(handler))
    }

    /// Wraps a shared handler.
    #[must_use]
    pub fn shared(handler: Arc<H>) -> Self {
        Self {
            handler,
            extra: Contexts::new(),
        }
    }

    /// Declares an additional context the handler does not touch itself but
    /// that must be present in the assembly.
    #[must_use]
    pub fn push(mut self, name: impl Into<String>, spec: ContextSpec) -> Self {
        self.extra = self.extra.with(name, spec);
        self
    }

    /// The wrapped handler.
    pub fn handler(&self) -> &Arc<H> {
        &self.handler
    }

    fn declared(&self) -> AssemblyResult<Contexts> {
        let mut contexts = self.handler.contexts();
        for (name, spec) in self.extra.iter() {
            if contexts.get(name).is_some() {
                return Err(ProcessorError::DuplicateContext {
                    processor: self.handler.name().to_string(),
                    context: name.clone(),
                }
                .into());
            }
            contexts = contexts.with(name.clone(), spec.clone());
        }
        if contexts.is_empty() {
            return Err(ProcessorError::NoContexts {
                processor: self.handler.name().to_string(),
            }
            .into());
        }
        Ok(contexts)
    }
}

impl<H: Handler> Processor for Contextual<H> {
    fn name(&self) -> &str {
        self.handler.name()
    }

    fn register(&self, registry: &mut Registry<'_>) -> AssemblyResult<()> {
        let declared = Resolvers::declare(self.name(), &self.declared()?)?;
        registry.current.merge(&declared)?;
        registry.add_call(Arc::new(HandlerCall {
            handler: Arc::clone(&self.handler),
        }));
        Ok(())
    }
}

struct HandlerCall<H> {
    handler: Arc<H>,
}

impl<H: Handler> Call for HandlerCall<H> {
    fn name(&self) -> &str {
        self.handler.name()
    }

    fn call<'a>(&'a self, chain: &'a mut Chain) -> BoxFuture<'a, ExecutionResult<()>> {
        self.handler.process(chain)
    }
}

/// Adapts a [`BranchingHandler`] into a processor.
///
/// The branches merge the handler's own declarations, the brancher itself
/// only contributes the call.
pub struct Brancher<H> {
    handler: Arc<H>,
    branches: Vec<Box<dyn Branch>>,
}

impl<H: BranchingHandler> Brancher<H> {
    /// Wraps the handler with no branches yet.
    #[must_use]
    pub fn new(handler: H) -> Self {
        Self {
            handler: Arc::new(handler),
            branches: Vec::new(),
        }
    }

    /// Appends a branch.
    #[must_use]
    pub fn branch(mut self, branch: impl Branch) -> Self {
        self.branches.push(Box::new(branch));
        self
    }
}

impl<H: BranchingHandler> Processor for Brancher<H> {
    fn name(&self) -> &str {
        self.handler.name()
    }

    fn register(&self, registry: &mut Registry<'_>) -> AssemblyResult<()> {
        if self.branches.is_empty() {
            return Err(ProcessorError::NoBranches {
                processor: self.name().to_string(),
            }
            .into());
        }
        let declared = Resolvers::declare(self.name(), &self.handler.contexts())?;
        let processings = self
            .branches
            .iter()
            .map(|branch| {
                branch
                    .process(&declared, registry)
                    .map(Arc::new)
                    .map_err(|e| e.at(format!("branch '{}'", branch.name())))
            })
            .collect::<AssemblyResult<Vec<_>>>()?;
        debug!(processor = self.name(), branches = processings.len(), "Branches processed");
        registry.add_call(Arc::new(BrancherCall {
            handler: Arc::clone(&self.handler),
            processings,
        }));
        Ok(())
    }
}

struct BrancherCall<H> {
    handler: Arc<H>,
    processings: Vec<Arc<Processing>>,
}

impl<H: BranchingHandler> Call for BrancherCall<H> {
    fn name(&self) -> &str {
        self.handler.name()
    }

    fn call<'a>(&'a self, chain: &'a mut Chain) -> BoxFuture<'a, ExecutionResult<()>> {
        self.handler.process(chain, &self.processings)
    }
}

/// Routes the chain into the processing of its single branch.
pub struct RoutingHandler {
    name: String,
}

impl RoutingHandler {
    /// Creates a routing handler.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl BranchingHandler for RoutingHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn process<'a>(
        &'a self,
        chain: &'a mut Chain,
        processings: &'a [Arc<Processing>],
    ) -> BoxFuture<'a, ExecutionResult<()>> {
        Box::pin(async move {
            if let Some(processing) = processings.first() {
                chain.route(processing);
            }
            Ok(())
        })
    }
}

/// Several processors registered as one.
pub struct Composite {
    name: String,
    processors: Vec<BoxedProcessor>,
}

impl Composite {
    /// Creates an empty composite.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            processors: Vec::new(),
        }
    }

    /// Appends a processor.
    #[must_use]
    pub fn with(mut self, processor: impl Processor) -> Self {
        self.processors.push(Arc::new(processor));
        self
    }
}

impl Processor for Composite {
    fn name(&self) -> &str {
        &self.name
    }

    fn register(&self, registry: &mut Registry<'_>) -> AssemblyResult<()> {
        for processor in &self.processors {
            processor
                .register(registry)
                .map_err(|e| e.at(format!("processor '{}'", processor.name())))?;
        }
        Ok(())
    }

    fn finalized(&self, registry: &mut Registry<'_>) -> AssemblyResult<()> {
        for processor in &self.processors {
            processor.finalized(registry)?;
        }
        Ok(())
    }
}

/// A processor registered under a context renaming.
///
/// The wrapped processor sees the inner names only; contexts that are not
/// part of the mapping are invisible to it.
pub struct Renamer {
    processor: BoxedProcessor,
    mapping: Arc<Mapping>,
}

impl Renamer {
    /// Wraps the processor, `pairs` being `(inner, outer)` context names.
    #[must_use]
    pub fn new(processor: impl Processor, pairs: &[(&str, &str)]) -> Self {
        Self {
            processor: Arc::new(processor),
            mapping: Arc::new(Mapping::from_pairs(pairs)),
        }
    }

    fn wrapped<F>(&self, registry: &mut Registry<'_>, register: F) -> AssemblyResult<()>
    where
        F: FnOnce(&mut Registry<'_>) -> AssemblyResult<()>,
    {
        let sources = self.mapping.structure(registry.sources)?;
        let mut current = self.mapping.structure(registry.current)?;
        let mut extensions = self.mapping.structure(registry.extensions)?;
        let mut calls: Vec<BoxedCall> = Vec::new();
        {
            let mut inner = Registry {
                sources: &sources,
                current: &mut current,
                extensions: &mut extensions,
                calls: &mut calls,
                report: &mut *registry.report,
            };
            register(&mut inner)?;
        }
        self.mapping.restructure(registry.current, &current)?;
        self.mapping.restructure(registry.extensions, &extensions)?;
        for call in calls {
            registry.add_call(Arc::new(RenamedCall {
                call,
                mapping: Arc::clone(&self.mapping),
            }));
        }
        Ok(())
    }
}

impl Processor for Renamer {
    fn name(&self) -> &str {
        self.processor.name()
    }

    fn register(&self, registry: &mut Registry<'_>) -> AssemblyResult<()> {
        self.wrapped(registry, |inner| self.processor.register(inner))
    }

    fn finalized(&self, registry: &mut Registry<'_>) -> AssemblyResult<()> {
        self.wrapped(registry, |inner| self.processor.finalized(inner))
    }
}

struct RenamedCall {
    call: BoxedCall,
    mapping: Arc<Mapping>,
}

impl Call for RenamedCall {
    fn name(&self) -> &str {
        self.call.name()
    }

    fn call<'a>(&'a self, chain: &'a mut Chain) -> BoxFuture<'a, ExecutionResult<()>> {
        Box::pin(async move {
            let renamed = self.mapping.rename_arg(chain.arg());
            let outer = std::mem::replace(chain.arg_mut(), renamed);
            let result = self.call.call(chain).await;
            let inner = std::mem::replace(chain.arg_mut(), outer);
            self.mapping.restore_arg(chain.arg_mut(), &inner);
            result
        })
    }
}

/// Copies the attributes of several contexts into a target context.
///
/// When sources declare the same attribute the first one wins, both when
/// declaring and when copying values.
pub struct Joiner {
    name: String,
    target: String,
    sources: Vec<String>,
}

impl Joiner {
    /// Creates a joiner of `sources` into `target`.
    #[must_use]
    pub fn new(name: impl Into<String>, target: impl Into<String>, sources: &[&str]) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            sources: sources.iter().map(|s| (*s).to_string()).collect(),
        }
    }
}

impl Processor for Joiner {
    fn name(&self) -> &str {
        &self.name
    }

    fn register(&self, registry: &mut Registry<'_>) -> AssemblyResult<()> {
        let mut declared = Resolvers::new();
        let mut taken: Vec<String> = Vec::new();
        for source in &self.sources {
            let Some(attributes) = registry.current.context(source).or_else(|| registry.sources.context(source))
            else {
                continue;
            };
            for (attr, resolver) in attributes {
                if taken.contains(attr) {
                    continue;
                }
                let types = resolver.types().clone();
                declared.add(
                    source,
                    attr,
                    &Attribute::optional(types.clone()).placed(&self.name, attr),
                )?;
                declared.add(&self.target, attr, &Attribute::defines(types).placed(&self.name, attr))?;
                taken.push(attr.clone());
            }
        }
        registry.current.merge(&declared)?;

        registry.add_call(Arc::new(JoinCall {
            name: self.name.clone(),
            target: self.target.clone(),
            sources: self.sources.clone(),
        }));
        Ok(())
    }
}

struct JoinCall {
    name: String,
    target: String,
    sources: Vec<String>,
}

impl Call for JoinCall {
    fn name(&self) -> &str {
        &self.name
    }

    fn call<'a>(&'a self, chain: &'a mut Chain) -> BoxFuture<'a, ExecutionResult<()>> {
        Box::pin(async move {
            let target = chain.object(&self.target)?;
            for source in &self.sources {
                if let Ok(object) = chain.object(source) {
                    target.fill_from(&object);
                }
            }
            Ok(())
        })
    }
}
