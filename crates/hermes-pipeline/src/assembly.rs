//! Assemblies: ordered processors compiled into a [`Processing`].

use crate::execution::{BoxedCall, Processing};
use crate::processor::{BoxedProcessor, Processor, Registry};
use crate::report::Report;
use crate::resolvers::{Contexts, Resolvers};
use hermes_core::{AssemblyError, AssemblyResult};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// An ordered list of processors.
///
/// Assemblies hold no runtime state; [`Assembly::create`] is a pure function
/// of the processors and the provided source contexts.
///
/// # Example
///
/// ```ignore
/// let assembly = Assembly::new("gateway")
///     .with(Contextual::new(RepositoryHandler::new(config)))
///     .with(Contextual::new(Selector));
///
/// let processing = assembly.create(&sources)?;
/// ```
#[derive(Clone)]
pub struct Assembly {
    name: String,
    processors: Vec<BoxedProcessor>,
}

impl Assembly {
    /// Creates an empty assembly.
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

    /// The assembly name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The processors in registration order.
    pub fn processors(&self) -> &[BoxedProcessor] {
        &self.processors
    }

    fn index_of(&self, name: &str) -> AssemblyResult<usize> {
        self.processors
            .iter()
            .position(|processor| processor.name() == name)
            .ok_or_else(|| AssemblyError::unknown_processor(&self.name, name))
    }

    /// Appends a shared processor.
    pub fn add(&mut self, processor: BoxedProcessor) -> &mut Self {
        self.processors.push(processor);
        self
    }

    /// Inserts a processor before the named one.
    pub fn add_before(&mut self, processor: BoxedProcessor, before: &str) -> AssemblyResult<&mut Self> {
        let index = self.index_of(before)?;
        self.processors.insert(index, processor);
        Ok(self)
    }

    /// Inserts a processor after the named one.
    pub fn add_after(&mut self, processor: BoxedProcessor, after: &str) -> AssemblyResult<&mut Self> {
        let index = self.index_of(after)?;
        self.processors.insert(index + 1, processor);
        Ok(self)
    }

    /// Moves the named processor before another one.
    ///
    /// The assembly is left untouched when either name is unknown.
    pub fn move_before(&mut self, name: &str, before: &str) -> AssemblyResult<&mut Self> {
        self.index_of(before)?;
        if name == before {
            self.index_of(name)?;
            return Ok(self);
        }
        let processor = self.remove(name)?;
        self.add_before(processor, before)
    }

    /// Moves the named processor after another one.
    ///
    /// The assembly is left untouched when either name is unknown.
    pub fn move_after(&mut self, name: &str, after: &str) -> AssemblyResult<&mut Self> {
        self.index_of(after)?;
        if name == after {
            self.index_of(name)?;
            return Ok(self);
        }
        let processor = self.remove(name)?;
        self.add_after(processor, after)
    }

    /// Replaces the named processor.
    pub fn replace(&mut self, replaced: &str, replacer: BoxedProcessor) -> AssemblyResult<BoxedProcessor> {
        let index = self.index_of(replaced)?;
        Ok(std::mem::replace(&mut self.processors[index], replacer))
    }

    /// Removes the named processor.
    pub fn remove(&mut self, name: &str) -> AssemblyResult<BoxedProcessor> {
        let index = self.index_of(name)?;
        Ok(self.processors.remove(index))
    }

    /// Registers every processor into the registry, then lets each finalize.
    pub fn register_all(&self, registry: &mut Registry<'_>) -> AssemblyResult<()> {
        for processor in &self.processors {
            processor
                .register(registry)
                .map_err(|e| e.at(format!("processor '{}'", processor.name())))?;
        }
        for processor in &self.processors {
            processor
                .finalized(registry)
                .map_err(|e| e.at(format!("processor '{}'", processor.name())))?;
        }
        Ok(())
    }

    /// Compiles the assembly for the provided source contexts.
    ///
    /// Fails if any attribute is still required once the sources solved the
    /// processors' declarations.
    pub fn create(&self, contexts: &Contexts) -> AssemblyResult<Processing> {
        let sources = Resolvers::declare(&format!("sources of '{}'", self.name), contexts)?;
        let mut current = Resolvers::new();
        let mut extensions = Resolvers::new();
        let mut calls: Vec<BoxedCall> = Vec::new();
        let mut report = Report::new(format!("assembly '{}'", self.name));

        let located = |e: AssemblyError| e.at(format!("assembly '{}'", self.name));
        {
            let mut registry = Registry {
                sources: &sources,
                current: &mut current,
                extensions: &mut extensions,
                calls: &mut calls,
                report: &mut report,
            };
            self.register_all(&mut registry).map_err(located)?;
        }

        current.solve(&sources).map_err(|e| located(e.into()))?;
        current.check_available("Assembly", &self.name)?;
        current.solve(&extensions).map_err(|e| located(e.into()))?;

        let classes = current.generate().map_err(|e| located(e.into()))?;
        report.add(&current);
        match report.render() {
            Some(message) => debug!(assembly = %self.name, "\n{message}"),
            None => debug!(assembly = %self.name, "Nothing to report, everything fits nicely"),
        }
        info!(assembly = %self.name, calls = calls.len(), contexts = classes.len(), "Assembly created");
        Ok(Processing::new(calls, classes))
    }
}

impl fmt::Debug for Assembly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.processors.iter().map(|p| p.name()).collect();
        f.debug_struct("Assembly")
            .field("name", &self.name)
            .field("processors", &names)
            .finish()
    }
}

impl fmt::Display for Assembly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Assembly '{}' with {} processors", self.name, self.processors.len())
    }
}
