//! The processor registration contract.
//!
//! Processors never run during assembly: they *register*, contributing their
//! context declarations to the resolvers and their entry point to the calls.

use crate::execution::BoxedCall;
use crate::report::Report;
use crate::resolvers::Resolvers;
use hermes_core::AssemblyResult;
use std::sync::Arc;

/// The state a processor registers into.
pub struct Registry<'a> {
    /// Contexts the processing will be executed with.
    pub sources: &'a Resolvers,
    /// Declarations of the processors registered so far.
    pub current: &'a mut Resolvers,
    /// Declarations needed at runtime outside the primary contract.
    pub extensions: &'a mut Resolvers,
    /// Entry points, in execution order.
    pub calls: &'a mut Vec<BoxedCall>,
    /// Report of the unused attributes.
    pub report: &'a mut Report,
}

impl Registry<'_> {
    /// Appends an entry point.
    pub fn add_call(&mut self, call: BoxedCall) {
        self.calls.push(call);
    }
}

/// A unit of work in an assembly.
pub trait Processor: Send + Sync + 'static {
    /// Name used for editing assemblies and in error locations.
    fn name(&self) -> &str;

    /// Registers declarations and calls.
    fn register(&self, registry: &mut Registry<'_>) -> AssemblyResult<()>;

    /// Called after every processor of the assembly registered.
    fn finalized(&self, _registry: &mut Registry<'_>) -> AssemblyResult<()> {
        Ok(())
    }
}

/// A shared processor.
pub type BoxedProcessor = Arc<dyn Processor>;
