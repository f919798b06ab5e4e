//! Processing and chained execution.
//!
//! A [`Processing`] is the immutable result of creating an assembly: the
//! ordered calls plus the generated context classes. Each request flight runs
//! on its own [`Chain`], which owns the remaining call queue, the argument
//! bag, the error handlers and the finalizers.
//!
//! Calls run one at a time; a chain only suspends between calls.
//!
//! # Example
//!
//! ```ignore
//! let processing = assembly.create(&sources)?;
//! let arg = processing.execute_with_all(Arg::new()).await?;
//! let response = arg.object("response").unwrap();
//! ```

use crate::error::{ExecutionError, ExecutionResult};
use hermes_core::{ContextClass, ContextObject};
use indexmap::IndexMap;
use std::any::Any;
use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::{debug, warn, Instrument};
use uuid::Uuid;

/// A boxed future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The chain ran out of calls.
pub const CONSUMED: u8 = 1 << 1;
/// The chain was canceled.
pub const CANCELED: u8 = 1 << 2;
/// A call failed and the failure was handed to the error handlers.
pub const EXCEPTION: u8 = 1 << 3;

/// A processor entry point.
pub trait Call: Send + Sync + 'static {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Runs against the chain.
    fn call<'a>(&'a self, chain: &'a mut Chain) -> BoxFuture<'a, ExecutionResult<()>>;
}

/// A shared call.
pub type BoxedCall = Arc<dyn Call>;

/// A value in the chain argument bag.
#[derive(Clone)]
pub enum ArgValue {
    /// A context object, for lower case context names.
    Object(ContextObject),
    /// A context class, for upper case context names.
    Class(Arc<ContextClass>),
    /// Any other shared value.
    Value(Arc<dyn Any + Send + Sync>),
}

impl fmt::Debug for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Object(object) => write!(f, "Object({object})"),
            Self::Class(class) => write!(f, "Class({})", class.name()),
            Self::Value(_) => f.write_str("Value(..)"),
        }
    }
}

/// The argument bag shared by the calls of a chain.
#[derive(Debug, Clone, Default)]
pub struct Arg {
    values: IndexMap<String, ArgValue>,
}

impl Arg {
    /// Creates an empty bag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a context object.
    #[must_use]
    pub fn with_object(mut self, name: impl Into<String>, object: ContextObject) -> Self {
        self.insert(name, ArgValue::Object(object));
        self
    }

    /// Adds a shared value.
    #[must_use]
    pub fn with_value<T: Any + Send + Sync>(mut self, name: impl Into<String>, value: T) -> Self {
        self.insert(name, ArgValue::Value(Arc::new(value)));
        self
    }

    /// Inserts a value, returning the replaced one.
    pub fn insert(&mut self, name: impl Into<String>, value: ArgValue) -> Option<ArgValue> {
        self.values.insert(name.into(), value)
    }

    /// The value under the name.
    pub fn get(&self, name: &str) -> Option<&ArgValue> {
        self.values.get(name)
    }

    /// The context object under the name.
    pub fn object(&self, name: &str) -> Option<&ContextObject> {
        match self.values.get(name) {
            Some(ArgValue::Object(object)) => Some(object),
            _ => None,
        }
    }

    /// The context class under the name.
    pub fn class(&self, name: &str) -> Option<&Arc<ContextClass>> {
        match self.values.get(name) {
            Some(ArgValue::Class(class)) => Some(class),
            _ => None,
        }
    }

    /// The shared value under the name.
    pub fn value<T: Any + Send + Sync>(&self, name: &str) -> Option<Arc<T>> {
        match self.values.get(name) {
            Some(ArgValue::Value(value)) => Arc::clone(value).downcast::<T>().ok(),
            _ => None,
        }
    }

    /// Checks whether the name is present.
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Removes the value under the name.
    pub fn remove(&mut self, name: &str) -> Option<ArgValue> {
        self.values.shift_remove(name)
    }

    /// Iterates the names in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Iterates the entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &ArgValue)> {
        self.values.iter()
    }
}

/// The compiled form of an assembly.
pub struct Processing {
    calls: Vec<BoxedCall>,
    contexts: IndexMap<String, Arc<ContextClass>>,
}

impl Processing {
    /// Creates a processing.
    #[must_use]
    pub fn new(calls: Vec<BoxedCall>, contexts: IndexMap<String, Arc<ContextClass>>) -> Self {
        Self { calls, contexts }
    }

    /// The calls in execution order.
    pub fn calls(&self) -> &[BoxedCall] {
        &self.calls
    }

    /// The names of the calls in execution order.
    pub fn call_names(&self) -> Vec<&str> {
        self.calls.iter().map(|call| call.name()).collect()
    }

    /// The generated context classes.
    pub fn contexts(&self) -> &IndexMap<String, Arc<ContextClass>> {
        &self.contexts
    }

    /// The generated context class under the name.
    pub fn context(&self, name: &str) -> Option<&Arc<ContextClass>> {
        self.contexts.get(name)
    }

    /// Supplies every context missing from the bag: a fresh object for lower
    /// case names, the class itself for upper case names.
    pub fn fill_in(&self, arg: &mut Arg) {
        for (name, class) in &self.contexts {
            if arg.contains(name) {
                continue;
            }
            let value = if crate::resolvers::is_class_name(name) {
                ArgValue::Class(Arc::clone(class))
            } else {
                ArgValue::Object(class.create())
            };
            arg.insert(name.clone(), value);
        }
    }

    /// Creates a chain over this processing.
    pub fn chain(&self, arg: Arg) -> Chain {
        Chain::new(self, arg)
    }

    /// Runs the calls with exactly the provided arguments.
    pub async fn execute(&self, arg: Arg) -> ExecutionResult<Arg> {
        let mut chain = self.chain(arg);
        chain.execute(CONSUMED).await?;
        Ok(chain.into_arg())
    }

    /// Runs the calls after filling in every missing context.
    pub async fn execute_with_all(&self, mut arg: Arg) -> ExecutionResult<Arg> {
        self.fill_in(&mut arg);
        self.execute(arg).await
    }
}

impl fmt::Debug for Processing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Processing")
            .field("calls", &self.call_names())
            .field("contexts", &self.contexts.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// The mutable state of a single request flight.
pub struct Chain {
    id: Uuid,
    calls: VecDeque<BoxedCall>,
    arg: Arg,
    status: u8,
    error_handlers: Vec<BoxedCall>,
    finalizers: Vec<BoxedCall>,
    suspended: Option<VecDeque<BoxedCall>>,
    error: Option<Arc<ExecutionError>>,
    retried: bool,
    finalizing: bool,
}

impl Chain {
    /// Creates a chain over the processing calls.
    pub fn new(processing: &Processing, arg: Arg) -> Self {
        Self {
            id: Uuid::now_v7(),
            calls: processing.calls.iter().cloned().collect(),
            arg,
            status: 0,
            error_handlers: Vec::new(),
            finalizers: Vec::new(),
            suspended: None,
            error: None,
            retried: false,
            finalizing: false,
        }
    }

    /// The flight identifier.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The argument bag.
    pub fn arg(&self) -> &Arg {
        &self.arg
    }

    /// The argument bag, mutably.
    pub fn arg_mut(&mut self) -> &mut Arg {
        &mut self.arg
    }

    /// Gives up the chain, returning the argument bag.
    pub fn into_arg(self) -> Arg {
        self.arg
    }

    /// A handle on the context object under the name.
    pub fn object(&self, name: &str) -> ExecutionResult<ContextObject> {
        match self.arg.get(name) {
            Some(ArgValue::Object(object)) => Ok(object.clone()),
            Some(_) => Err(ExecutionError::InvalidArgument {
                name: name.to_string(),
                expected: "a context object",
            }),
            None => Err(ExecutionError::missing_context(name)),
        }
    }

    /// The current status flags.
    pub fn status(&self) -> u8 {
        self.status
    }

    /// Checks whether the calls ran out without cancellation or exception.
    pub fn is_consumed(&self) -> bool {
        self.status & CONSUMED != 0
    }

    /// Checks whether the chain was canceled.
    pub fn is_canceled(&self) -> bool {
        self.status & CANCELED != 0
    }

    /// The failure being handled, available to error handlers.
    pub fn error(&self) -> Option<&ExecutionError> {
        self.error.as_deref()
    }

    /// Number of calls left in the queue.
    pub fn remaining(&self) -> usize {
        self.calls.len()
    }

    /// Runs the processing calls before the remaining ones.
    pub fn branch(&mut self, processing: &Processing) -> &mut Self {
        for call in processing.calls.iter().rev() {
            self.calls.push_front(Arc::clone(call));
        }
        self
    }

    /// Drops the remaining calls and continues with the processing calls.
    pub fn route(&mut self, processing: &Processing) -> &mut Self {
        self.calls.clear();
        self.calls.extend(processing.calls.iter().cloned());
        self
    }

    /// Drops the remaining calls; finalizers still run.
    pub fn cancel(&mut self) -> &mut Self {
        self.calls.clear();
        self.status |= CANCELED;
        self
    }

    /// Registers calls to run if a later call fails.
    pub fn on_error<I: IntoIterator<Item = BoxedCall>>(&mut self, calls: I) -> &mut Self {
        self.error_handlers.extend(calls);
        self
    }

    /// Registers calls to run once the chain ends, last registered first.
    pub fn on_finalize<I: IntoIterator<Item = BoxedCall>>(&mut self, calls: I) -> ExecutionResult<&mut Self> {
        if self.finalizing {
            return Err(ExecutionError::FinalizerRegistration);
        }
        self.finalizers.extend(calls);
        Ok(self)
    }

    /// From an error handler: clears the failure and resumes the calls that
    /// were pending when it happened.
    pub fn retry(&mut self) -> &mut Self {
        if self.suspended.is_some() {
            self.status &= !EXCEPTION;
            self.error = None;
            self.retried = true;
        }
        self
    }

    /// Runs the next call, or moves to finalization once the queue is empty.
    ///
    /// Returns `false` once there is nothing left to run.
    pub async fn step(&mut self) -> ExecutionResult<bool> {
        let Some(call) = self.calls.pop_front() else {
            return Ok(self.advance());
        };

        debug!(chain = %self.id, call = call.name(), "Running call");
        if let Err(error) = call.call(self).await {
            metrics::counter!("hermes_chain_errors_total").increment(1);
            if self.suspended.is_some() || self.error_handlers.is_empty() {
                return Err(error);
            }
            warn!(chain = %self.id, call = call.name(), error = %error, "Call failed, running error handlers");
            self.status |= EXCEPTION;
            self.error = Some(Arc::new(error));
            let handlers: VecDeque<BoxedCall> = self.error_handlers.drain(..).collect();
            self.suspended = Some(std::mem::replace(&mut self.calls, handlers));
            return Ok(true);
        }

        if self.retried {
            self.retried = false;
            if let Some(pending) = self.suspended.take() {
                debug!(chain = %self.id, pending = pending.len(), "Retrying after handled error");
                self.calls = pending;
            }
        }
        Ok(true)
    }

    fn advance(&mut self) -> bool {
        if self.finalizing {
            // Finalizers left over after a handled finalizer failure.
            return match self.suspended.take() {
                Some(pending) if !pending.is_empty() => {
                    self.calls = pending;
                    true
                }
                _ => false,
            };
        }
        self.suspended = None;
        if self.status == 0 {
            self.status = CONSUMED;
        }
        if !self.finalizing && !self.finalizers.is_empty() {
            self.finalizing = true;
            self.calls = self.finalizers.drain(..).rev().collect();
            return true;
        }
        false
    }

    /// Runs the chain to its end, returning whether any of the flags match
    /// the final status.
    ///
    /// A failure with no error handler registered propagates and skips the
    /// finalizers.
    pub async fn execute(&mut self, flags: u8) -> ExecutionResult<bool> {
        metrics::counter!("hermes_chain_executions_total").increment(1);
        let span = tracing::debug_span!("chain", id = %self.id);
        async {
            while self.step().await? {}
            debug!(chain = %self.id, status = self.status, "Chain ended");
            Ok(self.status & flags != 0)
        }
        .instrument(span)
        .await
    }
}

impl fmt::Debug for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chain")
            .field("id", &self.id)
            .field("remaining", &self.calls.len())
            .field("status", &self.status)
            .field("arg", &self.arg)
            .finish()
    }
}

/// A call built from an async closure, handy for error handlers and
/// finalizers registered at runtime.
pub struct FnCall<F> {
    name: String,
    function: F,
}

impl<F> FnCall<F> {
    /// Wraps the closure.
    pub fn new(name: impl Into<String>, function: F) -> Self
    where
        F: for<'a> Fn(&'a mut Chain) -> BoxFuture<'a, ExecutionResult<()>> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            function,
        }
    }

    /// Wraps the closure as a shared call.
    pub fn boxed(name: impl Into<String>, function: F) -> BoxedCall
    where
        F: for<'a> Fn(&'a mut Chain) -> BoxFuture<'a, ExecutionResult<()>> + Send + Sync + 'static,
    {
        Arc::new(Self::new(name, function))
    }
}

impl<F> Call for FnCall<F>
where
    F: for<'a> Fn(&'a mut Chain) -> BoxFuture<'a, ExecutionResult<()>> + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn call<'a>(&'a self, chain: &'a mut Chain) -> BoxFuture<'a, ExecutionResult<()>> {
        (self.function)(chain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn recorder(log: &Arc<Mutex<Vec<String>>>, name: &'static str) -> BoxedCall {
        let log = Arc::clone(log);
        FnCall::boxed(name, move |_chain: &mut Chain| {
            let log = Arc::clone(&log);
            Box::pin(async move {
                log.lock().unwrap().push(name.to_string());
                Ok(())
            })
        })
    }

    fn failing(name: &'static str) -> BoxedCall {
        FnCall::boxed(name, move |_chain: &mut Chain| {
            Box::pin(async move { Err(ExecutionError::processor(name, "boom")) })
        })
    }

    #[tokio::test]
    async fn test_runs_every_call_once_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let processing = Processing::new(
            vec![recorder(&log, "a"), recorder(&log, "b"), recorder(&log, "c")],
            IndexMap::new(),
        );
        let mut chain = processing.chain(Arg::new());
        assert!(chain.execute(CONSUMED).await.unwrap());
        assert_eq!(*log.lock().unwrap(), vec!["a", "b", "c"]);
        assert_eq!(chain.remaining(), 0);
        assert!(chain.is_consumed());
    }

    #[tokio::test]
    async fn test_unhandled_error_propagates() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let processing = Processing::new(vec![failing("bad"), recorder(&log, "after")], IndexMap::new());
        let error = processing.execute(Arg::new()).await.unwrap_err();
        assert!(matches!(error, ExecutionError::Processor { .. }));
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_step_is_resumable() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let processing = Processing::new(vec![recorder(&log, "a"), recorder(&log, "b")], IndexMap::new());
        let mut chain = processing.chain(Arg::new());
        assert!(chain.step().await.unwrap());
        assert_eq!(*log.lock().unwrap(), vec!["a"]);
        assert!(chain.step().await.unwrap());
        assert!(!chain.step().await.unwrap());
        assert!(chain.is_consumed());
    }

    #[test]
    fn test_arg_accessors() {
        let arg = Arg::new().with_value("limit", 10_usize);
        assert_eq!(arg.value::<usize>("limit").as_deref(), Some(&10));
        assert!(arg.value::<String>("limit").is_none());
        assert!(arg.object("limit").is_none());
        assert_eq!(arg.names().collect::<Vec<_>>(), vec!["limit"]);
    }
}
