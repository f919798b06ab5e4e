//! Interceptors wrapped around bound service calls.

use crate::error::{BindingError, BindingResult};
use crate::session::SessionScope;
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// Type-erased value returned through the interceptors.
pub type Returned = Box<dyn Any + Send>;

/// The call being intercepted.
#[derive(Debug, Clone, Copy)]
pub struct Invocation<'a> {
    /// Service name.
    pub service: &'a str,
    /// Method name.
    pub method: &'a str,
    /// Session scope of the calling flight.
    pub scope: Option<&'a SessionScope>,
}

/// Code wrapped around a service call.
///
/// Work before `next.run` happens before the call, work after it sees the
/// outcome. Not calling `next` short-circuits the call.
pub trait Interceptor: Send + Sync + 'static {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Intercepts the invocation.
    fn intercept(&self, invocation: &Invocation<'_>, next: Next<'_>) -> BindingResult<Returned>;
}

/// The interceptors still to run, then the call itself.
pub struct Next<'a> {
    interceptors: &'a [Arc<dyn Interceptor>],
    target: Box<dyn FnOnce() -> BindingResult<Returned> + 'a>,
}

impl<'a> Next<'a> {
    /// Runs the next interceptor, or the call once none is left.
    ///
    /// This consumes `self` so the call runs at most once.
    pub fn run(self, invocation: &Invocation<'_>) -> BindingResult<Returned> {
        match self.interceptors.split_first() {
            Some((interceptor, rest)) => interceptor.intercept(
                invocation,
                Next {
                    interceptors: rest,
                    target: self.target,
                },
            ),
            None => (self.target)(),
        }
    }
}

struct Registered {
    methods: Vec<String>,
    interceptor: Arc<dyn Interceptor>,
}

impl Registered {
    fn applies(&self, method: &str) -> bool {
        self.methods.is_empty() || self.methods.iter().any(|listed| listed == method)
    }
}

/// Interceptors bound to the methods of one service, run in registration
/// order.
pub struct Binder {
    service: String,
    registered: Vec<Registered>,
}

impl Binder {
    /// Creates a binder without interceptors.
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            registered: Vec::new(),
        }
    }

    /// Service name.
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Binds the interceptor to the methods, or to every method when none
    /// is listed.
    pub fn intercept(mut self, methods: &[&str], interceptor: impl Interceptor) -> Self {
        self.registered.push(Registered {
            methods: methods.iter().map(ToString::to_string).collect(),
            interceptor: Arc::new(interceptor),
        });
        self
    }

    /// Names of the interceptors bound to the method, in running order.
    pub fn interceptors(&self, method: &str) -> Vec<&str> {
        self.registered
            .iter()
            .filter(|registered| registered.applies(method))
            .map(|registered| registered.interceptor.name())
            .collect()
    }

    /// Calls `f` through the interceptors bound to `method`.
    pub fn invoke<T: Send + 'static>(
        &self,
        method: &str,
        scope: Option<&SessionScope>,
        f: impl FnOnce() -> BindingResult<T>,
    ) -> BindingResult<T> {
        let interceptors: Vec<Arc<dyn Interceptor>> = self
            .registered
            .iter()
            .filter(|registered| registered.applies(method))
            .map(|registered| Arc::clone(&registered.interceptor))
            .collect();
        let invocation = Invocation {
            service: &self.service,
            method,
            scope,
        };
        let next = Next {
            interceptors: &interceptors,
            target: Box::new(move || f().map(|value| Box::new(value) as Returned)),
        };

        next.run(&invocation)?
            .downcast::<T>()
            .map(|value| *value)
            .map_err(|_| BindingError::Returned {
                service: self.service.clone(),
                method: method.to_string(),
            })
    }
}

impl fmt::Debug for Binder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binder")
            .field("service", &self.service)
            .field(
                "interceptors",
                &self.registered.iter().map(|r| r.interceptor.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Records call counts and durations per service method.
#[derive(Debug, Default, Clone, Copy)]
pub struct CallMetrics;

impl Interceptor for CallMetrics {
    fn name(&self) -> &str {
        "call_metrics"
    }

    fn intercept(&self, invocation: &Invocation<'_>, next: Next<'_>) -> BindingResult<Returned> {
        let start = Instant::now();
        let returned = next.run(invocation);
        let outcome = if returned.is_ok() { "ok" } else { "error" };
        metrics::counter!(
            "hermes_binding_calls_total",
            "service" => invocation.service.to_string(),
            "method" => invocation.method.to_string(),
            "outcome" => outcome
        )
        .increment(1);
        metrics::histogram!(
            "hermes_binding_call_duration_seconds",
            "service" => invocation.service.to_string(),
            "method" => invocation.method.to_string()
        )
        .record(start.elapsed().as_secs_f64());
        returned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Tracing {
        name: &'static str,
        journal: Arc<Mutex<Vec<String>>>,
    }

    impl Interceptor for Tracing {
        fn name(&self) -> &str {
            self.name
        }

        fn intercept(&self, invocation: &Invocation<'_>, next: Next<'_>) -> BindingResult<Returned> {
            self.journal.lock().unwrap().push(format!("before {}", self.name));
            let returned = next.run(invocation);
            self.journal.lock().unwrap().push(format!("after {}", self.name));
            returned
        }
    }

    struct Replacing;

    impl Interceptor for Replacing {
        fn name(&self) -> &str {
            "replacing"
        }

        fn intercept(&self, _invocation: &Invocation<'_>, _next: Next<'_>) -> BindingResult<Returned> {
            Ok(Box::new("replaced") as Returned)
        }
    }

    #[test]
    fn test_interceptors_wrap_in_registration_order() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let binder = Binder::new("articles")
            .intercept(&[], Tracing { name: "outer", journal: Arc::clone(&journal) })
            .intercept(&["insert"], Tracing { name: "inner", journal: Arc::clone(&journal) });

        let value = binder
            .invoke("insert", None, || {
                journal.lock().unwrap().push("call".to_string());
                Ok(7_u32)
            })
            .unwrap();
        assert_eq!(value, 7);
        assert_eq!(
            *journal.lock().unwrap(),
            vec!["before outer", "before inner", "call", "after inner", "after outer"]
        );
        assert_eq!(binder.interceptors("delete"), vec!["outer"]);
    }

    #[test]
    fn test_replaced_value_of_another_type() {
        let binder = Binder::new("articles").intercept(&[], Replacing);
        let result = binder.invoke("get", None, || Ok(1_u8));
        assert!(matches!(result, Err(BindingError::Returned { .. })));

        let replaced = binder.invoke("get", None, || Ok("original")).unwrap();
        assert_eq!(replaced, "replaced");
    }
}
