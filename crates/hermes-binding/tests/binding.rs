//! Bound calls, scoped iteration and transactional flights.

use hermes_binding::{
    session_scope, Binder, BindingError, BindingResult, CallMetrics, Session, SessionBinder, SessionCreator,
    SessionScope, Transactional, ERROR_INPUT,
};
use hermes_core::http::{names, request};
use hermes_core::ContextSpec;
use hermes_pipeline::{
    Assembly, BoxFuture, Chain, Contexts, Contextual, ExecutionError, ExecutionResult, Handler,
};
use hermes_test::{TestClient, TestRequest};
use std::sync::{Arc, Mutex};

type Journal = Arc<Mutex<Vec<String>>>;

struct Recorded {
    journal: Journal,
    fail_flush: bool,
}

impl Session for Recorded {
    fn flush(&mut self) -> BindingResult<()> {
        if self.fail_flush {
            return Err(BindingError::session("store", "flush", "constraint violated"));
        }
        self.journal.lock().unwrap().push("flush".to_string());
        Ok(())
    }

    fn commit(&mut self) -> BindingResult<()> {
        self.journal.lock().unwrap().push("commit".to_string());
        Ok(())
    }

    fn rollback(&mut self) -> BindingResult<()> {
        self.journal.lock().unwrap().push("rollback".to_string());
        Ok(())
    }
}

struct Store {
    journal: Journal,
    fail_flush: bool,
}

impl SessionCreator for Store {
    fn name(&self) -> &str {
        "store"
    }

    fn create(&self) -> BindingResult<Box<dyn Session>> {
        self.journal.lock().unwrap().push("open".to_string());
        Ok(Box::new(Recorded {
            journal: Arc::clone(&self.journal),
            fail_flush: self.fail_flush,
        }))
    }
}

fn binder(journal: &Journal) -> SessionBinder {
    SessionBinder::new(Arc::new(Store {
        journal: Arc::clone(journal),
        fail_flush: false,
    }))
}

fn entries(journal: &Journal) -> Vec<String> {
    journal.lock().unwrap().clone()
}

fn touch(scope: &SessionScope) -> BindingResult<()> {
    scope.with_session(|_| ())
}

#[test]
fn test_successful_call_flushes_and_commits() {
    let journal = Journal::default();
    let scope = SessionScope::new();

    let value = binder(&journal)
        .invoke(&scope, |scope| {
            touch(scope)?;
            Ok::<_, BindingError>(3)
        })
        .unwrap();
    assert_eq!(value, 3);
    assert_eq!(entries(&journal), vec!["open", "flush", "commit"]);
    assert_eq!(scope.depth(), 0);
    assert_eq!(scope.open_sessions(), 0);
}

#[test]
fn test_failed_call_rolls_back() {
    let journal = Journal::default();
    let scope = SessionScope::new();

    let result = binder(&journal).invoke(&scope, |scope| {
        touch(scope)?;
        Err::<(), _>(BindingError::input("Invalid title"))
    });
    assert!(matches!(result, Err(BindingError::Input { .. })));
    assert_eq!(entries(&journal), vec!["open", "rollback"]);
}

#[test]
fn test_failed_flush_rolls_back() {
    let journal = Journal::default();
    let scope = SessionScope::new();
    let binder = SessionBinder::new(Arc::new(Store {
        journal: Arc::clone(&journal),
        fail_flush: true,
    }));

    let result = binder.invoke(&scope, |scope| {
        touch(scope)?;
        Ok::<_, BindingError>(())
    });
    assert!(matches!(result, Err(BindingError::Session { operation: "flush", .. })));
    assert_eq!(entries(&journal), vec!["open", "rollback"]);
}

#[test]
fn test_nested_calls_share_the_session() {
    let journal = Journal::default();
    let scope = SessionScope::new();
    let binder = binder(&journal);

    binder
        .invoke(&scope, |scope| {
            touch(scope)?;
            binder.invoke(scope, |scope| {
                touch(scope)?;
                Ok::<_, BindingError>(())
            })?;
            assert_eq!(scope.open_sessions(), 1);
            Ok::<_, BindingError>(())
        })
        .unwrap();
    assert_eq!(entries(&journal), vec!["open", "flush", "flush", "commit"]);
}

#[test]
fn test_call_without_session_leaves_the_scope_clean() {
    let journal = Journal::default();
    let scope = SessionScope::new();

    binder(&journal).invoke(&scope, |_| Ok::<_, BindingError>(())).unwrap();
    assert!(entries(&journal).is_empty());
    assert_eq!(scope.depth(), 0);
}

#[test]
fn test_lazy_iteration_keeps_the_session_open() {
    let journal = Journal::default();
    let scope = SessionScope::new();

    let items = binder(&journal)
        .invoke_iter(&scope, |scope| {
            let scope = scope.clone();
            Ok::<_, BindingError>((1..=3).map(move |item| touch(&scope).map(|()| item)))
        })
        .unwrap();
    assert!(items.is_scoped());
    assert_eq!(scope.depth(), 1);

    let collected: BindingResult<Vec<i32>> = items.collect();
    assert_eq!(collected.unwrap(), vec![1, 2, 3]);
    assert_eq!(entries(&journal), vec!["open", "flush", "commit"]);
    assert_eq!(scope.depth(), 0);
}

#[test]
fn test_failed_iteration_rolls_back_and_stops() {
    let journal = Journal::default();
    let scope = SessionScope::new();

    let mut items = binder(&journal)
        .invoke_iter(&scope, |scope| {
            let scope = scope.clone();
            Ok::<_, BindingError>((1..=3).map(move |item| -> BindingResult<i32> {
                touch(&scope)?;
                if item == 2 {
                    return Err(BindingError::input("Broken item"));
                }
                Ok(item)
            }))
        })
        .unwrap();
    assert_eq!(items.next().unwrap().unwrap(), 1);
    assert!(items.next().unwrap().is_err());
    assert!(items.next().is_none());
    assert_eq!(entries(&journal), vec!["open", "rollback"]);
}

#[test]
fn test_eager_iteration_commits_at_once() {
    let journal = Journal::default();
    let scope = SessionScope::new();

    let pulled = Journal::default();
    let items = binder(&journal)
        .invoke_iter(&scope, |scope| {
            touch(scope)?;
            let pulled = Arc::clone(&pulled);
            Ok::<_, BindingError>((1..=2).map(move |item| {
                pulled.lock().unwrap().push(item.to_string());
                Ok(item)
            }))
        })
        .unwrap();
    assert!(!items.is_scoped());
    assert_eq!(scope.depth(), 0);
    assert!(pulled.lock().unwrap().is_empty());
    assert_eq!(entries(&journal), vec!["open", "flush", "commit"]);

    assert_eq!(items.collect::<BindingResult<Vec<i32>>>().unwrap(), vec![1, 2]);
    assert_eq!(*pulled.lock().unwrap(), vec!["1", "2"]);
    assert_eq!(entries(&journal), vec!["open", "flush", "commit"]);
}

#[test]
fn test_session_binder_as_interceptor() {
    let journal = Journal::default();
    let scope = SessionScope::new();
    let service = Binder::new("articles")
        .intercept(&[], CallMetrics)
        .intercept(&["insert"], binder(&journal));

    let id = service.invoke("insert", Some(&scope), || {
        touch(&scope)?;
        Ok(12_u64)
    });
    assert_eq!(id.unwrap(), 12);
    assert_eq!(entries(&journal), vec!["open", "flush", "commit"]);

    let missing = service.invoke("insert", None, || Ok(()));
    assert!(matches!(missing, Err(BindingError::NoScope { .. })));
}

/// Inserts an article; the URI decides how the insert goes.
struct ArticleService {
    binder: SessionBinder,
}

impl Handler for ArticleService {
    fn name(&self) -> &str {
        "article_service"
    }

    fn contexts(&self) -> Contexts {
        Contexts::new().with(
            names::REQUEST,
            ContextSpec::new("Request").requires::<String>(request::URI),
        )
    }

    fn process<'a>(&'a self, chain: &'a mut Chain) -> BoxFuture<'a, ExecutionResult<()>> {
        Box::pin(async move {
            let uri: String = chain.object(names::REQUEST)?.get(request::URI).unwrap_or_default();
            let scope = session_scope(chain.arg()).ok_or_else(|| ExecutionError::missing_context("session_scope"))?;
            self.binder.invoke(&scope, |scope| {
                touch(scope)?;
                match uri.as_str() {
                    "articles/taken" => Err(BindingError::input("Title already taken")),
                    "articles/broken" => Err(BindingError::session("store", "insert", "store offline")),
                    _ => Ok(()),
                }
            })?;
            Ok(())
        })
    }
}

fn client(journal: &Journal) -> TestClient {
    let assembly = Assembly::new("transactional")
        .with(Contextual::new(Transactional::new()))
        .with(Contextual::new(ArticleService { binder: binder(journal) }));
    TestClient::new(&assembly).unwrap()
}

#[tokio::test]
async fn test_flight_commits_at_finalization() {
    let journal = Journal::default();
    let response = client(&journal).send(TestRequest::post("articles/new").build()).await.unwrap();

    assert!(response.is_success());
    assert_eq!(entries(&journal), vec!["open", "flush", "commit"]);
    let scope = session_scope(response.arg()).unwrap();
    assert!(!scope.is_keep_alive());
    assert_eq!(scope.open_sessions(), 0);
}

#[tokio::test]
async fn test_input_error_becomes_bad_request_and_rolls_back() {
    let journal = Journal::default();
    let response = client(&journal).send(TestRequest::post("articles/taken").build()).await.unwrap();

    response.assert_status(400);
    assert_eq!(response.text().as_deref(), Some("Title already taken"));
    let message = response.response().and_then(|r| r.get::<String>(ERROR_INPUT));
    assert_eq!(message.as_deref(), Some("Title already taken"));
    assert_eq!(entries(&journal), vec!["open", "rollback"]);
}

#[tokio::test]
async fn test_other_failures_roll_back() {
    let journal = Journal::default();
    let response = client(&journal).send(TestRequest::post("articles/broken").build()).await.unwrap();

    assert_eq!(response.status(), None);
    assert_eq!(entries(&journal), vec!["open", "rollback"]);
}
