//! A gateway fetcher serving canned answers.

use bytes::Bytes;
use dashmap::DashMap;
use hermes_gateway::{Fetched, Fetcher, GatewayError, GatewayResult};
use hermes_pipeline::BoxFuture;
use serde::Serialize;

#[derive(Debug, Clone)]
enum Answer {
    Fetched(Fetched),
    Unreachable(String),
}

/// Serves fetched answers from memory and counts the fetches per URI.
///
/// Unknown URIs answer `404`.
///
/// # Example
///
/// ```ignore
/// let fetcher = StaticFetcher::new()
///     .json("resources/Gateway", &json!({"GatewayList": []}));
/// ```
#[derive(Debug, Default)]
pub struct StaticFetcher {
    answers: DashMap<String, Answer>,
    fetches: DashMap<String, usize>,
}

impl StaticFetcher {
    /// Creates a fetcher with nothing to serve.
    pub fn new() -> Self {
        Self::default()
    }

    /// Serves the body with the status.
    #[must_use]
    pub fn with(self, uri: impl Into<String>, status: u16, body: impl Into<Bytes>) -> Self {
        self.set(uri, status, body);
        self
    }

    /// Serves the value as a `200` JSON body.
    ///
    /// # Panics
    ///
    /// Panics if the value cannot be serialized.
    #[must_use]
    pub fn json<T: Serialize>(self, uri: impl Into<String>, value: &T) -> Self {
        let body = serde_json::to_vec(value).expect("serializable JSON value");
        self.with(uri, 200, body)
    }

    /// Fails the URI with a transport error.
    #[must_use]
    pub fn unreachable(self, uri: impl Into<String>, message: impl Into<String>) -> Self {
        self.answers.insert(uri.into(), Answer::Unreachable(message.into()));
        self
    }

    /// Replaces the answer of the URI.
    pub fn set(&self, uri: impl Into<String>, status: u16, body: impl Into<Bytes>) {
        self.answers
            .insert(uri.into(), Answer::Fetched(Fetched::new(status, body)));
    }

    /// Number of fetches of the URI.
    pub fn fetches(&self, uri: &str) -> usize {
        self.fetches.get(uri).map_or(0, |count| *count)
    }

    /// Number of fetches overall.
    pub fn total_fetches(&self) -> usize {
        self.fetches.iter().map(|entry| *entry.value()).sum()
    }
}

impl Fetcher for StaticFetcher {
    fn fetch<'a>(&'a self, uri: &'a str) -> BoxFuture<'a, GatewayResult<Fetched>> {
        Box::pin(async move {
            *self.fetches.entry(uri.to_string()).or_default() += 1;
            let answer = self.answers.get(uri).map(|answer| answer.value().clone());
            match answer {
                Some(Answer::Fetched(fetched)) => Ok(fetched),
                Some(Answer::Unreachable(message)) => Err(GatewayError::fetch(uri, message)),
                None => Ok(Fetched::new(404, format!("Nothing served at '{uri}'"))),
            }
        })
    }
}
