//! Gateway repositories.

use crate::gateway::{Gateway, Match, Query};
use dashmap::DashMap;
use hermes_core::http::Headers;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A shared repository as carried by the request context.
pub type SharedRepository = Arc<dyn Repository>;

/// Finds gateways for requests.
pub trait Repository: Send + Sync + 'static {
    /// The first gateway matching the query.
    fn find(&self, query: &Query<'_>) -> Option<Match>;

    /// The methods any gateway allows for the headers and URI, `OPTIONS`
    /// excluded.
    fn allows_for(&self, headers: Option<&Headers>, uri: Option<&str>) -> BTreeSet<String>;

    /// The cache kept for the identifier, created on first use.
    fn obtain_cache(&self, identifier: &str) -> Arc<Cache>;
}

/// Answers cached by key, each for a limited time.
#[derive(Debug, Default)]
pub struct Cache {
    entries: DashMap<String, (bool, Instant)>,
}

impl Cache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// The answer under the key, if younger than `ttl`.
    pub fn get(&self, key: &str, ttl: Duration) -> Option<bool> {
        let entry = self.entries.get(key)?;
        let (answer, at) = *entry;
        (at.elapsed() < ttl).then_some(answer)
    }

    /// Stores an answer.
    pub fn insert(&self, key: impl Into<String>, answer: bool) {
        self.entries.insert(key.into(), (answer, Instant::now()));
    }

    /// Number of cached answers.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn union(left: &[usize], right: &[usize]) -> Vec<usize> {
    let mut merged: Vec<usize> = left.iter().chain(right).copied().collect();
    merged.sort_unstable();
    merged.dedup();
    merged
}

fn intersection(left: &[usize], right: &[usize]) -> Vec<usize> {
    left.iter().copied().filter(|position| right.binary_search(position).is_ok()).collect()
}

/// An ordered gateway list, matched first-fit.
///
/// Method and error indexes narrow the candidates before any regex runs.
pub struct GatewayRepository {
    gateways: Vec<Arc<Gateway>>,
    by_method: HashMap<String, Vec<usize>>,
    any_method: Vec<usize>,
    by_error: HashMap<u16, Vec<usize>>,
    no_error: Vec<usize>,
    caches: DashMap<String, Arc<Cache>>,
}

impl GatewayRepository {
    /// Creates the repository over gateways in matching order.
    pub fn new(gateways: Vec<Gateway>) -> Self {
        let gateways: Vec<Arc<Gateway>> = gateways.into_iter().map(Arc::new).collect();
        let mut by_method: HashMap<String, Vec<usize>> = HashMap::new();
        let mut any_method = Vec::new();
        let mut by_error: HashMap<u16, Vec<usize>> = HashMap::new();
        let mut no_error = Vec::new();
        for (position, gateway) in gateways.iter().enumerate() {
            if gateway.methods().is_empty() {
                any_method.push(position);
            }
            for method in gateway.methods() {
                by_method.entry(method.clone()).or_default().push(position);
            }
            if gateway.errors().is_empty() {
                no_error.push(position);
            }
            for error in gateway.errors() {
                by_error.entry(*error).or_default().push(position);
            }
        }
        Self {
            gateways,
            by_method,
            any_method,
            by_error,
            no_error,
            caches: DashMap::new(),
        }
    }

    /// The gateways in matching order.
    pub fn gateways(&self) -> &[Arc<Gateway>] {
        &self.gateways
    }

    /// Number of gateways.
    pub fn len(&self) -> usize {
        self.gateways.len()
    }

    /// Whether there are no gateways.
    pub fn is_empty(&self) -> bool {
        self.gateways.is_empty()
    }

    fn candidates(&self, method: Option<&str>, error: Option<u16>) -> Vec<usize> {
        let by_method = method.map(|method| {
            let listed = self.by_method.get(&method.to_uppercase()).map_or(&[][..], Vec::as_slice);
            union(listed, &self.any_method)
        });
        let by_error = match error {
            Some(error) => self.by_error.get(&error).cloned().unwrap_or_default(),
            None => self.no_error.clone(),
        };
        match by_method {
            Some(by_method) => intersection(&by_error, &by_method),
            None => by_error,
        }
    }
}

impl Repository for GatewayRepository {
    fn find(&self, query: &Query<'_>) -> Option<Match> {
        self.candidates(query.method, query.error)
            .into_iter()
            .find_map(|position| {
                let gateway = &self.gateways[position];
                gateway.matches(query).map(|groups| Match {
                    gateway: Arc::clone(gateway),
                    groups,
                })
            })
    }

    fn allows_for(&self, headers: Option<&Headers>, uri: Option<&str>) -> BTreeSet<String> {
        let query = Query {
            headers,
            uri,
            ..Query::default()
        };
        self.no_error
            .iter()
            .map(|position| &self.gateways[*position])
            .filter(|gateway| gateway.matches(&query).is_some())
            .flat_map(|gateway| gateway.methods().iter().cloned())
            .filter(|method| method != "OPTIONS")
            .collect()
    }

    fn obtain_cache(&self, identifier: &str) -> Arc<Cache> {
        Arc::clone(self.caches.entry(identifier.to_string()).or_default().value())
    }
}

impl fmt::Debug for GatewayRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayRepository")
            .field("gateways", &self.gateways.len())
            .field("caches", &self.caches.len())
            .finish()
    }
}

/// Several repositories searched in order.
#[derive(Clone)]
pub struct RepositoryJoined {
    repositories: Vec<SharedRepository>,
}

impl RepositoryJoined {
    /// Joins the repositories; earlier ones take precedence.
    pub fn new(repositories: Vec<SharedRepository>) -> Self {
        Self { repositories }
    }
}

impl Repository for RepositoryJoined {
    fn find(&self, query: &Query<'_>) -> Option<Match> {
        self.repositories.iter().find_map(|repository| repository.find(query))
    }

    fn allows_for(&self, headers: Option<&Headers>, uri: Option<&str>) -> BTreeSet<String> {
        self.repositories
            .iter()
            .flat_map(|repository| repository.allows_for(headers, uri))
            .collect()
    }

    fn obtain_cache(&self, identifier: &str) -> Arc<Cache> {
        match self.repositories.first() {
            Some(repository) => repository.obtain_cache(identifier),
            None => Arc::new(Cache::new()),
        }
    }
}

impl fmt::Debug for RepositoryJoined {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RepositoryJoined")
            .field("repositories", &self.repositories.len())
            .finish()
    }
}
