//! `SearchBackend`: the external search-provider collaborator, invoked
//! from `ThreadPoolRegistry::search_pool` by `SearchService`. The backend
//! itself is out of scope for this crate's implementation; only the
//! interface and the orchestration that dispatches to it are defined
//! here.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::bus::EventBus;
use crate::model::{Event, EventPayload};
use crate::pool::ThreadPoolRegistry;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchFilters {
    pub max_results: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub url: String,
    pub title: String,
    pub author: String,
}

/// A third-party search provider. Implementations run on the
/// `search_pool` worker threads; the core drives this trait but never
/// implements it.
pub trait SearchBackend: Send + Sync {
    fn search(&self, query: &str, filters: &SearchFilters) -> anyhow::Result<Vec<SearchHit>>;
}

/// Orchestrates search requests across `search_pool`, the `SearchBackend`
/// analogue of the Download Service: submits the backend call to the
/// pool and publishes `SearchComplete`/`SearchFailed` when it returns.
pub struct SearchService {
    backend: Arc<dyn SearchBackend>,
}

impl SearchService {
    pub fn new(backend: Arc<dyn SearchBackend>) -> Self {
        Self { backend }
    }

    /// Submits `query` to `search_pool`. Returns `false` without running
    /// anything if the pool has been shut down.
    pub fn search(&self, query: impl Into<String>, filters: SearchFilters) -> bool {
        let query = query.into();
        let backend = Arc::clone(&self.backend);
        let Ok(pool) = ThreadPoolRegistry::global().search_pool() else { return false };
        pool.submit(move || {
            run_search(backend.as_ref(), query, filters);
        })
        .is_ok()
    }
}

/// Runs the backend call and publishes the corresponding event. Free
/// function (rather than a method) so tests can drive it directly
/// without going through the pool, same as `service::run_worker`.
fn run_search(backend: &dyn SearchBackend, query: String, filters: SearchFilters) -> EventPayload {
    let payload = match backend.search(&query, &filters) {
        Ok(results) => {
            let result_count = results.len();
            EventPayload::SearchComplete { query, results, result_count }
        }
        Err(err) => EventPayload::SearchFailed { query, error: err.to_string() },
    };
    EventBus::global().publish(Event::new(payload.clone()));
    payload
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubBackend {
        hits: anyhow::Result<Vec<SearchHit>>,
    }

    impl SearchBackend for StubBackend {
        fn search(&self, _query: &str, _filters: &SearchFilters) -> anyhow::Result<Vec<SearchHit>> {
            match &self.hits {
                Ok(hits) => Ok(hits.clone()),
                Err(err) => Err(anyhow::anyhow!(err.to_string())),
            }
        }
    }

    #[test]
    fn successful_search_reports_complete_with_results() {
        let hits = vec![SearchHit {
            url: "https://x/1".into(),
            title: "t".into(),
            author: "a".into(),
        }];
        let backend = StubBackend { hits: Ok(hits.clone()) };
        let payload = run_search(&backend, "cats".into(), SearchFilters { max_results: None });
        match payload {
            EventPayload::SearchComplete { query, results, result_count } => {
                assert_eq!(query, "cats");
                assert_eq!(results, hits);
                assert_eq!(result_count, 1);
            }
            other => panic!("expected SearchComplete, got {other:?}"),
        }
    }

    #[test]
    fn failing_search_reports_failed() {
        let backend = StubBackend { hits: Err(anyhow::anyhow!("provider unreachable")) };
        let payload = run_search(&backend, "dogs".into(), SearchFilters { max_results: None });
        match payload {
            EventPayload::SearchFailed { query, error } => {
                assert_eq!(query, "dogs");
                assert!(error.contains("unreachable"));
            }
            other => panic!("expected SearchFailed, got {other:?}"),
        }
    }

    #[test]
    fn empty_results_still_reports_complete() {
        let backend = StubBackend { hits: Ok(Vec::new()) };
        let payload = run_search(&backend, "nothing".into(), SearchFilters { max_results: None });
        match payload {
            EventPayload::SearchComplete { result_count, .. } => assert_eq!(result_count, 0),
            other => panic!("expected SearchComplete, got {other:?}"),
        }
    }
}
