//! Placeholder `SearchBackend`. The concrete search provider is an
//! external collaborator out of scope for this crate; this stub lets the
//! CLI harness exercise `SearchService`/`search_pool` plumbing while
//! making it obvious at runtime that no real provider is wired in.

use vdm_core::search::{SearchBackend, SearchFilters, SearchHit};

pub struct UnimplementedSearchBackend;

impl SearchBackend for UnimplementedSearchBackend {
    fn search(&self, query: &str, _filters: &SearchFilters) -> anyhow::Result<Vec<SearchHit>> {
        anyhow::bail!("no SearchBackend provider configured: cannot search for {query}")
    }
}
