//! `vdm search <query>` — submit a query to `search_pool` and print
//! whichever of `SearchComplete`/`SearchFailed` comes back.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::Result;

use vdm_core::bus::EventBus;
use vdm_core::model::{EventKind, EventPayload};
use vdm_core::search::SearchFilters;

use crate::cli::AppContext;

const SEARCH_TIMEOUT: Duration = Duration::from_secs(5);

pub fn run_search(ctx: &AppContext, query: &str, max_results: Option<usize>) -> Result<()> {
    let bus = EventBus::global();
    bus.start();

    let outcome: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));

    let complete_outcome = Arc::clone(&outcome);
    let complete_query = query.to_string();
    bus.subscribe(EventKind::SearchComplete, move |event| {
        if let EventPayload::SearchComplete { query, results, result_count } = &event.payload {
            if *query == complete_query {
                let lines: Vec<String> = results
                    .iter()
                    .map(|hit| format!("  {} — {} ({})", hit.title, hit.url, hit.author))
                    .collect();
                *complete_outcome.lock().unwrap() =
                    Some(format!("{result_count} result(s):\n{}", lines.join("\n")));
            }
        }
    });

    let failed_outcome = Arc::clone(&outcome);
    let failed_query = query.to_string();
    bus.subscribe(EventKind::SearchFailed, move |event| {
        if let EventPayload::SearchFailed { query, error } = &event.payload {
            if *query == failed_query {
                *failed_outcome.lock().unwrap() = Some(format!("search failed: {error}"));
            }
        }
    });

    if !ctx.search.search(query, SearchFilters { max_results }) {
        println!("search_pool is shut down; could not submit query");
        return Ok(());
    }

    let deadline = Instant::now() + SEARCH_TIMEOUT;
    loop {
        bus.tick();
        if let Some(message) = outcome.lock().unwrap().take() {
            println!("{message}");
            return Ok(());
        }
        if Instant::now() >= deadline {
            println!("search timed out waiting for a response");
            return Ok(());
        }
        std::thread::sleep(Duration::from_millis(20));
    }
}
