//! Concurrent download-orchestration runtime: the engineering core of a
//! desktop video-download manager, with GUI, media extraction, and search
//! left as external collaborators (see `fetcher`, `search`, `notify`).

pub mod bus;
pub mod callbacks;
pub mod errors;
pub mod fetcher;
pub mod logging;
pub mod model;
pub mod notify;
pub mod paths;
pub mod pool;
pub mod queue;
pub mod search;
pub mod service;
pub mod settings;
