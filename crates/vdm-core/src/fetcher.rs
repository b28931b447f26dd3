//! `MediaFetcher`: the external collaborator that does the actual media
//! extraction and download. The core never implements this trait itself;
//! it only drives it from the Download Service's worker body.

use std::path::Path;

use crate::model::VideoDescriptor;

/// Sink the fetcher reports progress through. Implemented by the Download
/// Service's worker body; see `service::ProgressReporter`.
pub trait ProgressSink: Send {
    /// Report that `downloaded_bytes` of an estimated `total_bytes` are
    /// done. `total_bytes` is `None` when the fetcher cannot estimate a
    /// total (e.g. chunked transfer with no `Content-Length`).
    fn on_progress(&mut self, downloaded_bytes: u64, total_bytes: Option<u64>);

    /// `true` once the Download Service has requested cancellation.
    /// Implementations of `MediaFetcher` must check this on every
    /// progress callback and abort early when it flips.
    fn is_cancelled(&self) -> bool;
}

/// Outcome of a subtitle-acquisition attempt bundled with the main fetch,
/// used to implement the subtitle non-fatal rule: an HTTP-404-or-equivalent
/// subtitle failure does not fail the overall fetch if the media artifact
/// exists.
#[derive(Debug, Clone)]
pub enum SubtitleOutcome {
    Downloaded,
    NotFound,
    Skipped,
}

/// The external video-extraction/download capability. A concrete
/// implementation (e.g. wrapping a third-party extraction tool) lives
/// outside this crate; `vdm-core` only depends on this trait.
pub trait MediaFetcher: Send + Sync {
    /// Resolve a URL into a descriptor without downloading anything.
    fn describe(&self, url: &str) -> anyhow::Result<VideoDescriptor>;

    /// Download `descriptor` to `path`, reporting progress through `sink`.
    /// Returns the final on-disk path on success. Errors surface as raw
    /// messages for `errors::classify` to bucket.
    fn fetch(
        &self,
        descriptor: &VideoDescriptor,
        path: &Path,
        sink: &mut dyn ProgressSink,
    ) -> anyhow::Result<String>;

    /// Like `fetch`, but also attempts to acquire subtitles. The returned
    /// `SubtitleOutcome` lets the caller apply the subtitle non-fatal rule
    /// even when this call's `Result` is `Ok`.
    fn fetch_with_subtitles(
        &self,
        descriptor: &VideoDescriptor,
        path: &Path,
        sink: &mut dyn ProgressSink,
    ) -> anyhow::Result<(String, SubtitleOutcome)> {
        // Default implementation for fetchers that don't special-case
        // subtitles: delegate to `fetch` and report subtitles as skipped.
        self.fetch(descriptor, path, sink)
            .map(|path| (path, SubtitleOutcome::Skipped))
    }
}
