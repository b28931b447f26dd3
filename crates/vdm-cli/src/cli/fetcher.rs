//! Placeholder `MediaFetcher`. The concrete video-extraction engine is an
//! external collaborator out of scope for this crate; this stub lets the
//! CLI harness exercise the queue/service plumbing end to end while
//! making it obvious at runtime that no real extractor is wired in.

use std::path::Path;

use vdm_core::fetcher::{MediaFetcher, ProgressSink};
use vdm_core::model::VideoDescriptor;

pub struct UnimplementedFetcher;

impl MediaFetcher for UnimplementedFetcher {
    fn describe(&self, url: &str) -> anyhow::Result<VideoDescriptor> {
        anyhow::bail!("no MediaFetcher backend configured: cannot describe {url}")
    }

    fn fetch(
        &self,
        descriptor: &VideoDescriptor,
        _path: &Path,
        _sink: &mut dyn ProgressSink,
    ) -> anyhow::Result<String> {
        anyhow::bail!("no MediaFetcher backend configured: cannot fetch {}", descriptor.url)
    }
}
