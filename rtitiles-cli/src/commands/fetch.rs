//! Fetch command - prefetch every tile of a pyramid level.

use std::path::PathBuf;
use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};
use rtitiles::{
    CachedFetcher, PyramidOptions, ReqwestFetcher, TextureCache, TileFetcher, TilePyramid,
};

use super::common::{check_level, format_size, ImageDescription};
use crate::error::CliError;

/// Arguments for the fetch command.
pub struct FetchArgs {
    pub description: PathBuf,
    pub level: usize,
    pub cache_mb: u64,
    pub timeout: u64,
}

/// Outcome of a prefetch run.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct PrefetchReport {
    pub loaded: usize,
    /// Indices of nodes with at least one failed layer.
    pub failed: Vec<usize>,
}

/// Run the fetch command.
pub fn run(args: FetchArgs) -> Result<(), CliError> {
    let description = ImageDescription::load(&args.description)?;
    let layout = description.layout()?;
    check_level(&layout, args.level)?;
    let content_free = layout.content_free_count(args.level);

    let runtime =
        tokio::runtime::Runtime::new().map_err(|e| CliError::RuntimeCreation(e.to_string()))?;

    runtime.block_on(fetch_level(args, description, content_free))
}

async fn fetch_level(
    args: FetchArgs,
    description: ImageDescription,
    content_free: usize,
) -> Result<(), CliError> {
    let cache = TextureCache::new(cache_capacity(args.cache_mb));
    let http = ReqwestFetcher::with_timeout(args.timeout)?;
    let fetcher: Arc<dyn TileFetcher> = Arc::new(CachedFetcher::new(http, cache.clone()));

    let mut pyramid = TilePyramid::new(
        description.config,
        description.content,
        PyramidOptions::default(),
        fetcher,
    )?;

    let progress = progress_bar();
    let report = prefetch(&mut pyramid, args.level, &progress).await;
    progress.finish_and_clear();

    println!(
        "Level {}: {} tiles loaded, {} failed, {} content-free ({} cached)",
        args.level,
        report.loaded,
        report.failed.len(),
        content_free,
        format_size(cache.size_bytes()),
    );
    for &index in &report.failed {
        println!("  node {}:", index);
        for url in pyramid.resource_ids(index) {
            println!("    {}", url);
        }
    }
    pyramid.dispose();

    if report.failed.is_empty() {
        Ok(())
    } else {
        Err(CliError::FailedTiles(report.failed.len()))
    }
}

/// Request every node of `level` and wait until everything in flight settles.
pub async fn prefetch(
    pyramid: &mut TilePyramid,
    level: usize,
    progress: &ProgressBar,
) -> PrefetchReport {
    pyramid.request_level(level);
    progress.set_length(pyramid.in_flight() as u64);
    tracing::info!(level, tiles = pyramid.in_flight(), "prefetching level");

    let mut report = PrefetchReport::default();
    while let Some(event) = pyramid.next_load_event().await {
        if event.success {
            report.loaded += 1;
        } else {
            report.failed.push(event.index);
        }
        progress.inc(1);
    }
    report.failed.sort_unstable();
    report
}

/// Cache size in bytes for a size given in megabytes.
fn cache_capacity(cache_mb: u64) -> u64 {
    cache_mb.saturating_mul(1024 * 1024)
}

fn progress_bar() -> ProgressBar {
    let style = ProgressStyle::with_template(
        "{spinner} [{elapsed_precise}] [{bar:40}] {pos}/{len} tiles ({eta})",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("=> ");
    let progress = ProgressBar::new(0);
    progress.set_style(style);
    progress
}
