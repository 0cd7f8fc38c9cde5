//! Tile layer fetching.
//!
//! The pyramid only knows how to ask for a resource identifier and get bytes
//! back, some time later, or an error. [`TileFetcher`] is that capability;
//! [`ReqwestFetcher`] implements it over HTTP and [`CachedFetcher`] puts a
//! [`TextureCache`] in front of any fetcher.
//!
//! ```ignore
//! use std::sync::Arc;
//! use rtitiles::fetch::{CachedFetcher, ReqwestFetcher, TextureCache};
//!
//! let cache = TextureCache::new(512 * 1024 * 1024);
//! let fetcher = Arc::new(CachedFetcher::new(ReqwestFetcher::new()?, cache));
//! ```

mod cache;
mod http;

pub use cache::{CachedFetcher, TextureCache, TextureCacheStats};
pub use http::ReqwestFetcher;

#[cfg(test)]
pub use http::tests::MockFetcher;

use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;

use crate::error::FetchError;

/// Boxed future type for dyn-compatible async methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Asynchronous access to tile layer images.
///
/// Implementations must be `Send + Sync`: the pyramid shares one fetcher
/// between all background fetch tasks through `Arc<dyn TileFetcher>`.
pub trait TileFetcher: Send + Sync {
    /// Fetch the resource identified by `url`.
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Bytes, FetchError>>;

    /// Drop any cached payloads. The default does nothing.
    fn clear_cache(&self) {}
}
