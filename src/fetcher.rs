// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! The one-method fetch capability the cache falls through to on a full miss.
//!
//! Any `Fn() -> impl Future<Output = Result<Option<T>, E>>` closure is a
//! [`Fetcher`], so call sites rarely name the trait:
//!
//! ```
//! use locus_core::Fetcher;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let fetch = || async { Ok::<_, std::io::Error>(Some(42)) };
//! assert_eq!(fetch.fetch().await.unwrap(), Some(42));
//! # }
//! ```

use std::future::Future;

/// Produces the authoritative value for a cache key.
///
/// `Ok(None)` means "no such record"; the cache then stores nothing.
pub trait Fetcher: Send + Sync {
    type Output: Send;
    type Error: Send;

    fn fetch(&self) -> impl Future<Output = Result<Option<Self::Output>, Self::Error>> + Send;
}

impl<F, Fut, T, E> Fetcher for F
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<Option<T>, E>> + Send,
    T: Send,
    E: Send,
{
    type Output = T;
    type Error = E;

    fn fetch(&self) -> impl Future<Output = Result<Option<T>, E>> + Send {
        (self)()
    }
}
