pub mod diff;
pub mod fetcher;
pub mod scheduler;
pub mod scorer;
pub mod sinks;
pub mod sweep;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod traits;
pub mod watcher;
pub mod watchlist;
