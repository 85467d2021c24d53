//! Waiting primitives over a [`host_page::HostPage`].
//!
//! - [`ElementWaiter`]: resolve once a selector matches, bounded by a timeout
//! - [`ChangeWatcher`] / [`WatcherRegistry`]: follow one attribute until stopped
//! - [`PollPolicy`] / [`Attempts`]: bounded, cancellable fixed-interval polling

pub mod errors;
mod poll;
mod waiter;
mod watcher;

pub use errors::*;
pub use poll::*;
pub use waiter::*;
pub use watcher::*;
