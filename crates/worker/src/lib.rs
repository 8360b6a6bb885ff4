//! Request interception engine for swcache.
//!
//! This crate classifies requests, applies caching strategies over the
//! SQLite cache from `swcache-core`, runs the install/activate lifecycle and
//! expiry cleanup, and answers control messages from pages.

pub mod context;
pub mod control;
pub mod fetch;
pub mod lifecycle;
pub mod matcher;
pub mod notify;
pub mod scheduler;
pub mod strategy;

#[cfg(test)]
pub(crate) mod test_support;

pub use context::{Event, WorkerContext};
pub use control::{
    CleanupStatusReply, ControlChannel, ControlHandle, ControlMessage, SwConfigReply, humanize, humanize_delta,
};
pub use fetch::{
    Credentials, FetchConfig, HttpNetwork, Method, Network, Request, RequestMode, Response, ResponseKind, ResponseSource,
};
pub use lifecycle::{ClientHost, HeadlessHost, LifecycleController, LifecycleState, Notification, WindowClient};
pub use matcher::{Classification, ExclusionList, PatternMatcher, Rule};
pub use scheduler::{CleanupReport, CleanupStatus, ExpiryScheduler};
pub use strategy::StrategyEngine;
