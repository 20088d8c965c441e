//! Outbound HTTP dispatch

pub mod dispatcher;

pub use dispatcher::ScopedBearerDispatcher;
