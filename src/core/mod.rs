pub mod app;
pub mod builtin_providers;
pub mod chat_stream;
pub mod config;
pub mod content;
pub mod error;
pub mod error_route;
pub mod ledger;
pub mod message;
pub mod providers;
