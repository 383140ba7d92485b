//! tokenlens counts LLM tokens for plain text and PDFs and holds streaming
//! chats about that content.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`core`] owns the provider adapters, the two chat contexts, token usage
//!   accounting, error routing, and the background turn service.
//! - [`api`] defines the content, fragment, and token-count types shared by
//!   providers and the orchestrator.
//! - [`cli`] parses arguments, manages settings, and runs the chat front end.
//! - [`utils`] holds logging setup and test helpers.
//!
//! Runtime entrypoints live in the binary crate (`src/main.rs`) and route
//! through [`crate::cli::main`].

pub mod api;
pub mod cli;
pub mod core;
pub mod utils;
