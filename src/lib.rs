//! PersonaChat is a terminal chat front-end for talking to a configurable AI
//! persona over a streaming model API.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`core`] owns the persona model, the session manager that binds a persona
//!   to a provider session, and the streaming consumer that folds fragments
//!   into the transcript.
//! - [`provider`] defines the provider boundary and the Gemini implementation
//!   that speaks the `streamGenerateContent` server-sent events protocol.
//! - [`api`] defines the request and response payloads used by the provider.
//! - [`ui`] runs the line-oriented persona form and conversation view.
//!
//! Runtime entrypoints live in the binary crate (`src/main.rs`) and route
//! through [`crate::cli::main`], which initializes logging and dispatches into
//! [`ui::chat_loop`] for interactive sessions.

pub mod api;
pub mod cli;
pub mod core;
pub mod provider;
pub mod ui;
pub mod utils;
