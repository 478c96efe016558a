//! # Triad Control
//!
//! A control service for a three-provider LLM workspace.
//!
//! This library provides:
//! - A conversation coordinator that sends one persona-framed prompt to
//!   Gemini, OpenAI and Abacus in parallel and merges the replies into one turn
//! - A mission monitor that starts remote orchestration workflows and folds
//!   their SSE event stream into a task board and per-provider logs
//! - An HTTP control API over both, with error notices streamed as SSE
//!
//! ## Architecture
//!
//! 1. A message arrives via the API and is appended as a pending turn
//! 2. The persona's name and role frame it into a single prompt
//! 3. Every provider is called concurrently; missing keys answer locally
//! 4. The turn is finalized once all three calls have settled
//!
//! Missions follow `idle → starting → streaming → completed | failed`. The
//! monitor owns at most one event channel and closes it before opening the next.
//!
//! ## Example
//!
//! ```rust,ignore
//! use triad_control::{config::Config, api};
//!
//! let config = Config::from_env()?;
//! api::serve(config).await?;
//! ```

pub mod api;
pub mod config;
pub mod conversation;
pub mod llm;
pub mod markup;
pub mod mission;
pub mod notify;
pub mod orchestrator;
pub mod persona;

pub use config::Config;
