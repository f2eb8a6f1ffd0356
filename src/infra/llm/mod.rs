//! OpenAI-compatible chat completion endpoint used to interpret scenarios.

pub mod client;

pub use client::ChatCompletionGenerator;
