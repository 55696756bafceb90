//! Concrete LLM provider implementations.

pub mod gemini;
pub mod openrouter;

pub use gemini::GeminiProvider;
pub use openrouter::OpenRouterProvider;
