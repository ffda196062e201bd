//! PromptGate: a text-generation request broker.
//!
//! A prompt is answered from the first tier that has it: a static answer
//! table, a response cache, or an inference provider whose output is
//! sanitized and written back to the cache.

pub mod answers;
pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod prewarm;
pub mod providers;
pub mod resolver;
pub mod utils;

pub use answers::StaticAnswers;
pub use cache::{CachePolicy, ResponseCache};
pub use config::Config;
pub use error::{ConfigError, PromptGateError, ProviderError, ProviderErrorKind, Result};
pub use resolver::{Resolution, ResolutionSource, Resolver};
