//! Per-chat statistical sentence generation.
//!
//! Accumulates text contributed by a conversation, maintains an order-2
//! weighted transition table per chat, persists both in SQLite, and serves
//! generated sentences through a TTL model cache. The transport/command
//! layer sits outside this crate and talks to [`SpeechService`].

pub mod cache;
pub mod chain;
pub mod config;
pub mod error;
pub mod speech;
pub mod store;
pub mod tokenizer;

pub use cache::{CachedModel, Clock, ModelCache, SystemClock};
pub use chain::{BEGIN, ChainEngine, ChainModel, END};
pub use config::{ConfigError, Settings};
pub use error::Error;
pub use speech::{FALLBACK_MESSAGE, SpeechService};
pub use store::{Corpus, CorpusStore};
pub use tokenizer::{LanguageTagger, TaggedDoc, TaggedWord, Tokenizer};
