//! Generation service façade: per-chat update, sentence generation,
//! deletion, and cache flush.

use crate::cache::{CachedModel, Clock, ModelCache, SystemClock};
use crate::chain::{ChainEngine, ChainModel};
use crate::config::Settings;
use crate::error::Error;
use crate::store::CorpusStore;
use crate::tokenizer::Tokenizer;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Reply used whenever no model exists or no acceptable sentence is found.
pub const FALLBACK_MESSAGE: &str = "i need more data";

/// The façade over tokenizer, chain engine, corpus store and model cache.
///
/// Operations on the same chat id are serialized through a per-chat lock;
/// distinct chats proceed independently.
pub struct SpeechService {
    engine: ChainEngine,
    store: CorpusStore,
    cache: ModelCache,
    grow_chain: bool,
    message_limit: usize,
    history_limit: Option<usize>,
    max_overlap_ratio: f64,
    tries: u32,
    locks: Mutex<HashMap<i64, Arc<Mutex<()>>>>,
}

impl SpeechService {
    pub fn new(settings: &Settings, store: CorpusStore, tokenizer: Tokenizer) -> Self {
        Self::with_clock(settings, store, tokenizer, Arc::new(SystemClock))
    }

    /// Like [`SpeechService::new`] but with an explicit time source, so
    /// tests can advance the cache clock deterministically.
    pub fn with_clock(
        settings: &Settings,
        store: CorpusStore,
        tokenizer: Tokenizer,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            engine: ChainEngine::new(tokenizer),
            store,
            cache: ModelCache::new(settings.model_cache_ttl, clock),
            grow_chain: settings.grow_chain,
            message_limit: settings.message_limit,
            history_limit: settings.history_limit,
            max_overlap_ratio: settings.max_overlap_ratio,
            tries: settings.tries,
            locks: Mutex::new(HashMap::new()),
        }
    }

    fn chat_lock(&self, chat_id: i64) -> Arc<Mutex<()>> {
        self.locks.lock().unwrap().entry(chat_id).or_default().clone()
    }

    /// Fold one inbound message into the chat's corpus and model.
    ///
    /// The raw text always gets the message appended. The chain is grown
    /// incrementally or rebuilt from the trailing window depending on the
    /// configured mode; a message too small to train on leaves the stored
    /// chain untouched. The cache entry is invalidated only after the row
    /// is persisted.
    pub fn update(&self, chat_id: i64, message: &str) -> Result<(), Error> {
        if message.is_empty() {
            return Err(Error::InvalidArgument("message cannot be empty".into()));
        }
        debug!("updating model for chat-id:{chat_id}");

        let delta = match self.engine.build(message) {
            Ok(model) => Some(model),
            Err(Error::InsufficientData) => None,
            Err(e) => return Err(e),
        };

        let lock = self.chat_lock(chat_id);
        let _guard = lock.lock().unwrap();

        let (old_text, old_chain) = match self.store.read(chat_id)? {
            Some(corpus) => (corpus.raw_text, corpus.chain),
            None => (String::new(), None),
        };
        let mut text = if old_text.is_empty() {
            message.to_string()
        } else {
            format!("{old_text}\n{message}")
        };

        let chain = match delta {
            // Nothing to train on, but the raw-text bounds still apply.
            None => {
                if !self.grow_chain {
                    text = last_lines(&text, self.message_limit);
                } else if let Some(limit) = self.history_limit {
                    text = last_lines(&text, limit);
                }
                old_chain
            }
            Some(delta) if self.grow_chain => {
                if let Some(limit) = self.history_limit {
                    text = last_lines(&text, limit);
                }
                let combined = match &old_chain {
                    Some(raw) => ChainModel::combine(&ChainModel::from_json(raw)?, &delta),
                    None => delta,
                };
                Some(combined.to_json())
            }
            Some(_) => {
                text = last_lines(&text, self.message_limit);
                match self.engine.build(&text) {
                    Ok(rebuilt) => Some(rebuilt.to_json()),
                    // The window no longer holds a trainable line.
                    Err(Error::InsufficientData) => None,
                    Err(e) => return Err(e),
                }
            }
        };

        self.store.upsert(chat_id, &text, chain.as_deref())?;
        self.cache.invalidate(chat_id);
        Ok(())
    }

    /// Generate a sentence for the chat. Store I/O failures propagate;
    /// every other outcome is `Ok`, falling back to a fixed reply when the
    /// chat has no model or no acceptable walk is found.
    pub fn generate(&self, chat_id: i64) -> Result<String, Error> {
        debug!("generating message for chat-id:{chat_id}");
        let lock = self.chat_lock(chat_id);
        let _guard = lock.lock().unwrap();

        let model = self.fetch_model(chat_id)?;
        let sentence = model.as_ref().and_then(|m| {
            self.engine.generate(&m.chain, &m.corpus, self.max_overlap_ratio, self.tries)
        });
        Ok(sentence.unwrap_or_else(|| FALLBACK_MESSAGE.to_string()))
    }

    /// Fetch the chat's model through the cache, building from the store
    /// on a miss. A chat without a persisted chain is cached negatively.
    fn fetch_model(&self, chat_id: i64) -> Result<Option<Arc<CachedModel>>, Error> {
        if let Some(hit) = self.cache.get(chat_id) {
            return Ok(hit);
        }
        debug!("fetching model for chat-id:{chat_id}");
        let loaded = match self.store.read(chat_id)? {
            Some(corpus) => match corpus.chain {
                Some(raw) => Some(Arc::new(CachedModel {
                    chain: ChainModel::from_json(&raw)?,
                    corpus: corpus.raw_text,
                })),
                None => None,
            },
            None => None,
        };
        self.cache.put(chat_id, loaded.clone());
        Ok(loaded)
    }

    /// Drop the chat's corpus row and its cache entry.
    pub fn delete(&self, chat_id: i64) -> Result<(), Error> {
        debug!("deleting model for chat-id:{chat_id}");
        let lock = self.chat_lock(chat_id);
        let _guard = lock.lock().unwrap();

        self.store.delete(chat_id)?;
        self.cache.invalidate(chat_id);
        Ok(())
    }

    /// Clear every cache entry. Corpus rows are untouched.
    pub fn flush(&self) {
        debug!("cleaning up models' cache");
        self.cache.invalidate_all();
    }
}

fn last_lines(text: &str, limit: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(limit);
    lines[start..].join("\n")
}
