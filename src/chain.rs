//! Order-2 weighted transition table and sentence generation.
//!
//! States are windows of the last two tokens; two sentinel tokens mark the
//! begin and end of every trainable sentence. Weights are plain counts, and
//! next-token probabilities are evaluated lazily per step from the counts.

use crate::error::Error;
use crate::tokenizer::Tokenizer;
use rand::Rng;
use rand::distributions::{Distribution, WeightedIndex};
use regex::Regex;
use std::collections::BTreeMap;
use tracing::debug;

/// Sentinel marking the start of a sequence.
pub const BEGIN: &str = "___BEGIN__";
/// Sentinel marking the end of a sequence.
pub const END: &str = "___END__";

/// Longest verbatim run tolerated regardless of sentence length.
const MAX_OVERLAP_TOTAL: usize = 15;
/// Hard cap on a single walk so generation never spins on a cyclic table.
const MAX_WALK_LENGTH: usize = 1000;

type State = (String, String);

/// Weighted state-transition table: state → next token → count.
///
/// `BTreeMap` keeps both levels sorted, so the serialized form is a total
/// function of the table's contents regardless of insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChainModel {
    transitions: BTreeMap<State, BTreeMap<String, u64>>,
}

impl ChainModel {
    /// Record one begin→…→end walk over a tokenized sentence.
    fn record(&mut self, words: &[String]) {
        let mut state: State = (BEGIN.to_string(), BEGIN.to_string());
        for word in words {
            *self
                .transitions
                .entry(state.clone())
                .or_default()
                .entry(word.clone())
                .or_insert(0) += 1;
            state = (state.1, word.clone());
        }
        *self
            .transitions
            .entry(state)
            .or_default()
            .entry(END.to_string())
            .or_insert(0) += 1;
    }

    /// Structural union of two tables, summing weights on shared edges.
    /// Commutative and associative.
    pub fn combine(a: &ChainModel, b: &ChainModel) -> ChainModel {
        let mut merged = a.clone();
        for (state, targets) in &b.transitions {
            let entry = merged.transitions.entry(state.clone()).or_default();
            for (token, count) in targets {
                *entry.entry(token.clone()).or_insert(0) += count;
            }
        }
        merged
    }

    /// Number of state→token edges in the table.
    pub fn edge_count(&self) -> usize {
        self.transitions.values().map(|targets| targets.len()).sum()
    }

    /// Weight of one edge, zero if absent.
    pub fn weight(&self, state: (&str, &str), token: &str) -> u64 {
        self.transitions
            .get(&(state.0.to_string(), state.1.to_string()))
            .and_then(|targets| targets.get(token))
            .copied()
            .unwrap_or(0)
    }

    /// Serialize to the wire format: a JSON array of
    /// `[[state_a, state_b], {token: count}]` entries in key order.
    pub fn to_json(&self) -> String {
        let entries: Vec<_> = self.transitions.iter().collect();
        serde_json::to_string(&entries).expect("chain serialization cannot fail")
    }

    /// Reconstruct a table from its wire format. Round-trips exactly:
    /// same states, same edges, same weights.
    pub fn from_json(raw: &str) -> Result<ChainModel, Error> {
        let entries: Vec<(State, BTreeMap<String, u64>)> = serde_json::from_str(raw)?;
        Ok(ChainModel { transitions: entries.into_iter().collect() })
    }
}

/// Builds chains from raw text and generates sentences from them.
///
/// The tokenizer is injected at construction; the engine itself only deals
/// in opaque token strings.
pub struct ChainEngine {
    tokenizer: Tokenizer,
    quotes: Regex,
}

impl ChainEngine {
    pub fn new(tokenizer: Tokenizer) -> Self {
        Self { tokenizer, quotes: Regex::new(r#"["']"#).unwrap() }
    }

    /// Build a model from newline-delimited text.
    ///
    /// Quotes are stripped before tokenization. Lines with fewer than two
    /// tokens are not trainable; if no line trains, the text is
    /// insufficient and construction fails rather than producing a
    /// degenerate table.
    pub fn build(&self, text: &str) -> Result<ChainModel, Error> {
        let cleaned = self.quotes.replace_all(text, "");
        let mut model = ChainModel::default();
        let mut trained = false;
        for line in cleaned.lines() {
            let words = self.tokenizer.split(line);
            if words.len() < 2 {
                continue;
            }
            model.record(&words);
            trained = true;
        }
        if !trained {
            debug!("cannot create a chain from the given text");
            return Err(Error::InsufficientData);
        }
        Ok(model)
    }

    /// Generate one sentence with a weighted random walk, retrying up to
    /// `tries` times. A walk is rejected when a run of its tokens appears
    /// verbatim in `corpus` and that run is longer than `max_overlap_ratio`
    /// of the walk's own length; a run exactly at the ratio is tolerated.
    /// Returns `None` when the budget runs out.
    pub fn generate(
        &self,
        model: &ChainModel,
        corpus: &str,
        max_overlap_ratio: f64,
        tries: u32,
    ) -> Option<String> {
        let mut rng = rand::thread_rng();
        for _ in 0..tries {
            let Some(words) = self.walk(model, &mut rng) else {
                continue;
            };
            if self.overlap_ok(&words, corpus, max_overlap_ratio) {
                return Some(self.tokenizer.join(&words));
            }
        }
        None
    }

    fn walk<R: Rng>(&self, model: &ChainModel, rng: &mut R) -> Option<Vec<String>> {
        let mut state: State = (BEGIN.to_string(), BEGIN.to_string());
        let mut words = Vec::new();
        while words.len() < MAX_WALK_LENGTH {
            let targets = model.transitions.get(&state)?;
            let dist = WeightedIndex::new(targets.values()).ok()?;
            let token = targets.keys().nth(dist.sample(rng))?.clone();
            if token == END {
                return Some(words);
            }
            words.push(token.clone());
            state = (state.1, token);
        }
        // Walk ran away; count it as a failed try.
        None
    }

    fn overlap_ok(&self, words: &[String], corpus: &str, max_overlap_ratio: f64) -> bool {
        let max_overlap = (max_overlap_ratio * words.len() as f64).round() as usize;
        // Runs up to max_overlap tokens are tolerated, so scan for one
        // token more than that.
        let gram_length = max_overlap.min(MAX_OVERLAP_TOTAL) + 1;
        if gram_length > words.len() {
            return true;
        }
        words
            .windows(gram_length)
            .all(|gram| !corpus.contains(&self.tokenizer.join(gram)))
    }
}
