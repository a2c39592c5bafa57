//! Sentence tokenization: plain whitespace words, or composite tokens
//! enriched with part-of-speech and dependency tags from external NLP
//! processors.

use regex::Regex;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// One word as produced by a language processor.
#[derive(Debug, Clone)]
pub struct TaggedWord {
    pub text: String,
    /// Part-of-speech label.
    pub pos: String,
    /// Syntactic-dependency label.
    pub dep: String,
}

/// A tagged document: the words plus the processor's per-document
/// language confidence scores.
#[derive(Debug, Clone, Default)]
pub struct TaggedDoc {
    pub words: Vec<TaggedWord>,
    pub language_scores: HashMap<String, f64>,
}

/// External language processor, one per configured language code.
pub trait LanguageTagger: Send + Sync {
    fn tag(&self, text: &str) -> TaggedDoc;
}

/// Splits sentences into tokens and joins tokens back into display text.
///
/// The `Tagged` variant composes `word::POS::DEP` tokens so the chain's
/// string-keyed table can carry grammatical state without changing shape.
pub enum Tokenizer {
    Plain,
    Tagged {
        /// Configured language codes, parallel to `processors`. The first
        /// entry is the default processor.
        languages: Vec<String>,
        processors: Vec<Arc<dyn LanguageTagger>>,
        /// Removes the space before clause-trailing punctuation on join.
        spacing: Regex,
    },
}

impl Tokenizer {
    pub fn plain() -> Self {
        Self::Plain
    }

    /// Build a tagged tokenizer from an explicit language-code → processor
    /// map. An empty map degrades to plain tokenization without error.
    pub fn tagged(processors: Vec<(String, Arc<dyn LanguageTagger>)>) -> Self {
        if processors.is_empty() {
            debug!("no language processors loaded, using plain tokenization");
            return Self::Plain;
        }
        let (languages, processors): (Vec<_>, Vec<_>) = processors.into_iter().unzip();
        Self::Tagged {
            languages,
            processors,
            spacing: Regex::new(r#"\s([!?.,;"](?:\s|$))"#).unwrap(),
        }
    }

    /// Build a tokenizer for the configured language codes, resolving each
    /// against the caller's processor registry. Codes with no processor
    /// are skipped; if none resolve, tokenization degrades to plain.
    pub fn for_languages(
        languages: &[String],
        registry: &HashMap<String, Arc<dyn LanguageTagger>>,
    ) -> Self {
        let processors: Vec<_> = languages
            .iter()
            .filter_map(|lang| match registry.get(lang) {
                Some(processor) => Some((lang.clone(), Arc::clone(processor))),
                None => {
                    warn!("{lang} language processor not found");
                    None
                }
            })
            .collect();
        Self::tagged(processors)
    }

    /// Split one sentence into tokens.
    pub fn split(&self, sentence: &str) -> Vec<String> {
        match self {
            Self::Plain => sentence.split_whitespace().map(str::to_string).collect(),
            Self::Tagged { .. } => {
                debug!("performing n.l.p.");
                self.process(sentence)
                    .words
                    .iter()
                    .map(|w| format!("{}::{}::{}", w.text, w.pos, w.dep))
                    .collect()
            }
        }
    }

    /// Join tokens back into a sentence, stripping any tags.
    pub fn join(&self, tokens: &[String]) -> String {
        match self {
            Self::Plain => tokens.join(" "),
            Self::Tagged { spacing, .. } => {
                let sentence = tokens
                    .iter()
                    .map(|t| t.split("::").next().unwrap_or(t.as_str()))
                    .collect::<Vec<_>>()
                    .join(" ");
                spacing.replace_all(&sentence, "$1").into_owned()
            }
        }
    }

    /// Tag with the default processor, then re-tag with a better-scoring
    /// configured processor if the default's own scores point elsewhere.
    /// Only the first processor's output ever supplies the score query.
    fn process(&self, text: &str) -> TaggedDoc {
        let Self::Tagged { languages, processors, .. } = self else {
            return TaggedDoc::default();
        };
        let doc = processors[0].tag(text);
        let guess = doc
            .language_scores
            .iter()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(Ordering::Equal))
            .map(|(lang, _)| lang.clone());
        if let Some(guess) = guess {
            if guess != languages[0] {
                if let Some(idx) = languages.iter().position(|l| *l == guess) {
                    debug!("re-tagging with the {guess} processor");
                    return processors[idx].tag(text);
                }
            }
        }
        doc
    }
}
