//! Interchangeable spoken phrasings
//!
//! A [`PhrasePool`] holds equivalent templates and asks its
//! [`PhraseSelector`] which one to use, so production can vary wording while
//! tests pin it with [`RoundRobin`].

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Chooses one of `count` alternatives
pub trait PhraseSelector: Send {
    /// Index in `0..count`; `count` is never zero
    fn select(&mut self, count: usize) -> usize;
}

/// Cycles through the alternatives in order
#[derive(Debug, Default, Clone)]
pub struct RoundRobin {
    next: usize,
}

impl PhraseSelector for RoundRobin {
    fn select(&mut self, count: usize) -> usize {
        let index = self.next % count;
        self.next = self.next.wrapping_add(1);
        index
    }
}

/// Always picks the first alternative
#[derive(Debug, Default, Clone, Copy)]
pub struct FirstPhrase;

impl PhraseSelector for FirstPhrase {
    fn select(&mut self, _count: usize) -> usize {
        0
    }
}

/// Uniform random choice from a seeded generator
#[derive(Debug, Clone)]
pub struct SeededRandom {
    rng: StdRng,
}

impl SeededRandom {
    /// Deterministic sequence for a given seed
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Seeded from OS entropy
    #[must_use]
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }
}

impl PhraseSelector for SeededRandom {
    fn select(&mut self, count: usize) -> usize {
        self.rng.gen_range(0..count)
    }
}

/// Set of equivalent templates with `{name}` placeholders
pub struct PhrasePool {
    templates: Vec<String>,
    selector: Box<dyn PhraseSelector>,
}

impl std::fmt::Debug for PhrasePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhrasePool")
            .field("templates", &self.templates)
            .finish_non_exhaustive()
    }
}

impl PhrasePool {
    /// Create a pool. An empty template list renders empty strings.
    pub fn new<I, S>(templates: I, selector: impl PhraseSelector + 'static) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            templates: templates.into_iter().map(Into::into).collect(),
            selector: Box::new(selector),
        }
    }

    /// Templates in the pool
    #[must_use]
    pub fn templates(&self) -> &[String] {
        &self.templates
    }

    /// Pick a template and substitute `{key}` with each value
    pub fn render(&mut self, vars: &[(&str, &str)]) -> String {
        if self.templates.is_empty() {
            return String::new();
        }

        let index = self.selector.select(self.templates.len());
        let template = &self.templates[index.min(self.templates.len() - 1)];

        vars.iter().fold(template.clone(), |text, (key, value)| {
            text.replace(&format!("{{{key}}}"), value)
        })
    }
}
