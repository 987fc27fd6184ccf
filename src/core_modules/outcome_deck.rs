// THEORY:
// The deck is the fixed catalog of readings. It is built once at startup from
// configuration and never mutated afterwards. Drawing is uniform over indices and
// independent per draw: the same reading may come up twice in a row.

use crate::error::{OracleError, Result};
use rand::Rng;

/// A revealed outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reading {
    /// Position of the reading in the deck.
    pub index: usize,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct OutcomeDeck {
    outcomes: Vec<String>,
}

impl OutcomeDeck {
    pub fn new(outcomes: Vec<String>) -> Result<Self> {
        if outcomes.is_empty() {
            return Err(OracleError::EmptyDeck);
        }
        Ok(Self { outcomes })
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    /// Always false; an empty deck cannot be constructed.
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn outcomes(&self) -> &[String] {
        &self.outcomes
    }

    /// Picks one reading uniformly at random.
    pub fn draw<R: Rng>(&self, rng: &mut R) -> Reading {
        let index = rng.gen_range(0..self.outcomes.len());
        Reading {
            index,
            text: self.outcomes[index].clone(),
        }
    }
}
