//! Generation of the process wide password.

use std::path::Path;

use rand::rngs::OsRng;
use rand::{CryptoRng, Rng};

use crate::error::{SecureServeError, SecureServeResult};

/// Number of words which are concatenated to a password
pub const WORDS_PER_PASSWORD: usize = 3;

/// A list of words to build passwords from.
#[derive(Debug, Clone)]
pub struct WordList {
    words: Vec<String>,
}

impl WordList {
    /// Reads a newline separated word list from a file.
    pub fn load(path: &Path) -> SecureServeResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| SecureServeError::WordList {
            path: path.to_path_buf(),
            source,
        })?;
        WordList::parse(&text).ok_or_else(|| SecureServeError::EmptyWordList {
            path: path.to_path_buf(),
        })
    }

    /// Builds a word list from newline separated text.
    ///
    /// Surrounding whitespace is stripped from every line and blank lines are skipped.
    /// Returns `None` if no word remains.
    pub fn parse(text: &str) -> Option<Self> {
        let words: Vec<String> = text
            .lines()
            .map(str::trim)
            .filter(|word| !word.is_empty())
            .map(String::from)
            .collect();
        if words.is_empty() {
            return None;
        }
        Some(WordList { words })
    }

    /// Number of words in the list
    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// A parsed list is never empty, see [WordList::parse]
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Concatenates [WORDS_PER_PASSWORD] independently and uniformly chosen words.
    pub fn generate_password<R: Rng + CryptoRng>(&self, rng: &mut R) -> String {
        let mut password = String::new();
        for _ in 0..WORDS_PER_PASSWORD {
            let index = rng.gen_range(0..self.words.len());
            password.push_str(&self.words[index]);
        }
        password
    }
}

/// Generates a password from the word list at `path` using the OS random number generator.
pub fn generate_password(path: &Path) -> SecureServeResult<String> {
    let words = WordList::load(path)?;
    Ok(words.generate_password(&mut OsRng))
}
