use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;
use tokio::{
    fs::File,
    io::{AsyncBufReadExt, BufReader},
    sync::OnceCell,
};
use tracing::info;

use crate::config::Settings;

static WORDS: OnceCell<Arc<WordList>> = OnceCell::const_new();

/// Word lookups for challenges, play checks and robots.
pub trait Dictionary: Send + Sync {
    fn has_word(&self, word: &str) -> bool;

    /// Accept a word from now on.
    fn add_word(&self, word: &str);
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("could not read word list: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not fetch word list: {0}")]
    Fetch(#[from] reqwest::Error),
    #[error("no word list configured")]
    Unconfigured,
}

/// A word list held in memory, one upper-case word per entry.
#[derive(Debug, Default)]
pub struct WordList {
    words: RwLock<HashSet<String>>,
}

impl WordList {
    pub fn from_words<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        WordList {
            words: RwLock::new(words.into_iter().map(|w| w.as_ref().trim().to_uppercase()).collect()),
        }
    }

    /// One word per line.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let file = File::open(path.as_ref()).await?;
        let reader = BufReader::new(file);
        let mut lines = reader.lines();

        let mut set = HashSet::new();
        while let Some(line) = lines.next_line().await? {
            let word = line.trim();
            if !word.is_empty() {
                set.insert(word.to_uppercase());
            }
        }

        info!(path = %path.as_ref().display(), words = set.len(), "word list loaded");
        Ok(WordList {
            words: RwLock::new(set),
        })
    }

    pub async fn fetch(url: &str) -> Result<Self, Error> {
        let body = reqwest::get(url).await?.error_for_status()?.text().await?;
        let list = WordList::from_words(body.lines().filter(|l| !l.trim().is_empty()));

        info!(url, words = list.len(), "word list fetched");
        Ok(list)
    }

    /// The process-wide list named by the settings: a URL wins over a file.
    pub async fn shared(settings: &Settings) -> Result<Arc<WordList>, Error> {
        WORDS
            .get_or_try_init(|| async {
                let list = match (&settings.word_list_url, &settings.word_list) {
                    (Some(url), _) => WordList::fetch(url).await?,
                    (None, Some(path)) => WordList::load(path).await?,
                    (None, None) => return Err(Error::Unconfigured),
                };
                Ok(Arc::new(list))
            })
            .await
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.words.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.read().is_empty()
    }
}

impl Dictionary for WordList {
    fn has_word(&self, word: &str) -> bool {
        self.words.read().contains(&word.to_uppercase())
    }

    fn add_word(&self, word: &str) {
        self.words.write().insert(word.trim().to_uppercase());
    }
}

pub fn illegal_words(dictionary: &dyn Dictionary, words: &[String]) -> Vec<String> {
    words
        .iter()
        .filter(|word| !dictionary.has_word(word))
        .cloned()
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_illegal_words() {
        let list = WordList::from_words(["word", "TO"]);
        let words = vec!["WORD".to_string(), "TOO".to_string(), "to".to_string()];

        assert_eq!(illegal_words(&list, &words), vec!["TOO".to_string()]);

        list.add_word("too");
        assert!(illegal_words(&list, &words).is_empty());
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "aardvark\n\nZebra\n").unwrap();

        let list = WordList::load(file.path()).await.unwrap();
        assert_eq!(list.len(), 2);
        assert!(list.has_word("ZEBRA"));
        assert!(list.has_word("aardvark"));
        assert!(!list.has_word("yak"));
    }

    #[tokio::test]
    async fn test_missing_file() {
        assert!(matches!(
            WordList::load("/nonexistent/words").await,
            Err(Error::Io(_))
        ));
    }
}
