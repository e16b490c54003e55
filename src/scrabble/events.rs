use std::sync::Arc;

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::Span;

use super::player::PlayerKey;
use super::robot::BestPlay;
use super::turn::Turn;
use crate::dictionary::Dictionary;
use crate::store::Store;

/// Everything a match tells its observers. Data only.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Notification {
    Turn(Turn),
    Tick {
        actor: PlayerKey,
        seconds_remaining: i64,
    },
    Pause {
        player: PlayerKey,
    },
    Unpause {
        player: PlayerKey,
    },
    NextGame {
        key: String,
    },
    Undone(Turn),
    /// Sent to the submitting player only: the play was refused.
    Rejected {
        player: PlayerKey,
        words: Vec<String>,
    },
    /// The play stood, but these words are not in the dictionary.
    Advisory {
        player: PlayerKey,
        words: Vec<String>,
    },
}

const CHANNEL_CAPACITY: usize = 64;

/// Collaborators a match calls out to. A match with none of them set is
/// silent: nothing is saved, no words are checked and robots always pass.
#[derive(Clone)]
pub struct Services {
    pub dictionary: Option<Arc<dyn Dictionary>>,
    pub store: Option<Arc<dyn Store>>,
    pub robot: Option<Arc<dyn BestPlay>>,
    pub events: broadcast::Sender<Notification>,
    /// Parent for every event the match logs.
    pub span: Span,
}

impl Default for Services {
    fn default() -> Self {
        Services {
            dictionary: None,
            store: None,
            robot: None,
            events: broadcast::channel(CHANNEL_CAPACITY).0,
            span: Span::none(),
        }
    }
}

impl std::fmt::Debug for Services {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Services")
            .field("dictionary", &self.dictionary.is_some())
            .field("store", &self.store.is_some())
            .field("robot", &self.robot.is_some())
            .field("receivers", &self.events.receiver_count())
            .finish()
    }
}

impl Services {
    pub fn with_dictionary(mut self, dictionary: Arc<dyn Dictionary>) -> Self {
        self.dictionary = Some(dictionary);
        self
    }

    pub fn with_store(mut self, store: Arc<dyn Store>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_robot(mut self, robot: Arc<dyn BestPlay>) -> Self {
        self.robot = Some(robot);
        self
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Same collaborators, own notification channel.
    pub fn fork(&self) -> Self {
        Services {
            events: broadcast::channel(CHANNEL_CAPACITY).0,
            ..self.clone()
        }
    }
}
