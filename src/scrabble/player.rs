use serde::{Deserialize, Serialize};

use super::rack::Rack;

#[derive(Debug, Serialize, Deserialize, Eq, PartialEq, Hash, Ord, PartialOrd, Clone)]
pub struct PlayerKey(pub String);

impl From<&str> for PlayerKey {
    fn from(key: &str) -> Self {
        PlayerKey(key.to_owned())
    }
}

impl std::fmt::Display for PlayerKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Player {
    pub key: PlayerKey,
    pub name: String,
    pub rack: Rack,
    pub score: i32,
    /// Passes and swaps since this player last scored.
    pub passes: u32,
    /// Seconds left on this player's clock, when the match is timed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clock: Option<i64>,
    #[serde(default)]
    pub miss_next_turn: bool,
    #[serde(default)]
    pub is_robot: bool,
    #[serde(default)]
    pub can_challenge: bool,
    #[serde(default)]
    pub absent: bool,
}

impl Player {
    pub fn new(key: impl Into<PlayerKey>, name: &str) -> Self {
        Player {
            key: key.into(),
            name: name.to_owned(),
            rack: Rack::default(),
            score: 0,
            passes: 0,
            clock: None,
            miss_next_turn: false,
            is_robot: false,
            can_challenge: false,
            absent: false,
        }
    }

    pub fn robot(key: impl Into<PlayerKey>, name: &str) -> Self {
        Player {
            is_robot: true,
            ..Player::new(key, name)
        }
    }

    pub fn challenging(mut self) -> Self {
        self.can_challenge = true;
        self
    }

    /// Same seat at a fresh table: no tiles, no score, no history.
    pub fn fresh(&self) -> Self {
        Player {
            key: self.key.clone(),
            name: self.name.clone(),
            is_robot: self.is_robot,
            can_challenge: self.can_challenge,
            ..Player::new(self.key.clone(), &self.name)
        }
    }
}

impl From<String> for PlayerKey {
    fn from(key: String) -> Self {
        PlayerKey(key)
    }
}
