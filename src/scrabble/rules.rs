use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    #[default]
    Waiting,
    Playing,
    GameOver,
    TwoPasses,
    FailedChallenge,
    TimedOut,
}

impl Phase {
    pub fn is_over(&self) -> bool {
        !matches!(self, Phase::Waiting | Phase::Playing)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Timer {
    #[default]
    None,
    /// Each turn gets `seconds`; running out passes the turn.
    Turn { seconds: i64 },
    /// Each player gets `seconds` for the whole match, and loses
    /// `penalty_per_minute` points for every started minute of overtime.
    Game { seconds: i64, penalty_per_minute: i32 },
}

/// What a failed challenge costs the challenger.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Penalty {
    None,
    #[default]
    Miss,
    PerTurn,
    PerWord,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum WordCheck {
    #[default]
    None,
    /// Accept the play, then tell the player which words look wrong.
    After,
    /// Refuse plays with unknown words.
    Reject,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MatchConfig {
    pub edition: String,
    #[serde(default)]
    pub dictionary: Option<String>,
    #[serde(default = "default_min_players")]
    pub min_players: usize,
    #[serde(default)]
    pub max_players: Option<usize>,
    #[serde(default)]
    pub timer: Timer,
    #[serde(default)]
    pub challenge_penalty: Penalty,
    #[serde(default = "default_penalty_points")]
    pub penalty_points: i32,
    #[serde(default)]
    pub word_check: WordCheck,
    #[serde(default)]
    pub allow_undo: bool,
    #[serde(default)]
    pub no_player_shuffle: bool,
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_min_players() -> usize {
    2
}

fn default_penalty_points() -> i32 {
    5
}

impl Default for MatchConfig {
    fn default() -> Self {
        MatchConfig {
            edition: "English_Scrabble".to_string(),
            dictionary: None,
            min_players: default_min_players(),
            max_players: None,
            timer: Timer::default(),
            challenge_penalty: Penalty::default(),
            penalty_points: default_penalty_points(),
            word_check: WordCheck::default(),
            allow_undo: false,
            no_player_shuffle: false,
            seed: None,
        }
    }
}
