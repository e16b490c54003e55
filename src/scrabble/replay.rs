use tracing::debug;

use super::events::Services;
use super::rules::{MatchConfig, Phase, Timer, WordCheck};
use super::state::MatchState;
use super::turn::Turn;
use super::Error;

/// Step through a finished match from its first turn.
///
/// Only the final position and the turn log are saved, so the starting
/// position is found by undoing the whole log against a copy of the final
/// one. Stepping then runs each recorded command forward again.
#[derive(Debug)]
pub struct Replay {
    state: MatchState,
    turns: Vec<Turn>,
    next: usize,
}

impl Replay {
    pub fn new(source: &MatchState) -> Result<Self, Error> {
        let edition = source.edition.clone().ok_or(Error::NotCreated)?;
        let config = MatchConfig {
            timer: Timer::None,
            word_check: WordCheck::None,
            allow_undo: true,
            no_player_shuffle: true,
            ..source.config.clone()
        };

        let mut state = MatchState::new(config, Services::default()).with_edition(edition)?;
        state.key = format!("{}-replay", source.key);
        state.grid = source.grid.clone();
        state.supply = source.supply.clone();
        state.players = source
            .players
            .iter()
            .map(|p| {
                let mut player = p.clone();
                player.is_robot = false;
                player.clock = None;
                player
            })
            .collect();
        state.phase = Phase::Playing;
        state.current = source.current.clone();

        for turn in source.turns.iter().rev() {
            state.unapply(turn);
        }

        // flags set by the last turns are not part of the opening position
        for player in &mut state.players {
            player.miss_next_turn = false;
        }
        state.phase = Phase::Playing;
        if state.current.is_none() {
            state.current = state.players.first().map(|p| p.key.clone());
        }

        debug!(game = %source.key, turns = source.turns.len(), "replay ready");

        Ok(Replay {
            state,
            turns: source.turns.clone(),
            next: 0,
        })
    }

    pub fn state(&self) -> &MatchState {
        &self.state
    }

    pub fn is_finished(&self) -> bool {
        self.next >= self.turns.len()
    }

    /// Replay the next recorded turn. `None` once the log is exhausted.
    pub async fn step(&mut self) -> Option<Result<Turn, Error>> {
        let turn = self.turns.get(self.next)?.clone();
        self.next += 1;
        Some(self.state.reapply(&turn).await)
    }

    /// Replay everything that is left.
    pub async fn run(&mut self) -> Result<&MatchState, Error> {
        while let Some(result) = self.step().await {
            result?;
        }
        Ok(&self.state)
    }
}
