//! Undo and redo.
//!
//! Every turn in the log records what it moved and what it overwrote, so
//! undoing is popping the last turn and applying its inverse. Redo runs the
//! same command again with the draws it made the first time.

use std::collections::BTreeMap;

use tracing::{debug, info};

use super::commands::{PassKind, TakeBackKind};
use super::events::Notification;
use super::player::PlayerKey;
use super::rules::Phase;
use super::scoring::Move;
use super::state::MatchState;
use super::tile::Tile;
use super::turn::{Turn, TurnKind};
use super::Error;

impl MatchState {
    pub fn can_undo(&self) -> bool {
        self.config.allow_undo && !self.turns.is_empty()
    }

    /// Take back the last turn, whatever it was.
    ///
    /// # Panics
    ///
    /// When undo is disabled for this match or nothing has happened yet;
    /// check [`MatchState::can_undo`] first.
    pub async fn undo(&mut self) -> Turn {
        assert!(self.config.allow_undo, "undo is disabled for game {}", self.key);
        let Some(turn) = self.turns.pop() else {
            panic!("nothing to undo in game {}", self.key);
        };

        self.unapply(&turn);
        info!(parent: &self.services.span, game = %self.key, kind = turn.kind.name(), player = %turn.player, "undone");

        self.undone.push(turn.clone());
        self.touch();
        self.save().await;
        self.notify(Notification::Undone(turn.clone()));
        turn
    }

    /// Apply the most recently undone turn again. A redo that fails leaves
    /// the turn waiting to be redone.
    pub async fn redo(&mut self) -> Result<Turn, Error> {
        if !self.config.allow_undo {
            return Err(Error::UndoUnavailable);
        }
        self.ensure_playing()?;

        let turn = self.undone.pop().ok_or(Error::NothingToRedo)?;
        match self.reapply(&turn).await {
            Ok(redone) => {
                self.advance().await;
                Ok(redone)
            }
            Err(e) => {
                self.supply.clear_script();
                self.undone.push(turn);
                Err(e)
            }
        }
    }

    /// Reverse `turn`, which must be the turn just removed from the log.
    /// Touches nothing outside the match.
    pub(super) fn unapply(&mut self, turn: &Turn) {
        debug!(parent: &self.services.span, game = %self.key, kind = turn.kind.name(), "unapply");

        match &turn.kind {
            TurnKind::Played {
                placements,
                replacements,
                ..
            } => self.unplay(turn, placements, replacements),
            TurnKind::Swapped {
                placements,
                replacements,
            } => self.unswap(turn, placements, replacements),
            TurnKind::Passed | TurnKind::TimedOut => {}
            TurnKind::TookBack {
                placements,
                replacements,
            }
            | TurnKind::ChallengeWon {
                placements,
                replacements,
                ..
            } => self.untake_back(turn, placements, replacements),
            TurnKind::ChallengeLost { challenger, sets_miss } => {
                let seated = self.seat(challenger);
                seated.score -= turn.score;
                if *sets_miss {
                    seated.miss_next_turn = false;
                }
            }
            TurnKind::GameEnded { deltas, .. } => {
                for (key, delta) in deltas {
                    self.seat(key).score -= delta;
                }
            }
        }

        // passes, the actor and any used miss flags are as the turn found them
        self.seat(&turn.player).passes = turn.prior.passes;
        for key in &turn.prior.flagged {
            self.seat(key).miss_next_turn = true;
        }
        self.current = turn.prior.actor.clone();
        self.phase = Phase::Playing;
        self.start_clock();
    }

    fn unplay(&mut self, turn: &Turn, placements: &[Tile], replacements: &[Tile]) {
        for tile in replacements {
            let Some(held) = self.seat(&turn.player).rack.remove(tile) else {
                panic!("{} does not hold {:?} drawn by the turn being undone", turn.player, tile.face);
            };
            self.supply.put(held);
        }

        for tile in placements {
            let Some(lifted) = tile.at.and_then(|at| self.grid.remove(at)) else {
                panic!("{:?} played by the turn being undone is not on the board", tile.face);
            };
            self.seat(&turn.player).rack.add(lifted);
        }

        self.seat(&turn.player).score -= turn.score;
    }

    fn unswap(&mut self, turn: &Turn, returned: &[Tile], replacements: &[Tile]) {
        for tile in replacements {
            let Some(held) = self.seat(&turn.player).rack.remove(tile) else {
                panic!("{} does not hold {:?} drawn by the swap being undone", turn.player, tile.face);
            };
            self.supply.put(held);
        }

        for tile in returned {
            let Some(back) = self.supply.take(tile) else {
                panic!("{:?} swapped away is no longer in the bag", tile.face);
            };
            self.seat(&turn.player).rack.add(back);
        }
    }

    /// Put a taken-back play on the board again.
    fn untake_back(&mut self, turn: &Turn, placements: &[Tile], replacements: &[Tile]) {
        for tile in placements {
            let Some(at) = tile.at else {
                panic!("taken back tile {:?} has no square", tile.face);
            };
            if self.seat(&turn.player).rack.remove(tile).is_none() {
                panic!("{} does not hold {:?} taken back", turn.player, tile.face);
            }
            if let Err(e) = self.grid.place(at, *tile) {
                panic!("cannot put {:?} back at {}: {}", tile.face, at, e);
            }
        }

        for tile in replacements {
            let Some(drawn) = self.supply.take(tile) else {
                panic!("{:?} returned by the take-back is not in the bag", tile.face);
            };
            self.seat(&turn.player).rack.add(drawn);
        }

        self.seat(&turn.player).score -= turn.score;
    }

    /// Run the command recorded by `turn` again, drawing the same tiles.
    pub(super) async fn reapply(&mut self, turn: &Turn) -> Result<Turn, Error> {
        let player = &turn.player;

        match &turn.kind {
            TurnKind::Played {
                placements,
                replacements,
                words,
            } => {
                self.supply.script(replacements.iter().copied());
                let mv = Move {
                    placements: placements.clone(),
                    words: words.clone(),
                    score: turn.score - self.bonus(placements.len()),
                };
                self.do_play(player, mv).await
            }
            TurnKind::Swapped {
                placements,
                replacements,
            } => {
                self.supply.script(replacements.iter().copied());
                self.do_swap(player, placements).await
            }
            TurnKind::Passed => Ok(self.do_pass(player, PassKind::Passed).await),
            TurnKind::TimedOut => Ok(self.do_pass(player, PassKind::TimedOut).await),
            TurnKind::TookBack { .. } => self.do_take_back(TakeBackKind::TookBack).await,
            TurnKind::ChallengeWon { challenger, .. } => {
                self.do_take_back(TakeBackKind::ChallengeWon(challenger.clone()))
                    .await
            }
            TurnKind::ChallengeLost { challenger, .. } => Ok(self.do_challenge_lost(challenger, player).await),
            TurnKind::GameEnded { end_state, deltas } => Ok(self.end_again(player, *end_state, deltas.clone()).await),
        }
    }

    /// End the game with the score changes it recorded the first time. Clocks
    /// are not part of the log, so overtime cannot be worked out again.
    async fn end_again(&mut self, player: &PlayerKey, end_state: Phase, deltas: BTreeMap<PlayerKey, i32>) -> Turn {
        let prior = self.prior(player);

        self.phase = end_state;
        self.stop_clock();
        for (key, delta) in &deltas {
            self.seat(key).score += delta;
        }
        self.current = None;

        let turn = Turn::new(TurnKind::GameEnded { end_state, deltas }, player.clone()).with_prior(prior);
        self.finish_turn(turn).await
    }
}
