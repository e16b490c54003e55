//! The commands a player can issue against a [`MatchState`].
//!
//! Each public handler checks the caller is allowed to act, then hands over to
//! a `do_*` routine that makes the change and logs exactly one [`Turn`]. Redo
//! and replay call the `do_*` routines directly with recorded arguments.

use std::collections::BTreeMap;

use tracing::{info, warn};

use super::events::Notification;
use super::player::PlayerKey;
use super::rules::{Penalty, Phase, Timer, WordCheck};
use super::scoring::{Move, PlayRejection};
use super::state::MatchState;
use super::tile::Tile;
use super::turn::{Prior, Turn, TurnKind};
use super::Error;
use crate::dictionary::illegal_words;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassKind {
    Passed,
    TimedOut,
}

impl From<PassKind> for TurnKind {
    fn from(kind: PassKind) -> Self {
        match kind {
            PassKind::Passed => TurnKind::Passed,
            PassKind::TimedOut => TurnKind::TimedOut,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TakeBackKind {
    TookBack,
    /// The play was successfully challenged by this player.
    ChallengeWon(PlayerKey),
}

impl MatchState {
    /// Put tiles from `player`'s rack on the board.
    ///
    /// The placements only need face, coordinate and (for blanks) the
    /// chosen letter; tile values come from the rack and the score is
    /// worked out here.
    pub async fn play(&mut self, player: &PlayerKey, mv: Move) -> Result<Turn, Error> {
        self.ensure_actor(player)?;

        let placements = self.from_rack(player, &mv.placements)?;
        let mv = self.analyse(&placements)?;

        if self.config.word_check == WordCheck::Reject {
            let rejected = self.unknown_words(&mv.word_list());
            if !rejected.is_empty() {
                info!(parent: &self.services.span, game = %self.key, player = %player, ?rejected, "play rejected");
                self.notify(Notification::Rejected {
                    player: player.clone(),
                    words: rejected.clone(),
                });
                return Err(Error::WordsRejected(rejected));
            }
        }

        self.undone.clear();
        let words = mv.word_list();
        let turn = self.do_play(player, mv).await?;

        if self.config.word_check == WordCheck::After {
            let unknown = self.unknown_words(&words);
            if !unknown.is_empty() {
                self.notify(Notification::Advisory {
                    player: player.clone(),
                    words: unknown,
                });
            }
        }

        self.advance().await;
        Ok(turn)
    }

    pub async fn pass(&mut self, player: &PlayerKey) -> Result<Turn, Error> {
        self.ensure_actor(player)?;

        self.undone.clear();
        let turn = self.do_pass(player, PassKind::Passed).await;
        self.advance().await;
        Ok(turn)
    }

    /// Return `tiles` to the bag and draw as many new ones.
    pub async fn swap(&mut self, player: &PlayerKey, tiles: &[Tile]) -> Result<Turn, Error> {
        self.ensure_actor(player)?;

        let turn = self.do_swap(player, tiles).await?;
        self.undone.clear();
        self.advance().await;
        Ok(turn)
    }

    /// Dispute the last play, which must have been made by `challenged`.
    /// Anyone but the challenged player may challenge, whoever's turn it is.
    pub async fn challenge(&mut self, challenger: &PlayerKey, challenged: &PlayerKey) -> Result<Turn, Error> {
        self.ensure_playing()?;
        self.ensure_member(challenger)?;
        self.ensure_member(challenged)?;

        if challenger == challenged {
            return Err(Error::OwnPlay);
        }

        let previous = self.previous_move().ok_or(Error::NoPreviousMove)?;
        if &previous.player != challenged {
            return Err(Error::ChallengeMismatch);
        }

        let dictionary = self.services.dictionary.clone().ok_or(Error::NoDictionary)?;
        let words: Vec<String> = previous.words().iter().map(|w| w.word.clone()).collect();
        let bad = illegal_words(dictionary.as_ref(), &words);

        self.undone.clear();
        let turn = if bad.is_empty() {
            info!(parent: &self.services.span, game = %self.key, challenger = %challenger, "challenge failed");
            self.do_challenge_lost(challenger, challenged).await
        } else {
            info!(parent: &self.services.span, game = %self.key, challenger = %challenger, ?bad, "challenge won");
            self.do_take_back(TakeBackKind::ChallengeWon(challenger.clone()))
                .await?
        };

        self.advance().await;
        Ok(turn)
    }

    /// Withdraw your own last play.
    pub async fn take_back(&mut self, player: &PlayerKey) -> Result<Turn, Error> {
        self.ensure_playing()?;
        self.ensure_member(player)?;

        let previous = self.previous_move().ok_or(Error::NoPreviousMove)?;
        if &previous.player != player {
            return Err(Error::NotYourPlay);
        }

        self.undone.clear();
        let turn = self.do_take_back(TakeBackKind::TookBack).await?;
        self.advance().await;
        Ok(turn)
    }

    /// End the game with `end_state`. Does nothing unless the game is being played.
    pub async fn confirm_game_over(&mut self, player: &PlayerKey, end_state: Phase) -> Result<Option<Turn>, Error> {
        self.ensure_member(player)?;
        if self.phase != Phase::Playing {
            return Ok(None);
        }

        let end_state = if end_state.is_over() { end_state } else { Phase::GameOver };
        self.undone.clear();
        Ok(Some(self.do_confirm_game_over(player, end_state).await))
    }

    /// Set up a rematch with the same rules and players, linked to this one.
    pub async fn another_game(&mut self, player: &PlayerKey) -> Result<MatchState, Error> {
        self.ensure_member(player)?;
        if self.next_game.is_some() {
            return Err(Error::FollowOnExists);
        }
        let edition = self.edition.clone().ok_or(Error::NotCreated)?;

        let mut next = MatchState::new(self.config.clone(), self.services.fork()).with_edition(edition)?;
        next.previous_game = Some(self.key.clone());
        for seated in &self.players {
            next.add_player(seated.fresh())?;
        }

        self.next_game = Some(next.key.clone());
        info!(parent: &self.services.span, game = %self.key, next = %next.key, "follow-on game created");

        self.touch();
        self.save().await;
        self.notify(Notification::NextGame { key: next.key.clone() });

        next.save().await;
        next.play_if_ready().await;
        Ok(next)
    }

    fn unknown_words(&self, words: &[String]) -> Vec<String> {
        match &self.services.dictionary {
            Some(dictionary) => illegal_words(dictionary.as_ref(), words),
            None => {
                warn!(parent: &self.services.span, game = %self.key, "word check configured without a dictionary");
                vec![]
            }
        }
    }

    /// A robot's candidate, rebuilt from its rack and scored against the
    /// board like any other play.
    pub(super) fn robot_move(&self, robot: &PlayerKey, candidate: &Move) -> Result<Move, Error> {
        let placements = self.from_rack(robot, &candidate.placements)?;
        let mv = self.analyse(&placements)?;

        if self.config.word_check == WordCheck::Reject {
            let rejected = self.unknown_words(&mv.word_list());
            if !rejected.is_empty() {
                return Err(Error::WordsRejected(rejected));
            }
        }
        Ok(mv)
    }

    /// The rack tiles standing behind the requested placements, moved to the
    /// requested squares.
    fn from_rack(&self, player: &PlayerKey, placements: &[Tile]) -> Result<Vec<Tile>, Error> {
        let mut rack = self
            .player(player)
            .map(|p| p.rack.clone())
            .ok_or_else(|| Error::UnknownPlayer(player.clone()))?;
        let held = rack.spend(placements)?;

        Ok(held
            .iter()
            .zip(placements)
            .map(|(held, wanted)| match wanted.at {
                Some(at) => held.placed(at, wanted.letter()),
                None => *held,
            })
            .collect())
    }

    fn refill(&mut self, index: usize) -> Vec<Tile> {
        let rack_size = self.rack_size();
        let mut drawn = vec![];

        while self.players[index].rack.len() < rack_size {
            let Some(tile) = self.supply.draw() else {
                break;
            };
            self.players[index].rack.add(tile);
            drawn.push(tile);
        }

        drawn
    }

    /// Hand the turn on, returning who got it and whose miss flags were used.
    fn pass_turn(&mut self) -> (Option<PlayerKey>, Vec<PlayerKey>) {
        let mut flagged = vec![];
        let next = self.next_player(&mut flagged);
        self.current = next.clone();
        self.start_turn_clock();
        (next, flagged)
    }

    pub(super) async fn do_play(&mut self, player: &PlayerKey, mv: Move) -> Result<Turn, Error> {
        let index = self.index_of(player).ok_or_else(|| Error::UnknownPlayer(player.clone()))?;

        let mut cells = Vec::with_capacity(mv.placements.len());
        for tile in &mv.placements {
            let at = tile.at.ok_or(PlayRejection::OffBoard)?;
            if !self.grid.contains(at) {
                return Err(Error::OffBoard(at));
            }
            if self.grid.is_occupied(at) || cells.contains(&at) {
                return Err(Error::CellOccupied(at));
            }
            cells.push(at);
        }

        let prior = self.prior(player);
        let spent = self.players[index].rack.spend(&mv.placements)?;

        let mut placements = Vec::with_capacity(spent.len());
        for ((held, wanted), at) in spent.iter().zip(&mv.placements).zip(cells) {
            let tile = held.placed(at, wanted.letter()).locked();
            self.grid.place(at, tile)?;
            placements.push(tile);
        }

        let score = mv.score + self.bonus(placements.len());
        self.players[index].score += score;
        self.players[index].passes = 0;

        let replacements = self.refill(index);
        let (next, flagged) = self.pass_turn();

        let turn = Turn::new(
            TurnKind::Played {
                placements,
                replacements,
                words: mv.words,
            },
            player.clone(),
        )
        .scored(score)
        .next(next)
        .with_prior(Prior { flagged, ..prior });

        Ok(self.finish_turn(turn).await)
    }

    pub(super) async fn do_pass(&mut self, player: &PlayerKey, kind: PassKind) -> Turn {
        let prior = self.prior(player);
        self.seat(player).passes += 1;

        let (next, flagged) = self.pass_turn();
        let turn = Turn::new(kind.into(), player.clone())
            .next(next)
            .with_prior(Prior { flagged, ..prior });

        self.finish_turn(turn).await
    }

    pub(super) async fn do_swap(&mut self, player: &PlayerKey, tiles: &[Tile]) -> Result<Turn, Error> {
        let index = self.index_of(player).ok_or_else(|| Error::UnknownPlayer(player.clone()))?;
        let swap_size = self.edition.as_ref().map_or(0, |e| e.swap_size);

        if tiles.is_empty() {
            return Err(PlayRejection::NoTiles.into());
        }
        if tiles.len() > swap_size {
            return Err(Error::SwapTooLarge(swap_size));
        }
        if self.supply.len() < tiles.len() {
            return Err(Error::BagTooSmall {
                requested: tiles.len(),
                remaining: self.supply.len(),
            });
        }

        let prior = self.prior(player);
        let returned = self.players[index].rack.spend(tiles)?;

        // draw before returning, so a swap never gets its own tiles back
        let replacements = self.supply.draw_many(returned.len());
        for tile in &returned {
            self.supply.put(*tile);
        }
        for tile in &replacements {
            self.players[index].rack.add(*tile);
        }
        self.players[index].passes += 1;

        let (next, flagged) = self.pass_turn();
        let turn = Turn::new(
            TurnKind::Swapped {
                placements: returned,
                replacements,
            },
            player.clone(),
        )
        .next(next)
        .with_prior(Prior { flagged, ..prior });

        Ok(self.finish_turn(turn).await)
    }

    /// Reverse the last play: its replacements go back in the bag and its
    /// tiles come off the board into the player's rack.
    pub(super) async fn do_take_back(&mut self, kind: TakeBackKind) -> Result<Turn, Error> {
        let previous = self.previous_move().cloned().ok_or(Error::NoPreviousMove)?;
        let TurnKind::Played {
            placements,
            replacements,
            ..
        } = previous.kind
        else {
            return Err(Error::NoPreviousMove);
        };

        let who = previous.player;
        let prior = self.prior(&who);
        let index = self.index_of(&who).ok_or_else(|| Error::UnknownPlayer(who.clone()))?;

        for tile in &replacements {
            let Some(held) = self.players[index].rack.remove(tile) else {
                panic!("{} no longer holds {:?} drawn in their last play", who, tile.face);
            };
            self.supply.put(held);
        }

        for tile in &placements {
            let Some(lifted) = tile.at.and_then(|at| self.grid.remove(at)) else {
                panic!("{:?} from the last play is missing from the board", tile.face);
            };
            self.players[index].rack.add(lifted);
        }

        self.players[index].score -= previous.score;

        let (kind, next) = match kind {
            TakeBackKind::TookBack => {
                self.current = Some(who.clone());
                self.start_clock();
                (
                    TurnKind::TookBack {
                        placements,
                        replacements,
                    },
                    Some(who.clone()),
                )
            }
            TakeBackKind::ChallengeWon(challenger) => (
                TurnKind::ChallengeWon {
                    challenger,
                    placements,
                    replacements,
                },
                self.current.clone(),
            ),
        };

        let turn = Turn::new(kind, who)
            .scored(-previous.score)
            .next(next)
            .with_prior(prior);

        Ok(self.finish_turn(turn).await)
    }

    pub(super) async fn do_challenge_lost(&mut self, challenger: &PlayerKey, challenged: &PlayerKey) -> Turn {
        let prior = self.prior(challenged);
        let word_count = self.previous_move().map_or(0, |t| t.words().len()) as i32;

        let mut score = 0;
        let mut sets_miss = false;
        let mut flagged = vec![];

        match self.config.challenge_penalty {
            Penalty::PerTurn => score = -self.config.penalty_points,
            Penalty::PerWord => score = -self.config.penalty_points * word_count,
            Penalty::Miss => {
                let challenger_to_play = self.current.as_ref() == Some(challenger);
                let emptied = self.player(challenged).is_some_and(|p| p.rack.is_empty());

                if challenger_to_play && emptied {
                    return self.do_confirm_game_over(challenger, Phase::FailedChallenge).await;
                }

                if challenger_to_play {
                    flagged = self.pass_turn().1;
                } else if !self.seat(challenger).miss_next_turn {
                    self.seat(challenger).miss_next_turn = true;
                    sets_miss = true;
                }
            }
            Penalty::None => {}
        }

        self.seat(challenger).score += score;

        let turn = Turn::new(
            TurnKind::ChallengeLost {
                challenger: challenger.clone(),
                sets_miss,
            },
            challenged.clone(),
        )
        .scored(score)
        .next(self.current.clone())
        .with_prior(Prior { flagged, ..prior });

        self.finish_turn(turn).await
    }

    /// Settle the racks and end the game.
    ///
    /// # Panics
    ///
    /// When more than one player has an empty rack.
    pub(super) async fn do_confirm_game_over(&mut self, player: &PlayerKey, end_state: Phase) -> Turn {
        let prior = self.prior(player);

        self.phase = end_state;
        self.stop_clock();

        let mut deltas: BTreeMap<PlayerKey, i32> = BTreeMap::new();
        let mut emptied: Option<usize> = None;
        let mut left_on_racks = 0;

        for (index, seated) in self.players.iter_mut().enumerate() {
            if seated.rack.is_empty() {
                if let Some(other) = emptied {
                    panic!("game {} ended with more than one empty rack (seats {} and {})", self.key, other, index);
                }
                emptied = Some(index);
                deltas.insert(seated.key.clone(), 0);
            } else {
                let value = seated.rack.score();
                seated.score -= value;
                left_on_racks += value;
                deltas.insert(seated.key.clone(), -value);
            }
        }

        if let Some(index) = emptied {
            let seated = &mut self.players[index];
            seated.score += left_on_racks;
            deltas.insert(seated.key.clone(), left_on_racks);
        }

        if let Timer::Game { penalty_per_minute, .. } = self.config.timer {
            for seated in &mut self.players {
                let overtime = -seated.clock.unwrap_or(0);
                if overtime > 0 {
                    let minutes = (overtime + 59) / 60;
                    let penalty = penalty_per_minute * minutes as i32;
                    seated.score -= penalty;
                    *deltas.entry(seated.key.clone()).or_default() -= penalty;
                }
            }
        }

        self.current = None;
        info!(parent: &self.services.span, game = %self.key, ?end_state, ?deltas, "game over");

        let turn = Turn::new(TurnKind::GameEnded { end_state, deltas }, player.clone()).with_prior(prior);
        self.finish_turn(turn).await
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use async_trait::async_trait;

    use super::*;
    use crate::dictionary::WordList;
    use crate::scrabble::{
        analyse, BestPlay, Coord, Edition, Face, Grid, MatchConfig, Player, Rack, Services, TileSupply,
    };

    fn ada() -> PlayerKey {
        "ada".into()
    }

    fn frankie() -> PlayerKey {
        "frankie".into()
    }

    fn along(word: &str, col: usize, row: usize) -> Move {
        Move {
            placements: word
                .chars()
                .enumerate()
                .map(|(i, c)| Tile::new(Face::Char(c), 0).placed(Coord::new(col + i, row), None))
                .collect(),
            words: vec![],
            score: 0,
        }
    }

    fn config() -> MatchConfig {
        MatchConfig {
            no_player_shuffle: true,
            seed: Some(9),
            ..MatchConfig::default()
        }
    }

    async fn game_with(config: MatchConfig, words: &[&str], players: Vec<Player>) -> MatchState {
        let services = Services::default().with_dictionary(Arc::new(WordList::from_words(words)));
        let mut state = MatchState::new(config, services)
            .with_edition(Edition::standard())
            .unwrap();
        for player in players {
            state.add_player(player).unwrap();
        }
        state.play_if_ready().await;
        state
    }

    async fn game(config: MatchConfig, words: &[&str]) -> MatchState {
        let mut state = game_with(
            config,
            words,
            vec![Player::new("ada", "Ada"), Player::new("frankie", "Frankie")],
        )
        .await;
        state.rig_racks(&[("ada", "WORDSEA"), ("frankie", "TOXQLIN")]);
        state
    }

    fn total_tiles(state: &MatchState) -> usize {
        state.supply().len() + state.players().iter().map(|p| p.rack.len()).sum::<usize>() + state.grid().tiles().count()
    }

    #[tokio::test]
    async fn test_play_scores_and_refills() {
        let mut state = game(config(), &[]).await;

        let turn = state.play(&ada(), along("WORD", 7, 7)).await.unwrap();
        assert_eq!(turn.score, 16);
        assert_eq!(turn.next_to_go, Some(frankie()));
        assert_eq!(turn.words(), &[crate::scrabble::WordScore { word: "WORD".into(), score: 16 }]);
        assert_eq!(state.player(&ada()).unwrap().rack.len(), 7);
        assert_eq!(state.supply().len(), 82);
        assert!(state.grid().tile(Coord::new(7, 7)).unwrap().locked);

        // T above the O, on a double letter square
        let turn = state.play(&frankie(), along("T", 8, 6)).await.unwrap();
        assert_eq!(turn.score, 3);
        assert_eq!(state.current_actor(), Some(&ada()));
        assert_eq!(total_tiles(&state), 100);
    }

    #[tokio::test]
    async fn test_play_refusals_change_nothing() {
        let mut state = game(config(), &[]).await;

        assert_eq!(
            state.play(&frankie(), along("TO", 7, 7)).await,
            Err(Error::NotYourTurn)
        );
        assert_eq!(
            state.play(&ada(), along("ZOO", 7, 7)).await,
            Err(Error::NoTileToSpend(Face::Char('Z')))
        );
        assert_eq!(
            state.play(&ada(), along("WE", 0, 0)).await,
            Err(Error::Rejected(PlayRejection::NotOnCentre))
        );
        assert_eq!(
            state.play(&"nobody".into(), along("WE", 7, 7)).await,
            Err(Error::UnknownPlayer("nobody".into()))
        );

        assert!(state.turns().is_empty());
        assert_eq!(state.player(&ada()).unwrap().rack.letters(), "ADEORSW");
    }

    #[tokio::test]
    async fn test_word_check_reject() {
        let mut state = game(
            MatchConfig {
                word_check: WordCheck::Reject,
                ..config()
            },
            &["WORD"],
        )
        .await;
        let mut events = state.subscribe();

        assert_eq!(
            state.play(&ada(), along("ROW", 7, 7)).await,
            Err(Error::WordsRejected(vec!["ROW".into()]))
        );
        assert_eq!(
            events.try_recv().unwrap(),
            Notification::Rejected {
                player: ada(),
                words: vec!["ROW".into()]
            }
        );
        assert!(state.grid().is_empty());
        assert!(state.turns().is_empty());

        assert!(state.play(&ada(), along("WORD", 7, 7)).await.is_ok());
    }

    #[tokio::test]
    async fn test_word_check_after_advises() {
        let mut state = game(
            MatchConfig {
                word_check: WordCheck::After,
                ..config()
            },
            &["WORD"],
        )
        .await;
        let mut events = state.subscribe();

        state.play(&ada(), along("ROW", 7, 7)).await.unwrap();

        assert!(matches!(events.try_recv().unwrap(), Notification::Turn(_)));
        assert_eq!(
            events.try_recv().unwrap(),
            Notification::Advisory {
                player: ada(),
                words: vec!["ROW".into()]
            }
        );
    }

    #[tokio::test]
    async fn test_challenge_won() {
        let mut state = game(config(), &["TO"]).await;
        state.play(&ada(), along("WORD", 7, 7)).await.unwrap();

        let turn = state.challenge(&frankie(), &ada()).await.unwrap();

        assert_eq!(turn.kind.name(), "CHALLENGE_WON");
        assert_eq!(turn.player, ada());
        assert_eq!(turn.score, -16);
        assert!(state.grid().is_empty());
        assert_eq!(state.player(&ada()).unwrap().score, 0);
        assert_eq!(state.player(&ada()).unwrap().rack.letters(), "ADEORSW");
        assert_eq!(state.current_actor(), Some(&frankie()));
        assert_eq!(state.supply().len(), 86);
    }

    #[tokio::test]
    async fn test_challenge_lost_per_word() {
        let mut state = game(
            MatchConfig {
                challenge_penalty: Penalty::PerWord,
                penalty_points: 3,
                ..config()
            },
            &["WORD"],
        )
        .await;
        state.play(&ada(), along("WORD", 7, 7)).await.unwrap();

        let turn = state.challenge(&frankie(), &ada()).await.unwrap();

        assert_eq!(turn.kind.name(), "CHALLENGE_LOST");
        assert_eq!(turn.score, -3);
        assert_eq!(state.player(&frankie()).unwrap().score, -3);
        // the challenger keeps their turn
        assert_eq!(state.current_actor(), Some(&frankie()));
    }

    #[tokio::test]
    async fn test_challenge_lost_flags_a_waiting_challenger() {
        let mut state = game_with(
            MatchConfig {
                challenge_penalty: Penalty::Miss,
                ..config()
            },
            &["WORD"],
            vec![
                Player::new("ada", "Ada"),
                Player::new("bo", "Bo"),
                Player::new("frankie", "Frankie"),
            ],
        )
        .await;
        state.rig_racks(&[("ada", "WORDSEA"), ("bo", "TOXQLIN"), ("frankie", "EIIUUNG")]);
        state.play(&ada(), along("WORD", 7, 7)).await.unwrap();

        let turn = state.challenge(&frankie(), &ada()).await.unwrap();
        assert_eq!(
            turn.kind,
            TurnKind::ChallengeLost {
                challenger: frankie(),
                sets_miss: true
            }
        );
        assert_eq!(state.current_actor(), Some(&"bo".into()));

        let turn = state.pass(&"bo".into()).await.unwrap();
        assert_eq!(turn.next_to_go, Some(ada()));
        assert_eq!(turn.prior.flagged, vec![frankie()]);
        assert!(!state.player(&frankie()).unwrap().miss_next_turn);
    }

    #[tokio::test]
    async fn test_challenge_refusals() {
        let mut state = game(config(), &["WORD"]).await;

        assert_eq!(state.challenge(&frankie(), &ada()).await, Err(Error::NoPreviousMove));

        state.play(&ada(), along("WORD", 7, 7)).await.unwrap();
        assert_eq!(state.challenge(&ada(), &ada()).await, Err(Error::OwnPlay));
        assert_eq!(state.challenge(&ada(), &frankie()).await, Err(Error::ChallengeMismatch));

        state.services.dictionary = None;
        assert_eq!(state.challenge(&frankie(), &ada()).await, Err(Error::NoDictionary));
        assert_eq!(state.turns().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_challenge_of_a_closing_play_ends_the_game() {
        let mut state = game(
            MatchConfig {
                challenge_penalty: Penalty::Miss,
                ..config()
            },
            &["AT"],
        )
        .await;
        state.rig_racks(&[("ada", "AT"), ("frankie", "QZ")]);
        state.supply = TileSupply::default();

        state.play(&ada(), along("AT", 7, 7)).await.unwrap();
        assert!(state.player(&ada()).unwrap().rack.is_empty());

        let turn = state.challenge(&frankie(), &ada()).await.unwrap();
        assert_eq!(state.phase(), Phase::FailedChallenge);
        assert_eq!(
            turn.kind,
            TurnKind::GameEnded {
                end_state: Phase::FailedChallenge,
                deltas: [(ada(), 20), (frankie(), -20)].into_iter().collect(),
            }
        );
    }

    #[tokio::test]
    async fn test_take_back() {
        let mut state = game(config(), &[]).await;
        state.play(&ada(), along("WORD", 7, 7)).await.unwrap();

        assert_eq!(state.take_back(&frankie()).await, Err(Error::NotYourPlay));

        let turn = state.take_back(&ada()).await.unwrap();
        assert_eq!(turn.kind.name(), "TOOK_BACK");
        assert_eq!(turn.next_to_go, Some(ada()));
        assert_eq!(state.current_actor(), Some(&ada()));
        assert_eq!(state.player(&ada()).unwrap().rack.letters(), "ADEORSW");
        assert_eq!(state.take_back(&ada()).await, Err(Error::NoPreviousMove));
    }

    #[tokio::test]
    async fn test_swap() {
        let mut state = game(config(), &[]).await;
        let w = Tile::new(Face::Char('W'), 0);

        assert_eq!(state.swap(&ada(), &[]).await, Err(Error::Rejected(PlayRejection::NoTiles)));
        assert_eq!(state.swap(&ada(), &[w; 8]).await, Err(Error::SwapTooLarge(7)));

        let turn = state.swap(&ada(), &[w]).await.unwrap();
        let TurnKind::Swapped { placements, replacements } = &turn.kind else {
            panic!("expected a swap, got {:?}", turn.kind);
        };
        assert_eq!(placements[0].face, Face::Char('W'));
        assert_eq!(replacements.len(), 1);
        assert_eq!(state.player(&ada()).unwrap().passes, 1);
        assert_eq!(total_tiles(&state), 100);

        let mut small = TileSupply::default();
        small.put(Tile::new(Face::Char('E'), 1));
        state.supply = small;
        assert_eq!(
            state.swap(&frankie(), &[Tile::new(Face::Char('T'), 0), Tile::new(Face::Char('O'), 0)]).await,
            Err(Error::BagTooSmall {
                requested: 2,
                remaining: 1
            })
        );
    }

    #[tokio::test]
    async fn test_game_over_scoring() {
        let mut state = game(config(), &[]).await;
        state.rig_racks(&[("ada", "AT"), ("frankie", "QZ")]);
        state.supply = TileSupply::default();

        state.play(&ada(), along("AT", 7, 7)).await.unwrap();
        assert_eq!(state.player(&ada()).unwrap().score, 4);

        let turn = state
            .confirm_game_over(&frankie(), Phase::GameOver)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(
            turn.kind,
            TurnKind::GameEnded {
                end_state: Phase::GameOver,
                deltas: [(ada(), 20), (frankie(), -20)].into_iter().collect(),
            }
        );
        assert_eq!(state.player(&ada()).unwrap().score, 24);
        assert_eq!(state.player(&frankie()).unwrap().score, -20);
        assert_eq!(state.current_actor(), None);
        assert_eq!(state.pass(&frankie()).await, Err(Error::GameOver));
        assert_eq!(state.confirm_game_over(&ada(), Phase::GameOver).await, Ok(None));
    }

    #[tokio::test]
    async fn test_overtime_penalty() {
        let mut state = game(
            MatchConfig {
                timer: Timer::Game {
                    seconds: 600,
                    penalty_per_minute: 5,
                },
                ..config()
            },
            &[],
        )
        .await;
        state.rig_racks(&[("ada", "AT"), ("frankie", "QZ")]);
        state.seat(&ada()).clock = Some(-61);

        let turn = state
            .confirm_game_over(&ada(), Phase::GameOver)
            .await
            .unwrap()
            .unwrap();
        let TurnKind::GameEnded { deltas, .. } = turn.kind else {
            panic!("expected the game to end");
        };

        assert_eq!(deltas[&ada()], -2 - 10);
        assert_eq!(deltas[&frankie()], -20);
        assert!(!state.clock_running());
    }

    #[tokio::test]
    #[should_panic(expected = "more than one empty rack")]
    async fn test_two_empty_racks_is_fatal() {
        let mut state = game(config(), &[]).await;
        state.rig_racks(&[("ada", ""), ("frankie", "")]);

        let _ = state.confirm_game_over(&ada(), Phase::GameOver).await;
    }

    #[tokio::test]
    async fn test_two_passes_each_ends_the_game() {
        let mut state = game(config(), &[]).await;

        for player in [ada(), frankie(), ada()] {
            state.pass(&player).await.unwrap();
            assert_eq!(state.phase(), Phase::Playing);
        }
        state.pass(&frankie()).await.unwrap();

        assert_eq!(state.phase(), Phase::TwoPasses);
        assert_eq!(state.turns().last().unwrap().kind.name(), "GAME_ENDED");
    }

    #[tokio::test]
    async fn test_another_game() {
        let mut state = game(config(), &[]).await;
        let mut events = state.subscribe();

        let next = state.another_game(&ada()).await.unwrap();

        assert_eq!(state.next_game(), Some(next.key.as_str()));
        assert_eq!(next.previous_game(), Some(state.key.as_str()));
        assert_eq!(next.phase(), Phase::Playing);
        assert_eq!(next.players().len(), 2);
        assert!(next.players().iter().all(|p| p.score == 0 && p.rack.len() == 7));
        assert!(next.turns().is_empty());
        assert_eq!(events.try_recv().unwrap(), Notification::NextGame { key: next.key.clone() });

        assert_eq!(state.another_game(&frankie()).await.unwrap_err(), Error::FollowOnExists);
    }

    #[tokio::test]
    async fn test_tiles_are_conserved() {
        let mut state = game(
            MatchConfig {
                challenge_penalty: Penalty::Miss,
                ..config()
            },
            &["WORD", "TO"],
        )
        .await;

        state.play(&ada(), along("WORD", 7, 7)).await.unwrap();
        assert_eq!(total_tiles(&state), 100);
        state.challenge(&frankie(), &ada()).await.unwrap();
        assert_eq!(total_tiles(&state), 100);
        state.swap(&ada(), &[Tile::new(Face::Char('E'), 0)]).await.unwrap();
        assert_eq!(total_tiles(&state), 100);
        state.play(&frankie(), along("T", 8, 6)).await.unwrap();
        assert_eq!(total_tiles(&state), 100);
        state.take_back(&frankie()).await.unwrap();
        assert_eq!(total_tiles(&state), 100);
    }

    /// Plays the first rack letter that extends a word rightwards off the
    /// end of row 7.
    struct EndOfRow;

    #[async_trait]
    impl BestPlay for EndOfRow {
        async fn find_best_play(&self, grid: &Grid, rack: &Rack, _dictionary: Option<&str>) -> Vec<Move> {
            let Some(end) = (0..grid.cols()).rev().find(|c| grid.is_occupied(Coord::new(*c, 7))) else {
                return vec![];
            };

            rack.tiles()
                .iter()
                .filter_map(|tile| analyse(grid, &[tile.placed(Coord::new(end + 1, 7), None)]).ok())
                .collect()
        }
    }

    #[tokio::test]
    async fn test_robot_takes_its_turn() {
        let services = Services::default().with_robot(Arc::new(EndOfRow));
        let mut state = MatchState::new(config(), services)
            .with_edition(Edition::standard())
            .unwrap();
        state.add_player(Player::new("ada", "Ada")).unwrap();
        state.add_player(Player::robot("robbie", "Robbie")).unwrap();
        state.play_if_ready().await;
        state.rig_racks(&[("ada", "WORDSEA"), ("robbie", "S")]);

        let turn = state.play(&ada(), along("WORD", 7, 7)).await.unwrap();
        assert_eq!(turn.next_to_go, Some("robbie".into()));

        // the robot has already answered
        let robot_turn = state.turns().last().unwrap();
        assert_eq!(robot_turn.player, PlayerKey::from("robbie"));
        assert_eq!(robot_turn.score, 10);
        assert_eq!(state.current_actor(), Some(&ada()));
    }

    /// Offers its first rack tile in the corner, claiming a huge score.
    struct Stray;

    #[async_trait]
    impl BestPlay for Stray {
        async fn find_best_play(&self, _grid: &Grid, rack: &Rack, _dictionary: Option<&str>) -> Vec<Move> {
            rack.tiles()
                .first()
                .map(|tile| Move {
                    placements: vec![tile.placed(Coord::new(0, 0), None)],
                    words: vec![],
                    score: 999,
                })
                .into_iter()
                .collect()
        }
    }

    /// `EndOfRow`'s moves, each claiming a huge score.
    struct Boastful;

    #[async_trait]
    impl BestPlay for Boastful {
        async fn find_best_play(&self, grid: &Grid, rack: &Rack, dictionary: Option<&str>) -> Vec<Move> {
            EndOfRow
                .find_best_play(grid, rack, dictionary)
                .await
                .into_iter()
                .map(|mv| Move { score: 999, ..mv })
                .collect()
        }
    }

    async fn robot_game(robot: Arc<dyn BestPlay>, word_check: WordCheck, words: &[&str]) -> MatchState {
        let services = Services::default()
            .with_dictionary(Arc::new(WordList::from_words(words)))
            .with_robot(robot);
        let config = MatchConfig { word_check, ..config() };
        let mut state = MatchState::new(config, services)
            .with_edition(Edition::standard())
            .unwrap();
        state.add_player(Player::new("ada", "Ada")).unwrap();
        state.add_player(Player::robot("robbie", "Robbie")).unwrap();
        state.play_if_ready().await;
        state.rig_racks(&[("ada", "WORDSEA"), ("robbie", "S")]);
        state
    }

    fn robbie() -> PlayerKey {
        "robbie".into()
    }

    #[tokio::test]
    async fn test_robot_play_is_scored_on_the_board() {
        let mut state = robot_game(Arc::new(Boastful), WordCheck::None, &[]).await;
        state.play(&ada(), along("WORD", 7, 7)).await.unwrap();

        let robot_turn = state.turns().last().unwrap();
        assert_eq!(robot_turn.player, robbie());
        assert_eq!(robot_turn.kind.name(), "PLAYED");
        assert_eq!(robot_turn.score, 10);
        assert_eq!(state.player(&robbie()).unwrap().score, 10);
    }

    #[tokio::test]
    async fn test_robot_disconnected_play_becomes_a_pass() {
        let mut state = robot_game(Arc::new(Stray), WordCheck::Reject, &["WORD", "WORDS"]).await;
        state.play(&ada(), along("WORD", 7, 7)).await.unwrap();

        let robot_turn = state.turns().last().unwrap();
        assert_eq!(robot_turn.player, robbie());
        assert_eq!(robot_turn.kind.name(), "PASSED");
        assert!(state.grid().tile(Coord::new(0, 0)).is_none());
        assert_eq!(state.player(&robbie()).unwrap().score, 0);
        assert_eq!(state.player(&robbie()).unwrap().rack.letters(), "S");
        assert_eq!(state.current_actor(), Some(&ada()));
    }

    #[tokio::test]
    async fn test_robot_words_are_checked() {
        let mut state = robot_game(Arc::new(EndOfRow), WordCheck::Reject, &["WORD"]).await;
        state.play(&ada(), along("WORD", 7, 7)).await.unwrap();

        let robot_turn = state.turns().last().unwrap();
        assert_eq!(robot_turn.player, robbie());
        assert_eq!(robot_turn.kind.name(), "PASSED");
        assert!(state.grid().tile(Coord::new(11, 7)).is_none());
    }

    #[tokio::test]
    async fn test_robots_without_moves_pass_to_the_end() {
        let mut state = MatchState::new(config(), Services::default())
            .with_edition(Edition::standard())
            .unwrap();
        state.add_player(Player::new("ada", "Ada")).unwrap();
        state.add_player(Player::robot("robbie", "Robbie")).unwrap();
        state.play_if_ready().await;

        state.pass(&ada()).await.unwrap();
        assert_eq!(state.current_actor(), Some(&ada()));
        state.pass(&ada()).await.unwrap();

        assert_eq!(state.phase(), Phase::TwoPasses);
        assert_eq!(state.turns().len(), 5);
    }
}
