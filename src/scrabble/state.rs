use std::time::Duration;

use rand::distributions::Alphanumeric;
use rand::prelude::StdRng;
use rand::seq::SliceRandom;
use rand::{thread_rng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use super::commands::{PassKind, TakeBackKind};
use super::edition::{Edition, EditionLoader};
use super::events::{Notification, Services};
use super::grid::Grid;
use super::player::{Player, PlayerKey};
use super::robot::best_of;
use super::rules::{MatchConfig, Phase, Timer};
use super::scoring::{self, Move};
use super::supply::TileSupply;
use super::turn::{now, Prior, Turn, TurnKind};
use super::Error;
use crate::dictionary::illegal_words;

/// Bumped whenever the saved form of a match changes incompatibly.
pub const SCHEMA_VERSION: u32 = 1;

/// One game: players, board, bag, the turn log and whose turn it is.
///
/// Built in two steps: [`MatchState::new`] records the configuration, then
/// [`MatchState::create`] loads the edition and fills the board and bag.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct MatchState {
    pub version: u32,
    pub key: String,
    pub config: MatchConfig,
    pub(super) edition: Option<Edition>,
    pub(super) phase: Phase,
    pub(super) players: Vec<Player>,
    pub(super) grid: Grid,
    pub(super) supply: TileSupply,
    pub(super) turns: Vec<Turn>,
    /// Undone turns, most recent last.
    #[serde(default)]
    pub(super) undone: Vec<Turn>,
    pub(super) current: Option<PlayerKey>,
    #[serde(default)]
    pub(super) paused_by: Option<PlayerKey>,
    #[serde(default)]
    pub(super) next_game: Option<String>,
    #[serde(default)]
    pub(super) previous_game: Option<String>,
    pub(super) last_activity: u64,
    #[serde(skip)]
    pub(super) clock_running: bool,
    #[serde(skip, default = "StdRng::from_entropy")]
    rng: StdRng,
    #[serde(skip)]
    pub(super) services: Services,
}

fn new_key() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(16)
        .map(char::from)
        .collect()
}

impl MatchState {
    pub fn new(config: MatchConfig, services: Services) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        MatchState {
            version: SCHEMA_VERSION,
            key: new_key(),
            config,
            edition: None,
            phase: Phase::Waiting,
            players: vec![],
            grid: Grid::default(),
            supply: TileSupply::default(),
            turns: vec![],
            undone: vec![],
            current: None,
            paused_by: None,
            next_game: None,
            previous_game: None,
            last_activity: now(),
            clock_running: false,
            rng,
            services,
        }
    }

    pub async fn create(mut self, loader: &dyn EditionLoader) -> Result<Self, Error> {
        let edition = loader.load(&self.config.edition).await?;
        self.install(edition)?;
        Ok(self)
    }

    /// Skip the loader when the edition is already at hand.
    pub fn with_edition(mut self, edition: Edition) -> Result<Self, Error> {
        self.install(edition)?;
        Ok(self)
    }

    pub(super) fn install(&mut self, edition: Edition) -> Result<(), Error> {
        edition.validate()?;
        self.grid = edition.grid()?;
        self.supply = TileSupply::new(edition.tiles(), self.config.seed);
        self.edition = Some(edition);
        Ok(())
    }

    /// Reattach collaborators after loading a saved match.
    pub fn with_services(mut self, services: Services) -> Self {
        self.services = services;
        self
    }

    pub fn edition(&self) -> Option<&Edition> {
        self.edition.as_ref()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn player(&self, key: &PlayerKey) -> Option<&Player> {
        self.players.iter().find(|p| &p.key == key)
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn supply(&self) -> &TileSupply {
        &self.supply
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn current_actor(&self) -> Option<&PlayerKey> {
        self.current.as_ref()
    }

    pub fn paused_by(&self) -> Option<&PlayerKey> {
        self.paused_by.as_ref()
    }

    pub fn next_game(&self) -> Option<&str> {
        self.next_game.as_deref()
    }

    pub fn previous_game(&self) -> Option<&str> {
        self.previous_game.as_deref()
    }

    pub fn clock_running(&self) -> bool {
        self.clock_running
    }

    pub fn last_activity(&self) -> u64 {
        self.last_activity
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.services.events.subscribe()
    }

    pub fn event_sender(&self) -> broadcast::Sender<Notification> {
        self.services.events.clone()
    }

    pub fn can_redo(&self) -> bool {
        !self.undone.is_empty()
    }

    /// Points for placing `tiles_placed` tiles in one play.
    pub fn bonus(&self, tiles_placed: usize) -> i32 {
        self.edition.as_ref().map_or(0, |e| e.bonus(tiles_placed))
    }

    pub(super) fn rack_size(&self) -> usize {
        self.edition.as_ref().map_or(0, |e| e.rack_size)
    }

    /// Check a candidate play against the board and score it.
    pub fn analyse(&self, placements: &[super::tile::Tile]) -> Result<Move, Error> {
        Ok(scoring::analyse(&self.grid, placements)?)
    }

    pub fn add_player(&mut self, mut player: Player) -> Result<(), Error> {
        if self.edition.is_none() {
            return Err(Error::NotCreated);
        }
        if self.phase != Phase::Waiting {
            return Err(Error::AlreadyStarted);
        }
        if self.player(&player.key).is_some() {
            return Err(Error::DuplicatePlayer(player.key));
        }
        if matches!(self.config.max_players, Some(max) if self.players.len() >= max) {
            return Err(Error::TooManyPlayers);
        }

        while player.rack.len() < self.rack_size() {
            match self.supply.draw() {
                Some(tile) => player.rack.add(tile),
                None => break,
            }
        }

        info!(parent: &self.services.span, game = %self.key, player = %player.key, robot = player.is_robot, "player joined");
        self.players.push(player);
        self.touch();
        Ok(())
    }

    /// Before the game starts the seat is freed and the tiles go back in the
    /// bag; afterwards the player is only marked absent.
    pub fn remove_player(&mut self, key: &PlayerKey) -> Result<(), Error> {
        let index = self.index_of(key).ok_or_else(|| Error::UnknownPlayer(key.clone()))?;

        if self.phase == Phase::Waiting {
            let mut player = self.players.remove(index);
            for tile in player.rack.clear() {
                self.supply.put(tile);
            }
        } else {
            self.players[index].absent = true;
        }

        self.touch();
        Ok(())
    }

    /// Start the game once enough players have joined. Returns whether it started.
    pub async fn play_if_ready(&mut self) -> bool {
        if self.phase != Phase::Waiting || self.players.len() < self.config.min_players.max(1) {
            return false;
        }

        if !self.config.no_player_shuffle {
            self.players.shuffle(&mut self.rng);
        }

        if let Timer::Game { seconds, .. } = self.config.timer {
            for player in &mut self.players {
                player.clock = Some(seconds);
            }
        }

        self.phase = Phase::Playing;
        self.current = self.players.first().map(|p| p.key.clone());
        self.start_turn_clock();

        info!(
            parent: &self.services.span,
            game = %self.key,
            first = ?self.current,
            players = self.players.len(),
            "game started"
        );

        self.touch();
        self.save().await;
        self.advance().await;
        true
    }

    pub(super) fn index_of(&self, key: &PlayerKey) -> Option<usize> {
        self.players.iter().position(|p| &p.key == key)
    }

    /// Panics when `key` is not seated: callers have already checked, so a
    /// miss here means the log and the table disagree.
    pub(super) fn seat(&mut self, key: &PlayerKey) -> &mut Player {
        match self.players.iter_mut().find(|p| &p.key == key) {
            Some(player) => player,
            None => panic!("player {} is not seated in game {}", key, self.key),
        }
    }

    pub(super) fn ensure_member(&self, key: &PlayerKey) -> Result<(), Error> {
        match self.player(key) {
            Some(_) => Ok(()),
            None => Err(Error::UnknownPlayer(key.clone())),
        }
    }

    pub(super) fn ensure_playing(&self) -> Result<(), Error> {
        match self.phase {
            Phase::Waiting => Err(Error::NotStarted),
            Phase::Playing if self.paused_by.is_some() => Err(Error::Paused),
            Phase::Playing => Ok(()),
            _ => Err(Error::GameOver),
        }
    }

    pub(super) fn ensure_actor(&self, key: &PlayerKey) -> Result<(), Error> {
        self.ensure_playing()?;
        self.ensure_member(key)?;

        if self.current.as_ref() != Some(key) {
            return Err(Error::NotYourTurn);
        }
        Ok(())
    }

    /// What a turn by `player` would overwrite.
    pub(super) fn prior(&self, player: &PlayerKey) -> Prior {
        Prior {
            actor: self.current.clone(),
            passes: self.player(player).map_or(0, |p| p.passes),
            flagged: vec![],
        }
    }

    /// The seat after the current actor, skipping absent players and anyone
    /// flagged to miss a turn. Used flags are cleared and their owners pushed
    /// onto `flagged`. When nobody else can play the turn comes back round.
    pub(super) fn next_player(&mut self, flagged: &mut Vec<PlayerKey>) -> Option<PlayerKey> {
        let start = self.current.as_ref().and_then(|k| self.index_of(k))?;
        let count = self.players.len();

        for step in 1..=count {
            let player = &mut self.players[(start + step) % count];
            if step < count {
                if player.absent {
                    continue;
                }
                if player.miss_next_turn {
                    player.miss_next_turn = false;
                    flagged.push(player.key.clone());
                    continue;
                }
            }
            return Some(player.key.clone());
        }

        None
    }

    pub(super) fn all_passed_twice(&self) -> bool {
        !self.players.is_empty() && self.players.iter().all(|p| p.passes >= 2)
    }

    /// The latest turn, looking through failed challenges, when it is a play.
    pub(super) fn previous_move(&self) -> Option<&Turn> {
        self.turns
            .iter()
            .rev()
            .find(|t| !matches!(t.kind, TurnKind::ChallengeLost { .. }))
            .filter(|t| t.is_play())
    }

    pub(super) fn touch(&mut self) {
        self.last_activity = now();
    }

    pub(super) fn notify(&self, notification: Notification) {
        // no subscribers is not an error
        let _ = self.services.events.send(notification);
    }

    pub(super) async fn save(&self) {
        let Some(store) = self.services.store.clone() else {
            return;
        };

        if let Err(e) = store.save(self).await {
            error!(parent: &self.services.span, game = %self.key, "save failed: {}", e);
        }
    }

    /// Append a turn to the log, persist and tell everyone.
    pub(super) async fn finish_turn(&mut self, turn: Turn) -> Turn {
        debug!(
            parent: &self.services.span,
            game = %self.key,
            kind = turn.kind.name(),
            player = %turn.player,
            score = turn.score,
            next = ?turn.next_to_go,
            "turn"
        );

        self.turns.push(turn.clone());
        self.touch();
        self.save().await;
        self.notify(Notification::Turn(turn.clone()));
        turn
    }

    pub(super) fn start_clock(&mut self) {
        self.clock_running = self.config.timer != Timer::None
            && self.phase == Phase::Playing
            && self.paused_by.is_none();
    }

    /// Fresh allowance for the player whose turn just began.
    pub(super) fn start_turn_clock(&mut self) {
        if let (Timer::Turn { seconds }, Some(actor)) = (self.config.timer, self.current.clone()) {
            self.seat(&actor).clock = Some(seconds);
        }
        self.start_clock();
    }

    pub(super) fn stop_clock(&mut self) {
        self.clock_running = false;
    }

    /// One second of the running clock. With a per-turn timer, running out
    /// passes the turn and the resulting turn is returned.
    pub async fn tick(&mut self) -> Option<Turn> {
        if !self.clock_running || self.ensure_playing().is_err() {
            return None;
        }

        let actor = self.current.clone()?;
        let remaining = {
            let clock = self.seat(&actor).clock.get_or_insert(0);
            *clock -= 1;
            *clock
        };

        self.notify(Notification::Tick {
            actor: actor.clone(),
            seconds_remaining: remaining,
        });

        if matches!(self.config.timer, Timer::Turn { .. }) && remaining <= 0 {
            info!(parent: &self.services.span, game = %self.key, player = %actor, "turn timed out");
            self.undone.clear();
            let turn = self.do_pass(&actor, PassKind::TimedOut).await;
            self.advance().await;
            return Some(turn);
        }

        None
    }

    pub async fn pause(&mut self, player: &PlayerKey) -> Result<(), Error> {
        self.ensure_playing()?;
        self.ensure_member(player)?;

        self.paused_by = Some(player.clone());
        self.stop_clock();
        self.touch();
        self.save().await;
        self.notify(Notification::Pause { player: player.clone() });
        Ok(())
    }

    pub async fn unpause(&mut self, player: &PlayerKey) -> Result<(), Error> {
        self.ensure_member(player)?;
        if self.paused_by.take().is_none() {
            return Ok(());
        }

        self.start_clock();
        self.touch();
        self.save().await;
        self.notify(Notification::Unpause { player: player.clone() });
        self.advance().await;
        Ok(())
    }

    /// End a match nobody has touched for longer than `max_idle`.
    /// Returns whether it was ended.
    pub async fn check_age(&mut self, max_idle: Duration) -> bool {
        if self.phase.is_over() {
            return false;
        }

        let idle = now().saturating_sub(self.last_activity);
        if idle <= max_idle.as_millis() as u64 {
            return false;
        }

        info!(parent: &self.services.span, game = %self.key, idle_ms = idle, "game abandoned");
        self.phase = Phase::TimedOut;
        self.stop_clock();
        self.save().await;
        true
    }

    /// Let robots take their turns, and end the game when everyone has
    /// passed twice running.
    pub(super) async fn advance(&mut self) {
        loop {
            if self.ensure_playing().is_err() {
                return;
            }

            let Some(actor) = self.current.clone() else {
                return;
            };

            if self.all_passed_twice() {
                self.do_confirm_game_over(&actor, Phase::TwoPasses).await;
                return;
            }

            if !self.player(&actor).is_some_and(|p| p.is_robot) {
                return;
            }
            self.robot_turn(&actor).await;
        }
    }

    async fn robot_turn(&mut self, robot: &PlayerKey) {
        let Some(player) = self.player(robot) else {
            return;
        };
        let can_challenge = player.can_challenge;
        let rack = player.rack.clone();

        if let Some(previous) = self.previous_move().cloned() {
            if can_challenge && &previous.player != robot {
                if let Some(dictionary) = self.services.dictionary.clone() {
                    let words: Vec<String> = previous.words().iter().map(|w| w.word.clone()).collect();
                    if !illegal_words(dictionary.as_ref(), &words).is_empty() {
                        info!(parent: &self.services.span, game = %self.key, robot = %robot, "robot challenges");
                        if let Err(e) = self.do_take_back(TakeBackKind::ChallengeWon(robot.clone())).await {
                            error!(parent: &self.services.span, game = %self.key, "robot challenge failed: {}", e);
                        } else {
                            return;
                        }
                    }
                }
            }

            let emptied = self.player(&previous.player).is_some_and(|p| p.rack.is_empty());
            if emptied {
                self.do_confirm_game_over(robot, Phase::GameOver).await;
                return;
            }
        }

        let best = match self.services.robot.clone() {
            Some(search) => best_of(
                search
                    .find_best_play(&self.grid, &rack, self.config.dictionary.as_deref())
                    .await,
            ),
            None => None,
        };

        if let Some(best) = best {
            match self.robot_move(robot, &best) {
                Ok(mv) => {
                    self.undone.clear();
                    match self.do_play(robot, mv).await {
                        Ok(_) => return,
                        Err(e) => error!(parent: &self.services.span, game = %self.key, robot = %robot, "robot play refused: {}", e),
                    }
                }
                Err(e) => warn!(parent: &self.services.span, game = %self.key, robot = %robot, "robot candidate refused: {}", e),
            }
        }

        self.do_pass(robot, PassKind::Passed).await;
    }

    /// Give each named player exactly these letters. All racks go back in
    /// the bag first, so any letters the bag holds can be dealt.
    #[cfg(test)]
    pub(crate) fn rig_racks(&mut self, racks: &[(&str, &str)]) {
        use super::tile::{Face, Tile};

        for (key, _) in racks {
            let index = self.index_of(&(*key).into()).unwrap();
            for tile in self.players[index].rack.clear() {
                self.supply.put(tile);
            }
        }

        for (key, letters) in racks {
            let index = self.index_of(&(*key).into()).unwrap();
            for c in letters.chars() {
                let face = if c == ' ' { Face::Blank(None) } else { Face::Char(c) };
                let tile = self.supply.take(&Tile::new(face, 0)).unwrap();
                self.players[index].rack.add(tile);
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::scrabble::Penalty;

    fn config() -> MatchConfig {
        MatchConfig {
            no_player_shuffle: true,
            challenge_penalty: Penalty::Miss,
            seed: Some(11),
            ..MatchConfig::default()
        }
    }

    async fn two_player_game() -> MatchState {
        let mut state = MatchState::new(config(), Services::default())
            .with_edition(Edition::standard())
            .unwrap();
        state.add_player(Player::new("ada", "Ada")).unwrap();
        state.add_player(Player::new("frankie", "Frankie")).unwrap();
        assert!(state.play_if_ready().await);
        state
    }

    #[tokio::test]
    async fn test_start_fills_racks() {
        let state = two_player_game().await;

        assert_eq!(state.phase(), Phase::Playing);
        assert_eq!(state.current_actor(), Some(&"ada".into()));
        assert!(state.players().iter().all(|p| p.rack.len() == 7));
        assert_eq!(state.supply().len(), 86);
    }

    #[tokio::test]
    async fn test_add_player_rules() {
        let mut state = MatchState::new(
            MatchConfig {
                max_players: Some(1),
                min_players: 1,
                ..config()
            },
            Services::default(),
        );

        assert_eq!(state.add_player(Player::new("ada", "Ada")), Err(Error::NotCreated));

        let mut state = state.with_edition(Edition::standard()).unwrap();
        state.add_player(Player::new("ada", "Ada")).unwrap();
        assert_eq!(
            state.add_player(Player::new("ada", "Ada")),
            Err(Error::DuplicatePlayer("ada".into()))
        );
        assert_eq!(state.add_player(Player::new("bo", "Bo")), Err(Error::TooManyPlayers));

        state.remove_player(&"ada".into()).unwrap();
        assert_eq!(state.supply().len(), 100);

        state.add_player(Player::new("bo", "Bo")).unwrap();
        assert!(state.play_if_ready().await);
        assert_eq!(state.add_player(Player::new("cy", "Cy")), Err(Error::AlreadyStarted));
    }

    #[tokio::test]
    async fn test_miss_turn_is_skipped_once() {
        let mut state = MatchState::new(config(), Services::default())
            .with_edition(Edition::standard())
            .unwrap();
        for key in ["a", "b", "c"] {
            state.add_player(Player::new(key, key)).unwrap();
        }
        state.play_if_ready().await;

        state.seat(&"b".into()).miss_next_turn = true;
        let mut flagged = vec![];
        assert_eq!(state.next_player(&mut flagged), Some("c".into()));
        assert_eq!(flagged, vec![PlayerKey::from("b")]);
        assert!(!state.player(&"b".into()).unwrap().miss_next_turn);
    }

    #[tokio::test]
    async fn test_absent_players_are_skipped() {
        let mut state = MatchState::new(config(), Services::default())
            .with_edition(Edition::standard())
            .unwrap();
        for key in ["a", "b", "c"] {
            state.add_player(Player::new(key, key)).unwrap();
        }
        state.play_if_ready().await;

        state.remove_player(&"b".into()).unwrap();
        assert!(state.player(&"b".into()).unwrap().absent);

        let turn = state.pass(&"a".into()).await.unwrap();
        assert_eq!(turn.next_to_go, Some("c".into()));
        assert_eq!(state.current_actor(), Some(&"c".into()));
    }

    #[tokio::test]
    async fn test_pause_blocks_commands() {
        let mut state = two_player_game().await;
        let ada: PlayerKey = "ada".into();

        state.pause(&"frankie".into()).await.unwrap();
        assert_eq!(state.paused_by(), Some(&"frankie".into()));
        assert_eq!(state.pass(&ada).await, Err(Error::Paused));

        state.unpause(&ada).await.unwrap();
        assert!(state.pass(&ada).await.is_ok());
    }

    #[tokio::test]
    async fn test_turn_timer_passes() {
        let mut state = MatchState::new(
            MatchConfig {
                timer: Timer::Turn { seconds: 2 },
                ..config()
            },
            Services::default(),
        )
        .with_edition(Edition::standard())
        .unwrap();
        state.add_player(Player::new("ada", "Ada")).unwrap();
        state.add_player(Player::new("frankie", "Frankie")).unwrap();
        state.play_if_ready().await;

        assert!(state.clock_running());
        assert!(state.tick().await.is_none());
        let turn = state.tick().await.unwrap();

        assert_eq!(turn.kind, TurnKind::TimedOut);
        assert_eq!(turn.next_to_go, Some("frankie".into()));
        assert_eq!(state.player(&"frankie".into()).unwrap().clock, Some(2));
    }

    #[tokio::test]
    async fn test_check_age() {
        let mut state = two_player_game().await;

        assert!(!state.check_age(Duration::from_secs(60)).await);
        state.last_activity -= 120_000;
        assert!(state.check_age(Duration::from_secs(60)).await);
        assert_eq!(state.phase(), Phase::TimedOut);
        assert!(!state.clock_running());
    }
}
