use std::path::Path;

use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use scrabble_engine::config::Settings;
use scrabble_engine::dictionary::{self, WordList};
use scrabble_engine::scrabble::{Builtin, EditionDir, EditionLoader, MatchState, Replay};
use scrabble_engine::store::{self, FileStore, Store};

#[derive(Parser, Debug)]
#[command(about = "Inspect and replay saved games")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the board, racks and scores of a saved game.
    Show { game: String },
    /// Rebuild a saved game from its first turn, printing each turn.
    Replay { game: String },
    /// Print the board and letter values of an edition.
    Edition { name: String },
    /// Check words against the configured word list.
    Check { words: Vec<String> },
}

#[tokio::main]
async fn main() {
    let settings = Settings::from_env();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Show { game } => show(&settings, &game).await,
        Command::Replay { game } => replay(&settings, &game).await,
        Command::Edition { name } => edition(&settings, &name).await,
        Command::Check { words } => check(&settings, &words).await,
    };

    if let Err(e) = result {
        error!("{}", e);
        std::process::exit(1);
    }
}

/// `game` is a path to a saved game, or the key of one in the save directory.
async fn load(settings: &Settings, game: &str) -> Result<MatchState, store::Error> {
    if Path::new(game).is_file() {
        let body = tokio::fs::read_to_string(game).await?;
        return store::from_json(&body);
    }

    match &settings.save_dir {
        Some(dir) => FileStore::new(dir).load(game).await,
        None => Err(store::Error::NotFound(game.to_owned())),
    }
}

fn print_state(state: &MatchState) {
    println!("{}", state.grid().as_board_string());
    for player in state.players() {
        println!("{:>12} {:>5}  [{}]", player.name, player.score, player.rack.letters());
    }
    println!("bag: {} tiles, phase {:?}", state.supply().len(), state.phase());
}

async fn show(settings: &Settings, game: &str) -> Result<(), Box<dyn std::error::Error>> {
    let state = load(settings, game).await?;
    print_state(&state);
    Ok(())
}

async fn replay(settings: &Settings, game: &str) -> Result<(), Box<dyn std::error::Error>> {
    let source = load(settings, game).await?;
    let mut replay = Replay::new(&source)?;
    info!(game = %source.key, turns = source.turns().len(), "replaying");

    while let Some(turn) = replay.step().await {
        println!("{}", serde_json::to_string(&turn?)?);
    }

    print_state(replay.state());
    Ok(())
}

async fn edition(settings: &Settings, name: &str) -> Result<(), Box<dyn std::error::Error>> {
    let edition = match &settings.editions_dir {
        Some(dir) => EditionDir(dir.clone()).load(name).await?,
        None => Builtin::default().load(name).await?,
    };

    println!("{}", edition.grid()?.as_board_string());
    for letter in &edition.letters {
        println!("{} x{:<2} {:>2} pts", letter.letter, letter.count, letter.score);
    }
    println!("rack {}, swap {}", edition.rack_size, edition.swap_size);
    Ok(())
}

async fn check(settings: &Settings, words: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    let list = WordList::shared(settings).await?;
    info!(words = list.len(), "word list loaded");

    let illegal = dictionary::illegal_words(list.as_ref(), words);
    if illegal.is_empty() {
        println!("all words allowed");
    } else {
        println!("not allowed: {}", illegal.join(", "));
    }
    Ok(())
}
