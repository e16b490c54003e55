pub mod config;
pub mod dictionary;
pub mod scrabble;
pub mod store;
pub mod table;
