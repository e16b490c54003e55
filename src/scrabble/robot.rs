use async_trait::async_trait;

use super::grid::Grid;
use super::rack::Rack;
use super::scoring::Move;

/// Move search for robot players. The match picks the highest scoring
/// candidate; an empty list makes the robot pass.
#[async_trait]
pub trait BestPlay: Send + Sync {
    async fn find_best_play(&self, grid: &Grid, rack: &Rack, dictionary: Option<&str>) -> Vec<Move>;
}

/// Pick the candidate worth most. Ties keep the earliest.
pub(crate) fn best_of(candidates: Vec<Move>) -> Option<Move> {
    candidates
        .into_iter()
        .fold(None, |best: Option<Move>, candidate| match best {
            Some(best) if best.score >= candidate.score => Some(best),
            _ => Some(candidate),
        })
}
