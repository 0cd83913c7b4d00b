use crate::error::ArenaError;
use crate::models::{CardMap, CardType, EndgameStatus, Foul, Score, ScoreSummary, ScoringPhase};

/// Live score for one alliance of the loaded match.
///
/// Mutators snapshot the score before changing it so referees can back out
/// of mistakes; the stack is sealed once the teleop score is committed.
#[derive(Debug, Clone, Default)]
pub struct RealtimeScore {
    /// Current game counters and fouls.
    pub score: Score,
    /// Cards assigned to this alliance's teams during the match.
    pub cards: CardMap,
    /// Referee has signed off on the autonomous score.
    pub auto_committed: bool,
    /// Referee has signed off on the final score.
    pub teleop_committed: bool,
    undo_stack: Vec<Score>,
}

impl RealtimeScore {
    /// Set the leave flag for the robot in alliance slot `slot` (0..3).
    pub fn set_leave(&mut self, slot: usize, left: bool) -> Result<(), ArenaError> {
        self.ensure_mutable()?;
        let Some(status) = self.score.leave_statuses.get(slot).copied() else {
            return Err(ArenaError::argument(format!("no alliance slot {slot}")));
        };
        if status != left {
            self.push_undo();
            self.score.leave_statuses[slot] = left;
        }
        Ok(())
    }

    /// Add or remove scored game pieces for the given phase, clamping at zero.
    pub fn adjust_pieces(&mut self, phase: ScoringPhase, delta: i32) -> Result<(), ArenaError> {
        self.ensure_mutable()?;
        let current = match phase {
            ScoringPhase::Auto => self.score.auto_pieces,
            ScoringPhase::Teleop => self.score.teleop_pieces,
        };
        let updated = current.saturating_add_signed(delta);
        if updated != current {
            self.push_undo();
            match phase {
                ScoringPhase::Auto => self.score.auto_pieces = updated,
                ScoringPhase::Teleop => self.score.teleop_pieces = updated,
            }
        }
        Ok(())
    }

    /// Set the endgame status for the robot in alliance slot `slot` (0..3).
    pub fn set_endgame(&mut self, slot: usize, status: EndgameStatus) -> Result<(), ArenaError> {
        self.ensure_mutable()?;
        let Some(current) = self.score.endgame_statuses.get(slot).copied() else {
            return Err(ArenaError::argument(format!("no alliance slot {slot}")));
        };
        if current != status {
            self.push_undo();
            self.score.endgame_statuses[slot] = status;
        }
        Ok(())
    }

    /// Record a foul committed by this alliance.
    pub fn add_foul(&mut self, foul: Foul) -> Result<(), ArenaError> {
        self.ensure_mutable()?;
        self.push_undo();
        self.score.fouls.push(foul);
        Ok(())
    }

    /// Delete the foul at `index` in recording order.
    pub fn remove_foul(&mut self, index: usize) -> Result<(), ArenaError> {
        self.ensure_mutable()?;
        if index >= self.score.fouls.len() {
            return Err(ArenaError::argument(format!("no foul at index {index}")));
        }
        self.push_undo();
        self.score.fouls.remove(index);
        Ok(())
    }

    /// Assign or clear a card for `team_id`. Cards are not undoable.
    pub fn set_card(&mut self, team_id: u32, card: Option<CardType>) -> Result<(), ArenaError> {
        self.ensure_mutable()?;
        match card {
            Some(card) => {
                self.cards.insert(team_id, card);
            }
            None => {
                self.cards.remove(&team_id);
            }
        }
        Ok(())
    }

    /// Mark the autonomous portion of the score as final.
    pub fn commit_auto(&mut self) -> Result<(), ArenaError> {
        self.ensure_mutable()?;
        self.auto_committed = true;
        Ok(())
    }

    /// Mark the whole score as final, sealing mutators and the undo stack.
    pub fn commit_teleop(&mut self) {
        self.auto_committed = true;
        self.teleop_committed = true;
    }

    /// Reopen a committed score for correction.
    pub fn uncommit(&mut self) {
        self.auto_committed = false;
        self.teleop_committed = false;
    }

    /// Restore the score snapshot taken before the last mutation.
    pub fn undo(&mut self) -> Result<(), ArenaError> {
        self.ensure_mutable()?;
        if let Some(prior) = self.undo_stack.pop() {
            self.score = prior;
        }
        Ok(())
    }

    /// Point totals for this alliance given the opponent's live fouls.
    pub fn summarize(&self, opponent: &RealtimeScore) -> ScoreSummary {
        self.score.summarize(&opponent.score.fouls)
    }

    fn ensure_mutable(&self) -> Result<(), ArenaError> {
        if self.teleop_committed {
            return Err(ArenaError::state("score is already committed"));
        }
        Ok(())
    }

    fn push_undo(&mut self) {
        self.undo_stack.push(self.score.clone());
    }
}
