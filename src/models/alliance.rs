use serde::{Deserialize, Serialize};

/// An alliance formed during alliance selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alliance {
    /// Seed position from alliance selection, starting at 1.
    pub id: u32,
    /// Member teams in pick order: captain first, then picks, then any backup.
    pub team_ids: Vec<u32>,
}

impl Alliance {
    /// Create an alliance from its seed and ordered members.
    pub fn new(id: u32, team_ids: Vec<u32>) -> Self {
        Self { id, team_ids }
    }

    /// The three teams that play a match, in pick order.
    ///
    /// Returns `None` when the alliance roster is incomplete.
    pub fn lineup(&self) -> Option<[u32; 3]> {
        match self.team_ids[..] {
            [first, second, third, ..] => Some([first, second, third]),
            _ => None,
        }
    }
}
