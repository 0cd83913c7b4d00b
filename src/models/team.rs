use serde::{Deserialize, Serialize};

/// A team registered for the event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    /// Team number; positive, unique per event. 0 is reserved for empty match slots.
    pub id: u32,
    /// Display name shown on schedules and overlays.
    pub nickname: String,
    /// WPA key for the team's field radio, when wireless security is enabled.
    pub wpa_key: Option<String>,
}

impl Team {
    /// Create a team with no WPA key configured.
    pub fn new(id: u32, nickname: impl Into<String>) -> Self {
        Self {
            id,
            nickname: nickname.into(),
            wpa_key: None,
        }
    }

    /// Whether the configured WPA key satisfies the 8-63 character requirement.
    ///
    /// A team without a key is considered valid; the access point falls back to
    /// an open network for it.
    pub fn has_valid_wpa_key(&self) -> bool {
        match &self.wpa_key {
            Some(key) => (8..=63).contains(&key.len()),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wpa_key_length_bounds() {
        let mut team = Team::new(254, "The Cheesy Poofs");
        assert!(team.has_valid_wpa_key());

        team.wpa_key = Some("short".into());
        assert!(!team.has_valid_wpa_key());

        team.wpa_key = Some("12345678".into());
        assert!(team.has_valid_wpa_key());

        team.wpa_key = Some("x".repeat(63));
        assert!(team.has_valid_wpa_key());

        team.wpa_key = Some("x".repeat(64));
        assert!(!team.has_valid_wpa_key());
    }
}
