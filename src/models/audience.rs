use serde::{Deserialize, Serialize};

/// Screen shown on the audience display.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AudienceDisplayMode {
    /// Nothing rendered.
    #[default]
    Blank,
    /// Event logo.
    Logo,
    /// Pre-match team introduction.
    Intro,
    /// Live match view with the realtime score bar.
    Match,
    /// Final score of the most recently posted match.
    Score,
    /// Sponsor slideshow.
    SponsorSlides,
    /// Playoff bracket overview.
    Bracket,
    /// Timeout countdown.
    Timeout,
}

/// Screen shown on the alliance station displays at the field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AllianceStationDisplayMode {
    /// Nothing rendered.
    Blank,
    /// Event logo.
    Logo,
    /// Team numbers for the loaded match.
    #[default]
    Match,
    /// Timeout countdown.
    Timeout,
}

/// One announcer overlay line pair shown at the bottom of the audience display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LowerThird {
    /// Store-assigned identity; 0 until persisted.
    pub id: i64,
    /// Headline text.
    pub top_text: String,
    /// Secondary text.
    pub bottom_text: String,
    /// Position in the operator's list.
    pub display_order: u32,
}

/// One slide of the sponsor rotation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SponsorSlide {
    /// Store-assigned identity; 0 until persisted.
    pub id: i64,
    /// Small text above the sponsor lines.
    pub subtitle: String,
    /// First sponsor line.
    pub line1: String,
    /// Second sponsor line.
    pub line2: String,
    /// Position in the rotation.
    pub display_order: u32,
}
