//! Editing Modes
//!
//! The six analysis lenses a manuscript can be reviewed under.

use serde::{Deserialize, Serialize};

/// Editing mode determining prompt templates and aggregation guidance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EditingMode {
    /// Grammar, spelling, punctuation, typos
    #[default]
    Proofread,
    /// Flow, word choice, tone, readability
    Style,
    /// Character voice, motivation, dialogue
    Character,
    /// Pacing, transitions, structure
    Chapter,
    /// Creative suggestions and alternatives
    Creative,
    /// Timeline, plot, and world-building consistency
    Continuity,
}

impl EditingMode {
    pub const ALL: [EditingMode; 6] = [
        EditingMode::Proofread,
        EditingMode::Style,
        EditingMode::Character,
        EditingMode::Chapter,
        EditingMode::Creative,
        EditingMode::Continuity,
    ];
}

impl std::fmt::Display for EditingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EditingMode::Proofread => write!(f, "proofread"),
            EditingMode::Style => write!(f, "style"),
            EditingMode::Character => write!(f, "character"),
            EditingMode::Chapter => write!(f, "chapter"),
            EditingMode::Creative => write!(f, "creative"),
            EditingMode::Continuity => write!(f, "continuity"),
        }
    }
}

impl std::str::FromStr for EditingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "proofread" => Ok(EditingMode::Proofread),
            "style" => Ok(EditingMode::Style),
            "character" => Ok(EditingMode::Character),
            "chapter" => Ok(EditingMode::Chapter),
            "creative" => Ok(EditingMode::Creative),
            "continuity" => Ok(EditingMode::Continuity),
            _ => Err(format!(
                "Unknown editing mode: {}. Valid values: proofread, style, character, chapter, creative, continuity",
                s
            )),
        }
    }
}
