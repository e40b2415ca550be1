//! Trigger type — which containment transition makes a rule fire.

use serde::{Deserialize, Serialize};

/// Containment transition policy of a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    /// Fires when an entity goes from outside to inside.
    Enter,
    /// Fires when an entity goes from inside to outside.
    Exit,
    /// Fires on any change of containment.
    Both,
}

impl TriggerType {
    /// Decide whether a transition from `was_inside` to `is_inside` fires.
    ///
    /// An entity never seen before is passed as `was_inside = false`, so a
    /// first sighting inside the area fires `Enter`/`Both` but never `Exit`.
    #[must_use]
    pub fn fires(self, was_inside: bool, is_inside: bool) -> bool {
        match self {
            Self::Enter => is_inside && !was_inside,
            Self::Exit => !is_inside && was_inside,
            Self::Both => is_inside != was_inside,
        }
    }
}

impl std::fmt::Display for TriggerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Enter => "enter",
            Self::Exit => "exit",
            Self::Both => "both",
        })
    }
}
