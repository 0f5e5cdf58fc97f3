//! Activation state machine
//!
//! ```text
//! Idle
//!   ↓ activate page
//! Activating
//!   ↓ navigation issued        ↓ page already shows the URL
//! Loading                  LoadSkippedSamePage
//!   ↓ load finished            ↓
//! Idle  ←──────────────────────┘
//! ```

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivationState {
    /// No activation in progress
    #[default]
    Idle,
    /// A live page is being bound to the active tab
    Activating,
    /// The active page is loading
    Loading,
    /// The page was already live on the target URL, nothing to load
    LoadSkippedSamePage,
}

impl ActivationState {
    pub fn can_transition_to(&self, target: ActivationState) -> bool {
        use ActivationState::*;
        match (self, target) {
            (Idle, Activating) => true,
            // "ready to load" can start a load without a tab switch
            (Idle, Loading) => true,
            (Activating, Loading) | (Activating, LoadSkippedSamePage) => true,
            // Activation failed or was deferred to a new-tab intent
            (Activating, Idle) => true,
            (Loading, Idle) | (LoadSkippedSamePage, Idle) => true,
            // A tab switch interrupts a load
            (Loading, Activating) | (LoadSkippedSamePage, Activating) => true,
            (a, b) if *a == b => true,
            _ => false,
        }
    }

    pub fn is_busy(&self) -> bool {
        !matches!(self, ActivationState::Idle)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ActivationState::Idle => "idle",
            ActivationState::Activating => "activating",
            ActivationState::Loading => "loading",
            ActivationState::LoadSkippedSamePage => "load_skipped_same_page",
        }
    }
}

impl std::fmt::Display for ActivationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
