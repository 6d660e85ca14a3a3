use mongodb::bson::{to_bson, Bson};
use serde::{Deserialize, Serialize};

/// Our election IDs are integers.
pub type ElectionId = u32;

/// States in the Election lifecycle.
///
/// Only `InProgress` accepts votes; `Open` is the registration/preparation
/// phase between configuration and active voting.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElectionState {
    /// Under construction, only visible to admins.
    Planned,
    /// Published for registration, not yet accepting votes.
    Open,
    /// Actively accepting votes (subject to the time window).
    InProgress,
    /// Voting has ended normally.
    Closed,
    /// Voting was aborted by an administrator.
    Cancelled,
    /// Terminal: tallies have been made public.
    ResultsPublished,
}

impl ElectionState {
    /// Is the transition from `self` to `to` an edge of the lifecycle?
    ///
    /// The lifecycle is strictly forward-only:
    /// `Planned -> Open -> InProgress -> {Closed, Cancelled} -> ResultsPublished`.
    pub fn can_transition(self, to: ElectionState) -> bool {
        use ElectionState::*;
        matches!(
            (self, to),
            (Planned, Open)
                | (Open, InProgress)
                | (InProgress, Closed)
                | (InProgress, Cancelled)
                | (Closed, ResultsPublished)
                | (Cancelled, ResultsPublished)
        )
    }

    /// Is this election over, one way or another?
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ElectionState::Closed | ElectionState::Cancelled | ElectionState::ResultsPublished
        )
    }
}

impl From<ElectionState> for Bson {
    fn from(state: ElectionState) -> Self {
        to_bson(&state).expect("Serialisation is infallible")
    }
}
