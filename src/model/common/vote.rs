use mongodb::bson::{to_bson, Bson};
use serde::{Deserialize, Serialize};

/// States of a ledger entry. Only `Valid` votes count towards tallies.
///
/// `Pending` and `Rejected` exist for audit imports from external systems;
/// the cast operation itself only ever writes `Valid` records, and the void
/// operation only ever turns `Valid` into `Voided`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VoteState {
    Valid,
    Voided,
    Pending,
    Rejected,
}

impl VoteState {
    /// Does a vote in this state contribute to counts and percentages?
    pub fn counts_towards_tally(self) -> bool {
        self == VoteState::Valid
    }
}

impl From<VoteState> for Bson {
    fn from(state: VoteState) -> Self {
        to_bson(&state).expect("Serialisation is infallible")
    }
}
