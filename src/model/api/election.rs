use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::model::{
    common::election::{ElectionId, ElectionState},
    db::election::{Election, ElectionCore, ElectionMetadata, NewElection},
    mongodb::Id,
};

/// An election specification, as submitted by an administrator to create or
/// replace an election's configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElectionSpec {
    /// Election title.
    pub title: String,
    /// Longer description shown to voters.
    #[serde(default)]
    pub description: String,
    /// Scheduled start of voting.
    pub start: DateTime<Utc>,
    /// Scheduled end of voting.
    pub end: DateTime<Utc>,
    /// Optional narrower validity window.
    #[serde(default)]
    pub valid_from: Option<DateTime<Utc>>,
    #[serde(default)]
    pub valid_until: Option<DateTime<Utc>>,
    /// May a voter cast more than one vote?
    #[serde(default)]
    pub allow_multiple_votes: bool,
    /// Per-voter vote allowance.
    #[serde(default = "default_max_votes")]
    pub max_votes_per_voter: u32,
    /// Are tallies public before the election ends?
    #[serde(default)]
    pub results_visible: bool,
    /// Voters allowed to cast votes.
    #[serde(default)]
    pub authorized_voters: HashSet<Id>,
    /// Candidates standing.
    #[serde(default)]
    pub candidates: HashSet<Id>,
}

fn default_max_votes() -> u32 {
    1
}

impl ElectionSpec {
    /// Check the data-model invariants the state machine and ledger rely on.
    pub fn validate(&self) -> Result<(), Error> {
        if self.start >= self.end {
            return Err(Error::InvalidElectionConfiguration(format!(
                "start ({}) must precede end ({})",
                self.start, self.end
            )));
        }
        if let (Some(valid_from), Some(valid_until)) = (self.valid_from, self.valid_until) {
            if valid_from >= valid_until {
                return Err(Error::InvalidElectionConfiguration(format!(
                    "valid_from ({}) must precede valid_until ({})",
                    valid_from, valid_until
                )));
            }
        }
        if self.max_votes_per_voter < 1 {
            return Err(Error::InvalidElectionConfiguration(
                "max_votes_per_voter must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Would applying this spec change the scheduling window?
    ///
    /// The window is locked once an election is in progress: re-opening or
    /// shortening a live election retroactively is forbidden.
    pub fn changes_window(&self, existing: &ElectionMetadata) -> bool {
        self.start != existing.start || self.end != existing.end
    }

    /// Convert this spec into a new election owned by the given admin.
    pub fn into_election(self, state: ElectionState, created_by: Id) -> NewElection {
        ElectionCore {
            metadata: ElectionMetadata {
                title: self.title,
                description: self.description,
                state,
                start: self.start,
                end: self.end,
                valid_from: self.valid_from,
                valid_until: self.valid_until,
                allow_multiple_votes: self.allow_multiple_votes,
                max_votes_per_voter: self.max_votes_per_voter,
                results_visible: self.results_visible,
                created_by,
            },
            authorized_voters: self.authorized_voters,
            candidates: self.candidates,
        }
    }
}

/// An API-friendly election description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionDescription {
    /// Election unique ID.
    pub id: ElectionId,
    pub title: String,
    pub description: String,
    pub state: ElectionState,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
    pub allow_multiple_votes: bool,
    pub max_votes_per_voter: u32,
    pub results_visible: bool,
    pub authorized_voters: HashSet<Id>,
    pub candidates: HashSet<Id>,
}

impl From<Election> for ElectionDescription {
    fn from(election: Election) -> Self {
        let metadata = election.election.metadata;
        Self {
            id: election.id,
            title: metadata.title,
            description: metadata.description,
            state: metadata.state,
            start: metadata.start,
            end: metadata.end,
            valid_from: metadata.valid_from,
            valid_until: metadata.valid_until,
            allow_multiple_votes: metadata.allow_multiple_votes,
            max_votes_per_voter: metadata.max_votes_per_voter,
            results_visible: metadata.results_visible,
            authorized_voters: election.election.authorized_voters,
            candidates: election.election.candidates,
        }
    }
}

/// A summary of an election, shorter than the full `ElectionDescription`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionSummary {
    /// Election unique ID.
    pub id: ElectionId,
    pub title: String,
    pub state: ElectionState,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl From<Election> for ElectionSummary {
    fn from(election: Election) -> Self {
        Self {
            id: election.id,
            title: election.election.metadata.title,
            state: election.election.metadata.state,
            start: election.election.metadata.start,
            end: election.election.metadata.end,
        }
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    use chrono::Duration;

    impl ElectionSpec {
        /// A single-vote election whose window covers now.
        pub fn current_example() -> Self {
            let start = Utc::now() - Duration::hours(1);
            Self {
                title: "Student Union President".to_string(),
                description: "Annual SU presidential election".to_string(),
                start,
                end: start + Duration::days(1),
                valid_from: None,
                valid_until: None,
                allow_multiple_votes: false,
                max_votes_per_voter: 1,
                results_visible: false,
                authorized_voters: HashSet::new(),
                candidates: HashSet::new(),
            }
        }

        /// A multi-vote election (cap 2) whose window covers now.
        pub fn multi_vote_example() -> Self {
            Self {
                title: "Committee Members".to_string(),
                allow_multiple_votes: true,
                max_votes_per_voter: 2,
                ..Self::current_example()
            }
        }

        /// An election whose window has not opened yet.
        pub fn future_example() -> Self {
            let start = Utc::now() + Duration::hours(1);
            Self {
                title: "Next Year's Committee".to_string(),
                start,
                end: start + Duration::days(1),
                ..Self::current_example()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::Duration;

    #[test]
    fn valid_specs_pass() {
        ElectionSpec::current_example().validate().unwrap();
        ElectionSpec::multi_vote_example().validate().unwrap();
        ElectionSpec::future_example().validate().unwrap();
    }

    #[test]
    fn start_must_precede_end() {
        let mut spec = ElectionSpec::current_example();
        spec.end = spec.start;
        assert!(matches!(
            spec.validate(),
            Err(Error::InvalidElectionConfiguration(_))
        ));
        spec.end = spec.start - Duration::hours(1);
        assert!(spec.validate().is_err());
    }

    #[test]
    fn validity_bounds_must_be_ordered() {
        let mut spec = ElectionSpec::current_example();
        let now = Utc::now();
        spec.valid_from = Some(now);
        spec.valid_until = Some(now);
        assert!(spec.validate().is_err());

        // A single bound is fine.
        spec.valid_until = None;
        spec.validate().unwrap();
    }

    #[test]
    fn cap_must_be_positive() {
        let mut spec = ElectionSpec::multi_vote_example();
        spec.max_votes_per_voter = 0;
        assert!(matches!(
            spec.validate(),
            Err(Error::InvalidElectionConfiguration(_))
        ));
    }

    #[test]
    fn window_change_detection() {
        let spec = ElectionSpec::current_example();
        let election = spec
            .clone()
            .into_election(ElectionState::InProgress, Id::new());
        assert!(!spec.changes_window(&election.metadata));

        let mut moved = spec;
        moved.end = moved.end + Duration::hours(2);
        assert!(moved.changes_window(&election.metadata));
    }
}
