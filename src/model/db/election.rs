use std::collections::HashSet;
use std::ops::Deref;

use chrono::{DateTime, Utc};
use mongodb::bson::{doc, serde_helpers::chrono_datetime_as_bson_datetime};
use rocket::http::Status;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    common::election::{ElectionId, ElectionState},
    mongodb::{option_chrono_datetime_as_bson_datetime, Coll, Id},
};

/// A view on just the election's top-level metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionMetadata {
    /// Election title.
    pub title: String,
    /// Longer description shown to voters.
    pub description: String,
    /// Election lifecycle state.
    pub state: ElectionState,
    /// Scheduled start of voting.
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub start: DateTime<Utc>,
    /// Scheduled end of voting.
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub end: DateTime<Utc>,
    /// Optional narrower window further restricting when votes are accepted.
    #[serde(default, with = "option_chrono_datetime_as_bson_datetime")]
    pub valid_from: Option<DateTime<Utc>>,
    #[serde(default, with = "option_chrono_datetime_as_bson_datetime")]
    pub valid_until: Option<DateTime<Utc>>,
    /// May a voter cast more than one vote?
    pub allow_multiple_votes: bool,
    /// Per-voter vote allowance; only meaningful when `allow_multiple_votes`.
    pub max_votes_per_voter: u32,
    /// Are tallies visible to the public before the election ends?
    pub results_visible: bool,
    /// The administrator who owns this election.
    pub created_by: Id,
}

/// Core election data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionCore {
    /// Top-level metadata.
    #[serde(flatten)]
    pub metadata: ElectionMetadata,
    /// Voters allowed to cast votes in this election.
    pub authorized_voters: HashSet<Id>,
    /// Candidates standing in this election.
    pub candidates: HashSet<Id>,
}

/// An election without an ID, ready for insertion.
pub type NewElection = ElectionCore;

/// An election from the database, with its unique ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Election {
    /// Unique ID, allocated from the election ID counter.
    #[serde(rename = "_id")]
    pub id: ElectionId,
    #[serde(flatten)]
    pub election: ElectionCore,
}

impl Deref for Election {
    type Target = ElectionCore;

    fn deref(&self) -> &Self::Target {
        &self.election
    }
}

impl Election {
    /// Replace this election's configuration, guarded on the lifecycle state
    /// observed when `self` was read. If a state transition committed in the
    /// meantime the filter matches nothing and the caller gets a conflict,
    /// rather than the replacement silently undoing the transition.
    pub async fn replace(
        &self,
        replacement: &NewElection,
        elections: &Coll<NewElection>,
    ) -> Result<()> {
        let filter = doc! { "_id": self.id, "state": self.metadata.state };
        let result = elections.replace_one(filter, replacement, None).await?;
        if result.matched_count == 0 {
            return Err(Error::Status(
                Status::Conflict,
                format!("Election {} changed state concurrently", self.id),
            ));
        }
        Ok(())
    }

    /// Delete this election, guarded on the observed lifecycle state the
    /// same way as [`Self::replace`].
    pub async fn delete(&self, elections: &Coll<Election>) -> Result<()> {
        let filter = doc! { "_id": self.id, "state": self.metadata.state };
        let result = elections.delete_one(filter, None).await?;
        if result.deleted_count == 0 {
            return Err(Error::Status(
                Status::Conflict,
                format!("Election {} changed state concurrently", self.id),
            ));
        }
        Ok(())
    }
}

impl ElectionCore {
    /// How many votes may a single voter cast in total?
    pub fn vote_cap(&self) -> u32 {
        if self.metadata.allow_multiple_votes {
            self.metadata.max_votes_per_voter
        } else {
            1
        }
    }

    /// Is this election accepting votes right now?
    ///
    /// Derived fresh from `(state, start, end, now)` on every call; the state
    /// alone is never trusted, so a lapsed window closes voting even if an
    /// administrator forgot to transition the election.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.metadata.state == ElectionState::InProgress
            && self.metadata.start <= now
            && now < self.metadata.end
    }

    /// Is `now` inside the optional validity window?
    ///
    /// Vacuously true when no bounds are configured; an independent gate
    /// layered on top of [`Self::is_active`].
    pub fn is_within_validity_window(&self, now: DateTime<Utc>) -> bool {
        if let Some(valid_from) = self.metadata.valid_from {
            if now < valid_from {
                return false;
            }
        }
        if let Some(valid_until) = self.metadata.valid_until {
            if now > valid_until {
                return false;
            }
        }
        true
    }

    /// May `voter_id` cast a vote for `candidate_id` at `now`?
    ///
    /// Checks are ordered and fail fast so the caller always learns the first
    /// violated condition: active, validity window, voter authorization,
    /// candidate participation. Stateless beyond this snapshot; safe to call
    /// repeatedly (the ledger re-runs it just before writing).
    pub fn validate_vote(
        &self,
        election_id: ElectionId,
        voter_id: Id,
        candidate_id: Id,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if !self.is_active(now) {
            return Err(Error::ElectionNotActive(election_id));
        }
        if !self.is_within_validity_window(now) {
            return Err(Error::OutsideValidityWindow(election_id));
        }
        if !self.authorized_voters.contains(&voter_id) {
            return Err(Error::VoterNotAuthorized {
                election_id,
                voter_id,
            });
        }
        if !self.candidates.contains(&candidate_id) {
            return Err(Error::CandidateNotParticipant {
                election_id,
                candidate_id,
            });
        }
        Ok(())
    }

    /// Are tallies visible to non-admin callers?
    ///
    /// A presentation gate only; tabulation itself is always possible.
    pub fn results_visible_to_public(&self) -> bool {
        self.metadata.results_visible
            || matches!(
                self.metadata.state,
                ElectionState::Closed | ElectionState::ResultsPublished
            )
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    use chrono::Duration;

    impl ElectionCore {
        /// A single-vote election currently in progress, with one authorized
        /// voter and one candidate already in its sets.
        pub fn example_in_progress(voter_id: Id, candidate_id: Id) -> Self {
            let now = Utc::now();
            Self {
                metadata: ElectionMetadata {
                    title: "Club Committee 2026".to_string(),
                    description: "Annual committee election".to_string(),
                    state: ElectionState::InProgress,
                    start: now - Duration::hours(1),
                    end: now + Duration::hours(1),
                    valid_from: None,
                    valid_until: None,
                    allow_multiple_votes: false,
                    max_votes_per_voter: 1,
                    results_visible: false,
                    created_by: Id::new(),
                },
                authorized_voters: HashSet::from_iter([voter_id]),
                candidates: HashSet::from_iter([candidate_id]),
            }
        }
    }
}
