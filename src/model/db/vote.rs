use std::ops::Deref;

use chrono::{DateTime, Utc};
use mongodb::bson::{doc, serde_helpers::chrono_datetime_as_bson_datetime};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    common::{election::ElectionId, vote::VoteState},
    db::election::Election,
    mongodb::{is_duplicate_key_error, Coll, Id},
};

/// Where a vote came from, as reported by the request layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    /// Origin IP address, if known.
    pub origin: Option<String>,
    /// Client user-agent string, if sent.
    pub user_agent: Option<String>,
}

/// Core ledger entry data, as stored in the database.
///
/// `slot` is the 1-based ordinal of this vote within the voter's allotment
/// for the election. The unique index over `(election_id, voter_id, slot)`
/// is what makes the multiplicity cap hold under concurrent casts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteCore {
    /// Foreign key election ID.
    pub election_id: ElectionId,
    /// Foreign key voter ID.
    pub voter_id: Id,
    /// Foreign key candidate ID.
    pub candidate_id: Id,
    /// Ordinal of this vote within the voter's allotment.
    pub slot: u32,
    /// When the vote was accepted.
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub cast_at: DateTime<Utc>,
    /// Ledger state; only `Valid` counts towards tallies.
    pub state: VoteState,
    /// Request provenance.
    #[serde(flatten)]
    pub provenance: Provenance,
}

/// A vote without an ID, ready for insertion.
pub type NewVote = VoteCore;

/// A vote from the database, with its unique ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vote {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub vote: VoteCore,
}

impl Deref for Vote {
    type Target = VoteCore;

    fn deref(&self) -> &Self::Target {
        &self.vote
    }
}

impl VoteCore {
    /// Accept a prospective vote: either durably record it or reject it,
    /// holding the multiplicity invariant even against concurrent casts for
    /// the same voter.
    ///
    /// The count below is only an optimisation for the common case; the
    /// authoritative guard is the unique slot index rejecting the insert
    /// itself. On a duplicate-key rejection a concurrent cast must have taken
    /// the slot, so we loop back and recount. Each retry sees a strictly
    /// larger count, so the loop terminates after at most `cap` collisions.
    ///
    /// Failure paths write nothing.
    pub async fn cast(
        election: &Election,
        voter_id: Id,
        candidate_id: Id,
        provenance: Provenance,
        votes: &Coll<NewVote>,
    ) -> Result<Vote> {
        let cap = election.vote_cap();
        loop {
            // Re-validate against a fresh clock: the window may have lapsed
            // between the handler's eligibility check and this write.
            let now = Utc::now();
            election.validate_vote(election.id, voter_id, candidate_id, now)?;

            // Voided votes keep their slot, so count every state.
            let filter = doc! {
                "election_id": election.id,
                "voter_id": *voter_id,
            };
            let existing = votes.count_documents(filter, None).await?;
            let existing = u32::try_from(existing).unwrap_or(u32::MAX);
            if existing >= cap {
                return Err(if cap == 1 {
                    Error::AlreadyVoted {
                        election_id: election.id,
                        voter_id,
                    }
                } else {
                    Error::VoteLimitExceeded {
                        election_id: election.id,
                        voter_id,
                        cap,
                    }
                });
            }

            let vote = VoteCore {
                election_id: election.id,
                voter_id,
                candidate_id,
                slot: existing + 1,
                cast_at: now,
                state: VoteState::Valid,
                provenance: provenance.clone(),
            };
            match votes.insert_one(&vote, None).await {
                Ok(result) => {
                    let id = result
                        .inserted_id
                        .as_object_id()
                        .unwrap() // Valid because the ID comes directly from the DB.
                        .into();
                    return Ok(Vote { id, vote });
                }
                // Lost the slot race against a concurrent cast; recount.
                Err(err) if is_duplicate_key_error(&err) => continue,
                Err(err) => return Err(err.into()),
            }
        }
    }
}

impl Vote {
    /// Administratively void a `Valid` vote, removing it from tallies but
    /// not freeing its slot.
    pub async fn void(election_id: ElectionId, vote_id: Id, votes: &Coll<Vote>) -> Result<()> {
        let filter = doc! {
            "_id": *vote_id,
            "election_id": election_id,
            "state": VoteState::Valid,
        };
        let update = doc! {
            "$set": { "state": VoteState::Voided }
        };
        let result = votes.update_one(filter, update, None).await?;
        if result.modified_count == 0 {
            return Err(Error::not_found(format!(
                "No valid vote {} in election {}",
                vote_id, election_id
            )));
        }
        Ok(())
    }
}
