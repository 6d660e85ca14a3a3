use mongodb::bson::doc;

use crate::error::{Error, Result};
use crate::model::{
    common::election::ElectionId,
    db::{candidate::Candidate, election::Election, voter::Voter},
    mongodb::{Coll, Id},
};

/// Look up an election by its external ID.
pub async fn election_by_id(
    election_id: ElectionId,
    elections: &Coll<Election>,
) -> Result<Election> {
    elections
        .find_one(doc! { "_id": election_id }, None)
        .await?
        .ok_or(Error::ElectionNotFound(election_id))
}

/// Look up a voter by ID.
pub async fn voter_by_id(voter_id: Id, voters: &Coll<Voter>) -> Result<Voter> {
    voters
        .find_one(voter_id.as_doc(), None)
        .await?
        .ok_or(Error::VoterNotFound(voter_id))
}

/// Look up a candidate by ID.
pub async fn candidate_by_id(candidate_id: Id, candidates: &Coll<Candidate>) -> Result<Candidate> {
    candidates
        .find_one(candidate_id.as_doc(), None)
        .await?
        .ok_or(Error::CandidateNotFound(candidate_id))
}
