use chrono::Utc;
use mongodb::bson::doc;
use rocket::{futures::TryStreamExt, serde::json::Json, Route};

use crate::error::Result;
use crate::model::{
    api::{
        auth::AuthToken,
        vote::{VoteReceipt, VoteSpec},
    },
    common::election::ElectionId,
    db::{
        candidate::Candidate,
        election::Election,
        vote::{NewVote, Provenance, Vote, VoteCore},
        voter::Voter,
    },
    mongodb::Coll,
};

use super::common::{candidate_by_id, election_by_id, voter_by_id};

pub fn routes() -> Vec<Route> {
    routes![cast_vote, my_votes]
}

#[post("/voter/elections/<election_id>/votes", data = "<spec>", format = "json")]
#[allow(clippy::too_many_arguments)]
async fn cast_vote(
    token: AuthToken<Voter>,
    election_id: ElectionId,
    spec: Json<VoteSpec>,
    provenance: Provenance,
    elections: Coll<Election>,
    voters: Coll<Voter>,
    candidates: Coll<Candidate>,
    votes: Coll<NewVote>,
) -> Result<Json<VoteReceipt>> {
    // Resolve the referenced entities.
    let election = election_by_id(election_id, &elections).await?;
    let voter = voter_by_id(token.id(), &voters).await?;
    let candidate = candidate_by_id(spec.candidate, &candidates).await?;

    // Check eligibility up front for an accurate error; the ledger re-checks
    // against a fresh clock before writing.
    election.validate_vote(election.id, voter.id, candidate.id, Utc::now())?;

    // The ledger write enforces the multiplicity cap.
    let vote = VoteCore::cast(&election, voter.id, candidate.id, provenance, &votes).await?;
    info!(
        "voter {} cast vote {} in election {}",
        voter.id, vote.id, election.id
    );

    Ok(Json(vote.into()))
}

#[get("/voter/elections/<election_id>/votes")]
async fn my_votes(
    token: AuthToken<Voter>,
    election_id: ElectionId,
    elections: Coll<Election>,
    votes: Coll<Vote>,
) -> Result<Json<Vec<VoteReceipt>>> {
    let election = election_by_id(election_id, &elections).await?;

    let filter = doc! {
        "election_id": election.id,
        "voter_id": *token.id(),
    };
    let receipts: Vec<VoteReceipt> = votes
        .find(filter, None)
        .await?
        .map_ok(VoteReceipt::from)
        .try_collect()
        .await?;
    Ok(Json(receipts))
}
