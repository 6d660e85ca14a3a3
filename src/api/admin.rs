use mongodb::bson::doc;
use rocket::{futures::TryStreamExt, http::Status, serde::json::Json, Route};

use crate::error::{Error, Result};
use crate::model::{
    api::{
        auth::{Admin, AuthToken},
        election::{ElectionDescription, ElectionSpec},
    },
    common::election::{ElectionId, ElectionState},
    db::{
        candidate::{Candidate, CandidateCore, NewCandidate},
        election::{Election, NewElection},
        vote::Vote,
        voter::{NewVoter, Voter, VoterCore},
    },
    mongodb::{Coll, Counter, Id, ELECTION_ID_COUNTER},
};

use super::common::election_by_id;

pub fn routes() -> Vec<Route> {
    routes![
        create_election,
        modify_election,
        set_election_state,
        delete_election,
        void_vote,
        create_voter,
        get_voters,
        create_candidate,
        get_candidates,
    ]
}

#[post("/elections", data = "<spec>", format = "json")]
async fn create_election(
    token: AuthToken<Admin>,
    spec: Json<ElectionSpec>,
    elections: Coll<Election>,
    counters: Coll<Counter>,
) -> Result<Json<ElectionDescription>> {
    let spec = spec.0;
    spec.validate()?;

    let id = Counter::next(&counters, ELECTION_ID_COUNTER).await?;
    let election = Election {
        id,
        election: spec.into_election(ElectionState::Planned, token.id()),
    };
    elections.insert_one(&election, None).await?;
    info!("admin {} created election {}", token.id(), id);

    Ok(Json(election.into()))
}

#[put("/elections/<election_id>", data = "<spec>", format = "json")]
async fn modify_election(
    token: AuthToken<Admin>,
    election_id: ElectionId,
    spec: Json<ElectionSpec>,
    elections: Coll<Election>,
    new_elections: Coll<NewElection>,
) -> Result<Json<ElectionDescription>> {
    let spec = spec.0;
    spec.validate()?;

    let existing = election_by_id(election_id, &elections).await?;

    // The voting window is locked once the election is live.
    if existing.metadata.state == ElectionState::InProgress
        && spec.changes_window(&existing.metadata)
    {
        return Err(Error::InvalidElectionConfiguration(format!(
            "cannot change the voting window of in-progress election {}",
            election_id
        )));
    }

    // Configuration changes never touch the lifecycle state or ownership.
    // The replacement is guarded on the state read above, so a transition
    // committing in between turns this into a conflict instead of being
    // silently overwritten.
    let replacement = spec.into_election(existing.metadata.state, existing.metadata.created_by);
    existing.replace(&replacement, &new_elections).await?;
    info!("admin {} modified election {}", token.id(), election_id);

    let election = Election {
        id: election_id,
        election: replacement,
    };
    Ok(Json(election.into()))
}

#[post("/elections/<election_id>/state", data = "<state>", format = "json")]
async fn set_election_state(
    token: AuthToken<Admin>,
    election_id: ElectionId,
    state: Json<ElectionState>,
    elections: Coll<Election>,
) -> Result<()> {
    let target = state.0;
    let election = election_by_id(election_id, &elections).await?;
    let current = election.metadata.state;

    if !current.can_transition(target) {
        return Err(Error::InvalidElectionConfiguration(format!(
            "illegal transition {:?} -> {:?} for election {}",
            current, target, election_id
        )));
    }

    // Guard on the observed state so two racing transitions cannot both win.
    let result = elections
        .update_one(
            doc! { "_id": election_id, "state": current },
            doc! { "$set": { "state": target } },
            None,
        )
        .await?;
    if result.modified_count != 1 {
        return Err(Error::Status(
            Status::Conflict,
            format!("Election {} changed state concurrently", election_id),
        ));
    }
    info!(
        "admin {} moved election {} from {:?} to {:?}",
        token.id(),
        election_id,
        current,
        target
    );
    Ok(())
}

#[delete("/elections/<election_id>")]
async fn delete_election(
    token: AuthToken<Admin>,
    election_id: ElectionId,
    elections: Coll<Election>,
    votes: Coll<Vote>,
) -> Result<()> {
    let election = election_by_id(election_id, &elections).await?;
    if election.metadata.state == ElectionState::InProgress {
        return Err(Error::Status(
            Status::UnprocessableEntity,
            format!("Cannot delete in-progress election {}", election_id),
        ));
    }

    // Guarded on the state read above: if the election went live in the
    // meantime, refuse rather than delete it.
    election.delete(&elections).await?;
    // The ledger entries are meaningless without their election.
    let purged = votes
        .delete_many(doc! { "election_id": election_id }, None)
        .await?;
    info!(
        "admin {} deleted election {} and {} ledger entries",
        token.id(),
        election_id,
        purged.deleted_count
    );
    Ok(())
}

#[post("/elections/<election_id>/votes/<vote_id>/void")]
async fn void_vote(
    token: AuthToken<Admin>,
    election_id: ElectionId,
    vote_id: Id,
    elections: Coll<Election>,
    votes: Coll<Vote>,
) -> Result<()> {
    // 404 on the election before touching the ledger.
    election_by_id(election_id, &elections).await?;
    Vote::void(election_id, vote_id, &votes).await?;
    warn!(
        "admin {} voided vote {} in election {}",
        token.id(),
        vote_id,
        election_id
    );
    Ok(())
}

#[post("/voters", data = "<voter>", format = "json")]
async fn create_voter(
    _token: AuthToken<Admin>,
    voter: Json<VoterCore>,
    voters: Coll<NewVoter>,
) -> Result<Json<Voter>> {
    let core = voter.0;
    let result = voters.insert_one(&core, None).await?;
    let id = result
        .inserted_id
        .as_object_id()
        .unwrap() // Valid because the ID comes directly from the DB.
        .into();
    Ok(Json(Voter { id, voter: core }))
}

#[get("/voters")]
async fn get_voters(_token: AuthToken<Admin>, voters: Coll<Voter>) -> Result<Json<Vec<Voter>>> {
    let all: Vec<Voter> = voters.find(None, None).await?.try_collect().await?;
    Ok(Json(all))
}

#[post("/candidates", data = "<candidate>", format = "json")]
async fn create_candidate(
    _token: AuthToken<Admin>,
    candidate: Json<CandidateCore>,
    candidates: Coll<NewCandidate>,
) -> Result<Json<Candidate>> {
    let core = candidate.0;
    let result = candidates.insert_one(&core, None).await?;
    let id = result
        .inserted_id
        .as_object_id()
        .unwrap() // Valid because the ID comes directly from the DB.
        .into();
    Ok(Json(Candidate {
        id,
        candidate: core,
    }))
}

#[get("/candidates")]
async fn get_candidates(
    _token: AuthToken<Admin>,
    candidates: Coll<Candidate>,
) -> Result<Json<Vec<Candidate>>> {
    let all: Vec<Candidate> = candidates.find(None, None).await?.try_collect().await?;
    Ok(Json(all))
}
