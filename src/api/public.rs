use mongodb::bson::doc;
use rocket::{futures::TryStreamExt, serde::json::Json, Route};

use crate::error::{Error, Result};
use crate::model::{
    api::{
        auth::{Admin, AuthToken},
        election::{ElectionDescription, ElectionSummary},
        results::ElectionResults,
    },
    common::{
        election::{ElectionId, ElectionState},
        vote::VoteState,
    },
    db::{candidate::Candidate, election::Election, vote::Vote},
    mongodb::{Coll, Id},
};

use super::common::election_by_id;

pub fn routes() -> Vec<Route> {
    routes![
        elections_admin,
        elections_non_admin,
        election_admin,
        election_non_admin,
        election_results_admin,
        election_results_non_admin,
    ]
}

#[get("/elections", rank = 1)]
async fn elections_admin(
    _token: AuthToken<Admin>,
    elections: Coll<Election>,
) -> Result<Json<Vec<ElectionSummary>>> {
    list_elections(elections, true).await
}

#[get("/elections", rank = 2)]
async fn elections_non_admin(elections: Coll<Election>) -> Result<Json<Vec<ElectionSummary>>> {
    list_elections(elections, false).await
}

#[get("/elections/<election_id>", rank = 1)]
async fn election_admin(
    _token: AuthToken<Admin>,
    election_id: ElectionId,
    elections: Coll<Election>,
) -> Result<Json<ElectionDescription>> {
    let election = election_by_id(election_id, &elections).await?;
    Ok(Json(election.into()))
}

#[get("/elections/<election_id>", rank = 2)]
async fn election_non_admin(
    election_id: ElectionId,
    elections: Coll<Election>,
) -> Result<Json<ElectionDescription>> {
    // Unannounced elections are invisible to the public.
    let filter = doc! {
        "_id": election_id,
        "state": { "$ne": ElectionState::Planned },
    };
    let election = elections
        .find_one(filter, None)
        .await?
        .ok_or(Error::ElectionNotFound(election_id))?;
    Ok(Json(election.into()))
}

#[get("/elections/<election_id>/results", rank = 1)]
async fn election_results_admin(
    _token: AuthToken<Admin>,
    election_id: ElectionId,
    elections: Coll<Election>,
    candidates: Coll<Candidate>,
    votes: Coll<Vote>,
) -> Result<Json<ElectionResults>> {
    // Admins may inspect the running tally at any time.
    let election = election_by_id(election_id, &elections).await?;
    Ok(Json(tabulate(&election, candidates, votes).await?))
}

#[get("/elections/<election_id>/results", rank = 2)]
async fn election_results_non_admin(
    election_id: ElectionId,
    elections: Coll<Election>,
    candidates: Coll<Candidate>,
    votes: Coll<Vote>,
) -> Result<Json<ElectionResults>> {
    let election = election_by_id(election_id, &elections).await?;
    if !election.results_visible_to_public() {
        return Err(Error::ResultsNotAvailable(election_id));
    }
    Ok(Json(tabulate(&election, candidates, votes).await?))
}

async fn list_elections(
    elections: Coll<Election>,
    admin: bool,
) -> Result<Json<Vec<ElectionSummary>>> {
    let filter = if admin {
        doc! {}
    } else {
        doc! { "state": { "$ne": ElectionState::Planned } }
    };
    let summaries: Vec<ElectionSummary> = elections
        .find(filter, None)
        .await?
        .map_ok(ElectionSummary::from)
        .try_collect()
        .await?;
    Ok(Json(summaries))
}

/// Scan the ledger and tabulate; nothing is persisted.
async fn tabulate(
    election: &Election,
    candidates: Coll<Candidate>,
    votes: Coll<Vote>,
) -> Result<ElectionResults> {
    let participant_ids: Vec<Id> = election.candidates.iter().copied().collect();
    let standing: Vec<Candidate> = candidates
        .find(doc! { "_id": { "$in": participant_ids } }, None)
        .await?
        .try_collect()
        .await?;
    let valid_votes: Vec<Vote> = votes
        .find(
            doc! { "election_id": election.id, "state": VoteState::Valid },
            None,
        )
        .await?
        .try_collect()
        .await?;
    Ok(ElectionResults::tabulate(election, &standing, &valid_votes))
}

#[cfg(test)]
mod tests {
    use super::*;

    use backend_test::backend_test;
    use rocket::{
        http::{ContentType, Status},
        local::asynchronous::Client,
        serde::json::json,
    };

    use crate::api::testing::{
        admin_cookie, insert_candidate, insert_election, insert_voter, voter_cookie,
    };
    use crate::model::{
        api::election::ElectionSpec,
        db::{candidate::CandidateCore, voter::Voter},
    };

    const ELECTION: ElectionId = 1;

    async fn cast(client: &Client, voter_id: Id, candidate_id: Id) {
        let response = client
            .post(format!("/voter/elections/{}/votes", ELECTION))
            .header(ContentType::JSON)
            .cookie(voter_cookie(client, voter_id))
            .body(json!({ "candidate": candidate_id }).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
    }

    #[backend_test]
    async fn planned_elections_hidden_from_public(
        client: Client,
        elections: Coll<Election>,
        voters: Coll<Voter>,
    ) {
        let voter = insert_voter(&voters, "Vera").await;
        insert_election(
            &elections,
            ELECTION,
            ElectionSpec::future_example().into_election(ElectionState::Planned, Id::new()),
            ElectionState::Planned,
            [voter.id],
            Vec::new(),
        )
        .await;

        // Invisible without credentials.
        let response = client.get("/elections").dispatch().await;
        assert_eq!(response.status(), Status::Ok);
        let listed: Vec<ElectionSummary> = response.into_json().await.unwrap();
        assert!(listed.is_empty());
        let response = client.get(format!("/elections/{}", ELECTION)).dispatch().await;
        assert_eq!(response.status(), Status::NotFound);

        // Visible to an administrator.
        let response = client
            .get("/elections")
            .cookie(admin_cookie(&client))
            .dispatch()
            .await;
        let listed: Vec<ElectionSummary> = response.into_json().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, ELECTION);
    }

    #[backend_test]
    async fn results_tabulate_counts_percentages_and_ranks(
        client: Client,
        elections: Coll<Election>,
        voters: Coll<Voter>,
        candidates: Coll<Candidate>,
    ) {
        let mut voter_ids = Vec::new();
        for i in 0..10 {
            voter_ids.push(insert_voter(&voters, &format!("Voter {}", i)).await.id);
        }
        let c1 = insert_candidate(&candidates, CandidateCore::example1()).await;
        let c2 = insert_candidate(&candidates, CandidateCore::example2()).await;
        let c3 = insert_candidate(&candidates, CandidateCore::example3()).await;
        insert_election(
            &elections,
            ELECTION,
            ElectionSpec::current_example().into_election(ElectionState::InProgress, Id::new()),
            ElectionState::InProgress,
            voter_ids.clone(),
            [c1.id, c2.id, c3.id],
        )
        .await;

        // 5 / 3 / 2 split across the three candidates.
        for &voter_id in &voter_ids[..5] {
            cast(&client, voter_id, c1.id).await;
        }
        for &voter_id in &voter_ids[5..8] {
            cast(&client, voter_id, c2.id).await;
        }
        for &voter_id in &voter_ids[8..] {
            cast(&client, voter_id, c3.id).await;
        }

        let response = client
            .get(format!("/elections/{}/results", ELECTION))
            .cookie(admin_cookie(&client))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        let results: ElectionResults = response.into_json().await.unwrap();
        assert_eq!(results.total_valid_votes, 10);
        let summary: Vec<(Id, u64, f64, u32)> = results
            .standings
            .iter()
            .map(|s| (s.candidate_id, s.vote_count, s.percentage, s.rank))
            .collect();
        assert_eq!(
            summary,
            vec![
                (c1.id, 5, 50.0, 1),
                (c2.id, 3, 30.0, 2),
                (c3.id, 2, 20.0, 3),
            ]
        );
        assert_eq!(results.participation_rate, 100.0);
    }

    #[backend_test]
    async fn results_gated_until_visible(
        client: Client,
        elections: Coll<Election>,
        voters: Coll<Voter>,
        candidates: Coll<Candidate>,
    ) {
        let voter = insert_voter(&voters, "Vera").await;
        let candidate = insert_candidate(&candidates, CandidateCore::example1()).await;
        insert_election(
            &elections,
            ELECTION,
            ElectionSpec::current_example().into_election(ElectionState::InProgress, Id::new()),
            ElectionState::InProgress,
            [voter.id],
            [candidate.id],
        )
        .await;

        // Mid-election, results_visible = false: the public is locked out,
        // the admin is not.
        let response = client
            .get(format!("/elections/{}/results", ELECTION))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Forbidden);
        let response = client
            .get(format!("/elections/{}/results", ELECTION))
            .cookie(admin_cookie(&client))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);

        // A closed election is public.
        elections
            .update_one(
                doc! { "_id": ELECTION },
                doc! { "$set": { "state": ElectionState::Closed } },
                None,
            )
            .await
            .unwrap();
        let response = client
            .get(format!("/elections/{}/results", ELECTION))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
    }

    #[backend_test]
    async fn zero_vote_results_are_well_formed(
        client: Client,
        elections: Coll<Election>,
        candidates: Coll<Candidate>,
    ) {
        let candidate = insert_candidate(&candidates, CandidateCore::example1()).await;
        insert_election(
            &elections,
            ELECTION,
            ElectionSpec::current_example().into_election(ElectionState::Closed, Id::new()),
            ElectionState::Closed,
            Vec::new(),
            [candidate.id],
        )
        .await;

        let response = client
            .get(format!("/elections/{}/results", ELECTION))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        let results: ElectionResults = response.into_json().await.unwrap();
        assert_eq!(results.total_valid_votes, 0);
        assert_eq!(results.standings.len(), 1);
        assert_eq!(results.standings[0].vote_count, 0);
        assert_eq!(results.standings[0].percentage, 0.0);
        assert_eq!(results.participation_rate, 0.0);
    }
}
