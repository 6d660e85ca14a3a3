use rocket::Route;

mod admin;
mod common;
mod public;
mod voting;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(admin::routes());
    routes.extend(public::routes());
    routes.extend(voting::routes());
    routes
}

/// Shared fixtures for the DB-backed endpoint tests.
#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashSet;

    use rocket::{http::Cookie, local::asynchronous::Client};

    use crate::model::{
        api::auth::{Admin, AuthToken},
        common::election::{ElectionId, ElectionState},
        db::{
            candidate::{Candidate, CandidateCore},
            election::{Election, ElectionCore},
            voter::{Voter, VoterCore},
        },
        mongodb::{Coll, Id},
    };
    use crate::Config;

    /// A cookie for an arbitrary administrator identity.
    pub fn admin_cookie(client: &Client) -> Cookie<'static> {
        let config = client.rocket().state::<Config>().unwrap();
        AuthToken::<Admin>::new(Id::new()).into_cookie(config)
    }

    /// A cookie for the given voter identity.
    pub fn voter_cookie(client: &Client, voter_id: Id) -> Cookie<'static> {
        let config = client.rocket().state::<Config>().unwrap();
        AuthToken::<Voter>::new(voter_id).into_cookie(config)
    }

    /// Insert a voter and return it.
    pub async fn insert_voter(voters: &Coll<Voter>, name: &str) -> Voter {
        let voter = Voter {
            id: Id::new(),
            voter: VoterCore {
                name: name.to_string(),
            },
        };
        voters.insert_one(&voter, None).await.unwrap();
        voter
    }

    /// Insert a candidate and return it.
    pub async fn insert_candidate(candidates: &Coll<Candidate>, core: CandidateCore) -> Candidate {
        let candidate = Candidate {
            id: Id::new(),
            candidate: core,
        };
        candidates.insert_one(&candidate, None).await.unwrap();
        candidate
    }

    /// Insert an election built from the given core, with the given ID.
    pub async fn insert_election(
        elections: &Coll<Election>,
        id: ElectionId,
        mut core: ElectionCore,
        state: ElectionState,
        voter_ids: impl IntoIterator<Item = Id>,
        candidate_ids: impl IntoIterator<Item = Id>,
    ) -> Election {
        core.metadata.state = state;
        core.authorized_voters = HashSet::from_iter(voter_ids);
        core.candidates = HashSet::from_iter(candidate_ids);
        let election = Election { id, election: core };
        elections.insert_one(&election, None).await.unwrap();
        election
    }
}
