use chrono::{DateTime, Utc};
use rocket::request::{self, FromRequest, Request};
use serde::{Deserialize, Serialize};

use crate::model::{
    common::{election::ElectionId, vote::VoteState},
    db::vote::{Provenance, Vote},
    mongodb::Id,
};

/// A vote the caller wishes to cast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteSpec {
    /// The chosen candidate.
    pub candidate: Id,
}

/// The caller-facing record of an accepted vote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteReceipt {
    pub vote_id: Id,
    pub election_id: ElectionId,
    pub voter_id: Id,
    pub candidate_id: Id,
    pub cast_at: DateTime<Utc>,
    pub state: VoteState,
}

impl From<Vote> for VoteReceipt {
    fn from(vote: Vote) -> Self {
        Self {
            vote_id: vote.id,
            election_id: vote.vote.election_id,
            voter_id: vote.vote.voter_id,
            candidate_id: vote.vote.candidate_id,
            cast_at: vote.vote.cast_at,
            state: vote.vote.state,
        }
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Provenance {
    type Error = std::convert::Infallible;

    /// Collect best-effort provenance from the request; never fails.
    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        request::Outcome::Success(Provenance {
            origin: req.client_ip().map(|ip| ip.to_string()),
            user_agent: req.headers().get_one("User-Agent").map(String::from),
        })
    }
}
