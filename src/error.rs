use jsonwebtoken::errors::{Error as JwtError, ErrorKind as JwtErrorKind};
use mongodb::error::Error as DbError;
use rocket::{http::Status, response::Responder};
use thiserror::Error;

use crate::model::{common::election::ElectionId, mongodb::Id};

pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong while handling a request.
///
/// The vote-path kinds are deliberately distinct so a caller always learns
/// the precise reason a ballot was refused.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    Jwt(#[from] JwtError),
    #[error("No election found with ID {0}")]
    ElectionNotFound(ElectionId),
    #[error("No voter found with ID {0}")]
    VoterNotFound(Id),
    #[error("No candidate found with ID {0}")]
    CandidateNotFound(Id),
    #[error("Election {0} is not currently accepting votes")]
    ElectionNotActive(ElectionId),
    #[error("Election {0} is outside its validity window")]
    OutsideValidityWindow(ElectionId),
    #[error("Voter {voter_id} is not authorized to vote in election {election_id}")]
    VoterNotAuthorized {
        election_id: ElectionId,
        voter_id: Id,
    },
    #[error("Candidate {candidate_id} is not a participant in election {election_id}")]
    CandidateNotParticipant {
        election_id: ElectionId,
        candidate_id: Id,
    },
    #[error("Voter {voter_id} has already voted in election {election_id}")]
    AlreadyVoted {
        election_id: ElectionId,
        voter_id: Id,
    },
    #[error("Voter {voter_id} has used all {cap} votes in election {election_id}")]
    VoteLimitExceeded {
        election_id: ElectionId,
        voter_id: Id,
        cap: u32,
    },
    #[error("Invalid election configuration: {0}")]
    InvalidElectionConfiguration(String),
    #[error("Results for election {0} are not available")]
    ResultsNotAvailable(ElectionId),
    #[error("{1}")]
    Status(Status, String),
}

impl Error {
    /// Shorthand for a plain 404 on something without a dedicated kind.
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::Status(Status::NotFound, what.into())
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, _: &'r rocket::Request<'_>) -> rocket::response::Result<'o> {
        let status = match &self {
            Self::Db(_) => Status::InternalServerError,
            Self::Jwt(err) => match err.kind() {
                JwtErrorKind::ExpiredSignature | JwtErrorKind::ImmatureSignature => {
                    Status::Unauthorized
                }
                _ => Status::BadRequest,
            },
            Self::ElectionNotFound(_) | Self::VoterNotFound(_) | Self::CandidateNotFound(_) => {
                Status::NotFound
            }
            Self::ElectionNotActive(_)
            | Self::OutsideValidityWindow(_)
            | Self::InvalidElectionConfiguration(_) => Status::UnprocessableEntity,
            Self::VoterNotAuthorized { .. }
            | Self::CandidateNotParticipant { .. }
            | Self::ResultsNotAvailable(_) => Status::Forbidden,
            Self::AlreadyVoted { .. } | Self::VoteLimitExceeded { .. } => Status::Conflict,
            Self::Status(status, _) => *status,
        };
        if status.class().is_server_error() {
            error!("{self}");
        } else {
            warn!("{self}");
        }
        Err(status)
    }
}
