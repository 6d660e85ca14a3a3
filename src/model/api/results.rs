use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::model::{
    common::election::ElectionId,
    db::{candidate::Candidate, election::Election, vote::Vote},
    mongodb::Id,
};

/// One candidate's standing in the tally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateStanding {
    pub candidate_id: Id,
    pub candidate_name: String,
    pub vote_count: u64,
    /// Share of all valid votes, 0 when there are none.
    pub percentage: f64,
    /// 1-based position; ties get sequential ranks, broken by candidate ID.
    pub rank: u32,
}

/// The full tally for one election, derived on demand from a ledger scan.
/// No aggregate is ever persisted, so there is no second copy to drift.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElectionResults {
    pub election_id: ElectionId,
    pub standings: Vec<CandidateStanding>,
    pub total_valid_votes: u64,
    pub total_authorized_voters: u64,
    /// Percentage of authorized voters who cast at least one valid vote.
    pub participation_rate: f64,
}

impl ElectionResults {
    /// Tabulate the given ledger scan.
    ///
    /// `votes` is expected to be the election's `Valid` votes; other states
    /// are skipped defensively. Every participating candidate appears in the
    /// output, zero-vote candidates included. The ordering (count descending,
    /// candidate ID ascending) is deterministic, so repeated calls over an
    /// unchanged ledger return identical output.
    pub fn tabulate(election: &Election, candidates: &[Candidate], votes: &[Vote]) -> Self {
        let mut counts: HashMap<Id, u64> = candidates.iter().map(|c| (c.id, 0)).collect();
        let mut voters_seen: HashSet<Id> = HashSet::new();
        let mut total_valid_votes = 0u64;

        for vote in votes {
            if !vote.state.counts_towards_tally() {
                continue;
            }
            if let Some(count) = counts.get_mut(&vote.candidate_id) {
                *count += 1;
                total_valid_votes += 1;
                voters_seen.insert(vote.voter_id);
            }
        }

        let mut ranked: Vec<&Candidate> = candidates.iter().collect();
        ranked.sort_by_key(|c| (std::cmp::Reverse(counts[&c.id]), c.id));

        let standings = ranked
            .into_iter()
            .enumerate()
            .map(|(index, candidate)| {
                let vote_count = counts[&candidate.id];
                let percentage = if total_valid_votes == 0 {
                    0.0
                } else {
                    vote_count as f64 * 100.0 / total_valid_votes as f64
                };
                CandidateStanding {
                    candidate_id: candidate.id,
                    candidate_name: candidate.name.clone(),
                    vote_count,
                    percentage,
                    rank: index as u32 + 1,
                }
            })
            .collect();

        let total_authorized_voters = election.authorized_voters.len() as u64;
        let participation_rate = if total_authorized_voters == 0 {
            0.0
        } else {
            voters_seen.len() as f64 * 100.0 / total_authorized_voters as f64
        };

        Self {
            election_id: election.id,
            standings,
            total_valid_votes,
            total_authorized_voters,
            participation_rate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::Utc;

    use crate::model::{
        common::vote::VoteState,
        db::{
            candidate::CandidateCore,
            election::ElectionCore,
            vote::{Provenance, VoteCore},
        },
    };

    fn fixture(candidate_count: usize) -> (Election, Vec<Candidate>, Vec<Id>) {
        let cores = [
            CandidateCore::example1(),
            CandidateCore::example2(),
            CandidateCore::example3(),
        ];
        let candidates: Vec<Candidate> = cores
            .into_iter()
            .take(candidate_count)
            .map(Candidate::example)
            .collect();
        let voters: Vec<Id> = (0..20).map(|_| Id::new()).collect();

        let mut core = ElectionCore::example_in_progress(voters[0], candidates[0].id);
        core.authorized_voters = voters.iter().copied().collect();
        core.candidates = candidates.iter().map(|c| c.id).collect();
        let election = Election {
            id: 1,
            election: core,
        };
        (election, candidates, voters)
    }

    fn vote(election: &Election, voter_id: Id, candidate_id: Id, state: VoteState) -> Vote {
        Vote {
            id: Id::new(),
            vote: VoteCore {
                election_id: election.id,
                voter_id,
                candidate_id,
                slot: 1,
                cast_at: Utc::now(),
                state,
                provenance: Provenance::default(),
            },
        }
    }

    #[test]
    fn counts_percentages_and_ranks() {
        // 3 candidates receiving 5, 3, 2 valid votes.
        let (election, candidates, voters) = fixture(3);
        let mut votes = Vec::new();
        let spread = [(0, 5), (1, 3), (2, 2)];
        let mut voter_iter = voters.iter();
        for (candidate_index, count) in spread {
            for _ in 0..count {
                votes.push(vote(
                    &election,
                    *voter_iter.next().unwrap(),
                    candidates[candidate_index].id,
                    VoteState::Valid,
                ));
            }
        }

        let results = ElectionResults::tabulate(&election, &candidates, &votes);
        assert_eq!(results.total_valid_votes, 10);
        let summary: Vec<(u64, f64, u32)> = results
            .standings
            .iter()
            .map(|s| (s.vote_count, s.percentage, s.rank))
            .collect();
        assert_eq!(summary, vec![(5, 50.0, 1), (3, 30.0, 2), (2, 20.0, 3)]);
        assert_eq!(results.standings[0].candidate_id, candidates[0].id);

        // 10 of 20 authorized voters took part.
        assert_eq!(results.total_authorized_voters, 20);
        assert_eq!(results.participation_rate, 50.0);
    }

    #[test]
    fn zero_votes_gives_zero_percentages() {
        let (election, candidates, _) = fixture(3);
        let results = ElectionResults::tabulate(&election, &candidates, &[]);
        assert_eq!(results.total_valid_votes, 0);
        assert_eq!(results.standings.len(), 3);
        for standing in &results.standings {
            assert_eq!(standing.vote_count, 0);
            assert_eq!(standing.percentage, 0.0);
        }
        assert_eq!(results.participation_rate, 0.0);
    }

    #[test]
    fn percentages_sum_to_one_hundred() {
        let (election, candidates, voters) = fixture(3);
        let votes: Vec<Vote> = voters
            .iter()
            .enumerate()
            .take(7)
            .map(|(i, &voter)| vote(&election, voter, candidates[i % 3].id, VoteState::Valid))
            .collect();
        let results = ElectionResults::tabulate(&election, &candidates, &votes);
        let sum: f64 = results.standings.iter().map(|s| s.percentage).sum();
        assert!((sum - 100.0).abs() < 1e-9);
        let counted: u64 = results.standings.iter().map(|s| s.vote_count).sum();
        assert_eq!(counted, results.total_valid_votes);
    }

    #[test]
    fn ties_rank_sequentially_by_candidate_id() {
        let (election, candidates, voters) = fixture(2);
        let votes = vec![
            vote(&election, voters[0], candidates[0].id, VoteState::Valid),
            vote(&election, voters[1], candidates[1].id, VoteState::Valid),
        ];
        let results = ElectionResults::tabulate(&election, &candidates, &votes);
        assert_eq!(results.standings[0].rank, 1);
        assert_eq!(results.standings[1].rank, 2);
        // Tie broken by ascending candidate ID, deterministically.
        let min = candidates.iter().map(|c| c.id).min().unwrap();
        assert_eq!(results.standings[0].candidate_id, min);
    }

    #[test]
    fn tabulation_is_idempotent() {
        let (election, candidates, voters) = fixture(3);
        let votes = vec![
            vote(&election, voters[0], candidates[0].id, VoteState::Valid),
            vote(&election, voters[1], candidates[0].id, VoteState::Valid),
            vote(&election, voters[2], candidates[1].id, VoteState::Valid),
        ];
        let first = ElectionResults::tabulate(&election, &candidates, &votes);
        let second = ElectionResults::tabulate(&election, &candidates, &votes);
        assert_eq!(first, second);
    }

    #[test]
    fn voided_votes_are_skipped() {
        let (election, candidates, voters) = fixture(2);
        let votes = vec![
            vote(&election, voters[0], candidates[0].id, VoteState::Valid),
            vote(&election, voters[1], candidates[0].id, VoteState::Voided),
        ];
        let results = ElectionResults::tabulate(&election, &candidates, &votes);
        assert_eq!(results.total_valid_votes, 1);
        assert_eq!(results.standings[0].vote_count, 1);
        // Voided voters don't count as participants either.
        assert_eq!(results.participation_rate, 100.0 / 20.0);
    }
}
