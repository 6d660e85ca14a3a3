pub mod election;
pub mod vote;
