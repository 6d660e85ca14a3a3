pub mod auth;
pub mod election;
pub mod results;
pub mod vote;
