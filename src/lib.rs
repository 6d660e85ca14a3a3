#[macro_use]
extern crate rocket;

#[macro_use]
extern crate log;

use rocket::{figment::Figment, Build, Rocket};

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;

pub use config::Config;

/// Build the server from the default figment (`Rocket.toml` plus `ROCKET_*`
/// environment variables).
pub fn build() -> Rocket<Build> {
    custom(rocket::Config::figment())
}

/// Build the server from the given figment.
pub fn custom(figment: Figment) -> Rocket<Build> {
    rocket::custom(figment)
        .mount("/", api::routes())
        .attach(config::ConfigFairing)
        .attach(config::DatabaseFairing)
        .attach(logging::LoggerFairing)
}

/// Construct a local client and a handle to its (random, throwaway) test
/// database. Returns `None` when `TEST_DB_URI` is unset, in which case
/// database tests should be skipped.
#[cfg(test)]
pub(crate) async fn test_client_and_db(
) -> Option<(rocket::local::asynchronous::Client, mongodb::Database)> {
    let db_uri = std::env::var("TEST_DB_URI").ok()?;
    let figment = rocket::Config::figment()
        .merge(("db_uri", db_uri))
        .merge(("jwt_secret", "test-secret"))
        .merge(("auth_ttl", 3600));
    let client = rocket::local::asynchronous::Client::tracked(custom(figment))
        .await
        .unwrap();
    let db = client
        .rocket()
        .state::<mongodb::Database>()
        .unwrap()
        .clone();
    Some((client, db))
}
