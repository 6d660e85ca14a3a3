mod bson;
mod collection;
mod counter;
mod errors;

pub use bson::{option_chrono_datetime_as_bson_datetime, Id};
pub use collection::{ensure_indexes_exist, Coll, MongoCollection};
pub use counter::{ensure_election_id_counter_exists, Counter, ELECTION_ID_COUNTER};
pub use errors::is_duplicate_key_error;
