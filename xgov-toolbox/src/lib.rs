pub mod ballot;
pub mod client;
pub mod eligibility;
pub mod history;
pub mod prompt;
pub mod round;
pub mod survey;
pub mod transaction;
pub mod utils;
pub mod vote;
