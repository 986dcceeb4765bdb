pub mod emit;
pub mod link;
pub mod report;
pub mod search;
pub mod strategies;
pub mod units;
