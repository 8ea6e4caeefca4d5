pub mod comments;
pub mod core;
pub mod report_cards;
pub mod setup;
pub mod workflow;
