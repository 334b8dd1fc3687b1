pub mod admin;
pub mod events;
pub mod health;
pub mod instances;
pub mod leaderboard;
pub mod quiz;
pub mod response;
