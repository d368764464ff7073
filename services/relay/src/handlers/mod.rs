pub mod health;
pub mod items;
pub mod scores;
pub mod ws;
