pub mod discord;
pub mod mt5;
pub mod traits;
