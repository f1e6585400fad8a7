pub mod detector;
pub mod messages;
pub mod monitor;
