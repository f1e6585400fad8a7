pub mod indicators;
pub mod trend;
