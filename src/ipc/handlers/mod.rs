pub mod core;
pub mod imports;
pub mod rosters;
pub mod setup;
