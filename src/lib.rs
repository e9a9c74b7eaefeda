/// Backup and restore engine for the HomeBrain appliance

pub mod core;
pub mod utils;
