pub mod billing;
pub mod properties;
pub mod readings;
pub mod scheduler;
