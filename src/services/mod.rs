pub mod lifecycle;
pub mod notify;
pub mod stats;
pub mod sweeper;
