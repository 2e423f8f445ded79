mod activity;
mod cluster;
mod region;
mod viewport;

pub use activity::*;
pub use cluster::*;
pub use region::*;
pub use viewport::*;
