pub mod stock;
pub mod task;

pub use stock::*;
pub use task::*;
