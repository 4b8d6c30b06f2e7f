pub(crate) mod analysis;
pub(crate) mod data;
pub(crate) mod health;
pub(crate) mod results;
pub(crate) mod tasks;
