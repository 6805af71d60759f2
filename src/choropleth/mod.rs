pub mod classify;
pub mod color;
pub mod join;
