pub mod coordinator;
pub mod projector;
pub mod scale;
pub mod surface;
pub mod svg;
