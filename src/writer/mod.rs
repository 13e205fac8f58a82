//! Component 4 – serializes compiled rooms.
pub mod bin;
pub mod block;
pub mod zplane;
