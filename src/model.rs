pub mod geometry;
pub mod interaction;
pub mod payload;
pub mod shelf;
