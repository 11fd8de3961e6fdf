pub mod fs;
pub mod geometry;
pub mod mail;
pub mod pasteboard;
pub mod screen;
