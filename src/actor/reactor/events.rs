pub mod drag;
pub mod mouse;
pub mod system;
