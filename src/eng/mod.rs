pub mod app;
pub mod window;

pub use app::{Viewer, ViewerApp};
pub use window::ViewerWindow;
