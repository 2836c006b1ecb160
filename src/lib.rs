// Library surface for the binary and for headless/integration tests.
pub mod app;
pub mod app_dirs;
pub mod catalog;
pub mod config;
pub mod feedback;
pub mod game;
pub mod loader;
pub mod logging;
pub mod metrics;
pub mod notice;
pub mod playback;
pub mod reporter;
pub mod runtime;
pub mod session;
pub mod store;
pub mod ui;
pub mod util;

pub use app::{App, AppState};
