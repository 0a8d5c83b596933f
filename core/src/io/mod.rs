mod file_watcher;
mod loader;

pub use file_watcher::*;
pub use loader::*;
