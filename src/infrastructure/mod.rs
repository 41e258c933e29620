pub mod ai;
pub mod blob;
pub mod cache;
pub mod container;
pub mod database;
pub mod messaging;
pub mod preview;

pub use container::AppContainer;
