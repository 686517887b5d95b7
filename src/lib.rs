pub mod library;
pub mod paths;
pub mod server;
pub mod settings;
pub mod status;

pub use library::{Collection, Library, WorkQuery};
pub use server::{router, serve, AppState};
pub use settings::{load_reader_settings, ReaderSettings};
pub use status::{StatusKind, StatusStore};
