pub mod archive;
pub mod config;
pub mod routing;
pub mod types;

pub use archive::{Archive, MemoryArchive, TarGzArchive};
pub use config::{Config, LibraryConfig};
pub use routing::FileKind;
pub use types::*;
