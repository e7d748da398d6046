//! File tools - read files and list directories under the tool workdir

mod list;
mod read;
mod security;

pub use list::FileListTool;
pub use read::FileReadTool;
pub use security::resolve_path;
