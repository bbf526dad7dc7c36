pub mod folder_access;

pub use folder_access::{FolderAccess, FolderHandle};
