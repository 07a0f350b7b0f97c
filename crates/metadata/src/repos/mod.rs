//! Repository traits for catalog operations.

pub mod files;

pub use files::FileRepo;
