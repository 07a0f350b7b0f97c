pub mod fixtures;

#[allow(unused_imports)]
pub use fixtures::{CountingSource, dir_entries, name, seeded_bytes};
