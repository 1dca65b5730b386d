pub mod table;

pub use table::{SynonymTable, SynonymTableBuilder};
