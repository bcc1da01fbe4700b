pub mod enriched;
pub mod entry;
pub mod optimistic;
pub mod table;
