pub mod nash;

pub use nash::{NashIndex, NashRange, TempPred};
