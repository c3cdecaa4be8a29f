pub use field::*;
pub use statistic::*;

mod field;
mod statistic;
