pub mod cost;

pub use cost::{CostCalculator, DegradedInput, FeeQuote};
