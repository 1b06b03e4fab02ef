// Technical indicators module
// Incremental RSI with Wilder's smoothing over decimal closes

pub mod rsi;

pub use rsi::{compute, rsi_from_averages, RsiComputation, RsiOutcome, CALCULATION_SCALE};
