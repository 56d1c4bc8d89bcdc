pub mod runner;

pub use runner::{MeasurementRunner, SuiteReport};
