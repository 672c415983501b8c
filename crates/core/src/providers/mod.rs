pub mod registry;
pub mod traits;

// Price feed implementations
pub mod alphavantage;
pub mod coincap;
pub mod frankfurter;
