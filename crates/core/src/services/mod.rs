pub mod action_service;
pub mod aggregation_service;
pub mod category_service;
pub mod exposure_service;
pub mod portfolio_service;
pub mod price_service;
pub mod snapshot_service;
pub mod valuation_service;
