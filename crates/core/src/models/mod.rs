pub mod account;
pub mod action;
pub mod analytics;
pub mod category;
pub mod portfolio;
pub mod position;
pub mod price;
pub mod settings;
pub mod snapshot;
pub mod valued;
