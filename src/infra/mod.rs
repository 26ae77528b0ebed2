pub mod factory;
pub mod fulfillment;
pub mod payment;
pub mod repositories;
