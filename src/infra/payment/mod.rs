pub mod http_payment_coordinator;
