pub mod idempotency_key;
pub mod order_token;
pub mod organizer;
pub mod payment_callback;
pub mod tenant;
