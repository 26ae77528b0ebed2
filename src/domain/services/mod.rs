pub mod closeout;
pub mod invitation_service;
pub mod order_collector;
pub mod payment_mode;
pub mod session_service;
