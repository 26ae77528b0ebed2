pub mod http_fulfillment_service;
