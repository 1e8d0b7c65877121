pub mod api_errors;
pub mod cloudpayments;
pub mod http;
pub mod mock;
pub mod providers;
pub mod signature;
pub mod yookassa;
