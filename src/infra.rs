pub mod mailer;
pub mod memory;
pub mod postgres;
