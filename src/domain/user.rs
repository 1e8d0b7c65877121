use serde::Serialize;

/// Only what the notifier needs to address a customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: i64,
    pub email: String,
}
