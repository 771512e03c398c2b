//! Shared HTTP response envelope: every response carries `status`,
//! `status_code`, `message`, `result`, `request_id`, `timestamp`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub status: &'static str,
    pub status_code: u16,
    pub message: String,
    pub result: Option<T>,
    pub request_id: Uuid,
    pub timestamp: DateTime<Utc>,
}

impl<T> Envelope<T> {
    pub fn success(status_code: u16, message: impl Into<String>, result: T) -> Self {
        Self {
            status: "success",
            status_code,
            message: message.into(),
            result: Some(result),
            request_id: Uuid::new_v4(),
            timestamp: Utc::now(),
        }
    }

    pub fn error(status_code: u16, message: impl Into<String>) -> Envelope<T> {
        Envelope {
            status: "error",
            status_code,
            message: message.into(),
            result: None,
            request_id: Uuid::new_v4(),
            timestamp: Utc::now(),
        }
    }
}
