//! HTTP handlers
//!
//! Read-only query surface over the Event Store plus the RSS view. All
//! list endpoints filter before paginating and share one page envelope.

pub mod events;
pub mod feeds;
pub mod health;

use serde::Serialize;

/// Envelope for every paginated response.
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
    pub results: Vec<T>,
}

/// Clamp a requested limit to the API maximum of 100.
pub fn clamp_limit(limit: Option<i64>, default: i64) -> i64 {
    limit.unwrap_or(default).clamp(1, 100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_limit() {
        assert_eq!(clamp_limit(None, 20), 20);
        assert_eq!(clamp_limit(Some(50), 20), 50);
        assert_eq!(clamp_limit(Some(1000), 20), 100);
        assert_eq!(clamp_limit(Some(0), 20), 1);
    }
}
