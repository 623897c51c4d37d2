//! Test helpers for the ARM API

use std::time::Duration;

#[cfg(test)]
#[allow(dead_code)]
pub fn create_test_client(url: &str) -> super::Client {
    super::Client::with_config(
        url,
        super::Credential::Static("test-token".to_string()),
        super::RetryConfig {
            initial_backoff_ms: 1,
            max_backoff_ms: 5,
            ..Default::default()
        },
        super::PollConfig {
            default_interval: Duration::from_millis(10),
            min_interval: Duration::from_millis(10),
        },
    )
    .unwrap()
}

#[cfg(test)]
mod tests {
    use super::super::*;

    #[test]
    fn test_client_uses_endpoint() {
        let client = test_helpers::create_test_client("http://127.0.0.1:1/");
        assert_eq!(client.base_url(), "http://127.0.0.1:1");
        assert_eq!(
            client.poll_config().min_interval,
            std::time::Duration::from_millis(10)
        );
    }

    #[test]
    fn invalid_endpoint_is_rejected() {
        let result = Client::new("not a url", Credential::Static("t".to_string()));
        assert!(matches!(result, Err(ApiError::ParseError(_))));
    }
}
