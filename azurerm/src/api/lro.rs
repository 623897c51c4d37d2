//! Long-running operation polling
//!
//! ARM answers a PUT or DELETE with 200, 201 or 202 and describes how to
//! follow the operation in one of three ways:
//!
//! - an `Azure-AsyncOperation` header pointing at a status resource whose
//!   `status` eventually becomes `Succeeded`, `Failed` or `Canceled`
//! - a `Location` header that keeps answering 202 until the work is done
//! - neither, in which case the resource itself is re-read until
//!   `properties.provisioningState` is terminal
//!
//! Polling ends early with [`ApiError::OperationTimeout`] when the
//! operation's [`Context`] is cancelled or its deadline passes.

use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use tfplug::context::Context;

use super::client::{Client, PollConfig, RawResponse};
use super::error::{ApiError, ErrorDetail};

const ASYNC_OPERATION_HEADER: &str = "azure-asyncoperation";
const LOCATION_HEADER: &str = "location";

#[derive(Debug, Clone, PartialEq)]
enum PollKind {
    AsyncOperation(String),
    Location(String),
    ProvisioningState(String),
    Done,
}

#[derive(Debug, Deserialize)]
struct OperationStatus {
    #[serde(default)]
    status: String,
    #[serde(default)]
    error: Option<ErrorDetail>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProvisionedResource {
    #[serde(default)]
    properties: ProvisionedProperties,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProvisionedProperties {
    #[serde(default)]
    provisioning_state: Option<String>,
}

fn is_terminal(state: &str) -> bool {
    matches!(
        state.to_ascii_lowercase().as_str(),
        "succeeded" | "failed" | "canceled" | "cancelled"
    )
}

fn is_success(state: &str) -> bool {
    state.eq_ignore_ascii_case("succeeded")
}

fn provisioning_state(body: &str) -> Option<String> {
    serde_json::from_str::<ProvisionedResource>(body)
        .ok()
        .and_then(|r| r.properties.provisioning_state)
}

/// Interval before the next poll: the server's Retry-After when given,
/// never below the configured minimum
pub(crate) fn next_interval(retry_after: Option<Duration>, config: &PollConfig) -> Duration {
    retry_after
        .unwrap_or(config.default_interval)
        .max(config.min_interval)
}

pub struct Poller<'a> {
    client: &'a Client,
    kind: PollKind,
    operation: String,
    retry_after: Option<Duration>,
}

impl<'a> Poller<'a> {
    /// Follows the operation started by a PUT to `resource_path`
    pub fn for_put(client: &'a Client, resource_path: &str, response: &RawResponse) -> Self {
        let kind = match Self::header_kind(response) {
            Some(kind) => kind,
            None => match provisioning_state(&response.body) {
                Some(state) if !is_terminal(&state) => {
                    PollKind::ProvisioningState(resource_path.to_string())
                }
                _ => PollKind::Done,
            },
        };
        Self {
            client,
            kind,
            operation: format!("creating/updating {}", resource_path),
            retry_after: response.retry_after(),
        }
    }

    /// Follows the operation started by a DELETE of `resource_path`
    pub fn for_delete(client: &'a Client, resource_path: &str, response: &RawResponse) -> Self {
        Self {
            client,
            kind: Self::header_kind(response).unwrap_or(PollKind::Done),
            operation: format!("deleting {}", resource_path),
            retry_after: response.retry_after(),
        }
    }

    fn header_kind(response: &RawResponse) -> Option<PollKind> {
        if let Some(url) = response.header(ASYNC_OPERATION_HEADER) {
            return Some(PollKind::AsyncOperation(url.to_string()));
        }
        if response.status == StatusCode::ACCEPTED || response.status == StatusCode::CREATED {
            if let Some(url) = response.header(LOCATION_HEADER) {
                return Some(PollKind::Location(url.to_string()));
            }
        }
        None
    }

    pub fn is_done(&self) -> bool {
        self.kind == PollKind::Done
    }

    /// Polls until the operation reaches a terminal state
    pub async fn wait(mut self, ctx: &Context) -> Result<(), ApiError> {
        while !self.is_done() {
            let interval = next_interval(self.retry_after.take(), self.client.poll_config());
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = ctx.cancelled() => {
                    return Err(ApiError::OperationTimeout(self.operation.clone()));
                }
            }
            self.poll_once().await?;
        }
        Ok(())
    }

    async fn poll_once(&mut self) -> Result<(), ApiError> {
        match &self.kind {
            PollKind::AsyncOperation(url) => {
                let response = self.client.get_raw(url).await?;
                let status: OperationStatus = response.json()?;
                tracing::debug!("{}: operation status {}", self.operation, status.status);
                if is_terminal(&status.status) {
                    if !is_success(&status.status) {
                        let error = status.error.unwrap_or_default();
                        return Err(ApiError::OperationFailed {
                            status: status.status,
                            code: error.code,
                            message: error.message,
                        });
                    }
                    self.kind = PollKind::Done;
                }
                self.retry_after = response.retry_after();
            }
            PollKind::Location(url) => {
                let response = self.client.get_raw(url).await?;
                tracing::debug!("{}: location poll returned {}", self.operation, response.status);
                if response.status != StatusCode::ACCEPTED {
                    self.kind = PollKind::Done;
                }
                self.retry_after = response.retry_after();
            }
            PollKind::ProvisioningState(path) => {
                let response = self.client.get_raw(path).await?;
                let state = provisioning_state(&response.body).unwrap_or_default();
                tracing::debug!("{}: provisioning state {}", self.operation, state);
                if is_terminal(&state) {
                    if !is_success(&state) {
                        return Err(ApiError::OperationFailed {
                            status: state,
                            code: "ProvisioningFailed".to_string(),
                            message: format!("{} ended in a non-successful state", path),
                        });
                    }
                    self.kind = PollKind::Done;
                }
                self.retry_after = response.retry_after();
            }
            PollKind::Done => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_helpers::create_test_client;
    use mockito::{Matcher, Server};

    async fn put(client: &Client, path: &str) -> RawResponse {
        client.put_raw(path, &serde_json::json!({})).await.unwrap()
    }

    #[tokio::test]
    async fn async_operation_polls_until_succeeded() {
        let mut server = Server::new_async().await;
        let op_url = format!("{}/operations/op1", server.url());
        let _put = server
            .mock("PUT", "/lb")
            .match_query(Matcher::Any)
            .with_status(201)
            .with_header("Azure-AsyncOperation", &op_url)
            .with_body("{}")
            .create_async()
            .await;
        let in_progress = server
            .mock("GET", "/operations/op1")
            .match_query(Matcher::Any)
            .with_body(r#"{"status":"InProgress"}"#)
            .expect(2)
            .create_async()
            .await;
        let done = server
            .mock("GET", "/operations/op1")
            .match_query(Matcher::Any)
            .with_body(r#"{"status":"Succeeded"}"#)
            .expect(1)
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let response = put(&client, "/lb").await;
        let poller = Poller::for_put(&client, "/lb", &response);
        assert!(!poller.is_done());
        poller.wait(&Context::new()).await.unwrap();

        in_progress.assert_async().await;
        done.assert_async().await;
    }

    #[tokio::test]
    async fn failed_operation_surfaces_error() {
        let mut server = Server::new_async().await;
        let op_url = format!("{}/operations/op2", server.url());
        let _put = server
            .mock("PUT", "/lb")
            .match_query(Matcher::Any)
            .with_status(201)
            .with_header("Azure-AsyncOperation", &op_url)
            .with_body("{}")
            .create_async()
            .await;
        let _status = server
            .mock("GET", "/operations/op2")
            .match_query(Matcher::Any)
            .with_body(
                r#"{"status":"Failed","error":{"code":"RulesUseSameBackendPortProtocolAndPool","message":"port 80 already used"}}"#,
            )
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let response = put(&client, "/lb").await;
        let result = Poller::for_put(&client, "/lb", &response)
            .wait(&Context::new())
            .await;

        match result {
            Err(ApiError::OperationFailed {
                status,
                code,
                message,
            }) => {
                assert_eq!(status, "Failed");
                assert_eq!(code, "RulesUseSameBackendPortProtocolAndPool");
                assert_eq!(message, "port 80 already used");
            }
            other => panic!("expected OperationFailed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn location_polls_until_not_accepted() {
        let mut server = Server::new_async().await;
        let location = format!("{}/locations/del1", server.url());
        let _delete = server
            .mock("DELETE", "/lb/backendAddressPools/pool")
            .match_query(Matcher::Any)
            .with_status(202)
            .with_header("Location", &location)
            .create_async()
            .await;
        let pending = server
            .mock("GET", "/locations/del1")
            .match_query(Matcher::Any)
            .with_status(202)
            .expect(1)
            .create_async()
            .await;
        let finished = server
            .mock("GET", "/locations/del1")
            .match_query(Matcher::Any)
            .with_status(204)
            .expect(1)
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let response = client
            .delete_raw("/lb/backendAddressPools/pool")
            .await
            .unwrap();
        Poller::for_delete(&client, "/lb/backendAddressPools/pool", &response)
            .wait(&Context::new())
            .await
            .unwrap();

        pending.assert_async().await;
        finished.assert_async().await;
    }

    #[tokio::test]
    async fn provisioning_state_is_polled_without_headers() {
        let mut server = Server::new_async().await;
        let _put = server
            .mock("PUT", "/lb")
            .match_query(Matcher::Any)
            .with_body(r#"{"properties":{"provisioningState":"Updating"}}"#)
            .create_async()
            .await;
        let get = server
            .mock("GET", "/lb")
            .match_query(Matcher::Any)
            .with_body(r#"{"properties":{"provisioningState":"Succeeded"}}"#)
            .expect(1)
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let response = put(&client, "/lb").await;
        Poller::for_put(&client, "/lb", &response)
            .wait(&Context::new())
            .await
            .unwrap();
        get.assert_async().await;
    }

    #[tokio::test]
    async fn synchronous_responses_need_no_polling() {
        let mut server = Server::new_async().await;
        let _put = server
            .mock("PUT", "/lb")
            .match_query(Matcher::Any)
            .with_body(r#"{"properties":{"provisioningState":"Succeeded"}}"#)
            .create_async()
            .await;
        let _delete = server
            .mock("DELETE", "/lb")
            .match_query(Matcher::Any)
            .with_status(204)
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let response = put(&client, "/lb").await;
        assert!(Poller::for_put(&client, "/lb", &response).is_done());

        let response = client.delete_raw("/lb").await.unwrap();
        assert!(Poller::for_delete(&client, "/lb", &response).is_done());
    }

    #[tokio::test]
    async fn deadline_stops_polling() {
        let mut server = Server::new_async().await;
        let op_url = format!("{}/operations/slow", server.url());
        let _put = server
            .mock("PUT", "/lb")
            .match_query(Matcher::Any)
            .with_status(201)
            .with_header("Azure-AsyncOperation", &op_url)
            .with_body("{}")
            .create_async()
            .await;
        let _status = server
            .mock("GET", "/operations/slow")
            .match_query(Matcher::Any)
            .with_body(r#"{"status":"InProgress"}"#)
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let response = put(&client, "/lb").await;
        let ctx = Context::new().with_timeout(Duration::from_millis(100));
        let result = Poller::for_put(&client, "/lb", &response).wait(&ctx).await;

        match result {
            Err(ApiError::OperationTimeout(operation)) => {
                assert_eq!(operation, "creating/updating /lb")
            }
            other => panic!("expected OperationTimeout, got {:?}", other),
        }
    }

    #[test]
    fn retry_after_is_honoured_with_a_floor() {
        let config = PollConfig::default();
        assert_eq!(next_interval(None, &config), Duration::from_secs(10));
        assert_eq!(
            next_interval(Some(Duration::from_secs(3)), &config),
            Duration::from_secs(3)
        );
        assert_eq!(
            next_interval(Some(Duration::from_secs(0)), &config),
            Duration::from_secs(1)
        );
    }
}
