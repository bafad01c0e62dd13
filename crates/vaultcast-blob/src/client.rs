//! Rate-limited, retrying HTTP adapter over the external attachment platform.
//!
//! Each account gets its own [`governor::RateLimiter`] and the client never
//! substitutes one account for another on failure — that would violate the
//! per-segment account isolation the retrieval path depends on.

use std::collections::HashMap;
use std::num::NonZeroU32;
use std::time::Duration;

use bytes::Bytes;
use dashmap::DashMap;
use futures::Stream;
use governor::{Quota, RateLimiter};
use reqwest::StatusCode;
use tracing::warn;
use vaultcast_common::{AccountId, Error, Result};

use crate::accounts::{AccountConfig, AccountList};

const UPLOAD_TIMEOUT: Duration = Duration::from_secs(10 * 60);
const INFO_TIMEOUT: Duration = Duration::from_secs(30);
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(5 * 60);
const DEFAULT_RETRY_WAIT_SECS: u64 = 2;
const DOWNLOAD_RETRIES: u32 = 1;

type Limiter = RateLimiter<governor::state::NotKeyed, governor::state::InMemoryState, governor::clock::DefaultClock>;

/// Result of a successful [`RemoteBlobClient::info`] call.
#[derive(Debug, Clone)]
pub struct BlobInfo {
    pub remote_path: String,
    pub size: u64,
}

/// Thin adapter over the external platform's HTTP API: upload, info,
/// download, ping. See module docs for the isolation guarantee.
pub struct RemoteBlobClient {
    client: reqwest::Client,
    accounts: AccountList,
    limiters: DashMap<AccountId, Limiter>,
    max_retries: u32,
}

impl RemoteBlobClient {
    /// `requests_per_second` bounds each account's own rate limiter
    /// independently; `max_retries` bounds the upload/ping retry loop (the
    /// distributor's policy — default 3). Downloads always retry at most
    /// [`DOWNLOAD_RETRIES`] time, per spec, regardless of `max_retries`.
    pub fn new(accounts: AccountList, requests_per_second: u32, max_retries: u32) -> Self {
        let client = reqwest::Client::builder()
            .build()
            .expect("failed to build reqwest client");

        Self {
            client,
            accounts,
            limiters: DashMap::new(),
            max_retries,
        }
    }

    fn account(&self, id: &AccountId) -> Result<&AccountConfig> {
        self.accounts
            .get(id)
            .ok_or_else(|| Error::AccountUnavailable(id.as_str().to_string()))
    }

    fn quota(requests_per_second: u32) -> Quota {
        Quota::per_second(NonZeroU32::new(requests_per_second.max(1)).unwrap())
    }

    async fn throttle(&self, id: &AccountId) {
        if !self.limiters.contains_key(id) {
            self.limiters.insert(id.clone(), Limiter::direct(Self::quota(4)));
        }
        self.limiters.get(id).unwrap().until_ready().await;
    }

    fn endpoint(account: &AccountConfig, path: &str) -> String {
        format!("{}/{}", account.destination_id.trim_end_matches('/'), path)
    }

    /// Send a request, retrying on network errors, 5xx, and 429 up to
    /// `max_retries` times. On 429 sleeps the server-suggested interval (or
    /// a capped default) without ever substituting a different account.
    async fn send_with_retry(
        &self,
        account: &AccountConfig,
        timeout: Duration,
        max_retries: u32,
        build: impl Fn(&reqwest::Client) -> reqwest::RequestBuilder,
    ) -> Result<reqwest::Response> {
        let mut attempt = 0u32;
        loop {
            self.throttle(&account.id).await;

            let resp = build(&self.client)
                .bearer_auth(&account.credential)
                .timeout(timeout)
                .send()
                .await;

            let resp = match resp {
                Ok(r) => r,
                Err(e) if e.is_timeout() => {
                    return Err(Error::FetchTimeout(format!("{}: {e}", account.id)));
                }
                Err(e) if attempt < max_retries => {
                    attempt += 1;
                    warn!(account = %account.id, attempt, error = %e, "blob request failed, retrying");
                    tokio::time::sleep(backoff(attempt)).await;
                    continue;
                }
                Err(e) => return Err(Error::FetchFailed(format!("{}: {e}", account.id))),
            };

            if resp.status() == StatusCode::TOO_MANY_REQUESTS && attempt < max_retries {
                attempt += 1;
                let wait = resp
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(DEFAULT_RETRY_WAIT_SECS);
                warn!(account = %account.id, attempt, wait_secs = wait, "rate limited, backing off");
                tokio::time::sleep(Duration::from_secs(wait)).await;
                continue;
            }

            if resp.status().is_server_error() && attempt < max_retries {
                attempt += 1;
                tokio::time::sleep(backoff(attempt)).await;
                continue;
            }

            return resp
                .error_for_status()
                .map_err(|e| Error::FetchFailed(format!("{}: {e}", account.id)));
        }
    }

    pub async fn upload(&self, account_id: &AccountId, bytes: Bytes, filename: &str) -> Result<String> {
        let account = self.account(account_id)?;
        let filename = filename.to_string();

        let resp = self
            .send_with_retry(account, UPLOAD_TIMEOUT, self.max_retries, move |client| {
                let part = reqwest::multipart::Part::bytes(bytes.to_vec()).file_name(filename.clone());
                let form = reqwest::multipart::Form::new().part("file", part);
                client.post(Self::endpoint(account, "upload")).multipart(form)
            })
            .await
            .map_err(|e| Error::UploadFailed(e.to_string()))?;

        #[derive(serde::Deserialize)]
        struct UploadResponse {
            handle: String,
        }
        let body: UploadResponse = resp
            .json()
            .await
            .map_err(|e| Error::UploadFailed(format!("bad upload response: {e}")))?;
        Ok(body.handle)
    }

    pub async fn info(&self, account_id: &AccountId, handle: &str) -> Result<BlobInfo> {
        let account = self.account(account_id)?;

        let resp = self
            .send_with_retry(account, INFO_TIMEOUT, self.max_retries, |client| {
                client.get(Self::endpoint(account, &format!("files/{handle}")))
            })
            .await?;

        #[derive(serde::Deserialize)]
        struct InfoResponse {
            remote_path: String,
            size: u64,
        }
        let body: InfoResponse = resp
            .json()
            .await
            .map_err(|e| Error::FetchFailed(format!("bad info response: {e}")))?;
        Ok(BlobInfo { remote_path: body.remote_path, size: body.size })
    }

    /// Returns a byte stream and the declared content length.
    pub async fn download(
        &self,
        account_id: &AccountId,
        handle: &str,
    ) -> Result<(impl Stream<Item = reqwest::Result<Bytes>>, u64)> {
        let account = self.account(account_id)?;

        let resp = self
            .send_with_retry(account, DOWNLOAD_TIMEOUT, DOWNLOAD_RETRIES, |client| {
                client.get(Self::endpoint(account, &format!("files/{handle}/content")))
            })
            .await?;

        let size = resp.content_length().unwrap_or(0);
        Ok((resp.bytes_stream(), size))
    }

    pub async fn ping(&self, account_id: &AccountId) -> Result<()> {
        let account = self.account(account_id)?;
        self.send_with_retry(account, INFO_TIMEOUT, 0, |client| {
            client.get(Self::endpoint(account, "ping"))
        })
        .await
        .map(|_| ())
    }
}

fn backoff(attempt: u32) -> Duration {
    Duration::from_millis(200u64.saturating_mul(1 << attempt.min(5)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_with_attempt() {
        assert!(backoff(1) < backoff(2));
        assert!(backoff(2) < backoff(3));
    }

    #[test]
    fn endpoint_joins_destination_and_path() {
        let account = AccountConfig {
            id: AccountId::from("a"),
            credential: "tok".into(),
            destination_id: "https://example.test/dest/".into(),
        };
        assert_eq!(
            RemoteBlobClient::endpoint(&account, "ping"),
            "https://example.test/dest/ping"
        );
    }
}
