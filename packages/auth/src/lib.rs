#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Vendor credential broker client.
//!
//! The export bucket is not readable with the caller's own AWS identity.
//! Instead the vendor's API exchanges a bearer token for a time-boxed
//! (one hour) STS-style credential tuple plus the `s3Path` the account's
//! export lives under. [`ExportSession::establish`] performs that exchange
//! and wraps the result in a session scoped to one enumeration run or one
//! batch's processing — the credentials are never persisted and die with
//! the session value.

use std::time::{Duration, Instant};

use regex::Regex;
use serde::Deserialize;

/// How long a broker-issued credential tuple stays valid.
///
/// The broker is asked for `duration=1h`; the session tracks this locally
/// because the response does not echo an expiry timestamp.
pub const CREDENTIAL_LIFETIME: Duration = Duration::from_secs(3600);

/// Stop issuing new source-store calls this long before the credential
/// window closes, so in-flight part transfers can finish inside it.
const EXPIRY_SAFETY_MARGIN: Duration = Duration::from_secs(120);

/// Maximum attempts for the credential exchange (initial + retries).
const MAX_ATTEMPTS: u32 = 3;

/// Base delay between credential exchange retries (doubles each attempt).
const RETRY_BASE_DELAY: Duration = Duration::from_secs(2);

/// Errors that can occur while establishing an export session.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// HTTP request to the broker failed.
    #[error("Credential request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Broker rejected the exchange with a non-retryable status.
    #[error("Credential request rejected: HTTP {status}")]
    Rejected {
        /// Status code returned by the broker.
        status: reqwest::StatusCode,
    },

    /// Broker response body could not be parsed.
    #[error("Malformed credential response: {0}")]
    MalformedResponse(#[from] serde_json::Error),

    /// Broker response did not carry an extractable account identifier.
    #[error("No account id in s3Path: {s3_path}")]
    MissingAccountId {
        /// The `s3Path` value that failed the pattern match.
        s3_path: String,
    },
}

/// Credential tuple issued by the broker.
#[derive(Debug, Clone, Deserialize)]
pub struct ExportCredentials {
    /// Access key id.
    #[serde(rename = "accessKeyId")]
    pub access_key_id: String,
    /// Secret access key.
    #[serde(rename = "secretAccessKey")]
    pub secret_access_key: String,
    /// Session token accompanying the temporary key pair.
    #[serde(rename = "sessionToken")]
    pub session_token: String,
}

/// Full broker response: the credential tuple plus the account's export
/// path, from which the account identifier is extracted.
#[derive(Debug, Clone, Deserialize)]
pub struct CredentialGrant {
    /// Temporary credential tuple.
    pub credentials: ExportCredentials,
    /// Export root path, e.g. `s3://bucket/v1/account_id=123/`.
    #[serde(rename = "s3Path")]
    pub s3_path: String,
}

/// Exchanges a bearer token for a credential grant.
///
/// Retries transient failures (connection errors, timeouts, HTTP 429/5xx)
/// up to [`MAX_ATTEMPTS`] times with exponential backoff. 4xx responses
/// other than 429 are permanent and fail immediately.
///
/// # Errors
///
/// Returns [`AuthError`] if the exchange fails after all retries or the
/// response cannot be parsed.
pub async fn fetch_credentials(
    http: &reqwest::Client,
    credentials_url: &str,
    token: &str,
) -> Result<CredentialGrant, AuthError> {
    let mut last_error: Option<AuthError> = None;

    for attempt in 1..=MAX_ATTEMPTS {
        if attempt > 1 {
            let delay = RETRY_BASE_DELAY * 2u32.saturating_pow(attempt - 2);
            log::warn!("  credential retry {}/{MAX_ATTEMPTS} in {delay:?}...", attempt - 1);
            tokio::time::sleep(delay).await;
        }

        let result = http
            .get(credentials_url)
            .query(&[("duration", "1h")])
            .bearer_auth(token)
            .send()
            .await;

        match result {
            Err(e) => {
                let transient = e.is_timeout() || e.is_connect() || e.is_request();
                if transient && attempt < MAX_ATTEMPTS {
                    log::warn!("  transient credential error: {e}");
                    last_error = Some(AuthError::Http(e));
                    continue;
                }
                return Err(AuthError::Http(e));
            }
            Ok(response) => {
                let status = response.status();

                if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                    if attempt < MAX_ATTEMPTS {
                        log::warn!("  broker HTTP {status}");
                        last_error = Some(AuthError::Rejected { status });
                        continue;
                    }
                    return Err(AuthError::Rejected { status });
                }

                if !status.is_success() {
                    return Err(AuthError::Rejected { status });
                }

                let text = response.text().await?;
                return Ok(serde_json::from_str(&text)?);
            }
        }
    }

    Err(last_error.unwrap_or(AuthError::Rejected {
        status: reqwest::StatusCode::SERVICE_UNAVAILABLE,
    }))
}

/// Pulls the numeric account id out of the grant's `s3Path`.
fn extract_account_id(s3_path: &str) -> Result<String, AuthError> {
    let re = Regex::new(r"account_id=([0-9]+)").unwrap_or_else(|_| unreachable!());
    re.captures(s3_path)
        .map(|caps| caps[1].to_string())
        .ok_or_else(|| AuthError::MissingAccountId {
            s3_path: s3_path.to_string(),
        })
}

/// A short-lived source-store session: the vendor-scoped S3 client, the
/// account id, and the credential window it was issued under.
///
/// Owned by exactly one enumeration run or one batch's processing. Dropped
/// at the end of that scope regardless of success or failure; never reuse
/// a session across queue messages.
#[derive(Debug, Clone)]
pub struct ExportSession {
    s3: aws_sdk_s3::Client,
    account_id: String,
    issued_at: Instant,
    lifetime: Duration,
}

impl ExportSession {
    /// Exchanges `token` at the broker and builds the vendor-scoped S3
    /// client from the issued tuple.
    ///
    /// Region and retry behavior come from the ambient AWS configuration;
    /// only the credentials provider is overridden.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`] if the exchange fails or the response is
    /// malformed.
    pub async fn establish(
        http: &reqwest::Client,
        credentials_url: &str,
        token: &str,
    ) -> Result<Self, AuthError> {
        let grant = fetch_credentials(http, credentials_url, token).await?;
        let account_id = extract_account_id(&grant.s3_path)?;

        let creds = aws_sdk_s3::config::Credentials::new(
            &grant.credentials.access_key_id,
            &grant.credentials.secret_access_key,
            Some(grant.credentials.session_token.clone()),
            None,
            "vendor-export-broker",
        );

        let base = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .load()
            .await;
        let config = aws_sdk_s3::config::Builder::from(&base)
            .credentials_provider(creds)
            .build();

        log::debug!("Established export session for account {account_id}");

        Ok(Self {
            s3: aws_sdk_s3::Client::from_conf(config),
            account_id,
            issued_at: Instant::now(),
            lifetime: CREDENTIAL_LIFETIME,
        })
    }

    /// The S3 client authorized against the vendor's export bucket.
    #[must_use]
    pub const fn s3(&self) -> &aws_sdk_s3::Client {
        &self.s3
    }

    /// Account identifier extracted from the grant.
    #[must_use]
    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    /// Whether the credential window has plausibly elapsed.
    ///
    /// Includes a safety margin so a transfer started near the boundary
    /// does not run into mid-object credential failures. Callers must stop
    /// issuing new source-store calls once this returns `true`.
    #[must_use]
    pub fn is_expiring(&self) -> bool {
        self.issued_at.elapsed() + EXPIRY_SAFETY_MARGIN >= self.lifetime
    }
}
