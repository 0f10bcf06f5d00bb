// crates/checkpoint-store-s3/src/s3.rs
// ============================================================================
// Module: S3 Bucket
// Description: Bucket implementation backed by aws-sdk-s3.
// Purpose: Run the object backend against S3-compatible storage.
// Dependencies: aws-config, aws-sdk-s3, tokio
// ============================================================================

//! ## Overview
//! [`S3Bucket`] adapts an `aws-sdk-s3` client to the blocking [`Bucket`]
//! surface. It owns a private Tokio runtime; calls made from inside a
//! multi-thread runtime use `block_in_place`, and calls from a current-thread
//! runtime run on a helper thread. A missing key is recognized from the
//! service error (`NoSuchKey`), the error code/message pair, or a 404 that
//! carries no error code, and surfaces as [`BucketError::NotFound`]. Any other
//! 404 (`NoSuchBucket`) is a transport failure.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use aws_config::BehaviorVersion;
use aws_config::Region;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::error::ProvideErrorMetadata;
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_sdk_s3::primitives::ByteStream;
use tokio::runtime::Handle;
use tokio::runtime::Runtime;
use tokio::runtime::RuntimeFlavor;

use crate::bucket::Bucket;
use crate::bucket::BucketError;
use crate::bucket::ObjectMetadata;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// HTTP status S3 returns for missing keys and missing buckets alike.
const NOT_FOUND_STATUS: u16 = 404;

// ============================================================================
// SECTION: Config
// ============================================================================

/// Connection settings for [`S3Bucket::connect`].
#[derive(Debug, Clone, Default)]
pub struct S3BucketConfig {
    /// Bucket name.
    pub bucket: String,
    /// Optional region override.
    pub region: Option<String>,
    /// Optional endpoint for S3-compatible services.
    pub endpoint: Option<String>,
    /// Use path-style addressing.
    pub force_path_style: bool,
}

// ============================================================================
// SECTION: Runtime Helpers
// ============================================================================

/// Blocks on an S3 future using a compatible runtime.
fn block_on_with_runtime<F, T>(runtime: &Runtime, future: F) -> Result<T, BucketError>
where
    F: Future<Output = Result<T, BucketError>> + Send + 'static,
    T: Send + 'static,
{
    if let Ok(handle) = Handle::try_current() {
        if matches!(handle.runtime_flavor(), RuntimeFlavor::MultiThread) {
            return tokio::task::block_in_place(|| handle.block_on(future));
        }
        let (tx, rx) = std::sync::mpsc::sync_channel(1);
        std::thread::spawn(move || {
            let result = Runtime::new()
                .map_err(|err| BucketError::Transport(err.to_string()))
                .and_then(|runtime| runtime.block_on(future));
            let _ = tx.send(result);
        });
        return rx.recv().unwrap_or_else(|_| {
            Err(BucketError::Transport("s3 helper thread exited".to_string()))
        });
    }

    runtime.block_on(future)
}

// ============================================================================
// SECTION: S3 Bucket
// ============================================================================

/// S3-backed [`Bucket`].
pub struct S3Bucket {
    /// Underlying S3 client.
    client: Client,
    /// Bucket name.
    bucket: String,
    /// Tokio runtime for blocking S3 operations.
    runtime: Option<Arc<Runtime>>,
}

impl Drop for S3Bucket {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            let _ = std::thread::spawn(move || drop(runtime));
        }
    }
}

impl std::fmt::Debug for S3Bucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Bucket").field("bucket", &self.bucket).finish_non_exhaustive()
    }
}

impl S3Bucket {
    /// Builds a client from the ambient AWS configuration plus overrides.
    ///
    /// # Errors
    ///
    /// Returns [`BucketError`] when the bucket is empty or the runtime cannot
    /// be created.
    pub fn connect(config: &S3BucketConfig) -> Result<Self, BucketError> {
        if config.bucket.trim().is_empty() {
            return Err(BucketError::Invalid("bucket must be set".to_string()));
        }
        let runtime = Runtime::new().map_err(|err| BucketError::Transport(err.to_string()))?;
        let region = config.region.clone();
        let endpoint = config.endpoint.clone();
        let shared_config = block_on_with_runtime(&runtime, async {
            let mut loader = aws_config::defaults(BehaviorVersion::latest());
            if let Some(region) = region {
                loader = loader.region(Region::new(region));
            }
            if let Some(endpoint) = endpoint {
                loader = loader.endpoint_url(endpoint);
            }
            Ok(loader.load().await)
        })?;
        let mut s3_builder = aws_sdk_s3::config::Builder::from(&shared_config);
        if config.force_path_style {
            s3_builder = s3_builder.force_path_style(true);
        }
        let client = Client::from_conf(s3_builder.build());
        Ok(Self {
            client,
            bucket: config.bucket.clone(),
            runtime: Some(Arc::new(runtime)),
        })
    }

    /// Wraps a caller-configured client.
    ///
    /// # Errors
    ///
    /// Returns [`BucketError`] when the bucket is empty or the runtime cannot
    /// be created.
    pub fn from_client(client: Client, bucket: impl Into<String>) -> Result<Self, BucketError> {
        let bucket = bucket.into();
        if bucket.trim().is_empty() {
            return Err(BucketError::Invalid("bucket must be set".to_string()));
        }
        let runtime = Runtime::new().map_err(|err| BucketError::Transport(err.to_string()))?;
        Ok(Self {
            client,
            bucket,
            runtime: Some(Arc::new(runtime)),
        })
    }

    /// Returns the bucket name.
    #[must_use]
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Returns the runtime or an error if shut down.
    fn runtime(&self) -> Result<&Runtime, BucketError> {
        self.runtime
            .as_ref()
            .map(AsRef::as_ref)
            .ok_or_else(|| BucketError::Transport("s3 runtime closed".to_string()))
    }
}

impl Bucket for S3Bucket {
    fn put_object(
        &self,
        name: &str,
        body: Vec<u8>,
        metadata: &ObjectMetadata,
    ) -> Result<(), BucketError> {
        let bucket = self.bucket.clone();
        let key = name.to_string();
        let client = self.client.clone();
        let metadata: HashMap<String, String> =
            metadata.iter().map(|(name, value)| (name.clone(), value.clone())).collect();
        block_on_with_runtime(self.runtime()?, async move {
            client
                .put_object()
                .bucket(bucket)
                .key(key)
                .body(ByteStream::from(body))
                .set_metadata(Some(metadata))
                .content_type("text/plain")
                .send()
                .await
                .map_err(|err| transport_error(&err))?;
            Ok(())
        })
    }

    fn get_object(&self, name: &str) -> Result<Vec<u8>, BucketError> {
        let bucket = self.bucket.clone();
        let key = name.to_string();
        let client = self.client.clone();
        block_on_with_runtime(self.runtime()?, async move {
            let output = client
                .get_object()
                .bucket(bucket)
                .key(key.clone())
                .send()
                .await
                .map_err(|err| get_error(&key, &err))?;
            let body = output
                .body
                .collect()
                .await
                .map_err(|err| BucketError::Transport(err.to_string()))?;
            Ok(body.into_bytes().to_vec())
        })
    }

    fn delete_object(&self, name: &str) -> Result<(), BucketError> {
        let bucket = self.bucket.clone();
        let key = name.to_string();
        let client = self.client.clone();
        block_on_with_runtime(self.runtime()?, async move {
            client
                .delete_object()
                .bucket(bucket)
                .key(key)
                .send()
                .await
                .map_err(|err| transport_error(&err))?;
            Ok(())
        })
    }
}

// ============================================================================
// SECTION: Error Mapping
// ============================================================================

/// Maps a get failure, separating a missing key from everything else.
fn get_error(key: &str, err: &SdkError<GetObjectError, HttpResponse>) -> BucketError {
    let no_such_key = err.as_service_error().is_some_and(GetObjectError::is_no_such_key);
    let status = err.raw_response().map(|response| response.status().as_u16());
    if is_missing_key(no_such_key, status, err.code(), err.message()) {
        return BucketError::NotFound(key.to_string());
    }
    transport_error(err)
}

/// Decides whether a get failure means the key is absent.
///
/// A bare 404 counts only when the service sent no error code; S3 also
/// answers 404 for `NoSuchBucket`, which must surface as a failure.
fn is_missing_key(
    no_such_key: bool,
    status: Option<u16>,
    code: Option<&str>,
    message: Option<&str>,
) -> bool {
    if no_such_key {
        return true;
    }
    match code {
        Some(code) => {
            BucketError::from_error_fields(code, message.unwrap_or_default()).is_not_found()
        }
        None => status == Some(NOT_FOUND_STATUS),
    }
}

/// Flattens an SDK error with its full source chain.
fn transport_error<E>(err: &E) -> BucketError
where
    E: std::error::Error,
{
    BucketError::Transport(DisplayErrorContext(err).to_string())
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_such_key_is_missing() {
        assert!(is_missing_key(true, Some(404), Some("NoSuchKey"), None));
        assert!(is_missing_key(false, Some(404), Some("NoSuchKey"), Some("gone")));
        assert!(is_missing_key(false, Some(404), Some("404"), Some("Not Found")));
    }

    #[test]
    fn codeless_404_is_missing() {
        assert!(is_missing_key(false, Some(404), None, None));
        assert!(!is_missing_key(false, Some(500), None, None));
        assert!(!is_missing_key(false, None, None, None));
    }

    #[test]
    fn missing_bucket_is_not_missing_key() {
        assert!(!is_missing_key(false, Some(404), Some("NoSuchBucket"), Some("no bucket")));
        assert!(!is_missing_key(false, Some(403), Some("AccessDenied"), Some("denied")));
    }
}
