//! S3 client implementation
//!
//! Wraps aws-sdk-s3 and implements the ObjectStore trait from oc-core.

use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use bytes::Bytes;

use oc_core::{
    ByteRange, ByteReader, Error, ListOptions, ListResult, ObjectDescriptor, ObjectInfo,
    ObjectStore, Result, StorageConfig,
};

/// What a failed request was addressing, for not-found classification
#[derive(Debug, Clone, Copy)]
enum Subject<'a> {
    Bucket,
    Object(&'a ObjectDescriptor),
}

/// S3 client wrapper
pub struct S3Client {
    inner: aws_sdk_s3::Client,
}

impl S3Client {
    /// Create a new S3 client from storage settings
    ///
    /// The SDK's own retries are disabled; the engine retries every request
    /// itself so that attempts are counted once.
    pub async fn new(storage: &StorageConfig) -> Result<Self> {
        let timeouts = aws_config::timeout::TimeoutConfig::builder()
            .connect_timeout(Duration::from_millis(storage.timeout.connect_ms))
            .read_timeout(Duration::from_millis(storage.timeout.read_ms))
            .build();

        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(storage.region.clone()))
            .retry_config(aws_config::retry::RetryConfig::disabled())
            .timeout_config(timeouts);

        if let Some((access_key, secret_key)) = storage.static_credentials() {
            let credentials = aws_credential_types::Credentials::new(
                access_key,
                secret_key,
                None, // session token
                None, // expiry
                "objcat-static-credentials",
            );
            loader = loader.credentials_provider(credentials);
        }

        if let Some(endpoint) = &storage.endpoint {
            url::Url::parse(endpoint)?;
            loader = loader.endpoint_url(endpoint);
        }

        let config = loader.load().await;

        let s3_config = aws_sdk_s3::config::Builder::from(&config)
            .force_path_style(storage.force_path_style())
            .build();

        tracing::debug!(
            endpoint = storage.endpoint.as_deref().unwrap_or("aws"),
            region = %storage.region,
            path_style = storage.force_path_style(),
            "created S3 client"
        );

        Ok(Self {
            inner: aws_sdk_s3::Client::from_conf(s3_config),
        })
    }

    /// Get the underlying aws-sdk-s3 client
    pub fn inner(&self) -> &aws_sdk_s3::Client {
        &self.inner
    }

    /// Ranged GET pinned to the descriptor's version and etag
    async fn ranged_get(
        &self,
        object: &ObjectDescriptor,
        range: ByteRange,
    ) -> Result<aws_sdk_s3::operation::get_object::GetObjectOutput> {
        self.inner
            .get_object()
            .bucket(&object.bucket)
            .key(&object.key)
            .set_version_id(object.version_id.clone())
            .set_if_match(object.etag.as_deref().map(quote_etag))
            .range(range.to_header())
            .send()
            .await
            .map_err(|e| map_sdk_error(e, Subject::Object(object)))
    }
}

#[async_trait]
impl ObjectStore for S3Client {
    async fn list_objects(&self, bucket: &str, options: ListOptions) -> Result<ListResult> {
        let response = self
            .inner
            .list_objects_v2()
            .bucket(bucket)
            .set_prefix(options.prefix)
            .set_delimiter(options.delimiter)
            .set_max_keys(options.max_keys)
            .set_continuation_token(options.continuation_token)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, Subject::Bucket))?;

        let mut items = Vec::new();

        // Common prefixes (directories)
        for prefix in response.common_prefixes() {
            if let Some(p) = prefix.prefix() {
                items.push(ObjectInfo::dir(p));
            }
        }

        for object in response.contents() {
            let key = object.key().unwrap_or_default();
            let mut info = ObjectInfo::file(key, content_length(object.size()));
            info.etag = object.e_tag().map(unquote_etag);
            items.push(info);
        }

        Ok(ListResult {
            items,
            truncated: response.is_truncated().unwrap_or(false),
            continuation_token: response.next_continuation_token().map(|s| s.to_string()),
        })
    }

    async fn head_object(&self, object: &ObjectDescriptor) -> Result<ObjectInfo> {
        let response = self
            .inner
            .head_object()
            .bucket(&object.bucket)
            .key(&object.key)
            .set_version_id(object.version_id.clone())
            .send()
            .await
            .map_err(|e| map_sdk_error(e, Subject::Object(object)))?;

        let mut info = ObjectInfo::file(&object.key, content_length(response.content_length()));
        info.etag = response.e_tag().map(unquote_etag);
        info.version_id = response.version_id().map(|v| v.to_string());

        Ok(info)
    }

    async fn get_object_range(&self, object: &ObjectDescriptor, range: ByteRange) -> Result<Bytes> {
        let response = self.ranged_get(object, range).await?;

        // A body cut short mid-stream is a network failure, retried upstream
        let data = response
            .body
            .collect()
            .await
            .map_err(|e| Error::Network(e.to_string()))?
            .into_bytes();

        Ok(data)
    }

    async fn open_range(&self, object: &ObjectDescriptor, range: ByteRange) -> Result<ByteReader> {
        let response = self.ranged_get(object, range).await?;
        Ok(Box::new(response.body.into_async_read()))
    }
}

fn unquote_etag(etag: &str) -> String {
    etag.trim_matches('"').to_string()
}

fn quote_etag(etag: &str) -> String {
    format!("\"{etag}\"")
}

fn content_length(len: Option<i64>) -> u64 {
    len.and_then(|n| u64::try_from(n).ok()).unwrap_or(0)
}

/// Map an SDK failure into the engine's error taxonomy
fn map_sdk_error<E>(err: SdkError<E, HttpResponse>, subject: Subject<'_>) -> Error
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    match &err {
        SdkError::ServiceError(ctx) => {
            let status = ctx.raw().status().as_u16();
            let code = ctx.err().code().unwrap_or_default();
            let message = ctx
                .err()
                .message()
                .map(|m| m.to_string())
                .unwrap_or_else(|| DisplayErrorContext(&err).to_string());
            classify(status, code, message, subject)
        }
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) | SdkError::ResponseError(_) => {
            Error::Network(DisplayErrorContext(&err).to_string())
        }
        _ => Error::Service(DisplayErrorContext(&err).to_string()),
    }
}

fn classify(status: u16, code: &str, message: String, subject: Subject<'_>) -> Error {
    let pinned = match subject {
        Subject::Object(object) => object
            .version_id
            .as_ref()
            .map(|version_id| (object.key.clone(), version_id.clone())),
        Subject::Bucket => None,
    };
    match (status, code, pinned) {
        (412, _, _) | (_, "PreconditionFailed", _) => match subject {
            Subject::Object(object) => Error::ObjectChanged {
                key: object.key.clone(),
            },
            Subject::Bucket => Error::Service(message),
        },
        (_, "NoSuchBucket", _) => Error::NotFound("bucket".into()),
        (404, _, Some((key, version_id)))
        | (_, "NoSuchVersion", Some((key, version_id)))
        | (400, "InvalidArgument", Some((key, version_id))) => {
            Error::VersionNotFound { key, version_id }
        }
        (_, "NoSuchKey" | "NotFound", _) | (404, _, _) => match subject {
            Subject::Bucket => Error::NotFound("bucket".into()),
            Subject::Object(_) => Error::NotFound("object".into()),
        },
        (403, _, _) | (_, "AccessDenied" | "InvalidAccessKeyId" | "SignatureDoesNotMatch", _) => {
            Error::AccessDenied(message)
        }
        (500..=599, _, _) | (_, "SlowDown" | "InternalError" | "RequestTimeout", _) => {
            Error::Network(message)
        }
        _ => Error::Service(message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oc_core::ErrorKind;

    fn plain() -> ObjectDescriptor {
        ObjectDescriptor::unsized_key("bucket", "key", None)
    }

    fn pinned() -> ObjectDescriptor {
        ObjectDescriptor::unsized_key("bucket", "key", Some("v1".into()))
    }

    fn kind(status: u16, code: &str, object: &ObjectDescriptor) -> ErrorKind {
        classify(status, code, "message".into(), Subject::Object(object)).kind()
    }

    #[test]
    fn test_not_found_classification() {
        assert_eq!(kind(404, "NoSuchKey", &plain()), ErrorKind::NotFound);
        // HEAD responses carry no error body
        assert_eq!(kind(404, "", &plain()), ErrorKind::NotFound);
        assert_eq!(
            classify(404, "NoSuchBucket", String::new(), Subject::Object(&plain())).to_string(),
            "bucket not found"
        );
        assert_eq!(
            classify(404, "", String::new(), Subject::Bucket).to_string(),
            "bucket not found"
        );
    }

    #[test]
    fn test_version_classification() {
        let object = pinned();
        assert_eq!(kind(404, "NoSuchVersion", &object), ErrorKind::VersionNotFound);
        assert_eq!(kind(404, "", &object), ErrorKind::VersionNotFound);
        assert_eq!(kind(400, "InvalidArgument", &object), ErrorKind::VersionNotFound);
        assert_eq!(kind(400, "InvalidArgument", &plain()), ErrorKind::FatalFetchFailure);

        let err = classify(404, "", String::new(), Subject::Object(&object));
        assert_eq!(err.to_string(), "object version not found");
        assert!(matches!(
            err,
            Error::VersionNotFound { ref key, ref version_id } if key == "key" && version_id == "v1"
        ));
    }

    #[test]
    fn test_transient_and_terminal() {
        let object = plain();
        assert_eq!(kind(503, "SlowDown", &object), ErrorKind::TransientFetchFailure);
        assert_eq!(kind(500, "", &object), ErrorKind::TransientFetchFailure);
        assert_eq!(kind(403, "AccessDenied", &object), ErrorKind::AccessDenied);
        assert_eq!(kind(416, "InvalidRange", &object), ErrorKind::FatalFetchFailure);
    }

    #[test]
    fn test_precondition_failed_means_object_changed() {
        let err = classify(412, "PreconditionFailed", "message".into(), Subject::Object(&plain()));
        assert!(matches!(err, Error::ObjectChanged { ref key } if key == "key"));
        assert_eq!(err.kind(), ErrorKind::FatalFetchFailure);
        assert!(!err.is_retryable());
        assert_eq!(kind(412, "", &pinned()), ErrorKind::FatalFetchFailure);
    }

    #[test]
    fn test_etag_quoting() {
        assert_eq!(unquote_etag("\"abc\""), "abc");
        assert_eq!(unquote_etag("abc"), "abc");
        assert_eq!(quote_etag("abc"), "\"abc\"");
    }

    #[test]
    fn test_content_length() {
        assert_eq!(content_length(Some(42)), 42);
        assert_eq!(content_length(Some(-1)), 0);
        assert_eq!(content_length(None), 0);
    }

    #[tokio::test]
    async fn test_client_from_static_config() {
        let storage = StorageConfig {
            access_key: Some("access".into()),
            secret_key: Some("secret".into()),
            ..Default::default()
        }
        .with_endpoint("http://localhost:9000")
        .unwrap();

        let client = S3Client::new(&storage).await.unwrap();
        let config = client.inner().config();
        assert_eq!(config.region().map(|r| r.as_ref()), Some("us-east-1"));
    }

    #[tokio::test]
    async fn test_client_rejects_bad_endpoint() {
        let storage = StorageConfig {
            endpoint: Some("not a url".into()),
            ..Default::default()
        };
        assert!(S3Client::new(&storage).await.is_err());
    }
}
