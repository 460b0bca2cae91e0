use std::error::Error as StdError;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::config::retry::RetryConfig;
use aws_sdk_s3::config::timeout::TimeoutConfig;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use serde::{Deserialize, Serialize};
use shardline_types::{Node, Object, RequestContext};
use tracing::{debug, info};

use crate::error::{StoreError, StoreResult};
use crate::traits::{ObjectStore, StoreFactory};

/// Content type recorded when a caller supplies none.
const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Connection settings shared by every S3 adapter.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct S3Config {
    /// Signing region. MinIO accepts any value.
    pub region: String,
    /// Use `https://` instead of `http://` for endpoints.
    pub secure: bool,
    pub connect_timeout_secs: u64,
    /// Maximum wait for response data once connected.
    pub read_timeout_secs: u64,
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            region: "us-east-1".into(),
            secure: false,
            connect_timeout_secs: 5,
            read_timeout_secs: 5,
        }
    }
}

/// Object store adapter for one S3-compatible endpoint.
///
/// Objects live in a single bucket, created by [`ObjectStore::init`] when
/// missing. Requests use path-style addressing and static credentials; the
/// SDK's own retries are disabled.
pub struct S3ObjectStore {
    client: Client,
    endpoint: String,
    bucket: String,
}

impl S3ObjectStore {
    pub fn new(
        endpoint: &str,
        access_key: &str,
        secret_key: &str,
        bucket: &str,
        config: &S3Config,
    ) -> StoreResult<Self> {
        if endpoint.is_empty() {
            return Err(StoreError::InvalidArgument("S3 endpoint is empty".into()));
        }
        if bucket.is_empty() {
            return Err(StoreError::InvalidArgument("bucket name is empty".into()));
        }
        debug!(endpoint, bucket, "creating S3 object store");

        let scheme = if config.secure { "https" } else { "http" };
        let credentials = Credentials::new(access_key, secret_key, None, None, "shardline-static");
        let timeouts = TimeoutConfig::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .read_timeout(Duration::from_secs(config.read_timeout_secs))
            .build();
        let sdk_config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .endpoint_url(format!("{scheme}://{endpoint}"))
            .credentials_provider(credentials)
            .force_path_style(true)
            .retry_config(RetryConfig::disabled())
            .timeout_config(timeouts)
            .build();

        Ok(Self {
            client: Client::from_conf(sdk_config),
            endpoint: endpoint.to_string(),
            bucket: bucket.to_string(),
        })
    }

    /// Build an adapter for a discovered node.
    pub fn for_node(node: &Node, bucket: &str, config: &S3Config) -> StoreResult<Self> {
        Self::new(
            &node.endpoint,
            &node.access_key,
            &node.secret_key,
            bucket,
            config,
        )
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    fn unavailable(&self, what: &str, err: impl StdError + 'static) -> StoreError {
        StoreError::BackendUnavailable {
            endpoint: self.endpoint.clone(),
            reason: format!("{what}: {}", DisplayErrorContext(err)),
        }
    }

    fn io(&self, id: &str, what: &str, err: impl StdError + 'static) -> StoreError {
        StoreError::Io {
            endpoint: self.endpoint.clone(),
            id: id.to_string(),
            reason: format!("{what}: {}", DisplayErrorContext(err)),
        }
    }
}

/// Whether the backend answered with HTTP 404. Only meaningful for
/// head-bucket, whose error responses carry no body to read a code from.
fn is_http_not_found<E>(err: &SdkError<E>) -> bool {
    err.raw_response()
        .is_some_and(|response| response.status().as_u16() == 404)
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn init(&self, ctx: &RequestContext) -> StoreResult<()> {
        let head = ctx
            .run(self.client.head_bucket().bucket(&self.bucket).send())
            .await?;
        match head {
            Ok(_) => return Ok(()),
            Err(err)
                if is_http_not_found(&err)
                    || err.as_service_error().is_some_and(|e| e.is_not_found()) => {}
            Err(err) => return Err(self.unavailable("unable to check bucket", err)),
        }

        let created = ctx
            .run(self.client.create_bucket().bucket(&self.bucket).send())
            .await?;
        match created {
            Ok(_) => {
                info!(endpoint = %self.endpoint, bucket = %self.bucket, "created bucket");
                Ok(())
            }
            // Another gateway won the race; the bucket is ours either way.
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(|e| e.is_bucket_already_owned_by_you()) =>
            {
                Ok(())
            }
            Err(err) => Err(self.unavailable("unable to create bucket", err)),
        }
    }

    async fn put(&self, ctx: &RequestContext, object: &Object) -> StoreResult<()> {
        if object.id.is_empty() {
            return Err(StoreError::InvalidArgument("object is empty".into()));
        }
        let content_type = if object.content_type.is_empty() {
            DEFAULT_CONTENT_TYPE
        } else {
            object.content_type.as_str()
        };
        let request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(&object.id)
            .content_type(content_type)
            .content_length(object.content.len() as i64)
            .body(ByteStream::from(object.content.clone()))
            .send();

        ctx.run(request)
            .await?
            .map_err(|err| self.io(&object.id, "error put object", err))?;
        Ok(())
    }

    async fn get(&self, ctx: &RequestContext, id: &str) -> StoreResult<Option<Object>> {
        let request = self.client.get_object().bucket(&self.bucket).key(id).send();
        let output = match ctx.run(request).await? {
            Ok(output) => output,
            // A missing bucket also answers 404 but is a broken node, not a
            // missing object.
            Err(err) if err.as_service_error().is_some_and(|e| e.is_no_such_key()) => {
                return Ok(None);
            }
            Err(err) => return Err(self.io(id, "error get object", err)),
        };

        let content_type = output.content_type().unwrap_or_default().to_string();
        let body = ctx
            .run(output.body.collect())
            .await?
            .map_err(|err| self.io(id, "unable to read body", err))?;

        Ok(Some(Object {
            id: id.to_string(),
            content_type,
            content: body.into_bytes(),
        }))
    }
}

impl std::fmt::Debug for S3ObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3ObjectStore")
            .field("endpoint", &self.endpoint)
            .field("bucket", &self.bucket)
            .finish()
    }
}

/// Creates an [`S3ObjectStore`] per node, all sharing one bucket name.
#[derive(Clone, Debug)]
pub struct S3StoreFactory {
    bucket: String,
    config: S3Config,
}

impl S3StoreFactory {
    pub fn new(bucket: impl Into<String>, config: S3Config) -> Self {
        Self {
            bucket: bucket.into(),
            config,
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

impl StoreFactory for S3StoreFactory {
    fn create(&self, node: &Node) -> StoreResult<Arc<dyn ObjectStore>> {
        Ok(Arc::new(S3ObjectStore::for_node(
            node,
            &self.bucket,
            &self.config,
        )?))
    }
}
