//! Backblaze B2 destination over its S3-compatible API.

use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::config::retry::RetryConfig;
use aws_sdk_s3::config::timeout::TimeoutConfig;
use aws_sdk_s3::config::{
    BehaviorVersion, Credentials, Region, RequestChecksumCalculation, ResponseChecksumValidation,
};
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_sdk_s3::primitives::ByteStream;
use bytes::{Bytes, BytesMut};
use tracing::{debug, info};
use url::Url;

use crate::domain::entities::MediaKind;
use crate::domain::errors::{DestinationError, validate_object_name};
use crate::domain::ports::Destination;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Uploads carry whole media files, so the budget matches the asset fetcher.
const OPERATION_TIMEOUT: Duration = Duration::from_secs(300);

/// Connection settings parsed from a `b2://` configuration URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct B2Config {
    key_id: String,
    app_key: String,
    bucket: String,
    region: String,
    endpoint: String,
}

impl B2Config {
    /// Parses `b2://<keyId>:<appKey>@<bucket>?region=<region>[&endpoint=<url>]`.
    ///
    /// Credentials are percent-decoded. The endpoint defaults to
    /// `https://s3.<region>.backblazeb2.com`.
    ///
    /// # Errors
    /// Returns `DestinationError::Config` for missing parts or undecodable credentials.
    pub fn from_url(config: &Url) -> Result<Self, DestinationError> {
        let decode = |value: &str, part: &str| {
            urlencoding::decode(value)
                .map(std::borrow::Cow::into_owned)
                .map_err(|e| DestinationError::config(format!("b2 {part} is not valid utf-8: {e}")))
        };
        let key_id = decode(config.username(), "key id")?;
        let app_key = decode(config.password().unwrap_or_default(), "application key")?;
        let bucket = config.host_str().unwrap_or_default().to_string();
        if key_id.is_empty() || app_key.is_empty() || bucket.is_empty() {
            return Err(DestinationError::config(
                "b2 destination needs b2://<keyId>:<appKey>@<bucket>?region=<region>",
            ));
        }

        let param = |name: &str| {
            config
                .query_pairs()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let region = param("region")
            .ok_or_else(|| DestinationError::config("b2 destination needs ?region=<region>"))?;
        let endpoint = param("endpoint")
            .unwrap_or_else(|| format!("https://s3.{region}.backblazeb2.com"));

        Ok(Self {
            key_id,
            app_key,
            bucket,
            region,
            endpoint,
        })
    }

    fn client(&self) -> Client {
        let credentials = Credentials::new(&self.key_id, &self.app_key, None, None, "b2-config-url");
        let config = aws_sdk_s3::config::Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(self.region.clone()))
            .endpoint_url(&self.endpoint)
            .credentials_provider(credentials)
            .force_path_style(true)
            .retry_config(RetryConfig::disabled())
            .timeout_config(
                TimeoutConfig::builder()
                    .connect_timeout(CONNECT_TIMEOUT)
                    .operation_timeout(OPERATION_TIMEOUT)
                    .build(),
            )
            .request_checksum_calculation(RequestChecksumCalculation::WhenRequired)
            .response_checksum_validation(ResponseChecksumValidation::WhenRequired)
            .build();
        Client::from_conf(config)
    }
}

/// Objects in a B2 bucket.
pub struct B2Destination {
    client: Client,
    bucket: String,
    max_object_size: u64,
}

impl B2Destination {
    /// Builds a client for the bucket and checks that it is reachable.
    ///
    /// # Errors
    /// Returns `DestinationError::Config` if the bucket or credentials are rejected.
    pub async fn connect(config: &B2Config, max_object_size: u64) -> Result<Self, DestinationError> {
        let client = config.client();

        client
            .head_bucket()
            .bucket(&config.bucket)
            .send()
            .await
            .map_err(|e| match sdk_error(&config.bucket, &e) {
                network @ DestinationError::Network { .. } => network,
                other => DestinationError::config(format!(
                    "b2 bucket {:?} is not accessible: {other}",
                    config.bucket
                )),
            })?;

        info!(bucket = %config.bucket, endpoint = %config.endpoint, "Connected to B2");
        Ok(Self {
            client,
            bucket: config.bucket.clone(),
            max_object_size,
        })
    }

    /// Connects using the credentials and bucket in a configuration URL.
    ///
    /// # Errors
    /// Returns `DestinationError::Config` for incomplete URLs, or any connection error.
    pub async fn from_config(config: &Url, max_object_size: u64) -> Result<Self, DestinationError> {
        Self::connect(&B2Config::from_url(config)?, max_object_size).await
    }
}

fn response_status<E>(error: &SdkError<E, HttpResponse>) -> Option<u16> {
    error.raw_response().map(|response| response.status().as_u16())
}

fn sdk_error<E>(name: &str, error: &SdkError<E, HttpResponse>) -> DestinationError
where
    E: std::error::Error + 'static,
{
    match error {
        SdkError::DispatchFailure(_) | SdkError::TimeoutError(_) => {
            DestinationError::network(DisplayErrorContext(error).to_string())
        }
        _ => match response_status(error) {
            Some(status) => DestinationError::UnexpectedStatus {
                status,
                name: name.to_string(),
            },
            None => DestinationError::storage(DisplayErrorContext(error).to_string()),
        },
    }
}

fn is_missing(error: &SdkError<GetObjectError, HttpResponse>) -> bool {
    error.as_service_error().is_some_and(GetObjectError::is_no_such_key)
        || response_status(error) == Some(404)
}

/// Content type recorded on upload, derived from the object name.
fn content_type_for(name: &str) -> Result<&'static str, DestinationError> {
    let ext = std::path::Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .ok_or_else(|| DestinationError::invalid_name(name, "b2 uploads need a file extension"))?;
    if ext.eq_ignore_ascii_case("json") {
        return Ok("application/json");
    }
    MediaKind::from_extension(ext)
        .map(MediaKind::mime_type)
        .ok_or_else(|| DestinationError::invalid_name(name, format!("no content type for .{ext}")))
}

impl std::fmt::Display for B2Destination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "b2 {:?} bucket", self.bucket)
    }
}

#[async_trait]
impl Destination for B2Destination {
    async fn upload(&self, name: &str, content: Bytes) -> Result<(), DestinationError> {
        validate_object_name(name)?;
        let content_type = content_type_for(name)?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(name)
            .content_type(content_type)
            .body(ByteStream::from(content))
            .send()
            .await
            .map_err(|e| sdk_error(name, &e))?;

        debug!(name, content_type, "Uploaded to B2");
        Ok(())
    }

    async fn download(&self, name: &str) -> Result<Bytes, DestinationError> {
        validate_object_name(name)?;

        let output = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(name)
            .send()
            .await
        {
            Ok(output) => output,
            Err(e) if is_missing(&e) => return Err(DestinationError::not_found(name)),
            Err(e) => return Err(sdk_error(name, &e)),
        };

        let too_large = |size: u64| DestinationError::TooLarge {
            name: name.to_string(),
            size,
            limit: self.max_object_size,
        };
        if let Some(size) = output.content_length().and_then(|len| u64::try_from(len).ok())
            && size > self.max_object_size
        {
            return Err(too_large(size));
        }

        let mut stream = output.body;
        let mut body = BytesMut::new();
        while let Some(chunk) = stream
            .try_next()
            .await
            .map_err(|e| DestinationError::network(DisplayErrorContext(&e).to_string()))?
        {
            let size = (body.len() + chunk.len()) as u64;
            if size > self.max_object_size {
                return Err(too_large(size));
            }
            body.extend_from_slice(&chunk);
        }

        Ok(body.freeze())
    }
}
