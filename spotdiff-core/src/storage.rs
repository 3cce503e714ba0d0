//! Where generated levels end up: a local directory or an S3-compatible
//! bucket. Keys are `/`-separated and relative to the store root.

use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::config::StorageConfig;
use crate::{LevelError, Result};

pub trait LevelStore {
    fn put(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<()>;

    /// `Ok(None)` when the key does not exist.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// URL the game frontend should use for `key`.
    fn public_url(&self, key: &str) -> String;

    fn describe(&self) -> String;
}

pub(crate) fn join_public_url(base: &str, key: &str) -> String {
    let base = base.trim_end_matches('/');
    if base.is_empty() {
        key.to_string()
    } else {
        format!("{base}/{key}")
    }
}

pub struct LocalStore {
    root: PathBuf,
    public_base: String,
}

impl LocalStore {
    pub fn new(root: &Path, public_base: impl Into<String>) -> Self {
        Self {
            root: root.to_path_buf(),
            public_base: public_base.into(),
        }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let mut path = self.root.clone();
        for part in key.split('/') {
            if !part.is_empty() {
                path.push(part);
            }
        }
        path
    }
}

impl LevelStore for LocalStore {
    fn put(&self, key: &str, bytes: &[u8], _content_type: &str) -> Result<()> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, bytes)?;
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match fs::read(self.path_for(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn public_url(&self, key: &str) -> String {
        join_public_url(&self.public_base, key)
    }

    fn describe(&self) -> String {
        format!("local directory {}", self.root.display())
    }
}

/// S3-compatible bucket. The SDK is async; each call blocks on a private
/// current-thread runtime so callers stay synchronous.
pub struct S3Store {
    client: aws_sdk_s3::Client,
    bucket: String,
    endpoint_url: String,
    public_base: String,
    runtime: tokio::runtime::Runtime,
}

impl S3Store {
    pub fn new(config: &StorageConfig, public_base: impl Into<String>) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        let credentials = Credentials::new(
            config.access_key_id.clone(),
            config.secret_access_key.clone(),
            None,
            None,
            "spotdiff-env",
        );
        let sdk_config = aws_sdk_s3::config::Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .endpoint_url(&config.endpoint_url)
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        Ok(Self {
            client: aws_sdk_s3::Client::from_conf(sdk_config),
            bucket: config.bucket.clone(),
            endpoint_url: config.endpoint_url.clone(),
            public_base: public_base.into(),
            runtime,
        })
    }
}

impl LevelStore for S3Store {
    fn put(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<()> {
        let request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(bytes.to_vec()))
            .send();
        self.runtime.block_on(request).map_err(|e| {
            LevelError::Storage(format!(
                "upload of {key} to bucket {} failed: {}",
                self.bucket,
                DisplayErrorContext(&e)
            ))
        })?;
        log::debug!("uploaded {key} ({} bytes)", bytes.len());
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.runtime.block_on(async {
            let output = match self
                .client
                .get_object()
                .bucket(&self.bucket)
                .key(key)
                .send()
                .await
            {
                Ok(output) => output,
                Err(e) => {
                    if e.as_service_error().is_some_and(|se| se.is_no_such_key()) {
                        return Ok(None);
                    }
                    return Err(LevelError::Storage(format!(
                        "download of {key} from bucket {} failed: {}",
                        self.bucket,
                        DisplayErrorContext(&e)
                    )));
                }
            };
            match output.body.collect().await {
                Ok(data) => Ok(Some(data.into_bytes().to_vec())),
                Err(e) => Err(LevelError::Storage(format!(
                    "reading {key} from bucket {} failed: {e}",
                    self.bucket
                ))),
            }
        })
    }

    fn public_url(&self, key: &str) -> String {
        join_public_url(&self.public_base, key)
    }

    fn describe(&self) -> String {
        format!("bucket {} at {}", self.bucket, self.endpoint_url)
    }
}
