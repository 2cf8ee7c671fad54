//! Integration tests for objcat
//!
//! These tests require a running S3-compatible server.
//!
//! Run with:
//! ```bash
//! # Start a MinIO container
//! docker run -d --name minio -p 9000:9000 \
//!     -e MINIO_ROOT_USER=accesskey \
//!     -e MINIO_ROOT_PASSWORD=secretkey \
//!     minio/minio server /data
//!
//! # Run tests
//! TEST_S3_ENDPOINT=http://localhost:9000 \
//! TEST_S3_ACCESS_KEY=accesskey TEST_S3_SECRET_KEY=secretkey \
//!     cargo test --features integration
//! ```

#![cfg(feature = "integration")]

use std::path::Path;
use std::process::{Command, Output};

use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{BucketVersioningStatus, VersioningConfiguration};
use oc_core::{Config, ConfigManager, StorageConfig};
use oc_s3::S3Client;
use tempfile::TempDir;

/// Live service settings from the environment
fn get_test_config() -> Option<(String, String, String)> {
    let endpoint = std::env::var("TEST_S3_ENDPOINT").ok()?;
    let access_key = std::env::var("TEST_S3_ACCESS_KEY").ok()?;
    let secret_key = std::env::var("TEST_S3_SECRET_KEY").ok()?;
    Some((endpoint, access_key, secret_key))
}

fn uuid_suffix() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let duration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    format!("{:x}", duration.as_nanos() % 0xFFFFFFFF)
}

/// A fresh bucket plus a config directory pointing objcat at it
struct Fixture {
    runtime: tokio::runtime::Runtime,
    client: S3Client,
    config_dir: TempDir,
    bucket: String,
}

impl Fixture {
    fn new(name: &str) -> Option<Self> {
        let (endpoint, access_key, secret_key) = get_test_config()?;
        let storage = StorageConfig {
            access_key: Some(access_key),
            secret_key: Some(secret_key),
            bucket_lookup: "path".into(),
            ..Default::default()
        }
        .with_endpoint(endpoint)
        .ok()?;

        let config_dir = tempfile::tempdir().ok()?;
        let config = Config {
            storage: storage.clone(),
            ..Default::default()
        };
        ConfigManager::with_path(config_dir.path().join("config.toml"))
            .save(&config)
            .ok()?;

        let runtime = tokio::runtime::Runtime::new().ok()?;
        let client = runtime.block_on(S3Client::new(&storage)).ok()?;
        let bucket = format!("test-{name}-{}", uuid_suffix());
        if let Err(e) = runtime.block_on(client.inner().create_bucket().bucket(&bucket).send()) {
            eprintln!("Failed to create bucket: {e}");
            return None;
        }

        Some(Self {
            runtime,
            client,
            config_dir,
            bucket,
        })
    }

    /// Upload `data` under `key`, returning the version id if any
    fn put(&self, key: &str, data: impl Into<Vec<u8>>) -> Option<String> {
        let response = self
            .runtime
            .block_on(
                self.client
                    .inner()
                    .put_object()
                    .bucket(&self.bucket)
                    .key(key)
                    .body(ByteStream::from(data.into()))
                    .send(),
            )
            .expect("put_object failed");
        response.version_id().map(|v| v.to_string())
    }

    fn enable_versioning(&self) -> bool {
        let configuration = VersioningConfiguration::builder()
            .status(BucketVersioningStatus::Enabled)
            .build();
        self.runtime
            .block_on(
                self.client
                    .inner()
                    .put_bucket_versioning()
                    .bucket(&self.bucket)
                    .versioning_configuration(configuration)
                    .send(),
            )
            .is_ok()
    }

    fn url(&self, key: &str) -> String {
        format!("s3://{}/{}", self.bucket, key)
    }

    fn cat(&self, args: &[&str]) -> Output {
        run_objcat(args, self.config_dir.path())
    }
}

impl Drop for Fixture {
    fn drop(&mut self) {
        let inner = self.client.inner().clone();
        let bucket = self.bucket.clone();
        self.runtime.block_on(async move {
            if let Ok(versions) = inner.list_object_versions().bucket(&bucket).send().await {
                for version in versions.versions() {
                    let _ = inner
                        .delete_object()
                        .bucket(&bucket)
                        .key(version.key().unwrap_or_default())
                        .set_version_id(version.version_id().map(str::to_string))
                        .send()
                        .await;
                }
            }
            let _ = inner.delete_bucket().bucket(&bucket).send().await;
        });
    }
}

fn run_objcat(args: &[&str], config_dir: &Path) -> Output {
    Command::new(env!("CARGO_BIN_EXE_objcat"))
        .args(args)
        .env("OBJCAT_CONFIG_DIR", config_dir)
        .env_remove("OBJCAT_ENDPOINT_URL")
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute objcat")
}

macro_rules! fixture_or_skip {
    ($name:expr) => {
        match Fixture::new($name) {
            Some(fixture) => fixture,
            None => {
                eprintln!("Skipping: S3 test config not available");
                return;
            }
        }
    };
}

mod cat_operations {
    use super::*;

    #[test]
    fn test_cat_single_object() {
        let fixture = fixture_or_skip!("single");
        let mut records = String::new();
        for i in 0..16 {
            records.push_str(&format!("record-{i:02}\n"));
        }
        let records = &records.as_bytes()[..128];
        fixture.put("records.txt", records.to_vec());

        let output = fixture.cat(&["cat", &fixture.url("records.txt")]);
        assert!(
            output.status.success(),
            "Failed to cat: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        assert_eq!(output.stdout, records);
    }

    #[test]
    fn test_cat_prefix() {
        let fixture = fixture_or_skip!("prefix");
        fixture.put("dir/file3.txt", "content0");
        fixture.put("dir/file4.txt", "content1");

        let output = fixture.cat(&["cat", &fixture.url("dir/")]);
        assert!(output.status.success());
        assert_eq!(output.stdout, b"content0content1");
    }

    #[test]
    fn test_cat_bucket_root_is_one_level() {
        let fixture = fixture_or_skip!("root");
        fixture.put("file1.txt", "content0");
        fixture.put("file2.txt", "content1");
        fixture.put("dir/file3.txt", "content2");

        let output = fixture.cat(&["cat", &format!("s3://{}", fixture.bucket)]);
        assert!(output.status.success());
        assert_eq!(output.stdout, b"content0content1");
    }

    #[test]
    fn test_cat_pattern() {
        let fixture = fixture_or_skip!("pattern");
        fixture.put("dir/log-file-2024-01.txt", "contentA");
        fixture.put("dir/log-file-2024-02.txt", "contentB");
        fixture.put("dir/other.txt", "other");

        let output = fixture.cat(&["cat", &fixture.url("dir/log-file-2024-*")]);
        assert!(output.status.success());
        assert_eq!(output.stdout, b"contentAcontentB");
    }

    #[test]
    fn test_cat_parallel_parameters_do_not_change_output() {
        let fixture = fixture_or_skip!("parallel");
        let data: Vec<u8> = (0u32..4096).map(|i| (i * 31 % 251) as u8).collect();
        fixture.put("blob.bin", data.clone());

        for (part_size, concurrency) in [("1", "2"), ("7", "5"), ("1000", "1"), ("50MiB", "5")] {
            let output = fixture.cat(&[
                "cat",
                &fixture.url("blob.bin"),
                "--part-size",
                part_size,
                "--concurrency",
                concurrency,
            ]);
            assert!(output.status.success(), "part_size={part_size}");
            assert_eq!(output.stdout, data, "part_size={part_size} concurrency={concurrency}");
        }
    }
}

mod error_handling {
    use super::*;

    #[test]
    fn test_not_found_error() {
        let fixture = fixture_or_skip!("missing");
        let target = fixture.url("prefix/file.txt");

        let output = fixture.cat(&["cat", &target]);
        assert_eq!(output.status.code(), Some(1));
        let stderr = String::from_utf8_lossy(&output.stderr);
        let expected = format!("ERROR \"cat {target}\": ");
        assert!(stderr.starts_with(&expected), "{stderr}");
        assert!(stderr.trim_end().ends_with("not found"), "{stderr}");
    }

    #[test]
    fn test_no_match_versus_empty_prefix() {
        let fixture = fixture_or_skip!("nomatch");

        let output = fixture.cat(&["cat", &fixture.url("*.txt")]);
        assert_eq!(output.status.code(), Some(1));
        assert!(String::from_utf8_lossy(&output.stderr).contains("no object found"));

        let output = fixture.cat(&["cat", &format!("s3://{}/", fixture.bucket)]);
        assert_eq!(output.status.code(), Some(0));
        assert!(output.stdout.is_empty());
    }

    #[test]
    fn test_json_error_envelope() {
        let fixture = fixture_or_skip!("json");
        let target = fixture.url("absent.txt");

        let output = fixture.cat(&["cat", &target, "--json"]);
        assert_eq!(output.status.code(), Some(1));
        let value: serde_json::Value =
            serde_json::from_slice(&output.stderr).expect("stderr is one JSON object");
        assert_eq!(value["operation"], "cat");
        assert_eq!(value["command"], format!("cat {target}"));
        assert!(value["error"].as_str().unwrap().ends_with("not found"));
    }
}

mod version_operations {
    use super::*;

    #[test]
    fn test_cat_version_pinning() {
        let fixture = fixture_or_skip!("version");
        if !fixture.enable_versioning() {
            eprintln!("Skipping: versioning not supported");
            return;
        }

        let Some(first) = fixture.put("key.txt", "first write") else {
            eprintln!("Skipping: no version id returned");
            return;
        };
        fixture.put("key.txt", "second write");

        let url = fixture.url("key.txt");
        let output = fixture.cat(&["cat", &url]);
        assert_eq!(output.stdout, b"second write");

        let output = fixture.cat(&["cat", &url, "--version-id", &first]);
        assert!(output.status.success());
        assert_eq!(output.stdout, b"first write");

        fixture.put("key.txt", "third write");
        let output = fixture.cat(&["cat", &url, "--version-id", &first]);
        assert_eq!(output.stdout, b"first write");
    }
}
