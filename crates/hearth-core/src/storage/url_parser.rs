//! URL parsing for storage backends.
//!
//! Extracts backend configuration from S3, local filesystem and in-memory URLs.

use object_store::path::Path;
use regex::Regex;
use std::sync::OnceLock;

use crate::error::{InvalidUrlSnafu, StorageError};

use super::{LocalConfig, S3Config};

// URL patterns for different storage backends
const S3_PATH: &str =
    r"^https://s3\.(?P<region>[\w\-]+)\.amazonaws\.com/(?P<bucket>[a-z0-9\-\.]+)(/(?P<key>.+))?$";
const S3_VIRTUAL: &str =
    r"^https://(?P<bucket>[a-z0-9\-\.]+)\.s3\.(?P<region>[\w\-]+)\.amazonaws\.com(/(?P<key>.+))?$";
const S3_URL: &str = r"^[sS]3[aA]?://(?P<bucket>[a-z0-9\-\.]+)(/(?P<key>.+))?$";
const S3_ENDPOINT_URL: &str = r"^[sS]3[aA]?::(?<protocol>https?)://(?P<endpoint>[^:/]+):(?<port>\d+)/(?P<bucket>[a-z0-9\-\.]+)(/(?P<key>.+))?$";

const FILE_URI: &str = r"^file://(?P<path>.*)$";
const FILE_PATH: &str = r"^/(?P<path>.*)$";

const MEMORY_URL: &str = r"^memory://(?P<key>.*)$";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Backend {
    S3,
    Local,
    Memory,
}

/// Matchers are tried in order; the first backend with a matching pattern wins.
fn matchers() -> &'static [(Backend, Vec<Regex>)] {
    static MATCHERS: OnceLock<Vec<(Backend, Vec<Regex>)>> = OnceLock::new();
    MATCHERS.get_or_init(|| {
        let compile = |patterns: &[&str]| -> Vec<Regex> {
            patterns
                .iter()
                .map(|p| Regex::new(p).expect("storage URL pattern must compile"))
                .collect()
        };

        vec![
            (
                Backend::S3,
                compile(&[S3_PATH, S3_VIRTUAL, S3_ENDPOINT_URL, S3_URL]),
            ),
            (Backend::Memory, compile(&[MEMORY_URL])),
            (Backend::Local, compile(&[FILE_URI, FILE_PATH])),
        ]
    })
}

/// Backend configuration enum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendConfig {
    S3(S3Config),
    Local(LocalConfig),
    Memory { key: Option<Path> },
}

impl BackendConfig {
    /// Parse a URL into a backend configuration.
    pub fn parse_url(url: &str) -> Result<Self, StorageError> {
        for (backend, patterns) in matchers() {
            if let Some(matches) = patterns.iter().find_map(|r| r.captures(url)) {
                return Ok(match backend {
                    Backend::S3 => Self::parse_s3(&matches),
                    Backend::Local => Self::parse_local(&matches),
                    Backend::Memory => BackendConfig::Memory {
                        key: non_empty_key(matches.name("key").map(|m| m.as_str())),
                    },
                });
            }
        }

        InvalidUrlSnafu {
            url: url.to_string(),
        }
        .fail()
    }

    fn parse_s3(matches: &regex::Captures) -> Self {
        let bucket = matches
            .name("bucket")
            .map(|m| m.as_str().to_string())
            .unwrap_or_default();

        let region = matches.name("region").map(|m| m.as_str().to_string());

        let endpoint = matches.name("endpoint").map(|endpoint| {
            let port = matches
                .name("port")
                .and_then(|p| p.as_str().parse::<u16>().ok())
                .unwrap_or(443);
            let protocol = matches
                .name("protocol")
                .map(|p| p.as_str())
                .unwrap_or("https");
            format!("{protocol}://{}:{port}", endpoint.as_str())
        });

        let key = non_empty_key(matches.name("key").map(|m| m.as_str()));

        BackendConfig::S3(S3Config {
            endpoint,
            region,
            bucket,
            key,
        })
    }

    fn parse_local(matches: &regex::Captures) -> Self {
        let path = matches.name("path").map(|m| m.as_str()).unwrap_or_default();
        let path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{path}")
        };

        BackendConfig::Local(LocalConfig {
            path: path.trim_end_matches('/').to_string(),
        })
    }

    /// Key prefix inside the bucket (object stores only).
    pub fn key(&self) -> Option<&Path> {
        match self {
            BackendConfig::S3(config) => config.key.as_ref(),
            BackendConfig::Memory { key } => key.as_ref(),
            BackendConfig::Local(_) => None,
        }
    }
}

fn non_empty_key(key: Option<&str>) -> Option<Path> {
    key.map(|k| k.trim_matches('/'))
        .filter(|k| !k.is_empty())
        .map(Path::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_s3_url_with_key() {
        let config = BackendConfig::parse_url("s3://listings-raw/exports").unwrap();
        let BackendConfig::S3(s3) = config else {
            panic!("expected S3 backend");
        };
        assert_eq!(s3.bucket, "listings-raw");
        assert_eq!(s3.key, Some(Path::from("exports")));
        assert_eq!(s3.endpoint, None);
    }

    #[test]
    fn test_s3_path_style_region() {
        let config =
            BackendConfig::parse_url("https://s3.us-east-1.amazonaws.com/listings-raw").unwrap();
        let BackendConfig::S3(s3) = config else {
            panic!("expected S3 backend");
        };
        assert_eq!(s3.region.as_deref(), Some("us-east-1"));
        assert_eq!(s3.key, None);
    }

    #[test]
    fn test_s3_custom_endpoint() {
        let config = BackendConfig::parse_url("s3::http://localhost:9000/bucket/raw").unwrap();
        let BackendConfig::S3(s3) = config else {
            panic!("expected S3 backend");
        };
        assert_eq!(s3.endpoint.as_deref(), Some("http://localhost:9000"));
        assert_eq!(s3.bucket, "bucket");
        assert_eq!(s3.key, Some(Path::from("raw")));
    }

    #[test]
    fn test_local_paths() {
        assert_eq!(
            BackendConfig::parse_url("file:///tmp/hearth/").unwrap(),
            BackendConfig::Local(LocalConfig {
                path: "/tmp/hearth".to_string()
            })
        );
        assert_eq!(
            BackendConfig::parse_url("/var/data").unwrap(),
            BackendConfig::Local(LocalConfig {
                path: "/var/data".to_string()
            })
        );
    }

    #[test]
    fn test_memory_url() {
        assert_eq!(
            BackendConfig::parse_url("memory://").unwrap(),
            BackendConfig::Memory { key: None }
        );
        assert_eq!(
            BackendConfig::parse_url("memory://raw/").unwrap().key(),
            Some(&Path::from("raw"))
        );
    }

    #[test]
    fn test_invalid_url() {
        let err = BackendConfig::parse_url("ftp://example.com/data").unwrap_err();
        assert!(matches!(err, StorageError::InvalidUrl { .. }));
    }
}
