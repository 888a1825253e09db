//! Byte-source collaborator: resolves a table URL to a local file path.
//!
//! `file` URLs open directly. Remote URLs download once into a process-wide
//! temp cache keyed by the URL's SHA-256, so the second pass of a table
//! re-reads the cached copy instead of fetching again. The cache directory is
//! removed when the process exits.

use std::path::PathBuf;
use std::sync::OnceLock;

use anyhow::{Context, Result, anyhow, bail};
use log::debug;
use sha2::{Digest, Sha256};
use tempfile::TempDir;
use url::Url;

pub trait ByteSource: Sync {
    /// Resolves `url` to a readable local path. Called at most twice per
    /// table URL (once per pass); implementations cache accordingly.
    fn fetch(&self, url: &Url) -> Result<PathBuf>;
}

static CACHE_DIR: OnceLock<TempDir> = OnceLock::new();

fn cache_dir() -> Result<&'static std::path::Path> {
    if CACHE_DIR.get().is_none() {
        let dir = tempfile::Builder::new()
            .prefix("csvw-validate-")
            .tempdir()
            .context("Creating download cache directory")?;
        // A racing initialiser wins harmlessly; the loser is cleaned up now.
        let _ = CACHE_DIR.set(dir);
    }
    CACHE_DIR
        .get()
        .map(|dir| dir.path())
        .ok_or_else(|| anyhow!("download cache unavailable"))
}

/// Default byte source: local filesystem plus blocking HTTP.
#[derive(Debug, Default)]
pub struct DefaultByteSource;

impl ByteSource for DefaultByteSource {
    fn fetch(&self, url: &Url) -> Result<PathBuf> {
        match url.scheme() {
            "file" => {
                let path = url
                    .to_file_path()
                    .map_err(|_| anyhow!("'{url}' is not a usable file URL"))?;
                if !path.is_file() {
                    bail!("No such file: {path:?}");
                }
                Ok(path)
            }
            "http" | "https" => {
                let cached = cache_dir()?.join(format!("{}.csv", url_digest(url)));
                if cached.is_file() {
                    debug!("Cache hit for {url}");
                    return Ok(cached);
                }
                debug!("Downloading {url}");
                let response = reqwest::blocking::get(url.clone())
                    .with_context(|| format!("Requesting {url}"))?
                    .error_for_status()
                    .with_context(|| format!("Fetching {url}"))?;
                let bytes = response
                    .bytes()
                    .with_context(|| format!("Reading response body of {url}"))?;
                std::fs::write(&cached, &bytes)
                    .with_context(|| format!("Caching {url} at {cached:?}"))?;
                Ok(cached)
            }
            other => bail!("Unsupported URL scheme '{other}' for {url}"),
        }
    }
}

fn url_digest(url: &Url) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.as_str().as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Interprets a CLI argument as a URL, treating anything without a scheme as
/// a filesystem path relative to the working directory.
pub fn url_from_arg(arg: &str) -> Result<Url> {
    match Url::parse(arg) {
        Ok(url) => Ok(url),
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            let path = std::path::Path::new(arg);
            let absolute = if path.is_absolute() {
                path.to_path_buf()
            } else {
                std::env::current_dir()
                    .context("Resolving the working directory")?
                    .join(path)
            };
            Url::from_file_path(&absolute)
                .map_err(|_| anyhow!("Cannot express {absolute:?} as a file URL"))
        }
        Err(err) => Err(anyhow!("Invalid URL '{arg}': {err}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_digest_is_stable_per_url() {
        let a = Url::parse("http://example.com/data.csv").unwrap();
        let b = Url::parse("http://example.com/data.csv").unwrap();
        let c = Url::parse("http://example.com/other.csv").unwrap();
        assert_eq!(url_digest(&a), url_digest(&b));
        assert_ne!(url_digest(&a), url_digest(&c));
    }

    #[test]
    fn plain_paths_become_file_urls() {
        let url = url_from_arg("/tmp/data.csv").unwrap();
        assert_eq!(url.scheme(), "file");
        assert!(url.path().ends_with("/tmp/data.csv"));
        let relative = url_from_arg("data/things.csv").unwrap();
        assert_eq!(relative.scheme(), "file");
        assert!(relative.path().ends_with("/data/things.csv"));
    }

    #[test]
    fn missing_file_is_an_error() {
        let url = Url::parse("file:///definitely/not/here.csv").unwrap();
        assert!(DefaultByteSource.fetch(&url).is_err());
    }
}
