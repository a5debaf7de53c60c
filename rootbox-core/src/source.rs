//! Source archive handles.
//!
//! A source is an opaque URI plus the display name shown to the user. Reading
//! the bytes (and looking up a friendly name) is delegated to a
//! [`ContentResolver`], so callers can plug in whatever content provider they
//! have; [`FileResolver`] covers plain `file://` URIs.

use anyhow::{anyhow, Context, Result};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use url::Url;

pub trait ContentResolver: Send + Sync {
    fn open(&self, uri: &Url) -> io::Result<Box<dyn Read + Send>>;

    /// Name from provider metadata, when the provider has one.
    fn display_name(&self, uri: &Url) -> Option<String>;
}

/// Resolver for local files. Plain files carry no name metadata.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileResolver;

impl ContentResolver for FileResolver {
    fn open(&self, uri: &Url) -> io::Result<Box<dyn Read + Send>> {
        if uri.scheme() != "file" {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                format!("unsupported scheme: {}", uri.scheme()),
            ));
        }
        let path = uri.to_file_path().map_err(|_| {
            io::Error::new(io::ErrorKind::InvalidInput, format!("not a local path: {}", uri))
        })?;
        Ok(Box::new(File::open(path)?))
    }

    fn display_name(&self, _uri: &Url) -> Option<String> {
        None
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceHandle {
    uri: Url,
    name: String,
}

impl SourceHandle {
    /// Ask the resolver for a name, falling back to the last path segment.
    pub fn resolve(uri: Url, resolver: &dyn ContentResolver) -> Self {
        let name = resolver
            .display_name(&uri)
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| trailing_segment(&uri));
        Self { uri, name }
    }

    pub fn with_name(uri: Url, name: impl Into<String>) -> Self {
        Self {
            uri,
            name: name.into(),
        }
    }

    pub fn uri(&self) -> &Url {
        &self.uri
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Path component of the URI, shown in manual-install guidance.
    pub fn path(&self) -> &str {
        self.uri.path()
    }
}

fn trailing_segment(uri: &Url) -> String {
    let path = uri.path();
    path.rsplit('/').next().unwrap_or(path).to_string()
}

/// Turn CLI input into a URI: anything with a scheme is taken as-is,
/// everything else is a local path.
pub fn to_uri(input: &str) -> Result<Url> {
    if let Ok(uri) = Url::parse(input) {
        // Single-letter "schemes" are Windows drive letters, not URIs.
        if uri.scheme().len() > 1 {
            return Ok(uri);
        }
    }
    let path = Path::new(input);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .context("failed to resolve current directory")?
            .join(path)
    };
    Url::from_file_path(&absolute).map_err(|_| anyhow!("invalid path: {}", absolute.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NamedResolver(Option<&'static str>);

    impl ContentResolver for NamedResolver {
        fn open(&self, _uri: &Url) -> io::Result<Box<dyn Read + Send>> {
            Ok(Box::new(io::empty()))
        }

        fn display_name(&self, _uri: &Url) -> Option<String> {
            self.0.map(str::to_string)
        }
    }

    #[test]
    fn metadata_name_wins() {
        let uri = Url::parse("content://downloads/document/1234").unwrap();
        let handle = SourceHandle::resolve(uri, &NamedResolver(Some("module.zip")));
        assert_eq!(handle.name(), "module.zip");
    }

    #[test]
    fn falls_back_to_trailing_segment() {
        let uri = Url::parse("content://downloads/sdcard/Download/update.zip").unwrap();
        let handle = SourceHandle::resolve(uri, &NamedResolver(None));
        assert_eq!(handle.name(), "update.zip");
        assert_eq!(handle.path(), "/sdcard/Download/update.zip");
    }

    #[test]
    fn explicit_name_skips_resolution() {
        let uri = Url::parse("file:///sdcard/a.zip").unwrap();
        let handle = SourceHandle::with_name(uri, "Custom Name");
        assert_eq!(handle.name(), "Custom Name");
    }

    #[test]
    fn to_uri_accepts_paths_and_uris() {
        assert_eq!(
            to_uri("/sdcard/Download/x.zip").unwrap().as_str(),
            "file:///sdcard/Download/x.zip"
        );
        assert_eq!(
            to_uri("content://media/external/file/9").unwrap().scheme(),
            "content"
        );
    }

    #[test]
    fn file_resolver_reports_missing_files_as_not_found() {
        let uri = Url::parse("file:///definitely/not/here.zip").unwrap();
        let err = FileResolver.open(&uri).err().unwrap();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
