//! Files to upload alongside outbound API calls.
//!
//! An [`InputFile`] is either a local body (bytes or an async reader) that an
//! upload encoder streams as multipart data, or a reference to a file the
//! platform already knows (a file id or URL). Only the latter can be encoded
//! inline as JSON.

use std::path::Path;

use serde::{Serialize, Serializer};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::{CoreError, CoreResult};

enum Body {
    Bytes(Vec<u8>),
    Reader(Box<dyn AsyncRead + Send + Unpin>),
    Address(String),
}

/// A file that should be uploaded to the platform.
///
/// # Example
///
/// ```rust,ignore
/// use courier_core::InputFile;
///
/// let report = InputFile::from_bytes("report.txt", b"all good".to_vec());
/// let photo = InputFile::open("cat.png").await?;
/// let known = InputFile::from_address("AgACAgIAAxkBAAIB");
/// ```
pub struct InputFile {
    name: String,
    body: Body,
}

impl InputFile {
    /// Creates an input file backed by an async reader.
    pub fn from_reader<R>(name: impl Into<String>, reader: R) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        Self {
            name: name.into(),
            body: Body::Reader(Box::new(reader)),
        }
    }

    /// Creates an input file from an in-memory buffer.
    pub fn from_bytes(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            body: Body::Bytes(bytes.into()),
        }
    }

    /// Opens a local file for upload.
    ///
    /// The name is the final component of `path`. The file handle is closed
    /// when the returned value (or its body) is dropped.
    pub async fn open(path: impl AsRef<Path>) -> CoreResult<Self> {
        let path = path.as_ref();
        let file = tokio::fs::File::open(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self::from_reader(name, file))
    }

    /// Refers to a file already stored by the platform (file id or URL).
    pub fn from_address(address: impl Into<String>) -> Self {
        Self {
            name: String::new(),
            body: Body::Address(address.into()),
        }
    }

    /// Returns this file with the name overridden.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Returns the file name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the remote address, if this file refers to one.
    pub fn address(&self) -> Option<&str> {
        match &self.body {
            Body::Address(addr) => Some(addr),
            _ => None,
        }
    }

    /// Returns `true` if the file must be sent as an upload.
    pub fn needs_upload(&self) -> bool {
        !matches!(self.body, Body::Address(_))
    }

    /// Reads the whole local body into memory.
    pub async fn into_bytes(self) -> CoreResult<Vec<u8>> {
        match self.body {
            Body::Bytes(bytes) => Ok(bytes),
            Body::Reader(mut reader) => {
                let mut buf = Vec::new();
                reader.read_to_end(&mut buf).await?;
                Ok(buf)
            }
            Body::Address(address) => Err(CoreError::RemoteFile { address }),
        }
    }
}

impl Serialize for InputFile {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match &self.body {
            Body::Address(addr) => serializer.serialize_str(addr),
            _ => Err(serde::ser::Error::custom(CoreError::MissingAddress)),
        }
    }
}

impl std::fmt::Debug for InputFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let body = match &self.body {
            Body::Bytes(b) => format!("bytes({})", b.len()),
            Body::Reader(_) => "reader".to_string(),
            Body::Address(a) => format!("address({a})"),
        };
        f.debug_struct("InputFile")
            .field("name", &self.name)
            .field("body", &body)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_serialize_address() {
        let file = InputFile::from_address("file-id-1");
        assert_eq!(serde_json::to_string(&file).unwrap(), "\"file-id-1\"");
        assert!(!file.needs_upload());
    }

    #[test]
    fn test_serialize_without_address_fails() {
        let file = InputFile::from_bytes("a.txt", b"x".to_vec());
        let err = assert_err!(serde_json::to_string(&file));
        assert!(err.to_string().contains("can't marshal InputFile without address"));
    }

    #[test]
    fn test_with_name_overrides() {
        let file = InputFile::from_bytes("a.txt", Vec::new()).with_name("b.txt");
        assert_eq!(file.name(), "b.txt");
    }

    #[tokio::test]
    async fn test_reader_body() {
        let file = InputFile::from_reader("r.bin", std::io::Cursor::new(vec![1u8, 2, 3]));
        assert!(file.needs_upload());
        assert_eq!(assert_ok!(file.into_bytes().await), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_open_local_file() {
        let path = std::env::temp_dir().join(format!("courier-input-{}.txt", std::process::id()));
        assert_ok!(tokio::fs::write(&path, b"hello").await);

        let file = assert_ok!(InputFile::open(&path).await);
        assert_eq!(Some(file.name()), path.file_name().and_then(|n| n.to_str()));
        assert_eq!(assert_ok!(file.into_bytes().await), b"hello".to_vec());

        let _ = tokio::fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn test_remote_file_has_no_body() {
        let file = InputFile::from_address("https://example.org/cat.png");
        assert!(matches!(
            file.into_bytes().await,
            Err(CoreError::RemoteFile { .. })
        ));
    }
}
