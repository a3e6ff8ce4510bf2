//! Response types shared by the routes.

use bucketview_archive::error::{Error as ArchiveError, ErrorKind as ArchiveErrorKind};
use bucketview_archive::{ArchiveEvent, CompletedArchive};
use bucketview_storage::error::{Error as StorageError, ErrorKind as StorageErrorKind};
use exn::Frame;
use rocket::http::{ContentType, RawStr};
use rocket::response::{self, Responder, Response};
use rocket::Request;
use serde::Serialize;
use std::io::Cursor;
use std::sync::Arc;

/// A downloadable file, sent with a `Content-Disposition: attachment` header.
pub struct Attachment {
    file_name: String,
    content_type: ContentType,
    data: Arc<[u8]>,
}
impl Attachment {
    pub fn new(file_name: impl Into<String>, content_type: ContentType, data: impl Into<Arc<[u8]>>) -> Self {
        Self { file_name: file_name.into(), content_type, data: data.into() }
    }

    pub fn zip(archive: CompletedArchive) -> Self {
        Self::new(archive.file_name(), ContentType::ZIP, archive.data)
    }

    /// `attachment` disposition with an ASCII fallback name and the exact
    /// name in RFC 5987 form.
    fn disposition(&self) -> String {
        let fallback: String = self
            .file_name
            .chars()
            .map(|c| match c {
                '"' | '\\' => '_',
                c if c.is_ascii() && !c.is_ascii_control() => c,
                _ => '_',
            })
            .collect();
        let encoded = RawStr::new(&self.file_name).percent_encode();
        format!("attachment; filename=\"{fallback}\"; filename*=UTF-8''{encoded}")
    }
}
impl<'r> Responder<'r, 'static> for Attachment {
    fn respond_to(self, _: &'r Request<'_>) -> response::Result<'static> {
        let disposition = self.disposition();
        Response::build()
            .header(self.content_type)
            .raw_header("Content-Disposition", disposition)
            .sized_body(self.data.len(), Cursor::new(self.data))
            .ok()
    }
}

/// Error responses; the body is the error message as plain text.
#[derive(Debug, rocket::Responder)]
pub enum ApiError {
    #[response(status = 400)]
    BadRequest(String),
    #[response(status = 404)]
    NotFound(String),
    #[response(status = 500)]
    Internal(String),
}
impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        tracing::error!(error = ?err, "Storage request failed");
        let kind: &StorageErrorKind = &err;
        match kind {
            StorageErrorKind::InvalidKey(_) => Self::BadRequest(describe(err.frame())),
            kind if kind.is_not_found() => Self::NotFound(describe(err.frame())),
            _ => Self::Internal(describe(err.frame())),
        }
    }
}
impl From<ArchiveError> for ApiError {
    fn from(err: ArchiveError) -> Self {
        let kind: &ArchiveErrorKind = &err;
        match kind.is_not_found() {
            true => {
                tracing::info!(reason = %kind, "Archive unavailable");
                Self::NotFound(describe(err.frame()))
            },
            false => {
                tracing::error!(error = ?err, "Archive request failed");
                Self::Internal(describe(err.frame()))
            },
        }
    }
}
impl From<crate::error::Error> for ApiError {
    fn from(err: crate::error::Error) -> Self {
        tracing::error!(error = ?err, "Request failed");
        Self::Internal(describe(err.frame()))
    }
}

/// An error's message followed by its causes, outermost first, e.g.
/// `could not list folder contents: storage unavailable: connection refused`.
fn describe(frame: &Frame) -> String {
    let mut message = frame.to_string();
    let mut frame = frame;
    while let Some(cause) = frame.children().first() {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        frame = cause;
    }
    message
}

/// One server-sent event of an archive progress stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProgressMessage {
    Progress { current: u64, total: u64 },
    Skipped { key: String },
    Complete { file_count: u64 },
    Cancelled,
    Error { message: String },
}
impl ProgressMessage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete { .. } | Self::Cancelled | Self::Error { .. })
    }
}
impl From<bucketview_archive::error::Result<ArchiveEvent>> for ProgressMessage {
    fn from(event: bucketview_archive::error::Result<ArchiveEvent>) -> Self {
        match event {
            Ok(ArchiveEvent::Progress { current, total }) => Self::Progress { current, total },
            Ok(ArchiveEvent::Skipped { key }) => Self::Skipped { key },
            Ok(ArchiveEvent::Complete { file_count }) => Self::Complete { file_count },
            Ok(ArchiveEvent::Cancelled) => Self::Cancelled,
            Err(err) => Self::Error { message: describe(err.frame()) },
        }
    }
}

/// Reply to a cancellation request.
#[derive(Debug, Serialize)]
pub struct CancelReply {
    pub status: &'static str,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("report.csv", "report.csv")]
    #[case("my file.txt", "my file.txt")]
    #[case("quote\".txt", "quote_.txt")]
    #[case("résumé.pdf", "r_sum_.pdf")]
    fn test_disposition_fallback(#[case] name: &str, #[case] fallback: &str) {
        let attachment = Attachment::new(name, ContentType::Binary, Vec::new());
        let disposition = attachment.disposition();
        assert!(disposition.starts_with(&format!("attachment; filename=\"{fallback}\"; filename*=UTF-8''")));
    }

    #[test]
    fn test_disposition_encodes_exact_name() {
        let attachment = Attachment::new("my file.txt", ContentType::Binary, Vec::new());
        assert!(attachment.disposition().ends_with("filename*=UTF-8''my%20file.txt"));
    }

    #[rstest]
    #[case(ProgressMessage::Progress { current: 1, total: 2 }, r#"{"status":"progress","current":1,"total":2}"#)]
    #[case(ProgressMessage::Complete { file_count: 2 }, r#"{"status":"complete","file_count":2}"#)]
    #[case(ProgressMessage::Cancelled, r#"{"status":"cancelled"}"#)]
    #[case(ProgressMessage::Error { message: "boom".into() }, r#"{"status":"error","message":"boom"}"#)]
    #[case(ProgressMessage::Skipped { key: "a/b".into() }, r#"{"status":"skipped","key":"a/b"}"#)]
    fn test_progress_message_shape(#[case] message: ProgressMessage, #[case] expected: &str) {
        assert_eq!(serde_json::to_string(&message).unwrap(), expected);
    }

    #[test]
    fn test_error_event_is_terminal() {
        let err = exn::Exn::from(ArchiveErrorKind::EmptyPrefix("a/".into()));
        let message = ProgressMessage::from(Err(err));
        assert!(message.is_terminal());
        assert_eq!(message, ProgressMessage::Error { message: "no files found in folder: a/".into() });
    }

    #[test]
    fn test_error_message_includes_cause() {
        let err = exn::Exn::new(StorageErrorKind::Network("connection refused".into())).raise(ArchiveErrorKind::Storage);
        let message = ProgressMessage::from(Err(err));
        assert_eq!(message, ProgressMessage::Error {
            message: "could not list folder contents: storage unavailable: connection refused".into()
        });
    }
}
