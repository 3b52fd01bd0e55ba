//! Client for the job creation endpoint.
//!
//! A job is started by uploading the student's answer sheet and the answer
//! key as one multipart request. The server replies with the job id that the
//! session manager then binds to. Requests are never retried.

use std::path::{Path, PathBuf};

use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};

pub const ASSESS_PATH: &str = "/api/assess";

const PDF_MIME: &str = "application/pdf";

#[derive(Debug, Error)]
pub enum JobError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{} is not a PDF file", .0.display())]
    NotPdf(PathBuf),
    /// Body text of the rejection, or `HTTP <status>` when it was empty.
    #[error("{message}")]
    Rejected {
        status: reqwest::StatusCode,
        message: String,
    },
}

/// One file to upload.
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes: bytes.into(),
        }
    }

    pub async fn from_path(path: &Path) -> Result<Self, JobError> {
        let is_pdf = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
        if !is_pdf {
            return Err(JobError::NotPdf(path.to_path_buf()));
        }
        let bytes = tokio::fs::read(path).await.map_err(|source| JobError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload.pdf".to_string());
        Ok(Self { file_name, bytes })
    }

    fn into_part(self) -> Result<Part, JobError> {
        Ok(Part::bytes(self.bytes)
            .file_name(self.file_name)
            .mime_str(PDF_MIME)?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct JobTicket {
    pub job_id: String,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Clone)]
pub struct JobClient {
    http: Client,
    base_url: String,
}

impl JobClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Uploads both files and returns the new job id.
    pub async fn start_assessment(
        &self,
        student: Upload,
        answer_key: Upload,
    ) -> Result<JobTicket, JobError> {
        let url = format!("{}{}", self.base_url, ASSESS_PATH);
        debug!(
            target: "assess::jobs",
            url = %url,
            student = %student.file_name,
            answer_key = %answer_key.file_name,
            "starting assessment"
        );
        let form = Form::new()
            .part("student_pdf", student.into_part()?)
            .part("answer_key", answer_key.into_part()?);

        let res = self.http.post(url).multipart(form).send().await?;
        let status = res.status();
        if status.is_success() {
            let ticket = res.json::<JobTicket>().await?;
            info!(target: "assess::jobs", job_id = %ticket.job_id, "assessment started");
            Ok(ticket)
        } else {
            let body = res.text().await.unwrap_or_default();
            let message = if body.trim().is_empty() {
                format!("HTTP {}", status.as_u16())
            } else {
                body
            };
            warn!(target: "assess::jobs", status = status.as_u16(), %message, "assessment rejected");
            Err(JobError::Rejected { status, message })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejects_non_pdf_paths() {
        let err = Upload::from_path(Path::new("notes.txt")).await.unwrap_err();
        assert!(matches!(err, JobError::NotPdf(_)));
    }

    #[tokio::test]
    async fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.PDF");
        let err = Upload::from_path(&path).await.unwrap_err();
        assert!(matches!(err, JobError::Io { .. }));
    }

    #[tokio::test]
    async fn reads_file_name_and_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("student.pdf");
        std::fs::write(&path, b"%PDF-1.4").unwrap();
        let upload = Upload::from_path(&path).await.unwrap();
        assert_eq!(upload.file_name, "student.pdf");
        assert_eq!(upload.bytes, b"%PDF-1.4");
    }

    #[test]
    fn rejection_displays_message_only() {
        let err = JobError::Rejected {
            status: reqwest::StatusCode::BAD_REQUEST,
            message: "HTTP 400".into(),
        };
        assert_eq!(err.to_string(), "HTTP 400");
    }

    #[test]
    fn trims_trailing_slash_from_base() {
        let client = JobClient::new("http://127.0.0.1:8000/");
        assert_eq!(client.base_url(), "http://127.0.0.1:8000");
    }
}
