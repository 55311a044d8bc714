use uuid::Uuid;

use super::file::{is_allowed_mime, SelectedFile};
use crate::error::{DeskError, DeskResult};
use crate::remote::RemoteClient;

/// Single-file upload state: at most one selected file, one upload at a time.
pub struct UploadFlow {
    bucket: String,
    file: Option<SelectedFile>,
    is_uploading: bool,
    error: Option<String>,
}

impl UploadFlow {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            file: None,
            is_uploading: false,
            error: None,
        }
    }

    pub fn file(&self) -> Option<&SelectedFile> {
        self.file.as_ref()
    }

    pub fn is_uploading(&self) -> bool {
        self.is_uploading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Replaces the current selection. Empty files and types outside the
    /// allow-list never become selected.
    pub fn select(&mut self, file: SelectedFile) -> DeskResult<()> {
        if !is_allowed_mime(file.mime()) {
            return Err(DeskError::validation(format!(
                "{} is not a PDF or DOCX file",
                file.name()
            )));
        }
        if file.size() == 0 {
            return Err(DeskError::validation(format!("{} is empty", file.name())));
        }
        tracing::debug!(file = file.name(), bytes = file.size(), "file selected");
        self.file = Some(file);
        Ok(())
    }

    /// Drops the selection. Also releases a flow whose upload future was dropped mid-flight.
    pub fn clear(&mut self) {
        self.file = None;
        self.is_uploading = false;
        self.error = None;
    }

    /// Uploads the selected file and returns its storage path.
    ///
    /// Without both a token and a tenant the file is not sent anywhere and
    /// `demo/<name>` is returned. Failures are recorded in [`error`](Self::error)
    /// and yield `None`.
    pub async fn upload<C: RemoteClient + ?Sized>(
        &mut self,
        client: &C,
        access_token: Option<&str>,
        tenant_id: Option<&str>,
    ) -> Option<String> {
        if self.is_uploading {
            self.error = Some("An upload is already in progress".to_string());
            return None;
        }
        let file = self.file.as_ref()?;

        self.is_uploading = true;
        self.error = None;

        let outcome = match (non_empty(access_token), non_empty(tenant_id)) {
            (Some(token), Some(tenant)) => {
                let key = object_key(tenant, file.name());
                client
                    .upload_document(&self.bucket, &key, file, token)
                    .await
            }
            _ => {
                tracing::info!(file = file.name(), "no session, using demo path");
                Ok(format!("demo/{}", file.name()))
            }
        };

        self.is_uploading = false;
        match outcome {
            Ok(path) => {
                tracing::info!(path = %path, "upload complete");
                Some(path)
            }
            Err(e) => {
                tracing::warn!(error = %e, "upload failed");
                let message = e.to_string();
                self.error = Some(if message.is_empty() {
                    "Upload failed".to_string()
                } else {
                    message
                });
                None
            }
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// `<tenant>/<uuid>-<filename>`
pub fn object_key(tenant_id: &str, file_name: &str) -> String {
    format!("{}/{}-{}", tenant_id, Uuid::new_v4(), file_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Session;
    use crate::upload::file::{DOCX_MIME, PDF_MIME};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Records upload calls; fails them when `fail_with` is set and never
    /// answers when `hang` is set.
    #[derive(Default)]
    struct FakeStorage {
        calls: Mutex<Vec<(String, String, String, String)>>,
        fail_with: Option<String>,
        hang: bool,
    }

    #[async_trait]
    impl RemoteClient for FakeStorage {
        async fn sign_in(&self, _: &str, _: &str) -> DeskResult<Session> {
            unimplemented!()
        }

        async fn sign_up(&self, _: &str, _: &str, _: &str) -> DeskResult<Session> {
            unimplemented!()
        }

        async fn upload_document(
            &self,
            bucket: &str,
            key: &str,
            file: &SelectedFile,
            token: &str,
        ) -> DeskResult<String> {
            self.calls.lock().unwrap().push((
                bucket.to_string(),
                key.to_string(),
                file.name().to_string(),
                token.to_string(),
            ));
            if self.hang {
                std::future::pending::<()>().await;
            }
            match &self.fail_with {
                Some(msg) => Err(DeskError::Http {
                    status: 500,
                    body: msg.clone(),
                }),
                None => Ok(format!("{}/{}", bucket, key)),
            }
        }

        async fn call_function(
            &self,
            _: &str,
            _: serde_json::Value,
            _: &str,
        ) -> DeskResult<serde_json::Value> {
            unimplemented!()
        }

        async fn fetch_from_function(
            &self,
            _: &str,
            _: &str,
            _: &str,
            _: &str,
        ) -> DeskResult<serde_json::Value> {
            unimplemented!()
        }
    }

    fn pdf(name: &str) -> SelectedFile {
        SelectedFile::new(name, PDF_MIME, b"content".to_vec())
    }

    #[test]
    fn test_rejects_disallowed_type() {
        let mut flow = UploadFlow::new("contracts");
        let err = flow
            .select(SelectedFile::new("photo.png", "image/png", b"png".to_vec()))
            .unwrap_err();
        assert!(matches!(err, DeskError::Validation(_)));
        assert!(flow.file().is_none());
    }

    #[test]
    fn test_rejects_empty_file() {
        let mut flow = UploadFlow::new("contracts");
        assert!(flow.select(SelectedFile::new("blank.pdf", PDF_MIME, vec![])).is_err());
        assert!(flow.file().is_none());
    }

    #[test]
    fn test_selection_replaces_previous() {
        let mut flow = UploadFlow::new("contracts");
        flow.select(pdf("first.pdf")).unwrap();
        flow.select(SelectedFile::new("second.docx", DOCX_MIME, b"x".to_vec()))
            .unwrap();
        assert_eq!(flow.file().unwrap().name(), "second.docx");
    }

    #[tokio::test]
    async fn test_rejected_file_never_uploads() {
        let storage = FakeStorage::default();
        let mut flow = UploadFlow::new("contracts");
        let _ = flow.select(SelectedFile::new("notes.txt", "text/plain", b"x".to_vec()));

        let path = flow.upload(&storage, Some("token"), Some("tenant-1")).await;
        assert_eq!(path, None);
        assert!(storage.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_upload_uses_tenant_prefixed_key() {
        let storage = FakeStorage::default();
        let mut flow = UploadFlow::new("contracts");
        flow.select(pdf("contract.pdf")).unwrap();

        let path = flow
            .upload(&storage, Some("token"), Some("tenant-1"))
            .await
            .unwrap();

        let calls = storage.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        let (bucket, key, name, token) = &calls[0];
        assert_eq!(bucket, "contracts");
        assert!(key.starts_with("tenant-1/"));
        assert!(key.ends_with("-contract.pdf"));
        assert_eq!(name, "contract.pdf");
        assert_eq!(token, "token");
        assert_eq!(path, format!("contracts/{}", key));
        assert!(!flow.is_uploading());
        assert!(flow.error().is_none());
    }

    #[tokio::test]
    async fn test_demo_fallback_without_credentials() {
        let storage = FakeStorage::default();
        let mut flow = UploadFlow::new("contracts");
        flow.select(SelectedFile::new("draft.docx", DOCX_MIME, b"demo".to_vec()))
            .unwrap();

        assert_eq!(
            flow.upload(&storage, None, Some("tenant-1")).await.as_deref(),
            Some("demo/draft.docx")
        );
        assert_eq!(
            flow.upload(&storage, Some("token"), None).await.as_deref(),
            Some("demo/draft.docx")
        );
        assert_eq!(
            flow.upload(&storage, Some(""), Some("tenant-1")).await.as_deref(),
            Some("demo/draft.docx")
        );
        assert!(storage.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failure_is_recorded_not_propagated() {
        let storage = FakeStorage {
            fail_with: Some("Upload failed".to_string()),
            ..Default::default()
        };
        let mut flow = UploadFlow::new("contracts");
        flow.select(pdf("contract.pdf")).unwrap();

        let path = flow.upload(&storage, Some("token"), Some("tenant-1")).await;
        assert_eq!(path, None);
        assert_eq!(flow.error(), Some("Upload failed"));
        assert!(!flow.is_uploading());

        // a later success clears the visible error
        let ok = FakeStorage::default();
        assert!(flow.upload(&ok, Some("token"), Some("tenant-1")).await.is_some());
        assert!(flow.error().is_none());
    }

    #[tokio::test]
    async fn test_empty_failure_message_falls_back() {
        let storage = FakeStorage {
            fail_with: Some(String::new()),
            ..Default::default()
        };
        let mut flow = UploadFlow::new("contracts");
        flow.select(pdf("contract.pdf")).unwrap();

        flow.upload(&storage, Some("token"), Some("tenant-1")).await;
        // empty body falls back to the status text
        assert_eq!(flow.error(), Some("Internal Server Error"));
    }

    #[tokio::test]
    async fn test_nothing_selected() {
        let storage = FakeStorage::default();
        let mut flow = UploadFlow::new("contracts");
        assert_eq!(flow.upload(&storage, Some("token"), Some("t")).await, None);
        assert!(flow.error().is_none());
    }

    #[tokio::test]
    async fn test_abandoned_upload_blocks_until_cleared() {
        let stalled = FakeStorage {
            hang: true,
            ..Default::default()
        };
        let mut flow = UploadFlow::new("contracts");
        flow.select(pdf("contract.pdf")).unwrap();

        let pending = tokio::time::timeout(
            std::time::Duration::from_millis(20),
            flow.upload(&stalled, Some("token"), Some("tenant-1")),
        )
        .await;
        assert!(pending.is_err());
        assert_eq!(stalled.calls.lock().unwrap().len(), 1);
        assert!(flow.is_uploading());

        let storage = FakeStorage::default();
        assert_eq!(
            flow.upload(&storage, Some("token"), Some("tenant-1")).await,
            None
        );
        assert_eq!(flow.error(), Some("An upload is already in progress"));
        assert!(storage.calls.lock().unwrap().is_empty());

        flow.clear();
        assert!(!flow.is_uploading());
        assert!(flow.error().is_none());
        flow.select(pdf("contract-v2.pdf")).unwrap();
        let path = flow
            .upload(&storage, Some("token"), Some("tenant-1"))
            .await
            .unwrap();
        assert!(path.ends_with("-contract-v2.pdf"));
        assert_eq!(storage.calls.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_object_keys_are_unique() {
        assert_ne!(object_key("t", "a.pdf"), object_key("t", "a.pdf"));
    }
}
