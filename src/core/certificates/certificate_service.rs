// The certificate pipeline - all the business logic for turning one
// participant into one delivered certificate. Notice how this module has no
// HTTP or SMTP imports; it talks to the outside world only through the port
// traits below, so it can be exercised end to end with in-memory fakes.

use async_trait::async_trait;
use thiserror::Error;

use crate::core::participants::Participant;
use crate::core::report::{DeliveryStatus, LogEntry, RunReport};

// ============================================================================
// ERRORS
// ============================================================================

/// Failure talking to the document store or the presentation editor.
///
/// `NotFound` and `PermissionDenied` are split out because the pipeline
/// classifies a failed template copy by them; everything else is `Api`.
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("storage API error: {0}")]
    Api(String),
}

/// Mail submission failure. Carries the transport's error text verbatim so
/// the run report can show the operator what the relay said.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct MailError(pub String);

// ============================================================================
// PORTS
// ============================================================================
// The core defines WHAT it needs from the outside world; the infra layer
// provides the actual Drive/Slides/SMTP implementations.

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Duplicates `template_id` under `title`, optionally into `folder_id`.
    /// Returns the storage-assigned id of the new copy.
    async fn copy(
        &self,
        template_id: &str,
        title: &str,
        folder_id: Option<&str>,
    ) -> Result<String, StorageError>;

    /// Renders the file as PDF and returns the fully assembled bytes.
    async fn export_pdf(&self, file_id: &str) -> Result<Vec<u8>, StorageError>;

    /// Deletes the file.
    async fn delete(&self, file_id: &str) -> Result<(), StorageError>;
}

#[async_trait]
pub trait TemplateEditor: Send + Sync {
    /// Replaces every case-sensitive occurrence of `needle` in the
    /// presentation with `replacement`.
    async fn replace_text(
        &self,
        presentation_id: &str,
        needle: &str,
        replacement: &str,
    ) -> Result<(), StorageError>;
}

/// Outgoing message handed to the mail transport.
#[derive(Debug, Clone)]
pub struct CertificateEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
    pub attachment_name: String,
    pub pdf_bytes: Vec<u8>,
}

#[async_trait]
pub trait CertificateMailer: Send + Sync {
    /// Sends one message. Implementations convert every transport and auth
    /// failure into a `MailError`; nothing escapes this boundary.
    async fn send(&self, email: &CertificateEmail) -> Result<(), MailError>;
}

// ============================================================================
// PIPELINE
// ============================================================================

/// Per-batch settings, built once from configuration and passed in. The
/// pipeline never reads ambient process state.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub template_id: String,
    /// Optional target folder for the working copies.
    pub folder_id: Option<String>,
    /// Token replaced with the participant name, in both the presentation
    /// and the mail body. Case-sensitive.
    pub placeholder: String,
    pub subject: String,
    pub body_template: String,
}

/// Failure in steps that run after a working copy already exists.
enum StepError {
    Storage(StorageError),
    Mail(MailError),
}

impl From<StorageError> for StepError {
    fn from(err: StorageError) -> Self {
        StepError::Storage(err)
    }
}

/// The per-participant pipeline: copy -> substitute -> export -> send ->
/// delete, strictly sequential, no retries. Generic over its three ports so
/// tests can inject fakes.
pub struct CertificateService<D, E, M> {
    store: D,
    editor: E,
    mailer: M,
    options: PipelineOptions,
}

impl<D, E, M> CertificateService<D, E, M>
where
    D: DocumentStore,
    E: TemplateEditor,
    M: CertificateMailer,
{
    pub fn new(store: D, editor: E, mailer: M, options: PipelineOptions) -> Self {
        Self {
            store,
            editor,
            mailer,
            options,
        }
    }

    /// Processes every participant in input order. Per-participant failures
    /// are recorded and never abort the batch.
    pub async fn run_batch(&self, participants: &[Participant]) -> RunReport {
        let mut report = RunReport::new();
        let total = participants.len();

        for (idx, participant) in participants.iter().enumerate() {
            tracing::info!("Processing ({}/{}): {}", idx + 1, total, participant.name);
            report.push(self.process_participant(participant).await);
        }

        report
    }

    /// Runs the five-step pipeline for one participant and classifies the
    /// outcome into exactly one [`DeliveryStatus`].
    pub async fn process_participant(&self, participant: &Participant) -> LogEntry {
        let title = format!("Sertifikat - {}", participant.name);

        let copy_id = match self
            .store
            .copy(
                &self.options.template_id,
                &title,
                self.options.folder_id.as_deref(),
            )
            .await
        {
            Ok(id) => id,
            Err(err) => {
                let status = match &err {
                    StorageError::NotFound(_) => DeliveryStatus::NotFound,
                    StorageError::PermissionDenied(_) => DeliveryStatus::PermissionDenied,
                    StorageError::Api(_) => DeliveryStatus::CopyFailed,
                };
                // No working copy exists, so there is nothing to clean up.
                return LogEntry::now(participant, status, err.to_string());
            }
        };

        let outcome = self.personalize_and_send(participant, &copy_id).await;

        // The working copy exists from here on; delete it exactly once,
        // whatever the remaining steps did.
        let cleanup = self.store.delete(&copy_id).await;

        match outcome {
            Ok(()) => {
                let detail = match cleanup {
                    Ok(()) => String::new(),
                    Err(err) => {
                        tracing::warn!(
                            "Certificate for {} was sent but working copy {} was not deleted: {}",
                            participant.name,
                            copy_id,
                            err
                        );
                        format!("sent, but working copy was not deleted: {}", err)
                    }
                };
                LogEntry::now(participant, DeliveryStatus::Success, detail)
            }
            Err(step_err) => {
                if let Err(err) = cleanup {
                    tracing::warn!("Cleanup of working copy {} failed: {}", copy_id, err);
                }
                match step_err {
                    StepError::Mail(err) => {
                        LogEntry::now(participant, DeliveryStatus::EmailFailed, err.0)
                    }
                    StepError::Storage(err) => {
                        LogEntry::now(participant, DeliveryStatus::SystemError, err.to_string())
                    }
                }
            }
        }
    }

    /// Steps 2-4: substitute the placeholder, export the PDF, hand it to the
    /// mailer. Split out so the caller can run cleanup unconditionally.
    async fn personalize_and_send(
        &self,
        participant: &Participant,
        copy_id: &str,
    ) -> Result<(), StepError> {
        self.editor
            .replace_text(copy_id, &self.options.placeholder, &participant.name)
            .await?;

        let pdf_bytes = self.store.export_pdf(copy_id).await?;

        let body = self
            .options
            .body_template
            .replace(&self.options.placeholder, &participant.name);

        let email = CertificateEmail {
            to: participant.email.clone(),
            subject: self.options.subject.clone(),
            body,
            attachment_name: attachment_name(&participant.name),
            pdf_bytes,
        };

        self.mailer.send(&email).await.map_err(StepError::Mail)
    }
}

/// Attachment filename for one participant: `Sertifikat_{name}.pdf` with
/// spaces mapped to underscores.
pub fn attachment_name(name: &str) -> String {
    format!("Sertifikat_{}.pdf", name.replace(' ', "_"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    // ------------------------------------------------------------------
    // Port fakes
    // ------------------------------------------------------------------

    #[derive(Default)]
    struct FakeStore {
        fail_copy: Option<StorageError>,
        fail_export: bool,
        fail_delete: bool,
        deleted: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl DocumentStore for FakeStore {
        async fn copy(
            &self,
            _template_id: &str,
            _title: &str,
            _folder_id: Option<&str>,
        ) -> Result<String, StorageError> {
            match &self.fail_copy {
                Some(err) => Err(err.clone()),
                None => Ok("copy-1".to_string()),
            }
        }

        async fn export_pdf(&self, _file_id: &str) -> Result<Vec<u8>, StorageError> {
            if self.fail_export {
                Err(StorageError::Api("export blew up".to_string()))
            } else {
                Ok(b"%PDF-1.4 fake".to_vec())
            }
        }

        async fn delete(&self, file_id: &str) -> Result<(), StorageError> {
            self.deleted.lock().unwrap().push(file_id.to_string());
            if self.fail_delete {
                Err(StorageError::Api("delete refused".to_string()))
            } else {
                Ok(())
            }
        }
    }

    #[derive(Default)]
    struct FakeEditor {
        replacements: Arc<Mutex<Vec<(String, String)>>>,
    }

    #[async_trait]
    impl TemplateEditor for FakeEditor {
        async fn replace_text(
            &self,
            _presentation_id: &str,
            needle: &str,
            replacement: &str,
        ) -> Result<(), StorageError> {
            self.replacements
                .lock()
                .unwrap()
                .push((needle.to_string(), replacement.to_string()));
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeMailer {
        fail_with: Option<String>,
        sent: Arc<Mutex<Vec<CertificateEmail>>>,
    }

    #[async_trait]
    impl CertificateMailer for FakeMailer {
        async fn send(&self, email: &CertificateEmail) -> Result<(), MailError> {
            match &self.fail_with {
                Some(detail) => Err(MailError(detail.clone())),
                None => {
                    self.sent.lock().unwrap().push(email.clone());
                    Ok(())
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    fn options() -> PipelineOptions {
        PipelineOptions {
            template_id: "template-1".to_string(),
            folder_id: None,
            placeholder: "{{nama}}".to_string(),
            subject: "Your certificate".to_string(),
            body_template: "Halo {{nama}}, selamat! Sampai jumpa, {{nama}}.".to_string(),
        }
    }

    fn budi() -> Participant {
        Participant {
            name: "Budi Santoso".to_string(),
            email: "budi@example.com".to_string(),
        }
    }

    // ------------------------------------------------------------------
    // Tests
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_success_has_empty_detail_and_cleans_up() {
        let deleted = Arc::new(Mutex::new(Vec::new()));
        let store = FakeStore {
            deleted: Arc::clone(&deleted),
            ..Default::default()
        };
        let sent = Arc::new(Mutex::new(Vec::new()));
        let mailer = FakeMailer {
            sent: Arc::clone(&sent),
            ..Default::default()
        };
        let service = CertificateService::new(store, FakeEditor::default(), mailer, options());

        let entry = service.process_participant(&budi()).await;

        assert_eq!(entry.status, DeliveryStatus::Success);
        assert!(entry.detail.is_empty());
        assert_eq!(deleted.lock().unwrap().as_slice(), ["copy-1"]);

        let sent = sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "budi@example.com");
        assert_eq!(sent[0].attachment_name, "Sertifikat_Budi_Santoso.pdf");
    }

    #[tokio::test]
    async fn test_not_found_copy_skips_cleanup() {
        let deleted = Arc::new(Mutex::new(Vec::new()));
        let store = FakeStore {
            fail_copy: Some(StorageError::NotFound("no such file".to_string())),
            deleted: Arc::clone(&deleted),
            ..Default::default()
        };
        let service = CertificateService::new(
            store,
            FakeEditor::default(),
            FakeMailer::default(),
            options(),
        );

        let entry = service.process_participant(&budi()).await;

        assert_eq!(entry.status, DeliveryStatus::NotFound);
        assert!(deleted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_forbidden_copy_is_permission_denied() {
        let store = FakeStore {
            fail_copy: Some(StorageError::PermissionDenied("share it first".to_string())),
            ..Default::default()
        };
        let service = CertificateService::new(
            store,
            FakeEditor::default(),
            FakeMailer::default(),
            options(),
        );

        let entry = service.process_participant(&budi()).await;
        assert_eq!(entry.status, DeliveryStatus::PermissionDenied);
    }

    #[tokio::test]
    async fn test_send_failure_still_deletes_and_carries_detail() {
        let deleted = Arc::new(Mutex::new(Vec::new()));
        let store = FakeStore {
            deleted: Arc::clone(&deleted),
            ..Default::default()
        };
        let mailer = FakeMailer {
            fail_with: Some("535 authentication failed".to_string()),
            ..Default::default()
        };
        let service = CertificateService::new(store, FakeEditor::default(), mailer, options());

        let entry = service.process_participant(&budi()).await;

        assert_eq!(entry.status, DeliveryStatus::EmailFailed);
        assert_eq!(entry.detail, "535 authentication failed");
        assert_eq!(deleted.lock().unwrap().as_slice(), ["copy-1"]);
    }

    #[tokio::test]
    async fn test_export_failure_is_system_error_and_still_cleans_up() {
        let deleted = Arc::new(Mutex::new(Vec::new()));
        let store = FakeStore {
            fail_export: true,
            deleted: Arc::clone(&deleted),
            ..Default::default()
        };
        let service = CertificateService::new(
            store,
            FakeEditor::default(),
            FakeMailer::default(),
            options(),
        );

        let entry = service.process_participant(&budi()).await;

        assert_eq!(entry.status, DeliveryStatus::SystemError);
        assert!(entry.detail.contains("export blew up"));
        assert_eq!(deleted.lock().unwrap().as_slice(), ["copy-1"]);
    }

    #[tokio::test]
    async fn test_cleanup_failure_after_send_stays_success() {
        let store = FakeStore {
            fail_delete: true,
            ..Default::default()
        };
        let service = CertificateService::new(
            store,
            FakeEditor::default(),
            FakeMailer::default(),
            options(),
        );

        let entry = service.process_participant(&budi()).await;

        assert_eq!(entry.status, DeliveryStatus::Success);
        assert!(entry.detail.contains("not deleted"));
    }

    #[tokio::test]
    async fn test_body_placeholder_replaced_everywhere() {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let mailer = FakeMailer {
            sent: Arc::clone(&sent),
            ..Default::default()
        };
        let replacements = Arc::new(Mutex::new(Vec::new()));
        let editor = FakeEditor {
            replacements: Arc::clone(&replacements),
        };
        let service =
            CertificateService::new(FakeStore::default(), editor, mailer, options());

        service.process_participant(&budi()).await;

        let sent = sent.lock().unwrap();
        assert_eq!(
            sent[0].body,
            "Halo Budi Santoso, selamat! Sampai jumpa, Budi Santoso."
        );
        assert!(!sent[0].body.contains("{{nama}}"));

        // The presentation edit uses the same placeholder and name.
        let replacements = replacements.lock().unwrap();
        assert_eq!(
            replacements.as_slice(),
            [("{{nama}}".to_string(), "Budi Santoso".to_string())]
        );
    }

    #[tokio::test]
    async fn test_batch_preserves_order_and_survives_failures() {
        let store = FakeStore {
            fail_export: true,
            ..Default::default()
        };
        let service = CertificateService::new(
            store,
            FakeEditor::default(),
            FakeMailer::default(),
            options(),
        );

        let participants = vec![
            budi(),
            Participant {
                name: "Siti Aminah".to_string(),
                email: "siti@example.com".to_string(),
            },
        ];

        let report = service.run_batch(&participants).await;

        assert_eq!(report.len(), 2);
        let names: Vec<&str> = report.entries().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Budi Santoso", "Siti Aminah"]);
        assert!(report
            .entries()
            .iter()
            .all(|e| e.status == DeliveryStatus::SystemError));
    }
}
