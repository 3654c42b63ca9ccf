use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::documents::DocumentPolicy;
use super::domain::{
    AcademicDetails, ApplicationReference, DocumentKind, FinancialDetails, FormSnapshot,
    GuarantorDetails, HousingOptionId, HousingPreferences, IdentityDetails, IntakeStage,
};
use super::machine::{Advance, IntakeWorkflow, WorkflowError};

/// Machine-readable failure class reported by the submission backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionErrorKind {
    Network,
    Validation,
    Server,
    Unknown,
}

impl SubmissionErrorKind {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Validation => "validation",
            Self::Server => "server",
            Self::Unknown => "unknown",
        }
    }

    /// Whether re-running the same submission may succeed.
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::Network | Self::Server)
    }
}

impl fmt::Display for SubmissionErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} error while submitting application: {message}")]
pub struct SubmissionError {
    pub kind: SubmissionErrorKind,
    pub message: String,
}

impl SubmissionError {
    pub fn new(kind: SubmissionErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(SubmissionErrorKind::Network, message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(SubmissionErrorKind::Validation, message)
    }

    pub fn server(message: impl Into<String>) -> Self {
        Self::new(SubmissionErrorKind::Server, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(SubmissionErrorKind::Unknown, message)
    }
}

/// Upload metadata forwarded with the payload in place of file contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentPresence {
    pub attached: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

/// Frozen copy of the form handed to the submission backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationPayload {
    pub prepared_at: DateTime<Utc>,
    pub identity: IdentityDetails,
    pub academic: AcademicDetails,
    pub financial: FinancialDetails,
    pub housing_choices: Vec<HousingOptionId>,
    pub preferences: HousingPreferences,
    pub guarantor: GuarantorDetails,
    pub required_documents: BTreeSet<DocumentKind>,
    pub documents: BTreeMap<DocumentKind, DocumentPresence>,
    pub information_confirmed: bool,
}

impl ApplicationPayload {
    pub fn from_snapshot(snapshot: &FormSnapshot, policy: &DocumentPolicy) -> Self {
        let documents = snapshot
            .documents
            .iter()
            .map(|(kind, attachment)| {
                let presence = DocumentPresence {
                    attached: attachment.is_some(),
                    file_name: attachment.map(|file| file.file_name.clone()),
                    content_type: attachment.and_then(|file| file.content_type.clone()),
                };
                (kind, presence)
            })
            .collect();

        Self {
            prepared_at: Utc::now(),
            identity: snapshot.identity.clone(),
            academic: snapshot.academic.clone(),
            financial: snapshot.financial.clone(),
            housing_choices: snapshot.housing_choices.members().to_vec(),
            preferences: snapshot.preferences.clone(),
            guarantor: snapshot.guarantor.clone(),
            required_documents: policy.required_kinds(snapshot),
            documents,
            information_confirmed: snapshot.information_confirmed,
        }
    }
}

/// Outbound write hook for completed applications (HTTP backend, queue, ...).
#[async_trait]
pub trait ApplicationSubmitter: Send + Sync {
    async fn submit_application(
        &self,
        payload: &ApplicationPayload,
    ) -> Result<ApplicationReference, SubmissionError>;
}

/// What a coordinated `advance` ended up doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdvanceOutcome {
    Moved { from: IntakeStage, to: IntakeStage },
    Submitted(ApplicationReference),
}

/// Drives the terminal hand-off from the review stage to the submitter.
pub struct SubmissionCoordinator<S> {
    submitter: Arc<S>,
}

impl<S> Clone for SubmissionCoordinator<S> {
    fn clone(&self) -> Self {
        Self {
            submitter: Arc::clone(&self.submitter),
        }
    }
}

impl<S> SubmissionCoordinator<S>
where
    S: ApplicationSubmitter + 'static,
{
    pub fn new(submitter: Arc<S>) -> Self {
        Self { submitter }
    }

    pub fn submitter(&self) -> &Arc<S> {
        &self.submitter
    }

    /// Gated advance that submits instead of moving when the workflow is at review.
    pub async fn advance(
        &self,
        workflow: &mut IntakeWorkflow,
    ) -> Result<AdvanceOutcome, WorkflowError> {
        match workflow.advance()? {
            Advance::Moved { from, to } => Ok(AdvanceOutcome::Moved { from, to }),
            Advance::ReadyToSubmit => self.submit(workflow).await.map(AdvanceOutcome::Submitted),
        }
    }

    /// Submit the workflow's snapshot once.
    ///
    /// Failures leave the snapshot untouched and the workflow at review; the
    /// caller decides whether to call again.
    pub async fn submit(
        &self,
        workflow: &mut IntakeWorkflow,
    ) -> Result<ApplicationReference, WorkflowError> {
        workflow.ensure_submittable()?;

        let payload =
            ApplicationPayload::from_snapshot(workflow.snapshot(), workflow.gates().document_policy());

        match self.submitter.submit_application(&payload).await {
            Ok(reference) => {
                info!(%reference, choices = payload.housing_choices.len(), "application submitted");
                workflow.record_submitted(reference.clone());
                Ok(reference)
            }
            Err(error) => {
                warn!(
                    kind = %error.kind,
                    retryable = error.kind.is_retryable(),
                    error = %error.message,
                    "application submission failed"
                );
                workflow.record_failed(error.kind);
                Err(WorkflowError::Submission(error))
            }
        }
    }
}
