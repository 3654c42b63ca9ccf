use std::collections::BTreeSet;

use serde::Serialize;
use tracing::debug;

use super::documents::AttachmentRejected;
use super::domain::{
    ApplicationReference, Attachment, DocumentKind, FormSnapshot, HousingOption,
    HousingOptionId, IntakeStage, SectionUpdate,
};
use super::gates::{RequiredField, StageGates};
use super::selection::SelectionChange;
use super::submission::{SubmissionError, SubmissionErrorKind};

/// Outcome of the most recent submission attempt, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum WorkflowStatus {
    Collecting,
    Failed { kind: SubmissionErrorKind },
    Submitted { reference: ApplicationReference },
}

/// Result of a successful `advance` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    Moved {
        from: IntakeStage,
        to: IntakeStage,
    },
    /// The review gate holds; the caller should hand off to submission.
    ReadyToSubmit,
}

#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("{stage} is incomplete: missing {}", join_fields(.missing))]
    ValidationFailed {
        stage: IntakeStage,
        missing: Vec<RequiredField>,
    },
    #[error("cannot jump to {target}: {blocking} is incomplete (missing {})", join_fields(.missing))]
    JumpBlocked {
        target: IntakeStage,
        blocking: IntakeStage,
        missing: Vec<RequiredField>,
    },
    #[error("already at the first stage")]
    AtFirstStage,
    #[error("application already submitted as {reference}")]
    Frozen { reference: ApplicationReference },
    #[error("submission is only possible from the review stage (currently at {stage})")]
    NotAtReview { stage: IntakeStage },
    #[error("housing option {0} is not offered by the catalog")]
    UnknownHousingOption(HousingOptionId),
    #[error(transparent)]
    Attachment(#[from] AttachmentRejected),
    #[error(transparent)]
    Submission(#[from] SubmissionError),
}

fn join_fields(fields: &[RequiredField]) -> String {
    fields
        .iter()
        .map(|field| field.label())
        .collect::<Vec<_>>()
        .join(", ")
}

/// A single applicant's pass through the intake stages.
///
/// Owns the form snapshot exclusively; every mutation goes through `&mut self`
/// so at most one edit or submission is in progress at a time.
#[derive(Debug, Clone)]
pub struct IntakeWorkflow {
    stage: IntakeStage,
    status: WorkflowStatus,
    snapshot: FormSnapshot,
    gates: StageGates,
    housing_options: Vec<HousingOption>,
}

impl Default for IntakeWorkflow {
    fn default() -> Self {
        Self::new(StageGates::default(), Vec::new())
    }
}

impl IntakeWorkflow {
    pub fn new(gates: StageGates, housing_options: Vec<HousingOption>) -> Self {
        Self {
            stage: IntakeStage::Identity,
            status: WorkflowStatus::Collecting,
            snapshot: FormSnapshot::default(),
            gates,
            housing_options,
        }
    }

    pub fn stage(&self) -> IntakeStage {
        self.stage
    }

    pub fn status(&self) -> &WorkflowStatus {
        &self.status
    }

    pub fn snapshot(&self) -> &FormSnapshot {
        &self.snapshot
    }

    pub fn gates(&self) -> &StageGates {
        &self.gates
    }

    pub fn housing_options(&self) -> &[HousingOption] {
        &self.housing_options
    }

    pub fn reference(&self) -> Option<&ApplicationReference> {
        match &self.status {
            WorkflowStatus::Submitted { reference } => Some(reference),
            _ => None,
        }
    }

    pub fn is_submitted(&self) -> bool {
        self.reference().is_some()
    }

    pub fn can_advance(&self) -> bool {
        self.gates.can_advance(self.stage, &self.snapshot)
    }

    pub fn missing_fields(&self) -> Vec<RequiredField> {
        self.gates.missing_fields(self.stage, &self.snapshot)
    }

    pub fn required_documents(&self) -> BTreeSet<DocumentKind> {
        self.gates.document_policy().required_kinds(&self.snapshot)
    }

    pub fn advance(&mut self) -> Result<Advance, WorkflowError> {
        self.ensure_editable()?;
        self.ensure_gate(self.stage)?;

        match self.stage.next() {
            Some(next) => {
                let from = self.stage;
                self.stage = next;
                debug!(from = ?from, to = ?next, "intake stage advanced");
                Ok(Advance::Moved { from, to: next })
            }
            None => Ok(Advance::ReadyToSubmit),
        }
    }

    pub fn retreat(&mut self) -> Result<IntakeStage, WorkflowError> {
        self.ensure_editable()?;
        let previous = self.stage.previous().ok_or(WorkflowError::AtFirstStage)?;
        debug!(from = ?self.stage, to = ?previous, "intake stage retreated");
        self.stage = previous;
        Ok(previous)
    }

    /// Move directly to `target`. Backward jumps always succeed; forward jumps
    /// stop at the first stage whose gate does not hold.
    pub fn jump_to(&mut self, target: IntakeStage) -> Result<IntakeStage, WorkflowError> {
        self.ensure_editable()?;

        if target > self.stage {
            if let Some((blocking, missing)) =
                self.gates.first_incomplete_before(target, &self.snapshot)
            {
                debug!(?target, ?blocking, "intake jump blocked");
                return Err(WorkflowError::JumpBlocked {
                    target,
                    blocking,
                    missing,
                });
            }
        }

        debug!(from = ?self.stage, to = ?target, "intake stage jumped");
        self.stage = target;
        Ok(target)
    }

    pub fn update_section(&mut self, update: SectionUpdate) -> Result<(), WorkflowError> {
        self.ensure_editable()?;
        update.apply(&mut self.snapshot);
        Ok(())
    }

    pub fn confirm_information(&mut self, confirmed: bool) -> Result<(), WorkflowError> {
        self.update_section(SectionUpdate::Confirmation { confirmed })
    }

    pub fn toggle_housing(&mut self, option: HousingOptionId) -> Result<SelectionChange, WorkflowError> {
        self.ensure_editable()?;

        let offered = self.housing_options.iter().any(|candidate| candidate.id == option);
        let already_chosen = self.snapshot.housing_choices.contains(&option);
        if !self.housing_options.is_empty() && !offered && !already_chosen {
            return Err(WorkflowError::UnknownHousingOption(option));
        }

        let change = self.snapshot.housing_choices.toggle(option);
        debug!(%option, ?change, selected = self.snapshot.housing_choices.len(), "housing choice toggled");
        Ok(change)
    }

    pub fn attach_document(
        &mut self,
        kind: DocumentKind,
        attachment: Attachment,
    ) -> Result<(), WorkflowError> {
        self.ensure_editable()?;
        let accepted = self.gates.document_policy().accept(kind, attachment)?;
        self.snapshot.documents.set(kind, Some(accepted));
        Ok(())
    }

    pub fn remove_document(&mut self, kind: DocumentKind) -> Result<(), WorkflowError> {
        self.ensure_editable()?;
        self.snapshot.documents.set(kind, None);
        Ok(())
    }

    /// Checks the submission preconditions: review stage, open workflow, gate held.
    pub(crate) fn ensure_submittable(&self) -> Result<(), WorkflowError> {
        self.ensure_editable()?;
        if self.stage != IntakeStage::Review {
            return Err(WorkflowError::NotAtReview { stage: self.stage });
        }
        self.ensure_gate(IntakeStage::Review)
    }

    pub(crate) fn record_submitted(&mut self, reference: ApplicationReference) {
        self.status = WorkflowStatus::Submitted { reference };
    }

    pub(crate) fn record_failed(&mut self, kind: SubmissionErrorKind) {
        self.status = WorkflowStatus::Failed { kind };
    }

    pub fn view(&self) -> WorkflowView {
        WorkflowView {
            stage: self.stage,
            stage_label: self.stage.label(),
            position: self.stage.position(),
            total_stages: IntakeStage::ordered().len(),
            status: self.status.clone(),
            can_advance: self.can_advance(),
            missing_fields: self.missing_fields(),
            required_documents: self.required_documents(),
            remaining_housing_slots: self.snapshot.housing_choices.remaining(),
            snapshot: self.snapshot.clone(),
        }
    }

    fn ensure_editable(&self) -> Result<(), WorkflowError> {
        match &self.status {
            WorkflowStatus::Submitted { reference } => Err(WorkflowError::Frozen {
                reference: reference.clone(),
            }),
            _ => Ok(()),
        }
    }

    fn ensure_gate(&self, stage: IntakeStage) -> Result<(), WorkflowError> {
        let missing = self.gates.missing_fields(stage, &self.snapshot);
        if missing.is_empty() {
            return Ok(());
        }

        debug!(?stage, ?missing, "intake gate refused");
        Err(WorkflowError::ValidationFailed { stage, missing })
    }
}

/// Serializable progress view for API responses.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowView {
    pub stage: IntakeStage,
    pub stage_label: &'static str,
    pub position: usize,
    pub total_stages: usize,
    pub status: WorkflowStatus,
    pub can_advance: bool,
    pub missing_fields: Vec<RequiredField>,
    pub required_documents: BTreeSet<DocumentKind>,
    pub remaining_housing_slots: usize,
    pub snapshot: FormSnapshot,
}
