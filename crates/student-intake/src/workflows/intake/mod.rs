//! Staged student-housing application intake.
//!
//! An [`IntakeWorkflow`] walks one applicant through seven ordered stages,
//! refusing to leave a stage until its gate holds. The [`SubmissionCoordinator`]
//! hands the finished snapshot to an [`ApplicationSubmitter`] and freezes the
//! workflow once a reference comes back.

pub mod catalog;
pub mod client;
pub mod documents;
pub mod domain;
pub mod gates;
pub mod machine;
pub mod router;
pub mod selection;
pub mod service;
pub mod submission;

#[cfg(test)]
mod tests;

pub use catalog::{load_housing_options, CatalogError, HousingCatalog, StaticCatalog};
pub use client::{HttpApplicationSubmitter, HttpHousingCatalog};
pub use documents::{AttachmentRejected, DocumentPolicy, DEFAULT_MAX_ATTACHMENT_BYTES};
pub use domain::{
    AcademicDetails, AidSource, ApplicationReference, Attachment, BankingDetails,
    DietaryRequirement, DocumentKind, DocumentSlots, EmergencyContact, FinancialDetails,
    FormSnapshot, Gender, GuarantorDetails, HousingOption, HousingOptionId, HousingPreferences,
    IdentityDetails, IncomeBracket, IntakeStage, RoomType, SectionUpdate, YearOfStudy,
    MAX_HOUSING_CHOICES,
};
pub use gates::{can_advance, RequiredField, StageGates};
pub use machine::{Advance, IntakeWorkflow, WorkflowError, WorkflowStatus, WorkflowView};
pub use router::application_router;
pub use selection::{BoundedSelection, SelectionChange};
pub use service::{
    IntakeService, IntakeServiceError, SessionId, SessionView, DEFAULT_SESSION_IDLE_TIMEOUT,
};
pub use submission::{
    AdvanceOutcome, ApplicationPayload, ApplicationSubmitter, DocumentPresence,
    SubmissionCoordinator, SubmissionError, SubmissionErrorKind,
};
