use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::response::Response;
use serde_json::Value;

use crate::workflows::intake::catalog::{CatalogError, HousingCatalog, StaticCatalog};
use crate::workflows::intake::domain::{
    AcademicDetails, AidSource, ApplicationReference, Attachment, DocumentKind, FinancialDetails,
    GuarantorDetails, HousingOption, HousingOptionId, HousingPreferences, IdentityDetails,
    IncomeBracket, RoomType, SectionUpdate, YearOfStudy,
};
use crate::workflows::intake::gates::StageGates;
use crate::workflows::intake::machine::IntakeWorkflow;
use crate::workflows::intake::service::{IntakeService, SessionId};
use crate::workflows::intake::submission::{
    ApplicationPayload, ApplicationSubmitter, SubmissionError,
};

pub(super) fn housing_options() -> Vec<HousingOption> {
    [
        (101, "Braamfontein Heights", "12 Jorissen St, Braamfontein"),
        (102, "Auckland Park Lofts", "5 Kingsway Ave, Auckland Park"),
        (103, "Parktown Residence", "31 Victoria Ave, Parktown"),
        (104, "Melville Commons", "8 7th St, Melville"),
    ]
    .into_iter()
    .map(|(id, name, address)| HousingOption {
        id: HousingOptionId(id),
        name: name.to_string(),
        address: address.to_string(),
        price_min: Some(3800),
        price_max: Some(5200),
        nsfas_accredited: id % 2 == 1,
    })
    .collect()
}

pub(super) fn identity() -> IdentityDetails {
    IdentityDetails {
        first_name: "Thandiwe".to_string(),
        last_name: "Mokoena".to_string(),
        national_id: "0203150123087".to_string(),
        email: "thandiwe.mokoena@students.wits.ac.za".to_string(),
        phone: "+27 82 555 0142".to_string(),
        nationality: "South African".to_string(),
        ..IdentityDetails::default()
    }
}

pub(super) fn academic() -> AcademicDetails {
    AcademicDetails {
        institution: "wits".to_string(),
        student_number: "2456789".to_string(),
        faculty: "engineering".to_string(),
        year_of_study: Some(YearOfStudy::SecondYear),
        degree_program: "BSc Civil Engineering".to_string(),
        ..AcademicDetails::default()
    }
}

pub(super) fn financial(nsfas_applicant: bool) -> FinancialDetails {
    FinancialDetails {
        aid_source: Some(if nsfas_applicant {
            AidSource::Nsfas
        } else {
            AidSource::ParentFunded
        }),
        nsfas_applicant,
        guardian_income: (!nsfas_applicant).then_some(IncomeBracket::R200kTo350k),
        ..FinancialDetails::default()
    }
}

pub(super) fn preferences() -> HousingPreferences {
    HousingPreferences {
        room_type: Some(RoomType::Single),
        ..HousingPreferences::default()
    }
}

pub(super) fn guarantor() -> GuarantorDetails {
    GuarantorDetails {
        name: "Sipho Mokoena".to_string(),
        national_id: "7004125123081".to_string(),
        phone: "+27 83 555 0199".to_string(),
        ..GuarantorDetails::default()
    }
}

pub(super) fn attachment(file_name: &str) -> Attachment {
    Attachment {
        file_name: file_name.to_string(),
        size_bytes: 180_000,
        content_type: None,
        storage_key: None,
    }
}

pub(super) fn unconditional_documents() -> [(DocumentKind, Attachment); 3] {
    [
        (DocumentKind::StudentCard, attachment("student-card.jpg")),
        (DocumentKind::StudentId, attachment("id-document.pdf")),
        (DocumentKind::RegistrationProof, attachment("registration.pdf")),
    ]
}

pub(super) fn new_workflow() -> IntakeWorkflow {
    IntakeWorkflow::new(StageGates::default(), housing_options())
}

/// Fill every stage the way an applicant would, advancing as they go, and
/// stop at the review stage without confirming.
pub(super) fn workflow_at_review(nsfas_applicant: bool) -> IntakeWorkflow {
    let mut workflow = new_workflow();
    fill_through_documents(&mut workflow, nsfas_applicant);
    if nsfas_applicant {
        workflow
            .attach_document(DocumentKind::NsfasLetter, attachment("nsfas-approval.pdf"))
            .expect("nsfas letter accepted");
    }
    workflow.advance().expect("documents gate holds");
    workflow
}

/// Fill and advance up to (and including arrival at) the documents stage,
/// attaching only the unconditional documents.
pub(super) fn fill_through_documents(workflow: &mut IntakeWorkflow, nsfas_applicant: bool) {
    let sections = [
        SectionUpdate::Identity(identity()),
        SectionUpdate::Academic(academic()),
        SectionUpdate::Financial(financial(nsfas_applicant)),
    ];
    for section in sections {
        workflow.update_section(section).expect("section accepted");
        workflow.advance().expect("gate holds");
    }

    workflow
        .toggle_housing(HousingOptionId(101))
        .expect("known option");
    workflow
        .update_section(SectionUpdate::Preferences(preferences()))
        .expect("preferences accepted");
    workflow.advance().expect("housing gate holds");

    workflow
        .update_section(SectionUpdate::Guarantor(guarantor()))
        .expect("guarantor accepted");
    workflow.advance().expect("guarantor gate holds");

    for (kind, file) in unconditional_documents() {
        workflow.attach_document(kind, file).expect("document accepted");
    }
}

/// Submitter replaying a scripted sequence of outcomes, then succeeding.
#[derive(Default)]
pub(super) struct ScriptedSubmitter {
    outcomes: Mutex<VecDeque<Result<ApplicationReference, SubmissionError>>>,
    payloads: Mutex<Vec<ApplicationPayload>>,
}

impl ScriptedSubmitter {
    pub(super) fn failing_first(error: SubmissionError) -> Self {
        let submitter = Self::default();
        submitter
            .outcomes
            .lock()
            .expect("outcome mutex poisoned")
            .push_back(Err(error));
        submitter
    }

    pub(super) fn payloads(&self) -> Vec<ApplicationPayload> {
        self.payloads.lock().expect("payload mutex poisoned").clone()
    }
}

#[async_trait]
impl ApplicationSubmitter for ScriptedSubmitter {
    async fn submit_application(
        &self,
        payload: &ApplicationPayload,
    ) -> Result<ApplicationReference, SubmissionError> {
        let attempt = {
            let mut payloads = self.payloads.lock().expect("payload mutex poisoned");
            payloads.push(payload.clone());
            payloads.len()
        };

        self.outcomes
            .lock()
            .expect("outcome mutex poisoned")
            .pop_front()
            .unwrap_or_else(|| Ok(ApplicationReference(format!("APP-{attempt:04}"))))
    }
}

pub(super) struct UnreachableCatalog;

#[async_trait]
impl HousingCatalog for UnreachableCatalog {
    async fn list_housing_options(&self) -> Result<Vec<HousingOption>, CatalogError> {
        Err(CatalogError::Unavailable("connection refused".to_string()))
    }
}

pub(super) fn build_service(
    submitter: ScriptedSubmitter,
) -> (
    Arc<IntakeService<StaticCatalog, ScriptedSubmitter>>,
    Arc<ScriptedSubmitter>,
) {
    let submitter = Arc::new(submitter);
    let service = IntakeService::new(
        Arc::new(StaticCatalog::new(housing_options())),
        submitter.clone(),
        StageGates::default(),
    );
    (Arc::new(service), submitter)
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 1024 * 64)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

/// Start a session on `service` and fill it through to a confirmed review.
pub(super) async fn confirmed_session<S>(service: &IntakeService<StaticCatalog, S>) -> SessionId
where
    S: ApplicationSubmitter + 'static,
{
    let id = service.start().await.session_id;
    let sections = [
        SectionUpdate::Identity(identity()),
        SectionUpdate::Academic(academic()),
        SectionUpdate::Financial(financial(false)),
    ];
    for section in sections {
        service.update_section(&id, section).await.expect("known session");
        service.advance(&id).await.expect("gate holds");
    }

    service
        .toggle_housing(&id, HousingOptionId(103))
        .await
        .expect("known option");
    service
        .update_section(&id, SectionUpdate::Preferences(preferences()))
        .await
        .expect("known session");
    service.advance(&id).await.expect("housing gate holds");

    service
        .update_section(&id, SectionUpdate::Guarantor(guarantor()))
        .await
        .expect("known session");
    service.advance(&id).await.expect("guarantor gate holds");

    for (kind, file) in unconditional_documents() {
        service
            .attach_document(&id, kind, file)
            .await
            .expect("accepted");
    }
    service.advance(&id).await.expect("documents gate holds");

    service
        .update_section(&id, SectionUpdate::Confirmation { confirmed: true })
        .await
        .expect("known session");
    id
}
