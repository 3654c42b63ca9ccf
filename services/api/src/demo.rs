use crate::infra::{demo_housing_options, InMemoryApplicationSubmitter};
use chrono::NaiveDate;
use clap::Args;
use std::sync::Arc;
use student_intake::error::AppError;
use student_intake::workflows::intake::{
    AcademicDetails, AdvanceOutcome, AidSource, Attachment, DocumentKind, DocumentPolicy,
    EmergencyContact, FinancialDetails, Gender, GuarantorDetails, HousingPreferences,
    IdentityDetails, IncomeBracket, IntakeService, IntakeServiceError, RoomType, SectionUpdate,
    SessionId, SessionView, StageGates, StaticCatalog, WorkflowError, YearOfStudy,
    DEFAULT_MAX_ATTACHMENT_BYTES,
};

type DemoService = IntakeService<StaticCatalog, InMemoryApplicationSubmitter>;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Declare the applicant as an NSFAS applicant (adds the approval letter requirement)
    #[arg(long)]
    pub(crate) nsfas: bool,
    /// Make the first submission attempt fail with a simulated network error
    #[arg(long)]
    pub(crate) fail_first_submit: bool,
    /// Require the parent/guardian ID upload
    #[arg(long)]
    pub(crate) require_guardian_id: bool,
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        nsfas,
        fail_first_submit,
        require_guardian_id,
    } = args;

    let submitter = InMemoryApplicationSubmitter::failing_first(u32::from(fail_first_submit));
    let gates = StageGates::new(DocumentPolicy::new(
        require_guardian_id,
        DEFAULT_MAX_ATTACHMENT_BYTES,
    ));
    let service = DemoService::new(
        Arc::new(StaticCatalog::new(demo_housing_options())),
        Arc::new(submitter.clone()),
        gates,
    );

    println!("Student housing intake demo");
    let session = service.start().await;
    let id = session.session_id.clone();
    println!("Session {id} opened");
    print_progress(&session);

    println!("\nAttempting to continue with an empty form");
    report_refusal(service.advance(&id).await.map(|_| ()));

    fill_section(&service, &id, SectionUpdate::Identity(identity())).await?;
    fill_section(&service, &id, SectionUpdate::Academic(academic())).await?;
    fill_section(&service, &id, SectionUpdate::Financial(financial(nsfas))).await?;

    let options = service.housing_options().await;
    println!("\nResidences on offer: {}", options.len());
    for option in &options {
        let (change, view) = service.toggle_housing(&id, option.id).await?;
        println!(
            "  {} ({}): {:?}, {} slot(s) left",
            option.name, option.address, change, view.workflow.remaining_housing_slots
        );
    }
    fill_section(&service, &id, SectionUpdate::Preferences(preferences())).await?;
    fill_section(&service, &id, SectionUpdate::Guarantor(guarantor())).await?;

    let view = service.view(&id).await?;
    println!("\nRequired documents");
    for kind in &view.workflow.required_documents {
        println!("- {}", kind.label());
    }
    for (kind, file_name) in [
        (DocumentKind::StudentCard, "student-card.jpg"),
        (DocumentKind::StudentId, "id-document.pdf"),
        (DocumentKind::RegistrationProof, "proof-of-registration.pdf"),
    ] {
        service.attach_document(&id, kind, upload(file_name)).await?;
    }
    if require_guardian_id {
        service
            .attach_document(&id, DocumentKind::GuardianId, upload("guardian-id.pdf"))
            .await?;
    }
    if nsfas {
        println!("\nContinuing before the NSFAS letter is uploaded");
        report_refusal(service.advance(&id).await.map(|_| ()));
        service
            .attach_document(&id, DocumentKind::NsfasLetter, upload("nsfas-approval.pdf"))
            .await?;
    }
    let (_, view) = service.advance(&id).await?;
    print_progress(&view);

    service
        .update_section(&id, SectionUpdate::Confirmation { confirmed: true })
        .await?;

    println!("\nSubmitting application");
    let reference = match service.advance(&id).await {
        Ok((AdvanceOutcome::Submitted(reference), _)) => reference,
        Ok((AdvanceOutcome::Moved { to, .. }, _)) => {
            println!("  Review is not the last stage; moved to {to}");
            return Ok(());
        }
        Err(IntakeServiceError::Workflow(WorkflowError::Submission(error))) => {
            println!(
                "  Submission failed ({}, retryable: {}): {}",
                error.kind,
                error.kind.is_retryable(),
                error.message
            );
            let view = service.view(&id).await?;
            println!("  Still at: {}", view.workflow.stage_label);
            println!("  Retrying with the same answers");
            service.submit(&id).await?.0
        }
        Err(error) => return Err(error.into()),
    };

    println!("  Reference: {reference}");
    println!("  Applications recorded: {}", submitter.accepted().len());

    println!("\nEditing after submission");
    report_refusal(service.retreat(&id).await.map(|_| ()));
    Ok(())
}

async fn fill_section(
    service: &DemoService,
    id: &SessionId,
    update: SectionUpdate,
) -> Result<(), AppError> {
    service.update_section(id, update).await?;
    let (_, view) = service.advance(id).await?;
    print_progress(&view);
    Ok(())
}

fn print_progress(view: &SessionView) {
    let workflow = &view.workflow;
    println!(
        "Stage {}/{}: {}",
        workflow.position, workflow.total_stages, workflow.stage_label
    );
}

fn report_refusal(result: Result<(), IntakeServiceError>) {
    match result {
        Ok(()) => println!("  Accepted"),
        Err(IntakeServiceError::Workflow(WorkflowError::ValidationFailed { stage, missing })) => {
            println!("  {stage} cannot be left yet; missing:");
            for field in missing {
                println!("  - {field}");
            }
        }
        Err(error) => println!("  Refused: {error}"),
    }
}

fn upload(file_name: &str) -> Attachment {
    Attachment {
        file_name: file_name.to_string(),
        size_bytes: 240 * 1024,
        content_type: None,
        storage_key: Some(format!("demo/{file_name}")),
    }
}

fn identity() -> IdentityDetails {
    IdentityDetails {
        first_name: "Thandiwe".to_string(),
        last_name: "Mokoena".to_string(),
        national_id: "0203150123087".to_string(),
        email: "thandiwe.mokoena@students.wits.ac.za".to_string(),
        phone: "+27 82 555 0142".to_string(),
        date_of_birth: NaiveDate::from_ymd_opt(2002, 3, 15),
        gender: Some(Gender::Female),
        nationality: "South African".to_string(),
        emergency_contact: EmergencyContact {
            name: "Sipho Mokoena".to_string(),
            phone: "+27 83 555 0199".to_string(),
            relationship: "Father".to_string(),
        },
    }
}

fn academic() -> AcademicDetails {
    AcademicDetails {
        institution: "wits".to_string(),
        student_number: "2456789".to_string(),
        faculty: "engineering".to_string(),
        year_of_study: Some(YearOfStudy::SecondYear),
        degree_program: "BSc Civil Engineering".to_string(),
        expected_completion: NaiveDate::from_ymd_opt(2027, 12, 1),
    }
}

fn financial(nsfas: bool) -> FinancialDetails {
    FinancialDetails {
        aid_source: Some(if nsfas {
            AidSource::Nsfas
        } else {
            AidSource::ParentFunded
        }),
        nsfas_applicant: nsfas,
        guardian_income: Some(if nsfas {
            IncomeBracket::R50kTo100k
        } else {
            IncomeBracket::R200kTo350k
        }),
        ..FinancialDetails::default()
    }
}

fn preferences() -> HousingPreferences {
    HousingPreferences {
        room_type: Some(RoomType::Single),
        special_requirements: "Ground floor room preferred".to_string(),
        ..HousingPreferences::default()
    }
}

fn guarantor() -> GuarantorDetails {
    GuarantorDetails {
        name: "Sipho Mokoena".to_string(),
        national_id: "7004125123081".to_string(),
        phone: "+27 83 555 0199".to_string(),
        email: "sipho.mokoena@example.co.za".to_string(),
        address: "14 Jacaranda St, Soweto".to_string(),
    }
}
