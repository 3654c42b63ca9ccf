use std::sync::Arc;
use std::time::Duration;

use super::common::*;

use crate::workflows::intake::catalog::StaticCatalog;
use crate::workflows::intake::domain::{
    ApplicationReference, DocumentKind, HousingOptionId, IntakeStage, SectionUpdate,
};
use crate::workflows::intake::gates::{RequiredField, StageGates};
use crate::workflows::intake::machine::{WorkflowError, WorkflowStatus};
use crate::workflows::intake::service::{IntakeService, IntakeServiceError, SessionId};
use crate::workflows::intake::submission::{
    AdvanceOutcome, ApplicationPayload, ApplicationSubmitter, SubmissionCoordinator,
    SubmissionError, SubmissionErrorKind,
};

#[tokio::test]
async fn confirmed_review_submits_once_and_freezes() {
    let submitter = Arc::new(ScriptedSubmitter::default());
    let coordinator = SubmissionCoordinator::new(submitter.clone());
    let mut workflow = workflow_at_review(false);
    workflow.confirm_information(true).expect("editable");

    let reference = coordinator.submit(&mut workflow).await.expect("submitted");

    assert_eq!(reference, ApplicationReference("APP-0001".to_string()));
    assert_eq!(
        workflow.status(),
        &WorkflowStatus::Submitted {
            reference: reference.clone()
        }
    );
    let payloads = submitter.payloads();
    assert_eq!(payloads.len(), 1);
    assert_eq!(payloads[0].identity.first_name, "Thandiwe");
    assert_eq!(payloads[0].required_documents.len(), 3);
    assert!(payloads[0].documents[&DocumentKind::StudentCard].attached);
    assert!(!payloads[0].documents[&DocumentKind::NsfasLetter].attached);

    assert!(matches!(
        coordinator.submit(&mut workflow).await,
        Err(WorkflowError::Frozen { .. })
    ));
    assert_eq!(submitter.payloads().len(), 1);
}

#[tokio::test]
async fn unconfirmed_review_never_reaches_submitter() {
    let submitter = Arc::new(ScriptedSubmitter::default());
    let coordinator = SubmissionCoordinator::new(submitter.clone());
    let mut workflow = workflow_at_review(false);

    match coordinator.advance(&mut workflow).await {
        Err(WorkflowError::ValidationFailed { stage, missing }) => {
            assert_eq!(stage, IntakeStage::Review);
            assert_eq!(missing, vec![RequiredField::InformationConfirmed]);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert!(submitter.payloads().is_empty());
    assert_eq!(workflow.status(), &WorkflowStatus::Collecting);
}

#[tokio::test]
async fn submit_outside_review_is_refused() {
    let submitter = Arc::new(ScriptedSubmitter::default());
    let coordinator = SubmissionCoordinator::new(submitter.clone());
    let mut workflow = new_workflow();

    assert!(matches!(
        coordinator.submit(&mut workflow).await,
        Err(WorkflowError::NotAtReview {
            stage: IntakeStage::Identity
        })
    ));
    assert!(submitter.payloads().is_empty());
}

#[tokio::test]
async fn network_failure_keeps_review_and_allows_retry() {
    let submitter = Arc::new(ScriptedSubmitter::failing_first(SubmissionError::network(
        "connection reset",
    )));
    let coordinator = SubmissionCoordinator::new(submitter.clone());
    let mut workflow = workflow_at_review(true);
    workflow.confirm_information(true).expect("editable");
    let snapshot = workflow.snapshot().clone();

    match coordinator.advance(&mut workflow).await {
        Err(WorkflowError::Submission(error)) => {
            assert_eq!(error.kind, SubmissionErrorKind::Network);
            assert!(error.kind.is_retryable());
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(workflow.stage(), IntakeStage::Review);
    assert_eq!(workflow.snapshot(), &snapshot);
    assert_eq!(
        workflow.status(),
        &WorkflowStatus::Failed {
            kind: SubmissionErrorKind::Network
        }
    );

    let outcome = coordinator.advance(&mut workflow).await.expect("retry succeeds");
    assert_eq!(
        outcome,
        AdvanceOutcome::Submitted(ApplicationReference("APP-0002".to_string()))
    );
    assert!(workflow.is_submitted());

    let payloads = submitter.payloads();
    assert_eq!(payloads.len(), 2);
    assert_eq!(payloads[0].identity, payloads[1].identity);
    assert!(payloads[1]
        .required_documents
        .contains(&DocumentKind::NsfasLetter));
}

#[tokio::test]
async fn validation_rejection_is_not_retryable() {
    let submitter = Arc::new(ScriptedSubmitter::failing_first(
        SubmissionError::validation("student number already registered"),
    ));
    let coordinator = SubmissionCoordinator::new(submitter);
    let mut workflow = workflow_at_review(false);
    workflow.confirm_information(true).expect("editable");

    let error = coordinator.submit(&mut workflow).await.expect_err("rejected");
    match error {
        WorkflowError::Submission(error) => {
            assert_eq!(error.kind, SubmissionErrorKind::Validation);
            assert!(!error.kind.is_retryable());
        }
        other => panic!("unexpected error: {other:?}"),
    }

    // still editable after a failed attempt
    workflow.confirm_information(false).expect("editable");
    workflow.retreat().expect("not first");
}

#[tokio::test]
async fn service_walks_a_session_to_submission() {
    let (service, submitter) = build_service(ScriptedSubmitter::default());
    let id = confirmed_session(&service).await;

    let view = service.view(&id).await.expect("known session");
    assert_eq!(view.workflow.stage, IntakeStage::Review);
    assert!(view.workflow.can_advance);

    let (outcome, view) = service.advance(&id).await.expect("submitted");
    let reference = ApplicationReference("APP-0001".to_string());
    assert_eq!(outcome, AdvanceOutcome::Submitted(reference.clone()));
    assert_eq!(view.workflow.status, WorkflowStatus::Submitted { reference });
    assert_eq!(submitter.payloads()[0].housing_choices, vec![HousingOptionId(103)]);

    assert!(matches!(
        service.retreat(&id).await,
        Err(IntakeServiceError::Workflow(WorkflowError::Frozen { .. }))
    ));
}

#[tokio::test]
async fn service_reports_unknown_sessions() {
    let (service, _) = build_service(ScriptedSubmitter::default());
    let missing = SessionId("intake-999999".to_string());

    assert!(matches!(
        service.view(&missing).await,
        Err(IntakeServiceError::SessionNotFound(_))
    ));
    assert!(matches!(
        service.submit(&missing).await,
        Err(IntakeServiceError::SessionNotFound(_))
    ));
}

#[tokio::test]
async fn unreachable_catalog_yields_empty_housing_list() {
    let service = IntakeService::new(
        Arc::new(UnreachableCatalog),
        Arc::new(ScriptedSubmitter::default()),
        StageGates::default(),
    );

    assert!(service.housing_options().await.is_empty());
    let session = service.start().await;
    assert_eq!(session.workflow.stage, IntakeStage::Identity);
}

struct HeldSubmitter {
    entered: tokio::sync::Notify,
    release: tokio::sync::Notify,
}

#[async_trait::async_trait]
impl ApplicationSubmitter for HeldSubmitter {
    async fn submit_application(
        &self,
        _payload: &ApplicationPayload,
    ) -> Result<ApplicationReference, SubmissionError> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok(ApplicationReference("APP-HELD".to_string()))
    }
}

#[tokio::test]
async fn concurrent_submit_is_refused_while_in_flight() {
    let submitter = Arc::new(HeldSubmitter {
        entered: tokio::sync::Notify::new(),
        release: tokio::sync::Notify::new(),
    });
    let service = Arc::new(IntakeService::new(
        Arc::new(StaticCatalog::new(housing_options())),
        submitter.clone(),
        StageGates::default(),
    ));
    let id = confirmed_session(&service).await;

    let in_flight = tokio::spawn({
        let service = Arc::clone(&service);
        let id = id.clone();
        async move { service.submit(&id).await.map(|(reference, _)| reference) }
    });
    submitter.entered.notified().await;

    assert!(matches!(
        service.submit(&id).await,
        Err(IntakeServiceError::SubmissionInFlight(_))
    ));
    assert!(matches!(
        service.advance(&id).await,
        Err(IntakeServiceError::SubmissionInFlight(_))
    ));

    submitter.release.notify_one();
    let reference = in_flight
        .await
        .expect("task joins")
        .expect("first submission completes");
    assert_eq!(reference, ApplicationReference("APP-HELD".to_string()));
}

#[tokio::test]
async fn ordinary_advance_waits_for_concurrent_edit() {
    let (service, _) = build_service(ScriptedSubmitter::default());
    let id = service.start().await.session_id;
    service
        .update_section(&id, SectionUpdate::Identity(identity()))
        .await
        .expect("known session");

    let slot = service.session(&id).expect("known session");
    let held = slot.workflow.lock().await;

    let advance = tokio::spawn({
        let service = Arc::clone(&service);
        let id = id.clone();
        async move { service.advance(&id).await.map(|(outcome, _)| outcome) }
    });
    for _ in 0..5 {
        tokio::task::yield_now().await;
    }
    assert!(!advance.is_finished());

    drop(held);
    let outcome = advance
        .await
        .expect("task joins")
        .expect("advance waits instead of failing");
    assert_eq!(
        outcome,
        AdvanceOutcome::Moved {
            from: IntakeStage::Identity,
            to: IntakeStage::Academic
        }
    );
}

#[tokio::test]
async fn idle_sessions_are_evicted_on_start() {
    let service = IntakeService::new(
        Arc::new(StaticCatalog::new(housing_options())),
        Arc::new(ScriptedSubmitter::default()),
        StageGates::default(),
    )
    .with_idle_timeout(Duration::ZERO);

    let stale = service.start().await.session_id;
    let fresh = service.start().await.session_id;

    assert_eq!(service.session_count(), 1);
    assert!(matches!(
        service.view(&stale).await,
        Err(IntakeServiceError::SessionNotFound(_))
    ));
    assert!(service.view(&fresh).await.is_ok());
}

#[tokio::test]
async fn busy_sessions_survive_eviction() {
    let service = IntakeService::new(
        Arc::new(StaticCatalog::new(housing_options())),
        Arc::new(ScriptedSubmitter::default()),
        StageGates::default(),
    )
    .with_idle_timeout(Duration::ZERO);
    let id = service.start().await.session_id;

    let slot = service.session(&id).expect("known session");
    let held = slot.workflow.lock().await;
    assert_eq!(service.evict_idle(), 0);
    drop(held);

    assert_eq!(service.evict_idle(), 1);
    assert_eq!(service.session_count(), 0);
}
