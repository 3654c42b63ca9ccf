use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex as SessionLock;
use tracing::{debug, info};

use super::catalog::{load_housing_options, HousingCatalog};
use super::domain::{
    ApplicationReference, Attachment, DocumentKind, HousingOption, HousingOptionId, IntakeStage,
    SectionUpdate,
};
use super::gates::StageGates;
use super::machine::{IntakeWorkflow, WorkflowError, WorkflowView};
use super::selection::SelectionChange;
use super::submission::{AdvanceOutcome, ApplicationSubmitter, SubmissionCoordinator};

/// Identifier of one applicant's in-progress intake.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

static SESSION_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_session_id() -> SessionId {
    let id = SESSION_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    SessionId(format!("intake-{id:06}"))
}

/// Session id plus the workflow's progress view.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub session_id: SessionId,
    #[serde(flatten)]
    pub workflow: WorkflowView,
}

/// Sessions untouched for this long are dropped from the registry.
pub const DEFAULT_SESSION_IDLE_TIMEOUT: Duration = Duration::from_secs(60 * 60);

/// Registry entry for one session.
pub(super) struct SessionSlot {
    pub(super) workflow: SessionLock<IntakeWorkflow>,
    submitting: AtomicBool,
    touched: Mutex<Instant>,
}

impl SessionSlot {
    fn new(workflow: IntakeWorkflow) -> Self {
        Self {
            workflow: SessionLock::new(workflow),
            submitting: AtomicBool::new(false),
            touched: Mutex::new(Instant::now()),
        }
    }

    fn touch(&self) {
        *self.touched.lock().expect("session clock poisoned") = Instant::now();
    }

    fn idle_for(&self) -> Duration {
        self.touched.lock().expect("session clock poisoned").elapsed()
    }

    fn is_busy(&self) -> bool {
        self.submitting.load(Ordering::Acquire) || self.workflow.try_lock().is_err()
    }

    /// Marks a submission as in flight until the returned claim is dropped.
    fn claim_submission(&self) -> Option<SubmissionClaim<'_>> {
        self.submitting
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| SubmissionClaim(&self.submitting))
    }
}

struct SubmissionClaim<'a>(&'a AtomicBool);

impl Drop for SubmissionClaim<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Service hosting independent intake workflows against shared collaborators.
pub struct IntakeService<C, S> {
    catalog: Arc<C>,
    coordinator: SubmissionCoordinator<S>,
    gates: StageGates,
    idle_timeout: Duration,
    sessions: Mutex<HashMap<SessionId, Arc<SessionSlot>>>,
}

impl<C, S> IntakeService<C, S>
where
    C: HousingCatalog + 'static,
    S: ApplicationSubmitter + 'static,
{
    pub fn new(catalog: Arc<C>, submitter: Arc<S>, gates: StageGates) -> Self {
        Self {
            catalog,
            coordinator: SubmissionCoordinator::new(submitter),
            gates,
            idle_timeout: DEFAULT_SESSION_IDLE_TIMEOUT,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    pub fn session_count(&self) -> usize {
        self.sessions.lock().expect("session registry poisoned").len()
    }

    /// Drop sessions idle for at least the configured timeout.
    ///
    /// Sessions with an edit or submission in progress are kept regardless.
    pub fn evict_idle(&self) -> usize {
        let mut sessions = self.sessions.lock().expect("session registry poisoned");
        let before = sessions.len();
        sessions.retain(|session_id, slot| {
            let keep = slot.is_busy() || slot.idle_for() < self.idle_timeout;
            if !keep {
                debug!(%session_id, "idle intake session evicted");
            }
            keep
        });
        before - sessions.len()
    }

    pub async fn housing_options(&self) -> Vec<HousingOption> {
        load_housing_options(self.catalog.as_ref()).await
    }

    /// Open a new workflow at the identity stage.
    pub async fn start(&self) -> SessionView {
        let options = self.housing_options().await;
        let workflow = IntakeWorkflow::new(self.gates.clone(), options);
        let session_id = next_session_id();
        let view = workflow.view();

        let evicted = self.evict_idle();
        self.sessions
            .lock()
            .expect("session registry poisoned")
            .insert(session_id.clone(), Arc::new(SessionSlot::new(workflow)));

        info!(%session_id, evicted, "intake session started");
        SessionView {
            session_id,
            workflow: view,
        }
    }

    pub async fn view(&self, id: &SessionId) -> Result<SessionView, IntakeServiceError> {
        let session = self.session(id)?;
        let workflow = session.workflow.lock().await;
        Ok(Self::session_view(id, &workflow))
    }

    pub async fn update_section(
        &self,
        id: &SessionId,
        update: SectionUpdate,
    ) -> Result<SessionView, IntakeServiceError> {
        self.with_workflow(id, |workflow| workflow.update_section(update))
            .await
    }

    pub async fn toggle_housing(
        &self,
        id: &SessionId,
        option: HousingOptionId,
    ) -> Result<(SelectionChange, SessionView), IntakeServiceError> {
        let session = self.session(id)?;
        let mut workflow = session.workflow.lock().await;
        let change = workflow.toggle_housing(option)?;
        Ok((change, Self::session_view(id, &workflow)))
    }

    pub async fn attach_document(
        &self,
        id: &SessionId,
        kind: DocumentKind,
        attachment: Attachment,
    ) -> Result<SessionView, IntakeServiceError> {
        self.with_workflow(id, |workflow| workflow.attach_document(kind, attachment))
            .await
    }

    pub async fn remove_document(
        &self,
        id: &SessionId,
        kind: DocumentKind,
    ) -> Result<SessionView, IntakeServiceError> {
        self.with_workflow(id, |workflow| workflow.remove_document(kind))
            .await
    }

    pub async fn retreat(&self, id: &SessionId) -> Result<SessionView, IntakeServiceError> {
        self.with_workflow(id, |workflow| workflow.retreat().map(|_| ()))
            .await
    }

    pub async fn jump_to(
        &self,
        id: &SessionId,
        target: IntakeStage,
    ) -> Result<SessionView, IntakeServiceError> {
        self.with_workflow(id, |workflow| workflow.jump_to(target).map(|_| ()))
            .await
    }

    /// Gated advance; from the review stage this performs the submission.
    ///
    /// Ordinary moves wait their turn behind concurrent edits; only an advance
    /// that would submit is refused while a submission is in flight.
    pub async fn advance(
        &self,
        id: &SessionId,
    ) -> Result<(AdvanceOutcome, SessionView), IntakeServiceError> {
        let session = self.session(id)?;
        if session.submitting.load(Ordering::Acquire) {
            return Err(IntakeServiceError::SubmissionInFlight(id.clone()));
        }

        let mut workflow = session.workflow.lock().await;
        let _claim = match workflow.stage() {
            IntakeStage::Review => Some(
                session
                    .claim_submission()
                    .ok_or_else(|| IntakeServiceError::SubmissionInFlight(id.clone()))?,
            ),
            _ => None,
        };
        let outcome = self.coordinator.advance(&mut workflow).await?;
        Ok((outcome, Self::session_view(id, &workflow)))
    }

    /// Submit from the review stage. Refused while another submission for
    /// the same session is still awaiting the backend.
    pub async fn submit(
        &self,
        id: &SessionId,
    ) -> Result<(ApplicationReference, SessionView), IntakeServiceError> {
        let session = self.session(id)?;
        let _claim = session
            .claim_submission()
            .ok_or_else(|| IntakeServiceError::SubmissionInFlight(id.clone()))?;
        let mut workflow = session.workflow.lock().await;
        let reference = self.coordinator.submit(&mut workflow).await?;
        Ok((reference, Self::session_view(id, &workflow)))
    }

    pub(super) fn session(&self, id: &SessionId) -> Result<Arc<SessionSlot>, IntakeServiceError> {
        let session = self
            .sessions
            .lock()
            .expect("session registry poisoned")
            .get(id)
            .cloned()
            .ok_or_else(|| IntakeServiceError::SessionNotFound(id.clone()))?;
        session.touch();
        Ok(session)
    }

    async fn with_workflow<F>(&self, id: &SessionId, edit: F) -> Result<SessionView, IntakeServiceError>
    where
        F: FnOnce(&mut IntakeWorkflow) -> Result<(), WorkflowError>,
    {
        let session = self.session(id)?;
        let mut workflow = session.workflow.lock().await;
        edit(&mut workflow)?;
        Ok(Self::session_view(id, &workflow))
    }

    fn session_view(id: &SessionId, workflow: &IntakeWorkflow) -> SessionView {
        SessionView {
            session_id: id.clone(),
            workflow: workflow.view(),
        }
    }
}

/// Error raised by the intake service.
#[derive(Debug, thiserror::Error)]
pub enum IntakeServiceError {
    #[error("intake session {0} not found")]
    SessionNotFound(SessionId),
    #[error("a submission for intake session {0} is already in flight")]
    SubmissionInFlight(SessionId),
    #[error(transparent)]
    Workflow(#[from] WorkflowError),
}
