#![allow(dead_code)]

use std::sync::Arc;

use chrono::{Duration, Utc};
use clubflow_core::documents::DocumentSubmission;
use clubflow_core::payload::TransitionPayload;
use clubflow_core::roles::{Actor, Role};
use clubflow_core::types::{DbId, Timestamp};
use clubflow_core::workflow::{DefenseOutcome, RequestState};
use clubflow_db::models::club_provisioning::ClubProvisioning;
use clubflow_events::EventBus;
use clubflow_workflow::store::{InMemoryWorkflowStore, WorkflowStore};
use clubflow_workflow::testing::{InMemoryDocumentStorage, RecordingProvisioner, StaticIdentityProvider};
use clubflow_workflow::{TransitionEngine, WorkflowConfig};

pub const STUDENT: DbId = 1;
pub const OTHER_STUDENT: DbId = 2;
pub const REVIEWER: DbId = 10;
pub const OTHER_STAFF: DbId = 11;
pub const ADMIN: DbId = 20;

pub fn student() -> Actor {
    Actor::student(STUDENT)
}

pub fn reviewer() -> Actor {
    Actor::staff(REVIEWER)
}

pub fn other_staff() -> Actor {
    Actor::staff(OTHER_STAFF)
}

pub fn admin() -> Actor {
    Actor::admin(ADMIN)
}

/// Engine wired to in-memory collaborators, with handles kept for asserts.
pub struct Harness {
    pub engine: TransitionEngine,
    pub store: Arc<InMemoryWorkflowStore>,
    pub provisioner: Arc<RecordingProvisioner>,
    pub events: Arc<EventBus>,
}

pub fn harness() -> Harness {
    let store = Arc::new(InMemoryWorkflowStore::new());
    let provisioner = Arc::new(RecordingProvisioner::new());
    let events = Arc::new(EventBus::default());
    let identity = StaticIdentityProvider::new()
        .with(STUDENT, Role::Student)
        .with(OTHER_STUDENT, Role::Student)
        .with(REVIEWER, Role::Staff)
        .with(OTHER_STAFF, Role::Staff)
        .with(ADMIN, Role::Admin);

    let engine = TransitionEngine::new(
        store.clone(),
        Arc::new(identity),
        Arc::new(InMemoryDocumentStorage::new()),
        provisioner.clone(),
        events.clone(),
        &WorkflowConfig::default(),
    );

    Harness {
        engine,
        store,
        provisioner,
        events,
    }
}

pub fn create_payload(name: &str, code: &str) -> TransitionPayload {
    TransitionPayload {
        club_name: Some(name.to_string()),
        club_code: Some(code.to_string()),
        ..Default::default()
    }
}

pub fn document(title: &str) -> TransitionPayload {
    TransitionPayload::document(DocumentSubmission {
        title: title.to_string(),
        comment: None,
        document_ref: format!("mem://{title}"),
    })
}

pub fn in_days(days: i64) -> Timestamp {
    Utc::now() + Duration::days(days)
}

pub async fn create(h: &Harness) -> DbId {
    h.engine
        .create_request(student(), create_payload("Chess Club", "CHESS"))
        .await
        .unwrap()
        .request
        .id
}

/// Drive a fresh request along the happy path until it reaches `target`.
pub async fn create_in(h: &Harness, target: RequestState) -> DbId {
    let id = create(h).await;
    let e = &h.engine;
    let none = TransitionPayload::default;

    let steps: Vec<RequestState> = vec![
        RequestState::Submitted,
        RequestState::ContactConfirmed,
        RequestState::ProposalRequested,
        RequestState::ProposalSubmitted,
        RequestState::ProposalApproved,
        RequestState::DefenseScheduleProposed,
        RequestState::DefenseScheduleApproved,
        RequestState::DefenseCompleted,
        RequestState::FinalFormSubmitted,
        RequestState::FinalFormApproved,
    ];
    if target == RequestState::Draft {
        return id;
    }

    for step in steps {
        match step {
            RequestState::Submitted => {
                e.submit(id, student(), none()).await.unwrap();
                e.assign(id, admin(), TransitionPayload::reviewer(REVIEWER))
                    .await
                    .unwrap();
            }
            RequestState::ContactConfirmed => {
                e.confirm_contact(id, reviewer(), none()).await.unwrap();
            }
            RequestState::ProposalRequested => {
                e.request_proposal(id, reviewer(), none()).await.unwrap();
            }
            RequestState::ProposalSubmitted => {
                e.submit_proposal(id, student(), document("Proposal v1"))
                    .await
                    .unwrap();
            }
            RequestState::ProposalApproved => {
                e.approve_proposal(id, reviewer(), none()).await.unwrap();
            }
            RequestState::DefenseScheduleProposed => {
                e.propose_defense_schedule(
                    id,
                    student(),
                    TransitionPayload::schedule(in_days(10), "Room 101"),
                )
                .await
                .unwrap();
            }
            RequestState::DefenseScheduleApproved => {
                e.approve_schedule(id, reviewer(), none()).await.unwrap();
            }
            RequestState::DefenseCompleted => {
                e.complete_defense(
                    id,
                    reviewer(),
                    TransitionPayload::defense(DefenseOutcome::Passed, None),
                )
                .await
                .unwrap();
            }
            RequestState::FinalFormSubmitted => {
                e.submit_final_form(id, student(), document("Final form"))
                    .await
                    .unwrap();
            }
            RequestState::FinalFormApproved => {
                e.approve_final_form(id, reviewer(), none()).await.unwrap();
            }
            _ => unreachable!(),
        }
        if step == target {
            return id;
        }
    }
    panic!("{target} is not on the happy path");
}

pub async fn provisioning_row(h: &Harness, id: DbId) -> ClubProvisioning {
    h.store.find_provisioning(id).await.unwrap().unwrap()
}
