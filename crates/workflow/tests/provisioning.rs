//! Club provisioning after final approval.

mod common;

use assert_matches::assert_matches;
use clubflow_core::error::CoreError;
use clubflow_core::payload::TransitionPayload;
use clubflow_core::workflow::RequestState;
use clubflow_events::bus::{EVENT_PROVISIONED, EVENT_PROVISIONING_FAILED};
use clubflow_workflow::background::{provisioning_retry, reconciliation};
use clubflow_workflow::{ProvisioningStatus, RetrySummary};

use common::*;

#[tokio::test]
async fn provisioning_failure_keeps_the_approval() {
    let h = harness();
    let id = create_in(&h, RequestState::FinalFormSubmitted).await;
    let mut rx = h.events.subscribe();
    h.provisioner.fail_next(1);

    let approved = h
        .engine
        .approve_final_form(id, reviewer(), TransitionPayload::default())
        .await
        .unwrap();
    assert_eq!(approved.request.state, "FINAL_FORM_APPROVED");
    assert_matches!(
        approved.provisioning.clone().unwrap().into_result(),
        Err(CoreError::Provisioning(_))
    );

    let row = provisioning_row(&h, id).await;
    assert_eq!(row.club_id, None);
    assert_eq!(row.attempts, 1);
    assert!(row.last_error.is_some());

    let transition_event = rx.recv().await.unwrap();
    assert_eq!(transition_event.event_type, "club_request.approve_final_form");
    let failure_event = rx.recv().await.unwrap();
    assert_eq!(failure_event.event_type, EVENT_PROVISIONING_FAILED);
    assert_eq!(failure_event.creator_id, Some(STUDENT));

    let pending = h.engine.list_unprovisioned(10).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(
        reconciliation::reconcile_once(h.store.as_ref(), 10).await.unwrap(),
        vec![id]
    );
}

#[tokio::test]
async fn retry_provisions_pending_requests() {
    let h = harness();
    let first = create_in(&h, RequestState::FinalFormSubmitted).await;
    let second = create_in(&h, RequestState::FinalFormSubmitted).await;
    h.provisioner.fail_next(2);

    for id in [first, second] {
        h.engine
            .approve_final_form(id, reviewer(), TransitionPayload::default())
            .await
            .unwrap();
    }

    let mut rx = h.events.subscribe();
    let summary = h.engine.provisioning().retry_pending(10).await.unwrap();
    assert_eq!(
        summary,
        RetrySummary {
            attempted: 2,
            provisioned: 2,
            failed: 0,
        }
    );
    assert_eq!(rx.recv().await.unwrap().event_type, EVENT_PROVISIONED);

    assert!(h.engine.list_unprovisioned(10).await.unwrap().is_empty());
    let row = provisioning_row(&h, first).await;
    assert_eq!(row.club_id, h.provisioner.club_for(first));
    assert!(row.provisioned_at.is_some());
    assert_eq!(row.last_error, None);

    let empty = h.engine.provisioning().retry_pending(10).await.unwrap();
    assert_eq!(empty, RetrySummary::default());
}

#[tokio::test]
async fn provisioned_request_is_not_provisioned_again() {
    let h = harness();
    let id = create_in(&h, RequestState::FinalFormApproved).await;
    let club_id = h.provisioner.club_for(id).unwrap();

    let status = h
        .engine
        .provisioning()
        .provision_request(id)
        .await
        .unwrap();
    assert_eq!(status, Some(ProvisioningStatus::Provisioned { club_id }));
    assert_eq!(h.provisioner.calls().len(), 1);
}

#[tokio::test]
async fn unapproved_request_has_nothing_to_provision() {
    let h = harness();
    let id = create_in(&h, RequestState::FinalFormSubmitted).await;

    let status = h
        .engine
        .provisioning()
        .provision_request(id)
        .await
        .unwrap();
    assert_eq!(status, None);
    assert!(h.provisioner.calls().is_empty());
}

#[tokio::test]
async fn retry_loop_drains_pending_rows_until_cancelled() {
    let h = harness();
    let id = create_in(&h, RequestState::FinalFormSubmitted).await;
    h.provisioner.fail_next(1);
    h.engine
        .approve_final_form(id, reviewer(), TransitionPayload::default())
        .await
        .unwrap();

    let cancel = tokio_util::sync::CancellationToken::new();
    let handle = tokio::spawn(provisioning_retry::run(
        std::sync::Arc::clone(h.engine.provisioning()),
        std::time::Duration::from_millis(10),
        10,
        cancel.clone(),
    ));

    for _ in 0..100 {
        if h.engine.list_unprovisioned(10).await.unwrap().is_empty() {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    cancel.cancel();
    handle.await.unwrap();

    assert!(h.engine.list_unprovisioned(10).await.unwrap().is_empty());
    assert!(h.provisioner.club_for(id).is_some());
}
