//! Transition-table behaviour of the engine against the in-memory store.

mod common;

use assert_matches::assert_matches;
use clubflow_core::error::CoreError;
use clubflow_core::payload::TransitionPayload;
use clubflow_core::roles::Actor;
use clubflow_core::workflow::{DefenseOutcome, RequestState, Transition};
use clubflow_workflow::DocumentUpload;

use common::*;

fn none() -> TransitionPayload {
    TransitionPayload::default()
}

// ---------------------------------------------------------------------------
// Happy path
// ---------------------------------------------------------------------------

#[tokio::test]
async fn happy_path_ends_approved_with_a_provisioned_club() {
    let h = harness();
    let id = create_in(&h, RequestState::FinalFormApproved).await;

    let request = h.engine.get_request(id).await.unwrap();
    assert_eq!(request.state, "FINAL_FORM_APPROVED");
    assert_eq!(request.reviewer_id, Some(REVIEWER));
    assert_eq!(request.deadline_at, None);

    assert_eq!(h.provisioner.calls(), vec![id]);
    let row = provisioning_row(&h, id).await;
    assert_eq!(row.club_id, h.provisioner.club_for(id));

    let history = h.engine.list_history(id, 100, 0).await.unwrap();
    assert_eq!(history.len(), 12);
    assert_eq!(history.first().unwrap().transition, "create");
    assert_eq!(history.last().unwrap().transition, "approve-final-form");

    assert_eq!(
        h.engine.verify_history(id).await.unwrap(),
        RequestState::FinalFormApproved
    );
    assert!(h
        .engine
        .allowed_transitions(id, student())
        .await
        .unwrap()
        .is_empty());
}

// ---------------------------------------------------------------------------
// Rejection and resubmission
// ---------------------------------------------------------------------------

#[tokio::test]
async fn rejected_proposal_cannot_be_approved_until_resubmitted() {
    let h = harness();
    let id = create_in(&h, RequestState::ProposalSubmitted).await;

    let rejected = h
        .engine
        .reject_proposal(id, reviewer(), TransitionPayload::rejection("Budget missing"))
        .await
        .unwrap();
    assert_eq!(rejected.request.state, "PROPOSAL_REJECTED");
    assert_eq!(
        rejected.request.rejection_reason.as_deref(),
        Some("Budget missing")
    );
    assert_eq!(rejected.history_entry.note.as_deref(), Some("Budget missing"));

    let err = h
        .engine
        .approve_proposal(id, reviewer(), none())
        .await
        .unwrap_err();
    assert_matches!(
        err.as_core(),
        Some(CoreError::IllegalTransition { transition: "approve-proposal", .. })
    );

    let resubmitted = h
        .engine
        .submit_proposal(id, student(), document("Proposal v2"))
        .await
        .unwrap();
    assert_eq!(resubmitted.request.state, "PROPOSAL_SUBMITTED");
    assert_eq!(resubmitted.request.rejection_reason, None);
    assert_eq!(resubmitted.document.unwrap().version, 2);

    h.engine.approve_proposal(id, reviewer(), none()).await.unwrap();
}

#[tokio::test]
async fn rejection_requires_a_reason() {
    let h = harness();
    let id = create_in(&h, RequestState::Submitted).await;

    let err = h
        .engine
        .reject_contact(id, reviewer(), TransitionPayload::rejection("   "))
        .await
        .unwrap_err();
    assert_matches!(err.as_core(), Some(CoreError::Validation(_)));

    let request = h.engine.get_request(id).await.unwrap();
    assert_eq!(request.state, "SUBMITTED");
}

#[tokio::test]
async fn contact_rejection_is_terminal() {
    let h = harness();
    let id = create_in(&h, RequestState::Submitted).await;

    h.engine
        .reject_contact(id, reviewer(), TransitionPayload::rejection("Duplicate club"))
        .await
        .unwrap();

    for transition in [Transition::Cancel, Transition::Reassign, Transition::ConfirmContact] {
        let payload = TransitionPayload::reviewer(OTHER_STAFF);
        let actor = if transition == Transition::Reassign { admin() } else { student() };
        let err = h.engine.apply(id, transition, actor, payload).await.unwrap_err();
        assert_matches!(err.as_core(), Some(CoreError::IllegalTransition { .. }));
    }
}

// ---------------------------------------------------------------------------
// Authorization
// ---------------------------------------------------------------------------

#[tokio::test]
async fn forbidden_actor_leaves_request_untouched() {
    let h = harness();
    let id = create_in(&h, RequestState::Submitted).await;
    let before = h.engine.get_request(id).await.unwrap();
    let history_before = h.engine.list_history(id, 100, 0).await.unwrap().len();

    let err = h
        .engine
        .confirm_contact(id, student(), none())
        .await
        .unwrap_err();
    assert_matches!(err.as_core(), Some(CoreError::Forbidden(_)));

    let err = h
        .engine
        .confirm_contact(id, other_staff(), none())
        .await
        .unwrap_err();
    assert_matches!(err.as_core(), Some(CoreError::Forbidden(_)));

    let after = h.engine.get_request(id).await.unwrap();
    assert_eq!(after.lock_version, before.lock_version);
    assert_eq!(after.state, before.state);
    assert_eq!(
        h.engine.list_history(id, 100, 0).await.unwrap().len(),
        history_before
    );
}

#[tokio::test]
async fn only_the_creator_drives_student_steps() {
    let h = harness();
    let id = create(&h).await;

    let err = h
        .engine
        .submit(id, Actor::student(OTHER_STUDENT), none())
        .await
        .unwrap_err();
    assert_matches!(err.as_core(), Some(CoreError::Forbidden(_)));
}

#[tokio::test]
async fn only_students_create_requests() {
    let h = harness();

    let err = h
        .engine
        .create_request(reviewer(), create_payload("Chess Club", "CHESS"))
        .await
        .unwrap_err();
    assert_matches!(err.as_core(), Some(CoreError::Forbidden(_)));

    let err = h
        .engine
        .create_request(student(), create_payload("Chess Club", "chess club"))
        .await
        .unwrap_err();
    assert_matches!(err.as_core(), Some(CoreError::Validation(_)));
}

#[tokio::test]
async fn create_and_delete_are_not_routed_through_apply() {
    let h = harness();
    let id = create(&h).await;

    for transition in [Transition::Create, Transition::Delete] {
        let err = h
            .engine
            .apply(id, transition, student(), none())
            .await
            .unwrap_err();
        assert_matches!(err.as_core(), Some(CoreError::Validation(_)));
    }
}

// ---------------------------------------------------------------------------
// Reviewer binding
// ---------------------------------------------------------------------------

#[tokio::test]
async fn receive_binds_the_acting_staff_member() {
    let h = harness();
    let id = create(&h).await;
    h.engine.submit(id, student(), none()).await.unwrap();

    let received = h.engine.receive(id, other_staff(), none()).await.unwrap();
    assert_eq!(received.request.reviewer_id, Some(OTHER_STAFF));
    assert_eq!(received.request.state, "SUBMITTED");

    let err = h
        .engine
        .assign(id, admin(), TransitionPayload::reviewer(REVIEWER))
        .await
        .unwrap_err();
    assert_matches!(err.as_core(), Some(CoreError::IllegalTransition { .. }));
}

#[tokio::test]
async fn assign_rejects_non_staff_reviewers() {
    let h = harness();
    let id = create(&h).await;
    h.engine.submit(id, student(), none()).await.unwrap();

    for candidate in [OTHER_STUDENT, 999] {
        let err = h
            .engine
            .assign(id, admin(), TransitionPayload::reviewer(candidate))
            .await
            .unwrap_err();
        assert_matches!(err.as_core(), Some(CoreError::Validation(_)));
    }

    let err = h.engine.assign(id, admin(), none()).await.unwrap_err();
    assert_matches!(err.as_core(), Some(CoreError::Validation(_)));
}

#[tokio::test]
async fn reassign_is_admin_only_and_moves_reviewer_rights() {
    let h = harness();
    let id = create_in(&h, RequestState::ContactConfirmed).await;

    let err = h
        .engine
        .reassign(id, reviewer(), TransitionPayload::reviewer(OTHER_STAFF))
        .await
        .unwrap_err();
    assert_matches!(err.as_core(), Some(CoreError::Forbidden(_)));

    let moved = h
        .engine
        .reassign(id, admin(), TransitionPayload::reviewer(OTHER_STAFF))
        .await
        .unwrap();
    assert_eq!(moved.request.state, "CONTACT_CONFIRMED");
    assert_eq!(moved.request.reviewer_id, Some(OTHER_STAFF));

    let err = h
        .engine
        .request_proposal(id, reviewer(), none())
        .await
        .unwrap_err();
    assert_matches!(err.as_core(), Some(CoreError::Forbidden(_)));

    h.engine
        .request_proposal(id, other_staff(), none())
        .await
        .unwrap();
}

#[tokio::test]
async fn reassign_in_a_rejected_state_keeps_the_reason() {
    let h = harness();

    let proposal = create_in(&h, RequestState::ProposalSubmitted).await;
    h.engine
        .reject_proposal(proposal, reviewer(), TransitionPayload::rejection("incomplete"))
        .await
        .unwrap();

    let schedule = create_in(&h, RequestState::DefenseScheduleProposed).await;
    h.engine
        .reject_schedule(schedule, reviewer(), TransitionPayload::rejection("room taken"))
        .await
        .unwrap();

    for (id, state, reason) in [
        (proposal, "PROPOSAL_REJECTED", "incomplete"),
        (schedule, "DEFENSE_SCHEDULE_REJECTED", "room taken"),
    ] {
        let moved = h
            .engine
            .reassign(id, admin(), TransitionPayload::reviewer(OTHER_STAFF))
            .await
            .unwrap();
        assert_eq!(moved.request.state, state);
        assert_eq!(moved.request.reviewer_id, Some(OTHER_STAFF));
        assert_eq!(moved.request.rejection_reason.as_deref(), Some(reason));
        assert_eq!(moved.history_entry.note, None);
    }

    let resubmitted = h
        .engine
        .submit_proposal(proposal, student(), document("Proposal v2"))
        .await
        .unwrap();
    assert_eq!(resubmitted.request.rejection_reason, None);
}

#[tokio::test]
async fn unauthorized_actor_is_forbidden_even_with_a_bad_payload() {
    let h = harness();
    let id = create_in(&h, RequestState::ProposalSubmitted).await;

    let err = h
        .engine
        .reject_proposal(id, Actor::student(OTHER_STUDENT), none())
        .await
        .unwrap_err();
    assert_matches!(err.as_core(), Some(CoreError::Forbidden(_)));

    let err = h
        .engine
        .reject_proposal(id, student(), none())
        .await
        .unwrap_err();
    assert_matches!(err.as_core(), Some(CoreError::Forbidden(_)));

    let err = h
        .engine
        .create_request(reviewer(), none())
        .await
        .unwrap_err();
    assert_matches!(err.as_core(), Some(CoreError::Forbidden(_)));

    let request = h.engine.get_request(id).await.unwrap();
    assert_eq!(request.state, "PROPOSAL_SUBMITTED");
    assert_eq!(request.rejection_reason, None);
}

// ---------------------------------------------------------------------------
// Defense outcome and cancellation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn failed_defense_is_terminal() {
    let h = harness();
    let id = create_in(&h, RequestState::DefenseScheduleApproved).await;

    let completed = h
        .engine
        .complete_defense(
            id,
            reviewer(),
            TransitionPayload::defense(DefenseOutcome::Failed, Some("Unclear budget".into())),
        )
        .await
        .unwrap();
    assert_eq!(completed.request.defense_outcome.as_deref(), Some("FAILED"));
    assert_eq!(completed.history_entry.note.as_deref(), Some("Defense FAILED"));

    let err = h
        .engine
        .submit_final_form(id, student(), document("Final form"))
        .await
        .unwrap_err();
    assert_matches!(err.as_core(), Some(CoreError::IllegalTransition { .. }));

    let err = h.engine.cancel(id, student(), none()).await.unwrap_err();
    assert_matches!(err.as_core(), Some(CoreError::IllegalTransition { .. }));

    for actor in [student(), reviewer(), admin()] {
        assert!(h.engine.allowed_transitions(id, actor).await.unwrap().is_empty());
    }
}

#[tokio::test]
async fn cancel_is_limited_to_in_flight_states() {
    let h = harness();

    let draft = create(&h).await;
    let err = h.engine.cancel(draft, student(), none()).await.unwrap_err();
    assert_matches!(err.as_core(), Some(CoreError::IllegalTransition { .. }));

    let submitted_final = create_in(&h, RequestState::FinalFormSubmitted).await;
    let err = h
        .engine
        .cancel(submitted_final, student(), none())
        .await
        .unwrap_err();
    assert_matches!(err.as_core(), Some(CoreError::IllegalTransition { .. }));

    let in_flight = create_in(&h, RequestState::ProposalRequested).await;
    let err = h.engine.cancel(in_flight, reviewer(), none()).await.unwrap_err();
    assert_matches!(err.as_core(), Some(CoreError::Forbidden(_)));

    let canceled = h
        .engine
        .cancel(in_flight, student(), none().with_note("Lost interest"))
        .await
        .unwrap();
    assert_eq!(canceled.request.state, "CANCELED");
    assert_eq!(canceled.request.deadline_at, None);

    let err = h
        .engine
        .submit_proposal(in_flight, student(), document("Late"))
        .await
        .unwrap_err();
    assert_matches!(err.as_core(), Some(CoreError::IllegalTransition { .. }));
}

// ---------------------------------------------------------------------------
// Drafts
// ---------------------------------------------------------------------------

#[tokio::test]
async fn draft_can_be_edited_and_deleted_by_its_creator() {
    let h = harness();
    let id = create(&h).await;

    let edited = h
        .engine
        .update_draft(id, student(), TransitionPayload::name_revision(None, Some("CHESS2".into())))
        .await
        .unwrap();
    assert_eq!(edited.request.state, "DRAFT");
    assert_eq!(edited.request.club_code, "CHESS2");
    assert_eq!(edited.request.club_name, "Chess Club");

    let err = h
        .engine
        .delete_draft(id, Actor::student(OTHER_STUDENT))
        .await
        .unwrap_err();
    assert_matches!(err.as_core(), Some(CoreError::Forbidden(_)));

    h.engine.delete_draft(id, student()).await.unwrap();

    let err = h.engine.get_request(id).await.unwrap_err();
    assert_matches!(err.as_core(), Some(CoreError::NotFound { entity: "club_request", .. }));
    assert!(h.engine.list_history(id, 100, 0).await.unwrap().is_empty());
}

#[tokio::test]
async fn submitted_request_cannot_be_deleted() {
    let h = harness();
    let id = create(&h).await;
    h.engine.submit(id, student(), none()).await.unwrap();

    let err = h.engine.delete_draft(id, student()).await.unwrap_err();
    assert_matches!(err.as_core(), Some(CoreError::IllegalTransition { .. }));
}

// ---------------------------------------------------------------------------
// Documents and schedules
// ---------------------------------------------------------------------------

#[tokio::test]
async fn proposal_versions_increase_by_one() {
    let h = harness();
    let id = create_in(&h, RequestState::ProposalSubmitted).await;

    for round in 2..=3 {
        h.engine
            .reject_proposal(id, reviewer(), TransitionPayload::rejection("Needs work"))
            .await
            .unwrap();
        h.engine
            .submit_proposal(id, student(), document(&format!("Proposal v{round}")))
            .await
            .unwrap();
    }

    let versions: Vec<i32> = h
        .engine
        .list_proposal_versions(id)
        .await
        .unwrap()
        .iter()
        .map(|d| d.version)
        .collect();
    assert_eq!(versions, vec![1, 2, 3]);
    assert!(h.engine.list_final_form_versions(id).await.unwrap().is_empty());

    let latest = h
        .engine
        .latest_document(id, clubflow_core::documents::DocumentKind::Proposal)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(latest.title, "Proposal v3");
}

#[tokio::test]
async fn uploaded_document_can_be_submitted() {
    let h = harness();
    let id = create_in(&h, RequestState::ProposalRequested).await;

    let submission = h
        .engine
        .store_document(DocumentUpload {
            file_name: "proposal.pdf".into(),
            content: b"%PDF-1.7".to_vec(),
            title: "Founding proposal".into(),
            comment: Some("First draft".into()),
        })
        .await
        .unwrap();
    assert!(submission.document_ref.starts_with("mem://"));

    let outcome = h
        .engine
        .submit_proposal(id, student(), TransitionPayload::document(submission.clone()))
        .await
        .unwrap();
    let version = outcome.document.unwrap();
    assert_eq!(version.version, 1);
    assert_eq!(version.document_ref, submission.document_ref);
    assert_eq!(version.submitted_by, STUDENT);
}

#[tokio::test]
async fn at_most_one_schedule_is_active() {
    let h = harness();
    let id = create_in(&h, RequestState::DefenseScheduleProposed).await;

    let updated = h
        .engine
        .update_schedule(id, student(), TransitionPayload::schedule(in_days(12), "Room 202"))
        .await
        .unwrap();
    assert_eq!(updated.request.state, "DEFENSE_SCHEDULE_PROPOSED");
    assert_eq!(updated.schedule.unwrap().location, "Room 202");

    h.engine
        .reject_schedule(id, reviewer(), TransitionPayload::rejection("Room unavailable"))
        .await
        .unwrap();
    assert!(h.engine.get_defense_schedule(id).await.unwrap().is_none());

    h.engine
        .propose_defense_schedule(id, student(), TransitionPayload::schedule(in_days(14), "Hall A"))
        .await
        .unwrap();
    h.engine.approve_schedule(id, reviewer(), none()).await.unwrap();

    let schedules = h.engine.list_defense_schedules(id).await.unwrap();
    let statuses: Vec<&str> = schedules.iter().map(|s| s.status.as_str()).collect();
    assert_eq!(statuses, vec!["REJECTED", "APPROVED"]);
    assert_eq!(schedules[0].reviewer_note.as_deref(), Some("Room unavailable"));

    let active = h.engine.get_defense_schedule(id).await.unwrap().unwrap();
    assert_eq!(active.location, "Hall A");

    let err = h
        .engine
        .update_schedule(id, student(), TransitionPayload::schedule(in_days(20), "Hall B"))
        .await
        .unwrap_err();
    assert_matches!(err.as_core(), Some(CoreError::IllegalTransition { .. }));
}

#[tokio::test]
async fn schedule_in_the_past_is_rejected() {
    let h = harness();
    let id = create_in(&h, RequestState::ProposalApproved).await;

    let err = h
        .engine
        .propose_defense_schedule(id, student(), TransitionPayload::schedule(in_days(-1), "Room 101"))
        .await
        .unwrap_err();
    assert_matches!(err.as_core(), Some(CoreError::Validation(_)));
}

// ---------------------------------------------------------------------------
// Name revision
// ---------------------------------------------------------------------------

#[tokio::test]
async fn name_revision_renames_the_club_before_approval() {
    let h = harness();
    let id = create_in(&h, RequestState::FinalFormSubmitted).await;

    let requested = h
        .engine
        .request_name_revision(id, reviewer(), none().with_note("Name is taken"))
        .await
        .unwrap();
    assert_eq!(requested.request.state, "NAME_REVISION_REQUESTED");
    assert!(requested.request.deadline_at.is_some());

    let revised = h
        .engine
        .submit_name_revision(
            id,
            student(),
            TransitionPayload::name_revision(Some("Chess Society".into()), Some("CHESS_SOC".into())),
        )
        .await
        .unwrap();
    assert_eq!(revised.request.state, "FINAL_FORM_SUBMITTED");
    assert_eq!(revised.request.club_name, "Chess Society");
    assert_eq!(revised.request.deadline_at, None);
    let note = revised.history_entry.note.unwrap();
    assert!(note.contains("Chess Club"));
    assert!(note.contains("CHESS_SOC"));

    let approved = h.engine.approve_final_form(id, reviewer(), none()).await.unwrap();
    assert_matches!(
        approved.provisioning,
        Some(clubflow_workflow::ProvisioningStatus::Provisioned { .. })
    );
    let row = provisioning_row(&h, id).await;
    assert_eq!(row.club_name, "Chess Society");
    assert_eq!(row.club_code, "CHESS_SOC");
    assert_eq!(row.founder_id, STUDENT);
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

#[tokio::test]
async fn committed_transitions_are_published() {
    let h = harness();
    let mut rx = h.events.subscribe();
    let id = create(&h).await;
    h.engine.submit(id, student(), none()).await.unwrap();

    let created = rx.recv().await.unwrap();
    assert_eq!(created.event_type, "club_request.create");

    let submitted = rx.recv().await.unwrap();
    assert_eq!(submitted.event_type, "club_request.submit");
    assert_eq!(submitted.request_id, id);
    assert_eq!(submitted.actor_id, Some(STUDENT));
    assert_eq!(submitted.creator_id, Some(STUDENT));
    assert_eq!(submitted.to_state.as_deref(), Some("SUBMITTED"));
}

#[tokio::test]
async fn refused_transitions_publish_nothing() {
    let h = harness();
    let id = create(&h).await;
    let mut rx = h.events.subscribe();

    let _ = h.engine.confirm_contact(id, reviewer(), none()).await.unwrap_err();
    assert!(rx.try_recv().is_err());
}
