mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use common::{Call, FakeApi, ScriptedPrompter};
use tripbook::api::PaymentIntent;
use tripbook::error::BookingError;
use tripbook::flow::{split_name, BookingFlow, FlowOptions, FlowState, Submission, CANCEL_ON_BACK};
use tripbook::passenger::PassengerField;
use tripbook::storage::{DraftBookingStore, SharedStore};

fn flow_with(api: &Arc<FakeApi>, store: &SharedStore) -> BookingFlow {
    let mut flow = BookingFlow::new(
        common::trip("t-1", "Siwa", "Cairo"),
        api.clone(),
        Arc::clone(store),
        FlowOptions::default(),
    );
    flow.set_seats(common::seats());
    flow
}

fn ready_flow(api: &Arc<FakeApi>, store: &SharedStore) -> BookingFlow {
    let mut flow = flow_with(api, store);
    let form = flow.form_mut();
    form.booker_name = "Mona Adel Hassan".into();
    form.booker_email = "mona@example.com".into();
    form.set_phone("+201012345678");
    form.update(0, PassengerField::Name, "Mona Adel");
    form.update(0, PassengerField::PassportNumberOrIdNumber, "A1234567");
    assert!(flow.toggle_seat("s-1A"));
    flow
}

async fn awaiting_payment(api: &Arc<FakeApi>, store: &SharedStore) -> BookingFlow {
    let mut flow = ready_flow(api, store);
    flow.submit().await.unwrap();
    flow
}

#[tokio::test]
async fn unauthenticated_submit_saves_draft_without_calling_api() {
    let api = FakeApi::shared();
    let store = common::store();
    let closed = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&closed);
    let mut flow = ready_flow(&api, &store).on_close(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let outcome = flow.submit().await.unwrap();

    assert_eq!(
        outcome,
        Submission::SignInRequired {
            sign_in_url: "/signin".into()
        }
    );
    assert!(api.calls().is_empty());
    assert_eq!(flow.state(), &FlowState::Closed);
    assert_eq!(closed.load(Ordering::SeqCst), 1);

    let draft = DraftBookingStore::new(Arc::clone(&store)).load().unwrap();
    assert_eq!(draft.selected_seats, vec!["s-1A".to_string()]);
    assert_eq!(draft.booker_phone, "+201012345678");
    assert_eq!(draft.from, "Siwa");
    assert_eq!(draft.to, "Cairo");
    assert_eq!(draft.trip_id(), Some("t-1"));
    assert!(!draft.should_reopen_modal);
    assert_eq!(draft.total_amount, 120.0);
}

#[tokio::test]
async fn authenticated_submit_books_and_awaits_payment() {
    let api = FakeApi::shared();
    let store = common::signed_in_store();
    let mut flow = ready_flow(&api, &store);

    let outcome = flow.submit().await.unwrap();

    assert_eq!(
        outcome,
        Submission::AwaitingPayment {
            booking_id: "bk-1".into(),
            redirect_url: "https://pay/x".into()
        }
    );
    assert_eq!(flow.current_booking_id(), Some("bk-1"));
    assert_eq!(flow.payment_url(), Some("https://pay/x"));
    assert!(!flow.is_loading());

    let calls = api.calls();
    assert_eq!(calls.len(), 2);
    match &calls[0] {
        Call::Book(request) => {
            assert_eq!(request.trip_id.as_deref(), Some("t-1"));
            assert_eq!(request.seat_ids, vec!["s-1A".to_string()]);
            assert_eq!(request.passengers[0].name, "Mona Adel");
        }
        other => panic!("expected booking call, got {other:?}"),
    }
    match &calls[1] {
        Call::Intent(id, billing) => {
            assert_eq!(id, "bk-1");
            assert_eq!(billing.first_name, "Mona");
            assert_eq!(billing.last_name, "Adel Hassan");
            assert_eq!(billing.city, "Cairo");
            assert_eq!(billing.country, "EG");
            assert_eq!(billing.phone, "+201012345678");
        }
        other => panic!("expected payment intent call, got {other:?}"),
    }
}

#[tokio::test]
async fn payment_intent_success_clears_draft() {
    let api = FakeApi::shared();
    let store = common::signed_in_store();
    let mut flow = ready_flow(&api, &store);
    let drafts = DraftBookingStore::new(Arc::clone(&store));
    drafts.save(&flow.draft()).unwrap();

    flow.submit().await.unwrap();

    assert!(drafts.load().is_none());
}

#[tokio::test]
async fn close_while_awaiting_payment_cancels_booking() {
    let api = FakeApi::shared();
    let store = common::signed_in_store();
    let mut flow = awaiting_payment(&api, &store).await;

    let handle = flow.close().expect("cancellation should be spawned");
    handle.await.unwrap();

    assert_eq!(api.cancels(), vec!["bk-1".to_string()]);
    assert_eq!(flow.state(), &FlowState::Closed);
    assert_eq!(flow.current_booking_id(), None);
}

#[tokio::test]
async fn close_without_booking_cancels_nothing() {
    let api = FakeApi::shared();
    let store = common::signed_in_store();
    let mut flow = ready_flow(&api, &store);

    assert!(flow.close().is_none());
    assert!(flow.close().is_none());
    assert_eq!(flow.state(), &FlowState::Closed);
    assert!(api.calls().is_empty());
}

#[tokio::test]
async fn toggling_twice_restores_selection() {
    let api = FakeApi::shared();
    let store = common::store();
    let mut flow = flow_with(&api, &store);
    flow.set_adults(2);

    assert!(flow.toggle_seat("s-1B"));
    assert!(flow.seats().iter().any(|s| s.id == "s-1B" && s.is_selected));
    assert!(flow.toggle_seat("s-1B"));

    assert!(flow.selected_seats().is_empty());
    assert!(flow.seats().iter().all(|s| !s.is_selected));
}

#[tokio::test]
async fn toggle_at_capacity_is_ignored() {
    let api = FakeApi::shared();
    let store = common::store();
    let mut flow = flow_with(&api, &store);

    assert!(flow.toggle_seat("s-1A"));
    assert!(!flow.toggle_seat("s-1B"));

    assert_eq!(flow.selected_seats(), ["s-1A".to_string()]);
}

#[tokio::test]
async fn unavailable_and_unknown_seats_cannot_be_selected() {
    let api = FakeApi::shared();
    let store = common::store();
    let mut flow = flow_with(&api, &store);

    assert!(!flow.toggle_seat("s-1C"));
    assert!(!flow.toggle_seat("nope"));
    assert!(flow.selected_seats().is_empty());
}

#[tokio::test]
async fn seat_labels_resolve_to_ids() {
    let api = FakeApi::shared();
    let store = common::store();
    let flow = flow_with(&api, &store);

    assert_eq!(flow.seat_id_for("1d"), Some("s-1D"));
    assert_eq!(flow.seat_id_for("s-1A"), Some("s-1A"));
    assert_eq!(flow.seat_id_for("9Z"), None);
}

#[tokio::test]
async fn go_back_declined_keeps_booking() {
    let api = FakeApi::shared();
    let store = common::signed_in_store();
    let mut flow = awaiting_payment(&api, &store).await;
    let prompter = ScriptedPrompter::answering(&[false]);

    assert!(!flow.go_back(&prompter).await.unwrap());

    assert_eq!(prompter.questions(), vec![CANCEL_ON_BACK.to_string()]);
    assert!(api.cancels().is_empty());
    assert_eq!(flow.current_booking_id(), Some("bk-1"));
    assert_eq!(flow.payment_url(), Some("https://pay/x"));
}

#[tokio::test]
async fn go_back_confirmed_cancels_and_returns_to_form() {
    let api = FakeApi::shared();
    let store = common::signed_in_store();
    let mut flow = awaiting_payment(&api, &store).await;
    let prompter = ScriptedPrompter::answering(&[true]);

    assert!(flow.go_back(&prompter).await.unwrap());

    assert_eq!(api.cancels(), vec!["bk-1".to_string()]);
    assert_eq!(flow.state(), &FlowState::SelectingSeatsAndDetails);
    assert_eq!(flow.current_booking_id(), None);
    assert_eq!(flow.selected_seats(), ["s-1A".to_string()]);
}

#[tokio::test]
async fn go_back_ignores_cancel_failure() {
    let api = FakeApi::shared();
    *api.cancel.lock().unwrap() = Err(BookingError::CancelFailed(500));
    let store = common::signed_in_store();
    let mut flow = awaiting_payment(&api, &store).await;

    assert!(flow.go_back(&ScriptedPrompter::answering(&[true])).await.unwrap());

    assert_eq!(flow.state(), &FlowState::SelectingSeatsAndDetails);
    assert_eq!(flow.current_booking_id(), None);
}

#[tokio::test]
async fn go_back_outside_payment_is_rejected() {
    let api = FakeApi::shared();
    let store = common::signed_in_store();
    let mut flow = ready_flow(&api, &store);

    let err = flow.go_back(&ScriptedPrompter::default()).await.unwrap_err();
    assert!(matches!(err, BookingError::InvalidState(_)));
}

#[tokio::test]
async fn booking_failure_returns_to_form() {
    let api = FakeApi::shared();
    *api.booking.lock().unwrap() = Err(BookingError::BookingFailed(500));
    let store = common::signed_in_store();
    let mut flow = ready_flow(&api, &store);

    let err = flow.submit().await.unwrap_err();

    assert_eq!(err, BookingError::BookingFailed(500));
    assert_eq!(flow.state(), &FlowState::SelectingSeatsAndDetails);
    assert_eq!(flow.current_booking_id(), None);
    assert_eq!(api.calls().len(), 1);
}

#[tokio::test]
async fn payment_intent_failure_holds_unpaid_booking() {
    let api = FakeApi::shared();
    *api.intent.lock().unwrap() = Err(BookingError::PaymentIntentFailed(502));
    let store = common::signed_in_store();
    let mut flow = ready_flow(&api, &store);

    let err = flow.submit().await.unwrap_err();

    assert_eq!(err, BookingError::PaymentIntentFailed(502));
    assert_eq!(flow.state(), &FlowState::AwaitingPayment { redirect_url: None });
    assert_eq!(flow.current_booking_id(), Some("bk-1"));
    assert!(matches!(
        flow.complete_payment(),
        Err(BookingError::InvalidState(_))
    ));

    flow.close().unwrap().await.unwrap();
    assert_eq!(api.cancels(), vec!["bk-1".to_string()]);
}

#[tokio::test]
async fn missing_redirect_books_without_payment() {
    let api = FakeApi::shared();
    *api.intent.lock().unwrap() = Ok(PaymentIntent::default());
    let store = common::signed_in_store();
    let mut flow = ready_flow(&api, &store);

    let outcome = flow.submit().await.unwrap();

    assert_eq!(
        outcome,
        Submission::Booked {
            booking_id: "bk-1".into()
        }
    );
    assert_eq!(flow.state(), &FlowState::Closed);
    assert!(api.cancels().is_empty());
}

#[tokio::test]
async fn completing_payment_confirms_and_clears_draft() {
    let api = FakeApi::shared();
    let store = common::signed_in_store();
    let mut flow = awaiting_payment(&api, &store).await;
    let drafts = DraftBookingStore::new(Arc::clone(&store));
    drafts.save(&flow.draft()).unwrap();

    let details = flow.complete_payment().unwrap();

    assert_eq!(details.booking_id, "bk-1");
    assert_eq!(details.selected_seats, vec!["1A".to_string()]);
    assert_eq!(details.price, "$120 USD");
    assert_eq!(details.total_amount, 120.0);
    assert_eq!(details.passengers.len(), 1);
    assert_eq!(flow.state(), &FlowState::Confirmed(details));
    assert_eq!(flow.current_booking_id(), None);
    assert!(drafts.load().is_none());

    assert!(flow.close().is_none());
    assert!(api.cancels().is_empty());
}

#[tokio::test]
async fn validation_failure_blocks_submission() {
    let api = FakeApi::shared();
    let store = common::signed_in_store();
    let mut flow = ready_flow(&api, &store);
    flow.toggle_seat("s-1A");

    let err = flow.submit().await.unwrap_err();

    assert!(matches!(err, BookingError::Validation(_)));
    assert!(flow.validation_error().is_some());
    assert_eq!(flow.state(), &FlowState::SelectingSeatsAndDetails);
    assert!(api.calls().is_empty());
}

#[tokio::test]
async fn double_submit_is_rejected() {
    let api = FakeApi::shared();
    let store = common::signed_in_store();
    let mut flow = awaiting_payment(&api, &store).await;

    let err = flow.submit().await.unwrap_err();

    assert!(matches!(err, BookingError::InvalidState(_)));
    assert_eq!(api.calls().len(), 2);
}

#[tokio::test]
async fn changing_adults_resets_passengers() {
    let api = FakeApi::shared();
    let store = common::store();
    let mut flow = ready_flow(&api, &store);

    flow.set_adults(2);

    assert_eq!(flow.form().passengers().len(), 2);
    assert!(flow.form().passengers().iter().all(|p| p.name.is_empty()));
}

#[tokio::test]
async fn draft_round_trips_through_restore() {
    let api = FakeApi::shared();
    let store = common::store();
    let mut source = ready_flow(&api, &store);
    source.set_infants(1);
    let draft = source.draft();

    let mut restored = flow_with(&api, &store);
    restored.restore(&draft);

    assert_eq!(restored.form(), source.form());
    assert_eq!(restored.selected_seats(), source.selected_seats());
    assert_eq!(restored.total_amount(), 170.0);
    assert!(restored.seats().iter().any(|s| s.id == "s-1A" && s.is_selected));
}

#[test]
fn billing_name_splits_on_first_space() {
    assert_eq!(
        split_name("Mona Adel Hassan"),
        ("Mona".to_string(), "Adel Hassan".to_string())
    );
    assert_eq!(split_name("Mona"), ("Mona".to_string(), "Mona".to_string()));
}

#[tokio::test]
async fn draft_without_passengers_cannot_be_submitted() {
    let api = FakeApi::shared();
    let store = common::signed_in_store();
    let draft: tripbook::storage::DraftBooking = serde_json::from_str(
        r#"{"bookerName":"Mona Adel","bookerEmail":"m@x.com","bookerPhone":"+201012345678",
            "selectedSeats":["s-1A"],"from":"Siwa","to":"Cairo"}"#,
    )
    .unwrap();
    let mut flow = flow_with(&api, &store);

    flow.restore(&draft);

    assert_eq!(flow.form().number_of_adults(), 1);
    assert_eq!(flow.form().passengers().len(), 1);
    let err = flow.submit().await.unwrap_err();
    assert!(matches!(err, BookingError::Validation(_)));
    assert!(api.calls().is_empty());
}

#[tokio::test]
async fn zero_adults_still_needs_one_seat() {
    let api = FakeApi::shared();
    let store = common::store();
    let mut flow = ready_flow(&api, &store);
    flow.toggle_seat("s-1A");

    flow.set_adults(0);

    assert_eq!(flow.form().number_of_adults(), 1);
    assert!(!flow.form().is_complete(flow.selected_seats().len()));
}
