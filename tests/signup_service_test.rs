mod common;

use std::sync::Arc;

use chrono::{Duration, Utc};
use shala::{
    classifier::{ClassifyAt, Mode, SignupFilters, StatusFilter},
    config::Settings,
    domain::{ClaimState, OfferStatus, PaymentStatus, SignupStatus},
    error::AppError,
    notifications::{Notification, RecordingNotifier},
    payments::{FakePaymentGateway, PaymentGateway},
    repository::SignupRepository,
    service::{signup_service::SignupService, ClaimStatus, CreateBookingRequest},
};

use common::{today, Studio};

fn service(
    studio: &Studio,
    notifier: Arc<RecordingNotifier>,
    gateway: Option<Arc<FakePaymentGateway>>,
) -> SignupService {
    SignupService::new(
        studio.signups.clone(),
        studio.courses.clone(),
        notifier,
        gateway.map(|g| g as Arc<dyn PaymentGateway>),
        "https://shala.test".to_string(),
        Settings::default().studio.offer_window_hours,
    )
}

fn booking(studio: &Studio, name: &str, email: &str) -> CreateBookingRequest {
    CreateBookingRequest {
        course_id: studio.course.id,
        session_id: None,
        participant_name: name.to_string(),
        participant_email: email.to_string(),
        participant_phone: None,
        paid: false,
    }
}

#[tokio::test]
async fn direct_booking_uses_placement_rule() -> anyhow::Result<()> {
    let studio = Studio::new(1).await?;
    let notifier = Arc::new(RecordingNotifier::new());
    let service = service(&studio, notifier.clone(), None);

    let first = service
        .create_booking(studio.organization.id, booking(&studio, "Kari Nordmann", "kari@x.no"))
        .await?;
    let second = service
        .create_booking(studio.organization.id, booking(&studio, "Lars Hansen", "lars@x.no"))
        .await?;

    assert_eq!(first.status, SignupStatus::Confirmed);
    assert_eq!(first.payment_status, PaymentStatus::Pending);
    assert_eq!(second.status, SignupStatus::Waitlist);
    assert_eq!(second.waitlist_position, Some(1));
    assert_eq!(notifier.sent().len(), 2);
    Ok(())
}

#[tokio::test]
async fn direct_booking_validates_input_and_ownership() -> anyhow::Result<()> {
    let studio = Studio::new(5).await?;
    let service = service(&studio, Arc::new(RecordingNotifier::new()), None);

    let invalid = service
        .create_booking(studio.organization.id, booking(&studio, "Kari", "not-an-email"))
        .await;
    assert!(matches!(invalid, Err(AppError::Validation(_))));

    let foreign = service
        .create_booking(uuid::Uuid::new_v4(), booking(&studio, "Kari", "kari@x.no"))
        .await;
    assert!(matches!(foreign, Err(AppError::NotFound(_))));
    Ok(())
}

#[tokio::test]
async fn mark_paid_clears_pending_payment_exception() -> anyhow::Result<()> {
    let studio = Studio::new(5).await?;
    let service = service(&studio, Arc::new(RecordingNotifier::new()), None);
    let signup = service
        .create_booking(studio.organization.id, booking(&studio, "Kari Nordmann", "kari@x.no"))
        .await?;

    let at = ClassifyAt::new(Utc::now(), today());
    let attention = SignupFilters::for_mode(Mode::NeedsAttention);
    let before = service.grouped_signups(studio.organization.id, &attention, at).await?;
    assert_eq!(before.needs_attention, 1);

    let paid = service.mark_as_paid(signup.id).await?;
    assert_eq!(paid.payment_status, PaymentStatus::Paid);

    let after = service.grouped_signups(studio.organization.id, &attention, at).await?;
    assert_eq!(after.needs_attention, 0);
    assert!(after.groups.is_empty());
    Ok(())
}

#[tokio::test]
async fn refund_goes_through_gateway() -> anyhow::Result<()> {
    let studio = Studio::new(5).await?;
    let booked = studio.book(1).await?;
    let gateway = Arc::new(FakePaymentGateway::new());
    let service = service(&studio, Arc::new(RecordingNotifier::new()), Some(gateway.clone()));

    let refunded = service.cancel_with_refund(booked[0].id).await?;

    assert_eq!(refunded.status, SignupStatus::Cancelled);
    assert_eq!(refunded.payment_status, PaymentStatus::Refunded);
    assert_eq!(gateway.refunds(), vec!["pi_existing_0".to_string()]);

    let again = service.cancel_with_refund(booked[0].id).await;
    assert!(matches!(again, Err(AppError::BadRequest(_))));
    Ok(())
}

#[tokio::test]
async fn refund_without_gateway_is_unavailable() -> anyhow::Result<()> {
    let studio = Studio::new(5).await?;
    let booked = studio.book(1).await?;
    let service = service(&studio, Arc::new(RecordingNotifier::new()), None);

    let result = service.cancel_with_refund(booked[0].id).await;
    assert!(matches!(result, Err(AppError::ServiceUnavailable(_))));

    let unchanged = studio.signups.find_by_id(booked[0].id).await?.expect("exists");
    assert_eq!(unchanged.status, SignupStatus::Confirmed);
    Ok(())
}

#[tokio::test]
async fn cancel_moves_signup_to_cancelled_bucket() -> anyhow::Result<()> {
    let studio = Studio::new(5).await?;
    let booked = studio.book(2).await?;
    let service = service(&studio, Arc::new(RecordingNotifier::new()), None);

    service.cancel(booked[0].id).await?;

    let filters = SignupFilters {
        time: None,
        ..SignupFilters::for_mode(Mode::Ended)
    };
    let at = ClassifyAt::new(Utc::now(), today());
    let ended = service.grouped_signups(studio.organization.id, &filters, at).await?;
    assert_eq!(ended.groups.len(), 1);
    let group = &ended.groups[0];
    assert_eq!(group.signups.cancelled.len(), 1);
    assert!(group.signups.confirmed.is_empty());
    assert_eq!(group.counts.cancelled, 1);

    let active = service
        .grouped_signups(studio.organization.id, &SignupFilters::for_mode(Mode::Active), at)
        .await?;
    assert_eq!(active.groups[0].signups.confirmed.len(), 1);

    let waitlist_only = SignupFilters {
        status: StatusFilter::Waitlist,
        ..SignupFilters::for_mode(Mode::Active)
    };
    let filtered = service.grouped_signups(studio.organization.id, &waitlist_only, at).await?;
    assert!(filtered.has_active_filters);
    assert!(filtered.groups.is_empty());
    Ok(())
}

#[tokio::test]
async fn offer_seat_issues_claimable_token_and_email() -> anyhow::Result<()> {
    let studio = Studio::new(1).await?;
    let booked = studio.book(2).await?;
    let notifier = Arc::new(RecordingNotifier::new());
    let service = service(&studio, notifier.clone(), None);
    let now = Utc::now();

    let offered = service.offer_seat(booked[1].id, now).await?;

    assert_eq!(offered.offer_status, Some(OfferStatus::Pending));
    assert_eq!(offered.claim_state(now), ClaimState::Claimable);
    let token = offered.offer_claim_token.clone().expect("token issued");
    assert_eq!(token.len(), 64);

    let sent = notifier.sent();
    assert_eq!(sent.len(), 1);
    let Notification::WaitlistOffer { details, .. } = &sent[0] else {
        panic!("expected waitlist offer");
    };
    assert_eq!(details.claim_url, format!("https://shala.test/waitlist/claim/{}", token));

    let status = service.claim_status(&token, now).await?;
    assert_eq!(status.status, ClaimStatus::Valid);
    assert_eq!(status.course_name, "Morning Flow");

    let again = service.offer_seat(booked[1].id, now).await;
    assert!(matches!(again, Err(AppError::Conflict(_))));

    let confirmed = service.offer_seat(booked[0].id, now).await;
    assert!(matches!(confirmed, Err(AppError::BadRequest(_))));
    Ok(())
}

#[tokio::test]
async fn offer_seat_confirms_paid_waitlister_without_claim() -> anyhow::Result<()> {
    let studio = Studio::new(1).await?;
    studio.book(1).await?;
    let paid_waitlister = studio
        .signups
        .create_placed(studio.new_signup("Lars Hansen", Some("pi_first")), 1)
        .await?;
    assert_eq!(paid_waitlister.status, SignupStatus::Waitlist);

    let notifier = Arc::new(RecordingNotifier::new());
    let service = service(&studio, notifier.clone(), None);
    let confirmed = service.offer_seat(paid_waitlister.id, Utc::now()).await?;

    assert_eq!(confirmed.status, SignupStatus::Confirmed);
    assert_eq!(confirmed.waitlist_position, None);
    assert_eq!(confirmed.offer_claim_token, None);
    assert_eq!(confirmed.stripe_payment_intent_id.as_deref(), Some("pi_first"));

    let sent = notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].template_name(), "signup-confirmation");
    Ok(())
}

#[tokio::test]
async fn expired_offers_report_expired_status() -> anyhow::Result<()> {
    let studio = Studio::new(1).await?;
    let booked = studio.book(2).await?;
    let service = service(&studio, Arc::new(RecordingNotifier::new()), None);
    let offered_at = Utc::now() - Duration::hours(30);

    let offered = service.offer_seat(booked[1].id, offered_at).await?;
    let token = offered.offer_claim_token.expect("token issued");
    let now = Utc::now();

    assert_eq!(service.claim_status(&token, now).await?.status, ClaimStatus::Expired);
    assert_eq!(service.expire_offers(now).await?, 1);
    assert_eq!(service.claim_status(&token, now).await?.status, ClaimStatus::Expired);

    let unknown = service.claim_status("nope", now).await;
    assert!(matches!(unknown, Err(AppError::NotFound(_))));

    // An expired offer can be extended again with a fresh token.
    let reoffered = service.offer_seat(booked[1].id, now).await?;
    assert_ne!(reoffered.offer_claim_token.as_deref(), Some(token.as_str()));
    Ok(())
}
