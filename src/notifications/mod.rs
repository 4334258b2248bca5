use async_trait::async_trait;
use serde::Serialize;

use crate::{
    classifier::time::{format_date_nb, format_time, resolve_session_at},
    domain::{Course, Signup, SignupStatus},
    error::Result,
};

pub mod email;

pub use email::{LogNotifier, SmtpNotifier};

#[cfg(any(test, feature = "test-utils"))]
pub use email::RecordingNotifier;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ConfirmationDetails {
    pub course_name: String,
    pub date: String,
    pub time: String,
    pub location: Option<String>,
    pub organization_name: String,
    pub waitlist_position: Option<i64>,
}

impl ConfirmationDetails {
    pub fn for_signup(signup: &Signup, course: &Course) -> Self {
        let session_at = resolve_session_at(
            signup.class_date,
            signup.class_time,
            course.start_date,
            course.time_schedule.as_deref(),
        );

        Self {
            course_name: course.name.clone(),
            date: session_at.map(|at| format_date_nb(at.date())).unwrap_or_default(),
            time: session_at.map(|at| format_time(at.time())).unwrap_or_default(),
            location: course.location.clone(),
            organization_name: course.organization_name.clone(),
            waitlist_position: match signup.status {
                SignupStatus::Waitlist => signup.waitlist_position,
                _ => None,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct OfferDetails {
    pub course_name: String,
    pub date: String,
    pub time: String,
    pub organization_name: String,
    pub claim_url: String,
    pub expires_at: String,
}

/// An outbound message for a participant, rendered by the notifier.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    SignupConfirmation {
        to: String,
        details: ConfirmationDetails,
    },
    WaitlistOffer {
        to: String,
        details: OfferDetails,
    },
}

impl Notification {
    pub fn template_name(&self) -> &'static str {
        match self {
            Notification::SignupConfirmation { .. } => "signup-confirmation",
            Notification::WaitlistOffer { .. } => "waitlist-offer",
        }
    }

    pub fn recipient(&self) -> &str {
        match self {
            Notification::SignupConfirmation { to, .. } => to,
            Notification::WaitlistOffer { to, .. } => to,
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &str;
    async fn send(&self, notification: &Notification) -> Result<()>;
}

/// Send without letting a delivery failure reach the caller.
pub async fn send_best_effort(notifier: &dyn Notifier, notification: Notification) {
    match notifier.send(&notification).await {
        Ok(()) => {
            tracing::debug!(
                "Notifier {} sent {} to {}",
                notifier.name(),
                notification.template_name(),
                notification.recipient()
            );
        }
        Err(e) => {
            tracing::error!(
                "Notifier {} failed to send {} to {}: {:?}",
                notifier.name(),
                notification.template_name(),
                notification.recipient(),
                e
            );
        }
    }
}
