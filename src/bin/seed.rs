use shala::{
    domain::{CreateCourseRequest, NewSignup, OfferStatus, Participant, PaymentStatus, SignupStatus},
    repository::{
        CourseRepository, SqliteCourseRepository,
        SignupRepository, SqliteSignupRepository,
    },
};
use chrono::{Duration, Local, NaiveTime, Utc};
use clap::Parser;
use fake::{
    faker::{internet::en::SafeEmail, name::en::Name},
    Fake,
};
use sqlx::sqlite::SqlitePoolOptions;

/// Load demo studio data: one organization, two courses, a drop-in
/// session and a mix of signups covering every dashboard bucket.
#[derive(Debug, Parser)]
struct Args {
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://shala.db?mode=rwc")]
    database_url: String,

    /// Participants booked onto the main course; beyond its capacity of
    /// eight they land on the waitlist.
    #[arg(long, default_value_t = 11)]
    participants: usize,
}

fn fake_participant() -> Participant {
    Participant {
        name: Name().fake(),
        email: SafeEmail().fake(),
        phone: None,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    println!("🌱 Starting database seeding...");

    let db_pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&args.database_url)
        .await?;

    // Run migrations first
    println!("📋 Running migrations...");
    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await?;

    let course_repo = SqliteCourseRepository::new(db_pool.clone());
    let signup_repo = SqliteSignupRepository::new(db_pool.clone());

    println!("🧘 Creating studio and courses...");
    let studio = course_repo.create_organization("Shala Oslo").await?;
    let today = Local::now().date_naive();

    let morning = course_repo.create_course(CreateCourseRequest {
        organization_id: studio.id,
        name: "Morgenflyt".to_string(),
        max_participants: 8,
        location: Some("Sal 1, Grünerløkka".to_string()),
        time_schedule: Some("Mandager 07:30-08:45".to_string()),
        start_date: Some(today + Duration::days(2)),
        price_minor: 25000,
    }).await?;

    let yin = course_repo.create_course(CreateCourseRequest {
        organization_id: studio.id,
        name: "Yin Yoga".to_string(),
        max_participants: 12,
        location: Some("Sal 2".to_string()),
        time_schedule: Some("Torsdager 19.00".to_string()),
        start_date: Some(today - Duration::days(14)),
        price_minor: 18000,
    }).await?;

    let drop_in = course_repo
        .create_session(yin.id, today, NaiveTime::from_hms_opt(19, 0, 0))
        .await?;
    println!("  ✅ Created {} and {} (drop-in session {})", morning.name, yin.name, drop_in.id);

    println!("👥 Booking participants...");
    let mut waitlisted = Vec::new();
    for i in 0..args.participants {
        // Card payments fill the course; the overflow was added by hand, unpaid.
        let paid = (i as i64) < morning.max_participants;
        let signup = signup_repo.create_placed(NewSignup {
            organization_id: studio.id,
            course_id: morning.id,
            course_session_id: None,
            participant: fake_participant(),
            payment_status: if paid { PaymentStatus::Paid } else { PaymentStatus::Pending },
            stripe_checkout_session_id: None,
            stripe_payment_intent_id: paid.then(|| format!("pi_seed_morning_{}", i)),
            amount_paid_minor: paid.then_some(morning.price_minor),
            class_date: None,
            class_time: None,
        }, morning.max_participants).await?;
        if signup.status == SignupStatus::Waitlist {
            waitlisted.push(signup);
        }
    }

    // One open offer inside the expiring window.
    if let Some(first) = waitlisted.first_mut() {
        first.offer_status = Some(OfferStatus::Pending);
        first.offer_expires_at = Some(Utc::now() + Duration::hours(5));
        first.offer_claim_token = Some(format!("seed-claim-{}", first.id.simple()));
        signup_repo.update(first).await?;
    }

    let mut failed = signup_repo.create_placed(NewSignup {
        organization_id: studio.id,
        course_id: yin.id,
        course_session_id: Some(drop_in.id),
        participant: fake_participant(),
        payment_status: PaymentStatus::Pending,
        stripe_checkout_session_id: None,
        stripe_payment_intent_id: Some("pi_seed_failed".to_string()),
        amount_paid_minor: None,
        class_date: Some(drop_in.session_date),
        class_time: drop_in.start_time,
    }, yin.max_participants).await?;
    failed.payment_status = PaymentStatus::Failed;
    signup_repo.update(&failed).await?;

    signup_repo.create_placed(NewSignup {
        organization_id: studio.id,
        course_id: yin.id,
        course_session_id: Some(drop_in.id),
        participant: fake_participant(),
        payment_status: PaymentStatus::Pending,
        stripe_checkout_session_id: None,
        stripe_payment_intent_id: None,
        amount_paid_minor: None,
        class_date: Some(drop_in.session_date),
        class_time: drop_in.start_time,
    }, yin.max_participants).await?;

    println!(
        "  ✅ Booked {} participants ({} waitlisted) plus two drop-ins",
        args.participants,
        waitlisted.len()
    );

    println!("\n✨ Database seeding complete!");
    println!("  Organization id: {}", studio.id);

    Ok(())
}
