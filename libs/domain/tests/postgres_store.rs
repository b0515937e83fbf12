//! Atomicity tests against PostgreSQL
//!
//! Run only when `TEST_DATABASE_URL` points at a disposable database; every
//! test creates its own users so they can share one schema.

use chrono::NaiveDate;
use std::sync::Arc;
use uuid::Uuid;

use common::database::{DatabaseConfig, init_pool, run_migrations};
use domain::models::{
    Actor, DonationKind, DonationPayload, NewDonationRequest, NewProject, NewUser, RoleKind,
};
use domain::store::{PgStore, Store};
use domain::{
    Decision, DonationRequestService, DonationService, ProgressPolicy, ProjectService,
    RoleRequestService, WorkflowError,
};

async fn test_store() -> Option<Arc<dyn Store>> {
    let database_url = std::env::var("TEST_DATABASE_URL").ok()?;
    let config = DatabaseConfig {
        database_url,
        max_connections: 16,
        min_connections: 1,
        connection_timeout: 10,
    };

    let pool = init_pool(&config).await.expect("connect to test database");
    run_migrations(&pool).await.expect("run migrations");
    Some(Arc::new(PgStore::new(pool)))
}

fn new_user(name: &str) -> NewUser {
    NewUser {
        name: name.to_string(),
        email: format!("{}-{}@gotong.id", name, Uuid::new_v4()),
        password_hash: "unused".to_string(),
    }
}

async fn user(store: &Arc<dyn Store>, name: &str) -> Actor {
    let (user, _) = store.create_user(new_user(name), None).await.unwrap();
    Actor::from(&user)
}

async fn admin(store: &Arc<dyn Store>) -> Actor {
    Actor::from(&store.bootstrap_admin(new_user("admin")).await.unwrap())
}

#[tokio::test]
async fn test_pg_concurrent_joins_never_exceed_capacity() {
    let Some(store) = test_store().await else {
        eprintln!("TEST_DATABASE_URL not set, skipping PostgreSQL store test");
        return;
    };
    let admin = admin(&store).await;
    let projects = ProjectService::new(store.clone());

    let capacity = 4;
    let project = projects
        .create(
            &admin,
            NewProject {
                name: "Donor Darah".to_string(),
                description: "Aksi donor darah".to_string(),
                is_active: true,
                start_date: NaiveDate::from_ymd_opt(2024, 10, 1).unwrap(),
                required_participants: capacity,
                image_url: None,
            },
        )
        .await
        .unwrap();

    let mut handles = Vec::new();
    for i in 0..capacity + 2 {
        let volunteer = user(&store, &format!("relawan{}", i)).await;
        let service = projects.clone();
        let project_id = project.id;
        handles.push(tokio::spawn(async move { service.join(&volunteer, project_id).await }));
    }

    let mut joined = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => joined += 1,
            Err(e) => assert!(matches!(e, WorkflowError::Capacity(_)), "{e}"),
        }
    }

    assert_eq!(joined, capacity);
    assert_eq!(
        projects.participant_count(project.id).await.unwrap(),
        i64::from(capacity)
    );
}

#[tokio::test]
async fn test_pg_concurrent_decisions_grant_once() {
    let Some(store) = test_store().await else {
        eprintln!("TEST_DATABASE_URL not set, skipping PostgreSQL store test");
        return;
    };
    let admin = admin(&store).await;
    let applicant = user(&store, "pemohon").await;
    let role_requests = RoleRequestService::new(store.clone());

    let request = role_requests
        .submit(&applicant, "pengelola proyek", "ingin membuat event")
        .await
        .unwrap();

    let mut handles = Vec::new();
    for decision in [Decision::Approve, Decision::Approve, Decision::Reject] {
        let service = role_requests.clone();
        let id = request.id;
        handles.push(tokio::spawn(async move { service.decide(&admin, id, decision).await }));
    }

    let mut successes = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => successes += 1,
            Err(e) => assert!(matches!(e, WorkflowError::Conflict(_)), "{e}"),
        }
    }
    assert_eq!(successes, 1);

    let roles = store.roles_of(applicant.user_id).await.unwrap();
    assert!(roles.len() <= 1);
    assert!(roles.iter().all(|role| *role == RoleKind::ProjectManager));
}

#[tokio::test]
async fn test_pg_donation_lifecycle() {
    let Some(store) = test_store().await else {
        eprintln!("TEST_DATABASE_URL not set, skipping PostgreSQL store test");
        return;
    };
    let admin = admin(&store).await;
    let receiver = user(&store, "penerima").await;
    store
        .assign_role(&admin, receiver.user_id, RoleKind::DonationReceiver)
        .await
        .unwrap();
    let donor = user(&store, "donatur").await;

    let requests = DonationRequestService::new(store.clone());
    let donations = DonationService::new(store.clone(), ProgressPolicy::AllDonations);

    let campaign = requests
        .create(
            &receiver,
            NewDonationRequest {
                title: "Sumur bersih".to_string(),
                description: "Bangun sumur untuk desa".to_string(),
                category: "air".to_string(),
                kind: DonationKind::Money,
                target_amount: Some(100_000),
                target_items: Some(7),
            },
        )
        .await
        .unwrap();
    assert_eq!(campaign.target_items, None);

    let payload = || DonationPayload {
        amount: Some(30_000),
        ..Default::default()
    };

    let err = donations
        .add_donation(&donor, campaign.id, payload())
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::State(_)));

    requests
        .decide(&admin, campaign.id, Decision::Approve)
        .await
        .unwrap();
    donations
        .add_donation(&donor, campaign.id, payload())
        .await
        .unwrap();
    donations
        .add_donation(
            &donor,
            campaign.id,
            DonationPayload {
                amount: Some(45_000),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let progress = donations.progress(campaign.id).await.unwrap();
    assert_eq!(progress.collected, 75_000);
    assert_eq!(progress.percent, 75.00);
}
