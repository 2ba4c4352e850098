//! Integration tests for the audit log and rate limit bucket
//! repositories using in-memory SurrealDB.

use chrono::{Duration, TimeZone, Utc};
use surrealdb::Surreal;
use surrealdb::engine::local::Mem;
use uuid::Uuid;
use warden_core::models::audit::AuditEvent;
use warden_core::models::rate_limit::RateLimitAction;
use warden_core::repository::{
    AuditLogFilter, AuditLogRepository, Pagination, RateLimitRepository,
};
use warden_db::repository::{SurrealAuditLogRepository, SurrealRateLimitRepository};

async fn setup() -> Surreal<surrealdb::engine::local::Db> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    warden_db::run_migrations(&db).await.unwrap();
    db
}

// -----------------------------------------------------------------------
// Audit log
// -----------------------------------------------------------------------

#[tokio::test]
async fn audit_entries_are_listed_per_tenant() {
    let db = setup().await;
    let repo = SurrealAuditLogRepository::new(db);
    let tenant_a = Uuid::new_v4();
    let tenant_b = Uuid::new_v4();

    let event = AuditEvent::SessionRevoked {
        tenant_id: tenant_a,
        session_id: Uuid::new_v4(),
        revoked_tokens: 3,
    };
    let entry = repo.append(event.to_entry()).await.unwrap();
    assert_eq!(entry.payload["action"], "session_revoked");
    assert_eq!(entry.payload["revoked_tokens"], 3);

    repo.append(
        AuditEvent::SessionRevoked {
            tenant_id: tenant_b,
            session_id: Uuid::new_v4(),
            revoked_tokens: 1,
        }
        .to_entry(),
    )
    .await
    .unwrap();

    let page = repo
        .list(tenant_a, AuditLogFilter::default(), Pagination::default())
        .await
        .unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].id, entry.id);
}

#[tokio::test]
async fn audit_list_filters_by_action() {
    let db = setup().await;
    let repo = SurrealAuditLogRepository::new(db);
    let tenant_id = Uuid::new_v4();

    repo.append(
        AuditEvent::TokenRefreshed {
            tenant_id,
            user_id: Uuid::new_v4(),
            session_id: Uuid::new_v4(),
        }
        .to_entry(),
    )
    .await
    .unwrap();
    repo.append(
        AuditEvent::SessionRevoked {
            tenant_id,
            session_id: Uuid::new_v4(),
            revoked_tokens: 2,
        }
        .to_entry(),
    )
    .await
    .unwrap();

    let page = repo
        .list(
            tenant_id,
            AuditLogFilter {
                action: Some("token_refreshed".into()),
                ..Default::default()
            },
            Pagination::default(),
        )
        .await
        .unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].payload["action"], "token_refreshed");
}

// -----------------------------------------------------------------------
// Rate limit buckets
// -----------------------------------------------------------------------

#[tokio::test]
async fn hits_accumulate_per_window() {
    let db = setup().await;
    let repo = SurrealRateLimitRepository::new(db);
    let tenant_id = Uuid::new_v4();
    let window = Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap();

    for expected in 1..=3 {
        let bucket = repo
            .hit(tenant_id, RateLimitAction::SignIn, window)
            .await
            .unwrap();
        assert_eq!(bucket.hits, expected);
        assert_eq!(bucket.action, RateLimitAction::SignIn);
        assert_eq!(bucket.window_start, window);
    }

    let other_action = repo
        .hit(tenant_id, RateLimitAction::Otp, window)
        .await
        .unwrap();
    assert_eq!(other_action.hits, 1);

    let next_window = repo
        .hit(tenant_id, RateLimitAction::SignIn, window + Duration::minutes(5))
        .await
        .unwrap();
    assert_eq!(next_window.hits, 1);
}

#[tokio::test]
async fn purge_removes_only_old_windows() {
    let db = setup().await;
    let repo = SurrealRateLimitRepository::new(db);
    let tenant_id = Uuid::new_v4();
    let old = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
    let current = Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap();

    repo.hit(tenant_id, RateLimitAction::Verify, old).await.unwrap();
    repo.hit(tenant_id, RateLimitAction::Verify, current).await.unwrap();

    let purged = repo.purge_expired(current).await.unwrap();
    assert_eq!(purged, 1);

    let bucket = repo
        .hit(tenant_id, RateLimitAction::Verify, current)
        .await
        .unwrap();
    assert_eq!(bucket.hits, 2);
}
