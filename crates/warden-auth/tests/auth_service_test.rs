//! Integration tests for the session authority: sign-in, refresh and
//! sign-out against in-memory SurrealDB.

mod common;

use std::time::Duration;

use common::{EMAIL, PASSWORD, setup, setup_with, test_config};
use uuid::Uuid;
use warden_auth::config::{AuthConfig, Rate};
use warden_auth::service::{RefreshInput, SignInInput};
use warden_core::WardenError;
use warden_core::error::GENERIC_AUTH_FAILURE;
use warden_core::models::refresh_token::RefreshTokenState;
use warden_core::repository::{
    AuditLogFilter, AuditLogRepository, Pagination, RefreshTokenRepository, UserRepository,
};

fn sign_in_input(tenant: &str, email: &str, password: &str) -> SignInInput {
    SignInInput {
        tenant: tenant.into(),
        email: email.into(),
        password: password.into(),
    }
}

#[tokio::test]
async fn sign_in_issues_verifiable_tokens() {
    let f = setup().await;

    let out = f
        .authority
        .sign_in(sign_in_input("acme", EMAIL, PASSWORD))
        .await
        .unwrap();

    assert_eq!(out.tenant_id, f.tenant_id);
    assert_eq!(out.user_id, f.user_id);
    assert!(!out.unconfirmed);
    assert_eq!(out.expires_in, 900);

    let claims = f.authority.verify_access_token(&out.access_token).unwrap();
    assert_eq!(claims.user_id().unwrap(), f.user_id);
    assert_eq!(claims.tenant_id().unwrap(), f.tenant_id);
    assert_eq!(claims.session_id().unwrap(), out.session_id);
    assert_eq!(claims.0.role, "authenticated");

    let user = f.users().get_by_id(f.tenant_id, f.user_id).await.unwrap();
    assert!(user.last_sign_in_at.is_some());

    let audit = f
        .audit()
        .list(
            f.tenant_id,
            AuditLogFilter {
                action: Some("signed_in".into()),
                ..Default::default()
            },
            Pagination::default(),
        )
        .await
        .unwrap();
    assert_eq!(audit.total, 1);
    assert_eq!(audit.items[0].payload["session_id"], out.session_id.to_string());
}

#[tokio::test]
async fn sign_in_resolves_tenant_by_host_and_email_case() {
    let f = setup().await;

    let out = f
        .authority
        .sign_in(sign_in_input(
            "ACME.auth.example.com:443",
            "Alice@Example.COM",
            PASSWORD,
        ))
        .await
        .unwrap();
    assert_eq!(out.tenant_id, f.tenant_id);
}

#[tokio::test]
async fn failures_are_indistinguishable_to_callers() {
    let f = setup().await;

    let wrong_password = f
        .authority
        .sign_in(sign_in_input("acme", EMAIL, "not the password"))
        .await
        .unwrap_err();
    let unknown_email = f
        .authority
        .sign_in(sign_in_input("acme", "mallory@example.com", PASSWORD))
        .await
        .unwrap_err();
    let unknown_tenant = f
        .authority
        .sign_in(sign_in_input("nope", EMAIL, PASSWORD))
        .await
        .unwrap_err();

    assert!(matches!(wrong_password, WardenError::AuthenticationFailed { .. }));
    assert!(matches!(unknown_email, WardenError::AuthenticationFailed { .. }));
    assert!(matches!(unknown_tenant, WardenError::NotFound { .. }));
    for err in [&wrong_password, &unknown_email, &unknown_tenant] {
        assert_eq!(err.public_message(), GENERIC_AUTH_FAILURE);
    }
}

#[tokio::test]
async fn unconfirmed_users_are_flagged_not_blocked() {
    let f = setup().await;
    f.add_user("bob@example.com", false).await;

    let out = f
        .authority
        .sign_in(sign_in_input("acme", "bob@example.com", PASSWORD))
        .await
        .unwrap();
    assert!(out.unconfirmed);
}

#[tokio::test]
async fn peppered_passwords_verify() {
    let f = setup_with(AuthConfig {
        pepper: Some("server-side-pepper".into()),
        ..test_config()
    })
    .await;

    f.authority
        .sign_in(sign_in_input("acme", EMAIL, PASSWORD))
        .await
        .unwrap();
}

#[tokio::test]
async fn refresh_rotates_within_the_session() {
    let f = setup().await;
    let signed_in = f
        .authority
        .sign_in(sign_in_input("acme", EMAIL, PASSWORD))
        .await
        .unwrap();

    let refreshed = f
        .authority
        .refresh(RefreshInput {
            tenant_id: f.tenant_id,
            refresh_token: signed_in.refresh_token.clone(),
        })
        .await
        .unwrap();

    assert_eq!(refreshed.session_id, signed_in.session_id);
    assert_ne!(refreshed.refresh_token, signed_in.refresh_token);
    let claims = f.authority.verify_access_token(&refreshed.access_token).unwrap();
    assert_eq!(claims.session_id().unwrap(), signed_in.session_id);

    let again = f
        .authority
        .refresh(RefreshInput {
            tenant_id: f.tenant_id,
            refresh_token: refreshed.refresh_token,
        })
        .await
        .unwrap();
    assert_eq!(again.session_id, signed_in.session_id);
}

#[tokio::test]
async fn replayed_refresh_token_compromises_the_session() {
    let f = setup().await;
    let signed_in = f
        .authority
        .sign_in(sign_in_input("acme", EMAIL, PASSWORD))
        .await
        .unwrap();
    let refreshed = f
        .authority
        .refresh(RefreshInput {
            tenant_id: f.tenant_id,
            refresh_token: signed_in.refresh_token.clone(),
        })
        .await
        .unwrap();

    let replay = f
        .authority
        .refresh(RefreshInput {
            tenant_id: f.tenant_id,
            refresh_token: signed_in.refresh_token,
        })
        .await
        .unwrap_err();
    assert!(
        matches!(replay, WardenError::SessionCompromised { session_id } if session_id == signed_in.session_id),
        "got {replay:?}"
    );

    // The legitimate head was revoked along with the rest of the family.
    let head = f
        .authority
        .refresh(RefreshInput {
            tenant_id: f.tenant_id,
            refresh_token: refreshed.refresh_token,
        })
        .await
        .unwrap_err();
    assert!(matches!(head, WardenError::SessionCompromised { .. }));
}

#[tokio::test]
async fn unknown_refresh_token_is_generic_failure() {
    let f = setup().await;

    let err = f
        .authority
        .refresh(RefreshInput {
            tenant_id: f.tenant_id,
            refresh_token: "never-issued".into(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, WardenError::NotFound { .. }));
    assert_eq!(err.public_message(), GENERIC_AUTH_FAILURE);
}

#[tokio::test]
async fn refresh_token_does_not_cross_tenants() {
    let f = setup().await;
    let signed_in = f
        .authority
        .sign_in(sign_in_input("acme", EMAIL, PASSWORD))
        .await
        .unwrap();

    let err = f
        .authority
        .refresh(RefreshInput {
            tenant_id: Uuid::new_v4(),
            refresh_token: signed_in.refresh_token,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, WardenError::NotFound { .. }));
}

#[tokio::test]
async fn sign_out_is_idempotent() {
    let f = setup().await;
    let signed_in = f
        .authority
        .sign_in(sign_in_input("acme", EMAIL, PASSWORD))
        .await
        .unwrap();

    let revoked = f
        .authority
        .sign_out(f.tenant_id, signed_in.session_id)
        .await
        .unwrap();
    assert_eq!(revoked, 1);

    let again = f
        .authority
        .sign_out(f.tenant_id, signed_in.session_id)
        .await
        .unwrap();
    assert_eq!(again, 0);

    let err = f
        .authority
        .refresh(RefreshInput {
            tenant_id: f.tenant_id,
            refresh_token: signed_in.refresh_token,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, WardenError::SessionCompromised { .. }));
}

#[tokio::test]
async fn sign_in_is_rate_limited_per_tenant() {
    let mut config = test_config();
    config.rate_limits.sign_in = Rate {
        events: 2.0,
        over: Duration::from_secs(300),
    };
    let f = setup_with(config).await;

    for _ in 0..2 {
        f.authority
            .sign_in(sign_in_input("acme", EMAIL, PASSWORD))
            .await
            .unwrap();
    }

    let err = f
        .authority
        .sign_in(sign_in_input("acme", EMAIL, PASSWORD))
        .await
        .unwrap_err();
    match err {
        WardenError::RateLimited {
            action,
            retry_after_secs,
        } => {
            assert_eq!(action, "sign_in");
            assert!((1..=300).contains(&retry_after_secs));
        }
        other => panic!("expected RateLimited, got {other:?}"),
    }

    let denials = f
        .audit()
        .list(
            f.tenant_id,
            AuditLogFilter {
                action: Some("rate_limit_exceeded".into()),
                ..Default::default()
            },
            Pagination::default(),
        )
        .await
        .unwrap();
    assert_eq!(denials.total, 1);

    // The denied attempt never reached credential checks or issuance.
    let signed_in = f
        .audit()
        .list(
            f.tenant_id,
            AuditLogFilter {
                action: Some("signed_in".into()),
                ..Default::default()
            },
            Pagination::default(),
        )
        .await
        .unwrap();
    assert_eq!(signed_in.total, 2);
}

#[tokio::test]
async fn denied_refresh_leaves_the_token_untouched() {
    let mut config = test_config();
    config.rate_limits.token_refresh = Rate {
        events: 0.0,
        over: Duration::from_secs(300),
    };
    let f = setup_with(config).await;
    let signed_in = f
        .authority
        .sign_in(sign_in_input("acme", EMAIL, PASSWORD))
        .await
        .unwrap();

    let err = f
        .authority
        .refresh(RefreshInput {
            tenant_id: f.tenant_id,
            refresh_token: signed_in.refresh_token.clone(),
        })
        .await
        .unwrap_err();
    assert!(
        matches!(err, WardenError::RateLimited { ref action, .. } if action == "token_refresh"),
        "got {err:?}"
    );

    let root = f
        .tokens()
        .get_session_root(f.tenant_id, signed_in.session_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(root.state(), RefreshTokenState::Active);
    assert!(!root.has_child);
    assert!(
        f.tokens()
            .get_child(f.tenant_id, &root.token)
            .await
            .unwrap()
            .is_none()
    );
}
