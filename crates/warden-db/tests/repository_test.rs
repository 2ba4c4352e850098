//! Integration tests for the Tenant and Organization repositories using
//! in-memory SurrealDB.

use surrealdb::Surreal;
use surrealdb::engine::local::Mem;
use uuid::Uuid;
use warden_core::WardenError;
use warden_core::models::organization::CreateOrganization;
use warden_core::models::tenant::CreateTenant;
use warden_core::models::user::CreateUser;
use warden_core::repository::{
    OrganizationRepository, Pagination, TenantRepository, UserRepository,
};
use warden_db::repository::{
    SurrealOrganizationRepository, SurrealTenantRepository, SurrealUserRepository,
};

async fn setup() -> Surreal<surrealdb::engine::local::Db> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    warden_db::run_migrations(&db).await.unwrap();
    db
}

async fn create_tenant(db: &Surreal<surrealdb::engine::local::Db>, slug: &str) -> Uuid {
    SurrealTenantRepository::new(db.clone())
        .create(CreateTenant {
            name: format!("Tenant {slug}"),
            slug: slug.into(),
        })
        .await
        .unwrap()
        .id
}

// -----------------------------------------------------------------------
// Tenant tests
// -----------------------------------------------------------------------

#[tokio::test]
async fn create_and_get_tenant() {
    let db = setup().await;
    let repo = SurrealTenantRepository::new(db);

    let tenant = repo
        .create(CreateTenant {
            name: "ACME".into(),
            slug: "acme".into(),
        })
        .await
        .unwrap();
    assert_eq!(tenant.slug, "acme");

    let fetched = repo.get_by_id(tenant.id).await.unwrap();
    assert_eq!(fetched.id, tenant.id);
    assert_eq!(fetched.name, "ACME");
}

#[tokio::test]
async fn tenant_slug_lookup_ignores_case() {
    let db = setup().await;
    let repo = SurrealTenantRepository::new(db);

    let tenant = repo
        .create(CreateTenant {
            name: "ACME".into(),
            slug: "Acme".into(),
        })
        .await
        .unwrap();

    let fetched = repo.get_by_slug("ACME").await.unwrap();
    assert_eq!(fetched.id, tenant.id);
}

#[tokio::test]
async fn duplicate_tenant_slug_is_rejected() {
    let db = setup().await;
    let repo = SurrealTenantRepository::new(db);

    repo.create(CreateTenant {
        name: "First".into(),
        slug: "acme".into(),
    })
    .await
    .unwrap();

    let err = repo
        .create(CreateTenant {
            name: "Second".into(),
            slug: "ACME".into(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, WardenError::AlreadyExists { .. }), "got {err:?}");
}

#[tokio::test]
async fn empty_tenant_slug_is_rejected() {
    let db = setup().await;
    let repo = SurrealTenantRepository::new(db);

    let err = repo
        .create(CreateTenant {
            name: "Blank".into(),
            slug: "  ".into(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, WardenError::Validation { .. }));
}

#[tokio::test]
async fn get_nonexistent_tenant_returns_not_found() {
    let db = setup().await;
    let repo = SurrealTenantRepository::new(db);

    let err = repo.get_by_id(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, WardenError::NotFound { .. }));
}

// -----------------------------------------------------------------------
// Organization tests
// -----------------------------------------------------------------------

#[tokio::test]
async fn organizations_are_scoped_by_tenant() {
    let db = setup().await;
    let tenant_a = create_tenant(&db, "a").await;
    let tenant_b = create_tenant(&db, "b").await;
    let repo = SurrealOrganizationRepository::new(db);

    let org = repo
        .create(CreateOrganization {
            tenant_id: tenant_a,
            name: "Engineering".into(),
        })
        .await
        .unwrap();

    assert_eq!(repo.get_by_id(tenant_a, org.id).await.unwrap().name, "Engineering");

    let err = repo.get_by_id(tenant_b, org.id).await.unwrap_err();
    assert!(matches!(err, WardenError::NotFound { .. }));
}

#[tokio::test]
async fn list_organizations_paginates() {
    let db = setup().await;
    let tenant = create_tenant(&db, "acme").await;
    let repo = SurrealOrganizationRepository::new(db);

    for name in ["one", "two", "three"] {
        repo.create(CreateOrganization {
            tenant_id: tenant,
            name: name.into(),
        })
        .await
        .unwrap();
    }

    let page = repo
        .list(tenant, Pagination { offset: 0, limit: 2 })
        .await
        .unwrap();
    assert_eq!(page.total, 3);
    assert_eq!(page.items.len(), 2);

    let rest = repo
        .list(tenant, Pagination { offset: 2, limit: 2 })
        .await
        .unwrap();
    assert_eq!(rest.items.len(), 1);
}

// -----------------------------------------------------------------------
// Cascades
// -----------------------------------------------------------------------

#[tokio::test]
async fn deleting_tenant_removes_its_organizations_and_users() {
    let db = setup().await;
    let tenant = create_tenant(&db, "doomed").await;
    let orgs = SurrealOrganizationRepository::new(db.clone());
    let users = SurrealUserRepository::new(db.clone());

    let org = orgs
        .create(CreateOrganization {
            tenant_id: tenant,
            name: "Ops".into(),
        })
        .await
        .unwrap();
    let user = users
        .create(CreateUser {
            tenant_id: tenant,
            organization_id: Some(org.id),
            email: "ops@example.com".into(),
            password: "hunter2hunter2".into(),
            role: None,
            email_confirmed: true,
        })
        .await
        .unwrap();

    SurrealTenantRepository::new(db.clone())
        .delete(tenant)
        .await
        .unwrap();

    assert!(matches!(
        orgs.get_by_id(tenant, org.id).await.unwrap_err(),
        WardenError::NotFound { .. }
    ));
    assert!(matches!(
        users.get_by_id(tenant, user.id).await.unwrap_err(),
        WardenError::NotFound { .. }
    ));
}
