mod common;

use chrono::{Duration as ChronoDuration, Utc};
use serde_json::json;
use std::time::Duration;
use uuid::Uuid;

use common::{gmt, ts, Harness, RecordingAudit};
use opensase_storesync::domain::aggregates::{CategoryData, LocalRecord, OrderStatus, Organization, ProductData, Store, StoreSyncState};
use opensase_storesync::repo::EntityRepository;
use opensase_storesync::sync::{PhaseResult, RunState, SyncRequest, SyncTrigger};
use opensase_storesync::worker::scheduler::run_due;
use opensase_storesync::{EntityKind, ErrorKind, PhaseStatus, Platform, RemoteError, SyncError};

fn request(h: &Harness) -> SyncRequest {
    SyncRequest::new(h.store.id, h.organization.id, h.actor, SyncTrigger::Manual)
}

fn seed_catalog(h: &Harness) {
    h.remote.seed(EntityKind::Category, json!({"id": 1, "name": "Books"}));
    h.remote.seed(EntityKind::Product, json!({
        "id": 10, "name": "Novel", "regular_price": "12.00", "categories": [{"id": 1}],
        "date_modified_gmt": gmt(ts(2024, 2, 1, 0, 0, 0))
    }));
    h.remote.seed(EntityKind::Customer, json!({
        "id": 30, "email": "ada@example.com", "first_name": "Ada",
        "billing": {"first_name": "Ada", "city": "Lagos", "email": "ada@example.com"},
        "date_modified_gmt": gmt(ts(2024, 2, 2, 0, 0, 0))
    }));
    h.remote.seed(EntityKind::Order, json!({
        "id": 50, "number": "50", "status": "processing", "currency": "ngn", "customer_id": 30, "total": "24.00",
        "line_items": [{"name": "Novel", "product_id": 10, "quantity": 2, "price": 12, "total": "24.00"}],
        "date_modified_gmt": gmt(ts(2024, 2, 3, 0, 0, 0))
    }));
}

#[tokio::test]
async fn full_run_imports_every_kind_and_links_references() {
    let h = Harness::new().await;
    seed_catalog(&h);

    let summary = h.orchestrator.run(request(&h)).await.unwrap();

    assert_eq!(summary.state, RunState::Completed);
    let kinds: Vec<_> = summary.phases.iter().map(|p| p.kind).collect();
    assert_eq!(kinds, EntityKind::ALL);

    let category = h.mem.categories.all().await.remove(0);
    let product = h.mem.products.all().await.remove(0);
    let customer = h.mem.customers.all().await.remove(0);
    let order = h.mem.orders.all().await.remove(0);
    assert_eq!(product.data.category_ids, vec![category.id]);
    assert_eq!(order.data.customer_id, Some(customer.id));
    assert_eq!(order.data.line_items[0].product_id, Some(product.id));
    assert_eq!(order.data.currency, "NGN");

    let status = h.orchestrator.sync_status(h.store.id).await.unwrap();
    assert_eq!(status.state, StoreSyncState::Idle);
    assert!(status.last_sync_date.is_some());
    assert!(status.phases.values().all(|s| *s == PhaseStatus::Completed));
}

#[tokio::test]
async fn local_edits_keep_references_synced_in_a_later_run() {
    let h = Harness::new().await;
    seed_catalog(&h);
    h.orchestrator.run(request(&h).only(vec![EntityKind::Product, EntityKind::Order])).await.unwrap();

    let mut order = h.mem.orders.all().await.remove(0);
    assert!(order.data.customer_id.is_none());
    let mut data = order.data.clone();
    data.status = OrderStatus::Completed;
    order.edit(data);
    h.mem.orders.update(&order).await.unwrap();

    let mut product = h.mem.products.all().await.remove(0);
    assert!(product.data.category_ids.is_empty());
    let mut data = product.data.clone();
    data.name = "Novel (2nd ed.)".into();
    product.edit(data);
    h.mem.products.update(&product).await.unwrap();

    let summary = h.orchestrator.run(request(&h)).await.unwrap();
    assert_eq!(summary.outcome(EntityKind::Order).unwrap().pushed, 1);
    assert_eq!(summary.outcome(EntityKind::Product).unwrap().pushed, 1);

    let remote_order = h.remote.record(EntityKind::Order, 50).unwrap();
    assert_eq!(remote_order["status"], "completed");
    assert_eq!(remote_order["customer_id"], 30);
    let remote_product = h.remote.record(EntityKind::Product, 10).unwrap();
    assert_eq!(remote_product["name"], "Novel (2nd ed.)");
    assert_eq!(remote_product["categories"], json!([{"id": 1}]));

    let customer = h.mem.customers.all().await.remove(0);
    let category = h.mem.categories.all().await.remove(0);
    let order = h.mem.orders.get(order.id).await.unwrap();
    let product = h.mem.products.get(product.id).await.unwrap();
    assert_eq!(order.data.customer_id, Some(customer.id));
    assert!(order.data.unresolved_customer.is_none());
    assert_eq!(product.data.category_ids, vec![category.id]);
    assert!(product.data.unresolved_category_ids.is_empty());
}

#[tokio::test]
async fn second_run_changes_nothing() {
    let h = Harness::new().await;
    seed_catalog(&h);
    h.mem.categories.insert(&LocalRecord::create(h.organization.id, h.store.id, CategoryData::named("Lamps"))).await.unwrap();
    h.mem.products.insert(&LocalRecord::create(h.organization.id, h.store.id, ProductData::new("Desk Lamp", None))).await.unwrap();

    h.orchestrator.run(request(&h)).await.unwrap();
    h.remote.clear_calls();
    let summary = h.orchestrator.run(request(&h)).await.unwrap();

    for kind in EntityKind::ALL {
        let outcome = summary.outcome(kind).unwrap();
        assert_eq!(outcome.created(), 0, "{kind} created on second run");
        assert_eq!(outcome.updated(), 0, "{kind} updated on second run");
    }
    assert!(h.remote.writes().is_empty());
}

#[tokio::test]
async fn phases_run_sequentially_in_canonical_order() {
    let h = Harness::new().await;
    seed_catalog(&h);
    h.remote.delay(EntityKind::Category, Duration::from_millis(30));

    let req = request(&h).only(vec![EntityKind::Order, EntityKind::Product, EntityKind::Category]);
    let summary = h.orchestrator.run(req).await.unwrap();

    let kinds: Vec<_> = summary.phases.iter().map(|p| p.kind).collect();
    assert_eq!(kinds, [EntityKind::Category, EntityKind::Product, EntityKind::Order]);
    let calls = h.remote.calls();
    let last_category = calls.iter().rposition(|c| c.kind == EntityKind::Category).unwrap();
    let first_product = calls.iter().position(|c| c.kind == EntityKind::Product).unwrap();
    let last_product = calls.iter().rposition(|c| c.kind == EntityKind::Product).unwrap();
    let first_order = calls.iter().position(|c| c.kind == EntityKind::Order).unwrap();
    assert!(last_category < first_product);
    assert!(last_product < first_order);
    assert!(calls.iter().all(|c| c.kind != EntityKind::Customer));
}

#[tokio::test]
async fn unknown_store_is_rejected_and_audited() {
    let h = Harness::new().await;
    let req = SyncRequest::new(Uuid::new_v4(), h.organization.id, h.actor, SyncTrigger::Manual);

    let err = h.orchestrator.run(req).await.unwrap_err();

    assert!(matches!(err, SyncError::StoreNotFound(_)));
    assert_eq!(h.audit.names(), ["sync.run_rejected"]);
    assert!(h.remote.calls().is_empty());
}

#[tokio::test]
async fn store_of_another_organization_is_not_found() {
    let h = Harness::new().await;
    let req = SyncRequest::new(h.store.id, Uuid::new_v4(), h.actor, SyncTrigger::Manual);
    assert!(matches!(h.orchestrator.run(req).await, Err(SyncError::StoreNotFound(_))));
}

#[tokio::test]
async fn inactive_organization_or_store_is_rejected() {
    let h = Harness::new().await;
    let mut org = Organization::new("Dormant");
    org.is_active = false;
    let store = Store::create(org.id, "Dormant Shop", Platform::WooCommerce, "https://dormant.test", "ck", "cs");
    h.mem.tenants.add_organization(org.clone()).await;
    h.mem.tenants.add_store(store.clone()).await;
    let err = h.orchestrator.run(SyncRequest::new(store.id, org.id, h.actor, SyncTrigger::Manual)).await.unwrap_err();
    assert!(matches!(err, SyncError::OrganizationInactive(_)));

    let mut paused = Store::create(h.organization.id, "Paused", Platform::WooCommerce, "https://paused.test", "ck", "cs");
    paused.is_active = false;
    h.mem.tenants.add_store(paused.clone()).await;
    let err = h.orchestrator.run(SyncRequest::new(paused.id, h.organization.id, h.actor, SyncTrigger::Manual)).await.unwrap_err();
    assert!(matches!(err, SyncError::StoreInactive(_)));
}

#[tokio::test]
async fn unsupported_platform_and_missing_credentials_are_rejected() {
    let h = Harness::new().await;
    let shopify = Store::create(h.organization.id, "Shopify", Platform::Shopify, "https://s.test", "k", "s");
    let blank = Store::create(h.organization.id, "Blank", Platform::WooCommerce, "https://b.test", "", "");
    h.mem.tenants.add_store(shopify.clone()).await;
    h.mem.tenants.add_store(blank.clone()).await;

    let err = h.orchestrator.run(SyncRequest::new(shopify.id, h.organization.id, h.actor, SyncTrigger::Manual)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unsupported);
    let err = h.orchestrator.run(SyncRequest::new(blank.id, h.organization.id, h.actor, SyncTrigger::Manual)).await.unwrap_err();
    assert!(matches!(err, SyncError::MissingCredentials(_)));
    assert!(h.remote.calls().is_empty());
}

#[tokio::test]
async fn second_trigger_is_rejected_while_running() {
    let h = Harness::new().await;
    let gate = h.remote.gate(EntityKind::Category);

    let handle = h.orchestrator.start(request(&h)).await.unwrap();
    let err = h.orchestrator.run(request(&h)).await.unwrap_err();
    assert!(matches!(err, SyncError::SyncInProgress(_)));
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(h.orchestrator.sync_status(h.store.id).await.unwrap().state, StoreSyncState::Running);

    gate.add_permits(10);
    let summary = handle.await.unwrap();
    assert_eq!(summary.state, RunState::Completed);
    assert_eq!(h.orchestrator.sync_status(h.store.id).await.unwrap().state, StoreSyncState::Idle);
    // Claim released: a new run is accepted.
    assert!(h.orchestrator.run(request(&h)).await.is_ok());
}

#[tokio::test]
async fn stale_claim_is_taken_over() {
    let h = Harness::new().await;
    let mut stuck = h.store.clone();
    stuck.sync_state = StoreSyncState::Running;
    stuck.sync_started_at = Some(Utc::now() - ChronoDuration::hours(3));
    h.mem.tenants.add_store(stuck).await;

    let summary = h.orchestrator.run(request(&h)).await.unwrap();
    assert_eq!(summary.state, RunState::Completed);
}

#[tokio::test]
async fn crashed_phase_is_infrastructure_failure_and_later_phases_run() {
    let h = Harness::new().await;
    seed_catalog(&h);
    h.remote.panic_on(EntityKind::Category);

    let summary = h.orchestrator.run(request(&h)).await.unwrap();

    assert_eq!(summary.state, RunState::Failed { phase: EntityKind::Category });
    match &summary.phase(EntityKind::Category).unwrap().result {
        PhaseResult::Failed { failure } => {
            assert!(failure.infrastructure);
            assert_eq!(failure.error_kind, ErrorKind::Infrastructure);
        }
        other => panic!("expected a failed category phase, got {other:?}"),
    }
    assert!(matches!(summary.phase(EntityKind::Product).unwrap().result, PhaseResult::Completed { .. }));
    assert_eq!(h.mem.products.len().await, 1);

    let status = h.orchestrator.sync_status(h.store.id).await.unwrap();
    assert_eq!(status.phases[&EntityKind::Category], PhaseStatus::Failed);
    assert_eq!(status.phases[&EntityKind::Order], PhaseStatus::Completed);
    assert_eq!(status.state, StoreSyncState::Idle);
}

#[tokio::test]
async fn auth_failure_fails_one_phase_not_the_run() {
    let h = Harness::new().await;
    seed_catalog(&h);
    h.remote.fail_kind(EntityKind::Customer, RemoteError::Auth { status: 401, message: "Consumer key is invalid.".into() });

    let summary = h.orchestrator.run(request(&h)).await.unwrap();

    assert_eq!(summary.state, RunState::Failed { phase: EntityKind::Customer });
    match &summary.phase(EntityKind::Customer).unwrap().result {
        PhaseResult::Failed { failure } => {
            assert_eq!(failure.error_kind, ErrorKind::Auth);
            assert!(!failure.infrastructure);
            assert!(failure.remediation.contains("API key"));
        }
        other => panic!("expected auth failure, got {other:?}"),
    }
    assert!(h.remote.calls().iter().any(|c| c.kind == EntityKind::Order));
    let names = h.audit.names();
    assert!(names.contains(&"sync.phase_failed"));
    assert_eq!(names.last(), Some(&"sync.run_finished"));
}

#[tokio::test]
async fn audit_failures_do_not_fail_the_run() {
    let h = Harness::with_audit(RecordingAudit::failing()).await;
    seed_catalog(&h);

    let summary = h.orchestrator.run(request(&h)).await.unwrap();

    assert_eq!(summary.state, RunState::Completed);
    assert_eq!(h.audit.names().first(), Some(&"sync.run_started"));
}

#[tokio::test]
async fn audit_entries_carry_actor_and_outcomes() {
    let h = Harness::new().await;
    seed_catalog(&h);

    h.orchestrator.run(request(&h)).await.unwrap();

    let entries = h.audit.entries();
    assert_eq!(entries.len(), 6);
    assert!(entries.iter().all(|e| e.actor_id == h.actor && e.store_id == h.store.id));
    let json = serde_json::to_value(&entries[1]).unwrap();
    assert_eq!(json["event"], "phase_completed");
    assert_eq!(json["kind"], "category");
    assert_eq!(json["outcome"]["imported"], 1);
}

#[tokio::test]
async fn scheduler_syncs_due_stores_once() {
    let h = Harness::new().await;
    seed_catalog(&h);

    assert_eq!(run_due(&h.orchestrator, Duration::from_secs(3600)).await, 1);
    assert_eq!(h.mem.orders.len().await, 1);
    // Just synced: not due again.
    assert_eq!(run_due(&h.orchestrator, Duration::from_secs(3600)).await, 0);
    let entry = h.audit.entries().into_iter().next().unwrap();
    assert_eq!(entry.actor_id, Uuid::nil());
}
