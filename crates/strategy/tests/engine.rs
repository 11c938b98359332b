use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use chrono_tz::UTC;
use qm_audit::{AuditStore, MemoryAuditStore};
use qm_core::{Clock, FixedClock, QuotaStrategy, StrategyKind, User};
use qm_gateway_client::{GatewayClient, MockGatewayClient};
use qm_ledger::{LedgerConfig, QuotaLedger};
use qm_state::{LedgerStore, MemoryLedgerStore};
use qm_strategy::{GatewayQuotaLookup, MemoryStrategyStore, StaticUserDirectory, StrategyEngine, StrategyStore};
use qm_voucher::parse_mac_key;

fn dt(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
}

fn user(id: &str) -> User {
    User {
        id: id.to_owned(),
        name: "Ada".into(),
        phone: String::new(),
        github_login: String::new(),
        github_stars: BTreeSet::new(),
        vip_level: 0,
        org: String::new(),
        created_at: dt("2026-01-01T00:00:00Z"),
        last_access_at: dt("2026-01-01T00:00:00Z"),
        inviter_id: None,
    }
}

fn strategy(name: &str, condition: &str, amount: i64) -> QuotaStrategy {
    QuotaStrategy {
        id: name.to_owned(),
        name: name.to_owned(),
        title: name.to_owned(),
        kind: StrategyKind::Single,
        amount,
        model: "gpt".into(),
        condition: condition.to_owned(),
        cron_expr: None,
        expiry_days: Some(30),
        enabled: true,
        valid_from: dt("2026-01-01T00:00:00Z"),
        valid_to: None,
    }
}

struct Harness {
    engine: StrategyEngine,
    gateway: Arc<MockGatewayClient>,
    audit: Arc<MemoryAuditStore>,
}

fn harness(now: DateTime<Utc>, users: Vec<User>) -> Harness {
    let store: Arc<dyn StrategyStore> = Arc::new(MemoryStrategyStore::new());
    let state: Arc<dyn LedgerStore> = Arc::new(MemoryLedgerStore::new());
    let audit = Arc::new(MemoryAuditStore::new());
    let gateway = Arc::new(MockGatewayClient::new());
    let clock: Arc<dyn Clock> = Arc::new(FixedClock(now));
    let key = parse_mac_key(&"cd".repeat(32)).unwrap();
    let config = LedgerConfig::new(key, "acme/starred-repo");
    let ledger = Arc::new(QuotaLedger::new(
        state.clone(),
        audit.clone() as Arc<dyn AuditStore>,
        gateway.clone() as Arc<dyn qm_gateway_client::GatewayClient>,
        clock.clone(),
        config,
    ));
    let directory = Arc::new(StaticUserDirectory::new(users));
    let quota = Arc::new(GatewayQuotaLookup::new(gateway.clone() as Arc<dyn qm_gateway_client::GatewayClient>));
    let engine = StrategyEngine::new(
        store,
        state.clone(),
        ledger,
        directory,
        quota,
        clock,
        UTC,
    );
    Harness { engine, gateway, audit }
}

#[tokio::test]
async fn empty_condition_grants_every_tick_once() {
    let now = dt("2026-03-01T00:00:00Z");
    let h = harness(now, vec![user("u1")]);
    h.engine.create(strategy("welcome", "", 10)).await.unwrap();

    let first = h.engine.tick("welcome", None).await.unwrap();
    assert_eq!(first.granted, 1);
    assert_eq!(h.gateway.get_quota("u1").await.unwrap(), 10);
    assert_eq!(h.audit.list_for_user("u1").await.unwrap().len(), 1);

    let second = h.engine.tick("welcome", None).await.unwrap();
    assert_eq!(second.granted, 0);
    assert_eq!(second.skipped, 1);
    assert_eq!(h.gateway.get_quota("u1").await.unwrap(), 10);
    assert_eq!(h.audit.list_for_user("u1").await.unwrap().len(), 1);
}

#[tokio::test]
async fn match_user_selects_only_named_user() {
    let now = dt("2026-03-01T00:00:00Z");
    let h = harness(now, vec![user("u1"), user("u2")]);
    h.engine.create(strategy("u1-only", "match-user(\"u1\")", 15)).await.unwrap();

    let summary = h.engine.tick("u1-only", None).await.unwrap();
    assert_eq!(summary.granted, 1);
    assert_eq!(h.gateway.get_quota("u1").await.unwrap(), 15);
    assert_eq!(h.gateway.get_quota("u2").await.unwrap(), 0);
}

#[tokio::test]
async fn vip_threshold_filters_candidates() {
    let now = dt("2026-03-01T00:00:00Z");
    let mut low = user("low");
    low.vip_level = 0;
    let mut mid = user("mid");
    mid.vip_level = 2;
    let mut high = user("high");
    high.vip_level = 3;
    let h = harness(now, vec![low, mid, high]);
    h.engine.create(strategy("vip-bonus", "is-vip(2)", 40)).await.unwrap();

    let summary = h.engine.tick("vip-bonus", None).await.unwrap();
    assert_eq!(summary.granted, 2);
    assert_eq!(h.gateway.get_quota("low").await.unwrap(), 0);
    assert_eq!(h.gateway.get_quota("mid").await.unwrap(), 40);
    assert_eq!(h.gateway.get_quota("high").await.unwrap(), 40);
}

#[tokio::test]
async fn invitation_style_strategy_redirects_to_inviter() {
    let now = dt("2026-03-01T00:00:00Z");
    let mut invitee = user("invitee");
    invitee.inviter_id = Some("inviter".to_owned());
    let inviter = user("inviter");
    let h = harness(now, vec![invitee, inviter]);
    h.engine.create(strategy("invite-bonus", "has-inviter()", 25)).await.unwrap();

    let summary = h.engine.tick("invite-bonus", None).await.unwrap();
    assert_eq!(summary.granted, 1);
    assert_eq!(h.gateway.get_quota("inviter").await.unwrap(), 25);
    assert_eq!(h.gateway.get_quota("invitee").await.unwrap(), 0);

    // Idempotency key stays on the invitee: re-ticking does not re-grant
    // the inviter even though the invitee themself never received quota.
    let second = h.engine.tick("invite-bonus", None).await.unwrap();
    assert_eq!(second.granted, 0);
    assert_eq!(h.gateway.get_quota("inviter").await.unwrap(), 25);
}

#[tokio::test]
async fn disabled_strategy_skips_everyone() {
    let now = dt("2026-03-01T00:00:00Z");
    let h = harness(now, vec![user("u1")]);
    let mut s = strategy("disabled", "", 10);
    s.enabled = false;
    let id = s.id.clone();
    h.engine.create(s).await.unwrap();

    let summary = h.engine.tick(&id, None).await.unwrap();
    assert_eq!(summary, Default::default());
    assert_eq!(h.gateway.get_quota("u1").await.unwrap(), 0);
}

#[tokio::test]
async fn create_rejects_duplicate_name() {
    let now = dt("2026-03-01T00:00:00Z");
    let h = harness(now, vec![]);
    h.engine.create(strategy("dup", "", 10)).await.unwrap();
    let err = h.engine.create(strategy("dup", "", 10)).await.unwrap_err();
    assert!(matches!(err, qm_strategy::StrategyError::DuplicateName(_)));
}

#[tokio::test]
async fn create_rejects_unparseable_condition() {
    let now = dt("2026-03-01T00:00:00Z");
    let h = harness(now, vec![]);
    let err = h.engine.create(strategy("bad", "not-a-real-predicate()", 10)).await.unwrap_err();
    assert!(matches!(err, qm_strategy::StrategyError::Condition(_)));
}

#[tokio::test]
async fn periodic_strategy_requires_valid_cron() {
    let now = dt("2026-03-01T00:00:00Z");
    let h = harness(now, vec![]);
    let mut s = strategy("weekly", "", 10);
    s.kind = StrategyKind::Periodic;
    s.cron_expr = Some("garbage".into());
    let err = h.engine.create(s).await.unwrap_err();
    assert!(matches!(err, qm_strategy::StrategyError::Cron(_)));
}

#[tokio::test]
async fn periodic_strategy_batches_by_cron_fire_time() {
    let now = dt("2026-03-01T00:00:00Z");
    let h = harness(now, vec![user("u1")]);
    let mut s = strategy("daily", "", 5);
    s.kind = StrategyKind::Periodic;
    s.cron_expr = Some("0 0 * * *".into());
    h.engine.create(s).await.unwrap();

    let fire1 = dt("2026-03-01T00:00:00Z");
    let fire2 = dt("2026-03-02T00:00:00Z");

    h.engine.tick("daily", Some(fire1)).await.unwrap();
    h.engine.tick("daily", Some(fire1)).await.unwrap(); // same fire time, no re-grant
    assert_eq!(h.gateway.get_quota("u1").await.unwrap(), 5);

    h.engine.tick("daily", Some(fire2)).await.unwrap(); // new batch, grants again
    assert_eq!(h.gateway.get_quota("u1").await.unwrap(), 10);
}
