use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use chrono_tz::UTC;
use qm_audit::{AuditStore, MemoryAuditStore};
use qm_core::{Clock, FixedClock, LotStatus, QuotaLot, QuotaStrategy, Scope, StrategyKind, User, WhitelistEntry};
use qm_gateway_client::{GatewayClient, MockGatewayClient};
use qm_hr_client::{Department, Employee, HrClient, StaticHrClient};
use qm_ledger::{LedgerConfig, QuotaLedger};
use qm_permission::{PermissionComposer, PermissionConfig, SyncMode};
use qm_scheduler::{BackgroundProcessor, SchedulerConfig};
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

fn strategy(kind: StrategyKind, cron_expr: Option<&str>) -> QuotaStrategy {
    QuotaStrategy {
        id: "welcome".into(),
        name: "welcome".into(),
        title: "Welcome grant".into(),
        kind,
        amount: 10,
        model: "gpt".into(),
        condition: String::new(),
        cron_expr: cron_expr.map(str::to_owned),
        expiry_days: Some(30),
        enabled: true,
        valid_from: dt("2026-01-01T00:00:00Z"),
        valid_to: None,
    }
}

struct Harness {
    processor: BackgroundProcessor,
    shutdown: tokio::sync::mpsc::Sender<()>,
    strategy_store: Arc<dyn StrategyStore>,
    gateway: Arc<MockGatewayClient>,
    audit: Arc<MemoryAuditStore>,
    state: Arc<MemoryLedgerStore>,
}

fn harness(now: DateTime<Utc>, config: SchedulerConfig, users: Vec<User>, hr: Arc<dyn HrClient>) -> Harness {
    let state = Arc::new(MemoryLedgerStore::new());
    let audit = Arc::new(MemoryAuditStore::new());
    let gateway = Arc::new(MockGatewayClient::new());
    let clock: Arc<dyn Clock> = Arc::new(FixedClock(now));
    let key = parse_mac_key(&"ab".repeat(32)).unwrap();

    let ledger = Arc::new(QuotaLedger::new(
        state.clone() as Arc<dyn LedgerStore>,
        audit.clone() as Arc<dyn AuditStore>,
        gateway.clone() as Arc<dyn GatewayClient>,
        clock.clone(),
        LedgerConfig::new(key, "acme/starred-repo"),
    ));

    let strategy_store: Arc<dyn StrategyStore> = Arc::new(MemoryStrategyStore::new());
    let directory = Arc::new(StaticUserDirectory::new(users));
    let quota_lookup = Arc::new(GatewayQuotaLookup::new(gateway.clone() as Arc<dyn GatewayClient>));
    let engine = Arc::new(StrategyEngine::new(
        strategy_store.clone(),
        state.clone() as Arc<dyn LedgerStore>,
        ledger.clone(),
        directory,
        quota_lookup,
        clock.clone(),
        UTC,
    ));

    let composer = Arc::new(PermissionComposer::new(
        state.clone() as Arc<dyn LedgerStore>,
        gateway.clone() as Arc<dyn GatewayClient>,
        hr,
        PermissionConfig::new(SyncMode::Permissive),
    ));

    let (processor, shutdown) =
        BackgroundProcessor::new(config, strategy_store.clone(), engine, ledger, composer, clock, UTC);

    Harness { processor, shutdown, strategy_store, gateway, audit, state }
}

async fn run_for(mut processor: BackgroundProcessor, shutdown: tokio::sync::mpsc::Sender<()>, millis: u64) {
    let handle = tokio::spawn(async move {
        processor.run().await;
    });
    tokio::time::sleep(Duration::from_millis(millis)).await;
    let _ = shutdown.send(()).await;
    let _ = tokio::time::timeout(Duration::from_secs(1), handle).await;
}

#[tokio::test]
async fn dispatches_single_strategy_exactly_once_across_many_polls() {
    let now = dt("2026-03-01T00:00:00Z");
    let config = SchedulerConfig {
        strategy_poll_interval: Duration::from_millis(20),
        enable_expiry_sweep: false,
        enable_hr_sync: false,
        ..SchedulerConfig::default()
    };
    let hr: Arc<dyn HrClient> = Arc::new(StaticHrClient::default());
    let h = harness(now, config, vec![user("u1")], hr);
    h.strategy_store.create(strategy(StrategyKind::Single, None)).await.unwrap();

    run_for(h.processor, h.shutdown, 150).await;

    let rows = h.audit.list_for_user("u1").await.unwrap();
    assert_eq!(rows.len(), 1, "repeated polls must not re-grant a single strategy");
    assert_eq!(h.gateway.get_quota("u1").await.unwrap(), 10);
}

#[tokio::test]
async fn fires_periodic_strategy_once_per_cron_occurrence() {
    // Every poll tick lands on a due minute boundary for "* * * * *", but the
    // batch fingerprint is keyed on the cron fire instant the processor
    // computed, not on wall-clock poll count, so a fixed clock still yields
    // exactly one grant.
    let now = dt("2026-03-01T00:00:30Z");
    let config = SchedulerConfig {
        strategy_poll_interval: Duration::from_millis(20),
        enable_expiry_sweep: false,
        enable_hr_sync: false,
        ..SchedulerConfig::default()
    };
    let hr: Arc<dyn HrClient> = Arc::new(StaticHrClient::default());
    let h = harness(now, config, vec![user("u1")], hr);
    h.strategy_store.create(strategy(StrategyKind::Periodic, Some("* * * * *"))).await.unwrap();

    run_for(h.processor, h.shutdown, 150).await;

    let rows = h.audit.list_for_user("u1").await.unwrap();
    assert_eq!(rows.len(), 1, "a fixed clock must not re-fire the same cron occurrence");
}

#[tokio::test]
async fn runs_expiry_sweep_on_its_own_interval() {
    let now = dt("2026-03-01T00:00:00Z");
    let past = dt("2026-02-01T00:00:00Z");
    let config = SchedulerConfig {
        expiry_sweep_interval: Duration::from_millis(30),
        enable_strategy_dispatch: false,
        enable_hr_sync: false,
        ..SchedulerConfig::default()
    };
    let hr: Arc<dyn HrClient> = Arc::new(StaticHrClient::default());
    let h = harness(now, config, vec![], hr);

    {
        let mut tx = h.state.begin().await.unwrap();
        tx.save_lot(&QuotaLot {
            id: "lot-1".into(),
            user_id: "u1".into(),
            amount: 50,
            expiry_date: past,
            status: LotStatus::Valid,
        })
        .await
        .unwrap();
        tx.commit().await.unwrap();
    }
    h.gateway.refresh_quota("u1", 50).await.unwrap();

    run_for(h.processor, h.shutdown, 120).await;

    let remaining = {
        let mut tx = h.state.begin().await.unwrap();
        let lots = tx.valid_lots_for_user("u1").await.unwrap();
        tx.rollback().await.unwrap();
        lots
    };
    assert!(remaining.is_empty(), "the past-due lot should have flipped to expired");

    let rows = h.audit.list_for_user("u1").await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].operation, qm_core::AuditOperation::Expire);
}

#[tokio::test]
async fn runs_hr_sync_and_pushes_changed_permissions() {
    let now = dt("2026-03-01T00:00:00Z");
    let config = SchedulerConfig {
        hr_sync_interval: Duration::from_millis(30),
        enable_strategy_dispatch: false,
        enable_expiry_sweep: false,
        ..SchedulerConfig::default()
    };
    let employees = vec![Employee { employee_number: "e1".into(), department_path: "/acme/eng".into() }];
    let departments = vec![Department { key: "eng".into(), path: "/acme/eng".into() }];
    let hr: Arc<dyn HrClient> = Arc::new(StaticHrClient::new(employees, departments));
    let h = harness(now, config, vec![], hr);

    {
        let mut tx = h.state.begin().await.unwrap();
        tx.save_whitelist(&WhitelistEntry {
            scope: Scope::Department,
            key: "eng".into(),
            models: BTreeSet::from(["gpt-4".to_string()]),
        })
        .await
        .unwrap();
        tx.commit().await.unwrap();
    }

    run_for(h.processor, h.shutdown, 120).await;

    let permission = {
        let mut tx = h.state.begin().await.unwrap();
        let p = tx.find_effective_permission("e1").await.unwrap();
        tx.rollback().await.unwrap();
        p
    };
    assert_eq!(permission.unwrap().models, BTreeSet::from(["gpt-4".to_string()]));
    assert_eq!(h.gateway.model_permission_for("e1").await, Some(vec!["gpt-4".to_string()]));
}
