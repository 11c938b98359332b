use qm_server::config::{AppConfig, StorageBackend};
use qm_server::ServerError;

fn base_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.storage.backend = StorageBackend::Memory;
    config.ledger.voucher_key = "ab".repeat(32);
    config.hr.base_url = "http://127.0.0.1:0".to_owned();
    config.gateway.base_url = "http://127.0.0.1:0".to_owned();
    config.server.port = 0;
    config
}

#[tokio::test]
async fn builds_a_memory_backed_context_from_default_config() {
    let config = base_config();
    let ctx = qm_server::build(&config).await.unwrap();
    assert_eq!(ctx.server_addr, "0.0.0.0:0");
}

#[tokio::test]
async fn rejects_a_malformed_voucher_key() {
    let mut config = base_config();
    config.ledger.voucher_key = "not-a-valid-key".to_owned();
    let err = qm_server::build(&config).await.unwrap_err();
    assert!(matches!(err, ServerError::VoucherKey(_)));
}

#[tokio::test]
async fn rejects_two_strategies_with_the_same_name_at_seed_time() {
    use chrono::Utc;
    use qm_core::{QuotaStrategy, StrategyKind};

    let mut config = base_config();
    let strategy = QuotaStrategy {
        id: "s1".into(),
        name: "welcome".into(),
        title: "Welcome grant".into(),
        kind: StrategyKind::Single,
        amount: 10,
        model: "gpt".into(),
        condition: String::new(),
        cron_expr: None,
        expiry_days: Some(30),
        enabled: true,
        valid_from: Utc::now(),
        valid_to: None,
    };
    let mut duplicate = strategy.clone();
    duplicate.id = "s2".into();
    config.strategies = vec![strategy, duplicate];

    let err = qm_server::build(&config).await.unwrap_err();
    assert!(matches!(err, ServerError::SeedStrategy { .. }));
}

#[tokio::test]
async fn a_full_build_wires_a_usable_health_state() {
    let config = base_config();
    let ctx = qm_server::build(&config).await.unwrap();
    let now = ctx.health_state.clock.now();
    assert!(now.timestamp() > 0, "clock wired into the health state should report the real time");
}
