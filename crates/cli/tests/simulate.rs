//! Scenario runner tests

use curvebank_cli::{commands, Scenario, Simulator, Step};
use curvebank_core::{Address, PositionId, WAD};
use curvebank_market::EngineConfig;
use std::io::Write;
use std::path::PathBuf;
use tempfile::NamedTempFile;

fn bundled(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("scenarios")
        .join(name)
}

fn write_scenario(json: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(json.as_bytes()).unwrap();
    file
}

#[test]
fn test_bundled_mortgage_cycle() {
    let report =
        commands::simulate(&EngineConfig::default(), bundled("mortgage_cycle.json"), false).unwrap();

    assert_eq!(report.steps.len(), 11);
    assert_eq!(report.failures(), 1);
    let failed = &report.steps[7];
    assert_eq!(failed.op, "redeem");
    assert!(failed.error.as_deref().unwrap().contains("Unknown position"));

    let multiply = report.steps[0].receipt.as_ref().unwrap();
    assert_eq!(multiply["paid"], "999999995636363637");
    assert_eq!(multiply["mortgage_fee"], "90909090512396694");
    // Token amounts beyond u64 come out as decimal strings
    assert_eq!(multiply["position_amount"], "83333333000000000000000");
    assert_eq!(report.steps[1].receipt.as_ref().unwrap()["amount"], "1000000000000000000000");

    // Market creation plus ten successful steps
    assert_eq!(report.events.len(), 11);
    assert_eq!(report.positions.len(), 2);
    let bob = Address::from("bob");
    assert!(report.positions.iter().all(|p| p.owner.as_ref() == Some(&bob)));

    let market = &report.markets[0];
    let locked: u128 = report.positions.iter().map(|p| p.amount).sum();
    assert_eq!(market.reserve_balance, locked);
    assert_eq!(market.total_supply, locked);
    assert!(report.balances.contains_key("app-1-creator"));
}

#[test]
fn test_strict_mode_stops_at_first_failure() {
    let file = write_scenario(
        r#"{
            "funding": { "alice": "10" },
            "markets": [{ "id": "m", "creator": "c", "community": "k" }],
            "steps": [
                { "op": "buy", "caller": "alice", "market": "m", "amount": "1" },
                { "op": "sell", "caller": "alice", "market": "m", "amount": "2" },
                { "op": "buy", "caller": "alice", "market": "m", "amount": "1" }
            ]
        }"#,
    );
    let config = EngineConfig::default();

    let err = commands::simulate(&config, file.path(), true).unwrap_err();
    assert!(format!("{err:#}").contains("Step 1 (sell) failed"));

    let report = commands::simulate(&config, file.path(), false).unwrap();
    assert_eq!(report.failures(), 1);
    assert!(report.steps[2].succeeded());
}

#[test]
fn test_large_steps_succeed_in_strict_mode() {
    let report = commands::simulate(
        &EngineConfig::default(),
        write_scenario(
            r#"{
                "funding": { "alice": "1000000" },
                "markets": [{ "id": "m", "creator": "c", "community": "k" }],
                "steps": [
                    { "op": "buy", "caller": "alice", "market": "m", "amount": "5000" },
                    { "op": "mortgage", "caller": "alice", "market": "m", "amount": "5000", "label": "big" },
                    { "op": "redeem", "caller": "alice", "position": "big", "amount": "2500" }
                ]
            }"#,
        )
        .path(),
        true,
    )
    .unwrap();

    assert_eq!(report.failures(), 0);
    let redeem = report.steps[2].receipt.as_ref().unwrap();
    assert_eq!(redeem["remaining"], "2500000000000000000000");
    assert_eq!(report.positions[0].amount, 2500 * WAD);
}

#[test]
fn test_token_asset_scenario() {
    let file = write_scenario(
        r#"{
            "config": { "asset": "token" },
            "funding": { "alice": "100" },
            "markets": [{ "id": "m", "creator": "c", "community": "k" }],
            "steps": [
                { "op": "buy", "caller": "alice", "market": "m", "amount": "1" }
            ]
        }"#,
    );

    let report = commands::simulate(&EngineConfig::default(), file.path(), true).unwrap();
    let receipt = report.steps[0].receipt.as_ref().unwrap();
    assert_eq!(receipt["paid"], "1010001010001009");
    assert_eq!(receipt["refunded"], "0");
}

#[test]
fn test_labels_and_literal_ids_resolve() {
    let scenario: Scenario = serde_json::from_str(
        r#"{
            "funding": { "alice": "100" },
            "markets": [{ "id": "m", "creator": "c", "community": "k" }],
            "steps": [
                { "op": "buy", "caller": "alice", "market": "m", "amount": "5" },
                { "op": "mortgage", "caller": "alice", "market": "m", "amount": "5", "label": "p" }
            ]
        }"#,
    )
    .unwrap();
    let mut simulator = Simulator::new(&scenario, &EngineConfig::default()).unwrap();
    for step in &scenario.steps {
        simulator.apply(step).unwrap();
    }

    let redeem = |position: &str| Step::Redeem {
        caller: "alice".to_string(),
        position: position.to_string(),
        amount: "1".to_string(),
        max_pay: None,
    };
    simulator.apply(&redeem("p")).unwrap();
    simulator.apply(&redeem(&PositionId::new(0, 0).to_string())).unwrap();
    assert!(simulator.apply(&redeem("missing")).is_err());

    let engine = simulator.engine();
    assert_eq!(engine.position(PositionId::new(0, 0)).unwrap().amount, 3 * WAD);
    assert_eq!(engine.balance_of(&"m".into(), &Address::from("alice")), 2 * WAD);
}
