use evtracker_core::constants::REFERENCE_BORDER_TIER;
use evtracker_core::{MachineCatalog, MachineConfig, OutcomeKind, StaticCatalog};

fn configs() -> Vec<MachineConfig> {
    StaticCatalog::from_json(include_str!("../../evtracker-cli/assets/machines.json"))
        .unwrap()
        .machines()
        .unwrap()
}

#[test]
fn bundled_catalog_has_unique_ids() {
    let configs = configs();
    assert_eq!(configs.len(), 5);
    let mut ids: Vec<&str> = configs.iter().map(|c| c.id.as_str()).collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), configs.len());
}

#[test]
fn every_machine_is_usable_after_normalization() {
    for config in configs() {
        let machine = config.normalize();
        assert!(
            machine.per_spin_pay_balls > 0.0,
            "{}: perSpinPayBalls must be positive",
            machine.id
        );
        assert!(machine.cost_per_1k_balls > 0.0);
        assert!(
            machine.border_at(REFERENCE_BORDER_TIER).is_some(),
            "{}: missing tier-28 border",
            machine.id
        );
        assert!(!machine.hit_options.is_empty());
        assert!(machine.jackpot.as_deref().is_some_and(|j| j.starts_with("1/")));
        for kind in &machine.hit_options {
            let offered = config.restart.get(*kind);
            assert!(
                offered.is_some(),
                "{}: no restart value for offered outcome {kind}",
                machine.id
            );
        }
    }
}

#[test]
fn charge_machines_carry_a_charge_payout() {
    for config in configs() {
        let offers_charge = config
            .hit_options
            .as_ref()
            .is_some_and(|opts| opts.contains(&OutcomeKind::Charge));
        if offers_charge {
            assert!(config.charge_payout.is_some(), "{}", config.id);
        }
    }
}

#[test]
fn madoka_payout_rule_tolerates_extra_keys() {
    let madoka = configs()
        .into_iter()
        .find(|c| c.id == "madoka3")
        .unwrap()
        .normalize();
    assert_eq!(madoka.payout_rule.base_disp, 400);
    assert_eq!(madoka.payout_rule.unit, 15);
    assert_eq!(madoka.restart_for(OutcomeKind::LtEnd), 124);
}
