use evtracker_core::{
    Machine, MachineCatalog, OutcomeKind, SessionPhase, SessionState, StaticCatalog,
};

type Step = fn(&mut SessionState, &Machine);

fn machine(id: &str) -> Machine {
    let catalog =
        StaticCatalog::from_json(include_str!("../../evtracker-cli/assets/machines.json")).unwrap();
    catalog
        .machines()
        .unwrap()
        .into_iter()
        .find(|m| m.id == id)
        .unwrap()
        .normalize()
}

fn idle(_: &mut SessionState, _: &Machine) {}

fn open(s: &mut SessionState, _: &Machine) {
    s.start(1000.0).unwrap();
}

fn pending_hit(s: &mut SessionState, m: &Machine) {
    open(s, m);
    s.record_hit(1180.0).unwrap();
}

fn awaiting_payout(s: &mut SessionState, m: &Machine) {
    pending_hit(s, m);
    s.confirm_outcome(OutcomeKind::RushEnd, m).unwrap();
}

fn open_after_tan(s: &mut SessionState, m: &Machine) {
    pending_hit(s, m);
    s.confirm_outcome(OutcomeKind::Tan, m).unwrap();
}

fn open_after_payout(s: &mut SessionState, m: &Machine) {
    awaiting_payout(s, m);
    s.confirm_payout(2300.0, m).unwrap();
}

fn second_hit_pending(s: &mut SessionState, m: &Machine) {
    open_after_payout(s, m);
    s.confirm_investment(2000.0).unwrap();
    s.record_hit(140.0).unwrap();
}

fn awaiting_end_balance(s: &mut SessionState, m: &Machine) {
    open_after_tan(s, m);
    s.record_stop(Some(75.0)).unwrap();
}

fn forward_steps() -> [(&'static str, Step, Step); 13] {
    [
        ("start", idle, |s, _| s.start(500.0).unwrap()),
        ("hit", open, |s, _| s.record_hit(1100.0).unwrap()),
        ("tan", pending_hit, |s, m| {
            s.confirm_outcome(OutcomeKind::Tan, m).unwrap();
        }),
        ("rush end", pending_hit, |s, m| {
            s.confirm_outcome(OutcomeKind::RushEnd, m).unwrap();
        }),
        ("lt end", pending_hit, |s, m| {
            s.confirm_outcome(OutcomeKind::LtEnd, m).unwrap();
        }),
        ("payout", awaiting_payout, |s, m| {
            s.confirm_payout(1000.0, m).unwrap();
        }),
        ("zero payout", awaiting_payout, |s, m| {
            s.confirm_payout(0.0, m).unwrap();
        }),
        ("hit after restart", open_after_tan, |s, _| {
            s.record_hit(30.0).unwrap();
        }),
        ("hit after payout", open_after_payout, |s, _| {
            s.record_hit(90.0).unwrap();
        }),
        ("tan on second hit", second_hit_pending, |s, m| {
            s.confirm_outcome(OutcomeKind::Tan, m).unwrap();
        }),
        ("stop with counter", open, |s, _| s.record_stop(Some(1050.0)).unwrap()),
        ("stop at segment start", open_after_tan, |s, _| {
            s.record_stop(None).unwrap();
        }),
        ("end balance", awaiting_end_balance, |s, _| {
            s.confirm_end_balance(420.0).unwrap();
        }),
    ]
}

#[test]
fn undo_returns_exactly_to_the_prior_state() {
    let m = machine("madoka3");
    for (name, setup, step) in forward_steps() {
        let mut session = SessionState::new();
        setup(&mut session, &m);
        let before = session.clone();
        step(&mut session, &m);
        assert_ne!(session, before, "{name}: forward step changed nothing");
        session.undo_last().unwrap();
        assert_eq!(session, before, "{name}: undo did not restore the prior state");
    }
}

#[test]
fn charge_outcome_undoes_to_pending_hit() {
    let m = machine("megamiCafe");
    let mut session = SessionState::new();
    session.start(0.0).unwrap();
    session.record_hit(45.0).unwrap();
    let before = session.clone();
    session.confirm_outcome(OutcomeKind::Charge, &m).unwrap();
    assert_eq!(session.spin_log[0].payout, Some(280));
    session.undo_last().unwrap();
    assert_eq!(session, before);
    assert_eq!(session.phase(), SessionPhase::PendingHit);
}

#[test]
fn repeated_undo_drains_to_idle_but_keeps_investment() {
    let m = machine("madoka3");
    let mut session = SessionState::new();
    second_hit_pending(&mut session, &m);
    let mut guard = 0;
    while session.phase() != SessionPhase::Idle {
        session.undo_last().unwrap();
        guard += 1;
        assert!(guard < 20, "undo did not converge");
    }
    assert!(session.spin_log.is_empty());
    assert_eq!(session.confirmed_invest_yen, 2000);
    assert!(session.undo_last().is_err());
}
