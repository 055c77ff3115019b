mod common;

use common::Harness;
use pretty_assertions::assert_eq;
use std::time::Duration;
use wld::fsm::{FsmEntity, FsmState, FsmStep};
use wld_common::SwlStatus;
use wld_types::{ApStatus, FreqBand, RadioStatus};

#[test]
fn test_blocked_pass_is_never_doubled() {
    let mut h = Harness::new();
    h.vendor.fail("radio_enable", SwlStatus::OkContinue);
    let radio = h.radio("wifi0", FreqBand::Band5GHz);
    let entity = FsmEntity::Radio(radio);

    assert_eq!(h.ctx.run_fsm(entity).unwrap(), FsmStep::Wait);
    assert_eq!(h.vendor.count("radio_enable"), 1);
    assert!(h.ctx.fsm(entity).unwrap().is_commit_pending());

    h.ctx.set_radio_tx_power(radio, 50).unwrap();
    assert_eq!(h.ctx.run_fsm(entity).unwrap(), FsmStep::Busy);
    assert_eq!(h.vendor.count("radio_enable"), 1);
    assert_eq!(h.vendor.count("radio_set_tx_power"), 1);

    h.vendor.heal("radio_enable");
    assert_eq!(
        h.ctx.fsm_action_done(entity, SwlStatus::Ok).unwrap(),
        FsmStep::Finished
    );
    assert_eq!(h.ctx.radio(radio).unwrap().status, RadioStatus::Up);

    // the edit made while busy runs in a pass of its own
    h.ctx.run_pending();
    assert_eq!(h.vendor.count("radio_set_tx_power"), 2);
    assert!(!h.ctx.fsm(entity).unwrap().is_dirty());
}

#[test]
fn test_retry_budget_then_error() {
    let mut h = Harness::new();
    h.vendor.fail("radio_set_channel", SwlStatus::Error);
    let radio = h.radio("wifi0", FreqBand::Band5GHz);
    let entity = FsmEntity::Radio(radio);

    h.ctx.commit().unwrap();
    assert_eq!(h.vendor.count("radio_set_channel"), 1);
    assert_eq!(h.ctx.fsm(entity).unwrap().state(), FsmState::Idle);

    h.ctx.advance(Duration::from_secs(10));
    assert_eq!(h.vendor.count("radio_set_channel"), 4);
    assert_eq!(h.ctx.fsm(entity).unwrap().state(), FsmState::Error);
    assert_eq!(h.ctx.radio(radio).unwrap().status, RadioStatus::Error);

    h.ctx.advance(Duration::from_secs(10));
    assert_eq!(h.vendor.count("radio_set_channel"), 4);

    h.vendor.heal("radio_set_channel");
    assert_eq!(h.ctx.reset_fsm(entity).unwrap(), FsmStep::Finished);
    assert_eq!(h.vendor.count("radio_set_channel"), 5);
    assert_eq!(h.ctx.radio(radio).unwrap().status, RadioStatus::Up);
}

#[test]
fn test_unsupported_capability_is_skipped() {
    let mut h = Harness::new();
    h.vendor.fail("radio_set_standards", SwlStatus::NotImplemented);
    let radio = h.radio("wifi0", FreqBand::Band2_4GHz);

    h.ctx.commit().unwrap();
    let fsm = h.ctx.fsm(FsmEntity::Radio(radio)).unwrap();
    assert_eq!(fsm.nr_errors(), 0);
    assert_eq!(h.ctx.radio(radio).unwrap().status, RadioStatus::Up);
}

#[test]
fn test_access_point_waits_for_radio() {
    let mut h = Harness::new();
    h.vendor.fail("radio_enable", SwlStatus::OkContinue);
    let radio = h.radio("wifi0", FreqBand::Band5GHz);
    let ap = h.ctx.add_ap(radio, "vap5g0", "home").unwrap();
    h.ctx.set_ap_enable(ap, true).unwrap();

    h.ctx.commit().unwrap();
    assert_eq!(h.vendor.count("ap_create_vap"), 0);
    assert_eq!(
        h.ctx.fsm(FsmEntity::AccessPoint(ap)).unwrap().state(),
        FsmState::Dependency
    );

    h.vendor.heal("radio_enable");
    h.ctx
        .fsm_action_done(FsmEntity::Radio(radio), SwlStatus::Ok)
        .unwrap();
    h.ctx.run_pending();
    assert_eq!(h.vendor.count("ap_create_vap"), 1);
    assert_eq!(h.ctx.access_point(ap).unwrap().status, ApStatus::Enabled);
}

#[test]
fn test_autocommit_coalesces_edits() {
    let vendor = common::MockVendor::new();
    let mut config = wld::WldConfig::default();
    config.secdmn.watch_interval_secs = 0;
    let mut h = Harness::with_config(config, vendor);
    let radio = h.radio("wifi0", FreqBand::Band5GHz);

    h.ctx.set_radio_tx_power(radio, 40).unwrap();
    h.ctx.set_radio_tx_power(radio, 60).unwrap();
    assert_eq!(h.vendor.count("radio_set_tx_power"), 0);
    assert!(h.ctx.has_timer(&wld::TimerAction::AutoCommit));

    h.ctx.advance(Duration::from_millis(500));
    assert_eq!(h.vendor.count("radio_set_tx_power"), 1);
    assert_eq!(h.ctx.radio(radio).unwrap().tx_power, 60);
}
