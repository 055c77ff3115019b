mod common;

use common::{Harness, MockVendor, VENDOR};
use pretty_assertions::assert_eq;
use std::time::Duration;
use wld::config::WldConfig;
use wld::secdmn::{split_args, GlobalDmnSupport, GlobalInstanceSetting};
use wld::{ApId, DmnId, RadioId};
use wld_types::FreqBand;

fn serving_radio(h: &mut Harness, name: &str, band: FreqBand) -> (RadioId, ApId, DmnId) {
    let radio = h.radio(name, band);
    let ap = h
        .ctx
        .add_ap(radio, &format!("vap-{}", name), "home")
        .unwrap();
    h.ctx.set_ap_enable(ap, true).unwrap();
    let dmn = h.ctx.radio(radio).unwrap().hostapd().unwrap();
    (radio, ap, dmn)
}

fn settle(h: &mut Harness) {
    h.ctx.commit().unwrap();
    h.ctx.run_pending();
    h.ctx.advance(Duration::from_secs(1));
}

#[test]
fn test_hostapd_follows_access_points() {
    let mut h = Harness::new();
    let (_, ap, dmn) = serving_radio(&mut h, "wifi0", FreqBand::Band5GHz);
    assert!(h.spawner.starts.borrow().is_empty());

    settle(&mut h);
    assert_eq!(h.spawner.starts.borrow().len(), 1);
    assert_eq!(h.spawner.starts.borrow()[0].0, "/usr/sbin/hostapd");
    assert!(h.ctx.secdmn().dmn_is_running(dmn));

    h.ctx.set_ap_enable(ap, false).unwrap();
    settle(&mut h);
    assert!(!h.ctx.secdmn().dmn_is_running(dmn));
    assert!(h.spawner.running().is_empty());
}

#[test]
fn test_watch_restarts_dead_daemon() {
    let mut config = WldConfig::default();
    config.autocommit.enabled = false;
    config.secdmn.watch_interval_secs = 10;
    let mut h = Harness::with_config(config, MockVendor::new());
    let (_, _, dmn) = serving_radio(&mut h, "wifi0", FreqBand::Band5GHz);
    settle(&mut h);

    let pid = h.spawner.running()[0];
    h.spawner.kill(pid);
    assert!(!h.ctx.secdmn().dmn_is_running(dmn));

    h.ctx.advance(Duration::from_secs(10));
    assert_eq!(h.spawner.starts.borrow().len(), 2);
    assert!(h.ctx.secdmn().dmn_is_running(dmn));
    assert_eq!(h.ctx.secdmn().dmn(dmn).unwrap().nr_starts, 2);
}

#[test]
fn test_global_instance_serves_all_radios() {
    let mut h = Harness::with_vendor(MockVendor::with_global_support(GlobalDmnSupport::Required));
    assert_eq!(h.vendor.global_changes(), vec![true]);
    let (_, _, d1) = serving_radio(&mut h, "wifi1", FreqBand::Band5GHz);
    let (_, _, d2) = serving_radio(&mut h, "wifi2", FreqBand::Band6GHz);

    let grp = h.ctx.secdmn().dmn(d1).unwrap().group().unwrap();
    assert_eq!(h.ctx.secdmn().dmn(d2).unwrap().group(), Some(grp));
    assert_eq!(h.ctx.secdmn().grp_members_count(grp), 2);

    settle(&mut h);
    let starts = h.spawner.starts.borrow();
    assert_eq!(starts.len(), 1);
    let args1 = &h.ctx.secdmn().dmn(d1).unwrap().args;
    let args2 = &h.ctx.secdmn().dmn(d2).unwrap().args;
    assert_eq!(starts[0].1, split_args(&format!("{} {}", args1, args2)));
    assert!(h.ctx.secdmn().grp_is_running(grp));
}

#[test]
fn test_switching_global_instance_off() {
    let mut h = Harness::with_vendor(MockVendor::with_global_support(GlobalDmnSupport::Optional));
    assert!(h.ctx.vendor_exec_info(VENDOR).unwrap().uses_global());
    let (_, _, dmn) = serving_radio(&mut h, "wifi0", FreqBand::Band5GHz);
    assert!(h.ctx.secdmn().dmn(dmn).unwrap().group().is_some());

    h.ctx
        .set_global_dmn_setting(GlobalInstanceSetting::Off)
        .unwrap();
    assert!(!h.ctx.vendor_exec_info(VENDOR).unwrap().uses_global());
    assert_eq!(h.ctx.secdmn().dmn(dmn).unwrap().group(), None);
    assert_eq!(h.vendor.global_changes(), vec![true, false]);

    settle(&mut h);
    assert!(h.ctx.secdmn().dmn_is_running(dmn));
}

#[test]
fn test_unsupported_vendor_ignores_setting() {
    let mut h = Harness::new();
    h.ctx
        .set_global_dmn_setting(GlobalInstanceSetting::On)
        .unwrap();
    assert!(!h.ctx.vendor_exec_info(VENDOR).unwrap().uses_global());
    assert!(h.vendor.global_changes().iter().all(|g| !g));
}

#[test]
fn test_shutdown_stops_every_process() {
    let mut h = Harness::new();
    serving_radio(&mut h, "wifi0", FreqBand::Band5GHz);
    let radio = h.ctx.find_radio("wifi0").unwrap();
    h.ready_endpoint(radio, "sta0");
    settle(&mut h);
    assert_eq!(h.spawner.running().len(), 2);

    h.ctx.shutdown();
    assert!(h.spawner.running().is_empty());
}
