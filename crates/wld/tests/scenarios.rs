//! End-to-end flows against the scripted vendor.

mod common;

use common::{mac, Harness, VENDOR};
use pretty_assertions::assert_eq;
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;
use wld::security::SecurityConfig;
use wld::{EpId, RoamResult, TimerAction};
use wld_types::{
    ApStatus, ConnectionStatus, EndpointError, EndpointStatus, FreqBand, RadioStatus,
};

#[test]
fn test_radio_is_ready_before_first_commit() {
    let mut h = Harness::new();
    let radio = h.radio("wifi0", FreqBand::Band2_4GHz);

    let r = h.ctx.radio(radio).unwrap();
    assert!(r.is_ready);
    assert_eq!(r.status, RadioStatus::Unknown);
    assert!(r.possible_channels.contains(&r.channel));
    assert_eq!(r.vendor, VENDOR);

    h.ctx.commit().unwrap();
    assert_eq!(h.ctx.radio(radio).unwrap().status, RadioStatus::Up);
}

#[test]
fn test_ap_enabled_only_after_commit() {
    let mut h = Harness::new();
    let radio = h.radio("wifi0", FreqBand::Band2_4GHz);
    let ap = h.ctx.add_ap(radio, "vap2g0", "home").unwrap();

    let security = SecurityConfig::wpa2_personal("password123");
    assert!(security.validate().is_ok());
    h.ctx.set_ap_security(ap, security).unwrap();

    h.ctx.set_ap_enable(ap, true).unwrap();
    assert_eq!(h.ctx.access_point(ap).unwrap().status, ApStatus::Disabled);

    h.ctx.commit().unwrap();
    let a = h.ctx.access_point(ap).unwrap();
    assert_eq!(a.status, ApStatus::Enabled);
    assert!(a.vap_created);
    assert_eq!(h.vendor.count("ap_create_vap"), 1);
}

#[test]
fn test_short_passphrase_is_rejected() {
    let mut h = Harness::new();
    let radio = h.radio("wifi0", FreqBand::Band5GHz);
    let ap = h.ctx.add_ap(radio, "vap5g0", "home").unwrap();

    let result = h.ctx.set_ap_security(ap, SecurityConfig::wpa2_personal("short"));
    assert!(result.is_err());
}

#[test]
fn test_endpoint_without_profile_is_misconfigured() {
    let mut h = Harness::new();
    let radio = h.radio("wifi0", FreqBand::Band5GHz);
    let ep = h.ctx.add_endpoint(radio, "sta0").unwrap();

    h.ctx.set_endpoint_enable(ep, true).unwrap();
    let e = h.ctx.endpoint(ep).unwrap();
    assert_eq!(e.status, EndpointStatus::Error);
    assert_eq!(e.connection_status, ConnectionStatus::Idle);
    assert_eq!(e.error, EndpointError::Misconfigured);
    assert!(!h.ctx.has_timer(&TimerAction::EpReconnect(ep)));

    h.ctx.commit().unwrap();
    h.ctx.advance(Duration::from_secs(60));
    assert!(!h.ctx.has_timer(&TimerAction::EpReconnect(ep)));
    assert_eq!(h.vendor.count("ep_connect"), 0);
}

type Results = Rc<RefCell<Vec<(EpId, RoamResult)>>>;

fn recorder() -> (Results, Box<dyn FnOnce(EpId, RoamResult)>) {
    let results: Results = Rc::default();
    let sink = Rc::clone(&results);
    (results, Box::new(move |ep, res| sink.borrow_mut().push((ep, res))))
}

#[test]
fn test_roam_succeeds_on_first_attempt() {
    let mut h = Harness::new();
    let radio = h.radio("wifi0", FreqBand::Band5GHz);
    let (x, y) = (mac(0x10), mac(0x20));
    let ep = h.connected_endpoint(radio, "sta0", x);
    let before = h.vendor.connects().len();

    let (results, cb) = recorder();
    assert!(h.ctx.roam_to(ep, y, 2, 10, cb));
    h.ctx.run_pending();

    assert_eq!(*results.borrow(), vec![(ep, RoamResult::Success)]);
    assert_eq!(h.vendor.connects()[before..].to_vec(), vec![Some(y)]);

    h.ctx.advance(Duration::from_secs(30));
    assert_eq!(results.borrow().len(), 1);
    assert_eq!(h.vendor.connects()[before..].to_vec(), vec![Some(y)]);
    let roam = &h.ctx.endpoint(ep).unwrap().roam;
    assert!(!roam.is_active());
    assert_eq!(roam.nr_roams, 1);
}
