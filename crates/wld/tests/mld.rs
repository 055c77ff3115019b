mod common;

use common::Harness;
use pretty_assertions::assert_eq;
use std::cell::RefCell;
use std::rc::Rc;
use wld::events::{MldChange, MldEvent};
use wld::mld::MldType;
use wld::security::SecurityConfig;
use wld::vendor::{NoopVendor, VendorOps};
use wld::{ApId, SsidId};
use wld_common::EventCallback;
use wld_types::FreqBand;

struct TwoBands {
    h: Harness,
    a: ApId,
    b: ApId,
    ssid_a: SsidId,
    ssid_b: SsidId,
}

fn two_bands() -> TwoBands {
    let mut h = Harness::new();
    let r5 = h.radio("wifi1", FreqBand::Band5GHz);
    let r6 = h.radio("wifi2", FreqBand::Band6GHz);
    let a = h.ctx.add_ap(r5, "vap5g0", "home").unwrap();
    let b = h.ctx.add_ap(r6, "vap6g0", "home").unwrap();
    let ssid_a = h.ctx.access_point(a).unwrap().ssid;
    let ssid_b = h.ctx.access_point(b).unwrap().ssid;
    TwoBands {
        h,
        a,
        b,
        ssid_a,
        ssid_b,
    }
}

fn record(h: &Harness) -> (Rc<RefCell<Vec<(u32, MldChange)>>>, EventCallback<MldEvent>) {
    let seen: Rc<RefCell<Vec<(u32, MldChange)>>> = Rc::default();
    let sink = Rc::clone(&seen);
    let cb: EventCallback<MldEvent> =
        Rc::new(move |ev: &MldEvent| sink.borrow_mut().push((ev.unit, ev.change)));
    h.ctx.bus().mld.register(&cb);
    (seen, cb)
}

#[test]
fn test_link_moves_between_units() {
    let TwoBands {
        mut h,
        ssid_a,
        ssid_b,
        ..
    } = two_bands();
    let (seen, _cb) = record(&h);

    let la = h.ctx.set_ssid_mld_unit(ssid_a, Some(1)).unwrap().unwrap();
    let lb = h.ctx.set_ssid_mld_unit(ssid_b, Some(1)).unwrap().unwrap();
    assert_eq!(h.ctx.mld().mld(MldType::Ap, 1).unwrap().links, vec![la, lb]);

    let moved = h.ctx.set_ssid_mld_unit(ssid_a, Some(2)).unwrap();
    assert_eq!(moved, Some(la));
    assert_eq!(h.ctx.mld().mld(MldType::Ap, 1).unwrap().links, vec![lb]);
    assert_eq!(h.ctx.mld().mld(MldType::Ap, 2).unwrap().links, vec![la]);
    assert_eq!(h.ctx.mld().link_of(ssid_a), Some(la));
    assert_eq!(h.ctx.mld().nr_links(), 2);

    assert_eq!(
        *seen.borrow(),
        vec![
            (1, MldChange::Add),
            (1, MldChange::Update),
            (1, MldChange::Update),
            (2, MldChange::Add),
        ]
    );
}

#[test]
fn test_same_unit_is_a_no_op() {
    let TwoBands { mut h, ssid_a, .. } = two_bands();
    let la = h.ctx.set_ssid_mld_unit(ssid_a, Some(3)).unwrap();
    let (seen, _cb) = record(&h);

    assert_eq!(h.ctx.set_ssid_mld_unit(ssid_a, Some(3)).unwrap(), la);
    assert!(seen.borrow().is_empty());
}

#[test]
fn test_empty_mld_is_destroyed() {
    let TwoBands {
        mut h,
        ssid_a,
        ssid_b,
        ..
    } = two_bands();
    h.ctx.set_ssid_mld_unit(ssid_a, Some(1)).unwrap();
    h.ctx.set_ssid_mld_unit(ssid_b, Some(1)).unwrap();
    let (seen, _cb) = record(&h);

    assert_eq!(h.ctx.set_ssid_mld_unit(ssid_a, None).unwrap(), None);
    assert!(h.ctx.mld().mld(MldType::Ap, 1).is_some());
    h.ctx.set_ssid_mld_unit(ssid_b, None).unwrap();
    assert!(h.ctx.mld().mld(MldType::Ap, 1).is_none());
    assert_eq!(h.ctx.mld().nr_links(), 0);
    assert_eq!(
        *seen.borrow(),
        vec![(1, MldChange::Update), (1, MldChange::Del)]
    );
}

#[test]
fn test_deleting_ap_releases_its_link() {
    let TwoBands {
        mut h, a, ssid_a, ..
    } = two_bands();
    h.ctx.set_ssid_mld_unit(ssid_a, Some(4)).unwrap();

    h.ctx.delete_ap(a).unwrap();
    assert!(h.ctx.mld().mld(MldType::Ap, 4).is_none());
    assert_eq!(h.ctx.mld().link_of(ssid_a), None);
}

#[test]
fn test_ap_and_sta_units_are_separate() {
    let TwoBands { mut h, ssid_a, .. } = two_bands();
    let radio = h.ctx.find_radio("wifi1").unwrap();
    let ep = h.ctx.add_endpoint(radio, "sta0").unwrap();
    let ssid_ep = h.ctx.endpoint(ep).unwrap().ssid;

    h.ctx.set_ssid_mld_unit(ssid_a, Some(1)).unwrap();
    h.ctx.set_ssid_mld_unit(ssid_ep, Some(1)).unwrap();
    assert_eq!(h.ctx.mld().mld(MldType::Ap, 1).unwrap().links.len(), 1);
    assert_eq!(h.ctx.mld().mld(MldType::Sta, 1).unwrap().links.len(), 1);
}

#[test]
fn test_radio_without_be_gets_no_link() {
    let mut h = Harness::new();
    h.ctx
        .register_vendor(Rc::new(NoopVendor::new("plain")) as Rc<dyn VendorOps>)
        .unwrap();
    let radio = h.ctx.add_radio("wifi9", "plain", FreqBand::Band2_4GHz).unwrap();
    let ap = h.ctx.add_ap(radio, "vap2g9", "legacy").unwrap();
    let ssid = h.ctx.access_point(ap).unwrap().ssid;

    assert_eq!(h.ctx.set_ssid_mld_unit(ssid, Some(1)).unwrap(), None);
    assert!(h.ctx.mld().mld(MldType::Ap, 1).is_none());
}

#[test]
fn test_primary_link_rules() {
    let TwoBands {
        mut h,
        ssid_a,
        ssid_b,
        ..
    } = two_bands();
    let la = h.ctx.set_ssid_mld_unit(ssid_a, Some(1)).unwrap().unwrap();
    let lb = h.ctx.set_ssid_mld_unit(ssid_b, Some(1)).unwrap().unwrap();

    h.ctx.set_ssid_enable(ssid_a, false).unwrap();
    assert!(!h.ctx.is_mld_link_enabled(la));
    assert!(h.ctx.set_mld_primary_link(la).is_err());
    assert_eq!(h.ctx.mld_primary_link(lb), None);

    h.ctx.set_ssid_enable(ssid_a, true).unwrap();
    h.ctx.set_mld_primary_link(la).unwrap();
    assert!(h.ctx.set_mld_primary_link(lb).is_err());
    assert_eq!(h.ctx.mld_primary_link(lb), Some(la));
    assert!(!h.ctx.mld().link(lb).unwrap().primary);

    h.ctx.clear_mld_primary_link(la).unwrap();
    h.ctx.set_mld_primary_link(lb).unwrap();
    assert_eq!(h.ctx.mld_primary_link(la), Some(lb));
}

#[test]
fn test_link_usable_needs_shared_mlo_credentials() {
    let TwoBands {
        mut h,
        a,
        b,
        ssid_a,
        ssid_b,
    } = two_bands();
    h.ctx
        .set_ap_security(a, SecurityConfig::wpa2_personal("password123"))
        .unwrap();
    h.ctx
        .set_ap_security(b, SecurityConfig::wpa2_personal("password123"))
        .unwrap();
    let la = h.ctx.set_ssid_mld_unit(ssid_a, Some(1)).unwrap().unwrap();
    let lb = h.ctx.set_ssid_mld_unit(ssid_b, Some(1)).unwrap().unwrap();
    assert!(!h.ctx.is_mld_link_usable(la));

    h.ctx
        .set_ap_security(a, SecurityConfig::wpa3_personal("password123"))
        .unwrap();
    h.ctx
        .set_ap_security(b, SecurityConfig::wpa3_personal("different1"))
        .unwrap();
    assert!(!h.ctx.is_mld_link_usable(la));

    h.ctx
        .set_ap_security(b, SecurityConfig::wpa3_personal("password123"))
        .unwrap();
    assert!(h.ctx.is_mld_link_usable(la));
    assert!(h.ctx.is_mld_link_usable(lb));
    assert_eq!(h.ctx.mld_fallback_primary(ssid_b), Some(la));
    assert_eq!(h.ctx.count_mld_neigh_enabled_links(la), 2);
}

#[test]
fn test_security_change_notifies_link_update() {
    let TwoBands { mut h, a, ssid_a, .. } = two_bands();
    h.ctx.set_ssid_mld_unit(ssid_a, Some(1)).unwrap();
    let (seen, _cb) = record(&h);

    h.ctx
        .set_ap_security(a, SecurityConfig::wpa3_personal("password123"))
        .unwrap();
    assert_eq!(*seen.borrow(), vec![(1, MldChange::Update)]);
}
