mod common;

use common::{mac, Harness};
use pretty_assertions::assert_eq;
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;
use wld::ap::NR_OF_STICKY_UNAUTHORIZED_STATIONS;
use wld::events::{ApActionEvent, ApActionType, StationChange, StationLifecycleEvent};
use wld::ApId;
use wld_common::{EventCallback, SwlStatus};
use wld_types::{FreqBand, MacAddress};

type Seen = Rc<RefCell<Vec<(MacAddress, StationChange)>>>;

fn enabled_ap() -> (Harness, ApId) {
    let mut h = Harness::new();
    let radio = h.radio("wifi0", FreqBand::Band5GHz);
    let ap = h.ctx.add_ap(radio, "vap5g0", "home").unwrap();
    h.ctx.set_ap_enable(ap, true).unwrap();
    h.ctx.commit().unwrap();
    assert_eq!(h.ctx.access_point(ap).unwrap().max_stations, 4);
    (h, ap)
}

fn record(h: &Harness) -> (Seen, EventCallback<StationLifecycleEvent>) {
    let seen: Seen = Rc::default();
    let sink = Rc::clone(&seen);
    let cb: EventCallback<StationLifecycleEvent> = Rc::new(move |ev: &StationLifecycleEvent| {
        sink.borrow_mut().push((ev.station, ev.change))
    });
    h.ctx.bus().station_lifecycle.register(&cb);
    (seen, cb)
}

fn macs(h: &Harness, ap: ApId) -> Vec<MacAddress> {
    h.ctx
        .access_point(ap)
        .unwrap()
        .stations
        .iter()
        .map(|s| s.mac)
        .collect()
}

/// Connects and lets each station go without authorizing, one second apart.
fn leave_unauthorized(h: &mut Harness, ap: ApId, stations: &[MacAddress]) {
    for sta in stations {
        h.ctx.station_connect(ap, *sta).unwrap();
        h.ctx.advance(Duration::from_secs(1));
        h.ctx.station_disconnect(ap, *sta).unwrap();
        h.ctx.advance(Duration::from_secs(1));
    }
}

#[test]
fn test_keeps_two_sticky_unauthorized_entries() {
    let (mut h, ap) = enabled_ap();
    let (seen, _cb) = record(&h);
    let (a, b, c) = (mac(0xa1), mac(0xa2), mac(0xa3));

    leave_unauthorized(&mut h, ap, &[a, b]);
    assert_eq!(macs(&h, ap), vec![a, b]);
    assert_eq!(NR_OF_STICKY_UNAUTHORIZED_STATIONS + 1, 2);

    leave_unauthorized(&mut h, ap, &[c]);
    assert_eq!(macs(&h, ap), vec![b, c]);
    assert!(h.ctx.access_point(ap).unwrap().stations.iter().all(|s| !s.active));
    assert_eq!(seen.borrow().last(), Some(&(a, StationChange::Destroy)));
}

#[test]
fn test_authorized_station_is_destroyed_on_leave() {
    let (mut h, ap) = enabled_ap();
    let (seen, _cb) = record(&h);
    let sta = mac(0xb1);

    h.ctx.station_connect(ap, sta).unwrap();
    h.ctx.station_authorize(ap, sta).unwrap();
    h.ctx.station_disconnect(ap, sta).unwrap();

    assert!(h.ctx.access_point(ap).unwrap().station(sta).is_none());
    assert_eq!(
        *seen.borrow(),
        vec![
            (sta, StationChange::Create),
            (sta, StationChange::Assoc),
            (sta, StationChange::Auth),
            (sta, StationChange::Disassoc),
            (sta, StationChange::Destroy),
        ]
    );
}

#[test]
fn test_full_table_evicts_oldest_inactive() {
    let (mut h, ap) = enabled_ap();
    let (old, gone) = (mac(0xc1), mac(0xc2));
    leave_unauthorized(&mut h, ap, &[old, gone]);
    h.ctx.station_connect(ap, mac(0xc3)).unwrap();
    h.ctx.station_connect(ap, mac(0xc4)).unwrap();
    let (seen, _cb) = record(&h);

    h.ctx.station_connect(ap, mac(0xc5)).unwrap();
    assert_eq!(macs(&h, ap), vec![gone, mac(0xc3), mac(0xc4), mac(0xc5)]);
    assert_eq!(seen.borrow()[0], (old, StationChange::Destroy));
}

#[test]
fn test_full_table_of_active_stations_refuses() {
    let (mut h, ap) = enabled_ap();
    for last in 0xd1..=0xd4 {
        h.ctx.station_connect(ap, mac(last)).unwrap();
    }

    let err = h.ctx.station_connect(ap, mac(0xd5)).unwrap_err();
    assert_eq!(err.status(), SwlStatus::NotAvailable);
    assert_eq!(h.ctx.access_point(ap).unwrap().stations.len(), 4);
}

#[test]
fn test_lowering_max_stations_shrinks_the_table() {
    let (mut h, ap) = enabled_ap();
    let kicks: Rc<RefCell<Vec<MacAddress>>> = Rc::default();
    let sink = Rc::clone(&kicks);
    let cb: EventCallback<ApActionEvent> = Rc::new(move |ev: &ApActionEvent| {
        if ev.action == ApActionType::Kick {
            sink.borrow_mut().push(ev.station);
        }
    });
    h.ctx.bus().ap_action.register(&cb);

    for last in 0xe1..=0xe4 {
        h.ctx.station_connect(ap, mac(last)).unwrap();
        h.ctx.advance(Duration::from_secs(1));
    }
    h.ctx.station_disconnect(ap, mac(0xe3)).unwrap();
    let (seen, _cb) = record(&h);

    h.ctx.set_ap_max_stations(ap, 2).unwrap();
    h.ctx.commit().unwrap();

    let a = h.ctx.access_point(ap).unwrap();
    assert_eq!(a.stations.len(), 2);
    assert!(a.stations.len() <= a.max_stations);
    assert_eq!(macs(&h, ap), vec![mac(0xe2), mac(0xe4)]);
    assert_eq!(*kicks.borrow(), vec![mac(0xe1)]);
    assert_eq!(h.vendor.count("ap_kick_station"), 1);
    assert_eq!(
        *seen.borrow(),
        vec![
            (mac(0xe3), StationChange::Destroy),
            (mac(0xe1), StationChange::Disassoc),
            (mac(0xe1), StationChange::Destroy),
        ]
    );
}
