mod common;

use common::{mac, uplink_profile, Harness, MockVendor};
use pretty_assertions::assert_eq;
use std::time::Duration;
use wld::endpoint::EndPointProfile;
use wld::security::SecurityConfig;
use wld::{EpId, TimerAction, WldConfig};
use wld_types::{ConnectionStatus, EndpointError, EndpointStatus, FreqBand, MacAddress};

fn connected(config: WldConfig) -> (Harness, EpId) {
    let mut h = Harness::with_config(config, MockVendor::new());
    let radio = h.radio("wifi0", FreqBand::Band5GHz);
    let ep = h.connected_endpoint(radio, "sta0", mac(0x10));
    (h, ep)
}

fn link_lost(h: &mut Harness, ep: EpId) {
    h.vendor.set_bssid(None);
    h.ctx
        .endpoint_connection_update(ep, ConnectionStatus::Disconnected, MacAddress::NULL)
        .unwrap();
}

/// `ep_connect` and `ep_disconnect` calls in order, from `from` on.
fn connection_calls(h: &Harness, from: usize) -> Vec<String> {
    h.vendor.calls()[from..]
        .iter()
        .filter(|c| *c == "ep_connect" || *c == "ep_disconnect")
        .cloned()
        .collect()
}

#[test]
fn test_reconnect_delay_then_interval_until_exhausted() {
    let mut config = WldConfig::default();
    config.autocommit.enabled = false;
    config.secdmn.watch_interval_secs = 0;
    config.endpoint.reconnect_delay_secs = 5;
    config.endpoint.reconnect_interval_secs = 30;
    config.endpoint.max_reconnect_attempts = 3;
    let (mut h, ep) = connected(config);
    let connects = h.vendor.count("ep_connect");

    link_lost(&mut h, ep);
    assert!(h.ctx.has_timer(&TimerAction::EpReconnect(ep)));

    h.ctx.advance(Duration::from_secs(4));
    assert_eq!(h.vendor.count("ep_connect"), connects);
    h.ctx.advance(Duration::from_secs(1));
    assert_eq!(h.vendor.count("ep_connect"), connects + 1);

    h.ctx.advance(Duration::from_secs(29));
    assert_eq!(h.vendor.count("ep_connect"), connects + 1);
    h.ctx.advance(Duration::from_secs(1));
    assert_eq!(h.vendor.count("ep_connect"), connects + 2);

    h.ctx.advance(Duration::from_secs(30));
    assert_eq!(h.vendor.count("ep_connect"), connects + 3);
    assert!(!h.ctx.has_timer(&TimerAction::EpReconnect(ep)));

    h.ctx.advance(Duration::from_secs(300));
    assert_eq!(h.vendor.count("ep_connect"), connects + 3);
    let reconnect = &h.ctx.endpoint(ep).unwrap().reconnect;
    assert_eq!(reconnect.nr_attempts, 3);
    assert_eq!(reconnect.nr_reconnects, 3);
}

#[test]
fn test_connection_resets_the_attempt_count() {
    let mut h = Harness::new();
    let radio = h.radio("wifi0", FreqBand::Band5GHz);
    let ep = h.connected_endpoint(radio, "sta0", mac(0x10));
    link_lost(&mut h, ep);
    h.ctx.advance(Duration::from_secs(5));
    assert_eq!(h.ctx.endpoint(ep).unwrap().reconnect.nr_attempts, 1);

    h.ctx
        .endpoint_connection_update(ep, ConnectionStatus::Connected, mac(0x10))
        .unwrap();
    assert_eq!(h.ctx.endpoint(ep).unwrap().reconnect.nr_attempts, 0);
    assert!(!h.ctx.has_timer(&TimerAction::EpReconnect(ep)));
}

#[test]
fn test_updating_active_profile_reconnects() {
    let mut h = Harness::new();
    let radio = h.radio("wifi0", FreqBand::Band5GHz);
    let ep = h.connected_endpoint(radio, "sta0", mac(0x10));
    let from = h.vendor.calls().len();

    let mut profile = uplink_profile();
    profile.security = SecurityConfig::wpa2_personal("rotated-key");
    h.ctx.update_endpoint_profile(ep, profile).unwrap();
    h.ctx.commit().unwrap();

    assert_eq!(connection_calls(&h, from), vec!["ep_disconnect", "ep_connect"]);
    assert_eq!(
        h.ctx.endpoint(ep).unwrap().connection_status,
        ConnectionStatus::Connecting
    );
}

#[test]
fn test_deleting_active_profile_switches_profile() {
    let mut h = Harness::new();
    let radio = h.radio("wifi0", FreqBand::Band5GHz);
    let ep = h.connected_endpoint(radio, "sta0", mac(0x10));
    let backup = EndPointProfile::new(
        "backup",
        "fallback",
        SecurityConfig::wpa2_personal("password456"),
    );
    h.ctx.add_endpoint_profile(ep, backup).unwrap();
    h.ctx.commit().unwrap();
    assert_eq!(h.ctx.endpoint(ep).unwrap().current_profile.as_deref(), Some("uplink"));
    let from = h.vendor.calls().len();

    h.ctx.delete_endpoint_profile(ep, "uplink").unwrap();
    assert_eq!(h.ctx.endpoint(ep).unwrap().current_profile.as_deref(), Some("backup"));
    h.ctx.commit().unwrap();
    assert_eq!(connection_calls(&h, from), vec!["ep_disconnect", "ep_connect"]);
}

#[test]
fn test_deleting_last_profile_parks_endpoint() {
    let mut h = Harness::new();
    let radio = h.radio("wifi0", FreqBand::Band5GHz);
    let ep = h.connected_endpoint(radio, "sta0", mac(0x10));

    h.ctx.delete_endpoint_profile(ep, "uplink").unwrap();
    let e = h.ctx.endpoint(ep).unwrap();
    assert_eq!(e.status, EndpointStatus::Error);
    assert_eq!(e.error, EndpointError::Misconfigured);
    assert!(!h.ctx.has_timer(&TimerAction::EpReconnect(ep)));
}
