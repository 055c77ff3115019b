mod common;

use common::{MockSpawner, MockVendor, VENDOR};
use pretty_assertions::assert_eq;
use std::io::Write;
use std::rc::Rc;
use std::time::Duration;
use tempfile::NamedTempFile;
use wld::config::WldConfig;
use wld::mld::MldType;
use wld::secdmn::ProcessSpawner;
use wld::topology::Topology;
use wld::{VendorOps, WldContext};
use wld_types::{ApStatus, ConnectionStatus, RadioStatus};

const TOPOLOGY: &str = r#"
[autocommit]
delay_ms = 200

[secdmn]
watch_interval_secs = 0

[[radios]]
name = "wifi1"
vendor = "mock"
band = "5GHz"
channel = 36

[[radios]]
name = "wifi2"
vendor = "mock"
band = "6GHz"

[[access_points]]
alias = "vap5g0"
radio = "wifi1"
ssid = "home"
mld_unit = 0
security = { mode = "WPA3-Personal", sae_passphrase = "password123" }

[[access_points]]
alias = "vap6g0"
radio = "wifi2"
ssid = "home"
mld_unit = 0
security = { mode = "WPA3-Personal", sae_passphrase = "password123" }

[[endpoints]]
alias = "sta0"
radio = "wifi1"

[[endpoints.profiles]]
alias = "uplink"
ssid = "upstream"
security = { mode = "WPA2-Personal", key_passphrase = "password123" }
"#;

fn bootstrap() -> (WldContext, Rc<MockVendor>) {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(TOPOLOGY.as_bytes()).unwrap();
    file.flush().unwrap();
    let config = WldConfig::from_file(file.path()).unwrap();

    let vendor = MockVendor::new();
    let mut ctx = WldContext::new(config, MockSpawner::new() as Rc<dyn ProcessSpawner>);
    ctx.init();
    ctx.register_vendor(Rc::clone(&vendor) as Rc<dyn VendorOps>)
        .unwrap();
    Topology::apply(&mut ctx).unwrap();
    (ctx, vendor)
}

#[test]
fn test_topology_comes_up_after_autocommit() {
    let (mut ctx, vendor) = bootstrap();
    assert_eq!(ctx.vendor_names().collect::<Vec<_>>(), vec![VENDOR]);
    assert_eq!(vendor.count("ap_create_vap"), 0);

    ctx.advance(Duration::from_millis(200));
    ctx.run_pending();

    let wifi1 = ctx.find_radio("wifi1").unwrap();
    assert_eq!(ctx.radio(wifi1).unwrap().status, RadioStatus::Up);
    assert_eq!(ctx.radio(wifi1).unwrap().channel, 36);
    for alias in ["vap5g0", "vap6g0"] {
        let ap = ctx.find_access_point(alias).unwrap();
        assert_eq!(ctx.access_point(ap).unwrap().status, ApStatus::Enabled);
    }
    let ep = ctx.find_endpoint("sta0").unwrap();
    assert_eq!(
        ctx.endpoint(ep).unwrap().connection_status,
        ConnectionStatus::Connecting
    );
    assert_eq!(vendor.count("ap_create_vap"), 2);
    assert_eq!(vendor.count("ep_connect"), 1);
}

#[test]
fn test_topology_builds_mld() {
    let (ctx, _) = bootstrap();
    let mld = ctx.mld().mld(MldType::Ap, 0).unwrap();
    assert_eq!(mld.links.len(), 2);
    assert!(mld.links.iter().all(|l| ctx.is_mld_link_usable(*l)));
}

#[test]
fn test_snapshot_lists_entities() {
    let (mut ctx, _) = bootstrap();
    ctx.advance(Duration::from_secs(1));

    let state = ctx.snapshot().unwrap();
    assert_eq!(state["now_ms"], 1000);
    assert_eq!(state["radios"].as_array().unwrap().len(), 2);
    assert_eq!(state["access_points"].as_array().unwrap().len(), 2);
    assert_eq!(state["endpoints"][0]["alias"], "sta0");
    assert_eq!(state["ssids"].as_array().unwrap().len(), 3);
}
