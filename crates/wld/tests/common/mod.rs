//! Shared harness for the integration tests: a scripted vendor backend and
//! a process spawner that never forks.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::path::Path;
use std::rc::Rc;
use wld::ap::{AccessPoint, WpsMethod};
use wld::config::WldConfig;
use wld::endpoint::{EndPointProfile, Endpoint};
use wld::radio::Radio;
use wld::secdmn::{GlobalDmnSupport, ProcessSpawner};
use wld::security::SecurityConfig;
use wld::ssid::Ssid;
use wld::vendor::{RadioCaps, VendorOps};
use wld::{EpId, RadioId, WldContext, WldResult};
use wld_common::SwlStatus;
use wld_types::{ConnectionStatus, FreqBand, MacAddress, Standard};

pub const VENDOR: &str = "mock";

/// Vendor backend recording every call.
///
/// Calls answer `Ok` unless a status was programmed for the operation with
/// [`MockVendor::fail`]. The BSSID oracle answers `ep_current_bssid`; with
/// `follow_connect` set, a pinned `ep_connect` moves the oracle to the pin.
pub struct MockVendor {
    calls: RefCell<Vec<String>>,
    statuses: RefCell<HashMap<&'static str, SwlStatus>>,
    connects: RefCell<Vec<Option<MacAddress>>>,
    bssid: Cell<Option<MacAddress>>,
    follow_connect: Cell<bool>,
    global_support: Cell<GlobalDmnSupport>,
    global_changes: RefCell<Vec<bool>>,
}

impl MockVendor {
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            calls: RefCell::new(Vec::new()),
            statuses: RefCell::new(HashMap::new()),
            connects: RefCell::new(Vec::new()),
            bssid: Cell::new(None),
            follow_connect: Cell::new(true),
            global_support: Cell::new(GlobalDmnSupport::Unsupported),
            global_changes: RefCell::new(Vec::new()),
        })
    }

    pub fn with_global_support(support: GlobalDmnSupport) -> Rc<Self> {
        let vendor = Self::new();
        vendor.global_support.set(support);
        vendor
    }

    /// Makes `op` answer `status` from now on.
    pub fn fail(&self, op: &'static str, status: SwlStatus) {
        self.statuses.borrow_mut().insert(op, status);
    }

    pub fn heal(&self, op: &'static str) {
        self.statuses.borrow_mut().remove(op);
    }

    pub fn set_bssid(&self, bssid: Option<MacAddress>) {
        self.bssid.set(bssid);
    }

    pub fn set_follow_connect(&self, follow: bool) {
        self.follow_connect.set(follow);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    pub fn count(&self, op: &str) -> usize {
        self.calls.borrow().iter().filter(|c| c.as_str() == op).count()
    }

    pub fn clear_calls(&self) {
        self.calls.borrow_mut().clear();
    }

    /// BSSID pin of every `ep_connect`, in call order.
    pub fn connects(&self) -> Vec<Option<MacAddress>> {
        self.connects.borrow().clone()
    }

    pub fn global_changes(&self) -> Vec<bool> {
        self.global_changes.borrow().clone()
    }

    fn record(&self, op: &'static str) -> SwlStatus {
        self.calls.borrow_mut().push(op.to_string());
        self.statuses
            .borrow()
            .get(op)
            .copied()
            .unwrap_or(SwlStatus::Ok)
    }
}

impl VendorOps for MockVendor {
    fn name(&self) -> &str {
        VENDOR
    }

    fn global_dmn_support(&self, _dmn: &str) -> GlobalDmnSupport {
        self.global_support.get()
    }

    fn on_global_dmn_changed(&self, _dmn: &str, uses_global: bool) {
        self.global_changes.borrow_mut().push(uses_global);
    }

    fn radio_discover_caps(&self, radio: &Radio) -> Result<RadioCaps, SwlStatus> {
        let mut caps = RadioCaps::band_defaults(radio.operating_band);
        caps.supported_standards.insert(Standard::Be);
        caps.mlo_capable = true;
        caps.max_stations = 4;
        Ok(caps)
    }

    fn radio_enable(&self, _radio: &Radio, _enable: bool) -> SwlStatus {
        self.record("radio_enable")
    }

    fn radio_set_channel(
        &self,
        _radio: &Radio,
        _channel: u8,
        _bandwidth: wld_types::ChannelBandwidth,
    ) -> SwlStatus {
        self.record("radio_set_channel")
    }

    fn radio_set_tx_power(&self, _radio: &Radio, _percent: u8) -> SwlStatus {
        self.record("radio_set_tx_power")
    }

    fn radio_set_standards(&self, _radio: &Radio, _standards: wld_types::StandardSet) -> SwlStatus {
        self.record("radio_set_standards")
    }

    fn radio_sync_secdmn(&self, _radio: &Radio, _conf_path: &Path) -> SwlStatus {
        self.record("radio_sync_secdmn")
    }

    fn ap_create_vap(&self, _radio: &Radio, _ap: &AccessPoint, _ssid: &Ssid) -> SwlStatus {
        self.record("ap_create_vap")
    }

    fn ap_destroy_vap(&self, _radio: &Radio, _ap: &AccessPoint) -> SwlStatus {
        self.record("ap_destroy_vap")
    }

    fn ap_enable(&self, _ap: &AccessPoint, _enable: bool) -> SwlStatus {
        self.record("ap_enable")
    }

    fn ap_sync_ssid(&self, _ap: &AccessPoint, _ssid: &Ssid) -> SwlStatus {
        self.record("ap_sync_ssid")
    }

    fn ap_sync_security(&self, _ap: &AccessPoint) -> SwlStatus {
        self.record("ap_sync_security")
    }

    fn ap_sync_secdmn(&self, _radio: &Radio, _ap: &AccessPoint, _conf_path: &Path) -> SwlStatus {
        self.record("ap_sync_secdmn")
    }

    fn ap_wps_start(&self, _ap: &AccessPoint, _method: &WpsMethod) -> SwlStatus {
        self.record("ap_wps_start")
    }

    fn ap_wps_cancel(&self, _ap: &AccessPoint) -> SwlStatus {
        self.record("ap_wps_cancel")
    }

    fn ap_kick_station(&self, _ap: &AccessPoint, _station: MacAddress, _reason: u16) -> SwlStatus {
        self.record("ap_kick_station")
    }

    fn ap_disassoc_station(&self, _ap: &AccessPoint, _station: MacAddress) -> SwlStatus {
        self.record("ap_disassoc_station")
    }

    fn ep_create_intf(&self, _radio: &Radio, _ep: &Endpoint) -> SwlStatus {
        self.record("ep_create_intf")
    }

    fn ep_destroy_intf(&self, _radio: &Radio, _ep: &Endpoint) -> SwlStatus {
        self.record("ep_destroy_intf")
    }

    fn ep_enable(&self, _ep: &Endpoint, _enable: bool) -> SwlStatus {
        self.record("ep_enable")
    }

    fn ep_connect(
        &self,
        _ep: &Endpoint,
        _profile: &EndPointProfile,
        bssid: Option<MacAddress>,
    ) -> SwlStatus {
        self.connects.borrow_mut().push(bssid);
        let status = self.record("ep_connect");
        if status.is_ok() && self.follow_connect.get() {
            if let Some(bssid) = bssid {
                self.bssid.set(Some(bssid));
            }
        }
        status
    }

    fn ep_disconnect(&self, _ep: &Endpoint) -> SwlStatus {
        self.bssid.set(None);
        self.record("ep_disconnect")
    }

    fn ep_sync_secdmn(&self, _ep: &Endpoint, _profile: &EndPointProfile, _conf_path: &Path) -> SwlStatus {
        self.record("ep_sync_secdmn")
    }

    fn ep_wps_start(&self, _ep: &Endpoint) -> SwlStatus {
        self.record("ep_wps_start")
    }

    fn ep_wps_cancel(&self, _ep: &Endpoint) -> SwlStatus {
        self.record("ep_wps_cancel")
    }

    fn ep_current_bssid(&self, _ep: &Endpoint) -> Result<MacAddress, SwlStatus> {
        self.bssid.get().ok_or(SwlStatus::NotImplemented)
    }
}

/// Spawner handing out fake pids; processes live until stopped.
#[derive(Default)]
pub struct MockSpawner {
    next_pid: Cell<u32>,
    running: RefCell<Vec<u32>>,
    pub starts: RefCell<Vec<(String, Vec<String>)>>,
    pub reloads: Cell<u32>,
}

impl MockSpawner {
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            next_pid: Cell::new(100),
            ..Self::default()
        })
    }

    pub fn running(&self) -> Vec<u32> {
        self.running.borrow().clone()
    }

    /// Simulates a process dying on its own.
    pub fn kill(&self, pid: u32) {
        self.running.borrow_mut().retain(|p| *p != pid);
    }
}

impl ProcessSpawner for MockSpawner {
    fn start(&self, cmd: &str, args: &[String]) -> WldResult<u32> {
        let pid = self.next_pid.get();
        self.next_pid.set(pid + 1);
        self.running.borrow_mut().push(pid);
        self.starts
            .borrow_mut()
            .push((cmd.to_string(), args.to_vec()));
        Ok(pid)
    }

    fn stop(&self, pid: u32) -> WldResult<()> {
        self.kill(pid);
        Ok(())
    }

    fn reload(&self, _pid: u32) -> WldResult<()> {
        self.reloads.set(self.reloads.get() + 1);
        Ok(())
    }

    fn is_running(&self, pid: u32) -> bool {
        self.running.borrow().contains(&pid)
    }

    fn prepare_ctrl_dir(&self, _dir: &Path) -> WldResult<()> {
        Ok(())
    }
}

pub struct Harness {
    pub ctx: WldContext,
    pub vendor: Rc<MockVendor>,
    pub spawner: Rc<MockSpawner>,
}

impl Harness {
    /// Context with auto-commit off, so tests decide when passes run.
    pub fn new() -> Self {
        Self::with_vendor(MockVendor::new())
    }

    pub fn with_vendor(vendor: Rc<MockVendor>) -> Self {
        let mut config = WldConfig::default();
        config.autocommit.enabled = false;
        config.secdmn.watch_interval_secs = 0;
        Self::with_config(config, vendor)
    }

    pub fn with_config(config: WldConfig, vendor: Rc<MockVendor>) -> Self {
        let spawner = MockSpawner::new();
        let mut ctx = WldContext::new(config, Rc::clone(&spawner) as Rc<dyn ProcessSpawner>);
        ctx.init();
        ctx.register_vendor(Rc::clone(&vendor) as Rc<dyn VendorOps>)
            .expect("register mock vendor");
        Self {
            ctx,
            vendor,
            spawner,
        }
    }

    pub fn radio(&mut self, name: &str, band: FreqBand) -> RadioId {
        self.ctx.add_radio(name, VENDOR, band).expect("add radio")
    }

    /// Endpoint holding one valid profile, enabled and committed.
    pub fn ready_endpoint(&mut self, radio: RadioId, alias: &str) -> EpId {
        let ep = self.ctx.add_endpoint(radio, alias).expect("add endpoint");
        self.ctx
            .add_endpoint_profile(ep, uplink_profile())
            .expect("add profile");
        self.ctx.set_endpoint_enable(ep, true).expect("enable");
        self.ctx.commit().expect("commit");
        self.ctx.run_pending();
        ep
    }

    /// Endpoint reported connected to `bssid`.
    pub fn connected_endpoint(&mut self, radio: RadioId, alias: &str, bssid: MacAddress) -> EpId {
        let ep = self.ready_endpoint(radio, alias);
        self.vendor.set_bssid(Some(bssid));
        self.ctx
            .endpoint_connection_update(ep, ConnectionStatus::Connected, bssid)
            .expect("connection update");
        ep
    }
}

pub fn uplink_profile() -> EndPointProfile {
    EndPointProfile::new("uplink", "upstream", SecurityConfig::wpa2_personal("password123"))
}

pub fn mac(last: u8) -> MacAddress {
    MacAddress::new([0x02, 0x11, 0x22, 0x33, 0x44, last])
}
