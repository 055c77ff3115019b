//! Multi-Link Device (MLD) link manager.
//!
//! A link wraps one SSID's participation in an MLD; an MLD groups the links
//! that share a unit number and a type. The manager owns both. Entity state
//! it needs (enablement, capability, MAC) is read through [`MldEnv`] at call
//! time, never cached.
//!
//! Within an MLD, links are ordered: configured links first, in the order
//! they were configured, unconfigured links at the tail. Callers fall back to
//! that order when picking a primary link.

mod ops;

use crate::error::{WldError, WldResult};
use crate::events::{EventBus, MldChange, MldEvent};
use crate::handle::{HandleAlloc, LinkId, SsidId};
use serde::Serialize;
use serde_json::json;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::Rc;
use tracing::{debug, info, warn};
use wld_types::MacAddress;

/// Highest link id the driver can assign.
pub const MAX_LINK_ID: i32 = 14;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum MldType {
    Ap,
    Sta,
}

impl fmt::Display for MldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MldType::Ap => "AP",
            MldType::Sta => "STA",
        })
    }
}

/// Entity state consulted by the manager.
pub trait MldEnv {
    /// MLD type the SSID is classified as; `None` while untyped.
    fn mld_type(&self, ssid: SsidId) -> Option<MldType>;
    /// Whether the SSID's radio supports 802.11be.
    fn supports_mlo(&self, ssid: SsidId) -> bool;
    fn ssid_enabled(&self, ssid: SsidId) -> bool;
    fn radio_enabled(&self, ssid: SsidId) -> bool;
    fn mlo_capable(&self, ssid: SsidId) -> bool;
    fn link_mac(&self, ssid: SsidId) -> MacAddress;
    /// AP links only: the AP's connection settings can be shared with its
    /// MLD neighbours.
    fn shared_connection_config(&self, ssid: SsidId, neighbours: &[SsidId]) -> bool;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MldLink {
    pub id: LinkId,
    pub ssid: SsidId,
    pub mld_type: MldType,
    pub unit: u32,
    /// Link id assigned by the driver; `None` while inactive.
    pub link_id: Option<u8>,
    pub primary: bool,
    pub configured: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Mld {
    pub mld_type: MldType,
    pub unit: u32,
    /// Members in configured order.
    pub links: Vec<LinkId>,
}

pub struct MldMgr {
    bus: Rc<EventBus>,
    initialized: bool,
    alloc: HandleAlloc,
    links: BTreeMap<LinkId, MldLink>,
    by_ssid: HashMap<SsidId, LinkId>,
    mlds: BTreeMap<(MldType, u32), Mld>,
}

impl fmt::Debug for MldMgr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MldMgr")
            .field("initialized", &self.initialized)
            .field("links", &self.links.len())
            .field("mlds", &self.mlds.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl MldMgr {
    pub fn new(bus: Rc<EventBus>) -> Self {
        Self {
            bus,
            initialized: false,
            alloc: HandleAlloc::new(),
            links: BTreeMap::new(),
            by_ssid: HashMap::new(),
            mlds: BTreeMap::new(),
        }
    }

    pub fn init(&mut self) {
        self.initialized = true;
        debug!("mld manager initialized");
    }

    /// Tears down every MLD and its links.
    pub fn deinit(&mut self) {
        let mlds = std::mem::take(&mut self.mlds);
        for mld in mlds.values() {
            if let Some(first) = mld.links.first().and_then(|l| self.links.get(l)) {
                self.notify(mld.mld_type, mld.unit, first.ssid, MldChange::Del);
            }
        }
        self.links.clear();
        self.by_ssid.clear();
        self.initialized = false;
        debug!(mlds = mlds.len(), "mld manager deinitialized");
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn link(&self, id: LinkId) -> Option<&MldLink> {
        self.links.get(&id)
    }

    pub fn link_of(&self, ssid: SsidId) -> Option<LinkId> {
        self.by_ssid.get(&ssid).copied()
    }

    pub fn mld(&self, mld_type: MldType, unit: u32) -> Option<&Mld> {
        self.mlds.get(&(mld_type, unit))
    }

    pub fn mlds(&self) -> impl Iterator<Item = &Mld> {
        self.mlds.values()
    }

    pub fn nr_links(&self) -> usize {
        self.links.len()
    }

    fn link_ref(&self, id: LinkId) -> WldResult<&MldLink> {
        self.links
            .get(&id)
            .ok_or_else(|| WldError::not_found("mld link", id))
    }

    fn mld_of(&self, link: &MldLink) -> Option<&Mld> {
        self.mlds.get(&(link.mld_type, link.unit))
    }

    fn notify(&self, mld_type: MldType, unit: u32, ssid: SsidId, change: MldChange) {
        info!(%mld_type, unit, %ssid, ?change, "mld changed");
        self.bus.mld.notify(&MldEvent {
            mld_type,
            unit,
            ssid,
            change,
        });
    }

    /// Attaches `ssid` to MLD `unit`, moving it out of another MLD if needed.
    ///
    /// A negative unit removes the SSID's link. Untyped SSIDs and SSIDs whose
    /// radio lacks 802.11be support get no link, and lose any link they had;
    /// that is not an error.
    pub fn register_link(&mut self, env: &dyn MldEnv, ssid: SsidId, unit: i32) -> Option<LinkId> {
        if !self.initialized {
            warn!(%ssid, "mld manager not initialized");
            return None;
        }
        let Ok(unit) = u32::try_from(unit) else {
            self.unregister_link(ssid);
            return None;
        };
        let Some(mld_type) = env.mld_type(ssid) else {
            debug!(%ssid, "untyped ssid, no mld");
            self.unregister_link(ssid);
            return None;
        };
        if !env.supports_mlo(ssid) {
            debug!(%ssid, "radio without 802.11be, no mld");
            self.unregister_link(ssid);
            return None;
        }

        let id = match self.by_ssid.get(&ssid).copied() {
            Some(id) => {
                let link = self.links.get(&id)?;
                if link.unit == unit && link.mld_type == mld_type {
                    return Some(id);
                }
                self.detach(id);
                if let Some(link) = self.links.get_mut(&id) {
                    link.unit = unit;
                    link.mld_type = mld_type;
                    link.link_id = None;
                    link.primary = false;
                    link.configured = false;
                }
                id
            }
            None => {
                let id = LinkId(self.alloc.next());
                self.links.insert(
                    id,
                    MldLink {
                        id,
                        ssid,
                        mld_type,
                        unit,
                        link_id: None,
                        primary: false,
                        configured: false,
                    },
                );
                self.by_ssid.insert(ssid, id);
                id
            }
        };

        let mld = self.mlds.entry((mld_type, unit)).or_insert_with(|| Mld {
            mld_type,
            unit,
            links: Vec::new(),
        });
        mld.links.push(id);
        let change = if mld.links.len() == 1 {
            MldChange::Add
        } else {
            MldChange::Update
        };
        self.notify(mld_type, unit, ssid, change);
        Some(id)
    }

    /// Detaches and frees the SSID's link. Returns false if it had none.
    pub fn unregister_link(&mut self, ssid: SsidId) -> bool {
        let Some(id) = self.by_ssid.remove(&ssid) else {
            return false;
        };
        self.detach(id);
        self.links.remove(&id);
        true
    }

    /// Removes a link from its MLD, destroying the MLD when emptied.
    fn detach(&mut self, id: LinkId) {
        let Some(link) = self.links.get(&id) else {
            return;
        };
        let (key, ssid) = ((link.mld_type, link.unit), link.ssid);
        let Some(mld) = self.mlds.get_mut(&key) else {
            return;
        };
        mld.links.retain(|l| *l != id);
        if mld.links.is_empty() {
            self.mlds.remove(&key);
            self.notify(key.0, key.1, ssid, MldChange::Del);
        } else {
            self.notify(key.0, key.1, ssid, MldChange::Update);
        }
    }

    /// Flags an enabled link as primary. Fails without side effects if the
    /// link is disabled or another link of its MLD is already primary.
    pub fn set_primary_link(&mut self, env: &dyn MldEnv, id: LinkId) -> WldResult<()> {
        let link = self.link_ref(id)?;
        if link.primary {
            return Ok(());
        }
        if !self.is_link_enabled(env, id) {
            return Err(WldError::invalid_state(format!(
                "{} is not enabled, cannot be primary",
                id
            )));
        }
        if let Some(current) = self.primary_of(link) {
            return Err(WldError::invalid_state(format!(
                "{} is already primary in {} mld {}",
                current, link.mld_type, link.unit
            )));
        }
        let (mld_type, unit, ssid) = (link.mld_type, link.unit, link.ssid);
        if let Some(link) = self.links.get_mut(&id) {
            link.primary = true;
        }
        self.notify(mld_type, unit, ssid, MldChange::Update);
        Ok(())
    }

    pub fn clear_primary_link(&mut self, id: LinkId) -> WldResult<()> {
        let link = self.link_ref(id)?;
        if !link.primary {
            return Ok(());
        }
        let (mld_type, unit, ssid) = (link.mld_type, link.unit, link.ssid);
        if let Some(link) = self.links.get_mut(&id) {
            link.primary = false;
        }
        self.notify(mld_type, unit, ssid, MldChange::Update);
        Ok(())
    }

    fn primary_of(&self, link: &MldLink) -> Option<LinkId> {
        self.mld_of(link)?
            .links
            .iter()
            .copied()
            .find(|l| self.links.get(l).is_some_and(|l| l.primary))
    }

    /// Primary link of the MLD `id` belongs to. `None` when the link's SSID
    /// is no longer typed as its MLD.
    pub fn get_primary_link(&self, env: &dyn MldEnv, id: LinkId) -> Option<LinkId> {
        let link = self.links.get(&id)?;
        if env.mld_type(link.ssid) != Some(link.mld_type) {
            return None;
        }
        self.primary_of(link)
    }

    /// Records the driver-assigned link id. A negative id resets it.
    pub fn set_link_id(&mut self, id: LinkId, link_id: i32) -> WldResult<()> {
        if link_id < 0 {
            return self.reset_link_id(id);
        }
        if link_id > MAX_LINK_ID {
            return Err(WldError::invalid_param(
                "link_id",
                format!("must be within 0..={}", MAX_LINK_ID),
            ));
        }
        let link = self.link_ref(id)?;
        let (mld_type, unit, ssid) = (link.mld_type, link.unit, link.ssid);
        if let Some(link) = self.links.get_mut(&id) {
            link.link_id = u8::try_from(link_id).ok();
        }
        self.save_link_configured(id);
        self.notify(mld_type, unit, ssid, MldChange::Update);
        Ok(())
    }

    /// Marks the link inactive. A primary link loses the flag; picking a new
    /// primary is up to the caller.
    pub fn reset_link_id(&mut self, id: LinkId) -> WldResult<()> {
        let link = self
            .links
            .get_mut(&id)
            .ok_or_else(|| WldError::not_found("mld link", id))?;
        if link.link_id.is_none() && !link.configured {
            return Ok(());
        }
        if link.primary {
            info!(link = %id, "primary link reset");
        }
        link.link_id = None;
        link.primary = false;
        link.configured = false;
        let (key, ssid) = ((link.mld_type, link.unit), link.ssid);
        if let Some(mld) = self.mlds.get_mut(&key) {
            mld.links.retain(|l| *l != id);
            mld.links.push(id);
        }
        self.notify(key.0, key.1, ssid, MldChange::Update);
        Ok(())
    }

    /// Moves a link behind the last other configured link of its MLD, or to
    /// the front when there is none.
    fn save_link_configured(&mut self, id: LinkId) {
        let Some(link) = self.links.get_mut(&id) else {
            return;
        };
        link.configured = true;
        let key = (link.mld_type, link.unit);
        let Some(mld) = self.mlds.get_mut(&key) else {
            return;
        };
        mld.links.retain(|l| *l != id);
        let links = &self.links;
        let after = mld
            .links
            .iter()
            .rposition(|l| links.get(l).is_some_and(|l| l.configured));
        match after {
            Some(pos) => mld.links.insert(pos + 1, id),
            None => mld.links.insert(0, id),
        }
    }

    /// A link is active once the driver assigned it a link id.
    pub fn is_link_active(&self, id: LinkId) -> bool {
        self.links.get(&id).is_some_and(|l| l.link_id.is_some())
    }

    /// Both the SSID and its radio are enabled.
    pub fn is_link_enabled(&self, env: &dyn MldEnv, id: LinkId) -> bool {
        self.links
            .get(&id)
            .is_some_and(|l| env.ssid_enabled(l.ssid) && env.radio_enabled(l.ssid))
    }

    /// Enabled, MLO capable, with a MAC; AP links must also be able to
    /// share their connection settings with their neighbours.
    pub fn is_link_usable(&self, env: &dyn MldEnv, id: LinkId) -> bool {
        let Some(link) = self.links.get(&id) else {
            return false;
        };
        if !self.is_link_enabled(env, id)
            || !env.mlo_capable(link.ssid)
            || env.link_mac(link.ssid).is_null()
        {
            return false;
        }
        match link.mld_type {
            MldType::Ap => {
                let neighbours = self.neighbour_ssids(link);
                env.shared_connection_config(link.ssid, &neighbours)
            }
            MldType::Sta => true,
        }
    }

    fn neighbour_ssids(&self, link: &MldLink) -> Vec<SsidId> {
        self.mld_of(link)
            .map(|mld| {
                mld.links
                    .iter()
                    .filter_map(|l| self.links.get(l))
                    .map(|l| l.ssid)
                    .collect()
            })
            .unwrap_or_default()
    }

    fn neighbours(&self, id: LinkId) -> Vec<LinkId> {
        self.links
            .get(&id)
            .and_then(|l| self.mld_of(l))
            .map(|mld| mld.links.clone())
            .unwrap_or_default()
    }

    /// Links in the same MLD, `id` included.
    pub fn count_neigh_links(&self, id: LinkId) -> usize {
        self.neighbours(id).len()
    }

    pub fn count_neigh_active_links(&self, id: LinkId) -> usize {
        self.neighbours(id)
            .into_iter()
            .filter(|l| self.is_link_active(*l))
            .count()
    }

    pub fn count_neigh_enabled_links(&self, env: &dyn MldEnv, id: LinkId) -> usize {
        self.neighbours(id)
            .into_iter()
            .filter(|l| self.is_link_enabled(env, *l))
            .count()
    }

    /// Publishes an UPDATE for the MLD the SSID's link belongs to.
    pub fn notify_changed(&self, ssid: SsidId) {
        let Some(link) = self.by_ssid.get(&ssid).and_then(|id| self.links.get(id)) else {
            return;
        };
        self.notify(link.mld_type, link.unit, ssid, MldChange::Update);
    }

    pub fn snapshot(&self) -> serde_json::Value {
        let mlds: Vec<serde_json::Value> = self
            .mlds
            .values()
            .map(|mld| {
                let links: Vec<&MldLink> =
                    mld.links.iter().filter_map(|l| self.links.get(l)).collect();
                json!({
                    "type": mld.mld_type,
                    "unit": mld.unit,
                    "links": links,
                })
            })
            .collect();
        json!(mlds)
    }
}
