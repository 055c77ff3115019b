//! MLD operations on the context: SSID unit assignment and link queries that
//! need entity state.

use super::MldEnv;
use crate::context::WldContext;
use crate::error::{WldError, WldResult};
use crate::handle::{LinkId, SsidId};
use tracing::instrument;

impl WldContext {
    /// Places an SSID in MLD `unit`, or takes it out with `None`.
    ///
    /// Returns the link, or `None` when MLO does not apply to the SSID.
    #[instrument(skip(self))]
    pub fn set_ssid_mld_unit(&mut self, ssid: SsidId, unit: Option<u32>) -> WldResult<Option<LinkId>> {
        let raw = match unit {
            Some(u) => i32::try_from(u)
                .map_err(|_| WldError::invalid_param("mld_unit", "out of range"))?,
            None => -1,
        };
        let entry = self
            .ssids
            .get_mut(&ssid)
            .ok_or_else(|| WldError::not_found("ssid", ssid))?;
        entry.mld_unit = unit;
        let (mld, view) = self.mld_with_view();
        Ok(mld.register_link(&view, ssid, raw))
    }

    pub(crate) fn unregister_ssid_link(&mut self, ssid: SsidId) {
        self.mld.unregister_link(ssid);
    }

    pub(crate) fn notify_link_changed(&self, ssid: SsidId) {
        self.mld.notify_changed(ssid);
    }

    pub fn set_mld_primary_link(&mut self, link: LinkId) -> WldResult<()> {
        let (mld, view) = self.mld_with_view();
        mld.set_primary_link(&view, link)
    }

    pub fn clear_mld_primary_link(&mut self, link: LinkId) -> WldResult<()> {
        self.mld.clear_primary_link(link)
    }

    pub fn mld_primary_link(&self, link: LinkId) -> Option<LinkId> {
        self.mld.get_primary_link(&self.entity_view(), link)
    }

    /// Driver-assigned link id; negative resets it.
    pub fn set_mld_link_id(&mut self, link: LinkId, id: i32) -> WldResult<()> {
        self.mld.set_link_id(link, id)
    }

    pub fn is_mld_link_enabled(&self, link: LinkId) -> bool {
        self.mld.is_link_enabled(&self.entity_view(), link)
    }

    pub fn is_mld_link_usable(&self, link: LinkId) -> bool {
        self.mld.is_link_usable(&self.entity_view(), link)
    }

    pub fn count_mld_neigh_enabled_links(&self, link: LinkId) -> usize {
        self.mld.count_neigh_enabled_links(&self.entity_view(), link)
    }

    /// First usable link of the SSID's MLD, in configured order.
    pub fn mld_fallback_primary(&self, ssid: SsidId) -> Option<LinkId> {
        let view = self.entity_view();
        let link = self.mld.link(self.mld.link_of(ssid)?)?;
        self.mld
            .mld(link.mld_type, link.unit)?
            .links
            .iter()
            .copied()
            .find(|l| self.mld.is_link_usable(&view as &dyn MldEnv, *l))
    }
}
