//! Radio lifecycle and configuration operations.

use super::{default_radio_mac, ChannelChange, ChannelChangeReason, CsiClient, Radio};
use crate::context::{WldContext, HOSTAPD};
use crate::error::{check_vendor, WldError, WldResult};
use crate::events::RadioStatusChange;
use crate::fsm::{FsmAction, FsmEntity};
use crate::handle::RadioId;
use crate::vendor::{RadioCaps, RadioStats};
use std::path::PathBuf;
use tracing::{info, instrument, warn};
use wld_common::SwlStatus;
use wld_types::{
    ChannelBandwidth, FreqBand, MacAddress, OperatingStandards, RadioDetailedState, RadioStatus,
};

impl WldContext {
    /// Creates a radio, discovers its capabilities and makes it ready.
    #[instrument(skip(self))]
    pub fn add_radio(&mut self, name: &str, vendor: &str, band: FreqBand) -> WldResult<RadioId> {
        if name.is_empty() {
            return Err(WldError::invalid_param("name", "must not be empty"));
        }
        if self.find_radio(name).is_some() {
            return Err(WldError::invalid_state(format!(
                "radio '{}' already exists",
                name
            )));
        }
        let ops = self.vendor_ops(vendor)?;
        let id = RadioId(self.alloc.next());
        let index = self.next_radio_index;
        let mut radio = Radio::new(id, name, vendor, index, band);

        let caps = match ops.radio_discover_caps(&radio) {
            Ok(caps) => caps,
            Err(SwlStatus::NotImplemented) => RadioCaps::band_defaults(band),
            Err(status) => return Err(WldError::vendor("radio_discover_caps", status)),
        };
        if !caps.supported_bands.contains(&band) {
            return Err(WldError::invalid_param(
                "band",
                format!("{} not supported by radio '{}'", band, name),
            ));
        }
        self.next_radio_index += 1;

        radio.supported_bands = caps.supported_bands;
        radio.supported_standards = caps.supported_standards;
        radio.possible_channels = if caps.possible_channels.is_empty() {
            band.default_channels()
        } else {
            caps.possible_channels
        };
        radio.max_bandwidth = caps.max_bandwidth;
        radio.bandwidth = band.default_bandwidth().min(caps.max_bandwidth);
        radio.target_bandwidth = radio.bandwidth;
        radio.max_stations = caps.max_stations;
        radio.mlo_capable = caps.mlo_capable;
        radio.mac = if caps.base_mac.is_valid_unicast() {
            caps.base_mac
        } else {
            default_radio_mac(index)
        };

        let channel = radio
            .possible_channels
            .first()
            .copied()
            .ok_or_else(|| WldError::invalid_state(format!("radio '{}' has no usable channel", name)))?;
        radio.channel = channel;
        radio.target_channel = channel;
        let initial = ChannelChange {
            channel,
            bandwidth: radio.bandwidth,
            reason: ChannelChangeReason::Initial,
            at_ms: self.now().as_millis() as u64,
        };
        radio.push_channel_change(initial, self.config.radio.channel_history_max);
        radio.is_ready = true;
        radio.fsm.set_sync_all();

        let conf = self.hostapd_conf_path(name);
        let dmn = self.dmns.dmn_create(
            &format!("{}-{}", HOSTAPD, name),
            &self.config.secdmn.hostapd_cmd,
            &conf.display().to_string(),
            self.config.secdmn.ctrl_iface_dir.join(HOSTAPD),
        );
        radio.hostapd = Some(dmn);

        info!(
            radio = %name,
            %id,
            %band,
            mac = %radio.mac,
            channel,
            "radio ready"
        );
        self.radios.insert(id, radio);
        if let Some(grp) = self.hostapd_group(vendor) {
            self.dmns.dmn_join_group(dmn, grp)?;
        }
        self.schedule_autocommit();
        Ok(id)
    }

    /// Destroys a radio after its access points and endpoints.
    #[instrument(skip(self))]
    pub fn delete_radio(&mut self, id: RadioId) -> WldResult<()> {
        let radio = self.radio_ref(id)?;
        let (aps, eps) = (radio.aps.clone(), radio.endpoints.clone());
        for ap in aps {
            self.delete_ap(ap)?;
        }
        for ep in eps {
            self.delete_endpoint(ep)?;
        }
        self.ssids.retain(|_, s| s.radio != id);

        let radio = self.radio_mut(id)?;
        let timer = radio.fsm.timer.take();
        let dmn = radio.hostapd.take();
        let name = radio.name.clone();
        self.cancel(timer);
        if let Some(dmn) = dmn {
            self.dmns.dmn_destroy(dmn)?;
        }
        self.set_radio_status(id, RadioStatus::NotPresent, RadioDetailedState::Down)?;
        self.radios.remove(&id);
        info!(radio = %name, %id, "radio deleted");
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn set_radio_enable(&mut self, id: RadioId, enable: bool) -> WldResult<()> {
        let radio = self.radio_mut(id)?;
        if radio.enable == enable {
            return Ok(());
        }
        radio.enable = enable;
        self.touch(id.into(), FsmAction::RadioEnable | FsmAction::RadioSecDmn)
    }

    /// Requests a channel change; applied by the next radio commit.
    #[instrument(skip(self))]
    pub fn set_radio_channel(
        &mut self,
        id: RadioId,
        channel: u8,
        bandwidth: ChannelBandwidth,
        reason: ChannelChangeReason,
    ) -> WldResult<()> {
        let radio = self.radio_mut(id)?;
        if !radio.possible_channels.contains(&channel) {
            return Err(WldError::invalid_param(
                "channel",
                format!("{} is not a possible channel of '{}'", channel, radio.name),
            ));
        }
        if bandwidth > radio.max_bandwidth {
            return Err(WldError::invalid_param(
                "bandwidth",
                format!("{} exceeds maximum {}", bandwidth, radio.max_bandwidth),
            ));
        }
        if radio.target_channel == channel && radio.target_bandwidth == bandwidth {
            return Ok(());
        }
        radio.target_channel = channel;
        radio.target_bandwidth = bandwidth;
        radio.target_reason = reason;
        self.touch(id.into(), FsmAction::RadioChannel.into())
    }

    /// Sets the transmit power in percent of the maximum.
    #[instrument(skip(self))]
    pub fn set_radio_tx_power(&mut self, id: RadioId, percent: u8) -> WldResult<()> {
        if !(1..=100).contains(&percent) {
            return Err(WldError::invalid_param("tx_power", "must be within 1..=100"));
        }
        let radio = self.radio_mut(id)?;
        if radio.tx_power == percent {
            return Ok(());
        }
        radio.tx_power = percent;
        self.touch(id.into(), FsmAction::RadioTxPower.into())
    }

    /// Sets the operating standards: `Auto` or a non-empty supported subset.
    #[instrument(skip(self))]
    pub fn set_radio_operating_standards(
        &mut self,
        id: RadioId,
        standards: OperatingStandards,
    ) -> WldResult<()> {
        let radio = self.radio_mut(id)?;
        if let OperatingStandards::Set(set) = standards {
            if set.is_empty() {
                return Err(WldError::invalid_param("operating_standards", "must not be empty"));
            }
            if !set.is_subset_of(&radio.supported_standards) {
                return Err(WldError::invalid_param(
                    "operating_standards",
                    format!("{} not within supported {}", set, radio.supported_standards),
                ));
            }
        }
        if radio.operating_standards == standards {
            return Ok(());
        }
        radio.operating_standards = standards;
        self.touch(id.into(), FsmAction::RadioStandards.into())
    }

    /// Forces a full resynchronization of the radio.
    pub fn request_radio_sync(&mut self, id: RadioId) -> WldResult<()> {
        self.request_sync(FsmEntity::Radio(id))
    }

    pub fn radio_stats(&self, id: RadioId) -> WldResult<RadioStats> {
        let radio = self.radio_ref(id)?;
        self.vendor_ops(&radio.vendor)?
            .radio_stats(radio)
            .map_err(|status| WldError::vendor("radio_stats", status))
    }

    /// Starts channel state information monitoring of a station.
    #[instrument(skip(self))]
    pub fn add_csi_client(&mut self, id: RadioId, mac: MacAddress, interval_ms: u32) -> WldResult<()> {
        if !mac.is_valid_unicast() {
            return Err(WldError::invalid_param("mac", format!("{} is not unicast", mac)));
        }
        if interval_ms == 0 {
            return Err(WldError::invalid_param("interval_ms", "must be positive"));
        }
        let radio = self.radio_ref(id)?;
        let status = self
            .vendor_ops(&radio.vendor)?
            .radio_add_csi_client(radio, mac, interval_ms);
        check_vendor("radio_add_csi_client", status)?;

        let radio = self.radio_mut(id)?;
        match radio.csi_clients.iter_mut().find(|c| c.mac == mac) {
            Some(client) => client.interval_ms = interval_ms,
            None => radio.csi_clients.push(CsiClient { mac, interval_ms }),
        }
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn del_csi_client(&mut self, id: RadioId, mac: MacAddress) -> WldResult<()> {
        let radio = self.radio_ref(id)?;
        if !radio.csi_clients.iter().any(|c| c.mac == mac) {
            return Err(WldError::not_found("csi client", mac));
        }
        let status = self.vendor_ops(&radio.vendor)?.radio_del_csi_client(radio, mac);
        if let Err(e) = check_vendor("radio_del_csi_client", status) {
            warn!(%mac, error = %e, "vendor failed to stop csi monitoring");
        }
        self.radio_mut(id)?.csi_clients.retain(|c| c.mac != mac);
        Ok(())
    }

    pub(crate) fn hostapd_conf_path(&self, radio_name: &str) -> PathBuf {
        self.config
            .secdmn
            .conf_dir
            .join(format!("{}-{}.conf", radio_name, HOSTAPD))
    }

    /// Publishes a status transition and cascades it to the radio's SSIDs.
    pub(crate) fn set_radio_status(
        &mut self,
        id: RadioId,
        status: RadioStatus,
        detailed_state: RadioDetailedState,
    ) -> WldResult<()> {
        let radio = self.radio_mut(id)?;
        let (old_status, old_detailed_state) = (radio.status, radio.detailed_state);
        if old_status == status && old_detailed_state == detailed_state {
            return Ok(());
        }
        radio.status = status;
        radio.detailed_state = detailed_state;
        let (aps, eps) = (radio.aps.clone(), radio.endpoints.clone());
        info!(
            radio = %radio.name,
            %old_status,
            %status,
            %detailed_state,
            "radio status changed"
        );
        self.bus.radio_status.notify(&RadioStatusChange {
            radio: id,
            old_status,
            old_detailed_state,
            status,
            detailed_state,
        });
        if old_status != status {
            for ap in aps {
                self.update_ap_status(ap, None);
            }
            for ep in eps {
                self.update_ep_status(ep, None, None);
            }
        }
        Ok(())
    }
}
