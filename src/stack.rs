// SPDX-License-Identifier: Apache-2.0 OR MIT

//! [`StackInstance`]: the single cooperative event loop tying every module
//! together.
//!
//! There is no internal threading here — the embedding application drives
//! everything by calling `on_*` as frames arrive and `tick` on its own
//! schedule, exactly the way [`crate::core::rt::sched::Scheduler`] expects
//! to be driven.

use std::net::SocketAddr;
use std::sync::Arc;

use crate::alarm::{self, AlarmEngine, AlarmTable};
use crate::application::{Application, LedSignal};
use crate::cm::cmrpc::{self, block_type};
use crate::cm::module_diff;
use crate::cm::record_access::{self, Im0, RecordStore};
use crate::cm::{cmdev, cmpbe, ConnectionManager};
use crate::config::{IpParameter, StackConfig};
use crate::core::ser::cursor::Endian;
use crate::core::rt::arena::Handle;
use crate::core::{BlockReader, BlockWriter};
use crate::cyclic::{Cpm, Ppm};
use crate::dcp::{self, DcpOption, SamLock};
use crate::diag;
use crate::error::{PnetError, Result};
use crate::lldp::{self, LldpPeer};
use crate::model::topology::Slot;
use crate::rpc::{opnum, DatagramOutcome, IncomingRequest, RpcEngine};
use crate::transport::{LinkLayer, PersistenceStore};
use crate::types::{Mac, Uuid};

/// One AR's cyclic-IO runtime state: a PPM for every output IOCR it owns, a
/// CPM for every input one. Kept alongside the AR rather than inside
/// [`crate::model::ApplicationRelation`] itself so the model stays free of
/// anything scheduler-shaped.
#[derive(Default)]
struct CyclicRuntime {
    ppms: Vec<(Handle, Ppm)>,
    cpms: Vec<(Handle, Cpm)>,
}

/// Top-level PROFINET IO device stack. Owns every connected AR, the RPC and
/// DCP/LLDP discovery state, the alarm engines and the module topology.
pub struct StackInstance {
    config: StackConfig,
    link: Arc<dyn LinkLayer>,
    app: Arc<dyn Application>,
    persistence: Arc<dyn PersistenceStore>,
    record_store: Arc<dyn RecordStore>,

    cm: ConnectionManager,
    rpc: RpcEngine,
    sam: SamLock,
    im0: Im0,
    lldp_peer: Option<LldpPeer>,
    alarms: AlarmTable,
    /// AR arena index -> its [`AlarmEngine`] handle. The alarm and AR arenas
    /// are separate arenas (alarm engines are created/destroyed in lockstep
    /// with ARs, but through their own insert/remove calls), so this map is
    /// the only safe way to go from one to the other.
    alarm_by_ar: std::collections::HashMap<u16, Handle>,
    cyclic: std::collections::HashMap<u16, CyclicRuntime>,
    slots: Vec<Slot>,
    /// Set whenever the station's LLDP identity (name, IP) changes, so
    /// `tick` sends an out-of-cycle LLDPDU instead of waiting for the next
    /// periodic announcement.
    lldp_identity_dirty: bool,
    /// `tick` timestamp of the next periodic LLDP announcement.
    next_lldp_due_us: u64,
}

impl StackInstance {
    pub fn new(
        config: StackConfig,
        link: Arc<dyn LinkLayer>,
        app: Arc<dyn Application>,
        persistence: Arc<dyn PersistenceStore>,
        record_store: Arc<dyn RecordStore>,
    ) -> Self {
        let max_ars = config.resources.max_ars;
        let max_sessions = config.resources.max_sessions;
        let max_iocrs = config.cyclic.max_iocrs;
        let im0 = Im0 {
            vendor_id: config.vendor_id,
            order_id: [0; 20],
            serial_number: [0; 16],
            hardware_revision: 1,
            software_revision: *b"V1.0",
            revision_counter: 0,
            profile_id: 0,
            profile_specific_type: 0,
            im_version: config.instance_id,
            im_supported: 0x0001,
        };
        let mut instance = Self {
            config,
            link,
            app,
            persistence,
            record_store,
            cm: ConnectionManager::new(max_ars, max_iocrs),
            rpc: RpcEngine::new(max_sessions),
            sam: SamLock::new(),
            im0,
            lldp_peer: None,
            alarms: AlarmTable::with_capacity(max_ars),
            alarm_by_ar: std::collections::HashMap::new(),
            cyclic: std::collections::HashMap::new(),
            slots: Vec::new(),
            lldp_identity_dirty: false,
            next_lldp_due_us: 0,
        };
        instance.load_persisted_state();
        instance
    }

    pub fn slots_mut(&mut self) -> &mut Vec<Slot> {
        &mut self.slots
    }

    fn station_name(&self) -> &str {
        &self.config.station_name
    }

    fn load_persisted_state(&mut self) {
        if let Some(bytes) = self.persistence.load("station_name") {
            self.config.station_name = String::from_utf8_lossy(&bytes).into_owned();
        }
        if let Some(bytes) = self.persistence.load("ip_parameter") {
            if let Some(ip) = IpParameter::from_bytes(&bytes) {
                self.config.ip = ip;
            }
        }
    }

    /// Handle one received DCP PDU. `dst_is_multicast`
    /// distinguishes an `IdentifyAll` broadcast (subject to the spread
    /// delay) from a directed `IdentifyRequest`/`Get`/`Set` aimed at this
    /// device's MAC, which always answers immediately.
    pub fn on_dcp_frame(&mut self, buf: &[u8], src_mac: Mac, now_us: u64) -> Option<(u32, Vec<u8>)> {
        let (header, mut body) = dcp::parse_header(buf).ok()?;
        match header.service_id {
            dcp::ServiceId::Identify => {
                let mut matched = false;
                while body.remaining() >= 4 {
                    let Some(block) = dcp::blocks::parse_block(&mut body) else { break };
                    if matches!(block.option, DcpOption::AllSelector) {
                        matched = true;
                    } else if matches!(
                        block.option,
                        DcpOption::DeviceProperties {
                            suboption: dcp::blocks::device_properties::NAME_OF_STATION
                        }
                    ) && block.value == self.station_name().as_bytes()
                    {
                        matched = true;
                    }
                }
                if !matched {
                    return None;
                }
                let delay = dcp::calculate_response_delay(self.link.mac(), header.response_delay);
                Some((delay, self.build_identify_response(header.xid)))
            }
            dcp::ServiceId::Get => {
                if !self.sam.allows(src_mac, now_us) {
                    return None;
                }
                let response = self.build_get_response(header.xid, &mut body);
                self.sam.restart_timeout(src_mac, now_us);
                Some((0, response))
            }
            dcp::ServiceId::Set => {
                if !self.sam.allows(src_mac, now_us) {
                    return None;
                }
                let response = self.handle_dcp_set(header.xid, &mut body, src_mac, now_us);
                self.sam.restart_timeout(src_mac, now_us);
                Some((0, response))
            }
            dcp::ServiceId::Hello => None, // devices don't answer Hello, only other devices' announcements
        }
    }

    fn build_identify_response(&self, xid: u32) -> Vec<u8> {
        self.build_get_response(xid, &mut BlockReader::new(&[], Endian::Big))
    }

    fn build_get_response(&self, xid: u32, _requested: &mut BlockReader<'_>) -> Vec<u8> {
        let mut buf = vec![0u8; 256];
        let n = {
            let mut w = BlockWriter::new(&mut buf, Endian::Big);
            let header = dcp::DcpHeader {
                service_id: dcp::ServiceId::Identify,
                service_type: dcp::ServiceType::ResponseSuccess,
                xid,
                response_delay: 0,
                data_length: 0,
            };
            let len_pos = dcp::write_header(&mut w, &header);
            let body_start = w.offset();
            dcp::blocks::write_block(
                &mut w,
                DcpOption::DeviceProperties {
                    suboption: dcp::blocks::device_properties::NAME_OF_STATION,
                },
                self.station_name().as_bytes(),
            );
            dcp::blocks::write_block(
                &mut w,
                DcpOption::Ip {
                    suboption: dcp::blocks::ip::MAC_ADDRESS,
                },
                &self.link.mac(),
            );
            let body_len = w.offset() - body_start;
            dcp::patch_data_length(&mut w, len_pos, body_len as u16);
            w.offset()
        };
        buf.truncate(n);
        buf
    }

    fn handle_dcp_set(&mut self, xid: u32, body: &mut BlockReader<'_>, src_mac: Mac, now_us: u64) -> Vec<u8> {
        let mut ok = true;
        while body.remaining() >= 4 {
            let Some(block) = dcp::blocks::parse_block(body) else { break };
            match block.option {
                DcpOption::Control {
                    suboption: dcp::blocks::control::START_TRANSACTION,
                } => {
                    ok &= self.sam.start_transaction(src_mac, now_us);
                }
                DcpOption::Control {
                    suboption: dcp::blocks::control::END_TRANSACTION,
                } => {
                    self.sam.end_transaction(src_mac);
                }
                DcpOption::DeviceProperties {
                    suboption: dcp::blocks::device_properties::NAME_OF_STATION,
                } => {
                    let name = String::from_utf8_lossy(block.value).into_owned();
                    self.persistence.save("station_name", name.as_bytes());
                    self.config.station_name = name;
                    self.lldp_identity_dirty = true;
                }
                DcpOption::Control {
                    suboption: dcp::blocks::control::SIGNAL,
                } => {
                    self.app.signal_led_ind(LedSignal::Flash);
                }
                DcpOption::Control {
                    suboption: dcp::blocks::control::FACTORY_RESET,
                } => {
                    self.factory_reset();
                }
                DcpOption::Ip {
                    suboption: dcp::blocks::ip::IP_PARAMETER,
                } => {
                    if block.value.len() < 14 {
                        ok = false;
                    } else {
                        let ip = [block.value[2], block.value[3], block.value[4], block.value[5]];
                        let netmask = [block.value[6], block.value[7], block.value[8], block.value[9]];
                        let gateway = [block.value[10], block.value[11], block.value[12], block.value[13]];
                        self.set_ip_parameter(ip, netmask, gateway);
                    }
                }
                _ => {}
            }
        }
        let mut buf = vec![0u8; 16];
        let n = {
            let mut w = BlockWriter::new(&mut buf, Endian::Big);
            let header = dcp::DcpHeader {
                service_id: dcp::ServiceId::Set,
                service_type: if ok {
                    dcp::ServiceType::ResponseSuccess
                } else {
                    dcp::ServiceType::ResponseUnsupported
                },
                xid,
                response_delay: 0,
                data_length: 0,
            };
            dcp::write_header(&mut w, &header);
            w.offset()
        };
        buf.truncate(n);
        buf
    }

    /// Reset the station to factory defaults: clear the station name and IP
    /// configuration and let the application reset whatever else it owns.
    fn factory_reset(&mut self) {
        self.config.station_name.clear();
        self.config.ip = IpParameter::default();
        self.persistence.save("station_name", b"");
        self.persistence.save("ip_parameter", &self.config.ip.to_bytes());
        self.lldp_identity_dirty = true;
        self.app.reset_ind(true);
    }

    fn set_ip_parameter(&mut self, ip: [u8; 4], netmask: [u8; 4], gateway: [u8; 4]) {
        self.config.ip = IpParameter {
            ip_address: ip,
            netmask,
            gateway,
        };
        self.persistence.save("ip_parameter", &self.config.ip.to_bytes());
        self.lldp_identity_dirty = true;
    }

    /// Handle one received LLDP frame: refresh (or create)
    /// the single neighbour record this port tracks.
    pub fn on_lldp_frame(&mut self, buf: &[u8], now_us: u64) {
        if let Some(peer) = lldp::parse_lldpdu(buf, now_us) {
            self.lldp_peer = Some(peer);
        }
    }

    /// Build this device's own periodic LLDP announcement.
    pub fn build_lldpdu(&self) -> Vec<u8> {
        let mac = self.link.mac();
        let mut buf = vec![0u8; 256];
        let n = lldp::build_lldpdu(
            &mut buf,
            &lldp::LldpIdentity {
                chassis_id: &mac,
                port_id: &mac,
                ttl_s: self.config.lldp.hold_time_s,
                port_description: None,
                system_name: Some(self.station_name()),
                management_address: None,
            },
        );
        buf.truncate(n);
        buf
    }

    /// Handle one reassembled RPC request. Returns
    /// the fragments to send back, if any (a non-final fragment of a
    /// multi-fragment request produces none).
    pub fn on_rpc_datagram(&mut self, buf: &[u8], peer_addr: SocketAddr, now_us: u64) -> Vec<Vec<u8>> {
        let outcome = match self.rpc.on_datagram(buf, peer_addr) {
            Ok(Some(outcome)) => outcome,
            Ok(None) | Err(_) => return Vec::new(),
        };
        let (session_handle, header, body) = match outcome {
            DatagramOutcome::Duplicate(frames) => return frames,
            DatagramOutcome::Request(session_handle, header, body) => (session_handle, header, body),
        };
        let request = IncomingRequest {
            header: header.clone(),
            body: &body,
            peer_addr,
            session: session_handle,
        };
        let result = self.dispatch_opnum(&request, now_us);
        self.rpc.build_response(session_handle, &header, result)
    }

    fn dispatch_opnum(&mut self, request: &IncomingRequest<'_>, now_us: u64) -> Result<Vec<u8>> {
        match request.header.opnum {
            opnum::CONNECT => self.handle_connect(request, now_us),
            opnum::RELEASE => self.handle_release(request),
            opnum::READ | opnum::READ_IMPLICIT => self.handle_read(request),
            opnum::WRITE => self.handle_write(request.body),
            opnum::CONTROL => self.handle_control(request),
            _ => Err(PnetError::unknown_blocks()),
        }
    }

    fn handle_connect(&mut self, request: &IncomingRequest<'_>, now_us: u64) -> Result<Vec<u8>> {
        let session = self
            .rpc
            .session(request.session)
            .ok_or_else(PnetError::state_conflict)?;
        let endian = session.endian;
        let parsed = cmrpc::parse_connect_request(request.body, endian)?;
        let ar_uuid = parsed.ar_uuid;
        let ar_handle = cmrpc::allocate_ar(&mut self.cm, parsed, request.session)?;
        if let Some(session) = self.rpc.session_mut(request.session) {
            session.ar = Some(ar_handle);
        }
        if let Some(alarm_handle) = self.alarms.insert(AlarmEngine::new(self.config.alarm.timing)) {
            self.alarm_by_ar.insert(ar_handle.index, alarm_handle);
        }

        let reason = PnetError::state_conflict().status();
        let ar = self.cm.ars.get_mut(ar_handle).expect("just inserted");
        cmdev::drive(ar, crate::model::CmdevState::WConnect, reason);
        cmdev::drive(ar, crate::model::CmdevState::WCInd, reason);
        cmdev::drive(ar, crate::model::CmdevState::WPDev, reason);

        let mut runtime = CyclicRuntime::default();
        for iocr_handle in &ar.iocrs {
            let iocr = self.cm.iocrs.get(*iocr_handle).expect("just inserted");
            match iocr.direction {
                crate::model::IocrDirection::Input => runtime.cpms.push((*iocr_handle, Cpm::new(iocr, now_us))),
                crate::model::IocrDirection::Output => runtime.ppms.push((*iocr_handle, Ppm::new(iocr, now_us))),
            }
        }
        self.cyclic.insert(ar_handle.index, runtime);

        self.app.connect_ind(ar_handle, ar_uuid);

        let ar = self.cm.ars.get(ar_handle).expect("just inserted");
        let mut buf = vec![0u8; 256];
        let mut w = BlockWriter::new(&mut buf, Endian::Big);

        let patch = w.begin_block(block_type::AR_BLOCK_RES, 1, 0);
        w.u16(1); // ar_type: IOCARSingle
        w.bytes(&ar_uuid.as_bytes());
        w.u16(ar.session_key);
        w.mac(self.link.mac());
        w.u16(0); // responder_udp_rt_port: unused, cyclic frames go out raw
        w.end_block(patch);

        for iocr_handle in &ar.iocrs {
            let iocr = self.cm.iocrs.get(*iocr_handle).expect("just inserted");
            let patch = w.begin_block(block_type::IOCR_BLOCK_RES, 1, 0);
            let iocr_type = match iocr.direction {
                crate::model::IocrDirection::Input => 1u16,
                crate::model::IocrDirection::Output => 2u16,
            };
            w.u16(iocr_type);
            w.u16(iocr.crep); // iocr_reference: echo the controller's local reference
            w.u16(iocr.frame_id);
            w.end_block(patch);
        }

        if let Some(alarm_cr) = ar.alarm_cr {
            let patch = w.begin_block(block_type::ALARM_CR_BLOCK_RES, 1, 0);
            w.u16(alarm_cr.alarm_cr_type);
            w.u16(alarm_cr.local_alarm_reference); // remote_alarm_reference, mirrored back
            w.u16(alarm_cr.max_alarm_data_length);
            w.end_block(patch);
        }

        let diffs = module_diff::compute(&ar.expected_submodules, &self.slots, self.app.as_ref());
        if !diffs.is_empty() {
            let patch = w.begin_block(block_type::MODULE_DIFF_BLOCK, 1, 0);
            module_diff::encode_module_diff_block(&diffs, &mut w);
            w.end_block(patch);
        }

        let n = w.offset();
        buf.truncate(n);
        Ok(buf)
    }

    fn handle_release(&mut self, request: &IncomingRequest<'_>) -> Result<Vec<u8>> {
        let Some(session) = self.rpc.session(request.session) else {
            return Err(PnetError::state_conflict());
        };
        let Some(ar_handle) = session.ar else {
            return Err(PnetError::state_conflict());
        };
        self.release_ar(ar_handle);
        Ok(Vec::new())
    }

    fn release_ar(&mut self, ar_handle: Handle) {
        if let Some(ar) = self.cm.release_ar(ar_handle) {
            self.app.release_ind(ar_handle, ar.ar_uuid);
            self.rpc.release_session(ar.session);
        }
        self.cyclic.remove(&ar_handle.index);
        if let Some(alarm_handle) = self.alarm_by_ar.remove(&ar_handle.index) {
            self.alarms.remove(alarm_handle);
        }
    }

    fn handle_read(&self, request: &IncomingRequest<'_>) -> Result<Vec<u8>> {
        let mut r = BlockReader::new(request.body, Endian::Big);
        let index = r.u16();
        let slot = r.u16();
        let subslot = r.u16();
        if !r.is_ok() {
            return Err(PnetError::args_length_invalid());
        }
        match index {
            record_access::index::SUB_DIAGNOSIS_CH | record_access::index::SUB_DIAGNOSIS_ALL => {
                let fault_only = index == record_access::index::SUB_DIAGNOSIS_CH;
                let subslot = self
                    .slots
                    .iter()
                    .find(|s| s.slot_number == slot)
                    .and_then(|s| s.subslot(subslot))
                    .ok_or_else(PnetError::invalid_index)?;
                Ok(record_access::encode_subslot_diagnosis(subslot, fault_only))
            }
            record_access::index::AR_MOD_DIFF => {
                let ar = self
                    .rpc
                    .session(request.session)
                    .and_then(|s| s.ar)
                    .and_then(|h| self.cm.ars.get(h))
                    .ok_or_else(PnetError::invalid_index)?;
                let diffs = module_diff::compute(&ar.expected_submodules, &self.slots, self.app.as_ref());
                let mut buf = vec![0u8; 256];
                let n = {
                    let mut w = BlockWriter::new(&mut buf, Endian::Big);
                    module_diff::encode_module_diff_block(&diffs, &mut w);
                    w.offset()
                };
                buf.truncate(n);
                Ok(buf)
            }
            _ => record_access::read_record(self.record_store.as_ref(), &self.im0, index, slot, subslot),
        }
    }

    fn handle_write(&self, body: &[u8]) -> Result<Vec<u8>> {
        let mut r = BlockReader::new(body, Endian::Big);
        let index = r.u16();
        let slot = r.u16();
        let subslot = r.u16();
        let len = r.u16();
        let data = r.bytes(len as usize);
        if !r.is_ok() {
            return Err(PnetError::args_length_invalid());
        }
        if index == record_access::index::WRITE_MULTIPLE {
            let results = record_access::write_multiple(self.record_store.as_ref(), data, Endian::Big);
            return Ok(record_access::encode_write_multiple_response(&results));
        }
        record_access::write_record(self.record_store.as_ref(), index, slot, subslot, data)?;
        Ok(Vec::new())
    }

    /// `opnum::CONTROL` carries either the controller's `DControl(PrmEnd)`
    /// or `CControl(AppReady)`, distinguished by the control block's
    /// `PrmEnd`/`ApplReady` qualifier.
    fn handle_control(&mut self, request: &IncomingRequest<'_>) -> Result<Vec<u8>> {
        const CONTROL_CMD_PRM_END: u16 = 0x0001;
        const CONTROL_CMD_APP_READY: u16 = 0x0002;

        let Some(session) = self.rpc.session(request.session) else {
            return Err(PnetError::state_conflict());
        };
        let ar_handle = session.ar.ok_or_else(PnetError::state_conflict)?;

        let mut r = BlockReader::new(request.body, Endian::Big);
        let _reserved = r.u16();
        let control_command = r.u16();
        if !r.is_ok() {
            return Err(PnetError::args_length_invalid());
        }

        let ar = self.cm.ars.get_mut(ar_handle).ok_or_else(PnetError::state_conflict)?;
        match control_command {
            CONTROL_CMD_PRM_END => {
                self.app.dcontrol_ind(ar_handle)?;
                cmpbe::on_prm_end(ar)?;
            }
            CONTROL_CMD_APP_READY => {
                cmpbe::on_app_ready_confirmed(ar)?;
                self.app.ccontrol_cnf(ar_handle);
            }
            _ => return Err(PnetError::unknown_blocks()),
        }
        Ok(Vec::new())
    }

    /// Feed one received cyclic real-time frame to the matching CPM
    ///. `frame_id` selects the IOCR; everything else is
    /// identity/ordering validation CPM performs itself.
    pub fn on_cyclic_frame(
        &mut self,
        now_us: u64,
        frame_id: u16,
        src_mac: Mac,
        vlan_id: Option<u16>,
        cycle_counter: u16,
        frame: &[u8],
    ) {
        for runtime in self.cyclic.values_mut() {
            for (iocr_handle, cpm) in &mut runtime.cpms {
                let Some(iocr) = self.cm.iocrs.get(*iocr_handle) else { continue };
                if iocr.frame_id != frame_id {
                    continue;
                }
                match cpm.on_frame(now_us, frame_id, src_mac, vlan_id, cycle_counter, frame) {
                    Ok(()) => self.app.new_data_ind(*iocr_handle, cpm.image()),
                    Err(reason) => log::debug!("[stack] cyclic frame rejected: {reason:?}"),
                }
                return;
            }
        }
    }

    /// Drive the whole cooperative event loop one step: periodic LLDP
    /// announcements, cyclic PPM transmission, CPM data-hold watchdogs,
    /// alarm retransmission and station-problem rollup. Every frame that
    /// should now go out (LLDP, cyclic data, due alarm retransmissions) is
    /// handed to [`crate::transport::LinkLayer::send`] directly.
    pub fn tick(&mut self, now_us: u64) {
        let station_problem = diag::station_problem_indicator(&self.slots);

        if std::mem::take(&mut self.lldp_identity_dirty) || now_us >= self.next_lldp_due_us {
            let _ = self.link.send(self.build_lldpdu());
            self.next_lldp_due_us = now_us + self.config.lldp.tx_interval_s as u64 * 1_000_000;
        }

        let mut expired = Vec::new();
        for (ar_handle, ar) in self.cm.ars.iter() {
            let running = ar.is_data();
            let Some(runtime) = self.cyclic.get_mut(&ar_handle.index) else { continue };

            for (_, ppm) in &mut runtime.ppms {
                if let Some(frame) = ppm.tick(now_us, running, station_problem, 0) {
                    let _ = self.link.send(frame.to_vec());
                }
            }
            for (_, cpm) in &mut runtime.cpms {
                if cpm.tick(now_us) {
                    expired.push(ar_handle);
                }
            }
        }
        for ar_handle in expired {
            if let Some(ar) = self.cm.ars.get_mut(ar_handle) {
                if ar.is_data() {
                    log::warn!("[stack] AR {} data hold time expired, aborting", ar.ar_uuid);
                    cmdev::abort(ar, PnetError::consumer_dht_expired().status());
                }
            }
            self.release_ar(ar_handle);
        }

        let mut alarm_aborted = Vec::new();
        for (ar_handle, _) in self.cm.ars.iter() {
            let Some(alarm_handle) = self.alarm_by_ar.get(&ar_handle.index) else { continue };
            let Some(engine) = self.alarms.get_mut(*alarm_handle) else { continue };
            let (low, high) = engine.tick(now_us);
            for tick in [low, high] {
                if let Some(pdu) = &tick.pdu {
                    log::debug!(
                        "[stack] (re)transmitting alarm seq={} for AR slot {}",
                        pdu.sequence_number,
                        ar_handle.index
                    );
                    let _ = self.link.send(alarm::encode_rta_pdu(pdu, Endian::Big));
                }
                if tick.retries_exhausted {
                    alarm_aborted.push(ar_handle);
                }
            }
        }
        for ar_handle in alarm_aborted {
            if let Some(ar) = self.cm.ars.get_mut(ar_handle) {
                if ar.is_data() {
                    log::warn!("[stack] AR {} alarm retries exhausted, aborting", ar.ar_uuid);
                    cmdev::abort(ar, PnetError::alarm_ack_timeout().status());
                }
            }
            self.release_ar(ar_handle);
        }
    }
}
