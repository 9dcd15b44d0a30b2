//! Reliable datagram engine over the radio port.
//!
//! One engine instance per node. Everything is driven from `tick`, which
//! must run at 20 Hz or faster: it drains the radio IRQ, guards against
//! wedged transmissions, ages the peer table, walks the slave connection
//! state machine, answers pending ACKs, starts outbox transmissions and
//! compacts exhausted entries, in that order. At most one frame is in
//! flight at any time; `radio_phase` is the mutex over the transceiver.
//!
//! Delivery semantics: a require-ack DATA is retained until a matching
//! ACK arrives or the retry budget is exhausted; a best-effort DATA is
//! forgotten at TX completion. ACKs are sent out of band (never queued),
//! exactly once per received delivery attempt, and are themselves never
//! acknowledged or retried.

use embedded_hal::delay::DelayNs;
use heapless::{Deque, Vec};

use crate::config::{LinkConfig, NodeId, NodeMode, RadioParams, BROADCAST_NODE_ID, INVALID_NODE_ID};
use crate::protocol::{Frame, FrameType, MAX_FRAME_LEN, MAX_PAYLOAD_LEN};
use crate::radio::{RadioDriver, RadioEvent};

pub const MAX_OUTBOX: usize = 8;

pub const MAX_PEERS: usize = 16;

const EVENT_QUEUE_DEPTH: usize = 8;

/// Retry delay for a registration attempt refused by a full outbox.
const REGISTRATION_RETRY_MS: u32 = 500;

/// Grace on top of the ACK timeout before a stall warning fires.
const STALL_GRACE_MS: u32 = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RadioPhase {
    Idle,
    Rx,
    Tx,
}

#[derive(Debug, Clone, Copy)]
pub struct PeerInfo {
    pub peer_id: NodeId,
    pub last_seen_ms: u32,
    pub connected: bool,
}

/// Engine output, drained with [`LinkEngine::poll_event`] after each tick.
#[derive(Debug, Clone)]
pub enum LinkEvent {
    DataReceived {
        src: NodeId,
        payload: Vec<u8, MAX_PAYLOAD_LEN>,
    },
    AckReceived {
        src: NodeId,
        msg_id: u16,
        attempts: u8,
    },
    MessageDropped {
        msg_id: u16,
        attempts: u8,
    },
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LinkStats {
    pub frames_sent: u32,
    pub frames_received: u32,
    pub acks_received: u32,
    pub tx_errors: u32,
    pub rx_rejected: u32,
    pub messages_dropped: u32,
}

#[derive(Clone)]
struct OutboxEntry {
    dst: NodeId,
    msg_id: u16,
    require_ack: bool,
    attempts: u8,
    next_attempt_ms: u32,
    length: u8,
    buf: [u8; MAX_FRAME_LEN],
}

impl OutboxEntry {
    fn frame_bytes(&self) -> &[u8] {
        &self.buf[..self.length as usize]
    }
}

#[derive(Clone, Copy, Default)]
struct PeerSlot {
    peer_id: NodeId,
    last_seen_ms: u32,
    connected: bool,
}

pub struct LinkEngine<R, D> {
    radio: R,
    delay: D,
    cfg: LinkConfig,
    radio_params: RadioParams,

    mode: NodeMode,
    self_id: NodeId,
    master_id: NodeId,
    started: bool,

    phase: RadioPhase,
    outbox: Vec<OutboxEntry, MAX_OUTBOX>,
    peers: [PeerSlot; MAX_PEERS],
    events: Deque<LinkEvent, EVENT_QUEUE_DEPTH>,

    next_msg_id: u16,
    current_tx_msg_id: Option<u16>,
    pending_ack: Option<(NodeId, u16)>,

    conn: ConnectionState,
    next_reconnect_ms: u32,
    connect_started_ms: u32,
    last_ack_ok_ms: u32,

    last_rssi_dbm: i16,
    last_radio_activity_ms: u32,
    tx_stuck_count: u8,
    stall_since_ms: Option<u32>,
    stall_warned: bool,
    last_now_ms: u32,

    stats: LinkStats,
}

impl<R, D> LinkEngine<R, D>
where
    R: RadioDriver,
    D: DelayNs,
{
    pub fn new(radio: R, delay: D, radio_params: RadioParams, cfg: LinkConfig) -> Self {
        Self {
            radio,
            delay,
            cfg,
            radio_params,
            mode: NodeMode::Slave,
            self_id: INVALID_NODE_ID,
            master_id: INVALID_NODE_ID,
            started: false,
            phase: RadioPhase::Idle,
            outbox: Vec::new(),
            peers: [PeerSlot::default(); MAX_PEERS],
            events: Deque::new(),
            next_msg_id: 1,
            current_tx_msg_id: None,
            pending_ack: None,
            conn: ConnectionState::Disconnected,
            next_reconnect_ms: 0,
            connect_started_ms: 0,
            last_ack_ok_ms: 0,
            last_rssi_dbm: 0,
            last_radio_activity_ms: 0,
            tx_stuck_count: 0,
            stall_since_ms: None,
            stall_warned: false,
            last_now_ms: 0,
            stats: LinkStats::default(),
        }
    }

    /// Initialize the radio and park in receive. Idempotent.
    pub fn begin(&mut self, mode: NodeMode, self_id: NodeId) -> bool {
        if self.started {
            return true;
        }
        self.mode = mode;
        self.self_id = self_id;

        if let Err(e) = self.radio.begin(&self.radio_params) {
            log::error!("[link] radio init failed: {:?}", e);
            return false;
        }
        if self.radio.enter_rx_continuous().is_err() {
            log::error!("[link] initial rx entry failed");
            return false;
        }
        self.phase = RadioPhase::Rx;
        self.conn = ConnectionState::Disconnected;
        self.next_reconnect_ms = 0;
        self.started = true;
        log::info!(
            "[link] up as {} id={}",
            match mode {
                NodeMode::Master => "master",
                NodeMode::Slave => "slave",
            },
            self_id
        );
        true
    }

    pub fn set_master_node_id(&mut self, master_id: NodeId) {
        self.master_id = master_id;
    }

    pub fn set_peer_timeout(&mut self, timeout_ms: u32) {
        self.cfg.peer_timeout_ms = timeout_ms;
    }

    /// Drop the connection and re-register on the next tick. The remote's
    /// quiet watchdog calls this when ACKs stop arriving.
    pub fn force_reconnect(&mut self) {
        if self.mode != NodeMode::Slave {
            return;
        }
        log::warn!("[link] forced reconnect");
        self.conn = ConnectionState::Disconnected;
        self.next_reconnect_ms = self.last_now_ms;
    }

    /// Enqueue application DATA. `false` when the payload exceeds the
    /// frame budget or the outbox has no unreserved slot left: one slot
    /// always stays free for presence traffic.
    pub fn send_data(&mut self, dst: NodeId, payload: &[u8], require_ack: bool) -> bool {
        if payload.len() > MAX_PAYLOAD_LEN {
            log::warn!("[link] payload too large ({} bytes)", payload.len());
            return false;
        }
        if self.outbox.len() >= MAX_OUTBOX - 1 {
            log::warn!("[link] outbox full, refused DATA to {}", dst);
            return false;
        }

        let msg_id = self.allocate_msg_id();
        let Some(frame) = Frame::data(self.self_id, dst, msg_id, payload, require_ack) else {
            return false;
        };
        if !self.push_entry(&frame, require_ack) {
            return false;
        }
        log::debug!(
            "[link] ENQ DATA to={} msgId={} ack={} obx={}",
            dst,
            msg_id,
            require_ack,
            self.outbox.len()
        );
        true
    }

    /// One pass of the engine. Call at 20 Hz or faster.
    pub fn tick(&mut self, now: u32) {
        self.last_now_ms = now;
        if !self.started {
            return;
        }

        // Radio IRQ drain first so TX completions free the channel before
        // anything below wants it.
        if let Some(event) = self.radio.process_irq() {
            self.handle_radio_event(event, now);
        }

        self.check_tx_watchdog(now);
        self.age_peers(now);
        self.drive_connection(now);

        // A pending ACK always outranks queued data.
        if let Some((dst, msg_id)) = self.pending_ack {
            if self.phase != RadioPhase::Tx {
                log::debug!("[link] TX ACK to={} msgId={}", dst, msg_id);
                let frame = Frame::ack(self.self_id, dst, msg_id);
                self.start_tx(&frame.encode(), None, now);
                self.pending_ack = None;
            }
            return;
        }

        if self.phase != RadioPhase::Tx {
            if let Some(idx) = self.select_next_outbox(now) {
                let mut buf = [0u8; MAX_FRAME_LEN];
                let (len, msg_id) = {
                    let entry = &mut self.outbox[idx];
                    entry.attempts += 1;
                    if entry.require_ack {
                        entry.next_attempt_ms = now.wrapping_add(self.cfg.ack_timeout_ms);
                    }
                    log::debug!(
                        "[link] TX DATA to={} msgId={} attempt={}{}",
                        entry.dst,
                        entry.msg_id,
                        entry.attempts,
                        if entry.require_ack { " waitAck" } else { "" }
                    );
                    let len = entry.length as usize;
                    buf[..len].copy_from_slice(entry.frame_bytes());
                    (len, entry.msg_id)
                };
                if self.start_tx(&buf[..len], Some(msg_id), now) {
                    self.clear_stall();
                    return;
                }
            }

            self.compact_outbox(now);
            self.track_stall(now);
        }
    }

    /// Next engine event, oldest first.
    pub fn poll_event(&mut self) -> Option<LinkEvent> {
        self.events.pop_front()
    }

    /// True when the engine can immediately attempt a new transmission.
    pub fn is_ready_for_tx(&self) -> bool {
        self.started && self.phase != RadioPhase::Tx && self.pending_ack.is_none()
    }

    pub fn is_tx_busy(&self) -> bool {
        !self.is_ready_for_tx()
    }

    /// Masters are always up relative to themselves.
    pub fn is_connected(&self) -> bool {
        match self.mode {
            NodeMode::Master => true,
            NodeMode::Slave => self.conn == ConnectionState::Connected,
        }
    }

    pub fn connection_state(&self) -> ConnectionState {
        match self.mode {
            NodeMode::Master => ConnectionState::Connected,
            NodeMode::Slave => self.conn,
        }
    }

    pub fn last_rssi_dbm(&self) -> i16 {
        self.last_rssi_dbm
    }

    /// Peers currently inside the liveness window.
    pub fn peer_count(&self) -> usize {
        self.peers
            .iter()
            .filter(|p| p.peer_id != INVALID_NODE_ID && p.connected)
            .count()
    }

    /// Every peer ever tracked and not yet evicted.
    pub fn total_peer_count(&self) -> usize {
        self.peers
            .iter()
            .filter(|p| p.peer_id != INVALID_NODE_ID)
            .count()
    }

    pub fn peer_by_index(&self, index: usize) -> Option<PeerInfo> {
        self.peers
            .iter()
            .filter(|p| p.peer_id != INVALID_NODE_ID)
            .nth(index)
            .map(|p| PeerInfo {
                peer_id: p.peer_id,
                last_seen_ms: p.last_seen_ms,
                connected: p.connected,
            })
    }

    pub fn stats(&self) -> LinkStats {
        self.stats
    }

    /// Zero the counters and rewind message-id allocation, part of the
    /// remote's daily reset.
    pub fn reset_stats(&mut self) {
        self.stats = LinkStats::default();
        self.next_msg_id = 1;
    }

    pub fn radio_mut(&mut self) -> &mut R {
        &mut self.radio
    }

    fn allocate_msg_id(&mut self) -> u16 {
        if self.next_msg_id == 0 {
            self.next_msg_id = 1;
        }
        let id = self.next_msg_id;
        self.next_msg_id = self.next_msg_id.wrapping_add(1);
        id
    }

    fn push_entry(&mut self, frame: &Frame, require_ack: bool) -> bool {
        let encoded = frame.encode();
        let mut entry = OutboxEntry {
            dst: frame.dst,
            msg_id: frame.msg_id,
            require_ack,
            attempts: 0,
            next_attempt_ms: 0,
            length: encoded.len() as u8,
            buf: [0u8; MAX_FRAME_LEN],
        };
        entry.buf[..encoded.len()].copy_from_slice(&encoded);
        self.outbox.push(entry).is_ok()
    }

    /// Registration keep-alive: an empty require-ack DATA to the master.
    /// May use the reserved slot, and may preempt a queued best-effort
    /// DATA (FIFO order) when even that is taken.
    fn enqueue_registration(&mut self) -> bool {
        if self.master_id == INVALID_NODE_ID {
            return false;
        }
        if self.outbox.len() == MAX_OUTBOX {
            let victim = self
                .outbox
                .iter()
                .position(|e| !e.require_ack && Some(e.msg_id) != self.current_tx_msg_id);
            match victim {
                Some(idx) => {
                    let evicted = self.outbox.remove(idx);
                    log::warn!(
                        "[link] preempted best-effort msgId={} for registration",
                        evicted.msg_id
                    );
                }
                None => return false,
            }
        }

        let msg_id = self.allocate_msg_id();
        let Some(frame) = Frame::data(self.self_id, self.master_id, msg_id, &[], true) else {
            return false;
        };
        if !self.push_entry(&frame, true) {
            return false;
        }
        log::info!("[link] registration enqueued msgId={}", msg_id);
        true
    }

    fn handle_radio_event(&mut self, event: RadioEvent, now: u32) {
        self.last_radio_activity_ms = now;
        match event {
            RadioEvent::TxDone => {
                self.tx_stuck_count = 0;
                log::debug!("[link] TX done");
                if let Some(msg_id) = self.current_tx_msg_id.take() {
                    // Best-effort entries are done at this point.
                    if let Some(idx) = self
                        .outbox
                        .iter()
                        .position(|e| e.msg_id == msg_id && !e.require_ack)
                    {
                        self.outbox.remove(idx);
                    }
                }
                self.enter_rx();
            }
            RadioEvent::TxTimeout => {
                log::warn!("[link] TX timeout");
                self.stats.tx_errors += 1;
                self.settle_in_flight(now);
                self.enter_rx();
            }
            RadioEvent::RxDone {
                data,
                rssi_dbm,
                snr_db,
            } => {
                let _ = self.radio.sleep();
                self.phase = RadioPhase::Idle;
                self.handle_rx_frame(&data, rssi_dbm, snr_db, now);
                self.enter_rx();
            }
        }
    }

    fn handle_rx_frame(&mut self, data: &[u8], rssi_dbm: i16, snr_db: i8, now: u32) {
        let Some(frame) = Frame::decode(data) else {
            self.stats.rx_rejected += 1;
            return;
        };
        if frame.dst != self.self_id && frame.dst != BROADCAST_NODE_ID {
            // Overheard traffic for somebody else.
            return;
        }

        self.last_rssi_dbm = rssi_dbm;
        self.note_peer_seen(frame.src, now);

        // Any valid master frame completes the registration handshake.
        if self.mode == NodeMode::Slave
            && frame.src == self.master_id
            && self.conn == ConnectionState::Connecting
        {
            self.conn = ConnectionState::Connected;
            log::info!("[link] connected to master {}", self.master_id);
        }

        match frame.frame_type {
            FrameType::Data => {
                self.stats.frames_received += 1;
                log::info!(
                    "[link] RX DATA from={} len={} rssi={} snr={}",
                    frame.src,
                    frame.payload.len(),
                    rssi_dbm,
                    snr_db
                );
                if frame.require_ack() {
                    self.pending_ack = Some((frame.src, frame.msg_id));
                }
                if !frame.payload.is_empty() {
                    self.push_event(LinkEvent::DataReceived {
                        src: frame.src,
                        payload: frame.payload,
                    });
                }
            }
            FrameType::Ack => {
                log::debug!("[link] RX ACK from={} msgId={}", frame.src, frame.msg_id);
                self.stats.acks_received += 1;
                if self.mode == NodeMode::Slave {
                    self.last_ack_ok_ms = now;
                }
                if let Some(idx) = self.outbox.iter().position(|e| e.msg_id == frame.msg_id) {
                    let entry = self.outbox.remove(idx);
                    if Some(entry.msg_id) == self.current_tx_msg_id {
                        self.current_tx_msg_id = None;
                    }
                    self.push_event(LinkEvent::AckReceived {
                        src: frame.src,
                        msg_id: frame.msg_id,
                        attempts: entry.attempts,
                    });
                }
            }
        }
    }

    fn check_tx_watchdog(&mut self, now: u32) {
        if self.phase != RadioPhase::Tx {
            return;
        }
        if elapsed(now, self.last_radio_activity_ms) <= self.cfg.tx_guard_ms {
            return;
        }

        self.tx_stuck_count += 1;
        self.stats.tx_errors += 1;
        log::warn!(
            "[link] TX stuck for {} ms (event {}/{})",
            elapsed(now, self.last_radio_activity_ms),
            self.tx_stuck_count,
            self.cfg.tx_stuck_reinit_count
        );

        self.settle_in_flight(now);

        if self.tx_stuck_count >= self.cfg.tx_stuck_reinit_count {
            log::warn!("[link] reinitializing radio");
            if let Err(e) = self.radio.begin(&self.radio_params) {
                log::error!("[link] radio reinit failed: {:?}", e);
            }
            self.tx_stuck_count = 0;
        }

        let _ = self.radio.sleep();
        self.delay.delay_ms(2);
        let _ = self.radio.standby();
        self.delay.delay_ms(3);
        self.enter_rx();
        self.last_radio_activity_ms = now;
    }

    /// Resolve the in-flight entry after a failed transmission: ack'd
    /// entries are rescheduled, best-effort ones are dropped.
    fn settle_in_flight(&mut self, now: u32) {
        let Some(msg_id) = self.current_tx_msg_id.take() else {
            return;
        };
        if let Some(idx) = self.outbox.iter().position(|e| e.msg_id == msg_id) {
            if self.outbox[idx].require_ack {
                self.outbox[idx].next_attempt_ms = now.wrapping_add(self.cfg.ack_timeout_ms);
            } else {
                self.outbox.remove(idx);
                self.stats.messages_dropped += 1;
            }
        }
    }

    fn age_peers(&mut self, now: u32) {
        for peer in self.peers.iter_mut() {
            if peer.peer_id != INVALID_NODE_ID {
                peer.connected = elapsed(now, peer.last_seen_ms) < self.cfg.peer_timeout_ms;
            }
        }
    }

    fn drive_connection(&mut self, now: u32) {
        if self.mode != NodeMode::Slave || self.master_id == INVALID_NODE_ID {
            return;
        }
        match self.conn {
            ConnectionState::Connected => {
                // Staying connected requires ACKs; inbound DATA alone
                // proves nothing about the uplink.
                if self.last_ack_ok_ms == 0
                    || elapsed(now, self.last_ack_ok_ms) >= self.cfg.peer_timeout_ms
                {
                    log::warn!("[link] no ACK from master, connection lost");
                    self.conn = ConnectionState::Disconnected;
                    self.next_reconnect_ms = now;
                }
            }
            ConnectionState::Disconnected => {
                if time_reached(now, self.next_reconnect_ms) {
                    if self.enqueue_registration() {
                        self.conn = ConnectionState::Connecting;
                        self.connect_started_ms = now;
                    } else {
                        self.next_reconnect_ms = now.wrapping_add(REGISTRATION_RETRY_MS);
                    }
                }
            }
            ConnectionState::Connecting => {
                let budget = self
                    .cfg
                    .ack_timeout_ms
                    .saturating_mul(self.cfg.max_retries as u32)
                    .wrapping_add(2_000);
                if elapsed(now, self.connect_started_ms) >= budget {
                    log::warn!("[link] registration unanswered");
                    self.conn = ConnectionState::Disconnected;
                    self.next_reconnect_ms = now.wrapping_add(self.cfg.reconnect_attempt_ms);
                }
            }
        }
    }

    /// Due retries first, most overdue wins; otherwise the oldest fresh
    /// entry. Exhausted entries wait for the compactor.
    fn select_next_outbox(&self, now: u32) -> Option<usize> {
        let mut best_retry: Option<(usize, i32)> = None;
        for (idx, entry) in self.outbox.iter().enumerate() {
            if entry.require_ack
                && entry.attempts > 0
                && entry.attempts < self.cfg.max_retries
                && time_reached(now, entry.next_attempt_ms)
            {
                let overdue = now.wrapping_sub(entry.next_attempt_ms) as i32;
                match best_retry {
                    Some((_, best)) if best >= overdue => {}
                    _ => best_retry = Some((idx, overdue)),
                }
            }
        }
        if let Some((idx, _)) = best_retry {
            return Some(idx);
        }
        self.outbox.iter().position(|e| e.attempts == 0)
    }

    fn compact_outbox(&mut self, now: u32) {
        let mut idx = 0;
        while idx < self.outbox.len() {
            let expired = {
                let e = &self.outbox[idx];
                e.require_ack
                    && e.attempts >= self.cfg.max_retries
                    && time_reached(now, e.next_attempt_ms)
            };
            if expired {
                let entry = self.outbox.remove(idx);
                self.stats.messages_dropped += 1;
                log::warn!(
                    "[link] dropped msgId={} after {} attempts",
                    entry.msg_id,
                    entry.attempts
                );
                if Some(entry.msg_id) == self.current_tx_msg_id {
                    self.current_tx_msg_id = None;
                }
                self.push_event(LinkEvent::MessageDropped {
                    msg_id: entry.msg_id,
                    attempts: entry.attempts,
                });
            } else {
                idx += 1;
            }
        }
    }

    fn track_stall(&mut self, now: u32) {
        if self.outbox.is_empty() {
            self.clear_stall();
            return;
        }
        let eligible = self.select_next_outbox(now).is_some();
        if eligible {
            self.clear_stall();
            return;
        }
        match self.stall_since_ms {
            None => self.stall_since_ms = Some(now),
            Some(since) => {
                if !self.stall_warned
                    && elapsed(now, since) > self.cfg.ack_timeout_ms + STALL_GRACE_MS
                {
                    log::warn!("[link] outbox stalled with {} entries", self.outbox.len());
                    self.stall_warned = true;
                }
            }
        }
    }

    fn clear_stall(&mut self) {
        self.stall_since_ms = None;
        self.stall_warned = false;
    }

    /// Walk the radio through sleep -> standby with settling pauses, then
    /// hand over the frame. Half-duplex parts abort sends started from
    /// the wrong state, hence the explicit staging.
    fn start_tx(&mut self, frame: &[u8], msg_id: Option<u16>, now: u32) -> bool {
        let _ = self.radio.sleep();
        self.delay.delay_ms(2);
        let _ = self.radio.standby();
        self.delay.delay_ms(3);

        match self.radio.send(frame) {
            Ok(()) => {
                self.phase = RadioPhase::Tx;
                self.current_tx_msg_id = msg_id;
                self.last_radio_activity_ms = now;
                self.stats.frames_sent += 1;
                true
            }
            Err(e) => {
                log::error!("[link] send failed: {:?}", e);
                self.stats.tx_errors += 1;
                self.current_tx_msg_id = None;
                self.enter_rx();
                false
            }
        }
    }

    fn enter_rx(&mut self) {
        if self.radio.enter_rx_continuous().is_ok() {
            self.phase = RadioPhase::Rx;
        } else {
            log::error!("[link] rx entry failed");
            self.phase = RadioPhase::Idle;
        }
    }

    fn note_peer_seen(&mut self, peer_id: NodeId, now: u32) {
        if peer_id == INVALID_NODE_ID {
            return;
        }
        for peer in self.peers.iter_mut() {
            if peer.peer_id == peer_id {
                peer.last_seen_ms = now;
                peer.connected = true;
                return;
            }
        }
        for peer in self.peers.iter_mut() {
            if peer.peer_id == INVALID_NODE_ID {
                *peer = PeerSlot {
                    peer_id,
                    last_seen_ms: now,
                    connected: true,
                };
                return;
            }
        }
        // Table full: evict the peer silent the longest.
        let mut oldest_idx = 0;
        let mut oldest_age = 0u32;
        for (idx, peer) in self.peers.iter().enumerate() {
            let age = elapsed(now, peer.last_seen_ms);
            if age >= oldest_age {
                oldest_age = age;
                oldest_idx = idx;
            }
        }
        self.peers[oldest_idx] = PeerSlot {
            peer_id,
            last_seen_ms: now,
            connected: true,
        };
    }

    fn push_event(&mut self, event: LinkEvent) {
        if self.events.push_back(event.clone()).is_err() {
            // Keep the newest; the consumer is too slow.
            let _ = self.events.pop_front();
            let _ = self.events.push_back(event);
            log::warn!("[link] event queue overflow");
        }
    }
}

#[inline]
fn elapsed(now: u32, since: u32) -> u32 {
    now.wrapping_sub(since)
}

/// Wrap-safe `now >= deadline`.
#[inline]
fn time_reached(now: u32, deadline: u32) -> bool {
    (now.wrapping_sub(deadline) as i32) >= 0
}
