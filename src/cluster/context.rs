//! Process-wide cluster state: the client registry, the vote cell, and the
//! voting exclusivity flag.
//!
//! Shared by the inbound RPC handlers and both background workers. The
//! registry and the vote cell sit behind their own locks, held only for the
//! map/cell access itself; the voting flag is an atomic with
//! acquire-or-bail compare-exchange semantics, never a lock.

use crate::cluster::types::{client_name, ClientConfig, Role, Vote};
use crate::common::{utils, Config, Node};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

pub struct Context {
    cluster_name: String,
    group_name: String,
    client_name: String,
    self_node: Node,
    static_nodes: Vec<Node>,
    vote_timeout_ms: u64,
    heartbeat_stale_ms: i64,
    clients: RwLock<HashMap<String, ClientConfig>>,
    vote: RwLock<Option<Vote>>,
    voting: AtomicBool,
}

impl Context {
    pub fn new(config: &Config) -> Self {
        Self {
            cluster_name: config.cluster.clone(),
            group_name: config.group.clone(),
            client_name: client_name(&config.ip, config.port),
            self_node: config.self_node(),
            static_nodes: config.nodes.clone(),
            vote_timeout_ms: config.vote_timeout_ms,
            heartbeat_stale_ms: config.heartbeat_stale_ms(),
            clients: RwLock::new(HashMap::new()),
            vote: RwLock::new(None),
            voting: AtomicBool::new(false),
        }
    }

    pub fn cluster_name(&self) -> &str {
        &self.cluster_name
    }

    pub fn group_name(&self) -> &str {
        &self.group_name
    }

    pub fn client_name(&self) -> &str {
        &self.client_name
    }

    pub fn self_node(&self) -> &Node {
        &self.self_node
    }

    // === registry ===

    /// Upsert the entry for (ip, port) and stamp its heartbeat time. The
    /// declared role only applies when the client is first seen; repeated
    /// heartbeats just refresh the timestamp.
    pub fn record_heartbeat(&self, ip: &str, port: u16, role: Option<Role>) {
        let name = client_name(ip, port);
        let mut clients = self.clients.write();
        let entry = clients.entry(name.clone()).or_insert_with(|| ClientConfig {
            client_name: name,
            ip: ip.to_string(),
            port,
            role: role.unwrap_or(Role::Slave),
            heartbeat_time: -1,
        });
        entry.heartbeat_time = utils::now_millis();
    }

    pub fn snapshot(&self) -> HashMap<String, ClientConfig> {
        self.clients.read().clone()
    }

    /// Swap in a registry pulled from the master, atomically for readers.
    pub fn replace_clients(&self, clients: HashMap<String, ClientConfig>) {
        *self.clients.write() = clients;
    }

    pub fn clear_clients(&self) {
        self.clients.write().clear();
    }

    pub fn client_count(&self) -> usize {
        self.clients.read().len()
    }

    pub fn self_entry(&self) -> Option<ClientConfig> {
        self.clients.read().get(&self.client_name).cloned()
    }

    /// Own registry entry heartbeated within the staleness threshold.
    pub fn is_healthy(&self) -> bool {
        match self.self_entry() {
            Some(entry) => !entry.is_timeout(self.heartbeat_stale_ms, utils::now_millis()),
            None => false,
        }
    }

    pub fn find_master(&self) -> Option<ClientConfig> {
        self.clients.read().values().find(|c| c.is_master()).cloned()
    }

    /// Node to treat as master: an active (non-expired) vote wins, else the
    /// first MASTER entry in the registry.
    pub fn master_node(&self) -> Option<Node> {
        if let Some(vote) = self.current_vote() {
            return Some(vote.node());
        }
        self.find_master().map(|c| c.node())
    }

    pub fn is_self_master(&self) -> bool {
        self.find_master()
            .map(|m| m.client_name.eq_ignore_ascii_case(&self.client_name))
            .unwrap_or(false)
    }

    /// Configured nodes merged with every endpoint the registry has seen,
    /// deduplicated, registry entries first.
    pub fn all_nodes(&self) -> Vec<Node> {
        let mut nodes: Vec<Node> = Vec::new();
        for config in self.clients.read().values() {
            let node = config.node();
            if !nodes.contains(&node) {
                nodes.push(node);
            }
        }
        for node in &self.static_nodes {
            if !nodes.contains(node) {
                nodes.push(node.clone());
            }
        }
        nodes
    }

    // === vote state ===

    /// The vote under evaluation. Expired votes read as absent so that every
    /// consumer sees the same recovery behavior without explicit cleanup.
    pub fn current_vote(&self) -> Option<Vote> {
        let vote = self.vote.read().clone();
        vote.filter(|v| !v.is_expired(self.vote_timeout_ms, utils::now_millis()))
    }

    pub fn set_vote(&self, vote: Vote) {
        *self.vote.write() = Some(vote);
    }

    pub fn clear_vote(&self) {
        *self.vote.write() = None;
    }

    pub fn is_voting(&self) -> bool {
        self.voting.load(Ordering::SeqCst)
    }

    /// Acquire the voting flag, or bail out.
    pub fn try_begin_voting(&self) -> bool {
        self.voting
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    pub fn end_voting(&self) {
        self.voting.store(false, Ordering::SeqCst);
    }

    /// True when a stored in-flight vote has outlived the vote timeout. A
    /// voting flag left true by a stalled election must not block fresh
    /// proposals forever.
    pub fn in_flight_vote_expired(&self) -> bool {
        self.vote
            .read()
            .as_ref()
            .map(|v| v.is_expired(self.vote_timeout_ms, utils::now_millis()))
            .unwrap_or(false)
    }

    /// Tie-break: should `incoming` replace the current vote?
    ///
    /// Expired incoming votes never win. An absent, identical, or expired
    /// current vote always yields. Otherwise the earlier-issued vote wins.
    pub fn compare_to_replace(&self, incoming: &Vote) -> bool {
        let now = utils::now_millis();
        if incoming.is_expired(self.vote_timeout_ms, now) {
            return false;
        }
        let current = self.vote.read();
        match current.as_ref() {
            None => true,
            Some(cur) if cur.vote_id == incoming.vote_id => true,
            Some(cur) if cur.is_expired(self.vote_timeout_ms, now) => true,
            Some(cur) => incoming.vote_time < cur.vote_time,
        }
    }
}
