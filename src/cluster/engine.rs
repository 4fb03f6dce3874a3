//! The election/heartbeat/registry engine.
//!
//! One `ClusterService` per process, built at startup and shared by the
//! inbound RPC handlers and the background workers. Peer I/O goes through the
//! injected [`Gateway`]; everything else is in-memory state on [`Context`].

use crate::cluster::context::Context;
use crate::cluster::gateway::Gateway;
use crate::cluster::types::{ClientConfig, ClientInfo, Heartbeat, Role, Vote};
use crate::common::{utils, Config, Error, Node, Result};
use futures_util::stream::{FuturesUnordered, StreamExt};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

/// Concurrent sends during an election fan-out.
const FANOUT_PERMITS: usize = 10;

/// Outcome of evaluating a vote proposal. Rejection is a normal protocol
/// answer, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteDecision {
    Accepted,
    Rejected(RejectReason),
}

impl VoteDecision {
    pub fn accepted(&self) -> bool {
        matches!(self, VoteDecision::Accepted)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// The local service already follows a healthy master.
    HealthyMaster,
    /// The proposal is older than the vote timeout.
    Expired,
    /// An earlier-issued proposal is already held.
    Superseded,
    /// Mid-election on a different proposal.
    AlreadyVoting,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            RejectReason::HealthyMaster => "service is healthy, vote declined",
            RejectReason::Expired => "vote is past the vote timeout",
            RejectReason::Superseded => "an earlier vote is already held",
            RejectReason::AlreadyVoting => "already voting on a different proposal",
        };
        f.write_str(msg)
    }
}

pub struct ClusterService {
    config: Arc<Config>,
    ctx: Context,
    gateway: Arc<dyn Gateway>,
    fanout: Arc<Semaphore>,
}

impl ClusterService {
    pub fn new(config: Arc<Config>, gateway: Arc<dyn Gateway>) -> Self {
        Self {
            ctx: Context::new(&config),
            config,
            gateway,
            fanout: Arc::new(Semaphore::new(FANOUT_PERMITS)),
        }
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    // === registry ===

    /// Record a peer heartbeat into the registry.
    pub fn record_heartbeat(&self, heartbeat: &Heartbeat) -> Result<()> {
        let client = &heartbeat.client_config;
        if client.ip.is_empty() {
            return Err(Error::InvalidRequest("heartbeat ip is empty".into()));
        }
        if client.port == 0 {
            return Err(Error::InvalidRequest("heartbeat port is zero".into()));
        }
        self.ctx
            .record_heartbeat(&client.ip, client.port, client.role);
        Ok(())
    }

    /// Registry snapshot, gated on local health: a node that has not seen its
    /// own heartbeat recently answers with an empty map rather than serving a
    /// stale view as live membership.
    pub fn query_clients(&self) -> HashMap<String, ClientConfig> {
        if !self.ctx.is_healthy() {
            return HashMap::new();
        }
        self.ctx.snapshot()
    }

    // === responder side ===

    /// Evaluate an incoming vote proposal.
    pub fn accept_vote(&self, vote: &Vote) -> VoteDecision {
        // A node following a healthy master declines proposals for anyone else.
        if let Some(own) = self.ctx.self_entry() {
            if !own.is_timeout(self.config.heartbeat_stale_ms(), utils::now_millis()) {
                if let Some(master) = self.ctx.find_master() {
                    if master.node() != vote.node() {
                        return VoteDecision::Rejected(RejectReason::HealthyMaster);
                    }
                }
            }
        }

        if vote.is_expired(self.config.vote_timeout_ms, utils::now_millis()) {
            return VoteDecision::Rejected(RejectReason::Expired);
        }
        if !self.ctx.compare_to_replace(vote) {
            info!(vote_id = %vote.vote_id, "vote declined, earlier proposal held");
            return VoteDecision::Rejected(RejectReason::Superseded);
        }

        // Exclusivity: either the in-flight vote has expired, or we take the
        // voting flag right now.
        let exclusive = (self.ctx.is_voting() && self.ctx.in_flight_vote_expired())
            || self.ctx.try_begin_voting();
        if !exclusive {
            return VoteDecision::Rejected(RejectReason::AlreadyVoting);
        }

        info!(vote_id = %vote.vote_id, from = %vote.begin_client_name, "vote accepted");
        self.ctx.set_vote(vote.clone());
        VoteDecision::Accepted
    }

    // === master-sync receiver ===

    /// Adopt a winning vote pushed by a newly elected master: heartbeat to it
    /// and replace the local registry with its view. Returns `Ok(false)` when
    /// the tie-break rejects the push (stale or superseded).
    pub async fn apply_master_sync(&self, vote: &Vote) -> Result<bool> {
        if !self.ctx.compare_to_replace(vote) {
            warn!(vote_id = %vote.vote_id, "master sync rejected");
            return Ok(false);
        }
        self.ctx.end_voting();
        self.ctx.set_vote(vote.clone());
        let master = vote.node();
        self.gateway
            .heartbeat_to(&master, self.slave_heartbeat())
            .await?;
        let clients = self.gateway.query_registry(&master).await?;
        self.ctx.replace_clients(clients);
        info!(vote_id = %vote.vote_id, master = %master, "master sync applied");
        Ok(true)
    }

    // === initiator side ===

    /// Propose this node as master and gather a quorum. Returns true when the
    /// election was won and mastership installed.
    pub async fn run_election(&self) -> bool {
        if self.ctx.is_voting() || self.ctx.is_self_master() {
            return false;
        }
        if !self.ctx.try_begin_voting() {
            return false;
        }
        let won = self.solicit_quorum().await;
        self.ctx.clear_vote();
        self.ctx.end_voting();
        won
    }

    async fn solicit_quorum(&self) -> bool {
        let vote = Vote::new(self.ctx.client_name(), self.ctx.self_node());
        self.ctx.set_vote(vote.clone());

        let self_node = self.ctx.self_node().clone();
        let all_nodes = self.ctx.all_nodes();
        let needed = std::cmp::max(all_nodes.len() / 2 + 1, self.config.min_quorum);

        let mut pending = FuturesUnordered::new();
        for node in all_nodes {
            if node == self_node {
                continue;
            }
            let gateway = Arc::clone(&self.gateway);
            let permits = Arc::clone(&self.fanout);
            let vote = vote.clone();
            pending.push(tokio::spawn(async move {
                let Ok(_permit) = permits.acquire_owned().await else {
                    return false;
                };
                match gateway.request_vote(&node, &vote).await {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        warn!(node = %node, error = %e, "vote request failed");
                        false
                    }
                }
            }));
        }

        // Quorum wait: completion order, bounded by the vote timeout anchored
        // at fan-out start. The initiator's own yes opens the tally.
        let deadline = Instant::now() + self.config.vote_timeout();
        let mut accepts = 1usize;
        let mut won = accepts >= needed;
        while !won {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                warn!(accepts, needed, "vote deadline exhausted");
                break;
            }
            match tokio::time::timeout(remaining, pending.next()).await {
                Ok(Some(Ok(true))) => {
                    accepts += 1;
                    won = accepts >= needed;
                }
                Ok(Some(Ok(false))) => {}
                Ok(Some(Err(e))) => error!(error = %e, "vote request task failed"),
                Ok(None) => break,
                Err(_) => {
                    warn!(accepts, needed, "vote deadline exhausted");
                    break;
                }
            }
        }

        if !won {
            warn!(accepts, needed, "election failed to reach quorum");
            return false;
        }

        info!(vote_id = %vote.vote_id, accepts, "election won");
        self.adopt_mastership(&vote);
        true
    }

    /// Install self as master: reset the registry, re-register as MASTER, and
    /// push the winning vote to every peer, fire-and-forget.
    fn adopt_mastership(&self, vote: &Vote) {
        let self_node = self.ctx.self_node().clone();
        self.ctx.clear_clients();
        self.ctx
            .record_heartbeat(&self_node.ip, self_node.port, Some(Role::Master));

        for node in self.ctx.all_nodes() {
            if node == self_node {
                continue;
            }
            let gateway = Arc::clone(&self.gateway);
            let vote = vote.clone();
            tokio::spawn(async move {
                if let Err(e) = gateway.push_master_sync(&node, &vote).await {
                    error!(node = %node, error = %e, "master sync push failed");
                }
            });
        }
    }

    /// Election fallback: walk the peers for an advertised master and adopt
    /// it, stopping at the first success. An unreachable peer counts as an
    /// empty registry and the walk moves on.
    pub async fn fallback_to_query(&self) -> bool {
        info!("falling back to registry query");
        let self_node = self.ctx.self_node().clone();
        for node in self.ctx.all_nodes() {
            if node == self_node {
                continue;
            }
            let clients = match self.gateway.query_registry(&node).await {
                Ok(clients) => clients,
                Err(e) => {
                    warn!(node = %node, error = %e, "registry query failed");
                    continue;
                }
            };
            let Some(master) = clients.values().find(|c| c.is_master()) else {
                continue;
            };
            let master_node = master.node();
            match self.adopt_master(&master_node).await {
                Ok(()) => {
                    info!(master = %master_node, "adopted master from peer registry");
                    return true;
                }
                Err(e) => {
                    warn!(master = %master_node, error = %e, "failed to adopt advertised master")
                }
            }
        }
        false
    }

    /// Follow `master`: announce ourselves to it and take over its registry.
    async fn adopt_master(&self, master: &Node) -> Result<()> {
        self.gateway
            .heartbeat_to(master, self.slave_heartbeat())
            .await?;
        let clients = self.gateway.query_registry(master).await?;
        self.ctx.replace_clients(clients);
        Ok(())
    }

    fn slave_heartbeat(&self) -> Heartbeat {
        Heartbeat {
            cluster: self.ctx.cluster_name().to_string(),
            group_code: self.ctx.group_name().to_string(),
            client_config: ClientInfo {
                ip: self.ctx.self_node().ip.clone(),
                port: self.ctx.self_node().port,
                role: None,
            },
        }
    }

    // === worker cycles ===

    /// One heartbeat-worker tick. Takes and returns the timestamp of the last
    /// successful heartbeat so the calling loop owns that state; every
    /// fallible step is logged and swallowed here, the loop never dies.
    pub async fn heartbeat_cycle(&self, last_ok: i64) -> i64 {
        if !self.config.is_strong() || !self.config.heartbeat_enabled {
            return last_ok;
        }
        if self.ctx.is_voting() {
            info!("heartbeat: voting in progress, skip");
            return last_ok;
        }
        if self.ctx.is_self_master() {
            let node = self.ctx.self_node().clone();
            self.ctx.record_heartbeat(&node.ip, node.port, Some(Role::Master));
            return utils::now_millis();
        }

        if let Some(master) = self.ctx.master_node() {
            match self.gateway.heartbeat_to(&master, self.slave_heartbeat()).await {
                Ok(()) => return utils::now_millis(),
                Err(e) => warn!(master = %master, error = %e, "heartbeat to master failed"),
            }
        }

        // No master heard from within a full interval: desynchronize, then
        // elect; a lost election falls back to scanning peer registries.
        if utils::now_millis() - last_ok >= self.config.heartbeat_interval_ms as i64 {
            tokio::time::sleep(utils::election_jitter()).await;
            if self.run_election().await {
                return utils::now_millis();
            }
            if self.fallback_to_query().await {
                info!("fallback to query succeeded");
                return utils::now_millis();
            }
        }
        last_ok
    }

    /// One cluster-refresh tick: re-pull the registry from the known master
    /// as a backstop against missed sync pushes.
    pub async fn refresh_cycle(&self) {
        if !self.config.is_strong() {
            return;
        }
        if self.ctx.is_voting() {
            info!("cluster refresh: voting in progress, skip");
            return;
        }
        if self.ctx.is_self_master() {
            return;
        }
        let Some(master) = self.ctx.master_node() else {
            warn!("cluster refresh: no master known");
            return;
        };
        match self.gateway.query_registry(&master).await {
            Ok(clients) => self.ctx.replace_clients(clients),
            Err(e) => warn!(master = %master, error = %e, "cluster refresh failed"),
        }
    }
}
