//! Registry and worker-cycle integration tests: heartbeat idempotence, the
//! health-gated registry query, master-sync adoption, and the periodic cycle
//! skip/stamp/elect behavior.

use async_trait::async_trait;
use nameserv::cluster::engine::ClusterService;
use nameserv::cluster::gateway::Gateway;
use nameserv::cluster::types::{client_name, ClientConfig, ClientInfo, Heartbeat, Role, Vote};
use nameserv::common::{utils, Config, ConsistencyMode, Error, Node, Result};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

fn node(last_octet: u8) -> Node {
    Node::new(format!("10.0.0.{}", last_octet), 9000)
}

fn cluster_config(self_octet: u8) -> Config {
    Config {
        ip: format!("10.0.0.{}", self_octet),
        port: 9000,
        nodes: vec![node(1), node(2), node(3)],
        ..Config::default()
    }
}

fn heartbeat_from(octet: u8, role: Option<Role>) -> Heartbeat {
    Heartbeat {
        cluster: "defaultCluster".into(),
        group_code: "defaultGroup".into(),
        client_config: ClientInfo {
            ip: format!("10.0.0.{}", octet),
            port: 9000,
            role,
        },
    }
}

/// Scripted gateway: per-node vote answers and registries, call recording.
#[derive(Default)]
struct ScriptedGateway {
    accept: HashMap<Node, bool>,
    registries: HashMap<Node, HashMap<String, ClientConfig>>,
    unreachable: HashSet<Node>,
    calls: Mutex<Vec<(String, Node)>>,
}

impl ScriptedGateway {
    fn record(&self, what: &str, node: &Node) {
        self.calls.lock().push((what.to_string(), node.clone()));
    }

    fn called(&self, what: &str, node: &Node) -> bool {
        self.calls
            .lock()
            .iter()
            .any(|(w, n)| w == what && n == node)
    }

    fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    fn check_reachable(&self, node: &Node) -> Result<()> {
        if self.unreachable.contains(node) {
            return Err(Error::Rpc(format!("{} unreachable", node)));
        }
        Ok(())
    }
}

#[async_trait]
impl Gateway for ScriptedGateway {
    async fn heartbeat_to(&self, node: &Node, _heartbeat: Heartbeat) -> Result<()> {
        self.record("heartbeat", node);
        self.check_reachable(node)
    }

    async fn query_registry(&self, node: &Node) -> Result<HashMap<String, ClientConfig>> {
        self.record("query", node);
        self.check_reachable(node)?;
        Ok(self.registries.get(node).cloned().unwrap_or_default())
    }

    async fn request_vote(&self, node: &Node, _vote: &Vote) -> Result<bool> {
        self.record("vote", node);
        self.check_reachable(node)?;
        Ok(*self.accept.get(node).unwrap_or(&false))
    }

    async fn push_master_sync(&self, node: &Node, _vote: &Vote) -> Result<()> {
        self.record("sync", node);
        self.check_reachable(node)
    }
}

fn service(config: Config, gateway: Arc<ScriptedGateway>) -> ClusterService {
    ClusterService::new(Arc::new(config), gateway)
}

fn master_registry(master: Node) -> HashMap<String, ClientConfig> {
    let mut entry = ClientConfig::new(master.ip.clone(), master.port, Role::Master);
    entry.heartbeat_time = utils::now_millis();
    let mut clients = HashMap::new();
    clients.insert(entry.client_name.clone(), entry);
    clients
}

#[tokio::test]
async fn heartbeat_is_idempotent() {
    let svc = service(cluster_config(1), Arc::new(ScriptedGateway::default()));

    svc.record_heartbeat(&heartbeat_from(2, Some(Role::Slave)))
        .unwrap();
    let first = svc.context().snapshot()["client_10.0.0.2_9000"].heartbeat_time;

    tokio::time::sleep(Duration::from_millis(5)).await;
    svc.record_heartbeat(&heartbeat_from(2, Some(Role::Slave)))
        .unwrap();

    let clients = svc.context().snapshot();
    assert_eq!(clients.len(), 1);
    let entry = &clients["client_10.0.0.2_9000"];
    assert_eq!(entry.client_name, client_name("10.0.0.2", 9000));
    assert_eq!(entry.role, Role::Slave);
    assert!(entry.heartbeat_time >= first);
}

#[tokio::test]
async fn heartbeat_without_role_registers_slave() {
    let svc = service(cluster_config(1), Arc::new(ScriptedGateway::default()));
    svc.record_heartbeat(&heartbeat_from(2, None)).unwrap();
    assert_eq!(
        svc.context().snapshot()["client_10.0.0.2_9000"].role,
        Role::Slave
    );
}

#[tokio::test]
async fn heartbeat_validates_endpoint() {
    let svc = service(cluster_config(1), Arc::new(ScriptedGateway::default()));

    let mut bad_ip = heartbeat_from(2, None);
    bad_ip.client_config.ip.clear();
    assert!(svc.record_heartbeat(&bad_ip).is_err());

    let mut bad_port = heartbeat_from(2, None);
    bad_port.client_config.port = 0;
    assert!(svc.record_heartbeat(&bad_port).is_err());

    assert!(svc.context().snapshot().is_empty());
}

#[tokio::test]
async fn query_is_gated_on_local_health() {
    let svc = service(cluster_config(1), Arc::new(ScriptedGateway::default()));

    // peers registered, but this node has never seen its own heartbeat
    svc.record_heartbeat(&heartbeat_from(2, Some(Role::Master)))
        .unwrap();
    assert!(svc.query_clients().is_empty());

    // once the node itself is fresh, the snapshot is served
    svc.record_heartbeat(&heartbeat_from(1, None)).unwrap();
    let clients = svc.query_clients();
    assert_eq!(clients.len(), 2);
    assert!(clients.values().any(|c| c.is_master()));
}

#[tokio::test]
async fn master_sync_adopts_and_pulls_registry() {
    let gateway = Arc::new(ScriptedGateway {
        registries: HashMap::from([(node(1), master_registry(node(1)))]),
        ..Default::default()
    });
    let svc = service(cluster_config(3), Arc::clone(&gateway));

    // mid-vote on some earlier proposal
    let held = Vote::new(client_name("10.0.0.2", 9000), &node(2));
    svc.accept_vote(&held);
    assert!(svc.context().is_voting());

    // the winner pushes a vote that was issued earlier than the held one
    let mut winning = Vote::new(client_name("10.0.0.1", 9000), &node(1));
    winning.vote_time = held.vote_time - 10;
    assert!(svc.apply_master_sync(&winning).await.unwrap());

    assert!(!svc.context().is_voting());
    assert!(gateway.called("heartbeat", &node(1)));
    assert!(gateway.called("query", &node(1)));
    assert_eq!(svc.context().find_master().unwrap().node(), node(1));
}

#[tokio::test]
async fn master_sync_rejects_stale_vote() {
    let gateway = Arc::new(ScriptedGateway::default());
    let svc = service(cluster_config(3), Arc::clone(&gateway));

    let mut stale = Vote::new(client_name("10.0.0.1", 9000), &node(1));
    stale.vote_time = utils::now_millis() - 61_000;

    assert!(!svc.apply_master_sync(&stale).await.unwrap());
    // rejected before any peer traffic
    assert_eq!(gateway.call_count(), 0);
}

#[tokio::test]
async fn master_sync_rejects_superseded_vote() {
    let gateway = Arc::new(ScriptedGateway::default());
    let svc = service(cluster_config(3), Arc::clone(&gateway));

    let held = Vote::new(client_name("10.0.0.1", 9000), &node(1));
    svc.accept_vote(&held);

    let mut later = Vote::new(client_name("10.0.0.2", 9000), &node(2));
    later.vote_time = held.vote_time + 50;
    assert!(!svc.apply_master_sync(&later).await.unwrap());
    assert!(svc.context().is_voting());
}

// === worker cycles ===

#[tokio::test]
async fn heartbeat_cycle_skips_in_availability_mode() {
    let config = Config {
        mode: ConsistencyMode::Availability,
        ..cluster_config(1)
    };
    let gateway = Arc::new(ScriptedGateway::default());
    let svc = service(config, Arc::clone(&gateway));

    assert_eq!(svc.heartbeat_cycle(-1).await, -1);
    assert_eq!(gateway.call_count(), 0);
}

#[tokio::test]
async fn heartbeat_cycle_skips_while_voting() {
    let gateway = Arc::new(ScriptedGateway::default());
    let svc = service(cluster_config(1), Arc::clone(&gateway));
    svc.context().try_begin_voting();

    assert_eq!(svc.heartbeat_cycle(-1).await, -1);
    assert_eq!(gateway.call_count(), 0);
}

#[tokio::test]
async fn heartbeat_cycle_master_stamps_itself() {
    let gateway = Arc::new(ScriptedGateway::default());
    let svc = service(cluster_config(1), Arc::clone(&gateway));
    svc.context()
        .record_heartbeat("10.0.0.1", 9000, Some(Role::Master));

    let before = svc.context().self_entry().unwrap().heartbeat_time;
    tokio::time::sleep(Duration::from_millis(5)).await;

    let last_ok = svc.heartbeat_cycle(-1).await;
    assert!(last_ok > 0);
    assert!(svc.context().self_entry().unwrap().heartbeat_time >= before);
    // masters do not heartbeat outward
    assert_eq!(gateway.call_count(), 0);
}

#[tokio::test]
async fn heartbeat_cycle_slave_heartbeats_to_master() {
    let gateway = Arc::new(ScriptedGateway::default());
    let svc = service(cluster_config(2), Arc::clone(&gateway));
    svc.context()
        .record_heartbeat("10.0.0.1", 9000, Some(Role::Master));

    let last_ok = svc.heartbeat_cycle(-1).await;
    assert!(last_ok > 0);
    assert!(gateway.called("heartbeat", &node(1)));
}

#[tokio::test(start_paused = true)]
async fn heartbeat_cycle_elects_when_master_is_lost() {
    // no master known, last success long overdue: the cycle jitters, elects,
    // and wins with both peers accepting
    let gateway = Arc::new(ScriptedGateway {
        accept: HashMap::from([(node(2), true), (node(3), true)]),
        ..Default::default()
    });
    let svc = service(cluster_config(1), Arc::clone(&gateway));

    let last_ok = svc.heartbeat_cycle(-1).await;
    assert!(last_ok > 0);
    assert!(svc.context().is_self_master());
    assert!(gateway.called("vote", &node(2)));
    assert!(gateway.called("vote", &node(3)));
}

#[tokio::test(start_paused = true)]
async fn heartbeat_cycle_falls_back_when_election_fails() {
    // both peers decline, but one of them advertises a master to adopt
    let gateway = Arc::new(ScriptedGateway {
        registries: HashMap::from([(node(2), master_registry(node(2)))]),
        ..Default::default()
    });
    let svc = service(cluster_config(1), Arc::clone(&gateway));

    let last_ok = svc.heartbeat_cycle(-1).await;
    assert!(last_ok > 0);
    assert!(!svc.context().is_self_master());
    assert_eq!(svc.context().find_master().unwrap().node(), node(2));
}

#[tokio::test]
async fn refresh_cycle_pulls_from_master() {
    let gateway = Arc::new(ScriptedGateway {
        registries: HashMap::from([(node(1), master_registry(node(1)))]),
        ..Default::default()
    });
    let svc = service(cluster_config(2), Arc::clone(&gateway));
    svc.context()
        .record_heartbeat("10.0.0.1", 9000, Some(Role::Master));

    svc.refresh_cycle().await;
    assert!(gateway.called("query", &node(1)));
    // the local registry is replaced by the master's view
    assert_eq!(svc.context().client_count(), 1);
}

#[tokio::test]
async fn refresh_cycle_skips_master_and_voting() {
    let gateway = Arc::new(ScriptedGateway::default());
    let svc = service(cluster_config(1), Arc::clone(&gateway));

    // as master
    svc.context()
        .record_heartbeat("10.0.0.1", 9000, Some(Role::Master));
    svc.refresh_cycle().await;
    assert_eq!(gateway.call_count(), 0);

    // while voting
    let svc = service(cluster_config(2), Arc::clone(&gateway));
    svc.context().try_begin_voting();
    svc.refresh_cycle().await;
    assert_eq!(gateway.call_count(), 0);
}
