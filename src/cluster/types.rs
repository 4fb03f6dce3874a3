//! Wire and registry types for the cluster protocol.
//!
//! Field names serialize in camelCase; this is the shape peers exchange and
//! the CLI prints, so the structs here double as the RPC contract.

use crate::common::{utils, Node};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Role a registered client holds in the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Master,
    Slave,
}

impl Role {
    pub fn is_master(self) -> bool {
        self == Role::Master
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Master => write!(f, "MASTER"),
            Role::Slave => write!(f, "SLAVE"),
        }
    }
}

/// Registry key for a client endpoint.
pub fn client_name(ip: &str, port: u16) -> String {
    format!("client_{}_{}", ip, port)
}

/// A registered, heartbeating participant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    pub client_name: String,
    pub ip: String,
    pub port: u16,
    pub role: Role,
    /// Last-seen unix millis, -1 if never
    #[serde(default = "never")]
    pub heartbeat_time: i64,
}

fn never() -> i64 {
    -1
}

impl ClientConfig {
    pub fn new(ip: impl Into<String>, port: u16, role: Role) -> Self {
        let ip = ip.into();
        Self {
            client_name: client_name(&ip, port),
            ip,
            port,
            role,
            heartbeat_time: -1,
        }
    }

    pub fn node(&self) -> Node {
        Node::new(self.ip.clone(), self.port)
    }

    pub fn is_master(&self) -> bool {
        self.role.is_master()
    }

    pub fn is_timeout(&self, threshold_ms: i64, now: i64) -> bool {
        now - self.heartbeat_time > threshold_ms
    }
}

/// A proposal for a specific node to become master. Immutable once created;
/// identity by `vote_id`, tie-break by `vote_time`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vote {
    pub vote_id: String,
    pub begin_client_name: String,
    pub vote_time: i64,
    pub ip: String,
    pub port: u16,
}

impl Vote {
    /// New proposal naming `node` as the master candidate, stamped now.
    pub fn new(begin_client_name: impl Into<String>, node: &Node) -> Self {
        Self {
            vote_id: uuid::Uuid::new_v4().simple().to_string(),
            begin_client_name: begin_client_name.into(),
            vote_time: utils::now_millis(),
            ip: node.ip.clone(),
            port: node.port,
        }
    }

    pub fn node(&self) -> Node {
        Node::new(self.ip.clone(), self.port)
    }

    pub fn is_expired(&self, timeout_ms: u64, now: i64) -> bool {
        now - self.vote_time > timeout_ms as i64
    }
}

/// Heartbeat RPC payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Heartbeat {
    pub cluster: String,
    pub group_code: String,
    pub client_config: ClientInfo,
}

/// Endpoint identity carried inside a heartbeat. A missing role means the
/// sender registers as SLAVE.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientInfo {
    pub ip: String,
    pub port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
}

/// Registry query payload; carries nothing today but keeps the POST body
/// extensible.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryClients {}

/// Uniform RPC response envelope. A `success=false` reply must be treated as
/// a failed call by every consumer, never as empty data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reply<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<i32>,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> Reply<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            code: None,
            message: "success".to_string(),
            data: Some(data),
        }
    }

    pub fn ok_with(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            code: None,
            message: message.into(),
            data: Some(data),
        }
    }

    pub fn ok_empty() -> Self {
        Self {
            success: true,
            code: None,
            message: "success".to_string(),
            data: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            code: None,
            message: message.into(),
            data: None,
        }
    }
}
