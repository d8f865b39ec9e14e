//! Admin listener and simulated clock settings.

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct AdminConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::LOCALHOST)
}

fn default_port() -> u16 {
    4010
}

impl AdminConfig {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct ClockConfig {
    /// Retry waits advance simulated time instead of sleeping.
    #[serde(default)]
    pub virtual_sleep: bool,
    /// Allow `advance` with a negative duration.
    #[serde(default)]
    pub allow_rewind: bool,
}
