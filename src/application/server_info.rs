//! Addresses the browsing UI can use to reach this server on the local network.

use std::net::IpAddr;

use if_addrs::get_if_addrs;
use perpus_api_types::ServerInfoResponse;
use tracing::warn;

/// Non-internal IPv4 addresses of every interface.
///
/// Enumeration failures yield an empty list.
pub fn server_info() -> ServerInfoResponse {
    let addresses = match get_if_addrs() {
        Ok(interfaces) => interfaces
            .into_iter()
            .filter(|interface| !interface.is_loopback())
            .map(|interface| interface.ip())
            .collect(),
        Err(err) => {
            warn!(error = %err, "failed to enumerate network interfaces");
            Vec::new()
        }
    };

    ServerInfoResponse {
        server_ips: external_ipv4(addresses),
    }
}

fn external_ipv4(addresses: impl IntoIterator<Item = IpAddr>) -> Vec<String> {
    let mut ips: Vec<String> = addresses
        .into_iter()
        .filter_map(|addr| match addr {
            IpAddr::V4(v4) if !v4.is_loopback() && !v4.is_unspecified() => Some(v4.to_string()),
            _ => None,
        })
        .collect();
    ips.dedup();
    ips
}
