use std::net::IpAddr;

use log::warn;
use tokio::net::UdpSocket;

/// Any routable address works; connecting a UDP socket sends nothing.
const PROBE_ADDR: &str = "10.255.255.255:1";

/// The address other machines on the lighting network should send to.
pub async fn local_ip_address() -> Option<IpAddr> {
    match route_source_address().await {
        Ok(ip) if !ip.is_unspecified() => return Some(ip),
        Ok(_) => {}
        Err(e) => warn!("failed to find source address: {e}"),
    }

    let output = tokio::process::Command::new("ip")
        .args(["-4", "addr", "show", "scope", "global"])
        .output()
        .await
        .inspect_err(|e| warn!("failed to run ip: {e}"))
        .ok()?;
    parse_inet(&String::from_utf8_lossy(&output.stdout))
}

async fn route_source_address() -> std::io::Result<IpAddr> {
    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    socket.connect(PROBE_ADDR).await?;
    Ok(socket.local_addr()?.ip())
}

fn parse_inet(ip_addr_output: &str) -> Option<IpAddr> {
    ip_addr_output.lines().find_map(|line| {
        line.trim()
            .strip_prefix("inet ")
            .and_then(|rest| rest.split('/').next())
            .and_then(|s| s.parse().ok())
    })
}

pub fn display_ip(ip: Option<IpAddr>) -> String {
    ip.map(|ip| ip.to_string())
        .unwrap_or_else(|| "no network".to_string())
}
