use crate::error::{Error, Result};
use crate::peer::types::ServerConfig;
use crate::utils::add_ice_url_scheme;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::policy::bundle_policy::RTCBundlePolicy;
use webrtc::peer_connection::policy::rtcp_mux_policy::RTCRtcpMuxPolicy;
use webrtc::peer_connection::RTCPeerConnection;

/// STUN servers used when the user configured none.
pub const DEFAULT_STUN_URLS: [&str; 2] = [
    "stun:stun.l.google.com:19302",
    "stun:stun1.l.google.com:19302",
];

/// Builds the peer connection configuration.
///
/// `None` selects the default STUN servers; `Some(vec![])` disables ICE
/// servers entirely (host candidates only).
pub fn rtc_config(custom_servers: Option<&[ServerConfig]>) -> RTCConfiguration {
    let ice_servers = match custom_servers {
        Some(servers) => get_user_ice_servers(servers),
        None => vec![RTCIceServer {
            urls: DEFAULT_STUN_URLS.iter().map(|u| u.to_string()).collect(),
            ..Default::default()
        }],
    };

    RTCConfiguration {
        ice_servers,
        bundle_policy: RTCBundlePolicy::MaxBundle,
        rtcp_mux_policy: RTCRtcpMuxPolicy::Require,
        ..Default::default()
    }
}

/// Получение ICE серверов из пользовательской конфигурации
pub fn get_user_ice_servers(servers: &[ServerConfig]) -> Vec<RTCIceServer> {
    servers
        .iter()
        .map(|config| RTCIceServer {
            urls: vec![add_ice_url_scheme(config)],
            username: config.username.clone().unwrap_or_default(),
            credential: config.credential.clone().unwrap_or_default(),
        })
        .collect()
}

/// Rejects entries the ICE agent would fail on later.
pub fn validate_servers(servers: &[ServerConfig]) -> Result<()> {
    for server in servers {
        if server.url.is_empty() {
            return Err(Error::config(format!(
                "ICE server '{}' has an empty URL",
                server.id
            )));
        }

        // TURN без учетных данных агент отвергнет позже
        if server.r#type == "turn" && (server.username.is_none() || server.credential.is_none()) {
            return Err(Error::config(format!(
                "TURN server '{}' requires username and credential",
                server.id
            )));
        }
    }
    Ok(())
}

/// Waits for ICE gathering to finish, giving up after `limit`.
///
/// The receiver must be taken from `gathering_complete_promise` before the
/// local description is set, otherwise the completion can be missed.
pub async fn wait_for_gathering(mut done: tokio::sync::mpsc::Receiver<()>, limit: Duration) -> bool {
    match timeout(limit, done.recv()).await {
        Ok(_) => {
            debug!("ICE gathering complete");
            true
        }
        Err(_) => {
            warn!(
                timeout_ms = limit.as_millis() as u64,
                "ICE gathering did not complete, posting partial offer"
            );
            false
        }
    }
}

/// Candidate counts by type found in an SDP.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CandidateSummary {
    pub host: usize,
    pub srflx: usize,
    pub relay: usize,
}

impl CandidateSummary {
    pub fn total(&self) -> usize {
        self.host + self.srflx + self.relay
    }
}

pub fn analyze_candidates(sdp: &str) -> CandidateSummary {
    let mut summary = CandidateSummary::default();

    for line in sdp.lines().filter(|l| l.starts_with("a=candidate:")) {
        if line.contains("typ host") {
            summary.host += 1;
        } else if line.contains("typ srflx") {
            summary.srflx += 1;
        } else if line.contains("typ relay") {
            summary.relay += 1;
        }
    }

    info!(
        host = summary.host,
        srflx = summary.srflx,
        relay = summary.relay,
        "Candidate analysis"
    );

    if summary.relay == 0 {
        debug!("No TURN relay candidates; connection through symmetric NAT may fail");
    }
    summary
}

/// Snapshot of the nominated candidate pair, logged when a session fails.
pub async fn dump_selected_pair(pc: &Arc<RTCPeerConnection>, moment: &str) {
    let stats = pc.get_stats().await;
    for (_, report) in stats.reports {
        if let webrtc::stats::StatsReportType::CandidatePair(pair) = report {
            if pair.nominated {
                info!(
                    "STATS {moment}: {}:{} bytes={}/{} state={:?}",
                    pair.local_candidate_id,
                    pair.remote_candidate_id,
                    pair.bytes_sent,
                    pair.bytes_received,
                    pair.state
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server(kind: &str, url: &str, creds: bool) -> ServerConfig {
        ServerConfig {
            id: format!("{kind}-1"),
            r#type: kind.into(),
            url: url.into(),
            username: creds.then(|| "user".to_string()),
            credential: creds.then(|| "secret".to_string()),
        }
    }

    #[test]
    fn default_config_uses_google_stun() {
        let config = rtc_config(None);
        assert_eq!(config.ice_servers.len(), 1);
        assert_eq!(config.ice_servers[0].urls.len(), 2);
        assert_eq!(config.bundle_policy, RTCBundlePolicy::MaxBundle);
    }

    #[test]
    fn empty_server_list_disables_ice_servers() {
        assert!(rtc_config(Some(&[])).ice_servers.is_empty());
    }

    #[test]
    fn user_servers_keep_credentials() {
        let servers = [server("turn", "relay.example:3478", true)];
        let ice = get_user_ice_servers(&servers);
        assert_eq!(ice[0].urls, vec!["turn:relay.example:3478".to_string()]);
        assert_eq!(ice[0].username, "user");
        assert_eq!(ice[0].credential, "secret");
    }

    #[test]
    fn turn_without_credentials_is_rejected() {
        assert!(validate_servers(&[server("stun", "stun.example", false)]).is_ok());
        assert!(matches!(
            validate_servers(&[server("turn", "relay.example", false)]),
            Err(Error::Config(_))
        ));
        assert!(validate_servers(&[server("stun", "", false)]).is_err());
    }

    #[test]
    fn candidates_are_counted_by_type() {
        let sdp = "v=0\r\n\
            a=candidate:1 1 udp 2130706431 192.168.1.2 50000 typ host\r\n\
            a=candidate:2 1 udp 1694498815 203.0.113.5 50001 typ srflx raddr 0.0.0.0 rport 0\r\n\
            a=candidate:3 1 udp 2130706431 192.168.1.3 50002 typ host\r\n";
        let summary = analyze_candidates(sdp);
        assert_eq!(
            summary,
            CandidateSummary {
                host: 2,
                srflx: 1,
                relay: 0
            }
        );
        assert_eq!(summary.total(), 3);
    }

    #[tokio::test]
    async fn gathering_wait_times_out() {
        let (_tx, rx) = tokio::sync::mpsc::channel::<()>(1);
        assert!(!wait_for_gathering(rx, Duration::from_millis(10)).await);

        let (tx, rx) = tokio::sync::mpsc::channel::<()>(1);
        drop(tx);
        assert!(wait_for_gathering(rx, Duration::from_millis(10)).await);
    }
}
