// Viewer configuration: command line first, environment as fallback.

use crate::error::Result;
use crate::peer::ice::validate_servers;
use crate::peer::state::{DEFAULT_GATHER_TIMEOUT, DEFAULT_REQUEST_TIMEOUT};
use crate::peer::types::{ServerConfig, SessionConfig};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug, Clone)]
#[command(name = "whep-viewer", version, about = "Receive a live stream from a WHEP endpoint")]
pub struct ViewerConfig {
    /// WHEP endpoint to POST the offer to
    #[arg(env = "WHEP_URL")]
    pub whep_url: String,

    /// Bearer token for the endpoint
    #[arg(long, env = "WHEP_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// HTTP request timeout in milliseconds
    #[arg(long, default_value_t = DEFAULT_REQUEST_TIMEOUT.as_millis() as u64)]
    pub timeout_ms: u64,

    /// How long to wait for ICE gathering before posting the offer
    #[arg(long, default_value_t = DEFAULT_GATHER_TIMEOUT.as_millis() as u64)]
    pub gather_timeout_ms: u64,

    /// JSON file with a list of ICE servers ({id, type, url, username, credential})
    #[arg(long, value_name = "FILE")]
    pub ice_servers: Option<PathBuf>,

    /// Extra STUN server URL, may be repeated
    #[arg(long = "stun", value_name = "URL")]
    pub stun: Vec<String>,

    /// Only gather host candidates
    #[arg(long, conflicts_with_all = ["ice_servers", "stun"])]
    pub no_ice_servers: bool,

    /// Default log filter when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl ViewerConfig {
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            whep_url: self.whep_url.clone(),
            auth_token: self.token.clone(),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn gather_timeout(&self) -> Duration {
        Duration::from_millis(self.gather_timeout_ms)
    }

    /// Resolves the ICE server list. `None` means "use the defaults".
    pub fn load_ice_servers(&self) -> Result<Option<Vec<ServerConfig>>> {
        if self.no_ice_servers {
            return Ok(Some(Vec::new()));
        }

        let mut servers = match &self.ice_servers {
            Some(path) => {
                let raw = std::fs::read_to_string(path)?;
                serde_json::from_str::<Vec<ServerConfig>>(&raw)?
            }
            None => Vec::new(),
        };

        servers.extend(self.stun.iter().enumerate().map(|(i, url)| ServerConfig {
            id: format!("cli-stun-{i}"),
            r#type: "stun".into(),
            url: url.clone(),
            username: None,
            credential: None,
        }));

        if servers.is_empty() {
            return Ok(None);
        }
        validate_servers(&servers)?;
        Ok(Some(servers))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use std::io::Write;

    fn parse(args: &[&str]) -> ViewerConfig {
        let mut argv = vec!["whep-viewer"];
        argv.extend_from_slice(args);
        ViewerConfig::try_parse_from(argv).unwrap()
    }

    #[test]
    fn defaults_apply() {
        let cfg = parse(&["https://edge.example/whep/room1"]);
        assert_eq!(cfg.request_timeout(), DEFAULT_REQUEST_TIMEOUT);
        assert_eq!(cfg.gather_timeout(), DEFAULT_GATHER_TIMEOUT);
        assert_eq!(cfg.log_level, "info");
        assert_eq!(
            cfg.session_config(),
            SessionConfig::new("https://edge.example/whep/room1")
        );
        assert_eq!(cfg.load_ice_servers().unwrap(), None);
    }

    #[test]
    fn token_reaches_session_config() {
        let cfg = parse(&["--token", "abc", "https://edge.example/whep/room1"]);
        assert_eq!(cfg.session_config().auth_token.as_deref(), Some("abc"));
    }

    #[test]
    fn stun_flags_become_servers() {
        let cfg = parse(&[
            "--stun",
            "stun.example:3478",
            "--stun",
            "stun:other.example",
            "https://edge.example/whep",
        ]);
        let servers = cfg.load_ice_servers().unwrap().unwrap();
        assert_eq!(servers.len(), 2);
        assert_eq!(servers[1].url, "stun:other.example");
    }

    #[test]
    fn host_only_yields_empty_list() {
        let cfg = parse(&["--no-ice-servers", "https://edge.example/whep"]);
        assert_eq!(cfg.load_ice_servers().unwrap(), Some(Vec::new()));
    }

    #[test]
    fn ice_server_file_is_validated() {
        let mut path = std::env::temp_dir();
        path.push(format!("whep-viewer-ice-{}.json", crate::utils::random_id()));
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(br#"[{"id":"t","type":"turn","url":"relay.example:3478"}]"#)
            .unwrap();

        let cfg = parse(&[
            "--ice-servers",
            path.to_str().unwrap(),
            "https://edge.example/whep",
        ]);
        let err = cfg.load_ice_servers().unwrap_err();
        std::fs::remove_file(&path).unwrap();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn missing_file_is_io_error() {
        let cfg = parse(&[
            "--ice-servers",
            "/nonexistent/whep-viewer/ice.json",
            "https://edge.example/whep",
        ]);
        assert!(matches!(cfg.load_ice_servers(), Err(Error::Io(_))));
    }
}
