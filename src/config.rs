use thiserror::Error;

/// Longest a staged upload may wait for its caption (one year)
pub const MAX_DRAFT_TTL_SECONDS: u64 = 365 * 24 * 60 * 60;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub cluster: ClusterConfig,
    pub node: NodeConfig,
    pub media: MediaConfig,
    pub social: SocialConfig,
    /// Enables dangerous operations like purge. Must never be true in production.
    pub test_mode: bool,
    /// Maximum upload size in bytes
    pub max_upload_size: u64,
}

#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub bind_address: String,
    pub data_dir: String,
    pub id: String,
}

#[derive(Debug, Clone)]
pub struct ClusterConfig {
    /// TCP port for inter-node cluster communication
    pub cluster_port: u16,
    pub discovery: DiscoveryConfig,
    pub election_timeout_ms: u64,
    pub heartbeat_interval_ms: u64,
    pub peers: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// DNS name to resolve for peer discovery (e.g., a Kubernetes headless service).
    pub dns_name: Option<String>,
    /// How often to poll for peer changes (seconds)
    pub poll_interval_seconds: u64,
}

#[derive(Debug, Clone)]
pub enum MediaBackend {
    Gcs,
    Local,
}

#[derive(Debug, Clone)]
pub struct MediaConfig {
    pub backend: MediaBackend,
    /// Directory for local media backend
    pub local_media_path: String,
    /// Prefix of locators handed out by the local backend
    pub public_url: String,
    /// GCS bucket name (required when backend is gcs)
    pub gcs_bucket: Option<String>,
    /// Path to GCS service account JSON (optional, defaults to ADC)
    pub gcs_credentials_file: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SocialConfig {
    /// How long a staged upload waits for its caption
    pub draft_ttl_seconds: u64,
    /// Interval of the draft / orphaned media sweeper
    pub sweep_interval_seconds: u64,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            dns_name: None,
            poll_interval_seconds: 5,
        }
    }
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            cluster_port: 9993,
            discovery: DiscoveryConfig::default(),
            election_timeout_ms: 3000,
            heartbeat_interval_ms: 300,
            peers: Vec::new(),
        }
    }
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            backend: MediaBackend::Local,
            local_media_path: "./media".to_string(),
            public_url: "/media".to_string(),
            gcs_bucket: None,
            gcs_credentials_file: None,
        }
    }
}

impl Default for SocialConfig {
    fn default() -> Self {
        Self {
            draft_ttl_seconds: 3600,
            sweep_interval_seconds: 60,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let node_id = std::env::var("NODE_ID").unwrap_or_else(|_| uuid::Uuid::new_v4().to_string());

        let bind_address =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

        let data_dir = std::env::var("DATA_DIR").unwrap_or_else(|_| "./data".to_string());

        let peers: Vec<String> = std::env::var("PEERS")
            .map(|p| {
                p.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .filter(|s| !s.starts_with(&format!("{node_id}:")) && s != &node_id)
                    .collect()
            })
            .unwrap_or_default();

        let dns_name = std::env::var("DISCOVERY_DNS_NAME").ok();
        let poll_interval = std::env::var("DISCOVERY_POLL_INTERVAL")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(5);

        let cluster_port = std::env::var("CLUSTER_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(9993);

        let test_mode = std::env::var("TEST_MODE")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);

        let max_upload_size = std::env::var("MAX_UPLOAD_SIZE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(10 * 1024 * 1024); // 10MB

        let media_backend = match std::env::var("MEDIA_BACKEND")
            .unwrap_or_else(|_| "local".to_string())
            .to_lowercase()
            .as_str()
        {
            "gcs" => MediaBackend::Gcs,
            _ => MediaBackend::Local,
        };

        let local_media_path =
            std::env::var("LOCAL_MEDIA_PATH").unwrap_or_else(|_| "./media".to_string());
        let public_url = std::env::var("MEDIA_PUBLIC_URL").unwrap_or_else(|_| "/media".to_string());

        let draft_ttl_seconds = std::env::var("DRAFT_TTL_SECONDS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(3600);
        let sweep_interval_seconds = std::env::var("SWEEP_INTERVAL_SECONDS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(60);

        let gcs_bucket = std::env::var("GCS_BUCKET").ok();
        let gcs_credentials_file = std::env::var("GCS_CREDENTIALS_FILE").ok();

        let config = Config {
            node: NodeConfig {
                id: node_id,
                bind_address,
                data_dir,
            },
            cluster: ClusterConfig {
                cluster_port,
                peers,
                discovery: DiscoveryConfig {
                    dns_name,
                    poll_interval_seconds: poll_interval,
                },
                ..Default::default()
            },
            media: MediaConfig {
                backend: media_backend,
                local_media_path,
                public_url,
                gcs_bucket,
                gcs_credentials_file,
            },
            social: SocialConfig {
                draft_ttl_seconds,
                sweep_interval_seconds,
            },
            test_mode,
            max_upload_size,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.node.id.is_empty() {
            return Err(ConfigError::ValidationError(
                "NODE_ID cannot be empty".to_string(),
            ));
        }

        if matches!(self.media.backend, MediaBackend::Gcs) && self.media.gcs_bucket.is_none() {
            return Err(ConfigError::ValidationError(
                "GCS_BUCKET is required when MEDIA_BACKEND=gcs".to_string(),
            ));
        }

        if self.social.draft_ttl_seconds == 0 {
            return Err(ConfigError::ValidationError(
                "DRAFT_TTL_SECONDS must be greater than 0".to_string(),
            ));
        }

        if self.social.draft_ttl_seconds > MAX_DRAFT_TTL_SECONDS {
            return Err(ConfigError::ValidationError(format!(
                "DRAFT_TTL_SECONDS must be at most {MAX_DRAFT_TTL_SECONDS}"
            )));
        }

        if self.social.sweep_interval_seconds == 0 {
            return Err(ConfigError::ValidationError(
                "SWEEP_INTERVAL_SECONDS must be greater than 0".to_string(),
            ));
        }

        let cluster_size = self.cluster.peers.len() + 1;
        if cluster_size > 1 && cluster_size.is_multiple_of(2) {
            tracing::warn!(
                "Cluster size {} is even. This may lead to split-brain scenarios. \
                 Consider using an odd number of nodes.",
                cluster_size
            );
        }

        Ok(())
    }

    /// Check if running in single-node mode.
    pub fn is_single_node(&self) -> bool {
        self.cluster.peers.is_empty() && self.cluster.discovery.dns_name.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config {
            cluster: ClusterConfig::default(),
            node: NodeConfig {
                bind_address: "127.0.0.1:0".to_string(),
                data_dir: "./data".to_string(),
                id: "node-1".to_string(),
            },
            media: MediaConfig::default(),
            social: SocialConfig::default(),
            test_mode: true,
            max_upload_size: 1024,
        }
    }

    #[test]
    fn default_config_is_valid_single_node() {
        let config = config();
        assert!(config.validate().is_ok());
        assert!(config.is_single_node());
    }

    #[test]
    fn gcs_backend_requires_bucket() {
        let mut config = config();
        config.media.backend = MediaBackend::Gcs;
        assert!(config.validate().is_err());

        config.media.gcs_bucket = Some("photos".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_draft_ttl_is_rejected() {
        let mut config = config();
        config.social.draft_ttl_seconds = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn draft_ttl_is_capped() {
        let mut config = config();
        config.social.draft_ttl_seconds = MAX_DRAFT_TTL_SECONDS;
        assert!(config.validate().is_ok());

        config.social.draft_ttl_seconds = MAX_DRAFT_TTL_SECONDS + 1;
        assert!(config.validate().is_err());

        config.social.draft_ttl_seconds = u64::MAX;
        assert!(config.validate().is_err());
    }
}
