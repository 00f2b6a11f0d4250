use std::path::PathBuf;

use anyhow::anyhow;
use figment::{
    providers::{Env, Serialized},
    Figment,
};
use serde::{Deserialize, Serialize};

/// What to do with a record that does not decode as Ethernet/IPv4/TCP.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FramePolicy {
    /// Log the record and leave it out of every connection.
    #[default]
    Skip,
    /// Fail the whole pass with `CaptureError::UnsupportedFrame`.
    Abort,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub frame_policy: FramePolicy,
    /// Used when the binary is not handed a path.
    pub capture_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            frame_policy: FramePolicy::default(),
            capture_path: PathBuf::from(Self::DEFAULT_CAPTURE),
        }
    }
}

impl Config {
    /// `CONN_TRACKER_FRAME_POLICY` and `CONN_TRACKER_CAPTURE_PATH` override
    /// the defaults.
    pub const ENV_PREFIX: &'static str = "CONN_TRACKER_";
    pub const DEFAULT_CAPTURE: &'static str = "sample-capture-file.cap";

    pub fn figment() -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Env::prefixed(Self::ENV_PREFIX))
    }

    pub fn from_env() -> anyhow::Result<Self> {
        Self::figment()
            .extract()
            .map_err(|e| anyhow!("failed to load configuration: {e}"))
    }
}
