use std::fs::File;
use std::io::Read;
use std::path::Path;

use failure::ResultExt;
use serde::Deserialize;
use serde::Serialize;

use crate::error::ErrorKind;
use crate::Result;

/// Zookeeper session configuration options.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Zookeeper ensemble connection string (comma-separated host:port list).
    #[serde(default = "Config::default_ensemble")]
    pub ensemble: String,

    /// Zookeeper session timeout (in seconds).
    #[serde(default = "Config::default_timeout")]
    pub timeout: u64,

    /// Deadline for operations waiting on the initial connection (in seconds).
    ///
    /// Set to null to wait indefinitely.
    #[serde(default = "Config::default_connect_timeout")]
    pub connect_timeout: Option<u64>,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            ensemble: Config::default_ensemble(),
            timeout: Config::default_timeout(),
            connect_timeout: Config::default_connect_timeout(),
        }
    }
}

impl Config {
    fn default_ensemble() -> String {
        "localhost:2181".into()
    }

    fn default_timeout() -> u64 {
        15
    }

    fn default_connect_timeout() -> Option<u64> {
        Some(30)
    }
}

impl Config {
    /// Loads the configuration from the given file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Config> {
        let location = path.as_ref().display().to_string();
        let config = File::open(path).with_context(|_| ErrorKind::ConfigLoad(location))?;
        Config::from_reader(config)
    }

    /// Loads the configuration from the given [`std::io::Read`].
    pub fn from_reader<R: Read>(reader: R) -> Result<Config> {
        let config = serde_yaml::from_reader(reader)
            .with_context(|_| ErrorKind::Decode("configuration"))?;
        Ok(config)
    }
}
