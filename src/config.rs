use std::fmt;
use std::time::Duration;

pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(30);
pub const DEFAULT_SPILL_THRESHOLD: u64 = 100 * 1024 * 1024;

#[derive(Clone)]
pub struct MountConfig {
    pub account_name: String,
    pub account_key: String,
    pub container: String,
    pub subfolder: Option<String>,
    pub mount_point: String,
    pub read_only: bool,
    pub cache_ttl: Duration,
    pub spill_threshold: u64,
}

impl MountConfig {
    pub fn new(
        account_name: impl Into<String>,
        account_key: impl Into<String>,
        container: impl Into<String>,
        mount_point: impl Into<String>,
    ) -> Self {
        Self {
            account_name: account_name.into(),
            account_key: account_key.into(),
            container: container.into(),
            subfolder: None,
            mount_point: mount_point.into(),
            read_only: false,
            cache_ttl: DEFAULT_CACHE_TTL,
            spill_threshold: DEFAULT_SPILL_THRESHOLD,
        }
    }

    pub fn with_subfolder(mut self, subfolder: impl Into<String>) -> Self {
        self.subfolder = Some(subfolder.into());
        self
    }

    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }
}

impl fmt::Debug for MountConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MountConfig")
            .field("account_name", &self.account_name)
            .field("account_key", &"<redacted>")
            .field("container", &self.container)
            .field("subfolder", &self.subfolder)
            .field("mount_point", &self.mount_point)
            .field("read_only", &self.read_only)
            .field("cache_ttl", &self.cache_ttl)
            .field("spill_threshold", &self.spill_threshold)
            .finish()
    }
}
