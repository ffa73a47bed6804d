//! Connection configuration types.

use std::time::Duration;

use mailtree_sasl::Mechanism;

use crate::pipeline::{DEFAULT_LITERAL_THRESHOLD, DEFAULT_MAX_DEPTH, MAX_PIPELINE_DEPTH, PipelineConfig};
use crate::types::Capabilities;

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(60);

/// Servers may drop an idle client after 30 minutes (RFC 2177).
const DEFAULT_IDLE_WATCHDOG: Duration = Duration::from_secs(29 * 60);

/// Connection security mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Security {
    /// No encryption (port 143). **Not recommended for production.**
    None,
    /// Start with plaintext, upgrade with STARTTLS (port 143).
    StartTls,
    /// TLS from the start (port 993). **Recommended.**
    #[default]
    Implicit,
}

impl Security {
    /// Returns the default port for this security mode.
    #[must_use]
    pub const fn default_port(self) -> u16 {
        match self {
            Self::None | Self::StartTls => 143,
            Self::Implicit => 993,
        }
    }
}

/// When more than one command may be in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PipelineMode {
    /// Pipeline once the server advertises `IMAP4rev1` or `IMAP4rev2`.
    #[default]
    Auto,
    /// Always pipeline.
    Enabled,
    /// One command at a time.
    Disabled,
}

impl PipelineMode {
    /// Resolves the mode against the advertised capabilities.
    #[must_use]
    pub fn is_active(self, capabilities: &Capabilities) -> bool {
        match self {
            Self::Auto => capabilities.is_imap4(),
            Self::Enabled => true,
            Self::Disabled => false,
        }
    }
}

/// IMAP connection configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server hostname.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Security mode.
    pub security: Security,
    /// Connection timeout, greeting included.
    pub connect_timeout: Duration,
    /// Read/write timeout for a single command.
    pub io_timeout: Duration,
    /// IDLE is ended with `DONE` after this long.
    pub idle_watchdog: Duration,
    /// Strings longer than this are sent as literals.
    pub literal_threshold: usize,
    /// Whether more than one command may be in flight.
    pub pipelining: PipelineMode,
    /// Commands in flight at most when pipelining.
    pub max_pipeline_depth: usize,
    /// Mechanism preference. Empty means the defaults for the credential
    /// kind.
    pub auth_mechanisms: Vec<Mechanism>,
    /// Try the next mechanism after a rejection.
    pub allow_auth_fallback: bool,
    /// Letter command tags start with.
    pub tag_prefix: char,
}

impl Config {
    /// Creates a new configuration with implicit TLS on port 993.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        ConfigBuilder::new(host).build()
    }

    /// Creates a configuration builder.
    #[must_use]
    pub fn builder(host: impl Into<String>) -> ConfigBuilder {
        ConfigBuilder::new(host)
    }

    pub(crate) fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig::new()
            .max_depth(self.max_pipeline_depth)
            .enabled(self.pipelining == PipelineMode::Enabled)
            .tag_prefix(self.tag_prefix)
            .literal_threshold(self.literal_threshold)
    }
}

/// Builder for connection configuration.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    host: String,
    port: Option<u16>,
    security: Security,
    connect_timeout: Duration,
    io_timeout: Duration,
    idle_watchdog: Duration,
    literal_threshold: usize,
    pipelining: PipelineMode,
    max_pipeline_depth: usize,
    auth_mechanisms: Vec<Mechanism>,
    allow_auth_fallback: bool,
    tag_prefix: char,
}

impl ConfigBuilder {
    /// Creates a new builder with the given hostname.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: None,
            security: Security::Implicit,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            io_timeout: DEFAULT_IO_TIMEOUT,
            idle_watchdog: DEFAULT_IDLE_WATCHDOG,
            literal_threshold: DEFAULT_LITERAL_THRESHOLD,
            pipelining: PipelineMode::Auto,
            max_pipeline_depth: DEFAULT_MAX_DEPTH,
            auth_mechanisms: Vec::new(),
            allow_auth_fallback: false,
            tag_prefix: 'A',
        }
    }

    /// Sets the port.
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Sets the security mode.
    #[must_use]
    pub const fn security(mut self, security: Security) -> Self {
        self.security = security;
        self
    }

    /// Sets the connection timeout.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the I/O timeout.
    #[must_use]
    pub const fn io_timeout(mut self, timeout: Duration) -> Self {
        self.io_timeout = timeout;
        self
    }

    /// Sets how long IDLE runs before the client re-issues it.
    #[must_use]
    pub const fn idle_watchdog(mut self, timeout: Duration) -> Self {
        self.idle_watchdog = timeout;
        self
    }

    /// Sets the size above which strings are sent as literals.
    #[must_use]
    pub const fn literal_threshold(mut self, bytes: usize) -> Self {
        self.literal_threshold = bytes;
        self
    }

    /// Sets whether commands may be pipelined.
    #[must_use]
    pub const fn pipelining(mut self, mode: PipelineMode) -> Self {
        self.pipelining = mode;
        self
    }

    /// Sets the pipeline depth, clamped to `1..=16`.
    #[must_use]
    pub fn max_pipeline_depth(mut self, depth: usize) -> Self {
        self.max_pipeline_depth = depth.clamp(1, MAX_PIPELINE_DEPTH);
        self
    }

    /// Sets the mechanism preference order.
    #[must_use]
    pub fn auth_mechanisms(mut self, mechanisms: impl IntoIterator<Item = Mechanism>) -> Self {
        self.auth_mechanisms = mechanisms.into_iter().collect();
        self
    }

    /// Sets whether a rejected mechanism falls through to the next one.
    #[must_use]
    pub const fn allow_auth_fallback(mut self, allow: bool) -> Self {
        self.allow_auth_fallback = allow;
        self
    }

    /// Sets the letter command tags start with.
    #[must_use]
    pub const fn tag_prefix(mut self, prefix: char) -> Self {
        self.tag_prefix = prefix;
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> Config {
        Config {
            host: self.host,
            port: self.port.unwrap_or_else(|| self.security.default_port()),
            security: self.security,
            connect_timeout: self.connect_timeout,
            io_timeout: self.io_timeout,
            idle_watchdog: self.idle_watchdog,
            literal_threshold: self.literal_threshold,
            pipelining: self.pipelining,
            max_pipeline_depth: self.max_pipeline_depth,
            auth_mechanisms: self.auth_mechanisms,
            allow_auth_fallback: self.allow_auth_fallback,
            tag_prefix: self.tag_prefix,
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;
    use crate::types::Capability;

    #[test]
    fn test_default_ports() {
        assert_eq!(Security::None.default_port(), 143);
        assert_eq!(Security::StartTls.default_port(), 143);
        assert_eq!(Security::Implicit.default_port(), 993);
    }

    #[test]
    fn test_config_defaults() {
        let config = Config::new("imap.example.com");
        assert_eq!(config.host, "imap.example.com");
        assert_eq!(config.port, 993);
        assert_eq!(config.security, Security::Implicit);
        assert_eq!(config.connect_timeout, Duration::from_secs(30));
        assert_eq!(config.io_timeout, Duration::from_secs(60));
        assert_eq!(config.idle_watchdog, Duration::from_secs(29 * 60));
        assert_eq!(config.literal_threshold, 1024);
        assert_eq!(config.pipelining, PipelineMode::Auto);
        assert_eq!(config.max_pipeline_depth, 4);
        assert!(config.auth_mechanisms.is_empty());
        assert!(!config.allow_auth_fallback);
        assert_eq!(config.tag_prefix, 'A');
    }

    #[test]
    fn test_config_builder() {
        let config = Config::builder("imap.example.com")
            .security(Security::StartTls)
            .connect_timeout(Duration::from_secs(10))
            .max_pipeline_depth(64)
            .auth_mechanisms([Mechanism::Login])
            .allow_auth_fallback(true)
            .build();

        assert_eq!(config.port, 143);
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.max_pipeline_depth, MAX_PIPELINE_DEPTH);
        assert_eq!(config.auth_mechanisms, vec![Mechanism::Login]);
        assert!(config.allow_auth_fallback);
    }

    #[test]
    fn test_pipeline_mode() {
        let rev1: Capabilities = [Capability::Imap4Rev1].into_iter().collect();
        let none = Capabilities::default();
        assert!(PipelineMode::Auto.is_active(&rev1));
        assert!(!PipelineMode::Auto.is_active(&none));
        assert!(PipelineMode::Enabled.is_active(&none));
        assert!(!PipelineMode::Disabled.is_active(&rev1));
    }
}
