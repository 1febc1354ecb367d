use std::time::Duration;

use crate::dsn;
use crate::error::ConfigError;

/// Which Redis deployment shape the client adapter should connect to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Topology {
    Single,
    Cluster,
    Sentinel { master_name: String },
}

/// Validated, defaulted configuration for a [`crate::Connection`].
///
/// Construct with [`Options::new`] and the `with_*` setters, or parse a whole
/// DSN with [`Options::from_dsn`]. Both paths run the same validation.
#[derive(Debug, Clone)]
pub struct Options {
    pub stream: String,
    pub group: String,
    pub consumer: String,

    pub auto_setup: bool,
    pub delete_after_ack: bool,
    pub delete_after_reject: bool,
    pub stream_max_entries: u64,
    pub db_index: i64,

    /// Stored internally in milliseconds, per spec §4.B.
    pub redeliver_timeout: Duration,
    /// Stored internally in seconds (as a `Duration`), per spec §4.B.
    pub claim_interval: Duration,

    pub timeout: Duration,
    pub read_timeout: Duration,

    pub dsn_list: Vec<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub topology: Topology,

    pub sentinel_retry_limit: u32,
    pub sentinel_retry_wait: Duration,
    pub update_sentinels: bool,
}

impl Options {
    /// Build with spec-defined defaults, then validate.
    ///
    /// Defaults: `consumer=consumer, auto_setup=true, delete_after_ack=true,
    /// delete_after_reject=true, stream_max_entries=0, db_index=0,
    /// redeliver_timeout=3600s, claim_interval=60000ms, timeout=0,
    /// read_timeout=0, sentinel_retry_limit=20, sentinel_retry_wait=1000ms,
    /// update_sentinels=true`.
    pub fn new(
        stream: impl Into<String>,
        group: impl Into<String>,
        dsn_list: Vec<String>,
    ) -> Result<Self, ConfigError> {
        let opts = Self {
            stream: stream.into(),
            group: group.into(),
            consumer: "consumer".to_string(),
            auto_setup: true,
            delete_after_ack: true,
            delete_after_reject: true,
            stream_max_entries: 0,
            db_index: 0,
            redeliver_timeout: Duration::from_secs(3600),
            claim_interval: Duration::from_millis(60_000),
            timeout: Duration::ZERO,
            read_timeout: Duration::ZERO,
            dsn_list,
            username: None,
            password: None,
            topology: Topology::Single,
            sentinel_retry_limit: 20,
            sentinel_retry_wait: Duration::from_millis(1000),
            update_sentinels: true,
        };
        opts.validate()?;
        Ok(opts)
    }

    pub fn with_consumer(mut self, consumer: impl Into<String>) -> Self {
        self.consumer = consumer.into();
        self
    }

    pub fn with_auto_setup(mut self, auto_setup: bool) -> Self {
        self.auto_setup = auto_setup;
        self
    }

    pub fn with_delete_after_ack(mut self, delete_after_ack: bool) -> Self {
        self.delete_after_ack = delete_after_ack;
        self
    }

    pub fn with_delete_after_reject(mut self, delete_after_reject: bool) -> Self {
        self.delete_after_reject = delete_after_reject;
        self
    }

    pub fn with_stream_max_entries(mut self, max_entries: u64) -> Self {
        self.stream_max_entries = max_entries;
        self
    }

    pub fn with_redeliver_timeout(mut self, redeliver_timeout: Duration) -> Self {
        self.redeliver_timeout = redeliver_timeout;
        self
    }

    pub fn with_claim_interval(mut self, claim_interval: Duration) -> Self {
        self.claim_interval = claim_interval;
        self
    }

    pub fn with_update_sentinels(mut self, update_sentinels: bool) -> Self {
        self.update_sentinels = update_sentinels;
        self
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.stream.is_empty() {
            return Err(ConfigError::EmptyStream);
        }
        if self.group.is_empty() {
            return Err(ConfigError::EmptyGroup);
        }
        if self.consumer.is_empty() {
            return Err(ConfigError::EmptyConsumer);
        }
        if self.dsn_list.is_empty() {
            return Err(ConfigError::EmptyHostList);
        }
        Ok(())
    }

    /// Parse a `predis://[user[:pass]@]host[:port][?k=v&...]` DSN per spec
    /// §6. Every option in §4.B is a recognized query key; `username` and
    /// `password` override userinfo when both are present.
    pub fn from_dsn(dsn: &str) -> Result<Self, ConfigError> {
        let parsed = dsn::parse(dsn)?;

        let stream = parsed
            .query
            .get("stream")
            .cloned()
            .unwrap_or_else(|| "messages".to_string());
        let group = parsed
            .query
            .get("group")
            .cloned()
            .unwrap_or_else(|| "symfony".to_string());

        let mut opts = Self::new(stream, group, vec![parsed.host_port])?;

        opts.username = parsed.query.get("username").cloned().or(parsed.username);
        opts.password = parsed.query.get("password").cloned().or(parsed.password);

        if let Some(consumer) = parsed.query.get("consumer") {
            opts.consumer = consumer.clone();
        }
        if let Some(v) = parsed.query.get("auto_setup") {
            opts.auto_setup = parse_bool(v);
        }
        if let Some(v) = parsed.query.get("delete_after_ack") {
            opts.delete_after_ack = parse_bool(v);
        }
        if let Some(v) = parsed.query.get("delete_after_reject") {
            opts.delete_after_reject = parse_bool(v);
        }
        if let Some(v) = parsed.query.get("stream_max_entries") {
            opts.stream_max_entries = parse_u64("stream_max_entries", v)?;
        }
        if let Some(v) = parsed.query.get("db_index") {
            opts.db_index = parse_u64("db_index", v)? as i64;
        }
        if let Some(v) = parsed.query.get("redeliver_timeout") {
            opts.redeliver_timeout = Duration::from_secs(parse_u64("redeliver_timeout", v)?);
        }
        if let Some(v) = parsed.query.get("claim_interval") {
            opts.claim_interval = Duration::from_millis(parse_u64("claim_interval", v)?);
        }
        if let Some(v) = parsed.query.get("timeout") {
            opts.timeout = Duration::from_secs_f64(parse_f64("timeout", v)?);
        }
        if let Some(v) = parsed.query.get("read_timeout") {
            opts.read_timeout = Duration::from_secs_f64(parse_f64("read_timeout", v)?);
        }
        if let Some(v) = parsed.query.get("sentinel_master") {
            opts.topology = Topology::Sentinel {
                master_name: v.clone(),
            };
        }
        if let Some(v) = parsed.query.get("sentinel_retry_limit") {
            opts.sentinel_retry_limit = parse_u64("sentinel_retry_limit", v)? as u32;
        }
        if let Some(v) = parsed.query.get("sentinel_retry_wait") {
            opts.sentinel_retry_wait = Duration::from_millis(parse_u64("sentinel_retry_wait", v)?);
        }
        if let Some(v) = parsed.query.get("update_sentinels") {
            opts.update_sentinels = parse_bool(v);
        }

        opts.validate()?;
        Ok(opts)
    }
}

fn parse_bool(v: &str) -> bool {
    matches!(v, "1" | "true" | "yes" | "on")
}

fn parse_u64(field: &'static str, v: &str) -> Result<u64, ConfigError> {
    v.parse().map_err(|_| ConfigError::InvalidNumber {
        field,
        value: v.to_string(),
    })
}

fn parse_f64(field: &'static str, v: &str) -> Result<f64, ConfigError> {
    v.parse().map_err(|_| ConfigError::InvalidNumber {
        field,
        value: v.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let opts = Options::new("messages", "symfony", vec!["localhost:6379".into()]).unwrap();
        assert_eq!(opts.consumer, "consumer");
        assert!(opts.auto_setup);
        assert!(opts.delete_after_ack);
        assert!(opts.delete_after_reject);
        assert_eq!(opts.stream_max_entries, 0);
        assert_eq!(opts.db_index, 0);
        assert_eq!(opts.redeliver_timeout, Duration::from_secs(3600));
        assert_eq!(opts.claim_interval, Duration::from_millis(60_000));
        assert_eq!(opts.sentinel_retry_limit, 20);
        assert_eq!(opts.sentinel_retry_wait, Duration::from_millis(1000));
        assert!(opts.update_sentinels);
    }

    #[test]
    fn empty_stream_is_config_error() {
        let err = Options::new("", "g", vec!["h:1".into()]).unwrap_err();
        assert!(matches!(err, ConfigError::EmptyStream));
    }

    #[test]
    fn empty_host_list_is_config_error() {
        let err = Options::new("s", "g", vec![]).unwrap_err();
        assert!(matches!(err, ConfigError::EmptyHostList));
    }

    #[test]
    fn from_dsn_e1() {
        let opts = Options::from_dsn(
            "predis://127.0.0.1:6379?stream=t1&group=g&consumer=c&auto_setup=1",
        )
        .unwrap();
        assert_eq!(opts.stream, "t1");
        assert_eq!(opts.group, "g");
        assert_eq!(opts.consumer, "c");
        assert!(opts.auto_setup);
        assert_eq!(opts.dsn_list, vec!["127.0.0.1:6379".to_string()]);
    }

    #[test]
    fn from_dsn_rejects_wrong_scheme() {
        let err = Options::from_dsn("redis://127.0.0.1:6379").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidDsn(_)));
    }

    #[test]
    fn from_dsn_rejects_bad_number() {
        let err =
            Options::from_dsn("predis://127.0.0.1:6379?stream=t1&group=g&stream_max_entries=abc")
                .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidNumber { .. }));
    }
}
