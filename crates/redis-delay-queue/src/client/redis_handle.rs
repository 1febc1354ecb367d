use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;

use crate::error::TransportError;
use crate::options::{Options, Topology};

use super::{GroupInfo, PendingEntry, RedisClient};

/// Concrete client adapter backed by the `redis` crate. Unifies the three
/// topologies spec §4.A requires behind one enum so the rest of the crate
/// never matches on topology itself.
pub(crate) enum RedisHandle {
    Single(redis::aio::ConnectionManager),
    Cluster(redis::cluster_async::ClusterConnection),
    Sentinel(tokio::sync::Mutex<redis::sentinel::SentinelClient>),
}

impl RedisHandle {
    pub(crate) async fn connect(opts: &Options) -> Result<Self, TransportError> {
        match &opts.topology {
            Topology::Single => {
                let client = single_client(opts)?;
                let mut config = redis::aio::ConnectionManagerConfig::new();
                if !opts.timeout.is_zero() {
                    config = config.set_connection_timeout(opts.timeout);
                }
                if !opts.read_timeout.is_zero() {
                    config = config.set_response_timeout(opts.read_timeout);
                }
                let conn = redis::aio::ConnectionManager::new_with_config(client, config)
                    .await
                    .map_err(map_redis_err)?;
                Ok(Self::Single(conn))
            }
            Topology::Cluster => {
                let nodes: Vec<String> = opts
                    .dsn_list
                    .iter()
                    .map(|hp| node_url(opts, hp))
                    .collect();
                let mut builder = redis::cluster::ClusterClientBuilder::new(nodes);
                if !opts.timeout.is_zero() {
                    builder = builder.connection_timeout(opts.timeout);
                }
                if !opts.read_timeout.is_zero() {
                    builder = builder.response_timeout(opts.read_timeout);
                }
                let client = builder.build().map_err(map_redis_err)?;
                let conn = client.get_async_connection().await.map_err(map_redis_err)?;
                Ok(Self::Cluster(conn))
            }
            Topology::Sentinel { master_name } => {
                let mut nodes: Vec<String> = opts
                    .dsn_list
                    .iter()
                    .map(|hp| node_url(opts, hp))
                    .collect();
                if opts.update_sentinels {
                    let discovered = discover_sentinels(&nodes, master_name).await;
                    for node in discovered {
                        if !nodes.contains(&node) {
                            nodes.push(node);
                        }
                    }
                }
                let sentinel_client =
                    connect_sentinel_with_retry(nodes, master_name.clone(), opts).await?;
                Ok(Self::Sentinel(tokio::sync::Mutex::new(sentinel_client)))
            }
        }
    }

    async fn query<T: redis::FromRedisValue>(&self, cmd: &redis::Cmd) -> Result<T, TransportError> {
        match self {
            Self::Single(conn) => {
                let mut conn = conn.clone();
                cmd.query_async(&mut conn).await.map_err(map_redis_err)
            }
            Self::Cluster(conn) => {
                let mut conn = conn.clone();
                cmd.query_async(&mut conn).await.map_err(map_redis_err)
            }
            Self::Sentinel(client) => {
                let mut client = client.lock().await;
                let mut conn = client
                    .get_async_connection()
                    .await
                    .map_err(map_redis_err)?;
                cmd.query_async(&mut conn).await.map_err(map_redis_err)
            }
        }
    }
}

fn single_client(opts: &Options) -> Result<redis::Client, TransportError> {
    let host_port = opts
        .dsn_list
        .first()
        .ok_or_else(|| TransportError::Other("no hosts configured".to_string()))?;
    redis::Client::open(node_url(opts, host_port)).map_err(map_redis_err)
}

/// Ask every configured sentinel for its view of the other sentinels
/// watching `master_name` (`SENTINEL SENTINELS <master>`), best-effort: a
/// node that can't be reached or doesn't answer is skipped rather than
/// failing the whole connect. Used to keep the sentinel node list current
/// (spec §4.A "update sentinels" behavior) without requiring the caller to
/// enumerate every sentinel up front.
async fn discover_sentinels(nodes: &[String], master_name: &str) -> Vec<String> {
    let mut discovered = Vec::new();
    for node in nodes {
        let Ok(client) = redis::Client::open(node.as_str()) else {
            continue;
        };
        let Ok(mut conn) = client.get_multiplexed_async_connection().await else {
            continue;
        };
        let mut cmd = redis::cmd("SENTINEL");
        cmd.arg("SENTINELS").arg(master_name);
        let Ok(rows) = cmd
            .query_async::<Vec<HashMap<String, redis::Value>>>(&mut conn)
            .await
        else {
            continue;
        };
        for row in rows {
            if let (Some(ip), Some(port)) =
                (field_string_opt(&row, "ip"), field_string_opt(&row, "port"))
            {
                discovered.push(format!("redis://{ip}:{port}"));
            }
        }
    }
    discovered
}

/// Build a `SentinelClient` against `nodes`, retrying up to
/// `opts.sentinel_retry_limit` times with `opts.sentinel_retry_wait` between
/// attempts (spec §4.A's configurable retry limit/wait for the sentinel
/// topology). Each attempt validates connectivity by opening an async
/// connection through the freshly built client, not just constructing it.
async fn connect_sentinel_with_retry(
    nodes: Vec<String>,
    master_name: String,
    opts: &Options,
) -> Result<redis::sentinel::SentinelClient, TransportError> {
    let mut attempt = 0u32;
    loop {
        let attempt_result: Result<redis::sentinel::SentinelClient, redis::RedisError> =
            async {
                let mut client = redis::sentinel::SentinelClient::build(
                    nodes.clone(),
                    master_name.clone(),
                    None,
                    redis::sentinel::SentinelServerType::Master,
                )?;
                client.get_async_connection().await?;
                Ok(client)
            }
            .await;

        match attempt_result {
            Ok(client) => return Ok(client),
            Err(e) if attempt < opts.sentinel_retry_limit => {
                attempt += 1;
                tracing::debug!(
                    attempt,
                    limit = opts.sentinel_retry_limit,
                    error = %e,
                    "sentinel connect attempt failed, retrying"
                );
                tokio::time::sleep(opts.sentinel_retry_wait).await;
            }
            Err(e) => return Err(map_redis_err(e)),
        }
    }
}

fn node_url(opts: &Options, host_port: &str) -> String {
    let auth = match (&opts.username, &opts.password) {
        (Some(u), Some(p)) => format!("{u}:{p}@"),
        (None, Some(p)) => format!(":{p}@"),
        _ => String::new(),
    };
    format!("redis://{auth}{host_port}/{}", opts.db_index)
}

#[allow(clippy::needless_pass_by_value)]
fn map_redis_err(e: redis::RedisError) -> TransportError {
    use redis::ErrorKind;
    match e.kind() {
        ErrorKind::IoError | ErrorKind::AuthenticationFailed => {
            TransportError::Connection(e.to_string())
        }
        _ => TransportError::Other(e.to_string()),
    }
}

#[async_trait]
impl RedisClient for RedisHandle {
    async fn xadd(
        &self,
        stream: &str,
        max_entries: Option<u64>,
        field: &str,
        value: &str,
    ) -> Result<String, TransportError> {
        let mut cmd = redis::cmd("XADD");
        cmd.arg(stream);
        if let Some(max) = max_entries {
            cmd.arg("MAXLEN").arg("~").arg(max);
        }
        cmd.arg("*").arg(field).arg(value);
        self.query(&cmd).await
    }

    async fn zadd_nx(&self, key: &str, score: &str, member: &str) -> Result<bool, TransportError> {
        let mut cmd = redis::cmd("ZADD");
        cmd.arg(key).arg("NX").arg(score).arg(member);
        let added: i64 = self.query(&cmd).await?;
        Ok(added == 1)
    }

    async fn zcount_upto(&self, key: &str, max: &str) -> Result<u64, TransportError> {
        let mut cmd = redis::cmd("ZCOUNT");
        cmd.arg(key).arg("0").arg(max);
        self.query(&cmd).await
    }

    async fn zpopmin(&self, key: &str) -> Result<Option<(String, String)>, TransportError> {
        let mut cmd = redis::cmd("ZPOPMIN");
        cmd.arg(key).arg(1);
        let raw: Vec<String> = self.query(&cmd).await?;
        let mut it = raw.into_iter();
        match (it.next(), it.next()) {
            (Some(member), Some(score)) => Ok(Some((member, score))),
            _ => Ok(None),
        }
    }

    async fn xack(&self, stream: &str, group: &str, id: &str) -> Result<i64, TransportError> {
        let mut cmd = redis::cmd("XACK");
        cmd.arg(stream).arg(group).arg(id);
        self.query(&cmd).await
    }

    async fn xdel(&self, stream: &str, id: &str) -> Result<i64, TransportError> {
        let mut cmd = redis::cmd("XDEL");
        cmd.arg(stream).arg(id);
        self.query(&cmd).await
    }

    async fn xgroup_create(
        &self,
        stream: &str,
        group: &str,
        start_id: &str,
    ) -> Result<(), TransportError> {
        let mut cmd = redis::cmd("XGROUP");
        cmd.arg("CREATE").arg(stream).arg(group).arg(start_id).arg("MKSTREAM");
        self.query::<String>(&cmd).await?;
        Ok(())
    }

    async fn xreadgroup(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        id: &str,
        count: u32,
        block_ms: u64,
    ) -> Result<Vec<(String, HashMap<String, String>)>, TransportError> {
        let mut cmd = redis::cmd("XREADGROUP");
        cmd.arg("GROUP")
            .arg(group)
            .arg(consumer)
            .arg("COUNT")
            .arg(count)
            .arg("BLOCK")
            .arg(block_ms)
            .arg("STREAMS")
            .arg(stream)
            .arg(id);

        let reply: Option<redis::streams::StreamReadReply> = self.query(&cmd).await?;
        let Some(reply) = reply else {
            return Ok(Vec::new());
        };

        let mut out = Vec::new();
        for key in reply.keys {
            if key.key != stream {
                continue;
            }
            for entry in key.ids {
                let mut fields = HashMap::new();
                for (field, value) in entry.map {
                    if let redis::Value::BulkString(bytes) = value {
                        fields.insert(field, String::from_utf8_lossy(&bytes).into_owned());
                    }
                }
                if !fields.is_empty() {
                    out.push((entry.id, fields));
                }
            }
        }
        Ok(out)
    }

    async fn xpending_head(
        &self,
        stream: &str,
        group: &str,
    ) -> Result<Option<PendingEntry>, TransportError> {
        let mut cmd = redis::cmd("XPENDING");
        cmd.arg(stream).arg(group).arg("-").arg("+").arg(1);
        let rows: Vec<(String, String, u64, u64)> = self.query(&cmd).await?;
        Ok(rows.into_iter().next().map(|(id, consumer, idle_ms, delivery_count)| PendingEntry {
            id,
            consumer,
            idle_ms,
            delivery_count,
        }))
    }

    async fn xclaim_justid(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        min_idle_ms: u64,
        ids: &[String],
    ) -> Result<Vec<String>, TransportError> {
        let mut cmd = redis::cmd("XCLAIM");
        cmd.arg(stream).arg(group).arg(consumer).arg(min_idle_ms);
        for id in ids {
            cmd.arg(id);
        }
        cmd.arg("JUSTID");
        self.query(&cmd).await
    }

    async fn xinfo_groups(&self, stream: &str) -> Result<Vec<GroupInfo>, TransportError> {
        let mut cmd = redis::cmd("XINFO");
        cmd.arg("GROUPS").arg(stream);
        let rows: Vec<HashMap<String, redis::Value>> = self.query(&cmd).await?;

        rows.into_iter()
            .map(|row| {
                let name = field_string(&row, "name")?;
                let lag = field_u64(&row, "lag");
                let last_delivered_id = field_string_opt(&row, "last-delivered-id");
                Ok(GroupInfo {
                    name,
                    lag,
                    last_delivered_id,
                })
            })
            .collect()
    }

    async fn xrange_ids(
        &self,
        stream: &str,
        start_exclusive: &str,
        count: u32,
    ) -> Result<Vec<String>, TransportError> {
        let mut cmd = redis::cmd("XRANGE");
        cmd.arg(stream)
            .arg(format!("({start_exclusive}"))
            .arg("+")
            .arg("COUNT")
            .arg(count);
        let rows: Vec<(String, HashMap<String, String>)> = self.query(&cmd).await?;
        Ok(rows.into_iter().map(|(id, _)| id).collect())
    }

    async fn unlink(&self, keys: &[&str]) -> Result<bool, TransportError> {
        let mut cmd = redis::cmd("UNLINK");
        for key in keys {
            cmd.arg(*key);
        }
        let deleted: i64 = self.query(&cmd).await?;
        Ok(deleted >= 0)
    }

    async fn del(&self, keys: &[&str]) -> Result<(), TransportError> {
        let mut cmd = redis::cmd("DEL");
        for key in keys {
            cmd.arg(*key);
        }
        self.query::<i64>(&cmd).await?;
        Ok(())
    }

    async fn ping(&self) -> Result<bool, TransportError> {
        let cmd = redis::cmd("PING");
        let pong: String = self.query(&cmd).await?;
        Ok(pong == "PONG")
    }

    fn now_parts(&self) -> (u64, u32) {
        let since_epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock before epoch");
        (since_epoch.as_secs(), since_epoch.subsec_millis())
    }
}

fn field_string(row: &HashMap<String, redis::Value>, field: &str) -> Result<String, TransportError> {
    field_string_opt(row, field).ok_or_else(|| TransportError::Other(format!("missing field '{field}' in XINFO GROUPS reply")))
}

fn field_string_opt(row: &HashMap<String, redis::Value>, field: &str) -> Option<String> {
    match row.get(field)? {
        redis::Value::BulkString(b) => Some(String::from_utf8_lossy(b).into_owned()),
        redis::Value::SimpleString(s) => Some(s.clone()),
        _ => None,
    }
}

fn field_u64(row: &HashMap<String, redis::Value>, field: &str) -> Option<u64> {
    match row.get(field)? {
        redis::Value::Int(n) if *n >= 0 => Some(*n as u64),
        _ => None,
    }
}
