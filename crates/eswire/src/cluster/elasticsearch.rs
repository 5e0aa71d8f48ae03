//! Elasticsearch/OpenSearch admin client over the REST API.

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::debug;

use crate::cluster::common::{create_http_client, handle_http_error};
use crate::cluster::{
    ActiveRecoveries, ClusterAdmin, SegmentInfo, ShardCopySegments, ShardRecovery, ShardState,
};
use crate::config::ClusterConfig;
use crate::error::{Error, Result};

/// `{"acknowledged": true, "shards_acknowledged": true}`
#[derive(Debug, Deserialize)]
struct Acknowledged {
    acknowledged: bool,
    #[serde(default)]
    shards_acknowledged: Option<bool>,
}

/// `{"_shards": {...}}` as returned by broadcast actions.
#[derive(Debug, Deserialize)]
struct BroadcastResponse {
    #[serde(rename = "_shards")]
    shards: ShardsSummary,
}

#[derive(Debug, Deserialize)]
struct ShardsSummary {
    total: u32,
    #[allow(dead_code)]
    successful: u32,
    failed: u32,
}

#[derive(Debug, Deserialize)]
struct IndexRecovery {
    #[serde(default)]
    shards: Vec<RecoveryShard>,
}

#[derive(Debug, Deserialize)]
struct RecoveryShard {
    id: u32,
    #[serde(default)]
    stage: String,
    #[serde(default)]
    source: Option<RecoveryNode>,
    #[serde(default)]
    target: Option<RecoveryNode>,
}

#[derive(Debug, Deserialize)]
struct RecoveryNode {
    #[serde(default)]
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IndexSettingsEntry {
    settings: IndexSettingsBody,
}

#[derive(Debug, Deserialize)]
struct IndexSettingsBody {
    index: IndexUuidSetting,
}

#[derive(Debug, Deserialize)]
struct IndexUuidSetting {
    uuid: String,
}

#[derive(Debug, Deserialize)]
struct StatsResponse {
    #[serde(rename = "_all")]
    all: StatsAll,
}

#[derive(Debug, Deserialize)]
struct StatsAll {
    primaries: StatsSection,
}

#[derive(Debug, Deserialize)]
struct StatsSection {
    docs: DocsStats,
}

#[derive(Debug, Deserialize)]
struct DocsStats {
    count: u64,
}

#[derive(Debug, Deserialize)]
struct SegmentsResponse {
    indices: BTreeMap<String, IndexSegments>,
}

#[derive(Debug, Deserialize)]
struct IndexSegments {
    shards: BTreeMap<String, Vec<ShardCopyEntry>>,
}

#[derive(Debug, Deserialize)]
struct ShardCopyEntry {
    routing: Routing,
    #[serde(default)]
    segments: BTreeMap<String, SegmentEntry>,
}

#[derive(Debug, Deserialize)]
struct Routing {
    state: ShardState,
    primary: bool,
    #[serde(default)]
    node: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SegmentEntry {
    num_docs: u64,
}

/// REST admin client for one cluster endpoint.
pub struct ElasticsearchAdmin {
    config: ClusterConfig,
    client: Client,
    closed: bool,
}

impl ElasticsearchAdmin {
    /// Creates a client with the configured request timeout.
    pub fn new(config: ClusterConfig) -> Self {
        let client = create_http_client(config.request_timeout());
        Self {
            config,
            client,
            closed: false,
        }
    }

    /// Joins the endpoint and a path.
    fn build_url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.config.url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Makes an authenticated request.
    fn build_request(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        if self.closed {
            return Err(Error::Cluster("admin connection already closed".to_string()));
        }
        let mut req = self
            .client
            .request(method, self.build_url(path))
            .header("Content-Type", "application/json");

        if let Some(api_key) = &self.config.api_key {
            req = req.header("Authorization", format!("ApiKey {}", api_key));
        } else if let (Some(user), Some(pass)) = (&self.config.username, &self.config.password) {
            req = req.basic_auth(user, Some(pass));
        }

        Ok(req)
    }

    /// Sends a request and decodes a successful JSON response.
    async fn send_json<T: DeserializeOwned>(&self, req: RequestBuilder, action: &str) -> Result<T> {
        let response = req.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(handle_http_error(status.as_u16(), &body, action));
        }

        response
            .json()
            .await
            .map_err(|e| Error::Cluster(format!("Failed to parse {} response: {}", action, e)))
    }

    async fn send_acknowledged(&self, req: RequestBuilder, action: &str) -> Result<Acknowledged> {
        let ack: Acknowledged = self.send_json(req, action).await?;
        if !ack.acknowledged {
            return Err(Error::Cluster(format!("{} was not acknowledged", action)));
        }
        Ok(ack)
    }
}

fn index_entry<T>(mut entries: BTreeMap<String, T>, index: &str, action: &str) -> Result<T> {
    entries
        .remove(index)
        .ok_or_else(|| Error::Cluster(format!("{} response has no entry for '{}'", action, index)))
}

#[async_trait]
impl ClusterAdmin for ElasticsearchAdmin {
    async fn open_index(&self, index: &str) -> Result<()> {
        let req = self
            .build_request(Method::POST, &format!("{}/_open", index))?
            .query(&[("wait_for_active_shards", "all")]);
        let ack = self.send_acknowledged(req, "open index").await?;
        if ack.shards_acknowledged == Some(false) {
            return Err(Error::Cluster(format!(
                "index '{}' opened but not all shard copies became active",
                index
            )));
        }
        Ok(())
    }

    async fn force_merge(&self, index: &str, max_segments: u32) -> Result<()> {
        let req = self
            .build_request(Method::POST, &format!("{}/_forcemerge", index))?
            .query(&[("max_num_segments", max_segments)])
            .timeout(self.config.merge_timeout());
        let resp: BroadcastResponse = self.send_json(req, "force merge").await?;
        if resp.shards.failed > 0 {
            return Err(Error::Cluster(format!(
                "force merge failed on {}/{} shards of '{}'",
                resp.shards.failed, resp.shards.total, index
            )));
        }
        Ok(())
    }

    async fn update_settings(
        &self,
        index: &str,
        settings: &BTreeMap<String, String>,
    ) -> Result<()> {
        let req = self
            .build_request(Method::PUT, &format!("{}/_settings", index))?
            .json(settings);
        self.send_acknowledged(req, "update settings").await?;
        Ok(())
    }

    async fn reroute(&self) -> Result<()> {
        let req = self.build_request(Method::POST, "_cluster/reroute")?;
        self.send_acknowledged(req, "reroute").await?;
        Ok(())
    }

    async fn active_recoveries(&self, index: &str) -> Result<ActiveRecoveries> {
        let req = self
            .build_request(Method::GET, &format!("{}/_recovery", index))?
            .query(&[("active_only", "true")]);
        let resp: BTreeMap<String, IndexRecovery> = self.send_json(req, "recovery").await?;

        let indices = resp
            .into_iter()
            .map(|(name, recovery)| {
                let shards = recovery
                    .shards
                    .into_iter()
                    .map(|s| ShardRecovery {
                        shard: s.id,
                        stage: s.stage,
                        source_node: s.source.and_then(|n| n.id),
                        target_node: s.target.and_then(|n| n.id),
                    })
                    .collect();
                (name, shards)
            })
            .collect();

        Ok(ActiveRecoveries { indices })
    }

    async fn index_uuid(&self, index: &str) -> Result<String> {
        let req = self.build_request(Method::GET, &format!("{}/_settings/index.uuid", index))?;
        let resp: BTreeMap<String, IndexSettingsEntry> = self.send_json(req, "get settings").await?;
        let entry = index_entry(resp, index, "get settings")?;
        Ok(entry.settings.index.uuid)
    }

    async fn doc_count(&self, index: &str) -> Result<u64> {
        let req = self.build_request(Method::GET, &format!("{}/_stats/docs", index))?;
        let resp: StatsResponse = self.send_json(req, "index stats").await?;
        Ok(resp.all.primaries.docs.count)
    }

    async fn shard_segments(&self, index: &str) -> Result<Vec<ShardCopySegments>> {
        let req = self.build_request(Method::GET, &format!("{}/_segments", index))?;
        let resp: SegmentsResponse = self.send_json(req, "segments").await?;
        let segments = index_entry(resp.indices, index, "segments")?;

        let mut copies = Vec::new();
        for (shard_key, entries) in segments.shards {
            let shard: u32 = shard_key.parse().map_err(|_| {
                Error::Cluster(format!("segments response has invalid shard id '{}'", shard_key))
            })?;
            for entry in entries {
                copies.push(ShardCopySegments {
                    shard,
                    primary: entry.routing.primary,
                    node: entry.routing.node,
                    state: entry.routing.state,
                    segments: entry
                        .segments
                        .into_iter()
                        .map(|(name, seg)| SegmentInfo {
                            name,
                            doc_count: seg.num_docs,
                        })
                        .collect(),
                });
            }
        }
        copies.sort_by_key(|c| (c.shard, !c.primary));
        debug!("index {} reported {} shard copies", index, copies.len());
        Ok(copies)
    }

    async fn close_index(&self, index: &str) -> Result<()> {
        let req = self.build_request(Method::POST, &format!("{}/_close", index))?;
        self.send_acknowledged(req, "close index").await?;
        Ok(())
    }

    async fn delete_index(&self, index: &str) -> Result<()> {
        let req = self.build_request(Method::DELETE, index)?;
        self.send_acknowledged(req, "delete index").await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}

#[cfg(test)]
#[path = "elasticsearch_tests.rs"]
mod tests;
