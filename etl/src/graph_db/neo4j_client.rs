use async_trait::async_trait;
use hospital_config::StoreConfig;
use neo4rs::{query, BoltNull, BoltType, ConfigBuilder, Graph, Query, Txn};
use rust_decimal::prelude::ToPrimitive;
use std::collections::HashMap;
use std::sync::Arc;

use super::{store_unavailable, GraphSession, GraphStore, StoreConnector};
use crate::errors::{EtlError, EtlResult};
use crate::models::{
    EdgeRow, InferenceRule, NodeKind, NodeRow, Properties, PropertyValue, RelationshipKind,
    ID_PROPERTY,
};

/// Connects to Neo4j once per load attempt.
pub struct Neo4jConnector {
    config: StoreConfig,
}

impl Neo4jConnector {
    pub fn new(config: StoreConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl StoreConnector for Neo4jConnector {
    async fn connect(&self) -> EtlResult<Arc<dyn GraphStore>> {
        let store = Neo4jStore::connect(&self.config).await?;
        Ok(Arc::new(store))
    }
}

/// Neo4j store compatible with both local Neo4j and Neo4j AuraDB
pub struct Neo4jStore {
    graph: Arc<Graph>,
}

impl Neo4jStore {
    /// Connect and verify the connection with a trivial query.
    pub async fn connect(config: &StoreConfig) -> EtlResult<Self> {
        tracing::info!(uri = %config.uri, database = %config.database, aura = config.is_aura(), "Connecting to Neo4j");

        let neo4j_config = ConfigBuilder::default()
            .uri(config.uri.as_str())
            .user(config.user.as_str())
            .password(config.password.as_str())
            .db(config.database.as_str())
            .fetch_size(config.fetch_size)
            .max_connections(config.max_connections)
            .build()
            .map_err(|e| store_unavailable(format!("Failed to build Neo4j config: {}", e)))?;

        let graph = Graph::connect(neo4j_config)
            .await
            .map_err(|e| store_unavailable(format!("Failed to connect to Neo4j: {}", e)))?;

        let mut result = graph
            .execute(query("RETURN 1 AS ok"))
            .await
            .map_err(|e| store_unavailable(format!("Connection test failed: {}", e)))?;
        result
            .next()
            .await
            .map_err(|e| store_unavailable(format!("Connection test failed: {}", e)))?;

        tracing::info!("Neo4j connection established");

        Ok(Self {
            graph: Arc::new(graph),
        })
    }
}

#[async_trait]
impl GraphStore for Neo4jStore {
    async fn open_session(&self) -> EtlResult<Box<dyn GraphSession>> {
        let txn = self
            .graph
            .start_txn()
            .await
            .map_err(|e| EtlError::TransientStore(format!("Failed to start transaction: {}", e)))?;
        Ok(Box::new(Neo4jSession { txn }))
    }
}

/// One explicit transaction; holds a pooled connection until released.
struct Neo4jSession {
    txn: Txn,
}

impl Neo4jSession {
    /// Run a statement whose single row carries an integer column.
    async fn fetch_count(&mut self, q: Query, column: &str) -> EtlResult<usize> {
        let mut stream = self.txn.execute(q).await?;
        let count = match stream.next(self.txn.handle()).await? {
            Some(row) => row.get::<i64>(column).map_err(|e| {
                EtlError::TransientStore(format!("Missing column {} in result: {}", column, e))
            })?,
            None => 0,
        };
        Ok(usize::try_from(count).unwrap_or(0))
    }

    /// Run a statement whose single row carries a list of row indices.
    async fn fetch_indices(&mut self, q: Query, column: &str) -> EtlResult<Vec<usize>> {
        let mut stream = self.txn.execute(q).await?;
        let indices = match stream.next(self.txn.handle()).await? {
            Some(row) => row.get::<Vec<i64>>(column).map_err(|e| {
                EtlError::TransientStore(format!("Missing column {} in result: {}", column, e))
            })?,
            None => Vec::new(),
        };
        Ok(indices
            .into_iter()
            .filter_map(|idx| usize::try_from(idx).ok())
            .collect())
    }
}

#[async_trait]
impl GraphSession for Neo4jSession {
    async fn ensure_uniqueness(&mut self, kind: NodeKind, property: &str) -> EtlResult<()> {
        self.txn.run(query(&uniqueness_cypher(kind, property))).await?;
        Ok(())
    }

    async fn merge_nodes(&mut self, kind: NodeKind, rows: &[NodeRow]) -> EtlResult<usize> {
        if rows.is_empty() {
            return Ok(0);
        }
        let params: Vec<BoltType> = rows.iter().map(node_param).collect();
        let q = query(&merge_nodes_cypher(kind)).param("rows", params);
        self.fetch_count(q, "merged").await
    }

    async fn merge_relationships(
        &mut self,
        kind: RelationshipKind,
        from: NodeKind,
        to: NodeKind,
        rows: &[EdgeRow],
    ) -> EtlResult<Vec<usize>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let params: Vec<BoltType> = rows.iter().enumerate().map(edge_param).collect();
        let q = query(&merge_relationships_cypher(kind, from, to)).param("rows", params);
        self.fetch_indices(q, "merged").await
    }

    async fn merge_inferred(&mut self, rule: &InferenceRule) -> EtlResult<usize> {
        let q = query(&merge_inferred_cypher(rule)).param("modulus", rule.modulus);
        self.fetch_count(q, "merged").await
    }

    async fn count_nodes(&mut self, kind: NodeKind) -> EtlResult<usize> {
        let cypher = format!("MATCH (n:{}) RETURN count(n) AS count", kind.as_str());
        self.fetch_count(query(&cypher), "count").await
    }

    async fn count_relationships(&mut self, kind: RelationshipKind) -> EtlResult<usize> {
        let cypher = format!("MATCH ()-[r:{}]->() RETURN count(r) AS count", kind.as_str());
        self.fetch_count(query(&cypher), "count").await
    }

    async fn release(self: Box<Self>, commit: bool) -> EtlResult<()> {
        if commit {
            self.txn.commit().await?;
        } else {
            self.txn.rollback().await?;
        }
        Ok(())
    }
}

pub(crate) fn uniqueness_cypher(kind: NodeKind, property: &str) -> String {
    format!(
        "CREATE CONSTRAINT IF NOT EXISTS FOR (n:{}) REQUIRE n.{} IS UNIQUE",
        kind.as_str(),
        property
    )
}

pub(crate) fn merge_nodes_cypher(kind: NodeKind) -> String {
    format!(
        "UNWIND $rows AS row \
         MERGE (n:{label} {{{id}: row.id}}) \
         SET n += row.props \
         RETURN count(n) AS merged",
        label = kind.as_str(),
        id = ID_PROPERTY,
    )
}

pub(crate) fn merge_relationships_cypher(
    kind: RelationshipKind,
    from: NodeKind,
    to: NodeKind,
) -> String {
    format!(
        "UNWIND $rows AS row \
         MATCH (a:{from} {{{id}: row.from}}) \
         MATCH (b:{to} {{{id}: row.to}}) \
         MERGE (a)-[r:{rel}]->(b) \
         SET r += row.props \
         RETURN collect(row.idx) AS merged",
        from = from.as_str(),
        to = to.as_str(),
        rel = kind.as_str(),
        id = ID_PROPERTY,
    )
}

pub(crate) fn merge_inferred_cypher(rule: &InferenceRule) -> String {
    format!(
        "MATCH (a:{from}) \
         MATCH (b:{to}) \
         WHERE (a.{id} + b.{id}) % $modulus = 0 \
         MERGE (a)-[r:{rel}]->(b) \
         RETURN count(r) AS merged",
        from = rule.from.as_str(),
        to = rule.to.as_str(),
        rel = rule.kind.as_str(),
        id = ID_PROPERTY,
    )
}

fn bolt_value(value: &PropertyValue) -> BoltType {
    match value {
        PropertyValue::Integer(v) => BoltType::from(*v),
        PropertyValue::Decimal(v) => match v.to_f64() {
            Some(f) => BoltType::from(f),
            None => BoltType::Null(BoltNull),
        },
        PropertyValue::Text(v) => BoltType::from(v.clone()),
        PropertyValue::Null => BoltType::Null(BoltNull),
    }
}

fn props_param(properties: &Properties) -> BoltType {
    let map: HashMap<String, BoltType> = properties
        .iter()
        .map(|(name, value)| (name.to_string(), bolt_value(value)))
        .collect();
    BoltType::from(map)
}

fn node_param(row: &NodeRow) -> BoltType {
    let mut map: HashMap<String, BoltType> = HashMap::new();
    map.insert("id".to_string(), BoltType::from(row.id));
    map.insert("props".to_string(), props_param(&row.properties));
    BoltType::from(map)
}

fn edge_param((idx, row): (usize, &EdgeRow)) -> BoltType {
    let mut map: HashMap<String, BoltType> = HashMap::new();
    map.insert("idx".to_string(), BoltType::from(idx as i64));
    map.insert("from".to_string(), BoltType::from(row.from));
    map.insert("to".to_string(), BoltType::from(row.to));
    map.insert("props".to_string(), props_param(&row.properties));
    BoltType::from(map)
}
