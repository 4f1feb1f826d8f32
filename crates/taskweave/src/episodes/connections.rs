//! Rebuild the user acquaintance graph in Neo4j and find the shortest chain between two people.
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use crate::config::Neo4jSettings;
use crate::decode::decode;
use crate::errors::{PipelineError, PipelineResult};
use crate::graph::{with_graph, GraphConnection};
use crate::headquarters::{Headquarters, ReportAck};
use crate::http::HttpClient;
use crate::pipeline::parallel_all;

pub const TASK: &str = "connections";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    pub user1_id: String,
    pub user2_id: String,
}

#[derive(Debug, Deserialize)]
struct DatabaseReply<T> {
    reply: Vec<T>,
}

/// Whole response of the headquarters database API, `reply` and `error` included
pub async fn query_database_raw(
    http: &HttpClient,
    headquarters: &Headquarters,
    query: &str,
) -> PipelineResult<Value> {
    let payload = json!({
        "task": "database",
        "apikey": headquarters.api_key(),
        "query": query,
    });
    http.post_json(&headquarters.endpoint("apidb"), &payload).await
}

/// Query the headquarters database API
pub async fn query_database<T: DeserializeOwned>(
    http: &HttpClient,
    headquarters: &Headquarters,
    query: &str,
) -> PipelineResult<Vec<T>> {
    let response = query_database_raw(http, headquarters, query).await?;
    let DatabaseReply { reply } = decode(&response)?;
    Ok(reply)
}

/// Users and connections, fetched concurrently
async fn fetch_tables(
    http: &HttpClient,
    headquarters: &Headquarters,
) -> PipelineResult<(Vec<User>, Vec<Connection>)> {
    let mut tables = parallel_all([
        (
            "users",
            query_database::<Value>(http, headquarters, "select id, username from users;"),
        ),
        (
            "connections",
            query_database::<Value>(http, headquarters, "select * from connections;"),
        ),
    ])
    .await?;

    let users = decode(&Value::Array(tables.remove("users").unwrap_or_default()))?;
    let connections = decode(&Value::Array(tables.remove("connections").unwrap_or_default()))?;
    Ok((users, connections))
}

async fn create_graph(
    graph: &GraphConnection,
    users: &[User],
    connections: &[Connection],
) -> PipelineResult<()> {
    graph
        .execute(
            "UNWIND $users AS user CREATE (:User {id: user.id, username: user.username})",
            json!({ "users": users }),
        )
        .await?;
    graph
        .execute(
            "UNWIND $connections AS c \
             MATCH (a:User {id: c.user1_id}), (b:User {id: c.user2_id}) \
             CREATE (a)-[:KNOWS]->(b)",
            json!({ "connections": connections }),
        )
        .await?;
    info!(users = users.len(), connections = connections.len(), "Created graph");
    Ok(())
}

/// Usernames along the shortest KNOWS path, joined with commas
pub async fn find_knows_chain(
    graph: &GraphConnection,
    from: &str,
    to: &str,
) -> PipelineResult<String> {
    let rows = graph
        .execute(
            "MATCH p = shortestPath((a:User)-[:KNOWS*]-(b:User)) \
             WHERE a.username = $from AND b.username = $to \
             RETURN [n IN nodes(p) | n.username] AS names",
            json!({ "from": from, "to": to }),
        )
        .await?;
    let row = rows
        .into_iter()
        .next()
        .ok_or_else(|| PipelineError::domain("No result"))?;
    let names: Vec<String> = decode(row.get("names").unwrap_or(&Value::Null))?;
    Ok(names.join(","))
}

async fn remove_graph(graph: &GraphConnection) -> PipelineResult<()> {
    graph.execute("MATCH (n) DETACH DELETE n", json!({})).await?;
    Ok(())
}

pub async fn solve(
    http: &HttpClient,
    headquarters: &Headquarters,
    neo4j: &Neo4jSettings,
    from: &str,
    to: &str,
) -> PipelineResult<ReportAck> {
    with_graph(neo4j, |graph| async move {
        let (users, connections) = fetch_tables(http, headquarters).await?;
        create_graph(&graph, &users, &connections).await?;
        let chain = find_knows_chain(&graph, from, to).await?;
        info!(chain = %chain, "Found knows chain");
        let ack = headquarters.report(TASK, &chain).await?;
        remove_graph(&graph).await?;
        Ok(ack)
    })
    .await
}
