//! Neo4j access through the HTTP transactional endpoint.
//!
//! A unit of work runs inside one transaction: [`with_graph`] opens it, hands a
//! [`GraphConnection`] to the caller and commits or rolls back depending on the outcome.
use std::future::Future;
use std::time::Duration;

use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{info, warn};

use crate::config::Neo4jSettings;
use crate::decode::decode;
use crate::errors::{PipelineError, PipelineResult};
use crate::pipeline::try_execute;

#[derive(Debug, Deserialize)]
struct Neo4jError {
    code: String,
    message: String,
}

#[derive(Debug, Default, Deserialize)]
struct StatementResult {
    #[serde(default)]
    columns: Vec<String>,
    #[serde(default)]
    data: Vec<RowData>,
}

#[derive(Debug, Deserialize)]
struct RowData {
    row: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct TransactionResponse {
    #[serde(default)]
    commit: Option<String>,
    #[serde(default)]
    results: Vec<StatementResult>,
    #[serde(default)]
    errors: Vec<Neo4jError>,
}

impl TransactionResponse {
    fn into_result(self) -> PipelineResult<Self> {
        if let Some(error) = self.errors.first() {
            return Err(PipelineError::domain(format!(
                "Neo4j error {}: {}",
                error.code, error.message
            )));
        }
        Ok(self)
    }
}

/// An open transaction. Cheap to clone; every clone talks to the same transaction.
#[derive(Clone)]
pub struct GraphConnection {
    client: Client,
    settings: Neo4jSettings,
    commit_url: String,
}

impl GraphConnection {
    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.basic_auth(&self.settings.username, Some(&self.settings.password))
    }

    fn transaction_url(&self) -> &str {
        self.commit_url
            .strip_suffix("/commit")
            .unwrap_or(self.commit_url.as_str())
    }

    async fn post(
        &self,
        label: &str,
        url: &str,
        body: Value,
    ) -> PipelineResult<TransactionResponse> {
        let request = self.authorize(self.client.post(url)).json(&body);
        let response = try_execute(label, request.send()).await?;
        let body: Value = try_execute(label, response.json::<Value>()).await?;
        decode::<TransactionResponse>(&body)?.into_result()
    }

    /// Run one Cypher statement; every returned row maps column names to values
    pub async fn execute(
        &self,
        statement: &str,
        parameters: Value,
    ) -> PipelineResult<Vec<Map<String, Value>>> {
        let response = self
            .post(
                "Execute neo4j statement",
                self.transaction_url(),
                json!({
                    "statements": [{
                        "statement": statement,
                        "parameters": parameters,
                    }]
                }),
            )
            .await?;

        let result = response.results.into_iter().next().unwrap_or_default();
        let columns = result.columns;
        Ok(result
            .data
            .into_iter()
            .map(|data| columns.iter().cloned().zip(data.row).collect())
            .collect())
    }

    async fn commit(&self) -> PipelineResult<()> {
        self.post(
            "Close neo4j connection",
            &self.commit_url,
            json!({ "statements": [] }),
        )
        .await
        .map(|_| ())
    }

    async fn rollback(&self) -> PipelineResult<()> {
        let request = self.authorize(self.client.delete(self.transaction_url()));
        let response = try_execute("Close neo4j connection", request.send()).await?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(PipelineError::domain(format!("Neo4j rollback failed: {}", status)))
        }
    }
}

async fn connect(settings: &Neo4jSettings) -> PipelineResult<GraphConnection> {
    let client = Client::builder()
        .timeout(Duration::from_secs(60))
        .build()
        .map_err(|e| PipelineError::execution("Build neo4j client", e))?;

    let url = format!(
        "{}/db/{}/tx",
        settings.url.trim_end_matches('/'),
        settings.database
    );
    let request = client
        .post(&url)
        .basic_auth(&settings.username, Some(&settings.password))
        .json(&json!({ "statements": [] }));
    let response = try_execute("Connect to neo4j", request.send()).await?;
    let body: Value = try_execute("Connect to neo4j", response.json::<Value>()).await?;
    let opened = decode::<TransactionResponse>(&body)?.into_result()?;

    let commit_url = opened
        .commit
        .ok_or_else(|| PipelineError::domain("Neo4j did not open a transaction"))?;
    info!("Connected to neo4j {}", commit_url);

    Ok(GraphConnection {
        client,
        settings: settings.clone(),
        commit_url,
    })
}

/// Run `f` inside a transaction that is committed on success and rolled back on failure.
///
/// A failed commit becomes the result. A failed rollback is only logged so the original
/// error reaches the caller.
pub async fn with_graph<T, F, Fut>(settings: &Neo4jSettings, f: F) -> PipelineResult<T>
where
    F: FnOnce(GraphConnection) -> Fut,
    Fut: Future<Output = PipelineResult<T>>,
{
    let connection = connect(settings).await?;

    match f(connection.clone()).await {
        Ok(value) => {
            connection.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(release_err) = connection.rollback().await {
                warn!(error = %release_err, "failed to roll back neo4j transaction");
            }
            Err(err)
        }
    }
}
