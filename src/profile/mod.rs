//! Profile sources
//!
//! A profile is looked up fresh for every turn from an external ledger.
//! Unknown users yield an empty holding list, not an error.

use crate::models::{Holding, UserProfile};
use crate::Result;
use async_trait::async_trait;
use serde::Deserialize;
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{info, warn};

/// Ledger lookup by user id
#[async_trait]
pub trait ProfileSource: Send + Sync {
    async fn lookup(&self, user_id: &str) -> Result<Vec<Holding>>;

    async fn load_profile(&self, user_id: &str) -> Result<UserProfile> {
        let holdings = self.lookup(user_id).await?;
        Ok(UserProfile::from_holdings(user_id, holdings))
    }
}

/// One ledger row as stored in the JSON ledger file
#[derive(Debug, Clone, Deserialize)]
pub struct LedgerRow {
    #[serde(alias = "User ID")]
    pub user_id: String,
    #[serde(alias = "bank_name", alias = "Bank Name")]
    pub institution: String,
    #[serde(alias = "Balance")]
    pub balance: i64,
}

//
// ================= In-Memory Source =================
//

#[derive(Debug, Default)]
pub struct InMemoryProfileSource {
    ledger: HashMap<String, Vec<Holding>>,
}

impl InMemoryProfileSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rows<I>(rows: I) -> Self
    where
        I: IntoIterator<Item = LedgerRow>,
    {
        let mut ledger: HashMap<String, Vec<Holding>> = HashMap::new();
        for row in rows {
            ledger.entry(row.user_id).or_default().push(Holding {
                institution: row.institution,
                balance: row.balance,
            });
        }
        Self { ledger }
    }

    /// Ledger file: a JSON array of `{user_id, institution, balance}` rows
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let rows: Vec<LedgerRow> = serde_json::from_str(&raw)?;
        info!(rows = rows.len(), path = %path.display(), "Loaded ledger file");
        Ok(Self::from_rows(rows))
    }

    pub fn with_holding(mut self, user_id: &str, institution: &str, balance: i64) -> Self {
        self.ledger.entry(user_id.to_string()).or_default().push(Holding {
            institution: institution.to_string(),
            balance,
        });
        self
    }
}

#[async_trait]
impl ProfileSource for InMemoryProfileSource {
    async fn lookup(&self, user_id: &str) -> Result<Vec<Holding>> {
        Ok(self.ledger.get(user_id).cloned().unwrap_or_default())
    }
}

//
// ================= Postgres Source =================
//

/// Ledger table `user_holdings (user_id, bank_name, balance)`
pub struct PgProfileSource {
    pool: PgPool,
    schema_ready: OnceCell<()>,
}

impl PgProfileSource {
    pub fn connect_lazy(database_url: &str) -> Result<Self> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(5)
            .connect_lazy(database_url)?;

        Ok(Self {
            pool,
            schema_ready: OnceCell::new(),
        })
    }

    async fn ensure_schema(&self) -> Result<()> {
        self.schema_ready
            .get_or_try_init(|| async {
                sqlx::query(
                    r#"
                    CREATE TABLE IF NOT EXISTS user_holdings (
                        user_id TEXT NOT NULL,
                        bank_name TEXT NOT NULL,
                        balance BIGINT NOT NULL
                    )
                    "#,
                )
                .execute(&self.pool)
                .await?;
                Ok::<(), sqlx::Error>(())
            })
            .await?;
        Ok(())
    }
}

#[async_trait]
impl ProfileSource for PgProfileSource {
    async fn lookup(&self, user_id: &str) -> Result<Vec<Holding>> {
        self.ensure_schema().await?;

        let rows = sqlx::query(
            r#"
            SELECT bank_name, balance
            FROM user_holdings
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(Holding {
                    institution: row.try_get("bank_name")?,
                    balance: row.try_get("balance")?,
                })
            })
            .collect()
    }
}

/// Postgres when a database URL is configured, then a JSON ledger file,
/// otherwise an empty in-memory ledger
pub fn build_profile_source(
    database_url: Option<&str>,
    ledger_path: Option<&Path>,
) -> Result<Arc<dyn ProfileSource>> {
    if let Some(url) = database_url {
        match PgProfileSource::connect_lazy(url) {
            Ok(source) => {
                info!("Profile source: postgres");
                return Ok(Arc::new(source));
            }
            Err(e) => warn!(error = %e, "Postgres ledger unavailable, falling back"),
        }
    }

    if let Some(path) = ledger_path {
        info!("Profile source: ledger file");
        return Ok(Arc::new(InMemoryProfileSource::from_json_file(path)?));
    }

    info!("Profile source: empty in-memory ledger");
    Ok(Arc::new(InMemoryProfileSource::new()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lookup_aggregates_and_unknown_is_empty() {
        let source = InMemoryProfileSource::new()
            .with_holding("user_1", "BankA", 40_000_000)
            .with_holding("user_1", "BankA", 20_000_000)
            .with_holding("user_1", "BankB", 5_000);

        let profile = tokio_test::assert_ok!(source.load_profile("user_1").await);
        assert_eq!(profile.over_limit_institutions(), vec!["BankA"]);

        let unknown = tokio_test::assert_ok!(source.lookup("ghost").await);
        assert!(unknown.is_empty());
    }

    #[test]
    fn test_ledger_rows_accept_column_names() {
        let raw = r#"[
            {"User ID": "user_1", "Bank Name": "하나은행", "Balance": 60000000},
            {"user_id": "user_2", "institution": "BankB", "balance": 10}
        ]"#;
        let rows: Vec<LedgerRow> = tokio_test::assert_ok!(serde_json::from_str(raw));
        let source = InMemoryProfileSource::from_rows(rows);
        assert_eq!(source.ledger["user_1"][0].institution, "하나은행");
        assert_eq!(source.ledger["user_2"][0].balance, 10);
    }

    #[test]
    fn test_fallback_to_empty_ledger() {
        assert!(build_profile_source(None, None).is_ok());
    }
}
