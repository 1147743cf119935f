use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use cardwise_core::{FormDefinition, FormField};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredForm {
    pub definition: FormDefinition,
    pub created_at: DateTime<Utc>,
}

pub trait FormRepository: Send + Sync {
    async fn save_form(&self, definition: &FormDefinition) -> Result<()>;
    async fn load_form(&self, form_id: &str) -> Result<Option<FormDefinition>>;
    async fn list_forms(&self) -> Result<Vec<StoredForm>>;
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    forms: Arc<RwLock<HashMap<String, StoredForm>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FormRepository for MemoryStore {
    async fn save_form(&self, definition: &FormDefinition) -> Result<()> {
        let mut forms = self.forms.write();
        let created_at = forms
            .get(&definition.form_id)
            .map(|existing| existing.created_at)
            .unwrap_or_else(Utc::now);
        forms.insert(
            definition.form_id.clone(),
            StoredForm {
                definition: definition.clone(),
                created_at,
            },
        );
        Ok(())
    }

    async fn load_form(&self, form_id: &str) -> Result<Option<FormDefinition>> {
        Ok(self
            .forms
            .read()
            .get(form_id)
            .map(|stored| stored.definition.clone()))
    }

    async fn list_forms(&self) -> Result<Vec<StoredForm>> {
        let mut forms = self.forms.read().values().cloned().collect::<Vec<_>>();
        forms.sort_by(|a, b| a.definition.form_id.cmp(&b.definition.form_id));
        Ok(forms)
    }
}

#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(database_url)
            .await
            .with_context(|| format!("failed connecting to sqlite at {}", database_url))?;

        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS forms (
              form_id TEXT PRIMARY KEY,
              title TEXT NOT NULL,
              fields_json TEXT NOT NULL,
              created_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn decode_fields(form_id: &str, fields_json: &str) -> Result<Vec<FormField>> {
    serde_json::from_str(fields_json)
        .with_context(|| format!("stored fields for form {form_id} are not valid json"))
}

impl FormRepository for SqliteStore {
    async fn save_form(&self, definition: &FormDefinition) -> Result<()> {
        let fields_json = serde_json::to_string(&definition.fields)?;

        sqlx::query(
            r#"
            INSERT INTO forms (form_id, title, fields_json, created_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(form_id) DO UPDATE SET
              title=excluded.title,
              fields_json=excluded.fields_json
            "#,
        )
        .bind(&definition.form_id)
        .bind(&definition.title)
        .bind(fields_json)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn load_form(&self, form_id: &str) -> Result<Option<FormDefinition>> {
        let row = sqlx::query(
            r#"
            SELECT form_id, title, fields_json
            FROM forms
            WHERE form_id = ?1
            "#,
        )
        .bind(form_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let fields_json: String = row.get("fields_json");
        Ok(Some(FormDefinition {
            form_id: row.get("form_id"),
            title: row.get("title"),
            fields: decode_fields(form_id, &fields_json)?,
        }))
    }

    async fn list_forms(&self) -> Result<Vec<StoredForm>> {
        let rows = sqlx::query(
            r#"
            SELECT form_id, title, fields_json, created_at
            FROM forms
            ORDER BY form_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| -> Result<StoredForm> {
                let form_id: String = row.get("form_id");
                let fields_json: String = row.get("fields_json");
                Ok(StoredForm {
                    definition: FormDefinition {
                        fields: decode_fields(&form_id, &fields_json)?,
                        title: row.get("title"),
                        form_id,
                    },
                    created_at: row
                        .get::<String, _>("created_at")
                        .parse()
                        .unwrap_or_else(|_| Utc::now()),
                })
            })
            .collect()
    }
}

#[derive(Clone)]
pub enum Store {
    Memory(MemoryStore),
    Sqlite(SqliteStore),
}

impl Store {
    pub fn memory() -> Self {
        Self::Memory(MemoryStore::new())
    }

    pub async fn sqlite(database_url: &str) -> Result<Self> {
        let sqlite = SqliteStore::connect(database_url).await?;
        Ok(Self::Sqlite(sqlite))
    }

    pub async fn from_url(database_url: Option<&str>) -> Result<Self> {
        match database_url.map(str::trim).filter(|url| !url.is_empty()) {
            Some(url) => Self::sqlite(url).await,
            None => Ok(Self::memory()),
        }
    }

    pub fn backend(&self) -> &'static str {
        match self {
            Store::Memory(_) => "memory",
            Store::Sqlite(_) => "sqlite",
        }
    }
}

impl FormRepository for Store {
    async fn save_form(&self, definition: &FormDefinition) -> Result<()> {
        match self {
            Store::Memory(store) => store.save_form(definition).await,
            Store::Sqlite(store) => store.save_form(definition).await,
        }
    }

    async fn load_form(&self, form_id: &str) -> Result<Option<FormDefinition>> {
        match self {
            Store::Memory(store) => store.load_form(form_id).await,
            Store::Sqlite(store) => store.load_form(form_id).await,
        }
    }

    async fn list_forms(&self) -> Result<Vec<StoredForm>> {
        match self {
            Store::Memory(store) => store.list_forms().await,
            Store::Sqlite(store) => store.list_forms().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use cardwise_core::forms::field_from_name;

    use super::*;

    fn feedback_form() -> FormDefinition {
        FormDefinition {
            form_id: "form-0001".to_string(),
            title: "Feedback".to_string(),
            fields: vec![field_from_name("name"), field_from_name("rating")],
        }
    }

    #[tokio::test]
    async fn memory_store_round_trips_definitions() {
        let store = MemoryStore::new();
        store.save_form(&feedback_form()).await.unwrap();

        let loaded = store.load_form("form-0001").await.unwrap();
        assert_eq!(loaded, Some(feedback_form()));
        assert!(store.load_form("form-missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn resaving_keeps_one_entry() {
        let store = Store::memory();
        store.save_form(&feedback_form()).await.unwrap();
        store.save_form(&feedback_form()).await.unwrap();

        let forms = store.list_forms().await.unwrap();
        assert_eq!(forms.len(), 1);
        assert_eq!(store.backend(), "memory");
    }

    #[tokio::test]
    async fn blank_url_selects_memory() {
        let store = Store::from_url(Some("  ")).await.unwrap();
        assert_eq!(store.backend(), "memory");
    }
}
