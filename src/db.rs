//! SQLite database with Diesel ORM
//!
//! Stores the credit pricing list and deal submissions. Tables are created on
//! open; the whole deal record is kept as JSON alongside a few columns used
//! for listing and filtering.

use crate::deal::{DealStage, DealSubmission};
use crate::schema::*;
use crate::store::{self, DealStore, PricingStore, StoreError, PRICING_KEY};
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool, PooledConnection};
use diesel::sqlite::SqliteConnection;
use std::path::{Path, PathBuf};

/// Walk up directory tree to find .dealscope folder (like git finds .git)
/// Can be overridden with DEALSCOPE_DB_PATH env var
fn get_db_path() -> PathBuf {
    // Check env var first - always takes priority
    if let Ok(path) = std::env::var("DEALSCOPE_DB_PATH") {
        return PathBuf::from(path);
    }

    if let Ok(current_dir) = std::env::current_dir() {
        let mut dir = current_dir.as_path();
        loop {
            let dealscope_dir = dir.join(".dealscope");
            if dealscope_dir.is_dir() {
                return dealscope_dir.join("dealscope.db");
            }
            match dir.parent() {
                Some(parent) => dir = parent,
                None => break, // Reached filesystem root
            }
        }
    }

    // Nothing found - create it here on first open
    PathBuf::from(".dealscope/dealscope.db")
}

// ============================================================================
// Models
// ============================================================================

/// Insertable/replaceable setting
#[derive(Insertable)]
#[diesel(table_name = settings)]
struct NewSetting<'a> {
    key: &'a str,
    value_json: &'a str,
    updated_at: &'a str,
}

/// Insertable deal row
#[derive(Insertable)]
#[diesel(table_name = deal_submissions)]
struct NewDealRow<'a> {
    deal_id: &'a str,
    company: Option<&'a str>,
    requestor_name: &'a str,
    deal_stage: Option<&'a str>,
    payload_json: &'a str,
    created_at: &'a str,
    updated_at: &'a str,
}

/// Queryable deal row
#[derive(Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = deal_submissions)]
pub struct DealRow {
    pub id: i32,
    pub deal_id: String,
    pub company: Option<String>,
    pub requestor_name: String,
    pub deal_stage: Option<String>,
    pub payload_json: String,
    pub created_at: String,
    pub updated_at: String,
}

impl DealRow {
    /// Decode the stored record. Row columns win over the payload for identity.
    fn into_deal(self) -> Result<DealSubmission> {
        let mut deal: DealSubmission = serde_json::from_str(&self.payload_json)?;
        deal.id = Some(self.deal_id);
        deal.created_at = Some(self.created_at);
        deal.updated_at = Some(self.updated_at);
        Ok(deal)
    }
}

// ============================================================================
// Database Connection
// ============================================================================

type DbPool = Pool<ConnectionManager<SqliteConnection>>;
type DbConn = PooledConnection<ConnectionManager<SqliteConnection>>;

/// Database connection wrapper with connection pool
pub struct Database {
    pool: DbPool,
}

/// Error type for database operations
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("Connection error: {0}")]
    Connection(String),
    #[error("Query error: {0}")]
    Query(#[from] diesel::result::Error),
    #[error("Stored record is not valid JSON: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<DbError> for StoreError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::Serialization(e) => StoreError::Serialization(e),
            other => StoreError::Backend(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, DbError>;

impl Database {
    /// Get the database path that will be used
    pub fn db_path() -> PathBuf {
        get_db_path()
    }

    /// Create a new database at a custom path
    pub fn new(path: &str) -> Result<Self> {
        Self::open_at(path)
    }

    /// Open database at default path (respects DEALSCOPE_DB_PATH env var)
    pub fn open() -> Result<Self> {
        let path = get_db_path();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    DbError::Connection(format!("cannot create {}: {}", parent.display(), e))
                })?;
            }
        }
        Self::open_at(&path)
    }

    /// Open database at specified path
    pub fn open_at<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_str = path.as_ref().to_string_lossy().to_string();
        let manager = ConnectionManager::<SqliteConnection>::new(&path_str);
        let pool = Pool::builder()
            .max_size(5)
            .build(manager)
            .map_err(|e| DbError::Connection(e.to_string()))?;

        let db = Self { pool };
        db.init_schema()?;
        tracing::debug!(path = %path_str, "database opened");
        Ok(db)
    }

    fn get_conn(&self) -> Result<DbConn> {
        self.pool.get().map_err(|e| DbError::Connection(e.to_string()))
    }

    fn init_schema(&self) -> Result<()> {
        let mut conn = self.get_conn()?;

        diesel::sql_query(
            r#"
            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY NOT NULL,
                value_json TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
        "#,
        )
        .execute(&mut conn)?;

        diesel::sql_query(
            r#"
            CREATE TABLE IF NOT EXISTS deal_submissions (
                id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
                deal_id TEXT NOT NULL UNIQUE,
                company TEXT,
                requestor_name TEXT NOT NULL,
                deal_stage TEXT,
                payload_json TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
        "#,
        )
        .execute(&mut conn)?;

        diesel::sql_query("CREATE INDEX IF NOT EXISTS idx_deals_stage ON deal_submissions(deal_stage)")
            .execute(&mut conn)?;

        Ok(())
    }

    // ========================================================================
    // Settings
    // ========================================================================

    /// Raw JSON value of a setting
    pub fn get_setting(&self, name: &str) -> Result<Option<String>> {
        let mut conn = self.get_conn()?;
        let value = settings::table
            .filter(settings::key.eq(name))
            .select(settings::value_json)
            .first::<String>(&mut conn)
            .optional()?;
        Ok(value)
    }

    /// Insert or replace a setting
    pub fn put_setting(&self, name: &str, value_json: &str) -> Result<()> {
        let mut conn = self.get_conn()?;
        let now = chrono::Local::now().to_rfc3339();

        diesel::replace_into(settings::table)
            .values(&NewSetting {
                key: name,
                value_json,
                updated_at: &now,
            })
            .execute(&mut conn)?;
        Ok(())
    }

    // ========================================================================
    // Deals
    // ========================================================================

    /// Insert an already-stamped submission
    pub fn insert_deal(&self, deal: &DealSubmission) -> Result<()> {
        let mut conn = self.get_conn()?;
        let payload = serde_json::to_string(deal)?;
        let deal_id = deal.id.as_deref().unwrap_or_default();
        let created_at = deal.created_at.as_deref().unwrap_or_default();
        let updated_at = deal.updated_at.as_deref().unwrap_or(created_at);

        diesel::insert_into(deal_submissions::table)
            .values(&NewDealRow {
                deal_id,
                company: deal.company.as_deref(),
                requestor_name: &deal.requestor_name,
                deal_stage: deal.deal_stage.as_ref().map(|s| s.as_str()),
                payload_json: &payload,
                created_at,
                updated_at,
            })
            .execute(&mut conn)?;

        tracing::info!(deal_id, company = ?deal.company, "deal saved");
        Ok(())
    }

    /// All rows, in insertion order
    pub fn get_all_deal_rows(&self) -> Result<Vec<DealRow>> {
        let mut conn = self.get_conn()?;
        let rows = deal_submissions::table
            .order(deal_submissions::id.asc())
            .load::<DealRow>(&mut conn)?;
        Ok(rows)
    }

    pub fn get_deal_row(&self, deal_id: &str) -> Result<Option<DealRow>> {
        let mut conn = self.get_conn()?;
        let row = deal_submissions::table
            .filter(deal_submissions::deal_id.eq(deal_id))
            .first::<DealRow>(&mut conn)
            .optional()?;
        Ok(row)
    }

    pub fn get_deal_rows_by_stage(&self, stage: DealStage) -> Result<Vec<DealRow>> {
        let mut conn = self.get_conn()?;
        let rows = deal_submissions::table
            .filter(deal_submissions::deal_stage.eq(stage.as_str()))
            .order(deal_submissions::id.asc())
            .load::<DealRow>(&mut conn)?;
        Ok(rows)
    }

    /// Overwrite a stamped submission in place
    pub fn replace_deal(&self, deal: &DealSubmission) -> Result<bool> {
        let mut conn = self.get_conn()?;
        let payload = serde_json::to_string(deal)?;
        let deal_id = deal.id.as_deref().unwrap_or_default();
        let updated_at = deal.updated_at.as_deref().unwrap_or_default();

        let changed = diesel::update(deal_submissions::table.filter(deal_submissions::deal_id.eq(deal_id)))
            .set((
                deal_submissions::company.eq(deal.company.as_deref()),
                deal_submissions::requestor_name.eq(&deal.requestor_name),
                deal_submissions::deal_stage.eq(deal.deal_stage.as_ref().map(|s| s.as_str())),
                deal_submissions::payload_json.eq(&payload),
                deal_submissions::updated_at.eq(updated_at),
            ))
            .execute(&mut conn)?;
        Ok(changed > 0)
    }

    pub fn delete_deal_row(&self, deal_id: &str) -> Result<bool> {
        let mut conn = self.get_conn()?;
        let deleted = diesel::delete(deal_submissions::table.filter(deal_submissions::deal_id.eq(deal_id)))
            .execute(&mut conn)?;
        if deleted > 0 {
            tracing::info!(deal_id, "deal deleted");
        }
        Ok(deleted > 0)
    }
}

fn decode_rows(rows: Vec<DealRow>) -> Result<Vec<DealSubmission>> {
    rows.into_iter().map(DealRow::into_deal).collect()
}

impl PricingStore for Database {
    fn load_pricing_json(&self) -> store::Result<Option<String>> {
        Ok(self.get_setting(PRICING_KEY)?)
    }

    fn save_pricing_json(&self, json: &str) -> store::Result<()> {
        Ok(self.put_setting(PRICING_KEY, json)?)
    }
}

impl DealStore for Database {
    fn save_deal(&self, deal: DealSubmission) -> store::Result<DealSubmission> {
        let deal = store::prepare_new(deal);
        self.insert_deal(&deal)?;
        Ok(deal)
    }

    fn all_deals(&self) -> store::Result<Vec<DealSubmission>> {
        Ok(decode_rows(self.get_all_deal_rows()?)?)
    }

    fn deal_by_id(&self, id: &str) -> store::Result<Option<DealSubmission>> {
        Ok(self.get_deal_row(id)?.map(DealRow::into_deal).transpose()?)
    }

    fn deals_in_stage(&self, stage: DealStage) -> store::Result<Vec<DealSubmission>> {
        Ok(decode_rows(self.get_deal_rows_by_stage(stage)?)?)
    }

    fn update_deal(&self, id: &str, deal: DealSubmission) -> store::Result<Option<DealSubmission>> {
        let Some(existing) = self.deal_by_id(id)? else {
            return Ok(None);
        };
        let updated = store::prepare_update(&existing, deal);
        self.replace_deal(&updated)?;
        Ok(Some(updated))
    }

    fn delete_deal(&self, id: &str) -> store::Result<bool> {
        Ok(self.delete_deal_row(id)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::{keys, PricingTable};
    use tempfile::TempDir;

    fn temp_db() -> (TempDir, Database) {
        let dir = TempDir::new().unwrap();
        let db = Database::open_at(dir.path().join("test.db")).unwrap();
        (dir, db)
    }

    fn deal(name: &str, stage: Option<DealStage>) -> DealSubmission {
        DealSubmission {
            requestor_name: name.to_string(),
            requestor_email: format!("{}@example.com", name.to_lowercase()),
            company: Some(format!("{} Corp", name)),
            deal_stage: stage,
            ..Default::default()
        }
    }

    #[test]
    fn test_settings_replace() {
        let (_dir, db) = temp_db();
        assert!(db.get_setting("x").unwrap().is_none());
        db.put_setting("x", "1").unwrap();
        db.put_setting("x", "2").unwrap();
        assert_eq!(db.get_setting("x").unwrap().as_deref(), Some("2"));
    }

    #[test]
    fn test_pricing_table_persists() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pricing.db");
        {
            let db = Database::open_at(&path).unwrap();
            PricingTable::new(&db).set_rate(keys::WEB_FETCH, 0.3).unwrap();
        }
        let reopened = Database::open_at(&path).unwrap();
        let table = PricingTable::new(&reopened);
        assert_eq!(table.get_rate(keys::WEB_FETCH).unwrap(), Some(0.3));
        assert_eq!(table.rate_card().unwrap().web_fetch, 0.3);
    }

    #[test]
    fn test_deal_roundtrip_through_rows() {
        let (_dir, db) = temp_db();
        let mut submission = deal("Ada", Some(DealStage::Shortlist));
        submission.critical_integrations = ["Salesforce", "Jira"].into_iter().collect();
        let saved = db.save_deal(submission).unwrap();
        let id = saved.id.clone().unwrap();

        let loaded = db.deal_by_id(&id).unwrap().unwrap();
        assert_eq!(loaded, saved);

        let row = db.get_deal_row(&id).unwrap().unwrap();
        assert_eq!(row.deal_stage.as_deref(), Some("Shortlist"));
        assert_eq!(row.company.as_deref(), Some("Ada Corp"));
    }

    #[test]
    fn test_list_order_and_stage_filter() {
        let (_dir, db) = temp_db();
        db.save_deal(deal("Ada", Some(DealStage::Rfp))).unwrap();
        db.save_deal(deal("Grace", None)).unwrap();
        db.save_deal(deal("Linus", Some(DealStage::Rfp))).unwrap();

        let names: Vec<String> = db
            .all_deals()
            .unwrap()
            .into_iter()
            .map(|d| d.requestor_name)
            .collect();
        assert_eq!(names, vec!["Ada", "Grace", "Linus"]);

        let rfp = db.deals_in_stage(DealStage::Rfp).unwrap();
        assert_eq!(rfp.len(), 2);
        assert!(db.deals_in_stage(DealStage::Negotiation).unwrap().is_empty());
    }

    #[test]
    fn test_save_replaces_caller_identity() {
        let (_dir, db) = temp_db();
        crate::store::contract::save_replaces_caller_identity(&db);
    }

    #[test]
    fn test_unlisted_stage_is_kept_verbatim() {
        let (_dir, db) = temp_db();
        let saved = db
            .save_deal(deal("Ada", Some(DealStage::Other("Verbal yes".to_string()))))
            .unwrap();
        let id = saved.id.unwrap();

        let row = db.get_deal_row(&id).unwrap().unwrap();
        assert_eq!(row.deal_stage.as_deref(), Some("Verbal yes"));
        let loaded = db.deal_by_id(&id).unwrap().unwrap();
        assert_eq!(loaded.deal_stage, Some(DealStage::Other("Verbal yes".to_string())));
        assert!(db.deals_in_stage(DealStage::Rfp).unwrap().is_empty());
    }

    #[test]
    fn test_update_and_delete() {
        let (_dir, db) = temp_db();
        let saved = db.save_deal(deal("Ada", None)).unwrap();
        let id = saved.id.clone().unwrap();

        let updated = db
            .update_deal(&id, deal("Ada", Some(DealStage::Negotiation)))
            .unwrap()
            .unwrap();
        assert_eq!(updated.created_at, saved.created_at);
        assert_eq!(db.deals_in_stage(DealStage::Negotiation).unwrap().len(), 1);

        assert!(db.update_deal("missing", deal("X", None)).unwrap().is_none());
        assert!(db.delete_deal(&id).unwrap());
        assert!(!db.delete_deal(&id).unwrap());
        assert!(db.all_deals().unwrap().is_empty());
    }

    #[test]
    fn test_corrupt_payload_is_an_error() {
        let (_dir, db) = temp_db();
        let saved = db.save_deal(deal("Ada", None)).unwrap();
        let mut conn = db.get_conn().unwrap();
        diesel::sql_query("UPDATE deal_submissions SET payload_json = '{oops'")
            .execute(&mut conn)
            .unwrap();
        drop(conn);

        let err = db.deal_by_id(saved.id.as_deref().unwrap()).unwrap_err();
        assert!(matches!(err, StoreError::Serialization(_)));
    }
}
