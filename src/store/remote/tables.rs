use std::marker::PhantomData;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use sqlx::{types::Json, PgPool, Postgres, QueryBuilder};

use crate::models::{DailyVisit, Entity, RecordId, VisitorLocation};
use crate::store::{ListFilter, Repository, StoreError, VisitLedger};

/// Primary key of the single row in `visits`.
pub const VISIT_ROW_ID: &str = "total";

/// `r.a, r.b, ...` for selecting entity fields out of a populated record.
fn qualified_fields<E: Entity>() -> String {
    E::FIELDS
        .iter()
        .map(|f| format!("r.{}", f))
        .collect::<Vec<_>>()
        .join(", ")
}

/// One table per entity. Rows cross the wire as JSONB (`to_jsonb` out,
/// `jsonb_populate_record` in) so the serde shape of `E` is the row shape.
pub struct TableRepository<E> {
    pool: PgPool,
    _marker: PhantomData<fn() -> E>,
}

impl<E: Entity> TableRepository<E> {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            _marker: PhantomData,
        }
    }

    fn list_query(filter: &ListFilter) -> QueryBuilder<'static, Postgres> {
        let mut qb = QueryBuilder::new(format!("SELECT to_jsonb(t) FROM {} AS t", E::COLLECTION));

        if let Some(column) = E::CATEGORY_FIELD {
            let mut joiner = " WHERE ";
            if let Some(category) = &filter.category {
                qb.push(joiner)
                    .push("t.")
                    .push(column)
                    .push(" = ")
                    .push_bind(category.clone());
                joiner = " AND ";
            }
            if !filter.exclude_categories.is_empty() {
                qb.push(joiner)
                    .push("NOT (t.")
                    .push(column)
                    .push(" = ANY(")
                    .push_bind(filter.exclude_categories.clone())
                    .push("))");
            }
        }

        qb.push(" ORDER BY ").push(E::ORDER_BY);
        if let Some(limit) = filter.limit {
            qb.push(" LIMIT ").push_bind(limit as i64);
        }
        qb
    }

    fn insert_sql() -> String {
        format!(
            "INSERT INTO {table} AS t ({columns}) \
             SELECT {fields} FROM jsonb_populate_record(NULL::{table}, $1) AS r \
             RETURNING to_jsonb(t)",
            table = E::COLLECTION,
            columns = E::FIELDS.join(", "),
            fields = qualified_fields::<E>(),
        )
    }

    fn update_sql() -> String {
        format!(
            "UPDATE {table} AS t SET ({columns}) = \
             (SELECT {fields} FROM jsonb_populate_record(NULL::{table}, $1) AS r) \
             WHERE t.id = $2 RETURNING to_jsonb(t)",
            table = E::COLLECTION,
            columns = E::FIELDS.join(", "),
            fields = qualified_fields::<E>(),
        )
    }
}

#[async_trait]
impl<E: Entity> Repository<E> for TableRepository<E> {
    async fn list(&self, filter: &ListFilter) -> Result<Vec<E>, StoreError> {
        let rows: Vec<Json<E>> = Self::list_query(filter)
            .build_query_scalar()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|Json(e)| e).collect())
    }

    async fn create(&self, new: E::New) -> Result<E, StoreError> {
        // The id is assigned by the table; the placeholder never reaches SQL.
        let draft = E::build(0, new, Utc::now());
        let Json(record) = sqlx::query_scalar::<_, Json<E>>(&Self::insert_sql())
            .bind(Json(serde_json::to_value(&draft)?))
            .fetch_one(&self.pool)
            .await?;
        tracing::debug!(table = E::COLLECTION, id = record.id(), "row inserted");
        Ok(record)
    }

    async fn update(&self, id: RecordId, patch: E::Patch) -> Result<E, StoreError> {
        let mut tx = self.pool.begin().await?;

        let current: Option<Json<E>> = sqlx::query_scalar(&format!(
            "SELECT to_jsonb(t) FROM {} AS t WHERE t.id = $1 FOR UPDATE",
            E::COLLECTION
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let Json(mut record) = current.ok_or(StoreError::NotFound { label: E::LABEL, id })?;
        record.apply(patch, Utc::now());

        let Json(updated) = sqlx::query_scalar::<_, Json<E>>(&Self::update_sql())
            .bind(Json(serde_json::to_value(&record)?))
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(updated)
    }

    async fn delete(&self, id: RecordId) -> Result<E, StoreError> {
        let deleted: Option<Json<E>> = sqlx::query_scalar(&format!(
            "DELETE FROM {} AS t WHERE t.id = $1 RETURNING to_jsonb(t)",
            E::COLLECTION
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        deleted
            .map(|Json(e)| e)
            .ok_or(StoreError::NotFound { label: E::LABEL, id })
    }
}

pub struct TableVisitLedger {
    pool: PgPool,
}

impl TableVisitLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn to_count(value: i64) -> u64 {
    value.max(0) as u64
}

#[async_trait]
impl VisitLedger for TableVisitLedger {
    async fn total(&self) -> Result<u64, StoreError> {
        let count: Option<i64> = sqlx::query_scalar("SELECT visit_count FROM visits WHERE id = $1")
            .bind(VISIT_ROW_ID)
            .fetch_optional(&self.pool)
            .await?;
        Ok(count.map(to_count).unwrap_or(0))
    }

    async fn increment_total(&self) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO visits (id, visit_count) VALUES ($1, 1)
            ON CONFLICT (id) DO UPDATE SET visit_count = visits.visit_count + 1
            RETURNING visit_count
            "#,
        )
        .bind(VISIT_ROW_ID)
        .fetch_one(&self.pool)
        .await?;
        Ok(to_count(count))
    }

    async fn daily(&self) -> Result<Vec<DailyVisit>, StoreError> {
        let rows: Vec<(NaiveDate, i64)> =
            sqlx::query_as("SELECT date, count FROM daily_visits ORDER BY date ASC")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows
            .into_iter()
            .map(|(date, count)| DailyVisit {
                date,
                count: to_count(count),
            })
            .collect())
    }

    async fn increment_day(&self, date: NaiveDate) -> Result<DailyVisit, StoreError> {
        let (date, count): (NaiveDate, i64) = sqlx::query_as(
            r#"
            INSERT INTO daily_visits (date, count) VALUES ($1, 1)
            ON CONFLICT (date) DO UPDATE SET count = daily_visits.count + 1
            RETURNING date, count
            "#,
        )
        .bind(date)
        .fetch_one(&self.pool)
        .await?;
        Ok(DailyVisit {
            date,
            count: to_count(count),
        })
    }

    async fn locations(&self, limit: usize) -> Result<Vec<VisitorLocation>, StoreError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows: Vec<Json<VisitorLocation>> = sqlx::query_scalar(
            r#"
            SELECT to_jsonb(l) FROM visitor_locations AS l
            ORDER BY l.created_at DESC, l.id DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|Json(l)| l).collect())
    }

    async fn record_location(&self, location: VisitorLocation) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO visitor_locations (ip, date, country, region, city, note)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(&location.ip)
        .bind(location.date)
        .bind(&location.country)
        .bind(&location.region)
        .bind(&location.city)
        .bind(&location.note)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Blog, BlogPatch, NewBlog, NewProject, Project, Skill};

    #[test]
    fn test_insert_sql_lists_fields_without_id() {
        let sql = TableRepository::<Blog>::insert_sql();
        assert!(sql.starts_with(
            "INSERT INTO blogs AS t (title, content, image_url, created_at, updated_at)"
        ));
        assert!(sql.contains("jsonb_populate_record(NULL::blogs, $1)"));
        assert!(!sql.contains("r.id"));
    }

    #[test]
    fn test_update_sql_targets_id() {
        let sql = TableRepository::<Skill>::update_sql();
        assert!(sql.contains("SET (name, category, proficiency, description, icon)"));
        assert!(sql.ends_with("WHERE t.id = $2 RETURNING to_jsonb(t)"));
    }

    #[test]
    fn test_list_query_with_exclusions() {
        let filter = ListFilter {
            exclude_categories: vec!["Photography".into(), "Image Artistry".into()],
            ..Default::default()
        };
        let qb = TableRepository::<Project>::list_query(&filter);
        assert_eq!(
            qb.sql(),
            "SELECT to_jsonb(t) FROM projects AS t WHERE NOT (t.category = ANY($1)) \
             ORDER BY created_at DESC, id DESC"
        );
    }

    #[test]
    fn test_list_query_category_and_limit() {
        let filter = ListFilter {
            category: Some("Photography".into()),
            exclude_categories: vec!["Other".into()],
            limit: Some(5),
        };
        let qb = TableRepository::<Project>::list_query(&filter);
        assert_eq!(
            qb.sql(),
            "SELECT to_jsonb(t) FROM projects AS t WHERE t.category = $1 \
             AND NOT (t.category = ANY($2)) ORDER BY created_at DESC, id DESC LIMIT $3"
        );
    }

    #[test]
    fn test_list_query_ignores_category_for_uncategorized_entities() {
        let qb = TableRepository::<Blog>::list_query(&ListFilter::category("x"));
        assert_eq!(
            qb.sql(),
            "SELECT to_jsonb(t) FROM blogs AS t ORDER BY created_at DESC, id DESC"
        );
    }

    // The tests below need a scratch Postgres database:
    // TEST_DATABASE_URL=postgres://... cargo test -- --ignored
    // Each one truncates only the tables it uses.

    static MIGRATED: tokio::sync::Mutex<bool> = tokio::sync::Mutex::const_new(false);

    async fn scratch_pool(tables: &str) -> PgPool {
        let url = std::env::var("TEST_DATABASE_URL").expect("TEST_DATABASE_URL must be set");
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(2)
            .connect(&url)
            .await
            .unwrap();
        {
            let mut migrated = MIGRATED.lock().await;
            if !*migrated {
                crate::store::remote::run_migrations(&pool).await.unwrap();
                *migrated = true;
            }
        }
        sqlx::query(&format!("TRUNCATE {} RESTART IDENTITY", tables))
            .execute(&pool)
            .await
            .unwrap();
        pool
    }

    #[tokio::test]
    #[ignore = "needs TEST_DATABASE_URL"]
    async fn test_blog_rows_round_trip() {
        let repo = TableRepository::<Blog>::new(scratch_pool("blogs").await);

        let created = repo
            .create(NewBlog {
                title: "Hello".into(),
                content: "First post".into(),
                image_url: Some("/img/a.png".into()),
            })
            .await
            .unwrap();
        assert!(created.id > 0);

        let listed = repo.list(&ListFilter::default()).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, created.id);
        assert_eq!(listed[0].content, "First post");

        let updated = repo
            .update(
                created.id,
                BlogPatch {
                    title: Some("Hello again".into()),
                    image_url: Some(None),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.title, "Hello again");
        assert_eq!(updated.content, "First post");
        assert_eq!(updated.image_url, None);

        let missing = created.id + 1000;
        let err = repo.update(missing, BlogPatch::default()).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { id, .. } if id == missing));
        let err = repo.delete(missing).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));

        let deleted = repo.delete(created.id).await.unwrap();
        assert_eq!(deleted.id, created.id);
        assert!(repo.list(&ListFilter::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    #[ignore = "needs TEST_DATABASE_URL"]
    async fn test_project_rows_filter_by_category() {
        let repo = TableRepository::<Project>::new(scratch_pool("projects").await);
        for (title, category) in [("Site", "Web Development"), ("Portraits", "Photography")] {
            repo.create(NewProject {
                title: title.into(),
                description: String::new(),
                client: None,
                duration: None,
                link: None,
                image_url: None,
                category: category.into(),
            })
            .await
            .unwrap();
        }

        let photos = repo.list(&ListFilter::category("Photography")).await.unwrap();
        assert_eq!(photos.len(), 1);
        assert_eq!(photos[0].title, "Portraits");

        let tech = repo
            .list(&ListFilter {
                exclude_categories: vec!["Photography".into()],
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(tech.len(), 1);
        assert_eq!(tech[0].title, "Site");
    }

    #[tokio::test]
    #[ignore = "needs TEST_DATABASE_URL"]
    async fn test_visit_rows_upsert() {
        let ledger =
            TableVisitLedger::new(scratch_pool("visits, daily_visits, visitor_locations").await);
        let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();

        assert_eq!(ledger.total().await.unwrap(), 0);
        ledger.increment_total().await.unwrap();
        assert_eq!(ledger.increment_total().await.unwrap(), 2);
        assert_eq!(ledger.total().await.unwrap(), 2);

        ledger.increment_day(today).await.unwrap();
        let again = ledger.increment_day(today).await.unwrap();
        assert_eq!(again.count, 2);
        let daily = ledger.daily().await.unwrap();
        assert_eq!(daily.len(), 1);
        assert_eq!(daily[0].date, today);
        assert_eq!(daily[0].count, 2);

        for ip in ["203.0.113.1", "203.0.113.2", "203.0.113.3"] {
            ledger
                .record_location(VisitorLocation::new(ip, today).with_note("test"))
                .await
                .unwrap();
        }
        let recent = ledger.locations(2).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].ip, "203.0.113.3");
        assert_eq!(recent[0].note.as_deref(), Some("test"));
    }
}
