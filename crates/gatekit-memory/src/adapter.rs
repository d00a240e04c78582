// In-memory Adapter: HashMap<model, Vec<Value>> behind a tokio RwLock.
//
// `take` holds the write lock across the find and the remove, which is what
// makes state/code consumption at-most-once under concurrent requests.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use gatekit_core::db::adapter::{
    Adapter, AdapterResult, Connector, FindManyQuery, Operator, SchemaOptions, SchemaStatus,
    SortDirection, WhereClause,
};
use gatekit_core::db::schema::AuthSchema;

type Store = HashMap<String, Vec<serde_json::Value>>;

/// In-memory database adapter.
#[derive(Debug, Clone, Default)]
pub struct MemoryAdapter {
    store: Arc<RwLock<Store>>,
}

impl MemoryAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all data, for assertions in tests.
    pub async fn snapshot(&self) -> Store {
        self.store.read().await.clone()
    }

    /// Number of rows in a model.
    pub async fn model_count(&self, model: &str) -> usize {
        self.store
            .read()
            .await
            .get(model)
            .map(|rows| rows.len())
            .unwrap_or(0)
    }

    pub async fn clear(&self) {
        self.store.write().await.clear();
    }
}

/// Evaluate a record against a clause list. Clauses chain left-to-right; an
/// `Or` connector applies to the clause that follows it.
fn matches_where(record: &serde_json::Value, clauses: &[WhereClause]) -> bool {
    if clauses.is_empty() {
        return true;
    }

    let mut result = true;
    let mut pending_or = false;

    for clause in clauses {
        let field_val = record
            .get(&clause.field)
            .cloned()
            .unwrap_or(serde_json::Value::Null);
        let clause_match = match_operator(&field_val, &clause.value, &clause.operator);

        if pending_or {
            result = result || clause_match;
        } else {
            result = result && clause_match;
        }

        pending_or = matches!(clause.connector, Some(Connector::Or));
    }

    result
}

fn match_operator(
    field_val: &serde_json::Value,
    target: &serde_json::Value,
    op: &Operator,
) -> bool {
    match op {
        Operator::Eq => field_val == target,
        Operator::Ne => field_val != target,
        Operator::Lt => compare_json(field_val, target).is_some_and(|c| c < 0),
        Operator::Lte => compare_json(field_val, target).is_some_and(|c| c <= 0),
        Operator::Gt => compare_json(field_val, target).is_some_and(|c| c > 0),
        Operator::Gte => compare_json(field_val, target).is_some_and(|c| c >= 0),
        Operator::In => match target {
            serde_json::Value::Array(arr) => arr.contains(field_val),
            _ => false,
        },
        Operator::Contains => str_pair(field_val, target).is_some_and(|(f, t)| f.contains(t)),
        Operator::StartsWith => str_pair(field_val, target).is_some_and(|(f, t)| f.starts_with(t)),
        Operator::EndsWith => str_pair(field_val, target).is_some_and(|(f, t)| f.ends_with(t)),
    }
}

fn str_pair<'a>(
    a: &'a serde_json::Value,
    b: &'a serde_json::Value,
) -> Option<(&'a str, &'a str)> {
    Some((a.as_str()?, b.as_str()?))
}

fn compare_json(a: &serde_json::Value, b: &serde_json::Value) -> Option<i8> {
    use std::cmp::Ordering;
    let ord = match (a, b) {
        (serde_json::Value::Number(an), serde_json::Value::Number(bn)) => {
            an.as_f64()?.partial_cmp(&bn.as_f64()?)?
        }
        (serde_json::Value::String(a_s), serde_json::Value::String(b_s)) => a_s.cmp(b_s),
        _ => return None,
    };
    Some(match ord {
        Ordering::Less => -1,
        Ordering::Equal => 0,
        Ordering::Greater => 1,
    })
}

/// Fill generated fields (id, timestamps) on create.
fn apply_generated_fields(data: &mut serde_json::Value) {
    if let Some(obj) = data.as_object_mut() {
        if !obj.contains_key("id") {
            obj.insert("id".into(), serde_json::Value::String(nanoid::nanoid!()));
        }
        let now = chrono::Utc::now().to_rfc3339();
        obj.entry("createdAt")
            .or_insert(serde_json::Value::String(now.clone()));
        obj.entry("updatedAt")
            .or_insert(serde_json::Value::String(now));
    }
}

fn apply_select(record: &serde_json::Value, select: Option<&[String]>) -> serde_json::Value {
    match select {
        None => record.clone(),
        Some(fields) => {
            let mut out = serde_json::Map::new();
            if let Some(obj) = record.as_object() {
                for field in fields {
                    if let Some(value) = obj.get(field) {
                        out.insert(field.clone(), value.clone());
                    }
                }
            }
            serde_json::Value::Object(out)
        }
    }
}

#[async_trait]
impl Adapter for MemoryAdapter {
    async fn create(
        &self,
        model: &str,
        mut data: serde_json::Value,
        select: Option<&[String]>,
    ) -> AdapterResult<serde_json::Value> {
        apply_generated_fields(&mut data);
        let mut store = self.store.write().await;
        store.entry(model.to_string()).or_default().push(data.clone());
        Ok(apply_select(&data, select))
    }

    async fn find_one(
        &self,
        model: &str,
        where_clauses: &[WhereClause],
    ) -> AdapterResult<Option<serde_json::Value>> {
        let store = self.store.read().await;
        Ok(store
            .get(model)
            .and_then(|rows| rows.iter().find(|r| matches_where(r, where_clauses)))
            .cloned())
    }

    async fn find_many(
        &self,
        model: &str,
        query: FindManyQuery,
    ) -> AdapterResult<Vec<serde_json::Value>> {
        let store = self.store.read().await;
        let mut rows: Vec<serde_json::Value> = store
            .get(model)
            .map(|rows| {
                rows.iter()
                    .filter(|r| matches_where(r, &query.where_clauses))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        if let Some(sort) = &query.sort_by {
            rows.sort_by(|a, b| {
                let av = a.get(&sort.field).cloned().unwrap_or(serde_json::Value::Null);
                let bv = b.get(&sort.field).cloned().unwrap_or(serde_json::Value::Null);
                let ord = compare_json(&av, &bv).unwrap_or(0);
                match sort.direction {
                    SortDirection::Asc => ord.cmp(&0),
                    SortDirection::Desc => 0.cmp(&ord),
                }
            });
        }

        let offset = query.offset.unwrap_or(0).max(0) as usize;
        if offset > 0 {
            rows = rows.into_iter().skip(offset).collect();
        }
        if let Some(limit) = query.limit {
            rows.truncate(limit.max(0) as usize);
        }

        if let Some(select) = &query.select {
            rows = rows.iter().map(|r| apply_select(r, Some(select))).collect();
        }

        Ok(rows)
    }

    async fn count(&self, model: &str, where_clauses: &[WhereClause]) -> AdapterResult<i64> {
        let store = self.store.read().await;
        Ok(store
            .get(model)
            .map(|rows| rows.iter().filter(|r| matches_where(r, where_clauses)).count())
            .unwrap_or(0) as i64)
    }

    async fn update(
        &self,
        model: &str,
        where_clauses: &[WhereClause],
        data: serde_json::Value,
    ) -> AdapterResult<Option<serde_json::Value>> {
        let mut store = self.store.write().await;
        let rows = match store.get_mut(model) {
            Some(rows) => rows,
            None => return Ok(None),
        };

        for row in rows.iter_mut() {
            if matches_where(row, where_clauses) {
                if let (Some(row_obj), Some(patch)) = (row.as_object_mut(), data.as_object()) {
                    for (k, v) in patch {
                        row_obj.insert(k.clone(), v.clone());
                    }
                    row_obj.insert(
                        "updatedAt".into(),
                        serde_json::Value::String(chrono::Utc::now().to_rfc3339()),
                    );
                }
                return Ok(Some(row.clone()));
            }
        }
        Ok(None)
    }

    async fn update_many(
        &self,
        model: &str,
        where_clauses: &[WhereClause],
        data: serde_json::Value,
    ) -> AdapterResult<i64> {
        let mut store = self.store.write().await;
        let rows = match store.get_mut(model) {
            Some(rows) => rows,
            None => return Ok(0),
        };

        let mut affected = 0;
        for row in rows.iter_mut() {
            if matches_where(row, where_clauses) {
                if let (Some(row_obj), Some(patch)) = (row.as_object_mut(), data.as_object()) {
                    for (k, v) in patch {
                        row_obj.insert(k.clone(), v.clone());
                    }
                }
                affected += 1;
            }
        }
        Ok(affected)
    }

    async fn delete(&self, model: &str, where_clauses: &[WhereClause]) -> AdapterResult<()> {
        let mut store = self.store.write().await;
        if let Some(rows) = store.get_mut(model) {
            if let Some(pos) = rows.iter().position(|r| matches_where(r, where_clauses)) {
                rows.remove(pos);
            }
        }
        Ok(())
    }

    async fn delete_many(
        &self,
        model: &str,
        where_clauses: &[WhereClause],
    ) -> AdapterResult<i64> {
        let mut store = self.store.write().await;
        if let Some(rows) = store.get_mut(model) {
            let before = rows.len();
            rows.retain(|r| !matches_where(r, where_clauses));
            return Ok((before - rows.len()) as i64);
        }
        Ok(0)
    }

    async fn take(
        &self,
        model: &str,
        where_clauses: &[WhereClause],
    ) -> AdapterResult<Option<serde_json::Value>> {
        let mut store = self.store.write().await;
        if let Some(rows) = store.get_mut(model) {
            if let Some(pos) = rows.iter().position(|r| matches_where(r, where_clauses)) {
                return Ok(Some(rows.remove(pos)));
            }
        }
        Ok(None)
    }

    async fn create_schema(
        &self,
        _schema: &AuthSchema,
        _options: &SchemaOptions,
    ) -> AdapterResult<SchemaStatus> {
        // Schemaless store; nothing to migrate.
        Ok(SchemaStatus::UpToDate)
    }
}
