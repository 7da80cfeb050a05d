//! Simulated backend for the demo sessions.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use gridstate_lib::{BlockFetcher, BlockRequest, ChildFetcher, FetchError, GridRow, Record, RowDecorator};
use serde_json::{Value, json};

const NAMES: [&str; 8] = [
    "Ada", "Brook", "Cyril", "Dana", "Emil", "Fern", "Gus", "Hana",
];

fn person(id: u64) -> Record {
    let name = NAMES[(id as usize) % NAMES.len()];
    Record::new(id)
        .with_field("name", format!("{} {}", name, id))
        .with_field("age", 18 + (id * 37) % 60)
}

/// A paged people endpoint with artificial latency.
pub struct PeopleServer {
    total: u64,
    latency: Duration,
    /// Fail every n-th request (0 disables).
    fail_every: usize,
    requests: AtomicUsize,
}

impl PeopleServer {
    pub fn new(total: u64, latency: Duration) -> Self {
        Self {
            total,
            latency,
            fail_every: 0,
            requests: AtomicUsize::new(0),
        }
    }

    pub fn with_fail_every(mut self, n: usize) -> Self {
        self.fail_every = n;
        self
    }
}

#[async_trait]
impl BlockFetcher<Record> for PeopleServer {
    async fn fetch_block(&self, request: &BlockRequest) -> Result<Option<Vec<Record>>, FetchError> {
        let n = self.requests.fetch_add(1, Ordering::SeqCst) + 1;
        log::info!(
            "[server] rows {}..{} sort {:?}",
            request.start_row,
            request.end_row,
            request.sort_fields()
        );
        tokio::time::sleep(self.latency).await;

        if self.fail_every > 0 && n % self.fail_every == 0 {
            return Err(FetchError::host(format!("request {} dropped", n)));
        }

        let mut people: Vec<Record> = (0..self.total).map(person).collect();
        if let Some(sort) = &request.sort {
            people.sort_by(|a, b| {
                let ord = match (a.get(&sort.column_id), b.get(&sort.column_id)) {
                    (Some(Value::Number(x)), Some(Value::Number(y))) => x
                        .as_f64()
                        .partial_cmp(&y.as_f64())
                        .unwrap_or(std::cmp::Ordering::Equal),
                    _ => a.field(&sort.column_id).cmp(&b.field(&sort.column_id)),
                };
                if sort.descending { ord.reverse() } else { ord }
            });
        }

        Ok(Some(
            people
                .into_iter()
                .skip(request.start_row)
                .take(request.len())
                .collect(),
        ))
    }
}

/// Badges people over 60.
pub struct SeniorBadge;

#[async_trait]
impl RowDecorator<Record> for SeniorBadge {
    async fn decorate(&self, row: &Record) -> Option<Value> {
        let age = row.get("age").and_then(Value::as_u64)?;
        (age > 60).then(|| json!({ "badge": "senior" }))
    }
}

/// A folder tree: every folder above `max_id` is a leaf.
pub struct FolderServer {
    latency: Duration,
    max_id: u64,
}

impl FolderServer {
    pub fn new(latency: Duration, max_id: u64) -> Self {
        Self { latency, max_id }
    }

    /// Top-level folders.
    pub fn roots(&self, count: u64) -> Vec<Record> {
        (1..=count).map(|id| self.folder(id)).collect()
    }

    fn folder(&self, id: u64) -> Record {
        let record = Record::new(id).with_field("name", format!("folder-{}", id));
        if id * 10 > self.max_id {
            return record;
        }
        record.with_children((1..=3).map(|k| id * 10 + k))
    }
}

#[async_trait]
impl ChildFetcher<Record> for FolderServer {
    async fn fetch_children(&self, parent: &Record) -> Result<Vec<Record>, FetchError> {
        log::info!("[server] children of {}", parent.id);
        tokio::time::sleep(self.latency).await;
        Ok(parent.child_ids().iter().map(|&id| self.folder(id)).collect())
    }
}
