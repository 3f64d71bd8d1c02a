use anyhow::{Result, anyhow};
use autoscale_cuckoo_filter::CuckooFilter;
use futures::StreamExt;
use once_cell::sync::Lazy;
use sqlx::MySqlPool;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Expected capacity and false-positive rate.
const FILTER_CAPACITY: usize = 100_000;
const FALSE_POSITIVE_RATE: f64 = 0.001;

static LOGIN_ID_FILTER: Lazy<RwLock<CuckooFilter<String>>> =
    Lazy::new(|| RwLock::new(CuckooFilter::new(FILTER_CAPACITY, FALSE_POSITIVE_RATE)));

// Login ids are case-sensitive: tense consonants map to uppercase keys.
#[inline]
fn normalize(login_id: &str) -> String {
    login_id.trim().to_string()
}

// A panic while holding the lock leaves the filter itself intact.
fn read() -> RwLockReadGuard<'static, CuckooFilter<String>> {
    LOGIN_ID_FILTER.read().unwrap_or_else(|e| e.into_inner())
}

fn write() -> RwLockWriteGuard<'static, CuckooFilter<String>> {
    LOGIN_ID_FILTER.write().unwrap_or_else(|e| e.into_inner())
}

/// False positives possible, false negatives not.
pub fn might_exist(login_id: &str) -> bool {
    read().contains(&normalize(login_id))
}

pub fn insert(login_id: &str) {
    write().add(&normalize(login_id));
}

/// Streams every login id into the filter in batches.
pub async fn warmup_login_id_filter(pool: &MySqlPool, batch_size: usize) -> Result<()> {
    let mut stream = sqlx::query_as::<_, (String,)>("SELECT login_id FROM users").fetch(pool);

    let mut batch = Vec::with_capacity(batch_size);
    let mut total = 0usize;

    while let Some(row) = stream.next().await {
        let (login_id,) = row.map_err(|e| anyhow!("DB row fetch failed: {}", e))?;

        batch.push(normalize(&login_id));
        total += 1;

        if batch.len() == batch_size {
            insert_batch(&batch);
            batch.clear();
        }
    }

    if !batch.is_empty() {
        insert_batch(&batch);
    }

    tracing::info!(total, "Login id filter warmup complete");
    Ok(())
}

fn insert_batch(login_ids: &[String]) {
    let mut filter = write();
    for login_id in login_ids {
        filter.add(login_id);
    }
}
