//! Parity split: two workers scan the same range concurrently, one keeping
//! odd values and the other even values.

use std::thread;

use serde::Serialize;

use crate::utils::{LabError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParityReport {
    pub odds: Vec<u64>,
    pub evens: Vec<u64>,
}

fn spawn_filter(
    name: &str,
    limit: u64,
    keep_odd: bool,
) -> Result<thread::JoinHandle<Vec<u64>>> {
    let handle = thread::Builder::new()
        .name(name.to_string())
        .spawn(move || {
            (1..=limit)
                .filter(|v| (v % 2 == 1) == keep_odd)
                .collect()
        })?;
    Ok(handle)
}

/// Split `1..=limit` between an odd worker and an even worker
pub fn split_by_parity(limit: u64) -> Result<ParityReport> {
    let odd_worker = spawn_filter("parity-odd", limit, true)?;
    let even_worker = match spawn_filter("parity-even", limit, false) {
        Ok(handle) => handle,
        Err(e) => {
            odd_worker.join().ok();
            return Err(e);
        }
    };

    let odds = odd_worker
        .join()
        .map_err(|_| LabError::Worker("odd worker panicked".to_string()))?;
    let evens = even_worker
        .join()
        .map_err(|_| LabError::Worker("even worker panicked".to_string()))?;

    Ok(ParityReport { odds, evens })
}
