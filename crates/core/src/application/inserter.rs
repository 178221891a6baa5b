// Batch Inserter
//
// Fans templates out per subscriber and writes them in chunks sized to the
// store's bind parameter ceiling. Chunks are independent: a failing chunk
// leaves every earlier chunk persisted.

use crate::domain::{JobTemplate, PARAMS_PER_ROW};
use crate::error::{AppError, Result};
use crate::port::{per_second, JobStore, Metric, MetricsSink};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

pub struct BatchInserter {
    store: Arc<dyn JobStore>,
    metrics: Arc<dyn MetricsSink>,
    max_params: usize,
}

impl BatchInserter {
    /// # Arguments
    /// * `max_params` - Bind parameters one insert statement may carry
    pub fn new(store: Arc<dyn JobStore>, metrics: Arc<dyn MetricsSink>, max_params: usize) -> Self {
        Self {
            store,
            metrics,
            max_params,
        }
    }

    /// Rows per insert statement
    pub fn batch_size(&self) -> Result<usize> {
        let batch_size = self.max_params / PARAMS_PER_ROW;
        if batch_size == 0 {
            return Err(AppError::Config(format!(
                "max_params {} is below the {} parameters one row needs",
                self.max_params, PARAMS_PER_ROW
            )));
        }
        Ok(batch_size)
    }

    /// Persist `templates.len() * subscribers` rows. Row `k` is a copy of
    /// `templates[k % templates.len()]`.
    ///
    /// Returns the number of rows written.
    pub async fn persist(&self, templates: &[JobTemplate], subscribers: u32) -> Result<u64> {
        if templates.is_empty() || subscribers == 0 {
            return Ok(0);
        }

        let batch_size = self.batch_size()?;
        let total = templates
            .len()
            .checked_mul(subscribers as usize)
            .ok_or_else(|| {
                AppError::Validation(format!(
                    "{} templates for {} subscribers is too many rows",
                    templates.len(),
                    subscribers
                ))
            })?;

        let started = Instant::now();
        let mut written = 0u64;
        let mut chunk = Vec::with_capacity(batch_size.min(total));

        for k in 0..total {
            chunk.push(templates[k % templates.len()].clone());
            if chunk.len() == batch_size || k + 1 == total {
                written += self.insert_chunk(&chunk, written).await?;
                chunk.clear();
            }
        }

        let rate = per_second(written, started.elapsed());
        self.metrics.record(Metric::InsertRate, rate);
        info!(
            rows = written,
            subscribers,
            templates = templates.len(),
            rows_per_sec = rate,
            "Sequence persisted"
        );

        Ok(written)
    }

    async fn insert_chunk(&self, chunk: &[JobTemplate], written_so_far: u64) -> Result<u64> {
        match self.store.insert_batch(chunk).await {
            Ok(n) => {
                debug!(rows = n, "Chunk inserted");
                Ok(n)
            }
            Err(e) => {
                error!(
                    error = %e,
                    chunk_rows = chunk.len(),
                    rows_persisted = written_so_far,
                    "Chunk insert failed, earlier chunks remain persisted"
                );
                Err(e)
            }
        }
    }
}
