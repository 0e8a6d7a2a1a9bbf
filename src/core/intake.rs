//! Chunked stock intake
//!
//! A batch of new units is checked as a whole (prices, duplicate codes within
//! the batch and against every unit already on file, sold or not) and then
//! written in chunks no larger than the store's per-commit limit. Chunks are
//! independent commits: when one fails, the chunks before it stay in place
//! and the report says how many units made it.

use crate::core::engine::LedgerEngine;
use crate::core::traits::LedgerStore;
use crate::types::{normalize_code, LedgerError, StockItem, StockItemId, StockPricing};
use std::collections::HashSet;
use tracing::{info, warn};

/// Outcome of a stock intake
#[derive(Debug, Clone, PartialEq)]
pub struct IntakeReport {
    /// Units in the validated batch
    pub requested: usize,
    /// Units committed before any failure
    pub committed: usize,
    /// Why the remaining units were not written
    pub failure: Option<LedgerError>,
}

impl IntakeReport {
    pub fn is_complete(&self) -> bool {
        self.failure.is_none() && self.committed == self.requested
    }

    pub fn remaining(&self) -> usize {
        self.requested - self.committed
    }
}

impl<S: LedgerStore> LedgerEngine<S> {
    /// Add one available unit per code, all with the same brand and prices
    ///
    /// # Arguments
    ///
    /// * `codes` - External codes; trimmed, uppercased, empties dropped
    /// * `pricing` - Brand and prices shared by every unit
    ///
    /// # Returns
    ///
    /// * `Ok(IntakeReport)` once writing started; a partial failure is
    ///   reported in `failure` with `committed` counting the units kept
    /// * `Err(LedgerError)` if the batch was rejected before anything was
    ///   written
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - No code remains after normalization, or the pricing is invalid
    /// - A code appears twice in the batch or is already on file
    ///   (`DuplicateIdentifier`, listing every offending code)
    pub fn intake_stock(
        &self,
        codes: &[String],
        pricing: StockPricing,
    ) -> Result<IntakeReport, LedgerError> {
        let pricing = pricing.validated()?;
        let codes: Vec<String> = codes
            .iter()
            .map(|c| normalize_code(c))
            .filter(|c| !c.is_empty())
            .collect();
        if codes.is_empty() {
            return Err(LedgerError::validation("no stock codes given"));
        }

        let mut seen = HashSet::new();
        let mut repeated = Vec::new();
        for code in &codes {
            if !seen.insert(code.as_str()) && !repeated.contains(code) {
                repeated.push(code.clone());
            }
        }
        if !repeated.is_empty() {
            return Err(LedgerError::duplicate_codes(repeated, true));
        }

        let mut existing = Vec::new();
        for code in &codes {
            if self.store().find_stock_by_code(code)?.is_some() {
                existing.push(code.clone());
            }
        }
        if !existing.is_empty() {
            return Err(LedgerError::duplicate_codes(existing, false));
        }

        let created_at = self.store().now();
        let items: Vec<StockItem> = codes
            .into_iter()
            .map(|external_code| StockItem {
                id: StockItemId::new(),
                external_code,
                brand: pricing.brand.clone(),
                cost_price: pricing.cost_price,
                sale_price: pricing.sale_price,
                available_qty: 1,
                created_at,
            })
            .collect();

        let chunk_size = self
            .config()
            .intake_chunk_size
            .min(self.store().max_batch_writes())
            .max(1);
        let mut report = IntakeReport {
            requested: items.len(),
            committed: 0,
            failure: None,
        };

        for chunk in items.chunks(chunk_size) {
            match self.store().insert_stock_batch(chunk.to_vec()) {
                Ok(written) => report.committed += written,
                Err(error) => {
                    warn!(
                        committed = report.committed,
                        remaining = report.remaining(),
                        %error,
                        "stock intake stopped partway"
                    );
                    report.failure = Some(error);
                    return Ok(report);
                }
            }
        }

        info!(
            units = report.committed,
            brand = %pricing.brand,
            cost = pricing.cost_price,
            price = pricing.sale_price,
            "stock intake committed"
        );
        Ok(report)
    }
}
