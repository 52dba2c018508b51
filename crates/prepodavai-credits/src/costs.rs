// SPDX-FileCopyrightText: 2026 PrepodavAI Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-operation credit prices.

use std::collections::BTreeMap;
use std::str::FromStr;

use prepodavai_core::{GenerationType, PrepodavaiError};
use prepodavai_storage::Database;
use prepodavai_storage::models::CreditCost;
use prepodavai_storage::queries::costs;
use rusqlite::Connection;
use tracing::info;

/// Current price of `operation`. Missing or deactivated operations are rejected.
pub fn cost_in(conn: &Connection, operation: GenerationType) -> Result<i64, PrepodavaiError> {
    match costs::get(conn, operation.as_ref())? {
        Some(cost) if cost.is_active => Ok(cost.credit_cost),
        _ => Err(PrepodavaiError::Validation(format!(
            "operation {operation} is currently unavailable"
        ))),
    }
}

pub fn set_cost_in(
    conn: &Connection,
    operation: GenerationType,
    credit_cost: i64,
) -> Result<(), PrepodavaiError> {
    if credit_cost < 0 {
        return Err(PrepodavaiError::Validation(format!(
            "credit cost for {operation} must be non-negative"
        )));
    }
    costs::upsert(conn, operation.as_ref(), credit_cost)
}

/// Cost table backed by the `credit_costs` table.
#[derive(Clone)]
pub struct CostTable {
    db: Database,
}

impl CostTable {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn cost(&self, operation: GenerationType) -> Result<i64, PrepodavaiError> {
        self.db.read(move |conn| cost_in(conn, operation)).await
    }

    pub async fn list(&self) -> Result<Vec<CreditCost>, PrepodavaiError> {
        self.db.read(costs::list).await
    }

    pub async fn set_cost(
        &self,
        operation: GenerationType,
        credit_cost: i64,
    ) -> Result<(), PrepodavaiError> {
        self.db
            .write(move |tx| set_cost_in(tx, operation, credit_cost))
            .await
    }

    pub async fn set_active(
        &self,
        operation: GenerationType,
        active: bool,
    ) -> Result<bool, PrepodavaiError> {
        self.db
            .write(move |tx| costs::set_active(tx, operation.as_ref(), active))
            .await
    }

    /// Write configured price overrides. Keys must name generation types.
    pub async fn apply_overrides(
        &self,
        overrides: &BTreeMap<String, i64>,
    ) -> Result<usize, PrepodavaiError> {
        if overrides.is_empty() {
            return Ok(0);
        }
        let parsed = overrides
            .iter()
            .map(|(key, cost)| {
                GenerationType::from_str(key)
                    .map(|ty| (ty, *cost))
                    .map_err(|_| PrepodavaiError::UnknownGenerationType(key.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let applied = self
            .db
            .write(move |tx| {
                for (ty, cost) in &parsed {
                    set_cost_in(tx, *ty, *cost)?;
                }
                Ok(parsed.len())
            })
            .await?;
        info!(applied, "credit cost overrides applied");
        Ok(applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn seeded_prices_are_served() {
        let table = CostTable::new(Database::open_in_memory().await.unwrap());
        assert_eq!(table.cost(GenerationType::Presentation).await.unwrap(), 8);
        assert_eq!(table.cost(GenerationType::Message).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn deactivated_operation_is_unavailable() {
        let table = CostTable::new(Database::open_in_memory().await.unwrap());
        assert!(table.set_active(GenerationType::Photosession, false).await.unwrap());
        let err = table.cost(GenerationType::Photosession).await.unwrap_err();
        assert!(matches!(err, PrepodavaiError::Validation(_)));
    }

    #[tokio::test]
    async fn overrides_replace_prices() {
        let table = CostTable::new(Database::open_in_memory().await.unwrap());
        let overrides = BTreeMap::from([("quiz".to_string(), 7), ("feedback".to_string(), 0)]);
        assert_eq!(table.apply_overrides(&overrides).await.unwrap(), 2);
        assert_eq!(table.cost(GenerationType::Quiz).await.unwrap(), 7);
        assert_eq!(table.cost(GenerationType::Feedback).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn unknown_override_key_changes_nothing() {
        let table = CostTable::new(Database::open_in_memory().await.unwrap());
        let overrides = BTreeMap::from([("quiz".to_string(), 7), ("essay".to_string(), 1)]);
        let err = table.apply_overrides(&overrides).await.unwrap_err();
        assert!(matches!(err, PrepodavaiError::UnknownGenerationType(k) if k == "essay"));
        assert_eq!(table.cost(GenerationType::Quiz).await.unwrap(), 2);
    }
}
