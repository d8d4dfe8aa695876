// This file is part of tao-dividends.
// Copyright (C) 2025 TAO Dividends Contributors
// SPDX-License-Identifier: Apache-2.0
// Licensed under the Apache License, Version 2.0 (the "License");
// You may not use this file except in compliance with the License.
// You may obtain a copy of the License at
// http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::domain::{
    DividendObservation, SentimentStakeOperation, StakeOperation, StakeOutcome, StakeStatus,
    storage::Storage,
};
use chrono::{DateTime, Utc};
use dividends_common::{
    domain::{Hotkey, NetUid},
    infra::pool::postgres::PostgresPool,
};
use fastrace::trace;
use indoc::indoc;
use rust_decimal::Decimal;
use sqlx::FromRow;

/// Postgres based implementation of [Storage].
#[derive(Debug, Clone)]
pub struct PostgresStorage {
    pool: PostgresPool,
}

impl PostgresStorage {
    /// Create a new [PostgresStorage].
    pub fn new(pool: PostgresPool) -> Self {
        Self { pool }
    }
}

impl Storage for PostgresStorage {
    async fn ping(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&*self.pool).await?;
        Ok(())
    }

    #[trace]
    async fn save_dividend_observations(
        &self,
        observations: &[DividendObservation],
    ) -> Result<(), sqlx::Error> {
        let query = indoc! {"
            INSERT INTO dividend_observations (
                netuid,
                hotkey,
                amount,
                observed_at
            )
            VALUES ($1, $2, $3, $4)
        "};

        let mut tx = self.pool.begin().await?;

        for observation in observations {
            sqlx::query(query)
                .bind(i32::from(observation.netuid))
                .bind(&*observation.hotkey)
                .bind(observation.amount)
                .bind(observation.observed_at)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await
    }

    #[trace]
    async fn get_dividend_observations(&self) -> Result<Vec<DividendObservation>, sqlx::Error> {
        let query = indoc! {"
            SELECT
                netuid,
                hotkey,
                amount,
                observed_at
            FROM dividend_observations
            ORDER BY id
        "};

        sqlx::query_as::<_, (i32, String, Decimal, DateTime<Utc>)>(query)
            .fetch_all(&*self.pool)
            .await?
            .into_iter()
            .map(|(netuid, hotkey, amount, observed_at)| {
                Ok(DividendObservation {
                    netuid: decode_netuid(netuid)?,
                    hotkey: decode_hotkey(hotkey)?,
                    amount,
                    observed_at,
                })
            })
            .collect()
    }

    #[trace(properties = { "netuid": "{netuid}", "hotkey": "{hotkey}" })]
    async fn create_stake_operation(
        &self,
        netuid: NetUid,
        hotkey: &Hotkey,
        created_at: DateTime<Utc>,
    ) -> Result<i64, sqlx::Error> {
        let query = indoc! {"
            INSERT INTO sentiment_stake_operations (
                netuid,
                hotkey,
                amount,
                operation,
                status,
                created_at
            )
            VALUES ($1, $2, 0, 'none', 'pending', $3)
            RETURNING id
        "};

        sqlx::query_scalar::<_, i64>(query)
            .bind(i32::from(netuid))
            .bind(&**hotkey)
            .bind(created_at)
            .fetch_one(&*self.pool)
            .await
    }

    #[trace(properties = { "id": "{id}" })]
    async fn finish_stake_operation(
        &self,
        id: i64,
        outcome: &StakeOutcome,
    ) -> Result<bool, sqlx::Error> {
        if !outcome.status.is_terminal() {
            return Err(sqlx::Error::Protocol(format!(
                "cannot finish stake operation {id} with non-terminal status"
            )));
        }

        let query = indoc! {"
            UPDATE sentiment_stake_operations
            SET
                sentiment_score = $2,
                amount = $3,
                transaction_reference = $4,
                operation = $5,
                status = $6,
                completed_at = $7
            WHERE id = $1 AND status = 'pending'
        "};

        let result = sqlx::query(query)
            .bind(id)
            .bind(outcome.sentiment_score)
            .bind(outcome.amount)
            .bind(outcome.transaction_reference.as_deref())
            .bind(outcome.operation.to_string())
            .bind(outcome.status.to_string())
            .bind(outcome.completed_at)
            .execute(&*self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    #[trace]
    async fn get_stake_operations(&self) -> Result<Vec<SentimentStakeOperation>, sqlx::Error> {
        let query = indoc! {"
            SELECT
                id,
                netuid,
                hotkey,
                sentiment_score,
                amount,
                transaction_reference,
                operation,
                status,
                created_at,
                completed_at
            FROM sentiment_stake_operations
            ORDER BY id
        "};

        sqlx::query_as::<_, StakeOperationRow>(query)
            .fetch_all(&*self.pool)
            .await?
            .into_iter()
            .map(TryInto::try_into)
            .collect()
    }
}

#[derive(Debug, FromRow)]
struct StakeOperationRow {
    id: i64,
    netuid: i32,
    hotkey: String,
    sentiment_score: Option<i32>,
    amount: Decimal,
    transaction_reference: Option<String>,
    operation: String,
    status: String,
    created_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl TryFrom<StakeOperationRow> for SentimentStakeOperation {
    type Error = sqlx::Error;

    fn try_from(row: StakeOperationRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse::<StakeStatus>()
            .map_err(|error| sqlx::Error::Decode(error.into()))?;

        Ok(Self {
            id: row.id,
            netuid: decode_netuid(row.netuid)?,
            hotkey: decode_hotkey(row.hotkey)?,
            sentiment_score: row.sentiment_score,
            amount: row.amount,
            transaction_reference: row.transaction_reference,
            operation: row
                .operation
                .parse::<StakeOperation>()
                .map_err(|error| sqlx::Error::Decode(error.into()))?,
            status,
            created_at: row.created_at,
            completed_at: row.completed_at,
        })
    }
}

fn decode_netuid(netuid: i32) -> Result<NetUid, sqlx::Error> {
    NetUid::try_from(netuid).map_err(|error| sqlx::Error::Decode(error.into()))
}

fn decode_hotkey(hotkey: String) -> Result<Hotkey, sqlx::Error> {
    Hotkey::try_from(hotkey).map_err(|error| sqlx::Error::Decode(error.into()))
}

#[cfg(test)]
mod tests {
    use crate::{
        domain::{
            DividendObservation, StakeOperation, StakeOutcome, StakeStatus, storage::Storage,
        },
        infra::storage::PostgresStorage,
    };
    use anyhow::Context;
    use assert_matches::assert_matches;
    use chrono::Utc;
    use dividends_common::{
        domain::NetUid,
        infra::{
            migrations,
            pool::{self, postgres::PostgresPool},
        },
    };
    use rust_decimal::Decimal;
    use sqlx::postgres::PgSslMode;
    use std::time::Duration;
    use testcontainers::{ImageExt, runners::AsyncRunner};
    use testcontainers_modules::postgres::Postgres;

    #[tokio::test]
    async fn test_postgres_storage() -> anyhow::Result<()> {
        let postgres_container = Postgres::default()
            .with_db_name("dividends")
            .with_user("dividends")
            .with_password("dividends")
            .with_tag("17.1-alpine")
            .start()
            .await
            .context("start Postgres container")?;
        let postgres_port = postgres_container
            .get_host_port_ipv4(5432)
            .await
            .context("get Postgres port")?;

        let config = pool::postgres::Config {
            host: "localhost".to_string(),
            port: postgres_port,
            dbname: "dividends".to_string(),
            user: "dividends".to_string(),
            password: "dividends".into(),
            sslmode: PgSslMode::Prefer,
            max_connections: 10,
            idle_timeout: Duration::from_secs(60),
            max_lifetime: Duration::from_secs(5 * 60),
        };
        let pool = PostgresPool::new(config).await?;
        migrations::postgres::run(&pool).await?;
        let storage = PostgresStorage::new(pool);

        storage.ping().await?;

        let observations = vec![
            DividendObservation {
                netuid: NetUid(18),
                hotkey: "5Fa".parse()?,
                amount: Decimal::new(123_456_789, 9),
                observed_at: Utc::now(),
            },
            DividendObservation {
                netuid: NetUid(1),
                hotkey: "5Fb".parse()?,
                amount: Decimal::ZERO,
                observed_at: Utc::now(),
            },
        ];
        storage.save_dividend_observations(&observations).await?;
        let saved = storage.get_dividend_observations().await?;
        assert_eq!(saved.len(), 2);
        assert_eq!(saved[0].hotkey, observations[0].hotkey);
        assert_eq!(saved[0].amount, Decimal::new(123_456_789, 9));
        assert_eq!(saved[1].netuid, NetUid(1));

        let id = storage
            .create_stake_operation(NetUid(18), &"5Fa".parse()?, Utc::now())
            .await?;
        let operations = storage.get_stake_operations().await?;
        assert_matches!(
            operations.as_slice(),
            [operation] if operation.id == id
                && operation.status == StakeStatus::Pending
                && operation.operation == StakeOperation::None
                && operation.completed_at.is_none()
        );

        let outcome = StakeOutcome::completed(
            42,
            StakeOperation::Stake,
            Decimal::new(42, 1),
            Some("0xabc".to_owned()),
        );
        assert!(storage.finish_stake_operation(id, &outcome).await?);

        // Terminal operations are not touched again.
        let failed = StakeOutcome::failed(Some(42), StakeOperation::Stake, Decimal::new(42, 1));
        assert!(!storage.finish_stake_operation(id, &failed).await?);

        let operations = storage.get_stake_operations().await?;
        assert_matches!(
            operations.as_slice(),
            [operation] if operation.status == StakeStatus::Completed
                && operation.sentiment_score == Some(42)
                && operation.amount == Decimal::new(42, 1)
                && operation.transaction_reference.as_deref() == Some("0xabc")
                && operation.completed_at.is_some()
        );

        Ok(())
    }
}
