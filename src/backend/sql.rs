// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! PostgreSQL backend.
//!
//! Every transaction runs at the SERIALIZABLE isolation level; read
//! transactions additionally declare READ ONLY. The server signals
//! consistency conflicts as serialization failures, unique-constraint
//! violations from racing inserts, and deadlocks, all of which retry
//! the closure; any other error propagates. Watches are not
//! supported.

use parking_lot::Mutex;
use postgres::error::SqlState;
use postgres::{Client, IsolationLevel, NoTls};

use crate::store::{Ctx, Error, Pair, RangeQuery, Result, Store, Tx, Watch};

/// A store backed by a `(key bytea primary key, value bytea)` table
/// on a PostgreSQL server, reachable over a single connection.
pub struct SqlStore {
    client: Mutex<Client>,
}

impl SqlStore {
    /// Connects to the server described by `params`, verifies it is
    /// at least release 9.1, and ensures the backing table exists.
    pub fn open(params: &str) -> Result<Self> {
        let mut client = Client::connect(params, NoTls)?;
        ensure_version(&mut client)?;
        client.batch_execute(
            "CREATE TABLE IF NOT EXISTS kv (
                key bytea not null primary key,
                value bytea not null
            )",
        )?;
        Ok(Self {
            client: Mutex::new(client),
        })
    }

    fn try_tx(&self, tx: Tx<'_>, read_only: bool) -> (Result<()>, bool) {
        let mut client = self.client.lock();

        let mut builder = client
            .build_transaction()
            .isolation_level(IsolationLevel::Serializable);
        if read_only {
            builder = builder.read_only(true);
        }
        let pg_tx = match builder.start() {
            Ok(pg_tx) => pg_tx,
            Err(err) => return (Err(err.into()), false),
        };

        let mut ctx = SqlCtx {
            tx: pg_tx,
            read_only,
            needs_retry: false,
        };
        let result = tx(&mut ctx);
        let SqlCtx {
            tx: pg_tx,
            mut needs_retry,
            ..
        } = ctx;

        match result {
            Ok(()) => match pg_tx.commit() {
                Ok(()) => (Ok(()), needs_retry),
                Err(err) => {
                    needs_retry |= retriable(&err);
                    (Err(err.into()), needs_retry)
                }
            },
            Err(err) => {
                needs_retry |= classify(&err);
                // Rollback errors are not returned; the closure's
                // error is the more important one.
                let _ = pg_tx.rollback();
                (Err(err), needs_retry)
            }
        }
    }
}

impl Store for SqlStore {
    fn run_tx(&self, tx: Tx<'_>) -> Result<()> {
        loop {
            let (result, again) = self.try_tx(tx, false);
            if !again {
                return result;
            }
        }
    }

    fn run_read_tx(&self, tx: Tx<'_>) -> Result<()> {
        loop {
            let (result, again) = self.try_tx(tx, true);
            if !again {
                return result;
            }
        }
    }

    fn watch_tx(&self, _tx: Tx<'_>) -> Result<Box<dyn Watch>> {
        Err(Error::WatchUnsupported)
    }

    fn close(&self) {
        // The connection closes when the store drops.
    }
}

fn ensure_version(client: &mut Client) -> Result<()> {
    let row = client.query_one("SHOW server_version", &[])?;
    let version: String = row.get(0);

    let unparsed = || Error::SqlVersionUnparsed {
        version: version.clone(),
    };

    // Reported as "major.minor..." possibly followed by build info.
    let core = version.split_whitespace().next().unwrap_or("");
    let mut numbers = core.split('.');
    let major: i64 = numbers
        .next()
        .and_then(|part| part.parse().ok())
        .ok_or_else(unparsed)?;
    let minor: i64 = numbers
        .next()
        .and_then(|part| part.parse().ok())
        .ok_or_else(unparsed)?;

    if major < 9 || (major == 9 && minor < 1) {
        return Err(Error::SqlServerTooOld { version });
    }
    Ok(())
}

fn retriable(err: &postgres::Error) -> bool {
    match err.code() {
        Some(code) => {
            *code == SqlState::T_R_SERIALIZATION_FAILURE
                || *code == SqlState::UNIQUE_VIOLATION
                || *code == SqlState::T_R_DEADLOCK_DETECTED
        }
        None => false,
    }
}

fn classify(err: &Error) -> bool {
    matches!(err, Error::Sql(inner) if retriable(inner))
}

struct SqlCtx<'conn> {
    tx: postgres::Transaction<'conn>,
    read_only: bool,
    needs_retry: bool,
}

impl SqlCtx<'_> {
    fn observe<T>(&mut self, result: std::result::Result<T, postgres::Error>) -> Result<T> {
        match result {
            Ok(value) => Ok(value),
            Err(err) => {
                self.needs_retry |= retriable(&err);
                Err(err.into())
            }
        }
    }
}

impl Ctx for SqlCtx<'_> {
    fn get(&mut self, key: &[u8]) -> Result<Pair> {
        let result = self
            .tx
            .query_opt("SELECT key, value FROM kv WHERE key = $1", &[&key]);
        match self.observe(result)? {
            Some(row) => Ok(Pair {
                key: row.get(0),
                value: row.get(1),
            }),
            None => Err(Error::NotFound),
        }
    }

    fn range(&mut self, query: RangeQuery) -> Result<Vec<Pair>> {
        let mut sql = String::from("SELECT key, value FROM kv WHERE TRUE");
        let mut params: Vec<&(dyn postgres::types::ToSql + Sync)> = Vec::new();

        if !query.low.is_empty() {
            params.push(&query.low);
            sql.push_str(&format!(" AND key >= ${}", params.len()));
        }
        if !query.high.is_empty() {
            params.push(&query.high);
            sql.push_str(&format!(" AND key < ${}", params.len()));
        }
        sql.push_str(if query.descending {
            " ORDER BY key DESC"
        } else {
            " ORDER BY key ASC"
        });
        if query.limit > 0 {
            sql.push_str(&format!(" LIMIT {}", query.limit));
        }

        let result = self.tx.query(&sql, &params);
        let rows = self.observe(result)?;
        Ok(rows
            .into_iter()
            .map(|row| Pair {
                key: row.get(0),
                value: row.get(1),
            })
            .collect())
    }

    fn set(&mut self, pair: Pair) -> Result<()> {
        if self.read_only {
            return Err(Error::ReadOnlyTx);
        }

        // Upsert without ON CONFLICT, which release 9.1 predates.
        let result = self.tx.execute(
            "WITH upsert AS (
                UPDATE kv SET value = $2 WHERE key = $1 RETURNING *
            )
            INSERT INTO kv (key, value) SELECT $1, $2
                WHERE NOT EXISTS (SELECT * FROM upsert)",
            &[&pair.key, &pair.value],
        );
        self.observe(result)?;
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> Result<()> {
        if self.read_only {
            return Err(Error::ReadOnlyTx);
        }

        let result = self.tx.execute("DELETE FROM kv WHERE key = $1", &[&key]);
        let count = self.observe(result)?;
        if count == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }
}
