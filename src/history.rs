//! Postgres-backed access to recorded surfer counts.

use crate::prediction::baseline::HistoricalSource;
use postgres::{Client, Config, NoTls};
use std::fmt;
use std::str::FromStr;
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

const AVERAGE_BY_HOUR_QUERY: &str = "SELECT AVG(count)::float8 FROM surfer_entries \
     WHERE EXTRACT(HOUR FROM timestamp)::int4 = $1";

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("failed to connect to history database: {0}")]
    Connect(postgres::Error),
    #[error("history query failed: {0}")]
    Query(#[from] postgres::Error),
    #[error("history connection lock poisoned")]
    ConnectionLock,
}

/// Blocking Postgres client; connect and query only off the async executor.
///
/// A connection closed by the server is re-established on the next query.
pub struct PostgresHistory {
    config: Config,
    client: Mutex<Client>,
}

impl PostgresHistory {
    pub fn connect(
        url: &str,
        connect_timeout: Duration,
        statement_timeout: Duration,
    ) -> Result<Self, HistoryError> {
        let mut config = Config::from_str(url).map_err(HistoryError::Connect)?;
        config
            .connect_timeout(connect_timeout)
            .options(&statement_timeout_option(statement_timeout));
        let client = config.connect(NoTls).map_err(HistoryError::Connect)?;
        Ok(Self {
            config,
            client: Mutex::new(client),
        })
    }
}

/// Replaces `client` with a fresh connection when it reports closed.
///
/// Returns whether a reconnect happened. On failure the closed client stays
/// in place so the next call tries again.
fn reconnect_if_closed<C, E>(
    client: &mut C,
    is_closed: impl Fn(&C) -> bool,
    reconnect: impl FnOnce() -> Result<C, E>,
) -> Result<bool, E> {
    if !is_closed(client) {
        return Ok(false);
    }
    *client = reconnect()?;
    Ok(true)
}

fn statement_timeout_option(timeout: Duration) -> String {
    format!("-c statement_timeout={}", timeout.as_millis())
}

impl fmt::Debug for PostgresHistory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresHistory").finish_non_exhaustive()
    }
}

impl HistoricalSource for PostgresHistory {
    fn average_count_for_hour(&self, hour: u8) -> Result<Option<f64>, HistoryError> {
        let mut client = self
            .client
            .lock()
            .map_err(|_| HistoryError::ConnectionLock)?;
        let reconnected = reconnect_if_closed(&mut *client, Client::is_closed, || {
            self.config.connect(NoTls).map_err(HistoryError::Connect)
        })?;
        if reconnected {
            info!("History database connection re-established");
        }
        let row = client.query_one(AVERAGE_BY_HOUR_QUERY, &[&i32::from(hour)])?;
        // AVG over zero rows is NULL.
        let average: Option<f64> = row.try_get(0)?;
        debug!(hour, average = ?average, "Fetched historical average");
        Ok(average)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statement_timeout_is_passed_in_milliseconds() {
        assert_eq!(
            statement_timeout_option(Duration::from_secs(5)),
            "-c statement_timeout=5000"
        );
    }

    #[derive(Debug, PartialEq)]
    struct FakeConnection {
        id: u32,
        closed: bool,
    }

    fn open(id: u32) -> FakeConnection {
        FakeConnection { id, closed: false }
    }

    #[test]
    fn open_connection_is_kept() {
        let mut connection = open(1);
        let mut attempts = 0;

        let reconnected = reconnect_if_closed(
            &mut connection,
            |c| c.closed,
            || -> Result<FakeConnection, &str> {
                attempts += 1;
                Ok(open(2))
            },
        );

        assert_eq!(reconnected, Ok(false));
        assert_eq!(attempts, 0);
        assert_eq!(connection, open(1));
    }

    #[test]
    fn closed_connection_is_replaced() {
        let mut connection = FakeConnection {
            id: 1,
            closed: true,
        };

        let reconnected = reconnect_if_closed(
            &mut connection,
            |c| c.closed,
            || -> Result<FakeConnection, &str> { Ok(open(2)) },
        );

        assert_eq!(reconnected, Ok(true));
        assert_eq!(connection, open(2));
    }

    #[test]
    fn failed_reconnect_keeps_closed_connection_for_retry() {
        let mut connection = FakeConnection {
            id: 1,
            closed: true,
        };

        let first = reconnect_if_closed(
            &mut connection,
            |c| c.closed,
            || -> Result<FakeConnection, &str> { Err("connection refused") },
        );
        assert_eq!(first, Err("connection refused"));
        assert!(connection.closed);

        let second = reconnect_if_closed(
            &mut connection,
            |c| c.closed,
            || -> Result<FakeConnection, &str> { Ok(open(3)) },
        );
        assert_eq!(second, Ok(true));
        assert_eq!(connection.id, 3);
    }

    #[test]
    fn invalid_url_is_connect_error() {
        let result = PostgresHistory::connect(
            "not a url=",
            Duration::from_secs(1),
            Duration::from_secs(1),
        );

        assert!(matches!(result, Err(HistoryError::Connect(_))));
    }
}
