use diesel::pg::PgConnection;
use diesel::r2d2::{ConnectionManager, PooledConnection};
use dotenv::dotenv;
use log::{error, warn};
use rocket::http::Status;
use rocket::outcome::Outcome;
use rocket::request::{self, FromRequest, Request};
use rocket::tokio::task;
use std::env;

use crate::errors::Result;
use crate::types::ApiError;

pub mod schema;

// An alias to the type for a pool of Diesel Postgres connections.
pub type Pool = diesel::r2d2::Pool<ConnectionManager<PgConnection>>;

/// A pooled connection. r2d2 and Diesel block, so both checking a connection
/// out and every query made through `run` happen on Rocket's blocking thread
/// pool, never on an async worker.
pub struct DbConnection(PooledConnection<ConnectionManager<PgConnection>>);

impl DbConnection {
    /// Waits for a free connection without holding up the executor.
    pub async fn checkout(pool: &Pool) -> Option<DbConnection> {
        let pool = pool.clone();
        match task::spawn_blocking(move || pool.get()).await {
            Ok(Ok(connection)) => Some(DbConnection(connection)),
            Ok(Err(e)) => {
                warn!("no database connection available: {}", e);
                None
            }
            Err(e) => {
                error!("connection checkout task failed: {}", e);
                None
            }
        }
    }

    /// Runs `f` against the connection on the blocking thread pool.
    pub async fn run<F, T>(mut self, f: F) -> std::result::Result<T, ApiError>
    where
        F: FnOnce(&mut PgConnection) -> std::result::Result<T, ApiError> + Send + 'static,
        T: Send + 'static,
    {
        task::spawn_blocking(move || f(&mut self.0))
            .await
            .map_err(|e| {
                error!("database task failed: {}", e);
                ApiError::Internal
            })?
    }
}

/// Attempts to retrieve a single connection from the managed database pool. If
/// no pool is currently managed, fails with an `InternalServerError` status. If
/// no connections are available, fails with a `ServiceUnavailable` status.
#[rocket::async_trait]
impl<'r> FromRequest<'r> for DbConnection {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> request::Outcome<Self, ()> {
        let pool = match request.rocket().state::<Pool>() {
            Some(pool) => pool,
            None => return Outcome::Error((Status::InternalServerError, ())),
        };
        match DbConnection::checkout(pool).await {
            Some(connection) => Outcome::Success(connection),
            None => Outcome::Error((Status::ServiceUnavailable, ())),
        }
    }
}

pub fn init_pool() -> Result<Pool> {
    dotenv().ok();
    let database_url = env::var("DATABASE_URL")?;
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    Ok(Pool::builder().build(manager)?)
}

/// A pool that only connects on first use. Routes that never reach the
/// database can be exercised without a running server.
#[cfg(test)]
pub fn lazy_pool() -> Pool {
    use std::time::Duration;

    let manager = ConnectionManager::<PgConnection>::new("postgres://localhost/booklog_test");
    Pool::builder()
        .min_idle(Some(0))
        .connection_timeout(Duration::from_millis(250))
        .build_unchecked(manager)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rocket::tokio::runtime::Builder;
    use rocket::tokio::time::{sleep, Duration};

    #[test]
    fn checkout_leaves_the_executor_free() {
        let runtime = Builder::new_current_thread().enable_all().build().unwrap();
        runtime.block_on(async {
            let pool = lazy_pool();
            let checkout =
                rocket::tokio::spawn(async move { DbConnection::checkout(&pool).await.is_some() });

            // The single executor thread keeps serving other tasks while the
            // pool waits out its timeout.
            sleep(Duration::from_millis(20)).await;
            assert!(!checkout.is_finished());
            assert!(!checkout.await.unwrap());
        });
    }
}
