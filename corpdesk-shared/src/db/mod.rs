/// PostgreSQL access shared by the server and its tests
///
/// The server connects with [`pool::create_pool`], applies
/// [`migrations::run_migrations`] when `RUN_MIGRATIONS` is set, and hands
/// the pool to every model query. Router tests use
/// [`pool::create_lazy_pool`] instead so they never need a server.
///
/// ```no_run
/// use corpdesk_shared::db::{migrations::run_migrations, pool::{create_pool, DatabaseConfig}};
///
/// # async fn boot(url: String) -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig { url, ..Default::default() }).await?;
/// run_migrations(&pool).await?;
/// # Ok(())
/// # }
/// ```

pub mod migrations;
pub mod pool;
