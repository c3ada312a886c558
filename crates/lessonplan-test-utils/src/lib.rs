//! Test databases and curriculum fixtures for lessonplan integration tests.
//!
//! All tests in a binary share one PostgreSQL server: the one named by
//! `LESSONPLAN_TEST_PG_URL`, or else a `postgres:16` container started on
//! first use. Each [`TestDb`] is a freshly migrated database on that server,
//! bootstrapped through the same [`pool::open_migrated`] path as
//! `lessonplan db-init`.

use sqlx::{Executor, PgPool};
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, ImageExt};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;
use uuid::Uuid;

use lessonplan_db::config::DbConfig;
use lessonplan_db::models::{CurriculumStandard, NewCurriculumStandard};
use lessonplan_db::pool;
use lessonplan_db::queries::curriculum;

pub const PG_URL_ENV_VAR: &str = "LESSONPLAN_TEST_PG_URL";

struct Server {
    /// Points at the maintenance database; tests swap the name.
    config: DbConfig,
    _container: Option<ContainerAsync<Postgres>>,
}

static SERVER: OnceCell<Server> = OnceCell::const_new();

async fn start_server() -> Server {
    if let Ok(url) = std::env::var(PG_URL_ENV_VAR) {
        return Server {
            config: DbConfig::new(url.trim_end_matches('/')).maintenance(),
            _container: None,
        };
    }

    let container = Postgres::default()
        .with_tag("16")
        .start()
        .await
        .expect("failed to start PostgreSQL container");
    let host = container.get_host().await.expect("container host");
    let port = container
        .get_host_port_ipv4(5432)
        .await
        .expect("container port");

    Server {
        config: DbConfig::new(format!("postgresql://postgres:postgres@{host}:{port}/postgres")),
        _container: Some(container),
    }
}

async fn server_config() -> &'static DbConfig {
    &SERVER.get_or_init(start_server).await.config
}

/// A migrated database that lives until [`TestDb::teardown`].
pub struct TestDb {
    pub pool: PgPool,
    config: DbConfig,
}

impl TestDb {
    /// Create and migrate a uniquely named database.
    pub async fn create() -> Self {
        let name = format!("lessonplan_test_{}", Uuid::new_v4().simple());
        let config = server_config()
            .await
            .with_database(&name)
            .with_max_connections(5);
        let pool = pool::open_migrated(&config)
            .await
            .unwrap_or_else(|e| panic!("failed to bootstrap {name}: {e:#}"));
        Self { pool, config }
    }

    pub fn config(&self) -> &DbConfig {
        &self.config
    }

    /// Insert curriculum standards, returning the stored rows in order.
    pub async fn seed_standards(
        &self,
        standards: &[NewCurriculumStandard],
    ) -> Vec<CurriculumStandard> {
        let mut rows = Vec::with_capacity(standards.len());
        for standard in standards {
            let row = curriculum::upsert_standard(&self.pool, standard)
                .await
                .unwrap_or_else(|e| panic!("failed to seed {}: {e:#}", standard.standard_code));
            rows.push(row);
        }
        rows
    }

    /// Close the pool and drop the database, cutting off stray sessions.
    pub async fn teardown(self) {
        self.pool.close().await;

        let name = self
            .config
            .validated_database_name()
            .expect("test database name")
            .to_owned();
        let maintenance = pool::maintenance_pool(&self.config)
            .await
            .expect("maintenance connection for teardown");
        let _ = maintenance
            .execute(format!("DROP DATABASE IF EXISTS {name} WITH (FORCE)").as_str())
            .await;
        maintenance.close().await;
    }
}

/// A Nigerian Grade 5 mathematics standard with no topic.
pub fn math_standard(code: &str) -> NewCurriculumStandard {
    NewCurriculumStandard {
        subject: "Mathematics".to_string(),
        grade_level: "Grade 5".to_string(),
        country: "Nigeria".to_string(),
        topic: None,
        standard_code: code.to_string(),
        description: format!("Mathematics standard {code}"),
    }
}

/// [`math_standard`] scoped to `topic`.
pub fn topical_math_standard(code: &str, topic: &str) -> NewCurriculumStandard {
    NewCurriculumStandard {
        topic: Some(topic.to_string()),
        ..math_standard(code)
    }
}
