//! PostgreSQL test infrastructure.
//!
//! One container is started for the whole test run; every test gets its own database in it.

use std::sync::OnceLock;

use postgres::{Client, NoTls};
use testcontainers::runners::AsyncRunner;
use testcontainers::ContainerAsync;
use testcontainers_modules::postgres::Postgres;
use uuid::Uuid;

/// Default credentials for testcontainers-modules postgres
const PG_USER: &str = "postgres";
const PG_PASSWORD: &str = "postgres";
const PG_DB: &str = "postgres";

/// The shared container, with the runtime that owns it kept alive alongside.
struct SharedPostgres {
    _runtime: tokio::runtime::Runtime,
    _container: ContainerAsync<Postgres>,
    port: u16,
}

static POSTGRES: OnceLock<SharedPostgres> = OnceLock::new();

fn shared_postgres() -> &'static SharedPostgres {
    POSTGRES.get_or_init(|| {
        let runtime = tokio::runtime::Runtime::new().expect("failed to create tokio runtime");
        let (container, port) = runtime.block_on(async {
            let container = Postgres::default()
                .start()
                .await
                .expect("failed to start postgres container");
            let port = container
                .get_host_port_ipv4(5432)
                .await
                .expect("failed to get postgres port");
            (container, port)
        });
        SharedPostgres {
            _runtime: runtime,
            _container: container,
            port,
        }
    })
}

fn url_with_db(db: &str) -> String {
    format!(
        "postgres://{}:{}@127.0.0.1:{}/{}",
        PG_USER,
        PG_PASSWORD,
        shared_postgres().port,
        db
    )
}

/// Create a uniquely named database and connect to it.
pub fn fresh_postgres_db() -> (Client, String) {
    let mut admin =
        Client::connect(&url_with_db(PG_DB), NoTls).expect("failed to connect as admin");

    let db_name = format!("test_{}", Uuid::new_v4().simple());
    admin
        .batch_execute(&format!("CREATE DATABASE \"{}\"", db_name))
        .expect("failed to create test database");
    drop(admin);

    let client =
        Client::connect(&url_with_db(&db_name), NoTls).expect("failed to connect to test database");
    (client, db_name)
}

/// A client connected to a fresh, isolated database.
pub fn get_test_client() -> Client {
    let (client, _db_name) = fresh_postgres_db();
    client
}
