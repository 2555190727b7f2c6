mod company;
mod fields;
mod inheritance;
#[cfg(not(feature = "disable-lists"))]
mod lists;

use crate::{company::company, fields::fields, inheritance::inheritance};
#[cfg(not(feature = "disable-lists"))]
use lists::lists;
use log::LevelFilter;
use std::env;
use tether::{Connection, Driver};

pub fn init_logs() {
    let mut logger = env_logger::builder();
    logger
        .is_test(true)
        .format_file(true)
        .format_line_number(true);
    if env::var("RUST_LOG").is_err() {
        logger.filter_level(LevelFilter::Warn);
    }
    let _ = logger.try_init();
}

/// Run every scenario on the connection, then close it. Scenarios needing a second session open
/// it from `driver` and `url`.
pub async fn execute_tests<D: Driver>(
    driver: &D,
    url: &str,
    mut connection: Connection<D::Executor>,
) {
    fields(&mut connection).await;
    company(driver, url, &mut connection).await;
    inheritance(&mut connection).await;
    #[cfg(not(feature = "disable-lists"))]
    lists(&mut connection).await;
    connection
        .close()
        .await
        .expect("Could not close the connection");
}

#[macro_export]
macro_rules! silent_logs {
    ($($code:tt)+) => {{
        let level = log::max_level();
        log::set_max_level(log::LevelFilter::Off);
        $($code)+
        log::set_max_level(level);
    }};
}
