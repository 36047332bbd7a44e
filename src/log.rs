//! Logging bootstrap, copied from `small-db-small-db/src/log.rs`: a
//! `Once`-guarded `env_logger` builder so tests can call `init_log()`
//! freely without double-initializing the global logger.

use std::io::Write;
use std::sync::Once;

use env_logger::Builder;

static INIT: Once = Once::new();

pub fn init_log() {
    INIT.call_once(|| {
        let mut builder = Builder::from_default_env();
        builder
            .format_timestamp_micros()
            .format(|buf, record| {
                writeln!(
                    buf,
                    "[{} {}] [{}:{}] {}",
                    record.level(),
                    record.target(),
                    record.file().unwrap_or("?"),
                    record.line().unwrap_or(0),
                    record.args()
                )
            })
            .init();
    });
}
