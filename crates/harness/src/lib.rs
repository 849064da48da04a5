pub mod fixtures;
pub mod fleet;
pub mod vehicle;

pub use fleet::TestFleet;
pub use vehicle::TestVehicle;

use std::sync::Once;

static INIT: Once = Once::new();

/// Route engine logs to the test output. Filtered by `RUST_LOG`, silent when unset.
pub fn init_tracing() {
    INIT.call_once(|| {
        if std::env::var("RUST_LOG").is_ok() {
            tracing_subscriber::fmt()
                .with_test_writer()
                .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
                .try_init()
                .ok();
        }
    });
}
