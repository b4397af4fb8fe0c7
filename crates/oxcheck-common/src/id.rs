use snowflake::SnowflakeIdBucket;
use std::sync::{Mutex, MutexGuard};

static ID_GENERATOR: Mutex<Option<SnowflakeIdBucket>> = Mutex::new(None);

fn lock_generator() -> MutexGuard<'static, Option<SnowflakeIdBucket>> {
    ID_GENERATOR
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Initializes the crash-id generator.
///
/// `machine_id` and `node_id` must be in `0..32`; they keep ids unique when
/// several check servers write crash reports into the same place.
pub fn init(machine_id: i32, node_id: i32) {
    *lock_generator() = Some(SnowflakeIdBucket::new(machine_id, node_id));
}

/// Returns a fresh snowflake id in decimal form, used as crash-report id.
pub fn next_id() -> String {
    let mut gen = lock_generator();
    let bucket = gen.get_or_insert_with(|| SnowflakeIdBucket::new(1, 1));
    bucket.get_id().to_string()
}
