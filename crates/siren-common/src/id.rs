use snowflake::SnowflakeIdBucket;
use std::sync::Mutex;

static ID_GENERATOR: Mutex<Option<SnowflakeIdBucket>> = Mutex::new(None);

/// Initialize the Snowflake ID generator for this process.
///
/// `machine_id` and `node_id` must each be in 0-31. Calling `init` more
/// than once replaces the generator.
pub fn init(machine_id: i32, node_id: i32) {
    let mut gen = ID_GENERATOR
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    *gen = Some(SnowflakeIdBucket::new(machine_id, node_id));
}

/// Generate the next unique ID as a decimal string.
///
/// Falls back to a (1, 1) generator if [`init`] was never called.
pub fn next_id() -> String {
    let mut gen = ID_GENERATOR
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    let bucket = gen.get_or_insert_with(|| SnowflakeIdBucket::new(1, 1));
    bucket.get_id().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn ids_are_unique() {
        init(2, 3);
        let mut seen = HashSet::new();
        for _ in 0..2000 {
            assert!(seen.insert(next_id()), "duplicate ID");
        }
    }

    #[test]
    fn ids_parse_as_i64() {
        init(2, 3);
        assert!(next_id().parse::<i64>().is_ok());
    }
}
