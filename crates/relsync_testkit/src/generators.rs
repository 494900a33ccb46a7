//! Property-based test generators using proptest.
//!
//! Generated values survive a trip through the remote data model:
//! doubles are finite, dates range over years 1 to 9999 at nanosecond precision.

use crate::fixtures::{date, TASK};
use chrono::{DateTime, Duration, Utc};
use proptest::prelude::*;
use relsync_store::{LocalValue, Record};

/// Strategy for generating sync IDs that are valid remote keys.
pub fn sync_id_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-f0-9]{8,32}").expect("Invalid regex")
}

/// Strategy for generating task titles.
pub fn title_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Za-z0-9 ,.!?-]{1,40}").expect("Invalid regex")
}

/// Strategy for generating dates, about half of them finer than a millisecond.
pub fn date_strategy() -> impl Strategy<Value = DateTime<Utc>> {
    (
        -62_135_596_800_000i64..253_402_300_799_000,
        prop_oneof![Just(0i64), 1i64..1_000_000],
    )
        .prop_map(|(millis, nanos)| date(millis) + Duration::nanoseconds(nanos))
}

/// Strategy for generating optional local values of one attribute type.
fn optional<T: Into<LocalValue> + std::fmt::Debug>(
    strategy: impl Strategy<Value = T>,
) -> impl Strategy<Value = LocalValue> {
    prop::option::of(strategy).prop_map(LocalValue::from)
}

/// Strategy for generating tasks with every scalar attribute populated or not.
pub fn task_strategy() -> impl Strategy<Value = Record> {
    (
        sync_id_strategy(),
        title_strategy(),
        optional(any::<bool>()),
        optional(any::<i64>()),
        optional(-1.0e9f64..1.0e9),
        optional(date_strategy()),
        optional(prop::collection::vec(any::<u8>(), 0..64)),
    )
        .prop_map(|(sync_id, title, done, priority, progress, due, attachment)| {
            Record::new(TASK)
                .with("syncID", sync_id)
                .with("title", title)
                .with("done", done)
                .with("priority", priority)
                .with("progress", progress)
                .with("dueDate", due)
                .with("attachment", attachment)
        })
}
