//! Serde helpers for `Duration` fields written as whole milliseconds.
//!
//! ```rust
//! use std::time::Duration;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize, Deserialize)]
//! struct Config {
//!     #[serde(with = "tabsync_protocol::millis")]
//!     ttl: Duration,
//! }
//!
//! let cfg: Config = serde_json::from_str(r#"{"ttl":1500}"#).unwrap();
//! assert_eq!(cfg.ttl, Duration::from_millis(1500));
//! ```

use std::time::Duration;

use serde::{Deserialize, Deserializer, Serializer};

pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    let ms = u64::try_from(value.as_millis()).unwrap_or(u64::MAX);
    serializer.serialize_u64(ms)
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    u64::deserialize(deserializer).map(Duration::from_millis)
}
