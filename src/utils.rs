use chrono::Utc;

/// Current wall clock time in unix seconds.
pub fn unix_now() -> i64 {
    Utc::now().timestamp()
}
