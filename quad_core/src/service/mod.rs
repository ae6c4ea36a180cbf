pub mod groups;
pub mod messages;
pub mod posts;
pub mod users;

/// Timestamps are stored as RFC 3339 strings.
pub(crate) fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}
