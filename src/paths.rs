//! Store path construction.
//!
//! These paths must match the layout the course platform already writes,
//! so they are built exactly:
//!
//! - namespace: course URL up to (excluding) the first `.`
//! - user: `<namespace>/users/<sanitized email>`
//! - lab: `<namespace>/users/<sanitized email>/topic<route suffix after "topic">`
//! - topic: `<namespace>/users/<sanitized email>/<topic id>`

/// Characters the store does not accept inside a path segment.
const ILLEGAL_KEY_CHARS: [char; 7] = ['`', '#', '$', '.', '[', ']', '/'];

const ROUTE_TOPIC_MARKER: &str = "topic";

/// Replace every character that is illegal in a store key with `*`.
pub fn sanitize_email(email: &str) -> String {
    email
        .chars()
        .map(|c| if ILLEGAL_KEY_CHARS.contains(&c) { '*' } else { c })
        .collect()
}

/// Derive the course namespace from its base URL.
///
/// A URL without a `.` is used whole.
pub fn course_namespace(url: &str) -> &str {
    url.split_once('.').map_or(url, |(head, _)| head)
}

pub fn user_path(namespace: &str, email: &str) -> String {
    format!("{}/users/{}", namespace, sanitize_email(email))
}

/// Path of a user's activity for one lab, or `None` when the lab route
/// carries no `topic` segment to anchor on.
pub fn lab_path(namespace: &str, email: &str, lab_route: &str) -> Option<String> {
    let (_, suffix) = lab_route.split_once(ROUTE_TOPIC_MARKER)?;
    Some(format!(
        "{}/{}{}",
        user_path(namespace, email),
        ROUTE_TOPIC_MARKER,
        suffix
    ))
}

pub fn topic_path(namespace: &str, email: &str, topic_id: &str) -> String {
    format!("{}/{}", user_path(namespace, email), topic_id)
}
