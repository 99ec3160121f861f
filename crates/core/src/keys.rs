//! Storage key layout.
//!
//! Every logical entity maps to exactly one forward-slash delimited key. The
//! mapping is the persisted schema shared by all backends, so it must never
//! change between releases:
//!
//! ```text
//! images/{id}/json
//! images/{id}/_checksum
//! images/{id}/_inprogress
//! images/{id}/layer
//! images/{id}/ancestry
//! repositories/{namespace}/{repo}/tag_{name}
//! repositories/{namespace}/{repo}/images
//! ```

/// Top-level grouping for repositories.
pub const REPOSITORIES: &str = "repositories";

/// Top-level grouping for images.
pub const IMAGES: &str = "images";

/// File name prefix distinguishing tag entries inside a repository.
pub const TAG_PREFIX: &str = "tag_";

/// Metadata document of an image.
pub fn image_json(image_id: &str) -> String {
    format!("{IMAGES}/{image_id}/json")
}

/// Algorithm-tagged checksum declared at registration.
pub fn image_checksum(image_id: &str) -> String {
    format!("{IMAGES}/{image_id}/_checksum")
}

/// Mark: present while the layer has not been verified.
pub fn image_mark(image_id: &str) -> String {
    format!("{IMAGES}/{image_id}/_inprogress")
}

/// Binary layer payload.
pub fn image_layer(image_id: &str) -> String {
    format!("{IMAGES}/{image_id}/layer")
}

/// JSON array of ids, newest first.
pub fn image_ancestry(image_id: &str) -> String {
    format!("{IMAGES}/{image_id}/ancestry")
}

/// Grouping holding every key of a repository.
pub fn repository(namespace: &str, repository: &str) -> String {
    format!("{REPOSITORIES}/{namespace}/{repository}")
}

/// A single tag binding.
pub fn tag(namespace: &str, repository: &str, tag: &str) -> String {
    format!("{REPOSITORIES}/{namespace}/{repository}/{TAG_PREFIX}{tag}")
}

/// Append-only list of image records associated with a repository.
pub fn image_list(namespace: &str, repository: &str) -> String {
    format!("{REPOSITORIES}/{namespace}/{repository}/images")
}

/// Extract the tag name from a key produced by [`tag`].
///
/// Returns `None` for any other key in the repository grouping.
pub fn tag_name(key: &str) -> Option<&str> {
    let base = key.rsplit('/').next().unwrap_or(key);
    base.strip_prefix(TAG_PREFIX).filter(|name| !name.is_empty())
}

/// Validate an identifier that becomes a single key component.
///
/// A component must be non-empty, must not contain `/` and must not be a
/// relative path segment, otherwise two distinct entities could share a key.
pub fn validate_component(kind: &str, value: &str) -> crate::Result<()> {
    if value.is_empty() {
        return Err(crate::Error::InvalidName(format!("{kind} cannot be empty")));
    }
    if value == "." || value == ".." {
        return Err(crate::Error::InvalidName(format!(
            "{kind} cannot be a relative path segment: {value}"
        )));
    }
    if value.contains('/') || value.contains('\\') {
        return Err(crate::Error::InvalidName(format!(
            "{kind} cannot contain path separators: {value}"
        )));
    }
    if value.chars().any(char::is_control) {
        return Err(crate::Error::InvalidName(format!(
            "{kind} contains control characters"
        )));
    }
    Ok(())
}
