/*
 * Decides how an installed plugin or theme is represented in a package: as a
 * registry slug that the provisioning tool can install by name, or as nothing
 * usable at all. Custom code (items that declare no homepage) never reaches the
 * classifier; the export orchestrator archives it directly.
 *
 * Pure function over its inputs and the registry/extension constants below.
 */
use super::package::UNRESOLVED_REFERENCE;

/// Substring identifying a homepage hosted by the public extension registry.
pub const REGISTRY_DOMAIN_MARKER: &str = "//wordpress.org";

/// File extensions that mark a homepage as a direct archive download.
pub const ARCHIVE_EXTENSIONS: &[&str] = &["zip"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// Homepage lives on the registry; carries the canonical slug.
    Registry(String),
    /// Homepage is elsewhere and not an archive; the directory slug is used as a pseudo reference.
    Fallback(String),
    /// Nothing usable was found.
    Unresolved,
}

impl Classification {
    /// The string written into an entry's `url` field.
    pub fn url(&self) -> &str {
        match self {
            Classification::Registry(slug) | Classification::Fallback(slug) => slug,
            Classification::Unresolved => UNRESOLVED_REFERENCE,
        }
    }
}

pub fn classify(homepage_uri: &str, default_slug: &str) -> Classification {
    let uri = homepage_uri.trim();
    let last_segment = last_path_segment(uri);

    if uri.contains(REGISTRY_DOMAIN_MARKER) {
        return match last_segment {
            Some(slug) => Classification::Registry(slug.to_string()),
            None => Classification::Unresolved,
        };
    }

    if !uri.is_empty() && !last_segment.is_some_and(has_archive_extension) {
        if default_slug.is_empty() {
            return Classification::Unresolved;
        }
        return Classification::Fallback(default_slug.to_string());
    }

    Classification::Unresolved
}

/*
 * Last non-empty path segment of a URI, ignoring query string, fragment and
 * trailing slashes. For "https://wordpress.org/plugins/my-plugin/" this is
 * "my-plugin". Returns None when the URI has no path beyond its host.
 */
fn last_path_segment(uri: &str) -> Option<&str> {
    let without_query = uri.split(['?', '#']).next().unwrap_or("");
    let path = match without_query.find("//") {
        Some(index) => {
            let after_scheme = &without_query[index + 2..];
            match after_scheme.find('/') {
                Some(slash) => &after_scheme[slash..],
                None => "",
            }
        }
        None => without_query,
    };
    path.split('/').rev().find(|segment| !segment.is_empty())
}

fn has_archive_extension(segment: &str) -> bool {
    match segment.rsplit_once('.') {
        Some((_, extension)) => ARCHIVE_EXTENSIONS
            .iter()
            .any(|known| known.eq_ignore_ascii_case(extension)),
        None => false,
    }
}
