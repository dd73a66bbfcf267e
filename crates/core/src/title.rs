//! Page title formatting.

/// Build the window/page title for a page.
///
/// The page title is trimmed first. Returns `"{page} - {system}"` when
/// anything is left, and the bare system name for a missing or blank title.
#[must_use]
pub fn page_title(system_name: &str, page_title: Option<&str>) -> String {
    match page_title.map(str::trim) {
        Some(page) if !page.is_empty() => format!("{page} - {system_name}"),
        _ => system_name.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_title() {
        assert_eq!(page_title("Admin System", Some("Users")), "Users - Admin System");
        assert_eq!(page_title("Admin System", None), "Admin System");
        assert_eq!(page_title("Admin System", Some("  ")), "Admin System");
        assert_eq!(page_title("Admin System", Some(" Users\t")), "Users - Admin System");
    }
}
