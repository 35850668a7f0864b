use crate::config::FolderMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Listing { alias: String, page: u32 },
    File { alias: String, filename: String },
    Redirect { alias: String },
}

/// Maps a decoded request path (without the leading `/`) onto a route.
///
/// Paths outside `folder/` address a file in the default folder, which keeps
/// links from the single-folder layout working. Aliases that are not
/// configured redirect to the default folder.
pub fn parse(path: &str, folders: &FolderMap) -> Route {
    let default = || Route::Redirect {
        alias: folders.default_alias().to_string(),
    };
    if path.is_empty() {
        return default();
    }

    let route = match path.strip_prefix("folder/") {
        Some(rest) => parse_folder(rest),
        None => Route::File {
            alias: folders.default_alias().to_string(),
            filename: path.to_string(),
        },
    };

    let alias = match &route {
        Route::Listing { alias, .. } | Route::File { alias, .. } | Route::Redirect { alias } => alias,
    };
    if folders.contains(alias) {
        route
    } else {
        default()
    }
}

fn parse_folder(rest: &str) -> Route {
    let (alias, tail) = rest.split_once('/').unwrap_or((rest, ""));
    let alias = alias.to_string();
    if tail.is_empty() {
        return Route::Listing { alias, page: 1 };
    }

    let mut segments = tail.splitn(3, '/');
    if let (Some("page"), Some(n)) = (segments.next(), segments.next()) {
        if !n.is_empty() {
            return Route::Listing {
                alias,
                page: page_number(n),
            };
        }
    }
    Route::File {
        alias,
        filename: tail.to_string(),
    }
}

/// Leading decimal digits of `segment`; anything unusable is page 1.
fn page_number(segment: &str) -> u32 {
    let digits = segment
        .find(|c: char| !c.is_ascii_digit())
        .map_or(segment, |end| &segment[..end]);
    match digits.parse::<u32>() {
        Ok(0) | Err(_) => 1,
        Ok(n) => n,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::env_of;

    fn folders() -> FolderMap {
        FolderMap::from_env(&env_of(&[("FOLDER_ID", "root"), ("FOLDER_ID_Docs", "docs")]))
    }

    fn listing(alias: &str, page: u32) -> Route {
        Route::Listing {
            alias: alias.to_string(),
            page,
        }
    }

    fn file(alias: &str, filename: &str) -> Route {
        Route::File {
            alias: alias.to_string(),
            filename: filename.to_string(),
        }
    }

    fn redirect(alias: &str) -> Route {
        Route::Redirect {
            alias: alias.to_string(),
        }
    }

    #[test]
    fn test_empty_path_redirects_home() {
        assert_eq!(parse("", &folders()), redirect("HOME"));
    }

    #[test]
    fn test_empty_path_without_home_uses_first_alias() {
        let folders = FolderMap::from_env(&env_of(&[("FOLDER_ID_Music", "m"), ("FOLDER_ID_Docs", "d")]));
        assert_eq!(parse("", &folders), redirect("Docs"));
    }

    #[test]
    fn test_folder_listing() {
        assert_eq!(parse("folder/Docs", &folders()), listing("Docs", 1));
        assert_eq!(parse("folder/Docs/", &folders()), listing("Docs", 1));
    }

    #[test]
    fn test_folder_page() {
        assert_eq!(parse("folder/Docs/page/3", &folders()), listing("Docs", 3));
        assert_eq!(parse("folder/Docs/page/3/extra", &folders()), listing("Docs", 3));
        assert_eq!(parse("folder/Docs/page/7abc", &folders()), listing("Docs", 7));
    }

    #[test]
    fn test_unusable_page_numbers_fall_back_to_one() {
        assert_eq!(parse("folder/Docs/page/abc", &folders()), listing("Docs", 1));
        assert_eq!(parse("folder/Docs/page/0", &folders()), listing("Docs", 1));
        assert_eq!(parse("folder/Docs/page/-2", &folders()), listing("Docs", 1));
        assert_eq!(parse("folder/Docs/page/99999999999", &folders()), listing("Docs", 1));
    }

    #[test]
    fn test_file_in_folder() {
        assert_eq!(parse("folder/Docs/report.pdf", &folders()), file("Docs", "report.pdf"));
        assert_eq!(parse("folder/Docs/a/b.txt", &folders()), file("Docs", "a/b.txt"));
        // "page" without a number is an ordinary file name
        assert_eq!(parse("folder/Docs/page", &folders()), file("Docs", "page"));
    }

    #[test]
    fn test_root_file_uses_default_alias() {
        assert_eq!(parse("report.pdf", &folders()), file("HOME", "report.pdf"));
        assert_eq!(parse("folder", &folders()), file("HOME", "folder"));
    }

    #[test]
    fn test_unknown_alias_redirects_to_default() {
        assert_eq!(parse("folder/Dcos", &folders()), redirect("HOME"));
        assert_eq!(parse("folder/Dcos/report.pdf", &folders()), redirect("HOME"));
        assert_eq!(parse("folder/docs/page/2", &folders()), redirect("HOME"));
    }

    #[test]
    fn test_home_without_primary_folder_redirects() {
        let folders = FolderMap::from_env(&env_of(&[("FOLDER_ID_Docs", "d")]));
        assert_eq!(parse("folder/HOME", &folders), redirect("Docs"));
        assert_eq!(parse("report.pdf", &folders), file("Docs", "report.pdf"));
    }
}
