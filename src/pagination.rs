//! Page N of a folder, reconstructed from a forward-only cursor API.
//!
//! The listing API can only continue from a cursor, so page N is reached by
//! walking pages 1..N and keeping each returned cursor. When the walk runs out
//! of cursors the last reachable page is served instead.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::drive::ListPage;
use crate::error::Result;

#[async_trait]
pub trait PageSource: Send + Sync {
    async fn list_page(&self, folder_id: &str, cursor: Option<&str>) -> Result<ListPage>;
}

/// Where a listing request landed after replay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replayed {
    /// Page number actually served; lower than requested past the end.
    pub page: u32,
    pub list: ListPage,
}

/// Remembers the cursor that opens page `n` of a folder for a limited time.
#[derive(Debug)]
pub struct CursorCache {
    ttl: Duration,
    entries: Mutex<HashMap<(String, u32), (String, Instant)>>,
}

impl CursorCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.ttl.is_zero()
    }

    /// Highest cached page in `2..=page` and the cursor that opens it.
    fn nearest(&self, folder_id: &str, page: u32) -> Option<(u32, String)> {
        if !self.is_enabled() {
            return None;
        }
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();
        entries.retain(|_, (_, stored)| now.duration_since(*stored) < self.ttl);
        entries
            .iter()
            .filter(|((folder, n), _)| folder == folder_id && (2..=page).contains(n))
            .max_by_key(|((_, n), _)| *n)
            .map(|((_, n), (cursor, _))| (*n, cursor.clone()))
    }

    fn remember(&self, folder_id: &str, page: u32, cursor: &str) {
        if !self.is_enabled() {
            return;
        }
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert((folder_id.to_string(), page), (cursor.to_string(), Instant::now()));
    }
}

/// Serves `page` (1-based) of `folder_id`, or the last page that exists.
pub async fn replay<S: PageSource + ?Sized>(
    source: &S,
    cursors: &CursorCache,
    folder_id: &str,
    page: u32,
) -> Result<Replayed> {
    let page = page.max(1);
    let (mut reached, mut cursor) = match cursors.nearest(folder_id, page) {
        Some((n, cursor)) => (n, Some(cursor)),
        None => (1, None),
    };

    while reached < page {
        let mut skipped = source.list_page(folder_id, cursor.as_deref()).await?;
        match skipped.next_cursor.take() {
            Some(next) => {
                reached += 1;
                cursors.remember(folder_id, reached, &next);
                cursor = Some(next);
            }
            None => {
                // the walk ended on the last page, serve it as is
                tracing::debug!(folder_id, requested = page, served = reached, "page past the end");
                return Ok(Replayed {
                    page: reached,
                    list: skipped,
                });
            }
        }
    }

    let list = source.list_page(folder_id, cursor.as_deref()).await?;
    if let Some(next) = &list.next_cursor {
        cursors.remember(folder_id, reached + 1, next);
    }
    Ok(Replayed {
        page: reached,
        list,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::drive::FileEntry;

    /// `pages` pages of one file each; cursor "c<n>" opens page n.
    struct FakeSource {
        pages: u32,
        calls: AtomicUsize,
    }

    impl FakeSource {
        fn new(pages: u32) -> Self {
            Self {
                pages,
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PageSource for FakeSource {
        async fn list_page(&self, _folder_id: &str, cursor: Option<&str>) -> Result<ListPage> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let n: u32 = match cursor {
                None => 1,
                Some(c) => c.trim_start_matches('c').parse().unwrap(),
            };
            Ok(ListPage {
                files: vec![FileEntry {
                    id: format!("id{n}"),
                    name: format!("file{n}"),
                    mime_type: "text/plain".to_string(),
                    size: None,
                    modified_time: None,
                }],
                next_cursor: (n < self.pages).then(|| format!("c{}", n + 1)),
            })
        }
    }

    fn disabled() -> CursorCache {
        CursorCache::new(Duration::ZERO)
    }

    #[tokio::test]
    async fn test_first_page_is_single_call() {
        let source = FakeSource::new(3);
        let replayed = replay(&source, &disabled(), "f", 1).await.unwrap();
        assert_eq!(replayed.page, 1);
        assert_eq!(replayed.list.files[0].name, "file1");
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_page_n_replays_preceding_pages() {
        let source = FakeSource::new(5);
        let replayed = replay(&source, &disabled(), "f", 3).await.unwrap();
        assert_eq!(replayed.page, 3);
        assert_eq!(replayed.list.files[0].name, "file3");
        assert_eq!(replayed.list.next_cursor.as_deref(), Some("c4"));
        assert_eq!(source.calls(), 3);
    }

    #[tokio::test]
    async fn test_past_the_end_serves_last_page() {
        let source = FakeSource::new(2);
        let replayed = replay(&source, &disabled(), "f", 9).await.unwrap();
        assert_eq!(replayed.page, 2);
        assert_eq!(replayed.list.files[0].name, "file2");
        assert!(replayed.list.next_cursor.is_none());
        // the page that ended the walk is served without a second fetch
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn test_single_page_folder() {
        let source = FakeSource::new(1);
        let replayed = replay(&source, &disabled(), "f", 4).await.unwrap();
        assert_eq!(replayed.page, 1);
        assert_eq!(replayed.list.files[0].name, "file1");
    }

    #[tokio::test]
    async fn test_cursor_cache_shortens_sequential_browsing() {
        let cursors = CursorCache::new(Duration::from_secs(60));
        let source = FakeSource::new(10);

        replay(&source, &cursors, "f", 4).await.unwrap();
        assert_eq!(source.calls(), 4);

        // page 5's cursor was learned while serving page 4
        let replayed = replay(&source, &cursors, "f", 5).await.unwrap();
        assert_eq!(replayed.list.files[0].name, "file5");
        assert_eq!(source.calls(), 5);

        // other folders do not share cursors
        replay(&source, &cursors, "g", 2).await.unwrap();
        assert_eq!(source.calls(), 7);
    }

    #[tokio::test]
    async fn test_cursor_cache_lookup_ignores_page_magnitude() {
        let cursors = CursorCache::new(Duration::from_secs(60));
        let source = FakeSource::new(3);
        replay(&source, &cursors, "f", 3).await.unwrap();
        assert_eq!(cursors.nearest("f", u32::MAX), Some((3, "c3".to_string())));
        assert_eq!(cursors.nearest("f", 2), Some((2, "c2".to_string())));
        assert_eq!(cursors.nearest("g", u32::MAX), None);

        let before = source.calls();
        let replayed = replay(&source, &cursors, "f", u32::MAX).await.unwrap();
        assert_eq!(replayed.page, 3);
        assert_eq!(replayed.list.files[0].name, "file3");
        assert_eq!(source.calls(), before + 1);
    }
}
