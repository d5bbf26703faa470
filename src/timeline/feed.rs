use std::collections::{HashSet, VecDeque};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::Serialize;

use crate::config::Config;
use crate::db::models::{HashtagSummary, MediaItem};
use crate::error::{AppError, AppResult};
use crate::store::posts::PostFilter;
use crate::store::{contains_pattern, engagement, hashtags, posts, prefix_pattern, users};
use crate::timeline::augment::{AugmentedPost, Augmenter, UserProfile};
use crate::timeline::cursor::{paginate, Page, PageRequest, Pager, MEDIA_PAGE_SIZE, POST_PAGE_SIZE};
use crate::timeline::rating::rank;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchKind {
    Top,
    Latest,
    People,
    Media,
    Hashtag,
}

impl FromStr for SearchKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "top" => Ok(SearchKind::Top),
            "latest" => Ok(SearchKind::Latest),
            "people" => Ok(SearchKind::People),
            "media" => Ok(SearchKind::Media),
            "hashtag" => Ok(SearchKind::Hashtag),
            other => Err(AppError::BadRequest(format!("Invalid query type {other:?}"))),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum SearchResults {
    Posts(Page<AugmentedPost>),
    People(Page<UserProfile>),
    Media(Page<MediaItem>),
    Hashtags(Page<HashtagSummary>),
}

impl SearchResults {
    fn empty(kind: SearchKind) -> Self {
        match kind {
            SearchKind::Top | SearchKind::Latest => SearchResults::Posts(Page::empty()),
            SearchKind::People => SearchResults::People(Page::empty()),
            SearchKind::Media => SearchResults::Media(Page::empty()),
            SearchKind::Hashtag => SearchResults::Hashtags(Page::empty()),
        }
    }
}

/// Builds the paginated listings one viewer can request.
pub struct FeedAssembler<'a> {
    conn: &'a Connection,
    viewer_id: &'a str,
    config: &'a Config,
}

impl<'a> FeedAssembler<'a> {
    pub fn new(conn: &'a Connection, viewer_id: &'a str, config: &'a Config) -> Self {
        Self {
            conn,
            viewer_id,
            config,
        }
    }

    fn augmenter(&self) -> Augmenter<'a> {
        Augmenter::new(self.conn, self.viewer_id, &self.config.media)
    }

    fn post_listing(&self, filter: PostFilter<'_>, req: PageRequest) -> AppResult<Page<AugmentedPost>> {
        let count = posts::count(self.conn, filter, req.cursor)?;
        let pager = Pager::new(count, req.page, POST_PAGE_SIZE)?;
        let ids = posts::window_ids(self.conn, filter, req.cursor, pager.limit(), pager.offset())?;

        let augmenter = self.augmenter();
        pager.finish(ids).try_map(|id| augmenter.post_by_id(&id))
    }

    fn media_listing(&self, filter: PostFilter<'_>, req: PageRequest) -> AppResult<Page<MediaItem>> {
        let count = posts::count_media(self.conn, filter, req.cursor)?;
        let pager = Pager::new(count, req.page, MEDIA_PAGE_SIZE)?;
        let media =
            posts::window_media(self.conn, filter, req.cursor, pager.limit(), pager.offset())?;

        let augmenter = self.augmenter();
        Ok(pager.finish(media).map(|item| augmenter.media(item)))
    }

    /// Posts by the viewer and everyone the viewer follows.
    pub fn home(&self, req: PageRequest) -> AppResult<Page<AugmentedPost>> {
        self.post_listing(
            PostFilter::Timeline {
                viewer_id: self.viewer_id,
            },
            req,
        )
    }

    pub fn user_posts(&self, user_id: &str, req: PageRequest) -> AppResult<Page<AugmentedPost>> {
        self.post_listing(PostFilter::AuthoredBy { user_id }, req)
    }

    pub fn user_likes(&self, user_id: &str, req: PageRequest) -> AppResult<Page<AugmentedPost>> {
        self.post_listing(PostFilter::LikedBy { user_id }, req)
    }

    /// The viewer's own bookmarks.
    pub fn bookmarks(&self, req: PageRequest) -> AppResult<Page<AugmentedPost>> {
        self.post_listing(
            PostFilter::BookmarkedBy {
                user_id: self.viewer_id,
            },
            req,
        )
    }

    pub fn user_media(&self, user_id: &str, req: PageRequest) -> AppResult<Page<MediaItem>> {
        self.media_listing(PostFilter::AuthoredBy { user_id }, req)
    }

    /// Every transitive reply under `root_id`, newest first regardless of
    /// depth.
    pub fn reply_thread(&self, root_id: &str, req: PageRequest) -> AppResult<Page<AugmentedPost>> {
        if !posts::exists(self.conn, root_id)? {
            return Err(AppError::NotFound("Post not found"));
        }

        let mut replies: Vec<(String, DateTime<Utc>)> = collect_descendants(self.conn, root_id)?
            .into_iter()
            .filter(|(_, created_at)| *created_at <= req.cursor)
            .collect();
        replies.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| b.0.cmp(&a.0)));

        let page = paginate(replies, req.page, POST_PAGE_SIZE)?;
        let augmenter = self.augmenter();
        page.try_map(|(id, _)| augmenter.post_by_id(&id))
    }

    /// Run a search. An empty query returns an empty page without touching
    /// the store.
    pub fn search(
        &self,
        kind: SearchKind,
        query: Option<&str>,
        req: PageRequest,
    ) -> AppResult<SearchResults> {
        let query = query.map(str::trim).unwrap_or_default();
        if query.is_empty() {
            return Ok(SearchResults::empty(kind));
        }

        match kind {
            SearchKind::Top => self.search_top(query, req).map(SearchResults::Posts),
            SearchKind::Latest => {
                let pattern = contains_pattern(query);
                self.post_listing(PostFilter::ContentMatches { pattern: &pattern }, req)
                    .map(SearchResults::Posts)
            }
            SearchKind::People => self.search_people(query, req).map(SearchResults::People),
            SearchKind::Media => {
                let pattern = contains_pattern(query);
                self.media_listing(PostFilter::ContentMatches { pattern: &pattern }, req)
                    .map(SearchResults::Media)
            }
            SearchKind::Hashtag => self.search_hashtags(query, req).map(SearchResults::Hashtags),
        }
    }

    fn search_top(&self, query: &str, req: PageRequest) -> AppResult<Page<AugmentedPost>> {
        let pattern = contains_pattern(query);
        let candidates = posts::window_ids(
            self.conn,
            PostFilter::ContentMatches { pattern: &pattern },
            req.cursor,
            self.config.search.max_ranked_candidates,
            0,
        )?;
        tracing::debug!(query, candidates = candidates.len(), "Ranking search results");

        let scored = candidates
            .into_iter()
            .map(|id| {
                let counts = engagement::counts(self.conn, &id)?;
                Ok((id, counts))
            })
            .collect::<AppResult<Vec<_>>>()?;
        let ranked: Vec<String> = rank(scored).into_iter().map(|r| r.item).collect();

        let page = paginate(ranked, req.page, POST_PAGE_SIZE)?;
        let augmenter = self.augmenter();
        page.try_map(|id| augmenter.post_by_id(&id))
    }

    fn search_people(&self, query: &str, req: PageRequest) -> AppResult<Page<UserProfile>> {
        let pattern = contains_pattern(query);
        let count = users::count_people(self.conn, &pattern, req.cursor)?;
        let pager = Pager::new(count, req.page, POST_PAGE_SIZE)?;
        let found = users::search_people(
            self.conn,
            &pattern,
            req.cursor,
            pager.limit(),
            pager.offset(),
        )?;

        let augmenter = self.augmenter();
        pager.finish(found).try_map(|user| augmenter.profile(user))
    }

    fn search_hashtags(&self, query: &str, req: PageRequest) -> AppResult<Page<HashtagSummary>> {
        let name = query.trim_start_matches('#').to_lowercase();
        if name.is_empty() {
            return Ok(Page::empty());
        }
        let pattern = prefix_pattern(&name);
        let count = hashtags::count_prefix(self.conn, &pattern, req.cursor)?;
        let pager = Pager::new(count, req.page, POST_PAGE_SIZE)?;
        let tags = hashtags::window_prefix(
            self.conn,
            &pattern,
            req.cursor,
            pager.limit(),
            pager.offset(),
        )?;
        Ok(pager.finish(tags))
    }
}

/// All transitive replies under `root_id`, each exactly once. Walks the tree
/// breadth-first with an explicit queue so thread depth never grows the
/// stack.
pub fn collect_descendants(
    conn: &Connection,
    root_id: &str,
) -> rusqlite::Result<Vec<(String, DateTime<Utc>)>> {
    let mut seen: HashSet<String> = HashSet::from([root_id.to_string()]);
    let mut queue: VecDeque<String> = VecDeque::from([root_id.to_string()]);
    let mut descendants = Vec::new();

    while let Some(parent) = queue.pop_front() {
        for (id, created_at) in posts::reply_children(conn, &parent)? {
            if seen.insert(id.clone()) {
                queue.push_back(id.clone());
                descendants.push((id, created_at));
            }
        }
    }
    Ok(descendants)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use crate::store::posts::fixtures::{post, reply};
    use crate::store::users::fixtures::user;
    use chrono::{Duration, TimeZone};

    fn t() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn first_page() -> PageRequest {
        PageRequest {
            page: 1,
            cursor: t(),
        }
    }

    fn ids(page: &Page<AugmentedPost>) -> Vec<String> {
        page.results.iter().map(|p| p.id.clone()).collect()
    }

    #[test]
    fn home_timeline_example_scenario() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let config = Config::default();
        let viewer = user(&conn, "viewer", t() - Duration::days(1));
        let a = user(&conn, "author_a", t() - Duration::days(1));
        let b = user(&conn, "author_b", t() - Duration::days(1));
        engagement::insert_follow(&conn, &viewer.id, &b.id, t() - Duration::days(1)).unwrap();

        let a_post = post(&conn, &a.id, "from a", t() - Duration::seconds(10));
        let b_post = post(&conn, &b.id, "from b", t() - Duration::seconds(5));

        let feed = FeedAssembler::new(&conn, &viewer.id, &config);
        let page = feed.home(first_page()).unwrap();
        assert_eq!(ids(&page), vec![b_post.id.clone()]);

        engagement::insert_follow(&conn, &viewer.id, &a.id, t() - Duration::days(1)).unwrap();
        let page = feed.home(first_page()).unwrap();
        assert_eq!(ids(&page), vec![b_post.id, a_post.id]);
        assert_eq!(page.count, 2);
        assert_eq!(page.total_pages, 1);
        assert_eq!((page.next, page.previous), (None, None));
    }

    #[test]
    fn pages_are_stable_under_later_writes() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let config = Config::default();
        let viewer = user(&conn, "viewer", t() - Duration::days(1));
        for i in 0..25 {
            post(&conn, &viewer.id, "p", t() - Duration::seconds(100 - i));
        }

        let feed = FeedAssembler::new(&conn, &viewer.id, &config);
        let before = feed
            .home(PageRequest {
                page: 2,
                cursor: t(),
            })
            .unwrap();
        post(&conn, &viewer.id, "new", t() + Duration::seconds(1));
        let after = feed
            .home(PageRequest {
                page: 2,
                cursor: t(),
            })
            .unwrap();

        assert_eq!(ids(&before), ids(&after));
        assert_eq!(after.results.len(), 5);
        assert_eq!(after.previous, Some(1));
        assert!(matches!(
            feed.home(PageRequest {
                page: 3,
                cursor: t()
            }),
            Err(AppError::InvalidPage)
        ));
    }

    #[test]
    fn reply_thread_collects_all_descendants_newest_first() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let config = Config::default();
        let u = user(&conn, "replier", t() - Duration::days(1));
        let root = post(&conn, &u.id, "root", t() - Duration::seconds(100));

        // root -> r1 -> r1a -> r1a_i ; root -> r2 ; deep replies written early.
        let r1 = reply(&conn, &u.id, &root.id, t() - Duration::seconds(90));
        let r2 = reply(&conn, &u.id, &root.id, t() - Duration::seconds(20));
        let r1a = reply(&conn, &u.id, &r1.id, t() - Duration::seconds(80));
        let r1a_i = reply(&conn, &u.id, &r1a.id, t() - Duration::seconds(30));
        let late = reply(&conn, &u.id, &r1.id, t() + Duration::seconds(30));

        let feed = FeedAssembler::new(&conn, &u.id, &config);
        let page = feed.reply_thread(&root.id, first_page()).unwrap();
        assert_eq!(
            ids(&page),
            vec![r2.id.clone(), r1a_i.id.clone(), r1a.id.clone(), r1.id.clone()]
        );
        assert!(!ids(&page).contains(&late.id));

        let all = collect_descendants(&conn, &root.id).unwrap();
        assert_eq!(all.len(), 5);
    }

    #[test]
    fn deep_threads_do_not_recurse() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let u = user(&conn, "replier", t());
        let root = post(&conn, &u.id, "root", t());
        let mut parent = root.id.clone();
        for _ in 0..2000 {
            parent = reply(&conn, &u.id, &parent, t()).id;
        }
        assert_eq!(collect_descendants(&conn, &root.id).unwrap().len(), 2000);
    }

    #[test]
    fn reply_thread_of_missing_post_is_not_found() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let config = Config::default();
        let feed = FeedAssembler::new(&conn, "viewer", &config);
        assert!(matches!(
            feed.reply_thread("missing", first_page()),
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn search_kind_parsing() {
        assert_eq!("top".parse::<SearchKind>().unwrap(), SearchKind::Top);
        assert_eq!("hashtag".parse::<SearchKind>().unwrap(), SearchKind::Hashtag);
        assert!(matches!(
            "trending".parse::<SearchKind>(),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn empty_query_short_circuits() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let config = Config::default();
        let feed = FeedAssembler::new(&conn, "viewer", &config);
        // Page 7 would be out of range if the store were consulted.
        let req = PageRequest {
            page: 7,
            cursor: t(),
        };
        for kind in [
            SearchKind::Top,
            SearchKind::People,
            SearchKind::Media,
            SearchKind::Hashtag,
        ] {
            match feed.search(kind, Some("  "), req).unwrap() {
                SearchResults::Posts(p) => assert!(p.results.is_empty()),
                SearchResults::People(p) => assert!(p.results.is_empty()),
                SearchResults::Media(p) => assert!(p.results.is_empty()),
                SearchResults::Hashtags(p) => assert!(p.results.is_empty()),
            }
        }
        assert!(matches!(
            feed.search(SearchKind::Latest, None, req).unwrap(),
            SearchResults::Posts(p) if p.count == 0
        ));
    }

    #[test]
    fn top_search_ranks_and_latest_keeps_recency() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let config = Config::default();
        let author = user(&conn, "author", t() - Duration::days(1));
        let older = post(&conn, &author.id, "rust tips", t() - Duration::seconds(20));
        let newer = post(&conn, &author.id, "rust news", t() - Duration::seconds(10));
        post(&conn, &author.id, "python news", t() - Duration::seconds(5));

        // Heavy engagement on the older post.
        for i in 0..30 {
            let fan = user(&conn, &format!("fan_{i:02}"), t() - Duration::days(1));
            engagement::insert_like(&conn, &older.id, &fan.id, t() - Duration::seconds(15)).unwrap();
            engagement::insert_visit(&conn, &fan.id, &older.id, t() - Duration::seconds(15)).unwrap();
            engagement::insert_bookmark(&conn, &older.id, &fan.id, t() - Duration::seconds(15)).unwrap();
            reply(&conn, &fan.id, &older.id, t() - Duration::seconds(15));
        }

        let feed = FeedAssembler::new(&conn, &author.id, &config);
        let SearchResults::Posts(latest) = feed.search(SearchKind::Latest, Some("rust"), first_page()).unwrap() else {
            panic!("expected posts");
        };
        assert_eq!(ids(&latest), vec![newer.id.clone(), older.id.clone()]);

        let SearchResults::Posts(top) = feed.search(SearchKind::Top, Some("RUST"), first_page()).unwrap() else {
            panic!("expected posts");
        };
        assert_eq!(ids(&top), vec![older.id, newer.id]);
    }

    #[test]
    fn media_and_hashtag_search() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let config = Config::default();
        let author = user(&conn, "author", t() - Duration::days(1));
        let p = post(&conn, &author.id, "sunset #photo", t() - Duration::seconds(5));
        posts::insert_images(&conn, &p.id, &["a.jpg".into(), "b.jpg".into()]).unwrap();
        hashtags::set_for_post(&conn, &p.id, &["photo".into()]).unwrap();

        let feed = FeedAssembler::new(&conn, &author.id, &config);
        let SearchResults::Media(media) = feed.search(SearchKind::Media, Some("sunset"), first_page()).unwrap() else {
            panic!("expected media");
        };
        assert_eq!(media.count, 2);
        assert_eq!(media.results[0].url, "http://localhost:3000/media/a.jpg");

        let SearchResults::Hashtags(tags) = feed.search(SearchKind::Hashtag, Some("#Pho"), first_page()).unwrap() else {
            panic!("expected hashtags");
        };
        assert_eq!(tags.results.len(), 1);
        assert_eq!(tags.results[0].name, "photo");
        assert_eq!(tags.results[0].post_count, 1);
    }
}
