use crate::error::{Result, ScanError};
use crate::extract::extract_forms;
use crate::result::{ExtractionResult, Field, Form};
use crate::robots::RobotsPolicy;
use crate::scope::{Admission, CrawlTask, Frontier, Origin, normalize_url};
use crate::session::{FrameHandle, RenderedSession};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Frames nested deeper than this are not entered.
const MAX_FRAME_NESTING: usize = 5;

/// Everything the rendered crawl produced.
#[derive(Debug, Clone, Default)]
pub struct RenderOutcome {
    /// Normalized URLs visited, in visit order. Includes redirect targets.
    pub visited: Vec<String>,
    /// One entry per successfully rendered page, in visit order.
    pub pages: Vec<ExtractionResult>,
}

/// Depth-bounded BFS driven through a [`RenderedSession`].
///
/// The session is used by one page at a time; frames are walked with an
/// explicit stack of handle paths and the session is always returned to the
/// root document after each frame, whether extraction there worked or not.
pub struct RenderCrawler {
    max_depth: usize,
    body_timeout: Duration,
}

impl RenderCrawler {
    pub fn new(max_depth: usize) -> Self {
        Self {
            max_depth,
            body_timeout: Duration::from_secs(10),
        }
    }

    pub fn with_body_timeout(mut self, timeout: Duration) -> Self {
        self.body_timeout = timeout;
        self
    }

    pub async fn crawl<S: RenderedSession>(
        &self,
        session: &mut S,
        start_url: &str,
        robots: Arc<RobotsPolicy>,
    ) -> Result<RenderOutcome> {
        let start = Url::parse(start_url)
            .map_err(|e| ScanError::InvalidUrl(format!("{}: {}", start_url, e)))?;
        let mut frontier = Frontier::new(Origin::of(&start)?, robots);
        let mut pages = Vec::new();

        info!(url = %start, max_depth = self.max_depth, "starting rendered crawl");
        if frontier.try_enqueue(start.clone(), 0) != Admission::Queued {
            warn!(url = %start, "start URL is not crawlable, rendered crawl has nothing to do");
        }

        while let Some(task) = frontier.next_task() {
            if task.depth > self.max_depth {
                info!(url = %task.url, depth = task.depth, "max depth exceeded, skipping");
                continue;
            }

            info!(url = %task.url, depth = task.depth, "rendering");
            match self.visit(session, &mut frontier, &task).await {
                Ok(Some(page)) => {
                    info!(
                        url = %page.url,
                        forms = page.forms.len(),
                        independent_fields = page.independent_fields.len(),
                        "page extracted"
                    );
                    pages.push(page);
                }
                Ok(None) => {}
                Err(ScanError::RenderTimeout { url, timeout_secs }) => {
                    warn!(url = %url, timeout_secs, "body never appeared, page abandoned");
                }
                Err(e) => {
                    warn!(url = %task.url, error = %e, "render failed, page abandoned");
                }
            }
        }

        let visited = frontier.into_visited();
        info!(pages = pages.len(), visited = visited.len(), "rendered crawl complete");
        Ok(RenderOutcome { visited, pages })
    }

    async fn visit<S: RenderedSession>(
        &self,
        session: &mut S,
        frontier: &mut Frontier,
        task: &CrawlTask,
    ) -> Result<Option<ExtractionResult>> {
        let resolved = session.navigate(&task.url).await?;
        session
            .wait_for_body(self.body_timeout)
            .await
            .map_err(|e| match e {
                ScanError::RenderTimeout { timeout_secs, .. } => ScanError::RenderTimeout {
                    url: task.url.to_string(),
                    timeout_secs,
                },
                other => other,
            })?;

        let key = normalize_url(&resolved);
        if key != task.key && !frontier.mark_visited(&key) {
            debug!(url = %task.url, resolved = %resolved, "redirect target already visited");
            return Ok(None);
        }

        if !frontier.in_scope(&resolved) {
            info!(url = %resolved, "redirected out of scope, not extracting");
            return Ok(None);
        }
        if !frontier.robots_allowed(&resolved) {
            info!(url = %resolved, "disallowed by robots.txt, not extracting");
            return Ok(None);
        }

        let mut page = ExtractionResult::new(resolved.to_string());
        let markup = session.list_form_elements().await?;
        let (forms, fields) = extract_forms(&markup, &resolved);
        page.merge(forms, fields);

        let anchors = session.list_anchors().await?;
        self.walk_frames(session, &resolved, &mut page).await;

        let next_depth = task.depth + 1;
        if next_depth > self.max_depth {
            debug!(url = %resolved, links = anchors.len(), "depth limit reached, links not followed");
            return Ok(Some(page));
        }

        for href in anchors {
            let Ok(mut link) = resolved.join(&href) else {
                continue;
            };
            link.set_fragment(None);
            frontier.try_enqueue(link, next_depth);
        }

        Ok(Some(page))
    }

    /// Visits every (nested) frame of the current page, merging their forms.
    async fn walk_frames<S: RenderedSession>(
        &self,
        session: &mut S,
        page_url: &Url,
        page: &mut ExtractionResult,
    ) {
        let mut pending: VecDeque<Vec<FrameHandle>> = match session.enumerate_frames().await {
            Ok(handles) => handles.into_iter().map(|h| vec![h]).collect(),
            Err(e) => {
                warn!(url = %page_url, error = %e, "could not list frames");
                return;
            }
        };

        while let Some(path) = pending.pop_front() {
            let outcome = Self::extract_frame(session, &path).await;

            if let Err(e) = session.switch_to_root().await {
                warn!(url = %page_url, error = %e, "could not return to root document");
            }

            match outcome {
                Ok((forms, fields, children)) => {
                    debug!(url = %page_url, frame = ?path, forms = forms.len(), "frame extracted");
                    page.merge(forms, fields);
                    if path.len() < MAX_FRAME_NESTING {
                        for child in children {
                            let mut child_path = path.clone();
                            child_path.push(child);
                            pending.push_back(child_path);
                        }
                    }
                }
                Err(e) => {
                    warn!(url = %page_url, frame = ?path, error = %e, "frame extraction failed");
                }
            }
        }
    }

    async fn extract_frame<S: RenderedSession>(
        session: &mut S,
        path: &[FrameHandle],
    ) -> Result<(Vec<Form>, Vec<Field>, Vec<FrameHandle>)> {
        for handle in path {
            session.switch_frame(*handle).await?;
        }
        let markup = session.list_form_elements().await?;
        let frame_url = session.context_url().await?;
        let (forms, fields) = extract_forms(&markup, &frame_url);
        let children = session.enumerate_frames().await?;
        Ok((forms, fields, children))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::Method;
    use std::collections::HashMap;

    /// In-memory page served by [`ScriptedSession`].
    #[derive(Clone, Default)]
    struct Page {
        /// Document URL when this page is loaded as a frame.
        url: Option<String>,
        redirect_to: Option<String>,
        html: String,
        anchors: Vec<String>,
        frames: Vec<Page>,
        no_body: bool,
        broken: bool,
    }

    fn page(html: &str, anchors: &[&str]) -> Page {
        Page {
            html: html.to_string(),
            anchors: anchors.iter().map(|a| a.to_string()).collect(),
            ..Default::default()
        }
    }

    /// Scripted session recording navigations and context switches.
    #[derive(Default)]
    struct ScriptedSession {
        pages: HashMap<String, Page>,
        current: Option<(Url, Page)>,
        path: Vec<usize>,
        navigations: Vec<String>,
        root_switches: usize,
    }

    impl ScriptedSession {
        fn with_page(mut self, url: &str, page: Page) -> Self {
            self.pages.insert(url.to_string(), page);
            self
        }

        fn context_page_url(&self) -> Result<Url> {
            let (root_url, mut page) = self
                .current
                .as_ref()
                .map(|(u, p)| (u.clone(), p))
                .ok_or_else(|| ScanError::Render("nothing loaded".into()))?;
            let mut url = root_url;
            for idx in &self.path {
                page = &page.frames[*idx];
                if let Some(ref frame_url) = page.url {
                    url = Url::parse(frame_url).unwrap();
                }
            }
            Ok(url)
        }

        fn context(&self) -> Result<&Page> {
            let (_, mut page) = self
                .current
                .as_ref()
                .map(|(u, p)| (u, p))
                .ok_or_else(|| ScanError::Render("nothing loaded".into()))?;
            for idx in &self.path {
                page = &page.frames[*idx];
            }
            if page.broken {
                return Err(ScanError::Render("frame detached".into()));
            }
            Ok(page)
        }
    }

    impl RenderedSession for ScriptedSession {
        async fn navigate(&mut self, url: &Url) -> Result<Url> {
            self.navigations.push(url.to_string());
            self.path.clear();
            let mut target = url.clone();
            let mut page = self
                .pages
                .get(url.as_str())
                .cloned()
                .ok_or_else(|| ScanError::Render(format!("net::ERR_NAME_NOT_RESOLVED {}", url)))?;
            if let Some(ref to) = page.redirect_to {
                target = Url::parse(to).unwrap();
                page = self.pages.get(to).cloned().unwrap_or_default();
            }
            self.current = Some((target.clone(), page));
            Ok(target)
        }

        fn current_url(&self) -> Option<Url> {
            self.current.as_ref().map(|(u, _)| u.clone())
        }

        async fn context_url(&mut self) -> Result<Url> {
            self.context_page_url()
        }

        async fn wait_for_body(&mut self, timeout: Duration) -> Result<()> {
            match self.current {
                Some((ref url, ref page)) if page.no_body => Err(ScanError::RenderTimeout {
                    url: url.to_string(),
                    timeout_secs: timeout.as_secs(),
                }),
                _ => Ok(()),
            }
        }

        async fn list_anchors(&mut self) -> Result<Vec<String>> {
            Ok(self.context()?.anchors.clone())
        }

        async fn list_form_elements(&mut self) -> Result<String> {
            Ok(self.context()?.html.clone())
        }

        async fn enumerate_frames(&mut self) -> Result<Vec<FrameHandle>> {
            Ok((0..self.context()?.frames.len()).map(FrameHandle).collect())
        }

        async fn switch_frame(&mut self, frame: FrameHandle) -> Result<()> {
            let count = self.context()?.frames.len();
            if frame.0 >= count {
                return Err(ScanError::Render("no such frame".into()));
            }
            self.path.push(frame.0);
            Ok(())
        }

        async fn switch_to_root(&mut self) -> Result<()> {
            self.root_switches += 1;
            self.path.clear();
            Ok(())
        }
    }

    fn allow_all() -> Arc<RobotsPolicy> {
        Arc::new(RobotsPolicy::allow_all())
    }

    #[tokio::test]
    async fn test_depth_bound_is_respected() {
        let mut session = ScriptedSession::default()
            .with_page("http://site.test/", page("", &["http://site.test/one"]))
            .with_page("http://site.test/one", page("", &["http://site.test/two"]))
            .with_page("http://site.test/two", page("", &["http://site.test/three"]))
            .with_page("http://site.test/three", page("", &[]));

        let crawler = RenderCrawler::new(1);
        let outcome = crawler
            .crawl(&mut session, "http://site.test/", allow_all())
            .await
            .unwrap();

        assert_eq!(
            session.navigations,
            vec!["http://site.test/", "http://site.test/one"]
        );
        assert_eq!(outcome.pages.len(), 2);
        assert_eq!(outcome.visited, vec!["http://site.test", "http://site.test/one"]);
    }

    #[tokio::test]
    async fn test_depth_zero_renders_only_root() {
        let mut session = ScriptedSession::default()
            .with_page("http://site.test/", page("", &["http://site.test/one"]));

        let outcome = RenderCrawler::new(0)
            .crawl(&mut session, "http://site.test", allow_all())
            .await
            .unwrap();

        assert_eq!(session.navigations.len(), 1);
        assert_eq!(outcome.pages.len(), 1);
    }

    #[tokio::test]
    async fn test_forms_and_independent_fields_extracted() {
        let html = r#"<form action="/login" method="post"><input type="text" name="user"></form>
                      <input name="q">"#;
        let mut session =
            ScriptedSession::default().with_page("http://site.test/login", page(html, &[]));

        let outcome = RenderCrawler::new(2)
            .crawl(&mut session, "http://site.test/login", allow_all())
            .await
            .unwrap();

        let result = &outcome.pages[0];
        assert_eq!(result.url, "http://site.test/login");
        assert_eq!(result.forms.len(), 1);
        assert_eq!(result.forms[0].action, "http://site.test/login");
        assert_eq!(result.forms[0].method, Method::Post);
        assert_eq!(result.independent_fields[0].name, "q");
    }

    #[tokio::test]
    async fn test_nested_frames_are_merged_and_root_restored() {
        let nested = page(r#"<form action="/deep"><input name="deep"></form>"#, &[]);
        let mut frame = page(r#"<form action="/framed"><input name="inner"></form>"#, &[]);
        frame.frames.push(nested);
        let mut root = page(r#"<form><input name="outer"></form>"#, &["http://site.test/next"]);
        root.frames.push(frame);

        let mut session = ScriptedSession::default()
            .with_page("http://site.test/", root)
            .with_page("http://site.test/next", page("", &[]));

        let outcome = RenderCrawler::new(1)
            .crawl(&mut session, "http://site.test/", allow_all())
            .await
            .unwrap();

        let actions: Vec<&str> = outcome.pages[0]
            .forms
            .iter()
            .map(|f| f.action.as_str())
            .collect();
        assert_eq!(
            actions,
            vec!["http://site.test/", "http://site.test/framed", "http://site.test/deep"]
        );
        assert!(session.path.is_empty());
        assert_eq!(session.root_switches, 2);
        // Links from the root document are still followed after the frame walk.
        assert_eq!(outcome.pages.len(), 2);
    }

    #[tokio::test]
    async fn test_failing_frame_does_not_abort_page() {
        let mut broken = page("", &[]);
        broken.broken = true;
        let healthy = page(r#"<form><input name="ok"></form>"#, &[]);
        let mut root = page("", &[]);
        root.frames = vec![broken, healthy];

        let mut session = ScriptedSession::default().with_page("http://site.test/", root);

        let outcome = RenderCrawler::new(0)
            .crawl(&mut session, "http://site.test/", allow_all())
            .await
            .unwrap();

        assert_eq!(outcome.pages.len(), 1);
        assert_eq!(outcome.pages[0].forms.len(), 1);
        assert_eq!(outcome.pages[0].forms[0].fields[0].name, "ok");
        assert!(session.path.is_empty());
    }

    #[tokio::test]
    async fn test_body_timeout_abandons_only_that_page() {
        let mut slow = page("<form><input name='never'></form>", &[]);
        slow.no_body = true;

        let mut session = ScriptedSession::default()
            .with_page(
                "http://site.test/",
                page("", &["http://site.test/slow", "http://site.test/fast"]),
            )
            .with_page("http://site.test/slow", slow)
            .with_page("http://site.test/fast", page("<input name='q'>", &[]));

        let outcome = RenderCrawler::new(1)
            .crawl(&mut session, "http://site.test/", allow_all())
            .await
            .unwrap();

        let urls: Vec<&str> = outcome.pages.iter().map(|p| p.url.as_str()).collect();
        assert_eq!(urls, vec!["http://site.test/", "http://site.test/fast"]);
    }

    #[tokio::test]
    async fn test_navigation_error_aborts_only_current_task() {
        let mut session = ScriptedSession::default().with_page(
            "http://site.test/",
            page("", &["http://site.test/missing", "http://site.test/"]),
        );

        let outcome = RenderCrawler::new(3)
            .crawl(&mut session, "http://site.test/", allow_all())
            .await
            .unwrap();

        assert_eq!(outcome.pages.len(), 1);
        assert_eq!(session.navigations.len(), 2);
    }

    #[tokio::test]
    async fn test_redirect_uses_resolved_url_and_rechecks_scope() {
        let mut redirect = Page::default();
        redirect.redirect_to = Some("http://elsewhere.test/landing".to_string());
        let mut session = ScriptedSession::default()
            .with_page("http://site.test/", page("", &["http://site.test/out"]))
            .with_page("http://site.test/out", redirect)
            .with_page(
                "http://elsewhere.test/landing",
                page("<input name='leak'>", &[]),
            );

        let outcome = RenderCrawler::new(2)
            .crawl(&mut session, "http://site.test/", allow_all())
            .await
            .unwrap();

        assert_eq!(outcome.pages.len(), 1);
        assert!(outcome.visited.contains(&"http://elsewhere.test/landing".to_string()));
    }

    #[tokio::test]
    async fn test_redirect_target_robots_checked() {
        let mut redirect = Page::default();
        redirect.redirect_to = Some("http://site.test/private/area".to_string());
        let mut session = ScriptedSession::default()
            .with_page("http://site.test/go", redirect)
            .with_page("http://site.test/private/area", page("<input name='x'>", &[]));

        let robots = RobotsPolicy::parse("User-agent: *\nDisallow: /private\n");
        let outcome = RenderCrawler::new(2)
            .crawl(&mut session, "http://site.test/go", Arc::new(robots))
            .await
            .unwrap();

        assert!(outcome.pages.is_empty());
        assert_eq!(
            outcome.visited,
            vec!["http://site.test/go", "http://site.test/private/area"]
        );
    }

    #[tokio::test]
    async fn test_out_of_scope_and_duplicate_links_not_rendered() {
        let mut session = ScriptedSession::default()
            .with_page(
                "http://site.test/",
                page(
                    "",
                    &[
                        "http://other.test/",
                        "http://site.test/a#one",
                        "http://site.test/a/",
                        "mailto:someone@site.test",
                    ],
                ),
            )
            .with_page("http://site.test/a", page("", &[]));

        RenderCrawler::new(5)
            .crawl(&mut session, "http://site.test/", allow_all())
            .await
            .unwrap();

        assert_eq!(
            session.navigations,
            vec!["http://site.test/", "http://site.test/a"]
        );
    }

    #[tokio::test]
    async fn test_frame_form_actions_resolve_against_frame_document() {
        let mut frame = page(
            r#"<form action="submit"><input name="a"></form><form><input name="b"></form>"#,
            &[],
        );
        frame.url = Some("http://site.test/embed/widget".to_string());
        let mut root = page("", &[]);
        root.frames.push(frame);

        let mut session = ScriptedSession::default().with_page("http://site.test/", root);

        let outcome = RenderCrawler::new(0)
            .crawl(&mut session, "http://site.test/", allow_all())
            .await
            .unwrap();

        let actions: Vec<&str> = outcome.pages[0]
            .forms
            .iter()
            .map(|f| f.action.as_str())
            .collect();
        assert_eq!(
            actions,
            vec!["http://site.test/embed/submit", "http://site.test/embed/widget"]
        );
    }

    #[tokio::test]
    async fn test_http_session_frame_forms_resolve_against_frame_url() {
        use crate::session::HttpSession;
        use wiremock::{
            Mock, MockServer, ResponseTemplate,
            matchers::{method, path},
        };

        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"<iframe src="/embed/widget"></iframe>"#),
            )
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/embed/widget"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<form action="submit"><input name="a"></form><form><input name="b"></form>"#,
            ))
            .mount(&mock_server)
            .await;

        let mut session = HttpSession::new(reqwest::Client::new());
        let outcome = RenderCrawler::new(0)
            .crawl(&mut session, &mock_server.uri(), allow_all())
            .await
            .unwrap();

        let actions: Vec<String> = outcome.pages[0]
            .forms
            .iter()
            .map(|f| f.action.clone())
            .collect();
        assert_eq!(
            actions,
            vec![
                format!("{}/embed/submit", mock_server.uri()),
                format!("{}/embed/widget", mock_server.uri()),
            ]
        );
    }

    #[tokio::test]
    async fn test_redirect_to_visited_page_is_not_extracted_twice() {
        let mut redirect = Page::default();
        redirect.redirect_to = Some("http://site.test/".to_string());
        let mut session = ScriptedSession::default()
            .with_page(
                "http://site.test/",
                page("<input name='q'>", &["http://site.test/old"]),
            )
            .with_page("http://site.test/old", redirect);

        let outcome = RenderCrawler::new(2)
            .crawl(&mut session, "http://site.test/", allow_all())
            .await
            .unwrap();

        assert_eq!(
            session.navigations,
            vec!["http://site.test/", "http://site.test/old"]
        );
        assert_eq!(outcome.pages.len(), 1);
        assert_eq!(outcome.pages[0].url, "http://site.test/");
        assert_eq!(outcome.visited, vec!["http://site.test", "http://site.test/old"]);
    }
}
