use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use crate::domain::embedding_provider::EmbeddingProvider;
use crate::domain::query::QueryInput;
use crate::domain::result::{normalize, PointKey, ResultItem};
use crate::domain::vector_repository::VectorRepository;
use crate::error::SearchError;

/// Published lifecycle state of a search session.
///
/// `Ready` carries the result set in exactly the order the store returned
/// it; the store defines ordering and tie-break semantics and the session
/// never re-sorts.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Idle,
    Searching,
    Ready(Vec<ResultItem>),
    Failed(SearchError),
}

type StateListener = Box<dyn Fn(&SessionState) + Send + Sync>;

struct SessionInner {
    seq: u64,
    state: SessionState,
    pending: HashSet<PointKey>,
}

/// Orchestrates a single query lifecycle (embed, search, normalize,
/// publish) and mediates the two-phase deprecation workflow.
///
/// All state sits behind a mutex that is never held across an await;
/// suspension points are the embedding call, the search call and the
/// deprecation commit. Each search is tagged with a monotonically
/// increasing sequence number and only the response matching the latest
/// one may transition the session, so a slow stale response cannot clobber
/// a faster newer one. The underlying transport call is never cancelled,
/// just discarded on completion.
pub struct SearchSession {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorRepository>,
    limit: u64,
    inner: Mutex<SessionInner>,
    listener: Option<StateListener>,
}

impl SearchSession {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorRepository>,
        limit: u64,
    ) -> Self {
        Self {
            embedder,
            store,
            limit,
            inner: Mutex::new(SessionInner {
                seq: 0,
                state: SessionState::Idle,
                pending: HashSet::new(),
            }),
            listener: None,
        }
    }

    /// Registers the callback invoked on every published state transition.
    pub fn set_listener(&mut self, listener: impl Fn(&SessionState) + Send + Sync + 'static) {
        self.listener = Some(Box::new(listener));
    }

    pub fn state(&self) -> SessionState {
        self.inner.lock().unwrap().state.clone()
    }

    /// The currently visible result set; empty unless the session is
    /// `Ready`.
    pub fn results(&self) -> Vec<ResultItem> {
        match &self.inner.lock().unwrap().state {
            SessionState::Ready(items) => items.clone(),
            _ => Vec::new(),
        }
    }

    pub fn is_pending(&self, id: &PointKey) -> bool {
        self.inner.lock().unwrap().pending.contains(id)
    }

    /// Runs one search cycle. Text input goes through the embedding
    /// provider first; a caller-supplied vector skips it.
    ///
    /// Blank text fails synchronously with [`SearchError::EmptyQuery`]
    /// before either external service is called; that is the only error
    /// returned here. Every asynchronous failure is caught and mapped to
    /// `Failed` carrying the typed error, so the session can never strand
    /// in `Searching`. A submission that has been superseded by a newer one
    /// leaves the newer outcome untouched.
    pub async fn submit_query(&self, input: QueryInput) -> Result<(), SearchError> {
        if let QueryInput::Text(text) = &input {
            if text.trim().is_empty() {
                return Err(SearchError::EmptyQuery);
            }
        }

        let seq = {
            let mut inner = self.inner.lock().unwrap();
            inner.seq += 1;
            inner.state = SessionState::Searching;
            inner.seq
        };
        self.publish();

        let outcome = self.run_search(input).await;

        {
            let mut inner = self.inner.lock().unwrap();
            if inner.seq != seq {
                log::debug!(
                    "Search #{} superseded by #{}, discarding response",
                    seq,
                    inner.seq
                );
                return Ok(());
            }
            inner.state = match outcome {
                Ok(items) => SessionState::Ready(items),
                Err(e) => {
                    log::error!("Search #{} failed: {}", seq, e);
                    SessionState::Failed(e)
                }
            };
            // Pending confirmations referred to the replaced result set.
            inner.pending.clear();
        }
        self.publish();
        Ok(())
    }

    async fn run_search(&self, input: QueryInput) -> Result<Vec<ResultItem>, SearchError> {
        let vector = match input {
            QueryInput::Text(text) => self.embedder.embed(&text).await?,
            QueryInput::Vector(vector) => vector,
        };
        let hits = self.store.search(vector, self.limit, true).await?;
        Ok(hits.into_iter().map(normalize).collect())
    }

    /// First half of the confirm gesture: marks the item as awaiting
    /// confirmation. Returns false (a no-op, not an error) when the id is
    /// not in the visible result set.
    pub fn request_deprecation(&self, id: &PointKey) -> bool {
        let mut inner = self.inner.lock().unwrap();
        let visible = matches!(
            &inner.state,
            SessionState::Ready(items) if items.iter().any(|item| item.id == *id)
        );
        if !visible {
            log::debug!("Deprecation requested for absent item {}, ignoring", id);
            return false;
        }
        inner.pending.insert(id.clone());
        true
    }

    /// Drops a pending confirmation with no side effects.
    pub fn cancel_deprecation(&self, id: &PointKey) -> bool {
        self.inner.lock().unwrap().pending.remove(id)
    }

    /// Second half of the confirm gesture: commits the deprecation mark to
    /// the store. Only reachable for an id that went through
    /// [`request_deprecation`](Self::request_deprecation); anything else is
    /// a no-op returning `Ok(false)`.
    ///
    /// On success the item is pruned from the local result set; the
    /// authoritative removal lives in the store. On failure the item stays
    /// active and visible, keeping what the user sees consistent with what
    /// the store holds, and the typed error is surfaced without touching
    /// the rest of the result set.
    pub async fn confirm_deprecation(&self, id: &PointKey) -> Result<bool, SearchError> {
        {
            let mut inner = self.inner.lock().unwrap();
            if !inner.pending.remove(id) {
                log::debug!("Deprecation confirm for {} without a pending request", id);
                return Ok(false);
            }
        }

        match self.store.mark_deprecated(id).await {
            Ok(()) => {
                {
                    let mut inner = self.inner.lock().unwrap();
                    if let SessionState::Ready(items) = &mut inner.state {
                        items.retain(|item| item.id != *id);
                    }
                }
                self.publish();
                Ok(true)
            }
            Err(e) => {
                log::error!("Failed to mark item {} as deprecated: {}", id, e);
                Err(e)
            }
        }
    }

    fn publish(&self) {
        if let Some(listener) = &self.listener {
            let state = self.inner.lock().unwrap().state.clone();
            listener(&state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::time::Duration;

    use crate::domain::result::RawHit;

    fn hit(id: u64, score: f32, text: &str) -> RawHit {
        let payload = match json!({ "text": text }) {
            serde_json::Value::Object(map) => map,
            _ => unreachable!(),
        };
        RawHit {
            id: PointKey::Num(id),
            score: Some(score),
            payload,
        }
    }

    type CallLog = Arc<Mutex<Vec<&'static str>>>;

    struct MockEmbedder {
        log: CallLog,
        result: Result<Vec<f32>, SearchError>,
    }

    #[async_trait]
    impl EmbeddingProvider for MockEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, SearchError> {
            self.log.lock().unwrap().push("embed");
            self.result.clone()
        }
    }

    struct SearchResponse {
        delay: Duration,
        result: Result<Vec<RawHit>, SearchError>,
    }

    struct MockStore {
        log: CallLog,
        searches: Mutex<VecDeque<SearchResponse>>,
        mark_results: Mutex<VecDeque<Result<(), SearchError>>>,
        marked: Mutex<Vec<PointKey>>,
    }

    impl MockStore {
        fn new(log: CallLog) -> Self {
            Self {
                log,
                searches: Mutex::new(VecDeque::new()),
                mark_results: Mutex::new(VecDeque::new()),
                marked: Mutex::new(Vec::new()),
            }
        }

        fn push_search(&self, delay: Duration, result: Result<Vec<RawHit>, SearchError>) {
            self.searches
                .lock()
                .unwrap()
                .push_back(SearchResponse { delay, result });
        }

        fn push_mark(&self, result: Result<(), SearchError>) {
            self.mark_results.lock().unwrap().push_back(result);
        }

        fn marked(&self) -> Vec<PointKey> {
            self.marked.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl VectorRepository for MockStore {
        async fn search(
            &self,
            _vector: Vec<f32>,
            _limit: u64,
            _exclude_deprecated: bool,
        ) -> Result<Vec<RawHit>, SearchError> {
            self.log.lock().unwrap().push("search");
            let response = self
                .searches
                .lock()
                .unwrap()
                .pop_front()
                .expect("unexpected search call");
            if !response.delay.is_zero() {
                tokio::time::sleep(response.delay).await;
            }
            response.result
        }

        async fn mark_deprecated(&self, id: &PointKey) -> Result<(), SearchError> {
            self.log.lock().unwrap().push("mark");
            self.marked.lock().unwrap().push(id.clone());
            self.mark_results
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(()))
        }
    }

    fn session_with(
        embed_result: Result<Vec<f32>, SearchError>,
    ) -> (SearchSession, Arc<MockStore>, CallLog) {
        let log: CallLog = Arc::new(Mutex::new(Vec::new()));
        let embedder = Arc::new(MockEmbedder {
            log: log.clone(),
            result: embed_result,
        });
        let store = Arc::new(MockStore::new(log.clone()));
        let session = SearchSession::new(embedder, store.clone(), 10);
        (session, store, log)
    }

    #[tokio::test]
    async fn text_query_embeds_then_searches_exactly_once() {
        let (session, store, log) = session_with(Ok(vec![0.1, 0.2]));
        store.push_search(
            Duration::ZERO,
            Ok(vec![hit(1, 0.95, "first"), hit(2, 0.80, "second")]),
        );

        session.submit_query("alpha".into()).await.unwrap();

        assert_eq!(*log.lock().unwrap(), vec!["embed", "search"]);
        let results = session.results();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, PointKey::Num(1));
        assert_eq!(results[0].text(), Some("first"));
        assert_eq!(results[1].id, PointKey::Num(2));
    }

    #[tokio::test]
    async fn blank_query_fails_synchronously_without_calls() {
        let (session, _store, log) = session_with(Ok(vec![0.1]));

        let err = session.submit_query("   ".into()).await.unwrap_err();
        assert_eq!(err, SearchError::EmptyQuery);
        assert!(log.lock().unwrap().is_empty());
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn vector_query_skips_the_embedder() {
        let (session, store, log) = session_with(Ok(vec![]));
        store.push_search(Duration::ZERO, Ok(vec![hit(1, 0.9, "first")]));

        session
            .submit_query(QueryInput::Vector(vec![0.5; 4]))
            .await
            .unwrap();

        assert_eq!(*log.lock().unwrap(), vec!["search"]);
        assert_eq!(session.results().len(), 1);
    }

    #[tokio::test]
    async fn provider_rejection_fails_without_a_search_call() {
        let (session, _store, log) = session_with(Err(SearchError::Provider {
            status: 401,
            message: "Unauthorized".to_string(),
        }));

        session.submit_query("alpha".into()).await.unwrap();

        assert_eq!(*log.lock().unwrap(), vec!["embed"]);
        assert_matches!(
            session.state(),
            SessionState::Failed(SearchError::Provider { status: 401, .. })
        );
    }

    #[tokio::test]
    async fn store_rejection_maps_to_failed_state() {
        let (session, store, _log) = session_with(Ok(vec![0.1]));
        store.push_search(
            Duration::ZERO,
            Err(SearchError::Query("dimension mismatch".to_string())),
        );

        session.submit_query("alpha".into()).await.unwrap();

        assert_matches!(session.state(), SessionState::Failed(SearchError::Query(_)));
        assert!(session.results().is_empty());
    }

    #[tokio::test]
    async fn result_order_is_taken_from_the_store() {
        let (session, store, _log) = session_with(Ok(vec![0.1]));
        // Deliberately not sorted by score: the store owns ordering.
        store.push_search(
            Duration::ZERO,
            Ok(vec![hit(2, 0.20, "low"), hit(1, 0.90, "high")]),
        );

        session.submit_query("alpha".into()).await.unwrap();

        let results = session.results();
        assert_eq!(results[0].id, PointKey::Num(2));
        assert_eq!(results[1].id, PointKey::Num(1));
    }

    #[tokio::test(start_paused = true)]
    async fn stale_response_never_overwrites_a_newer_one() {
        let (session, store, _log) = session_with(Ok(vec![0.1]));
        // First query resolves long after the second one.
        store.push_search(Duration::from_millis(100), Ok(vec![hit(1, 0.9, "stale")]));
        store.push_search(Duration::from_millis(10), Ok(vec![hit(2, 0.8, "fresh")]));

        let (first, second) = tokio::join!(
            session.submit_query(QueryInput::Vector(vec![0.1])),
            session.submit_query(QueryInput::Vector(vec![0.2])),
        );
        first.unwrap();
        second.unwrap();

        let results = session.results();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, PointKey::Num(2));
        assert_eq!(results[0].text(), Some("fresh"));
    }

    #[tokio::test]
    async fn confirmed_deprecation_commits_and_prunes() {
        let (session, store, _log) = session_with(Ok(vec![0.1]));
        store.push_search(
            Duration::ZERO,
            Ok(vec![hit(1, 0.95, "first"), hit(2, 0.80, "second")]),
        );
        session.submit_query("alpha".into()).await.unwrap();

        let id = PointKey::Num(2);
        assert!(session.request_deprecation(&id));
        assert!(session.is_pending(&id));
        assert_eq!(session.confirm_deprecation(&id).await, Ok(true));

        assert_eq!(store.marked(), vec![PointKey::Num(2)]);
        let results = session.results();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, PointKey::Num(1));
        assert!(!session.is_pending(&id));
    }

    #[tokio::test]
    async fn confirm_without_request_never_reaches_the_store() {
        let (session, store, _log) = session_with(Ok(vec![0.1]));
        store.push_search(Duration::ZERO, Ok(vec![hit(1, 0.9, "first")]));
        session.submit_query("alpha".into()).await.unwrap();

        assert_eq!(
            session.confirm_deprecation(&PointKey::Num(1)).await,
            Ok(false)
        );
        assert!(store.marked().is_empty());
        assert_eq!(session.results().len(), 1);
    }

    #[tokio::test]
    async fn cancel_returns_the_item_to_active() {
        let (session, store, _log) = session_with(Ok(vec![0.1]));
        store.push_search(Duration::ZERO, Ok(vec![hit(1, 0.9, "first")]));
        session.submit_query("alpha".into()).await.unwrap();

        let id = PointKey::Num(1);
        assert!(session.request_deprecation(&id));
        assert!(session.cancel_deprecation(&id));
        assert!(!session.is_pending(&id));

        // Confirm after cancel is a no-op.
        assert_eq!(session.confirm_deprecation(&id).await, Ok(false));
        assert!(store.marked().is_empty());
    }

    #[tokio::test]
    async fn request_on_absent_id_is_a_no_op() {
        let (session, _store, _log) = session_with(Ok(vec![0.1]));
        assert!(!session.request_deprecation(&PointKey::Num(99)));
        assert!(!session.is_pending(&PointKey::Num(99)));
    }

    #[tokio::test]
    async fn failed_commit_keeps_the_item_visible() {
        let (session, store, _log) = session_with(Ok(vec![0.1]));
        store.push_search(Duration::ZERO, Ok(vec![hit(1, 0.9, "first")]));
        store.push_mark(Err(SearchError::Update("write refused".to_string())));
        session.submit_query("alpha".into()).await.unwrap();

        let id = PointKey::Num(1);
        assert!(session.request_deprecation(&id));
        let err = session.confirm_deprecation(&id).await.unwrap_err();
        assert_matches!(err, SearchError::Update(_));

        // Local state only changes after confirmed success.
        assert_eq!(session.results().len(), 1);
        assert_matches!(session.state(), SessionState::Ready(_));
    }

    #[tokio::test]
    async fn new_search_clears_pending_confirmations() {
        let (session, store, _log) = session_with(Ok(vec![0.1]));
        store.push_search(Duration::ZERO, Ok(vec![hit(1, 0.9, "first")]));
        store.push_search(Duration::ZERO, Ok(vec![hit(1, 0.9, "first")]));
        session.submit_query("alpha".into()).await.unwrap();

        let id = PointKey::Num(1);
        assert!(session.request_deprecation(&id));
        session.submit_query("beta".into()).await.unwrap();

        assert!(!session.is_pending(&id));
        assert_eq!(session.confirm_deprecation(&id).await, Ok(false));
        assert!(store.marked().is_empty());
    }

    #[tokio::test]
    async fn listener_sees_searching_then_ready() {
        let log: CallLog = Arc::new(Mutex::new(Vec::new()));
        let embedder = Arc::new(MockEmbedder {
            log: log.clone(),
            result: Ok(vec![0.1]),
        });
        let store = Arc::new(MockStore::new(log));
        store.push_search(Duration::ZERO, Ok(vec![hit(1, 0.9, "first")]));

        let mut session = SearchSession::new(embedder, store, 10);
        let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let seen_by_listener = seen.clone();
        session.set_listener(move |state| {
            let label = match state {
                SessionState::Idle => "idle",
                SessionState::Searching => "searching",
                SessionState::Ready(_) => "ready",
                SessionState::Failed(_) => "failed",
            };
            seen_by_listener.lock().unwrap().push(label.to_string());
        });

        session.submit_query("alpha".into()).await.unwrap();
        assert_eq!(*seen.lock().unwrap(), vec!["searching", "ready"]);
    }
}
