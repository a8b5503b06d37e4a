//! Application shell: one session, one history, one displayed view.
//!
//! # Responsibility
//! - Turn session events and navigation requests into rendered views.
//! - Own the scope of the displayed view and dispose it before the next
//!   view binds.
//! - Keep the shell chrome ([`Surface`]) in step with state changes.
//!
//! # Invariants
//! - Every navigation goes through [`App::dispatch`]; requests arriving while
//!   one is in flight are queued and drained in arrival order.
//! - No `RefCell` borrow is held across a store call or a render.
//! - After every completed navigation, back visibility equals
//!   `history.depth() > 1`.

mod actions;
mod views;

use crate::config::AppConfig;
use crate::feed::NotificationFeed;
use crate::identity::IdentityProvider;
use crate::model::feedback::Comment;
use crate::model::notification::NotificationFilter;
use crate::model::session::{resolve_avatar_url, Session};
use crate::nav::{NavOutcome, NavRequest, NavigationError, NavigationGate, ViewHistory, ViewId};
use crate::render::{pages, Surface, ViewScope};
use crate::service::insight::{InsightFilter, StagedChanges};
use crate::session::{SessionEvent, SessionGuard, NOT_PROVISIONED_MESSAGE};
use crate::store::DataStore;
use crate::tenant::{Backend, BackendSummary, DEFAULT_BACKEND};
use log::{debug, info, warn};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};

/// Placeholder shown when the profile or a view's data cannot be loaded.
pub const LOAD_FAILED_MESSAGE: &str = "⚠️ Failed to load data. Please refresh the page.";

/// Mutable state of one signed-in session; reset on sign-out.
#[derive(Default)]
struct AppState {
    session: Option<Session>,
    history: ViewHistory,
    /// Fragment of the displayed view.
    fragment: Option<String>,
    /// Fragment requested before the session was ready.
    pending_fragment: Option<String>,
    scope: Option<ViewScope>,
    home_toggle_open: bool,
    notification_filter: NotificationFilter,
    insight_filter: InsightFilter,
    staged: StagedChanges,
    /// Comments shown before their write completes, keyed by post id.
    pending_comments: BTreeMap<String, Vec<Comment>>,
}

pub struct App {
    config: AppConfig,
    store: Rc<dyn DataStore>,
    identity: Rc<dyn IdentityProvider>,
    backend: BackendSummary,
    guard: SessionGuard,
    feed: NotificationFeed,
    gate: NavigationGate,
    state: RefCell<AppState>,
    surface: RefCell<Surface>,
    weak_self: Weak<App>,
}

impl App {
    /// App over the default backend built from `store` and `identity`.
    pub fn new(
        config: AppConfig,
        store: Rc<dyn DataStore>,
        identity: Rc<dyn IdentityProvider>,
    ) -> Rc<Self> {
        Self::with_backend(config, &Backend::new(DEFAULT_BACKEND, store, identity))
    }

    /// App over the backend resolved at sign-in.
    pub fn with_backend(config: AppConfig, backend: &Backend) -> Rc<Self> {
        let store = backend.store();
        let identity = backend.identity();
        let app = Rc::new_cyclic(|weak_self| Self {
            guard: SessionGuard::new(
                Rc::clone(&identity),
                Rc::clone(&store),
                config.entry_page.clone(),
                config.default_avatar_url.clone(),
            ),
            feed: NotificationFeed::new(Rc::clone(&store)),
            gate: NavigationGate::new(),
            state: RefCell::new(AppState::default()),
            surface: RefCell::new(Surface::default()),
            backend: backend.summary(),
            weak_self: weak_self.clone(),
            config,
            store,
            identity,
        });

        let weak = Rc::downgrade(&app);
        app.feed.set_on_change(move |unread| {
            if let Some(app) = weak.upgrade() {
                app.on_feed_change(unread);
            }
        });
        app
    }

    /// Starts the session guard. `fragment` is the route the page was
    /// loaded with; it opens once the session is ready.
    pub fn start(&self, fragment: &str) {
        let fragment = fragment.trim();
        self.state.borrow_mut().pending_fragment =
            (!fragment.is_empty()).then(|| fragment.to_string());
        let weak = self.weak_self.clone();
        self.guard.start(Rc::new(move |event| {
            if let Some(app) = weak.upgrade() {
                app.handle_session_event(event);
            }
        }));
    }

    /// Detaches every subscription the app holds.
    pub fn shutdown(&self) {
        self.guard.stop();
        self.feed.stop();
        self.gate.clear_pending();
        self.release_scope();
    }

    /// Disposes the displayed view's scope without binding a new one.
    fn release_scope(&self) {
        let scope = self.state.borrow_mut().scope.take();
        if let Some(scope) = scope {
            scope.dispose();
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn store(&self) -> Rc<dyn DataStore> {
        Rc::clone(&self.store)
    }

    pub fn feed(&self) -> &NotificationFeed {
        &self.feed
    }

    pub fn surface(&self) -> Surface {
        self.surface.borrow().clone()
    }

    pub fn session(&self) -> Option<Session> {
        self.state.borrow().session.clone()
    }

    pub fn history(&self) -> Vec<ViewId> {
        self.state.borrow().history.entries().to_vec()
    }

    pub fn current_view(&self) -> Option<ViewId> {
        self.state.borrow().history.current().cloned()
    }

    /// Live subscriptions held by the displayed view.
    pub fn live_subscriptions(&self) -> usize {
        self.state
            .borrow()
            .scope
            .as_ref()
            .map_or(0, ViewScope::live_count)
    }

    pub fn navigate_to(&self, view: ViewId) -> Result<NavOutcome, NavigationError> {
        self.dispatch(NavRequest::Open(view))
    }

    pub fn go_back(&self) -> Result<NavOutcome, NavigationError> {
        self.dispatch(NavRequest::Back)
    }

    /// Host report of a `hashchange`.
    pub fn on_fragment_change(&self, fragment: &str) -> Result<NavOutcome, NavigationError> {
        self.dispatch(NavRequest::Fragment(fragment.to_string()))
    }

    /// Single navigation entry point.
    ///
    /// A request made while another one runs (from a render callback, for
    /// example) is queued and reported as [`NavOutcome::Queued`].
    pub fn dispatch(&self, request: NavRequest) -> Result<NavOutcome, NavigationError> {
        let Some(_gate) = self.gate.enter() else {
            debug!("event=navigate module=app status=queued");
            self.gate.enqueue(request);
            return Ok(NavOutcome::Queued);
        };
        let outcome = self.perform(request);
        while let Some(next) = self.gate.next_pending() {
            if let Err(err) = self.perform(next) {
                warn!(
                    "event=navigate module=app status=error source=queue reason={}",
                    nav_error_kind(&err)
                );
            }
        }
        outcome
    }

    fn perform(&self, request: NavRequest) -> Result<NavOutcome, NavigationError> {
        match request {
            NavRequest::Open(view) => self.open(view),
            NavRequest::Fragment(fragment) => {
                let view = ViewId::route(&fragment);
                let (ready, echo) = {
                    let state = self.state.borrow();
                    (
                        state.session.is_some(),
                        state.fragment.as_deref() == Some(view.fragment().as_str()),
                    )
                };
                if echo {
                    return Ok(NavOutcome::Ignored);
                }
                if !ready {
                    self.state.borrow_mut().pending_fragment = Some(fragment);
                    return Ok(NavOutcome::Queued);
                }
                info!(
                    "event=route_dispatch module=app status=ok view={}",
                    view.key()
                );
                self.open(view)
            }
            NavRequest::Back => {
                let target = {
                    let mut state = self.state.borrow_mut();
                    let role = state
                        .session
                        .as_ref()
                        .map(|session| session.role)
                        .ok_or(NavigationError::NotReady)?;
                    state
                        .history
                        .pop_for_back(self.config.back_policy)
                        .map(|view| if view.permits(role) { view } else { ViewId::Dashboard })
                };
                let Some(target) = target else {
                    let visible = self.state.borrow().history.back_visible();
                    self.surface.borrow_mut().back_visible = visible;
                    return Ok(NavOutcome::Ignored);
                };
                info!(
                    "event=go_back module=app status=ok view={}",
                    target.key()
                );
                self.open(target)
            }
        }
    }

    fn open(&self, view: ViewId) -> Result<NavOutcome, NavigationError> {
        let session = self.session().ok_or(NavigationError::NotReady)?;
        if !view.permits(session.role) {
            warn!(
                "event=navigate_forbidden module=app status=rejected view={} role={}",
                view.key(),
                session.role
            );
            return Err(NavigationError::Forbidden {
                view: view.key().to_string(),
                role: session.role,
            });
        }

        let depth = {
            let mut state = self.state.borrow_mut();
            state.history.push(view.clone());
            state.fragment = Some(view.fragment());
            state.home_toggle_open = false;
            state.history.depth()
        };
        {
            let mut surface = self.surface.borrow_mut();
            surface.back_visible = depth > 1;
            surface.sidebar_visible = false;
            surface.fragment = view.fragment();
            surface.placeholder = None;
        }
        self.rebind(&view, &session);
        info!(
            "event=navigate module=app status=ok view={} depth={depth}",
            view.key()
        );
        Ok(NavOutcome::Rendered(view))
    }

    /// Disposes the displayed view's scope and binds `view` into a new one.
    fn rebind(&self, view: &ViewId, session: &Session) {
        let previous = self.state.borrow_mut().scope.take();
        if let Some(scope) = previous {
            scope.dispose();
        }
        let mut scope = ViewScope::new(view.clone());
        if let Err(err) = self.bind_view(view, session, &mut scope) {
            warn!(
                "event=view_bind module=app status=error view={} error_kind={}",
                view.key(),
                err.kind()
            );
            self.paint(pages::placeholder(LOAD_FAILED_MESSAGE));
        }
        self.state.borrow_mut().scope = Some(scope);
    }

    /// Re-binds the displayed view in place, re-reading its data. History
    /// is untouched.
    pub fn reload_view(&self) {
        let (Some(session), Some(view)) = (self.session(), self.current_view()) else {
            return;
        };
        self.rebind(&view, &session);
    }

    /// Re-renders the displayed view from its cached snapshots.
    pub fn refresh_view(&self) {
        let refresh = self
            .state
            .borrow()
            .scope
            .as_ref()
            .and_then(ViewScope::refresher);
        if let Some(refresh) = refresh {
            refresh();
        }
    }

    fn handle_session_event(&self, event: SessionEvent) {
        match event {
            SessionEvent::Ready(session) => self.on_ready(session),
            SessionEvent::Updated(session) => self.on_updated(session),
            SessionEvent::NotProvisioned => self.block(NOT_PROVISIONED_MESSAGE),
            SessionEvent::Failed(_) => {
                warn!("event=session_failed module=app status=error");
                self.block(LOAD_FAILED_MESSAGE);
            }
            SessionEvent::SignedOut { redirect } => self.on_signed_out(redirect),
        }
    }

    fn on_ready(&self, session: Session) {
        self.apply_chrome(&session);
        let role = session.role;
        let user_id = session.user_id.clone();
        let requested = {
            let mut state = self.state.borrow_mut();
            state.session = Some(session);
            state.pending_fragment.take()
        };
        if self.feed.listen(&user_id).is_err() {
            warn!("event=notifications_listen module=app status=error");
        }

        let view = requested
            .map(|fragment| ViewId::route(&fragment))
            .filter(|view| view.permits(role))
            .unwrap_or(ViewId::Home);
        info!(
            "event=route_dispatch module=app status=ok view={} source=session",
            view.key()
        );
        if let Err(err) = self.dispatch(NavRequest::Open(view)) {
            warn!(
                "event=navigate module=app status=error reason={}",
                nav_error_kind(&err)
            );
        }
    }

    fn on_updated(&self, session: Session) {
        self.apply_chrome(&session);
        let staff = session.role.is_staff();
        let current = {
            let mut state = self.state.borrow_mut();
            let current = state.history.current().cloned();
            state.session = Some(session.clone());
            current
        };
        if !staff {
            self.surface.borrow_mut().sidebar_visible = false;
        }
        match current {
            Some(view) if !view.permits(session.role) => {
                if let Err(err) = self.dispatch(NavRequest::Open(ViewId::Dashboard)) {
                    warn!(
                        "event=navigate module=app status=error reason={}",
                        nav_error_kind(&err)
                    );
                }
            }
            _ => self.refresh_view(),
        }
    }

    fn on_signed_out(&self, redirect: String) {
        let scope = {
            let mut state = self.state.borrow_mut();
            let scope = state.scope.take();
            *state = AppState::default();
            scope
        };
        if let Some(scope) = scope {
            scope.dispose();
        }
        self.feed.stop();
        self.gate.clear_pending();
        let mut surface = self.surface.borrow_mut();
        surface.clear_for_sign_out();
        surface.redirect = Some(redirect);
    }

    /// Replaces the view with a blocking message; navigation stays closed
    /// until the next `Ready`.
    fn block(&self, message: &str) {
        let scope = {
            let mut state = self.state.borrow_mut();
            state.session = None;
            state.history.clear();
            state.fragment = None;
            state.scope.take()
        };
        if let Some(scope) = scope {
            scope.dispose();
        }
        self.feed.stop();
        let mut surface = self.surface.borrow_mut();
        surface.placeholder = Some(message.to_string());
        surface.main_content = pages::placeholder(message);
        surface.back_visible = false;
        surface.sidebar_visible = false;
        surface.badge = None;
    }

    fn apply_chrome(&self, session: &Session) {
        let mut surface = self.surface.borrow_mut();
        surface.greeting = session.greeting();
        surface.avatar_url = resolve_avatar_url(Some(&session.avatar_url));
        surface.placeholder = None;
    }

    fn on_feed_change(&self, unread: usize) {
        self.surface.borrow_mut().set_badge(unread);
        if self.current_view() == Some(ViewId::Notifications) {
            self.refresh_view();
        }
    }

    pub(crate) fn paint(&self, html: String) {
        self.surface.borrow_mut().main_content = html;
    }

    pub(crate) fn alert(&self, message: impl Into<String>) {
        self.surface.borrow_mut().alert = Some(message.into());
    }
}

fn nav_error_kind(err: &NavigationError) -> &'static str {
    match err {
        NavigationError::NotReady => "not_ready",
        NavigationError::Forbidden { .. } => "forbidden",
    }
}

#[cfg(test)]
mod tests {
    use super::App;
    use crate::config::AppConfig;
    use crate::identity::{IdentityProvider, LocalIdentity, SignUpRequest};
    use crate::nav::{NavOutcome, ViewId};
    use crate::store::{DataStore, SqliteDataStore};
    use serde_json::json;
    use std::rc::Rc;

    fn signed_in_app(role: &str) -> Rc<App> {
        let store = Rc::new(SqliteDataStore::open_in_memory().expect("store"));
        let identity = Rc::new(LocalIdentity::open_in_memory(6).expect("identity"));
        let user = identity
            .sign_up(&SignUpRequest {
                full_name: "Ana Cruz".to_string(),
                email: "ana@example.test".to_string(),
                secret: "secret-1".to_string(),
                ..SignUpRequest::default()
            })
            .expect("sign up");
        store
            .write(
                &format!("students/{}", user.uid),
                json!({"fullName": "Ana Cruz", "role": role}),
            )
            .expect("profile");
        let app = App::new(AppConfig::default(), store, identity);
        app.start("");
        app
    }

    #[test]
    fn ready_session_opens_home_with_chrome() {
        let app = signed_in_app("student");
        assert_eq!(app.current_view(), Some(ViewId::Home));
        let surface = app.surface();
        assert_eq!(surface.greeting, "Welcome, 📘 Ana Cruz!");
        assert_eq!(surface.fragment, "#/home");
        assert!(!surface.back_visible);
    }

    #[test]
    fn fragment_echo_is_ignored() {
        let app = signed_in_app("student");
        app.navigate_to(ViewId::Lessons).expect("lessons");
        assert_eq!(
            app.on_fragment_change("#/lessons").expect("echo"),
            NavOutcome::Ignored
        );
        assert_eq!(app.history(), vec![ViewId::Lessons]);
        assert!(!app.surface().back_visible);
    }

    #[test]
    fn replacing_a_view_releases_its_subscriptions() {
        let app = signed_in_app("student");
        app.navigate_to(ViewId::Dashboard).expect("dashboard");
        assert_eq!(app.live_subscriptions(), 3);
        app.navigate_to(ViewId::Home).expect("home");
        assert_eq!(app.live_subscriptions(), 0);
    }
}
