//! Per-view bindings: which paths a view reads, in which mode, and how the
//! snapshots become the main content.

use super::App;
use crate::model::feedback::{decode_posts, FeedbackPost};
use crate::model::lesson::{decode_lessons, LessonRecord};
use crate::model::now_millis;
use crate::model::session::Session;
use crate::model::settings::{decode_services, AdminSettings, ContactInfo};
use crate::model::student::{completed_set, decode_students, progress_map, StudentRecord};
use crate::nav::{NavRequest, ViewId};
use crate::render::{bind_live, bind_once, bind_static, pages, RenderFn, ViewScope};
use crate::service::analytics::build_report;
use crate::service::lesson::LessonService;
use crate::session::NOT_PROVISIONED_MESSAGE;
use crate::store::{path, StoreResult};
use crate::tenant::load_backend_config;
use log::{info, warn};
use serde_json::Value;
use std::rc::Rc;

fn slot(values: &[Option<Value>], index: usize) -> Option<&Value> {
    values.get(index).and_then(Option::as_ref)
}

fn record(values: &[Option<Value>], index: usize) -> Option<&Value> {
    slot(values, index).filter(|value| value.is_object())
}

impl App {
    pub(super) fn bind_view(
        &self,
        view: &ViewId,
        session: &Session,
        scope: &mut ViewScope,
    ) -> StoreResult<()> {
        let store = &*self.store;
        let uid = session.user_id.as_str();
        match view {
            ViewId::Home => bind_static(scope, self.static_painter(|_| Some(pages::home()))),
            ViewId::Dashboard => {
                let quote = pages::pick_quote();
                let paths = [
                    path::student(uid),
                    path::lessons().to_string(),
                    path::progress(uid),
                ];
                bind_live(
                    store,
                    scope,
                    &paths,
                    self.painter(move |app, values| {
                        let session = app.session()?;
                        let lessons = decode_lessons(slot(values, 1));
                        let progress = progress_map(slot(values, 2));
                        Some(pages::dashboard(&session, quote, &lessons, &progress))
                    }),
                )?;
            }
            ViewId::Lessons => bind_live(
                store,
                scope,
                &[path::lessons().to_string()],
                self.painter(|_, values| Some(pages::lesson_list(&decode_lessons(slot(values, 0))))),
            )?,
            ViewId::LessonDetail(id) => {
                let id = id.clone();
                bind_live(
                    store,
                    scope,
                    &[path::lesson(&id), path::progress(uid)],
                    self.painter(move |app, values| {
                        let session = app.session()?;
                        let Some(lesson) = record(values, 0) else {
                            app.leave_missing_lesson();
                            return None;
                        };
                        let lesson = LessonRecord::from_value(&id, lesson);
                        let progress = progress_map(slot(values, 1));
                        Some(pages::lesson_detail(&lesson, &progress, session.role.is_staff()))
                    }),
                )?;
            }
            ViewId::Board => {
                if session.role.is_staff() {
                    let lessons = decode_lessons(store.read(path::lessons())?.as_ref());
                    let patched = LessonService::new(store).normalize_missing_types(&lessons)?;
                    if patched > 0 {
                        info!("event=lesson_normalize module=app status=ok patched={patched}");
                    }
                }
                bind_live(
                    store,
                    scope,
                    &[path::lessons().to_string(), path::completed_lessons(uid)],
                    self.painter(|app, values| {
                        let session = app.session()?;
                        let lessons = decode_lessons(slot(values, 0));
                        let completed = completed_set(slot(values, 1));
                        Some(pages::board(&lessons, &completed, session.role.is_staff()))
                    }),
                )?;
            }
            ViewId::LessonNew => {
                let max_bytes = self.config.max_attachment_bytes;
                bind_static(
                    scope,
                    self.static_painter(move |_| Some(pages::lesson_form(None, max_bytes))),
                );
            }
            ViewId::LessonEdit(id) => {
                let id = id.clone();
                let max_bytes = self.config.max_attachment_bytes;
                bind_once(
                    store,
                    scope,
                    &[path::lesson(&id)],
                    self.painter(move |app, values| {
                        let Some(lesson) = record(values, 0) else {
                            app.leave_missing_lesson();
                            return None;
                        };
                        let lesson = LessonRecord::from_value(&id, lesson);
                        Some(pages::lesson_form(Some(&lesson), max_bytes))
                    }),
                )?;
            }
            ViewId::Services => bind_live(
                store,
                scope,
                &[
                    path::services().to_string(),
                    path::contact_info().to_string(),
                ],
                self.painter(|app, values| {
                    let session = app.session()?;
                    let tiles = decode_services(slot(values, 0));
                    let contact = ContactInfo::from_value(slot(values, 1));
                    Some(pages::services(&tiles, &contact, session.role.is_staff()))
                }),
            )?,
            ViewId::Notifications => bind_static(
                scope,
                self.static_painter(|app| {
                    let filter = app.state.borrow().notification_filter;
                    let records = app.feed.render(filter);
                    Some(pages::notifications(
                        &records,
                        filter,
                        app.feed.unread_count(),
                        now_millis(),
                    ))
                }),
            ),
            ViewId::Profile => bind_live(
                store,
                scope,
                &[path::student(uid)],
                self.painter(|app, values| {
                    let session = app.session()?;
                    let Some(profile) = record(values, 0) else {
                        return Some(pages::placeholder(NOT_PROVISIONED_MESSAGE));
                    };
                    let student = StudentRecord::from_value(&session.user_id, profile);
                    let backend = session.role.is_staff().then(|| {
                        let published = matches!(
                            load_backend_config(&*app.store, &session.user_id),
                            Ok(Some(_))
                        );
                        (&app.backend, published)
                    });
                    Some(pages::profile(&session, &student, backend))
                }),
            )?,
            ViewId::Insight => bind_once(
                store,
                scope,
                &[path::students().to_string()],
                self.painter(|app, values| {
                    let (filter, staged) = {
                        let state = app.state.borrow();
                        (state.insight_filter, state.staged.clone())
                    };
                    let students = decode_students(slot(values, 0));
                    Some(pages::insight(&students, filter, &staged))
                }),
            )?,
            ViewId::Analytics => bind_once(
                store,
                scope,
                &[
                    path::students().to_string(),
                    path::admin_settings().to_string(),
                ],
                self.painter(|_, values| {
                    let students = decode_students(slot(values, 0));
                    let settings = AdminSettings::from_value(slot(values, 1));
                    Some(pages::analytics(&build_report(&students, &settings)))
                }),
            )?,
            ViewId::Admin => bind_once(
                store,
                scope,
                &[path::admin_settings().to_string()],
                self.painter(|_, values| {
                    Some(pages::admin(&AdminSettings::from_value(slot(values, 0))))
                }),
            )?,
            ViewId::Feedback => bind_live(
                store,
                scope,
                &[path::feedback_posts().to_string()],
                self.painter(|app, values| {
                    let session = app.session()?;
                    let mut posts = decode_posts(slot(values, 0));
                    for post in &mut posts {
                        app.merge_pending_comments(post);
                    }
                    Some(pages::feedback_feed(&posts, &session, now_millis()))
                }),
            )?,
            ViewId::FeedbackPost(pid) => {
                let pid = pid.clone();
                bind_live(
                    store,
                    scope,
                    &[path::feedback_post(&pid)],
                    self.painter(move |app, values| {
                        let session = app.session()?;
                        let post = record(values, 0).map(|post| {
                            let mut post = FeedbackPost::from_value(&pid, post);
                            app.merge_pending_comments(&mut post);
                            post
                        });
                        Some(pages::feedback_post(post.as_ref(), &session, now_millis()))
                    }),
                )?;
            }
        }
        Ok(())
    }

    /// Render callback for store-bound views. `None` from `render` leaves
    /// the content untouched.
    fn painter(
        &self,
        render: impl Fn(&App, &[Option<Value>]) -> Option<String> + 'static,
    ) -> RenderFn {
        let app = self.weak_self.clone();
        Rc::new(move |values| {
            let Some(app) = app.upgrade() else {
                return;
            };
            if let Some(html) = render(&app, values) {
                app.paint(html);
            }
        })
    }

    fn static_painter(&self, render: impl Fn(&App) -> Option<String> + 'static) -> Rc<dyn Fn()> {
        let app = self.weak_self.clone();
        Rc::new(move || {
            let Some(app) = app.upgrade() else {
                return;
            };
            if let Some(html) = render(&app) {
                app.paint(html);
            }
        })
    }

    fn leave_missing_lesson(&self) {
        warn!("event=lesson_missing module=app status=redirect");
        self.alert("Lesson was not found.");
        if let Err(err) = self.dispatch(NavRequest::Open(ViewId::Lessons)) {
            warn!(
                "event=navigate module=app status=error reason={}",
                super::nav_error_kind(&err)
            );
        }
    }

    /// Appends locally pending comments the store does not hold yet.
    fn merge_pending_comments(&self, post: &mut FeedbackPost) {
        let state = self.state.borrow();
        let Some(pending) = state.pending_comments.get(&post.id) else {
            return;
        };
        for comment in pending {
            if !post.comments.iter().any(|existing| existing.id == comment.id) {
                post.comments.push(comment.clone());
            }
        }
    }
}
