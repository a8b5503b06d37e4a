//! User actions routed through the shell.
//!
//! Every action runs against the active session, reports failures through
//! the surface alert and leaves re-rendering to the bound view, except for
//! one-shot views, which are reloaded after a successful write.

use super::App;
use crate::identity::IdentityProvider;
use crate::model::feedback::can_delete;
use crate::model::lesson::LessonType;
use crate::model::notification::NotificationFilter;
use crate::model::session::Session;
use crate::model::settings::{AdminSettings, ContactField};
use crate::nav::{NavOutcome, NavRequest, NavigationError, ViewId};
use crate::service::admin::{self, ExportKind};
use crate::service::catalog::CatalogService;
use crate::service::feedback::FeedbackService;
use crate::service::insight::{self, InsightFilter};
use crate::service::lesson::{require_staff, LessonDraft, LessonService};
use crate::service::profile::{ProfileService, ProfileUpdate};
use crate::service::{ActionError, ActionResult, Attachment};
use crate::store::DataStore;
use crate::tenant::{self, BackendConfig};
use log::{debug, info, warn};

impl App {
    fn acting_session(&self) -> ActionResult<Session> {
        self.session().ok_or(ActionError::NotSignedIn)
    }

    fn settle<T>(&self, action: &'static str, result: ActionResult<T>) -> ActionResult<T> {
        match &result {
            Ok(_) => debug!("event=action module=app status=ok action={action}"),
            Err(err) => {
                warn!(
                    "event=action module=app status=error action={action} kind={}",
                    err.kind()
                );
                self.alert(err.to_string());
            }
        }
        result
    }

    /// Navigation that follows a successful action; failures only log.
    fn follow(&self, view: ViewId) {
        if let Err(err) = self.dispatch(NavRequest::Open(view)) {
            warn!(
                "event=navigate module=app status=error reason={}",
                super::nav_error_kind(&err)
            );
        }
    }

    /// Bottom home button: the first press opens the dashboard (and the
    /// sidebar for staff), the second closes the sidebar again.
    pub fn toggle_home(&self) -> Result<NavOutcome, NavigationError> {
        if self.state.borrow().home_toggle_open {
            self.state.borrow_mut().home_toggle_open = false;
            self.surface.borrow_mut().sidebar_visible = false;
            return Ok(NavOutcome::Ignored);
        }
        let outcome = self.dispatch(NavRequest::Open(ViewId::Dashboard))?;
        let staff = self
            .session()
            .is_some_and(|session| session.role.is_staff());
        self.state.borrow_mut().home_toggle_open = true;
        if staff {
            self.surface.borrow_mut().sidebar_visible = true;
        }
        Ok(outcome)
    }

    /// Opens or closes the staff sidebar; returns whether it is now shown.
    pub fn toggle_sidebar(&self) -> bool {
        let staff = self
            .session()
            .is_some_and(|session| session.role.is_staff());
        let mut surface = self.surface.borrow_mut();
        surface.sidebar_visible = staff && !surface.sidebar_visible;
        surface.sidebar_visible
    }

    pub fn dismiss_alert(&self) {
        self.surface.borrow_mut().alert = None;
    }

    pub fn set_notification_filter(&self, filter: NotificationFilter) {
        self.state.borrow_mut().notification_filter = filter;
        if self.current_view() == Some(ViewId::Notifications) {
            self.refresh_view();
        }
    }

    pub fn mark_all_notifications_read(&self) -> ActionResult<usize> {
        let result = self.acting_session().and_then(|session| {
            Ok(self.feed.mark_all_read(&session.user_id)?)
        });
        self.settle("mark_all_read", result)
    }

    /// Marks a notification read and follows its link, if any.
    pub fn open_notification(&self, id: &str) -> ActionResult<NavOutcome> {
        let result = self
            .acting_session()
            .and_then(|session| Ok(self.feed.activate(&session.user_id, id)?));
        let Some(link) = self.settle("open_notification", result)? else {
            return Ok(NavOutcome::Ignored);
        };
        Ok(self
            .dispatch(NavRequest::Fragment(link))
            .unwrap_or_else(|err| {
                self.alert(err.to_string());
                NavOutcome::Ignored
            }))
    }

    pub fn complete_lesson(&self, id: &str) -> ActionResult<()> {
        let result = self.acting_session().and_then(|session| {
            let lessons = LessonService::new(&*self.store);
            let lesson = lessons
                .load(id)?
                .ok_or_else(|| ActionError::NotFound("Lesson".to_string()))?;
            lessons.mark_complete(&session.user_id, &lesson)
        });
        let result = self.settle("complete_lesson", result);
        if result.is_ok() {
            self.alert("✅ Lesson marked as complete.");
        }
        result
    }

    /// Creates a lesson and shows it on the board.
    pub fn create_lesson(&self, draft: &LessonDraft) -> ActionResult<String> {
        let result = self.acting_session().and_then(|session| {
            LessonService::new(&*self.store).create(
                &session,
                draft,
                self.config.max_attachment_bytes,
            )
        });
        let id = self.settle("create_lesson", result)?;
        self.follow(ViewId::Board);
        Ok(id)
    }

    pub fn update_lesson(&self, id: &str, draft: &LessonDraft) -> ActionResult<()> {
        let result = self.acting_session().and_then(|session| {
            LessonService::new(&*self.store).update(
                &session,
                id,
                draft,
                self.config.max_attachment_bytes,
            )
        });
        self.settle("update_lesson", result)?;
        self.follow(ViewId::LessonDetail(id.to_string()));
        Ok(())
    }

    /// Deleting the displayed lesson moves to the board once the write
    /// succeeds. The lesson's view is detached during the write so it never
    /// renders the missing record, and is re-bound if the write fails.
    pub fn delete_lesson(&self, id: &str) -> ActionResult<()> {
        let result = self.acting_session().and_then(|session| {
            require_staff(&session, "delete lessons")?;
            let viewing = matches!(
                self.current_view(),
                Some(ViewId::LessonDetail(ref shown)) | Some(ViewId::LessonEdit(ref shown)) if shown == id
            );
            if viewing {
                self.release_scope();
            }
            let deleted = LessonService::new(&*self.store).delete(&session, id);
            match (&deleted, viewing) {
                (Ok(()), true) => self.follow(ViewId::Board),
                (Err(_), true) => self.reload_view(),
                _ => {}
            }
            deleted
        });
        self.settle("delete_lesson", result)
    }

    pub fn move_lesson(&self, id: &str, kind: LessonType) -> ActionResult<()> {
        let result = self
            .acting_session()
            .and_then(|session| LessonService::new(&*self.store).move_to(&session, id, kind));
        self.settle("move_lesson", result)
    }

    fn profiles(&self) -> ProfileService<&dyn DataStore, &dyn IdentityProvider> {
        ProfileService::new(&*self.store, &*self.identity)
    }

    pub fn save_profile(&self, update: &ProfileUpdate) -> ActionResult<()> {
        let result = self
            .acting_session()
            .and_then(|session| self.profiles().save(&session.user_id, update));
        let result = self.settle("save_profile", result);
        if result.is_ok() {
            self.alert("✅ Profile updated.");
        }
        result
    }

    pub fn upload_photo(&self, photo: &Attachment) -> ActionResult<()> {
        let result = self.acting_session().and_then(|session| {
            self.profiles().upload_photo(
                &session.user_id,
                photo,
                self.config.max_attachment_bytes,
            )
        });
        self.settle("upload_photo", result)
    }

    pub fn change_password(&self, new_secret: &str) -> ActionResult<()> {
        let result = self.acting_session().and_then(|_| {
            self.profiles()
                .change_password(new_secret, self.config.min_password_len)
        });
        let result = self.settle("change_password", result);
        if result.is_ok() {
            self.alert("✅ Password changed.");
        }
        result
    }

    /// Deletes the profile record and the account; the host is sent to the
    /// entry page.
    pub fn delete_account(&self, secret: &str) -> ActionResult<()> {
        let result = self
            .acting_session()
            .and_then(|session| self.profiles().delete_account(&session.user_id, secret));
        self.settle("delete_account", result)?;
        self.surface.borrow_mut().redirect = Some(self.config.entry_page.clone());
        Ok(())
    }

    /// Signs out; the host is sent to the entry page with the auth form open.
    pub fn logout(&self) -> ActionResult<()> {
        let result = self.profiles().logout();
        self.settle("logout", result)?;
        self.surface.borrow_mut().redirect = Some(self.config.logout_redirect());
        info!("event=logout module=app status=ok");
        Ok(())
    }

    pub fn set_insight_filter(&self, filter: InsightFilter) {
        self.state.borrow_mut().insight_filter = filter;
        if self.current_view() == Some(ViewId::Insight) {
            self.refresh_view();
        }
    }

    /// Stages a role change shown as `student` or `creator_admin`.
    pub fn stage_role(&self, uid: &str, display_role: &str) -> ActionResult<()> {
        let result = self.acting_session().and_then(|session| {
            require_staff(&session, "change roles")?;
            self.state
                .borrow_mut()
                .staged
                .stage_role(uid, display_role)
                .map_err(ActionError::from)
        });
        self.settle("stage_role", result)?;
        self.refresh_view();
        Ok(())
    }

    pub fn stage_remarks(&self, uid: &str, remarks: &str) -> ActionResult<()> {
        let result = self.acting_session().and_then(|session| {
            require_staff(&session, "edit remarks")?;
            self.state.borrow_mut().staged.stage_remarks(uid, remarks);
            Ok(())
        });
        self.settle("stage_remarks", result)?;
        self.refresh_view();
        Ok(())
    }

    /// Writes staged insight edits; returns how many students were saved.
    pub fn save_insight(&self) -> ActionResult<usize> {
        let result = self.acting_session().and_then(|session| {
            require_staff(&session, "change roles")?;
            let mut staged = std::mem::take(&mut self.state.borrow_mut().staged);
            let saved = staged.save(&*self.store);
            self.state.borrow_mut().staged = staged;
            saved
        });
        let saved = self.settle("save_insight", result)?;
        self.alert(format!("✅ Saved changes for {saved} user(s)."));
        self.reload_view();
        Ok(saved)
    }

    pub fn delete_student(&self, uid: &str) -> ActionResult<()> {
        let result = self.acting_session().and_then(|session| {
            require_staff(&session, "delete users")?;
            insight::delete_student(&*self.store, uid)
        });
        self.settle("delete_student", result)?;
        self.reload_view();
        Ok(())
    }

    pub fn save_admin_settings(&self, settings: &AdminSettings) -> ActionResult<AdminSettings> {
        let result = self.acting_session().and_then(|session| {
            require_staff(&session, "change admin settings")?;
            admin::save_settings(&*self.store, settings)
        });
        let saved = self.settle("save_admin_settings", result)?;
        self.alert("✅ Settings saved.");
        self.reload_view();
        Ok(saved)
    }

    /// CSV text of a collection; `None` (with an alert) when it is empty.
    pub fn export_csv(&self, kind: ExportKind) -> ActionResult<Option<String>> {
        let result = self.acting_session().and_then(|session| {
            require_staff(&session, "export data")?;
            admin::export_csv(&*self.store, kind)
        });
        let csv = self.settle("export_csv", result)?;
        if csv.is_none() {
            self.alert("No records to export.");
        }
        Ok(csv)
    }

    pub fn add_service(&self, icon: &str, label: &str) -> ActionResult<usize> {
        let result = self
            .acting_session()
            .and_then(|session| CatalogService::new(&*self.store).add_service(&session, icon, label));
        self.settle("add_service", result)
    }

    pub fn rename_service(&self, index: usize, label: &str) -> ActionResult<()> {
        let result = self.acting_session().and_then(|session| {
            CatalogService::new(&*self.store).rename_service(&session, index, label)
        });
        self.settle("rename_service", result)
    }

    pub fn delete_service(&self, index: usize) -> ActionResult<()> {
        let result = self
            .acting_session()
            .and_then(|session| CatalogService::new(&*self.store).delete_service(&session, index));
        self.settle("delete_service", result)
    }

    pub fn save_contact_field(&self, field: ContactField, value: &str) -> ActionResult<()> {
        let result = self.acting_session().and_then(|session| {
            CatalogService::new(&*self.store).save_contact_field(&session, field, value)
        });
        self.settle("save_contact_field", result)
    }

    pub fn post_feedback(&self, message: &str, image: Option<&Attachment>) -> ActionResult<String> {
        let result = self.acting_session().and_then(|session| {
            FeedbackService::new(&*self.store).post(
                &session,
                message,
                image,
                self.config.max_attachment_bytes,
            )
        });
        self.settle("post_feedback", result)
    }

    pub fn edit_post(&self, pid: &str, message: &str) -> ActionResult<()> {
        let result = self
            .acting_session()
            .and_then(|session| FeedbackService::new(&*self.store).edit_post(&session, pid, message));
        self.settle("edit_post", result)
    }

    /// Deleting from the post page returns to the feed once the write
    /// succeeds.
    pub fn delete_post(&self, pid: &str) -> ActionResult<()> {
        let result = self.acting_session().and_then(|session| {
            let feedback = FeedbackService::new(&*self.store);
            let post = feedback
                .load(pid)?
                .ok_or_else(|| ActionError::NotFound("Post".to_string()))?;
            if !can_delete(session.role, &session.user_id, &post.uid) {
                return Err(ActionError::Forbidden("delete this post"));
            }
            feedback.delete_post(&session, pid)?;
            if self.current_view() == Some(ViewId::FeedbackPost(pid.to_string())) {
                self.follow(ViewId::Feedback);
            }
            Ok(())
        });
        self.settle("delete_post", result)
    }

    pub fn react(&self, pid: &str, emoji: &str) -> ActionResult<()> {
        let result = self
            .acting_session()
            .and_then(|session| FeedbackService::new(&*self.store).react(&session, pid, emoji));
        self.settle("react", result)
    }

    /// Shows the comment at once, then writes it; a failed write removes it
    /// again.
    pub fn comment(&self, pid: &str, text: &str) -> ActionResult<()> {
        let session = self.settle("comment", self.acting_session())?;
        let feedback = FeedbackService::new(&*self.store);
        let comment = self.settle("comment", feedback.draft_comment(&session, text))?;

        self.state
            .borrow_mut()
            .pending_comments
            .entry(pid.to_string())
            .or_default()
            .push(comment.clone());
        self.refresh_view();

        let result = feedback.submit_comment(pid, &comment);
        {
            let mut state = self.state.borrow_mut();
            if let Some(pending) = state.pending_comments.get_mut(pid) {
                pending.retain(|queued| queued.id != comment.id);
                if pending.is_empty() {
                    state.pending_comments.remove(pid);
                }
            }
        }
        if result.is_err() {
            info!("event=comment_rollback module=app status=ok");
            self.refresh_view();
        }
        self.settle("comment", result)
    }

    pub fn edit_comment(&self, pid: &str, cid: &str, text: &str) -> ActionResult<()> {
        let result = self.acting_session().and_then(|session| {
            FeedbackService::new(&*self.store).edit_comment(&session, pid, cid, text)
        });
        self.settle("edit_comment", result)
    }

    pub fn delete_comment(&self, pid: &str, cid: &str) -> ActionResult<()> {
        let result = self.acting_session().and_then(|session| {
            FeedbackService::new(&*self.store).delete_comment(&session, pid, cid)
        });
        self.settle("delete_comment", result)
    }

    /// Publishes the staff member's own backend config for new sign-ins.
    pub fn save_backend_config(&self, config: &BackendConfig) -> ActionResult<()> {
        let result = self.acting_session().and_then(|session| {
            require_staff(&session, "configure the backend")?;
            tenant::save_backend_config(&*self.store, &session.user_id, config)
                .map_err(ActionError::from)
        });
        self.settle("save_backend_config", result)?;
        self.alert("✅ Backend config saved.");
        self.refresh_view();
        Ok(())
    }

    pub fn reset_backend_config(&self) -> ActionResult<()> {
        let result = self.acting_session().and_then(|session| {
            require_staff(&session, "configure the backend")?;
            tenant::reset_backend_config(&*self.store, &session.user_id)
                .map_err(ActionError::from)
        });
        self.settle("reset_backend_config", result)?;
        self.refresh_view();
        Ok(())
    }
}
