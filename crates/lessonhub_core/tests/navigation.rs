use lessonhub_core::nav::{BackPolicy, NavOutcome, NavigationError, ViewId};
use lessonhub_core::session::NOT_PROVISIONED_MESSAGE;
use lessonhub_core::{
    App, AppConfig, DataStore, IdentityProvider, LocalIdentity, Role, SignUpRequest,
    SqliteDataStore,
};
use serde_json::json;
use std::rc::Rc;

struct Fixture {
    app: Rc<App>,
    store: Rc<SqliteDataStore>,
    uid: String,
}

fn signed_in(config: AppConfig, role: Option<&str>, fragment: &str) -> Fixture {
    let store = Rc::new(SqliteDataStore::open_in_memory().unwrap());
    let identity = Rc::new(LocalIdentity::open_in_memory(6).unwrap());
    let user = identity
        .sign_up(&SignUpRequest {
            full_name: "Ana Cruz".to_string(),
            email: "ana@example.test".to_string(),
            secret: "secret-1".to_string(),
            ..SignUpRequest::default()
        })
        .unwrap();
    if let Some(role) = role {
        store
            .write(
                &format!("students/{}", user.uid),
                json!({"fullName": "Ana Cruz", "role": role}),
            )
            .unwrap();
    }
    store
        .write("lessons/1", json!({"title": "Intro", "type": "lesson"}))
        .unwrap();

    let app = App::new(config, store.clone(), identity);
    app.start(fragment);
    Fixture {
        app,
        store,
        uid: user.uid,
    }
}

fn student(fragment: &str) -> Fixture {
    signed_in(AppConfig::default(), Some("student"), fragment)
}

#[test]
fn dashboard_lessons_detail_back_back_ends_on_dashboard() {
    let fx = student("#/dashboard");
    assert_eq!(fx.app.history(), vec![ViewId::Dashboard]);

    fx.app.navigate_to(ViewId::Lessons).unwrap();
    fx.app
        .navigate_to(ViewId::LessonDetail("1".to_string()))
        .unwrap();
    assert!(fx.app.surface().back_visible);

    fx.app.go_back().unwrap();
    fx.app.go_back().unwrap();

    assert_eq!(fx.app.history(), vec![ViewId::Dashboard]);
    assert_eq!(fx.app.current_view(), Some(ViewId::Dashboard));
    assert!(!fx.app.surface().back_visible);
}

#[test]
fn session_start_home_does_not_count_towards_back_depth() {
    let fx = student("");
    assert_eq!(fx.app.current_view(), Some(ViewId::Home));

    fx.app.navigate_to(ViewId::Dashboard).unwrap();
    assert!(!fx.app.surface().back_visible);
    fx.app.navigate_to(ViewId::Lessons).unwrap();
    fx.app
        .navigate_to(ViewId::LessonDetail("1".to_string()))
        .unwrap();

    fx.app.go_back().unwrap();
    fx.app.go_back().unwrap();

    assert_eq!(fx.app.history(), vec![ViewId::Dashboard]);
    assert_eq!(fx.app.current_view(), Some(ViewId::Dashboard));
    assert!(!fx.app.surface().back_visible);
}

#[test]
fn back_on_a_singleton_stack_changes_nothing() {
    let fx = student("#/profile");
    let before = fx.app.surface();
    assert_eq!(fx.app.go_back().unwrap(), NavOutcome::Ignored);
    assert_eq!(fx.app.history(), vec![ViewId::Profile]);
    assert_eq!(fx.app.surface(), before);
}

#[test]
fn back_visibility_tracks_history_depth() {
    let fx = student("");
    let steps = [
        Some(ViewId::Lessons),
        None,
        Some(ViewId::Board),
        Some(ViewId::Services),
        Some(ViewId::Feedback),
        None,
        None,
        None,
        Some(ViewId::Notifications),
    ];
    for step in steps {
        match step {
            Some(view) => {
                fx.app.navigate_to(view).unwrap();
            }
            None => {
                fx.app.go_back().unwrap();
            }
        }
        assert_eq!(fx.app.surface().back_visible, fx.app.history().len() > 1);
    }
}

#[test]
fn restore_previous_policy_reopens_the_popped_view() {
    let config = AppConfig {
        back_policy: BackPolicy::RestorePrevious,
        ..AppConfig::default()
    };
    let fx = signed_in(config, Some("student"), "#/lessons");
    fx.app
        .navigate_to(ViewId::LessonDetail("1".to_string()))
        .unwrap();
    fx.app.go_back().unwrap();
    assert_eq!(fx.app.history(), vec![ViewId::Lessons]);
}

#[test]
fn staff_views_are_rejected_without_touching_history() {
    let fx = student("#/lessons");
    let before = fx.app.surface();
    let err = fx.app.navigate_to(ViewId::Admin).unwrap_err();
    assert_eq!(
        err,
        NavigationError::Forbidden {
            view: "admin".to_string(),
            role: Role::Student,
        }
    );
    assert_eq!(fx.app.history(), vec![ViewId::Lessons]);
    assert_eq!(fx.app.surface(), before);
}

#[test]
fn forbidden_start_fragment_falls_back_home() {
    let fx = student("#/insight");
    assert_eq!(fx.app.history(), vec![ViewId::Home]);
}

#[test]
fn unknown_fragments_dispatch_home() {
    let fx = student("#/lessons");
    fx.app.on_fragment_change("#/nowhere").unwrap();
    assert_eq!(fx.app.current_view(), Some(ViewId::Home));
    assert_eq!(fx.app.surface().fragment, "#/home");
}

#[test]
fn replacing_a_view_releases_its_live_subscriptions() {
    let fx = student("#/home");
    let baseline = fx.store.listener_count();

    fx.app.navigate_to(ViewId::Dashboard).unwrap();
    assert_eq!(fx.app.live_subscriptions(), 3);
    assert_eq!(fx.store.listener_count(), baseline + 3);

    fx.app.navigate_to(ViewId::Analytics).unwrap_err();
    fx.app.navigate_to(ViewId::Board).unwrap();
    assert_eq!(fx.store.listener_count(), baseline + 2);

    fx.app.navigate_to(ViewId::Home).unwrap();
    assert_eq!(fx.app.live_subscriptions(), 0);
    assert_eq!(fx.store.listener_count(), baseline);
}

#[test]
fn live_views_rerender_on_store_changes() {
    let fx = student("#/lessons");
    assert!(fx.app.surface().main_content.contains("Intro"));
    fx.store
        .write("lessons/2", json!({"title": "Second steps", "type": "exam"}))
        .unwrap();
    assert!(fx.app.surface().main_content.contains("Second steps"));
}

#[test]
fn navigation_requested_during_a_render_is_queued() {
    let fx = student("#/dashboard");
    let outcome = fx
        .app
        .navigate_to(ViewId::LessonDetail("404".to_string()))
        .unwrap();
    assert_eq!(outcome, NavOutcome::Rendered(ViewId::LessonDetail("404".to_string())));
    assert_eq!(
        fx.app.history(),
        vec![
            ViewId::Dashboard,
            ViewId::LessonDetail("404".to_string()),
            ViewId::Lessons,
        ]
    );
    assert_eq!(fx.app.surface().alert.as_deref(), Some("Lesson was not found."));
    assert!(fx.app.surface().main_content.contains("Available Lessons"));
}

#[test]
fn deleting_the_displayed_lesson_leaves_its_view() {
    let fx = student("#/lesson/1");
    assert!(fx.app.surface().main_content.contains("Intro"));
    fx.store.delete("lessons/1").unwrap();
    assert_eq!(fx.app.current_view(), Some(ViewId::Lessons));
}

#[test]
fn checklists_mark_shared_titles_in_every_panel() {
    let fx = student("#/home");
    fx.store
        .patch(
            "",
            serde_json::from_value(json!({
                "lessons/1": {"title": "Basics", "type": "lesson"},
                "lessons/2": {"title": "Basics", "type": "exam"},
                "lessons/3": {"title": "Extra", "type": "scenario"},
            }))
            .unwrap(),
        )
        .unwrap();
    fx.store
        .write(&format!("students/{}/progress/Basics", fx.uid), json!(100))
        .unwrap();

    fx.app.navigate_to(ViewId::Dashboard).unwrap();
    let html = fx.app.surface().main_content;
    assert!(html.contains("Welcome, Ana Cruz!"));
    assert_eq!(html.matches("✅ Basics").count(), 2);
    assert!(!html.contains("✅ Extra"));
}

#[test]
fn fragment_before_provisioning_opens_once_ready() {
    let fx = signed_in(AppConfig::default(), None, "");
    assert_eq!(
        fx.app.surface().placeholder.as_deref(),
        Some(NOT_PROVISIONED_MESSAGE)
    );
    assert_eq!(
        fx.app.on_fragment_change("#/services").unwrap(),
        NavOutcome::Queued
    );
    assert_eq!(
        fx.app.navigate_to(ViewId::Lessons).unwrap_err(),
        NavigationError::NotReady
    );

    fx.store
        .write(
            &format!("students/{}", fx.uid),
            json!({"fullName": "Ana Cruz", "role": "student"}),
        )
        .unwrap();
    assert_eq!(fx.app.history(), vec![ViewId::Services]);
    assert_eq!(fx.app.surface().placeholder, None);
}

#[test]
fn losing_staff_role_leaves_staff_views() {
    let fx = signed_in(AppConfig::default(), Some("creator"), "#/admin");
    assert_eq!(fx.app.current_view(), Some(ViewId::Admin));
    fx.store
        .write(&format!("students/{}/role", fx.uid), json!("student"))
        .unwrap();
    assert_eq!(fx.app.current_view(), Some(ViewId::Dashboard));
    assert_eq!(fx.app.session().unwrap().role, Role::Student);
}

#[test]
fn home_toggle_opens_then_closes_the_staff_sidebar() {
    let fx = signed_in(AppConfig::default(), Some("creator"), "#/home");
    fx.app.toggle_home().unwrap();
    assert_eq!(fx.app.current_view(), Some(ViewId::Dashboard));
    assert!(fx.app.surface().sidebar_visible);

    assert_eq!(fx.app.toggle_home().unwrap(), NavOutcome::Ignored);
    assert!(!fx.app.surface().sidebar_visible);

    fx.app.toggle_sidebar();
    fx.app.navigate_to(ViewId::Lessons).unwrap();
    assert!(!fx.app.surface().sidebar_visible);
}
