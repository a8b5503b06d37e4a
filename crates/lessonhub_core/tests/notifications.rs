use lessonhub_core::model::notification::{NotificationFilter, DEFAULT_ICON};
use lessonhub_core::nav::{NavOutcome, ViewId};
use lessonhub_core::{
    App, AppConfig, DataStore, IdentityProvider, LocalIdentity, SignUpRequest, SqliteDataStore,
};
use serde_json::json;
use std::rc::Rc;

struct Fixture {
    app: Rc<App>,
    store: Rc<SqliteDataStore>,
    uid: String,
}

fn student_with_inbox() -> Fixture {
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
    store
        .write(
            &format!("students/{}", user.uid),
            json!({"fullName": "Ana Cruz", "role": "student"}),
        )
        .unwrap();
    store
        .write("lessons/1", json!({"title": "Intro", "type": "lesson"}))
        .unwrap();
    store
        .write(
            &format!("notifications/{}", user.uid),
            json!({
                "n1": {"message": "Welcome aboard", "type": "new-signup", "read": true, "ts": 1000},
                "n2": {"message": "Something odd", "type": "mystery", "read": false, "ts": 2000},
                "n3": {
                    "message": "New lesson: Intro",
                    "type": "new-lesson",
                    "read": false,
                    "ts": 3000,
                    "link": "/lesson/1"
                },
            }),
        )
        .unwrap();

    let app = App::new(AppConfig::default(), store.clone(), identity);
    app.start("#/home");
    Fixture {
        app,
        store,
        uid: user.uid,
    }
}

fn ids(app: &App, filter: NotificationFilter) -> Vec<String> {
    app.feed()
        .render(filter)
        .into_iter()
        .map(|record| record.id)
        .collect()
}

#[test]
fn badge_counts_unread_records() {
    let fx = student_with_inbox();
    assert!(fx.app.feed().is_listening());
    assert_eq!(fx.app.surface().badge.as_deref(), Some("2"));

    fx.store
        .write(&format!("notifications/{}/n2/read", fx.uid), json!(true))
        .unwrap();
    assert_eq!(fx.app.surface().badge.as_deref(), Some("1"));
}

#[test]
fn unread_filter_is_a_newest_first_subset() {
    let fx = student_with_inbox();
    let all = ids(&fx.app, NotificationFilter::All);
    let unread = ids(&fx.app, NotificationFilter::Unread);

    assert_eq!(all, vec!["n3", "n2", "n1"]);
    assert_eq!(unread, vec!["n3", "n2"]);
    assert!(unread.iter().all(|id| all.contains(id)));
}

#[test]
fn unknown_types_render_with_the_default_icon() {
    let fx = student_with_inbox();
    fx.app.navigate_to(ViewId::Notifications).unwrap();
    let html = fx.app.surface().main_content;
    assert!(html.contains("Something odd"));
    assert!(html.contains(DEFAULT_ICON));
    assert!(html.contains("Unread (2)"));
}

#[test]
fn mark_all_read_is_idempotent_and_refreshes_the_open_view() {
    let fx = student_with_inbox();
    fx.app.navigate_to(ViewId::Notifications).unwrap();
    fx.app.set_notification_filter(NotificationFilter::Unread);
    assert!(fx.app.surface().main_content.contains("New lesson: Intro"));

    assert_eq!(fx.app.mark_all_notifications_read().unwrap(), 2);
    assert_eq!(fx.app.surface().badge, None);
    assert!(fx.app.surface().main_content.contains("You're all caught up."));
    assert_eq!(
        fx.store
            .read(&format!("notifications/{}/n3/read", fx.uid))
            .unwrap(),
        Some(json!(true))
    );

    assert_eq!(fx.app.mark_all_notifications_read().unwrap(), 0);
    assert_eq!(fx.app.feed().unread_count(), 0);
}

#[test]
fn opening_a_linked_notification_marks_it_read_and_follows_the_link() {
    let fx = student_with_inbox();
    fx.app.navigate_to(ViewId::Notifications).unwrap();

    let outcome = fx.app.open_notification("n3").unwrap();
    assert_eq!(outcome, NavOutcome::Rendered(ViewId::LessonDetail("1".to_string())));
    assert_eq!(fx.app.current_view(), Some(ViewId::LessonDetail("1".to_string())));
    assert_eq!(fx.app.feed().unread_count(), 1);
}

#[test]
fn opening_an_unlinked_notification_stays_put() {
    let fx = student_with_inbox();
    fx.app.navigate_to(ViewId::Notifications).unwrap();

    assert_eq!(fx.app.open_notification("n2").unwrap(), NavOutcome::Ignored);
    assert_eq!(fx.app.current_view(), Some(ViewId::Notifications));
    assert_eq!(fx.app.surface().badge.as_deref(), Some("1"));
}

#[test]
fn signing_out_stops_the_feed_and_clears_the_badge() {
    let fx = student_with_inbox();
    fx.app.logout().unwrap();
    assert!(!fx.app.feed().is_listening());
    assert_eq!(fx.app.surface().badge, None);

    fx.store
        .write(
            &format!("notifications/{}/n4", fx.uid),
            json!({"message": "Late arrival", "read": false, "ts": 4000}),
        )
        .unwrap();
    assert_eq!(fx.app.surface().badge, None);
}

#[test]
fn far_past_timestamps_still_render_an_age() {
    let fx = student_with_inbox();
    fx.store
        .write(
            &format!("notifications/{}/n4", fx.uid),
            json!({"message": "From the dawn of time", "read": false, "ts": -1e19}),
        )
        .unwrap();

    fx.app.navigate_to(ViewId::Notifications).unwrap();

    let html = fx.app.surface().main_content;
    assert!(html.contains("From the dawn of time"));
    assert!(html.contains(&format!("{}d", i64::MAX / 1000 / 86_400)));
}
