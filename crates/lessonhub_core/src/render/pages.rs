//! Pure page renderers: domain snapshots in, HTML out.
//!
//! # Invariants
//! - Output depends only on the arguments; the same snapshot always renders
//!   the same markup.
//! - Avatars pass through `resolve_avatar_url` before they reach markup.

use super::templates::render_page;
use crate::model::feedback::{can_delete, can_edit, FeedbackPost, REACTION_EMOJIS};
use crate::model::lesson::{group_completed_titles, LessonRecord, LessonType};
use crate::model::notification::{time_ago, NotificationFilter, NotificationRecord};
use crate::model::session::{resolve_avatar_url, Session};
use crate::model::settings::{AdminSettings, ContactInfo, ServiceTile};
use crate::model::student::{StudentRecord, COMPLETE};
use crate::service::analytics::{format_amount, AnalyticsReport};
use crate::service::insight::{displayed_role, filter_students, InsightFilter, StagedChanges};
use crate::service::validation::format_size;
use crate::tenant::BackendSummary;
use minijinja::context;
use rand::seq::SliceRandom;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Quotes rotated on the dashboard.
pub const DAILY_QUOTES: [&str; 7] = [
    "Believe in yourself and all that you are.",
    "Push yourself, because no one else is going to do it for you.",
    "Every accomplishment starts with the decision to try.",
    "Your only limit is your mind.",
    "Dream it. Wish it. Do it.",
    "Great things never come from comfort zones.",
    "Don’t stop until you’re proud.",
];

/// Picks the quote for one dashboard visit.
pub fn pick_quote() -> &'static str {
    DAILY_QUOTES
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(DAILY_QUOTES[0])
}

pub fn placeholder(message: &str) -> String {
    render_page("placeholder.html", context! { message })
}

pub fn home() -> String {
    render_page("home.html", context! {})
}

#[derive(Serialize)]
struct ChecklistPanel {
    kind: &'static str,
    label: &'static str,
    titles: Vec<String>,
}

pub fn dashboard(
    session: &Session,
    quote: &str,
    lessons: &[LessonRecord],
    progress: &BTreeMap<String, f64>,
) -> String {
    let grouped = group_completed_titles(lessons, progress);
    let panels: Vec<ChecklistPanel> = LessonType::CHECKLIST
        .iter()
        .map(|kind| ChecklistPanel {
            kind: kind.as_str(),
            label: kind.label(),
            titles: grouped.get(kind).cloned().unwrap_or_default(),
        })
        .collect();
    render_page(
        "dashboard.html",
        context! {
            greeting => format!("Welcome, {}!", session.display_name),
            quote,
            panels,
        },
    )
}

#[derive(Serialize)]
struct LessonLink {
    id: String,
    title: String,
    fragment: String,
    label: Option<&'static str>,
    done: bool,
}

impl LessonLink {
    fn new(lesson: &LessonRecord, done: bool) -> Self {
        Self {
            id: lesson.id.clone(),
            title: lesson.display_title().to_string(),
            fragment: format!("#/lesson/{}", lesson.id),
            label: lesson.kind.map(LessonType::label),
            done,
        }
    }
}

pub fn lesson_list(lessons: &[LessonRecord]) -> String {
    let lessons: Vec<LessonLink> = lessons
        .iter()
        .map(|lesson| LessonLink::new(lesson, false))
        .collect();
    render_page("lessons.html", context! { lessons })
}

#[derive(Serialize)]
struct LessonView {
    id: String,
    title: String,
    description: String,
    url: String,
    file_data: Option<String>,
    is_image: bool,
}

pub fn lesson_detail(lesson: &LessonRecord, progress: &BTreeMap<String, f64>, is_staff: bool) -> String {
    let completed = progress
        .get(&lesson.title)
        .is_some_and(|percent| *percent == COMPLETE);
    let view = LessonView {
        id: lesson.id.clone(),
        title: lesson.display_title().to_string(),
        description: lesson.description.clone(),
        url: lesson.url.clone(),
        file_data: lesson.file_data.clone(),
        is_image: lesson.attachment_is_image(),
    };
    render_page(
        "lesson_detail.html",
        context! {
            lesson => view,
            completed,
            is_staff,
            edit_fragment => format!("#/lesson-edit/{}", lesson.id),
        },
    )
}

#[derive(Serialize)]
struct BoardColumn {
    kind: &'static str,
    label: &'static str,
    lessons: Vec<LessonLink>,
}

/// Board columns in fixed order; the unclassified column is staff-only.
pub fn board(lessons: &[LessonRecord], completed: &BTreeSet<String>, is_staff: bool) -> String {
    let columns: Vec<BoardColumn> = LessonType::ALL
        .iter()
        .filter(|kind| is_staff || **kind != LessonType::Unclassified)
        .map(|kind| BoardColumn {
            kind: kind.as_str(),
            label: kind.label(),
            lessons: lessons
                .iter()
                .filter(|lesson| lesson.column() == *kind)
                .map(|lesson| LessonLink::new(lesson, completed.contains(&lesson.id)))
                .collect(),
        })
        .collect();
    render_page("board.html", context! { columns })
}

#[derive(Serialize)]
struct TypeOption {
    value: &'static str,
    label: &'static str,
    selected: bool,
}

/// New-lesson form, or the edit form when `existing` is given.
pub fn lesson_form(existing: Option<&LessonRecord>, max_bytes: u64) -> String {
    let selected = existing.map_or(LessonType::Lesson, LessonRecord::column);
    let types: Vec<TypeOption> = LessonType::ALL
        .iter()
        .map(|kind| TypeOption {
            value: kind.as_str(),
            label: kind.label(),
            selected: *kind == selected,
        })
        .collect();
    render_page(
        "lesson_form.html",
        context! {
            mode => if existing.is_some() { "edit" } else { "new" },
            lesson_id => existing.map(|lesson| lesson.id.clone()),
            title => existing.map(|lesson| lesson.title.clone()).unwrap_or_default(),
            description => existing.map(|lesson| lesson.description.clone()).unwrap_or_default(),
            url => existing.map(|lesson| lesson.url.clone()).unwrap_or_default(),
            types,
            max_bytes,
            max_label => format_size(max_bytes),
        },
    )
}

#[derive(Serialize)]
struct ContactRow {
    key: &'static str,
    label: &'static str,
    value: String,
}

pub fn services(tiles: &[ServiceTile], contact: &ContactInfo, editable: bool) -> String {
    let contact = vec![
        ContactRow { key: "facebook", label: "Facebook", value: contact.facebook.clone() },
        ContactRow { key: "email", label: "Email", value: contact.email.clone() },
        ContactRow { key: "phone", label: "Phone", value: contact.phone.clone() },
        ContactRow { key: "website", label: "Website", value: contact.website.clone() },
        ContactRow { key: "location1", label: "Location", value: contact.location1.clone() },
        ContactRow { key: "location2", label: "Branch", value: contact.location2.clone() },
    ];
    render_page("services.html", context! { tiles, contact, editable })
}

#[derive(Serialize)]
struct NotificationItem {
    id: String,
    icon: &'static str,
    message: String,
    age: String,
    read: bool,
}

/// `records` must already be filtered and ordered by the feed.
pub fn notifications(
    records: &[NotificationRecord],
    filter: NotificationFilter,
    unread: usize,
    now: i64,
) -> String {
    let items: Vec<NotificationItem> = records
        .iter()
        .map(|record| NotificationItem {
            id: record.id.clone(),
            icon: record.icon(),
            message: record.message.clone(),
            age: time_ago(record.ts, now),
            read: record.read,
        })
        .collect();
    render_page(
        "notifications.html",
        context! { filter => filter.as_str(), items, unread },
    )
}

#[derive(Serialize)]
struct BackendPanel {
    status: &'static str,
    lines: Vec<String>,
}

/// Profile page; `backend` is shown to staff, with whether they published
/// their own config.
pub fn profile(
    session: &Session,
    student: &StudentRecord,
    backend: Option<(&BackendSummary, bool)>,
) -> String {
    let backend = backend.map(|(summary, published)| BackendPanel {
        status: if published {
            "✅ Your backend config is saved. New sign-ins use it."
        } else {
            "Using the default backend. Save a config to use your own."
        },
        lines: summary.lines(),
    });
    let name = if student.full_name.trim().is_empty() {
        session.display_name.clone()
    } else {
        student.full_name.clone()
    };
    let avatar = match student.photo.as_deref() {
        Some(photo) => resolve_avatar_url(Some(photo)),
        None => session.avatar_url.clone(),
    };
    render_page(
        "profile.html",
        context! {
            avatar,
            name,
            role => student.role.as_str(),
            email => if student.email.is_empty() { session.email.clone() } else { student.email.clone() },
            contact => student.contact.clone(),
            country => student.country.clone(),
            completion => student.completion_rate(),
            completed => student.completed_count(),
            tracked => student.progress.len(),
            backend,
        },
    )
}

#[derive(Serialize)]
struct InsightRow {
    uid: String,
    name: String,
    email: String,
    role: &'static str,
    progress: f64,
    remarks: String,
    staged: bool,
}

#[derive(Serialize)]
struct FilterOption {
    value: &'static str,
    label: &'static str,
}

pub fn insight(students: &[StudentRecord], filter: InsightFilter, staged: &StagedChanges) -> String {
    let rows: Vec<InsightRow> = filter_students(students, filter)
        .into_iter()
        .map(|student| {
            let change = staged.get(&student.uid);
            InsightRow {
                uid: student.uid.clone(),
                name: student.full_name.clone(),
                email: student.email.clone(),
                role: displayed_role(student, change),
                progress: (student.mean_progress() * 100.0).round() / 100.0,
                remarks: change
                    .and_then(|change| change.remarks.clone())
                    .unwrap_or_else(|| student.remarks.clone()),
                staged: change.is_some(),
            }
        })
        .collect();
    let filters: Vec<FilterOption> = InsightFilter::ALL
        .iter()
        .map(|option| FilterOption {
            value: option.as_str(),
            label: option.label(),
        })
        .collect();
    render_page(
        "insight.html",
        context! {
            filter => filter.as_str(),
            filters,
            rows,
            staged => staged.len(),
        },
    )
}

#[derive(Serialize)]
struct Bucket {
    name: &'static str,
    count: usize,
}

#[derive(Serialize)]
struct MonthRow {
    label: String,
    count: usize,
}

#[derive(Serialize)]
struct CompletionRow {
    name: String,
    percent: f64,
}

pub fn analytics(report: &AnalyticsReport) -> String {
    let devices: Vec<Bucket> = report
        .devices
        .entries()
        .into_iter()
        .map(|(name, count)| Bucket { name, count })
        .collect();
    let signups: Vec<MonthRow> = report
        .signups
        .iter()
        .map(|month| MonthRow {
            label: month.label.clone(),
            count: month.count,
        })
        .collect();
    let students: Vec<CompletionRow> = report
        .students
        .iter()
        .map(|student| CompletionRow {
            name: student.name.clone(),
            percent: student.percent,
        })
        .collect();
    render_page(
        "analytics.html",
        context! {
            users => report.users,
            active_users => report.active_users,
            average_progress => report.average_progress,
            currency => report.currency.clone(),
            revenue => format_amount(report.revenue),
            resell_revenue => format_amount(report.resell.revenue),
            resell_forecast => format_amount(report.resell.forecast),
            devices,
            signups,
            students,
        },
    )
}

pub fn admin(settings: &AdminSettings) -> String {
    render_page("admin.html", context! { settings })
}

#[derive(Serialize)]
struct CommentView {
    id: String,
    name: String,
    text: String,
    edited: bool,
    pending: bool,
    can_edit: bool,
    can_delete: bool,
}

#[derive(Serialize)]
struct PostView {
    id: String,
    fragment: String,
    name: String,
    photo: String,
    message: String,
    image_data: Option<String>,
    age: String,
    can_edit: bool,
    can_delete: bool,
    reaction_icons: String,
    reaction_total: usize,
    my_reaction: Option<String>,
    comments: Vec<CommentView>,
}

fn post_view(post: &FeedbackPost, viewer: &Session, now: i64) -> PostView {
    let summary = post.reaction_summary();
    PostView {
        id: post.id.clone(),
        fragment: format!("#/feedback/{}", post.id),
        name: post.name.clone(),
        photo: resolve_avatar_url(Some(&post.photo)),
        message: post.message.clone(),
        image_data: post.image_data.clone(),
        age: time_ago(post.timestamp, now),
        can_edit: can_edit(&viewer.user_id, &post.uid),
        can_delete: can_delete(viewer.role, &viewer.user_id, &post.uid),
        reaction_icons: summary.unique.concat(),
        reaction_total: summary.total,
        my_reaction: post.reaction_of(&viewer.user_id).map(str::to_string),
        comments: post
            .comments
            .iter()
            .map(|comment| CommentView {
                id: comment.id.clone(),
                name: comment.name.clone(),
                text: comment.text.clone(),
                edited: comment.edited_at.is_some(),
                pending: comment.pending,
                can_edit: !comment.pending && can_edit(&viewer.user_id, &comment.uid),
                can_delete: !comment.pending
                    && can_delete(viewer.role, &viewer.user_id, &comment.uid),
            })
            .collect(),
    }
}

/// Community feed; `posts` are expected newest first.
pub fn feedback_feed(posts: &[FeedbackPost], viewer: &Session, now: i64) -> String {
    let posts: Vec<PostView> = posts
        .iter()
        .map(|post| post_view(post, viewer, now))
        .collect();
    render_page(
        "feedback.html",
        context! {
            posts,
            viewer_photo => resolve_avatar_url(Some(&viewer.avatar_url)),
            viewer_first_name => viewer.first_name(),
            reaction_choices => REACTION_EMOJIS.to_vec(),
        },
    )
}

/// Single post page; `None` renders the not-found placeholder.
pub fn feedback_post(post: Option<&FeedbackPost>, viewer: &Session, now: i64) -> String {
    let post = post.map(|post| post_view(post, viewer, now));
    render_page(
        "feedback_post.html",
        context! {
            post,
            reaction_choices => REACTION_EMOJIS.to_vec(),
        },
    )
}
