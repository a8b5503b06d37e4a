//! Compiled page templates.
//!
//! # Invariants
//! - Templates are embedded at build time and compiled once per process.
//! - Every template name ends in `.html`, so interpolated values are
//!   HTML-escaped by the environment.

use log::error;
use minijinja::Environment;
use once_cell::sync::OnceCell;
use serde::Serialize;

const TEMPLATES: &[(&str, &str)] = &[
    ("admin.html", include_str!("templates/admin.html")),
    ("analytics.html", include_str!("templates/analytics.html")),
    ("board.html", include_str!("templates/board.html")),
    ("dashboard.html", include_str!("templates/dashboard.html")),
    ("feedback.html", include_str!("templates/feedback.html")),
    ("feedback_post.html", include_str!("templates/feedback_post.html")),
    ("home.html", include_str!("templates/home.html")),
    ("insight.html", include_str!("templates/insight.html")),
    ("lesson_detail.html", include_str!("templates/lesson_detail.html")),
    ("lesson_form.html", include_str!("templates/lesson_form.html")),
    ("lessons.html", include_str!("templates/lessons.html")),
    ("notifications.html", include_str!("templates/notifications.html")),
    ("placeholder.html", include_str!("templates/placeholder.html")),
    ("post_card.html", include_str!("templates/post_card.html")),
    ("profile.html", include_str!("templates/profile.html")),
    ("services.html", include_str!("templates/services.html")),
];

/// Markup used when a template itself fails; never contains user content.
const RENDER_FAILURE_HTML: &str =
    "<div class=\"placeholder\">⚠️ This section could not be displayed.</div>";

static ENVIRONMENT: OnceCell<Environment<'static>> = OnceCell::new();

fn environment() -> Result<&'static Environment<'static>, minijinja::Error> {
    ENVIRONMENT.get_or_try_init(|| {
        let mut env = Environment::new();
        for &(name, source) in TEMPLATES {
            env.add_template(name, source)?;
        }
        Ok(env)
    })
}

/// Renders `name` with `context`, degrading to a static placeholder on error.
pub fn render_page<S: Serialize>(name: &str, context: S) -> String {
    let rendered = environment()
        .and_then(|env| env.get_template(name))
        .and_then(|template| template.render(context));
    match rendered {
        Ok(html) => html,
        Err(err) => {
            error!(
                "event=template_render module=render status=error template={name} kind={:?}",
                err.kind()
            );
            RENDER_FAILURE_HTML.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{render_page, RENDER_FAILURE_HTML, TEMPLATES};
    use minijinja::context;

    #[test]
    fn every_embedded_template_compiles() {
        let env = super::environment().expect("templates compile");
        for &(name, _) in TEMPLATES {
            assert!(env.get_template(name).is_ok(), "{name} should be registered");
        }
    }

    #[test]
    fn interpolated_values_are_escaped() {
        let html = render_page("placeholder.html", context! { message => "<b>hi</b>" });
        assert!(html.contains("&lt;b&gt;hi&lt;/b&gt;"));
        assert!(!html.contains("<b>"));
    }

    #[test]
    fn unknown_template_degrades_to_placeholder() {
        assert_eq!(
            render_page("missing.html", context! {}),
            RENDER_FAILURE_HTML
        );
    }
}
