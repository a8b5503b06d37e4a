//! Entry-page sign-in and registration against the resolved backend.

use super::validation::required;
use super::{iso_now, ActionResult};
use crate::feed::create_notification;
use crate::identity::{AuthUser, SignUpRequest};
use crate::model::notification::NotificationDraft;
use crate::model::student::decode_students;
use crate::store::path;
use crate::tenant::BackendRegistry;
use log::{info, warn};
use serde_json::json;

/// Resolves the tenant backend, then signs in against it.
pub fn sign_in(registry: &mut BackendRegistry, email: &str, secret: &str) -> ActionResult<AuthUser> {
    let backend = registry.resolve_for_sign_in()?;
    let user = backend.identity().sign_in(email, secret)?;
    Ok(user)
}

/// Creates the account on the resolved backend, writes its `students/<uid>`
/// record and tells staff about the new signup.
pub fn sign_up(registry: &mut BackendRegistry, request: &SignUpRequest) -> ActionResult<AuthUser> {
    let full_name = required("Full name", &request.full_name)?.to_string();
    let backend = registry.resolve_for_sign_in()?;
    let store = backend.store();
    let user = backend.identity().sign_up(request)?;

    store.write(
        &path::student(&user.uid),
        json!({
            "fullName": full_name,
            "email": user.email,
            "contact": request.contact.trim(),
            "country": request.country.trim(),
            "role": "student",
            "photoURL": "",
            "signupDate": iso_now(),
        }),
    )?;
    info!("event=account_sign_up module=service status=ok");

    let staff: Vec<String> = match store.read(path::students()) {
        Ok(snapshot) => decode_students(snapshot.as_ref())
            .into_iter()
            .filter(|student| student.role.is_staff())
            .map(|student| student.uid)
            .collect(),
        Err(_) => {
            warn!("event=signup_notify module=service status=error error_kind=read");
            Vec::new()
        }
    };
    let draft = NotificationDraft::new("new-signup", format!("{full_name} just signed up."))
        .with_link("#/insight");
    for uid in staff {
        if create_notification(&*store, &uid, &draft).is_err() {
            warn!("event=signup_notify module=service status=error error_kind=write");
        }
    }
    Ok(user)
}
