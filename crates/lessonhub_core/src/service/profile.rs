//! Profile edits and account lifecycle for the signed-in user.

use super::validation::{required, validate_attachment, validate_password, Attachment, MediaRule};
use super::ActionResult;
use crate::identity::IdentityProvider;
use crate::store::{path, DataStore};
use log::info;
use serde_json::{json, Map};

/// Editable profile fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub full_name: String,
    pub contact: String,
    pub country: String,
}

pub struct ProfileService<S: DataStore, I: IdentityProvider> {
    store: S,
    identity: I,
}

impl<S: DataStore, I: IdentityProvider> ProfileService<S, I> {
    pub fn new(store: S, identity: I) -> Self {
        Self { store, identity }
    }

    pub fn save(&self, uid: &str, update: &ProfileUpdate) -> ActionResult<()> {
        let full_name = required("Full name", &update.full_name)?;
        let mut patch = Map::new();
        patch.insert("fullName".to_string(), json!(full_name));
        patch.insert("contact".to_string(), json!(update.contact.trim()));
        patch.insert("country".to_string(), json!(update.country.trim()));
        self.store.patch(&path::student(uid), patch)?;
        info!("event=profile_save module=service status=ok");
        Ok(())
    }

    /// Stores an uploaded image as the profile `photo`.
    pub fn upload_photo(&self, uid: &str, photo: &Attachment, max_bytes: u64) -> ActionResult<()> {
        validate_attachment(photo, MediaRule::ImageOnly, max_bytes)?;
        let mut patch = Map::new();
        patch.insert("photo".to_string(), json!(photo.data_url));
        self.store.patch(&path::student(uid), patch)?;
        info!("event=profile_photo module=service status=ok");
        Ok(())
    }

    pub fn change_password(&self, new_secret: &str, min_len: usize) -> ActionResult<()> {
        validate_password(new_secret, min_len)?;
        self.identity.update_password(new_secret)?;
        Ok(())
    }

    /// Confirms the secret, removes the profile record, then the account.
    pub fn delete_account(&self, uid: &str, secret: &str) -> ActionResult<()> {
        self.identity.reauthenticate(secret)?;
        self.store.delete(&path::student(uid))?;
        self.identity.delete_current_user()?;
        info!("event=account_delete module=service status=ok");
        Ok(())
    }

    pub fn logout(&self) -> ActionResult<()> {
        self.identity.sign_out()?;
        Ok(())
    }
}
