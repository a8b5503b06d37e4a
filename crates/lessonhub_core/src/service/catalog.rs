//! Services page content: service tiles and contact details.
//!
//! Both documents are rewritten whole on every edit, starting from the
//! latest stored copy.

use super::lesson::require_staff;
use super::validation::required;
use super::{ActionError, ActionResult};
use crate::model::session::Session;
use crate::model::settings::{decode_services, services_value, ContactField, ContactInfo, ServiceTile};
use crate::store::{path, DataStore};
use serde_json::Value;

pub struct CatalogService<S: DataStore> {
    store: S,
}

impl<S: DataStore> CatalogService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn services(&self) -> ActionResult<Vec<ServiceTile>> {
        Ok(decode_services(self.store.read(path::services())?.as_ref()))
    }

    pub fn contact(&self) -> ActionResult<ContactInfo> {
        Ok(ContactInfo::from_value(self.store.read(path::contact_info())?.as_ref()))
    }

    pub fn add_service(&self, editor: &Session, icon: &str, label: &str) -> ActionResult<usize> {
        require_staff(editor, "edit services")?;
        let label = required("Service name", label)?;
        let mut tiles = self.services()?;
        tiles.push(ServiceTile {
            icon: icon.trim().to_string(),
            label: label.to_string(),
        });
        self.store.write(path::services(), services_value(&tiles))?;
        Ok(tiles.len() - 1)
    }

    pub fn rename_service(&self, editor: &Session, index: usize, label: &str) -> ActionResult<()> {
        require_staff(editor, "edit services")?;
        let label = required("Service name", label)?;
        let mut tiles = self.services()?;
        let tile = tiles
            .get_mut(index)
            .ok_or_else(|| ActionError::NotFound("Service".to_string()))?;
        tile.label = label.to_string();
        self.store.write(path::services(), services_value(&tiles))?;
        Ok(())
    }

    pub fn delete_service(&self, editor: &Session, index: usize) -> ActionResult<()> {
        require_staff(editor, "edit services")?;
        let mut tiles = self.services()?;
        if index >= tiles.len() {
            return Err(ActionError::NotFound("Service".to_string()));
        }
        tiles.remove(index);
        let value = if tiles.is_empty() {
            Value::Null
        } else {
            services_value(&tiles)
        };
        self.store.write(path::services(), value)?;
        Ok(())
    }

    pub fn save_contact_field(&self, editor: &Session, field: ContactField, value: &str) -> ActionResult<()> {
        require_staff(editor, "edit contact details")?;
        let mut contact = self.contact()?;
        contact.set(field, value.trim().to_string());
        let value = serde_json::to_value(&contact).map_err(crate::store::StoreError::from)?;
        self.store.write(path::contact_info(), value)?;
        Ok(())
    }
}
