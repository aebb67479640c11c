//! Document session store
//!
//! `DocumentStore` is the single source of truth for field data. Every
//! operation swaps in a new immutable `DocumentSession` snapshot; readers hold
//! an `Arc` to whichever snapshot they observed and never see a torn update.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::ConfigDocument;
use crate::document::DocumentHandle;
use crate::error::{ConfigParseError, CoreError, DocumentParseError};
use crate::field::{Field, FieldId, FieldPatch};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppMode {
    Designer,
    Signer,
    #[default]
    None,
}

/// One immutable snapshot of the editing session
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentSession {
    pub document: Option<DocumentHandle>,
    pub fields: Vec<Field>,
    pub active_field_id: Option<FieldId>,
    pub mode: AppMode,
    /// A config has been applied since the document was loaded
    pub config_loaded: bool,
    /// Bumped on every state change
    pub revision: u64,
}

impl DocumentSession {
    pub fn field(&self, id: &FieldId) -> Option<&Field> {
        self.fields.iter().find(|f| &f.id == id)
    }

    pub fn active_field(&self) -> Option<&Field> {
        self.active_field_id.as_ref().and_then(|id| self.field(id))
    }

    /// Fields on a 1-indexed page, in list order
    pub fn fields_on_page(&self, page: u32) -> Vec<&Field> {
        self.fields.iter().filter(|f| f.page == page).collect()
    }

    /// Designer needs a document; signer also needs a config to fill in
    pub fn is_ready(&self) -> bool {
        match self.mode {
            AppMode::Designer => self.document.is_some(),
            AppMode::Signer => self.document.is_some() && self.config_loaded,
            AppMode::None => false,
        }
    }
}

#[derive(Debug, Default)]
pub struct DocumentStore {
    current: Arc<DocumentSession>,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store in `mode` holding a loaded document and, when given, its
    /// field config
    pub fn open(
        mode: AppMode,
        name: &str,
        bytes: &[u8],
        config_json: Option<&str>,
    ) -> Result<Self, CoreError> {
        let mut store = Self::new();
        store.set_mode(mode);
        store.load_document(name, bytes)?;
        if let Some(json) = config_json {
            store.load_config(json)?;
        }
        Ok(store)
    }

    /// The latest snapshot
    pub fn snapshot(&self) -> Arc<DocumentSession> {
        Arc::clone(&self.current)
    }

    pub fn revision(&self) -> u64 {
        self.current.revision
    }

    fn commit(&mut self, mut next: DocumentSession, what: &str) {
        next.revision = self.current.revision + 1;
        debug!(revision = next.revision, fields = next.fields.len(), "{}", what);
        self.current = Arc::new(next);
    }

    /// Parse and install a new document. Starts a fresh document: fields,
    /// selection and the config flag are cleared. On error nothing changes.
    pub fn load_document(
        &mut self,
        name: &str,
        bytes: &[u8],
    ) -> Result<DocumentHandle, DocumentParseError> {
        let handle = DocumentHandle::load(name, bytes)?;
        let next = DocumentSession {
            document: Some(handle.clone()),
            fields: Vec::new(),
            active_field_id: None,
            mode: self.current.mode,
            config_loaded: false,
            revision: 0,
        };
        self.commit(next, "document loaded");
        Ok(handle)
    }

    pub fn set_mode(&mut self, mode: AppMode) {
        if self.current.mode == mode {
            return;
        }
        let mut next = (*self.current).clone();
        next.mode = mode;
        self.commit(next, "mode changed");
    }

    /// Replace the whole field list with the config's fields.
    ///
    /// Returns the number of fields installed. Any parse or validation error
    /// leaves the session untouched.
    pub fn load_config(&mut self, json: &str) -> Result<usize, ConfigParseError> {
        let config = ConfigDocument::from_json(json).map_err(|e| {
            warn!("config rejected: {}", e);
            e
        })?;

        let mut next = (*self.current).clone();
        next.fields = config.fields;
        next.config_loaded = true;
        if let Some(active) = &next.active_field_id {
            if next.field(active).is_none() {
                next.active_field_id = None;
            }
        }
        let count = next.fields.len();
        self.commit(next, "config loaded");
        Ok(count)
    }

    /// Append a field and make it the active one
    pub fn add_field(&mut self, field: Field) {
        let mut next = (*self.current).clone();
        next.active_field_id = Some(field.id.clone());
        next.fields.push(field);
        self.commit(next, "field added");
    }

    /// Merge `patch` over the field. Unknown ids are ignored.
    pub fn update_field(&mut self, id: &FieldId, patch: &FieldPatch) {
        let Some(pos) = self.current.fields.iter().position(|f| &f.id == id) else {
            debug!(field = %id, "update for unknown field ignored");
            return;
        };
        let current = &self.current.fields[pos];
        let updated = patch.apply(current);
        if updated == *current {
            return;
        }
        // a patch may not break a well-formed field, and pages start at 1
        if updated.page < 1 || (current.is_well_formed() && !updated.is_well_formed()) {
            warn!(field = %id, page = updated.page, "malformed field update rejected");
            return;
        }
        let mut next = (*self.current).clone();
        next.fields[pos] = updated;
        self.commit(next, "field updated");
    }

    /// Remove a field, clearing the selection if it pointed at it
    pub fn remove_field(&mut self, id: &FieldId) {
        if self.current.field(id).is_none() {
            return;
        }
        let mut next = (*self.current).clone();
        next.fields.retain(|f| &f.id != id);
        if next.active_field_id.as_ref() == Some(id) {
            next.active_field_id = None;
        }
        self.commit(next, "field removed");
    }

    /// Select a field. An id that no longer exists deselects.
    pub fn set_active_field(&mut self, id: Option<&FieldId>) {
        let resolved = id.filter(|id| self.current.field(id).is_some()).cloned();
        if resolved.is_none() && id.is_some() {
            debug!("selection of unknown field treated as deselect");
        }
        if self.current.active_field_id == resolved {
            return;
        }
        let mut next = (*self.current).clone();
        next.active_field_id = resolved;
        self.commit(next, "selection changed");
    }

    /// Current field list in the config format
    pub fn export_config(&self) -> ConfigDocument {
        let name = self
            .current
            .document
            .as_ref()
            .map(|d| d.name().to_string())
            .unwrap_or_default();
        ConfigDocument::new(name, self.current.fields.clone())
    }

    /// Pretty JSON of `export_config`
    pub fn config_json(&self) -> Result<String, serde_json::Error> {
        self.export_config().to_json()
    }
}
