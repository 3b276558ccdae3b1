//! Create/edit modal shared by every admin entity.
//!
//! `Closed -> Creating | Editing -> Submitting -> Closed` on success, back to
//! `Creating | Editing` with field errors on failure.

use crate::controllers::api_client::{ApiClient, ApiOutcome, ApiRequest, FormPart};
use crate::controllers::Effect;
use crate::helper::validation_helpers::{required_message, FieldErrors};
use crate::models::schema::{FieldKind, FieldSpec, ResourceSchema};
use crate::models::{Notification, Record};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormMode {
    Create,
    Edit(i64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormState {
    Closed,
    Creating,
    Editing { id: i64 },
    Submitting(FormMode),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PendingFile {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug)]
pub struct ResourceForm {
    schema: &'static ResourceSchema,
    client: ApiClient,
    state: FormState,
    values: BTreeMap<&'static str, String>,
    uploads: BTreeMap<&'static str, PendingFile>,
    /// URLs of files already attached to the edited record.
    previews: BTreeMap<&'static str, String>,
    removals: BTreeSet<&'static str>,
    errors: FieldErrors,
}

/// Text shown in an input for the stored value.
fn prefill_value(spec: &FieldSpec, value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::Bool(flag)) => (if *flag { "1" } else { "0" }).to_string(),
        Some(Value::String(text)) => text.clone(),
        Some(other) if spec.kind == FieldKind::Responsable => other.to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(other) => other.to_string(),
    }
}

fn blank_value(spec: &FieldSpec) -> String {
    match (spec.kind, spec.default_sql) {
        (FieldKind::Boolean, Some(default)) => default.to_string(),
        (FieldKind::Boolean, None) => "0".to_string(),
        _ => String::new(),
    }
}

impl ResourceForm {
    pub fn new(schema: &'static ResourceSchema, client: ApiClient) -> Self {
        ResourceForm {
            schema,
            client,
            state: FormState::Closed,
            values: BTreeMap::new(),
            uploads: BTreeMap::new(),
            previews: BTreeMap::new(),
            removals: BTreeSet::new(),
            errors: FieldErrors::new(),
        }
    }

    pub fn state(&self) -> FormState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state != FormState::Closed
    }

    pub fn value(&self, field: &str) -> Option<&str> {
        self.values.get(field).map(String::as_str)
    }

    pub fn preview(&self, field: &str) -> Option<&str> {
        self.previews.get(field).map(String::as_str)
    }

    pub fn errors(&self) -> &FieldErrors {
        &self.errors
    }

    fn clear(&mut self) {
        self.values.clear();
        self.uploads.clear();
        self.previews.clear();
        self.removals.clear();
        self.errors.clear();
    }

    fn editable(&self) -> bool {
        matches!(self.state, FormState::Creating | FormState::Editing { .. })
    }

    pub fn open_create(&mut self) {
        if matches!(self.state, FormState::Submitting(_)) {
            return;
        }
        self.clear();
        for spec in self.schema.fields.iter().filter(|f| f.kind != FieldKind::File) {
            self.values.insert(spec.name, blank_value(spec));
        }
        self.state = FormState::Creating;
    }

    pub fn open_edit(&mut self, record: &Record) {
        if matches!(self.state, FormState::Submitting(_)) {
            return;
        }
        self.clear();
        for spec in self.schema.fields {
            let stored = record.fields.get(spec.name);
            if spec.kind == FieldKind::File {
                if let Some(url) = stored.and_then(Value::as_str).filter(|u| !u.is_empty()) {
                    self.previews.insert(spec.name, url.to_string());
                }
            } else {
                self.values.insert(spec.name, prefill_value(spec, stored));
            }
        }
        self.state = FormState::Editing { id: record.id };
    }

    /// Ignored while closed or submitting.
    pub fn close(&mut self) {
        if self.editable() {
            self.clear();
            self.state = FormState::Closed;
        }
    }

    pub fn set_value(&mut self, field: &str, value: impl Into<String>) {
        if !self.editable() {
            return;
        }
        if let Some(spec) = self.schema.field(field).filter(|f| f.kind != FieldKind::File) {
            self.values.insert(spec.name, value.into());
            self.errors.remove(field);
        }
    }

    pub fn attach_file(&mut self, field: &str, file: PendingFile) {
        if !self.editable() {
            return;
        }
        if let Some(spec) = self.schema.field(field).filter(|f| f.kind == FieldKind::File) {
            self.removals.remove(spec.name);
            self.uploads.insert(spec.name, file);
            self.errors.remove(field);
        }
    }

    /// Drops both a pending upload and the stored file of `field`.
    pub fn remove_file(&mut self, field: &str) {
        if !self.editable() {
            return;
        }
        if let Some(spec) = self.schema.field(field).filter(|f| f.kind == FieldKind::File) {
            self.uploads.remove(spec.name);
            if self.previews.remove(spec.name).is_some() {
                self.removals.insert(spec.name);
            }
        }
    }

    fn missing_required(&self) -> FieldErrors {
        let mut errors = FieldErrors::new();
        for spec in self.schema.fields.iter().filter(|f| f.required) {
            let present = match spec.kind {
                FieldKind::File => self.uploads.contains_key(spec.name) || self.previews.contains_key(spec.name),
                FieldKind::Boolean => true,
                _ => self.values.get(spec.name).is_some_and(|v| !v.trim().is_empty()),
            };
            if !present {
                errors.insert(spec.name.to_string(), vec![required_message(spec.label)]);
            }
        }
        errors
    }

    fn parts(&self) -> Vec<(String, FormPart)> {
        let mut parts = Vec::new();
        for spec in self.schema.fields {
            if spec.kind == FieldKind::File {
                if let Some(file) = self.uploads.get(spec.name) {
                    parts.push((
                        spec.name.to_string(),
                        FormPart::File {
                            filename: file.filename.clone(),
                            content_type: file.content_type.clone(),
                            bytes: file.bytes.clone(),
                        },
                    ));
                } else if self.removals.contains(spec.name) {
                    parts.push((format!("remove_{}", spec.name), FormPart::Text("1".to_string())));
                }
            } else if let Some(value) = self.values.get(spec.name) {
                parts.push((spec.name.to_string(), FormPart::Text(value.clone())));
            }
        }
        parts
    }

    /// Builds the request to send, or `None` when the form cannot be sent:
    /// not open, already submitting, or a required field is empty. In the
    /// last case the missing fields get an error each.
    pub fn submit(&mut self) -> Option<ApiRequest> {
        let mode = match self.state {
            FormState::Creating => FormMode::Create,
            FormState::Editing { id } => FormMode::Edit(id),
            _ => return None,
        };
        let missing = self.missing_required();
        if !missing.is_empty() {
            self.errors = missing;
            return None;
        }
        self.errors.clear();
        let request = match mode {
            FormMode::Create => self.client.create(self.schema.slug, self.parts()),
            FormMode::Edit(id) => self.client.update(self.schema.slug, id, self.parts()),
        };
        self.state = FormState::Submitting(mode);
        Some(request)
    }

    /// Feeds the server's answer to a submission.
    pub fn complete(&mut self, outcome: ApiOutcome) -> Vec<Effect> {
        let FormState::Submitting(mode) = self.state else {
            return Vec::new();
        };
        match outcome {
            ApiOutcome::Success { message, .. } => {
                self.clear();
                self.state = FormState::Closed;
                let message = message.unwrap_or_else(|| match mode {
                    FormMode::Create => "Élément créé avec succès.".to_string(),
                    FormMode::Edit(_) => "Élément mis à jour avec succès.".to_string(),
                });
                vec![Effect::RefreshList, Effect::Notify(Notification::success(message))]
            }
            failure => {
                self.state = match mode {
                    FormMode::Create => FormState::Creating,
                    FormMode::Edit(id) => FormState::Editing { id },
                };
                let message = failure.error_message().unwrap_or_default().to_string();
                self.errors = match failure {
                    ApiOutcome::Validation { errors, .. } => errors,
                    _ => FieldErrors::new(),
                };
                vec![Effect::Notify(Notification::error(message))]
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controllers::api_client::{HttpMethod, RequestBody, TRANSPORT_FALLBACK};
    use crate::models::schema::{ACTUALITES, DIRECTIONS, SLIDES};
    use serde_json::json;

    fn record(id: i64, fields: Value) -> Record {
        Record { id, fields: fields.as_object().cloned().unwrap_or_default() }
    }

    fn new_form(schema: &'static ResourceSchema) -> ResourceForm {
        ResourceForm::new(schema, ApiClient::new("tok"))
    }

    #[test]
    fn missing_required_field_blocks_the_request() {
        let mut form = new_form(&ACTUALITES);
        form.open_create();
        assert!(form.submit().is_none());
        assert_eq!(form.state(), FormState::Creating);
        assert_eq!(form.errors()["titre"], vec![required_message("titre")]);

        form.set_value("titre", "Fête de la musique");
        assert!(form.errors().get("titre").is_none());
        let request = form.submit().unwrap();
        assert_eq!(request.method, HttpMethod::Post);
        assert_eq!(request.url, "/admin/api/actualites");
        assert_eq!(request.text_field("titre"), Some("Fête de la musique"));
        assert_eq!(request.text_field("actif"), Some("1"));
        assert_eq!(form.state(), FormState::Submitting(FormMode::Create));
        assert!(form.submit().is_none());
    }

    #[test]
    fn edit_prefills_from_the_record() {
        let mut form = new_form(&ACTUALITES);
        form.open_edit(&record(
            12,
            json!({"titre": "Marché", "category_id": 5, "resume": null, "actif": false, "image": "/media/actualites/a.png"}),
        ));
        assert_eq!(form.state(), FormState::Editing { id: 12 });
        assert_eq!(form.value("category_id"), Some("5"));
        assert_eq!(form.value("resume"), Some(""));
        assert_eq!(form.value("actif"), Some("0"));
        assert_eq!(form.preview("image"), Some("/media/actualites/a.png"));

        let request = form.submit().unwrap();
        assert_eq!(request.url, "/admin/api/actualites/12");
        assert_eq!(request.text_field("_method"), Some("PUT"));
        assert!(request.text_field("image").is_none());
    }

    #[test]
    fn responsable_profile_is_prefilled_as_json() {
        let mut form = new_form(&DIRECTIONS);
        form.open_edit(&record(3, json!({"nom": "Finances", "responsable": {"nom": "A. Sow"}})));
        let prefilled: Value = serde_json::from_str(form.value("responsable").unwrap()).unwrap();
        assert_eq!(prefilled, json!({"nom": "A. Sow"}));
    }

    #[test]
    fn required_file_accepts_existing_preview_or_upload() {
        let mut form = new_form(&SLIDES);
        form.open_create();
        form.set_value("titre", "Bienvenue");
        assert!(form.submit().is_none());
        assert!(form.errors().contains_key("image"));

        form.attach_file(
            "image",
            PendingFile { filename: "s.png".into(), content_type: "image/png".into(), bytes: vec![0x89] },
        );
        let request = form.submit().unwrap();
        match request.body {
            RequestBody::Multipart(parts) => {
                assert!(parts.iter().any(|(name, part)| name == "image" && matches!(part, FormPart::File { .. })));
            }
            other => panic!("unexpected body {:?}", other),
        }

        let mut edit = new_form(&SLIDES);
        edit.open_edit(&record(1, json!({"titre": "A", "image": "/media/slides/x.png"})));
        assert!(edit.submit().is_some());
    }

    #[test]
    fn removing_a_stored_file_sends_removal_flag() {
        let mut form = new_form(&ACTUALITES);
        form.open_edit(&record(2, json!({"titre": "A", "image": "/media/actualites/a.png"})));
        form.remove_file("image");
        assert!(form.preview("image").is_none());
        let request = form.submit().unwrap();
        assert_eq!(request.text_field("remove_image"), Some("1"));
    }

    #[test]
    fn success_closes_clears_and_refreshes() {
        let mut form = new_form(&ACTUALITES);
        form.open_create();
        form.set_value("titre", "A");
        form.submit().unwrap();
        let effects = form.complete(ApiOutcome::Success { message: Some("Créé.".into()), data: Value::Null });
        assert_eq!(effects, vec![Effect::RefreshList, Effect::Notify(Notification::success("Créé."))]);
        assert_eq!(form.state(), FormState::Closed);
        assert!(form.value("titre").is_none());
    }

    #[test]
    fn validation_failure_keeps_the_modal_open() {
        let mut form = new_form(&ACTUALITES);
        form.open_edit(&record(4, json!({"titre": "A"})));
        form.submit().unwrap();
        let mut errors = FieldErrors::new();
        errors.insert("category_id".into(), vec!["Le champ catégorie sélectionné est invalide.".into()]);
        let effects = form.complete(ApiOutcome::Validation { message: "Les données fournies sont invalides.".into(), errors });

        assert_eq!(form.state(), FormState::Editing { id: 4 });
        assert_eq!(form.value("titre"), Some("A"));
        assert!(form.errors().contains_key("category_id"));
        assert_eq!(effects, vec![Effect::Notify(Notification::error("Les données fournies sont invalides."))]);
    }

    #[test]
    fn transport_failure_only_notifies() {
        let mut form = new_form(&ACTUALITES);
        form.open_create();
        form.set_value("titre", "A");
        form.submit().unwrap();
        let effects = form.complete(ApiOutcome::Transport { message: TRANSPORT_FALLBACK.into() });
        assert_eq!(form.state(), FormState::Creating);
        assert!(form.errors().is_empty());
        assert_eq!(effects, vec![Effect::Notify(Notification::error(TRANSPORT_FALLBACK))]);
    }

    #[test]
    fn close_is_ignored_while_submitting() {
        let mut form = new_form(&ACTUALITES);
        form.open_create();
        form.set_value("titre", "A");
        form.submit().unwrap();
        form.close();
        assert_eq!(form.state(), FormState::Submitting(FormMode::Create));
        assert!(form.complete(ApiOutcome::Success { message: None, data: Value::Null }).len() == 2);
        assert!(form.complete(ApiOutcome::Success { message: None, data: Value::Null }).is_empty());
    }
}
