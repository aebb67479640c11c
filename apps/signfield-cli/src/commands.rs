//! Subcommand implementations. Each returns the JSON printed on stdout.

use anyhow::{bail, Context, Result};
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use signfield_core::naming::{config_file_name, signed_document_name};
use signfield_core::{
    AppMode, DataUrl, DocumentStore, Field, FieldId, FieldPatch, FieldType, NormalizedCoordinate,
};
use signfield_flatten::{export_with_options, ExportOptions};
use signfield_scene::{PageScene, RasterOutcome, RasterScheduler};

use crate::rasterizer::BlankPageRasterizer;

/// Attributes of a field added from the command line
#[derive(Debug)]
pub struct NewField {
    pub field_type: FieldType,
    pub page: u32,
    pub x: f64,
    pub y: f64,
    pub value: Option<String>,
    pub image: Option<PathBuf>,
    pub required: bool,
}

/// Changes to an existing field; `None` leaves an attribute alone
#[derive(Debug, Default)]
pub struct FieldEdit {
    pub value: Option<String>,
    pub image: Option<PathBuf>,
    pub clear_value: bool,
    pub required: Option<bool>,
}

fn document_name(pdf: &Path) -> String {
    pdf.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document.pdf".to_string())
}

fn open_store(mode: AppMode, pdf: &Path, config: Option<&Path>) -> Result<DocumentStore> {
    let bytes = fs::read(pdf).with_context(|| format!("reading {}", pdf.display()))?;
    let config_json = config
        .map(|path| {
            fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
        })
        .transpose()?;
    DocumentStore::open(mode, &document_name(pdf), &bytes, config_json.as_deref())
        .with_context(|| format!("opening {}", pdf.display()))
}

fn save_config(store: &DocumentStore, config: &Path) -> Result<()> {
    let json = store.config_json()?;
    fs::write(config, json).with_context(|| format!("writing {}", config.display()))
}

fn write_output(dir: &Path, name: &str, bytes: &[u8]) -> Result<PathBuf> {
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    let path = dir.join(name);
    fs::write(&path, bytes).with_context(|| format!("writing {}", path.display()))?;
    info!(path = %path.display(), bytes = bytes.len(), "wrote output");
    Ok(path)
}

/// Data URL for an image file, typed by its magic bytes
fn image_data_url(path: &Path) -> Result<String> {
    let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let mime = if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
        "image/png"
    } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        "image/jpeg"
    } else {
        bail!("{} is neither PNG nor JPEG", path.display());
    };
    Ok(DataUrl::encode(mime, &bytes))
}

pub fn inspect(pdf: &Path) -> Result<Value> {
    let store = open_store(AppMode::None, pdf, None)?;
    let snapshot = store.snapshot();
    let Some(document) = &snapshot.document else {
        bail!("no document loaded");
    };

    let pages: Vec<Value> = document
        .pages()
        .iter()
        .enumerate()
        .map(|(idx, size)| {
            json!({
                "page": idx + 1,
                "width": size.width(),
                "height": size.height(),
                "mediaBox": size.media_box,
            })
        })
        .collect();

    Ok(json!({
        "documentName": document.name(),
        "pageCount": document.page_count(),
        "pages": pages,
    }))
}

pub fn add_field(pdf: &Path, config: &Path, new: NewField) -> Result<Value> {
    let existing = config.exists().then_some(config);
    let mut store = open_store(AppMode::Designer, pdf, existing)?;

    let page_count = store
        .snapshot()
        .document
        .as_ref()
        .map(|d| d.page_count())
        .unwrap_or(0);
    if new.page == 0 || new.page > page_count {
        bail!("page {} is outside 1..={}", new.page, page_count);
    }
    let origin = NormalizedCoordinate::new(new.x, new.y)?;

    let value = match (new.image, new.value) {
        (Some(_), _) if !new.field_type.is_image() => {
            bail!("--image only applies to signature and stamp fields")
        }
        (Some(path), _) => Some(image_data_url(&path)?),
        (None, value) => value,
    };

    let mut field = Field::create(new.field_type, new.page, origin.x(), origin.y());
    field.value = value;
    field.required = new.required;
    let id = field.id.clone();
    store.add_field(field);

    save_config(&store, config)?;
    info!(field = %id, config = %config.display(), "field added");

    Ok(json!({
        "id": id,
        "fields": store.snapshot().fields.len(),
        "config": config.display().to_string(),
    }))
}

pub fn set_field(pdf: &Path, config: &Path, id: &str, edit: FieldEdit) -> Result<Value> {
    let mut store = open_store(AppMode::Signer, pdf, Some(config))?;
    let id = FieldId::from(id);
    let Some(field_type) = store.snapshot().field(&id).map(|f| f.field_type) else {
        bail!("no field with id {}", id);
    };

    let value = match (edit.image, edit.value, edit.clear_value) {
        (Some(_), _, _) if !field_type.is_image() => {
            bail!("--image only applies to signature and stamp fields")
        }
        (Some(path), _, _) => Some(Some(image_data_url(&path)?)),
        (None, Some(value), _) => Some(Some(value)),
        (None, None, true) => Some(None),
        (None, None, false) => None,
    };
    let patch = FieldPatch {
        value,
        required: edit.required,
        ..FieldPatch::default()
    };
    if patch.is_empty() {
        bail!("nothing to change for field {}", id);
    }

    store.update_field(&id, &patch);
    save_config(&store, config)?;
    info!(field = %id, config = %config.display(), "field updated");

    let snapshot = store.snapshot();
    Ok(json!({
        "id": id,
        "field": snapshot.field(&id),
        "config": config.display().to_string(),
    }))
}

pub fn remove_field(pdf: &Path, config: &Path, id: &str) -> Result<Value> {
    let mut store = open_store(AppMode::Designer, pdf, Some(config))?;
    let id = FieldId::from(id);
    if store.snapshot().field(&id).is_none() {
        bail!("no field with id {}", id);
    }

    store.remove_field(&id);
    save_config(&store, config)?;
    info!(field = %id, config = %config.display(), "field removed");

    Ok(json!({
        "removed": id,
        "fields": store.snapshot().fields.len(),
        "config": config.display().to_string(),
    }))
}

pub fn export_config(pdf: &Path, config: Option<&Path>, out_dir: &Path) -> Result<Value> {
    let store = open_store(AppMode::Designer, pdf, config)?;
    let exported = store.export_config();
    let json = exported.to_json()?;
    let path = write_output(
        out_dir,
        &config_file_name(&exported.document_name),
        json.as_bytes(),
    )?;

    Ok(json!({
        "path": path.display().to_string(),
        "fields": exported.fields.len(),
    }))
}

pub fn flatten(pdf: &Path, config: &Path, out_dir: &Path, labels: bool) -> Result<Value> {
    let store = open_store(AppMode::Signer, pdf, Some(config))?;
    let snapshot = store.snapshot();
    let Some(document) = snapshot.document.as_ref().filter(|_| snapshot.is_ready()) else {
        bail!("signing needs both a document and a config");
    };

    let options = ExportOptions {
        placeholder_labels: labels,
        ..ExportOptions::default()
    };
    let output = export_with_options(document.bytes(), &snapshot.fields, &options)?;
    for skipped in &output.skipped {
        warn!(field = %skipped.id, "not flattened: {}", skipped.reason);
    }

    let path = write_output(
        out_dir,
        &signed_document_name(document.name()),
        &output.bytes,
    )?;

    Ok(json!({
        "path": path.display().to_string(),
        "drawn": output.drawn,
        "skipped": output.skipped,
    }))
}

pub async fn scene(pdf: &Path, config: Option<&Path>, page: u32, scale: f64) -> Result<Value> {
    let store = open_store(AppMode::Designer, pdf, config)?;
    let snapshot = store.snapshot();
    let pages = snapshot
        .document
        .as_ref()
        .map(|d| d.pages().to_vec())
        .unwrap_or_default();

    let mut scheduler = RasterScheduler::new(BlankPageRasterizer::new(pages), scale);
    let mut page_scene = PageScene::new(page);
    let raster = match page_scene.request_raster(&mut scheduler).outcome().await? {
        RasterOutcome::Ready(raster) => raster,
        RasterOutcome::Canceled => bail!("rasterization of page {} was canceled", page),
    };
    page_scene.attach_viewport(raster.extent, &snapshot)?;

    Ok(json!({
        "page": page,
        "viewport": raster.extent,
        "objects": page_scene.scene().objects(),
    }))
}
