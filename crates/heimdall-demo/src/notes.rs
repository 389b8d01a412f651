//! Notes: an in-memory store whose new entries are pushed to every open
//! page over the `notes` topic.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use heimdall_bifrost::Bifrost;
use heimdall_core::Html;
use heimdall_core::html::escape;
use heimdall_server::{ActionRegistry, Payload, RegistrationError, Service};
use serde::Deserialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Topic new notes are published on.
pub const NOTES_TOPIC: &str = "notes";

/// How long a published note stays deliverable.
const NOTE_MESSAGE_TTL: Duration = Duration::from_secs(30);

/// One note.
#[derive(Clone, Debug)]
pub struct Note {
    /// Stable id.
    pub id: String,
    /// Title, 5 to 100 characters.
    pub title: String,
    /// Body, 5 to 200 characters.
    pub body: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last edit, if any.
    pub updated_at: Option<DateTime<Utc>>,
}

/// Concurrent in-memory note store.
#[derive(Debug, Default)]
pub struct NoteService {
    store: DashMap<String, Note>,
}

impl NoteService {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Newest first.
    pub fn all(&self) -> Vec<Note> {
        let mut notes: Vec<Note> = self.store.iter().map(|e| e.value().clone()).collect();
        notes.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        notes
    }

    /// One page of [`all`](Self::all).
    pub fn page(&self, offset: usize, size: usize) -> Vec<Note> {
        self.all().into_iter().skip(offset).take(size).collect()
    }

    /// Look up one note.
    pub fn get(&self, id: &str) -> Option<Note> {
        self.store.get(id).map(|n| n.value().clone())
    }

    /// Store a new note.
    pub fn create(&self, title: &str, body: &str) -> Note {
        let note = Note {
            id: uuid::Uuid::now_v7().to_string(),
            title: title.to_string(),
            body: body.to_string(),
            created_at: Utc::now(),
            updated_at: None,
        };
        let _ = self.store.insert(note.id.clone(), note.clone());
        note
    }

    /// Edit a note. False when it does not exist.
    pub fn update(&self, id: &str, title: &str, body: &str) -> bool {
        match self.store.get_mut(id) {
            Some(mut note) => {
                note.title = title.to_string();
                note.body = body.to_string();
                note.updated_at = Some(Utc::now());
                true
            }
            None => false,
        }
    }

    /// Remove a note. False when it did not exist.
    pub fn delete(&self, id: &str) -> bool {
        self.store.remove(id).is_some()
    }

    /// Number of stored notes.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// True when nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CreateNoteRequest {
    title: String,
    content: String,
}

impl CreateNoteRequest {
    fn validate(&self) -> Result<(), &'static str> {
        let title = self.title.trim().chars().count();
        let content = self.content.trim().chars().count();
        if !(5..=100).contains(&title) {
            return Err("Title must be between 5 and 100 characters.");
        }
        if !(5..=200).contains(&content) {
            return Err("Content must be between 5 and 200 characters.");
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct NotesPageRequest {
    offset: usize,
    size: usize,
}

impl Default for NotesPageRequest {
    fn default() -> Self {
        Self { offset: 0, size: 20 }
    }
}

#[derive(Debug, Deserialize)]
struct NoteIdRequest {
    id: String,
}

/// Register the `Notes.*` actions.
pub fn register(registry: &mut ActionRegistry) -> Result<(), RegistrationError> {
    let _ = registry
        .register_sync(
            "Notes.Page",
            |Service(notes): Service<NoteService>, Payload(req): Payload<NotesPageRequest>| {
                render_page(&notes, &req)
            },
        )?
        .register(
            "Notes.Create",
            |Service(notes): Service<NoteService>,
             Service(bifrost): Service<Bifrost>,
             Payload(req): Payload<CreateNoteRequest>,
             cancel: CancellationToken| async move {
                if let Err(message) = req.validate() {
                    return Ok::<_, anyhow::Error>(render_alert(message));
                }
                let note = notes.create(req.title.trim(), req.content.trim());
                let report = bifrost.publish(
                    NOTES_TOPIC,
                    render_note_oob(&note),
                    NOTE_MESSAGE_TTL,
                    &cancel,
                )?;
                debug!(note = %note.id, delivered = report.delivered, "note created");
                Ok::<_, anyhow::Error>(Html::raw(
                    r#"<div class="alert alert-success">Note saved.</div>"#,
                ))
            },
        )?
        .register_sync(
            "Notes.Delete",
            |Service(notes): Service<NoteService>, Payload(req): Payload<NoteIdRequest>| {
                let _ = notes.delete(&req.id);
            },
        )?;
    Ok(())
}

fn render_note(note: &Note) -> Html {
    Html::raw(format!(
        r#"<li class="list-group-item" id="note-{id}"><div class="fw-semibold">{title}</div><div class="small text-muted">{body}</div><div class="small text-muted">{created}</div></li>"#,
        id = escape(&note.id),
        title = escape(&note.title),
        body = escape(&note.body),
        created = note.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
    ))
}

/// Wrap a note so the client prepends it to the list.
fn render_note_oob(note: &Note) -> Html {
    Html::raw(r##"<template heimdall-oob="true" heimdall-content-target="#notes-list" heimdall-content-swap="afterbegin">"##)
        .append(render_note(note))
        .append("</template>")
}

fn render_page(notes: &NoteService, req: &NotesPageRequest) -> Html {
    let size = req.size.clamp(1, 100);
    let page = notes.page(req.offset, size);
    let mut html = page.iter().fold(Html::empty(), |acc, n| acc.append(render_note(n)));
    if page.len() == size {
        html = html.append(format!(
            r#"<li class="d-none" data-next-offset="{}"></li>"#,
            req.offset + size
        ));
    }
    html
}

fn render_alert(message: &str) -> Html {
    Html::raw(r#"<div class="alert alert-warning">"#)
        .append(Html::text(message))
        .append("</div>")
}

/// Seed the store with `count` notes in the background.
pub fn spawn_loader(
    notes: Arc<NoteService>,
    count: usize,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        for n in 1..=count {
            if cancel.is_cancelled() {
                debug!(loaded = n - 1, "note loader cancelled");
                return;
            }
            let _ = notes.create(&format!("Note {n}"), &format!("I'm dummy note number {n}."));
            if n % 100 == 0 {
                tokio::task::yield_now().await;
            }
        }
        info!(count, "dummy notes loaded");
    })
}
