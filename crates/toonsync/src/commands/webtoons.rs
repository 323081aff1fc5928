//! Webtoon command handlers: list, add, edit, chapter, delete.
//!
//! Every handler goes through the `SyncEngine` so listing, cache and
//! notices behave the same as in an interactive front-end.

use tabled::Tabled;
use tokio_util::sync::CancellationToken;

use toonsync_core::LoadOutcome;
use toonsync_core::api::{Webtoon, WebtoonPayload};

use crate::cli::{
    AddArgs, ChapterArgs, DeleteArgs, EditArgs, GlobalOpts, ListArgs, OutputFormat, WebtoonFields,
};
use crate::context::App;
use crate::error::CliError;
use crate::output;

use super::util;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct WebtoonRow {
    #[tabled(rename = "ID")]
    id: u64,
    #[tabled(rename = "Title")]
    title: String,
    #[tabled(rename = "Type")]
    kind: String,
    #[tabled(rename = "Lang")]
    language: String,
    #[tabled(rename = "Chapter")]
    chapter: u32,
    #[tabled(rename = "Rating")]
    rating: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Updated")]
    updated: String,
}

impl From<&Webtoon> for WebtoonRow {
    fn from(w: &Webtoon) -> Self {
        Self {
            id: w.id,
            title: w.title.clone(),
            kind: w.kind.clone(),
            language: w.language.clone(),
            chapter: w.chapter,
            rating: format!("{:.1}", w.rating),
            status: w.status.clone(),
            updated: w
                .updated_at
                .map_or_else(|| "-".into(), |t| t.format("%Y-%m-%d").to_string()),
        }
    }
}

fn detail(w: &Webtoon) -> String {
    [
        format!("ID:        {}", w.id),
        format!("Title:     {}", w.title),
        format!("Type:      {}", w.kind),
        format!("Language:  {}", w.language),
        format!("Chapter:   {}", w.chapter),
        format!("Rating:    {:.1}", w.rating),
        format!("Status:    {}", w.status),
        format!("Last read: {}", w.last_read_date.as_deref().unwrap_or("-")),
        format!("Link:      {}", if w.link.is_empty() { "-" } else { w.link.as_str() }),
        format!("Comment:   {}", w.comment.as_deref().unwrap_or("-")),
    ]
    .join("\n")
}

/// Copy the flags that were given onto `payload`.
fn apply_fields(fields: WebtoonFields, payload: &mut WebtoonPayload) {
    if let Some(kind) = fields.kind {
        payload.kind = kind;
    }
    if let Some(language) = fields.language {
        payload.language = language;
    }
    if let Some(rating) = fields.rating {
        payload.rating = rating;
    }
    if let Some(chapter) = fields.chapter {
        payload.chapter = chapter;
    }
    if let Some(link) = fields.link {
        payload.link = link;
    }
    if let Some(status) = fields.status {
        payload.status = status;
    }
    if fields.last_read_date.is_some() {
        payload.last_read_date = fields.last_read_date;
    }
    if fields.comment.is_some() {
        payload.comment = fields.comment;
    }
    if let Some(image_url) = fields.image_url {
        payload.image_url = image_url;
    }
}

fn new_payload(title: String, fields: WebtoonFields) -> WebtoonPayload {
    let mut payload = WebtoonPayload {
        title,
        kind: "manhwa".into(),
        language: "en".into(),
        rating: 0.0,
        chapter: 1,
        link: String::new(),
        status: "reading".into(),
        last_read_date: None,
        comment: None,
        image_url: String::new(),
    };
    apply_fields(fields, &mut payload);
    payload
}

fn print_webtoon(webtoon: &Webtoon, global: &GlobalOpts) {
    let out = output::render_single(&global.output, webtoon, detail, |w| w.id.to_string());
    output::print_output(&out, global.quiet);
}

// ── Handlers ────────────────────────────────────────────────────────

pub async fn list(app: &App, args: ListArgs, global: &GlobalOpts) -> Result<(), CliError> {
    app.require_session().await?;
    let engine = &app.engine;
    let mut notices = engine.bus().subscribe();

    let search = args.search.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let outcome = match search {
        Some(term) => engine.search_page(term, args.page).await?,
        None if args.page > 1 => engine.go_to_page(args.page).await?,
        None => engine.open().await?,
    };
    if outcome == LoadOutcome::Skipped {
        return Err(CliError::PermissionDenied {
            message: "Your account is not allowed to manage webtoons.".into(),
        });
    }

    if args.all {
        while engine.state().has_more {
            if engine.load_more().await? != LoadOutcome::Applied {
                break;
            }
        }
    }

    let state = engine.state();
    util::flush_notices(&mut notices, global);

    let out = output::render_list(
        &global.output,
        state.items.as_slice(),
        |w| WebtoonRow::from(w),
        |w| w.id.to_string(),
    );
    output::print_output(&out, global.quiet);

    if matches!(global.output, OutputFormat::Table) && !global.quiet {
        let mut footer = format!(
            "Page {} · {} of {} webtoons",
            state.current_page,
            state.items.len(),
            state.total_count
        );
        if state.has_more {
            footer.push_str(&format!(
                " (next: toonsync list --page {})",
                state.current_page + 1
            ));
        }
        eprintln!("{footer}");
    }
    Ok(())
}

pub async fn add(app: &App, args: AddArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let payload: WebtoonPayload = match (args.from_file, args.title) {
        (Some(path), _) => serde_json::from_value(util::read_json_file(&path)?)?,
        (None, Some(title)) => new_payload(title, args.fields),
        (None, None) => {
            return Err(CliError::Validation {
                field: "title".into(),
                reason: "a title or --from-file is required".into(),
            });
        }
    };

    app.require_session().await?;
    let mut notices = app.engine.bus().subscribe();
    let created = app.engine.create(&payload).await?;
    util::flush_notices(&mut notices, global);
    print_webtoon(&created, global);
    Ok(())
}

pub async fn edit(app: &App, args: EditArgs, global: &GlobalOpts) -> Result<(), CliError> {
    app.require_session().await?;
    let current = app
        .client
        .get_webtoon(args.id, &CancellationToken::new())
        .await?;

    let mut payload = WebtoonPayload::from(&current);
    if let Some(title) = args.title {
        payload.title = title;
    }
    apply_fields(args.fields, &mut payload);

    let mut notices = app.engine.bus().subscribe();
    let updated = app.engine.update(args.id, &payload).await?;
    util::flush_notices(&mut notices, global);
    print_webtoon(&updated, global);
    Ok(())
}

pub async fn chapter(app: &App, args: ChapterArgs, global: &GlobalOpts) -> Result<(), CliError> {
    app.require_session().await?;
    let updated = app.engine.adjust_chapter(args.id, args.delta).await?;
    if !global.quiet {
        eprintln!("{}: chapter {}", updated.title, updated.chapter);
    }
    Ok(())
}

pub async fn delete(app: &App, args: DeleteArgs, global: &GlobalOpts) -> Result<(), CliError> {
    if !util::confirm(
        &format!("Delete webtoon {}? This cannot be undone.", args.id),
        "delete",
        global.yes,
    )? {
        return Ok(());
    }

    app.require_session().await?;
    let mut notices = app.engine.bus().subscribe();
    app.engine.delete(args.id).await?;
    util::flush_notices(&mut notices, global);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields() -> WebtoonFields {
        WebtoonFields {
            kind: None,
            language: None,
            rating: None,
            chapter: None,
            link: None,
            status: None,
            last_read_date: None,
            comment: None,
            image_url: None,
        }
    }

    #[test]
    fn new_payload_uses_defaults_for_missing_flags() {
        let payload = new_payload(
            "Omniscient Reader".into(),
            WebtoonFields {
                chapter: Some(42),
                ..fields()
            },
        );
        assert_eq!(payload.title, "Omniscient Reader");
        assert_eq!(payload.chapter, 42);
        assert_eq!(payload.status, "reading");
        assert_eq!(payload.kind, "manhwa");
    }

    #[test]
    fn apply_fields_keeps_unset_values() {
        let mut payload = new_payload("A".into(), fields());
        payload.comment = Some("keep".into());
        apply_fields(
            WebtoonFields {
                status: Some("completed".into()),
                ..fields()
            },
            &mut payload,
        );
        assert_eq!(payload.status, "completed");
        assert_eq!(payload.comment.as_deref(), Some("keep"));
    }
}
