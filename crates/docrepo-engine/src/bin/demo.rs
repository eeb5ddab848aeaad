//! Scripted session against the in-memory API.
//!
//! Walks through a single edit, a spreadsheet save with one failing row,
//! a retry pass, an upload and the trash/restore cycle, printing every
//! event the engine publishes as a JSON line.
//!
//! Environment variables:
//!   RUST_LOG  - standard env filter (default: "info")
//!   LOG_ANSI  - "true"/"false" override ANSI colors
//!   DOCREPO_* - repository configuration, see `RepositoryConfig::from_env`

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::broadcast;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use docrepo_core::mock::{ApiOperation, MockDocumentApi};
use docrepo_core::{
    Document, DocumentStatus, Error, EventEnvelope, MetadataField, RepositoryConfig, StatusFilter,
    UploadFile, EXCERPT_FIELD,
};
use docrepo_engine::DocumentListOrchestrator;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let log_ansi = std::env::var("LOG_ANSI")
        .ok()
        .map(|v| v == "true" || v == "1");
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    let mut layer = tracing_subscriber::fmt::layer();
    if let Some(ansi) = log_ansi {
        layer = layer.with_ansi(ansi);
    }
    tracing_subscriber::registry()
        .with(env_filter)
        .with(layer)
        .init();

    let config = RepositoryConfig::from_env();
    let api = MockDocumentApi::new()
        .with_fields([
            MetadataField::taxonomy("category", "Category", ["Policy", "Guideline", "Form"]),
            MetadataField::date("published_on", "Published").with_order(1),
            MetadataField::text("owner", "Owner").with_order(2),
        ])
        .with_documents([
            Document::new(1, "Travel policy")
                .with_meta("category", "Policy")
                .with_excerpt("Rules for official travel."),
            Document::new(2, "Expense guideline").with_meta("category", "Guideline"),
            Document::new(3, "Leave request form").with_meta("category", "Form"),
            Document::new(4, "Retired handbook").with_status(DocumentStatus::Trashed),
        ]);

    let list = DocumentListOrchestrator::new(Arc::new(api.clone()), config)
        .context("invalid repository configuration")?;
    let mut events = list.subscribe();

    list.load_fields().await?;
    list.refresh().await?;
    info!(documents = list.documents().len(), "Session started");

    // Single edit: excerpt only
    list.begin_edit(2)?;
    list.engine()
        .update_field(EXCERPT_FIELD, "How to claim expenses.");
    println!("single save: {:?}", list.save_single().await);
    drain(&mut events)?;

    // Spreadsheet save where one row fails
    api.set_failure(
        ApiOperation::PatchMetadata,
        Some(3),
        Error::Server {
            status: 503,
            message: Some("Service unavailable".to_string()),
        },
    );
    list.toggle_spreadsheet_mode()?;
    list.engine().update_bulk_field(1, "category", "guideline")?;
    list.engine().update_bulk_field(3, "owner", "HR")?;
    println!("bulk save: {:?}", list.save_bulk().await);
    println!("retry queue: {}", list.errors().queued());
    drain(&mut events)?;

    api.clear_failures();
    println!("retry: {:?}", list.retry_all().await);
    drain(&mut events)?;

    let created = list
        .upload_files(
            vec![UploadFile::new(
                "Onboarding checklist.pdf",
                "application/pdf",
                b"%PDF-1.7".to_vec(),
            )],
            None,
        )
        .await;
    println!("uploaded: {:?}", created.iter().map(|d| d.id).collect::<Vec<_>>());
    drain(&mut events)?;

    list.select(1, true);
    list.lifecycle().open_bulk_delete();
    println!("trash selected: {:?}", list.delete_selected().await);
    list.change_filter(StatusFilter::Trash).await?;
    println!("restore: {:?}", list.restore_document(1).await);
    drain(&mut events)?;

    list.change_filter(StatusFilter::All).await?;
    println!("{}", serde_json::to_string_pretty(&list.rows())?);
    println!("{}", serde_json::to_string_pretty(&list.toolbar())?);
    Ok(())
}

/// Print every event received so far.
fn drain(events: &mut broadcast::Receiver<EventEnvelope>) -> anyhow::Result<()> {
    loop {
        match events.try_recv() {
            Ok(envelope) => println!("{}", serde_json::to_string(&envelope)?),
            Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                println!("(skipped {} events)", skipped);
            }
            Err(_) => return Ok(()),
        }
    }
}
