//! # Dex Service
//!
//! Wires the catalog, resolver, collection store, renderer and session
//! registry into the two request paths:
//!
//! - **find**: fuzzy lookup of one entry, rendered as an info card with
//!   catch/release controls
//! - **view**: a navigation session over the paginated grid
//!
//! `handle_event` is the single entry point for a transport. Domain errors
//! are reported to the sink as user-visible text; storage failures are also
//! logged for operators.

mod info;

pub use info::InfoView;

use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;

use crate::catalog::{Catalog, DisplaySubset};
use crate::config::DexConfig;
use crate::error::{DexError, DexResult};
use crate::events::{DexCommand, InboundEvent, Response, ResponseSink, SessionKey};
use crate::render::{AssetCache, AssetSource, DefaultAssetSource, GridConfig, GridRenderer, RenderedPage};
use crate::search::FuzzyResolver;
use crate::session::{ControlAction, DispatchOutcome, NavigationState, SessionRegistry};
use crate::state::{CatchRecord, CollectionStore, DexDb, ReleaseOutcome};

/// What handling an inbound event produced
#[derive(Debug, Clone, PartialEq)]
pub enum EventOutcome {
    /// An info view was sent or updated
    Info(Box<InfoView>),
    /// A navigation session was opened
    Opened(NavigationState),
    /// A navigation control was dispatched
    Navigated(DispatchOutcome),
    /// A user-visible error was reported to the sink
    Reported(String),
    /// Nothing happened (expired session, unknown control)
    Ignored,
}

/// Tunables for assembling a [`Dex`]
#[derive(Debug, Clone)]
pub struct DexOptions {
    pub grid: GridConfig,
    pub fuzzy_threshold: f64,
    pub inactivity: Duration,
}

impl From<&DexConfig> for DexOptions {
    fn from(config: &DexConfig) -> Self {
        Self {
            grid: config.grid.clone(),
            fuzzy_threshold: config.fuzzy_threshold,
            inactivity: config.session_timeout(),
        }
    }
}

/// The dex service
pub struct Dex {
    catalog: Arc<Catalog>,
    subset: Arc<DisplaySubset>,
    resolver: Arc<FuzzyResolver>,
    collection: CollectionStore,
    renderer: Arc<GridRenderer>,
    sessions: SessionRegistry,
}

impl Dex {
    /// Assemble from already-loaded parts
    pub fn new(
        catalog: Catalog,
        subset: DisplaySubset,
        db: &DexDb,
        assets: Arc<dyn AssetSource>,
        options: DexOptions,
    ) -> Self {
        let catalog = Arc::new(catalog);
        let resolver = Arc::new(FuzzyResolver::new(&subset).with_threshold(options.fuzzy_threshold));
        let subset = Arc::new(subset);

        let cache = Arc::new(AssetCache::new(assets, options.grid.cell_size));
        let renderer = Arc::new(GridRenderer::new(
            Arc::clone(&catalog),
            Arc::clone(&subset),
            cache,
            options.grid,
        ));

        let collection = CollectionStore::new(db, Arc::clone(&resolver));
        let sessions = SessionRegistry::new(
            Arc::clone(&renderer),
            collection.clone(),
            Arc::clone(&resolver),
            options.inactivity,
        );

        Self {
            catalog,
            subset,
            resolver,
            collection,
            renderer,
            sessions,
        }
    }

    /// Load the catalog, display subset and database named by the config
    pub async fn bootstrap(config: &DexConfig) -> anyhow::Result<Self> {
        let catalog = Catalog::load(config.resolve(&config.catalog_path))?;
        let subset = DisplaySubset::load(config.resolve(&config.display_path))?;

        let missing = subset
            .names()
            .iter()
            .filter(|name| catalog.get(name).is_none())
            .count();
        if missing > 0 {
            tracing::warn!(missing, "Display subset names missing from catalog");
        }

        let db = DexDb::open_at(config.resolve(&config.db_path))?;
        let assets = DefaultAssetSource::new(config.resolve(&config.asset_dir))
            .context("Failed to build asset source")?;

        let dex = Self::new(catalog, subset, &db, Arc::new(assets), DexOptions::from(config));
        tracing::info!(
            entries = dex.catalog.len(),
            display = dex.subset.len(),
            pages = dex.renderer.total_pages(),
            "Dex ready"
        );
        Ok(dex)
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn subset(&self) -> &DisplaySubset {
        &self.subset
    }

    pub fn resolver(&self) -> &FuzzyResolver {
        &self.resolver
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    pub fn total_pages(&self) -> u32 {
        self.renderer.total_pages()
    }

    /// Fuzzy-find an entry and build its info view
    pub async fn find(&self, query: &str) -> DexResult<InfoView> {
        let found = self
            .resolver
            .resolve(query)
            .ok_or_else(|| self.resolver.not_found(query))?;
        self.info(&found.name).await
    }

    /// Info view for a canonical name
    async fn info(&self, name: &str) -> DexResult<InfoView> {
        let entry = self
            .catalog
            .get(name)
            .cloned()
            .ok_or_else(|| DexError::NotFound {
                query: name.to_string(),
                suggestions: Vec::new(),
            })?;
        let record = self.collection.is_caught(&entry.name).await?;
        Ok(InfoView::new(entry, record))
    }

    pub async fn catch(&self, fragment: &str) -> DexResult<CatchRecord> {
        self.collection.catch(fragment).await
    }

    pub async fn release(&self, fragment: &str) -> DexResult<ReleaseOutcome> {
        self.collection.release(fragment).await
    }

    pub async fn caught(&self) -> DexResult<Vec<CatchRecord>> {
        self.collection.list_caught().await
    }

    /// Open a navigation session at a page number or entry name
    pub async fn view(
        &self,
        key: SessionKey,
        argument: Option<&str>,
        sink: Arc<dyn ResponseSink>,
    ) -> DexResult<NavigationState> {
        self.sessions.open(key, argument, sink).await
    }

    /// Render one page outside any session
    pub async fn render_page(&self, page: u32) -> DexResult<RenderedPage> {
        let caught = self.collection.caught_names().await?;
        self.renderer.render(page, &caught, None).await
    }

    /// Handle one inbound event, reporting domain errors through the sink
    pub async fn handle_event(
        &self,
        event: InboundEvent,
        sink: Arc<dyn ResponseSink>,
    ) -> DexResult<EventOutcome> {
        let result = match event {
            InboundEvent::Command { key, command } => match command {
                DexCommand::View { page } => self
                    .view(key, page.as_deref(), Arc::clone(&sink))
                    .await
                    .map(EventOutcome::Opened),
                DexCommand::Find { query } => match self.find(&query).await {
                    Ok(view) => self
                        .send(&sink, view.response())
                        .await
                        .map(|_| EventOutcome::Info(Box::new(view))),
                    Err(e) => Err(e),
                },
            },
            InboundEvent::Control { key, control_id } => {
                self.handle_control(&key, &control_id, &sink).await
            }
        };

        match result {
            Ok(outcome) => Ok(outcome),
            Err(DexError::Transport(reason)) => Err(DexError::Transport(reason)),
            Err(e) => self.report(e, &sink).await,
        }
    }

    async fn handle_control(
        &self,
        key: &SessionKey,
        control_id: &str,
        sink: &Arc<dyn ResponseSink>,
    ) -> DexResult<EventOutcome> {
        match ControlAction::parse(control_id) {
            Some(action) if action.is_navigation() => {
                let outcome = self.sessions.dispatch(key, control_id).await?;
                Ok(match outcome {
                    DispatchOutcome::Ignored => EventOutcome::Ignored,
                    rendered => EventOutcome::Navigated(rendered),
                })
            }
            Some(action) => self
                .handle_info_control(action, sink.as_ref())
                .await
                .map(|view| EventOutcome::Info(Box::new(view))),
            None => {
                tracing::debug!(key = %key, control_id, "Unrecognised control ignored");
                Ok(EventOutcome::Ignored)
            }
        }
    }

    /// Apply a catch/release control and refresh the info view in place.
    ///
    /// A catch of an already-caught entry still refreshes the view, then
    /// returns `AlreadyCaught` so the caller can tell the user.
    pub async fn handle_info_control(
        &self,
        action: ControlAction,
        sink: &dyn ResponseSink,
    ) -> DexResult<InfoView> {
        let (name, duplicate) = match &action {
            ControlAction::Catch { name } => match self.collection.catch(name).await {
                Ok(record) => (record.name, None),
                Err(DexError::AlreadyCaught(existing)) => (existing.name.clone(), Some(existing)),
                Err(e) => return Err(e),
            },
            ControlAction::Release { name } => (self.collection.release(name).await?.name, None),
            ControlAction::Previous { .. } | ControlAction::Next { .. } => {
                return Err(DexError::SessionExpired)
            }
        };

        let view = self.info(&name).await?;
        sink.update(view.response())
            .await
            .map_err(|e| DexError::Transport(e.to_string()))?;

        match duplicate {
            Some(existing) => Err(DexError::AlreadyCaught(existing)),
            None => Ok(view),
        }
    }

    async fn send(&self, sink: &Arc<dyn ResponseSink>, response: Response) -> DexResult<()> {
        sink.send(response)
            .await
            .map_err(|e| DexError::Transport(e.to_string()))
    }

    /// Tell the user what went wrong; expired sessions stay silent
    async fn report(&self, error: DexError, sink: &Arc<dyn ResponseSink>) -> DexResult<EventOutcome> {
        if error.is_storage_failure() {
            tracing::error!(error = %error, "Storage failure while handling event");
        } else {
            tracing::debug!(error = %error, "Reporting error to user");
        }

        match error.user_message() {
            Some(message) => {
                self.send(sink, Response::text(message.clone()).ephemeral())
                    .await?;
                Ok(EventOutcome::Reported(message))
            }
            None => Ok(EventOutcome::Ignored),
        }
    }
}
