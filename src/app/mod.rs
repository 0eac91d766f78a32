//! The bridge: activation, command entry points and message pumping
//!
//! A [`Bridge`] owns at most one backend connection. Every component that
//! needs the backend borrows the same `Arc<ExtensionClient>`; none of them
//! opens a connection of its own. Without a connection every command is a
//! no-op.

pub mod commands;

use crate::config::{Config, ConfigError};
use crate::host::Host;
use crate::services::change_watcher::ChangeWatcher;
use crate::services::lsp::stdio::StdioTransport;
use crate::services::lsp::transport::{IncomingMessage, Transport};
use crate::services::lsp::{ClientError, ExtensionClient};
use crate::services::virtual_document::{syntax_tree_uri, VirtualDocumentProvider};
use anyhow::Context;
use commands::{BridgeCommand, CommandOutcome, DocumentFilter, RequestSequencer};
use lsp_types::Uri;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

pub struct Bridge {
    config: Config,
    filter: DocumentFilter,
    client: Option<Arc<ExtensionClient>>,
    /// Behind an async lock so pumping needs only `&self` and can run while
    /// commands are awaiting the backend
    incoming: Mutex<Option<mpsc::UnboundedReceiver<IncomingMessage>>>,
    virtual_document: VirtualDocumentProvider,
    invalidations: mpsc::UnboundedReceiver<Uri>,
    watcher: ChangeWatcher,
    sequencer: RequestSequencer,
}

impl std::fmt::Debug for Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("connected", &self.is_connected())
            .field("virtual_document", &self.virtual_document.uri().as_str())
            .finish()
    }
}

impl Bridge {
    /// Spawn the configured backend, complete the handshake and install the
    /// push handlers.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn activate(config: Config) -> anyhow::Result<Self> {
        config.validate().context("invalid bridge configuration")?;

        let (transport, incoming) = StdioTransport::spawn(&config.server, config.request_timeout())
            .with_context(|| format!("failed to spawn backend {:?}", config.server.command))?;
        transport
            .initialize(config.server.initialization_options.clone())
            .await
            .context("backend initialization failed")?;

        tracing::info!("bridge activated for {} documents", config.language_id);
        let bridge = Self::with_transport(config, Arc::new(transport), incoming)?;
        Ok(bridge)
    }

    /// Build a bridge over an already initialized transport
    pub fn with_transport(
        config: Config,
        transport: Arc<dyn Transport>,
        incoming: mpsc::UnboundedReceiver<IncomingMessage>,
    ) -> Result<Self, ConfigError> {
        let client = Arc::new(ExtensionClient::new(transport));
        Self::build(config, Some(client), Some(incoming))
    }

    /// A bridge with no connection. Every command is skipped and the syntax
    /// tree document shows the placeholder.
    pub fn detached(config: Config) -> Result<Self, ConfigError> {
        Self::build(config, None, None)
    }

    fn build(
        config: Config,
        client: Option<Arc<ExtensionClient>>,
        incoming: Option<mpsc::UnboundedReceiver<IncomingMessage>>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let uri = syntax_tree_uri(&config.virtual_scheme).ok_or_else(|| {
            ConfigError::Validation(format!("bad virtual scheme {:?}", config.virtual_scheme))
        })?;

        let (invalidation_tx, invalidations) = mpsc::unbounded_channel();
        let virtual_document =
            VirtualDocumentProvider::new(uri.clone(), client.clone(), invalidation_tx.clone());
        let watcher = ChangeWatcher::new(
            config.language_id.clone(),
            config.invalidation_delay(),
            config.coalesce_invalidations,
            uri,
            invalidation_tx,
        );

        Ok(Self {
            filter: DocumentFilter {
                language_id: config.language_id.clone(),
                scheme: config.document_scheme.clone(),
            },
            sequencer: RequestSequencer::new(config.drop_stale_responses),
            config,
            client,
            incoming: Mutex::new(incoming),
            virtual_document,
            invalidations,
            watcher,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn is_connected(&self) -> bool {
        self.client.is_some()
    }

    pub fn client(&self) -> Option<&Arc<ExtensionClient>> {
        self.client.as_ref()
    }

    pub fn virtual_document(&self) -> &VirtualDocumentProvider {
        &self.virtual_document
    }

    pub fn syntax_tree_uri(&self) -> &Uri {
        self.virtual_document.uri()
    }

    /// Run a command by value
    pub async fn execute(
        &self,
        command: BridgeCommand,
        host: &dyn Host,
    ) -> Result<CommandOutcome, ClientError> {
        tracing::debug!("running {command}");
        match command {
            BridgeCommand::ShowSyntaxTree => self.show_syntax_tree(host).await,
            BridgeCommand::ExtendSelection => self.extend_selection(host).await,
            BridgeCommand::MatchingBrace => self.find_matching_brace(host).await,
        }
    }

    /// Run a command by its host identifier. Unknown ids are skipped.
    pub async fn execute_id(&self, id: &str, host: &dyn Host) -> Result<CommandOutcome, ClientError> {
        match BridgeCommand::from_id(id) {
            Some(command) => self.execute(command, host).await,
            None => {
                tracing::debug!("unknown command {id}");
                Ok(CommandOutcome::Skipped)
            }
        }
    }

    pub async fn extend_selection(&self, host: &dyn Host) -> Result<CommandOutcome, ClientError> {
        let Some(client) = &self.client else {
            return Ok(CommandOutcome::Skipped);
        };
        commands::extend_selection(client, host, &self.filter, &self.sequencer).await
    }

    pub async fn find_matching_brace(
        &self,
        host: &dyn Host,
    ) -> Result<CommandOutcome, ClientError> {
        let Some(client) = &self.client else {
            return Ok(CommandOutcome::Skipped);
        };
        commands::find_matching_brace(client, host, &self.filter, &self.sequencer).await
    }

    /// Reveal the syntax tree document beside the editor and fill it in
    pub async fn show_syntax_tree(&self, host: &dyn Host) -> Result<CommandOutcome, ClientError> {
        if self.client.is_none() {
            return Ok(CommandOutcome::Skipped);
        }
        commands::show_syntax_tree(host, self.virtual_document.uri());
        self.refresh_virtual_document(host).await?;
        Ok(CommandOutcome::Applied)
    }

    /// Re-read the syntax tree and publish it to the host
    pub async fn refresh_virtual_document(&self, host: &dyn Host) -> Result<(), ClientError> {
        let content = self.virtual_document.read(host).await?;
        host.set_virtual_document_content(self.virtual_document.uri(), content);
        Ok(())
    }

    /// Forward a host edit notification to the change watcher
    pub fn on_document_changed(&mut self, uri: &Uri, language_id: &str) -> bool {
        self.watcher.on_document_changed(uri, language_id)
    }

    pub fn watcher(&self) -> &ChangeWatcher {
        &self.watcher
    }

    /// Wait for the next invalidation of the syntax tree document
    pub async fn next_invalidation(&mut self) -> Option<Uri> {
        self.invalidations.recv().await
    }

    pub fn try_next_invalidation(&mut self) -> Option<Uri> {
        self.invalidations.try_recv().ok()
    }

    /// Handle every server message that has already arrived.
    ///
    /// Returns the number of messages handled.
    pub async fn process_incoming(&self, host: &dyn Host) -> Result<usize, ClientError> {
        let Some(client) = self.client.clone() else {
            return Ok(0);
        };
        let mut incoming = self.incoming.lock().await;
        let Some(incoming) = incoming.as_mut() else {
            return Ok(0);
        };
        let mut handled = 0;
        while let Ok(message) = incoming.try_recv() {
            tracing::trace!("dispatching {}", message.method());
            client.handle_incoming(message, host).await?;
            handled += 1;
        }
        Ok(handled)
    }

    /// Wait for one server message and handle it. Returns false once the
    /// connection is gone.
    pub async fn handle_next_incoming(&self, host: &dyn Host) -> Result<bool, ClientError> {
        let Some(client) = self.client.clone() else {
            return Ok(false);
        };
        let message = {
            let mut incoming = self.incoming.lock().await;
            match incoming.as_mut() {
                Some(incoming) => incoming.recv().await,
                None => return Ok(false),
            }
        };
        match message {
            Some(message) => {
                client.handle_incoming(message, host).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Tear down the connection. A no-op when there is none.
    pub async fn deactivate(&mut self) -> Result<(), ClientError> {
        self.watcher.cancel_all();
        *self.incoming.get_mut() = None;
        self.virtual_document.detach();
        let Some(client) = self.client.take() else {
            return Ok(());
        };
        tracing::info!("deactivating bridge");
        client.stop().await
    }
}
