//! tower-lsp `LanguageServer` implementation backed by the compiler bridge.

use std::path::{Path, PathBuf};

use ghul_bridge::{Bridge, BridgeError};
use ghul_config::GhulConfig;
use ghul_types::Document;
use tokio::sync::RwLock;
use tower_lsp::jsonrpc;
use tower_lsp::lsp_types as lsp;
use tower_lsp::{Client, LanguageServer};

use crate::{convert, events, uri};

/// `workspace/executeCommand` name that restarts the compiler's analysis.
pub const RESTART_COMMAND: &str = "ghul.restartCompiler";

/// Position request parameters as a bridge key and position.
fn target(params: &lsp::TextDocumentPositionParams) -> (String, ghul_types::Position) {
    (
        uri::normalize(&params.text_document.uri),
        convert::position(params.position),
    )
}

fn request_error(error: BridgeError) -> jsonrpc::Error {
    tracing::warn!("Request failed: {error}");
    let mut rpc = jsonrpc::Error::internal_error();
    rpc.message = error.to_string().into();
    rpc
}

/// Read every project source. Unreadable files are logged and skipped.
async fn read_sources(config: &GhulConfig, root: &Path) -> Vec<Document> {
    let paths = match config.discover_sources(root) {
        Ok(paths) => paths,
        Err(e) => {
            tracing::warn!("Source discovery failed: {e}");
            return Vec::new();
        }
    };

    let mut documents = Vec::with_capacity(paths.len());
    for path in paths {
        let Some(key) = uri::from_path(&path) else {
            continue;
        };
        match tokio::fs::read_to_string(&path).await {
            Ok(text) => documents.push(Document::new(key, text)),
            Err(e) => tracing::warn!(path = %path.display(), "Skipping unreadable source: {e}"),
        }
    }
    documents
}

pub struct Backend {
    client: Client,
    root: RwLock<Option<PathBuf>>,
    bridge: RwLock<Option<Bridge>>,
}

impl Backend {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            root: RwLock::new(None),
            bridge: RwLock::new(None),
        }
    }

    async fn bridge(&self) -> Option<Bridge> {
        self.bridge.read().await.clone()
    }

    async fn workspace_root(&self) -> PathBuf {
        if let Some(root) = self.root.read().await.clone() {
            return root;
        }
        std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
    }

    async fn queue(&self, key: String, version: Option<i64>, text: String) {
        let Some(bridge) = self.bridge().await else {
            return;
        };
        let queued = match version {
            Some(version) => bridge.queue_versioned_edit(key, version, text).await,
            None => bridge.queue_edit(key, text).await,
        };
        if let Err(e) = queued {
            tracing::warn!("Failed to queue edit: {e}");
        }
    }
}

#[tower_lsp::async_trait]
impl LanguageServer for Backend {
    async fn initialize(&self, params: lsp::InitializeParams) -> jsonrpc::Result<lsp::InitializeResult> {
        let folder = params
            .workspace_folders
            .as_ref()
            .and_then(|folders| folders.first())
            .and_then(|folder| uri::to_path(&folder.uri));
        #[allow(deprecated)]
        let root = folder.or_else(|| params.root_uri.as_ref().and_then(uri::to_path));
        tracing::info!(root = ?root, "Initializing");
        *self.root.write().await = root;

        Ok(lsp::InitializeResult {
            capabilities: lsp::ServerCapabilities {
                text_document_sync: Some(lsp::TextDocumentSyncCapability::Kind(
                    lsp::TextDocumentSyncKind::FULL,
                )),
                hover_provider: Some(lsp::HoverProviderCapability::Simple(true)),
                definition_provider: Some(lsp::OneOf::Left(true)),
                declaration_provider: Some(lsp::DeclarationCapability::Simple(true)),
                implementation_provider: Some(lsp::ImplementationProviderCapability::Simple(
                    true,
                )),
                references_provider: Some(lsp::OneOf::Left(true)),
                document_symbol_provider: Some(lsp::OneOf::Left(true)),
                workspace_symbol_provider: Some(lsp::OneOf::Left(true)),
                rename_provider: Some(lsp::OneOf::Left(true)),
                execute_command_provider: Some(lsp::ExecuteCommandOptions {
                    commands: vec![RESTART_COMMAND.to_string()],
                    work_done_progress_options: Default::default(),
                }),
                completion_provider: Some(lsp::CompletionOptions {
                    trigger_characters: Some(vec![".".to_string()]),
                    resolve_provider: Some(false),
                    ..Default::default()
                }),
                signature_help_provider: Some(lsp::SignatureHelpOptions {
                    trigger_characters: Some(vec!["(".to_string(), ",".to_string()]),
                    retrigger_characters: None,
                    work_done_progress_options: Default::default(),
                }),
                ..Default::default()
            },
            server_info: Some(lsp::ServerInfo {
                name: String::from("ghul-ls"),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
        })
    }

    async fn initialized(&self, _: lsp::InitializedParams) {
        let root = self.workspace_root().await;
        let config = GhulConfig::load(&root);
        let (bridge, bridge_events) = Bridge::spawn(config.bridge_config(&root));
        tokio::spawn(events::forward(self.client.clone(), bridge_events));
        // Edits arriving while sources are read are held by the bridge and
        // win over the text on disk.
        *self.bridge.write().await = Some(bridge.clone());

        let documents = read_sources(&config, &root).await;
        tracing::info!(root = %root.display(), documents = documents.len(), "Starting analysis");
        if let Err(e) = bridge.start(documents).await {
            tracing::error!("Failed to start bridge: {e}");
        }
    }

    async fn shutdown(&self) -> jsonrpc::Result<()> {
        if let Some(bridge) = self.bridge.write().await.take()
            && let Err(e) = bridge.shutdown().await
        {
            tracing::debug!("Bridge already stopped: {e}");
        }
        Ok(())
    }

    async fn did_open(&self, params: lsp::DidOpenTextDocumentParams) {
        let document = params.text_document;
        let key = uri::normalize(&document.uri);
        self.queue(key, Some(i64::from(document.version)), document.text)
            .await;
    }

    async fn did_change(&self, params: lsp::DidChangeTextDocumentParams) {
        let key = uri::normalize(&params.text_document.uri);
        // Full sync: the last change holds the whole document.
        if let Some(change) = params.content_changes.into_iter().last() {
            self.queue(key, Some(i64::from(params.text_document.version)), change.text)
                .await;
        }
    }

    /// The compiler analyses the whole project, so a closed buffer falls back
    /// to the text on disk.
    async fn did_close(&self, params: lsp::DidCloseTextDocumentParams) {
        let url = params.text_document.uri;
        let Some(path) = uri::to_path(&url) else {
            return;
        };
        match tokio::fs::read_to_string(&path).await {
            Ok(text) => self.queue(uri::normalize(&url), None, text).await,
            Err(e) => tracing::debug!(path = %path.display(), "Not reloading closed document: {e}"),
        }
    }

    async fn did_change_configuration(&self, _: lsp::DidChangeConfigurationParams) {
        let Some(bridge) = self.bridge().await else {
            return;
        };
        let root = self.workspace_root().await;
        let config = GhulConfig::load(&root);
        tracing::info!("Configuration changed; restarting compiler");
        if let Err(e) = bridge.restart(config.bridge_config(&root)).await {
            tracing::warn!("Failed to restart bridge: {e}");
        }
    }

    async fn execute_command(
        &self,
        params: lsp::ExecuteCommandParams,
    ) -> jsonrpc::Result<Option<serde_json::Value>> {
        if params.command != RESTART_COMMAND {
            return Err(jsonrpc::Error::invalid_params(format!(
                "unknown command `{}`",
                params.command
            )));
        }
        if let Some(bridge) = self.bridge().await
            && let Err(e) = bridge.request_compiler_restart().await
        {
            tracing::warn!("Failed to request compiler restart: {e}");
        }
        Ok(None)
    }

    async fn hover(&self, params: lsp::HoverParams) -> jsonrpc::Result<Option<lsp::Hover>> {
        let Some(bridge) = self.bridge().await else {
            return Ok(None);
        };
        let (key, position) = target(&params.text_document_position_params);
        let hover = bridge.hover(key, position).await.map_err(request_error)?;
        Ok(hover.map(convert::hover))
    }

    async fn goto_definition(
        &self,
        params: lsp::GotoDefinitionParams,
    ) -> jsonrpc::Result<Option<lsp::GotoDefinitionResponse>> {
        let Some(bridge) = self.bridge().await else {
            return Ok(None);
        };
        let (key, position) = target(&params.text_document_position_params);
        let location = bridge
            .definition(key, position)
            .await
            .map_err(request_error)?;
        Ok(location
            .as_ref()
            .and_then(convert::location)
            .map(lsp::GotoDefinitionResponse::Scalar))
    }

    async fn goto_declaration(
        &self,
        params: lsp::request::GotoDeclarationParams,
    ) -> jsonrpc::Result<Option<lsp::request::GotoDeclarationResponse>> {
        let Some(bridge) = self.bridge().await else {
            return Ok(None);
        };
        let (key, position) = target(&params.text_document_position_params);
        let location = bridge
            .declaration(key, position)
            .await
            .map_err(request_error)?;
        Ok(location
            .as_ref()
            .and_then(convert::location)
            .map(lsp::GotoDefinitionResponse::Scalar))
    }

    async fn goto_implementation(
        &self,
        params: lsp::request::GotoImplementationParams,
    ) -> jsonrpc::Result<Option<lsp::request::GotoImplementationResponse>> {
        let Some(bridge) = self.bridge().await else {
            return Ok(None);
        };
        let (key, position) = target(&params.text_document_position_params);
        let locations = bridge
            .implementation(key, position)
            .await
            .map_err(request_error)?;
        let locations = convert::locations(&locations);
        Ok((!locations.is_empty()).then_some(lsp::GotoDefinitionResponse::Array(locations)))
    }

    async fn references(
        &self,
        params: lsp::ReferenceParams,
    ) -> jsonrpc::Result<Option<Vec<lsp::Location>>> {
        let Some(bridge) = self.bridge().await else {
            return Ok(None);
        };
        let (key, position) = target(&params.text_document_position);
        let locations = bridge
            .references(key, position)
            .await
            .map_err(request_error)?;
        Ok(Some(convert::locations(&locations)))
    }

    async fn completion(
        &self,
        params: lsp::CompletionParams,
    ) -> jsonrpc::Result<Option<lsp::CompletionResponse>> {
        let Some(bridge) = self.bridge().await else {
            return Ok(None);
        };
        let (key, position) = target(&params.text_document_position);
        let items = bridge
            .completion(key, position)
            .await
            .map_err(request_error)?;
        let items = items.into_iter().map(convert::completion).collect();
        Ok(Some(lsp::CompletionResponse::Array(items)))
    }

    async fn signature_help(
        &self,
        params: lsp::SignatureHelpParams,
    ) -> jsonrpc::Result<Option<lsp::SignatureHelp>> {
        let Some(bridge) = self.bridge().await else {
            return Ok(None);
        };
        let (key, position) = target(&params.text_document_position_params);
        let help = bridge
            .signature_help(key, position)
            .await
            .map_err(request_error)?;
        Ok(help.map(convert::signature_help))
    }

    async fn document_symbol(
        &self,
        params: lsp::DocumentSymbolParams,
    ) -> jsonrpc::Result<Option<lsp::DocumentSymbolResponse>> {
        let Some(bridge) = self.bridge().await else {
            return Ok(None);
        };
        let key = uri::normalize(&params.text_document.uri);
        let symbols = bridge
            .document_symbols(key)
            .await
            .map_err(request_error)?;
        Ok(Some(lsp::DocumentSymbolResponse::Flat(convert::symbols(
            symbols,
        ))))
    }

    async fn symbol(
        &self,
        _: lsp::WorkspaceSymbolParams,
    ) -> jsonrpc::Result<Option<Vec<lsp::SymbolInformation>>> {
        let Some(bridge) = self.bridge().await else {
            return Ok(None);
        };
        let symbols = bridge.workspace_symbols().await.map_err(request_error)?;
        Ok(Some(convert::symbols(symbols)))
    }

    async fn rename(&self, params: lsp::RenameParams) -> jsonrpc::Result<Option<lsp::WorkspaceEdit>> {
        let Some(bridge) = self.bridge().await else {
            return Ok(None);
        };
        let (key, position) = target(&params.text_document_position);
        let edit = bridge
            .rename(key, position, params.new_name)
            .await
            .map_err(request_error)?;
        Ok(edit.map(convert::workspace_edit))
    }
}
