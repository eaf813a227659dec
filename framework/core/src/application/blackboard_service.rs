// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Blackboard Service - Application Layer
//!
//! Runs one board as a single-writer actor: a tokio task owns the
//! [`BlackboardGrainState`] and its [`LogicalTypeHandlers`] and processes
//! messages from an mpsc mailbox one at a time. Callers talk to it through a
//! cloneable [`BlackboardHandle`] and receive replies over oneshot channels.
//!
//! # Command pipeline
//!
//! Every top-level command runs inside a root [`CommandExecutionContext`].
//! Sub-commands produced by the storage controller run in child contexts that
//! share the root queue. When the command succeeds the queued events are
//! published in enqueue order and the board state is persisted if it changed.
//! When it fails the in-memory state is restored to its value before the
//! command and the queued events are dropped.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Owns:** one board's grain state and handler set
//! - **Collaborators:** `RecordRepositoryFactory`, `BlackboardStateRepository`,
//!   `BlackboardStorageController`, `EventBus`, `Clock`

use futures::future::{BoxFuture, FutureExt};
use metrics::counter;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::application::storage_controller::BlackboardStorageController;
use crate::domain::blackboard::board::BlackboardId;
use crate::domain::blackboard::command_context::CommandExecutionContext;
use crate::domain::blackboard::commands::BlackboardCommand;
use crate::domain::blackboard::error::BlackboardError;
use crate::domain::blackboard::events::{BlackboardEvent, StorageAction};
use crate::domain::blackboard::handler::LogicalTypeHandlers;
use crate::domain::blackboard::issues::ProcessingIssue;
use crate::domain::blackboard::query::{BlackboardDeferredQueryState, SignalSubscription};
use crate::domain::blackboard::record::{DataRecordContainer, RecordCustomMetadata, RecordMetadata, RecordStatus};
use crate::domain::blackboard::rules::compile_pattern;
use crate::domain::blackboard::state::{BlackboardGrainState, BlackboardGrainStateSurrogate, BlackboardLifeStatus};
use crate::domain::blackboard::template::BlackboardTemplate;
use crate::domain::blackboard::validators::ValidatorProvider;
use crate::domain::clock::Clock;
use crate::domain::repository::{BlackboardStateRepository, RecordRepository, RecordRepositoryFactory};
use crate::infrastructure::event_bus::EventBus;

const BOARD_MAILBOX_CAPACITY: usize = 256;

type BoardContext = CommandExecutionContext<BlackboardEvent>;
type Reply<T> = oneshot::Sender<Result<T, BlackboardError>>;

/// Services shared by every board actor of a node.
pub struct BlackboardRuntime {
    pub clock: Arc<dyn Clock>,
    pub record_repositories: Arc<dyn RecordRepositoryFactory>,
    pub state_repository: Arc<dyn BlackboardStateRepository>,
    pub controller: Arc<dyn BlackboardStorageController>,
    pub event_bus: EventBus,
    /// Deepest allowed nesting of sub-command contexts.
    pub max_command_depth: usize,
}

enum BoardMessage {
    Build {
        template: BlackboardTemplate,
        reply: Reply<()>,
    },
    Initialize {
        records: Vec<DataRecordContainer>,
        reply: Reply<()>,
    },
    Execute {
        command: BlackboardCommand,
        reply: Reply<()>,
    },
    GetAllMetadata {
        logical_type: Option<String>,
        status: Option<RecordStatus>,
        reply: Reply<Vec<RecordMetadata>>,
    },
    GetRecords {
        uids: Vec<Uuid>,
        reply: Reply<Vec<DataRecordContainer>>,
    },
    AddOrUpdateQuery {
        query: BlackboardDeferredQueryState,
        reply: Reply<bool>,
    },
    RemoveQuery {
        uid: Uuid,
        reply: Reply<Option<BlackboardDeferredQueryState>>,
    },
    GetQueries {
        reply: Reply<Vec<BlackboardDeferredQueryState>>,
    },
    Subscribe {
        subscription: SignalSubscription,
        reply: Reply<bool>,
    },
    Unsubscribe {
        subscription_id: Uuid,
        reply: Reply<Option<SignalSubscription>>,
    },
    GetSubscriptions {
        reply: Reply<Vec<SignalSubscription>>,
    },
    Snapshot {
        reply: Reply<BlackboardGrainStateSurrogate>,
    },
}

/// Client side of a board actor.
#[derive(Clone)]
pub struct BlackboardHandle {
    id: BlackboardId,
    sender: mpsc::Sender<BoardMessage>,
    cancel: CancellationToken,
}

impl std::fmt::Debug for BlackboardHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlackboardHandle")
            .field("id", &self.id)
            .field("closed", &self.sender.is_closed())
            .finish()
    }
}

impl BlackboardHandle {
    pub fn id(&self) -> &BlackboardId {
        &self.id
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed() || self.cancel.is_cancelled()
    }

    /// Stop the actor once its current message is handled.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    async fn request<T>(&self, make: impl FnOnce(Reply<T>) -> BoardMessage) -> Result<T, BlackboardError> {
        let (reply, response) = oneshot::channel();
        self.sender
            .send(make(reply))
            .await
            .map_err(|_| BlackboardError::Unavailable(self.id.board_name.clone()))?;
        response
            .await
            .map_err(|_| BlackboardError::Unavailable(self.id.board_name.clone()))?
    }

    /// Bind (or rebind) the board to `template`.
    pub async fn build(&self, template: BlackboardTemplate) -> Result<(), BlackboardError> {
        self.request(|reply| BoardMessage::Build { template, reply }).await
    }

    /// Move a board waiting for initialization to `Running` and push `records`.
    pub async fn initialize(&self, records: Vec<DataRecordContainer>) -> Result<(), BlackboardError> {
        self.request(|reply| BoardMessage::Initialize { records, reply }).await
    }

    pub async fn execute(&self, command: BlackboardCommand) -> Result<(), BlackboardError> {
        self.request(|reply| BoardMessage::Execute { command, reply }).await
    }

    /// Push a new record; an existing uid is a conflict.
    pub async fn push(&self, record: DataRecordContainer) -> Result<(), BlackboardError> {
        self.execute(BlackboardCommand::add(record)).await
    }

    pub async fn push_or_replace(&self, record: DataRecordContainer) -> Result<(), BlackboardError> {
        self.execute(BlackboardCommand::add_or_replace(record)).await
    }

    pub async fn prepare_slot(
        &self,
        uid: Uuid,
        logical_type: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Result<(), BlackboardError> {
        self.execute(BlackboardCommand::PrepareSlot {
            uid,
            logical_type: logical_type.into(),
            display_name: display_name.into(),
        })
        .await
    }

    pub async fn remove(&self, uid: Uuid) -> Result<(), BlackboardError> {
        self.execute(BlackboardCommand::RemoveRecord { uid }).await
    }

    pub async fn decommission(&self, uid: Uuid) -> Result<(), BlackboardError> {
        self.execute(BlackboardCommand::DecommissionRecord { uid }).await
    }

    pub async fn change_status(&self, uid: Uuid, status: RecordStatus) -> Result<(), BlackboardError> {
        self.execute(BlackboardCommand::ChangeStatus { uid, status }).await
    }

    pub async fn change_metadata(&self, uid: Uuid, metadata: Option<RecordCustomMetadata>) -> Result<(), BlackboardError> {
        self.execute(BlackboardCommand::ChangeMetaData { uid, metadata }).await
    }

    pub async fn seal(&self) -> Result<(), BlackboardError> {
        self.execute(BlackboardCommand::Seal).await
    }

    /// Metadata sorted by creation time, optionally filtered by a logical
    /// type pattern and a status.
    pub async fn get_all_metadata(
        &self,
        logical_type: Option<&str>,
        status: Option<RecordStatus>,
    ) -> Result<Vec<RecordMetadata>, BlackboardError> {
        let logical_type = logical_type.map(str::to_string);
        self.request(|reply| BoardMessage::GetAllMetadata {
            logical_type,
            status,
            reply,
        })
        .await
    }

    /// Load records from their repositories, in the order of `uids`.
    /// Unknown uids are skipped.
    pub async fn get_records(&self, uids: &[Uuid]) -> Result<Vec<DataRecordContainer>, BlackboardError> {
        let uids = uids.to_vec();
        self.request(|reply| BoardMessage::GetRecords { uids, reply }).await
    }

    pub async fn add_or_update_query(&self, query: BlackboardDeferredQueryState) -> Result<bool, BlackboardError> {
        self.request(|reply| BoardMessage::AddOrUpdateQuery { query, reply }).await
    }

    pub async fn remove_query(&self, uid: Uuid) -> Result<Option<BlackboardDeferredQueryState>, BlackboardError> {
        self.request(|reply| BoardMessage::RemoveQuery { uid, reply }).await
    }

    pub async fn get_queries(&self) -> Result<Vec<BlackboardDeferredQueryState>, BlackboardError> {
        self.request(|reply| BoardMessage::GetQueries { reply }).await
    }

    pub async fn subscribe(&self, subscription: SignalSubscription) -> Result<bool, BlackboardError> {
        self.request(|reply| BoardMessage::Subscribe { subscription, reply }).await
    }

    pub async fn unsubscribe(&self, subscription_id: Uuid) -> Result<Option<SignalSubscription>, BlackboardError> {
        self.request(|reply| BoardMessage::Unsubscribe { subscription_id, reply })
            .await
    }

    pub async fn subscriptions(&self) -> Result<Vec<SignalSubscription>, BlackboardError> {
        self.request(|reply| BoardMessage::GetSubscriptions { reply }).await
    }

    /// Durable view of the current state.
    pub async fn snapshot(&self) -> Result<BlackboardGrainStateSurrogate, BlackboardError> {
        self.request(|reply| BoardMessage::Snapshot { reply }).await
    }

    pub async fn life_status(&self) -> Result<BlackboardLifeStatus, BlackboardError> {
        Ok(self.snapshot().await?.life_status)
    }
}

/// Start the actor of board `id` over `state`.
///
/// A state that already carries a template gets its handlers rebuilt before
/// the first message is processed.
pub fn spawn_board(
    id: BlackboardId,
    state: BlackboardGrainState,
    runtime: Arc<BlackboardRuntime>,
    cancel: CancellationToken,
) -> Result<BlackboardHandle, BlackboardError> {
    let provider = ValidatorProvider::new();
    let handlers = match state.template() {
        Some(template) => Some(LogicalTypeHandlers::build(template, &provider, None)?),
        None => None,
    };

    let (sender, receiver) = mpsc::channel(BOARD_MAILBOX_CAPACITY);
    let actor = BlackboardActor {
        id: id.clone(),
        state,
        handlers,
        provider,
        runtime,
        cancel: cancel.clone(),
    };
    tokio::spawn(actor.run(receiver));

    Ok(BlackboardHandle { id, sender, cancel })
}

struct BlackboardActor {
    id: BlackboardId,
    state: BlackboardGrainState,
    handlers: Option<LogicalTypeHandlers>,
    provider: ValidatorProvider,
    runtime: Arc<BlackboardRuntime>,
    cancel: CancellationToken,
}

impl BlackboardActor {
    async fn run(mut self, mut receiver: mpsc::Receiver<BoardMessage>) {
        debug!(board_id = %self.id, "Board actor started");
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    debug!(board_id = %self.id, "Board actor cancelled");
                    break;
                }
                message = receiver.recv() => match message {
                    Some(message) => self.handle_message(message).await,
                    None => break,
                },
            }
        }
        debug!(board_id = %self.id, "Board actor stopped");
    }

    async fn handle_message(&mut self, message: BoardMessage) {
        // A dropped reply receiver only means the caller stopped waiting.
        match message {
            BoardMessage::Build { template, reply } => {
                let _ = reply.send(self.build(template).await);
            }
            BoardMessage::Initialize { records, reply } => {
                let _ = reply.send(self.initialize(records).await);
            }
            BoardMessage::Execute { command, reply } => {
                let _ = reply.send(self.execute_top_level(command).await);
            }
            BoardMessage::GetAllMetadata {
                logical_type,
                status,
                reply,
            } => {
                let _ = reply.send(self.get_all_metadata(logical_type.as_deref(), status));
            }
            BoardMessage::GetRecords { uids, reply } => {
                let _ = reply.send(self.get_records(&uids).await);
            }
            BoardMessage::AddOrUpdateQuery { query, reply } => {
                let _ = reply.send(self.add_or_update_query(query).await);
            }
            BoardMessage::RemoveQuery { uid, reply } => {
                let _ = reply.send(self.remove_query(uid).await);
            }
            BoardMessage::GetQueries { reply } => {
                let _ = reply.send(Ok(self.state.get_queries()));
            }
            BoardMessage::Subscribe { subscription, reply } => {
                let _ = reply.send(self.subscribe(subscription).await);
            }
            BoardMessage::Unsubscribe { subscription_id, reply } => {
                let _ = reply.send(self.unsubscribe(subscription_id).await);
            }
            BoardMessage::GetSubscriptions { reply } => {
                let _ = reply.send(Ok(self.state.subscriptions().to_vec()));
            }
            BoardMessage::Snapshot { reply } => {
                let _ = reply.send(Ok(self.state.to_surrogate()));
            }
        }
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    async fn build(&mut self, template: BlackboardTemplate) -> Result<(), BlackboardError> {
        template.validate()?;

        let handlers = match LogicalTypeHandlers::build(&template, &self.provider, self.handlers.take()) {
            Ok(handlers) => handlers,
            Err(e) => {
                self.restore_handlers();
                return Err(e.into());
            }
        };
        self.handlers = Some(handlers);

        let snapshot = self.state.clone();
        let previous_status = self.state.life_status();
        let template_name = template.unique_template_name.clone();
        self.state.build_using_template(template, self.id.clone());

        let ctx = BoardContext::root();
        if self.state.life_status() != previous_status {
            ctx.enqueue_event(self.life_status_event());
        }

        info!(
            board_id = %self.id,
            template = %template_name,
            life_status = %self.state.life_status(),
            handlers = self.handlers.as_ref().map_or(0, LogicalTypeHandlers::len),
            "Board built"
        );

        let changed = self.state != snapshot;
        self.commit(&ctx, changed).await
    }

    fn restore_handlers(&mut self) {
        self.handlers = self
            .state
            .template()
            .and_then(|template| LogicalTypeHandlers::build(template, &self.provider, None).ok());
    }

    async fn initialize(&mut self, records: Vec<DataRecordContainer>) -> Result<(), BlackboardError> {
        self.ensure_built()?;
        match self.state.life_status() {
            BlackboardLifeStatus::WaitingInitialization => {}
            BlackboardLifeStatus::Sealed => return Err(BlackboardError::Sealed(self.id.board_name.clone())),
            _ => return Err(BlackboardError::AlreadyInitialized(self.id.board_name.clone())),
        }

        let snapshot = self.state.clone();
        let ctx = BoardContext::root();
        let count = records.len();

        match self.initialize_records(records, &ctx).await {
            Ok(()) => {
                info!(board_id = %self.id, records = count, "Board initialized");
                self.commit(&ctx, true).await
            }
            Err(e) => {
                self.rollback(snapshot, &ctx, &e);
                Err(e)
            }
        }
    }

    async fn initialize_records(
        &mut self,
        records: Vec<DataRecordContainer>,
        ctx: &BoardContext,
    ) -> Result<(), BlackboardError> {
        self.state.set_life_status(BlackboardLifeStatus::Running);
        ctx.enqueue_event(self.life_status_event());

        let child = ctx.child();
        for record in records {
            self.execute(BlackboardCommand::add(record), &child).await?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Command pipeline
    // ------------------------------------------------------------------

    async fn execute_top_level(&mut self, command: BlackboardCommand) -> Result<(), BlackboardError> {
        counter!("democrite_blackboard_commands_total", "kind" => command.kind_name()).increment(1);

        let snapshot = self.state.clone();
        let ctx = BoardContext::root();

        match self.execute(command, &ctx).await {
            Ok(()) => {
                let changed = self.state != snapshot;
                self.commit(&ctx, changed).await
            }
            Err(e) => {
                self.rollback(snapshot, &ctx, &e);
                Err(e)
            }
        }
    }

    fn rollback(&mut self, snapshot: BlackboardGrainState, ctx: &BoardContext, cause: &BlackboardError) {
        debug!(
            board_id = %self.id,
            discarded_events = ctx.pending_events(),
            error = %cause,
            "Command failed, restoring board state"
        );
        self.state = snapshot;
        ctx.consume_events();
    }

    fn execute<'a>(
        &'a mut self,
        command: BlackboardCommand,
        ctx: &'a BoardContext,
    ) -> BoxFuture<'a, Result<(), BlackboardError>> {
        async move {
            self.ensure_writable()?;
            if ctx.depth() > self.runtime.max_command_depth {
                return Err(BlackboardError::CommandFailed(format!(
                    "command nesting exceeded depth {}",
                    self.runtime.max_command_depth
                )));
            }

            match command {
                BlackboardCommand::AddRecord {
                    record,
                    override_existing,
                    insert_if_new,
                } => self.add_record(record, override_existing, insert_if_new, ctx).await,
                BlackboardCommand::PrepareSlot {
                    uid,
                    logical_type,
                    display_name,
                } => {
                    let slot = DataRecordContainer::slot(logical_type, uid, display_name, self.runtime.clock.utc_now());
                    self.add_record(slot, false, true, ctx).await
                }
                BlackboardCommand::RemoveRecord { uid } => self.remove_record(uid, ctx).await,
                BlackboardCommand::DecommissionRecord { uid } => {
                    self.change_status(uid, RecordStatus::Decommissioned, ctx).await
                }
                BlackboardCommand::ChangeStatus { uid, status } => self.change_status(uid, status, ctx).await,
                BlackboardCommand::ChangeMetaData { uid, metadata } => self.change_metadata(uid, metadata, ctx),
                BlackboardCommand::Reject { issue } => {
                    warn!(board_id = %self.id, issue = issue.kind_name(), "Push rejected by controller");
                    counter!("democrite_blackboard_push_rejected_total").increment(1);
                    Err(BlackboardError::PushValidation(issue))
                }
                BlackboardCommand::Seal => self.seal(ctx).await,
            }
        }
        .boxed()
    }

    async fn add_record(
        &mut self,
        record: DataRecordContainer,
        override_existing: bool,
        insert_if_new: bool,
        ctx: &BoardContext,
    ) -> Result<(), BlackboardError> {
        let issue = match self.state.registry().get(&record.uid) {
            Some(existing) if !override_existing => Some(ProcessingIssue::Conflict {
                conflict_records: vec![existing.clone()],
                new_record: record.clone(),
            }),
            _ => self
                .handlers()?
                .resolve(&record.logical_type)
                .solver()
                .and_then(|solver| solver.validate(&record, self.state.registry().records())),
        };

        if let Some(issue) = issue {
            return self.resolve_issue(issue, ctx).await;
        }

        let repository = self.repository_for(&record.logical_type).await?;
        if !repository.push_record(&record, insert_if_new).await? {
            return Err(BlackboardError::RecordNotFound(record.uid));
        }

        let metadata = self.state.registry_mut().push(&record, self.runtime.clock.as_ref());
        debug!(
            board_id = %self.id,
            logical_type = %metadata.logical_type,
            record_uid = %metadata.uid,
            status = ?metadata.status,
            "Record stored"
        );
        ctx.enqueue_event(self.storage_event(StorageAction::Add, metadata));
        Ok(())
    }

    async fn resolve_issue(&mut self, issue: ProcessingIssue, ctx: &BoardContext) -> Result<(), BlackboardError> {
        let options = self
            .state
            .template()
            .map(|template| template.controllers.clone())
            .unwrap_or_default();

        match self.runtime.controller.resolve(&issue, &options) {
            Some(commands) => {
                debug!(
                    board_id = %self.id,
                    issue = issue.kind_name(),
                    commands = commands.len(),
                    "Resolving issue with sub-commands"
                );
                let child = ctx.child();
                for command in commands {
                    self.execute(command, &child).await?;
                }
                Ok(())
            }
            None => {
                warn!(board_id = %self.id, issue = issue.kind_name(), "Push rejected");
                counter!("democrite_blackboard_push_rejected_total").increment(1);
                Err(BlackboardError::PushValidation(issue))
            }
        }
    }

    async fn remove_record(&mut self, uid: Uuid, ctx: &BoardContext) -> Result<(), BlackboardError> {
        let logical_type = self
            .state
            .registry()
            .get(&uid)
            .map(|metadata| metadata.logical_type.clone())
            .ok_or(BlackboardError::RecordNotFound(uid))?;

        let repository = self.repository_for(&logical_type).await?;
        repository.delete_record(uid).await?;

        if let Some(removed) = self.state.registry_mut().pop(&uid) {
            debug!(board_id = %self.id, logical_type = %logical_type, record_uid = %uid, "Record removed");
            ctx.enqueue_event(self.storage_event(StorageAction::Remove, removed));
        }
        Ok(())
    }

    async fn change_status(&mut self, uid: Uuid, status: RecordStatus, ctx: &BoardContext) -> Result<(), BlackboardError> {
        let logical_type = self
            .state
            .registry()
            .get(&uid)
            .map(|metadata| metadata.logical_type.clone())
            .ok_or(BlackboardError::RecordNotFound(uid))?;

        let now = self.runtime.clock.utc_now();
        let repository = self.repository_for(&logical_type).await?;
        if let Some(stored) = repository.get_record(uid).await? {
            repository.push_record(&stored.with_new_status(status, now), false).await?;
        }

        let updated = self
            .state
            .registry_mut()
            .change_status(&uid, status, self.runtime.clock.as_ref())
            .ok_or(BlackboardError::RecordNotFound(uid))?;
        ctx.enqueue_event(self.storage_event(StorageAction::ChangeStatus, updated));
        Ok(())
    }

    fn change_metadata(
        &mut self,
        uid: Uuid,
        metadata: Option<RecordCustomMetadata>,
        ctx: &BoardContext,
    ) -> Result<(), BlackboardError> {
        let updated = self
            .state
            .registry_mut()
            .change_metadata(&uid, metadata, self.runtime.clock.as_ref())
            .ok_or(BlackboardError::RecordNotFound(uid))?;
        ctx.enqueue_event(self.storage_event(StorageAction::MetaDataChanged, updated));
        Ok(())
    }

    async fn seal(&mut self, ctx: &BoardContext) -> Result<(), BlackboardError> {
        let handlers = self.handlers()?;
        let mut doomed: Vec<&RecordMetadata> = self
            .state
            .registry()
            .records()
            .values()
            .filter(|m| !(m.status == RecordStatus::Active && handlers.remain_on_sealed(&m.logical_type)))
            .collect();
        doomed.sort_by_key(|m| (m.creation_time_utc, m.uid));
        let doomed: Vec<Uuid> = doomed.into_iter().map(|m| m.uid).collect();
        let removed = doomed.len();

        let child = ctx.child();
        for uid in doomed {
            self.execute(BlackboardCommand::RemoveRecord { uid }, &child).await?;
        }

        let detached = self.state.clear_subscriptions();
        self.state.set_life_status(BlackboardLifeStatus::Sealed);
        ctx.enqueue_event(self.life_status_event());

        info!(
            board_id = %self.id,
            removed,
            kept = self.state.registry().len(),
            detached_subscriptions = detached.len(),
            "Board sealed"
        );
        Ok(())
    }

    // ------------------------------------------------------------------
    // Read side, queries and subscriptions
    // ------------------------------------------------------------------

    fn get_all_metadata(
        &self,
        logical_type: Option<&str>,
        status: Option<RecordStatus>,
    ) -> Result<Vec<RecordMetadata>, BlackboardError> {
        self.ensure_built()?;
        let filter = logical_type.map(compile_pattern).transpose()?;

        let mut records: Vec<RecordMetadata> = self
            .state
            .registry()
            .records()
            .values()
            .filter(|m| filter.as_ref().is_none_or(|f| f.is_match(&m.logical_type)))
            .filter(|m| status.is_none_or(|s| m.status == s))
            .cloned()
            .collect();
        records.sort_by_key(|m| (m.creation_time_utc, m.uid));
        Ok(records)
    }

    async fn get_records(&self, uids: &[Uuid]) -> Result<Vec<DataRecordContainer>, BlackboardError> {
        self.ensure_built()?;
        let handlers = self.handlers()?;

        // One batch per governing handler.
        let mut batches: HashMap<&str, (&str, Vec<Uuid>)> = HashMap::new();
        for uid in uids {
            if let Some(metadata) = self.state.registry().get(uid) {
                let pattern = handlers.resolve(&metadata.logical_type).pattern();
                batches
                    .entry(pattern)
                    .or_insert_with(|| (metadata.logical_type.as_str(), Vec::new()))
                    .1
                    .push(*uid);
            }
        }

        let mut found: HashMap<Uuid, DataRecordContainer> = HashMap::new();
        for (logical_type, batch) in batches.into_values() {
            let repository = self.repository_for(logical_type).await?;
            for record in repository.get_records(&batch).await? {
                found.insert(record.uid, record);
            }
        }

        Ok(uids.iter().filter_map(|uid| found.remove(uid)).collect())
    }

    async fn add_or_update_query(&mut self, query: BlackboardDeferredQueryState) -> Result<bool, BlackboardError> {
        self.ensure_built()?;
        self.ensure_not_sealed()?;
        let changed = self.state.add_or_update_query(query);
        if changed {
            self.persist().await?;
        }
        Ok(changed)
    }

    async fn remove_query(&mut self, uid: Uuid) -> Result<Option<BlackboardDeferredQueryState>, BlackboardError> {
        let removed = self.state.remove_query(&uid);
        if removed.is_some() {
            self.persist().await?;
        }
        Ok(removed)
    }

    async fn subscribe(&mut self, subscription: SignalSubscription) -> Result<bool, BlackboardError> {
        self.ensure_built()?;
        self.ensure_not_sealed()?;
        let added = self.state.add_subscription(subscription);
        if added {
            self.persist().await?;
        }
        Ok(added)
    }

    async fn unsubscribe(&mut self, subscription_id: Uuid) -> Result<Option<SignalSubscription>, BlackboardError> {
        let removed = self.state.remove_subscription(&subscription_id);
        if removed.is_some() {
            self.persist().await?;
        }
        Ok(removed)
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    fn handlers(&self) -> Result<&LogicalTypeHandlers, BlackboardError> {
        self.handlers
            .as_ref()
            .ok_or_else(|| BlackboardError::NotBuilt(self.id.board_name.clone()))
    }

    fn ensure_built(&self) -> Result<(), BlackboardError> {
        if !self.state.is_built() || self.handlers.is_none() {
            return Err(BlackboardError::NotBuilt(self.id.board_name.clone()));
        }
        Ok(())
    }

    fn ensure_not_sealed(&self) -> Result<(), BlackboardError> {
        if self.state.life_status() == BlackboardLifeStatus::Sealed {
            return Err(BlackboardError::Sealed(self.id.board_name.clone()));
        }
        Ok(())
    }

    fn ensure_writable(&self) -> Result<(), BlackboardError> {
        self.ensure_built()?;
        match self.state.life_status() {
            BlackboardLifeStatus::Sealed => Err(BlackboardError::Sealed(self.id.board_name.clone())),
            BlackboardLifeStatus::WaitingInitialization => {
                Err(BlackboardError::NotInitialized(self.id.board_name.clone()))
            }
            BlackboardLifeStatus::None | BlackboardLifeStatus::Running => Ok(()),
        }
    }

    async fn repository_for(&self, logical_type: &str) -> Result<Arc<dyn RecordRepository>, BlackboardError> {
        let handler = self.handlers()?.resolve(logical_type);
        Ok(handler
            .get_repository(self.runtime.record_repositories.as_ref(), &self.cancel)
            .await?)
    }

    fn storage_event(&self, action: StorageAction, record: RecordMetadata) -> BlackboardEvent {
        BlackboardEvent::Storage {
            board_uid: self.id.uid,
            action,
            record,
            at: self.runtime.clock.utc_now(),
        }
    }

    fn life_status_event(&self) -> BlackboardEvent {
        BlackboardEvent::LifeStatusChanged {
            board_uid: self.id.uid,
            status: self.state.life_status(),
            at: self.runtime.clock.utc_now(),
        }
    }

    async fn commit(&mut self, ctx: &BoardContext, changed: bool) -> Result<(), BlackboardError> {
        for event in ctx.consume_events() {
            debug!(board_id = %self.id, event = ?event, "Flushing board event");
            self.runtime.event_bus.publish_blackboard_event(event);
        }

        if changed {
            self.persist().await?;
        }
        Ok(())
    }

    async fn persist(&self) -> Result<(), BlackboardError> {
        self.runtime
            .state_repository
            .save(&self.state.to_surrogate())
            .await
            .map_err(|e| {
                error!(board_id = %self.id, error = %e, "Failed to persist board state");
                BlackboardError::from(e)
            })
    }
}
