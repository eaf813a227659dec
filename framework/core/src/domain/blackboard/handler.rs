// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Logical-Type Handler
//!
//! Binds one logical-type pattern declared by a board template to its storage
//! and its validator tree. Handlers are rebuilt when a template is bound; only
//! the lazily resolved repository changes afterwards.
//!
//! # Architecture
//!
//! - **Layer:** Domain
//! - **Owned by:** `BlackboardGrainState` (through the board actor)
//! - **Suspension point:** [`LogicalTypeHandler::get_repository`] is the only
//!   async boundary of the blackboard domain.

use regex::Regex;
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::domain::blackboard::rules::{compile_pattern, LogicalTypeRule, RuleError, StorageDefinition};
use crate::domain::blackboard::template::BlackboardTemplate;
use crate::domain::blackboard::validators::{RuleSolver, ValidatorProvider};
use crate::domain::repository::{RecordRepository, RecordRepositoryFactory, RepositoryError};

/// Precedence used when a handler declares no `Order` rule.
const DEFAULT_ORDER: i16 = -1;
/// Precedence of an absent handler.
const MISSING_ORDER: i16 = -2;

/// Pattern of the fallback handler used when no declared pattern matches.
pub const FALLBACK_PATTERN: &str = ".*";

pub struct LogicalTypeHandler {
    pattern_str: String,
    pattern: Regex,
    order: Option<i16>,
    storage: StorageDefinition,
    remain_on_sealed: bool,
    solver: Option<RuleSolver>,
    repository: OnceCell<Arc<dyn RecordRepository>>,
}

impl LogicalTypeHandler {
    pub fn new(pattern: impl Into<String>, storage: StorageDefinition) -> Result<Self, RuleError> {
        let pattern_str = pattern.into();
        let compiled = compile_pattern(&pattern_str)?;
        Ok(Self {
            pattern_str,
            pattern: compiled,
            order: None,
            storage,
            remain_on_sealed: false,
            solver: None,
            repository: OnceCell::new(),
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern_str
    }

    pub fn order(&self) -> Option<i16> {
        self.order
    }

    pub fn storage(&self) -> &StorageDefinition {
        &self.storage
    }

    pub fn remain_on_sealed(&self) -> bool {
        self.remain_on_sealed
    }

    pub fn solver(&self) -> Option<&RuleSolver> {
        self.solver.as_ref()
    }

    /// Whether `logical_type` is governed by this handler. Empty input never matches.
    pub fn matches(&self, logical_type: &str) -> bool {
        !logical_type.is_empty() && self.pattern.is_match(logical_type)
    }

    /// Rebuild the derived state from the rules of this pattern.
    ///
    /// A storage change drops the resolved repository so the next access
    /// resolves the new one.
    pub fn update(
        &mut self,
        provider: &ValidatorProvider,
        order: Option<i16>,
        storage: StorageDefinition,
        remain_on_sealed: bool,
        rules: &[LogicalTypeRule],
    ) -> Result<(), RuleError> {
        if storage != self.storage {
            self.repository = OnceCell::new();
            self.storage = storage;
        }

        self.order = order;
        self.remain_on_sealed = remain_on_sealed;
        self.solver = if rules.is_empty() {
            None
        } else {
            Some(provider.create(&self.pattern, rules)?)
        };

        Ok(())
    }

    /// Resolve and initialize the repository at most once.
    pub async fn get_repository(
        &self,
        factory: &dyn RecordRepositoryFactory,
        cancel: &CancellationToken,
    ) -> Result<Arc<dyn RecordRepository>, RepositoryError> {
        if cancel.is_cancelled() {
            return Err(RepositoryError::Cancelled);
        }

        let repository = self
            .repository
            .get_or_try_init(|| async {
                let repository = factory.get(&self.storage)?;
                if !repository.is_initialized() {
                    debug!(
                        pattern = %self.pattern_str,
                        storage_key = %self.storage.storage_key,
                        "Initializing record repository"
                    );
                    repository.initialize(&self.storage.storage_key, cancel).await?;
                }
                Ok::<_, RepositoryError>(repository)
            })
            .await?;

        Ok(repository.clone())
    }

    fn precedence(&self) -> i16 {
        self.order.unwrap_or(DEFAULT_ORDER)
    }

    /// Compare precedence; an absent handler sorts below every handler.
    pub fn compare(left: Option<&Self>, right: Option<&Self>) -> Ordering {
        let l = left.map_or(MISSING_ORDER, Self::precedence);
        let r = right.map_or(MISSING_ORDER, Self::precedence);
        l.cmp(&r)
    }
}

impl fmt::Debug for LogicalTypeHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogicalTypeHandler")
            .field("pattern", &self.pattern_str)
            .field("order", &self.order)
            .field("storage", &self.storage)
            .field("remain_on_sealed", &self.remain_on_sealed)
            .field("has_solver", &self.solver.is_some())
            .field("repository_ready", &self.repository.initialized())
            .finish()
    }
}

impl PartialEq for LogicalTypeHandler {
    fn eq(&self, other: &Self) -> bool {
        self.pattern_str == other.pattern_str
    }
}

impl Eq for LogicalTypeHandler {}

impl PartialEq<str> for LogicalTypeHandler {
    fn eq(&self, other: &str) -> bool {
        self.pattern_str == other
    }
}

/// The handlers of one board, kept in precedence order.
#[derive(Debug)]
pub struct LogicalTypeHandlers {
    handlers: Vec<LogicalTypeHandler>,
    fallback: LogicalTypeHandler,
}

impl LogicalTypeHandlers {
    /// Build the handler set of `template`.
    ///
    /// Handlers of `previous` whose pattern is still declared are reused so
    /// their resolved repositories survive a rebind.
    pub fn build(
        template: &BlackboardTemplate,
        provider: &ValidatorProvider,
        previous: Option<LogicalTypeHandlers>,
    ) -> Result<Self, RuleError> {
        let (mut reusable, previous_fallback) = match previous {
            Some(previous) => (previous.handlers, Some(previous.fallback)),
            None => (Vec::new(), None),
        };

        let mut handlers = Vec::new();
        for (pattern, rules) in template.rules_by_pattern() {
            let mut order = None;
            let mut storage = None;
            let mut remain_on_sealed = false;
            let mut validation_rules = Vec::new();

            for rule in rules {
                match rule {
                    LogicalTypeRule::Order { order: value, .. } => order = Some(value),
                    LogicalTypeRule::Storage { storage: value, .. } => storage = Some(value),
                    LogicalTypeRule::RemainOnSealed { .. } => remain_on_sealed = true,
                    other => validation_rules.push(other),
                }
            }

            let storage = storage.unwrap_or_else(|| template.default_storage.clone());
            let mut handler = match reusable.iter().position(|h| *h == *pattern.as_str()) {
                Some(index) => reusable.swap_remove(index),
                None => LogicalTypeHandler::new(pattern, storage.clone())?,
            };
            handler.update(provider, order, storage, remain_on_sealed, &validation_rules)?;
            handlers.push(handler);
        }

        // Stable: equal precedence keeps declaration order.
        handlers.sort_by(|a, b| LogicalTypeHandler::compare(Some(a), Some(b)));

        let mut fallback = match previous_fallback {
            Some(fallback) => fallback,
            None => LogicalTypeHandler::new(FALLBACK_PATTERN, template.default_storage.clone())?,
        };
        fallback.update(provider, None, template.default_storage.clone(), false, &[])?;

        Ok(Self { handlers, fallback })
    }

    /// First declared handler matching `logical_type`, in precedence order.
    pub fn find(&self, logical_type: &str) -> Option<&LogicalTypeHandler> {
        self.handlers.iter().find(|h| h.matches(logical_type))
    }

    /// Governing handler, falling back to the default-storage handler.
    pub fn resolve(&self, logical_type: &str) -> &LogicalTypeHandler {
        self.find(logical_type).unwrap_or(&self.fallback)
    }

    pub fn get(&self, pattern: &str) -> Option<&LogicalTypeHandler> {
        self.handlers.iter().find(|h| *h == pattern)
    }

    pub fn iter(&self) -> impl Iterator<Item = &LogicalTypeHandler> {
        self.handlers.iter()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Whether records of `logical_type` survive a seal.
    pub fn remain_on_sealed(&self, logical_type: &str) -> bool {
        self.find(logical_type).is_some_and(|h| h.remain_on_sealed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::blackboard::record::DataRecordContainer;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
    use uuid::Uuid;

    struct CountingRepository {
        initialized: std::sync::atomic::AtomicBool,
        init_calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl RecordRepository for CountingRepository {
        fn is_initialized(&self) -> bool {
            self.initialized.load(AtomicOrdering::SeqCst)
        }

        async fn initialize(&self, _storage_key: &str, _cancel: &CancellationToken) -> Result<(), RepositoryError> {
            self.init_calls.fetch_add(1, AtomicOrdering::SeqCst);
            self.initialized.store(true, AtomicOrdering::SeqCst);
            Ok(())
        }

        async fn push_record(&self, _record: &DataRecordContainer, _insert_if_new: bool) -> Result<bool, RepositoryError> {
            Ok(true)
        }

        async fn get_record(&self, _uid: Uuid) -> Result<Option<DataRecordContainer>, RepositoryError> {
            Ok(None)
        }

        async fn get_records(&self, _uids: &[Uuid]) -> Result<Vec<DataRecordContainer>, RepositoryError> {
            Ok(Vec::new())
        }

        async fn delete_record(&self, _uid: Uuid) -> Result<bool, RepositoryError> {
            Ok(false)
        }
    }

    struct CountingFactory {
        resolved: AtomicUsize,
        init_calls: Arc<AtomicUsize>,
    }

    impl RecordRepositoryFactory for CountingFactory {
        fn get(&self, _storage: &StorageDefinition) -> Result<Arc<dyn RecordRepository>, RepositoryError> {
            self.resolved.fetch_add(1, AtomicOrdering::SeqCst);
            Ok(Arc::new(CountingRepository {
                initialized: std::sync::atomic::AtomicBool::new(false),
                init_calls: self.init_calls.clone(),
            }))
        }
    }

    #[test]
    fn test_empty_logical_type_never_matches() {
        let handler = LogicalTypeHandler::new(".*", StorageDefinition::default()).unwrap();
        assert!(!handler.matches(""));
        assert!(handler.matches("anything"));
    }

    #[test]
    fn test_handler_equality_by_pattern() {
        let a = LogicalTypeHandler::new("^temp$", StorageDefinition::default()).unwrap();
        let b = LogicalTypeHandler::new("^temp$", StorageDefinition::new("other", "default")).unwrap();
        assert_eq!(a, b);
        assert!(a == *"^temp$");
    }

    #[test]
    fn test_missing_handler_sorts_lowest() {
        let unordered = LogicalTypeHandler::new("^a$", StorageDefinition::default()).unwrap();
        assert_eq!(LogicalTypeHandler::compare(None, Some(&unordered)), Ordering::Less);
        assert_eq!(LogicalTypeHandler::compare(Some(&unordered), None), Ordering::Greater);
    }

    #[test]
    fn test_build_extracts_settings_and_orders_handlers() {
        let template = BlackboardTemplate::new(
            "board",
            vec![
                LogicalTypeRule::Order { pattern: "^temp.*".into(), order: 5 },
                LogicalTypeRule::max_record("^temp.*", 2),
                LogicalTypeRule::RemainOnSealed { pattern: "^temperature$".into() },
                LogicalTypeRule::Storage {
                    pattern: "^temperature$".into(),
                    storage: StorageDefinition::new("temperatures", "default"),
                },
            ],
        )
        .unwrap();

        let handlers = LogicalTypeHandlers::build(&template, &ValidatorProvider::new(), None).unwrap();
        assert_eq!(handlers.len(), 2);

        // No order (-1) precedes order 5.
        let governing = handlers.resolve("temperature");
        assert_eq!(governing.pattern(), "^temperature$");
        assert!(governing.remain_on_sealed());
        assert!(governing.solver().is_none());
        assert_eq!(governing.storage().storage_key, "temperatures");

        let temp = handlers.resolve("tempo");
        assert_eq!(temp.order(), Some(5));
        assert!(temp.solver().is_some());

        let fallback = handlers.resolve("unknown");
        assert_eq!(fallback.pattern(), FALLBACK_PATTERN);
        assert!(!handlers.remain_on_sealed("unknown"));
    }

    #[tokio::test]
    async fn test_repository_initialized_once() {
        let init_calls = Arc::new(AtomicUsize::new(0));
        let factory = CountingFactory {
            resolved: AtomicUsize::new(0),
            init_calls: init_calls.clone(),
        };
        let handler = LogicalTypeHandler::new("^a$", StorageDefinition::default()).unwrap();
        let cancel = CancellationToken::new();

        let first = handler.get_repository(&factory, &cancel).await.unwrap();
        let second = handler.get_repository(&factory, &cancel).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(factory.resolved.load(AtomicOrdering::SeqCst), 1);
        assert_eq!(init_calls.load(AtomicOrdering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancelled_repository_resolution() {
        let factory = CountingFactory {
            resolved: AtomicUsize::new(0),
            init_calls: Arc::new(AtomicUsize::new(0)),
        };
        let handler = LogicalTypeHandler::new("^a$", StorageDefinition::default()).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = handler.get_repository(&factory, &cancel).await;
        assert!(matches!(result, Err(RepositoryError::Cancelled)));
        assert_eq!(factory.resolved.load(AtomicOrdering::SeqCst), 0);
    }
}
