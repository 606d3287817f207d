use core::sync::atomic::{AtomicU64, Ordering};
use parking_lot::RwLock;
use std::{collections::BTreeMap, sync::Arc};
use tracing::{debug, error};

use crate::{context::BuilderContext, errors::BuildErrorKind, registration::RegistrationContext};

/// Position of a strategy in the chain. Stages run in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    Setup,
    TypeMapping,
    Lifetime,
    PreCreation,
    Creation,
    Initialization,
    PostInitialization,
}

/// One step of the build pipeline.
///
/// `pre_build_up` runs forward through the chain until a strategy marks the build complete,
/// `post_build_up` then runs backwards over the strategies whose pre phase ran.
pub trait BuilderStrategy: Send + Sync + 'static {
    fn pre_build_up(&self, context: &mut BuilderContext<'_>) -> Result<(), BuildErrorKind> {
        let _ = context;
        Ok(())
    }

    fn post_build_up(&self, context: &mut BuilderContext<'_>) -> Result<(), BuildErrorKind> {
        let _ = context;
        Ok(())
    }

    /// Strategies that contribute policies at registration time return themselves here
    fn registration_aware(&self) -> Option<&dyn RegistrationAware> {
        None
    }
}

/// Registration-time hooks of a strategy
pub trait RegistrationAware: Send + Sync {
    fn on_register_type(&self, registration: &RegistrationContext<'_>) {
        let _ = registration;
    }

    fn on_register_instance(&self, registration: &RegistrationContext<'_>) {
        let _ = registration;
    }
}

/// Flattened, immutable snapshot of a [`StagedStrategyChain`]
pub struct StrategyChain {
    strategies: Vec<Arc<dyn BuilderStrategy>>,
    revision: u64,
}

impl StrategyChain {
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    #[inline]
    #[must_use]
    pub const fn revision(&self) -> u64 {
        self.revision
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn BuilderStrategy>> {
        self.strategies.iter()
    }

    pub fn registration_aware(&self) -> impl Iterator<Item = &dyn RegistrationAware> {
        self.strategies.iter().filter_map(|strategy| strategy.registration_aware())
    }

    /// Runs the chain over `context`. On failure the recovery stack runs before the error is returned.
    pub fn execute_build_up(&self, context: &mut BuilderContext<'_>) -> Result<(), BuildErrorKind> {
        match self.run(context) {
            Ok(()) => Ok(()),
            Err(err) => {
                if !context.recovery_stack_mut().is_empty() {
                    debug!("Running recovery");
                    context.recovery_stack_mut().execute_recovery();
                }
                error!("{}", err);
                Err(err)
            }
        }
    }

    fn run(&self, context: &mut BuilderContext<'_>) -> Result<(), BuildErrorKind> {
        let mut visited = 0;
        for strategy in &self.strategies {
            visited += 1;
            strategy.pre_build_up(context)?;
            if context.is_build_complete() {
                debug!(visited, "Build completed early");
                break;
            }
        }
        for strategy in self.strategies[..visited].iter().rev() {
            strategy.post_build_up(context)?;
        }
        Ok(())
    }
}

/// Strategies grouped by stage, with an optional parent whose strategies come first in every stage.
///
/// The flattened chain is cached until this chain or any ancestor changes.
#[derive(Default)]
pub struct StagedStrategyChain {
    parent: Option<Arc<StagedStrategyChain>>,
    stages: RwLock<BTreeMap<Stage, Vec<Arc<dyn BuilderStrategy>>>>,
    revision: AtomicU64,
    cache: RwLock<Option<Arc<StrategyChain>>>,
}

impl StagedStrategyChain {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn with_parent(parent: Arc<StagedStrategyChain>) -> Self {
        Self {
            parent: Some(parent),
            ..Self::default()
        }
    }

    #[inline]
    pub fn add(&self, strategy: impl BuilderStrategy, stage: Stage) {
        self.add_shared(Arc::new(strategy), stage);
    }

    pub fn add_shared(&self, strategy: Arc<dyn BuilderStrategy>, stage: Stage) {
        self.stages.write().entry(stage).or_default().push(strategy);
        self.revision.fetch_add(1, Ordering::AcqRel);
        debug!(?stage, "Strategy added");
    }

    /// Removes the strategies of this chain, parent strategies stay
    pub fn clear(&self) {
        self.stages.write().clear();
        self.revision.fetch_add(1, Ordering::AcqRel);
    }

    /// Grows whenever this chain or an ancestor changes
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision.load(Ordering::Acquire) + self.parent.as_ref().map_or(0, |parent| parent.revision())
    }

    #[must_use]
    pub fn make_chain(&self) -> Arc<StrategyChain> {
        let revision = self.revision();
        if let Some(chain) = self.cache.read().as_ref().filter(|chain| chain.revision == revision) {
            return chain.clone();
        }

        let mut cache = self.cache.write();
        let revision = self.revision();
        if let Some(chain) = cache.as_ref().filter(|chain| chain.revision == revision) {
            return chain.clone();
        }

        let mut strategies = Vec::new();
        self.collect(&mut strategies);
        debug!(revision, len = strategies.len(), "Strategy chain rebuilt");

        let chain = Arc::new(StrategyChain { strategies, revision });
        *cache = Some(chain.clone());
        chain
    }

    fn collect(&self, strategies: &mut Vec<Arc<dyn BuilderStrategy>>) {
        let mut by_stage: BTreeMap<Stage, Vec<Arc<dyn BuilderStrategy>>> = BTreeMap::new();
        self.collect_by_stage(&mut by_stage);
        strategies.extend(by_stage.into_values().flatten());
    }

    fn collect_by_stage(&self, by_stage: &mut BTreeMap<Stage, Vec<Arc<dyn BuilderStrategy>>>) {
        if let Some(parent) = &self.parent {
            parent.collect_by_stage(by_stage);
        }
        for (stage, strategies) in self.stages.read().iter() {
            by_stage.entry(*stage).or_default().extend(strategies.iter().cloned());
        }
    }
}
