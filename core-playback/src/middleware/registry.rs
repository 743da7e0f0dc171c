//! Middleware factories keyed by MIME type, and the per-controller instance
//! cache they are instantiated into.

use super::pipeline::{BuildOutcome, Pipeline};
use super::{Middleware, SourceStep};
use crate::source::SourceDescriptor;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Factories registered under this key apply to every MIME type. They run
/// after the type-specific ones.
pub const ANY_TYPE: &str = "*";

/// Limit on MIME-type switches during one build.
const MAX_TYPE_SWITCHES: usize = 32;

pub type MiddlewareFactory = Arc<dyn Fn() -> Box<dyn Middleware> + Send + Sync>;

/// Identity of a registered factory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FactoryId(u64);

static NEXT_FACTORY_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Clone)]
struct Registered {
    id: FactoryId,
    factory: MiddlewareFactory,
}

static GLOBAL_MIDDLEWARE: Lazy<MiddlewareRegistry> = Lazy::new(MiddlewareRegistry::new);

/// MIME type → ordered middleware factories.
#[derive(Clone, Default)]
pub struct MiddlewareRegistry {
    factories: Arc<RwLock<HashMap<String, Vec<Registered>>>>,
}

impl MiddlewareRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle to the process-wide registry.
    pub fn global() -> Self {
        GLOBAL_MIDDLEWARE.clone()
    }

    pub fn reset(&self) {
        self.factories.write().clear();
    }

    /// Appends `factory` to the list for `mime_type` (or [`ANY_TYPE`]).
    pub fn register<F>(&self, mime_type: &str, factory: F) -> FactoryId
    where
        F: Fn() -> Box<dyn Middleware> + Send + Sync + 'static,
    {
        let id = FactoryId(NEXT_FACTORY_ID.fetch_add(1, Ordering::Relaxed));
        self.factories
            .write()
            .entry(mime_type.to_string())
            .or_default()
            .push(Registered {
                id,
                factory: Arc::new(factory),
            });
        debug!(mime_type, ?id, "Registered middleware");
        id
    }

    pub fn deregister(&self, mime_type: &str, id: FactoryId) -> bool {
        let mut factories = self.factories.write();
        let Some(list) = factories.get_mut(mime_type) else {
            return false;
        };
        let before = list.len();
        list.retain(|registered| registered.id != id);
        list.len() != before
    }

    pub fn factories_for(&self, mime_type: &str) -> Vec<(FactoryId, MiddlewareFactory)> {
        self.factories
            .read()
            .get(mime_type)
            .map(|list| {
                list.iter()
                    .map(|registered| (registered.id, Arc::clone(&registered.factory)))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.read().values().all(Vec::is_empty)
    }

    /// Runs every applicable middleware's `set_source` and assembles the
    /// pipeline for `source`.
    ///
    /// Type-specific factories run first, in registration order. A
    /// middleware that rewrites the MIME type switches the walk to the new
    /// type's factories. The [`ANY_TYPE`] factories run once at the end.
    pub fn build(&self, source: &SourceDescriptor, instances: &mut MiddlewareInstances) -> BuildOutcome {
        let mut current = source.clone();
        let mut pending: VecDeque<_> = self.factories_for(&current.mime_type).into();
        let mut joined = Vec::new();
        let mut last_run = false;
        let mut switches = 0;

        loop {
            let Some((id, factory)) = pending.pop_front() else {
                if last_run {
                    break;
                }
                last_run = true;
                pending = self.factories_for(ANY_TYPE).into();
                continue;
            };

            let middleware = instances.get_or_create(id, &factory);
            match middleware.set_source(&current) {
                SourceStep::Skip => {
                    debug!(middleware = middleware.name(), "Middleware skipped source");
                }
                SourceStep::Terminate => {
                    debug!(middleware = middleware.name(), "Middleware terminated pipeline build");
                    return BuildOutcome::Terminated {
                        source: current,
                        pipeline: Pipeline::new(joined),
                    };
                }
                SourceStep::Continue(next) => {
                    joined.push((id, middleware));
                    let type_changed = next.mime_type != current.mime_type;
                    current = next;
                    if type_changed && !last_run {
                        switches += 1;
                        if switches > MAX_TYPE_SWITCHES {
                            warn!(
                                mime_type = %current.mime_type,
                                "Middleware keeps switching MIME types; stopping type-specific walk"
                            );
                            pending.clear();
                        } else {
                            pending = self.factories_for(&current.mime_type).into();
                        }
                    }
                }
            }
        }

        BuildOutcome::Resolved {
            source: current,
            pipeline: Pipeline::new(joined),
        }
    }
}

impl fmt::Debug for MiddlewareRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let factories = self.factories.read();
        let mut types: Vec<_> = factories
            .iter()
            .map(|(mime, list)| (mime.clone(), list.len()))
            .collect();
        types.sort();
        f.debug_struct("MiddlewareRegistry").field("types", &types).finish()
    }
}

/// Middleware instantiated for one controller, one per factory.
#[derive(Default)]
pub struct MiddlewareInstances {
    instances: HashMap<FactoryId, Rc<dyn Middleware>>,
}

impl MiddlewareInstances {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_create(&mut self, id: FactoryId, factory: &MiddlewareFactory) -> Rc<dyn Middleware> {
        let instance = self
            .instances
            .entry(id)
            .or_insert_with(|| Rc::from(factory()));
        Rc::clone(instance)
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn clear(&mut self) {
        self.instances.clear();
    }
}

impl fmt::Debug for MiddlewareInstances {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MiddlewareInstances")
            .field("count", &self.instances.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::sync::atomic::AtomicUsize;

    struct Named(&'static str);

    impl Middleware for Named {
        fn name(&self) -> &str {
            self.0
        }
    }

    /// Rewrites manifest URLs to a different container type.
    struct Transmux;

    impl Middleware for Transmux {
        fn name(&self) -> &str {
            "transmux"
        }

        fn set_source(&self, source: &SourceDescriptor) -> SourceStep {
            SourceStep::Continue(SourceDescriptor::new(
                format!("{}#mp4", source.url),
                "video/mp4",
            ))
        }
    }

    struct SkipOnce(Cell<bool>);

    impl Middleware for SkipOnce {
        fn name(&self) -> &str {
            "skip"
        }

        fn set_source(&self, source: &SourceDescriptor) -> SourceStep {
            if self.0.replace(false) {
                SourceStep::Skip
            } else {
                SourceStep::Continue(source.clone())
            }
        }
    }

    struct Block;

    impl Middleware for Block {
        fn name(&self) -> &str {
            "block"
        }

        fn set_source(&self, _source: &SourceDescriptor) -> SourceStep {
            SourceStep::Terminate
        }
    }

    fn resolved(outcome: BuildOutcome) -> (SourceDescriptor, Pipeline) {
        match outcome {
            BuildOutcome::Resolved { source, pipeline } => (source, pipeline),
            BuildOutcome::Terminated { .. } => panic!("pipeline build terminated"),
        }
    }

    #[test]
    fn test_type_specific_then_any() {
        let registry = MiddlewareRegistry::new();
        registry.register(ANY_TYPE, || Box::new(Named("any")));
        registry.register("video/mp4", || Box::new(Named("mp4-a")));
        registry.register("video/mp4", || Box::new(Named("mp4-b")));
        registry.register("video/webm", || Box::new(Named("webm")));

        let mut instances = MiddlewareInstances::new();
        let (source, pipeline) = resolved(
            registry.build(&SourceDescriptor::new("a.mp4", "video/mp4"), &mut instances),
        );

        assert_eq!(source.url, "a.mp4");
        assert_eq!(pipeline.names(), vec!["mp4-a", "mp4-b", "any"]);
    }

    #[test]
    fn test_type_change_switches_factory_list() {
        let registry = MiddlewareRegistry::new();
        registry.register("application/x-mpegURL", || Box::new(Transmux));
        registry.register("application/x-mpegURL", || Box::new(Named("never")));
        registry.register("video/mp4", || Box::new(Named("mp4")));
        registry.register(ANY_TYPE, || Box::new(Named("any")));

        let mut instances = MiddlewareInstances::new();
        let (source, pipeline) = resolved(registry.build(
            &SourceDescriptor::new("live.m3u8", "application/x-mpegURL"),
            &mut instances,
        ));

        assert_eq!(source, SourceDescriptor::new("live.m3u8#mp4", "video/mp4"));
        assert_eq!(pipeline.names(), vec!["transmux", "mp4", "any"]);
    }

    #[test]
    fn test_skip_leaves_middleware_out() {
        let registry = MiddlewareRegistry::new();
        registry.register(ANY_TYPE, || Box::new(SkipOnce(Cell::new(true))));
        registry.register(ANY_TYPE, || Box::new(Named("after")));

        let mut instances = MiddlewareInstances::new();
        let source = SourceDescriptor::new("a.mp4", "video/mp4");

        let (_, first) = resolved(registry.build(&source, &mut instances));
        assert_eq!(first.names(), vec!["after"]);

        let (_, second) = resolved(registry.build(&source, &mut instances));
        assert_eq!(second.names(), vec!["skip", "after"]);
    }

    #[test]
    fn test_terminate_stops_build() {
        let registry = MiddlewareRegistry::new();
        registry.register("video/mp4", || Box::new(Named("first")));
        registry.register("video/mp4", || Box::new(Block));
        registry.register(ANY_TYPE, || Box::new(Named("any")));

        let mut instances = MiddlewareInstances::new();
        match registry.build(&SourceDescriptor::new("a.mp4", "video/mp4"), &mut instances) {
            BuildOutcome::Terminated { source, pipeline } => {
                assert_eq!(source.url, "a.mp4");
                assert_eq!(pipeline.names(), vec!["first"]);
            }
            BuildOutcome::Resolved { .. } => panic!("expected termination"),
        }
    }

    #[test]
    fn test_factories_instantiated_once_per_controller() {
        let created = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&created);

        let registry = MiddlewareRegistry::new();
        registry.register(ANY_TYPE, move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Box::new(Named("counted"))
        });

        let source = SourceDescriptor::new("a.mp4", "video/mp4");
        let mut instances = MiddlewareInstances::new();
        registry.build(&source, &mut instances);
        registry.build(&source, &mut instances);
        assert_eq!(created.load(Ordering::SeqCst), 1);

        let mut other = MiddlewareInstances::new();
        registry.build(&source, &mut other);
        assert_eq!(created.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_build_is_idempotent() {
        let registry = MiddlewareRegistry::new();
        registry.register("application/x-mpegURL", || Box::new(Transmux));
        registry.register(ANY_TYPE, || Box::new(Named("any")));

        let source = SourceDescriptor::new("live.m3u8", "application/x-mpegURL");
        let mut instances = MiddlewareInstances::new();
        let first = registry.build(&source, &mut instances);
        let second = registry.build(&source, &mut instances);
        assert_eq!(first, second);
    }

    #[test]
    fn test_deregister() {
        let registry = MiddlewareRegistry::new();
        let id = registry.register("video/mp4", || Box::new(Named("x")));
        assert!(!registry.is_empty());
        assert!(registry.deregister("video/mp4", id));
        assert!(!registry.deregister("video/mp4", id));
        assert!(!registry.deregister("video/ogg", id));
        assert!(registry.is_empty());
    }
}
