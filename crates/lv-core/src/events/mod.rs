use std::any::{Any, TypeId};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use ahash::AHashMap;
use parking_lot::Mutex;

/// Publish/subscribe hub used to announce data and subset changes
pub struct Hub {
    handlers: Arc<Mutex<AHashMap<TypeId, Vec<Registration>>>>,
    next_id: AtomicU64,
}

/// Message trait that all hub messages must implement
pub trait Message: Send + Sync + 'static {
    fn as_any(&self) -> &dyn Any;
}

/// Handle returned by [`Hub::subscribe`], used to unsubscribe later
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler = Arc<dyn Fn(&dyn Message) + Send + Sync>;

struct Registration {
    id: SubscriptionId,
    handler: Handler,
}

/// Messages broadcast by collections and derived datasets
pub mod messages {
    use super::Message;
    use crate::ids::{DataId, LinkId, SubsetId};

    /// A dataset joined a collection
    #[derive(Debug, Clone, PartialEq)]
    pub struct DataAdded {
        pub data: DataId,
    }

    /// A dataset left a collection
    #[derive(Debug, Clone, PartialEq)]
    pub struct DataRemoved {
        pub data: DataId,
    }

    /// The values a dataset exposes changed
    #[derive(Debug, Clone, PartialEq)]
    pub struct NumericalDataChanged {
        pub data: DataId,
    }

    /// A component was renamed
    #[derive(Debug, Clone, PartialEq)]
    pub struct ComponentRenamed {
        pub data: DataId,
        pub old_label: String,
        pub new_label: String,
    }

    /// Links were added, removed or edited
    #[derive(Debug, Clone, PartialEq)]
    pub struct LinksChanged {
        pub added: Vec<LinkId>,
        pub removed: Vec<LinkId>,
        pub edited: Vec<LinkId>,
    }

    #[derive(Debug, Clone, PartialEq)]
    pub struct SubsetCreated {
        pub subset: SubsetId,
        pub data: DataId,
    }

    #[derive(Debug, Clone, PartialEq)]
    pub struct SubsetUpdated {
        pub subset: SubsetId,
        pub data: DataId,
    }

    #[derive(Debug, Clone, PartialEq)]
    pub struct SubsetDeleted {
        pub subset: SubsetId,
        pub data: DataId,
    }

    macro_rules! impl_message {
        ($($t:ty),*) => {
            $(
                impl Message for $t {
                    fn as_any(&self) -> &dyn std::any::Any {
                        self
                    }
                }
            )*
        }
    }

    impl_message!(
        DataAdded,
        DataRemoved,
        NumericalDataChanged,
        ComponentRenamed,
        LinksChanged,
        SubsetCreated,
        SubsetUpdated,
        SubsetDeleted
    );
}

impl Hub {
    /// Create a new hub with no subscribers
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(Mutex::new(AHashMap::new())),
            next_id: AtomicU64::new(1),
        }
    }

    /// Subscribe to messages of type `M`.
    ///
    /// Handlers run synchronously on the publishing thread. They may publish
    /// or subscribe themselves since the registry lock is released first.
    pub fn subscribe<M, F>(&self, handler: F) -> SubscriptionId
    where
        M: Message,
        F: Fn(&M) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let handler: Handler = Arc::new(move |message: &dyn Message| {
            if let Some(message) = message.as_any().downcast_ref::<M>() {
                handler(message);
            }
        });

        self.handlers
            .lock()
            .entry(TypeId::of::<M>())
            .or_default()
            .push(Registration { id, handler });

        tracing::trace!("Hub subscription {:?} registered", id);
        id
    }

    /// Remove a subscription. Returns `false` if it was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut handlers = self.handlers.lock();
        let mut removed = false;
        for registrations in handlers.values_mut() {
            let before = registrations.len();
            registrations.retain(|r| r.id != id);
            removed |= registrations.len() != before;
        }
        handlers.retain(|_, registrations| !registrations.is_empty());
        removed
    }

    /// Whether anything at all is listening
    pub fn has_subscribers(&self) -> bool {
        self.handlers.lock().values().any(|r| !r.is_empty())
    }

    /// Number of handlers registered for messages of type `M`
    pub fn subscriber_count<M: Message>(&self) -> usize {
        self.handlers
            .lock()
            .get(&TypeId::of::<M>())
            .map(|r| r.len())
            .unwrap_or(0)
    }

    /// Publish a message to every handler registered for its type
    pub fn publish<M: Message>(&self, message: M) {
        let targets: Vec<Handler> = {
            let handlers = self.handlers.lock();
            match handlers.get(&TypeId::of::<M>()) {
                Some(registrations) => registrations.iter().map(|r| r.handler.clone()).collect(),
                None => return,
            }
        };

        for handler in targets {
            handler(&message);
        }
    }
}

impl Default for Hub {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Hub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let handlers = self.handlers.lock();
        let count: usize = handlers.values().map(|r| r.len()).sum();
        f.debug_struct("Hub").field("subscriptions", &count).finish()
    }
}
