//! Pub/Sub event bus connecting the scroll tracker to its consumers.
//!
//! Architecture:
//! - Publishers (trackers, controllers, renderers) `emit()` typed events
//! - Subscribers register callbacks per event type and get a [`Subscription`] handle
//! - Every emitted event is also queued; the stage drains the queue with `poll()`
//!   and routes events to the scenes one at a time
//!
//! Dropping a [`Subscription`] detaches its callback, so listener lifetime follows
//! the owner's lifetime (scene mount/unmount).
//!
//! Callback order: FIFO within one event type. Cross-type order is emission order.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use log::{trace, warn};

/// Maximum events in queue before oldest are evicted
const MAX_QUEUE_SIZE: usize = 1000;

/// Marker trait for events. Events must be Send + Sync + 'static.
pub trait Event: Any + Send + Sync + 'static {
    fn as_any(&self) -> &dyn Any;
    fn type_name(&self) -> &'static str;
}

impl<T: Any + Send + Sync + 'static> Event for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

type Callback = Arc<dyn Fn(&dyn Any) + Send + Sync>;

/// Boxed event for queue storage
pub type BoxedEvent = Box<dyn Event>;

type SubscriberMap = HashMap<TypeId, Vec<(u64, Callback)>>;

#[derive(Default)]
struct BusInner {
    subscribers: RwLock<SubscriberMap>,
    queue: Mutex<Vec<BoxedEvent>>,
    next_id: AtomicU64,
}

impl BusInner {
    fn dispatch(&self, type_id: TypeId, event: &dyn Any) {
        // Clone callbacks out so a callback may subscribe/unsubscribe without deadlocking
        let callbacks: Vec<Callback> = self
            .subscribers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&type_id)
            .map(|cbs| cbs.iter().map(|(_, cb)| Arc::clone(cb)).collect())
            .unwrap_or_default();
        for cb in callbacks {
            cb(event);
        }
    }

    fn enqueue(&self, event: BoxedEvent) {
        let mut queue = self.queue.lock().unwrap_or_else(|e| e.into_inner());
        if queue.len() >= MAX_QUEUE_SIZE {
            let evict_count = queue.len() / 2;
            warn!("EventBus queue full ({} events), evicting oldest {}", queue.len(), evict_count);
            queue.drain(0..evict_count);
        }
        queue.push(event);
    }

    fn remove(&self, type_id: TypeId, id: u64) {
        let mut subs = self.subscribers.write().unwrap_or_else(|e| e.into_inner());
        if let Some(cbs) = subs.get_mut(&type_id) {
            cbs.retain(|(sub_id, _)| *sub_id != id);
            if cbs.is_empty() {
                subs.remove(&type_id);
            }
        }
    }
}

/// Pub/Sub event bus with deferred processing support.
///
/// Callbacks fire synchronously inside `emit()`, and the event is queued for
/// `poll()` as well. Cloning the bus shares the same subscribers and queue.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_types", &self.subscriber_type_count())
            .field("queue_len", &self.queue_len())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    // ========== Pub/Sub (immediate) ==========

    /// Subscribe to events of type E.
    ///
    /// The callback stays registered until the returned [`Subscription`] is dropped
    /// or explicitly cancelled.
    ///
    /// # Example
    /// ```ignore
    /// let _sub = bus.subscribe::<ScrollProgressEvent, _>(|e| {
    ///     log::debug!("progress {}", e.progress);
    /// });
    /// ```
    pub fn subscribe<E, F>(&self, callback: F) -> Subscription
    where
        E: Event,
        F: Fn(&E) + Send + Sync + 'static,
    {
        let type_id = TypeId::of::<E>();
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let wrapped: Callback = Arc::new(move |any: &dyn Any| {
            if let Some(event) = any.downcast_ref::<E>() {
                callback(event);
            }
        });
        self.inner
            .subscribers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .entry(type_id)
            .or_default()
            .push((id, wrapped));
        trace!("EventBus: subscription {} for {}", id, std::any::type_name::<E>());

        Subscription {
            bus: Arc::downgrade(&self.inner),
            type_id,
            id: Some(id),
        }
    }

    /// Emit event: invoke callbacks immediately AND queue for deferred processing.
    pub fn emit<E: Event + Clone>(&self, event: E) {
        self.inner.dispatch(TypeId::of::<E>(), &event);
        self.inner.enqueue(Box::new(event));
    }

    // ========== Deferred Processing ==========

    /// Take all queued events (emission order).
    pub fn poll(&self) -> Vec<BoxedEvent> {
        std::mem::take(&mut *self.inner.queue.lock().unwrap_or_else(|e| e.into_inner()))
    }

    // ========== Handle & Utilities ==========

    /// Get an emitter handle for publishers.
    pub fn emitter(&self) -> EventEmitter {
        EventEmitter {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Check if there are subscribers for event type E
    pub fn has_subscribers<E: Event>(&self) -> bool {
        self.inner
            .subscribers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&TypeId::of::<E>())
            .map(|v| !v.is_empty())
            .unwrap_or(false)
    }

    /// Check queue length
    pub fn queue_len(&self) -> usize {
        self.inner.queue.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    fn subscriber_type_count(&self) -> usize {
        self.inner.subscribers.read().map(|s| s.len()).unwrap_or(0)
    }
}

/// Publisher handle: emits into the bus it was taken from.
#[derive(Clone)]
pub struct EventEmitter {
    inner: Arc<BusInner>,
}

impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("queue_len", &self.inner.queue.lock().map(|q| q.len()).unwrap_or(0))
            .finish()
    }
}

impl EventEmitter {
    /// Emit event: invoke callbacks and queue for deferred processing
    pub fn emit<E: Event + Clone>(&self, event: E) {
        self.inner.dispatch(TypeId::of::<E>(), &event);
        self.inner.enqueue(Box::new(event));
    }
}

/// Optional emitter for components that may run without a bus (tests, tools).
#[derive(Clone, Default, Debug)]
pub struct SceneEmitter {
    inner: Option<EventEmitter>,
}

impl SceneEmitter {
    /// No-op emitter
    pub fn dummy() -> Self {
        Self { inner: None }
    }

    pub fn from_emitter(emitter: EventEmitter) -> Self {
        Self { inner: Some(emitter) }
    }

    /// Emit event (no-op if dummy)
    pub fn emit<E: Event + Clone>(&self, event: E) {
        if let Some(ref emitter) = self.inner {
            emitter.emit(event);
        }
    }
}

/// Registration handle returned by [`EventBus::subscribe`].
///
/// Detaches the callback on drop.
#[must_use = "dropping a Subscription immediately unsubscribes"]
#[derive(Debug)]
pub struct Subscription {
    bus: std::sync::Weak<BusInner>,
    type_id: TypeId,
    id: Option<u64>,
}

impl Subscription {
    /// Detach now instead of at drop.
    pub fn cancel(mut self) {
        self.detach();
    }

    pub fn is_active(&self) -> bool {
        self.id.is_some() && self.bus.strong_count() > 0
    }

    fn detach(&mut self) {
        if let Some(id) = self.id.take()
            && let Some(bus) = self.bus.upgrade()
        {
            bus.remove(self.type_id, id);
            trace!("EventBus: subscription {} released", id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.detach();
    }
}

/// Helper: downcast BoxedEvent to concrete type
///
/// Must deref to `dyn Event` before `as_any()`: the blanket impl also covers
/// `Box<dyn Event>` and would hand back the box's own TypeId.
#[inline]
pub fn downcast_event<E: Event>(event: &BoxedEvent) -> Option<&E> {
    (**event).as_any().downcast_ref::<E>()
}
