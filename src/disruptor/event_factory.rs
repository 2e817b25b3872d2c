//! Event Factory Implementation
//!
//! The ring buffer calls its factory exactly once per slot while it is being
//! built, so every event is allocated up front and reused afterwards.

/// Factory for creating the events held by ring buffer slots
///
/// # Examples
/// ```
/// use slotring::disruptor::EventFactory;
///
/// struct MyEvent {
///     data: i64,
/// }
///
/// struct MyEventFactory;
///
/// impl EventFactory<MyEvent> for MyEventFactory {
///     fn new_instance(&self) -> MyEvent {
///         MyEvent { data: 0 }
///     }
/// }
/// ```
pub trait EventFactory<T>: Send + Sync {
    /// Create a new, independent event instance
    fn new_instance(&self) -> T;
}

/// Event factory that uses the Default trait
pub struct DefaultEventFactory<T: Default> {
    _phantom: std::marker::PhantomData<fn() -> T>,
}

impl<T: Default> DefaultEventFactory<T> {
    /// Create a factory that fills every slot with `T::default()`
    pub fn new() -> Self {
        Self {
            _phantom: std::marker::PhantomData,
        }
    }
}

impl<T: Default> Default for DefaultEventFactory<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Default> EventFactory<T> for DefaultEventFactory<T> {
    fn new_instance(&self) -> T {
        T::default()
    }
}

/// Event factory that uses a closure to create events
pub struct ClosureEventFactory<T, F>
where
    F: Fn() -> T + Send + Sync,
{
    factory_fn: F,
    _phantom: std::marker::PhantomData<fn() -> T>,
}

impl<T, F> ClosureEventFactory<T, F>
where
    F: Fn() -> T + Send + Sync,
{
    /// Create a factory from a closure
    ///
    /// # Arguments
    /// * `factory_fn` - Called once per slot to build its event
    pub fn new(factory_fn: F) -> Self {
        Self {
            factory_fn,
            _phantom: std::marker::PhantomData,
        }
    }
}

impl<T, F> EventFactory<T> for ClosureEventFactory<T, F>
where
    F: Fn() -> T + Send + Sync,
{
    fn new_instance(&self) -> T {
        (self.factory_fn)()
    }
}

/// Event factory that clones a prototype event
pub struct CloneEventFactory<T: Clone> {
    prototype: T,
}

impl<T: Clone> CloneEventFactory<T> {
    /// Create a factory that clones `prototype` into every slot
    ///
    /// # Arguments
    /// * `prototype` - The event each slot starts out as
    pub fn new(prototype: T) -> Self {
        Self { prototype }
    }
}

impl<T: Clone + Send + Sync> EventFactory<T> for CloneEventFactory<T> {
    fn new_instance(&self) -> T {
        self.prototype.clone()
    }
}

/// Convenience function to create an event factory from a closure
///
/// # Examples
/// ```
/// use slotring::disruptor::{event_factory, EventFactory};
///
/// let factory = event_factory(|| vec![0u8; 64]);
/// assert_eq!(factory.new_instance().len(), 64);
/// ```
pub fn event_factory<T, F>(factory_fn: F) -> ClosureEventFactory<T, F>
where
    F: Fn() -> T + Send + Sync,
{
    ClosureEventFactory::new(factory_fn)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Default, Clone, PartialEq)]
    struct TestEvent {
        value: i64,
        name: String,
    }

    #[test]
    fn test_default_event_factory() {
        let factory = DefaultEventFactory::<TestEvent>::new();
        assert_eq!(factory.new_instance(), TestEvent::default());
    }

    #[test]
    fn test_closure_factory_is_called_per_instance() {
        let calls = AtomicUsize::new(0);
        let factory = ClosureEventFactory::new(|| {
            let n = calls.fetch_add(1, Ordering::Relaxed);
            TestEvent {
                value: n as i64,
                name: format!("event-{n}"),
            }
        });

        let first = factory.new_instance();
        let second = factory.new_instance();
        assert_eq!(first.value, 0);
        assert_eq!(second.name, "event-1");
        assert_eq!(calls.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn test_clone_event_factory_instances_are_independent() {
        let prototype = TestEvent {
            value: 100,
            name: "prototype".to_string(),
        };
        let factory = CloneEventFactory::new(prototype.clone());

        let mut first = factory.new_instance();
        let second = factory.new_instance();
        first.value = 999;

        assert_ne!(first, second);
        assert_eq!(second, prototype);
    }
}
