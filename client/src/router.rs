//! Type-keyed dispatch of decoded server messages.
//!
//! Consumers register a [`Handler`] per [`MessageKind`] and receive a
//! [`Subscription`] back. Dropping the subscription unregisters the handler,
//! which is how a session detaches everything it installed on teardown.

use crate::error::HandlerError;
use log::{debug, warn};
use shared::{MessageKind, ServerMessage};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};
use std::time::Instant;

/// A decoded message together with the moment the transport delivered it.
#[derive(Debug, Clone)]
pub struct Inbound {
    pub message: ServerMessage,
    pub received_at: Instant,
}

impl Inbound {
    pub fn new(message: ServerMessage, received_at: Instant) -> Self {
        Self {
            message,
            received_at,
        }
    }

    pub fn kind(&self) -> MessageKind {
        self.message.kind()
    }
}

type HandlerFn = dyn Fn(&Inbound) -> Result<(), HandlerError>;

/// Shared callback. Clones refer to the same handler for registration purposes.
#[derive(Clone)]
pub struct Handler(Rc<HandlerFn>);

impl Handler {
    pub fn new(callback: impl Fn(&Inbound) -> Result<(), HandlerError> + 'static) -> Self {
        Self(Rc::new(callback))
    }

    pub fn same(&self, other: &Handler) -> bool {
        Rc::as_ptr(&self.0) as *const () == Rc::as_ptr(&other.0) as *const ()
    }

    fn call(&self, inbound: &Inbound) -> Result<(), HandlerError> {
        (self.0)(inbound)
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handler({:p})", Rc::as_ptr(&self.0) as *const ())
    }
}

#[derive(Default)]
struct Registry {
    handlers: HashMap<MessageKind, Vec<Handler>>,
}

impl Registry {
    fn remove(&mut self, kind: MessageKind, handler: &Handler) -> bool {
        let Some(list) = self.handlers.get_mut(&kind) else {
            return false;
        };
        let Some(index) = list.iter().position(|existing| existing.same(handler)) else {
            return false;
        };
        list.remove(index);
        if list.is_empty() {
            self.handlers.remove(&kind);
        }
        true
    }
}

#[derive(Clone, Default)]
pub struct MessageRouter {
    registry: Rc<RefCell<Registry>>,
}

impl MessageRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `kind`.
    ///
    /// Registering a handler that is already present for the same kind changes
    /// nothing and returns an inert subscription.
    pub fn on(&self, kind: MessageKind, handler: Handler) -> Subscription {
        let mut registry = self.registry.borrow_mut();
        let list = registry.handlers.entry(kind).or_default();

        if list.iter().any(|existing| existing.same(&handler)) {
            debug!("Handler already registered for {}", kind);
            return Subscription::inert(kind);
        }

        list.push(handler.clone());
        Subscription {
            registry: Rc::downgrade(&self.registry),
            kind,
            handler: Some(handler),
        }
    }

    pub fn off(&self, kind: MessageKind, handler: &Handler) -> bool {
        self.registry.borrow_mut().remove(kind, handler)
    }

    /// Runs every handler registered for the message's kind, in registration
    /// order. Handler failures are logged and do not stop later handlers.
    ///
    /// Handlers added or removed while dispatching take effect from the next
    /// dispatch on.
    pub fn dispatch(&self, inbound: &Inbound) -> usize {
        let kind = inbound.kind();
        let snapshot: Vec<Handler> = match self.registry.borrow().handlers.get(&kind) {
            Some(list) => list.clone(),
            None => {
                debug!("No handlers registered for {}", kind);
                return 0;
            }
        };

        for handler in &snapshot {
            if let Err(e) = handler.call(inbound) {
                warn!("Handler for {} failed: {}", kind, e);
            }
        }

        snapshot.len()
    }

    /// Drops every registration. Outstanding subscriptions become inert.
    pub fn reset_all(&self) -> usize {
        let mut registry = self.registry.borrow_mut();
        let removed = registry.handlers.values().map(Vec::len).sum();
        registry.handlers.clear();
        removed
    }

    pub fn handler_count(&self, kind: MessageKind) -> usize {
        self.registry
            .borrow()
            .handlers
            .get(&kind)
            .map_or(0, Vec::len)
    }

    pub fn registered_kinds(&self) -> Vec<MessageKind> {
        let mut kinds: Vec<MessageKind> = self.registry.borrow().handlers.keys().copied().collect();
        kinds.sort();
        kinds
    }

    pub fn is_empty(&self) -> bool {
        self.registry.borrow().handlers.is_empty()
    }
}

/// Scoped registration. Unregisters its handler when dropped.
#[must_use = "dropping a Subscription unregisters its handler"]
pub struct Subscription {
    registry: Weak<RefCell<Registry>>,
    kind: MessageKind,
    handler: Option<Handler>,
}

impl Subscription {
    fn inert(kind: MessageKind) -> Self {
        Self {
            registry: Weak::new(),
            kind,
            handler: None,
        }
    }

    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    /// False for duplicate registrations and after the router was reset.
    pub fn is_active(&self) -> bool {
        match (&self.handler, self.registry.upgrade()) {
            (Some(handler), Some(registry)) => registry
                .borrow()
                .handlers
                .get(&self.kind)
                .is_some_and(|list| list.iter().any(|existing| existing.same(handler))),
            _ => false,
        }
    }

    pub fn cancel(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let (Some(handler), Some(registry)) = (self.handler.take(), self.registry.upgrade()) {
            registry.borrow_mut().remove(self.kind, &handler);
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("kind", &self.kind)
            .field("handler", &self.handler)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::protocol::{PlayerLeft, RoomShutdown};
    use std::cell::Cell;

    fn left(username: &str) -> Inbound {
        Inbound::new(
            ServerMessage::PlayerLeft(PlayerLeft {
                username: username.to_string(),
            }),
            Instant::now(),
        )
    }

    fn recorder(log: &Rc<RefCell<Vec<&'static str>>>, label: &'static str) -> Handler {
        let log = Rc::clone(log);
        Handler::new(move |_| {
            log.borrow_mut().push(label);
            Ok(())
        })
    }

    #[test]
    fn test_dispatch_in_registration_order() {
        let router = MessageRouter::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let _a = router.on(MessageKind::PlayerLeft, recorder(&log, "a"));
        let _b = router.on(MessageKind::PlayerLeft, recorder(&log, "b"));
        let _c = router.on(MessageKind::PlayerLeft, recorder(&log, "c"));

        assert_eq!(router.dispatch(&left("bob")), 3);
        assert_eq!(*log.borrow(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_duplicate_registration_is_noop() {
        let router = MessageRouter::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let handler = recorder(&log, "once");

        let first = router.on(MessageKind::PlayerLeft, handler.clone());
        let second = router.on(MessageKind::PlayerLeft, handler.clone());

        assert!(first.is_active());
        assert!(!second.is_active());
        assert_eq!(router.handler_count(MessageKind::PlayerLeft), 1);

        drop(second);
        assert_eq!(router.handler_count(MessageKind::PlayerLeft), 1);

        router.dispatch(&left("bob"));
        assert_eq!(log.borrow().len(), 1);
    }

    #[test]
    fn test_same_handler_on_two_kinds() {
        let router = MessageRouter::new();
        let handler = Handler::new(|_| Ok(()));
        let _a = router.on(MessageKind::PlayerLeft, handler.clone());
        let _b = router.on(MessageKind::RoomShutdown, handler);
        assert_eq!(
            router.registered_kinds(),
            vec![MessageKind::PlayerLeft, MessageKind::RoomShutdown]
        );
    }

    #[test]
    fn test_off_removes_empty_entry() {
        let router = MessageRouter::new();
        let handler = Handler::new(|_| Ok(()));
        let subscription = router.on(MessageKind::PlayerLeft, handler.clone());

        assert!(router.off(MessageKind::PlayerLeft, &handler));
        assert!(!router.off(MessageKind::PlayerLeft, &handler));
        assert!(router.registered_kinds().is_empty());
        assert!(!subscription.is_active());
    }

    #[test]
    fn test_failing_handler_does_not_block_others() {
        let router = MessageRouter::new();
        let calls = Rc::new(Cell::new(0));

        let _bad = router.on(
            MessageKind::PlayerLeft,
            Handler::new(|_| Err(HandlerError::new("test", "boom"))),
        );
        let counter = Rc::clone(&calls);
        let _good = router.on(
            MessageKind::PlayerLeft,
            Handler::new(move |_| {
                counter.set(counter.get() + 1);
                Ok(())
            }),
        );

        assert_eq!(router.dispatch(&left("bob")), 2);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_subscription_drop_unregisters() {
        let router = MessageRouter::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        {
            let _scoped = router.on(MessageKind::PlayerLeft, recorder(&log, "scoped"));
            assert_eq!(router.handler_count(MessageKind::PlayerLeft), 1);
        }
        assert!(router.is_empty());
        assert_eq!(router.dispatch(&left("bob")), 0);
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_reset_all_is_idempotent() {
        let router = MessageRouter::new();
        let first = router.on(MessageKind::PlayerLeft, Handler::new(|_| Ok(())));
        let _second = router.on(MessageKind::RoomShutdown, Handler::new(|_| Ok(())));

        assert_eq!(router.reset_all(), 2);
        let kinds_after_once = router.registered_kinds();
        assert_eq!(router.reset_all(), 0);
        assert_eq!(router.registered_kinds(), kinds_after_once);
        assert!(router.is_empty());
        assert!(!first.is_active());
    }

    #[test]
    fn test_registration_during_dispatch_applies_next_time() {
        let router = MessageRouter::new();
        let late_calls = Rc::new(Cell::new(0));
        let held: Rc<RefCell<Vec<Subscription>>> = Rc::new(RefCell::new(Vec::new()));

        let router_in_handler = router.clone();
        let counter = Rc::clone(&late_calls);
        let holder = Rc::clone(&held);
        let late = Handler::new(move |_| {
            counter.set(counter.get() + 1);
            Ok(())
        });
        let _installer = router.on(
            MessageKind::RoomShutdown,
            Handler::new(move |_| {
                let subscription = router_in_handler.on(MessageKind::RoomShutdown, late.clone());
                holder.borrow_mut().push(subscription);
                Ok(())
            }),
        );

        let shutdown = Inbound::new(
            ServerMessage::RoomShutdown(RoomShutdown {
                reason: "restart".into(),
            }),
            Instant::now(),
        );
        assert_eq!(router.dispatch(&shutdown), 1);
        assert_eq!(late_calls.get(), 0);
        assert_eq!(router.dispatch(&shutdown), 2);
        assert_eq!(late_calls.get(), 1);
    }
}
