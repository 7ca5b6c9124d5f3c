//! Change notification for leadsheet observers
//!
//! Each leadsheet owns one `NotificationBus`. Observers implement
//! `LeadSheetListener` and register with `ChordLeadSheet::subscribe`, keeping
//! the returned `Subscription` alive for as long as they want events.
//! The bus only holds weak references: dropping either the observer or its
//! subscription stops delivery.
//!
//! Delivery is synchronous, in mutation order, on the mutating thread.
//! Listeners receive the sheet by shared reference, so they can query it but
//! cannot mutate it from inside a callback. A listener that returns an error
//! or panics is logged and skipped; the remaining listeners still run.

use super::ChordLeadSheet;
use crate::models::{Item, ItemData, Position};
use serde::Serialize;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::rc::{Rc, Weak};
use thiserror::Error;

/// A structured change raised by a leadsheet mutation
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum ChangeEvent {
    ItemAdded { item: Item },
    ItemRemoved { item: Item },
    /// `item` carries the new payload
    ItemChanged { item: Item, old_data: ItemData },
    /// `item` carries the new position
    ItemMoved { item: Item, old_position: Position },
    SizeChanged { old_size: u32, new_size: u32 },
    /// Raised once when a non-empty transaction is committed
    EditCommitted { label: String },
}

/// Error reported by a listener; logged and swallowed by the bus
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ListenerError(pub String);

impl From<&str> for ListenerError {
    fn from(msg: &str) -> Self {
        ListenerError(msg.to_string())
    }
}

impl From<String> for ListenerError {
    fn from(msg: String) -> Self {
        ListenerError(msg)
    }
}

/// Observer of a leadsheet
///
/// Every handler has a no-op default, so listeners only implement what they
/// care about. Listeners that prefer a single entry point can override
/// `on_change` instead.
#[allow(unused_variables)]
pub trait LeadSheetListener {
    fn item_added(&self, sheet: &ChordLeadSheet, item: &Item) -> Result<(), ListenerError> {
        Ok(())
    }

    fn item_removed(&self, sheet: &ChordLeadSheet, item: &Item) -> Result<(), ListenerError> {
        Ok(())
    }

    fn item_changed(
        &self,
        sheet: &ChordLeadSheet,
        item: &Item,
        old_data: &ItemData,
    ) -> Result<(), ListenerError> {
        Ok(())
    }

    fn item_moved(
        &self,
        sheet: &ChordLeadSheet,
        item: &Item,
        old_position: Position,
    ) -> Result<(), ListenerError> {
        Ok(())
    }

    fn size_changed(
        &self,
        sheet: &ChordLeadSheet,
        old_size: u32,
        new_size: u32,
    ) -> Result<(), ListenerError> {
        Ok(())
    }

    fn edit_committed(&self, sheet: &ChordLeadSheet, label: &str) -> Result<(), ListenerError> {
        Ok(())
    }

    /// Route an event to the matching handler
    fn on_change(&self, sheet: &ChordLeadSheet, event: &ChangeEvent) -> Result<(), ListenerError> {
        match event {
            ChangeEvent::ItemAdded { item } => self.item_added(sheet, item),
            ChangeEvent::ItemRemoved { item } => self.item_removed(sheet, item),
            ChangeEvent::ItemChanged { item, old_data } => self.item_changed(sheet, item, old_data),
            ChangeEvent::ItemMoved { item, old_position } => {
                self.item_moved(sheet, item, *old_position)
            }
            ChangeEvent::SizeChanged { old_size, new_size } => {
                self.size_changed(sheet, *old_size, *new_size)
            }
            ChangeEvent::EditCommitted { label } => self.edit_committed(sheet, label),
        }
    }
}

struct Registration {
    id: u64,
    listener: Weak<dyn LeadSheetListener>,
}

type Registry = Rc<RefCell<Vec<Registration>>>;

/// Multicast channel owned by one leadsheet
pub struct NotificationBus {
    registry: Registry,
    next_id: Cell<u64>,
}

impl NotificationBus {
    pub fn new() -> Self {
        Self {
            registry: Rc::new(RefCell::new(Vec::new())),
            next_id: Cell::new(1),
        }
    }

    /// Register a listener; delivery stops when the subscription is dropped
    pub fn subscribe<L>(&self, listener: &Rc<L>) -> Subscription
    where
        L: LeadSheetListener + 'static,
    {
        let id = self.next_id.get();
        self.next_id.set(id + 1);

        let listener: Rc<dyn LeadSheetListener> = listener.clone();
        self.registry.borrow_mut().push(Registration {
            id,
            listener: Rc::downgrade(&listener),
        });
        log::debug!("Listener {} subscribed", id);

        Subscription {
            id,
            registry: Rc::downgrade(&self.registry),
        }
    }

    /// Number of registered listeners still alive
    pub fn listener_count(&self) -> usize {
        self.registry
            .borrow()
            .iter()
            .filter(|reg| reg.listener.strong_count() > 0)
            .count()
    }

    /// Deliver an event to every live listener, in registration order
    pub fn dispatch(&self, sheet: &ChordLeadSheet, event: &ChangeEvent) {
        // Snapshot first so listeners may subscribe or unsubscribe while running
        let listeners: Vec<(u64, Rc<dyn LeadSheetListener>)> = {
            let mut registry = self.registry.borrow_mut();
            registry.retain(|reg| reg.listener.strong_count() > 0);
            registry
                .iter()
                .filter_map(|reg| reg.listener.upgrade().map(|l| (reg.id, l)))
                .collect()
        };

        for (id, listener) in listeners {
            let outcome =
                panic::catch_unwind(AssertUnwindSafe(|| listener.on_change(sheet, event)));
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(err)) => log::warn!("Listener {} failed on {:?}: {}", id, event, err),
                Err(_) => log::warn!("Listener {} panicked on {:?}", id, event),
            }
        }
    }
}

impl Default for NotificationBus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for NotificationBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationBus")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

/// Guard returned by `subscribe`; unsubscribes on drop
#[must_use = "the listener is unsubscribed as soon as the subscription is dropped"]
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    registry: Weak<RefCell<Vec<Registration>>>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Unsubscribe now (same as dropping)
    pub fn cancel(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            if let Ok(mut registry) = registry.try_borrow_mut() {
                registry.retain(|reg| reg.id != self.id);
                log::debug!("Listener {} unsubscribed", self.id);
            }
        }
    }
}
