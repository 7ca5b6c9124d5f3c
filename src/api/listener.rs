//! JavaScript change listeners
//!
//! A JS callback is wrapped in a `JsListener` and registered on the sheet's
//! notification bus. The returned `ListenerHandle` owns both the listener and
//! its subscription: the callback stays registered until the handle is
//! unsubscribed or freed from JS.
//!
//! Callbacks run while the editor is borrowed by the mutating call, so they
//! must not call back into the same `LeadSheetEditor` synchronously. The
//! event payload carries the affected item for that reason.

use crate::api::helpers::serialize;
use crate::leadsheet::{ChangeEvent, ChordLeadSheet, LeadSheetListener, ListenerError, Subscription};
use std::rc::Rc;
use wasm_bindgen::prelude::*;

pub struct JsListener {
    callback: js_sys::Function,
}

impl JsListener {
    pub fn new(callback: js_sys::Function) -> Self {
        Self { callback }
    }
}

impl LeadSheetListener for JsListener {
    fn on_change(&self, _sheet: &ChordLeadSheet, event: &ChangeEvent) -> Result<(), ListenerError> {
        let value = serialize(event, "Event serialization error")
            .map_err(|e| ListenerError(format!("{:?}", e)))?;
        self.callback
            .call1(&JsValue::NULL, &value)
            .map(|_| ())
            .map_err(|e| ListenerError(format!("JS listener threw: {:?}", e)))
    }
}

/// Keeps a JS listener registered
#[wasm_bindgen]
pub struct ListenerHandle {
    listener: Rc<JsListener>,
    subscription: Option<Subscription>,
}

impl ListenerHandle {
    pub(crate) fn new(listener: Rc<JsListener>, subscription: Subscription) -> Self {
        Self {
            listener,
            subscription: Some(subscription),
        }
    }
}

#[wasm_bindgen]
impl ListenerHandle {
    /// Stop delivering events to the callback; safe to call twice
    pub fn unsubscribe(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            wasm_log!(
                "Listener {} unsubscribed ({} handle refs)",
                subscription.id(),
                Rc::strong_count(&self.listener)
            );
            subscription.cancel();
        }
    }

    #[wasm_bindgen(getter, js_name = isActive)]
    pub fn is_active(&self) -> bool {
        self.subscription.is_some()
    }
}
