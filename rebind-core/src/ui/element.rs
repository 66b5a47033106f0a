//! Element Interface
//!
//! The binding layer never renders anything itself. It drives a retained-mode
//! element owned by a host framework through [`UiElement`], and receives user
//! interaction back through boxed event handlers.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ElementError;

/// Value stored in an element property.
pub type PropValue = Value;

/// Host-assigned element identity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementId(u64);

impl ElementId {
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl From<u64> for ElementId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "element#{}", self.0)
    }
}

/// Raw event payload delivered by the host.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UiEventArguments {
    pub sender: ElementId,
    /// The requested event arguments, usually an object keyed by argument name
    /// or an array of positional values.
    #[serde(default)]
    pub args: Value,
}

impl UiEventArguments {
    pub fn new(sender: ElementId, args: Value) -> Self {
        Self { sender, args }
    }

    /// An event carrying nothing but its sender.
    pub fn from_sender(sender: ElementId) -> Self {
        Self {
            sender,
            args: Value::Null,
        }
    }
}

/// Callback registered for a host event.
pub type EventHandler = Box<dyn FnMut(&UiEventArguments)>;

/// Delivery options forwarded to the host when registering a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventOptions {
    /// Minimum interval between deliveries. Zero disables throttling.
    pub throttle: Duration,
    pub leading_events: bool,
    pub trailing_events: bool,
}

impl Default for EventOptions {
    fn default() -> Self {
        Self {
            throttle: Duration::ZERO,
            leading_events: true,
            trailing_events: true,
        }
    }
}

/// A change to a whitespace- or semicolon-separated attribute list (props,
/// classes, inline style).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Edit<'a> {
    pub add: Option<&'a str>,
    pub remove: Option<&'a str>,
    pub replace: Option<&'a str>,
}

impl<'a> Edit<'a> {
    pub fn add(items: &'a str) -> Self {
        Self {
            add: Some(items),
            ..Self::default()
        }
    }

    pub fn remove(items: &'a str) -> Self {
        Self {
            remove: Some(items),
            ..Self::default()
        }
    }

    pub fn replace(items: &'a str) -> Self {
        Self {
            replace: Some(items),
            ..Self::default()
        }
    }
}

/// A named slot added to an element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot {
    pub element: ElementId,
    pub name: String,
    pub template: Option<String>,
}

/// Elements that display text and want to hear when it changes.
pub trait TextElement {
    fn on_text_change(&mut self, text: &str);
}

/// A retained-mode element owned by the host framework.
///
/// `set_prop`, `set_visibility` and the attribute edits only stage changes;
/// `update` asks the host to re-render.
pub trait UiElement: 'static {
    fn id(&self) -> ElementId;

    fn set_prop(&mut self, name: &str, value: PropValue) -> Result<(), ElementError>;

    fn set_visibility(&mut self, visible: bool);

    fn update(&mut self);

    /// Register `handler` for `event`. `args` restricts which event arguments
    /// the host forwards.
    fn on(
        &mut self,
        event: &str,
        handler: EventHandler,
        args: Option<&[&str]>,
        options: EventOptions,
    );

    fn props(&mut self, edit: Edit<'_>);

    fn classes(&mut self, edit: Edit<'_>);

    fn style(&mut self, edit: Edit<'_>);

    fn tooltip(&mut self, text: &str);

    fn add_slot(&mut self, name: &str, template: Option<&str>) -> Slot;

    /// Remove all children.
    fn clear(&mut self);

    /// Invoke a client-side method on the element.
    fn run_method(&mut self, name: &str, args: Vec<Value>);

    /// The text capability, for elements that have one.
    fn as_text_element(&mut self) -> Option<&mut dyn TextElement> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_options_default_to_unthrottled() {
        let options = EventOptions::default();
        assert_eq!(options.throttle, Duration::ZERO);
        assert!(options.leading_events && options.trailing_events);
    }

    #[test]
    fn element_id_serializes_as_number() {
        let id = ElementId::from(12);
        assert_eq!(serde_json::to_value(id).unwrap(), serde_json::json!(12));
        assert_eq!(id.to_string(), "element#12");
    }

    #[test]
    fn edit_constructors_fill_one_field() {
        assert_eq!(Edit::add("a b").add, Some("a b"));
        assert_eq!(Edit::remove("a").add, None);
        assert_eq!(Edit::replace("c").replace, Some("c"));
    }
}
