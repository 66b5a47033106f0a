//! Recording element for unit tests.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use serde_json::Value;

use super::element::{
    Edit, ElementId, EventHandler, EventOptions, PropValue, Slot, TextElement, UiElement,
    UiEventArguments,
};
use crate::error::ElementError;

pub(crate) struct Registration {
    pub(crate) event: String,
    pub(crate) handler: Option<EventHandler>,
    pub(crate) args: Option<Vec<String>>,
    pub(crate) options: EventOptions,
}

#[derive(Default)]
pub(crate) struct MockElement {
    pub(crate) id: ElementId,
    pub(crate) props: HashMap<String, PropValue>,
    pub(crate) visible: Option<bool>,
    pub(crate) updates: usize,
    pub(crate) handlers: Vec<Registration>,
    pub(crate) attribute_edits: Vec<String>,
    pub(crate) tooltip: Option<String>,
    pub(crate) slots: Vec<Slot>,
    pub(crate) cleared: usize,
    pub(crate) methods: Vec<(String, Vec<Value>)>,
    pub(crate) texts: Vec<String>,
    pub(crate) text_capable: bool,
    pub(crate) rejected: Vec<String>,
}

impl MockElement {
    pub(crate) fn new(id: u64) -> Self {
        Self {
            id: ElementId::from(id),
            ..Self::default()
        }
    }

    pub(crate) fn with_text(id: u64) -> Self {
        Self {
            text_capable: true,
            ..Self::new(id)
        }
    }

    pub(crate) fn rejecting(id: u64, prop: &str) -> Self {
        Self {
            rejected: vec![prop.to_string()],
            ..Self::new(id)
        }
    }

    pub(crate) fn prop(&self, name: &str) -> Option<&PropValue> {
        self.props.get(name)
    }
}

fn describe(kind: &str, edit: Edit<'_>) -> String {
    format!("{kind} add={:?} remove={:?} replace={:?}", edit.add, edit.remove, edit.replace)
}

impl UiElement for MockElement {
    fn id(&self) -> ElementId {
        self.id
    }

    fn set_prop(&mut self, name: &str, value: PropValue) -> Result<(), ElementError> {
        if self.rejected.iter().any(|p| p == name) {
            return Err(ElementError::UnsupportedProperty {
                element: self.id,
                prop: name.to_string(),
            });
        }
        self.props.insert(name.to_string(), value);
        Ok(())
    }

    fn set_visibility(&mut self, visible: bool) {
        self.visible = Some(visible);
    }

    fn update(&mut self) {
        self.updates += 1;
    }

    fn on(
        &mut self,
        event: &str,
        handler: EventHandler,
        args: Option<&[&str]>,
        options: EventOptions,
    ) {
        self.handlers.push(Registration {
            event: event.to_string(),
            handler: Some(handler),
            args: args.map(|a| a.iter().map(|s| s.to_string()).collect()),
            options,
        });
    }

    fn props(&mut self, edit: Edit<'_>) {
        self.attribute_edits.push(describe("props", edit));
    }

    fn classes(&mut self, edit: Edit<'_>) {
        self.attribute_edits.push(describe("classes", edit));
    }

    fn style(&mut self, edit: Edit<'_>) {
        self.attribute_edits.push(describe("style", edit));
    }

    fn tooltip(&mut self, text: &str) {
        self.tooltip = Some(text.to_string());
    }

    fn add_slot(&mut self, name: &str, template: Option<&str>) -> Slot {
        let slot = Slot {
            element: self.id,
            name: name.to_string(),
            template: template.map(str::to_string),
        };
        self.slots.push(slot.clone());
        slot
    }

    fn clear(&mut self) {
        self.cleared += 1;
    }

    fn run_method(&mut self, name: &str, args: Vec<Value>) {
        self.methods.push((name.to_string(), args));
    }

    fn as_text_element(&mut self) -> Option<&mut dyn TextElement> {
        if self.text_capable {
            Some(self)
        } else {
            None
        }
    }
}

impl TextElement for MockElement {
    fn on_text_change(&mut self, text: &str) {
        self.texts.push(text.to_string());
    }
}

/// Deliver `args` to every handler registered for `event`.
///
/// Handlers are taken out of the element while they run so they can borrow
/// it themselves.
pub(crate) fn emit(element: &Rc<RefCell<MockElement>>, event: &str, args: Value) {
    let (sender, mut taken) = {
        let mut el = element.borrow_mut();
        let sender = el.id;
        let taken: Vec<(usize, EventHandler)> = el
            .handlers
            .iter_mut()
            .enumerate()
            .filter(|(_, r)| r.event == event)
            .filter_map(|(i, r)| r.handler.take().map(|h| (i, h)))
            .collect();
        (sender, taken)
    };

    let event_args = UiEventArguments::new(sender, args);
    for (_, handler) in &mut taken {
        handler(&event_args);
    }

    let mut el = element.borrow_mut();
    for (i, handler) in taken {
        el.handlers[i].handler = Some(handler);
    }
}
