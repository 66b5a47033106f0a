//! UI Bindings
//!
//! Adapters that connect reactive refs to host-framework elements.
//!
//! - [`UiElement`]: what the host has to provide for an element
//! - [`BindableUi`]: property, visibility and event bindings for any element
//! - [`SingleValueBindableUi`]: adds an owned value for input-like elements
//! - [`EffectRefreshable`]: a container re-rendered when its inputs change
//! - [`Chart`]: chart option updates and click events

mod bindable;
mod chart;
mod element;
mod refreshable;
mod single_value;

#[cfg(test)]
pub(crate) mod mock;

pub use bindable::BindableUi;
pub use chart::{Chart, ChartClickEventArguments, CHART_CLICK_ARGS};
pub use element::{
    Edit, ElementId, EventHandler, EventOptions, PropValue, Slot, TextElement, UiElement,
    UiEventArguments,
};
pub use refreshable::{EffectRefreshable, RefreshOn, RefreshState};
pub use single_value::SingleValueBindableUi;
