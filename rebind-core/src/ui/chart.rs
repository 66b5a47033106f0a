//! Chart Events
//!
//! Chart elements report clicks as loosely shaped JSON. [`Chart`] registers
//! the click events with the argument list the chart client understands and
//! marshals the payload into [`ChartClickEventArguments`].

use std::cell::RefCell;
use std::ops::{Deref, DerefMut};
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use super::bindable::{with_element, BindableUi};
use super::element::{ElementId, EventOptions, UiElement, UiEventArguments};
use crate::error::Result;
use crate::reactive::ReactiveScope;

/// Event arguments requested for both click events.
pub const CHART_CLICK_ARGS: [&str; 10] = [
    "componentType",
    "seriesType",
    "seriesIndex",
    "seriesName",
    "name",
    "dataIndex",
    "data",
    "dataType",
    "value",
    "color",
];

/// A click on a chart data item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartClickEventArguments {
    /// Filled from the event, not the payload.
    #[serde(skip_deserializing, default)]
    pub sender: ElementId,
    pub component_type: String,
    pub series_type: String,
    pub series_index: i64,
    pub series_name: String,
    pub name: String,
    pub data_index: i64,
    pub data: Value,
    /// Only present for some series types (graph nodes vs edges).
    #[serde(default)]
    pub data_type: Option<String>,
    pub value: Value,
    pub color: String,
}

impl ChartClickEventArguments {
    /// Decode a raw `chartClick` event.
    pub fn from_event(event: &UiEventArguments) -> Result<Self> {
        let mut args = Self::deserialize(&event.args)?;
        args.sender = event.sender;
        Ok(args)
    }
}

/// Adapter for chart elements.
pub struct Chart<E: UiElement> {
    base: BindableUi<E>,
}

impl<E: UiElement> Chart<E> {
    pub fn new(scope: &ReactiveScope, element: E) -> Self {
        Self {
            base: BindableUi::new(scope, element),
        }
    }

    /// Merge `options` into the chart. `opts` carries the merge flags
    /// (`notMerge`, `lazyUpdate`, ...).
    pub fn update_options(&mut self, options: Value, opts: Option<Value>) -> &mut Self {
        let element: &Rc<RefCell<E>> = self.base.shared_element();
        with_element(element, |el| {
            el.run_method("updateOptions", vec![options, opts.unwrap_or(Value::Null)]);
            el.update();
        });
        self
    }

    /// Call `handler` for every click on a data item. Payloads that do not
    /// decode are dropped with a warning.
    pub fn on_chart_click(
        &mut self,
        mut handler: impl FnMut(ChartClickEventArguments) + 'static,
    ) -> &mut Self {
        self.base.on_with(
            "chartClick",
            move |event: &UiEventArguments| match ChartClickEventArguments::from_event(event) {
                Ok(args) => handler(args),
                Err(err) => warn!(sender = %event.sender, %err, "dropping malformed chart click"),
            },
            Some(&CHART_CLICK_ARGS[..]),
            EventOptions::default(),
        );
        self
    }

    /// Call `handler` for clicks on empty chart area.
    pub fn on_chart_click_blank(
        &mut self,
        mut handler: impl FnMut(UiEventArguments) + 'static,
    ) -> &mut Self {
        self.base.on_with(
            "chartClickBlank",
            move |event: &UiEventArguments| handler(UiEventArguments::from_sender(event.sender)),
            Some(&CHART_CLICK_ARGS[..]),
            EventOptions::default(),
        );
        self
    }
}

impl<E: UiElement> Deref for Chart<E> {
    type Target = BindableUi<E>;

    fn deref(&self) -> &Self::Target {
        &self.base
    }
}

impl<E: UiElement> DerefMut for Chart<E> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.base
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::error::ReactiveError;
    use crate::ui::mock::{emit, MockElement};

    fn payload() -> Value {
        json!({
            "componentType": "series",
            "seriesType": "bar",
            "seriesIndex": 0,
            "seriesName": "sales",
            "name": "Mon",
            "dataIndex": 2,
            "data": {"value": 120},
            "value": 120,
            "color": "#5470c6"
        })
    }

    #[test]
    fn missing_data_type_becomes_none() {
        let event = UiEventArguments::new(ElementId::from(3), payload());
        let args = ChartClickEventArguments::from_event(&event).unwrap();

        assert_eq!(args.sender, ElementId::from(3));
        assert_eq!(args.component_type, "series");
        assert_eq!(args.series_type, "bar");
        assert_eq!(args.series_index, 0);
        assert_eq!(args.series_name, "sales");
        assert_eq!(args.name, "Mon");
        assert_eq!(args.data_index, 2);
        assert_eq!(args.data, json!({"value": 120}));
        assert_eq!(args.data_type, None);
        assert_eq!(args.value, json!(120));
        assert_eq!(args.color, "#5470c6");
    }

    #[test]
    fn present_data_type_is_kept() {
        let mut raw = payload();
        raw["dataType"] = json!("edge");
        let event = UiEventArguments::new(ElementId::from(1), raw);
        let args = ChartClickEventArguments::from_event(&event).unwrap();
        assert_eq!(args.data_type.as_deref(), Some("edge"));
    }

    #[test]
    fn missing_required_field_fails() {
        let mut raw = payload();
        raw.as_object_mut().unwrap().remove("color");
        let event = UiEventArguments::new(ElementId::from(1), raw);
        let result = ChartClickEventArguments::from_event(&event);
        assert!(matches!(result, Err(ReactiveError::Serialize(_))));
    }

    #[test]
    fn update_options_runs_method_then_updates() {
        let scope = ReactiveScope::new();
        let mut chart = Chart::new(&scope, MockElement::new(1));

        chart.update_options(json!({"series": []}), Some(json!({"notMerge": true})));

        let el = chart.element();
        assert_eq!(
            el.methods,
            vec![(
                "updateOptions".to_string(),
                vec![json!({"series": []}), json!({"notMerge": true})]
            )]
        );
        assert_eq!(el.updates, 1);
    }

    #[test]
    fn chart_click_handlers_receive_decoded_payloads() {
        let scope = ReactiveScope::new();
        let clicked = scope.create_ref(Vec::<String>::new());
        let mut chart = Chart::new(&scope, MockElement::new(5));

        {
            let clicked = clicked.clone();
            chart.on_chart_click(move |args| {
                let _ = clicked.update(|names| names.push(args.name));
            });
        }
        {
            let clicked = clicked.clone();
            chart.on_chart_click_blank(move |args| {
                assert_eq!(args.args, Value::Null);
                let _ = clicked.update(|names| names.push(format!("blank {}", args.sender)));
            });
        }

        let registered = chart.element().handlers[0].args.clone();
        assert_eq!(registered.map(|a| a.len()), Some(CHART_CLICK_ARGS.len()));

        emit(chart.shared_element(), "chartClick", payload());
        emit(chart.shared_element(), "chartClick", json!({"name": "partial"}));
        emit(chart.shared_element(), "chartClickBlank", json!({"ignored": true}));

        assert_eq!(clicked.get(), vec!["Mon".to_string(), "blank element#5".to_string()]);
    }
}
