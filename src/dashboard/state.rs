//! View state and the pure transition function behind the map UI.

use std::collections::BTreeMap;

use crate::geofile::feature::Feature;

/// Reference to the feature currently shown in the inspection panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub layer_id: String,
    pub feature_idx: usize,
}

/// Everything the map view needs to render: per-layer visibility, the
/// non-designated-areas toggle, and at most one selected feature.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ViewState {
    visibility: BTreeMap<String, bool>,
    pub show_non_designated: bool,
    pub selected: Option<Selection>,
}

impl ViewState {
    /// Layers absent from the map fall back to their catalog default.
    pub fn is_visible(&self, layer_id: &str, default_visible: bool) -> bool {
        *self.visibility.get(layer_id).unwrap_or(&default_visible)
    }
}

/// User interactions, one variant per widget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewAction {
    /// Legend checkbox for one layer.
    ToggleLayer {
        layer_id: String,
        default_visible: bool,
    },
    /// Sidebar "show non-designated areas" checkbox.
    SetShowNonDesignated(bool),
    /// Map click on a feature.
    SelectFeature {
        layer_id: String,
        feature_idx: usize,
    },
    /// Click away from any feature.
    ClearSelection,
}

/// Pure transition: (current state, action) -> next state. Keeps the UI
/// logic testable without any rendering harness.
pub fn apply_action(state: &ViewState, action: ViewAction) -> ViewState {
    let mut next = state.clone();
    match action {
        ViewAction::ToggleLayer {
            layer_id,
            default_visible,
        } => {
            let current = next.is_visible(&layer_id, default_visible);
            next.visibility.insert(layer_id, !current);
        }
        ViewAction::SetShowNonDesignated(show) => {
            next.show_non_designated = show;
        }
        ViewAction::SelectFeature {
            layer_id,
            feature_idx,
        } => {
            next.selected = Some(Selection {
                layer_id,
                feature_idx,
            });
        }
        ViewAction::ClearSelection => {
            next.selected = None;
        }
    }
    next
}

/// Attribute table rows for the inspection panel: (field, display value),
/// geometry excluded, nulls shown as empty text.
pub fn inspection_rows(feature: &Feature) -> Vec<(String, String)> {
    feature
        .attributes
        .iter()
        .map(|(name, value)| (name.clone(), value.as_text().unwrap_or_default()))
        .collect()
}
