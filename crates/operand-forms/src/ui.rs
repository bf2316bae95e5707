//! Presentation directives layered over the structural schema.
//!
//! A [`UiSchema`] is a tree with the same keys as the structural schema it
//! decorates (plus an optional `*` wildcard key). Each node carries a
//! [`Directive`]: the label, widget choice, child ordering, grouping and
//! conditional-visibility instructions for the matching schema node. Keys the
//! structural schema does not know are inert.

use indexmap::IndexMap;
use serde::Deserialize;

/// The wildcard key. As a child key it applies to array elements and to any
/// child without an entry of its own; inside [`Directive::order`] it marks the
/// position of all children not named explicitly.
pub const WILDCARD: &str = "*";

/// The widget rendering a single field.
///
/// Deserialized from the strings a presentation schema author writes. Names
/// this engine does not recognize deserialize to [`Widget::Unknown`], which
/// resolves to the default text widget: a malformed presentation schema must
/// never block editing.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, strum::Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Widget {
    Hidden,
    Text,
    Number,
    Password,
    Switch,
    Select,
    RawJson,
    Custom,

    #[serde(other)]
    Unknown,
}

/// Shows a field only when a referenced value matches an expected one.
///
/// The path is resolved under the resource's `spec` subtree against the
/// current data, and the resolved value is compared *stringified* — expected
/// values are authored as strings, so this is a deliberate weak-typing
/// boundary.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VisibilityCondition {
    /// Path to the controlling value, relative to the `spec` subtree.
    pub path: Vec<String>,

    /// The stringified value the controlling field must hold.
    pub value: String,

    /// Human-readable name of the controlling field, for host-side messaging.
    #[serde(default)]
    pub control_field: Option<String>,
}

/// The presentation instructions of a single node.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Directive {
    pub title: Option<String>,
    pub description: Option<String>,
    pub widget: Option<Widget>,

    /// Explicit child ordering. May contain [`WILDCARD`] as a placeholder
    /// for all children not named explicitly.
    pub order: Vec<String>,

    /// Suppresses the labelled/collapsible grouping UI for this subtree.
    pub flat: bool,

    pub dependency: Option<VisibilityCondition>,
}

/// One node of the presentation schema.
///
/// Any key that is not a directive is a child node. `shadow` is never
/// deserialized; it holds the author-supplied directive while a step filter
/// has this node hidden, so visibility can be restored without loss.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct UiSchema {
    #[serde(flatten)]
    pub directive: Directive,

    #[serde(skip)]
    pub shadow: Option<Directive>,

    #[serde(flatten)]
    pub children: IndexMap<String, UiSchema>,
}

impl UiSchema {
    /// Looks up the presentation node for a child key, falling back to the
    /// wildcard entry. Array element lookups (by index segment) land on the
    /// wildcard this way.
    pub fn child(&self, key: &str) -> Option<&UiSchema> {
        self.children.get(key).or_else(|| self.children.get(WILDCARD))
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::*;

    fn cluster_ui() -> UiSchema {
        serde_yaml::from_str(indoc! {"
            spec:
              title: Cluster configuration
              order:
                - image
                - '*'
              image:
                title: Container image
              credentials:
                widget: password
              verbose:
                widget: switch
                dependency:
                  path:
                    - mode
                  value: Manual
                  controlField: mode
              nodes:
                '*':
                  name:
                    title: Node name
        "})
        .expect("test YAML is valid")
    }

    #[test]
    fn directives_and_children_are_split() {
        let ui = cluster_ui();
        let spec = &ui.children["spec"];

        assert_eq!(spec.directive.title.as_deref(), Some("Cluster configuration"));
        assert_eq!(spec.directive.order, ["image", "*"]);
        assert_eq!(
            spec.children.keys().cloned().collect::<Vec<_>>(),
            ["image", "credentials", "verbose", "nodes"]
        );
    }

    #[test]
    fn widgets_deserialize_from_kebab_case() {
        let spec = &cluster_ui().children["spec"];

        assert_eq!(spec.children["credentials"].directive.widget, Some(Widget::Password));
        assert_eq!(spec.children["verbose"].directive.widget, Some(Widget::Switch));
    }

    #[test]
    fn unrecognized_widget_deserializes_to_unknown() {
        let ui: UiSchema = serde_yaml::from_str(indoc! {"
            field:
              widget: fancy-slider
        "})
        .expect("test YAML is valid");

        assert_eq!(ui.children["field"].directive.widget, Some(Widget::Unknown));
    }

    #[test]
    fn dependency_carries_path_and_expected_value() {
        let spec = &cluster_ui().children["spec"];
        let dependency = spec.children["verbose"]
            .directive
            .dependency
            .as_ref()
            .expect("dependency is declared");

        assert_eq!(dependency.path, ["mode"]);
        assert_eq!(dependency.value, "Manual");
        assert_eq!(dependency.control_field.as_deref(), Some("mode"));
    }

    #[test]
    fn wildcard_child_covers_array_elements() {
        let spec = &cluster_ui().children["spec"];
        let nodes = &spec.children["nodes"];

        let element = nodes.child("0").expect("wildcard entry applies");
        assert_eq!(
            element.children["name"].directive.title.as_deref(),
            Some("Node name")
        );
    }
}
