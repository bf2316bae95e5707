//! The schema interpreter: walks the structural schema, applies the
//! presentation schema, and produces the tree of groups and fields a host
//! renders as a form.
//!
//! The output is plain data. Widgets are named, not implemented, and every
//! field carries the path a host hands back through the single change entry
//! point. Fields that must not be shown (hidden widget, unmet visibility
//! condition) are absent from the output entirely, so they can neither leak
//! values nor contribute stray validation errors.

use std::{collections::HashSet, sync::LazyLock};

use serde_json::Value;
use tracing::warn;

use crate::{
    path::FieldPath,
    prune::is_empty,
    schema::{SchemaKind, StructuralSchema},
    ui::{UiSchema, VisibilityCondition, WILDCARD, Widget},
};

/// Visibility conditions resolve their paths under this subtree of the
/// edited resource.
const EDITABLE_ROOT: &str = "spec";

static EMPTY_UI: LazyLock<UiSchema> = LazyLock::new(UiSchema::default);

/// A validation finding attached to a single field.
///
/// Findings are collected, never thrown: the form stays editable and the
/// caller decides whether to gate submission on them.
#[derive(Clone, Debug, PartialEq)]
pub struct ValidationIssue {
    pub path: FieldPath,
    pub message: String,
}

/// A labelled, collapsible group of rendered nodes.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderedGroup {
    pub path: FieldPath,
    pub title: String,
    pub expanded: bool,
    pub children: Vec<RenderedNode>,
}

/// One editable field.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderedField {
    pub path: FieldPath,
    pub label: String,
    pub description: Option<String>,
    pub widget: Widget,
    pub value: Value,
    pub required: bool,

    /// Stringified enumeration values, for select widgets.
    pub options: Vec<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum RenderedNode {
    Group(RenderedGroup),
    Field(RenderedField),
}

/// The rendered form: the node tree plus everything that went wrong while
/// interpreting the schemas, split into structural findings (subtrees that
/// cannot be rendered at all) and per-field validation findings.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RenderedForm {
    pub nodes: Vec<RenderedNode>,
    pub structural_errors: Vec<String>,
    pub issues: Vec<ValidationIssue>,
}

impl RenderedForm {
    /// Depth-first iteration over all rendered fields.
    pub fn fields(&self) -> Vec<&RenderedField> {
        fn collect<'a>(nodes: &'a [RenderedNode], fields: &mut Vec<&'a RenderedField>) {
            for node in nodes {
                match node {
                    RenderedNode::Field(field) => fields.push(field),
                    RenderedNode::Group(group) => collect(&group.children, fields),
                }
            }
        }

        let mut fields = Vec::new();
        collect(&self.nodes, &mut fields);
        fields
    }
}

/// Renders an editable form from the structural schema, the presentation
/// schema and the current data tree.
pub fn render(schema: &StructuralSchema, ui: &UiSchema, data: &Value) -> RenderedForm {
    let mut form = RenderedForm::default();

    if schema.is_vacant() {
        form.structural_errors
            .push("the schema does not declare any fields to edit".to_owned());
        return form;
    }

    let renderer = Renderer { data };
    let root = NodeContext {
        key: "",
        path: FieldPath::root(),
        value: Some(data),
        depth: 0,
        required: false,
    };

    let mut indices = Vec::new();
    let nodes = renderer.render_node(schema, ui, root, &mut indices, &mut form);
    form.nodes = nodes;
    form
}

struct NodeContext<'a> {
    key: &'a str,
    path: FieldPath,
    value: Option<&'a Value>,
    depth: usize,
    required: bool,
}

struct Renderer<'a> {
    data: &'a Value,
}

impl<'a> Renderer<'a> {
    fn render_node(
        &self,
        schema: &'a StructuralSchema,
        ui: &'a UiSchema,
        cx: NodeContext<'a>,
        indices: &mut Vec<usize>,
        form: &mut RenderedForm,
    ) -> Vec<RenderedNode> {
        if let Some(combinator) = schema.combinator() {
            form.structural_errors.push(located(
                &cx.path,
                &format!("cannot render the unsupported schema combinator {combinator:?}"),
            ));
            return Vec::new();
        }

        match schema.effective_kind() {
            SchemaKind::Object => self.render_object(schema, ui, cx, indices, form),
            SchemaKind::Array => self.render_array(schema, ui, cx, indices, form),
            _ => self
                .render_field(schema, ui, cx, indices, form)
                .into_iter()
                .collect(),
        }
    }

    fn render_object(
        &self,
        schema: &'a StructuralSchema,
        ui: &'a UiSchema,
        cx: NodeContext<'a>,
        indices: &mut Vec<usize>,
        form: &mut RenderedForm,
    ) -> Vec<RenderedNode> {
        let value = match cx.value {
            Some(value) if value.is_object() => Some(value),
            Some(value) if !value.is_null() => {
                form.issues.push(ValidationIssue {
                    path: cx.path.clone(),
                    message: "expected an object value".to_owned(),
                });
                None
            }
            _ => None,
        };

        let wrap = wraps_group(ui);
        let child_depth = cx.depth + usize::from(wrap.is_some());

        let mut children = Vec::new();
        for key in ordered_keys(schema, &ui.directive.order) {
            let Some(child_schema) = schema.properties.get(key) else {
                continue;
            };
            let child_ui = ui.child(key).unwrap_or(&EMPTY_UI);
            let child = NodeContext {
                key,
                path: cx.path.child(key),
                value: value.and_then(|value| value.get(key)),
                depth: child_depth,
                required: schema.is_required(key),
            };
            children.extend(self.render_node(child_schema, child_ui, child, indices, form));
        }

        finish_group(cx, wrap, children)
    }

    fn render_array(
        &self,
        schema: &'a StructuralSchema,
        ui: &'a UiSchema,
        cx: NodeContext<'a>,
        indices: &mut Vec<usize>,
        form: &mut RenderedForm,
    ) -> Vec<RenderedNode> {
        let Some(items) = &schema.items else {
            form.structural_errors
                .push(located(&cx.path, "array schema without an item schema"));
            return Vec::new();
        };

        let elements = match cx.value {
            Some(Value::Array(elements)) => elements.as_slice(),
            Some(value) if !value.is_null() => {
                form.issues.push(ValidationIssue {
                    path: cx.path.clone(),
                    message: "expected an array value".to_owned(),
                });
                &[]
            }
            _ => &[],
        };

        let wrap = wraps_group(ui);
        let child_depth = cx.depth + usize::from(wrap.is_some());

        let mut children = Vec::new();
        for (index, element) in elements.iter().enumerate() {
            let segment = index.to_string();
            let child_ui = ui.child(&segment).unwrap_or(&EMPTY_UI);
            let child = NodeContext {
                key: cx.key,
                path: cx.path.child(segment),
                value: Some(element),
                depth: child_depth,
                required: false,
            };

            indices.push(index);
            children.extend(self.render_node(items, child_ui, child, indices, form));
            indices.pop();
        }

        finish_group(cx, wrap, children)
    }

    fn render_field(
        &self,
        schema: &'a StructuralSchema,
        ui: &'a UiSchema,
        cx: NodeContext<'a>,
        indices: &[usize],
        form: &mut RenderedForm,
    ) -> Option<RenderedNode> {
        if let Some(condition) = &ui.directive.dependency {
            if !self.condition_met(condition, indices) {
                return None;
            }
        }

        let widget = match ui.directive.widget {
            Some(Widget::Hidden) => return None,
            Some(Widget::Unknown) => {
                // Fail closed: a malformed presentation schema must not block editing
                warn!(
                    path = %cx.path,
                    "unrecognized widget declaration, falling back to the text widget"
                );
                Widget::Text
            }
            Some(declared) => declared,
            None if schema.effective_kind().is_numeric() => Widget::Number,
            None => Widget::Text,
        };

        if cx.required && cx.value.is_none_or(is_empty) {
            form.issues.push(ValidationIssue {
                path: cx.path.clone(),
                message: "field is required".to_owned(),
            });
        }

        if let Some(actual) = cx.value {
            let kind = schema.effective_kind();
            if !actual.is_null() && !kind.matches(actual) {
                form.issues.push(ValidationIssue {
                    path: cx.path.clone(),
                    message: format!("expected a value of type {kind}"),
                });
            }
        }

        let value = cx
            .value
            .or(schema.default.as_ref())
            .cloned()
            .unwrap_or(Value::Null);

        Some(RenderedNode::Field(RenderedField {
            label: ui
                .directive
                .title
                .clone()
                .unwrap_or_else(|| humanize(cx.key)),
            description: ui
                .directive
                .description
                .clone()
                .or_else(|| schema.description.clone()),
            widget,
            value,
            required: cx.required,
            options: schema.enum_values.iter().map(stringify).collect(),
            path: cx.path,
        }))
    }

    /// Resolves a visibility condition against the current data.
    ///
    /// The path is walked under the `spec` subtree. Whenever the walk lands
    /// on an array, it steps into the element at the rendered field's own
    /// innermost positional index before continuing.
    fn condition_met(&self, condition: &VisibilityCondition, indices: &[usize]) -> bool {
        let Some(mut current) = self.data.get(EDITABLE_ROOT) else {
            return false;
        };

        for segment in &condition.path {
            if let Value::Array(elements) = current {
                let Some(element) = indices.last().and_then(|index| elements.get(*index)) else {
                    return false;
                };
                current = element;
            }

            match current.get(segment.as_str()) {
                Some(next) => current = next,
                None => return false,
            }
        }

        stringify(current) == condition.value
    }
}

/// Returns the group title when this node renders as a labelled collapsible
/// group: a title is declared, the widget is not hidden, and the subtree is
/// not marked flat.
fn wraps_group(ui: &UiSchema) -> Option<String> {
    if ui.directive.flat || ui.directive.widget == Some(Widget::Hidden) {
        return None;
    }
    ui.directive.title.clone()
}

fn finish_group(
    cx: NodeContext<'_>,
    wrap: Option<String>,
    children: Vec<RenderedNode>,
) -> Vec<RenderedNode> {
    if children.is_empty() {
        return Vec::new();
    }

    match wrap {
        Some(title) => vec![RenderedNode::Group(RenderedGroup {
            path: cx.path,
            title,
            expanded: cx.depth == 0,
            children,
        })],
        None => children,
    }
}

/// Child keys in rendering order: as declared by `order`, with the wildcard
/// marking the position of all children not named explicitly. Children
/// missing from an order without a wildcard are appended at the end, a field
/// is never silently dropped by an incomplete order.
fn ordered_keys<'s>(schema: &'s StructuralSchema, order: &'s [String]) -> Vec<&'s str> {
    if order.is_empty() {
        return schema.properties.keys().map(String::as_str).collect();
    }

    let named = order
        .iter()
        .filter(|entry| *entry != WILDCARD)
        .map(String::as_str)
        .collect::<HashSet<_>>();
    let remaining = schema
        .properties
        .keys()
        .map(String::as_str)
        .filter(|key| !named.contains(key))
        .collect::<Vec<_>>();

    let mut keys = Vec::new();
    let mut wildcard_used = false;
    for entry in order {
        if entry == WILDCARD {
            if !wildcard_used {
                keys.extend(remaining.iter().copied());
                wildcard_used = true;
            }
        } else if schema.properties.contains_key(entry.as_str()) {
            keys.push(entry.as_str());
        }
    }
    if !wildcard_used {
        keys.extend(remaining);
    }

    keys
}

/// Canonical string conversion used for visibility comparisons and select
/// options. Strings convert to themselves, everything else to its JSON
/// rendering.
fn stringify(value: &Value) -> String {
    match value {
        Value::String(string) => string.clone(),
        other => other.to_string(),
    }
}

/// Derives a display label from a field key: `tlsSecretName` becomes
/// `Tls Secret Name`.
fn humanize(key: &str) -> String {
    let mut words: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut previous_upper = false;

    for ch in key.chars() {
        if matches!(ch, '_' | '-' | '.' | ' ') {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            previous_upper = false;
        } else if ch.is_uppercase() && !previous_upper && !current.is_empty() {
            words.push(std::mem::take(&mut current));
            current.push(ch);
            previous_upper = true;
        } else {
            previous_upper = ch.is_uppercase();
            current.push(ch);
        }
    }
    if !current.is_empty() {
        words.push(current);
    }

    words
        .iter()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Renders a numeric value for display. Anything that is not a finite number
/// displays as blank.
pub fn display_number(value: &Value) -> String {
    match value {
        Value::Number(number) if number.as_f64().is_some_and(f64::is_finite) => number.to_string(),
        _ => String::new(),
    }
}

/// Coerces raw text input back into a canonical numeric value. Blank input
/// and unparseable input both coerce to null, never to a string.
pub fn coerce_numeric(kind: SchemaKind, input: &str) -> Value {
    let input = input.trim();
    if input.is_empty() {
        return Value::Null;
    }

    match kind {
        SchemaKind::Integer => input.parse::<i64>().map_or(Value::Null, Value::from),
        _ => input
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map_or(Value::Null, Value::Number),
    }
}

fn located(path: &FieldPath, message: &str) -> String {
    if path.is_root() {
        format!("schema root: {message}")
    } else {
        format!("{path}: {message}")
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use rstest::rstest;
    use serde_json::json;

    use super::*;

    fn schema() -> StructuralSchema {
        serde_yaml::from_str(indoc! {"
            type: object
            properties:
              spec:
                type: object
                required:
                  - image
                properties:
                  image:
                    type: string
                  replicas:
                    type: integer
                  mode:
                    type: string
                    enum:
                      - Auto
                      - Manual
                  verbose:
                    type: boolean
        "})
        .expect("test YAML is valid")
    }

    fn ui() -> UiSchema {
        serde_yaml::from_str(indoc! {"
            spec:
              verbose:
                widget: switch
                dependency:
                  path:
                    - mode
                  value: Manual
        "})
        .expect("test YAML is valid")
    }

    fn field_paths(form: &RenderedForm) -> Vec<String> {
        form.fields()
            .iter()
            .map(|field| field.path.to_string())
            .collect()
    }

    #[test]
    fn dependency_gates_rendering() {
        let schema = schema();
        let ui = ui();

        let manual = render(&schema, &ui, &json!({"spec": {"mode": "Manual"}}));
        assert!(field_paths(&manual).contains(&"spec.verbose".to_owned()));

        // The dependent field is absent from the output, not merely disabled
        let auto = render(&schema, &ui, &json!({"spec": {"mode": "Auto"}}));
        assert!(!field_paths(&auto).contains(&"spec.verbose".to_owned()));
    }

    #[test]
    fn dependency_comparison_is_stringified() {
        let schema: StructuralSchema = serde_yaml::from_str(indoc! {"
            type: object
            properties:
              spec:
                type: object
                properties:
                  replicas:
                    type: integer
                  scaled:
                    type: boolean
        "})
        .expect("test YAML is valid");
        let ui: UiSchema = serde_yaml::from_str(indoc! {"
            spec:
              scaled:
                dependency:
                  path:
                    - replicas
                  value: '3'
        "})
        .expect("test YAML is valid");

        let form = render(&schema, &ui, &json!({"spec": {"replicas": 3}}));
        assert!(field_paths(&form).contains(&"spec.scaled".to_owned()));
    }

    #[test]
    fn dependency_indexes_arrays_with_the_current_position() {
        let schema: StructuralSchema = serde_yaml::from_str(indoc! {"
            type: object
            properties:
              spec:
                type: object
                properties:
                  nodes:
                    type: array
                    items:
                      type: object
                      properties:
                        mode:
                          type: string
                        detail:
                          type: string
        "})
        .expect("test YAML is valid");
        let ui: UiSchema = serde_yaml::from_str(indoc! {"
            spec:
              nodes:
                '*':
                  detail:
                    dependency:
                      path:
                        - nodes
                        - mode
                      value: Manual
        "})
        .expect("test YAML is valid");

        let data = json!({"spec": {"nodes": [{"mode": "Manual"}, {"mode": "Auto"}]}});
        let paths = field_paths(&render(&schema, &ui, &data));

        assert!(paths.contains(&"spec.nodes.0.detail".to_owned()));
        assert!(!paths.contains(&"spec.nodes.1.detail".to_owned()));
    }

    #[test]
    fn hidden_widget_suppresses_the_field() {
        let ui: UiSchema = serde_yaml::from_str(indoc! {"
            spec:
              image:
                widget: hidden
        "})
        .expect("test YAML is valid");

        let form = render(&schema(), &ui, &json!({"spec": {"image": "demo"}}));
        assert!(!field_paths(&form).contains(&"spec.image".to_owned()));
    }

    #[test]
    fn unrecognized_widget_fails_closed_to_text() {
        let ui: UiSchema = serde_yaml::from_str(indoc! {"
            spec:
              image:
                widget: fancy-slider
        "})
        .expect("test YAML is valid");

        let form = render(&schema(), &ui, &json!({"spec": {"image": "demo"}}));
        let image = form
            .fields()
            .into_iter()
            .find(|field| field.path.to_string() == "spec.image")
            .expect("image renders");

        assert_eq!(image.widget, Widget::Text);
    }

    #[test]
    fn numeric_kind_selects_the_number_widget() {
        let form = render(&schema(), &UiSchema::default(), &json!({"spec": {}}));
        let replicas = form
            .fields()
            .into_iter()
            .find(|field| field.path.to_string() == "spec.replicas")
            .expect("replicas renders");

        assert_eq!(replicas.widget, Widget::Number);
    }

    #[test]
    fn enum_values_become_select_options() {
        let form = render(&schema(), &UiSchema::default(), &json!({"spec": {}}));
        let mode = form
            .fields()
            .into_iter()
            .find(|field| field.path.to_string() == "spec.mode")
            .expect("mode renders");

        assert_eq!(mode.options, ["Auto", "Manual"]);
    }

    #[test]
    fn order_wildcard_positions_remaining_children() {
        let schema: StructuralSchema = serde_yaml::from_str(indoc! {"
            type: object
            properties:
              a:
                type: string
              b:
                type: string
              c:
                type: string
              d:
                type: string
        "})
        .expect("test YAML is valid");
        let ui: UiSchema = serde_yaml::from_str(indoc! {"
            order:
              - d
              - '*'
              - a
        "})
        .expect("test YAML is valid");

        let form = render(&schema, &ui, &json!({}));
        assert_eq!(field_paths(&form), ["d", "b", "c", "a"]);
    }

    #[test]
    fn order_without_wildcard_appends_unnamed_children() {
        let schema: StructuralSchema = serde_yaml::from_str(indoc! {"
            type: object
            properties:
              a:
                type: string
              b:
                type: string
              c:
                type: string
        "})
        .expect("test YAML is valid");
        let ui: UiSchema = serde_yaml::from_str(indoc! {"
            order:
              - c
        "})
        .expect("test YAML is valid");

        let form = render(&schema, &ui, &json!({}));
        assert_eq!(field_paths(&form), ["c", "a", "b"]);
    }

    #[test]
    fn titled_group_wraps_and_flat_splices() {
        let ui: UiSchema = serde_yaml::from_str(indoc! {"
            spec:
              title: Configuration
        "})
        .expect("test YAML is valid");

        let form = render(&schema(), &ui, &json!({"spec": {}}));
        match &form.nodes[..] {
            [RenderedNode::Group(group)] => {
                assert_eq!(group.title, "Configuration");
                assert!(group.expanded);
            }
            other => panic!("expected a single wrapped group, got {other:?}"),
        }

        let flat_ui: UiSchema = serde_yaml::from_str(indoc! {"
            spec:
              title: Configuration
              flat: true
        "})
        .expect("test YAML is valid");

        let flat = render(&schema(), &flat_ui, &json!({"spec": {}}));
        assert!(
            flat.nodes
                .iter()
                .all(|node| matches!(node, RenderedNode::Field(_))),
            "flat subtrees render without a grouping node"
        );
    }

    #[test]
    fn vacant_schema_is_a_structural_error() {
        let form = render(&StructuralSchema::default(), &UiSchema::default(), &json!({}));

        assert!(form.nodes.is_empty());
        assert_eq!(form.structural_errors.len(), 1);
    }

    #[test]
    fn root_combinator_renders_nothing_but_the_error() {
        let schema: StructuralSchema = serde_yaml::from_str(indoc! {"
            oneOf:
              - type: string
              - type: object
        "})
        .expect("test YAML is valid");

        let form = render(&schema, &UiSchema::default(), &json!({}));
        assert!(form.nodes.is_empty());
        assert!(form.structural_errors[0].contains("oneOf"));
    }

    #[test]
    fn nested_combinator_skips_only_its_subtree() {
        let schema: StructuralSchema = serde_yaml::from_str(indoc! {"
            type: object
            properties:
              plain:
                type: string
              tricky:
                anyOf:
                  - type: string
                  - type: integer
        "})
        .expect("test YAML is valid");

        let form = render(&schema, &UiSchema::default(), &json!({}));
        assert_eq!(field_paths(&form), ["plain"]);
        assert!(form.structural_errors[0].contains("anyOf"));
    }

    #[test]
    fn required_fields_are_flagged_only_when_rendered() {
        let form = render(&schema(), &UiSchema::default(), &json!({"spec": {}}));
        assert!(
            form.issues
                .iter()
                .any(|issue| issue.path.to_string() == "spec.image")
        );

        // A field the presentation schema hides cannot contribute findings
        let hiding: UiSchema = serde_yaml::from_str(indoc! {"
            spec:
              image:
                widget: hidden
        "})
        .expect("test YAML is valid");

        let form = render(&schema(), &hiding, &json!({"spec": {}}));
        assert!(
            !form
                .issues
                .iter()
                .any(|issue| issue.path.to_string() == "spec.image")
        );
    }

    #[test]
    fn type_mismatches_are_collected_not_thrown() {
        let form = render(&schema(), &UiSchema::default(), &json!({"spec": {"replicas": "three"}}));

        assert!(
            form.issues
                .iter()
                .any(|issue| issue.path.to_string() == "spec.replicas"
                    && issue.message.contains("integer"))
        );
        // The mismatching field still renders for correction
        assert!(field_paths(&form).contains(&"spec.replicas".to_owned()));
    }

    #[rstest]
    #[case("image", "Image")]
    #[case("tlsSecretName", "Tls Secret Name")]
    #[case("node_selector", "Node Selector")]
    #[case("external-url", "External Url")]
    fn labels_are_humanized(#[case] key: &str, #[case] expected: &str) {
        assert_eq!(humanize(key), expected);
    }

    #[rstest]
    #[case(json!(3), "3")]
    #[case(json!(3.5), "3.5")]
    #[case(json!(null), "")]
    #[case(json!("3"), "")]
    fn numbers_display_blank_unless_finite(#[case] value: Value, #[case] expected: &str) {
        assert_eq!(display_number(&value), expected);
    }

    #[rstest]
    #[case(SchemaKind::Integer, "3", json!(3))]
    #[case(SchemaKind::Integer, "3.5", json!(null))]
    #[case(SchemaKind::Number, "3.5", json!(3.5))]
    #[case(SchemaKind::Number, "", json!(null))]
    #[case(SchemaKind::Number, "abc", json!(null))]
    fn input_coerces_to_canonical_numbers(
        #[case] kind: SchemaKind,
        #[case] input: &str,
        #[case] expected: Value,
    ) {
        assert_eq!(coerce_numeric(kind, input), expected);
    }
}
