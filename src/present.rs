//! Presentation contract
//!
//! What a front end needs from the core, with no terminal attached: titles,
//! scalar text, the keys a node can grow, an editor per scalar type, and a
//! footer whose transient notifications expire without clobbering newer ones.
//!
//! Capabilities are small traits implemented by [`NodeView`]; a front end
//! composes the ones it needs instead of inheriting a widget hierarchy.

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use crate::document::{DocumentTree, NodeId};
use crate::error::{JsonWidgetError, Result};
use crate::path::{Key, NodePath};
use crate::types::JsonType;

/// Anything with a display title
pub trait Titled {
    fn title(&self) -> Result<String>;
}

/// Anything that can be drawn as text
pub trait Renderable {
    /// Scalar value as text; `None` for containers
    fn value_text(&self) -> Result<Option<String>>;

    /// Indented outline of the subtree, one line per node
    fn render(&self) -> Result<Vec<String>>;
}

/// A node seen through the presentation contract
#[derive(Clone, Copy)]
pub struct NodeView<'a> {
    tree: &'a DocumentTree,
    id: NodeId,
}

impl<'a> NodeView<'a> {
    pub fn new(tree: &'a DocumentTree, id: NodeId) -> Self {
        Self { tree, id }
    }

    pub fn root(tree: &'a DocumentTree) -> Self {
        Self::new(tree, tree.root())
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn path(&self) -> NodePath {
        self.tree.path(self.id)
    }

    pub fn children(&self) -> Result<Vec<NodeView<'a>>> {
        Ok(self
            .tree
            .children(self.id)?
            .into_iter()
            .map(|id| NodeView::new(self.tree, id))
            .collect())
    }

    pub fn available_keys(&self) -> Result<Vec<Key>> {
        self.tree.available_keys(self.id)
    }

    /// Schema type of the position, which is what an editor is chosen by
    pub fn schema_type(&self) -> Result<JsonType> {
        Ok(self.tree.schema().ty(self.tree.node(self.id)?.schema()))
    }

    pub fn enum_options(&self) -> Result<Option<Vec<Value>>> {
        let schema = self.tree.node(self.id)?.schema();
        Ok(self.tree.schema().enum_options(schema).map(<[Value]>::to_vec))
    }

    pub fn is_selected(&self) -> bool {
        self.tree.is_selected(self.id)
    }
}

impl Titled for NodeView<'_> {
    fn title(&self) -> Result<String> {
        self.tree.title(self.id)
    }
}

impl Renderable for NodeView<'_> {
    fn value_text(&self) -> Result<Option<String>> {
        Ok(self.tree.node(self.id)?.scalar().map(scalar_text))
    }

    fn render(&self) -> Result<Vec<String>> {
        let mut lines = Vec::new();
        let mut stack = vec![*self];
        let base = self.tree.node(self.id)?.depth();
        while let Some(view) = stack.pop() {
            let depth = view.tree.node(view.id)?.depth() - base;
            let indent = "  ".repeat(depth);
            let marker = if view.is_selected() { "*" } else { "" };
            match view.value_text()? {
                Some(text) => lines.push(format!("{}{}{}: {}", indent, marker, view.title()?, text)),
                None => lines.push(format!("{}{}{}", indent, marker, view.title()?)),
            }
            stack.extend(view.children()?.into_iter().rev());
        }
        Ok(lines)
    }
}

/// Text for a scalar: strings verbatim, integral floats without `.0`
pub fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
            _ => n.to_string(),
        },
        other => other.to_string(),
    }
}

// =============================================================================
// Scalar editors
// =============================================================================

/// Text entry for one scalar position
pub trait ScalarEditor {
    /// Whether `text` may stand in the entry while typing (possibly unfinished)
    fn accepts(&self, text: &str) -> bool;

    /// Value for the finished `text`
    fn commit(&self, text: &str) -> Result<Value>;
}

fn rejected(path: &NodePath, text: &str, expected: JsonType) -> JsonWidgetError {
    JsonWidgetError::Validation {
        path: path.clone(),
        found: format!("{:?}", text),
        expected: expected.to_string(),
    }
}

pub struct TextEditor;

impl ScalarEditor for TextEditor {
    fn accepts(&self, _text: &str) -> bool {
        true
    }

    fn commit(&self, text: &str) -> Result<Value> {
        Ok(Value::String(text.to_string()))
    }
}

pub struct IntegerEditor {
    pub path: NodePath,
}

impl ScalarEditor for IntegerEditor {
    fn accepts(&self, text: &str) -> bool {
        let digits = text.strip_prefix(['-', '+']).unwrap_or(text);
        digits.chars().all(|c| c.is_ascii_digit())
    }

    fn commit(&self, text: &str) -> Result<Value> {
        match text {
            "" | "-" | "+" => Ok(Value::from(0)),
            _ => text
                .parse::<i64>()
                .map(Value::from)
                .map_err(|_| rejected(&self.path, text, JsonType::Integer)),
        }
    }
}

struct FloatPatterns {
    full: Regex,
    partial_exponent: Regex,
    partial_decimal: Regex,
    leading_zero: Regex,
    partial_whole: Regex,
    dangling_exponent: Regex,
}

fn float_patterns() -> &'static FloatPatterns {
    static PATTERNS: OnceLock<FloatPatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let re = |pattern: &str| Regex::new(pattern).expect("static pattern");
        FloatPatterns {
            full: re(r"^[+-]?(0|[1-9]\d*)(\.\d+)?([eE][+-]?\d+)?$"),
            partial_exponent: re(r"^-?(0|[1-9]\d*)(\.\d+)?([eE][+-]?)?$"),
            partial_decimal: re(r"^-?(0|[1-9]\d*)(\.)?([eE])?$"),
            leading_zero: re(r"^-?0\d+"),
            partial_whole: re(r"^-?(\d*)(\.\d+)?([eE])?$"),
            dangling_exponent: re(r"[eE][+-]?$"),
        }
    })
}

/// Entry for floating-point numbers. Unfinished forms such as `1.`, `2e` or
/// `-` are accepted while typing; leading zeros are not.
pub struct NumberEditor {
    pub path: NodePath,
}

impl ScalarEditor for NumberEditor {
    fn accepts(&self, text: &str) -> bool {
        if !text.chars().all(|c| "0123456789.-+eE".contains(c)) {
            return false;
        }
        let p = float_patterns();
        if p.full.is_match(text) || p.partial_exponent.is_match(text) || p.partial_decimal.is_match(text) {
            return true;
        }
        if p.leading_zero.is_match(text) {
            return false;
        }
        p.partial_whole.is_match(text)
    }

    fn commit(&self, text: &str) -> Result<Value> {
        let trimmed = float_patterns().dangling_exponent.replace(text, "");
        let number = match trimmed.as_ref() {
            "" | "-" | "+" => 0.0,
            t => t
                .parse::<f64>()
                .map_err(|_| rejected(&self.path, text, JsonType::Number))?,
        };
        if number.fract() == 0.0 && number.abs() < 9.0e15 {
            return Ok(Value::from(number as i64));
        }
        serde_json::Number::from_f64(number)
            .map(Value::Number)
            .ok_or_else(|| rejected(&self.path, text, JsonType::Number))
    }
}

pub struct BooleanEditor {
    pub path: NodePath,
}

impl ScalarEditor for BooleanEditor {
    fn accepts(&self, text: &str) -> bool {
        ["true", "false"].iter().any(|word| word.starts_with(text))
    }

    fn commit(&self, text: &str) -> Result<Value> {
        match text {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            _ => Err(rejected(&self.path, text, JsonType::Boolean)),
        }
    }
}

/// Picks one of a closed set of values, matched by their text
pub struct EnumEditor {
    pub path: NodePath,
    pub options: Vec<Value>,
}

impl ScalarEditor for EnumEditor {
    fn accepts(&self, text: &str) -> bool {
        self.options.iter().any(|o| scalar_text(o).starts_with(text))
    }

    fn commit(&self, text: &str) -> Result<Value> {
        self.options
            .iter()
            .find(|o| scalar_text(o) == text)
            .cloned()
            .ok_or_else(|| JsonWidgetError::EnumViolation {
                path: self.path.clone(),
                value: text.to_string(),
                options: Value::Array(self.options.clone()).to_string(),
            })
    }
}

/// Editor for a scalar node; `None` for containers and `null`-typed positions
pub fn editor_for(view: &NodeView<'_>) -> Result<Option<Box<dyn ScalarEditor>>> {
    if view.tree.node(view.id)?.is_container() {
        return Ok(None);
    }
    let path = view.path();
    if let Some(options) = view.enum_options()? {
        return Ok(Some(Box::new(EnumEditor { path, options })));
    }
    Ok(match view.schema_type()? {
        JsonType::String | JsonType::Any => Some(Box::new(TextEditor)),
        JsonType::Integer => Some(Box::new(IntegerEditor { path })),
        JsonType::Number => Some(Box::new(NumberEditor { path })),
        JsonType::Boolean => Some(Box::new(BooleanEditor { path })),
        JsonType::Object | JsonType::Array | JsonType::Null => None,
    })
}

// =============================================================================
// Footer
// =============================================================================

/// Handle for a posted notification; expiring a stale handle does nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotificationToken(u64);

#[derive(Debug, Clone)]
pub struct Notification {
    pub message: String,
    /// `None` for messages that stay until replaced
    pub deadline: Option<Instant>,
    token: NotificationToken,
}

/// Status line with at most one transient notification over default text
#[derive(Debug, Clone)]
pub struct Footer {
    default_text: String,
    timeout: Duration,
    notification: Option<Notification>,
    generation: u64,
}

impl Footer {
    pub fn new(default_text: impl Into<String>, timeout: Duration) -> Self {
        Self {
            default_text: default_text.into(),
            timeout,
            notification: None,
            generation: 0,
        }
    }

    /// Show `message` until `now + timeout`, replacing whatever was pending
    pub fn notify(&mut self, message: impl Into<String>, now: Instant) -> NotificationToken {
        self.post(message.into(), Some(now + self.timeout))
    }

    /// Show `message` until something replaces it
    pub fn notify_persistent(&mut self, message: impl Into<String>) -> NotificationToken {
        self.post(message.into(), None)
    }

    fn post(&mut self, message: String, deadline: Option<Instant>) -> NotificationToken {
        self.generation += 1;
        let token = NotificationToken(self.generation);
        self.notification = Some(Notification {
            message,
            deadline,
            token,
        });
        token
    }

    pub fn clear(&mut self) {
        self.generation += 1;
        self.notification = None;
    }

    /// Clear the notification posted as `token`, if it is still the current one
    pub fn expire(&mut self, token: NotificationToken) -> bool {
        match &self.notification {
            Some(current) if current.token == token => {
                self.notification = None;
                true
            }
            _ => false,
        }
    }

    /// Clear an overdue notification; returns whether one was cleared
    pub fn tick(&mut self, now: Instant) -> bool {
        match self.notification.as_ref().and_then(|n| n.deadline) {
            Some(deadline) if now >= deadline => {
                self.notification = None;
                true
            }
            _ => false,
        }
    }

    pub fn notification(&self) -> Option<&Notification> {
        self.notification.as_ref()
    }

    /// Text currently shown
    pub fn text(&self) -> &str {
        self.notification
            .as_ref()
            .map(|n| n.message.as_str())
            .unwrap_or(&self.default_text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::OrderMap;
    use crate::schema::SchemaTree;
    use crate::types::SchemaFormat;
    use serde_json::json;
    use std::sync::Arc;

    fn sample() -> DocumentTree {
        let raw = json!({
            "type": "object",
            "title": "Sample",
            "properties": {
                "n": {"type": "number", "title": "Ratio"},
                "color": {"type": "string", "enum": ["red", "green"]},
                "list": {"type": "array", "title": "List", "items": {"type": "integer"}}
            }
        });
        let schema = SchemaTree::parse(&raw, &OrderMap::from_value(&raw), SchemaFormat::V2).unwrap();
        DocumentTree::new(&json!({"n": 2.0, "color": "red", "list": [1, 2]}), Arc::new(schema), None).unwrap()
    }

    #[test]
    fn test_render_outline() {
        let tree = sample();
        let lines = NodeView::root(&tree).render().unwrap();
        assert_eq!(
            lines,
            vec!["Sample", "  color: red", "  List", "    List #1: 1", "    List #2: 2", "  Ratio: 2"]
        );
    }

    #[test]
    fn test_editor_selection() {
        let tree = sample();
        let root = NodeView::root(&tree);
        let by_key = |k: &str| NodeView::new(&tree, tree.child(tree.root(), &Key::field(k)).unwrap());

        assert!(editor_for(&root).unwrap().is_none());
        let color = editor_for(&by_key("color")).unwrap().unwrap();
        assert!(color.accepts("gr"));
        assert!(!color.accepts("blue"));
        assert_eq!(color.commit("green").unwrap(), json!("green"));
        assert!(matches!(color.commit("gre"), Err(JsonWidgetError::EnumViolation { .. })));
    }

    #[test]
    fn test_number_editor_partial_input() {
        let editor = NumberEditor { path: NodePath::root() };
        for ok in ["", "-", "1", "1.", "1.5", "1.5e", "1.5e-", "1.5e-3", "0.25", "-0"] {
            assert!(editor.accepts(ok), "{ok} should be accepted");
        }
        for bad in ["01", "1x", "1..2", "--1"] {
            assert!(!editor.accepts(bad), "{bad} should be rejected");
        }
    }

    #[test]
    fn test_number_editor_commit() {
        let editor = NumberEditor { path: NodePath::root() };
        assert_eq!(editor.commit("").unwrap(), json!(0));
        assert_eq!(editor.commit("51").unwrap(), json!(51));
        assert_eq!(editor.commit("2.5e").unwrap(), json!(2.5));
        assert_eq!(editor.commit("1e2").unwrap(), json!(100));
    }

    #[test]
    fn test_integer_and_boolean_editors() {
        let int = IntegerEditor { path: NodePath::root() };
        assert!(int.accepts("-12"));
        assert!(!int.accepts("1.5"));
        assert_eq!(int.commit("-12").unwrap(), json!(-12));

        let boolean = BooleanEditor { path: NodePath::root() };
        assert!(boolean.accepts("tr"));
        assert!(boolean.commit("yes").is_err());
    }

    #[test]
    fn test_footer_stale_expiry_is_ignored() {
        let now = Instant::now();
        let mut footer = Footer::new("ready", Duration::from_secs(3));
        let first = footer.notify("saved", now);
        let second = footer.notify("error", now + Duration::from_secs(2));

        assert!(!footer.expire(first));
        assert_eq!(footer.text(), "error");
        assert!(!footer.tick(now + Duration::from_secs(4)));
        assert!(footer.tick(now + Duration::from_secs(5)));
        assert_eq!(footer.text(), "ready");
        assert!(!footer.expire(second));
    }

    #[test]
    fn test_footer_clear_and_persistent() {
        let mut footer = Footer::new("ready", Duration::from_millis(10));
        let token = footer.notify_persistent("editing");
        assert!(!footer.tick(Instant::now() + Duration::from_secs(60)));
        footer.clear();
        assert_eq!(footer.text(), "ready");
        assert!(!footer.expire(token));
    }
}
