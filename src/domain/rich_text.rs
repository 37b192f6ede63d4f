use serde_json::Value;

/// Text-bearing shape of a rich-text (ADF) node; marks and attributes are dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RichTextNode {
    Leaf(String),
    Container(Vec<RichTextNode>),
}

impl RichTextNode {
    // serde_json caps nesting at 128 levels, which bounds this recursion.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::String(text) => RichTextNode::Leaf(text.clone()),
            Value::Object(obj) => {
                if let Some(text) = obj.get("text").and_then(Value::as_str) {
                    if !text.is_empty() {
                        return RichTextNode::Leaf(text.to_string());
                    }
                }
                match obj.get("content") {
                    Some(Value::Array(children)) => RichTextNode::Container(
                        children.iter().map(RichTextNode::from_value).collect(),
                    ),
                    _ => RichTextNode::Leaf(String::new()),
                }
            }
            _ => RichTextNode::Leaf(String::new()),
        }
    }

    pub fn flatten(&self) -> String {
        let mut out = String::new();
        let mut stack: Vec<&RichTextNode> = vec![self];

        while let Some(node) = stack.pop() {
            match node {
                RichTextNode::Leaf(text) => out.push_str(text),
                RichTextNode::Container(children) => stack.extend(children.iter().rev()),
            }
        }

        out
    }
}

pub fn is_rich_text(value: &Value) -> bool {
    value
        .as_object()
        .is_some_and(|obj| obj.get("content").is_some_and(|content| !content.is_null()))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn leaf(text: &str) -> RichTextNode {
        RichTextNode::Leaf(text.to_string())
    }

    #[test]
    fn flattens_children_in_order_without_separators() {
        let a = RichTextNode::Container(vec![leaf("Hello"), leaf(", ")]);
        let b = RichTextNode::Container(vec![leaf("world"), RichTextNode::Container(vec![])]);
        let root = RichTextNode::Container(vec![a.clone(), b.clone()]);

        assert_eq!(root.flatten(), format!("{}{}", a.flatten(), b.flatten()));
        assert_eq!(root.flatten(), "Hello, world");
    }

    #[test]
    fn reads_adf_document() {
        let doc = json!({
            "type": "doc",
            "version": 1,
            "content": [
                {"type": "paragraph", "content": [
                    {"type": "text", "text": "Login "},
                    {"type": "text", "text": "works", "marks": [{"type": "strong"}]}
                ]},
                {"type": "rule"},
                {"type": "paragraph", "content": [{"type": "text", "text": "Done."}]}
            ]
        });

        let node = RichTextNode::from_value(&doc);
        assert_eq!(node.flatten(), "Login worksDone.");
    }

    #[test]
    fn empty_text_falls_through_to_children() {
        let value = json!({"text": "", "content": [{"text": "inner"}]});
        assert_eq!(RichTextNode::from_value(&value).flatten(), "inner");
    }

    #[test]
    fn deep_nesting_does_not_recurse_on_flatten() {
        let mut node = leaf("bottom");
        for _ in 0..100_000 {
            node = RichTextNode::Container(vec![node]);
        }
        assert_eq!(node.flatten(), "bottom");
        // Drop recurses, so take the chain apart by hand.
        let mut current = node;
        loop {
            match current {
                RichTextNode::Container(mut children) if !children.is_empty() => {
                    current = children.remove(0);
                }
                _ => break,
            }
        }
    }

    #[test]
    fn detects_rich_text_shape() {
        assert!(is_rich_text(&json!({"type": "doc", "content": []})));
        assert!(!is_rich_text(&json!({"type": "doc"})));
        assert!(!is_rich_text(&json!("plain")));
    }
}
