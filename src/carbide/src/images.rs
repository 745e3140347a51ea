//! Collect `image` values from arbitrary document trees.

/// Shape of a node in a parsed document, independent of the source format.
pub enum Children<'a, T: ?Sized> {
    Mapping(Vec<(Option<&'a str>, &'a T)>),
    Sequence(Vec<&'a T>),
    Scalar,
}

pub trait TreeNode {
    fn as_text(&self) -> Option<&str>;
    fn children(&self) -> Children<'_, Self>;
}

impl TreeNode for serde_yaml::Value {
    fn as_text(&self) -> Option<&str> {
        self.as_str()
    }

    fn children(&self) -> Children<'_, Self> {
        match self {
            serde_yaml::Value::Mapping(map) => {
                Children::Mapping(map.iter().map(|(k, v)| (k.as_str(), v)).collect())
            }
            serde_yaml::Value::Sequence(seq) => Children::Sequence(seq.iter().collect()),
            serde_yaml::Value::Tagged(tagged) => tagged.value.children(),
            _ => Children::Scalar,
        }
    }
}

impl TreeNode for serde_json::Value {
    fn as_text(&self) -> Option<&str> {
        self.as_str()
    }

    fn children(&self) -> Children<'_, Self> {
        match self {
            serde_json::Value::Object(map) => {
                Children::Mapping(map.iter().map(|(k, v)| (Some(k.as_str()), v)).collect())
            }
            serde_json::Value::Array(items) => Children::Sequence(items.iter().collect()),
            _ => Children::Scalar,
        }
    }
}

/// Depth-first walk calling `visit` for every mapping entry with a string key.
pub fn walk<T, F>(node: &T, visit: &mut F)
where
    T: TreeNode + ?Sized,
    F: FnMut(&str, &T),
{
    match node.children() {
        Children::Mapping(entries) => {
            for (key, value) in entries {
                if let Some(key) = key {
                    visit(key, value);
                }
                walk(value, visit);
            }
        }
        Children::Sequence(items) => {
            for item in items {
                walk(item, visit);
            }
        }
        Children::Scalar => {}
    }
}

/// Every string value stored under a key named exactly `image`.
pub fn collect_images<T: TreeNode + ?Sized>(node: &T) -> Vec<String> {
    let mut images = Vec::new();
    walk(node, &mut |key, value: &T| {
        if key == "image" {
            if let Some(image) = value.as_text() {
                images.push(image.to_string());
            }
        }
    });
    images
}
