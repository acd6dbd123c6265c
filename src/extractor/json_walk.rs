use serde_json::Value;

/// Depth-bounded walk over a parsed JSON document, collecting string leaves.
///
/// Nodes deeper than `max_depth` are skipped, so the walk always terminates
/// regardless of how the payload is nested.
pub struct JsonWalker {
    max_depth: usize,
}

impl JsonWalker {
    pub fn new(max_depth: usize) -> Self {
        Self { max_depth }
    }

    /// Every string value (not key) for which `keep` returns true.
    pub fn collect_strings<F>(&self, value: &Value, keep: F) -> Vec<String>
    where
        F: Fn(&str) -> bool,
    {
        let mut found = Vec::new();
        self.walk(value, 0, &keep, &mut found);
        found
    }

    fn walk<F>(&self, value: &Value, depth: usize, keep: &F, found: &mut Vec<String>)
    where
        F: Fn(&str) -> bool,
    {
        if depth > self.max_depth {
            return;
        }

        match value {
            Value::String(s) => {
                if keep(s) {
                    found.push(s.clone());
                }
            }
            Value::Array(items) => {
                for item in items {
                    self.walk(item, depth + 1, keep, found);
                }
            }
            Value::Object(map) => {
                for val in map.values() {
                    self.walk(val, depth + 1, keep, found);
                }
            }
            Value::Number(_) | Value::Bool(_) | Value::Null => {}
        }
    }
}

impl Default for JsonWalker {
    fn default() -> Self {
        Self::new(32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn is_path(s: &str) -> bool {
        s.starts_with('/')
    }

    #[test]
    fn test_collects_nested_strings() {
        let value = json!({
            "links": {
                "self": "/api/orders/1",
                "items": ["/api/orders/1/items", "not a path", 3, null]
            },
            "count": 4
        });

        let found = JsonWalker::default().collect_strings(&value, is_path);
        assert_eq!(found.len(), 2);
        assert!(found.contains(&"/api/orders/1".to_string()));
        assert!(found.contains(&"/api/orders/1/items".to_string()));
    }

    #[test]
    fn test_depth_bound_skips_deep_nodes() {
        let mut value = json!("/api/deep");
        for _ in 0..10 {
            value = json!([value]);
        }

        assert!(JsonWalker::new(5).collect_strings(&value, is_path).is_empty());
        assert_eq!(JsonWalker::new(10).collect_strings(&value, is_path).len(), 1);
    }
}
