//! Nested query results.
//!
//! Rows come back flat, one per combination of axis members. [`ResultSet`]
//! folds them into a tree with one level per axis: the children of a node
//! are the members of the next axis, and every node carries a value for each
//! requested measure. Values of inner nodes are subtotals, reduced from the
//! children with the measure's aggregator.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::Serialize;

use crate::cube::{LevelRef, Measure};
use crate::error::Result;
use crate::exec::{Row, Value};

/// One member of an axis, with the measure values for it and its breakdown
/// along the next axis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultNode {
    pub key: Value,
    pub label: String,
    pub values: BTreeMap<String, Option<f64>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ResultNode>,
}

impl ResultNode {
    fn new(key: Value, label: String) -> Self {
        Self {
            key,
            label,
            values: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    /// The child with id `key`.
    pub fn get(&self, key: impl Into<Value>) -> Option<&ResultNode> {
        let key = key.into();
        self.children.iter().find(|c| c.key == key)
    }

    pub fn by_label(&self, label: &str) -> Option<&ResultNode> {
        self.children.iter().find(|c| c.label == label)
    }

    pub fn keys(&self) -> Vec<&Value> {
        self.children.iter().map(|c| &c.key).collect()
    }

    pub fn labels(&self) -> Vec<&str> {
        self.children.iter().map(|c| c.label.as_str()).collect()
    }

    /// Value of `measure` at this node; `None` for SQL `NULL` or a subtotal
    /// the aggregator cannot reduce.
    pub fn value(&self, measure: &str) -> Option<f64> {
        self.values.get(measure).copied().flatten()
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    fn child_mut(&mut self, key: Value, label: String) -> &mut ResultNode {
        let index = match self.children.iter().position(|c| c.key == key) {
            Some(index) => index,
            None => {
                self.children.push(ResultNode::new(key, label));
                self.children.len() - 1
            }
        };
        &mut self.children[index]
    }

    fn sort(&mut self) {
        self.children.sort_by(|a, b| compare_keys(&a.key, &b.key));
        for child in &mut self.children {
            child.sort();
        }
    }

    /// Fill inner-node values bottom-up.
    fn reduce(&mut self, measures: &[Measure]) {
        if self.children.is_empty() {
            return;
        }
        for child in &mut self.children {
            child.reduce(measures);
        }
        for measure in measures {
            let name = measure.name();
            let values: Vec<f64> = self
                .children
                .iter()
                .filter_map(|c| c.value(&name))
                .collect();
            self.values.insert(name, measure.subtotal_agg().reduce(&values));
        }
    }
}

/// Query results as a tree rooted at the grand total.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultSet {
    /// Column name of each axis, outermost first.
    pub axes: Vec<String>,
    pub measures: Vec<String>,
    pub root: ResultNode,
}

impl ResultSet {
    /// Fold flat rows into the tree.
    ///
    /// Rows are sorted by key at every depth unless `keep_order` is set, in
    /// which case members appear in row order.
    pub fn from_rows(
        levels: &[LevelRef],
        measures: &[Measure],
        rows: &[Row],
        keep_order: bool,
    ) -> Result<Self> {
        let mut root = ResultNode::new(Value::Null, String::new());

        for row in rows {
            let mut node = &mut root;
            for level in levels {
                let key = row.try_get(&level.id_name())?.clone();
                let label = row
                    .get(&level.label_name())
                    .map(Value::to_string)
                    .unwrap_or_else(|| key.to_string());
                node = node.child_mut(key, label);
            }
            for measure in measures {
                let name = measure.name();
                let value = row.get_f64(&name)?;
                node.values.insert(name, value);
            }
        }

        if !keep_order {
            root.sort();
        }
        root.reduce(measures);
        if levels.is_empty() && rows.is_empty() {
            for measure in measures {
                root.values.insert(measure.name(), None);
            }
        }

        Ok(Self {
            axes: levels.iter().map(LevelRef::id_name).collect(),
            measures: measures.iter().map(Measure::name).collect(),
            root,
        })
    }

    pub fn get(&self, key: impl Into<Value>) -> Option<&ResultNode> {
        self.root.get(key)
    }

    pub fn by_label(&self, label: &str) -> Option<&ResultNode> {
        self.root.by_label(label)
    }

    pub fn keys(&self) -> Vec<&Value> {
        self.root.keys()
    }

    pub fn labels(&self) -> Vec<&str> {
        self.root.labels()
    }

    /// Grand total of `measure`.
    pub fn value(&self, measure: &str) -> Option<f64> {
        self.root.value(measure)
    }

    /// Members of the outermost axis.
    pub fn nodes(&self) -> &[ResultNode] {
        &self.root.children
    }

    pub fn len(&self) -> usize {
        self.root.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.root.children.is_empty()
    }

    /// The tree as JSON.
    pub fn to_json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// `NULL` first, then numbers, then text.
fn compare_keys(a: &Value, b: &Value) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::Int(_) | Value::Float(_) => 1,
            Value::Text(_) => 2,
        }
    }
    match (a, b) {
        (Value::Text(x), Value::Text(y)) => x.cmp(y),
        (Value::Int(x), Value::Int(y)) => x.cmp(y),
        _ => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
            _ => rank(a).cmp(&rank(b)),
        },
    }
}
