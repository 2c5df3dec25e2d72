// ── Reference rewriting ──
//
// Replaces source-side identifiers with their target-side counterparts
// anywhere inside a JSON payload: object keys, string values, and text
// embedded in strings (URLs, scripts, env values).

use std::collections::{BTreeSet, HashMap};

use serde_json::{Map, Value};

/// Layered old→new substitution table.
///
/// Layers are pushed in precedence order; when two layers map the same
/// identifier, the first one pushed wins.
#[derive(Debug, Clone, Default)]
pub struct Rewriter {
    table: HashMap<String, String>,
    /// Distinct key lengths in bytes, longest first.
    lengths: Vec<usize>,
}

impl Rewriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a layer below every layer already present.
    pub fn push_layer<'a, I>(&mut self, pairs: I)
    where
        I: IntoIterator<Item = (&'a String, &'a String)>,
    {
        for (old, new) in pairs {
            if old.is_empty() || old == new {
                continue;
            }
            self.table
                .entry(old.clone())
                .or_insert_with(|| new.clone());
        }
        self.refresh_lengths();
    }

    /// Copy of this rewriter with one more (lowest precedence) layer.
    pub fn with_layer<'a, I>(&self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a String, &'a String)>,
    {
        let mut layered = self.clone();
        layered.push_layer(pairs);
        layered
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    fn refresh_lengths(&mut self) {
        let lengths: BTreeSet<usize> = self.table.keys().map(String::len).collect();
        self.lengths = lengths.into_iter().rev().collect();
    }

    /// Rewrite every key and string leaf of a payload.
    pub fn rewrite(&self, value: &Value) -> Value {
        if self.is_empty() {
            return value.clone();
        }
        self.walk(value)
    }

    fn walk(&self, value: &Value) -> Value {
        match value {
            Value::String(s) => Value::String(self.rewrite_str(s)),
            Value::Array(items) => Value::Array(items.iter().map(|v| self.walk(v)).collect()),
            Value::Object(map) => {
                let mut out = Map::with_capacity(map.len());
                for (key, v) in map {
                    out.insert(self.rewrite_str(key), self.walk(v));
                }
                Value::Object(out)
            }
            Value::Null | Value::Bool(_) | Value::Number(_) => value.clone(),
        }
    }

    /// Single left-to-right scan; at each position the longest known
    /// identifier is replaced and scanning resumes after it. Replacement
    /// text is never scanned again.
    pub fn rewrite_str(&self, input: &str) -> String {
        if self.is_empty() {
            return input.to_owned();
        }

        let mut out = String::with_capacity(input.len());
        let mut pos = 0;

        'scan: while pos < input.len() {
            let rest = &input[pos..];
            for &len in &self.lengths {
                if len > rest.len() || !rest.is_char_boundary(len) {
                    continue;
                }
                if let Some(new) = self.table.get(&rest[..len]) {
                    out.push_str(new);
                    pos += len;
                    continue 'scan;
                }
            }
            let Some(ch) = rest.chars().next() else {
                break;
            };
            out.push(ch);
            pos += ch.len_utf8();
        }

        out
    }
}
