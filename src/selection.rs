//! Data-selection predicates and their union across a batch of commands.

use std::collections::BTreeMap;

use itertools::Itertools;
use log::{debug, trace};
use vec1::Vec1;

use crate::parse::{is_blank_or_comment, tokenise};

/// The keys that select data rather than configure a flagging mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SelectionKey {
    Antenna,
    Timerange,
    Spw,
    Scan,
    Field,
    Correlation,
    Intent,
    Feed,
    Array,
    Uvrange,
    Observation,
}

impl SelectionKey {
    pub const ALL: [SelectionKey; 11] = [
        SelectionKey::Antenna,
        SelectionKey::Timerange,
        SelectionKey::Spw,
        SelectionKey::Scan,
        SelectionKey::Field,
        SelectionKey::Correlation,
        SelectionKey::Intent,
        SelectionKey::Feed,
        SelectionKey::Array,
        SelectionKey::Uvrange,
        SelectionKey::Observation,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SelectionKey::Antenna => "antenna",
            SelectionKey::Timerange => "timerange",
            SelectionKey::Spw => "spw",
            SelectionKey::Scan => "scan",
            SelectionKey::Field => "field",
            SelectionKey::Correlation => "correlation",
            SelectionKey::Intent => "intent",
            SelectionKey::Feed => "feed",
            SelectionKey::Array => "array",
            SelectionKey::Uvrange => "uvrange",
            SelectionKey::Observation => "observation",
        }
    }

    pub fn from_name(name: &str) -> Option<SelectionKey> {
        SelectionKey::ALL.into_iter().find(|k| k.as_str() == name)
    }

    /// Correlation selection is done by each agent, never by the coarse
    /// narrowing of the engine's working set.
    pub fn narrows_working_set(self) -> bool {
        self != SelectionKey::Correlation
    }
}

/// The selection of one flag command. Unset keys select everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection(BTreeMap<SelectionKey, String>);

impl Selection {
    pub fn get(&self, key: SelectionKey) -> Option<&str> {
        self.0.get(&key).map(String::as_str)
    }

    /// Set a key's expression. An empty expression unsets the key.
    pub fn set(&mut self, key: SelectionKey, expression: &str) {
        if expression.is_empty() {
            self.0.remove(&key);
        } else {
            self.0.insert(key, expression.to_string());
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (SelectionKey, &str)> {
        self.0.iter().map(|(k, v)| (*k, v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Are any keys that narrow the working set present?
    pub fn has_data_selection(&self) -> bool {
        self.0.keys().any(|k| k.narrows_working_set())
    }

    /// This selection with only the per-agent keys (i.e. correlation) left.
    pub fn without_data_selection(&self) -> Selection {
        Selection(
            self.0
                .iter()
                .filter(|(k, _)| !k.narrows_working_set())
                .map(|(k, v)| (*k, v.clone()))
                .collect(),
        )
    }
}

/// The combined constraint on one selection key across many commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionExpr {
    /// Everything is selected.
    Unconstrained,

    /// Only data matching one of these literal expressions is selected. Range
    /// expressions (e.g. `a~b`) are kept as literals.
    Values(Vec1<String>),
}

impl SelectionExpr {
    /// The expression to hand to the engine; empty means unconstrained.
    pub fn to_expression(&self) -> String {
        match self {
            SelectionExpr::Unconstrained => String::new(),
            SelectionExpr::Values(values) => values.iter().join(","),
        }
    }

    /// The union of two constraints. Unconstrained absorbs anything.
    pub fn union(&self, other: &SelectionExpr) -> SelectionExpr {
        match (self, other) {
            (SelectionExpr::Values(a), SelectionExpr::Values(b)) => {
                let merged = a.iter().chain(b.iter()).unique().cloned().collect();
                // Neither side is empty, so neither is the merge.
                match Vec1::try_from_vec(merged) {
                    Ok(v) => SelectionExpr::Values(v),
                    Err(_) => SelectionExpr::Unconstrained,
                }
            }
            _ => SelectionExpr::Unconstrained,
        }
    }
}

/// The union of the selections of a whole batch of commands. This is only
/// good for narrowing the data the engine iterates over; each agent still
/// applies its own selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionUnion(BTreeMap<SelectionKey, SelectionExpr>);

impl SelectionUnion {
    /// Work out the union from raw command lines. A key is only constrained if
    /// every command constrains it; one command that doesn't constrain a key
    /// means the union can't either. Comment lines, blank lines and lines that
    /// don't parse don't count.
    pub fn from_commands<S: AsRef<str>>(commands: &[S]) -> SelectionUnion {
        let mut num_lines = 0;
        let mut per_key: BTreeMap<SelectionKey, (usize, Vec<String>)> = BTreeMap::new();

        for line in commands.iter().map(AsRef::as_ref) {
            if is_blank_or_comment(line) {
                continue;
            }
            let pairs = match tokenise(line) {
                Ok(p) => p,
                Err(e) => {
                    debug!("Not using '{line}' in the selection union: {e}");
                    continue;
                }
            };
            num_lines += 1;

            let mut seen_in_line = vec![];
            for (key, value) in pairs {
                let key = match SelectionKey::from_name(key) {
                    Some(k) if !value.is_empty() => k,
                    _ => continue,
                };
                let (count, values) = per_key.entry(key).or_default();
                if !seen_in_line.contains(&key) {
                    *count += 1;
                    seen_in_line.push(key);
                }
                if !values.iter().any(|v| v == value) {
                    values.push(value.to_string());
                }
            }
        }

        let union = SelectionKey::ALL
            .into_iter()
            .map(|key| {
                let expr = match per_key.remove(&key) {
                    Some((count, values)) if count == num_lines && key.narrows_working_set() => {
                        match Vec1::try_from_vec(values) {
                            Ok(v) => SelectionExpr::Values(v),
                            Err(_) => SelectionExpr::Unconstrained,
                        }
                    }
                    _ => SelectionExpr::Unconstrained,
                };
                (key, expr)
            })
            .collect();
        let union = SelectionUnion(union);
        trace!("Selection union over {num_lines} commands: {union:?}");
        union
    }

    pub fn get(&self, key: SelectionKey) -> &SelectionExpr {
        self.0.get(&key).unwrap_or(&SelectionExpr::Unconstrained)
    }

    /// The constrained keys and their expressions.
    pub fn constrained(&self) -> impl Iterator<Item = (SelectionKey, String)> + '_ {
        self.0.iter().filter_map(|(k, expr)| match expr {
            SelectionExpr::Unconstrained => None,
            values => Some((*k, values.to_expression())),
        })
    }

    pub fn is_unconstrained(&self) -> bool {
        self.constrained().next().is_none()
    }
}

impl std::fmt::Display for SelectionUnion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_unconstrained() {
            return write!(f, "<everything>");
        }
        let s = self
            .constrained()
            .map(|(k, v)| format!("{}='{v}'", k.as_str()))
            .join(" ");
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expr(union: &SelectionUnion, key: SelectionKey) -> String {
        union.get(key).to_expression()
    }

    #[test]
    fn test_key_names_round_trip() {
        for key in SelectionKey::ALL {
            assert_eq!(SelectionKey::from_name(key.as_str()), Some(key));
        }
        assert_eq!(SelectionKey::from_name("mode"), None);
    }

    #[test]
    fn test_union_when_every_line_constrains() {
        let union = SelectionUnion::from_commands(&[
            "antenna='ea01' spw='0'",
            "antenna='ea02' spw='0'",
            "antenna='ea01' spw='1'",
        ]);
        assert_eq!(expr(&union, SelectionKey::Antenna), "ea01,ea02");
        assert_eq!(expr(&union, SelectionKey::Spw), "0,1");
        assert_eq!(union.get(SelectionKey::Scan), &SelectionExpr::Unconstrained);
    }

    #[test]
    fn test_union_collapses_when_a_line_is_unconstrained() {
        let union = SelectionUnion::from_commands(&["antenna='ea01' scan=1", "scan=2"]);
        assert_eq!(union.get(SelectionKey::Antenna), &SelectionExpr::Unconstrained);
        assert_eq!(expr(&union, SelectionKey::Scan), "1,2");
    }

    #[test]
    fn test_correlation_is_never_in_the_union() {
        let union = SelectionUnion::from_commands(&["correlation=RR", "correlation=LL"]);
        assert_eq!(
            union.get(SelectionKey::Correlation),
            &SelectionExpr::Unconstrained
        );
        assert!(union.is_unconstrained());
    }

    #[test]
    fn test_comments_and_bad_lines_dont_count() {
        let union = SelectionUnion::from_commands(&[
            "# a comment",
            "",
            "field=3C286",
            "field=3C48 # trailing",
            "field",
        ]);
        assert_eq!(expr(&union, SelectionKey::Field), "3C286,3C48");
    }

    #[test]
    fn test_empty_values_are_unconstrained() {
        let union = SelectionUnion::from_commands(&["antenna='' scan=1", "antenna=ea01 scan=1"]);
        assert_eq!(union.get(SelectionKey::Antenna), &SelectionExpr::Unconstrained);
        assert_eq!(expr(&union, SelectionKey::Scan), "1");
    }

    #[test]
    fn test_union_is_monotonic() {
        let mut lines = vec!["antenna=ea01 spw=0 timerange=01:00:00~02:00:00"];
        let before = SelectionUnion::from_commands(&lines);

        // Adding a line that constrains the same keys keeps every old value.
        lines.push("antenna=ea05 spw=0 timerange=03:00:00~04:00:00");
        let after = SelectionUnion::from_commands(&lines);
        for key in [SelectionKey::Antenna, SelectionKey::Spw, SelectionKey::Timerange] {
            let old = expr(&before, key);
            let new = expr(&after, key);
            for value in old.split(',') {
                assert!(new.split(',').any(|v| v == value), "{key:?} lost {value}");
            }
        }

        // Adding a line that omits a key unconstrains that key.
        lines.push("antenna=ea07 timerange=05:00:00~06:00:00");
        let last = SelectionUnion::from_commands(&lines);
        assert_eq!(last.get(SelectionKey::Spw), &SelectionExpr::Unconstrained);
        assert_eq!(expr(&last, SelectionKey::Antenna), "ea01,ea05,ea07");
    }

    #[test]
    fn test_expr_union() {
        let a = SelectionExpr::Values(Vec1::try_from_vec(vec!["1".to_string()]).unwrap());
        let b = SelectionExpr::Values(
            Vec1::try_from_vec(vec!["2".to_string(), "1".to_string()]).unwrap(),
        );
        assert_eq!(a.union(&b).to_expression(), "1,2");
        assert_eq!(a.union(&SelectionExpr::Unconstrained), SelectionExpr::Unconstrained);
    }

    #[test]
    fn test_selection_without_data_keys() {
        let mut sel = Selection::default();
        sel.set(SelectionKey::Antenna, "ea01");
        sel.set(SelectionKey::Correlation, "RR");
        assert!(sel.has_data_selection());
        let stripped = sel.without_data_selection();
        assert!(!stripped.has_data_selection());
        assert_eq!(stripped.get(SelectionKey::Correlation), Some("RR"));

        sel.set(SelectionKey::Antenna, "");
        assert_eq!(sel.get(SelectionKey::Antenna), None);
    }
}
