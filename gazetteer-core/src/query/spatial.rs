//! Index hints for spatial join conditions.
//!
//! SpatiaLite only consults an R-tree when a query names the `SpatialIndex`
//! virtual table explicitly. [`optimize_join_condition`] rewrites the first
//! recognised predicate of the form `FN(expr, table.column)` into a
//! bounding-box pre-filter conjoined with the original predicate:
//!
//! ```text
//! table.rowid IN (SELECT rowid FROM SpatialIndex
//!     WHERE f_table_name='table' AND search_frame=expr)
//! AND FN(expr, table.column)
//! ```
//!
//! The rewrite is syntactic. Conditions that do not match the expected
//! shapes are returned untouched and only lose the hint.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::{Captures, Regex, RegexBuilder};

/// Predicates that benefit from an index pre-filter, in match priority.
pub const SPATIAL_PREDICATES: [&str; 8] = [
    "ST_Within",
    "ST_Intersects",
    "ST_Contains",
    "ST_Overlaps",
    "ST_Touches",
    "ST_Crosses",
    "ST_Disjoint",
    "ST_Equals",
];

const SPATIAL_INDEX_TABLE: &str = "SpatialIndex";

struct Patterns {
    centroid: Regex,
    standard: Vec<(&'static str, Regex)>,
}

static PATTERNS: LazyLock<Option<Patterns>> = LazyLock::new(|| match compile_patterns() {
    Ok(patterns) => Some(patterns),
    Err(err) => {
        log::warn!("spatial join hints disabled: {err}");
        None
    }
});

fn case_insensitive(pattern: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(pattern).case_insensitive(true).build()
}

fn compile_patterns() -> Result<Patterns, regex::Error> {
    let alternatives = SPATIAL_PREDICATES.join("|");
    let centroid = case_insensitive(&format!(
        r"({alternatives})\s*\(\s*ST_Centroid\s*\(\s*([^)]+)\)\s*,\s*(\w+)\.(\w+)\s*\)"
    ))?;
    let standard = SPATIAL_PREDICATES
        .iter()
        .map(|predicate| {
            case_insensitive(&format!(r"{predicate}\s*\(\s*([^,]+),\s*(\w+)\.(\w+)\s*\)"))
                .map(|regex| (*predicate, regex))
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Patterns { centroid, standard })
}

/// Add a spatial index pre-filter to the first spatial predicate in
/// `condition`.
///
/// Centroid-wrapped predicates such as
/// `ST_Within(ST_Centroid(a.geometry), b.geometry)` are tried first, then
/// plain predicates in [`SPATIAL_PREDICATES`] order.
///
/// # Examples
/// ```
/// use gazetteer_core::query::spatial::optimize_join_condition;
///
/// assert_eq!(
///     optimize_join_condition("ST_Within(g1, t2.g2)"),
///     "t2.rowid IN (SELECT rowid FROM SpatialIndex WHERE f_table_name='t2' \
///      AND search_frame=g1) AND ST_Within(g1, t2.g2)"
/// );
/// assert_eq!(optimize_join_condition("a.id = b.id"), "a.id = b.id");
/// ```
#[must_use]
pub fn optimize_join_condition(condition: &str) -> Cow<'_, str> {
    let Some(patterns) = PATTERNS.as_ref() else {
        return Cow::Borrowed(condition);
    };

    if patterns.centroid.is_match(condition) {
        return patterns
            .centroid
            .replacen(condition, 1, |captures: &Captures<'_>| {
                let predicate = canonical_predicate(&captures[1]);
                let frame = format!("ST_Centroid({})", captures[2].trim());
                hinted_predicate(predicate, &frame, &captures[3], &captures[4])
            });
    }

    for (predicate, regex) in &patterns.standard {
        if regex.is_match(condition) {
            return regex.replacen(condition, 1, |captures: &Captures<'_>| {
                hinted_predicate(predicate, captures[1].trim(), &captures[2], &captures[3])
            });
        }
    }

    Cow::Borrowed(condition)
}

fn canonical_predicate(matched: &str) -> &str {
    SPATIAL_PREDICATES
        .iter()
        .copied()
        .find(|predicate| predicate.eq_ignore_ascii_case(matched))
        .unwrap_or(matched)
}

fn hinted_predicate(predicate: &str, frame: &str, table: &str, column: &str) -> String {
    format!(
        "{table}.rowid IN (SELECT rowid FROM {SPATIAL_INDEX_TABLE} \
         WHERE f_table_name='{table}' AND search_frame={frame}) \
         AND {predicate}({frame}, {table}.{column})"
    )
}
