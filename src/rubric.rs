//! Rubric-to-dimension scoring.
//!
//! Slots: 1 time management, 2 points of information, 3 style/persuasion,
//! 4 argument quality, 5 theory application, 6 team support, 7 rebuttal,
//! 8 feedback application.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::models::{Dimension, DimensionBreakdown};
use crate::stats::mean;

pub const RUBRIC_SLOTS: usize = 8;
const MAX_RATING: f64 = 5.0;
/// Score given to a dimension with no contributing rubric fields.
pub const NEUTRAL_SCORE: f64 = 50.0;

/// Rebuttal scores at or above this lean toward Strategy.
const REBUTTAL_SPLIT: f64 = 4.0;
const REBUTTAL_CONTENT_SHARE: f64 = 0.8;
const REBUTTAL_STRATEGY_SHARE: f64 = 0.2;
const REBUTTAL_SLOT: usize = 7;

const CONTENT_SLOTS: [usize; 2] = [4, 5];
const STYLE_SLOTS: [usize; 3] = [1, 3, 8];
const STRATEGY_SLOTS: [usize; 2] = [2, 6];

/// Parsed rubric values; `None` marks N/A, null, absent or unparseable.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RubricScores([Option<f64>; RUBRIC_SLOTS]);

impl RubricScores {
    /// Reads `rubric_1`..`rubric_8` from a JSON object. Anything else yields
    /// an empty score set.
    pub fn from_json(value: &Value) -> Self {
        let mut scores = RubricScores::default();
        let Some(object) = value.as_object() else {
            return scores;
        };
        for slot in 1..=RUBRIC_SLOTS {
            scores.0[slot - 1] = object
                .get(&format!("rubric_{slot}"))
                .and_then(parse_value);
        }
        scores
    }

    /// Builder used by tests and the CSV path; `slot` is 1-based.
    pub fn with(mut self, slot: usize, value: f64) -> Self {
        if (1..=RUBRIC_SLOTS).contains(&slot) && value.is_finite() {
            self.0[slot - 1] = Some(value);
        }
        self
    }

    pub fn get(&self, slot: usize) -> Option<f64> {
        self.0.get(slot.wrapping_sub(1)).copied().flatten()
    }

    pub fn is_empty(&self) -> bool {
        self.0.iter().all(Option::is_none)
    }
}

/// Decodes a stored rubric payload, which may be an object or that object
/// serialised into a string. Returns `None` when there are no rubric entries;
/// entries that are all N/A still decode and score neutrally.
pub fn decode(raw: &Value) -> Option<RubricScores> {
    let parsed;
    let value = match raw {
        Value::String(text) => {
            parsed = serde_json::from_str::<Value>(text).ok()?;
            &parsed
        }
        other => other,
    };
    let fields = value.as_object()?;
    (!fields.is_empty()).then(|| RubricScores::from_json(value))
}

fn parse_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64().filter(|v| v.is_finite()),
        Value::String(text) => {
            let text = text.trim();
            if text.is_empty() || text.eq_ignore_ascii_case("n/a") {
                return None;
            }
            leading_number(text).filter(|v| v.is_finite())
        }
        _ => None,
    }
}

/// Reads the numeric prefix of a cell, so "4/5" and "3.5 pts" score as 4
/// and 3.5.
fn leading_number(text: &str) -> Option<f64> {
    let mut end = 0;
    let mut seen_dot = false;
    for (index, c) in text.char_indices() {
        match c {
            '+' | '-' if index == 0 => {}
            '.' if !seen_dot => seen_dot = true,
            c if c.is_ascii_digit() => {}
            _ => break,
        }
        end = index + c.len_utf8();
    }
    text[..end].parse().ok()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DimensionScores {
    pub content: f64,
    pub style: f64,
    pub strategy: f64,
}

impl DimensionScores {
    pub fn get(&self, dimension: Dimension) -> f64 {
        match dimension {
            Dimension::Content => self.content,
            Dimension::Style => self.style,
            Dimension::Strategy => self.strategy,
        }
    }

    /// Weighted overall, rounded to the nearest integer.
    pub fn overall(&self, weights: &BTreeMap<Dimension, f64>) -> f64 {
        Dimension::ALL
            .iter()
            .map(|d| self.get(*d) * weights.get(d).copied().unwrap_or(0.0))
            .sum::<f64>()
            .round()
    }
}

/// Running sum of contributions against a max of 5 per contributing field.
#[derive(Default)]
struct Tally {
    points: f64,
    fields: usize,
}

impl Tally {
    fn add(&mut self, contribution: f64) {
        self.points += contribution;
        self.fields += 1;
    }

    fn add_slots(&mut self, scores: &RubricScores, slots: &[usize]) {
        for value in slots.iter().filter_map(|slot| scores.get(*slot)) {
            self.add(value);
        }
    }

    fn percent(&self) -> f64 {
        if self.fields == 0 {
            return NEUTRAL_SCORE;
        }
        self.points / (self.fields as f64 * MAX_RATING) * 100.0
    }
}

pub fn score_dimensions(scores: &RubricScores) -> DimensionScores {
    let mut content = Tally::default();
    let mut style = Tally::default();
    let mut strategy = Tally::default();

    content.add_slots(scores, &CONTENT_SLOTS);
    style.add_slots(scores, &STYLE_SLOTS);
    strategy.add_slots(scores, &STRATEGY_SLOTS);

    if let Some(rebuttal) = scores.get(REBUTTAL_SLOT) {
        if rebuttal < REBUTTAL_SPLIT {
            content.add(rebuttal);
            strategy.add(rebuttal * REBUTTAL_STRATEGY_SHARE);
        } else {
            content.add(rebuttal * REBUTTAL_CONTENT_SHARE);
            strategy.add(rebuttal);
        }
    }

    DimensionScores {
        content: content.percent(),
        style: style.percent(),
        strategy: strategy.percent(),
    }
}

struct Component {
    slot: usize,
    label: &'static str,
    strength: Option<&'static str>,
    weakness: Option<&'static str>,
}

const fn component(
    slot: usize,
    label: &'static str,
    strength: Option<&'static str>,
    weakness: Option<&'static str>,
) -> Component {
    Component {
        slot,
        label,
        strength,
        weakness,
    }
}

fn components(dimension: Dimension) -> &'static [Component] {
    const CONTENT: [Component; 3] = [
        component(4, "Argument Quality", Some("Strong argument construction"), Some("Argument quality needs improvement")),
        component(5, "Theory Application", Some("Excellent theory application"), Some("Work on applying debate theory")),
        component(7, "Rebuttal", Some("Powerful rebuttals"), Some("Rebuttal skills need development")),
    ];
    const STYLE: [Component; 3] = [
        component(1, "Time Management", Some("Excellent time management"), Some("Work on speech timing")),
        component(3, "Persuasion", Some("Highly persuasive delivery"), Some("Enhance persuasive impact")),
        component(8, "Improvement", Some("Great at applying feedback"), Some("Focus on implementing feedback")),
    ];
    const STRATEGY: [Component; 3] = [
        component(2, "POI Engagement", Some("Active POI engagement"), Some("Increase POI participation")),
        component(6, "Team Support", Some("Excellent team player"), Some("Strengthen team coordination")),
        component(7, "Strategic Rebuttal", None, None),
    ];
    match dimension {
        Dimension::Content => &CONTENT,
        Dimension::Style => &STYLE,
        Dimension::Strategy => &STRATEGY,
    }
}

/// Per-component averages (N/A excluded) with canned strengths and weaknesses.
pub fn breakdown(dimension: Dimension, window: &[RubricScores]) -> DimensionBreakdown {
    let mut result = DimensionBreakdown::default();
    if window.is_empty() {
        return result;
    }

    for part in components(dimension) {
        let values: Vec<f64> = window.iter().filter_map(|s| s.get(part.slot)).collect();
        let avg = mean(&values);

        // Rebuttal only shows under Strategy once it leans that way.
        if dimension == Dimension::Strategy && part.slot == REBUTTAL_SLOT && avg < REBUTTAL_SPLIT {
            continue;
        }

        result
            .components
            .insert(part.label.to_string(), (avg / MAX_RATING * 100.0).round());

        if values.is_empty() {
            continue;
        }
        match (part.strength, part.weakness) {
            (Some(text), _) if avg >= 4.0 => result.strengths.push(text.to_string()),
            (_, Some(text)) if avg <= 2.0 => result.weaknesses.push(text.to_string()),
            _ => {}
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn all_missing_is_neutral() {
        let scores = RubricScores::from_json(&json!({
            "rubric_1": "N/A", "rubric_2": "n/a", "rubric_3": null, "rubric_4": "",
            "rubric_5": "N/A", "rubric_6": "N/A", "rubric_7": "N/A", "rubric_8": "N/A"
        }));
        assert!(scores.is_empty());
        let dims = score_dimensions(&scores);
        assert_eq!(dims.content, 50.0);
        assert_eq!(dims.style, 50.0);
        assert_eq!(dims.strategy, 50.0);
    }

    #[test]
    fn parses_numbers_numeric_strings_and_drops_garbage() {
        let scores = RubricScores::from_json(&json!({
            "rubric_1": 4, "rubric_2": "3.5", "rubric_3": "great", "rubric_4": true
        }));
        assert_eq!(scores.get(1), Some(4.0));
        assert_eq!(scores.get(2), Some(3.5));
        assert_eq!(scores.get(3), None);
        assert_eq!(scores.get(4), None);
        assert_eq!(scores.get(9), None);
        assert_eq!(scores.get(0), None);
        assert!(RubricScores::from_json(&json!([1, 2, 3])).is_empty());
    }

    #[test]
    fn numeric_prefix_of_annotated_cells_is_kept() {
        let scores = RubricScores::from_json(&json!({
            "rubric_1": "4/5", "rubric_2": " 3.5 pts", "rubric_3": "2.5.1",
            "rubric_4": "-", "rubric_5": ".5", "rubric_6": "x4"
        }));
        assert_eq!(scores.get(1), Some(4.0));
        assert_eq!(scores.get(2), Some(3.5));
        assert_eq!(scores.get(3), Some(2.5));
        assert_eq!(scores.get(4), None);
        assert_eq!(scores.get(5), Some(0.5));
        assert_eq!(scores.get(6), None);
    }

    #[test]
    fn decode_accepts_string_payloads_and_rejects_empty() {
        let nested = json!(r#"{"rubric_4": 3, "rubric_7": "N/A"}"#);
        assert_eq!(decode(&nested).and_then(|s| s.get(4)), Some(3.0));
        assert!(decode(&json!({})).is_none());
        assert!(decode(&json!("not json")).is_none());
        assert!(decode(&json!(4)).is_none());
        // present but all N/A still counts as a scored record
        assert!(decode(&json!({"rubric_1": "N/A"})).is_some_and(|s| s.is_empty()));
    }

    #[test]
    fn rebuttal_below_four_favours_content() {
        let dims = score_dimensions(&RubricScores::default().with(7, 3.9));
        assert!(close(dims.content, 3.9 / 5.0 * 100.0));
        assert!(close(dims.strategy, 0.2 * 3.9 / 5.0 * 100.0));
    }

    #[test]
    fn rebuttal_of_exactly_four_favours_strategy() {
        let dims = score_dimensions(&RubricScores::default().with(7, 4.0));
        assert!(close(dims.content, 0.8 * 4.0 / 5.0 * 100.0));
        assert!(close(dims.strategy, 80.0));
    }

    #[test]
    fn style_only_feedback() {
        let scores = RubricScores::from_json(&json!({"rubric_1": 5, "rubric_3": 5, "rubric_8": 5}));
        let dims = score_dimensions(&scores);
        assert_eq!(dims.style, 100.0);
        assert_eq!(dims.content, 50.0);
        assert_eq!(dims.strategy, 50.0);
    }

    #[test]
    fn full_rubric_mixes_rebuttal_into_both_sides() {
        let scores = (1..=8).fold(RubricScores::default(), |s, slot| s.with(slot, 4.0));
        let dims = score_dimensions(&scores);
        // content: 4 + 4 + 3.2 over 15
        assert!(close(dims.content, 11.2 / 15.0 * 100.0));
        assert!(close(dims.style, 80.0));
        assert!(close(dims.strategy, 80.0));
    }

    #[test]
    fn overall_uses_forty_thirty_thirty() {
        let dims = DimensionScores {
            content: 72.0,
            style: 80.0,
            strategy: 60.0,
        };
        let weights = crate::config::EngineConfig::default().dimension_weights;
        // 28.8 + 24 + 18
        assert_eq!(dims.overall(&weights), 71.0);
    }

    #[test]
    fn breakdown_flags_strengths_and_weaknesses() {
        let window = vec![
            RubricScores::default().with(4, 5.0).with(5, 2.0).with(7, 4.0),
            RubricScores::default().with(4, 4.0).with(5, 1.0),
        ];
        let content = breakdown(Dimension::Content, &window);
        assert_eq!(content.components["Argument Quality"], 90.0);
        assert_eq!(content.components["Theory Application"], 30.0);
        assert_eq!(content.components["Rebuttal"], 80.0);
        assert!(content.strengths.contains(&"Strong argument construction".to_string()));
        assert!(content.strengths.contains(&"Powerful rebuttals".to_string()));
        assert_eq!(content.weaknesses, vec!["Work on applying debate theory".to_string()]);

        let strategy = breakdown(Dimension::Strategy, &window);
        assert_eq!(strategy.components["Strategic Rebuttal"], 80.0);
        assert_eq!(strategy.components["POI Engagement"], 0.0);
        assert!(strategy.strengths.is_empty());
    }

    proptest! {
        #[test]
        fn dimensions_stay_in_range(values in proptest::collection::vec(proptest::option::of(1.0f64..=5.0), 8)) {
            let scores = values
                .iter()
                .enumerate()
                .fold(RubricScores::default(), |s, (i, v)| match v {
                    Some(v) => s.with(i + 1, *v),
                    None => s,
                });
            let dims = score_dimensions(&scores);
            for value in [dims.content, dims.style, dims.strategy] {
                prop_assert!((0.0..=100.0).contains(&value));
            }
        }
    }
}
