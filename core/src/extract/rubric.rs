//! Rubric extraction. The structured (modern) layout is tried before the flat
//! (classic) one. A page without a rubric yields `None`.

use regex::Regex;
use scraper::{ElementRef, Html};
use std::sync::OnceLock;

use super::page::{clean_text, first_within, select_all, select_first, select_within};
use super::strategy::{first_success, Strategy};
use crate::model::{RubricItem, RubricRating};

const CLASSIC_CONTAINERS: &[&str] = &[
    r#"[data-testid="rubric-tab"]"#,
    ".rubric",
    "#rubrics .rubric_container",
    ".rubric_container",
];

const CLASSIC_CRITERIA: &[&str] = &[
    r#"[data-testid="rubric-criteria"]"#,
    ".rubric-criteria",
    ".criterion",
    ".rubric_criterion",
];

const CLASSIC_DESCRIPTION: &[&str] = &[
    r#"[data-testid="criterion-description"]"#,
    ".description_title",
    ".criterion_description",
    ".description",
    ".rating-description",
];

const CLASSIC_POINTS: &[&str] = &[
    r#"[data-testid="criterion-points"]"#,
    ".points",
    ".criterion_points",
    ".points_possible",
];

const MODERN_CRITERION_TEXT: &[&str] = &[
    ".description .css-1ugbsk7-text",
    r#"[data-testid="criterion-description"]"#,
    ".description",
];

fn number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+(?:\.\d+)?)").expect("number regex is valid"))
}

fn out_of_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"/\s*(\d+(?:\.\d+)?)").expect("out-of regex is valid"))
}

/// First number in the text, `0` when there is none.
pub fn first_number(text: &str) -> f64 {
    number_re()
        .captures(text)
        .and_then(|c| c[1].parse().ok())
        .unwrap_or(0.0)
}

fn first_text(row: ElementRef<'_>, selectors: &[&str]) -> Option<String> {
    selectors
        .iter()
        .find_map(|css| first_within(row, css).map(clean_text))
}

fn modern_row(row: ElementRef<'_>) -> RubricItem {
    let criterion = first_text(row, MODERN_CRITERION_TEXT).unwrap_or_default();

    let points_text = first_within(row, r#"[data-testid="criterion-points"] .graded-points"#)
        .or_else(|| first_within(row, r#"[data-testid="criterion-points"]"#))
        .map(clean_text)
        .unwrap_or_default();
    // "-- / 10 pts": possible points follow the slash.
    let points = out_of_re()
        .captures(&points_text)
        .and_then(|c| c[1].parse().ok())
        .unwrap_or(0.0);

    let ratings = select_within(row, ".rating-tier")
        .into_iter()
        .map(|tier| RubricRating {
            points: first_within(tier, r#"[data-testid="rating-points"]"#)
                .map(clean_text)
                .unwrap_or_default(),
            title: first_within(tier, ".rating-description")
                .map(clean_text)
                .unwrap_or_default(),
            description: first_within(tier, ".css-17r2l9k-text")
                .map(clean_text)
                .unwrap_or_default(),
        })
        .collect();

    RubricItem {
        criterion,
        points,
        ratings,
    }
}

fn modern(doc: &Html) -> Option<Vec<RubricItem>> {
    let rows: Vec<_> = select_all(doc, r#"[data-testid="rubric-criterion"]"#)
        .into_iter()
        .map(modern_row)
        .collect();
    (!rows.is_empty()).then_some(rows)
}

fn classic_row(row: ElementRef<'_>) -> RubricItem {
    RubricItem {
        criterion: first_text(row, CLASSIC_DESCRIPTION).unwrap_or_default(),
        points: first_text(row, CLASSIC_POINTS)
            .map(|t| first_number(&t))
            .unwrap_or(0.0),
        ratings: Vec::new(),
    }
}

fn classic(doc: &Html) -> Option<Vec<RubricItem>> {
    CLASSIC_CONTAINERS.iter().find_map(|container_css| {
        let container = select_first(doc, container_css)?;
        CLASSIC_CRITERIA.iter().find_map(|criteria_css| {
            let rows: Vec<_> = select_within(container, criteria_css)
                .into_iter()
                .map(classic_row)
                .collect();
            (!rows.is_empty()).then_some(rows)
        })
    })
}

const RUBRIC: &[Strategy<Vec<RubricItem>>] = &[
    Strategy::new("modern rubric", modern),
    Strategy::new("classic rubric", classic),
];

pub fn extract_rubric(doc: &Html) -> Option<Vec<RubricItem>> {
    first_success(RUBRIC, doc).map(|(_, items)| items)
}
