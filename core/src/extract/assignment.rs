//! Assignment list and detail pages.

use chrono::{NaiveDate, NaiveTime};
use regex::Regex;
use scraper::{ElementRef, Html};
use std::sync::OnceLock;

use super::diagnostic::page_structure;
use super::outcome::ExtractionFailure;
use super::page::{clean_text, exists, first_within, select_all, PageSnapshot};
use super::rubric::{extract_rubric, first_number};
use super::strategy::first_selector;
use crate::error::ErrorKind;
use crate::model::{default_group, RubricItem};

/// One row of the assignments index, before its detail page is visited.
#[derive(Debug, Clone, PartialEq)]
pub struct AssignmentSummary {
    pub title: String,
    pub url: String,
    pub due_date: Option<String>,
    pub points_possible: f64,
    pub status: String,
    pub assignment_group: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssignmentDetail {
    pub description: String,
    pub rubric: Option<Vec<RubricItem>>,
}

const DESCRIPTION_SELECTORS: &[&str] = &[
    ".a2-toggle-details-container",
    "#assignment_show .description.user_content",
    "#assignment_show .description",
    ".description.user_content",
    ".description",
];

/// Status markers inside `.ig-admin`, checked in order.
const STATUS_MARKERS: &[(&str, &str)] = &[
    (".submitted", "Submitted"),
    (".late", "Late"),
    (".missing", "Missing"),
    (".excused", "Excused"),
    (".not_submitted", "Not Submitted"),
];

const DEFAULT_STATUS: &str = "Not Started";

fn has_class(el: ElementRef<'_>, class: &str) -> bool {
    el.value().classes().any(|c| c == class)
}

fn header_title(header: ElementRef<'_>) -> Option<String> {
    first_within(header, ".ig-header-title")
        .map(clean_text)
        .filter(|t| !t.is_empty())
}

/// Nearest group header: a preceding `.ig-header` sibling, or the enclosing
/// `.assignment_group` block.
fn group_of(item: ElementRef<'_>) -> String {
    let from_sibling = item
        .prev_siblings()
        .filter_map(ElementRef::wrap)
        .find(|sib| has_class(*sib, "ig-header"))
        .and_then(header_title);
    if let Some(title) = from_sibling {
        return title;
    }

    item.ancestors()
        .filter_map(ElementRef::wrap)
        .find(|a| has_class(*a, "ig-header") || has_class(*a, "assignment_group"))
        .and_then(header_title)
        .unwrap_or_else(default_group)
}

fn status_of(item: ElementRef<'_>) -> String {
    let Some(admin) = first_within(item, ".ig-admin") else {
        return DEFAULT_STATUS.to_string();
    };
    STATUS_MARKERS
        .iter()
        .find(|(css, _)| first_within(admin, css).is_some())
        .map(|(_, label)| label.to_string())
        .unwrap_or_else(|| DEFAULT_STATUS.to_string())
}

fn resolve_url(base: &str, href: &str) -> String {
    url::Url::parse(base)
        .and_then(|b| b.join(href))
        .map(|u| u.to_string())
        .unwrap_or_else(|_| href.to_string())
}

fn due_prefix_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^due\s*:?\s*").expect("due prefix regex is valid"))
}

fn month_day_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"([A-Za-z]{3})[a-z]*\.?\s+(\d{1,2})(?:\s+at\s+(.+))?")
            .expect("month day regex is valid")
    })
}

fn clock_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(\d{1,2})(?::(\d{2}))?\s*(am|pm)").expect("clock regex is valid")
    })
}

fn month_number(abbr: &str) -> Option<u32> {
    const MONTHS: [&str; 12] = [
        "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
    ];
    let lower = abbr.to_lowercase();
    MONTHS.iter().position(|m| *m == lower).map(|i| i as u32 + 1)
}

/// Normalizes an index-page due date such as `Due Sep 5 at 11:59pm`.
///
/// The page omits the year, so `year` is supplied by the caller. Returns
/// `YYYY-MM-DD` or `YYYY-MM-DDTHH:MM:00`; anything unparseable is `None`.
pub fn parse_due_date(text: &str, year: i32) -> Option<String> {
    let cleaned = super::page::collapse_whitespace(text);
    let cleaned = due_prefix_re().replace(&cleaned, "");

    let caps = month_day_re().captures(&cleaned)?;
    let month = month_number(&caps[1])?;
    let day: u32 = caps[2].parse().ok()?;
    let date = NaiveDate::from_ymd_opt(year, month, day)?;

    let time = caps.get(3).and_then(|t| {
        let c = clock_re().captures(t.as_str())?;
        let mut hours: u32 = c[1].parse().ok()?;
        let minutes: u32 = c.get(2).and_then(|m| m.as_str().parse().ok()).unwrap_or(0);
        match c[3].to_lowercase().as_str() {
            "pm" if hours < 12 => hours += 12,
            "am" if hours == 12 => hours = 0,
            _ => {}
        }
        NaiveTime::from_hms_opt(hours, minutes, 0)
    });

    Some(match time {
        Some(t) => date.and_time(t).format("%Y-%m-%dT%H:%M:00").to_string(),
        None => date.format("%Y-%m-%d").to_string(),
    })
}

fn summary_of(item: ElementRef<'_>, page_url: &str, year: i32) -> Option<AssignmentSummary> {
    let link = first_within(item, "a.ig-title")?;
    let title = clean_text(link);
    let href = link.value().attr("href")?;

    Some(AssignmentSummary {
        title,
        url: resolve_url(page_url, href),
        due_date: first_within(item, ".assignment-date-due, .due_date")
            .and_then(|d| parse_due_date(&clean_text(d), year)),
        points_possible: first_within(item, ".points_possible")
            .map(|p| first_number(&clean_text(p)))
            .unwrap_or(0.0),
        status: status_of(item),
        assignment_group: group_of(item),
    })
}

/// Reads every `li.assignment` on the index page. No rows is ContentNotFound.
pub fn extract_assignment_list(
    snapshot: &PageSnapshot,
    year: i32,
) -> Result<Vec<AssignmentSummary>, ExtractionFailure> {
    let doc = snapshot.document();
    let items = select_all(&doc, "li.assignment");

    if items.is_empty() {
        return Err(ExtractionFailure::new(
            ErrorKind::ContentNotFound,
            "No assignments found on this page",
        )
        .with_diagnostic(page_structure(&doc, &snapshot.url, snapshot.frames.len())));
    }

    let total = items.len();
    let summaries: Vec<_> = items
        .into_iter()
        .filter_map(|item| summary_of(item, &snapshot.url, year))
        .collect();
    if summaries.len() < total {
        tracing::warn!(
            skipped = total - summaries.len(),
            "assignment rows without a title link were skipped"
        );
    }
    if summaries.is_empty() {
        return Err(ExtractionFailure::new(
            ErrorKind::ContentNotFound,
            "Assignment rows had no readable links",
        ));
    }
    Ok(summaries)
}

/// Reads an assignment page: body text and rubric.
pub fn extract_assignment_detail(
    snapshot: &PageSnapshot,
) -> Result<AssignmentDetail, ExtractionFailure> {
    let doc = snapshot.document();
    detail_from(&doc, &snapshot.url, snapshot.frames.len())
}

/// Rubric criteria carry their own `.description` blocks.
fn in_rubric(el: ElementRef<'_>) -> bool {
    el.ancestors()
        .filter_map(ElementRef::wrap)
        .any(|a| a.value().attr("data-testid") == Some("rubric-criterion"))
}

fn detail_from(doc: &Html, url: &str, frames: usize) -> Result<AssignmentDetail, ExtractionFailure> {
    let description = first_selector(doc, DESCRIPTION_SELECTORS, |el| {
        if in_rubric(el) {
            return None;
        }
        let text = clean_text(el);
        (!text.is_empty()).then_some(text)
    });
    let rubric = extract_rubric(doc);

    // Neither a body nor a rubric, and no assignment frame: the page has not rendered.
    if description.is_none() && rubric.is_none() && !exists(doc, "#assignment_show") {
        return Err(ExtractionFailure::new(
            ErrorKind::ContentNotFound,
            "Assignment content not found",
        )
        .with_diagnostic(page_structure(doc, url, frames)));
    }

    Ok(AssignmentDetail {
        description: description.unwrap_or_default(),
        rubric,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const INDEX: &str = r#"
        <div class="assignment_group">
            <div class="ig-header"><span class="ig-header-title">Homework</span></div>
            <ul class="ig-list">
                <li class="assignment">
                    <a class="ig-title" href="/courses/7/assignments/1">HW 1</a>
                    <div class="assignment-date-due">Due Sep 5 at 11:59pm</div>
                    <span class="points_possible">10 pts</span>
                    <div class="ig-admin"><i class="submitted"></i></div>
                </li>
                <li class="assignment">
                    <a class="ig-title" href="/courses/7/assignments/2">HW 2</a>
                    <div class="due_date">Oct 12</div>
                    <div class="ig-admin"><i class="late"></i></div>
                </li>
            </ul>
        </div>
        <div class="ig-header"><span class="ig-header-title">Exams</span></div>
        <li class="assignment"><a class="ig-title" href="https://lms.example.com/x">Midterm</a></li>
    "#;

    #[test]
    fn reads_index_rows() {
        let snap = PageSnapshot::new("https://school.instructure.com/courses/7/assignments", INDEX);
        let rows = extract_assignment_list(&snap, 2024).unwrap();
        assert_eq!(rows.len(), 3);

        assert_eq!(
            rows[0],
            AssignmentSummary {
                title: "HW 1".into(),
                url: "https://school.instructure.com/courses/7/assignments/1".into(),
                due_date: Some("2024-09-05T23:59:00".into()),
                points_possible: 10.0,
                status: "Submitted".into(),
                assignment_group: "Homework".into(),
            }
        );
        assert_eq!(rows[1].due_date.as_deref(), Some("2024-10-12"));
        assert_eq!(rows[1].status, "Late");
        assert_eq!(rows[1].points_possible, 0.0);
        assert_eq!(rows[2].assignment_group, "Exams");
        assert_eq!(rows[2].status, "Not Started");
        assert_eq!(rows[2].url, "https://lms.example.com/x");
    }

    #[test]
    fn empty_index_is_content_not_found() {
        let snap = PageSnapshot::new("https://school.instructure.com/courses/7/assignments", "<ul></ul>");
        let err = extract_assignment_list(&snap, 2024).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ContentNotFound);
        assert!(err.recoverable());
    }

    #[test]
    fn due_date_forms() {
        assert_eq!(parse_due_date("Due: Jan 3 at 8am", 2025).as_deref(), Some("2025-01-03T08:00:00"));
        assert_eq!(parse_due_date("Dec 1 at 12:15am", 2025).as_deref(), Some("2025-12-01T00:15:00"));
        assert_eq!(parse_due_date("Mar 9", 2025).as_deref(), Some("2025-03-09"));
        assert_eq!(parse_due_date("No due date", 2025), None);
        assert_eq!(parse_due_date("Feb 30", 2025), None);
    }

    #[test]
    fn detail_prefers_details_container() {
        let snap = PageSnapshot::new(
            "https://school.instructure.com/courses/7/assignments/1",
            r#"<div class="a2-toggle-details-container"> Read   chapter 4 </div>
               <div class="description">fallback</div>"#,
        );
        let d = extract_assignment_detail(&snap).unwrap();
        assert_eq!(d.description, "Read chapter 4");
        assert_eq!(d.rubric, None);
    }

    #[test]
    fn rubric_descriptions_are_not_the_body() {
        let snap = PageSnapshot::new(
            "https://school.instructure.com/courses/7/assignments/1",
            r#"<div data-testid="rubric-criterion">
                <div class="description"><span class="css-1ugbsk7-text">Thesis</span></div>
                <div data-testid="criterion-points">-- / 10 pts</div>
            </div>"#,
        );
        let d = extract_assignment_detail(&snap).unwrap();
        assert_eq!(d.description, "");
        assert_eq!(d.rubric.unwrap()[0].criterion, "Thesis");
    }

    #[test]
    fn blank_detail_page_fails() {
        let snap = PageSnapshot::new("https://school.instructure.com/courses/7/assignments/1", "<div></div>");
        assert_eq!(
            extract_assignment_detail(&snap).unwrap_err().kind,
            ErrorKind::ContentNotFound
        );
    }
}
