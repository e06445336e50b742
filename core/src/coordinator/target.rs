//! Start-target validation. Runs before any tab is opened.

use url::Url;

use crate::config::SitesConfig;
use crate::error::ErrorKind;
use crate::extract::{course_id_from_url, ExtractionFailure};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignmentsTarget {
    pub course_id: String,
    /// The course's assignments index, possibly rewritten from the given URL.
    pub url: String,
    pub navigated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingsTarget {
    pub course_id: Option<String>,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptTarget {
    pub recording_id: Option<String>,
    pub url: String,
}

fn parse(raw: &str) -> Result<Url, ExtractionFailure> {
    Url::parse(raw.trim()).map_err(|_| {
        ExtractionFailure::new(ErrorKind::NotOnTargetPage, format!("Not a page URL: {}", raw))
    })
}

fn host_matches(url: &Url, suffix: &str) -> bool {
    let suffix = suffix.trim().trim_start_matches('.').to_ascii_lowercase();
    match url.host_str() {
        Some(host) => {
            let host = host.to_ascii_lowercase();
            host == suffix || host.ends_with(&format!(".{}", suffix))
        }
        None => false,
    }
}

fn segments(url: &Url) -> Vec<&str> {
    url.path_segments()
        .map(|s| s.filter(|p| !p.is_empty()).collect())
        .unwrap_or_default()
}

fn origin_with_path(url: &Url, path: &str) -> String {
    let mut out = url.clone();
    out.set_path(path);
    out.set_query(None);
    out.set_fragment(None);
    out.to_string()
}

fn require_lms(url: &Url, sites: &SitesConfig) -> Result<(), ExtractionFailure> {
    if host_matches(url, &sites.lms_host) {
        Ok(())
    } else {
        Err(ExtractionFailure::new(
            ErrorKind::NotOnTargetPage,
            format!("Please open a course page on {}", sites.lms_host),
        ))
    }
}

/// `/courses/<id>/assignments`, rewriting other course pages when auto-navigation is on.
pub fn assignments_target(
    raw: &str,
    sites: &SitesConfig,
) -> Result<AssignmentsTarget, ExtractionFailure> {
    let url = parse(raw)?;
    require_lms(&url, sites)?;

    let parts = segments(&url);
    let course_id = match parts.as_slice() {
        ["courses", id, ..] if id.chars().all(|c| c.is_ascii_digit()) => id.to_string(),
        _ => {
            return Err(ExtractionFailure::new(
                ErrorKind::WrongPageSection,
                "Please open a course first",
            ))
        }
    };

    if matches!(parts.as_slice(), [_, _, "assignments"]) {
        return Ok(AssignmentsTarget {
            course_id,
            url: url.to_string(),
            navigated: false,
        });
    }

    if !sites.auto_navigate {
        return Err(ExtractionFailure::new(
            ErrorKind::WrongPageSection,
            "Please open the course's Assignments page",
        ));
    }

    let rewritten = origin_with_path(&url, &format!("/courses/{}/assignments", course_id));
    tracing::info!(from = %url, to = %rewritten, "navigating to assignments section");
    Ok(AssignmentsTarget {
        course_id,
        url: rewritten,
        navigated: true,
    })
}

/// The LMS inbox. The course filter lives in the fragment and is optional.
pub fn recordings_target(
    raw: &str,
    sites: &SitesConfig,
) -> Result<RecordingsTarget, ExtractionFailure> {
    let url = parse(raw)?;
    require_lms(&url, sites)?;

    let course_id = course_id_from_url(url.as_str());
    if segments(&url).first() == Some(&"conversations") {
        return Ok(RecordingsTarget {
            course_id,
            url: url.to_string(),
        });
    }

    if !sites.auto_navigate {
        return Err(ExtractionFailure::new(
            ErrorKind::WrongPageSection,
            "Please open the inbox",
        ));
    }

    let mut inbox = url.clone();
    inbox.set_path("/conversations");
    inbox.set_query(None);
    Ok(RecordingsTarget {
        course_id,
        url: inbox.to_string(),
    })
}

/// A recording playback page on one of the configured recording hosts.
pub fn transcript_target(
    raw: &str,
    sites: &SitesConfig,
) -> Result<TranscriptTarget, ExtractionFailure> {
    let url = parse(raw)?;
    if !sites.recording_hosts.iter().any(|h| host_matches(&url, h)) {
        return Err(ExtractionFailure::new(
            ErrorKind::NotOnTargetPage,
            "Please open a Zoom recording page",
        ));
    }

    let parts = segments(&url);
    if !parts.iter().any(|p| *p == "rec" || *p == "recording") {
        return Err(ExtractionFailure::new(
            ErrorKind::WrongPageSection,
            "This page is not a recording. Open the recording's playback page",
        ));
    }

    let recording_id = parts
        .last()
        .filter(|p| **p != "rec" && **p != "recording")
        .map(|p| p.to_string());
    Ok(TranscriptTarget {
        recording_id,
        url: url.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sites() -> SitesConfig {
        SitesConfig::default()
    }

    #[test]
    fn assignments_page_is_accepted_as_is() {
        let t = assignments_target("https://school.instructure.com/courses/42/assignments", &sites())
            .unwrap();
        assert_eq!(t.course_id, "42");
        assert!(!t.navigated);
    }

    #[test]
    fn course_home_is_rewritten() {
        let t = assignments_target("https://school.instructure.com/courses/42/modules?x=1", &sites())
            .unwrap();
        assert_eq!(t.url, "https://school.instructure.com/courses/42/assignments");
        assert!(t.navigated);
    }

    #[test]
    fn course_home_without_auto_navigate_is_wrong_section() {
        let mut s = sites();
        s.auto_navigate = false;
        let err = assignments_target("https://school.instructure.com/courses/42", &s).unwrap_err();
        assert_eq!(err.kind, ErrorKind::WrongPageSection);
    }

    #[test]
    fn foreign_site_is_not_on_target() {
        let err = assignments_target("https://example.com/courses/1/assignments", &sites())
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotOnTargetPage);
        assert!(!err.recoverable());

        let err = assignments_target("not a url", &sites()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotOnTargetPage);
    }

    #[test]
    fn dashboard_is_wrong_section() {
        let err = assignments_target("https://school.instructure.com/", &sites()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::WrongPageSection);
    }

    #[test]
    fn transcript_target_reads_recording_id() {
        let t = transcript_target("https://school.zoom.us/rec/share/AbC_123", &sites()).unwrap();
        assert_eq!(t.recording_id.as_deref(), Some("AbC_123"));

        let err = transcript_target("https://school.zoom.us/j/999", &sites()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::WrongPageSection);
    }

    #[test]
    fn recordings_target_keeps_course_filter() {
        let t = recordings_target(
            "https://school.instructure.com/conversations#filter=type=inbox&course=course_77",
            &sites(),
        )
        .unwrap();
        assert_eq!(t.course_id.as_deref(), Some("77"));
    }
}
