//! CLI output formatting.
//!
//! Output is **path-centric**: every line starts with the path a caller
//! should use, so stdout can be piped into other tools. What happened is
//! shown as an indented status line underneath.
//!
//! # Output Format
//!
//! ## Sanitize
//!
//! ```text
//! /uploads/crowd.jpg → /uploads/crowd.scene-noface.jpg
//!     blurred 2 faces
//! /uploads/dawn.jpg → /uploads/dawn.scene-noface.jpg
//!     cached
//! https://cdn/x.jpg → https://cdn/x.jpg
//!     passthrough
//! ```
//!
//! ## Collage
//!
//! ```text
//! /uploads/identity-collage-v2-1a2b3c4d5e6f.jpg
//!     rendered from 2 references
//!     #1 identity  /uploads/a.jpg
//!     #2           /uploads/b.jpg
//! ```
//!
//! ## Detect
//!
//! ```text
//! /data/uploads/crowd.jpg (1200×800)
//!     S1  x=0.410 y=0.180 w=0.120 h=0.200
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::cache::CacheOutcome;
use crate::collage::{CollageOutcome, ReferenceItem};
use crate::detect::Detection;
use crate::sanitize::SanitizeOutcome;
use std::path::Path;

fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

// ============================================================================
// Sanitize
// ============================================================================

/// One input and what the sanitizer made of it.
pub fn format_sanitize_outcome(raw: &str, outcome: &SanitizeOutcome) -> Vec<String> {
    vec![
        format!("{raw} → {}", outcome.path),
        format!("{}{}", indent(1), outcome.status),
    ]
}

/// A sanitize failure that fell back to the original path.
pub fn format_sanitize_failure(raw: &str, error: &dyn std::error::Error) -> Vec<String> {
    vec![
        format!("{raw} → {raw}"),
        format!("{}failed, using original: {error}", indent(1)),
    ]
}

pub fn print_lines(lines: &[String]) {
    for line in lines {
        println!("{line}");
    }
}

// ============================================================================
// Collage
// ============================================================================

pub fn format_collage_output(items: &[ReferenceItem], outcome: Option<&CollageOutcome>) -> Vec<String> {
    let Some(outcome) = outcome else {
        return vec![format!(
            "No collage: too few usable references under /uploads/ ({} given)",
            items.len()
        )];
    };
    let verb = match outcome.status {
        CacheOutcome::Hit => "cached",
        _ => "rendered",
    };
    let mut lines = vec![
        outcome.path.clone(),
        format!("{}{verb} from {} references", indent(1), items.len()),
    ];
    let width = items.iter().map(|i| i.label().len()).max().unwrap_or(0);
    for item in items {
        lines.push(format!(
            "{}{:<width$}  {}",
            indent(1),
            item.label(),
            item.image
        ));
    }
    lines
}

pub fn print_collage_output(items: &[ReferenceItem], outcome: Option<&CollageOutcome>) {
    print_lines(&format_collage_output(items, outcome));
}

// ============================================================================
// Detect
// ============================================================================

pub fn format_detection(image: &Path, detection: Option<&Detection>) -> Vec<String> {
    let Some(detection) = detection else {
        return vec![
            image.display().to_string(),
            format!("{}no answer from detector (treated as no faces)", indent(1)),
        ];
    };
    let mut lines = vec![format!(
        "{} ({}×{})",
        image.display(),
        detection.width,
        detection.height
    )];
    if detection.faces.is_empty() {
        lines.push(format!("{}no faces", indent(1)));
    }
    for (i, face) in detection.faces.iter().enumerate() {
        lines.push(format!(
            "{}S{}  x={:.3} y={:.3} w={:.3} h={:.3}",
            indent(1),
            i + 1,
            face.x,
            face.y,
            face.width,
            face.height
        ));
    }
    lines
}

pub fn print_detection(image: &Path, detection: Option<&Detection>) {
    print_lines(&format_detection(image, detection));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::FaceBox;
    use crate::sanitize::SanitizeStatus;

    #[test]
    fn sanitize_line_shows_mapping_and_status() {
        let lines = format_sanitize_outcome(
            "/uploads/crowd.jpg",
            &SanitizeOutcome {
                path: "/uploads/crowd.scene-noface.jpg".to_string(),
                status: SanitizeStatus::Blurred { faces: 2 },
            },
        );
        assert_eq!(
            lines,
            vec![
                "/uploads/crowd.jpg → /uploads/crowd.scene-noface.jpg",
                "    blurred 2 faces",
            ]
        );
    }

    #[test]
    fn sanitize_status_wording() {
        assert_eq!(SanitizeStatus::Blurred { faces: 1 }.to_string(), "blurred 1 face");
        assert_eq!(SanitizeStatus::Copied.to_string(), "copied, no faces");
        assert_eq!(SanitizeStatus::AlreadySanitized.to_string(), "already sanitized");
    }

    #[test]
    fn sanitize_failure_keeps_original() {
        let err = std::io::Error::other("disk full");
        let lines = format_sanitize_failure("/uploads/a.jpg", &err);
        assert_eq!(lines[0], "/uploads/a.jpg → /uploads/a.jpg");
        assert!(lines[1].contains("disk full"));
    }

    #[test]
    fn collage_lists_aligned_items() {
        let items = vec![
            ReferenceItem::new(1, Some("identity"), "/uploads/a.jpg"),
            ReferenceItem::new(2, None, "/uploads/b.jpg"),
        ];
        let outcome = CollageOutcome {
            path: "/uploads/identity-collage-v2-0123456789ab.jpg".to_string(),
            status: CacheOutcome::Rendered,
        };
        assert_eq!(
            format_collage_output(&items, Some(&outcome)),
            vec![
                "/uploads/identity-collage-v2-0123456789ab.jpg",
                "    rendered from 2 references",
                "    #1 identity  /uploads/a.jpg",
                "    #2           /uploads/b.jpg",
            ]
        );
    }

    #[test]
    fn collage_cache_hit_says_cached() {
        let items = vec![ReferenceItem::new(1, None, "a"), ReferenceItem::new(2, None, "b")];
        let outcome = CollageOutcome {
            path: "/uploads/x.jpg".to_string(),
            status: CacheOutcome::Hit,
        };
        assert_eq!(
            format_collage_output(&items, Some(&outcome))[1],
            "    cached from 2 references"
        );
    }

    #[test]
    fn unusable_collage_is_one_notice() {
        let lines = format_collage_output(&[ReferenceItem::new(1, None, "a")], None);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("No collage"));
        assert!(lines[0].contains("1 given"));
    }

    #[test]
    fn detection_lists_numbered_faces() {
        let detection = Detection {
            width: 1200,
            height: 800,
            faces: vec![FaceBox {
                x: 0.5,
                y: 0.25,
                width: 0.125,
                height: 0.2,
            }],
        };
        assert_eq!(
            format_detection(Path::new("/d/uploads/c.jpg"), Some(&detection)),
            vec![
                "/d/uploads/c.jpg (1200×800)",
                "    S1  x=0.500 y=0.250 w=0.125 h=0.200",
            ]
        );
    }

    #[test]
    fn detection_without_answer() {
        let lines = format_detection(Path::new("a.jpg"), None);
        assert_eq!(lines[0], "a.jpg");
        assert!(lines[1].contains("no answer"));
    }

    #[test]
    fn detection_without_faces() {
        let detection = Detection {
            width: 10,
            height: 10,
            faces: vec![],
        };
        assert_eq!(format_detection(Path::new("a.jpg"), Some(&detection))[1], "    no faces");
    }
}
