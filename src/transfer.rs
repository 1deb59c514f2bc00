//! Import and export of the catalogue document
//!
//! One JSON file with top-level `objects`, `plannedProjects` and `settings`,
//! the same shape both sinks persist. Import validates and sanitizes before
//! anything is accepted: a rejected file leaves the current state untouched.

use std::collections::HashSet;

use crate::catalog::Catalog;
use crate::error::{Error, Result};

/// Serialize the catalogue to the interchange document.
pub fn export_json(catalog: &Catalog) -> Result<String> {
    Ok(serde_json::to_string_pretty(catalog)?)
}

/// Parse, validate and sanitize an interchange document.
///
/// Rejected outright: malformed JSON, objects with a blank code, and
/// case-insensitive duplicate codes within the file. Everything optional is
/// coerced to a safe default by the document schema itself; ratings are
/// clamped into 0-3 and legacy flat session lists are migrated into panel 1.
pub fn import_json(raw: &str) -> Result<Catalog> {
    // Accept legacy documents whose projects carry a flat `sessions` array
    // instead of (or alongside) the panel map.
    let mut value: serde_json::Value =
        serde_json::from_str(raw).map_err(|e| Error::Validation(format!("malformed JSON: {}", e)))?;
    migrate_legacy_sessions(&mut value);

    let mut catalog: Catalog = serde_json::from_value(value)
        .map_err(|e| Error::Validation(format!("document does not match the expected shape: {}", e)))?;

    let mut seen: HashSet<String> = HashSet::new();
    for object in &mut catalog.objects {
        object.code = object.code.trim().to_string();
        if object.code.is_empty() {
            return Err(Error::Validation(
                "import rejected: an object is missing its code".into(),
            ));
        }
        if !seen.insert(object.code.to_ascii_lowercase()) {
            return Err(Error::Validation(format!(
                "import rejected: duplicate object code {}",
                object.code
            )));
        }
        if object.id.is_empty() {
            object.id = crate::model::new_id();
        }

        for project in &mut object.projects {
            if project.id.is_empty() {
                project.id = crate::model::new_id();
            }
            for rating in project.ratings.values_mut() {
                if *rating > 3 {
                    *rating = 3;
                }
            }
            for session in project.panels.values_mut().flatten() {
                if session.id.is_empty() {
                    session.id = crate::model::new_id();
                }
                if session.moon_phase.is_empty() {
                    session.moon_phase = crate::model::moon::phase_for_iso_date(&session.date);
                }
            }
        }
    }

    for planned in &mut catalog.planned_projects {
        planned.code = planned.code.trim().to_string();
        if planned.code.is_empty() {
            return Err(Error::Validation(
                "import rejected: a planned project is missing its code".into(),
            ));
        }
        if planned.id.is_empty() {
            planned.id = crate::model::new_id();
        }
    }

    log::info!(
        "import: accepted {} objects, {} planned projects",
        catalog.objects.len(),
        catalog.planned_projects.len()
    );
    Ok(catalog)
}

/// Move a project-level flat `sessions` array into panel 1 when the panel
/// map is absent or empty.
fn migrate_legacy_sessions(value: &mut serde_json::Value) {
    let Some(objects) = value.get_mut("objects").and_then(|v| v.as_array_mut()) else {
        return;
    };
    for object in objects {
        let Some(projects) = object.get_mut("projects").and_then(|v| v.as_array_mut()) else {
            continue;
        };
        for project in projects {
            let Some(map) = project.as_object_mut() else { continue };
            let panels_empty = map
                .get("panels")
                .and_then(|p| p.as_object())
                .map_or(true, |p| p.is_empty());
            if !panels_empty {
                map.remove("sessions");
                continue;
            }
            if let Some(sessions) = map.remove("sessions") {
                if sessions.as_array().map_or(false, |s| !s.is_empty()) {
                    map.insert(
                        "panels".to_string(),
                        serde_json::json!({ "1": sessions }),
                    );
                }
            }
        }
    }
}
