//! Domain model for the session log
//!
//! Pure data: a `CelestialObject` owns its `ImagingProject`s, each project
//! owns its sessions through a panel map (panel number -> ordered session
//! list). The flat session list is always derived from the panel map, never
//! stored, so the two can never drift apart.
//!
//! All structs serialize to the camelCase document shape shared by the local
//! and remote sinks and the import/export format.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod moon;

// ============================================================================
// CelestialObject
// ============================================================================

/// A catalogued deep-sky object (identity = user-entered code, e.g. "M31").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CelestialObject {
    pub id: String,
    /// User-entered catalogue code, unique case-insensitively.
    pub code: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub constellation: String,
    #[serde(default)]
    pub object_type: String,
    /// Data URI or remote URL.
    #[serde(default)]
    pub cover_image: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub projects: Vec<ImagingProject>,
}

impl CelestialObject {
    /// Total session count across every project and panel.
    pub fn session_count(&self) -> usize {
        self.projects.iter().map(|p| p.session_count()).sum()
    }
}

// ============================================================================
// ImagingProject
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Active,
    Paused,
    Completed,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Completed => "completed",
        }
    }
}

impl Default for ProjectStatus {
    fn default() -> Self {
        Self::Active
    }
}

/// ONP = one-night project, SNP = several-nights project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ProjectType {
    Onp,
    Snp,
}

impl Default for ProjectType {
    fn default() -> Self {
        Self::Snp
    }
}

/// How a project's `goal_hours` is to be read. Derived from panel
/// cardinality at read time, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GoalScope {
    Total,
    PerPanel,
}

/// Equipment recorded on a project when it was started.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EquipmentSnapshot {
    #[serde(default)]
    pub camera: Option<String>,
    #[serde(default)]
    pub telescope: Option<String>,
    #[serde(default)]
    pub guide_camera: Option<String>,
    #[serde(default)]
    pub guide_telescope: Option<String>,
    #[serde(default)]
    pub mount: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImagingProject {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: ProjectStatus,
    #[serde(default)]
    pub project_type: ProjectType,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub equipment: EquipmentSnapshot,
    /// Ordered, deduplicated filter names used by this project.
    #[serde(default)]
    pub filters: Vec<String>,
    /// Optional exposure target in hours; per-panel when multi-panel.
    #[serde(default)]
    pub goal_hours: Option<f64>,
    /// Named images, keyed by semantic name (e.g. "finalProject").
    #[serde(default)]
    pub images: BTreeMap<String, String>,
    /// Per-image star ratings, 0-3, keyed like `images`.
    #[serde(default)]
    pub ratings: BTreeMap<String, u8>,
    /// Panel number -> ordered session list. Single source of truth for the
    /// project's sessions.
    #[serde(default)]
    pub panels: BTreeMap<u32, Vec<ImagingSession>>,
}

impl ImagingProject {
    /// Flat view of all sessions, concatenated in ascending panel order.
    pub fn sessions(&self) -> Vec<&ImagingSession> {
        self.panels.values().flatten().collect()
    }

    pub fn session_count(&self) -> usize {
        self.panels.values().map(|v| v.len()).sum()
    }

    pub fn panel_count(&self) -> usize {
        self.panels.len()
    }

    pub fn goal_scope(&self) -> GoalScope {
        if self.panels.len() > 1 {
            GoalScope::PerPanel
        } else {
            GoalScope::Total
        }
    }

    /// Total exposure across all panels, in seconds. Non-finite inputs
    /// contribute zero.
    pub fn total_exposure_secs(&self) -> f64 {
        self.sessions().iter().map(|s| s.exposure_secs()).sum()
    }
}

// ============================================================================
// ImagingSession
// ============================================================================

/// Environment metrics pulled from FITS headers, entered manually when no
/// FITS data is available.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FitsMetrics {
    #[serde(default)]
    pub sky_brightness: Option<f64>,
    #[serde(default)]
    pub ambient_temp: Option<f64>,
    #[serde(default)]
    pub sky_temp: Option<f64>,
    #[serde(default)]
    pub humidity: Option<f64>,
    #[serde(default)]
    pub wind: Option<f64>,
    #[serde(default)]
    pub focus_position: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuidingMetrics {
    #[serde(default)]
    pub median_rms: Option<f64>,
    #[serde(default)]
    pub p68_rms: Option<f64>,
    #[serde(default)]
    pub min_rms: Option<f64>,
    #[serde(default)]
    pub max_rms: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImagingSession {
    /// Opaque generated id, immutable after creation.
    pub id: String,
    /// ISO date string, "YYYY-MM-DD".
    pub date: String,
    #[serde(default)]
    pub lights: u32,
    /// Per-frame exposure in seconds.
    #[serde(default)]
    pub exposure_sec: f64,
    #[serde(default)]
    pub filter: String,
    #[serde(default)]
    pub camera: String,
    #[serde(default)]
    pub telescope: String,
    #[serde(default)]
    pub snr_r: Option<f64>,
    #[serde(default)]
    pub snr_g: Option<f64>,
    #[serde(default)]
    pub snr_b: Option<f64>,
    #[serde(default)]
    pub accepted: Option<u32>,
    #[serde(default)]
    pub rejected: Option<u32>,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub fits: Option<FitsMetrics>,
    #[serde(default)]
    pub guiding: Option<GuidingMetrics>,
    /// Descriptor computed from `date` when the session was created.
    #[serde(default)]
    pub moon_phase: String,
}

impl ImagingSession {
    /// Total integration for this session in seconds (`lights * exposure`),
    /// with non-finite exposure treated as zero.
    pub fn exposure_secs(&self) -> f64 {
        let exp = if self.exposure_sec.is_finite() {
            self.exposure_sec
        } else {
            0.0
        };
        self.lights as f64 * exp
    }
}

// ============================================================================
// PlannedProject
// ============================================================================

/// When an object is best placed, as rise/set month numbers (1-12) or a
/// circumpolar flag.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisibilityWindow {
    #[serde(default)]
    pub circumpolar: bool,
    #[serde(default)]
    pub rise_month: Option<u32>,
    #[serde(default)]
    pub set_month: Option<u32>,
}

/// A not-yet-started plan. Independent of the object catalogue until
/// promoted into a real object + project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedProject {
    pub id: String,
    pub code: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub constellation: String,
    #[serde(default)]
    pub visibility: VisibilityWindow,
    #[serde(default)]
    pub priority: u8,
    /// Broadband / narrowband / etc.
    #[serde(default)]
    pub signal_type: String,
    #[serde(default)]
    pub framing_image: Option<String>,
    #[serde(default)]
    pub object_image: Option<String>,
}

// ============================================================================
// Settings
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisibleHighlights {
    #[serde(default = "default_true")]
    pub total_exposure: bool,
    #[serde(default = "default_true")]
    pub streaks: bool,
    #[serde(default = "default_true")]
    pub equipment_usage: bool,
    #[serde(default = "default_true")]
    pub records: bool,
    #[serde(default = "default_true")]
    pub rankings: bool,
}

fn default_true() -> bool {
    true
}

impl Default for VisibleHighlights {
    fn default() -> Self {
        Self {
            total_exposure: true,
            streaks: true,
            equipment_usage: true,
            records: true,
            rankings: true,
        }
    }
}

/// Flat per-user settings record, persisted alongside the catalogue.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default)]
    pub user_name: String,
    #[serde(default)]
    pub cameras: Vec<String>,
    #[serde(default)]
    pub telescopes: Vec<String>,
    #[serde(default)]
    pub locations: Vec<String>,
    #[serde(default)]
    pub main_location: String,
    #[serde(default)]
    pub guide_telescope: String,
    #[serde(default)]
    pub guide_camera: String,
    #[serde(default)]
    pub mount: String,
    #[serde(default)]
    pub date_format: String,
    #[serde(default)]
    pub default_theme: String,
    #[serde(default)]
    pub json_path: String,
    #[serde(default)]
    pub visible_highlights: VisibleHighlights,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub min_altitude_limit: Option<f64>,
}

/// Generate an entity id.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(panel_sessions: &[(&str, u32, f64)]) -> Vec<ImagingSession> {
        panel_sessions
            .iter()
            .map(|(date, lights, exp)| ImagingSession {
                id: new_id(),
                date: date.to_string(),
                lights: *lights,
                exposure_sec: *exp,
                filter: String::new(),
                camera: String::new(),
                telescope: String::new(),
                snr_r: None,
                snr_g: None,
                snr_b: None,
                accepted: None,
                rejected: None,
                notes: String::new(),
                fits: None,
                guiding: None,
                moon_phase: String::new(),
            })
            .collect()
    }

    #[test]
    fn flat_sessions_follow_panel_order() {
        let mut panels = BTreeMap::new();
        panels.insert(2, session(&[("2025-03-02", 10, 120.0)]));
        panels.insert(1, session(&[("2025-03-01", 20, 60.0)]));

        let project = ImagingProject {
            id: new_id(),
            name: "mosaic".into(),
            description: String::new(),
            status: ProjectStatus::Active,
            project_type: ProjectType::Snp,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            equipment: EquipmentSnapshot::default(),
            filters: vec![],
            goal_hours: Some(10.0),
            images: BTreeMap::new(),
            ratings: BTreeMap::new(),
            panels,
        };

        let flat = project.sessions();
        assert_eq!(flat.len(), 2);
        assert_eq!(flat[0].date, "2025-03-01");
        assert_eq!(flat[1].date, "2025-03-02");
        assert_eq!(project.goal_scope(), GoalScope::PerPanel);
    }

    #[test]
    fn non_finite_exposure_counts_as_zero() {
        let mut s = session(&[("2025-03-01", 10, f64::NAN)]);
        assert_eq!(s[0].exposure_secs(), 0.0);
        s[0].exposure_sec = 60.0;
        assert_eq!(s[0].exposure_secs(), 600.0);
    }

    #[test]
    fn panel_map_round_trips_through_json() {
        let mut panels = BTreeMap::new();
        panels.insert(1, session(&[("2025-03-01", 20, 60.0)]));
        let json = serde_json::to_string(&panels).unwrap();
        let back: BTreeMap<u32, Vec<ImagingSession>> = serde_json::from_str(&json).unwrap();
        assert_eq!(panels, back);
    }
}
