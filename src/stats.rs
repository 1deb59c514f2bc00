//! Derived statistics over the catalogue
//!
//! Everything here is a pure function of a read-only `Catalog` (or a session
//! slice), so callers can memoize a whole `StatsSnapshot` against the
//! catalogue reference. Malformed records never abort a computation; they
//! are excluded from whichever aggregate they would have fed. All numeric
//! input passes through [`finite_or_zero`].

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::catalog::Catalog;
use crate::model::ImagingSession;

/// Non-finite values contribute zero, never NaN, to any sum.
pub fn finite_or_zero(v: f64) -> f64 {
    if v.is_finite() {
        v
    } else {
        0.0
    }
}

fn parse_day(date: &str) -> Option<NaiveDate> {
    let day = date.get(..10).unwrap_or(date);
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

// ============================================================================
// Exposure totals
// ============================================================================

/// Total integration across the whole catalogue, in seconds.
pub fn total_exposure_secs(catalog: &Catalog) -> f64 {
    catalog
        .objects
        .iter()
        .flat_map(|o| o.projects.iter())
        .map(|p| p.total_exposure_secs())
        .sum()
}

/// "HH:MM" rendering of a second count.
pub fn format_hm(secs: f64) -> String {
    let secs = finite_or_zero(secs).max(0.0);
    let total_minutes = (secs / 60.0).round() as u64;
    format!("{:02}:{:02}", total_minutes / 60, total_minutes % 60)
}

// ============================================================================
// Cumulative series
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CumulativePoint {
    pub date: String,
    pub lights: u64,
    pub hours: f64,
}

/// Running totals per session, date-ascending. The sort is stable, so
/// same-day sessions keep their original relative order.
pub fn cumulative_series(sessions: &[&ImagingSession]) -> Vec<CumulativePoint> {
    let mut ordered: Vec<&ImagingSession> = sessions.to_vec();
    ordered.sort_by(|a, b| a.date.cmp(&b.date));

    let mut lights: u64 = 0;
    let mut secs: f64 = 0.0;
    ordered
        .into_iter()
        .map(|s| {
            lights += s.lights as u64;
            secs += s.exposure_secs();
            CumulativePoint {
                date: s.date.clone(),
                lights,
                hours: secs / 3600.0,
            }
        })
        .collect()
}

// ============================================================================
// SNR
// ============================================================================

/// Mean of whichever RGB channel SNRs are finite; `None` when none are, so
/// charts render a gap rather than a zero.
pub fn mean_snr(session: &ImagingSession) -> Option<f64> {
    let finite: Vec<f64> = [session.snr_r, session.snr_g, session.snr_b]
        .into_iter()
        .flatten()
        .filter(|v| v.is_finite())
        .collect();
    if finite.is_empty() {
        None
    } else {
        Some(finite.iter().sum::<f64>() / finite.len() as f64)
    }
}

// ============================================================================
// Streaks
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Streaks {
    /// Run ending today or yesterday relative to `today`; 0 otherwise.
    pub current: u32,
    pub longest: u32,
}

/// Streaks over the distinct calendar days carrying at least one session.
/// A run is consecutive days (delta exactly 1); an isolated day is a run of
/// length 1.
pub fn streaks(catalog: &Catalog, today: NaiveDate) -> Streaks {
    let mut days: Vec<NaiveDate> = catalog
        .objects
        .iter()
        .flat_map(|o| o.projects.iter())
        .flat_map(|p| p.panels.values())
        .flatten()
        .filter_map(|s| parse_day(&s.date))
        .collect();
    days.sort();
    days.dedup();

    if days.is_empty() {
        return Streaks::default();
    }

    let mut longest: u32 = 1;
    let mut run: u32 = 1;
    for pair in days.windows(2) {
        if (pair[1] - pair[0]).num_days() == 1 {
            run += 1;
        } else {
            run = 1;
        }
        longest = longest.max(run);
    }

    let last = *days.last().unwrap();
    let current = if (today - last).num_days() <= 1 { run } else { 0 };
    Streaks { current, longest }
}

// ============================================================================
// Usage breakdowns
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageShare {
    pub name: String,
    pub value: f64,
    pub percent: f64,
}

fn usage_breakdown<F>(catalog: &Catalog, label: fn(&ImagingSession) -> &str, value: F) -> Vec<UsageShare>
where
    F: Fn(&ImagingSession) -> f64,
{
    let mut totals: HashMap<String, f64> = HashMap::new();
    let mut order: Vec<String> = Vec::new();
    for session in all_sessions(catalog) {
        let name = label(session);
        if name.is_empty() {
            continue; // unlabeled sessions are excluded, not bucketed
        }
        if !totals.contains_key(name) {
            order.push(name.to_string());
        }
        *totals.entry(name.to_string()).or_insert(0.0) += finite_or_zero(value(session));
    }

    let grand: f64 = totals.values().sum();
    order
        .into_iter()
        .map(|name| {
            let value = totals[&name];
            let percent = if grand > 0.0 { value / grand * 100.0 } else { 0.0 };
            UsageShare { name, value, percent }
        })
        .collect()
}

/// Light-frame counts per camera, as shares of all labeled frames.
pub fn camera_usage(catalog: &Catalog) -> Vec<UsageShare> {
    usage_breakdown(catalog, |s| s.camera.as_str(), |s| s.lights as f64)
}

/// Exposure seconds per telescope, as shares of all labeled exposure.
pub fn telescope_usage(catalog: &Catalog) -> Vec<UsageShare> {
    usage_breakdown(catalog, |s| s.telescope.as_str(), |s| s.exposure_secs())
}

// ============================================================================
// Records
// ============================================================================

/// A per-session record with its owning object/project for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub object_code: String,
    pub project_name: String,
    pub session_date: String,
    pub value: f64,
}

fn scan_records<F>(catalog: &Catalog, metric: F, better: fn(f64, f64) -> bool) -> Option<SessionRecord>
where
    F: Fn(&ImagingSession) -> Option<f64>,
{
    let mut best: Option<SessionRecord> = None;
    for object in &catalog.objects {
        for project in &object.projects {
            for session in project.panels.values().flatten() {
                let Some(value) = metric(session) else { continue };
                if !value.is_finite() {
                    continue;
                }
                let improves = match &best {
                    None => true,
                    Some(b) => better(value, b.value),
                };
                if improves {
                    best = Some(SessionRecord {
                        object_code: object.code.clone(),
                        project_name: project.name.clone(),
                        session_date: session.date.clone(),
                        value,
                    });
                }
            }
        }
    }
    best
}

/// Highest mean SNR in the catalogue.
pub fn best_snr(catalog: &Catalog) -> Option<SessionRecord> {
    scan_records(catalog, mean_snr, |v, b| v > b)
}

/// Lowest strictly-positive median guiding RMS. Zero and missing values do
/// not compete.
pub fn best_median_rms(catalog: &Catalog) -> Option<SessionRecord> {
    scan_records(
        catalog,
        |s| s.guiding.as_ref().and_then(|g| g.median_rms).filter(|v| *v > 0.0),
        |v, b| v < b,
    )
}

/// Lowest strictly-positive 68th-percentile guiding RMS.
pub fn best_p68_rms(catalog: &Catalog) -> Option<SessionRecord> {
    scan_records(
        catalog,
        |s| s.guiding.as_ref().and_then(|g| g.p68_rms).filter(|v| *v > 0.0),
        |v, b| v < b,
    )
}

// ============================================================================
// Rankings
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankingEntry {
    pub name: String,
    pub value: f64,
}

/// Constellation owning the most objects. Ties resolve to the first
/// constellation encountered in catalogue order.
pub fn top_constellation(catalog: &Catalog) -> Option<RankingEntry> {
    let mut counts: HashMap<&str, u32> = HashMap::new();
    let mut order: Vec<&str> = Vec::new();
    for object in &catalog.objects {
        if object.constellation.is_empty() {
            continue;
        }
        let name = object.constellation.as_str();
        if !counts.contains_key(name) {
            order.push(name);
        }
        *counts.entry(name).or_insert(0) += 1;
    }

    let mut best: Option<RankingEntry> = None;
    for name in order {
        let value = counts[name] as f64;
        if best.as_ref().map_or(true, |b| value > b.value) {
            best = Some(RankingEntry {
                name: name.to_string(),
                value,
            });
        }
    }
    best
}

/// Object with the most cumulative exposure hours; first-encountered wins
/// ties.
pub fn top_object_by_hours(catalog: &Catalog) -> Option<RankingEntry> {
    let mut best: Option<RankingEntry> = None;
    for object in &catalog.objects {
        let hours: f64 = object
            .projects
            .iter()
            .map(|p| p.total_exposure_secs())
            .sum::<f64>()
            / 3600.0;
        if best.as_ref().map_or(true, |b| hours > b.value) {
            best = Some(RankingEntry {
                name: object.code.clone(),
                value: hours,
            });
        }
    }
    best
}

// ============================================================================
// Snapshot
// ============================================================================

/// One computation pass over the catalogue, bundling every dashboard
/// aggregate.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    pub total_exposure_secs: f64,
    pub total_exposure_hm: String,
    pub streaks: Streaks,
    pub camera_usage: Vec<UsageShare>,
    pub telescope_usage: Vec<UsageShare>,
    pub best_snr: Option<SessionRecord>,
    pub best_median_rms: Option<SessionRecord>,
    pub best_p68_rms: Option<SessionRecord>,
    pub top_constellation: Option<RankingEntry>,
    pub top_object: Option<RankingEntry>,
}

impl StatsSnapshot {
    pub fn compute(catalog: &Catalog, today: NaiveDate) -> Self {
        let secs = total_exposure_secs(catalog);
        Self {
            total_exposure_secs: secs,
            total_exposure_hm: format_hm(secs),
            streaks: streaks(catalog, today),
            camera_usage: camera_usage(catalog),
            telescope_usage: telescope_usage(catalog),
            best_snr: best_snr(catalog),
            best_median_rms: best_median_rms(catalog),
            best_p68_rms: best_p68_rms(catalog),
            top_constellation: top_constellation(catalog),
            top_object: top_object_by_hours(catalog),
        }
    }
}

fn all_sessions(catalog: &Catalog) -> impl Iterator<Item = &ImagingSession> {
    catalog
        .objects
        .iter()
        .flat_map(|o| o.projects.iter())
        .flat_map(|p| p.panels.values())
        .flatten()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{NewObject, NewProject, NewSession};
    use crate::model::{EquipmentSnapshot, GuidingMetrics, ProjectType};

    fn build(sessions: &[NewSession]) -> Catalog {
        let mut catalog = Catalog::default();
        let object_id = catalog
            .add_object(NewObject {
                code: "M31".into(),
                constellation: "Andromeda".into(),
                ..NewObject::default()
            })
            .unwrap();
        let project_id = catalog
            .add_project(
                &object_id,
                NewProject {
                    name: "LRGB".into(),
                    description: String::new(),
                    project_type: ProjectType::Snp,
                    num_panels: Some(1),
                    equipment: EquipmentSnapshot::default(),
                    filters: vec![],
                    goal_hours: None,
                },
            )
            .unwrap();
        for s in sessions {
            catalog
                .add_session(&object_id, &project_id, 1, s.clone())
                .unwrap();
        }
        catalog
    }

    fn session(date: &str, lights: u32, exposure: f64) -> NewSession {
        NewSession {
            date: date.into(),
            lights,
            exposure_sec: exposure,
            ..NewSession::default()
        }
    }

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn exposure_total_ignores_non_finite_values() {
        let catalog = build(&[
            session("2025-01-01", 10, 120.0),
            session("2025-01-02", 5, f64::NAN),
        ]);
        assert_eq!(total_exposure_secs(&catalog), 1200.0);
        assert_eq!(format_hm(1200.0), "00:20");
        assert_eq!(format_hm(f64::NAN), "00:00");
        assert_eq!(format_hm(3660.0), "01:01");
    }

    #[test]
    fn cumulative_series_is_sorted_and_monotonic() {
        let catalog = build(&[
            session("2025-01-03", 10, 60.0),
            session("2025-01-01", 20, 60.0),
            session("2025-01-02", 5, 60.0),
        ]);
        let all: Vec<&ImagingSession> = catalog.objects[0].projects[0].sessions();
        let series = cumulative_series(&all);

        let dates: Vec<&str> = series.iter().map(|p| p.date.as_str()).collect();
        assert_eq!(dates, vec!["2025-01-01", "2025-01-02", "2025-01-03"]);
        for pair in series.windows(2) {
            assert!(pair[1].lights >= pair[0].lights);
            assert!(pair[1].hours >= pair[0].hours);
        }
        assert_eq!(series.last().unwrap().lights, 35);
    }

    #[test]
    fn mean_snr_nullability() {
        let mut s = ImagingSession {
            id: "s".into(),
            date: "2025-01-01".into(),
            lights: 0,
            exposure_sec: 0.0,
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
        };
        assert_eq!(mean_snr(&s), None);

        s.snr_g = Some(12.5);
        assert_eq!(mean_snr(&s), Some(12.5));

        s.snr_r = Some(f64::NAN);
        assert_eq!(mean_snr(&s), Some(12.5));

        s.snr_r = Some(10.0);
        s.snr_b = Some(15.0);
        assert_eq!(mean_snr(&s), Some(12.5));
    }

    #[test]
    fn streak_example_from_history_with_gap() {
        let catalog = build(&[
            session("2025-01-01", 1, 60.0),
            session("2025-01-02", 1, 60.0),
            session("2025-01-03", 1, 60.0),
            session("2025-01-10", 1, 60.0),
        ]);
        let s = streaks(&catalog, day("2025-01-10"));
        assert_eq!(s.current, 1);
        assert_eq!(s.longest, 3);
    }

    #[test]
    fn streak_goes_stale_after_a_day_without_sessions() {
        let catalog = build(&[session("2025-01-02", 1, 60.0), session("2025-01-03", 1, 60.0)]);
        assert_eq!(streaks(&catalog, day("2025-01-04")).current, 2);
        assert_eq!(streaks(&catalog, day("2025-01-05")).current, 0);
    }

    #[test]
    fn single_isolated_date_is_a_streak_of_one() {
        let catalog = build(&[session("2025-01-01", 1, 60.0)]);
        let s = streaks(&catalog, day("2025-01-01"));
        assert_eq!(s.current, 1);
        assert_eq!(s.longest, 1);
    }

    #[test]
    fn duplicate_dates_collapse_to_one_calendar_day() {
        let catalog = build(&[
            session("2025-01-01", 1, 60.0),
            session("2025-01-01", 1, 60.0),
            session("2025-01-02", 1, 60.0),
        ]);
        assert_eq!(streaks(&catalog, day("2025-01-02")).longest, 2);
    }

    #[test]
    fn usage_breakdown_excludes_unlabeled_sessions() {
        let mut a = session("2025-01-01", 30, 60.0);
        a.camera = "ASI2600MM".into();
        let mut b = session("2025-01-02", 10, 60.0);
        b.camera = "ASI2600MM".into();
        let mut c = session("2025-01-03", 60, 60.0);
        c.camera = "ASI533MC".into();
        let unlabeled = session("2025-01-04", 100, 60.0);

        let catalog = build(&[a, b, c, unlabeled]);
        let usage = camera_usage(&catalog);
        assert_eq!(usage.len(), 2);
        assert_eq!(usage[0].name, "ASI2600MM");
        assert_eq!(usage[0].value, 40.0);
        assert!((usage[0].percent - 40.0).abs() < 1e-9);
        assert!((usage[1].percent - 60.0).abs() < 1e-9);
    }

    #[test]
    fn guiding_records_only_consider_positive_values() {
        let mut good = session("2025-01-01", 1, 60.0);
        good.guiding = Some(GuidingMetrics {
            median_rms: Some(0.45),
            p68_rms: Some(0.61),
            min_rms: None,
            max_rms: None,
        });
        let mut zero = session("2025-01-02", 1, 60.0);
        zero.guiding = Some(GuidingMetrics {
            median_rms: Some(0.0),
            p68_rms: Some(0.0),
            min_rms: None,
            max_rms: None,
        });

        let catalog = build(&[good, zero]);
        assert_eq!(best_median_rms(&catalog).unwrap().value, 0.45);
        assert_eq!(best_p68_rms(&catalog).unwrap().value, 0.61);

        let empty = build(&[zero_guiding_session()]);
        assert!(best_median_rms(&empty).is_none());
    }

    fn zero_guiding_session() -> NewSession {
        let mut s = session("2025-01-01", 1, 60.0);
        s.guiding = Some(GuidingMetrics {
            median_rms: Some(0.0),
            p68_rms: None,
            min_rms: None,
            max_rms: None,
        });
        s
    }

    #[test]
    fn best_snr_record_names_its_owner() {
        let mut a = session("2025-01-01", 1, 60.0);
        a.snr_g = Some(20.0);
        let mut b = session("2025-01-02", 1, 60.0);
        b.snr_g = Some(35.0);
        let catalog = build(&[a, b]);

        let record = best_snr(&catalog).unwrap();
        assert_eq!(record.value, 35.0);
        assert_eq!(record.object_code, "M31");
        assert_eq!(record.project_name, "LRGB");
        assert_eq!(record.session_date, "2025-01-02");
    }

    #[test]
    fn ranking_tie_break_is_first_encountered() {
        let mut catalog = Catalog::default();
        for (code, constellation) in [
            ("M81", "Ursa Major"),
            ("M31", "Andromeda"),
            ("M110", "Andromeda"),
            ("M101", "Ursa Major"),
        ] {
            catalog
                .add_object(NewObject {
                    code: code.into(),
                    constellation: constellation.into(),
                    ..NewObject::default()
                })
                .unwrap();
        }
        // Two constellations at 2 objects each: first encountered wins.
        assert_eq!(top_constellation(&catalog).unwrap().name, "Ursa Major");
    }

    #[test]
    fn snapshot_on_empty_catalog_is_all_defaults() {
        let snapshot = StatsSnapshot::compute(&Catalog::default(), day("2025-01-01"));
        assert_eq!(snapshot.total_exposure_secs, 0.0);
        assert_eq!(snapshot.total_exposure_hm, "00:00");
        assert_eq!(snapshot.streaks, Streaks::default());
        assert!(snapshot.camera_usage.is_empty());
        assert!(snapshot.best_snr.is_none());
        assert!(snapshot.top_constellation.is_none());
        assert!(snapshot.top_object.is_none());
    }
}
