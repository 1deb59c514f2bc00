//! Catalogue mutations
//!
//! The `Catalog` is the in-memory collection root and, serialized, the
//! document both sinks and the import/export format share. Every mutation
//! validates before touching state, so an accepted mutation never partially
//! applies. Sessions live only in the per-project panel map; the flat view
//! is derived, which keeps the panel/flat relationship correct by
//! construction.
//!
//! Filter-name identity is case-sensitive exact match everywhere ("Ha" and
//! "ha" are two filters).

use std::collections::BTreeMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    moon, new_id, CelestialObject, EquipmentSnapshot, FitsMetrics, GuidingMetrics, ImagingProject,
    ImagingSession, PlannedProject, ProjectStatus, ProjectType, Settings, VisibilityWindow,
};

// ============================================================================
// Catalog
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Catalog {
    #[serde(default)]
    pub objects: Vec<CelestialObject>,
    #[serde(default)]
    pub planned_projects: Vec<PlannedProject>,
    #[serde(default)]
    pub settings: Settings,
}

// ============================================================================
// Mutation inputs
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewObject {
    pub code: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub constellation: String,
    #[serde(default)]
    pub object_type: String,
    #[serde(default)]
    pub cover_image: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProject {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub project_type: ProjectType,
    /// Panels to create, all starting empty. Defaults to 1.
    #[serde(default)]
    pub num_panels: Option<u32>,
    #[serde(default)]
    pub equipment: EquipmentSnapshot,
    #[serde(default)]
    pub filters: Vec<String>,
    #[serde(default)]
    pub goal_hours: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSession {
    pub date: String,
    #[serde(default)]
    pub lights: u32,
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
}

/// Best-effort patch for an existing session. `None` fields are left alone.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionPatch {
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub lights: Option<u32>,
    #[serde(default)]
    pub exposure_sec: Option<f64>,
    #[serde(default)]
    pub filter: Option<String>,
    #[serde(default)]
    pub camera: Option<String>,
    #[serde(default)]
    pub telescope: Option<String>,
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
    pub notes: Option<String>,
    #[serde(default)]
    pub fits: Option<FitsMetrics>,
    #[serde(default)]
    pub guiding: Option<GuidingMetrics>,
}

/// Metadata patch for a project. Panel changes go through
/// [`Catalog::resize_panels`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<ProjectStatus>,
    #[serde(default)]
    pub started_at: Option<chrono::DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<chrono::DateTime<Utc>>,
    #[serde(default)]
    pub equipment: Option<EquipmentSnapshot>,
    #[serde(default)]
    pub goal_hours: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPlanned {
    pub code: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub constellation: String,
    #[serde(default)]
    pub visibility: VisibilityWindow,
    #[serde(default)]
    pub priority: u8,
    #[serde(default)]
    pub signal_type: String,
    #[serde(default)]
    pub framing_image: Option<String>,
    #[serde(default)]
    pub object_image: Option<String>,
}

// ============================================================================
// Object operations
// ============================================================================

impl Catalog {
    pub fn find_object(&self, object_id: &str) -> Option<&CelestialObject> {
        self.objects.iter().find(|o| o.id == object_id)
    }

    fn find_object_mut(&mut self, object_id: &str) -> Option<&mut CelestialObject> {
        self.objects.iter_mut().find(|o| o.id == object_id)
    }

    pub fn find_object_by_code(&self, code: &str) -> Option<&CelestialObject> {
        self.objects
            .iter()
            .find(|o| o.code.eq_ignore_ascii_case(code))
    }

    /// Add a new object. Fails on a blank code or a case-insensitive code
    /// collision; on success returns the generated object id.
    pub fn add_object(&mut self, input: NewObject) -> Result<String> {
        let code = input.code.trim().to_string();
        if code.is_empty() {
            return Err(Error::Validation("object code must not be empty".into()));
        }
        if self.find_object_by_code(&code).is_some() {
            return Err(Error::Duplicate(code));
        }

        let id = new_id();
        self.objects.push(CelestialObject {
            id: id.clone(),
            code,
            name: input.name,
            constellation: input.constellation,
            object_type: input.object_type,
            cover_image: input.cover_image,
            created_at: Utc::now(),
            projects: Vec::new(),
        });
        log::info!("add_object: created {}", id);
        Ok(id)
    }

    /// Cascading delete: every project and session under the object goes
    /// with it, in one state transition.
    pub fn delete_object(&mut self, object_id: &str) -> Result<()> {
        let before = self.objects.len();
        self.objects.retain(|o| o.id != object_id);
        if self.objects.len() == before {
            return Err(Error::NotFound(format!("object {}", object_id)));
        }
        Ok(())
    }

    pub fn session_count(&self) -> usize {
        self.objects.iter().map(|o| o.session_count()).sum()
    }
}

// ============================================================================
// Project operations
// ============================================================================

impl Catalog {
    pub fn find_project(&self, project_id: &str) -> Option<(&CelestialObject, &ImagingProject)> {
        self.objects.iter().find_map(|o| {
            o.projects
                .iter()
                .find(|p| p.id == project_id)
                .map(|p| (o, p))
        })
    }

    fn find_project_mut(&mut self, project_id: &str) -> Option<&mut ImagingProject> {
        self.objects
            .iter_mut()
            .flat_map(|o| o.projects.iter_mut())
            .find(|p| p.id == project_id)
    }

    /// Add a project under an existing object. The panel map is sized to
    /// `num_panels` (default 1), every panel starting empty. Returns the
    /// generated project id so the caller can select it.
    pub fn add_project(&mut self, object_id: &str, input: NewProject) -> Result<String> {
        let num_panels = input.num_panels.unwrap_or(1);
        if num_panels == 0 {
            return Err(Error::Validation("a project needs at least one panel".into()));
        }

        let object = self
            .find_object_mut(object_id)
            .ok_or_else(|| Error::NotFound(format!("object {}", object_id)))?;

        let mut panels = BTreeMap::new();
        for n in 1..=num_panels {
            panels.insert(n, Vec::new());
        }

        let mut filters = Vec::new();
        for f in input.filters {
            if !filters.contains(&f) {
                filters.push(f);
            }
        }

        let id = new_id();
        object.projects.push(ImagingProject {
            id: id.clone(),
            name: input.name,
            description: input.description,
            status: ProjectStatus::Active,
            project_type: input.project_type,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            equipment: input.equipment,
            filters,
            goal_hours: input.goal_hours,
            images: BTreeMap::new(),
            ratings: BTreeMap::new(),
            panels,
        });
        log::info!("add_project: created {} under object {}", id, object_id);
        Ok(id)
    }

    pub fn update_project(&mut self, project_id: &str, patch: ProjectPatch) -> Result<()> {
        let project = self
            .find_project_mut(project_id)
            .ok_or_else(|| Error::NotFound(format!("project {}", project_id)))?;

        if let Some(name) = patch.name {
            project.name = name;
        }
        if let Some(description) = patch.description {
            project.description = description;
        }
        if let Some(status) = patch.status {
            project.status = status;
            if status == ProjectStatus::Completed && project.completed_at.is_none() {
                project.completed_at = Some(Utc::now());
            }
        }
        if let Some(started_at) = patch.started_at {
            project.started_at = Some(started_at);
        }
        if let Some(completed_at) = patch.completed_at {
            project.completed_at = Some(completed_at);
        }
        if let Some(equipment) = patch.equipment {
            project.equipment = equipment;
        }
        if let Some(goal) = patch.goal_hours {
            project.goal_hours = Some(goal);
        }
        Ok(())
    }

    pub fn delete_project(&mut self, project_id: &str) -> Result<()> {
        for object in &mut self.objects {
            let before = object.projects.len();
            object.projects.retain(|p| p.id != project_id);
            if object.projects.len() != before {
                return Ok(());
            }
        }
        Err(Error::NotFound(format!("project {}", project_id)))
    }

    /// Change a project's panel count. Growing appends empty panels;
    /// shrinking drops the higher-numbered panels and permanently discards
    /// their sessions, so the caller must confirm out-of-band.
    pub fn resize_panels(&mut self, project_id: &str, new_count: u32) -> Result<()> {
        if new_count == 0 {
            return Err(Error::Validation("a project needs at least one panel".into()));
        }
        let project = self
            .find_project_mut(project_id)
            .ok_or_else(|| Error::NotFound(format!("project {}", project_id)))?;

        let current = project.panels.len() as u32;
        if new_count < current {
            let dropped: usize = project
                .panels
                .range(new_count + 1..)
                .map(|(_, v)| v.len())
                .sum();
            project.panels.retain(|&n, _| n <= new_count);
            if dropped > 0 {
                log::warn!(
                    "resize_panels: project {} shrank to {} panels, {} sessions discarded",
                    project_id,
                    new_count,
                    dropped
                );
            }
        } else {
            for n in current + 1..=new_count {
                project.panels.insert(n, Vec::new());
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Project images and ratings
    // ------------------------------------------------------------------

    /// Store or replace a named project image (data URI or URL).
    pub fn set_project_image(&mut self, project_id: &str, key: &str, value: String) -> Result<()> {
        if key.trim().is_empty() {
            return Err(Error::Validation("image key must not be empty".into()));
        }
        let project = self
            .find_project_mut(project_id)
            .ok_or_else(|| Error::NotFound(format!("project {}", project_id)))?;
        project.images.insert(key.to_string(), value);
        Ok(())
    }

    /// Remove a named image and, with it, any rating stored under the same
    /// key. A rating must never outlive its image.
    pub fn remove_project_image(&mut self, project_id: &str, key: &str) -> Result<()> {
        let project = self
            .find_project_mut(project_id)
            .ok_or_else(|| Error::NotFound(format!("project {}", project_id)))?;
        if project.images.remove(key).is_none() {
            return Err(Error::NotFound(format!("image {}", key)));
        }
        project.ratings.remove(key);
        Ok(())
    }

    /// Star rating for a named image, 0-3.
    pub fn set_image_rating(&mut self, project_id: &str, key: &str, rating: u8) -> Result<()> {
        if rating > 3 {
            return Err(Error::Validation(format!(
                "rating must be 0-3, got {}",
                rating
            )));
        }
        let project = self
            .find_project_mut(project_id)
            .ok_or_else(|| Error::NotFound(format!("project {}", project_id)))?;
        project.ratings.insert(key.to_string(), rating);
        Ok(())
    }
}

// ============================================================================
// Session operations
// ============================================================================

impl Catalog {
    pub fn find_session(&self, session_id: &str) -> Option<&ImagingSession> {
        self.objects
            .iter()
            .flat_map(|o| o.projects.iter())
            .flat_map(|p| p.panels.values())
            .flatten()
            .find(|s| s.id == session_id)
    }

    fn find_session_mut(&mut self, session_id: &str) -> Option<&mut ImagingSession> {
        self.objects
            .iter_mut()
            .flat_map(|o| o.projects.iter_mut())
            .flat_map(|p| p.panels.values_mut())
            .flatten()
            .find(|s| s.id == session_id)
    }

    /// Add a session to one panel of one project. The session's filter name
    /// is unioned into the project's filter list (exact match), and the moon
    /// phase descriptor is computed from the session date. Returns the
    /// generated session id.
    pub fn add_session(
        &mut self,
        object_id: &str,
        project_id: &str,
        panel: u32,
        input: NewSession,
    ) -> Result<String> {
        let object = self
            .find_object_mut(object_id)
            .ok_or_else(|| Error::NotFound(format!("object {}", object_id)))?;
        let project = object
            .projects
            .iter_mut()
            .find(|p| p.id == project_id)
            .ok_or_else(|| Error::NotFound(format!("project {}", project_id)))?;
        let bucket = project
            .panels
            .get_mut(&panel)
            .ok_or_else(|| Error::NotFound(format!("panel {} of project {}", panel, project_id)))?;

        let id = new_id();
        let moon_phase = moon::phase_for_iso_date(&input.date);
        bucket.push(ImagingSession {
            id: id.clone(),
            date: input.date,
            lights: input.lights,
            exposure_sec: input.exposure_sec,
            filter: input.filter.clone(),
            camera: input.camera,
            telescope: input.telescope,
            snr_r: input.snr_r,
            snr_g: input.snr_g,
            snr_b: input.snr_b,
            accepted: input.accepted,
            rejected: input.rejected,
            notes: input.notes,
            fits: input.fits,
            guiding: input.guiding,
            moon_phase,
        });

        if !input.filter.is_empty() && !project.filters.contains(&input.filter) {
            project.filters.push(input.filter);
        }
        Ok(id)
    }

    /// Best-effort session patch. Returns whether a session was found; a
    /// missing id is a no-op, not an error, because an edit may race a
    /// delete. A patched date recomputes the moon phase.
    pub fn edit_session(&mut self, session_id: &str, patch: SessionPatch) -> bool {
        let Some(session) = self.find_session_mut(session_id) else {
            log::warn!("edit_session: session {} no longer exists", session_id);
            return false;
        };

        if let Some(date) = patch.date {
            session.moon_phase = moon::phase_for_iso_date(&date);
            session.date = date;
        }
        if let Some(lights) = patch.lights {
            session.lights = lights;
        }
        if let Some(exposure_sec) = patch.exposure_sec {
            session.exposure_sec = exposure_sec;
        }
        if let Some(filter) = patch.filter {
            session.filter = filter;
        }
        if let Some(camera) = patch.camera {
            session.camera = camera;
        }
        if let Some(telescope) = patch.telescope {
            session.telescope = telescope;
        }
        if let Some(v) = patch.snr_r {
            session.snr_r = Some(v);
        }
        if let Some(v) = patch.snr_g {
            session.snr_g = Some(v);
        }
        if let Some(v) = patch.snr_b {
            session.snr_b = Some(v);
        }
        if let Some(v) = patch.accepted {
            session.accepted = Some(v);
        }
        if let Some(v) = patch.rejected {
            session.rejected = Some(v);
        }
        if let Some(notes) = patch.notes {
            session.notes = notes;
        }
        if let Some(fits) = patch.fits {
            session.fits = Some(fits);
        }
        if let Some(guiding) = patch.guiding {
            session.guiding = Some(guiding);
        }
        true
    }

    pub fn delete_session(&mut self, session_id: &str) -> Result<()> {
        for object in &mut self.objects {
            for project in &mut object.projects {
                for bucket in project.panels.values_mut() {
                    let before = bucket.len();
                    bucket.retain(|s| s.id != session_id);
                    if bucket.len() != before {
                        return Ok(());
                    }
                }
            }
        }
        Err(Error::NotFound(format!("session {}", session_id)))
    }
}

// ============================================================================
// Planned projects
// ============================================================================

impl Catalog {
    pub fn add_planned(&mut self, input: NewPlanned) -> Result<String> {
        let code = input.code.trim().to_string();
        if code.is_empty() {
            return Err(Error::Validation("planned object code must not be empty".into()));
        }

        let id = new_id();
        self.planned_projects.push(PlannedProject {
            id: id.clone(),
            code,
            name: input.name,
            constellation: input.constellation,
            visibility: input.visibility,
            priority: input.priority,
            signal_type: input.signal_type,
            framing_image: input.framing_image,
            object_image: input.object_image,
        });
        Ok(id)
    }

    pub fn delete_planned(&mut self, planned_id: &str) -> Result<()> {
        let before = self.planned_projects.len();
        self.planned_projects.retain(|p| p.id != planned_id);
        if self.planned_projects.len() == before {
            return Err(Error::NotFound(format!("planned project {}", planned_id)));
        }
        Ok(())
    }

    /// Promote a plan into the catalogue: reuse the object whose code
    /// matches (case-insensitively) or create one, create the project under
    /// it, and drop the planned entry. One transition; returns the
    /// (object id, project id) pair.
    pub fn promote_planned(
        &mut self,
        planned_id: &str,
        project: NewProject,
    ) -> Result<(String, String)> {
        // Validate up front so a rejected project never leaves a half-made
        // object behind.
        if project.num_panels == Some(0) {
            return Err(Error::Validation("a project needs at least one panel".into()));
        }
        let idx = self
            .planned_projects
            .iter()
            .position(|p| p.id == planned_id)
            .ok_or_else(|| Error::NotFound(format!("planned project {}", planned_id)))?;
        let planned = self.planned_projects[idx].clone();

        let object_id = match self.find_object_by_code(&planned.code) {
            Some(existing) => existing.id.clone(),
            None => self.add_object(NewObject {
                code: planned.code.clone(),
                name: planned.name.clone(),
                constellation: planned.constellation.clone(),
                object_type: String::new(),
                cover_image: planned.object_image.clone(),
            })?,
        };

        let project_id = self.add_project(&object_id, project)?;
        self.planned_projects.remove(idx);
        log::info!(
            "promote_planned: {} -> object {} project {}",
            planned_id,
            object_id,
            project_id
        );
        Ok((object_id, project_id))
    }

    pub fn update_settings(&mut self, settings: Settings) {
        self.settings = settings;
    }
}
