//! JSON scene files.
//!
//! ```json
//! {
//!   "camera": { "position": [0, 1, -4], "look_at": [0, 1, 0], "fov_y": 50 },
//!   "boxes": [
//!     { "min": [-1, 0, -1], "max": [1, 0.1, 1], "material": { "colour": [0.8, 0.8, 0.8, 1] } },
//!     { "center": [0, 2, 0], "size": [0.5, 0.05, 0.5],
//!       "material": { "emission_color": [1, 1, 1, 1], "emission_strength": 10 } }
//!   ]
//! }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::primitive::{BoxPrimitive, BoxProvider, Material};
use crate::camera::{CameraKind, CameraState};
use crate::util::{Error, Result, Vec3};

/// Camera block of a scene file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraDescription {
    pub position: Vec3,
    pub look_at: Vec3,
    pub up: Vec3,
    /// Vertical field of view in degrees.
    pub fov_y: f32,
    pub near_clip: f32,
    pub kind: CameraKind,
}

impl Default for CameraDescription {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 1.0, -4.0),
            look_at: Vec3::new(0.0, 1.0, 0.0),
            up: Vec3::Y,
            fov_y: 50.0,
            near_clip: 0.1,
            kind: CameraKind::Primary,
        }
    }
}

impl CameraDescription {
    /// Camera state for a surface with the given aspect ratio.
    pub fn to_state(&self, aspect: f32) -> CameraState {
        CameraState::look_at(self.position, self.look_at, self.up, self.fov_y, aspect, self.near_clip)
            .with_kind(self.kind)
    }
}

/// Box entry as written in a file: explicit corners or centre + size.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum BoxEntry {
    Corners {
        min: Vec3,
        max: Vec3,
        #[serde(default)]
        material: Material,
    },
    CenterSize {
        center: Vec3,
        size: Vec3,
        #[serde(default)]
        material: Material,
    },
}

impl From<BoxEntry> for BoxPrimitive {
    fn from(entry: BoxEntry) -> Self {
        match entry {
            BoxEntry::Corners { min, max, material } => BoxPrimitive::new(min, max, material),
            BoxEntry::CenterSize { center, size, material } => {
                BoxPrimitive::from_center_size(center, size, material)
            }
        }
    }
}

#[derive(Serialize, Deserialize)]
struct SceneFile {
    #[serde(default)]
    camera: CameraDescription,
    #[serde(default)]
    boxes: Vec<BoxEntry>,
}

/// A scene loaded from disk: one camera and a flat list of boxes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SceneDescription {
    pub camera: CameraDescription,
    pub boxes: Vec<BoxPrimitive>,
}

impl SceneDescription {
    /// Parse a scene from JSON text.
    pub fn from_json(text: &str) -> Result<Self> {
        let file: SceneFile = serde_json::from_str(text)?;
        let scene = Self {
            camera: file.camera,
            boxes: file.boxes.into_iter().map(BoxPrimitive::from).collect(),
        };
        scene.validate()?;
        Ok(scene)
    }

    /// Load a scene file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let scene = Self::from_json(&text)?;
        tracing::info!("Loaded scene {} ({} boxes)", path.display(), scene.boxes.len());
        Ok(scene)
    }

    /// Serialize with corner form boxes.
    pub fn to_json(&self) -> Result<String> {
        let file = SceneFile {
            camera: self.camera.clone(),
            boxes: self
                .boxes
                .iter()
                .map(|b| BoxEntry::Corners { min: b.min, max: b.max, material: b.material })
                .collect(),
        };
        Ok(serde_json::to_string_pretty(&file)?)
    }

    fn validate(&self) -> Result<()> {
        let cam = &self.camera;
        if !(cam.fov_y > 0.0 && cam.fov_y < 180.0) {
            return Err(Error::scene(format!("camera fov_y must be in (0, 180), got {}", cam.fov_y)));
        }
        if !(cam.near_clip > 0.0) {
            return Err(Error::scene(format!("camera near_clip must be positive, got {}", cam.near_clip)));
        }
        if cam.position == cam.look_at {
            return Err(Error::scene("camera position and look_at coincide"));
        }
        if let Some(i) = self.boxes.iter().position(|b| !(b.min.is_finite() && b.max.is_finite())) {
            return Err(Error::scene(format!("box {i} has non-finite extents")));
        }
        Ok(())
    }

    /// Closed room lit by a ceiling panel, with two blocks on the floor.
    pub fn demo() -> Self {
        let white = Material::diffuse(0.75, 0.75, 0.75);
        let red = Material::diffuse(0.75, 0.15, 0.12);
        let green = Material::diffuse(0.15, 0.65, 0.2);
        let light = Material::emissive(1.0, 0.92, 0.8, 12.0);

        let boxes = vec![
            // floor, ceiling, back wall
            BoxPrimitive::new(Vec3::new(-2.0, -0.1, -2.0), Vec3::new(2.0, 0.0, 2.0), white),
            BoxPrimitive::new(Vec3::new(-2.0, 3.0, -2.0), Vec3::new(2.0, 3.1, 2.0), white),
            BoxPrimitive::new(Vec3::new(-2.0, 0.0, 2.0), Vec3::new(2.0, 3.0, 2.1), white),
            // side walls
            BoxPrimitive::new(Vec3::new(-2.1, 0.0, -2.0), Vec3::new(-2.0, 3.0, 2.0), red),
            BoxPrimitive::new(Vec3::new(2.0, 0.0, -2.0), Vec3::new(2.1, 3.0, 2.0), green),
            // ceiling light
            BoxPrimitive::from_center_size(Vec3::new(0.0, 2.98, 0.3), Vec3::new(1.0, 0.04, 1.0), light),
            // blocks
            BoxPrimitive::from_center_size(Vec3::new(-0.7, 0.9, 0.8), Vec3::new(0.9, 1.8, 0.9), white),
            BoxPrimitive::from_center_size(
                Vec3::new(0.7, 0.45, -0.2),
                Vec3::new(0.9, 0.9, 0.9),
                Material::diffuse(0.9, 0.9, 0.9).with_smoothness(0.8),
            ),
        ];

        Self {
            camera: CameraDescription {
                position: Vec3::new(0.0, 1.5, -5.5),
                look_at: Vec3::new(0.0, 1.4, 0.0),
                up: Vec3::Y,
                fov_y: 45.0,
                near_clip: 0.1,
                kind: CameraKind::Primary,
            },
            boxes,
        }
    }
}

impl BoxProvider for SceneDescription {
    fn visit_boxes(&self, visit: &mut dyn FnMut(&BoxPrimitive)) {
        self.boxes.visit_boxes(visit);
    }

    fn box_count_hint(&self) -> usize {
        self.boxes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_both_box_forms() {
        let json = r#"{
            "camera": { "position": [0, 1, -4], "look_at": [0, 1, 0], "fov_y": 60 },
            "boxes": [
                { "min": [1, 0, 1], "max": [-1, 0.1, -1] },
                { "center": [0, 2, 0], "size": [0.5, 0.5, 0.5],
                  "material": { "emission_color": [1, 1, 1, 1], "emission_strength": 10 } }
            ]
        }"#;
        let scene = SceneDescription::from_json(json).unwrap();
        assert_eq!(scene.boxes.len(), 2);
        assert_eq!(scene.boxes[0].min, Vec3::new(-1.0, 0.0, -1.0));
        assert_eq!(scene.boxes[1].min, Vec3::new(-0.25, 1.75, -0.25));
        assert_eq!(scene.boxes[1].material.emission_strength, 10.0);
        // unspecified material fields fall back to defaults
        assert_eq!(scene.boxes[1].material.colour, Material::default().colour);
        assert_eq!(scene.camera.fov_y, 60.0);
        assert_eq!(scene.camera.near_clip, 0.1);
    }

    #[test]
    fn test_empty_scene_is_valid() {
        let scene = SceneDescription::from_json("{}").unwrap();
        assert!(scene.boxes.is_empty());
        assert_eq!(scene.camera, CameraDescription::default());
    }

    #[test]
    fn test_preview_kind() {
        let scene = SceneDescription::from_json(r#"{ "camera": { "kind": "preview" } }"#).unwrap();
        assert!(scene.camera.to_state(1.0).is_preview());
    }

    #[test]
    fn test_rejects_bad_camera() {
        let err = SceneDescription::from_json(r#"{ "camera": { "fov_y": 0 } }"#).unwrap_err();
        assert!(matches!(err, Error::InvalidScene(_)));
        let err = SceneDescription::from_json(r#"{ "camera": { "near_clip": -1 } }"#).unwrap_err();
        assert!(matches!(err, Error::InvalidScene(_)));
    }

    #[test]
    fn test_demo_round_trips_through_json() {
        let demo = SceneDescription::demo();
        let back = SceneDescription::from_json(&demo.to_json().unwrap()).unwrap();
        assert_eq!(back, demo);
    }

    #[test]
    fn test_load_missing_file() {
        let err = SceneDescription::load("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
