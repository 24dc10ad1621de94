//! Camera system
//!
//! Cameras follow the same registry discipline as every other resource,
//! plus one unregistered always-present default camera that bypasses
//! acquire/release accounting entirely.

use crate::foundation::math::{Mat4, Vec3};
use crate::resources::registry::{Handle, Release, SlotRegistry};
use crate::resources::ResourceResult;
use nalgebra::Rotation3;

/// Reserved name of the registry-bypassing default camera
pub const DEFAULT_CAMERA_NAME: &str = "default";

/// Pitch is clamped just shy of straight up/down to keep the view basis
/// well defined.
const PITCH_LIMIT: f32 = 1.553_343; // ~89 degrees

/// A camera: position plus euler rotation with a lazily rebuilt view matrix
#[derive(Debug, Clone)]
pub struct Camera {
    position: Vec3,
    euler_rotation: Vec3,
    view: Mat4,
    dirty: bool,
}

impl Default for Camera {
    fn default() -> Self {
        Self::new()
    }
}

impl Camera {
    /// Create a camera at the origin looking down -Z
    pub fn new() -> Self {
        Self {
            position: Vec3::zeros(),
            euler_rotation: Vec3::zeros(),
            view: Mat4::identity(),
            dirty: false,
        }
    }

    /// World-space position
    pub fn position(&self) -> Vec3 {
        self.position
    }

    /// Set the world-space position
    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
        self.dirty = true;
    }

    /// Euler rotation in radians (pitch, yaw, roll)
    pub fn euler_rotation(&self) -> Vec3 {
        self.euler_rotation
    }

    /// Set the euler rotation in radians
    pub fn set_euler_rotation(&mut self, euler: Vec3) {
        self.euler_rotation = Vec3::new(
            euler.x.clamp(-PITCH_LIMIT, PITCH_LIMIT),
            euler.y,
            euler.z,
        );
        self.dirty = true;
    }

    /// Adjust yaw by `amount` radians
    pub fn yaw(&mut self, amount: f32) {
        self.euler_rotation.y += amount;
        self.dirty = true;
    }

    /// Adjust pitch by `amount` radians, clamped away from the poles
    pub fn pitch(&mut self, amount: f32) {
        self.euler_rotation.x = (self.euler_rotation.x + amount).clamp(-PITCH_LIMIT, PITCH_LIMIT);
        self.dirty = true;
    }

    /// Translate along the camera's forward axis
    pub fn move_forward(&mut self, amount: f32) {
        let forward = self.rotation().transform_vector(&-Vec3::z());
        self.position += forward * amount;
        self.dirty = true;
    }

    /// Translate along the camera's right axis
    pub fn move_right(&mut self, amount: f32) {
        let right = self.rotation().transform_vector(&Vec3::x());
        self.position += right * amount;
        self.dirty = true;
    }

    /// Translate along world up
    pub fn move_up(&mut self, amount: f32) {
        self.position += Vec3::y() * amount;
        self.dirty = true;
    }

    /// Reset to the origin with no rotation
    pub fn reset(&mut self) {
        self.position = Vec3::zeros();
        self.euler_rotation = Vec3::zeros();
        self.dirty = true;
    }

    fn rotation(&self) -> Rotation3<f32> {
        Rotation3::from_euler_angles(
            self.euler_rotation.x,
            self.euler_rotation.y,
            self.euler_rotation.z,
        )
    }

    /// View matrix, rebuilt only when position or rotation changed
    pub fn view_matrix(&mut self) -> Mat4 {
        if self.dirty {
            let rotation_inverse = self.rotation().inverse().to_homogeneous();
            self.view = rotation_inverse * Mat4::new_translation(&-self.position);
            self.dirty = false;
        }
        self.view
    }
}

/// Name-addressed registry of cameras plus the default
pub struct CameraSystem {
    registry: SlotRegistry<Camera>,
    default_camera: Camera,
}

impl CameraSystem {
    /// Create the system and its default camera
    pub fn new(capacity: usize) -> Self {
        log::info!("Camera system initialized with {capacity} slots");
        Self {
            registry: SlotRegistry::new("camera", capacity),
            default_camera: Camera::new(),
        }
    }

    /// Acquire a camera by name, creating it at the origin when unknown
    pub fn acquire(&mut self, name: &str, auto_release: bool) -> ResourceResult<Handle> {
        if name == DEFAULT_CAMERA_NAME {
            return Ok(Handle::DEFAULT);
        }
        self.registry
            .acquire_with(name, auto_release, |_| Ok(Camera::new()))
    }

    /// Release one reference; cameras hold no backend resources
    pub fn release(&mut self, name: &str) {
        if name == DEFAULT_CAMERA_NAME {
            log::trace!("release of the default camera ignored");
            return;
        }
        if let Release::ShouldDestroy(_) = self.registry.release(name) {
            self.registry.destroy(name);
        }
    }

    /// Resolve a handle; the default sentinel resolves to the default camera
    pub fn get(&self, handle: Handle) -> Option<&Camera> {
        if handle.is_default() {
            return Some(&self.default_camera);
        }
        self.registry.get(handle)
    }

    /// Mutable variant of [`get`](Self::get)
    pub fn get_mut(&mut self, handle: Handle) -> Option<&mut Camera> {
        if handle.is_default() {
            return Some(&mut self.default_camera);
        }
        self.registry.get_mut(handle)
    }

    /// Handle bound to `name`, if any
    pub fn handle_of(&self, name: &str) -> Option<Handle> {
        if name == DEFAULT_CAMERA_NAME {
            return Some(Handle::DEFAULT);
        }
        self.registry.handle_of(name)
    }

    /// The always-present default camera
    pub fn default_camera(&self) -> &Camera {
        &self.default_camera
    }

    /// Mutable access to the default camera
    pub fn default_camera_mut(&mut self) -> &mut Camera {
        &mut self.default_camera
    }

    /// Current reference count for `name`
    pub fn ref_count(&self, name: &str) -> usize {
        self.registry.ref_count(name)
    }

    /// Number of live registry slots
    pub fn live_count(&self) -> usize {
        self.registry.live_count()
    }
}
