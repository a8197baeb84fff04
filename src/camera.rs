//! Fly camera: yaw/pitch orientation, keyboard movement, mouse look and
//! scroll zoom, plus the uniform that carries it to the GPU.

use cgmath::{Deg, InnerSpace, Matrix4, Point3, Rad, Vector3, perspective};
use instant::Duration;
use winit::event::MouseScrollDelta;
use winit::keyboard::KeyCode;

#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: Matrix4<f32> = Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

const MAX_PITCH: f32 = 89.0;
const MIN_ZOOM: f32 = 1.0;
const MAX_ZOOM: f32 = 45.0;

#[derive(Debug, Clone, Copy)]
pub struct Camera {
    pub position: Point3<f32>,
    pub yaw: Deg<f32>,
    pub pitch: Deg<f32>,
    /// Vertical field of view, narrowed by scrolling.
    pub zoom: Deg<f32>,
}

impl Camera {
    pub fn new<P: Into<Point3<f32>>>(position: P) -> Self {
        Self {
            position: position.into(),
            yaw: Deg(-90.0),
            pitch: Deg(0.0),
            zoom: Deg(MAX_ZOOM),
        }
    }

    pub fn front(&self) -> Vector3<f32> {
        let (sin_yaw, cos_yaw) = Rad::from(self.yaw).0.sin_cos();
        let (sin_pitch, cos_pitch) = Rad::from(self.pitch).0.sin_cos();
        Vector3::new(cos_yaw * cos_pitch, sin_pitch, sin_yaw * cos_pitch).normalize()
    }

    pub fn right(&self) -> Vector3<f32> {
        self.front().cross(Vector3::unit_y()).normalize()
    }

    pub fn up(&self) -> Vector3<f32> {
        self.right().cross(self.front()).normalize()
    }

    pub fn calc_matrix(&self) -> Matrix4<f32> {
        Matrix4::look_to_rh(self.position, self.front(), self.up())
    }

    /// Apply a look offset in degrees, keeping the pitch short of vertical.
    pub fn rotate(&mut self, yaw: f32, pitch: f32) {
        self.yaw += Deg(yaw);
        self.pitch = Deg((self.pitch.0 + pitch).clamp(-MAX_PITCH, MAX_PITCH));
    }

    pub fn zoom_by(&mut self, amount: f32) {
        self.zoom = Deg((self.zoom.0 - amount).clamp(MIN_ZOOM, MAX_ZOOM));
    }
}

#[derive(Debug)]
pub struct Projection {
    aspect: f32,
    znear: f32,
    zfar: f32,
}

impl Projection {
    pub fn new(width: u32, height: u32, znear: f32, zfar: f32) -> Self {
        Self {
            aspect: width as f32 / height.max(1) as f32,
            znear,
            zfar,
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.aspect = width as f32 / height.max(1) as f32;
    }

    pub fn calc_matrix(&self, fovy: Deg<f32>) -> Matrix4<f32> {
        OPENGL_TO_WGPU_MATRIX * perspective(fovy, self.aspect, self.znear, self.zfar)
    }
}

/// Turns input events into camera motion.
///
/// Keys are held state applied per frame in [`update`](Self::update); mouse
/// look and scroll apply immediately.
#[derive(Debug)]
pub struct CameraController {
    speed: f32,
    sensitivity: f32,
    forward: bool,
    backward: bool,
    left: bool,
    right: bool,
    up: bool,
    down: bool,
    skip_next_motion: bool,
}

impl CameraController {
    pub fn new(speed: f32, sensitivity: f32) -> Self {
        Self {
            speed,
            sensitivity,
            forward: false,
            backward: false,
            left: false,
            right: false,
            up: false,
            down: false,
            skip_next_motion: true,
        }
    }

    /// Returns whether the key moves the camera.
    pub fn handle_key(&mut self, key: KeyCode, pressed: bool) -> bool {
        let flag = match key {
            KeyCode::KeyW | KeyCode::ArrowUp => &mut self.forward,
            KeyCode::KeyS | KeyCode::ArrowDown => &mut self.backward,
            KeyCode::KeyA | KeyCode::ArrowLeft => &mut self.left,
            KeyCode::KeyD | KeyCode::ArrowRight => &mut self.right,
            KeyCode::Space => &mut self.up,
            KeyCode::ShiftLeft => &mut self.down,
            _ => return false,
        };
        *flag = pressed;
        true
    }

    /// Mouse look from raw motion. `dy` grows downwards.
    pub fn handle_mouse(&mut self, camera: &mut Camera, dx: f64, dy: f64) {
        if std::mem::replace(&mut self.skip_next_motion, false) {
            return;
        }
        camera.rotate(
            dx as f32 * self.sensitivity,
            -dy as f32 * self.sensitivity,
        );
    }

    pub fn handle_scroll(&mut self, camera: &mut Camera, delta: &MouseScrollDelta) {
        let amount = match delta {
            MouseScrollDelta::LineDelta(_, y) => *y,
            MouseScrollDelta::PixelDelta(pos) => pos.y as f32 / 20.0,
        };
        camera.zoom_by(amount);
    }

    /// Drop the next mouse motion, so re-locking the cursor does not jump.
    pub fn reset_mouse(&mut self) {
        self.skip_next_motion = true;
    }

    /// Release all held keys, for example when the window loses focus.
    pub fn release_all(&mut self) {
        self.forward = false;
        self.backward = false;
        self.left = false;
        self.right = false;
        self.up = false;
        self.down = false;
    }

    pub fn update(&self, camera: &mut Camera, dt: Duration) {
        let velocity = self.speed * dt.as_secs_f32();
        let axis = |pos: bool, neg: bool| (pos as i8 - neg as i8) as f32;

        let front = camera.front();
        let right = camera.right();
        camera.position += front * axis(self.forward, self.backward) * velocity;
        camera.position += right * axis(self.right, self.left) * velocity;
        camera.position += Vector3::unit_y() * axis(self.up, self.down) * velocity;
    }
}

impl Default for CameraController {
    fn default() -> Self {
        Self::new(2.5, 0.1)
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniform {
    view_position: [f32; 4],
    view: [[f32; 4]; 4],
    view_proj: [[f32; 4]; 4],
}

impl CameraUniform {
    pub fn new() -> Self {
        use cgmath::SquareMatrix;
        Self {
            view_position: [0.0; 4],
            view: Matrix4::identity().into(),
            view_proj: Matrix4::identity().into(),
        }
    }

    pub fn update_view_proj(&mut self, camera: &Camera, projection: &Projection) {
        let view = camera.calc_matrix();
        self.view_position = camera.position.to_homogeneous().into();
        self.view = view.into();
        self.view_proj = (projection.calc_matrix(camera.zoom) * view).into();
    }
}

impl Default for CameraUniform {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
pub struct CameraResources {
    pub camera: Camera,
    pub controller: CameraController,
    pub uniform: CameraUniform,
    pub buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
    pub bind_group_layout: wgpu::BindGroupLayout,
}
