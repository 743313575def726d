use std::collections::HashSet;

use glam::{Mat4, Quat, Vec2, Vec3};
use winit::{
    event::{ElementState, KeyEvent, MouseButton, MouseScrollDelta, WindowEvent},
    keyboard::{KeyCode, PhysicalKey},
};

use crate::{
    camera::Camera,
    interaction::{ControllerEvent, Hand},
};

/// Pixels of trackpad scroll that count as one wheel notch.
const PIXELS_PER_LINE: f32 = 40.0;

/// Keyboard and mouse state for one frame. Edge sets are cleared by `end_frame`.
#[derive(Debug, Default)]
pub struct InputState {
    cursor: Option<Vec2>,
    cursor_delta: Vec2,
    scroll: f32,
    buttons_down: HashSet<MouseButton>,
    buttons_pressed: HashSet<MouseButton>,
    buttons_released: HashSet<MouseButton>,
    keys_down: HashSet<KeyCode>,
    keys_pressed: HashSet<KeyCode>,
    keys_released: HashSet<KeyCode>,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle_window_event(&mut self, event: &WindowEvent) {
        match event {
            WindowEvent::CursorMoved { position, .. } => {
                self.move_cursor(Vec2::new(position.x as f32, position.y as f32));
            }
            WindowEvent::CursorLeft { .. } => {
                self.cursor = None;
            }
            WindowEvent::MouseInput { state, button, .. } => match state {
                ElementState::Pressed => self.press_button(*button),
                ElementState::Released => self.release_button(*button),
            },
            WindowEvent::MouseWheel { delta, .. } => {
                let lines = match delta {
                    MouseScrollDelta::LineDelta(_, y) => *y,
                    MouseScrollDelta::PixelDelta(position) => position.y as f32 / PIXELS_PER_LINE,
                };
                self.scroll(lines);
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(code),
                        state,
                        repeat,
                        ..
                    },
                ..
            } => match state {
                ElementState::Pressed if !repeat => self.press_key(*code),
                ElementState::Pressed => {}
                ElementState::Released => self.release_key(*code),
            },
            WindowEvent::Focused(false) => self.release_all(),
            _ => {}
        }
    }

    pub fn move_cursor(&mut self, position: Vec2) {
        if let Some(previous) = self.cursor {
            self.cursor_delta += position - previous;
        }
        self.cursor = Some(position);
    }

    pub fn press_button(&mut self, button: MouseButton) {
        if self.buttons_down.insert(button) {
            self.buttons_pressed.insert(button);
        }
    }

    pub fn release_button(&mut self, button: MouseButton) {
        if self.buttons_down.remove(&button) {
            self.buttons_released.insert(button);
        }
    }

    pub fn press_key(&mut self, key: KeyCode) {
        if self.keys_down.insert(key) {
            self.keys_pressed.insert(key);
        }
    }

    pub fn release_key(&mut self, key: KeyCode) {
        if self.keys_down.remove(&key) {
            self.keys_released.insert(key);
        }
    }

    pub fn scroll(&mut self, lines: f32) {
        self.scroll += lines;
    }

    fn release_all(&mut self) {
        self.buttons_released.extend(self.buttons_down.drain());
        self.keys_released.extend(self.keys_down.drain());
    }

    pub fn end_frame(&mut self) {
        self.cursor_delta = Vec2::ZERO;
        self.scroll = 0.0;
        self.buttons_pressed.clear();
        self.buttons_released.clear();
        self.keys_pressed.clear();
        self.keys_released.clear();
    }

    pub fn cursor(&self) -> Option<Vec2> {
        self.cursor
    }

    pub fn cursor_delta(&self) -> Vec2 {
        self.cursor_delta
    }

    pub fn scroll_lines(&self) -> f32 {
        self.scroll
    }

    pub fn is_button_down(&self, button: MouseButton) -> bool {
        self.buttons_down.contains(&button)
    }

    pub fn was_button_pressed(&self, button: MouseButton) -> bool {
        self.buttons_pressed.contains(&button)
    }

    pub fn was_button_released(&self, button: MouseButton) -> bool {
        self.buttons_released.contains(&button)
    }

    pub fn is_key_down(&self, key: KeyCode) -> bool {
        self.keys_down.contains(&key)
    }

    pub fn was_key_pressed(&self, key: KeyCode) -> bool {
        self.keys_pressed.contains(&key)
    }

    pub fn was_key_released(&self, key: KeyCode) -> bool {
        self.keys_released.contains(&key)
    }
}

/// Controller poses and select events produced for one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerFrame {
    pub poses: [(Hand, Mat4); 2],
    pub events: Vec<ControllerEvent>,
}

impl ControllerFrame {
    pub fn pose(&self, hand: Hand) -> Mat4 {
        self.poses
            .iter()
            .find(|(h, _)| *h == hand)
            .map(|(_, pose)| *pose)
            .unwrap_or(Mat4::IDENTITY)
    }
}

/// Stands in for two tracked controllers on a desktop.
///
/// The left controller sits at the camera and aims through the mouse cursor, selecting with
/// the left mouse button. The right controller hangs below and to the right of the camera,
/// is aimed with the arrow keys relative to the view direction and selects with Space.
#[derive(Debug, Default)]
pub struct DesktopControllers {
    right_yaw: f32,
    right_pitch: f32,
}

impl DesktopControllers {
    const AIM_SPEED: f32 = 1.0;
    const MAX_AIM_ANGLE: f32 = 1.2;
    const RIGHT_OFFSET: Vec3 = Vec3::new(0.25, -0.2, 0.3);

    pub fn new() -> Self {
        Self::default()
    }

    /// `pointer_captured` suppresses new left-hand selects while the UI owns the mouse.
    /// Releases are always delivered so a grab never gets stuck.
    pub fn update(
        &mut self,
        camera: &Camera,
        input: &InputState,
        resolution: Vec2,
        dt: f32,
        pointer_captured: bool,
    ) -> ControllerFrame {
        let aim = |key: KeyCode| if input.is_key_down(key) { 1.0 } else { 0.0 };
        self.right_yaw += (aim(KeyCode::ArrowLeft) - aim(KeyCode::ArrowRight)) * Self::AIM_SPEED * dt;
        self.right_pitch += (aim(KeyCode::ArrowUp) - aim(KeyCode::ArrowDown)) * Self::AIM_SPEED * dt;
        self.right_yaw = self.right_yaw.clamp(-Self::MAX_AIM_ANGLE, Self::MAX_AIM_ANGLE);
        self.right_pitch = self
            .right_pitch
            .clamp(-Self::MAX_AIM_ANGLE, Self::MAX_AIM_ANGLE);

        let view_rotation = view_rotation(camera);

        let left_direction = match input.cursor() {
            Some(cursor) => camera.screen_ray(cursor, resolution).direction,
            None => camera.forward(),
        };
        let left = Mat4::from_rotation_translation(
            Quat::from_rotation_arc(Vec3::NEG_Z, left_direction),
            camera.eye,
        );

        let right_rotation = view_rotation
            * Quat::from_rotation_y(self.right_yaw)
            * Quat::from_rotation_x(self.right_pitch);
        let right = Mat4::from_rotation_translation(
            right_rotation,
            camera.eye + view_rotation * Self::RIGHT_OFFSET,
        );

        let mut events = Vec::new();
        if input.was_button_pressed(MouseButton::Left) && !pointer_captured {
            events.push(ControllerEvent::SelectStart(Hand::Left));
        }
        if input.was_button_released(MouseButton::Left) {
            events.push(ControllerEvent::SelectEnd(Hand::Left));
        }
        if input.was_key_pressed(KeyCode::Space) {
            events.push(ControllerEvent::SelectStart(Hand::Right));
        }
        if input.was_key_released(KeyCode::Space) {
            events.push(ControllerEvent::SelectEnd(Hand::Right));
        }

        ControllerFrame {
            poses: [(Hand::Left, left), (Hand::Right, right)],
            events,
        }
    }
}

/// Rotation taking -Z to the camera's view direction with +Y kept up.
fn view_rotation(camera: &Camera) -> Quat {
    let view = camera.view_matrix();
    let (_, rotation, _) = view.inverse().to_scale_rotation_translation();
    rotation
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESOLUTION: Vec2 = Vec2::new(800.0, 600.0);

    fn camera() -> Camera {
        Camera::looking_at(Vec3::new(0.0, 1.6, 3.0), Vec3::new(0.0, 1.6, 0.0), 50.0)
    }

    fn forward_of(pose: Mat4) -> Vec3 {
        pose.transform_vector3(Vec3::NEG_Z).normalize()
    }

    #[test]
    fn edges_are_reported_for_one_frame() {
        let mut input = InputState::new();
        input.press_key(KeyCode::Space);
        input.press_key(KeyCode::Space);
        assert!(input.was_key_pressed(KeyCode::Space));
        assert!(input.is_key_down(KeyCode::Space));

        input.end_frame();
        assert!(!input.was_key_pressed(KeyCode::Space));
        assert!(input.is_key_down(KeyCode::Space));

        input.release_key(KeyCode::Space);
        assert!(input.was_key_released(KeyCode::Space));
        assert!(!input.is_key_down(KeyCode::Space));
    }

    #[test]
    fn cursor_delta_accumulates_until_frame_end() {
        let mut input = InputState::new();
        input.move_cursor(Vec2::new(10.0, 10.0));
        assert_eq!(input.cursor_delta(), Vec2::ZERO);
        input.move_cursor(Vec2::new(15.0, 12.0));
        input.move_cursor(Vec2::new(20.0, 10.0));
        assert_eq!(input.cursor_delta(), Vec2::new(10.0, 0.0));
        input.end_frame();
        assert_eq!(input.cursor_delta(), Vec2::ZERO);
        assert_eq!(input.cursor(), Some(Vec2::new(20.0, 10.0)));
    }

    #[test]
    fn left_controller_aims_through_cursor() {
        let mut input = InputState::new();
        input.move_cursor(RESOLUTION / 2.0);
        let frame = DesktopControllers::new().update(&camera(), &input, RESOLUTION, 0.016, false);

        let left = frame.pose(Hand::Left);
        assert!(left.w_axis.truncate().abs_diff_eq(camera().eye, 1e-5));
        assert!(forward_of(left).abs_diff_eq(Vec3::NEG_Z, 1e-4));
    }

    #[test]
    fn right_controller_follows_arrow_keys() {
        let mut input = InputState::new();
        let mut controllers = DesktopControllers::new();

        let frame = controllers.update(&camera(), &input, RESOLUTION, 0.1, false);
        assert!(forward_of(frame.pose(Hand::Right)).abs_diff_eq(Vec3::NEG_Z, 1e-4));

        input.press_key(KeyCode::ArrowLeft);
        let frame = controllers.update(&camera(), &input, RESOLUTION, 0.5, false);
        let forward = forward_of(frame.pose(Hand::Right));
        assert!(forward.x < -0.4, "{forward}");
    }

    #[test]
    fn buttons_become_select_events() {
        let mut input = InputState::new();
        let mut controllers = DesktopControllers::new();

        input.press_button(MouseButton::Left);
        input.press_key(KeyCode::Space);
        let frame = controllers.update(&camera(), &input, RESOLUTION, 0.016, false);
        assert_eq!(
            frame.events,
            vec![
                ControllerEvent::SelectStart(Hand::Left),
                ControllerEvent::SelectStart(Hand::Right)
            ]
        );

        input.end_frame();
        input.release_button(MouseButton::Left);
        let frame = controllers.update(&camera(), &input, RESOLUTION, 0.016, true);
        assert_eq!(frame.events, vec![ControllerEvent::SelectEnd(Hand::Left)]);
    }

    #[test]
    fn captured_pointer_does_not_start_a_grab() {
        let mut input = InputState::new();
        input.press_button(MouseButton::Left);
        let frame = DesktopControllers::new().update(&camera(), &input, RESOLUTION, 0.016, true);
        assert!(frame.events.is_empty());
    }
}
