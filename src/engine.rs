use imgui::Condition;
use winit::keyboard::KeyCode;

use crate::{
    input::InputState,
    stages::{FrameContext, Route, Router},
};

const ROUTE_KEYS: [(KeyCode, Route); 5] = [
    (KeyCode::Digit1, Route::Home),
    (KeyCode::Digit2, Route::Classroom),
    (KeyCode::Digit3, Route::Interaction),
    (KeyCode::Digit4, Route::Physics),
    (KeyCode::Digit5, Route::Movement),
];

/// Advances the mounted stage by one frame. World matrices are refreshed after the stage has
/// moved its objects.
pub fn update(router: &mut Router, ctx: &FrameContext) -> anyhow::Result<()> {
    router.update(ctx)?;
    router.stage_mut().scene_mut().late_update();

    Ok(())
}

/// Route requested with the number keys this frame, if any.
pub fn route_shortcut(input: &InputState) -> Option<Route> {
    ROUTE_KEYS
        .iter()
        .find(|(key, _)| input.was_key_pressed(*key))
        .map(|(_, route)| *route)
}

/// Lists every route and the mounted stage's status. Returns the route the user clicked.
pub fn navigation_window(ui: &imgui::Ui, router: &Router, error: Option<&str>) -> Option<Route> {
    let current = router.route();
    let mut requested = None;

    ui.window("Navigation")
        .position([10.0, 10.0], Condition::FirstUseEver)
        .always_auto_resize(true)
        .build(|| {
            for (i, route) in Route::ALL.into_iter().enumerate() {
                let label = format!("{} {}  ({})", i + 1, route.title(), route.path());
                if ui
                    .selectable_config(label)
                    .selected(route == current)
                    .build()
                {
                    requested = Some(route);
                }
            }

            ui.separator();
            ui.text(format!("{:.1} fps", ui.io().framerate));
            if let Some(status) = router.stage().status() {
                ui.text(status);
            }
            if let Some(error) = error {
                ui.text_colored([1.0, 0.4, 0.4, 1.0], error);
            }
        });

    requested.filter(|route| *route != current)
}

#[cfg(test)]
mod tests {
    use glam::Vec2;

    use super::*;
    use crate::stages::StageOptions;

    #[test]
    fn number_keys_pick_routes() {
        let mut input = InputState::new();
        assert_eq!(route_shortcut(&input), None);

        input.press_key(KeyCode::Digit4);
        assert_eq!(route_shortcut(&input), Some(Route::Physics));

        input.end_frame();
        assert_eq!(route_shortcut(&input), None);
    }

    #[test]
    fn update_refreshes_world_matrices_after_the_stage_moves() {
        let mut router = Router::new(Route::Movement, StageOptions::default()).unwrap();
        let input = InputState::new();
        let ctx = FrameContext {
            time: 0.0,
            dt: 1.0 / 60.0,
            input: &input,
            viewport: Vec2::new(800.0, 600.0),
            pointer_captured: false,
        };

        for _ in 0..10 {
            update(&mut router, &ctx).unwrap();
        }

        let scene = router.stage().scene();
        let id = scene.get_object_by_name("Box").unwrap();
        let cached = *scene.get_object_transform(id).unwrap().get_world_matrix();
        assert!(cached.abs_diff_eq(scene.world_matrix(id).unwrap(), 1e-5));
    }
}
