use std::path::PathBuf;

use clap::{ArgAction, Parser};

use crate::stages::{Route, StageOptions};

pub const ASSETS_ENV_VAR: &str = "VR_PLAYGROUND_ASSETS";

/// Desktop stand-in for a WebXR playground: five stages behind a router.
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "vr-playground", version)]
pub struct AppConfig {
    /// Window title
    #[arg(long, default_value = "VR Playground")]
    pub title: String,

    /// Stage to mount first, by path (e.g. /Classroom)
    #[arg(long, default_value = "/")]
    pub route: Route,

    /// Directory holding models and shaders
    #[arg(long = "assets", env = ASSETS_ENV_VAR, default_value = "assets")]
    pub assets_root: PathBuf,

    /// Present without waiting for vblank
    #[arg(long = "no-vsync", action = ArgAction::SetFalse)]
    pub vsync: bool,

    /// Leave the two controllers unbound instead of driving them from mouse and keyboard
    #[arg(long = "no-controllers", action = ArgAction::SetFalse)]
    pub emulate_controllers: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            title: "VR Playground".to_string(),
            route: Route::Home,
            assets_root: PathBuf::from("assets"),
            vsync: true,
            emulate_controllers: true,
        }
    }
}

impl AppConfig {
    pub fn stage_options(&self) -> StageOptions {
        StageOptions {
            assets_root: self.assets_root.clone(),
            emulate_controllers: self.emulate_controllers,
        }
    }

    pub fn shader_dir(&self) -> PathBuf {
        self.assets_root.join("shaders")
    }
}
