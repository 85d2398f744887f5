/// Desired emulated viewport for a target, applied during target
/// initialization (see `EmulationManager::init_commands`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: i64,
    pub height: i64,
    pub device_scale_factor: Option<f64>,
    pub is_mobile: bool,
    pub is_landscape: bool,
    pub has_touch: bool,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            device_scale_factor: None,
            is_mobile: false,
            is_landscape: false,
            has_touch: false,
        }
    }
}
