//! Screen implementations. Each screen is a top-level Component.

pub mod cameras;
pub mod detail;

use crate::component::Component;
use crate::screen::ScreenId;

pub fn create_screens() -> Vec<(ScreenId, Box<dyn Component>)> {
    vec![
        (ScreenId::Cameras, Box::new(cameras::CamerasScreen::new())),
        (ScreenId::Detail, Box::new(detail::DetailScreen::new())),
    ]
}
