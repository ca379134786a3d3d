pub mod counters;
pub mod skew;
pub mod topology;

use crate::component::Component;
use crate::screen::ScreenId;

pub fn create_screens() -> Vec<(ScreenId, Box<dyn Component>)> {
    vec![
        (ScreenId::Topology, Box::new(topology::TopologyScreen::new())),
        (ScreenId::Counters, Box::new(counters::CountersScreen::new())),
        (ScreenId::Skew, Box::new(skew::SkewScreen::new())),
    ]
}
