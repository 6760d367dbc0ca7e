pub mod attack;
pub mod detection_point;
pub mod event;
pub mod response;
pub mod rule;

pub use attack::{Attack, AttackTrigger};
pub use detection_point::{DetectionPoint, Interval, IntervalUnit, Threshold};
pub use event::{DetectionSystem, Event, Resource, User};
pub use response::{Response, ResponseSource, ResponseTemplate};
pub use rule::{Clause, Expression, MonitorPoint, Notification, Rule};
