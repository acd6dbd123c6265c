mod frontier;
mod orchestrator;
mod policy;
mod progress;
mod validate;

pub use frontier::{Frontier, FrontierItem};
pub use orchestrator::{Orchestrator, StopHandle};
pub use policy::LinkPolicy;
pub use progress::{CallbackSink, ChannelSink, NullSink, ProgressSink, SessionEvent};
pub use validate::{Target, is_valid_domain};
