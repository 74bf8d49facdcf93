//! The build pipeline's steps, in execution order.

mod create_server;
mod create_ssh_key;
mod create_template;
mod provision;
mod stop_server;

pub use create_server::StepCreateServer;
pub use create_ssh_key::StepCreateSshKey;
pub use create_template::StepCreateTemplate;
pub use provision::StepProvision;
pub use stop_server::StepStopServer;
