//! SSH key generation and remote provisioning through the system OpenSSH
//! tools.

mod command;
mod keygen;
mod provision;

pub use command::{CommandError, CommandOutput, CommandRunner, ProcessCommandRunner};
pub use keygen::{KeyError, KeyFuture, KeyGenerator, SshKeyPair, SshKeygen, write_private_key};
pub use provision::{
    DEFAULT_PROBE_INTERVAL, ProvisionError, ProvisionFuture, ProvisionTarget, Provisioner,
    SshProvisioner, wait_for_port,
};
