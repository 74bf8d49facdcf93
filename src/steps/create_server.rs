//! Creates the disposable build server and tears it down afterwards.

use std::sync::Arc;

use crate::context::{
    BuildContext, SERVER_IP_KEY, SERVER_TITLE_KEY, SERVER_UUID_KEY, ServerFacts,
};
use crate::driver::{CreateServerRequest, DriverError, ResourceKind};
use crate::error::BuildError;
use crate::runner::{Step, StepAction, StepFuture};

/// Resolves the source storage, creates the server, and records its
/// identifier, title, and public address.
///
/// Cleanup stops and then deletes the server whenever an identifier was
/// recorded, including when creation timed out after the provider accepted
/// the request.
#[derive(Clone, Copy, Debug, Default)]
pub struct StepCreateServer;

impl Step for StepCreateServer {
    fn name(&self) -> &'static str {
        "create_server"
    }

    fn run<'a>(&'a self, ctx: &'a mut BuildContext) -> StepFuture<'a, StepAction> {
        Box::pin(async move {
            let Some(public_key) = ctx.ssh_keys.as_ref().map(|keys| keys.public_key.clone())
            else {
                return ctx.halt(BuildError::MissingState { fact: "ssh key pair" });
            };
            let driver = Arc::clone(&ctx.driver);
            let settings = Arc::clone(&ctx.settings);

            ctx.ui.say(&format!("Locating source storage ({})...", settings.source));
            let source = match driver.locate_source_storage(&settings.source).await {
                Ok(source) => source,
                Err(err) => return ctx.halt(err),
            };

            let request = CreateServerRequest {
                source_storage: source.uuid.clone(),
                zone: settings.zone.clone(),
                prefix: settings.template_prefix.clone(),
                login_user: settings.ssh_username.clone(),
                ssh_public_key: Some(public_key),
                storage_size: settings.storage_size,
                networking: settings.networking.clone(),
            };
            ctx.ui.say(&format!(
                "Creating server based on storage {:?} ({})...",
                source.title, source.uuid
            ));
            let server = match driver.create_server(&request).await {
                Ok(server) => server,
                Err(err) => {
                    if let Some(id) = err.stranded(ResourceKind::Server) {
                        ctx.server = Some(ServerFacts {
                            uuid: id.to_owned(),
                            title: String::new(),
                            address: None,
                        });
                    }
                    return ctx.halt(err);
                }
            };

            let address = server.public_ipv4().map(str::to_owned);
            ctx.server = Some(ServerFacts {
                uuid: server.uuid.clone(),
                title: server.title.clone(),
                address: address.clone(),
            });
            ctx.generated.insert(SERVER_UUID_KEY, server.uuid.as_str());
            ctx.generated.insert(SERVER_TITLE_KEY, server.title.as_str());

            let Some(address) = address else {
                return ctx.halt(DriverError::NotFound {
                    resource: ResourceKind::Server,
                    detail: format!("public IPv4 address of server {}", server.uuid),
                });
            };
            ctx.generated.insert(SERVER_IP_KEY, address.as_str());
            ctx.ui.message(&format!(
                "Server {} ({}) started at {address}",
                server.title, server.uuid
            ));
            StepAction::Continue
        })
    }

    fn cleanup<'a>(&'a self, ctx: &'a mut BuildContext) -> StepFuture<'a, Vec<BuildError>> {
        Box::pin(async move {
            let Some(server) = ctx.server.clone() else {
                return Vec::new();
            };
            let driver = Arc::clone(&ctx.cleanup_driver);
            let mut errors = Vec::new();

            ctx.ui.say(&format!("Stopping server {}...", server.uuid));
            if let Err(err) = driver.stop_server(&server.uuid).await {
                errors.push(BuildError::from(err));
            }

            ctx.ui.say(&format!("Deleting server {}...", server.uuid));
            match driver.delete_server(&server.uuid).await {
                Ok(()) => ctx.ui.message(&format!("Server {} deleted", server.uuid)),
                Err(err) => errors.push(BuildError::from(err)),
            }
            errors
        })
    }
}
