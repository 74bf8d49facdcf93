//! Turns the build server's disk into templates, optionally across zones.

use std::sync::Arc;

use chrono::Utc;

use crate::context::BuildContext;
use crate::driver::ResourceKind;
use crate::error::BuildError;
use crate::naming::{clone_title, timestamped_title_at};
use crate::runner::{Step, StepAction, StepFuture};

/// Clones the boot disk into every extra zone, then templatizes the
/// original disk and each clone.
///
/// Clone identifiers are recorded as soon as each clone exists so cleanup
/// can delete them even when a later clone or templatize call fails.
/// Cleanup always deletes the clones. Templates are deleted only when the
/// build halted, since no artifact will ever name them.
#[derive(Clone, Copy, Debug, Default)]
pub struct StepCreateTemplate;

impl Step for StepCreateTemplate {
    fn name(&self) -> &'static str {
        "create_template"
    }

    fn run<'a>(&'a self, ctx: &'a mut BuildContext) -> StepFuture<'a, StepAction> {
        Box::pin(async move {
            let Some(server_id) = ctx.server.as_ref().map(|server| server.uuid.clone()) else {
                return ctx.halt(BuildError::MissingState { fact: "server id" });
            };
            let driver = Arc::clone(&ctx.driver);
            let settings = Arc::clone(&ctx.settings);

            ctx.ui.say("Creating template...");
            let disk = match driver.boot_disk(&server_id).await {
                Ok(disk) => disk,
                Err(err) => return ctx.halt(err),
            };

            let now = Utc::now();
            let clone_name = clone_title(&settings.template_prefix, now);
            let template_name = timestamped_title_at(&settings.template_prefix, now);

            let mut sources = vec![disk.uuid.clone()];
            for zone in &settings.clone_zones {
                ctx.ui
                    .message(&format!("Cloning disk {} to zone {zone}...", disk.uuid));
                match driver.clone_storage(&disk.uuid, zone, &clone_name).await {
                    Ok(clone) => {
                        ctx.clone_storage_ids.push(clone.uuid.clone());
                        sources.push(clone.uuid);
                    }
                    Err(err) => {
                        if let Some(id) = err.stranded(ResourceKind::Storage) {
                            ctx.clone_storage_ids.push(id.to_owned());
                        }
                        return ctx.halt(err);
                    }
                }
            }

            for source in &sources {
                ctx.ui
                    .message(&format!("Templatizing storage {source} as {template_name:?}..."));
                match driver.templatize(source, &template_name).await {
                    Ok(template) => {
                        ctx.ui.message(&format!(
                            "Template {} created in zone {}",
                            template.uuid, template.zone
                        ));
                        ctx.templates.push(template);
                    }
                    Err(err) => {
                        if let Some(id) = err.stranded(ResourceKind::Template) {
                            ctx.stranded_template_ids.push(id.to_owned());
                        }
                        return ctx.halt(err);
                    }
                }
            }
            StepAction::Continue
        })
    }

    fn cleanup<'a>(&'a self, ctx: &'a mut BuildContext) -> StepFuture<'a, Vec<BuildError>> {
        Box::pin(async move {
            let driver = Arc::clone(&ctx.cleanup_driver);
            let mut errors = Vec::new();

            for id in ctx.clone_storage_ids.clone() {
                ctx.ui.message(&format!("Deleting clone storage {id}..."));
                if let Err(err) = driver.delete_template(&id).await {
                    errors.push(BuildError::from(err));
                }
            }

            if !ctx.halted() {
                return errors;
            }
            let partial: Vec<String> = ctx
                .templates
                .iter()
                .map(|template| template.uuid.clone())
                .chain(ctx.stranded_template_ids.iter().cloned())
                .collect();
            for id in partial {
                ctx.ui.message(&format!("Deleting template {id}..."));
                if let Err(err) = driver.delete_template(&id).await {
                    errors.push(BuildError::from(err));
                }
            }
            errors
        })
    }
}
