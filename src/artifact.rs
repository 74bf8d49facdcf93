//! The result of a successful build.

use std::fmt;
use std::sync::Arc;

use crate::context::GeneratedData;
use crate::driver::{Driver, DriverError, Storage};
use crate::ui::Ui;

/// Identifier of the builder that produced an artifact.
pub const BUILDER_ID: &str = "kiln.upcloud";

/// Templates produced by a completed build.
pub struct Artifact {
    templates: Vec<Storage>,
    generated: GeneratedData,
    driver: Arc<dyn Driver>,
}

impl Artifact {
    /// Wraps the templates of a completed build.
    #[must_use]
    pub fn new(templates: Vec<Storage>, generated: GeneratedData, driver: Arc<dyn Driver>) -> Self {
        Self {
            templates,
            generated,
            driver,
        }
    }

    /// Returns [`BUILDER_ID`].
    #[must_use]
    pub const fn builder_id(&self) -> &'static str {
        BUILDER_ID
    }

    /// Comma-joined template identifiers.
    #[must_use]
    pub fn id(&self) -> String {
        self.templates
            .iter()
            .map(|template| template.uuid.as_str())
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Produced templates in creation order.
    #[must_use]
    pub fn templates(&self) -> &[Storage] {
        &self.templates
    }

    /// Looks up a generated value such as `ServerUUID`.
    #[must_use]
    pub fn state(&self, key: &str) -> Option<&str> {
        self.generated.get(key)
    }

    /// Generated key/value outputs.
    #[must_use]
    pub const fn generated(&self) -> &GeneratedData {
        &self.generated
    }

    /// Deletes every template in order, stopping at the first failure.
    ///
    /// # Errors
    ///
    /// Returns the [`DriverError`] of the first template that could not be
    /// deleted; templates after it are left untouched.
    pub async fn destroy(&self, ui: &dyn Ui) -> Result<(), DriverError> {
        for template in &self.templates {
            ui.say(&format!(
                "Deleting template {:?} ({})...",
                template.title, template.uuid
            ));
            self.driver.delete_template(&template.uuid).await?;
        }
        Ok(())
    }
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Storage template created, UUID: {}", self.id())
    }
}

impl fmt::Debug for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Artifact")
            .field("templates", &self.templates)
            .field("generated", &self.generated)
            .finish_non_exhaustive()
    }
}
