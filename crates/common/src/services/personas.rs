//! Persona registry operations and persona resolution

use std::time::Duration;

use tracing::{info, instrument};
use validator::Validate;

use crate::api::{CreatePersonaRequest, PersonaList, PersonaSummary};
use crate::config::{AppConfig, PersonaConfig};
use crate::errors::{AppError, Result};
use crate::models::{validate_persona_id, Persona};
use crate::store::Stores;

use super::bounded_store;

#[derive(Clone)]
pub struct PersonaService {
    stores: Stores,
    config: PersonaConfig,
    store_timeout: Duration,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl PersonaService {
    pub fn new(config: &AppConfig, stores: Stores) -> Self {
        Self {
            stores,
            config: config.persona.clone(),
            store_timeout: config.store_timeout(),
        }
    }

    pub fn default_id(&self) -> &str {
        &self.config.default_id
    }

    fn default_persona(&self) -> Persona {
        Persona::new(self.config.default_id.clone()).with_profile(
            non_blank(self.config.default_display_name.clone()),
            non_blank(self.config.default_profile.clone()),
        )
    }

    /// Resolve a request's persona. `None` means the default persona, which
    /// always resolves; any other id must be registered.
    pub async fn resolve(&self, persona_id: Option<&str>) -> Result<Persona> {
        let id = persona_id.unwrap_or(&self.config.default_id);
        validate_persona_id(id)?;

        let found = bounded_store(self.store_timeout, self.stores.personas.get(id)).await?;
        match found {
            Some(persona) => Ok(persona),
            None if id == self.config.default_id => Ok(self.default_persona()),
            None => Err(AppError::PersonaNotFound { id: id.to_string() }),
        }
    }

    /// Register the default persona unless it already exists
    pub async fn ensure_default(&self) -> Result<Persona> {
        let persona = self.default_persona();
        match bounded_store(self.store_timeout, self.stores.personas.create(&persona)).await {
            Ok(created) => {
                info!(persona_id = %created.id, "Default persona registered");
                Ok(created)
            }
            Err(AppError::DuplicatePersona { .. }) => self.resolve(None).await,
            Err(e) => Err(e),
        }
    }

    async fn summarize(&self, persona: Persona) -> Result<PersonaSummary> {
        let chunks = bounded_store(self.store_timeout, self.stores.vectors.count_by_persona(&persona.id)).await?;
        Ok(PersonaSummary { persona, chunks })
    }

    #[instrument(skip(self, request), fields(persona_id = %request.persona_id))]
    pub async fn create(&self, request: CreatePersonaRequest) -> Result<PersonaSummary> {
        request.validate()?;
        let id = request.persona_id.trim().to_string();
        validate_persona_id(&id)?;

        let persona = Persona::new(id).with_profile(non_blank(request.display_name), non_blank(request.profile));
        let created = bounded_store(self.store_timeout, self.stores.personas.create(&persona)).await?;

        info!(persona_id = %created.id, "Persona created");
        self.summarize(created).await
    }

    pub async fn get(&self, id: &str) -> Result<PersonaSummary> {
        validate_persona_id(id)?;
        let persona = bounded_store(self.store_timeout, self.stores.personas.get(id))
            .await?
            .ok_or_else(|| AppError::PersonaNotFound { id: id.to_string() })?;
        self.summarize(persona).await
    }

    pub async fn list(&self) -> Result<PersonaList> {
        let personas = bounded_store(self.store_timeout, self.stores.personas.list()).await?;

        let mut summaries = Vec::with_capacity(personas.len());
        for persona in personas {
            summaries.push(self.summarize(persona).await?);
        }
        summaries.sort_by(|a, b| a.persona.id.cmp(&b.persona.id));

        Ok(PersonaList { personas: summaries })
    }

    /// Delete a persona, then every chunk stored for it
    #[instrument(skip(self))]
    pub async fn delete(&self, id: &str) -> Result<()> {
        validate_persona_id(id)?;

        let removed = bounded_store(self.store_timeout, self.stores.personas.delete(id)).await?;
        if !removed {
            return Err(AppError::PersonaNotFound { id: id.to_string() });
        }

        let chunks = bounded_store(self.store_timeout, self.stores.vectors.delete_persona_chunks(id)).await?;
        info!(persona_id = id, chunks_removed = chunks, "Persona deleted");
        Ok(())
    }
}
