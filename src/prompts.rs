// ABOUTME: Externalized prompt template store with content-hash provenance
// ABOUTME: Loads named templates from mounted YAML and renders them per request
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Insight Agent

//! # Prompt Resolver
//!
//! Prompt templates are human-editable and externally supplied (a mounted
//! YAML file mapping prompt name to template text). The library is loaded
//! once at process start; a deployment-triggered restart picks up content
//! changes. Each template's content hash is recomputed from the bytes at
//! load time (never hardcoded) and exposed verbatim as response provenance
//! so callers can tell exactly which prompt version produced a result.

use crate::errors::{AppError, AppResult};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::info;

/// Placeholder substituted with the compacted ledger JSON at render time
const TRANSACTIONS_PLACEHOLDER: &str = "{transactions}";

/// Length of the truncated hex content hash used in provenance tags
const CONTENT_HASH_LEN: usize = 8;

/// A named prompt template plus the content hash of its text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptSpec {
    /// Template name (e.g. "budget_coach")
    pub name: String,
    /// Raw template text containing the `{transactions}` placeholder
    pub template: String,
    /// Truncated hex sha-256 of the template bytes
    pub content_hash: String,
}

impl PromptSpec {
    /// Build a spec, computing the content hash from the template bytes
    #[must_use]
    pub fn new(name: impl Into<String>, template: impl Into<String>) -> Self {
        let template = template.into();
        let digest = Sha256::digest(template.as_bytes());
        let mut content_hash = hex::encode(digest);
        content_hash.truncate(CONTENT_HASH_LEN);

        Self {
            name: name.into(),
            template,
            content_hash,
        }
    }

    /// Resolve the template against a compacted ledger rendering
    #[must_use]
    pub fn render(&self, transactions_json: &str) -> String {
        self.template
            .replace(TRANSACTIONS_PLACEHOLDER, transactions_json)
    }

    /// Provenance tag in `name@hash` form, carried on success responses
    #[must_use]
    pub fn provenance(&self) -> String {
        format!("{}@{}", self.name, self.content_hash)
    }
}

/// Immutable collection of prompt templates for the process lifetime
#[derive(Debug, Clone, Default)]
pub struct PromptLibrary {
    prompts: HashMap<String, PromptSpec>,
}

impl PromptLibrary {
    /// Load the template store from a YAML file mapping name to template text
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the file cannot be read, is not a
    /// YAML string map, or contains no templates.
    pub fn load(path: &Path) -> AppResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AppError::config(format!(
                "cannot read prompt templates from {}: {e}",
                path.display()
            ))
        })?;

        let templates: BTreeMap<String, String> = serde_yaml::from_str(&raw).map_err(|e| {
            AppError::config(format!(
                "prompt template file {} is not a name-to-template map: {e}",
                path.display()
            ))
        })?;

        let library = Self::from_templates(templates)?;
        info!(
            count = library.prompts.len(),
            path = %path.display(),
            "Loaded prompt templates"
        );
        Ok(library)
    }

    /// Build a library from an in-memory name-to-template map
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the map is empty.
    pub fn from_templates(templates: BTreeMap<String, String>) -> AppResult<Self> {
        if templates.is_empty() {
            return Err(AppError::config("prompt template store is empty"));
        }

        let prompts = templates
            .into_iter()
            .map(|(name, template)| {
                let spec = PromptSpec::new(name.clone(), template);
                (name, spec)
            })
            .collect();

        Ok(Self { prompts })
    }

    /// Resolve a prompt by name
    ///
    /// # Errors
    ///
    /// Returns a 400-class `PROMPT_NOT_FOUND` error for unknown names; this
    /// is fatal to the specific request and not retryable.
    pub fn resolve(&self, name: &str) -> AppResult<&PromptSpec> {
        self.prompts
            .get(name)
            .ok_or_else(|| AppError::prompt_not_found(name))
    }

    /// Number of loaded templates
    #[must_use]
    pub fn len(&self) -> usize {
        self.prompts.len()
    }

    /// Whether the library holds no templates
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.prompts.is_empty()
    }
}
