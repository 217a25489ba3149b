//! Audit operation declarations.
//!
//! Each audited operation is described by a const [`AuditSpec`] registered in
//! this file, so the full set of audited actions is readable in one place.
//! Call sites pass a [`CapturedArgs`] built from an explicit allow-list of
//! fields; nothing is captured by reflection, so connection handles, streams,
//! and other infrastructure values can never leak into a record.

use quill_core::{AuditAction, SanitizeLimits};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

const DEFAULT_LIMITS: SanitizeLimits = SanitizeLimits {
    max_field_length: 500,
    max_collection_size: 10,
};

/// Declarative description of one audited operation.
#[derive(Debug, Clone, Copy)]
pub struct AuditSpec {
    pub action: AuditAction,
    /// Message template; `{name}` placeholders are filled from captured args.
    pub message: &'static str,
    /// Persist the sanitized captured arguments with the record.
    pub capture_args: bool,
    /// Persist the sanitized operation result with the record.
    pub capture_result: bool,
    /// Bounds applied when sanitizing args and result.
    pub limits: SanitizeLimits,
}

// ---------------------------------------------------------------------------
// Registered operations
// ---------------------------------------------------------------------------

pub const LOGIN: AuditSpec = AuditSpec {
    action: AuditAction::AuthLogin,
    message: "user {username} logged in",
    capture_args: true,
    capture_result: false,
    limits: DEFAULT_LIMITS,
};

pub const PASSWORD_UPDATE: AuditSpec = AuditSpec {
    action: AuditAction::UserPasswordUpdate,
    message: "user {username} changed password",
    capture_args: true,
    capture_result: false,
    limits: DEFAULT_LIMITS,
};

pub const ARTICLE_CREATE: AuditSpec = AuditSpec {
    action: AuditAction::ArticleCreate,
    message: "article {title} created",
    capture_args: true,
    capture_result: true,
    limits: DEFAULT_LIMITS,
};

pub const ARTICLE_DELETE: AuditSpec = AuditSpec {
    action: AuditAction::ArticleDelete,
    message: "article {id} deleted",
    capture_args: true,
    capture_result: false,
    limits: DEFAULT_LIMITS,
};

pub const FILE_UPLOAD: AuditSpec = AuditSpec {
    action: AuditAction::FileUpload,
    message: "file {filename} uploaded",
    capture_args: true,
    capture_result: true,
    limits: DEFAULT_LIMITS,
};

pub const TENANT_CONFIG_UPDATE: AuditSpec = AuditSpec {
    action: AuditAction::TenantConfigUpdate,
    message: "tenant configuration updated",
    capture_args: true,
    capture_result: false,
    limits: DEFAULT_LIMITS,
};

// ---------------------------------------------------------------------------
// Captured arguments
// ---------------------------------------------------------------------------

/// Allow-listed fields captured at the call site, before the operation runs.
#[derive(Debug, Clone, Default)]
pub struct CapturedArgs {
    fields: Map<String, Value>,
}

impl CapturedArgs {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one named field. A value that fails to serialize is skipped; the
    /// rest of the capture proceeds.
    #[must_use]
    pub fn field<T: Serialize>(mut self, name: &str, value: &T) -> Self {
        match serde_json::to_value(value) {
            Ok(value) => {
                self.fields.insert(name.to_string(), value);
            }
            Err(err) => {
                debug!(field = name, error = %err, "audit field not serializable, skipped");
            }
        }
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Captured fields as one JSON object.
    #[must_use]
    pub fn into_value(self) -> Value {
        Value::Object(self.fields)
    }

    /// Fill `{name}` placeholders in `template` from the captured fields.
    /// Placeholders with no matching field are left in place. Strings are
    /// substituted bare; other values in their JSON form.
    #[must_use]
    pub fn render(&self, template: &str) -> String {
        let mut message = template.to_string();
        for (name, value) in &self.fields {
            let placeholder = format!("{{{name}}}");
            if !message.contains(&placeholder) {
                continue;
            }
            let rendered = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            message = message.replace(&placeholder, &rendered);
        }
        message
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
