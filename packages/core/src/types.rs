use serde::{Deserialize, Serialize};

/// Numeric tenant identifier, matching the `tenant_id` column applied by the
/// row-level isolation predicate.
pub type TenantId = i64;

/// Platform role hierarchy.
///
/// `SuperAdmin` is the only role that bypasses tenant isolation; everything
/// else is scoped to the tenant it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    SuperAdmin,
    TenantAdmin,
    Editor,
    Viewer,
}

impl Role {
    /// Stable string value used in tokens and persisted records.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Role::SuperAdmin => "SUPER_ADMIN",
            Role::TenantAdmin => "TENANT_ADMIN",
            Role::Editor => "EDITOR",
            Role::Viewer => "VIEWER",
        }
    }

    /// Parse the stable string value. Unknown strings map to `None`.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "SUPER_ADMIN" => Some(Role::SuperAdmin),
            "TENANT_ADMIN" => Some(Role::TenantAdmin),
            "EDITOR" => Some(Role::Editor),
            "VIEWER" => Some(Role::Viewer),
            _ => None,
        }
    }
}

/// Lifecycle status of a tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TenantStatus {
    Active,
    Disabled,
    Pending,
}

/// Authenticated principal consumed by the isolation guard and the audit
/// pipeline. The authentication subsystem is the authoritative source; the
/// core only reads it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: i64,
    pub username: String,
    pub role: Role,
    pub tenant_id: TenantId,
    pub tenant_code: String,
}

/// Discriminator strategy for rate-limit keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitStrategy {
    /// Key on the client IP (default).
    PerIp,
    /// Key on the authenticated subject.
    PerUser,
    /// One shared bucket for the operation regardless of caller.
    Global,
}

/// Outcome of an audited invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditStatus {
    Success,
    Failure,
}

impl AuditStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            AuditStatus::Success => "SUCCESS",
            AuditStatus::Failure => "FAILURE",
        }
    }
}

/// Catalog of security-relevant actions recorded by the audit pipeline.
///
/// Values are stable strings; persisted records carry the string form so the
/// catalog can grow without migrating stored data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    AuthLogin,
    AuthRefresh,
    UserCreate,
    UserUpdate,
    UserDelete,
    UserPasswordUpdate,
    TenantCreate,
    TenantUpdate,
    TenantDelete,
    TenantConfigUpdate,
    ArticleCreate,
    ArticleUpdate,
    ArticleDelete,
    CategoryCreate,
    CategoryUpdate,
    CategoryDelete,
    TagCreate,
    TagUpdate,
    TagDelete,
    CommentCreate,
    CommentDelete,
    FileUpload,
    FileDelete,
}

impl AuditAction {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            AuditAction::AuthLogin => "AUTH_LOGIN",
            AuditAction::AuthRefresh => "AUTH_REFRESH",
            AuditAction::UserCreate => "USER_CREATE",
            AuditAction::UserUpdate => "USER_UPDATE",
            AuditAction::UserDelete => "USER_DELETE",
            AuditAction::UserPasswordUpdate => "USER_PASSWORD_UPDATE",
            AuditAction::TenantCreate => "TENANT_CREATE",
            AuditAction::TenantUpdate => "TENANT_UPDATE",
            AuditAction::TenantDelete => "TENANT_DELETE",
            AuditAction::TenantConfigUpdate => "TENANT_CONFIG_UPDATE",
            AuditAction::ArticleCreate => "ARTICLE_CREATE",
            AuditAction::ArticleUpdate => "ARTICLE_UPDATE",
            AuditAction::ArticleDelete => "ARTICLE_DELETE",
            AuditAction::CategoryCreate => "CATEGORY_CREATE",
            AuditAction::CategoryUpdate => "CATEGORY_UPDATE",
            AuditAction::CategoryDelete => "CATEGORY_DELETE",
            AuditAction::TagCreate => "TAG_CREATE",
            AuditAction::TagUpdate => "TAG_UPDATE",
            AuditAction::TagDelete => "TAG_DELETE",
            AuditAction::CommentCreate => "COMMENT_CREATE",
            AuditAction::CommentDelete => "COMMENT_DELETE",
            AuditAction::FileUpload => "FILE_UPLOAD",
            AuditAction::FileDelete => "FILE_DELETE",
        }
    }
}
