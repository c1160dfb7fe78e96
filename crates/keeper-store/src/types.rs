/// One row of the vault-versions table, as returned by `versions`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultVersion {
    pub timestamp: i64,
    pub hash: String,
}

/// One row of the public-keys table, as returned by `listActivePGP`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PgpKey {
    pub timestamp: i64,
    pub armored: String,
    pub confirmed: bool,
}

/// One row of the action-log table, as returned by `getLog`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionLogEntry {
    pub timestamp: i64,
    pub action: String,
    pub detail: Option<String>,
}
