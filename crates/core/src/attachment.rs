//! Attachment kinds and their remote table layouts.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of binary attachment collected by ODK for an organization.
///
/// Each kind has an identical sync shape and differs only in where its
/// blobs live remotely and where they land locally.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
    /// Scanned documents and other files.
    Document,
    /// Field photos.
    Photo,
    /// Signature captures.
    Signature,
}

/// Remote table names for one kind, relative to a table-name prefix.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RemoteLayout {
    /// Owner table; its `owner_key` column holds the organization URI.
    pub owner: &'static str,
    /// Column of the owner table matched against the organization URI.
    /// The submission's top-level `_CORE` table is keyed by `_URI`; repeat
    /// groups point back to it through `_TOP_LEVEL_AURI`.
    pub owner_key: &'static str,
    /// Binary-node metadata table (file path, content type, creation date).
    pub binary_node: &'static str,
    /// Binary-value table holding the blob in `VALUE`.
    pub binary_value: &'static str,
}

impl RemoteLayout {
    /// Fully qualified table names for the given prefix.
    pub fn tables(&self, prefix: &str) -> [String; 3] {
        [
            format!("{prefix}_{}", self.owner),
            format!("{prefix}_{}", self.binary_node),
            format!("{prefix}_{}", self.binary_value),
        ]
    }
}

impl AttachmentKind {
    /// All kinds, in the order a full sync processes them.
    pub const ALL: [AttachmentKind; 3] = [Self::Document, Self::Photo, Self::Signature];

    /// Stable lowercase identifier used in routes, config and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Document => "document",
            Self::Photo => "photo",
            Self::Signature => "signature",
        }
    }

    /// Short label used when synthesizing local file names.
    pub fn file_label(&self) -> &'static str {
        match self {
            Self::Document => "arquivo",
            Self::Photo => "foto",
            Self::Signature => "assinatura",
        }
    }

    /// Extension used when the remote side gives no usable content type.
    pub fn default_extension(&self) -> &'static str {
        match self {
            Self::Document => "bin",
            Self::Photo => "jpg",
            Self::Signature => "png",
        }
    }

    /// Remote ODK table layout.
    pub fn remote_layout(&self) -> RemoteLayout {
        match self {
            Self::Document => RemoteLayout {
                owner: "ARQUIVOS",
                owner_key: "_TOP_LEVEL_AURI",
                binary_node: "ARQUIVOS_ARQUIVO_BN",
                binary_value: "ARQUIVOS_ARQUIVO_BLB",
            },
            Self::Photo => RemoteLayout {
                owner: "FOTOS",
                owner_key: "_TOP_LEVEL_AURI",
                binary_node: "FOTOS_FOTO_BN",
                binary_value: "FOTOS_FOTO_BLB",
            },
            Self::Signature => RemoteLayout {
                owner: "CORE",
                owner_key: "_URI",
                binary_node: "CORE_ASSINATURA_BN",
                binary_value: "CORE_ASSINATURA_BLB",
            },
        }
    }

    /// Local table holding attachment records of this kind.
    pub fn local_table(&self) -> &'static str {
        match self {
            Self::Document => "organization_documents",
            Self::Photo => "organization_photos",
            Self::Signature => "organization_signatures",
        }
    }
}

impl fmt::Display for AttachmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttachmentKind {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Portuguese aliases match the labels the legacy UI sends.
        match s.to_ascii_lowercase().as_str() {
            "document" | "documents" | "arquivo" | "arquivos" => Ok(Self::Document),
            "photo" | "photos" | "foto" | "fotos" => Ok(Self::Photo),
            "signature" | "signatures" | "assinatura" | "assinaturas" => Ok(Self::Signature),
            other => Err(crate::Error::UnknownAttachmentKind(other.to_string())),
        }
    }
}

/// Check that a SQL identifier fragment is safe to quote and embed.
///
/// Only ASCII alphanumerics and underscores are accepted.
pub fn validate_identifier(value: &str) -> crate::Result<()> {
    if value.is_empty() {
        return Err(crate::Error::InvalidIdentifier("empty identifier".to_string()));
    }
    if !value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(crate::Error::InvalidIdentifier(value.to_string()));
    }
    Ok(())
}
