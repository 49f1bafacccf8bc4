//! Sync result shapes returned to callers.
//!
//! Field names follow the JSON contract consumed by the PINOVARA admin UI.

use crate::attachment::AttachmentKind;
use serde::{Deserialize, Serialize};

/// Outcome of a single remote attachment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    /// A file with the derived name was already present locally.
    Existente,
    /// The blob was written and indexed.
    Baixada,
    /// Writing or indexing failed; the batch continued.
    Erro,
}

/// Per-attachment detail line.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncItem {
    /// Remote unique identifier of the blob.
    pub uri: String,
    pub status: ItemStatus,
    pub nome_arquivo: String,
    pub mensagem: String,
}

/// Result of one sync invocation for one organization and kind.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    pub success: bool,
    pub tipo: AttachmentKind,
    pub total_odk: u32,
    pub ja_existentes: u32,
    pub baixadas: u32,
    pub erros: u32,
    /// Existing files whose content differs from the remote blob.
    /// Only populated when content mismatch detection is enabled.
    pub divergentes: u32,
    pub detalhes: Vec<SyncItem>,
    pub mensagem: String,
}

impl SyncReport {
    /// An empty successful report.
    pub fn new(kind: AttachmentKind) -> Self {
        Self {
            success: true,
            tipo: kind,
            total_odk: 0,
            ja_existentes: 0,
            baixadas: 0,
            erros: 0,
            divergentes: 0,
            detalhes: Vec::new(),
            mensagem: String::new(),
        }
    }

    /// A fatal-failure report with zero counts.
    pub fn failure(kind: AttachmentKind, mensagem: impl Into<String>) -> Self {
        Self {
            success: false,
            mensagem: mensagem.into(),
            ..Self::new(kind)
        }
    }

    /// Record one item and bump the matching counter.
    pub fn push(&mut self, item: SyncItem) {
        match item.status {
            ItemStatus::Existente => self.ja_existentes += 1,
            ItemStatus::Baixada => self.baixadas += 1,
            ItemStatus::Erro => self.erros += 1,
        }
        self.detalhes.push(item);
    }

    /// Fill `mensagem` with the end-of-run summary.
    pub fn summarize(&mut self) {
        let mut msg = format!(
            "Sincronização de {} concluída: {} no ODK, {} já existentes, {} baixadas, {} erros",
            self.tipo.file_label(),
            self.total_odk,
            self.ja_existentes,
            self.baixadas,
            self.erros
        );
        if self.divergentes > 0 {
            msg.push_str(&format!(
                " ({} com conteúdo divergente)",
                self.divergentes
            ));
        }
        self.mensagem = msg;
    }
}
