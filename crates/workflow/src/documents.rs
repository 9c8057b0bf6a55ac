//! Document assembly and the filesystem document store.

use std::path::PathBuf;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::ports::{
    AssembledDocument, DocumentAssembler, DocumentStore, Folder, ServiceError, StoredDocument,
    TemplateField,
};

const ASSEMBLER: &str = "document assembly";
const STORE: &str = "document store";

/// Replaces `{{key}}` placeholders with field values. Placeholders without a
/// matching field are left as written.
#[derive(Debug, Clone, Default)]
pub struct TemplateAssembler;

impl TemplateAssembler {
    pub fn render(template: &str, fields: &[TemplateField]) -> String {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;
        while let Some(start) = rest.find("{{") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let Some(end) = after.find("}}") else {
                out.push_str(&rest[start..]);
                return out;
            };
            let key = after[..end].trim();
            match fields.iter().find(|f| f.key == key) {
                Some(field) => out.push_str(&field.value),
                None => out.push_str(&rest[start..start + 2 + end + 2]),
            }
            rest = &after[end + 2..];
        }
        out.push_str(rest);
        out
    }
}

impl DocumentAssembler for TemplateAssembler {
    fn assemble(
        &self,
        template: &str,
        fields: &[TemplateField],
    ) -> Result<AssembledDocument, ServiceError> {
        if template.trim().is_empty() {
            return Err(ServiceError::new(ASSEMBLER, "template is empty"));
        }
        Ok(AssembledDocument {
            bytes: Self::render(template, fields).into_bytes(),
            extension: "txt".to_string(),
        })
    }
}

/// File id embedded in a stored document location
/// (`documents/d/<file_id>/<file_name>`).
pub fn file_id_from_location(location: &str) -> Option<&str> {
    let (_, rest) = location.split_once("/d/")?;
    rest.split('/').next().filter(|id| !id.is_empty())
}

/// Stores documents as `<root>/<folder>/<file_id>/<file_name>`.
#[derive(Debug, Clone)]
pub struct FsDocumentStore {
    root: PathBuf,
}

impl FsDocumentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FsDocumentStore { root: root.into() }
    }

    /// Folder currently holding `file_id`, if any.
    pub async fn locate(&self, file_id: &str) -> Option<Folder> {
        for folder in [Folder::Pending, Folder::Approved, Folder::Rejected] {
            if tokio::fs::try_exists(self.entry_dir(folder, file_id))
                .await
                .unwrap_or(false)
            {
                return Some(folder);
            }
        }
        None
    }

    fn entry_dir(&self, folder: Folder, file_id: &str) -> PathBuf {
        self.root.join(folder.dir_name()).join(file_id)
    }
}

fn safe_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '_',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "document".to_string()
    } else {
        cleaned.to_string()
    }
}

fn io_error(action: &str, e: std::io::Error) -> ServiceError {
    ServiceError::new(STORE, format!("{}: {}", action, e))
}

#[async_trait]
impl DocumentStore for FsDocumentStore {
    async fn upload(
        &self,
        bytes: Vec<u8>,
        file_name: &str,
    ) -> Result<StoredDocument, ServiceError> {
        let file_id = uuid::Uuid::new_v4().simple().to_string();
        let file_name = safe_file_name(file_name);
        let dir = self.entry_dir(Folder::Pending, &file_id);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| io_error("create directory", e))?;
        let checksum = format!("{:x}", Sha256::digest(&bytes));
        tokio::fs::write(dir.join(&file_name), &bytes)
            .await
            .map_err(|e| io_error("write document", e))?;
        debug!(%file_id, %file_name, size = bytes.len(), "document stored");
        Ok(StoredDocument {
            location: format!("documents/d/{}/{}", file_id, file_name),
            file_id,
            checksum,
        })
    }

    async fn move_to_folder(&self, file_id: &str, folder: Folder) -> Result<(), ServiceError> {
        if file_id.contains(['/', '\\']) || file_id.starts_with('.') {
            return Err(ServiceError::new(STORE, format!("invalid file id '{}'", file_id)));
        }
        let current = self
            .locate(file_id)
            .await
            .ok_or_else(|| ServiceError::new(STORE, format!("document {} not found", file_id)))?;
        if current == folder {
            return Ok(());
        }
        let target_parent = self.root.join(folder.dir_name());
        tokio::fs::create_dir_all(&target_parent)
            .await
            .map_err(|e| io_error("create directory", e))?;
        tokio::fs::rename(self.entry_dir(current, file_id), target_parent.join(file_id))
            .await
            .map_err(|e| io_error("move document", e))?;
        debug!(%file_id, from = current.dir_name(), to = folder.dir_name(), "document moved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(key: &str, value: &str) -> TemplateField {
        TemplateField {
            key: key.to_string(),
            value: value.to_string(),
        }
    }

    #[test]
    fn render_substitutes_known_fields() {
        let out = TemplateAssembler::render(
            "Entity: {{ entidad }} / Rep: {{rep}} / {{missing}}",
            &[field("entidad", "ACME"), field("rep", "Ana")],
        );
        assert_eq!(out, "Entity: ACME / Rep: Ana / {{missing}}");
    }

    #[test]
    fn render_keeps_unterminated_placeholder() {
        assert_eq!(
            TemplateAssembler::render("a {{b", &[field("b", "x")]),
            "a {{b"
        );
    }

    #[test]
    fn empty_template_is_rejected() {
        let err = TemplateAssembler.assemble("  \n", &[]).unwrap_err();
        assert_eq!(err.service, "document assembly");
    }

    #[test]
    fn file_id_extraction() {
        assert_eq!(
            file_id_from_location("documents/d/abc123/Convenio_x.txt"),
            Some("abc123")
        );
        assert_eq!(file_id_from_location("https://drive/file/d/xyz/view"), Some("xyz"));
        assert_eq!(file_id_from_location("no-marker"), None);
        assert_eq!(file_id_from_location("documents/d/"), None);
    }

    #[test]
    fn file_names_cannot_escape_the_entry_dir() {
        assert_eq!(safe_file_name("../../etc/passwd"), "_.._etc_passwd");
        assert_eq!(safe_file_name(".."), "document");
    }

    #[tokio::test]
    async fn upload_then_move_between_folders() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsDocumentStore::new(dir.path());

        let stored = store
            .upload(b"hello".to_vec(), "Convenio_Test_2025-01-01.txt")
            .await
            .unwrap();
        assert_eq!(file_id_from_location(&stored.location), Some(stored.file_id.as_str()));
        assert_eq!(
            stored.checksum,
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
        assert_eq!(store.locate(&stored.file_id).await, Some(Folder::Pending));

        store
            .move_to_folder(&stored.file_id, Folder::Approved)
            .await
            .unwrap();
        assert_eq!(store.locate(&stored.file_id).await, Some(Folder::Approved));
        let moved = dir
            .path()
            .join("approved")
            .join(&stored.file_id)
            .join("Convenio_Test_2025-01-01.txt");
        assert_eq!(std::fs::read(moved).unwrap(), b"hello");

        // Moving to the current folder is a no-op.
        store
            .move_to_folder(&stored.file_id, Folder::Approved)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn moving_unknown_document_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsDocumentStore::new(dir.path());
        let err = store
            .move_to_folder("missing", Folder::Rejected)
            .await
            .unwrap_err();
        assert!(err.message.contains("not found"));
        assert!(store.move_to_folder("../x", Folder::Rejected).await.is_err());
    }
}
