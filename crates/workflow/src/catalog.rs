//! Built-in agreement types and list labels.

use std::collections::HashMap;

use convenios_storage::{AgreementTypeRecord, ConvenioStorage, StorageError};
use tracing::info;

/// Label for agreements whose type is neither stored nor built in.
pub const UNTYPED_LABEL: &str = "Untyped";

const BUILTIN: [(i64, &str); 5] = [
    (1, "Convenio Particular de Práctica Supervisada"),
    (2, "Convenio Marco"),
    (3, "Acuerdo de Colaboración"),
    (4, "Convenio Específico"),
    (5, "Convenio Marco Práctica Supervisada"),
];

const DEFAULT_TEMPLATE: &str = "{{title}}\n\n\
Entity: {{entidad_nombre}}\n\
Address: {{entidad_domicilio}}\n\
Representative: {{representante_nombre}} ({{representante_cargo}})\n\
Start date: {{fecha_inicio}}\n\
End date: {{fecha_fin}}\n";

/// Built-in label for `type_id`, if any.
pub fn builtin_label(type_id: i64) -> Option<&'static str> {
    BUILTIN
        .iter()
        .find(|(id, _)| *id == type_id)
        .map(|(_, name)| *name)
}

/// The built-in catalog, all sharing a plain-text template.
pub fn builtin_types() -> Vec<AgreementTypeRecord> {
    BUILTIN
        .iter()
        .map(|(id, name)| AgreementTypeRecord {
            id: *id,
            name: name.to_string(),
            template: DEFAULT_TEMPLATE.to_string(),
        })
        .collect()
}

/// Seed the built-in catalog if the store has no types yet. Returns how
/// many were written.
pub async fn seed_builtin<S: ConvenioStorage>(storage: &S) -> Result<usize, StorageError> {
    if !storage.list_agreement_types().await?.is_empty() {
        return Ok(0);
    }
    let types = builtin_types();
    let count = types.len();
    for record in types {
        storage.upsert_agreement_type(record).await?;
    }
    info!(count, "seeded built-in agreement types");
    Ok(count)
}

/// Resolves list labels: stored name, then built-in label, then
/// [`UNTYPED_LABEL`].
#[derive(Debug, Default)]
pub struct TypeLabels {
    stored: HashMap<i64, String>,
}

impl TypeLabels {
    pub fn new(types: &[AgreementTypeRecord]) -> Self {
        TypeLabels {
            stored: types
                .iter()
                .filter(|t| !t.name.trim().is_empty())
                .map(|t| (t.id, t.name.clone()))
                .collect(),
        }
    }

    pub fn label(&self, type_id: i64) -> &str {
        self.stored
            .get(&type_id)
            .map(String::as_str)
            .or_else(|| builtin_label(type_id))
            .unwrap_or(UNTYPED_LABEL)
    }
}
