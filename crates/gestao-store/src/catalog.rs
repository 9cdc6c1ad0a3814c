// gestao-store/src/catalog.rs
// ============================================================================
// Module: Entity Catalog
// Description: The Gestão 360 entity descriptors keyed by collection name.
// Purpose: Declare every entity once, at startup.
// Dependencies: serde_json
// ============================================================================

//! ## Overview
//! [`EntityCatalog::gestao360`] declares the six HR entities with the
//! defaults the write paths have always applied. Canonical field names are
//! the backend ones (`categoria`, `fornecedor`, `knowledge_id`); the frontend
//! mirror columns (`area`, `vendor`, `learning_item_id`, `validade_meses`)
//! are independent passthrough columns and are never aliased onto them.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::json;

use crate::descriptor::EntityDescriptor;
use crate::descriptor::FieldSpec;
use crate::descriptor::JsonShape;
use crate::descriptor::TimestampPolicy;
use crate::error::DescriptorError;

// ============================================================================
// SECTION: Catalog
// ============================================================================

/// Immutable set of entity descriptors keyed by collection name.
#[derive(Debug, Clone, Default)]
pub struct EntityCatalog {
    /// Descriptors by collection name.
    entities: BTreeMap<String, Arc<EntityDescriptor>>,
}

impl EntityCatalog {
    /// Builds a catalog from explicit descriptors.
    ///
    /// # Errors
    ///
    /// Returns [`DescriptorError::DuplicateEntity`] when two descriptors share
    /// a name.
    pub fn from_descriptors(
        descriptors: impl IntoIterator<Item = EntityDescriptor>,
    ) -> Result<Self, DescriptorError> {
        let mut entities = BTreeMap::new();
        for descriptor in descriptors {
            let name = descriptor.name().to_string();
            if entities.insert(name.clone(), Arc::new(descriptor)).is_some() {
                return Err(DescriptorError::DuplicateEntity(name));
            }
        }
        Ok(Self {
            entities,
        })
    }

    /// Builds the Gestão 360 catalog.
    ///
    /// # Errors
    ///
    /// Returns [`DescriptorError`] when a built-in descriptor is invalid.
    pub fn gestao360() -> Result<Self, DescriptorError> {
        Self::from_descriptors([
            areas()?,
            teams()?,
            managers()?,
            employees()?,
            knowledge()?,
            employee_knowledge()?,
        ])
    }

    /// Returns the descriptor for `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<EntityDescriptor>> {
        self.entities.get(name).cloned()
    }

    /// Iterates descriptors in collection-name order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<EntityDescriptor>> {
        self.entities.values()
    }

    /// Returns the collection names.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.entities.keys().map(String::as_str).collect()
    }

    /// Returns the number of entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Returns true when the catalog is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

// ============================================================================
// SECTION: Descriptors
// ============================================================================

/// Organizational areas.
fn areas() -> Result<EntityDescriptor, DescriptorError> {
    EntityDescriptor::builder("areas", "areas")
        .field(FieldSpec::plain("nome", json!("")))
        .field(FieldSpec::plain("sigla", json!("")))
        .field(FieldSpec::plain("descricao", json!("")))
        .field(FieldSpec::plain("cor", json!("#3B82F6")))
        .field(FieldSpec::plain("icone", json!("building")))
        .field(FieldSpec::plain("ativa", json!(true)))
        .field(FieldSpec::plain("prioridade", json!(1)))
        .passthrough("diretor_id")
        .order_by("nome")
        .active_flag("ativa")
        .group_by("prioridade")
        .timestamps(TimestampPolicy::standard())
        .build()
}

/// Teams.
fn teams() -> Result<EntityDescriptor, DescriptorError> {
    EntityDescriptor::builder("teams", "teams")
        .field(FieldSpec::plain("nome", json!("")))
        .field(FieldSpec::plain("descricao", json!("")))
        .field(FieldSpec::plain("cor", json!("#3B82F6")))
        .field(FieldSpec::plain("ativo", json!(true)))
        .field(FieldSpec::plain("meta_membros", json!(5)))
        .field(FieldSpec::plain("icone", json!("team")))
        .passthrough("area_id")
        .passthrough("manager_id")
        .order_by("nome")
        .active_flag("ativo")
        .group_by("area_id")
        .timestamps(TimestampPolicy::standard())
        .build()
}

/// Managers and directors.
fn managers() -> Result<EntityDescriptor, DescriptorError> {
    EntityDescriptor::builder("managers", "managers")
        .field(FieldSpec::plain("nome", json!("")))
        .field(FieldSpec::plain("email", json!("")))
        .field(FieldSpec::plain("cargo", json!("")))
        .field(FieldSpec::plain("telefone", json!("")))
        .field(FieldSpec::plain("nivel_hierarquico", json!("GERENTE")))
        .field(FieldSpec::plain("departamento", json!("")))
        .field(FieldSpec::plain("ativo", json!(true)))
        .field(FieldSpec::plain("observacoes", json!("")))
        .passthrough("area_id")
        .passthrough("user_id")
        .order_by("nome")
        .active_flag("ativo")
        .group_by("nivel_hierarquico")
        .group_by("area_id")
        .timestamps(TimestampPolicy::standard())
        .build()
}

/// Employee profiles, with the JSON-encoded HR sub-documents.
fn employees() -> Result<EntityDescriptor, DescriptorError> {
    EntityDescriptor::builder("employees", "employees")
        .field(FieldSpec::plain("nome", json!("")))
        .field(FieldSpec::plain("email", json!("")))
        .field(FieldSpec::plain("telefone", json!("")))
        .field(FieldSpec::plain("cpf", json!("")))
        .field(FieldSpec::plain("rg", json!("")))
        .field(FieldSpec::plain("estado_civil", json!("SOLTEIRO")))
        .field(FieldSpec::plain("cargo", json!("")))
        .field(FieldSpec::plain("equipe", json!("")))
        .field(FieldSpec::plain("nivel", json!("JUNIOR")))
        .field(FieldSpec::plain("status", json!("ATIVO")))
        .field(FieldSpec::plain("salario", json!(0)))
        .field(FieldSpec::json("endereco", JsonShape::Object))
        .field(FieldSpec::json("competencias", JsonShape::Array))
        .field(FieldSpec::json("pdi", JsonShape::Object))
        .field(FieldSpec::json("reunioes_1x1", JsonShape::Object))
        .field(FieldSpec::json("ferias", JsonShape::Object))
        .field(FieldSpec::json("dayoff", JsonShape::Object))
        .passthrough("data_nascimento")
        .passthrough("data_admissao")
        .passthrough("team_id")
        .passthrough("manager_id")
        .passthrough("avatar")
        .order_by("nome")
        .group_by("status")
        .group_by("nivel")
        .group_by("equipe")
        .timestamps(TimestampPolicy::standard())
        .build()
}

/// Learning catalog (certifications, courses, degrees).
fn knowledge() -> Result<EntityDescriptor, DescriptorError> {
    EntityDescriptor::builder("knowledge", "knowledge")
        .field(FieldSpec::plain("nome", json!("")))
        .field(FieldSpec::plain("codigo", json!("")))
        .field(FieldSpec::plain("tipo", json!("CERTIFICACAO")))
        .field(FieldSpec::plain("categoria", json!("")))
        .field(FieldSpec::plain("fornecedor", json!("")))
        .field(FieldSpec::plain("descricao", json!("")))
        .field(FieldSpec::plain("link", json!("")))
        .passthrough("area")
        .passthrough("vendor")
        .passthrough("validade_anos")
        .passthrough("validade_meses")
        .passthrough("nivel_formacao")
        .passthrough("nivel")
        .passthrough("modalidade")
        .passthrough("preco")
        .order_by("nome")
        .group_by("tipo")
        .group_by("categoria")
        .timestamps(TimestampPolicy::standard())
        .build()
}

/// Links between employees and learning items.
fn employee_knowledge() -> Result<EntityDescriptor, DescriptorError> {
    EntityDescriptor::builder("employee_knowledge", "employee_knowledge")
        .field(FieldSpec::plain("status", json!("DESEJADO")))
        .field(FieldSpec::plain("prioridade", json!("MEDIA")))
        .field(FieldSpec::plain("progresso", json!(0.0)))
        .field(FieldSpec::plain("reembolsavel", json!(false)))
        .field(FieldSpec::plain("reembolsado", json!(false)))
        .field(FieldSpec::plain("observacoes", json!("")))
        .passthrough("employee_id")
        .passthrough("knowledge_id")
        .passthrough("learning_item_id")
        .passthrough("data_obtencao")
        .passthrough("data_expiracao")
        .passthrough("data_alvo")
        .passthrough("data_inicio")
        .passthrough("anexo_path")
        .passthrough("anexo_nome")
        .passthrough("anexo_tipo")
        .passthrough("valor_investido")
        .passthrough("notas_gestor")
        .passthrough("nota_avaliacao")
        .passthrough("certificado_arquivo")
        .group_by("status")
        .group_by("prioridade")
        .timestamps(TimestampPolicy::standard())
        .build()
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::unwrap_used,
        clippy::panic,
        reason = "Test assertions use unwrap/panic for clarity."
    )]

    use serde_json::json;

    use super::EntityCatalog;
    use crate::descriptor::EntityDescriptor;
    use crate::error::DescriptorError;

    #[test]
    fn gestao360_catalog_declares_six_entities() {
        let catalog = EntityCatalog::gestao360().unwrap();
        assert_eq!(
            catalog.names(),
            vec!["areas", "employee_knowledge", "employees", "knowledge", "managers", "teams"]
        );
        assert!(catalog.get("users").is_none());
    }

    #[test]
    fn employees_declare_json_sub_documents() {
        let catalog = EntityCatalog::gestao360().unwrap();
        let employees = catalog.get("employees").unwrap();
        for name in ["endereco", "competencias", "pdi", "reunioes_1x1", "ferias", "dayoff"] {
            assert!(employees.field(name).unwrap().is_json_encoded(), "{name} should be json");
        }
        assert_eq!(employees.field("competencias").unwrap().default_value(), &json!([]));
    }

    #[test]
    fn frontend_mirrors_are_passthrough_only() {
        let catalog = EntityCatalog::gestao360().unwrap();
        let knowledge = catalog.get("knowledge").unwrap();
        assert!(knowledge.field("categoria").is_some());
        assert!(knowledge.field("area").is_none());
        assert!(knowledge.passthrough_columns().iter().any(|column| column == "vendor"));
    }

    #[test]
    fn duplicate_collection_names_are_rejected() {
        let first = EntityDescriptor::builder("teams", "teams").build().unwrap();
        let second = EntityDescriptor::builder("teams", "teams_v2").build().unwrap();
        let result = EntityCatalog::from_descriptors([first, second]);
        assert_eq!(result.unwrap_err(), DescriptorError::DuplicateEntity("teams".to_string()));
    }
}
