//! Mapping metadata loaded from YAML, and the [`MappingResolver`] backed by it.
//!
//! ```yaml
//! entities:
//!   - name: Cook
//!     table: Cooks
//!     discriminator: { column: Kind, value: Cook }
//!     columns:
//!       - { member: ID, type: int32, primary_key: true }
//!       - { member: Name, type: string }
//!     relations:
//!       - { member: Kitchen, target: Kitchen, cardinality: one, local_key: KitchenID, foreign_key: ID }
//!   - name: Chef
//!     base: Cook
//!     discriminator: { column: Kind, value: Chef }
//!     columns:
//!       - { member: MichelinStars, column: Stars, type: int32 }
//! ```
//!
//! Derived entities share the table of their base and inherit its columns and relations.

use std::{
    collections::{HashMap, HashSet},
    fs,
    path::Path,
};

use lazy_static::lazy_static;
use log::debug;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{
    query_model::{ConstantValue, DataType, MemberRef},
    sql_statement::{
        sql_expr::{EntityConstant, EntityRefMember, NewExpr, NewMember, SqlCollection},
        Cardinality, ColumnExpr, EntityDefinition, EntityExpr, ResolvedJoin, ResolvedSimpleTable,
        SqlExpr, TableSource, UnresolvedJoin, UnresolvedTable,
    },
    utils::AliasGenerator,
};

use super::{
    errors::{MappingConfigError, MappingError},
    resolver::MappingResolver,
};

lazy_static! {
    static ref IDENTIFIER: Regex = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap();
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingSchemaConfig {
    pub entities: Vec<EntityMappingConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityMappingConfig {
    pub name: String,
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default)]
    pub base: Option<String>,
    #[serde(default)]
    pub discriminator: Option<DiscriminatorConfig>,
    #[serde(default)]
    pub columns: Vec<ColumnMappingConfig>,
    #[serde(default)]
    pub relations: Vec<RelationMappingConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscriminatorConfig {
    pub column: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnMappingConfig {
    pub member: String,
    /// Defaults to the member name.
    #[serde(default)]
    pub column: Option<String>,
    #[serde(rename = "type")]
    pub data_type: DataType,
    #[serde(default)]
    pub primary_key: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationMappingConfig {
    pub member: String,
    pub target: String,
    pub cardinality: Cardinality,
    /// Column of this entity's table.
    pub local_key: String,
    /// Column of the target's table.
    pub foreign_key: String,
}

impl MappingSchemaConfig {
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self, MappingConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| MappingConfigError::Read {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        Self::from_yaml_str(&contents)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, MappingConfigError> {
        serde_yaml::from_str(yaml).map_err(|e| MappingConfigError::Parse(e.to_string()))
    }

    /// Identifier syntax and uniqueness; cross-entity checks happen in
    /// [`MappingSchema::from_config`].
    pub fn validate(&self) -> Result<(), MappingConfigError> {
        let mut seen = HashSet::new();
        for entity in &self.entities {
            check_identifier("entity", &entity.name)?;
            if !seen.insert(entity.name.as_str()) {
                return Err(MappingConfigError::DuplicateEntity(entity.name.clone()));
            }
            if let Some(table) = &entity.table {
                check_identifier("table", table)?;
            }
            if let Some(discriminator) = &entity.discriminator {
                check_identifier("column", &discriminator.column)?;
            }
            for column in &entity.columns {
                check_identifier("member", &column.member)?;
                if let Some(name) = &column.column {
                    check_identifier("column", name)?;
                }
                if !column.data_type.is_scalar() {
                    return Err(MappingConfigError::NonScalarColumn {
                        entity: entity.name.clone(),
                        column: column.member.clone(),
                        data_type: column.data_type.clone(),
                    });
                }
            }
            for relation in &entity.relations {
                check_identifier("member", &relation.member)?;
                check_identifier("column", &relation.local_key)?;
                check_identifier("column", &relation.foreign_key)?;
            }
        }
        Ok(())
    }
}

fn check_identifier(kind: &'static str, value: &str) -> Result<(), MappingConfigError> {
    if IDENTIFIER.is_match(value) {
        Ok(())
    } else {
        Err(MappingConfigError::InvalidIdentifier {
            kind,
            value: value.to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnMapping {
    pub member: String,
    pub column: String,
    pub data_type: DataType,
    pub primary_key: bool,
}

/// One entity with inheritance flattened.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityMapping {
    pub name: String,
    pub table: String,
    /// Base entities, nearest first.
    pub ancestors: Vec<String>,
    pub discriminator: Option<DiscriminatorConfig>,
    pub columns: Vec<ColumnMapping>,
    pub relations: Vec<RelationMappingConfig>,
}

impl EntityMapping {
    pub fn column_for_member(&self, member: &str) -> Option<&ColumnMapping> {
        self.columns.iter().find(|c| c.member == member)
    }

    pub fn column_named(&self, column: &str) -> Option<&ColumnMapping> {
        self.columns.iter().find(|c| c.column == column)
    }

    pub fn relation(&self, member: &str) -> Option<&RelationMappingConfig> {
        self.relations.iter().find(|r| r.member == member)
    }

    pub fn primary_key(&self) -> impl Iterator<Item = &ColumnMapping> {
        self.columns.iter().filter(|c| c.primary_key)
    }

    pub fn derives_from(&self, entity: &str) -> bool {
        self.ancestors.iter().any(|a| a == entity)
    }
}

/// Validated, inheritance-flattened mapping metadata.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MappingSchema {
    entities: HashMap<String, EntityMapping>,
}

impl MappingSchema {
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self, MappingConfigError> {
        Self::from_config(MappingSchemaConfig::from_yaml_file(path)?)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, MappingConfigError> {
        Self::from_config(MappingSchemaConfig::from_yaml_str(yaml)?)
    }

    pub fn from_config(config: MappingSchemaConfig) -> Result<Self, MappingConfigError> {
        config.validate()?;
        let by_name: HashMap<&str, &EntityMappingConfig> = config
            .entities
            .iter()
            .map(|entity| (entity.name.as_str(), entity))
            .collect();

        let mut entities = HashMap::new();
        for entity in &config.entities {
            let chain = inheritance_chain(entity, &by_name)?;

            let table = chain
                .iter()
                .find_map(|e| e.table.clone())
                .ok_or_else(|| MappingConfigError::MissingTable(entity.name.clone()))?;
            // Base members first, so derived entities can only add.
            let mut columns = Vec::new();
            let mut relations = Vec::new();
            for level in chain.iter().rev() {
                columns.extend(level.columns.iter().map(|column| ColumnMapping {
                    member: column.member.clone(),
                    column: column.column.clone().unwrap_or_else(|| column.member.clone()),
                    data_type: column.data_type.clone(),
                    primary_key: column.primary_key,
                }));
                relations.extend(level.relations.iter().cloned());
            }

            let mapping = EntityMapping {
                name: entity.name.clone(),
                table,
                ancestors: chain[1..].iter().map(|e| e.name.clone()).collect(),
                discriminator: entity.discriminator.clone(),
                columns,
                relations,
            };
            if mapping.primary_key().next().is_none() {
                return Err(MappingConfigError::MissingPrimaryKey(entity.name.clone()));
            }
            entities.insert(entity.name.clone(), mapping);
        }

        for mapping in entities.values() {
            for relation in &mapping.relations {
                let target = entities.get(&relation.target).ok_or_else(|| {
                    MappingConfigError::UnknownEntity {
                        entity: mapping.name.clone(),
                        referenced: relation.target.clone(),
                    }
                })?;
                if mapping.column_named(&relation.local_key).is_none() {
                    return Err(MappingConfigError::UnknownColumn {
                        entity: mapping.name.clone(),
                        member: relation.local_key.clone(),
                    });
                }
                if target.column_named(&relation.foreign_key).is_none() {
                    return Err(MappingConfigError::UnknownColumn {
                        entity: target.name.clone(),
                        member: relation.foreign_key.clone(),
                    });
                }
            }
        }

        debug!("Loaded mapping schema with {} entities", entities.len());
        Ok(Self { entities })
    }

    pub fn entity(&self, name: &str) -> Option<&EntityMapping> {
        self.entities.get(name)
    }

    fn mapping_for(&self, data_type: &DataType) -> Result<&EntityMapping, MappingError> {
        data_type
            .entity_name()
            .and_then(|name| self.entities.get(name))
            .ok_or_else(|| MappingError::UnmappedType {
                type_name: data_type.to_string(),
            })
    }

    fn mapping_named(&self, name: &str) -> Result<&EntityMapping, MappingError> {
        self.entities
            .get(name)
            .ok_or_else(|| MappingError::UnmappedType {
                type_name: name.to_string(),
            })
    }

    /// Discriminator values of `target` and every entity derived from it.
    fn discriminator_values(&self, target: &str) -> Vec<(String, String)> {
        let mut values: Vec<(String, String)> = self
            .entities
            .values()
            .filter(|e| e.name == target || e.derives_from(target))
            .filter_map(|e| {
                e.discriminator
                    .as_ref()
                    .map(|d| (d.column.clone(), d.value.clone()))
            })
            .collect();
        values.sort();
        values
    }
}

/// `entity` followed by its bases, nearest first.
fn inheritance_chain<'c>(
    entity: &'c EntityMappingConfig,
    by_name: &HashMap<&str, &'c EntityMappingConfig>,
) -> Result<Vec<&'c EntityMappingConfig>, MappingConfigError> {
    let mut chain = vec![entity];
    let mut current = entity;
    while let Some(base) = &current.base {
        let next = by_name
            .get(base.as_str())
            .copied()
            .ok_or_else(|| MappingConfigError::UnknownEntity {
                entity: current.name.clone(),
                referenced: base.clone(),
            })?;
        if chain.iter().any(|seen| seen.name == next.name) {
            return Err(MappingConfigError::InheritanceCycle(entity.name.clone()));
        }
        chain.push(next);
        current = next;
    }
    Ok(chain)
}

impl MappingResolver for MappingSchema {
    fn resolve_table_info(
        &self,
        table: &UnresolvedTable,
        generator: &mut AliasGenerator,
    ) -> Result<ResolvedSimpleTable, MappingError> {
        let mapping = self.mapping_for(&table.item_type)?;
        Ok(ResolvedSimpleTable {
            item_type: table.item_type.clone(),
            table_name: mapping.table.clone(),
            alias: generator.table_alias(),
        })
    }

    fn resolve_join_info(
        &self,
        join: &UnresolvedJoin,
        generator: &mut AliasGenerator,
    ) -> Result<ResolvedJoin, MappingError> {
        let mapping = self.mapping_named(join.originating.entity_type())?;
        let relation =
            mapping
                .relation(&join.member.name)
                .ok_or_else(|| MappingError::UnmappedRelation {
                    declaring_type: mapping.name.clone(),
                    member: join.member.name.clone(),
                })?;
        let target = self.mapping_named(&relation.target)?;
        let local = mapping.column_named(&relation.local_key).ok_or_else(|| {
            MappingError::UnmappedMember {
                declaring_type: mapping.name.clone(),
                member: relation.local_key.clone(),
            }
        })?;
        let foreign = target.column_named(&relation.foreign_key).ok_or_else(|| {
            MappingError::UnmappedMember {
                declaring_type: target.name.clone(),
                member: relation.foreign_key.clone(),
            }
        })?;

        let alias = generator.table_alias();
        let condition = SqlExpr::equal(
            SqlExpr::Column(join.originating.get_column(
                local.data_type.clone(),
                &local.column,
                local.primary_key,
            )),
            SqlExpr::column(
                alias.clone(),
                foreign.column.clone(),
                foreign.data_type.clone(),
                foreign.primary_key,
            ),
        );
        Ok(ResolvedJoin {
            foreign: Box::new(TableSource::Simple(ResolvedSimpleTable {
                item_type: DataType::entity(target.name.clone()),
                table_name: target.table.clone(),
                alias,
            })),
            condition,
        })
    }

    fn resolve_simple_table_info(
        &self,
        table: &ResolvedSimpleTable,
        _generator: &mut AliasGenerator,
    ) -> Result<EntityDefinition, MappingError> {
        let mapping = self.mapping_for(&table.item_type)?;
        Ok(EntityDefinition {
            entity_type: mapping.name.clone(),
            table_alias: table.alias.clone(),
            name: None,
            identity_columns: mapping.primary_key().map(|c| c.column.clone()).collect(),
            columns: mapping
                .columns
                .iter()
                .map(|c| {
                    ColumnExpr::new(
                        table.alias.clone(),
                        c.column.clone(),
                        c.data_type.clone(),
                        c.primary_key,
                    )
                })
                .collect(),
        })
    }

    fn resolve_member_expression(
        &self,
        entity: &EntityExpr,
        member: &MemberRef,
    ) -> Result<SqlExpr, MappingError> {
        let mapping = self.mapping_named(entity.entity_type())?;
        if let Some(column) = mapping.column_for_member(&member.name) {
            return Ok(SqlExpr::Column(entity.get_column(
                column.data_type.clone(),
                &column.column,
                column.primary_key,
            )));
        }
        match mapping.relation(&member.name) {
            Some(relation) if relation.cardinality == Cardinality::Many => {
                Err(MappingError::CollectionMemberAccess {
                    declaring_type: mapping.name.clone(),
                    member: member.name.clone(),
                })
            }
            Some(_) => Ok(SqlExpr::EntityRefMember(EntityRefMember {
                entity: entity.clone(),
                member: member.clone(),
            })),
            None => Err(MappingError::UnmappedMember {
                declaring_type: mapping.name.clone(),
                member: member.name.clone(),
            }),
        }
    }

    fn resolve_column_member_expression(
        &self,
        column: &ColumnExpr,
        member: &MemberRef,
    ) -> Result<SqlExpr, MappingError> {
        Err(MappingError::UnmappedMember {
            declaring_type: column.data_type.to_string(),
            member: member.name.clone(),
        })
    }

    fn resolve_constant_expression(
        &self,
        value: &ConstantValue,
        data_type: &DataType,
    ) -> Result<SqlExpr, MappingError> {
        let entity = match value {
            ConstantValue::Null => return Ok(SqlExpr::literal_null(data_type.clone())),
            ConstantValue::Entity(entity) => entity,
            other if data_type.is_entity() => {
                return Err(MappingError::UnmappedConstant {
                    data_type: data_type.clone(),
                    reason: format!("`{}` is not an entity value", other),
                })
            }
            other => return Ok(SqlExpr::constant(other.clone(), data_type.clone())),
        };

        let mapping = self.mapping_named(&entity.entity_type)?;
        let mut members = Vec::new();
        for key in mapping.primary_key() {
            let field = entity.fields.get(&key.member).ok_or_else(|| {
                MappingError::UnmappedConstant {
                    data_type: data_type.clone(),
                    reason: format!("missing key field `{}`", key.member),
                }
            })?;
            members.push(NewMember {
                name: key.column.clone(),
                expr: SqlExpr::constant(field.clone(), key.data_type.clone()),
            });
        }
        let identity = if members.len() == 1 {
            members.pop().map(|member| member.expr)
        } else {
            Some(SqlExpr::New(NewExpr {
                type_name: format!("{}Identity", mapping.name),
                members,
            }))
        };
        Ok(SqlExpr::EntityConstant(EntityConstant {
            entity_type: entity.entity_type.clone(),
            value: value.clone(),
            identity: identity.map(Box::new),
        }))
    }

    fn resolve_type_check(
        &self,
        expr: &SqlExpr,
        target: &DataType,
    ) -> Result<SqlExpr, MappingError> {
        let source_type = expr.data_type();
        let source = self.mapping_for(&source_type)?;
        let target_mapping = self.mapping_for(target)?;
        if source.name == target_mapping.name || source.derives_from(&target_mapping.name) {
            return Ok(SqlExpr::literal_bool(true));
        }
        if !target_mapping.derives_from(&source.name) {
            return Ok(SqlExpr::literal_bool(false));
        }

        let unsupported = || MappingError::UnsupportedTypeCheck {
            source_type: source_type.clone(),
            target: target.clone(),
        };
        let SqlExpr::Entity(entity) = expr.unwrap_named() else {
            return Err(unsupported());
        };
        let mut values = self.discriminator_values(&target_mapping.name);
        let column_name = match values.first() {
            Some((column, _)) => column.clone(),
            None => return Err(unsupported()),
        };
        if values.iter().any(|(column, _)| *column != column_name) {
            return Err(unsupported());
        }
        let column = SqlExpr::Column(entity.get_column(DataType::String, &column_name, false));
        let constant =
            |value: String| SqlExpr::constant(ConstantValue::String(value), DataType::String);
        Ok(if values.len() == 1 {
            let (_, value) = values.remove(0);
            SqlExpr::equal(column, constant(value))
        } else {
            SqlExpr::in_set(
                column,
                SqlExpr::Collection(SqlCollection {
                    items: values.into_iter().map(|(_, value)| constant(value)).collect(),
                    item_type: DataType::String,
                }),
            )
        })
    }

    fn try_resolve_optimized_identity(&self, marker: &EntityRefMember) -> Option<SqlExpr> {
        let mapping = self.entities.get(marker.entity.entity_type())?;
        let relation = mapping.relation(&marker.member.name)?;
        if relation.cardinality != Cardinality::One {
            return None;
        }
        let target = self.entities.get(&relation.target)?;
        let mut key = target.primary_key();
        let (Some(single), None) = (key.next(), key.next()) else {
            return None;
        };
        if single.column != relation.foreign_key {
            return None;
        }
        let local = mapping.column_named(&relation.local_key)?;
        Some(SqlExpr::Column(marker.entity.get_column(
            local.data_type.clone(),
            &local.column,
            local.primary_key,
        )))
    }
}
