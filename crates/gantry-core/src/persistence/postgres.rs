// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! PostgreSQL-backed store.
//!
//! Multi-table writes (definitions, instance plans, request logs) run in a
//! transaction; a failure rolls the whole write back.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use crate::error::Result;
use crate::instantiation::InstancePlan;
use crate::model::{
    CacheEntry, DataBinding, DefinitionLink, DefinitionNode, InstanceNode, InstanceRunGraph,
    InterfaceParameter, InterfaceWithVersion, NodeRequest, NodeRequestParam, PluginConfig,
    PreviewBinding, ProcessDefinition, ProcessInstance, RunLink, RunNode, RunWorkflow,
};
use crate::persistence::Store;

/// PostgreSQL-backed [`Store`] implementation.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Wrap an existing connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect to the database and run pending migrations.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        crate::migrations::run(&pool).await?;
        Ok(Self { pool })
    }

    /// Access the underlying pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Store for PostgresStore {
    async fn insert_definition(
        &self,
        definition: &ProcessDefinition,
        nodes: &[DefinitionNode],
        links: &[DefinitionLink],
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO process_definitions
                (id, key, name, version, status, tags, created_by, created_at, updated_by, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(&definition.id)
        .bind(&definition.key)
        .bind(&definition.name)
        .bind(&definition.version)
        .bind(&definition.status)
        .bind(&definition.tags)
        .bind(&definition.created_by)
        .bind(definition.created_at)
        .bind(&definition.updated_by)
        .bind(definition.updated_at)
        .execute(&mut *tx)
        .await?;

        for node in nodes {
            sqlx::query(
                r#"
                INSERT INTO definition_nodes
                    (id, definition_id, name, description, status, node_type, service_name,
                     dynamic_bind, bind_node_id, risk_check, expression, timeout, ordered_no,
                     time_config)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
                "#,
            )
            .bind(&node.id)
            .bind(&node.definition_id)
            .bind(&node.name)
            .bind(&node.description)
            .bind(&node.status)
            .bind(&node.node_type)
            .bind(&node.service_name)
            .bind(node.dynamic_bind)
            .bind(&node.bind_node_id)
            .bind(node.risk_check)
            .bind(&node.expression)
            .bind(node.timeout)
            .bind(node.ordered_no)
            .bind(&node.time_config)
            .execute(&mut *tx)
            .await?;
        }

        for link in links {
            sqlx::query(
                r#"
                INSERT INTO definition_links (id, definition_id, source, target, name)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(&link.id)
            .bind(&link.definition_id)
            .bind(&link.source)
            .bind(&link.target)
            .bind(&link.name)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get_definition(&self, definition_id: &str) -> Result<Option<ProcessDefinition>> {
        let record = sqlx::query_as::<_, ProcessDefinition>(
            r#"
            SELECT id, key, name, version, status, tags,
                   created_by, created_at, updated_by, updated_at
            FROM process_definitions
            WHERE id = $1
            "#,
        )
        .bind(definition_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    async fn list_definitions(
        &self,
        include_draft: bool,
        tag: Option<&str>,
    ) -> Result<Vec<ProcessDefinition>> {
        let records = sqlx::query_as::<_, ProcessDefinition>(
            r#"
            SELECT id, key, name, version, status, tags,
                   created_by, created_at, updated_by, updated_at
            FROM process_definitions
            WHERE ($1 OR status = 'deployed')
              AND ($2::text IS NULL OR tags = $2)
            ORDER BY created_at DESC
            "#,
        )
        .bind(include_draft)
        .bind(tag)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    async fn list_definition_nodes(&self, definition_id: &str) -> Result<Vec<DefinitionNode>> {
        let records = sqlx::query_as::<_, DefinitionNode>(
            r#"
            SELECT id, definition_id, name, description, status, node_type, service_name,
                   dynamic_bind, bind_node_id, risk_check, expression, timeout, ordered_no,
                   time_config
            FROM definition_nodes
            WHERE definition_id = $1
            ORDER BY ordered_no, id
            "#,
        )
        .bind(definition_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    async fn get_definition_node(&self, node_id: &str) -> Result<Option<DefinitionNode>> {
        let record = sqlx::query_as::<_, DefinitionNode>(
            r#"
            SELECT id, definition_id, name, description, status, node_type, service_name,
                   dynamic_bind, bind_node_id, risk_check, expression, timeout, ordered_no,
                   time_config
            FROM definition_nodes
            WHERE id = $1
            "#,
        )
        .bind(node_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    async fn list_definition_links(&self, definition_id: &str) -> Result<Vec<DefinitionLink>> {
        let records = sqlx::query_as::<_, DefinitionLink>(
            r#"
            SELECT id, definition_id, source, target, name
            FROM definition_links
            WHERE definition_id = $1
            ORDER BY id
            "#,
        )
        .bind(definition_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    async fn insert_preview_bindings(&self, rows: &[PreviewBinding]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for row in rows {
            sqlx::query(
                r#"
                INSERT INTO preview_bindings
                    (definition_id, session_id, definition_node_id, entity_data_id,
                     entity_data_name, entity_type_id, ordered_no, bind_type, full_data_id,
                     is_bound, created_by, created_at, updated_by, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
                "#,
            )
            .bind(&row.definition_id)
            .bind(&row.session_id)
            .bind(&row.definition_node_id)
            .bind(&row.entity_data_id)
            .bind(&row.entity_data_name)
            .bind(&row.entity_type_id)
            .bind(&row.ordered_no)
            .bind(&row.bind_type)
            .bind(&row.full_data_id)
            .bind(row.is_bound)
            .bind(&row.created_by)
            .bind(row.created_at)
            .bind(&row.updated_by)
            .bind(row.updated_at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn list_preview_bindings(
        &self,
        session_id: &str,
        node_id: Option<&str>,
    ) -> Result<Vec<PreviewBinding>> {
        let records = sqlx::query_as::<_, PreviewBinding>(
            r#"
            SELECT id, definition_id, session_id, definition_node_id, entity_data_id,
                   entity_data_name, entity_type_id, ordered_no, bind_type, full_data_id,
                   is_bound, created_by, created_at, updated_by, updated_at
            FROM preview_bindings
            WHERE session_id = $1
              AND ($2::text IS NULL OR definition_node_id = $2)
            ORDER BY id
            "#,
        )
        .bind(session_id)
        .bind(node_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    async fn update_preview_bound_flags(
        &self,
        changes: &[(i64, bool)],
        operator: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for (id, bound) in changes {
            sqlx::query(
                r#"
                UPDATE preview_bindings
                SET is_bound = $2, updated_by = $3, updated_at = $4
                WHERE id = $1
                "#,
            )
            .bind(id)
            .bind(bound)
            .bind(operator)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn insert_instance_graph(&self, plan: &InstancePlan) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let instance = &plan.instance;
        sqlx::query(
            r#"
            INSERT INTO process_instances
                (id, definition_id, definition_key, definition_name, status, entity_data_id,
                 entity_type_id, session_id, created_by, created_at, updated_by, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(&instance.id)
        .bind(&instance.definition_id)
        .bind(&instance.definition_key)
        .bind(&instance.definition_name)
        .bind(&instance.status)
        .bind(&instance.entity_data_id)
        .bind(&instance.entity_type_id)
        .bind(&instance.session_id)
        .bind(&instance.created_by)
        .bind(instance.created_at)
        .bind(&instance.updated_by)
        .bind(instance.updated_at)
        .execute(&mut *tx)
        .await?;

        let workflow = &plan.workflow;
        sqlx::query(
            r#"
            INSERT INTO run_workflows (id, instance_id, name, status, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&workflow.id)
        .bind(&workflow.instance_id)
        .bind(&workflow.name)
        .bind(&workflow.status)
        .bind(workflow.created_at)
        .execute(&mut *tx)
        .await?;

        for node in &plan.instance_nodes {
            sqlx::query(
                r#"
                INSERT INTO instance_nodes
                    (id, instance_id, definition_node_id, name, node_type, status, ordered_no,
                     risk_check_result, error_msg, created_by, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                "#,
            )
            .bind(&node.id)
            .bind(&node.instance_id)
            .bind(&node.definition_node_id)
            .bind(&node.name)
            .bind(&node.node_type)
            .bind(&node.status)
            .bind(node.ordered_no)
            .bind(&node.risk_check_result)
            .bind(&node.error_msg)
            .bind(&node.created_by)
            .bind(node.created_at)
            .execute(&mut *tx)
            .await?;
        }

        for node in &plan.run_nodes {
            sqlx::query(
                r#"
                INSERT INTO run_nodes
                    (id, workflow_id, instance_node_id, name, job_type, status, timeout, input,
                     created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
            )
            .bind(&node.id)
            .bind(&node.workflow_id)
            .bind(&node.instance_node_id)
            .bind(&node.name)
            .bind(&node.job_type)
            .bind(&node.status)
            .bind(node.timeout)
            .bind(&node.input)
            .bind(node.created_at)
            .execute(&mut *tx)
            .await?;
        }

        for link in &plan.run_links {
            sqlx::query(
                r#"
                INSERT INTO run_links (id, workflow_id, definition_link_id, name, source, target)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(&link.id)
            .bind(&link.workflow_id)
            .bind(&link.definition_link_id)
            .bind(&link.name)
            .bind(&link.source)
            .bind(&link.target)
            .execute(&mut *tx)
            .await?;
        }

        for binding in &plan.bindings {
            sqlx::query(
                r#"
                INSERT INTO data_bindings
                    (id, definition_id, instance_id, definition_node_id, instance_node_id,
                     entity_id, entity_data_id, entity_data_name, entity_type_id, bind_flag,
                     bind_type, full_data_id, created_by, created_at, updated_by, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
                "#,
            )
            .bind(&binding.id)
            .bind(&binding.definition_id)
            .bind(&binding.instance_id)
            .bind(&binding.definition_node_id)
            .bind(&binding.instance_node_id)
            .bind(&binding.entity_id)
            .bind(&binding.entity_data_id)
            .bind(&binding.entity_data_name)
            .bind(&binding.entity_type_id)
            .bind(binding.bind_flag)
            .bind(&binding.bind_type)
            .bind(&binding.full_data_id)
            .bind(&binding.created_by)
            .bind(binding.created_at)
            .bind(&binding.updated_by)
            .bind(binding.updated_at)
            .execute(&mut *tx)
            .await?;
        }

        for entry in &plan.cache_entries {
            sqlx::query(
                r#"
                INSERT INTO cache_entries
                    (id, instance_id, entity_id, entity_data_id, entity_data_name,
                     entity_type_id, full_data_id, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                ON CONFLICT (instance_id, entity_type_id, entity_data_id) DO NOTHING
                "#,
            )
            .bind(&entry.id)
            .bind(&entry.instance_id)
            .bind(&entry.entity_id)
            .bind(&entry.entity_data_id)
            .bind(&entry.entity_data_name)
            .bind(&entry.entity_type_id)
            .bind(&entry.full_data_id)
            .bind(entry.created_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get_instance(&self, instance_id: &str) -> Result<Option<ProcessInstance>> {
        let record = sqlx::query_as::<_, ProcessInstance>(
            r#"
            SELECT id, definition_id, definition_key, definition_name, status, entity_data_id,
                   entity_type_id, session_id, created_by, created_at, updated_by, updated_at
            FROM process_instances
            WHERE id = $1
            "#,
        )
        .bind(instance_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    async fn list_instances(&self, limit: i64) -> Result<Vec<ProcessInstance>> {
        let records = sqlx::query_as::<_, ProcessInstance>(
            r#"
            SELECT id, definition_id, definition_key, definition_name, status, entity_data_id,
                   entity_type_id, session_id, created_by, created_at, updated_by, updated_at
            FROM process_instances
            ORDER BY created_at DESC, id DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    async fn list_instance_nodes(&self, instance_id: &str) -> Result<Vec<InstanceNode>> {
        let records = sqlx::query_as::<_, InstanceNode>(
            r#"
            SELECT id, instance_id, definition_node_id, name, node_type, status, ordered_no,
                   risk_check_result, error_msg, created_by, created_at
            FROM instance_nodes
            WHERE instance_id = $1
            ORDER BY ordered_no, id
            "#,
        )
        .bind(instance_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    async fn get_instance_node(&self, node_id: &str) -> Result<Option<InstanceNode>> {
        let record = sqlx::query_as::<_, InstanceNode>(
            r#"
            SELECT id, instance_id, definition_node_id, name, node_type, status, ordered_no,
                   risk_check_result, error_msg, created_by, created_at
            FROM instance_nodes
            WHERE id = $1
            "#,
        )
        .bind(node_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    async fn update_instance_node_state(
        &self,
        node_id: &str,
        status: Option<&str>,
        error_msg: Option<&str>,
        risk_check_result: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE instance_nodes
            SET status = COALESCE($2, status),
                error_msg = COALESCE($3, error_msg),
                risk_check_result = COALESCE($4, risk_check_result)
            WHERE id = $1
            "#,
        )
        .bind(node_id)
        .bind(status)
        .bind(error_msg)
        .bind(risk_check_result)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_run_node(&self, run_node_id: &str) -> Result<Option<RunNode>> {
        let record = sqlx::query_as::<_, RunNode>(
            r#"
            SELECT id, workflow_id, instance_node_id, name, job_type, status, timeout, input,
                   created_at
            FROM run_nodes
            WHERE id = $1
            "#,
        )
        .bind(run_node_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    async fn get_run_graph(&self, instance_id: &str) -> Result<Option<InstanceRunGraph>> {
        let workflow = sqlx::query_as::<_, RunWorkflow>(
            r#"
            SELECT id, instance_id, name, status, created_at
            FROM run_workflows
            WHERE instance_id = $1
            "#,
        )
        .bind(instance_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(workflow) = workflow else {
            return Ok(None);
        };

        let nodes = sqlx::query_as::<_, RunNode>(
            r#"
            SELECT id, workflow_id, instance_node_id, name, job_type, status, timeout, input,
                   created_at
            FROM run_nodes
            WHERE workflow_id = $1
            ORDER BY id
            "#,
        )
        .bind(&workflow.id)
        .fetch_all(&self.pool)
        .await?;

        let links = sqlx::query_as::<_, RunLink>(
            r#"
            SELECT id, workflow_id, definition_link_id, name, source, target
            FROM run_links
            WHERE workflow_id = $1
            ORDER BY id
            "#,
        )
        .bind(&workflow.id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(InstanceRunGraph {
            workflow,
            nodes,
            links,
        }))
    }

    async fn list_instance_bindings(
        &self,
        instance_id: &str,
        instance_node_id: Option<&str>,
    ) -> Result<Vec<DataBinding>> {
        let records = sqlx::query_as::<_, DataBinding>(
            r#"
            SELECT id, definition_id, instance_id, definition_node_id, instance_node_id,
                   entity_id, entity_data_id, entity_data_name, entity_type_id, bind_flag,
                   bind_type, full_data_id, created_by, created_at, updated_by, updated_at
            FROM data_bindings
            WHERE instance_id = $1
              AND ($2::text IS NULL OR instance_node_id = $2)
            ORDER BY id
            "#,
        )
        .bind(instance_id)
        .bind(instance_node_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    async fn update_binding_bound_flags(
        &self,
        changes: &[(String, bool)],
        operator: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for (id, bound) in changes {
            sqlx::query(
                r#"
                UPDATE data_bindings
                SET bind_flag = $2, updated_by = $3, updated_at = $4
                WHERE id = $1
                "#,
            )
            .bind(id)
            .bind(bound)
            .bind(operator)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn list_cache_entries(&self, instance_id: &str) -> Result<Vec<CacheEntry>> {
        let records = sqlx::query_as::<_, CacheEntry>(
            r#"
            SELECT id, instance_id, entity_id, entity_data_id, entity_data_name,
                   entity_type_id, full_data_id, created_at
            FROM cache_entries
            WHERE instance_id = $1
            ORDER BY id
            "#,
        )
        .bind(instance_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    async fn insert_cache_entries(&self, entries: &[CacheEntry]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for entry in entries {
            sqlx::query(
                r#"
                INSERT INTO cache_entries
                    (id, instance_id, entity_id, entity_data_id, entity_data_name,
                     entity_type_id, full_data_id, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                ON CONFLICT (instance_id, entity_type_id, entity_data_id) DO NOTHING
                "#,
            )
            .bind(&entry.id)
            .bind(&entry.instance_id)
            .bind(&entry.entity_id)
            .bind(&entry.entity_data_id)
            .bind(&entry.entity_data_name)
            .bind(&entry.entity_type_id)
            .bind(&entry.full_data_id)
            .bind(entry.created_at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn register_plugin_config(&self, config: &PluginConfig) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO plugin_configs (id, package_name, version, status)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(&config.id)
        .bind(&config.package_name)
        .bind(&config.version)
        .bind(&config.status)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn register_interface(
        &self,
        interface: &InterfaceWithVersion,
        parameters: &[InterfaceParameter],
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO plugin_interfaces
                (id, config_id, service_name, service_display_name, path, http_method,
                 is_async, filter_rule, description)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(&interface.id)
        .bind(&interface.config_id)
        .bind(&interface.service_name)
        .bind(&interface.service_display_name)
        .bind(&interface.path)
        .bind(&interface.http_method)
        .bind(interface.is_async)
        .bind(&interface.filter_rule)
        .bind(&interface.description)
        .execute(&mut *tx)
        .await?;

        for param in parameters {
            sqlx::query(
                r#"
                INSERT INTO interface_parameters
                    (id, interface_id, direction, name, data_type, mapping_type, multiple,
                     sensitive)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(&param.id)
            .bind(&param.interface_id)
            .bind(&param.direction)
            .bind(&param.name)
            .bind(&param.data_type)
            .bind(&param.mapping_type)
            .bind(param.multiple)
            .bind(param.sensitive)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn list_enabled_interfaces(
        &self,
        service_name: &str,
    ) -> Result<Vec<InterfaceWithVersion>> {
        let records = sqlx::query_as::<_, InterfaceWithVersion>(
            r#"
            SELECT i.id, i.config_id, i.service_name, i.service_display_name, i.path,
                   i.http_method, i.is_async, i.filter_rule, i.description, c.version
            FROM plugin_interfaces i
            JOIN plugin_configs c ON c.id = i.config_id
            WHERE i.service_name = $1
              AND c.status = 'ENABLED'
            "#,
        )
        .bind(service_name)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    async fn list_interface_parameters(
        &self,
        interface_id: &str,
    ) -> Result<Vec<InterfaceParameter>> {
        let records = sqlx::query_as::<_, InterfaceParameter>(
            r#"
            SELECT id, interface_id, direction, name, data_type, mapping_type, multiple,
                   sensitive
            FROM interface_parameters
            WHERE interface_id = $1
            ORDER BY id
            "#,
        )
        .bind(interface_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    async fn insert_node_request(
        &self,
        request: &NodeRequest,
        params: &[NodeRequestParam],
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO node_requests
                (id, instance_node_id, req_url, data_amount, is_completed, error_msg,
                 created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(&request.id)
        .bind(&request.instance_node_id)
        .bind(&request.req_url)
        .bind(request.data_amount)
        .bind(request.is_completed)
        .bind(&request.error_msg)
        .bind(request.created_at)
        .bind(request.updated_at)
        .execute(&mut *tx)
        .await?;

        for param in params {
            insert_request_param(&mut tx, param).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn complete_node_request(
        &self,
        request_id: &str,
        error_msg: Option<&str>,
        outputs: &[NodeRequestParam],
        now: DateTime<Utc>,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            UPDATE node_requests
            SET is_completed = TRUE, error_msg = $2, updated_at = $3
            WHERE id = $1
            "#,
        )
        .bind(request_id)
        .bind(error_msg)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        for param in outputs {
            insert_request_param(&mut tx, param).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn latest_node_request(
        &self,
        instance_node_id: &str,
    ) -> Result<Option<NodeRequest>> {
        let record = sqlx::query_as::<_, NodeRequest>(
            r#"
            SELECT id, instance_node_id, req_url, data_amount, is_completed, error_msg,
                   created_at, updated_at
            FROM node_requests
            WHERE instance_node_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(instance_node_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    async fn list_node_request_params(
        &self,
        request_id: &str,
    ) -> Result<Vec<NodeRequestParam>> {
        let records = sqlx::query_as::<_, NodeRequestParam>(
            r#"
            SELECT id, request_id, data_index, direction, name, data_type, data_value,
                   entity_data_id, entity_type_id, multiple, param_def_id, mapping_type,
                   callback_id, created_at
            FROM node_request_params
            WHERE request_id = $1
            ORDER BY data_index, id
            "#,
        )
        .bind(request_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }
}

async fn insert_request_param(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    param: &NodeRequestParam,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO node_request_params
            (request_id, data_index, direction, name, data_type, data_value, entity_data_id,
             entity_type_id, multiple, param_def_id, mapping_type, callback_id, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        "#,
    )
    .bind(&param.request_id)
    .bind(param.data_index)
    .bind(&param.direction)
    .bind(&param.name)
    .bind(&param.data_type)
    .bind(&param.data_value)
    .bind(&param.entity_data_id)
    .bind(&param.entity_type_id)
    .bind(param.multiple)
    .bind(&param.param_def_id)
    .bind(&param.mapping_type)
    .bind(&param.callback_id)
    .bind(param.created_at)
    .execute(&mut **tx)
    .await?;
    Ok(())
}
